//! Cloud SQL instance addresses

use super::ServiceContext;
use crate::schema::{Resource, ResourceSet};
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

pub(super) async fn collect(ctx: &ServiceContext, out: &Arc<ResourceSet>) -> Result<()> {
    tracing::debug!("Listing Cloud SQL instances");
    let count = ctx
        .client
        .paginate(&ctx.client.sql_instances_url(), "items", &ctx.cancel, |page| {
            for instance in page {
                for candidate in instance_candidates(ctx, instance) {
                    out.append(&candidate);
                }
            }
        })
        .await
        .context("Failed to list Cloud SQL instances")?;

    if count > 0 {
        tracing::info!("Found {} Cloud SQL instances", count);
    }
    Ok(())
}

/// PRIMARY addresses paired with the instance's PRIVATE address.
/// OUTGOING addresses are egress only and skipped.
fn instance_candidates(ctx: &ServiceContext, instance: &Value) -> Vec<Resource> {
    let private_ip = addresses_of_type(instance, "PRIVATE")
        .into_iter()
        .next()
        .unwrap_or_default();
    let mut candidates: Vec<Resource> = addresses_of_type(instance, "PRIMARY")
        .into_iter()
        .map(|ip| ctx.candidate().with_public_ip(ip).with_private_ip(private_ip))
        .collect();
    if candidates.is_empty() {
        candidates.push(ctx.candidate().with_private_ip(private_ip));
    }

    candidates.retain(|c| c.raw_values().next().is_some());
    candidates
}

fn addresses_of_type<'a>(instance: &'a Value, wanted: &str) -> Vec<&'a str> {
    instance
        .get("ipAddresses")
        .and_then(Value::as_array)
        .map(|addresses| {
            addresses
                .iter()
                .filter(|a| a.get("type").and_then(Value::as_str) == Some(wanted))
                .filter_map(|a| a.get("ipAddress").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::TaskDispatcher;
    use crate::provider::gcp::auth::GcpCredentials;
    use crate::provider::gcp::client::{GcpClient, GcpEndpoints};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ServiceContext {
        let client = GcpClient::new(
            GcpCredentials::from_static_token("t"),
            "p",
            GcpEndpoints::default(),
        )
        .unwrap();
        ServiceContext {
            client: Arc::new(client),
            dispatcher: TaskDispatcher::default(),
            provider_id: Arc::from("acct"),
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn test_primary_and_private_addresses() {
        let instance = json!({
            "name": "orders-db",
            "ipAddresses": [
                {"type": "PRIMARY", "ipAddress": "34.66.1.2"},
                {"type": "PRIVATE", "ipAddress": "10.20.0.3"},
                {"type": "OUTGOING", "ipAddress": "35.9.9.9"}
            ]
        });
        let candidates = instance_candidates(&ctx(), &instance);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].public_ipv4.as_deref(), Some("34.66.1.2"));
        assert_eq!(candidates[0].private_ipv4.as_deref(), Some("10.20.0.3"));
    }

    #[test]
    fn test_private_only_instance() {
        let instance = json!({"ipAddresses": [{"type": "PRIVATE", "ipAddress": "10.20.0.4"}]});
        let candidates = instance_candidates(&ctx(), &instance);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].public_ipv4.is_none());
        assert_eq!(candidates[0].private_ipv4.as_deref(), Some("10.20.0.4"));
    }

    #[test]
    fn test_instance_without_addresses() {
        assert!(instance_candidates(&ctx(), &json!({"name": "pending"})).is_empty());
    }
}
