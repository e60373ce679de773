//! Compute Engine instances, fanned out per zone

use super::ServiceContext;
use crate::schema::{Resource, ResourceSet};
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

pub(super) async fn collect(ctx: &ServiceContext, out: &Arc<ResourceSet>) -> Result<()> {
    let mut zones: Vec<String> = Vec::new();
    ctx.client
        .paginate(&ctx.client.compute_zones_url(), "items", &ctx.cancel, |page| {
            zones.extend(
                page.iter()
                    .filter(|zone| zone.get("status").and_then(Value::as_str) != Some("DOWN"))
                    .filter_map(|zone| zone.get("name").and_then(Value::as_str))
                    .map(str::to_string),
            );
        })
        .await
        .context("Failed to list compute zones")?;
    tracing::debug!("Found {} compute zones", zones.len());

    let handler_ctx = ctx.clone();
    let sink = Arc::clone(out);
    ctx.dispatcher
        .dispatch("compute instances", zones, &ctx.cancel, move |zone| {
            let ctx = handler_ctx.clone();
            let out = Arc::clone(&sink);
            async move { list_instances(&ctx, &out, &zone).await }
        })
        .await;

    Ok(())
}

async fn list_instances(ctx: &ServiceContext, out: &ResourceSet, zone: &str) -> Result<()> {
    tracing::debug!("Listing compute instances in {}", zone);
    let count = ctx
        .client
        .paginate(&ctx.client.compute_instances_url(zone), "items", &ctx.cancel, |page| {
            for instance in page {
                for candidate in instance_candidates(ctx, instance) {
                    out.append(&candidate);
                }
            }
        })
        .await?;

    if count > 0 {
        tracing::info!("Found {} compute instances in {}", count, zone);
    }
    Ok(())
}

/// One candidate per public address of each network interface, paired
/// with the interface's internal address
fn instance_candidates(ctx: &ServiceContext, instance: &Value) -> Vec<Resource> {
    let mut candidates = Vec::new();
    let interfaces = instance
        .get("networkInterfaces")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for nic in interfaces {
        let private_ip = nic.get("networkIP").and_then(Value::as_str).unwrap_or_default();
        let public_ips = string_fields(nic, "accessConfigs", "natIP");

        if public_ips.is_empty() {
            candidates.push(ctx.candidate().with_private_ip(private_ip));
        } else {
            candidates.extend(
                public_ips
                    .into_iter()
                    .map(|ip| ctx.candidate().with_public_ip(ip).with_private_ip(private_ip)),
            );
        }

        candidates.extend(
            string_fields(nic, "ipv6AccessConfigs", "externalIpv6")
                .into_iter()
                .map(|ip| ctx.candidate().with_public_ip(ip)),
        );
    }

    candidates.retain(|c| c.raw_values().next().is_some());
    candidates
}

/// Collect `obj[list][*][field]` string values
fn string_fields<'a>(obj: &'a Value, list: &str, field: &str) -> Vec<&'a str> {
    obj.get(list)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get(field).and_then(Value::as_str))
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
