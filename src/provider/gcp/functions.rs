//! Cloud Functions endpoints and Cloud Run domain mappings
//!
//! The second wave only visits locations where the first wave found at
//! least one function, so it starts after the first has finished.

use super::ServiceContext;
use crate::schema::ResourceSet;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

const INTERNAL_ONLY_INGRESS: &str = "ALLOW_INTERNAL_ONLY";

pub(super) async fn collect(ctx: &ServiceContext, out: &Arc<ResourceSet>) -> Result<()> {
    let mut locations: Vec<String> = Vec::new();
    ctx.client
        .paginate(&ctx.client.functions_locations_url(), "locations", &ctx.cancel, |page| {
            locations.extend(
                page.iter()
                    .filter_map(|loc| loc.get("locationId").and_then(Value::as_str))
                    .map(str::to_string),
            );
        })
        .await
        .context("Failed to list functions locations")?;
    tracing::debug!("Found {} functions locations", locations.len());

    let active: Arc<Mutex<BTreeSet<String>>> = Arc::default();
    {
        let handler_ctx = ctx.clone();
        let sink = Arc::clone(out);
        let active = Arc::clone(&active);
        ctx.dispatcher
            .dispatch("functions", locations, &ctx.cancel, move |location| {
                let ctx = handler_ctx.clone();
                let out = Arc::clone(&sink);
                let active = Arc::clone(&active);
                async move {
                    let mut found = 0;
                    let listed = list_functions(&ctx, &out, &location, &mut found).await;
                    // pages delivered before a failure still mark the location
                    if found > 0 {
                        active
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(location);
                    }
                    listed
                }
            })
            .await;
    }

    let active: Vec<String> = active
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .cloned()
        .collect();
    if active.is_empty() {
        return Ok(());
    }

    let handler_ctx = ctx.clone();
    let sink = Arc::clone(out);
    ctx.dispatcher
        .dispatch("run domain mappings", active, &ctx.cancel, move |location| {
            let ctx = handler_ctx.clone();
            let out = Arc::clone(&sink);
            async move {
                ctx.client
                    .paginate(&ctx.client.run_domain_mappings_url(&location), "items", &ctx.cancel, |page| {
                        for domain in page.iter().filter_map(mapping_domain) {
                            out.append(&ctx.candidate().with_dns_name(domain));
                        }
                    })
                    .await?;
                anyhow::Ok(())
            }
        })
        .await;

    Ok(())
}

/// List one location's functions, counting every function seen into `found`
async fn list_functions(
    ctx: &ServiceContext,
    out: &ResourceSet,
    location: &str,
    found: &mut usize,
) -> Result<()> {
    tracing::debug!("Listing functions in {}", location);
    ctx.client
        .paginate(&ctx.client.functions_url(location), "functions", &ctx.cancel, |page| {
            *found += page.len();
            for host in page.iter().filter_map(function_host) {
                out.append(&ctx.candidate().with_dns_name(host));
            }
        })
        .await?;
    Ok(())
}

/// Public hostname of a function's HTTPS endpoint
fn function_host(function: &Value) -> Option<String> {
    let service = function.get("serviceConfig");
    let ingress = service
        .and_then(|s| s.get("ingressSettings"))
        .and_then(Value::as_str);
    if ingress == Some(INTERNAL_ONLY_INGRESS) {
        return None;
    }

    let uri = service
        .and_then(|s| s.get("uri"))
        .or_else(|| function.get("url"))
        .and_then(Value::as_str)?;
    let parsed = url::Url::parse(uri).ok()?;
    parsed.host_str().map(str::to_string)
}

fn mapping_domain(mapping: &Value) -> Option<&str> {
    mapping
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
}
