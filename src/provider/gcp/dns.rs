//! Cloud DNS record sets
//!
//! Two steps: list public managed zones, then fan out over the zones to
//! list their record sets.

use super::ServiceContext;
use crate::schema::{Resource, ResourceSet};
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

pub(super) async fn collect(ctx: &ServiceContext, out: &Arc<ResourceSet>) -> Result<()> {
    let mut zones: Vec<String> = Vec::new();
    ctx.client
        .paginate(&ctx.client.dns_managed_zones_url(), "managedZones", &ctx.cancel, |page| {
            zones.extend(
                page.iter()
                    .filter(|zone| zone.get("visibility").and_then(Value::as_str) != Some("private"))
                    .filter_map(|zone| zone.get("name").and_then(Value::as_str))
                    .map(str::to_string),
            );
        })
        .await
        .context("Failed to list DNS managed zones")?;
    tracing::debug!("Found {} public DNS zones", zones.len());

    let handler_ctx = ctx.clone();
    let sink = Arc::clone(out);
    ctx.dispatcher
        .dispatch("dns record sets", zones, &ctx.cancel, move |zone| {
            let ctx = handler_ctx.clone();
            let out = Arc::clone(&sink);
            async move {
                tracing::debug!("Listing record sets of zone {}", zone);
                ctx.client
                    .paginate(&ctx.client.dns_rrsets_url(&zone), "rrsets", &ctx.cancel, |page| {
                        for rrset in page {
                            for candidate in record_candidates(&ctx, rrset) {
                                out.append(&candidate);
                            }
                        }
                    })
                    .await?;
                anyhow::Ok(())
            }
        })
        .await;

    Ok(())
}

/// Candidates for A, AAAA and CNAME record sets; other types are ignored
fn record_candidates(ctx: &ServiceContext, rrset: &Value) -> Vec<Resource> {
    let Some(name) = rrset.get("name").and_then(Value::as_str) else {
        return Vec::new();
    };
    let record_type = rrset.get("type").and_then(Value::as_str).unwrap_or_default();
    let name = name.trim_end_matches('.');
    let rrdatas = rrset
        .get("rrdatas")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_str);

    match record_type {
        "A" | "AAAA" => rrdatas
            .map(|ip| ctx.candidate().with_dns_name(name).with_public_ip(ip))
            .collect(),
        "CNAME" => {
            let mut candidates = vec![ctx.candidate().with_dns_name(name)];
            candidates.extend(rrdatas.map(|target| ctx.candidate().with_dns_name(target.trim_end_matches('.'))));
            candidates
        }
        _ => Vec::new(),
    }
}
