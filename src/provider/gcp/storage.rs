//! Cloud Storage buckets

use super::ServiceContext;
use crate::schema::ResourceSet;
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

const BUCKET_HOST_SUFFIX: &str = "storage.googleapis.com";

pub(super) async fn collect(ctx: &ServiceContext, out: &Arc<ResourceSet>) -> Result<()> {
    tracing::debug!("Listing storage buckets");
    ctx.client
        .paginate(&ctx.client.storage_buckets_url(), "items", &ctx.cancel, |page| {
            for name in page.iter().filter_map(|b| b.get("name").and_then(Value::as_str)) {
                out.append(&ctx.candidate().with_dns_name(bucket_host(name)));
            }
        })
        .await
        .context("Failed to list storage buckets")?;
    Ok(())
}

/// Virtual-hosted style endpoint of a bucket
fn bucket_host(name: &str) -> String {
    format!("{}.{}", name, BUCKET_HOST_SUFFIX)
}
