//! Runner
//!
//! Walks the inventory one provider at a time and writes every resource
//! as output lines.

use crate::provider::Provider;
use crate::schema::Resource;
use anyhow::{Context, Result};
use std::io::Write;
use tokio_util::sync::CancellationToken;

/// How resources are rendered
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub exclude_private: bool,
    pub json: bool,
}

/// Per-run totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub providers: usize,
    pub failed_providers: usize,
    pub lines: usize,
}

/// Lines to print for one resource
pub fn format_resource(resource: &Resource, options: OutputOptions) -> Result<Vec<String>> {
    let private = if options.exclude_private {
        None
    } else {
        resource.private_ipv4.as_deref()
    };
    if options.json {
        if resource.dns_name.is_none() && resource.public_ipv4.is_none() && private.is_none() {
            return Ok(Vec::new());
        }
        return Ok(vec![serde_json::to_string(resource).context("Failed to encode resource")?]);
    }

    Ok([resource.dns_name.as_deref(), resource.public_ipv4.as_deref(), private]
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect())
}

/// Enumerate each provider in turn, writing result lines to `out`.
///
/// A provider failing at account level is logged and skipped.
pub async fn enumerate(
    providers: &[Box<dyn Provider>],
    options: OutputOptions,
    cancel: &CancellationToken,
    out: &mut dyn Write,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for provider in providers {
        if cancel.is_cancelled() {
            tracing::warn!("Run cancelled, skipping remaining providers");
            break;
        }
        summary.providers += 1;
        tracing::info!("Listing assets of {} ({})", provider.name(), provider.id());

        let resources = match provider.resources(cancel).await {
            Ok(resources) => resources,
            Err(e) => {
                tracing::error!(
                    "Failed to list assets of {} ({}): {}",
                    provider.name(),
                    provider.id(),
                    e
                );
                summary.failed_providers += 1;
                continue;
            }
        };

        let mut count = 0;
        for resource in resources.into_items() {
            for line in format_resource(&resource, options)? {
                writeln!(out, "{}", line).context("Failed to write output")?;
                count += 1;
            }
        }
        out.flush().context("Failed to flush output")?;

        if count == 0 {
            tracing::info!(
                "No assets found for {} ({}); the account may lack permissions or have no assets",
                provider.name(),
                provider.id()
            );
        }
        summary.lines += count;
    }

    Ok(summary)
}

/// Writes everything to two sinks
pub struct Tee<A: Write, B: Write> {
    first: A,
    second: Option<B>,
}

impl<A: Write, B: Write> Tee<A, B> {
    pub fn new(first: A, second: Option<B>) -> Self {
        Self { first, second }
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.first.write_all(buf)?;
        if let Some(second) = self.second.as_mut() {
            second.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.first.flush()?;
        if let Some(second) = self.second.as_mut() {
            second.flush()?;
        }
        Ok(())
    }
}
