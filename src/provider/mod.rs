//! Provider contract and inventory
//!
//! A provider is one configured cloud account. Adapters expose a stable
//! provider name, the account's configured id, and a `resources` call that
//! fails only for account-level problems (bad credentials, client
//! construction). Region or service failures are absorbed by the
//! adapter's dispatcher waves.

pub mod gcp;

use crate::config::{keys, OptionBlock};
use crate::dispatch::TaskDispatcher;
use crate::error::{ConfigError, ProviderError};
use crate::schema::ResourceSet;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider identifier, e.g. `gcp`
    fn name(&self) -> &str;

    /// Configured account identifier
    fn id(&self) -> &str;

    /// Enumerate and classify the account's network-reachable assets
    async fn resources(&self, cancel: &CancellationToken) -> Result<ResourceSet, ProviderError>;
}

/// Provider names with a registered adapter
pub const SUPPORTED_PROVIDERS: &[&str] = &[gcp::PROVIDER_NAME];

/// The providers constructed from a run's config blocks
#[derive(Default)]
pub struct Inventory {
    pub providers: Vec<Box<dyn Provider>>,
}

impl Inventory {
    /// Construct an adapter for every block carrying a `provider` key.
    ///
    /// A block that fails to construct is logged and skipped so the other
    /// accounts still get enumerated.
    pub async fn build(
        blocks: &[OptionBlock],
        cloud_services: &[String],
        dispatcher: TaskDispatcher,
    ) -> Self {
        let mut providers: Vec<Box<dyn Provider>> = Vec::new();

        for block in blocks {
            let Some(name) = block.get(keys::PROVIDER) else {
                tracing::debug!("Skipping config block without provider key");
                continue;
            };
            let id = block.get(keys::ID).unwrap_or_default();
            let services = services_for(block, cloud_services);

            match name_to_provider(&name, block, &services, dispatcher).await {
                Ok(provider) => providers.push(provider),
                Err(e) => tracing::error!("Cannot use {} ({}): {}", name, id, e),
            }
        }

        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

async fn name_to_provider(
    name: &str,
    block: &OptionBlock,
    services: &[String],
    dispatcher: TaskDispatcher,
) -> Result<Box<dyn Provider>, ProviderError> {
    match name.to_ascii_lowercase().as_str() {
        gcp::PROVIDER_NAME => Ok(Box::new(gcp::GcpProvider::new(block, services, dispatcher).await?)),
        _ => Err(ConfigError::UnknownProvider {
            name: name.to_string(),
            supported: SUPPORTED_PROVIDERS.join(", "),
        }
        .into()),
    }
}

/// Service filter for a block: the CLI list wins over the block's
/// `cloud_services`
pub fn services_for(block: &OptionBlock, cli: &[String]) -> Vec<String> {
    let cli: Vec<String> = cli
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
        .collect();
    if !cli.is_empty() {
        return cli;
    }

    block
        .get(keys::CLOUD_SERVICES)
        .map(|list| {
            list.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
