//! Google Cloud adapter
//!
//! Implements [`Provider`] against the GCP REST APIs. Every service is
//! collected into its own partial set sharing one dedup scope, then merged
//! into the result.
//!
//! # Module Structure
//!
//! - [`auth`] - Credential resolution and token caching
//! - [`client`] - Per-project client and URL builders
//! - [`http`] - HTTP utilities for REST API calls
//! - `compute`, `storage`, `dns`, `functions`, `sql` - one collector per service
//!
//! # Configuration
//!
//! ```yaml
//! - provider: gcp
//!   id: gcp_prod
//!   access_key: my-project-id        # project ID
//!   secret_key: /path/to/key.json    # or "adc"
//!   session_token:                   # optional pre-issued access token
//!   cloud_services: compute,storage,dns,functions,sql
//! ```

pub mod auth;
pub mod client;
mod compute;
mod dns;
mod functions;
pub mod http;
mod sql;
mod storage;

use crate::config::{keys, OptionBlock};
use crate::dispatch::TaskDispatcher;
use crate::error::{ConfigError, ProviderError};
use crate::provider::Provider;
use crate::schema::{Resource, ResourceSet, UniqueKeyStore};
use async_trait::async_trait;
use auth::GcpCredentials;
use client::{GcpClient, GcpEndpoints};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const PROVIDER_NAME: &str = "gcp";

/// Services this adapter can enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GcpService {
    Compute,
    Storage,
    Dns,
    Functions,
    Sql,
}

impl GcpService {
    pub const ALL: [GcpService; 5] = [
        Self::Compute,
        Self::Storage,
        Self::Dns,
        Self::Functions,
        Self::Sql,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Storage => "storage",
            Self::Dns => "dns",
            Self::Functions => "functions",
            Self::Sql => "sql",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|service| service.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Resolve a service filter; an empty filter selects every service
    pub fn select(names: &[String]) -> Vec<Self> {
        let mut selected = Vec::new();
        for name in names.iter().filter(|n| !n.trim().is_empty()) {
            match Self::parse(name) {
                Some(service) if !selected.contains(&service) => selected.push(service),
                Some(_) => {}
                None => tracing::warn!("Ignoring unknown GCP service: {}", name),
            }
        }
        if selected.is_empty() && names.iter().all(|n| n.trim().is_empty()) {
            return Self::ALL.to_vec();
        }
        selected
    }
}

impl fmt::Display for GcpService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a service collector needs, cheap to clone into handlers
#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub client: Arc<GcpClient>,
    pub dispatcher: TaskDispatcher,
    pub provider_id: Arc<str>,
    pub cancel: CancellationToken,
}

impl ServiceContext {
    pub fn candidate(&self) -> Resource {
        Resource::candidate(PROVIDER_NAME, &self.provider_id)
    }
}

/// One configured GCP project
pub struct GcpProvider {
    id: String,
    client: Arc<GcpClient>,
    services: Vec<GcpService>,
    dispatcher: TaskDispatcher,
}

impl GcpProvider {
    /// Build from a config block, verifying the credentials up front
    pub async fn new(
        block: &OptionBlock,
        cloud_services: &[String],
        dispatcher: TaskDispatcher,
    ) -> Result<Self, ProviderError> {
        let project_id = block.require(keys::ACCESS_KEY)?;
        let secret_key = block.require(keys::SECRET_KEY)?;
        let session_token = block.get(keys::SESSION_TOKEN);
        let id = block.get(keys::ID).unwrap_or_default();

        let endpoints = match block.get(keys::ENDPOINT) {
            Some(base) => GcpEndpoints::single(&base).map_err(|e| ConfigError::InvalidValue {
                field: keys::ENDPOINT.to_string(),
                reason: format!("{e:#}"),
            })?,
            None => GcpEndpoints::default(),
        };

        let credentials = GcpCredentials::resolve(&secret_key, session_token.as_deref())
            .await
            .map_err(|e| ProviderError::Credentials(format!("{e:#}")))?;
        let client = GcpClient::new(credentials, &project_id, endpoints)
            .map_err(|e| ProviderError::Client(format!("{e:#}")))?;

        client
            .get_token()
            .await
            .map_err(|e| ProviderError::Credentials(format!("{e:#}")))?;
        tracing::debug!("GCP client for project {} ready", project_id);

        Ok(Self::from_client(&id, client, GcpService::select(cloud_services), dispatcher))
    }

    pub fn from_client(
        id: &str,
        client: GcpClient,
        services: Vec<GcpService>,
        dispatcher: TaskDispatcher,
    ) -> Self {
        Self {
            id: id.to_string(),
            client: Arc::new(client),
            services,
            dispatcher,
        }
    }

    pub fn services(&self) -> &[GcpService] {
        &self.services
    }
}

#[async_trait]
impl Provider for GcpProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn resources(&self, cancel: &CancellationToken) -> Result<ResourceSet, ProviderError> {
        self.client
            .get_token()
            .await
            .map_err(|e| ProviderError::Credentials(format!("{e:#}")))?;

        let ctx = ServiceContext {
            client: Arc::clone(&self.client),
            dispatcher: self.dispatcher,
            provider_id: Arc::from(self.id.as_str()),
            cancel: cancel.clone(),
        };
        let scope = Arc::new(UniqueKeyStore::new());
        let result = ResourceSet::new();

        for service in &self.services {
            let partial = Arc::new(ResourceSet::with_store(Arc::clone(&scope)));
            let collected = match service {
                GcpService::Compute => compute::collect(&ctx, &partial).await,
                GcpService::Storage => storage::collect(&ctx, &partial).await,
                GcpService::Dns => dns::collect(&ctx, &partial).await,
                GcpService::Functions => functions::collect(&ctx, &partial).await,
                GcpService::Sql => sql::collect(&ctx, &partial).await,
            };
            if let Err(e) = collected {
                tracing::warn!(
                    "GCP {} listing for {} incomplete: {} ({:#})",
                    service,
                    self.id,
                    http::format_gcp_error(&e),
                    e
                );
            }

            tracing::info!("Found {} GCP {} resources", partial.len(), service);
            result.merge(&partial);
        }

        Ok(result)
    }
}
