//! GCP Client
//!
//! Combines credentials, the HTTP layer and per-API base URLs for one
//! project.

use super::auth::GcpCredentials;
use super::http::{with_query, GcpHttpClient};
use anyhow::{Context, Result};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Base URLs of the APIs the adapter talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpEndpoints {
    pub compute: String,
    pub storage: String,
    pub dns: String,
    pub functions: String,
    pub run: String,
    pub sql: String,
}

impl Default for GcpEndpoints {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com".to_string(),
            storage: "https://storage.googleapis.com".to_string(),
            dns: "https://dns.googleapis.com".to_string(),
            functions: "https://cloudfunctions.googleapis.com".to_string(),
            run: "https://run.googleapis.com".to_string(),
            sql: "https://sqladmin.googleapis.com".to_string(),
        }
    }
}

impl GcpEndpoints {
    /// Route every API to one base URL (emulators, mock servers)
    pub fn single(base: &str) -> Result<Self> {
        let parsed = url::Url::parse(base).with_context(|| format!("Invalid endpoint URL: {base}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Unsupported endpoint scheme: {}", parsed.scheme());
        }
        let base = base.trim_end_matches('/').to_string();
        Ok(Self {
            compute: base.clone(),
            storage: base.clone(),
            dns: base.clone(),
            functions: base.clone(),
            run: base.clone(),
            sql: base,
        })
    }
}

#[derive(Clone, Debug)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub project_id: String,
    pub endpoints: GcpEndpoints,
}

impl GcpClient {
    pub fn new(credentials: GcpCredentials, project_id: &str, endpoints: GcpEndpoints) -> Result<Self> {
        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
            project_id: project_id.to_string(),
            endpoints,
        })
    }

    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Walk a paginated list endpoint, handing each page's `items_key`
    /// array to `on_page` as it arrives.
    ///
    /// A failing page (or cancellation) ends the walk with an error; pages
    /// already delivered stay delivered. Returns the number of items seen.
    pub async fn paginate<F>(
        &self,
        url: &str,
        items_key: &str,
        cancel: &CancellationToken,
        mut on_page: F,
    ) -> Result<usize>
    where
        F: FnMut(&[Value]),
    {
        let mut seen = 0;
        let mut page_token: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                anyhow::bail!("cancelled after {} items", seen);
            }

            let page_url = match page_token.as_deref() {
                Some(token) => with_query(url, "pageToken", token),
                None => url.to_string(),
            };
            let response = self.get(&page_url).await?;

            let items = response
                .get(items_key)
                .and_then(|v| v.as_array())
                .map(Vec::as_slice)
                .unwrap_or_default();
            seen += items.len();
            on_page(items);

            page_token = response
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());

            if page_token.is_none() {
                break;
            }
            tracing::debug!("nextPageToken present, fetching next page of {}", url);
        }

        Ok(seen)
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    pub fn compute_url(&self, path: &str) -> String {
        format!(
            "{}/compute/v1/projects/{}/{}",
            self.endpoints.compute, self.project_id, path
        )
    }

    pub fn compute_zones_url(&self) -> String {
        self.compute_url("zones")
    }

    pub fn compute_instances_url(&self, zone: &str) -> String {
        self.compute_url(&format!("zones/{}/instances", zone))
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    pub fn storage_buckets_url(&self) -> String {
        format!(
            "{}/storage/v1/b?project={}",
            self.endpoints.storage,
            urlencoding::encode(&self.project_id)
        )
    }

    // =========================================================================
    // Cloud DNS API helpers
    // =========================================================================

    pub fn dns_managed_zones_url(&self) -> String {
        format!(
            "{}/dns/v1/projects/{}/managedZones",
            self.endpoints.dns, self.project_id
        )
    }

    pub fn dns_rrsets_url(&self, zone: &str) -> String {
        format!("{}/{}/rrsets", self.dns_managed_zones_url(), zone)
    }

    // =========================================================================
    // Cloud Functions / Cloud Run API helpers
    // =========================================================================

    pub fn functions_locations_url(&self) -> String {
        format!(
            "{}/v2/projects/{}/locations",
            self.endpoints.functions, self.project_id
        )
    }

    pub fn functions_url(&self, location: &str) -> String {
        format!("{}/{}/functions", self.functions_locations_url(), location)
    }

    pub fn run_domain_mappings_url(&self, location: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/domainmappings",
            self.endpoints.run, self.project_id, location
        )
    }

    // =========================================================================
    // Cloud SQL Admin API helpers
    // =========================================================================

    pub fn sql_instances_url(&self) -> String {
        format!("{}/v1/projects/{}/instances", self.endpoints.sql, self.project_id)
    }
}
