//! GCP Authentication
//!
//! Resolves credentials for one configured account: a pre-issued access
//! token, a service-account key file, or Application Default Credentials.

use anyhow::{Context, Result};
use gcp_auth::TokenProvider;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Read-only scope is enough for every listing call
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform.read-only"];

/// Refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// `secret_key` value selecting Application Default Credentials
pub const ADC_SECRET: &str = "adc";

#[derive(Clone)]
enum TokenSource {
    /// Token handed in through `session_token`; used as is
    Static(String),
    Provider(Arc<dyn TokenProvider>),
}

/// Credentials holder with token caching
#[derive(Clone)]
pub struct GcpCredentials {
    source: TokenSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl std::fmt::Debug for GcpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.source {
            TokenSource::Static(_) => "static",
            TokenSource::Provider(_) => "provider",
        };
        f.debug_struct("GcpCredentials").field("source", &kind).finish()
    }
}

impl GcpCredentials {
    /// Pick the credential source from the block's secrets.
    ///
    /// A session token wins; otherwise `secret_key` is either `adc` or a
    /// path to a service-account JSON key.
    pub async fn resolve(secret_key: &str, session_token: Option<&str>) -> Result<Self> {
        if let Some(token) = session_token.filter(|t| !t.is_empty()) {
            tracing::debug!("Using pre-issued GCP access token");
            return Ok(Self::from_static_token(token));
        }
        if secret_key.eq_ignore_ascii_case(ADC_SECRET) {
            tracing::debug!("Using GCP Application Default Credentials");
            return Self::from_adc().await;
        }
        tracing::debug!("Using GCP service account key file");
        Self::from_service_account_file(Path::new(secret_key))
    }

    pub fn from_static_token(token: &str) -> Self {
        Self {
            source: TokenSource::Static(token.to_string()),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn from_adc() -> Result<Self> {
        let provider = gcp_auth::provider().await.context(
            "Failed to initialize GCP authentication. Run 'gcloud auth application-default login'",
        )?;
        Ok(Self::from_provider(provider))
    }

    pub fn from_service_account_file(path: &Path) -> Result<Self> {
        let account = gcp_auth::CustomServiceAccount::from_file(path)
            .with_context(|| format!("Failed to load service account key {}", path.display()))?;
        Ok(Self::from_provider(Arc::new(account)))
    }

    fn from_provider(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            source: TokenSource::Provider(provider),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String> {
        let provider = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Provider(provider) => provider,
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = provider
            .token(DEFAULT_SCOPES)
            .await
            .context("Failed to get access token")?;
        let token_str = token.as_str().to_string();

        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;
        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token_str.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_token_takes_precedence() {
        let creds = GcpCredentials::resolve("/does/not/exist.json", Some("ya29.token"))
            .await
            .unwrap();
        assert_eq!(creds.get_token().await.unwrap(), "ya29.token");
    }

    #[tokio::test]
    async fn test_missing_key_file_is_an_error() {
        let err = GcpCredentials::resolve("/does/not/exist.json", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/does/not/exist.json"));
    }

    #[tokio::test]
    async fn test_empty_session_token_is_ignored() {
        assert!(GcpCredentials::resolve("/does/not/exist.json", Some(""))
            .await
            .is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let creds = GcpCredentials::from_static_token("secret-value");
        assert!(!format!("{creds:?}").contains("secret-value"));
    }
}
