//! Configuration Management
//!
//! The config file is a YAML sequence of option blocks, one per cloud
//! account. Values starting with `$` are read from the environment.

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Option block keys
pub mod keys {
    pub const PROVIDER: &str = "provider";
    pub const ID: &str = "id";
    pub const CLOUD_SERVICES: &str = "cloud_services";
    pub const ACCESS_KEY: &str = "access_key";
    pub const SECRET_KEY: &str = "secret_key";
    pub const SESSION_TOKEN: &str = "session_token";
    pub const ENDPOINT: &str = "endpoint";
}

/// Written to the default location on first run
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# lcloud (list cloud) provider configuration
#
# Each entry is one cloud account:
#
# - provider: provider_name
#   # id names this entry; use it with --id
#   id: test
#   # access_key / secret_key are the account's credentials
#   access_key:
#   secret_key:
#   # (optional) session_token for temporary credentials
#   session_token:
#   # (optional) comma-separated services; empty means all
#   cloud_services:
#
# Any value may reference an environment variable: secret_key: $MY_SECRET
#
# Google Cloud
# access_key is the project ID, secret_key a service-account key file
# path or "adc" for Application Default Credentials.
# - provider: gcp
#   id: gcp_default
#   cloud_services: compute,storage,dns,functions,sql
#   access_key: my-project-id
#   secret_key: adc
#   session_token:
"#;

/// One account's key/value settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, serde_yaml::Value>")]
pub struct OptionBlock(BTreeMap<String, String>);

impl From<BTreeMap<String, serde_yaml::Value>> for OptionBlock {
    fn from(raw: BTreeMap<String, serde_yaml::Value>) -> Self {
        let values = raw
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Null => String::new(),
                    _ => {
                        tracing::warn!("Ignoring non-scalar value for config key '{}'", key);
                        String::new()
                    }
                };
                (key, value)
            })
            .collect();
        Self(values)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionBlock {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl OptionBlock {
    /// Resolved, trimmed value; missing or empty keys are `None`.
    ///
    /// `$NAME` is replaced by the environment variable `NAME` when that is
    /// set and non-empty, otherwise the literal is kept.
    pub fn get(&self, key: &str) -> Option<String> {
        let data = self.0.get(key).filter(|v| !v.is_empty())?;
        if let Some(var) = data.strip_prefix('$') {
            if let Ok(env) = std::env::var(var) {
                if !env.is_empty() {
                    return Some(env.trim().to_string());
                }
            }
        }
        Some(data.trim().to_string())
    }

    /// Like [`get`](Self::get) but missing keys are an error
    pub fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::NoSuchKey {
                name: key.to_string(),
            })
    }

    /// Unresolved value as written in the file
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Default config file path
pub fn default_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("lcloud").join("config.yaml");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".lcloud").join("config.yaml");
    }
    PathBuf::from("config.yaml")
}

/// Write the commented template if `path` does not exist yet.
/// Returns whether a file was created.
pub fn ensure_config_file(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    Ok(true)
}

/// Load every option block from a config file
pub fn read_config(path: &Path) -> Result<Vec<OptionBlock>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse config text; a document with only comments yields no blocks
pub fn parse_config(content: &str) -> Result<Vec<OptionBlock>, serde_yaml::Error> {
    let has_content = content
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#'));
    if !has_content {
        return Ok(Vec::new());
    }
    let blocks: Option<Vec<OptionBlock>> = serde_yaml::from_str(content)?;
    Ok(blocks.unwrap_or_default())
}

/// Keep blocks whose resolved provider and id pass the (case-insensitive)
/// filters.
/// An empty filter list matches everything.
pub fn select(blocks: Vec<OptionBlock>, providers: &[String], ids: &[String]) -> Vec<OptionBlock> {
    fn matches(filter: &[String], value: Option<&str>) -> bool {
        filter.is_empty()
            || value.is_some_and(|v| filter.iter().any(|f| f.trim().eq_ignore_ascii_case(v)))
    }

    blocks
        .into_iter()
        .filter(|block| {
            matches(providers, block.get(keys::PROVIDER).as_deref())
                && matches(ids, block.get(keys::ID).as_deref())
        })
        .collect()
}
