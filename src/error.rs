//! Error types
//!
//! Only account-level failures cross the provider boundary as a
//! [`ProviderError`]. Region and sub-service failures stay inside the
//! dispatcher as `anyhow::Error` values and are logged there.

use std::path::PathBuf;

/// Configuration loading and lookup errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not a YAML sequence of option blocks
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required key is missing or empty in an option block
    #[error("no such key: {name}")]
    NoSuchKey { name: String },

    /// The `provider` value does not map to any adapter
    #[error("invalid cloud provider name: {name} (supported: {supported})")]
    UnknownProvider { name: String, supported: String },

    /// A value is present but unusable
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Account-level failure of one provider's `resources` call
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Credentials are missing, unreadable or rejected
    #[error("credentials error: {0}")]
    Credentials(String),

    /// The API client could not be constructed
    #[error("client construction failed: {0}")]
    Client(String),

}

/// The built-in classification tables failed to compile
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("invalid hostname pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid reserved range '{range}': {source}")]
    Range {
        range: String,
        #[source]
        source: ipnet::AddrParseError,
    },
}
