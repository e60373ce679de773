//! lcloud: list the network-reachable assets of cloud accounts
//!
//! Provider adapters enumerate raw candidates (IP addresses, hostnames)
//! from cloud APIs. Each candidate passes through a scope-bound dedup
//! store and a classifier before it is stored in a [`ResourceSet`].
//!
//! # Module Structure
//!
//! - [`schema`] - Resource model, classifier and dedup store
//! - [`dispatch`] - Bounded worker pool for per-region fan-out
//! - [`provider`] - Provider trait, inventory and adapters
//! - [`config`] - YAML option blocks
//! - [`runner`] - Sequential enumeration and output formatting
//! - [`error`] - Error types

pub mod config;
pub mod dispatch;
pub mod error;
pub mod provider;
pub mod runner;
pub mod schema;

pub use dispatch::{DispatchReport, TaskDispatcher};
pub use provider::{Inventory, Provider};
pub use schema::{identify, Resource, ResourceKind, ResourceSet, UniqueKeyStore};

/// Version injected at compile time via LCLOUD_VERSION (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("LCLOUD_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
