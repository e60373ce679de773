//! Resource model and aggregation
//!
//! Cloud API collaborators hand raw candidate records to a [`ResourceSet`],
//! which splits each record into its non-empty fields, drops values already
//! seen in the current scope, classifies the rest and stores one
//! single-field [`Resource`] per accepted value.
//!
//! # Module Structure
//!
//! - [`validate`] - Classifier (DNS name / public IP / private IP)
//! - [`unique`] - Scope-bound dedup store

pub mod unique;
pub mod validate;

pub use unique::UniqueKeyStore;
pub use validate::{identify, ResourceKind, Validator};

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One network identifier attributed to a provider account.
///
/// As a candidate handed in by a collaborator it may carry several raw
/// fields. Once stored in a [`ResourceSet`] exactly one of `public_ipv4`,
/// `private_ipv4` and `dns_name` is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resource {
    /// Configured account identifier (the block's `id`)
    pub provider_id: String,
    /// Provider type tag, e.g. `gcp`
    pub provider_name: String,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ipv4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ipv4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
}

impl Resource {
    /// Start an empty candidate record for an account
    pub fn candidate(provider_name: &str, provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            provider_name: provider_name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_dns_name(mut self, name: impl Into<String>) -> Self {
        self.dns_name = non_empty(name.into());
        self
    }

    pub fn with_public_ip(mut self, ip: impl Into<String>) -> Self {
        self.public_ipv4 = non_empty(ip.into());
        self
    }

    pub fn with_private_ip(mut self, ip: impl Into<String>) -> Self {
        self.private_ipv4 = non_empty(ip.into());
        self
    }

    /// Non-empty raw fields in append order: DNS name, public IP, private IP
    pub fn raw_values(&self) -> impl Iterator<Item = &str> {
        [&self.dns_name, &self.public_ipv4, &self.private_ipv4]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .filter(|value| !value.is_empty())
    }

    /// Kind of a stored (single-field) resource
    pub fn kind(&self) -> ResourceKind {
        if self.dns_name.is_some() {
            ResourceKind::DnsName
        } else if self.public_ipv4.is_some() {
            ResourceKind::PublicIp
        } else if self.private_ipv4.is_some() {
            ResourceKind::PrivateIp
        } else {
            ResourceKind::None
        }
    }

    /// The populated value of a stored resource
    pub fn value(&self) -> Option<&str> {
        self.raw_values().next()
    }

    fn classified(kind: ResourceKind, value: &str, provider_name: &str, provider_id: &str) -> Option<Self> {
        let base = Self::candidate(provider_name, provider_id);
        let resource = match kind {
            ResourceKind::DnsName => Self {
                is_public: true,
                dns_name: Some(value.to_string()),
                ..base
            },
            ResourceKind::PublicIp => Self {
                is_public: true,
                public_ipv4: Some(value.to_string()),
                ..base
            },
            ResourceKind::PrivateIp => Self {
                private_ipv4: Some(value.to_string()),
                ..base
            },
            ResourceKind::None => return None,
        };
        Some(resource)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Thread-safe, append-only collection of classified resources.
///
/// Shared between dispatcher workers behind an `Arc`. Insertion order
/// depends on scheduling and carries no meaning.
#[derive(Debug)]
pub struct ResourceSet {
    items: Mutex<Vec<Resource>>,
    unique: Arc<UniqueKeyStore>,
}

impl Default for ResourceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSet {
    /// New set with its own dedup scope
    pub fn new() -> Self {
        Self::with_store(Arc::new(UniqueKeyStore::new()))
    }

    /// New set appending through a dedup scope shared with other sets
    pub fn with_store(unique: Arc<UniqueKeyStore>) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            unique,
        }
    }

    /// Append each non-empty raw field of `candidate`, returning how many
    /// resources were stored.
    pub fn append(&self, candidate: &Resource) -> usize {
        let accepted: Vec<Resource> = candidate
            .raw_values()
            .filter(|raw| self.unique.insert(raw))
            .filter_map(|raw| {
                let kind = identify(raw);
                if kind == ResourceKind::None {
                    tracing::trace!("dropping unclassified candidate {:?}", raw);
                }
                Resource::classified(kind, raw, &candidate.provider_name, &candidate.provider_id)
            })
            .collect();

        let count = accepted.len();
        if count > 0 {
            self.lock().extend(accepted);
        }
        count
    }

    /// Re-append every resource of `other`, returning how many were added.
    ///
    /// Each call dedups through a fresh store seeded with this set's current
    /// values. The append scope store is not consulted; values added here
    /// are recorded in it afterwards so later appends skip them.
    pub fn merge(&self, other: &ResourceSet) -> usize {
        let incoming = other.items();
        let mut items = self.lock();

        let store = UniqueKeyStore::new();
        for existing in items.iter() {
            for raw in existing.raw_values() {
                store.insert(raw);
            }
        }

        let before = items.len();
        for candidate in &incoming {
            for raw in candidate.raw_values() {
                if !store.insert(raw) {
                    continue;
                }
                if let Some(resource) = Resource::classified(
                    identify(raw),
                    raw,
                    &candidate.provider_name,
                    &candidate.provider_id,
                ) {
                    items.push(resource);
                }
            }
        }
        for added in &items[before..] {
            for raw in added.raw_values() {
                self.unique.insert(raw);
            }
        }
        items.len() - before
    }

    /// Snapshot of the stored resources
    pub fn items(&self) -> Vec<Resource> {
        self.lock().clone()
    }

    pub fn into_items(self) -> Vec<Resource> {
        self.items.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Resource>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
