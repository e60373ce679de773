//! Scope-bound set of raw candidate strings already seen

use dashmap::DashSet;

/// Concurrent existence-check-and-insert set keyed by the raw candidate.
///
/// One store is shared by every append within a provider's `resources`
/// call; merges use their own fresh store.
#[derive(Debug, Default)]
pub struct UniqueKeyStore {
    seen: DashSet<String>,
}

impl UniqueKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key`, returning `true` if it was not present before.
    ///
    /// Check and insert happen atomically, so two workers racing on the
    /// same value never both win.
    pub fn insert(&self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
