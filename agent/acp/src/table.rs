use ahash::AHashMap as HashMap;
use hub_agent_core::{authz::SharedAuthorize, ResourceKey};
use std::fmt;

/// An immutable snapshot of every compiled policy.
///
/// Tables are built whole and never modified once published.
#[derive(Clone, Default)]
pub struct RoutingTable {
    generation: u64,
    entries: HashMap<ResourceKey, RoutingEntry>,
}

/// A compiled policy.
#[derive(Clone)]
pub struct RoutingEntry {
    handler: SharedAuthorize,
    fingerprint: String,
}

// === impl RoutingTable ===

impl RoutingTable {
    pub fn new(
        generation: u64,
        entries: impl IntoIterator<Item = (ResourceKey, RoutingEntry)>,
    ) -> Self {
        Self {
            generation,
            entries: entries.into_iter().collect(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, key: &str) -> Option<&RoutingEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.entries.keys()
    }
}

impl fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = self.entries.keys().map(|k| k.as_str()).collect::<Vec<_>>();
        keys.sort_unstable();
        f.debug_struct("RoutingTable")
            .field("generation", &self.generation)
            .field("keys", &keys)
            .finish()
    }
}

// === impl RoutingEntry ===

impl RoutingEntry {
    pub fn new(handler: SharedAuthorize, fingerprint: String) -> Self {
        Self {
            handler,
            fingerprint,
        }
    }

    pub fn handler(&self) -> &SharedAuthorize {
        &self.handler
    }

    /// The hash of the spec the handler was compiled from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for RoutingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingEntry")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}
