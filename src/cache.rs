//! Memoization of enriched feeds, keyed on input identity.
//!
//! The enrichment for each [`InputKey`] is kept, random draws included,
//! until [`EnrichmentCache::invalidate`] is called on upload.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use crate::gtfs::InputKey;
use crate::pipeline::Enrichment;

#[derive(Debug, Default)]
pub struct EnrichmentCache {
    entries: FxHashMap<InputKey, Arc<Enrichment>>,
    hits: u64,
    misses: u64,
}

impl EnrichmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: InputKey) -> Option<Arc<Enrichment>> {
        self.entries.get(&key).cloned()
    }

    /// Returns the cached enrichment for `key`, running `load` on a miss.
    ///
    /// A failed load leaves the cache untouched.
    pub fn get_or_try_insert_with<F, E>(
        &mut self,
        key: InputKey,
        load: F,
    ) -> Result<Arc<Enrichment>, E>
    where
        F: FnOnce() -> Result<Enrichment, E>,
    {
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            debug!(key = key.0, "Enrichment cache hit");
            return Ok(Arc::clone(hit));
        }

        self.misses += 1;
        debug!(key = key.0, "Enrichment cache miss");
        let loaded = Arc::new(load()?);
        self.entries.insert(key, Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Drops every cached enrichment.
    pub fn invalidate(&mut self) {
        debug!(entries = self.entries.len(), "Invalidating enrichment cache");
        self.entries.clear();
    }

    pub fn invalidate_key(&mut self, key: InputKey) -> bool {
        self.entries.remove(&key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
