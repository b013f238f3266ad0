//! Owned reduction cache keyed by request fingerprint
//!
//! The reducers never cache on their own. A consumer that wants to skip
//! recomputation for identical requests owns one of these explicitly.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::constants::cache::DEFAULT_CACHE_ENTRIES;
use crate::error::Result;
use crate::pipeline::{ReductionRequest, ReductionResult};

/// Deterministic key for a request's full content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn of(request: &ReductionRequest) -> Self {
        let mut hasher = DefaultHasher::new();
        request.strategy.hash(&mut hasher);
        request.target_count.hash(&mut hasher);
        request.sampling_enabled.hash(&mut hasher);
        request.series.series_count().hash(&mut hasher);
        for series in request.series.iter() {
            series.label.hash(&mut hasher);
            series.len().hash(&mut hasher);
            for sample in &series.samples {
                sample.timestamp.to_bits().hash(&mut hasher);
                sample.value.to_bits().hash(&mut hasher);
            }
        }
        Self(hasher.finish())
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Bounded cache of reduction results
pub struct ReductionCache {
    entries: HashMap<Fingerprint, (u64, Arc<ReductionResult>)>,
    max_entries: usize,
    tick: u64,
}

impl ReductionCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            tick: 0,
        }
    }

    pub fn get(&self, key: &Fingerprint) -> Option<Arc<ReductionResult>> {
        self.entries.get(key).map(|(_, result)| Arc::clone(result))
    }

    pub fn insert(&mut self, key: Fingerprint, result: ReductionResult) -> Arc<ReductionResult> {
        if !self.entries.contains_key(&key) {
            self.enforce_limit();
        }
        self.tick += 1;
        let result = Arc::new(result);
        self.entries.insert(key, (self.tick, Arc::clone(&result)));
        result
    }

    /// Return the cached result for `request`, or compute and store it.
    /// Errors are returned without being cached.
    pub fn get_or_compute<F>(&mut self, request: &ReductionRequest, compute: F) -> Result<Arc<ReductionResult>>
    where
        F: FnOnce() -> Result<ReductionResult>,
    {
        let key = Fingerprint::of(request);
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        Ok(self.insert(key, compute()?))
    }

    /// Clear all cached results
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// When full, drop the older half by insertion order
    fn enforce_limit(&mut self) {
        if self.entries.len() < self.max_entries {
            return;
        }

        let mut by_age: Vec<(u64, Fingerprint)> =
            self.entries.iter().map(|(key, (tick, _))| (*tick, *key)).collect();
        by_age.sort_unstable_by_key(|(tick, _)| *tick);

        let evict = (self.entries.len() / 2).max(1);
        for (_, key) in by_age.into_iter().take(evict) {
            self.entries.remove(&key);
        }
    }
}

impl Default for ReductionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ENTRIES)
    }
}
