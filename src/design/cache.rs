// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded cache of measurement designs.
//!
//! Designs are keyed by `(dimension, DesignSpec)` and handed out as
//! `Arc<MeasurementDesign>`. A design has no interior mutability, so a shared
//! handle cannot be used to alter what another caller sees; callers that
//! need a modified copy clone it.
//!
//! The cache is an explicit object: create one per process (or per batch) and
//! pass it by handle to whatever builds estimators.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{DesignSpec, MeasurementDesign};
use crate::error::{ConfigurationError, Result};

/// Default number of cached designs.
pub const DEFAULT_CAPACITY: usize = 32;

type Key = (usize, DesignSpec);

struct Entry {
    design: Arc<MeasurementDesign>,
    last_used: u64,
}

#[derive(Default)]
struct State {
    entries: HashMap<Key, Entry>,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that built a new design.
    pub misses: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
    /// Current number of entries.
    pub len: usize,
}

/// Least-recently-used cache of measurement designs.
///
/// Thread-safe; lookup-or-insert runs under a single mutex so concurrent
/// callers requesting the same key build it once.
///
/// # Example
///
/// ```
/// use qubit_os_tomography::design::{DesignCache, DesignSpec};
///
/// let cache = DesignCache::new(8).unwrap();
/// let a = cache.get(2, DesignSpec::mub()).unwrap();
/// let b = cache.get(2, DesignSpec::mub()).unwrap();
/// assert_eq!(a.operator_count(), 6);
/// assert_eq!(cache.stats().hits, 1);
/// # drop(b);
/// ```
pub struct DesignCache {
    capacity: usize,
    state: Mutex<State>,
}

impl DesignCache {
    /// Create a cache holding at most `capacity` designs.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ConfigurationError::invalid("cache.capacity", "must be > 0").into());
        }
        info!(capacity, "Creating design cache");
        Ok(Self {
            capacity,
            state: Mutex::new(State::default()),
        })
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fetch a design, building and inserting it on a miss.
    pub fn get(&self, dimension: usize, spec: DesignSpec) -> Result<Arc<MeasurementDesign>> {
        let key = (dimension, spec);
        let mut state = self.state.lock();
        state.clock += 1;
        let now = state.clock;

        if let Some(entry) = state.entries.get_mut(&key) {
            entry.last_used = now;
            let design = Arc::clone(&entry.design);
            state.hits += 1;
            debug!(dimension, design = %spec.name(), "Design cache hit");
            return Ok(design);
        }

        state.misses += 1;
        debug!(dimension, design = %spec.name(), "Design cache miss");
        let design = Arc::new(MeasurementDesign::build(dimension, spec)?);

        if state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k);
            if let Some(k) = oldest {
                state.entries.remove(&k);
                state.evictions += 1;
                debug!(dimension = k.0, design = %k.1.name(), "Evicted design");
            }
        }
        state.entries.insert(
            key,
            Entry {
                design: Arc::clone(&design),
                last_used: now,
            },
        );
        Ok(design)
    }

    /// Whether a design is currently cached.
    pub fn contains(&self, dimension: usize, spec: DesignSpec) -> bool {
        self.state.lock().entries.contains_key(&(dimension, spec))
    }

    /// Number of cached designs.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries. Counters are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let n = state.entries.len();
        state.entries.clear();
        info!(entries = n, "Cleared design cache");
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            len: state.entries.len(),
        }
    }
}

impl Default for DesignCache {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            state: Mutex::new(State::default()),
        }
    }
}

impl std::fmt::Debug for DesignCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesignCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}
