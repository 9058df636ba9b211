//! Cost-bounded tile cache with an eviction veto.
//!
//! The cache is shared by every survey of a given payload type and is sized by
//! a byte budget. Entries carry an explicit cost; when the total goes over
//! budget the least recently used entries are offered for eviction.
//!
//! # Eviction veto
//!
//! Every value implements [`Evict`]. Before an entry is dropped the cache asks
//! it to [`Evict::release`] itself; returning [`Release::Keep`] leaves it
//! resident and still counted against the budget. Tiles use this while a
//! background decode is in flight, or while their texture is still shared
//! with the renderer.
//!
//! ```
//! use skylayer::cache::{Evict, Release, TileCache};
//!
//! struct Blob(bool);
//! impl Evict for Blob {
//!     fn release(&mut self) -> Release {
//!         if self.0 { Release::Keep } else { Release::Free }
//!     }
//! }
//!
//! let mut cache = TileCache::new(100);
//! cache.put("pinned", Blob(true), 80).unwrap();
//! cache.put("loose", Blob(false), 80).unwrap();
//! // "pinned" was the eviction candidate but vetoed.
//! assert!(cache.contains(&"pinned"));
//! assert_eq!(cache.total_cost(), 160);
//! ```
//!
//! The cache is not synchronized: callers drive it from a single thread.

mod stats;

pub use stats::CacheStats;

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use thiserror::Error;
use tracing::{debug, trace};

/// Default budget shared by all survey tiles (256 MiB).
pub const DEFAULT_CACHE_BUDGET: u64 = 256 * 1024 * 1024;

/// Outcome of asking an entry to release itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The entry can be dropped.
    Free,
    /// The entry must stay resident for now.
    Keep,
}

/// Teardown hook run before an entry leaves the cache.
pub trait Evict {
    /// Prepare for eviction, or veto it by returning [`Release::Keep`].
    ///
    /// May be called repeatedly on the same entry.
    fn release(&mut self) -> Release;
}

/// Errors returned by cache mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// `put` was called on a key that is already resident.
    #[error("Key already present in cache")]
    KeyExists,
}

struct Slot<V> {
    value: V,
    cost: u64,
    tick: u64,
}

/// Keyed, cost-bounded store with recency-biased eviction.
pub struct TileCache<K, V> {
    entries: HashMap<K, Slot<V>>,
    /// Recency order: lowest tick is the least recently used entry.
    recency: BTreeMap<u64, K>,
    tick: u64,
    total_cost: u64,
    budget: u64,
    stats: CacheStats,
}

impl<K, V> TileCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Evict,
{
    /// Create an empty cache with the given budget.
    pub fn new(budget: u64) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            tick: 0,
            total_cost: 0,
            budget,
            stats: CacheStats::default(),
        }
    }

    /// Look up an entry and mark it as recently used.
    pub fn get(&mut self, key: &K) -> Option<&mut V> {
        let tick = self.next_tick();
        match self.entries.get_mut(key) {
            Some(slot) => {
                self.recency.remove(&slot.tick);
                slot.tick = tick;
                self.recency.insert(tick, key.clone());
                self.stats.hits += 1;
                Some(&mut slot.value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Look up an entry without touching recency or statistics.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Mutable lookup without touching recency or statistics.
    pub fn peek_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).map(|slot| &mut slot.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a new entry with the given cost.
    ///
    /// The key must not be resident; look it up with [`TileCache::get`]
    /// first. Other entries may be evicted to make room, but never the one
    /// just inserted.
    pub fn put(&mut self, key: K, value: V, cost: u64) -> Result<(), CacheError> {
        if self.entries.contains_key(&key) {
            return Err(CacheError::KeyExists);
        }
        let tick = self.next_tick();
        self.recency.insert(tick, key.clone());
        self.entries.insert(key.clone(), Slot { value, cost, tick });
        self.total_cost += cost;
        self.evict_over_budget(Some(&key));
        Ok(())
    }

    /// Update the cost of a resident entry.
    ///
    /// Returns `false` if the key is not resident.
    pub fn set_cost(&mut self, key: &K, cost: u64) -> bool {
        let Some(slot) = self.entries.get_mut(key) else {
            return false;
        };
        self.total_cost = self.total_cost - slot.cost + cost;
        slot.cost = cost;
        self.evict_over_budget(Some(key));
        true
    }

    /// Cost recorded for a resident entry.
    pub fn cost(&self, key: &K) -> Option<u64> {
        self.entries.get(key).map(|slot| slot.cost)
    }

    /// Evict one entry, honoring its veto.
    ///
    /// Returns `None` if the key is not resident, otherwise whether the entry
    /// was freed or kept.
    pub fn remove(&mut self, key: &K) -> Option<Release> {
        let slot = self.entries.get_mut(key)?;
        match slot.value.release() {
            Release::Keep => {
                self.stats.vetoes += 1;
                Some(Release::Keep)
            }
            Release::Free => {
                self.drop_entry(key);
                Some(Release::Free)
            }
        }
    }

    /// Evict every entry that does not veto.
    pub fn clear(&mut self) {
        let keys: Vec<K> = self.recency.values().cloned().collect();
        for key in keys {
            self.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the costs of all resident entries.
    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            total_cost: self.total_cost,
            ..self.stats
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn drop_entry(&mut self, key: &K) {
        if let Some(slot) = self.entries.remove(key) {
            self.recency.remove(&slot.tick);
            self.total_cost -= slot.cost;
            self.stats.evictions += 1;
        }
    }

    /// Walk entries from least to most recently used until the total fits.
    fn evict_over_budget(&mut self, protect: Option<&K>) {
        if self.total_cost <= self.budget {
            return;
        }
        let before = self.total_cost;
        let mut cursor = 0;
        while self.total_cost > self.budget {
            let Some((tick, key)) = self
                .recency
                .range(cursor..)
                .next()
                .map(|(tick, key)| (*tick, key.clone()))
            else {
                break;
            };
            cursor = tick + 1;
            if protect == Some(&key) {
                continue;
            }
            if let Some(Release::Keep) = self.remove(&key) {
                trace!("Eviction vetoed by resident entry");
            }
        }
        debug!(
            before,
            after = self.total_cost,
            budget = self.budget,
            "Tile cache eviction pass"
        );
    }
}
