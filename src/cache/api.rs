//! Response cache over the hierarchical index.

use super::index::HierarchicalIndex;
use super::key::{ApiCacheKey, KeyPath, Verb};
use super::list::RecencyList;
use super::stats::CacheStats;
use super::validators::Validators;
use crate::config::CacheConfig;
use crate::Result;
use tracing::{debug, info, warn};

/// What a cache hit hands back: the payload and the validators it was
/// stored with, both unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValue<T> {
    pub payload: T,
    pub validators: Validators,
}

/// Bounded response cache keyed by `(scope, collection, resource, verb)`.
///
/// Every `set` may evict at most one entry, the head of the recency list.
/// A hit moves its entry one slot away from the head rather than all the
/// way to the tail.
///
/// The cache has a single owner; methods take `&mut self` and there is no
/// internal locking.
pub struct ApiCache<T> {
    index: HierarchicalIndex<T>,
    list: RecencyList<ApiCacheKey>,
    max_size: usize,
    stats: CacheStats,
}

impl<T> std::fmt::Debug for ApiCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCache")
            .field("len", &self.index.len())
            .field("max_size", &self.max_size)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<T> ApiCache<T> {
    /// A zero capacity is raised to one.
    pub fn new(max_size: usize) -> Self {
        Self {
            index: HierarchicalIndex::new(),
            list: RecencyList::new(),
            max_size: max_size.max(1),
            stats: CacheStats::default(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.max_size))
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Takes effect on the next `set`. Shrinking does not evict eagerly.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Keys from the next eviction candidate to the most recently inserted.
    pub fn keys(&self) -> Vec<ApiCacheKey> {
        self.list.keys()
    }

    pub fn set(
        &mut self,
        scope: &str,
        collection: &str,
        resource: &str,
        verb: Verb,
        payload: T,
        validators: Validators,
    ) {
        self.set_key(
            ApiCacheKey::new(scope, collection, resource, verb),
            payload,
            validators,
        );
    }

    pub fn set_key(&mut self, key: ApiCacheKey, payload: T, validators: Validators) {
        debug!(key = %key, "cache set");
        self.index.upsert(key, payload, validators, &mut self.list);
        self.stats.sets += 1;
        self.evict();
    }

    /// Remove every entry under the given prefix and return their keys.
    ///
    /// The prefix ends at the first `None`. Fails with `NotFound` naming the
    /// level that does not resolve; nothing is removed in that case.
    pub fn invalidate(
        &mut self,
        scope: &str,
        collection: Option<&str>,
        resource: Option<&str>,
        verb: Option<Verb>,
    ) -> Result<Vec<ApiCacheKey>> {
        self.invalidate_path(KeyPath::new(scope, collection, resource, verb))
    }

    pub fn invalidate_key(&mut self, key: &ApiCacheKey) -> Result<Vec<ApiCacheKey>> {
        self.invalidate_path(key.path())
    }

    fn invalidate_path(&mut self, path: KeyPath<'_>) -> Result<Vec<ApiCacheKey>> {
        let removed = self.index.invalidate(path)?;
        let keys: Vec<ApiCacheKey> = removed
            .into_iter()
            .map(|entry| {
                self.list.remove_node(entry.node);
                self.list.release(entry.node);
                entry.key
            })
            .collect();

        self.stats.invalidations += keys.len() as u64;
        if keys.len() > 1 {
            info!(
                scope = path.scope,
                level = %path.granularity(),
                removed = keys.len(),
                "invalidated cache subtree"
            );
        }
        Ok(keys)
    }

    pub fn clear(&mut self) {
        let dropped = self.index.len();
        self.index.clear();
        self.list.clear();
        info!(dropped, "cache cleared");
    }

    fn evict(&mut self) {
        if self.index.len() <= self.max_size {
            return;
        }
        let Some(key) = self.list.remove_oldest() else {
            return;
        };

        match self.index.invalidate(key.path()) {
            Ok(removed) => {
                for entry in removed {
                    self.list.release(entry.node);
                }
                self.stats.evictions += 1;
                debug!(key = %key, "evicted oldest entry");
            }
            Err(e) => warn!(key = %key, error = %e, "evicted key was not in the index"),
        }
    }
}

impl<T: Clone> ApiCache<T> {
    /// Look up one entry. A hit moves the entry one slot toward the tail.
    pub fn get(
        &mut self,
        scope: &str,
        collection: &str,
        resource: &str,
        verb: Verb,
    ) -> Option<CacheValue<T>> {
        self.lookup(KeyPath::full(scope, collection, resource, verb))
    }

    pub fn get_key(&mut self, key: &ApiCacheKey) -> Option<CacheValue<T>> {
        self.lookup(key.path())
    }

    fn lookup(&mut self, path: KeyPath<'_>) -> Option<CacheValue<T>> {
        let hit = self.index.descend(path).entry.map(|entry| {
            (
                entry.node,
                CacheValue {
                    payload: entry.payload.clone(),
                    validators: entry.validators.clone(),
                },
            )
        });
        self.stats.record_lookup(hit.is_some());

        let Some((node, value)) = hit else {
            debug!(scope = path.scope, resource = path.resource, "cache miss");
            return None;
        };
        self.list.demote(node);
        debug!(scope = path.scope, resource = path.resource, "cache hit");
        Some(value)
    }
}
