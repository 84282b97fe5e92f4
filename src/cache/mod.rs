//! # Response Cache
//!
//! Bounded caches for API responses and downloaded blobs, sharing one
//! recency-list engine.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ApiCache`] | Response cache keyed by `(scope, collection, resource, verb)` |
//! | [`BlobCache`] | URL-keyed cache of files on disk |
//! | [`BlobStore`] | Disk operations used by [`BlobCache`]; [`FsBlobStore`] is the default |
//! | [`HierarchicalIndex`] | Four-level nested map with cascading, pruning invalidation |
//! | [`RecencyList`] | Arena-backed doubly linked list of keys, oldest at the head |
//! | [`ApiCacheKey`] | Full response key, also buildable from a route template |
//! | [`Validators`] | `ETag` / `Last-Modified` pair returned with every hit |
//! | [`CacheStats`] | Hit, miss, set, eviction and invalidation counters |
//!
//! ## Recency
//!
//! New entries are appended at the tail and the head is evicted first. A hit
//! does not move its entry to the tail: it swaps it with its successor, one
//! slot per hit. An entry must be touched repeatedly to stay clear of the
//! head.
//!
//! ## Example
//!
//! ```rust
//! use kea_cache::cache::{ApiCache, Validators, Verb};
//!
//! let mut cache = ApiCache::new(2);
//! cache.set("octocat", "hello", "/pulls", Verb::Get, "pulls", Validators::new());
//! cache.set("octocat", "hello", "/commits", Verb::Get, "commits", Validators::new());
//! cache.set("octocat", "hello", "/files", Verb::Get, "files", Validators::new());
//!
//! assert_eq!(cache.len(), 2);
//! assert!(cache.get("octocat", "hello", "/pulls", Verb::Get).is_none());
//!
//! let removed = cache.invalidate("octocat", Some("hello"), None, None).unwrap();
//! assert_eq!(removed.len(), 2);
//! ```

mod api;
mod blob;
mod index;
mod key;
mod list;
mod stats;
mod validators;

pub use api::{ApiCache, CacheValue};
pub use blob::{
    blob_group, BlobCache, BlobStat, BlobStore, BlobValue, FsBlobStore, HOSTS_GROUP, LOCAL_GROUP,
};
pub use index::{
    CollectionMap, Descent, Entry, HierarchicalIndex, ResourceMap, ScopeMap, VerbMap,
};
pub use key::{ApiCacheKey, KeyLevel, KeyPath, Verb};
pub use list::{NodeId, RecencyList};
pub use stats::CacheStats;
pub use validators::Validators;
