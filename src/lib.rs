//! # kea-cache
//!
//! Client-side response cache for a GitHub-backed API client.
//!
//! ## Overview
//!
//! Responses are stored under a hierarchical key `(scope, collection,
//! resource, verb)`, for GitHub `(owner, repo, endpoint, verb)`. The cache is
//! bounded by entry count: once a `set` pushes it over capacity the oldest
//! entry is evicted. Entries can be invalidated one at a time or a whole
//! subtree at once (every entry of a repository, or of one endpoint).
//!
//! Each hit returns the `ETag` / `Last-Modified` validators stored with the
//! payload so the caller can revalidate with a conditional request.
//!
//! ## Quick Start
//!
//! ```rust
//! use kea_cache::cache::{ApiCache, ApiCacheKey, Validators};
//! use std::collections::HashMap;
//!
//! # fn main() -> kea_cache::Result<()> {
//! let mut cache: ApiCache<String> = ApiCache::new(1000);
//!
//! let params = HashMap::from([
//!     ("owner".to_string(), "octocat".to_string()),
//!     ("repo".to_string(), "hello-world".to_string()),
//!     ("pull_number".to_string(), "7".to_string()),
//! ]);
//! let key = ApiCacheKey::from_route("GET /repos/{owner}/{repo}/pulls/{pull_number}", &params)?;
//!
//! cache.set_key(key.clone(), "{\"number\":7}".to_string(), Validators::new().with_etag("\"abc\""));
//! let hit = cache.get_key(&key).expect("just inserted");
//! assert_eq!(hit.validators.conditional_headers().len(), 1);
//!
//! cache.invalidate("octocat", Some("hello-world"), None, None)?;
//! assert!(cache.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Response and blob caches, index, recency list, keys |
//! | [`config`] | Capacities and blob directory, from code or `KEA_*` env vars |
//! | [`error`] | Error type and structured context |

pub mod cache;
pub mod config;

// Re-export main types for convenience
pub use cache::{ApiCache, ApiCacheKey, BlobCache, CacheValue, Validators, Verb};
pub use config::CacheConfig;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
