//! Conditional Fetch Example
//!
//! Shows the request flow the cache is built for:
//! 1. Build a key from a route template
//! 2. On a hit, revalidate with `If-None-Match`
//! 3. On `304 Not Modified`, serve the cached payload
//! 4. Invalidate a whole repository after a write
//!
//! The "server" is a local function so the example runs offline.
//! Run with `RUST_LOG=kea_cache=debug` to see cache events.

use kea_cache::cache::{ApiCache, ApiCacheKey, BlobCache, Validators};
use kea_cache::CacheConfig;
use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_NONE_MATCH};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

/// Pretend GitHub: every resource has a fixed ETag.
fn fake_server(resource: &str, request: &HeaderMap) -> (u16, HeaderMap, String) {
    let tag = format!("\"{:x}\"", resource.len() * 7919);
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&tag) {
        headers.insert(ETAG, v);
    }
    let not_modified = request
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == tag);
    if not_modified {
        (304, headers, String::new())
    } else {
        (200, headers, format!("{{\"resource\":\"{}\"}}", resource))
    }
}

fn fetch(cache: &mut ApiCache<String>, key: &ApiCacheKey) -> String {
    let cached = cache.get_key(key);
    let request = cached
        .as_ref()
        .map(|hit| hit.validators.conditional_headers())
        .unwrap_or_default();

    let (status, headers, body) = fake_server(&key.resource, &request);
    match (status, cached) {
        (304, Some(hit)) => {
            println!("  304 {} (served from cache)", key);
            hit.payload
        }
        _ => {
            println!("  {} {} (fetched)", status, key);
            cache.set_key(key.clone(), body.clone(), Validators::from_headers(&headers));
            body
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "kea_cache=info".into()))
        .init();

    let config = CacheConfig::from_env()?;
    let mut cache: ApiCache<String> = ApiCache::from_config(&config)?;

    let params = HashMap::from([
        ("owner".to_string(), "octocat".to_string()),
        ("repo".to_string(), "hello-world".to_string()),
        ("pull_number".to_string(), "1347".to_string()),
    ]);
    let pull = ApiCacheKey::from_route("GET /repos/{owner}/{repo}/pulls/{pull_number}", &params)?;
    let files = ApiCacheKey::from_route(
        "GET /repos/{owner}/{repo}/pulls/{pull_number}/files",
        &params,
    )?;

    println!("First pass:");
    fetch(&mut cache, &pull);
    fetch(&mut cache, &files);

    println!("Second pass:");
    fetch(&mut cache, &pull);
    fetch(&mut cache, &files);

    let removed = cache.invalidate(&pull.scope, Some(&pull.collection), None, None)?;
    println!("Invalidated {} entries after a push", removed.len());

    let blob_dir = tempfile::tempdir()?;
    let mut blobs = BlobCache::from_config(&config.clone().with_blob_dir(blob_dir.path()))?;
    let url = "https://raw.githubusercontent.com/octocat/hello-world/main/README";
    let path = blobs.set(url, "Hello World!\n", Validators::new()).await;
    println!("Blob cached at {}", path.display());
    blobs.clear().await;

    println!("Stats: {:?}", cache.stats());
    Ok(())
}
