//! Blob cache: a URL-keyed LRU over files on disk.
//!
//! In-memory bookkeeping always completes before the disk is touched. Disk
//! failures are logged and swallowed, so a file may be stale or missing but
//! the index and recency list stay consistent.

use super::list::{NodeId, RecencyList};
use super::stats::CacheStats;
use super::validators::Validators;
use crate::config::CacheConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Group for keys that are not absolute URLs with a host.
pub const LOCAL_GROUP: &str = "_local";
/// Parent directory of the per-host groups used for non-GitHub URLs.
pub const HOSTS_GROUP: &str = "_hosts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobStat {
    pub is_file: bool,
    pub len: u64,
}

/// File operations the blob cache needs. Every call may fail.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` to `path`, creating parent directories.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
    async fn stat(&self, path: &Path) -> Result<BlobStat>;
    async fn delete(&self, path: &Path) -> Result<()>;
    /// Recursively delete a directory.
    async fn delete_dir(&self, path: &Path) -> Result<()>;
}

#[async_trait]
impl<S: BlobStore + ?Sized> BlobStore for Arc<S> {
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        (**self).write(path, bytes).await
    }

    async fn stat(&self, path: &Path) -> Result<BlobStat> {
        (**self).stat(path).await
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        (**self).delete(path).await
    }

    async fn delete_dir(&self, path: &Path) -> Result<()> {
        (**self).delete_dir(path).await
    }
}

/// [`BlobStore`] over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsBlobStore;

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<BlobStat> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(BlobStat {
            is_file: meta.is_file(),
            len: meta.len(),
        })
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path).await?;
        Ok(())
    }

    async fn delete_dir(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_dir_all(path).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct BlobEntry {
    group: String,
    path: PathBuf,
    validators: Validators,
    node: NodeId,
}

/// A blob cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobValue {
    pub path: PathBuf,
    pub validators: Validators,
}

pub struct BlobCache<S = FsBlobStore> {
    root: PathBuf,
    entries: HashMap<String, BlobEntry>,
    list: RecencyList<String>,
    max_size: usize,
    store: S,
    stats: CacheStats,
}

impl BlobCache<FsBlobStore> {
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.blob_dir.clone(),
            config.blob_max_size,
            FsBlobStore,
        ))
    }
}

impl<S: BlobStore> BlobCache<S> {
    /// A zero capacity is raised to one.
    pub fn new(root: impl Into<PathBuf>, max_size: usize, store: S) -> Self {
        Self {
            root: root.into(),
            entries: HashMap::new(),
            list: RecencyList::new(),
            max_size: max_size.max(1),
            store,
            stats: CacheStats::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// URLs from the next eviction candidate to the most recently inserted.
    pub fn urls(&self) -> Vec<String> {
        self.list.keys()
    }

    /// Where the file for `url` lives: `<root>/<group>/<sha256(url)>`.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.group_dir(&blob_group(url)).join(file_name(url))
    }

    fn group_dir(&self, group: &str) -> PathBuf {
        group
            .split('/')
            .fold(self.root.clone(), |dir, segment| dir.join(segment))
    }

    /// Look up `url`. A hit moves the entry one slot toward the tail.
    ///
    /// The backing file is checked: something other than a regular file at
    /// the path is a miss, while a failed check still returns the entry.
    pub async fn get(&mut self, url: &str) -> Option<BlobValue> {
        let hit = self
            .entries
            .get(url)
            .map(|e| (e.node, e.path.clone(), e.validators.clone()));

        let Some((node, path, validators)) = hit else {
            self.stats.record_lookup(false);
            debug!(url, "blob cache miss");
            return None;
        };
        self.list.demote(node);

        match self.store.stat(&path).await {
            Ok(stat) if !stat.is_file => {
                self.stats.record_lookup(false);
                warn!(url, path = %path.display(), "cached blob is not a regular file");
                return None;
            }
            Ok(_) => debug!(url, "blob cache hit"),
            Err(e) => warn!(url, path = %path.display(), error = %e, "failed to stat cached blob"),
        }
        self.stats.record_lookup(true);
        Some(BlobValue { path, validators })
    }

    /// Cache `data` for `url` and return the file path.
    ///
    /// The entry is recorded (and one eviction run) before the file is
    /// written; a failed write is logged and the entry kept.
    pub async fn set(
        &mut self,
        url: &str,
        data: impl Into<Bytes>,
        validators: Validators,
    ) -> PathBuf {
        let data = data.into();
        let path = match self.entries.get_mut(url) {
            Some(entry) => {
                entry.validators = validators;
                self.list.demote(entry.node);
                entry.path.clone()
            }
            None => {
                let path = self.path_for(url);
                let node = self.list.alloc(url.to_string());
                self.list.add(node);
                self.entries.insert(
                    url.to_string(),
                    BlobEntry {
                        group: blob_group(url),
                        path: path.clone(),
                        validators,
                        node,
                    },
                );
                path
            }
        };
        self.stats.sets += 1;
        self.evict().await;

        match self.store.write(&path, &data).await {
            Ok(()) => debug!(url, path = %path.display(), bytes = data.len(), "blob written"),
            Err(e) => warn!(url, path = %path.display(), error = %e, "failed to write blob"),
        }
        path
    }

    /// Drop `url` and delete its file. Returns whether an entry existed.
    pub async fn invalidate(&mut self, url: &str) -> bool {
        let Some(entry) = self.entries.remove(url) else {
            return false;
        };
        self.list.remove_node(entry.node);
        self.list.release(entry.node);
        self.stats.invalidations += 1;
        self.delete_file(url, &entry.path).await;
        true
    }

    /// Drop every file of one GitHub repository and delete its directory.
    /// Returns the number of entries removed.
    pub async fn invalidate_repo(&mut self, owner: &str, repo: &str) -> usize {
        self.invalidate_group(&format!("{}/{}", owner, repo)).await
    }

    /// Drop every entry in `group` (see [`blob_group`]) and delete the
    /// group directory. Returns the number of entries removed.
    pub async fn invalidate_group(&mut self, group: &str) -> usize {
        let urls: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.group == group)
            .map(|(url, _)| url.clone())
            .collect();
        for url in &urls {
            if let Some(entry) = self.entries.remove(url) {
                self.list.remove_node(entry.node);
                self.list.release(entry.node);
            }
        }
        self.stats.invalidations += urls.len() as u64;
        if urls.is_empty() {
            return 0;
        }

        let dir = self.group_dir(group);
        if let Err(e) = self.store.delete_dir(&dir).await {
            log_disk_failure(&dir, &e, "failed to delete group directory");
        }
        info!(group, removed = urls.len(), "invalidated blob group");
        urls.len()
    }

    /// Drop everything, then delete the cache directory.
    pub async fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.list.clear();
        if let Err(e) = self.store.delete_dir(&self.root).await {
            log_disk_failure(&self.root, &e, "failed to delete blob cache directory");
        }
        info!(dropped, root = %self.root.display(), "blob cache cleared");
    }

    async fn evict(&mut self) {
        if self.entries.len() <= self.max_size {
            return;
        }
        let Some(url) = self.list.remove_oldest() else {
            return;
        };
        let Some(entry) = self.entries.remove(&url) else {
            warn!(url, "evicted blob was not in the index");
            return;
        };
        self.list.release(entry.node);
        self.stats.evictions += 1;
        debug!(url, "evicted oldest blob");
        self.delete_file(&url, &entry.path).await;
    }

    async fn delete_file(&self, url: &str, path: &Path) {
        match self.store.delete(path).await {
            Ok(()) => debug!(url, path = %path.display(), "blob deleted"),
            Err(e) => log_disk_failure(path, &e, "failed to delete blob"),
        }
    }
}

fn log_disk_failure(path: &Path, err: &Error, msg: &str) {
    match err {
        Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "{}: already gone", msg)
        }
        _ => warn!(path = %path.display(), error = %err, "{}", msg),
    }
}

/// The directory group a URL's file is stored under.
///
/// GitHub URLs group by repository as `<owner>/<repo>`:
/// - `https://api.github.com/repos/{owner}/{repo}/...`
/// - `https://raw.githubusercontent.com/{owner}/{repo}/...`
/// - `https://github.com/{owner}/{repo}/...`
///
/// Other URLs group by host as `_hosts/<host>`; keys that are not URLs with
/// a host use `_local`.
pub fn blob_group(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return LOCAL_GROUP.to_string();
    };
    let Some(host) = parsed.host_str().filter(|h| is_dir_segment(h)) else {
        return LOCAL_GROUP.to_string();
    };
    let mut segments = parsed
        .path_segments()
        .map(|s| s.collect::<Vec<_>>())
        .unwrap_or_default();
    let repo_path = match host {
        "api.github.com" if segments.first() == Some(&"repos") => {
            segments.remove(0);
            true
        }
        "raw.githubusercontent.com" | "github.com" => true,
        _ => false,
    };
    if repo_path {
        if let [owner, repo, ..] = segments.as_slice() {
            if is_dir_segment(owner) && is_dir_segment(repo) {
                return format!("{}/{}", owner, repo);
            }
        }
    }
    format!("{}/{}", HOSTS_GROUP, host)
}

fn is_dir_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\')
}

fn file_name(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PULL: &str = "https://api.github.com/repos/o/r/pulls/1";
    const BLOB: &str = "https://raw.githubusercontent.com/o/r/main/README.md";

    /// Store whose every operation fails.
    struct FailingStore;

    #[async_trait]
    impl BlobStore for FailingStore {
        async fn write(&self, _: &Path, _: &[u8]) -> Result<()> {
            Err(std::io::Error::other("disk full").into())
        }
        async fn stat(&self, _: &Path) -> Result<BlobStat> {
            Err(std::io::Error::other("stat failed").into())
        }
        async fn delete(&self, _: &Path) -> Result<()> {
            Err(std::io::Error::other("permission denied").into())
        }
        async fn delete_dir(&self, _: &Path) -> Result<()> {
            Err(std::io::Error::other("permission denied").into())
        }
    }

    #[test]
    fn test_path_layout() {
        let cache = BlobCache::new("/cache", 4, FsBlobStore);
        let path = cache.path_for(PULL);
        assert!(path.starts_with("/cache/o/r"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 64);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(cache.path_for(PULL), cache.path_for(BLOB));

        assert!(cache.path_for("https://h.test/x").starts_with("/cache/_hosts/h.test"));
        assert!(cache.path_for("not a url").starts_with("/cache/_local"));
    }

    #[test]
    fn test_blob_group() {
        assert_eq!(blob_group(PULL), "o/r");
        assert_eq!(blob_group(BLOB), "o/r");
        assert_eq!(blob_group("https://github.com/o/r/archive/main.zip"), "o/r");
        assert_eq!(blob_group("https://api.github.com/users/o"), "_hosts/api.github.com");
        assert_eq!(
            blob_group("https://raw.githubusercontent.com/o"),
            "_hosts/raw.githubusercontent.com"
        );
        assert_eq!(
            blob_group("https://github.com/o/%2E%2E/x"),
            "_hosts/github.com"
        );
        assert_eq!(blob_group("https://cdn.test/a/b"), "_hosts/cdn.test");
        assert_eq!(blob_group("not a url"), LOCAL_GROUP);
    }

    #[tokio::test]
    async fn test_set_get_writes_file() {
        let dir = TempDir::new().unwrap();
        let mut cache = BlobCache::new(dir.path(), 4, FsBlobStore);

        let path = cache
            .set(BLOB, "hello", Validators::new().with_etag("\"e1\""))
            .await;
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "hello");

        let hit = cache.get(BLOB).await.unwrap();
        assert_eq!(hit.path, path);
        assert_eq!(hit.validators.etag.as_deref(), Some("\"e1\""));
        assert!(cache.get(PULL).await.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_rewrites_file() {
        let dir = TempDir::new().unwrap();
        let mut cache = BlobCache::new(dir.path(), 4, FsBlobStore);

        cache.set(BLOB, "v1", Validators::new()).await;
        let path = cache.set(BLOB, "v2", Validators::new().with_etag("2")).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "v2");
        assert_eq!(cache.urls(), vec![BLOB.to_string()]);
    }

    #[tokio::test]
    async fn test_eviction_deletes_oldest_file() {
        let dir = TempDir::new().unwrap();
        let mut cache = BlobCache::new(dir.path(), 2, FsBlobStore);

        let first = cache.set("https://h/1", "1", Validators::new()).await;
        cache.set("https://h/2", "2", Validators::new()).await;
        cache.set("https://h/3", "3", Validators::new()).await;

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("https://h/1"));
        assert!(!first.exists());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("blobs");
        let mut cache = BlobCache::new(&root, 4, FsBlobStore);

        let path = cache.set(PULL, "x", Validators::new()).await;
        assert!(cache.invalidate(PULL).await);
        assert!(!path.exists());
        assert!(!cache.invalidate(PULL).await);

        cache.set(PULL, "x", Validators::new()).await;
        cache.set(BLOB, "y", Validators::new()).await;
        cache.clear().await;
        assert!(cache.is_empty());
        assert!(!root.exists());
        assert!(cache.get(PULL).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_repo_keeps_other_repos_on_same_host() {
        let dir = TempDir::new().unwrap();
        let mut cache = BlobCache::new(dir.path(), 10, FsBlobStore);
        let one_a = "https://raw.githubusercontent.com/alice/one/main/a.txt";
        let one_b = "https://api.github.com/repos/alice/one/contents/b.txt";
        let two = "https://raw.githubusercontent.com/bob/two/main/a.txt";
        cache.set(one_a, "1", Validators::new()).await;
        cache.set(one_b, "2", Validators::new()).await;
        let kept = cache.set(two, "3", Validators::new()).await;

        assert_eq!(cache.invalidate_repo("alice", "one").await, 2);
        assert_eq!(cache.urls(), vec![two.to_string()]);
        assert!(!dir.path().join("alice").join("one").exists());
        assert_eq!(tokio::fs::read_to_string(&kept).await.unwrap(), "3");
        assert!(cache.get(two).await.is_some());
        assert_eq!(cache.invalidate_repo("alice", "one").await, 0);

        cache.set("https://cdn.test/x", "4", Validators::new()).await;
        assert_eq!(cache.invalidate_group("_hosts/cdn.test").await, 1);
        assert_eq!(cache.urls(), vec![two.to_string()]);
    }

    #[tokio::test]
    async fn test_get_misses_when_path_is_not_a_file() {
        let dir = TempDir::new().unwrap();
        let mut cache = BlobCache::new(dir.path(), 4, FsBlobStore);
        let path = cache.set(BLOB, "hello", Validators::new()).await;

        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::create_dir(&path).await.unwrap();

        assert!(cache.get(BLOB).await.is_none());
        assert!(cache.contains(BLOB));
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 0);
    }

    #[tokio::test]
    async fn test_disk_failures_are_swallowed() {
        let mut cache = BlobCache::new("/nowhere", 1, FailingStore);

        let path = cache.set(PULL, "x", Validators::new()).await;
        assert_eq!(path, cache.path_for(PULL));
        assert!(cache.contains(PULL));

        let hit = cache.get(PULL).await.unwrap();
        assert_eq!(hit.path, path);

        // Eviction still happens when the delete fails.
        cache.set(BLOB, "y", Validators::new()).await;
        assert_eq!(cache.urls(), vec![BLOB.to_string()]);

        assert!(cache.invalidate(BLOB).await);
        assert!(cache.is_empty());

        cache.set(PULL, "x", Validators::new()).await;
        cache.clear().await;
        assert!(cache.is_empty());
    }
}
