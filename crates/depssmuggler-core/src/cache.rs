//! The two-tier (memory + disk) cache shared by every ecosystem adapter.
//!
//! Mirrors the conditional-GET HTTP cache the original LSP tooling used,
//! extended with a disk tier (repodata and POM payloads routinely exceed
//! what's sane to keep resident) and a pending-request coalescer so that N
//! concurrent callers resolving the same coordinate trigger exactly one
//! network fetch.

use crate::error::{CoreError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

/// Validates that a URL uses HTTPS. Relaxed under `cfg(test)` so mockito's
/// plain-HTTP server can stand in for a registry.
#[inline]
fn ensure_https(url: &str) -> Result<()> {
    #[cfg(not(test))]
    if !url.starts_with("https://") {
        return Err(CoreError::CacheError(format!("URL must use HTTPS: {url}")));
    }
    #[cfg(test)]
    let _ = url;
    Ok(())
}

/// Where a [`TwoTierCache::fetch`] answer ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Memory,
    Disk,
    Network,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    body: Arc<Vec<u8>>,
    fetched_at: Instant,
    ttl: Duration,
}

impl MemoryEntry {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

/// On-disk sidecar metadata, written alongside the cached payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskMeta {
    fetched_at_epoch_ms: u64,
    ttl_seconds: u64,
    etag: Option<String>,
    last_modified: Option<String>,
    source_url: String,
    payload_size: u64,
}

impl DiskMeta {
    fn age(&self) -> Duration {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Duration::from_millis(now.saturating_sub(self.fetched_at_epoch_ms))
    }

    fn is_fresh(&self) -> bool {
        self.age() < Duration::from_secs(self.ttl_seconds)
    }
}

/// Per-call tuning for [`TwoTierCache::fetch`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// How long a memory-tier hit stays fresh. `None` skips the memory tier
    /// entirely (large payloads, e.g. Conda repodata, are disk-only).
    pub memory_ttl: Option<Duration>,
    pub disk_ttl: Duration,
    /// Bypass both tiers and always hit the network.
    pub force: bool,
}

impl FetchOptions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            memory_ttl: Some(ttl),
            disk_ttl: ttl,
            force: false,
        }
    }

    pub fn disk_only(ttl: Duration) -> Self {
        Self {
            memory_ttl: None,
            disk_ttl: ttl,
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Unified fetch-with-cache contract used by every adapter. Keys are
/// adapter-chosen cache identities (not necessarily the URL itself, e.g.
/// `conda:conda-forge:linux-64:repodata`); `url` is always the network
/// location used for the underlying GET and for conditional revalidation.
pub struct TwoTierCache {
    memory: DashMap<String, MemoryEntry>,
    pending: DashMap<String, Arc<Notify>>,
    disk_dir: Option<PathBuf>,
    client: Client,
}

impl TwoTierCache {
    pub fn new(disk_dir: Option<PathBuf>) -> Self {
        let client = Client::builder()
            .user_agent(concat!("depssmuggler/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self::with_client(disk_dir, client)
    }

    pub fn with_client(disk_dir: Option<PathBuf>, client: Client) -> Self {
        Self {
            memory: DashMap::new(),
            pending: DashMap::new(),
            disk_dir,
            client,
        }
    }

    /// Resolves `key` through memory, then disk, then network, per the
    /// cache contract: memory hit if fresh; otherwise await any in-flight
    /// coalesced fetch; otherwise a fresh-enough disk entry; otherwise a
    /// conditional (or cold) network GET, persisted to disk and memory on
    /// success, with a stale-disk fallback on network failure.
    pub async fn fetch(&self, key: &str, url: &str, opts: &FetchOptions) -> Result<(Arc<Vec<u8>>, CacheSource)> {
        loop {
            if !opts.force {
                if let Some(hit) = self.memory_hit(key) {
                    return Ok((hit, CacheSource::Memory));
                }
            }

            let (is_leader, notify) = match self.pending.entry(key.to_string()) {
                Entry::Occupied(e) => (false, e.get().clone()),
                Entry::Vacant(v) => {
                    let notify = Arc::new(Notify::new());
                    v.insert(notify.clone());
                    (true, notify)
                }
            };

            if !is_leader {
                notify.notified().await;
                continue;
            }

            let result = self.fetch_as_leader(key, url, opts).await;
            self.pending.remove(key);
            notify.notify_waiters();
            return result;
        }
    }

    fn memory_hit(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let entry = self.memory.get(key)?;
        if entry.is_fresh() {
            Some(Arc::clone(&entry.body))
        } else {
            None
        }
    }

    async fn fetch_as_leader(&self, key: &str, url: &str, opts: &FetchOptions) -> Result<(Arc<Vec<u8>>, CacheSource)> {
        let disk_meta = if opts.force { None } else { self.read_disk_meta(key) };

        if let Some(meta) = &disk_meta {
            if meta.is_fresh() {
                if let Some(body) = self.read_disk_payload(key) {
                    let body = Arc::new(body);
                    self.populate_memory(key, &body, opts);
                    return Ok((body, CacheSource::Disk));
                }
            }
        }

        match self.conditional_fetch(key, url, disk_meta.as_ref()).await {
            Ok(FetchOutcome::NotModified) => {
                let meta = disk_meta.expect("304 only returned when a stale disk entry was sent");
                let body = self
                    .read_disk_payload(key)
                    .map(Arc::new)
                    .ok_or_else(|| CoreError::CacheError(format!("disk payload missing for revalidated key {key}")))?;
                self.write_disk(key, url, &body, opts.disk_ttl, meta.etag, meta.last_modified);
                self.populate_memory(key, &body, opts);
                Ok((body, CacheSource::Disk))
            }
            Ok(FetchOutcome::Fresh { body, etag, last_modified }) => {
                self.write_disk(key, url, &body, opts.disk_ttl, etag, last_modified);
                self.populate_memory(key, &body, opts);
                Ok((body, CacheSource::Network))
            }
            Err(err) => {
                if let Some(body) = self.read_disk_payload(key) {
                    tracing::warn!(%key, error = %err, "network fetch failed, serving stale disk entry");
                    return Ok((Arc::new(body), CacheSource::Disk));
                }
                Err(err)
            }
        }
    }

    fn populate_memory(&self, key: &str, body: &Arc<Vec<u8>>, opts: &FetchOptions) {
        let Some(ttl) = opts.memory_ttl else { return };
        self.memory.insert(
            key.to_string(),
            MemoryEntry {
                body: Arc::clone(body),
                fetched_at: Instant::now(),
                ttl,
            },
        );
    }

    async fn conditional_fetch(&self, key: &str, url: &str, stale: Option<&DiskMeta>) -> Result<FetchOutcome> {
        ensure_https(url)?;
        let mut request = self.client.get(url);
        if let Some(meta) = stale {
            if let Some(etag) = &meta.etag {
                request = request.header(header::IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &meta.last_modified {
                request = request.header(header::IF_MODIFIED_SINCE, last_modified);
            }
        }

        let response = request.send().await.map_err(|source| CoreError::NetworkError {
            url: url.to_string(),
            source,
        })?;

        if response.status() == StatusCode::NOT_MODIFIED {
            tracing::debug!(%key, "304 not modified");
            return Ok(FetchOutcome::NotModified);
        }

        if !response.status().is_success() {
            return Err(CoreError::CacheError(format!(
                "HTTP {} for {url}",
                response.status()
            )));
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = response.bytes().await.map_err(|source| CoreError::NetworkError {
            url: url.to_string(),
            source,
        })?;

        Ok(FetchOutcome::Fresh {
            body: Arc::new(bytes.to_vec()),
            etag,
            last_modified,
        })
    }

    fn disk_paths(&self, key: &str) -> Option<(PathBuf, PathBuf)> {
        let dir = self.disk_dir.as_ref()?;
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let hashed = hex::encode(hasher.finalize());
        Some((dir.join(format!("{hashed}.data")), dir.join(format!("{hashed}.meta.json"))))
    }

    fn read_disk_meta(&self, key: &str) -> Option<DiskMeta> {
        let (_, meta_path) = self.disk_paths(key)?;
        let raw = std::fs::read(&meta_path).ok()?;
        serde_json::from_slice(&raw).ok()
    }

    fn read_disk_payload(&self, key: &str) -> Option<Vec<u8>> {
        let (data_path, meta_path) = self.disk_paths(key)?;
        if !meta_path.exists() {
            return None;
        }
        std::fs::read(&data_path).ok()
    }

    fn write_disk(
        &self,
        key: &str,
        source_url: &str,
        body: &[u8],
        ttl: Duration,
        etag: Option<String>,
        last_modified: Option<String>,
    ) {
        let Some((data_path, meta_path)) = self.disk_paths(key) else { return };
        let Some(dir) = data_path.parent() else { return };
        if let Err(err) = std::fs::create_dir_all(dir) {
            tracing::warn!(%key, error = %err, "failed to create cache directory");
            return;
        }

        let meta = DiskMeta {
            fetched_at_epoch_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            ttl_seconds: ttl.as_secs(),
            etag,
            last_modified,
            source_url: source_url.to_string(),
            payload_size: body.len() as u64,
        };

        if let Err(err) = atomic_write(&data_path, body) {
            tracing::warn!(%key, error = %err, "failed to persist cache payload");
            return;
        }
        match serde_json::to_vec_pretty(&meta) {
            Ok(json) => {
                if let Err(err) = atomic_write(&meta_path, &json) {
                    tracing::warn!(%key, error = %err, "failed to persist cache metadata");
                }
            }
            Err(err) => tracing::warn!(%key, error = %err, "failed to serialize cache metadata"),
        }
    }

    pub fn clear(&self) {
        self.memory.clear();
        if let Some(dir) = &self.disk_dir {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }
}

enum FetchOutcome {
    NotModified,
    Fresh {
        body: Arc<Vec<u8>>,
        etag: Option<String>,
        last_modified: Option<String>,
    },
}

/// Writes `contents` to a temp file in the same directory as `path`, then
/// renames it into place, so a crash mid-write never leaves a torn payload
/// whose sidecar metadata claims it is complete.
fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("cache"),
        std::process::id()
    ));
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_fresh_then_memory_hit_makes_one_network_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/data")
            .with_status(200)
            .with_body("hello")
            .expect(1)
            .create_async()
            .await;

        let cache = TwoTierCache::new(None);
        let url = format!("{}/data", server.url());
        let opts = FetchOptions::new(Duration::from_secs(60));

        let (body1, source1) = cache.fetch("k", &url, &opts).await.unwrap();
        assert_eq!(&**body1, b"hello");
        assert_eq!(source1, CacheSource::Network);

        let (body2, source2) = cache.fetch("k", &url, &opts).await.unwrap();
        assert_eq!(&**body2, b"hello");
        assert_eq!(source2, CacheSource::Memory);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn concurrent_cold_fetches_coalesce_to_one_network_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/data")
            .with_status(200)
            .with_body("hello")
            .expect(1)
            .create_async()
            .await;

        let cache = Arc::new(TwoTierCache::new(None));
        let url = format!("{}/data", server.url());
        let opts = FetchOptions::new(Duration::from_secs(60));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let url = url.clone();
            let opts = opts.clone();
            handles.push(tokio::spawn(async move { cache.fetch("k", &url, &opts).await }));
        }

        for handle in handles {
            let (body, _) = handle.await.unwrap().unwrap();
            assert_eq!(&**body, b"hello");
        }

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn disk_tier_survives_memory_eviction_and_revalidates() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        let _m1 = server
            .mock("GET", "/data")
            .with_status(200)
            .with_header("etag", "\"v1\"")
            .with_body("original")
            .create_async()
            .await;

        let cache = TwoTierCache::new(Some(dir.path().to_path_buf()));
        let url = format!("{}/data", server.url());
        let cold_opts = FetchOptions {
            memory_ttl: None,
            disk_ttl: Duration::from_millis(0),
            force: false,
        };

        let (body, source) = cache.fetch("k", &url, &cold_opts).await.unwrap();
        assert_eq!(&**body, b"original");
        assert_eq!(source, CacheSource::Network);

        let _m2 = server
            .mock("GET", "/data")
            .match_header("if-none-match", "\"v1\"")
            .with_status(304)
            .create_async()
            .await;

        let (body2, source2) = cache.fetch("k", &url, &cold_opts).await.unwrap();
        assert_eq!(&**body2, b"original");
        assert_eq!(source2, CacheSource::Disk);
    }

    #[tokio::test]
    async fn network_failure_falls_back_to_stale_disk_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TwoTierCache::new(Some(dir.path().to_path_buf()));
        cache.write_disk(
            "k",
            "http://unreachable.invalid/data",
            b"stale payload",
            Duration::from_secs(0),
            None,
            None,
        );

        let opts = FetchOptions::disk_only(Duration::from_secs(0));
        let (body, source) = cache
            .fetch("k", "http://unreachable.invalid/data", &opts)
            .await
            .unwrap();
        assert_eq!(&**body, b"stale payload");
        assert_eq!(source, CacheSource::Disk);
    }

    #[test]
    fn force_option_bypasses_tiers() {
        let opts = FetchOptions::new(Duration::from_secs(60)).forced();
        assert!(opts.force);
    }

    #[test]
    fn clear_empties_memory_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TwoTierCache::new(Some(dir.path().to_path_buf()));
        cache.write_disk("k", "http://x/data", b"x", Duration::from_secs(60), None, None);
        cache.memory.insert(
            "k".into(),
            MemoryEntry {
                body: Arc::new(vec![1]),
                fetched_at: Instant::now(),
                ttl: Duration::from_secs(60),
            },
        );
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert!(cache.read_disk_payload("k").is_none());
    }
}
