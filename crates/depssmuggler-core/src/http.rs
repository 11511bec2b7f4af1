//! The Registry Client Pool: one `reqwest::Client` per registry origin,
//! with connection reuse, split metadata/artifact timeouts, an
//! environment-controlled TLS-verification bypass for corporate-proxy
//! deployments, and a throttled stream-to-file helper for downloads.

use crate::error::{CoreError, Result};
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const ARTIFACT_TIMEOUT: Duration = Duration::from_secs(300);
const PROGRESS_MIN_INTERVAL: Duration = Duration::from_millis(300);

/// `DEPSSMUGGLER_STRICT_SSL=1` re-enables certificate verification. Default
/// is permissive, matching the deliberate air-gapped/corporate-proxy
/// trade-off called out in the operational docs.
fn strict_ssl_enabled() -> bool {
    std::env::var("DEPSSMUGGLER_STRICT_SSL")
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false)
}

/// Progress tick delivered to a download's `on_bytes` callback at most
/// every 300 ms.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTick {
    pub bytes_done: u64,
    pub bytes_total: Option<u64>,
    pub speed_bps: f64,
}

/// A pool of `reqwest::Client`s keyed by registry origin (scheme + host +
/// port), so connection reuse happens per-origin rather than globally
/// sharing one client's keep-alive pool across unrelated registries.
pub struct RegistryClientPool {
    clients: DashMap<String, Client>,
    strict_ssl: bool,
}

impl RegistryClientPool {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            strict_ssl: strict_ssl_enabled(),
        }
    }

    fn origin_of(url: &str) -> String {
        reqwest::Url::parse(url)
            .ok()
            .map(|u| format!("{}://{}", u.scheme(), u.host_str().unwrap_or("")))
            .unwrap_or_else(|| url.to_string())
    }

    fn client_for(&self, url: &str, timeout: Duration) -> Client {
        let origin = Self::origin_of(url);
        if let Some(client) = self.clients.get(&origin) {
            return client.clone();
        }
        let client = Client::builder()
            .user_agent(concat!("depssmuggler/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .danger_accept_invalid_certs(!self.strict_ssl)
            .build()
            .expect("failed to build HTTP client");
        self.clients.insert(origin, client.clone());
        client
    }

    /// Fetches a metadata payload (JSON/XML manifests, registry index
    /// pages) with the shorter 30-second timeout.
    pub async fn get_metadata(&self, url: &str) -> Result<bytes::Bytes> {
        let client = self.client_for(url, METADATA_TIMEOUT);
        let response = client.get(url).send().await.map_err(|source| CoreError::NetworkError {
            url: url.to_string(),
            source,
        })?;
        classify_status(url, response.status())?;
        response.bytes().await.map_err(|source| CoreError::NetworkError {
            url: url.to_string(),
            source,
        })
    }

    /// Streams an artifact to `dest_path`, invoking `on_progress` at most
    /// once per 300 ms with the instantaneous transfer speed. Uses the
    /// longer 300-second artifact timeout.
    pub async fn download_to_file(
        &self,
        url: &str,
        dest_path: &Path,
        mut on_progress: impl FnMut(ProgressTick) + Send,
    ) -> Result<u64> {
        let client = self.client_for(url, ARTIFACT_TIMEOUT);
        let response = client.get(url).send().await.map_err(|source| CoreError::NetworkError {
            url: url.to_string(),
            source,
        })?;
        classify_status(url, response.status())?;

        let bytes_total = response.content_length();
        let tmp_path = dest_path.with_extension("part");
        let mut file = tokio::fs::File::create(&tmp_path).await?;

        let mut stream = response.bytes_stream();
        let mut bytes_done: u64 = 0;
        let mut last_tick = Instant::now();
        let mut bytes_since_tick: u64 = 0;

        use futures::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| CoreError::NetworkError {
                url: url.to_string(),
                source,
            })?;
            file.write_all(&chunk).await?;
            bytes_done += chunk.len() as u64;
            bytes_since_tick += chunk.len() as u64;

            let elapsed = last_tick.elapsed();
            if elapsed >= PROGRESS_MIN_INTERVAL {
                let speed_bps = bytes_since_tick as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
                on_progress(ProgressTick {
                    bytes_done,
                    bytes_total,
                    speed_bps,
                });
                last_tick = Instant::now();
                bytes_since_tick = 0;
            }
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, dest_path).await?;
        Ok(bytes_done)
    }
}

impl Default for RegistryClientPool {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_status(url: &str, status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(CoreError::NotFound {
            ecosystem: "unknown".to_string(),
            name: url.to_string(),
            version: None,
        });
    }
    Err(CoreError::CacheError(format!("HTTP {status} for {url}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_of_ignores_path_and_query() {
        let a = RegistryClientPool::origin_of("https://pypi.org/simple/requests/");
        let b = RegistryClientPool::origin_of("https://pypi.org/pypi/requests/json");
        assert_eq!(a, b);
    }

    #[test]
    fn strict_ssl_defaults_to_permissive() {
        std::env::remove_var("DEPSSMUGGLER_STRICT_SSL");
        assert!(!strict_ssl_enabled());
    }

    #[test]
    fn strict_ssl_env_flag_enables_verification() {
        std::env::set_var("DEPSSMUGGLER_STRICT_SSL", "1");
        assert!(strict_ssl_enabled());
        std::env::remove_var("DEPSSMUGGLER_STRICT_SSL");
    }

    #[tokio::test]
    async fn get_metadata_returns_bytes_on_success() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/pkg.json")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let pool = RegistryClientPool::new();
        let url = format!("{}/pkg.json", server.url());
        let body = pool.get_metadata(&url).await.unwrap();
        assert_eq!(&*body, b"{}");
    }

    #[tokio::test]
    async fn get_metadata_distinguishes_404_from_5xx() {
        let mut server = mockito::Server::new_async().await;
        let _m404 = server.mock("GET", "/missing").with_status(404).create_async().await;
        let _m500 = server.mock("GET", "/broken").with_status(500).create_async().await;

        let pool = RegistryClientPool::new();
        let not_found = pool.get_metadata(&format!("{}/missing", server.url())).await;
        assert!(matches!(not_found, Err(CoreError::NotFound { .. })));

        let server_error = pool.get_metadata(&format!("{}/broken", server.url())).await;
        assert!(matches!(server_error, Err(CoreError::CacheError(_))));
    }

    #[tokio::test]
    async fn download_to_file_writes_full_payload_and_reports_progress() {
        let mut server = mockito::Server::new_async().await;
        let payload = vec![7u8; 4096];
        let _m = server
            .mock("GET", "/artifact.bin")
            .with_status(200)
            .with_body(payload.clone())
            .create_async()
            .await;

        let pool = RegistryClientPool::new();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("artifact.bin");
        let url = format!("{}/artifact.bin", server.url());

        let total = pool.download_to_file(&url, &dest, |_tick| {}).await.unwrap();
        assert_eq!(total, payload.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), payload);
    }
}
