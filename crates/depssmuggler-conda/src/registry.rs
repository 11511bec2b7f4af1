//! Conda channel registry client. A single instance is bound to one
//! `(channel, subdir)` pair plus its `noarch` counterpart; repodata is
//! fetched disk-only (payloads routinely run into the tens of megabytes)
//! with a 24-hour TTL, decompressed, and indexed by package name for O(1)
//! candidate lookup.

use crate::error::{CondaError, Result};
use crate::matchspec::MatchSpec;
use crate::types::{CondaPackage, CondaVersion, PackageRecord, RepodataDocument};
use async_trait::async_trait;
use depssmuggler_core::{CacheSource, FetchOptions, Metadata, TwoTierCache, Version};
use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const REPODATA_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Package names conda-forge ships as build-time/runtime system
/// scaffolding rather than application dependencies. These are excluded
/// from the transitive closure the same way a bare-metal package manager
/// would never add `libc` to an install plan.
const SYSTEM_PACKAGES: &[&str] = &[
    "python",
    "python_abi",
    "libgcc-ng",
    "libstdcxx-ng",
    "libgomp",
    "libgcc",
    "libcxx",
    "openssl",
    "ca-certificates",
    "__glibc",
    "__unix",
    "__linux",
    "__osx",
    "__win",
    "__archspec",
    "_libgcc_mutex",
    "_openmp_mutex",
    "vc",
    "vs2015_runtime",
    "bzip2",
    "tk",
    "ncurses",
    "readline",
    "zlib",
    "sqlite",
    "libffi",
    "xz",
];

pub fn is_system_package(name: &str) -> bool {
    SYSTEM_PACKAGES.contains(&name)
}

/// Maps a target OS/arch pair to a conda subdir. `noarch` is consulted in
/// addition to this, never instead of it.
pub fn subdir_for_target(os: &str, arch: &str) -> &'static str {
    match (os, arch) {
        ("linux", "aarch64") | ("linux", "arm64") => "linux-aarch64",
        ("linux", _) => "linux-64",
        ("windows", _) => "win-64",
        ("macos", "aarch64") | ("macos", "arm64") | ("darwin", "aarch64") | ("darwin", "arm64") => "osx-arm64",
        ("macos", _) | ("darwin", _) => "osx-64",
        _ => "linux-64",
    }
}

pub struct CondaRegistry {
    base_url: String,
    channel: String,
    subdirs: Vec<String>,
    cache: Arc<TwoTierCache>,
    index: RwLock<HashMap<String, Arc<HashMap<String, Vec<PackageRecord>>>>>,
}

impl CondaRegistry {
    pub fn new(channel: impl Into<String>, subdir: impl Into<String>, cache: Arc<TwoTierCache>) -> Self {
        Self::with_base_url("https://conda.anaconda.org", channel, subdir, cache)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        channel: impl Into<String>,
        subdir: impl Into<String>,
        cache: Arc<TwoTierCache>,
    ) -> Self {
        let channel = channel.into();
        let subdir = subdir.into();
        let mut subdirs = vec![subdir.clone()];
        if subdir != "noarch" {
            subdirs.push("noarch".to_string());
        }
        Self {
            base_url: base_url.into(),
            channel,
            subdirs,
            cache,
            index: RwLock::new(HashMap::new()),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The primary (non-noarch) subdir this registry was constructed for.
    pub fn primary_subdir(&self) -> &str {
        &self.subdirs[0]
    }

    async fn fetch_repodata_bytes(&self, subdir: &str) -> Result<Vec<u8>> {
        let candidates: [(&str, Compression); 4] = [
            ("repodata.json.zst", Compression::Zstd),
            ("current_repodata.json", Compression::None),
            ("repodata.json.gz", Compression::Gzip),
            ("repodata.json", Compression::None),
        ];

        for (filename, compression) in candidates {
            let url = format!("{}/{}/{}/{}", self.base_url, self.channel, subdir, filename);
            let key = format!("conda:{}:{}:{}", self.channel, subdir, filename);
            match self.cache.fetch(&key, &url, &FetchOptions::disk_only(REPODATA_TTL)).await {
                Ok((body, _source)) => match decompress(&body, compression) {
                    Ok(bytes) => return Ok(bytes),
                    Err(message) => {
                        tracing::warn!(%url, %message, "repodata decompression failed, trying next candidate");
                        continue;
                    }
                },
                Err(err) => {
                    tracing::debug!(%url, error = %err, "repodata candidate unavailable, trying next");
                    continue;
                }
            }
        }

        Err(CondaError::RepodataUnavailable {
            channel: self.channel.clone(),
            subdir: subdir.to_string(),
        })
    }

    /// Returns (and lazily builds and caches in-process) the name -> builds
    /// index for one subdir.
    async fn index_for_subdir(&self, subdir: &str) -> Result<Arc<HashMap<String, Vec<PackageRecord>>>> {
        if let Some(existing) = self.index.read().await.get(subdir) {
            return Ok(Arc::clone(existing));
        }

        let bytes = self.fetch_repodata_bytes(subdir).await?;
        let doc: RepodataDocument = serde_json::from_slice(&bytes).map_err(|source| CondaError::RepodataParse {
            channel: self.channel.clone(),
            subdir: subdir.to_string(),
            source,
        })?;

        let mut by_name: HashMap<String, Vec<PackageRecord>> = HashMap::new();
        for record in doc.into_records() {
            by_name.entry(record.name.clone()).or_default().push(record);
        }
        let built = Arc::new(by_name);

        let mut index = self.index.write().await;
        let entry = index.entry(subdir.to_string()).or_insert_with(|| Arc::clone(&built));
        Ok(Arc::clone(entry))
    }

    /// All candidate builds of `name` across the target subdir and `noarch`.
    pub async fn candidates_for(&self, name: &str) -> Result<Vec<PackageRecord>> {
        let mut all = Vec::new();
        for subdir in &self.subdirs {
            let index = self.index_for_subdir(subdir).await?;
            if let Some(records) = index.get(name) {
                all.extend(records.iter().cloned());
            }
        }
        Ok(all)
    }

    /// Selects the best candidate matching `spec`, optionally preferring
    /// builds tagged for a specific CPython ABI (`py310`, `py311`, ...).
    /// Ordering: Python-ABI match, then version descending, then build
    /// number descending, then timestamp descending.
    pub async fn resolve_candidate(&self, spec: &MatchSpec, python_version: Option<&str>) -> Result<Option<PackageRecord>> {
        let mut candidates = self.candidates_for(&spec.name).await?;
        candidates.retain(|r| spec.matches(&r.version, &r.build));

        let py_tag = python_version.map(|v| format!("py{}", v.replace('.', "")));
        candidates.sort_by(|a, b| order_candidates(a, b, py_tag.as_deref()));

        Ok(candidates.into_iter().next())
    }

    pub fn package_download_url(&self, record: &PackageRecord, subdir: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, self.channel, subdir, record.filename)
    }

    /// The subdir a resolved record actually lives in (`noarch` packages
    /// never carry an arch-specific filename suffix check, so this falls
    /// back to scanning both indexes already loaded).
    pub async fn subdir_of(&self, record: &PackageRecord) -> &str {
        for subdir in &self.subdirs {
            if let Ok(index) = self.index_for_subdir(subdir).await {
                if index.get(&record.name).map(|v| v.iter().any(|r| r.filename == record.filename)) == Some(true) {
                    return subdir;
                }
            }
        }
        self.primary_subdir()
    }
}

fn order_candidates(a: &PackageRecord, b: &PackageRecord, py_tag: Option<&str>) -> Ordering {
    if let Some(tag) = py_tag {
        let a_match = a.build.contains(tag);
        let b_match = b.build.contains(tag);
        match b_match.cmp(&a_match) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    crate::version::compare(&b.version, &a.version)
        .then_with(|| b.build_number.cmp(&a.build_number))
        .then_with(|| b.timestamp.unwrap_or(0).cmp(&a.timestamp.unwrap_or(0)))
}

#[derive(Debug, Clone, Copy)]
enum Compression {
    None,
    Zstd,
    Gzip,
}

fn decompress(body: &[u8], compression: Compression) -> std::result::Result<Vec<u8>, String> {
    match compression {
        Compression::None => Ok(body.to_vec()),
        Compression::Zstd => zstd::decode_all(body).map_err(|e| e.to_string()),
        Compression::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(body);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(|e| e.to_string())?;
            Ok(out)
        }
    }
}

#[async_trait]
impl depssmuggler_core::Registry for CondaRegistry {
    async fn get_versions(&self, name: &str) -> depssmuggler_core::Result<Vec<Box<dyn Version>>> {
        let mut candidates = self.candidates_for(name).await?;
        candidates.sort_by(|a, b| order_candidates(a, b, None));
        Ok(candidates
            .into_iter()
            .map(|r| {
                Box::new(CondaVersion {
                    version: r.version,
                    build: r.build,
                    build_number: r.build_number,
                    timestamp: r.timestamp.unwrap_or(0),
                }) as Box<dyn Version>
            })
            .collect())
    }

    async fn get_latest_matching(&self, name: &str, req: &str) -> depssmuggler_core::Result<Option<Box<dyn Version>>> {
        let trimmed = req.trim();
        let spec = MatchSpec {
            channel: None,
            name: name.to_string(),
            version_spec: if trimmed.is_empty() { None } else { Some(trimmed.to_string()) },
            build: None,
        };
        let record = self.resolve_candidate(&spec, None).await?;
        Ok(record.map(|r| {
            Box::new(CondaVersion {
                version: r.version,
                build: r.build,
                build_number: r.build_number,
                timestamp: r.timestamp.unwrap_or(0),
            }) as Box<dyn Version>
        }))
    }

    async fn search(&self, query: &str, limit: usize) -> depssmuggler_core::Result<Vec<Box<dyn Metadata>>> {
        let index = self.index_for_subdir(self.primary_subdir()).await?;
        let query_lower = query.to_lowercase();
        let mut names: Vec<&String> = index.keys().filter(|name| name.to_lowercase().contains(&query_lower)).collect();
        names.sort();
        names.truncate(limit);

        Ok(names
            .into_iter()
            .filter_map(|name| {
                let mut records = index.get(name)?.clone();
                records.sort_by(|a, b| order_candidates(a, b, None));
                let latest = records.into_iter().next()?;
                Some(Box::new(CondaPackage {
                    name: name.clone(),
                    latest_version: latest.version,
                }) as Box<dyn Metadata>)
            })
            .collect())
    }

    fn package_url(&self, name: &str) -> String {
        format!("https://anaconda.org/{}/{}", self.channel, name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repodata_body() -> &'static str {
        r#"{
            "packages": {
                "numpy-1.26.4-py310_0.tar.bz2": {"name": "numpy", "version": "1.26.4", "build": "py310_0", "build_number": 0, "depends": ["python >=3.10,<3.11.0a0"]},
                "numpy-1.25.0-py310_0.tar.bz2": {"name": "numpy", "version": "1.25.0", "build": "py310_0", "build_number": 0, "depends": ["python >=3.10,<3.11.0a0"]}
            },
            "packages.conda": {
                "numpy-1.26.4-py311_1.conda": {"name": "numpy", "version": "1.26.4", "build": "py311_1", "build_number": 1, "depends": ["python >=3.11,<3.12.0a0"]}
            }
        }"#
    }

    #[tokio::test]
    async fn candidates_for_merges_target_subdir_and_noarch() {
        let mut server = mockito::Server::new_async().await;
        let _m1 = server
            .mock("GET", "/conda-forge/linux-64/repodata.json.zst")
            .with_status(404)
            .create_async()
            .await;
        let _m2 = server
            .mock("GET", "/conda-forge/linux-64/current_repodata.json")
            .with_status(200)
            .with_body(repodata_body())
            .create_async()
            .await;
        let _m3 = server
            .mock("GET", "/conda-forge/noarch/repodata.json.zst")
            .with_status(404)
            .create_async()
            .await;
        let _m4 = server
            .mock("GET", "/conda-forge/noarch/current_repodata.json")
            .with_status(200)
            .with_body(r#"{"packages": {}}"#)
            .create_async()
            .await;

        let cache = Arc::new(TwoTierCache::new(None));
        let registry = CondaRegistry::with_base_url(server.url(), "conda-forge", "linux-64", cache);
        let candidates = registry.candidates_for("numpy").await.unwrap();
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn order_candidates_prefers_matching_python_abi() {
        let a = PackageRecord {
            name: "numpy".into(),
            version: "1.26.4".into(),
            build: "py310_0".into(),
            build_number: 0,
            depends: vec![],
            constrains: vec![],
            size: None,
            sha256: None,
            md5: None,
            timestamp: None,
            filename: "a".into(),
        };
        let mut b = a.clone();
        b.build = "py311_0".into();

        let mut candidates = vec![a.clone(), b.clone()];
        candidates.sort_by(|x, y| order_candidates(x, y, Some("py311")));
        assert_eq!(candidates[0].build, "py311_0");
    }

    #[test]
    fn subdir_for_target_maps_known_platforms() {
        assert_eq!(subdir_for_target("linux", "x86_64"), "linux-64");
        assert_eq!(subdir_for_target("linux", "aarch64"), "linux-aarch64");
        assert_eq!(subdir_for_target("windows", "x86_64"), "win-64");
        assert_eq!(subdir_for_target("macos", "aarch64"), "osx-arm64");
        assert_eq!(subdir_for_target("macos", "x86_64"), "osx-64");
    }

    #[test]
    fn is_system_package_excludes_known_scaffolding() {
        assert!(is_system_package("python"));
        assert!(is_system_package("openssl"));
        assert!(!is_system_package("numpy"));
    }
}
