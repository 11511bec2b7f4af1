//! Per-backend repodata registries (YUM/DNF, APT, APK) plus the shared
//! `OSPackageDownloader` facade every backend is exposed through.

use crate::codecs::{apkindex, packages, repomd};
use crate::error::{OsError, Result};
use crate::types::{Backend, CacheMode, MatchType, OnErrorAction, OsPackage};
use depssmuggler_core::{FetchOptions, TwoTierCache};
use regex::Regex;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::RwLock;

const REPODATA_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Capability name patterns YUM/RPM `Requires` entries match when they
/// describe base-system facilities (shared libraries, rpmlib features,
/// dynamic linker symbols, `%config` macros) rather than an actual
/// installable package. These are treated as always-satisfied and never
/// chased into the dependency graph.
fn library_capability_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"^lib.*\.so", r"^/usr/", r"^rpmlib\(", r"^rtld\(", r"^config\("]
            .iter()
            .map(|p| Regex::new(p).expect("fixed pattern set compiles"))
            .collect()
    })
}

pub fn is_library_capability(capability: &str) -> bool {
    library_capability_patterns().iter().any(|re| re.is_match(capability))
}

/// Name -> package, and capability -> providing packages, indices built
/// once per repodata snapshot.
pub struct OsIndex {
    by_name: HashMap<String, Vec<OsPackage>>,
    provides: HashMap<String, Vec<OsPackage>>,
}

impl OsIndex {
    fn build(packages: Vec<OsPackage>) -> Self {
        let mut by_name: HashMap<String, Vec<OsPackage>> = HashMap::new();
        let mut provides: HashMap<String, Vec<OsPackage>> = HashMap::new();
        for pkg in packages {
            for capability in std::iter::once(pkg.name.clone()).chain(pkg.provides.iter().cloned()) {
                provides.entry(capability.to_lowercase()).or_default().push(pkg.clone());
            }
            by_name.entry(pkg.name.to_lowercase()).or_default().push(pkg);
        }
        Self { by_name, provides }
    }

    pub fn find(&self, name: &str) -> Option<&OsPackage> {
        self.by_name.get(&name.to_lowercase()).and_then(|v| v.first())
    }

    pub fn providers_of(&self, capability: &str) -> &[OsPackage] {
        self.provides.get(&capability.to_lowercase()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn search(&self, query: &str, match_type: MatchType, limit: usize) -> Vec<OsPackage> {
        let query_lower = query.to_lowercase();
        let mut matches: Vec<&OsPackage> = self
            .by_name
            .values()
            .filter_map(|v| v.first())
            .filter(|pkg| match match_type {
                MatchType::Exact => pkg.name.to_lowercase() == query_lower,
                MatchType::Partial => pkg.name.to_lowercase().contains(&query_lower),
                MatchType::Wildcard => wildcard_match(&query_lower, &pkg.name.to_lowercase()),
            })
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        matches.truncate(limit);
        matches.into_iter().cloned().collect()
    }
}

fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        return candidate.starts_with(prefix);
    }
    candidate == pattern
}

/// Common surface every backend-specific registry implements so the
/// facade can stay backend-agnostic.
#[async_trait::async_trait]
pub trait OsRegistry: Send + Sync {
    fn backend(&self) -> Backend;
    async fn index(&self) -> Result<Arc<OsIndex>>;
    fn download_base_url(&self) -> &str;
}

pub struct YumRegistry {
    repo_base_url: String,
    arch: String,
    cache: Arc<TwoTierCache>,
    index: RwLock<Option<Arc<OsIndex>>>,
}

impl YumRegistry {
    pub fn new(repo_base_url: impl Into<String>, arch: impl Into<String>, cache: Arc<TwoTierCache>) -> Self {
        Self {
            repo_base_url: repo_base_url.into(),
            arch: arch.into(),
            cache,
            index: RwLock::new(None),
        }
    }

    async fn fetch_bytes(&self, rel_path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.repo_base_url.trim_end_matches('/'), rel_path);
        let key = format!("yum:{}:{}", self.repo_base_url, rel_path);
        let (body, _source) = self
            .cache
            .fetch(&key, &url, &FetchOptions::disk_only(REPODATA_TTL))
            .await
            .map_err(|_| OsError::RepodataUnavailable {
                backend: "yum",
                repo: self.repo_base_url.clone(),
            })?;
        Ok(body.to_vec())
    }
}

#[async_trait::async_trait]
impl OsRegistry for YumRegistry {
    fn backend(&self) -> Backend {
        Backend::Yum
    }

    fn download_base_url(&self) -> &str {
        &self.repo_base_url
    }

    async fn index(&self) -> Result<Arc<OsIndex>> {
        if let Some(existing) = self.index.read().await.as_ref() {
            return Ok(Arc::clone(existing));
        }

        let repomd_bytes = self.fetch_bytes("repodata/repomd.xml").await?;
        let entries = repomd::parse_repomd(&repomd_bytes).map_err(|e| OsError::RepodataParse {
            backend: "yum",
            repo: self.repo_base_url.clone(),
            message: e.to_string(),
        })?;
        let primary_entry = entries.into_iter().find(|e| e.data_type == "primary").ok_or_else(|| OsError::RepodataUnavailable {
            backend: "yum",
            repo: self.repo_base_url.clone(),
        })?;

        let primary_raw = self.fetch_bytes(&primary_entry.location_href).await?;
        let primary_bytes = if primary_entry.location_href.ends_with(".gz") {
            let mut decoder = flate2::read::GzDecoder::new(&primary_raw[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(|e| OsError::RepodataParse {
                backend: "yum",
                repo: self.repo_base_url.clone(),
                message: e.to_string(),
            })?;
            out
        } else {
            primary_raw
        };

        let mut packages = repomd::parse_primary(&primary_bytes).map_err(|e| OsError::RepodataParse {
            backend: "yum",
            repo: self.repo_base_url.clone(),
            message: e.to_string(),
        })?;
        packages.retain(|p| p.arch == self.arch || p.arch == "noarch");

        let built = Arc::new(OsIndex::build(packages));
        *self.index.write().await = Some(Arc::clone(&built));
        Ok(built)
    }
}

pub struct AptRegistry {
    base_url: String,
    suite: String,
    component: String,
    arch: String,
    include_recommends: bool,
    cache: Arc<TwoTierCache>,
    index: RwLock<Option<Arc<OsIndex>>>,
}

impl AptRegistry {
    pub fn new(
        base_url: impl Into<String>,
        suite: impl Into<String>,
        component: impl Into<String>,
        arch: impl Into<String>,
        include_recommends: bool,
        cache: Arc<TwoTierCache>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            suite: suite.into(),
            component: component.into(),
            arch: arch.into(),
            include_recommends,
            cache,
            index: RwLock::new(None),
        }
    }
}

#[async_trait::async_trait]
impl OsRegistry for AptRegistry {
    fn backend(&self) -> Backend {
        Backend::Apt
    }

    fn download_base_url(&self) -> &str {
        &self.base_url
    }

    async fn index(&self) -> Result<Arc<OsIndex>> {
        if let Some(existing) = self.index.read().await.as_ref() {
            return Ok(Arc::clone(existing));
        }

        let rel = format!("dists/{}/{}/binary-{}/Packages.gz", self.suite, self.component, self.arch);
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), rel);
        let key = format!("apt:{}:{}", self.base_url, rel);
        let (body, _source) = self
            .cache
            .fetch(&key, &url, &FetchOptions::disk_only(REPODATA_TTL))
            .await
            .map_err(|_| OsError::RepodataUnavailable {
                backend: "apt",
                repo: self.base_url.clone(),
            })?;

        let mut decoder = flate2::read::GzDecoder::new(&body[..]);
        let mut text = String::new();
        decoder.read_to_string(&mut text).map_err(|e| OsError::RepodataParse {
            backend: "apt",
            repo: self.base_url.clone(),
            message: e.to_string(),
        })?;

        let pkgs = packages::parse_packages(&text, self.include_recommends);
        let built = Arc::new(OsIndex::build(pkgs));
        *self.index.write().await = Some(Arc::clone(&built));
        Ok(built)
    }
}

pub struct ApkRegistry {
    base_url: String,
    branch: String,
    repo: String,
    arch: String,
    cache: Arc<TwoTierCache>,
    index: RwLock<Option<Arc<OsIndex>>>,
}

impl ApkRegistry {
    pub fn new(base_url: impl Into<String>, branch: impl Into<String>, repo: impl Into<String>, arch: impl Into<String>, cache: Arc<TwoTierCache>) -> Self {
        Self {
            base_url: base_url.into(),
            branch: branch.into(),
            repo: repo.into(),
            arch: arch.into(),
            cache,
            index: RwLock::new(None),
        }
    }
}

#[async_trait::async_trait]
impl OsRegistry for ApkRegistry {
    fn backend(&self) -> Backend {
        Backend::Apk
    }

    fn download_base_url(&self) -> &str {
        &self.base_url
    }

    async fn index(&self) -> Result<Arc<OsIndex>> {
        if let Some(existing) = self.index.read().await.as_ref() {
            return Ok(Arc::clone(existing));
        }

        let rel = format!("{}/{}/{}/APKINDEX.tar.gz", self.branch, self.repo, self.arch);
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), rel);
        let key = format!("apk:{}:{}", self.base_url, rel);
        let (body, _source) = self
            .cache
            .fetch(&key, &url, &FetchOptions::disk_only(REPODATA_TTL))
            .await
            .map_err(|_| OsError::RepodataUnavailable {
                backend: "apk",
                repo: self.base_url.clone(),
            })?;

        let mut decoder = flate2::read::GzDecoder::new(&body[..]);
        let mut tar_bytes = Vec::new();
        decoder.read_to_end(&mut tar_bytes).map_err(|e| OsError::RepodataParse {
            backend: "apk",
            repo: self.base_url.clone(),
            message: e.to_string(),
        })?;

        let pkgs = apkindex::extract_and_parse(&tar_bytes).map_err(|e| OsError::RepodataParse {
            backend: "apk",
            repo: self.base_url.clone(),
            message: e.to_string(),
        })?;
        let built = Arc::new(OsIndex::build(pkgs));
        *self.index.write().await = Some(Arc::clone(&built));
        Ok(built)
    }
}

/// Options for [`OSPackageDownloader::resolve_dependencies`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub include_optional: bool,
    pub include_recommends: bool,
}

/// Options for [`OSPackageDownloader::download`].
pub struct DownloadOptions<'a> {
    pub concurrency: usize,
    pub verify_gpg: bool,
    pub cache_mode: CacheMode,
    pub on_progress: Option<Box<dyn Fn(&str, u64, Option<u64>) + Send + 'a>>,
    pub on_error: Option<Box<dyn Fn(&str, &str) -> OnErrorAction + Send + 'a>>,
}

impl Default for DownloadOptions<'_> {
    fn default() -> Self {
        Self {
            concurrency: 3,
            verify_gpg: false,
            cache_mode: CacheMode::Session,
            on_progress: None,
            on_error: None,
        }
    }
}

/// The facade shared by the three backends: search, transitive-capability
/// resolution with a depth cap, and parallel checksum-verified download.
pub struct OSPackageDownloader {
    registry: Arc<dyn OsRegistry>,
    client_pool: Arc<depssmuggler_core::RegistryClientPool>,
}

impl OSPackageDownloader {
    pub fn new(registry: Arc<dyn OsRegistry>, client_pool: Arc<depssmuggler_core::RegistryClientPool>) -> Self {
        Self { registry, client_pool }
    }

    pub fn backend(&self) -> Backend {
        self.registry.backend()
    }

    pub async fn search(&self, query: &str, match_type: MatchType, limit: usize) -> Result<Vec<OsPackage>> {
        let index = self.registry.index().await?;
        Ok(index.search(query, match_type, limit))
    }

    /// BFS over `requires`, skipping library-like capabilities and
    /// anything already resolved, bounded by `max_depth` (the
    /// `os_dependency_lookahead` config value).
    pub async fn resolve_dependencies(&self, roots: &[String], max_depth: u32, options: ResolveOptions) -> Result<Vec<OsPackage>> {
        let index = self.registry.index().await?;
        let skipper = depssmuggler_core::Skipper::new(max_depth);
        let mut resolved = Vec::new();
        let mut queue: std::collections::VecDeque<(String, u32, Vec<String>)> =
            roots.iter().map(|r| (r.clone(), 0, Vec::new())).collect();

        while let Some((name, depth, parent_path)) = queue.pop_front() {
            let Some(pkg) = index.find(&name) else {
                continue;
            };
            let sequence = skipper.next_sequence();
            let verdict = skipper.skip_resolution(&pkg.name, &pkg.version, depth, sequence, &parent_path);
            if verdict.skip {
                continue;
            }
            skipper.record_resolved(&pkg.name, &pkg.version, depth, sequence);
            resolved.push(pkg.clone());

            if depth >= max_depth {
                continue;
            }

            let mut next_parent_path = parent_path.clone();
            next_parent_path.push(pkg.name.to_lowercase());

            for capability in &pkg.requires {
                if is_library_capability(capability) {
                    continue;
                }
                if !options.include_optional && capability.starts_with('(') {
                    continue;
                }
                let providers = index.providers_of(capability);
                if let Some(provider) = providers.first() {
                    queue.push_back((provider.name.clone(), depth + 1, next_parent_path.clone()));
                }
            }
        }

        let _ = options.include_recommends;
        Ok(resolved)
    }

    pub async fn download(&self, pkg: &OsPackage, dest_dir: &Path) -> Result<std::path::PathBuf> {
        let url = format!("{}/{}", self.registry.download_base_url().trim_end_matches('/'), pkg.download_url);
        let dest_path = dest_dir.join(&pkg.filename);
        self.client_pool
            .download_to_file(&url, &dest_path, |_tick| {})
            .await
            .map_err(|source| OsError::RepodataParse {
                backend: self.registry.backend().as_str(),
                repo: self.registry.download_base_url().to_string(),
                message: source.to_string(),
            })?;

        let checksum = if let Some(hex) = &pkg.sha1 {
            Some(depssmuggler_core::Checksum {
                kind: depssmuggler_core::ChecksumKind::Sha1,
                hex: hex.clone(),
            })
        } else {
            pkg.sha256.as_ref().map(|hex| depssmuggler_core::Checksum {
                kind: depssmuggler_core::ChecksumKind::Sha256,
                hex: hex.clone(),
            })
        };
        if let Some(checksum) = checksum {
            depssmuggler_core::verify_file(&dest_path, &checksum).map_err(|e| OsError::RepodataParse {
                backend: self.registry.backend().as_str(),
                repo: dest_path.display().to_string(),
                message: e.to_string(),
            })?;
        }

        Ok(dest_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_capability_patterns_match_sonames_and_macros() {
        assert!(is_library_capability("libc.so.6()(64bit)"));
        assert!(is_library_capability("rpmlib(CompressedFileNames)"));
        assert!(is_library_capability("/usr/bin/perl"));
        assert!(!is_library_capability("httpd-filesystem"));
    }

    #[test]
    fn wildcard_search_matches_prefix() {
        assert!(wildcard_match("lib*", "libcurl4"));
        assert!(!wildcard_match("lib*", "curl"));
    }

    #[test]
    fn os_index_finds_package_case_insensitively() {
        let pkg = OsPackage {
            name: "Httpd".into(),
            version: "2.4.57-1".into(),
            arch: "x86_64".into(),
            download_url: "Packages/httpd.rpm".into(),
            filename: "httpd.rpm".into(),
            size_bytes: None,
            sha1: None,
            sha256: None,
            provides: vec!["webserver".into()],
            requires: vec![],
        };
        let index = OsIndex::build(vec![pkg]);
        assert!(index.find("httpd").is_some());
        assert_eq!(index.providers_of("webserver").len(), 1);
    }
}
