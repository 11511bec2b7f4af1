//! Wires the YUM/APT/APK registries into the generic
//! `Ecosystem`/`Registry` trait pair, sharing one [`OSPackageDownloader`]
//! per backend instance.

use crate::registry::{OSPackageDownloader, OsRegistry, ResolveOptions};
use crate::types::{Backend, MatchType, OsPackage};
use async_trait::async_trait;
use depssmuggler_core::{
    Checksum, ChecksumKind, CoreError, DependencyGraphResult, DependencyNode, Ecosystem as EcosystemKind,
    EcosystemAdapter, FailedPackage, Metadata, PackageRef, Registry, ResolvedPackage, Result, TargetPlatform,
};
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct OsVersion(String);

impl depssmuggler_core::Version for OsVersion {
    fn version_string(&self) -> &str {
        &self.0
    }
    fn is_yanked(&self) -> bool {
        false
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct OsMetadata {
    name: String,
    latest_version: String,
}

impl Metadata for OsMetadata {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> Option<&str> {
        None
    }
    fn latest_version(&self) -> &str {
        &self.latest_version
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Adapts an [`OsRegistry`] (whose index only ever carries the single
/// snapshot a repodata pull returns per package) to the generic
/// [`Registry`] trait.
pub struct OsRegistryAdapter {
    inner: Arc<dyn OsRegistry>,
}

impl OsRegistryAdapter {
    pub fn new(inner: Arc<dyn OsRegistry>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Registry for OsRegistryAdapter {
    async fn get_versions(&self, name: &str) -> Result<Vec<Box<dyn depssmuggler_core::Version>>> {
        let index = self.inner.index().await.map_err(CoreError::from)?;
        Ok(index
            .find(name)
            .map(|pkg| Box::new(OsVersion(pkg.version.clone())) as Box<dyn depssmuggler_core::Version>)
            .into_iter()
            .collect())
    }

    async fn get_latest_matching(&self, name: &str, req: &str) -> Result<Option<Box<dyn depssmuggler_core::Version>>> {
        let index = self.inner.index().await.map_err(CoreError::from)?;
        let Some(pkg) = index.find(name) else {
            return Ok(None);
        };
        let trimmed = req.trim();
        if !trimmed.is_empty() && trimmed != pkg.version {
            return Ok(None);
        }
        Ok(Some(Box::new(OsVersion(pkg.version.clone())) as Box<dyn depssmuggler_core::Version>))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Box<dyn Metadata>>> {
        let index = self.inner.index().await.map_err(CoreError::from)?;
        Ok(index
            .search(query, MatchType::Partial, limit)
            .into_iter()
            .map(|pkg| {
                Box::new(OsMetadata {
                    name: pkg.name,
                    latest_version: pkg.version,
                }) as Box<dyn Metadata>
            })
            .collect())
    }

    fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.inner.download_base_url(), name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One ecosystem adapter per backend (YUM, APT, APK). The resolution walk
/// itself lives in [`OSPackageDownloader::resolve_dependencies`]; this
/// struct only translates between the generic trait shapes and that
/// facade's vocabulary.
pub struct OsEcosystem {
    backend: Backend,
    downloader: Arc<OSPackageDownloader>,
    registry_adapter: Arc<OsRegistryAdapter>,
    max_depth: u32,
}

impl OsEcosystem {
    pub fn new(inner: Arc<dyn OsRegistry>, client_pool: Arc<depssmuggler_core::RegistryClientPool>, max_depth: u32) -> Self {
        let backend = inner.backend();
        Self {
            backend,
            downloader: Arc::new(OSPackageDownloader::new(Arc::clone(&inner), client_pool)),
            registry_adapter: Arc::new(OsRegistryAdapter::new(inner)),
            max_depth,
        }
    }

    fn ecosystem_kind(&self) -> EcosystemKind {
        match self.backend {
            Backend::Yum => EcosystemKind::Yum,
            Backend::Apt => EcosystemKind::Apt,
            Backend::Apk => EcosystemKind::Apk,
        }
    }

    fn checksum_of(pkg: &OsPackage) -> Option<Checksum> {
        if let Some(hex) = &pkg.sha256 {
            return Some(Checksum {
                kind: ChecksumKind::Sha256,
                hex: hex.clone(),
            });
        }
        pkg.sha1.as_ref().map(|hex| Checksum {
            kind: ChecksumKind::Sha1,
            hex: hex.clone(),
        })
    }

    fn to_resolved(&self, pkg: &OsPackage) -> ResolvedPackage {
        let mut metadata = HashMap::new();
        metadata.insert("arch".to_string(), pkg.arch.clone());
        metadata.insert("filename".to_string(), pkg.filename.clone());
        ResolvedPackage {
            ecosystem: self.ecosystem_kind(),
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            download_url: format!(
                "{}/{}",
                self.registry_adapter.inner.download_base_url().trim_end_matches('/'),
                pkg.download_url
            ),
            checksum: Self::checksum_of(pkg),
            size_bytes: pkg.size_bytes,
            source_registry: self.backend.as_str().to_string(),
            metadata,
        }
    }
}

#[async_trait]
impl EcosystemAdapter for OsEcosystem {
    fn id(&self) -> &'static str {
        self.backend.as_str()
    }

    fn display_name(&self) -> &'static str {
        match self.backend {
            Backend::Yum => "YUM/DNF",
            Backend::Apt => "APT",
            Backend::Apk => "APK",
        }
    }

    fn parse_reference(&self, raw: &str) -> Result<PackageRef> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidReference(raw.to_string()));
        }
        let mut parts = trimmed.splitn(2, '@');
        let name = parts.next().unwrap_or(trimmed);
        let version = parts.next();
        let mut package_ref = PackageRef::new(self.ecosystem_kind(), name);
        if let Some(version) = version {
            package_ref = package_ref.with_version(version);
        }
        Ok(package_ref)
    }

    fn registry(&self) -> Arc<dyn Registry> {
        Arc::clone(&self.registry_adapter) as Arc<dyn Registry>
    }

    async fn resolve(&self, root: &PackageRef, target: &TargetPlatform) -> Result<DependencyGraphResult> {
        let _ = target; // arch is fixed per registry instance, not per-request.
        let mut result = DependencyGraphResult::default();

        let resolved = match self
            .downloader
            .resolve_dependencies(std::slice::from_ref(&root.name), self.max_depth, ResolveOptions::default())
            .await
        {
            Ok(pkgs) => pkgs,
            Err(err) => {
                result.failed.push(FailedPackage {
                    reference: root.to_string(),
                    error: err.to_string(),
                });
                return Ok(result);
            }
        };

        if resolved.is_empty() {
            result.failed.push(FailedPackage {
                reference: root.to_string(),
                error: format!("package not found: {}", root.name),
            });
            return Ok(result);
        }

        let mut sequence = 0u64;
        let mut root_node: Option<DependencyNode> = None;
        let mut children = Vec::new();

        for pkg in &resolved {
            let resolved_pkg = self.to_resolved(pkg);
            result.flat_list.push(resolved_pkg.clone());

            let node = DependencyNode {
                pkg: resolved_pkg,
                children: Vec::new(),
                scope: None,
                optional: false,
                depth: if pkg.name.eq_ignore_ascii_case(&root.name) { 0 } else { 1 },
                sequence,
            };
            sequence += 1;

            if pkg.name.eq_ignore_ascii_case(&root.name) {
                root_node = Some(node);
            } else {
                children.push(node);
            }
        }

        if let Some(mut root_node) = root_node {
            root_node.children = children;
            result.roots.push(root_node);
        } else {
            result.roots.extend(children);
        }

        Ok(result)
    }

    async fn download(&self, pkg: &ResolvedPackage, dest_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dest_dir)?;
        let filename = pkg.metadata.get("filename").cloned().unwrap_or_else(|| format!("{}-{}", pkg.name, pkg.version));
        let dest_path = dest_dir.join(&filename);

        let client = depssmuggler_core::RegistryClientPool::new();
        client.download_to_file(&pkg.download_url, &dest_path, |_tick| {}).await?;

        if let Some(checksum) = &pkg.checksum {
            depssmuggler_core::verify_file(&dest_path, checksum)?;
        }

        Ok(dest_path)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OsIndex;
    use std::sync::Arc;

    struct StubRegistry {
        backend: Backend,
        index: Arc<OsIndex>,
    }

    #[async_trait]
    impl OsRegistry for StubRegistry {
        fn backend(&self) -> Backend {
            self.backend
        }
        async fn index(&self) -> crate::error::Result<Arc<OsIndex>> {
            Ok(Arc::clone(&self.index))
        }
        fn download_base_url(&self) -> &str {
            "https://repo.example/yum"
        }
    }

    fn sample_index() -> Arc<OsIndex> {
        let httpd = OsPackage {
            name: "httpd".into(),
            version: "2.4.57-1.el9".into(),
            arch: "x86_64".into(),
            download_url: "Packages/httpd.rpm".into(),
            filename: "httpd.rpm".into(),
            size_bytes: Some(1024),
            sha1: None,
            sha256: Some("abc".into()),
            provides: vec!["webserver".into()],
            requires: vec!["httpd-filesystem".into(), "libc.so.6()(64bit)".into()],
        };
        let filesystem = OsPackage {
            name: "httpd-filesystem".into(),
            version: "2.4.57-1.el9".into(),
            arch: "noarch".into(),
            download_url: "Packages/httpd-filesystem.rpm".into(),
            filename: "httpd-filesystem.rpm".into(),
            size_bytes: Some(16),
            sha1: None,
            sha256: Some("def".into()),
            provides: vec![],
            requires: vec![],
        };
        Arc::new(OsIndex::build(vec![httpd, filesystem]))
    }

    #[tokio::test]
    async fn resolve_expands_requires_and_skips_library_capabilities() {
        let registry: Arc<dyn OsRegistry> = Arc::new(StubRegistry {
            backend: Backend::Yum,
            index: sample_index(),
        });
        let eco = OsEcosystem::new(registry, Arc::new(depssmuggler_core::RegistryClientPool::new()), 5);
        let root = eco.parse_reference("httpd").unwrap();
        let result = eco.resolve(&root, &TargetPlatform::default()).await.unwrap();

        assert_eq!(result.flat_list.len(), 2);
        assert!(result.flat_list.iter().any(|p| p.name == "httpd-filesystem"));
        assert_eq!(result.roots.len(), 1);
        assert_eq!(result.roots[0].children.len(), 1);
    }

    #[test]
    fn parse_reference_splits_name_and_version() {
        let registry: Arc<dyn OsRegistry> = Arc::new(StubRegistry {
            backend: Backend::Apt,
            index: sample_index(),
        });
        let eco = OsEcosystem::new(registry, Arc::new(depssmuggler_core::RegistryClientPool::new()), 5);
        let reference = eco.parse_reference("curl@7.81.0").unwrap();
        assert_eq!(reference.name, "curl");
        assert_eq!(reference.version.as_deref(), Some("7.81.0"));
    }
}
