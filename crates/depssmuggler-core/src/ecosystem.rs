//! The `Ecosystem`/`Registry` trait pair every adapter (`depssmuggler-pip`,
//! `-conda`, `-maven`, `-npm`, `-oci`, `-os`) implements.
//!
//! These mirror the original LSP tool's ecosystem-abstraction layer almost
//! exactly, with editor-facing operations (hover, inlay hints, completions,
//! diagnostics) replaced by the three operations an air-gap courier
//! actually needs: parse a reference, resolve its transitive closure,
//! download the resulting artifacts. Trait objects (`Box`/`Arc<dyn Trait>`)
//! are kept for the same reason as before: the CLI shell dispatches across
//! a runtime-registered set of ecosystems without knowing their concrete
//! types.

use crate::error::Result;
use crate::package::{DependencyGraphResult, PackageRef, ResolvedPackage, TargetPlatform};
use async_trait::async_trait;
use std::any::Any;
use std::path::Path;

/// Per-package version metadata returned by a [`Registry`].
pub trait Version: Send + Sync {
    /// Version string in the ecosystem's native form (`1.0.214`, `14.21.3`,
    /// `3.1.0-SNAPSHOT`, ...).
    fn version_string(&self) -> &str;

    /// Whether this version is yanked/deprecated/retracted and should be
    /// skipped unless explicitly pinned.
    fn is_yanked(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// Package-level metadata independent of any specific version (used for
/// search results and `UnsupportedArchitecture`/`NotFound` diagnostics).
pub trait Metadata: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> Option<&str>;
    fn latest_version(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

/// Generic package-registry client: version listing, constraint matching,
/// search, and package-page URL formatting. One implementation per
/// ecosystem (PyPI JSON API, npm registry, Maven Central search, Conda
/// channel index, OCI registry API, YUM/APT/APK repo metadata).
#[async_trait]
pub trait Registry: Send + Sync {
    /// All known versions, newest first. May include yanked versions;
    /// callers filter via [`Version::is_yanked`].
    async fn get_versions(&self, name: &str) -> Result<Vec<Box<dyn Version>>>;

    /// The highest version satisfying `req` (ecosystem-native requirement
    /// syntax), or `None` if nothing matches.
    async fn get_latest_matching(&self, name: &str, req: &str) -> Result<Option<Box<dyn Version>>>;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Box<dyn Metadata>>>;

    /// Human-facing URL for the package's registry page.
    fn package_url(&self, name: &str) -> String;

    fn as_any(&self) -> &dyn Any;
}

/// The contract every ecosystem adapter implements: parse a caller-supplied
/// reference, resolve it (and its full transitive closure) against the
/// registry under the ecosystem's own resolution rules, and download the
/// resulting artifact set to disk with integrity verification.
#[async_trait]
pub trait Ecosystem: Send + Sync {
    /// Unique identifier (`pip`, `conda`, `maven`, `npm`, `docker`, `yum`,
    /// `apt`, `apk`).
    fn id(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// Parses a raw CLI-supplied coordinate string (already stripped of its
    /// `ecosystem:` prefix) into a [`PackageRef`].
    fn parse_reference(&self, raw: &str) -> Result<PackageRef>;

    fn registry(&self) -> std::sync::Arc<dyn Registry>;

    /// Resolves `root` and its full transitive dependency closure against
    /// `target`, honoring the ecosystem's own depth caps, conflict
    /// resolution, and cycle handling. Per-package failures are recorded in
    /// the returned [`DependencyGraphResult`] rather than aborting the
    /// whole resolve.
    async fn resolve(&self, root: &PackageRef, target: &TargetPlatform) -> Result<DependencyGraphResult>;

    /// Downloads one resolved package's artifact to `dest_dir`, verifying
    /// its checksum before the call returns successfully.
    async fn download(&self, pkg: &ResolvedPackage, dest_dir: &Path) -> Result<std::path::PathBuf>;

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Ecosystem as EcosystemKind;
    use std::sync::Arc;

    struct StubVersion(String);
    impl Version for StubVersion {
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

    struct StubRegistry;
    #[async_trait]
    impl Registry for StubRegistry {
        async fn get_versions(&self, _name: &str) -> Result<Vec<Box<dyn Version>>> {
            Ok(vec![Box::new(StubVersion("1.0.0".into()))])
        }
        async fn get_latest_matching(&self, _name: &str, _req: &str) -> Result<Option<Box<dyn Version>>> {
            Ok(Some(Box::new(StubVersion("1.0.0".into()))))
        }
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Box<dyn Metadata>>> {
            Ok(vec![])
        }
        fn package_url(&self, name: &str) -> String {
            format!("https://example.invalid/{name}")
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct StubEcosystem {
        registry: Arc<dyn Registry>,
    }

    #[async_trait]
    impl Ecosystem for StubEcosystem {
        fn id(&self) -> &'static str {
            "stub"
        }
        fn display_name(&self) -> &'static str {
            "Stub"
        }
        fn parse_reference(&self, raw: &str) -> Result<PackageRef> {
            Ok(PackageRef::new(EcosystemKind::Pip, raw))
        }
        fn registry(&self) -> Arc<dyn Registry> {
            Arc::clone(&self.registry)
        }
        async fn resolve(&self, root: &PackageRef, _target: &TargetPlatform) -> Result<DependencyGraphResult> {
            let _ = root;
            Ok(DependencyGraphResult::default())
        }
        async fn download(&self, _pkg: &ResolvedPackage, dest_dir: &Path) -> Result<std::path::PathBuf> {
            Ok(dest_dir.join("stub"))
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[tokio::test]
    async fn ecosystem_trait_object_is_dispatchable() {
        let eco: Box<dyn Ecosystem> = Box::new(StubEcosystem {
            registry: Arc::new(StubRegistry),
        });
        assert_eq!(eco.id(), "stub");
        let reference = eco.parse_reference("requests").unwrap();
        let result = eco
            .resolve(&reference, &TargetPlatform::default())
            .await
            .unwrap();
        assert!(result.flat_list.is_empty());
    }

    #[tokio::test]
    async fn registry_trait_object_get_versions() {
        let registry: Arc<dyn Registry> = Arc::new(StubRegistry);
        let versions = registry.get_versions("requests").await.unwrap();
        assert_eq!(versions[0].version_string(), "1.0.0");
    }
}
