//! Conda ecosystem adapter: parses MatchSpec references, resolves the
//! transitive `depends` closure against a channel's repodata using the
//! shared breadth-first Skipper kernel, excluding system/toolchain
//! packages from the closure, and downloads the selected tarball/`.conda`
//! archive with checksum verification.

use crate::matchspec::MatchSpec;
use crate::registry::{is_system_package, subdir_for_target, CondaRegistry};
use async_trait::async_trait;
use depssmuggler_core::{
    Checksum, ChecksumKind, CoreError, DependencyGraphResult, DependencyNode, Ecosystem as EcosystemKind, EcosystemAdapter,
    FailedPackage, PackageRef, Registry, ResolvedPackage, Result, Skipper, TargetPlatform,
};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Matches the spec's named default for Conda/YUM transitive closures.
const DEFAULT_MAX_DEPTH: u32 = 10;

pub struct CondaEcosystem {
    registry: Arc<CondaRegistry>,
    client: depssmuggler_core::RegistryClientPool,
}

impl CondaEcosystem {
    pub fn new(registry: Arc<CondaRegistry>) -> Self {
        Self {
            registry,
            client: depssmuggler_core::RegistryClientPool::new(),
        }
    }

    /// A `depends` entry is `name [version-spec]` (space-separated, no
    /// MatchSpec `::`-channel or `=build` grammar) — e.g. `numpy >=1.20,<2`
    /// or a bare `python`.
    fn parse_dependency(raw: &str) -> Option<(String, Option<String>)> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => Some((name.to_string(), Some(rest.trim().to_string()))),
            None => Some((trimmed.to_string(), None)),
        }
    }
}

#[async_trait]
impl EcosystemAdapter for CondaEcosystem {
    fn id(&self) -> &'static str {
        "conda"
    }

    fn display_name(&self) -> &'static str {
        "Conda"
    }

    fn parse_reference(&self, raw: &str) -> Result<PackageRef> {
        let spec = MatchSpec::parse(raw).map_err(|e| CoreError::InvalidReference(e.to_string()))?;
        let mut package_ref = PackageRef::new(EcosystemKind::Conda, spec.name);
        if let Some(version_spec) = spec.version_spec {
            package_ref = package_ref.with_version(version_spec);
        }
        Ok(package_ref)
    }

    fn registry(&self) -> Arc<dyn Registry> {
        Arc::clone(&self.registry) as Arc<dyn Registry>
    }

    async fn resolve(&self, root: &PackageRef, target: &TargetPlatform) -> Result<DependencyGraphResult> {
        let skipper = Skipper::new(DEFAULT_MAX_DEPTH);
        let mut result = DependencyGraphResult::default();

        struct Pending {
            name: String,
            version_spec: Option<String>,
            depth: u32,
            sequence: u64,
            parent_path: Vec<String>,
        }

        let mut queue: VecDeque<Pending> = VecDeque::new();
        queue.push_back(Pending {
            name: root.name.clone(),
            version_spec: root.version.clone(),
            depth: 0,
            sequence: skipper.next_sequence(),
            parent_path: vec![],
        });

        let mut nodes: Vec<DependencyNode> = Vec::new();

        while let Some(item) = queue.pop_front() {
            if is_system_package(&item.name) {
                continue;
            }

            let spec = MatchSpec {
                channel: None,
                name: item.name.clone(),
                version_spec: item.version_spec.clone(),
                build: None,
            };

            let record = match self.registry.resolve_candidate(&spec, target.python_version.as_deref()).await {
                Ok(Some(r)) => r,
                Ok(None) => {
                    result.failed.push(FailedPackage {
                        reference: format!("conda:{}", item.name),
                        error: format!("no build of {} satisfies the requested match spec", item.name),
                    });
                    continue;
                }
                Err(err) => {
                    result.failed.push(FailedPackage {
                        reference: format!("conda:{}", item.name),
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            let verdict = skipper.skip_resolution(&item.name, &record.version, item.depth, item.sequence, &item.parent_path);
            if verdict.skip {
                continue;
            }
            skipper.record_resolved(&item.name, &record.version, item.depth, item.sequence);

            let subdir = self.registry.subdir_of(&record).await.to_string();
            let checksum = record
                .sha256
                .clone()
                .map(|hex| Checksum { kind: ChecksumKind::Sha256, hex })
                .or_else(|| record.md5.clone().map(|hex| Checksum { kind: ChecksumKind::Md5, hex }));

            let resolved_pkg = ResolvedPackage {
                ecosystem: EcosystemKind::Conda,
                name: item.name.clone(),
                version: record.version.clone(),
                download_url: self.registry.package_download_url(&record, &subdir),
                checksum,
                size_bytes: record.size,
                source_registry: self.registry.channel().to_string(),
                metadata: HashMap::from([
                    ("build".to_string(), record.build.clone()),
                    ("build_number".to_string(), record.build_number.to_string()),
                    ("subdir".to_string(), subdir),
                    ("filename".to_string(), record.filename.clone()),
                ]),
            };

            result.flat_list.push(resolved_pkg.clone());

            let mut child_path = item.parent_path.clone();
            child_path.push(item.name.to_lowercase());

            for dep_str in &record.depends {
                let Some((dep_name, dep_spec)) = Self::parse_dependency(dep_str) else {
                    continue;
                };
                if is_system_package(&dep_name) {
                    continue;
                }
                let sequence = skipper.next_sequence();
                queue.push_back(Pending {
                    name: dep_name,
                    version_spec: dep_spec,
                    depth: item.depth + 1,
                    sequence,
                    parent_path: child_path.clone(),
                });
            }

            nodes.push(DependencyNode {
                pkg: resolved_pkg,
                children: Vec::new(),
                scope: None,
                optional: false,
                depth: item.depth,
                sequence: item.sequence,
            });
        }

        result.conflicts = skipper
            .conflicts()
            .into_iter()
            .map(|c| depssmuggler_core::Conflict {
                name: c.name,
                contending_versions: c.contending_versions,
                winner: c.winner,
                reason: "nearest-definition-wins".to_string(),
            })
            .collect();
        result.roots = nodes;

        Ok(result)
    }

    async fn download(&self, pkg: &ResolvedPackage, dest_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dest_dir)?;
        let filename = pkg
            .metadata
            .get("filename")
            .cloned()
            .unwrap_or_else(|| format!("{}-{}.tar.bz2", pkg.name, pkg.version));
        let dest_path = dest_dir.join(&filename);

        self.client.download_to_file(&pkg.download_url, &dest_path, |_tick| {}).await?;

        if let Some(checksum) = &pkg.checksum {
            depssmuggler_core::verify_file(&dest_path, checksum)?;
        }

        Ok(dest_path)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Picks the conda subdir for a target platform, falling back to
/// `linux-64` when the platform is unset (e.g. a plain `resolve` without
/// `--target-os`).
pub fn default_subdir(target: &TargetPlatform) -> &'static str {
    match (&target.os, &target.arch) {
        (Some(os), Some(arch)) => subdir_for_target(os, arch),
        (Some(os), None) => subdir_for_target(os, "x86_64"),
        _ => "linux-64",
    }
}
