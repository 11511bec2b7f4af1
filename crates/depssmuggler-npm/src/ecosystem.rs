//! npm ecosystem adapter: parses `name@range` references, resolves the
//! transitive `dependencies` closure into a hoisted `node_modules` tree,
//! and downloads the selected tarball with integrity verification.

use crate::hoisting::HoistTree;
use crate::registry::NpmRegistry;
use async_trait::async_trait;
use depssmuggler_core::{
    CoreError, DependencyGraphResult, DependencyNode, Ecosystem as EcosystemKind, EcosystemAdapter, FailedPackage,
    PackageRef, Registry, ResolvedPackage, Result, Skipper, TargetPlatform,
};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// npm's own resolver doesn't cap depth; a generous cap guards against
/// pathological or cyclic packuments without affecting any real tree.
const DEFAULT_MAX_DEPTH: u32 = 50;

pub struct NpmEcosystem {
    registry: Arc<NpmRegistry>,
    client: depssmuggler_core::RegistryClientPool,
}

impl NpmEcosystem {
    pub fn new(registry: Arc<NpmRegistry>) -> Self {
        Self {
            registry,
            client: depssmuggler_core::RegistryClientPool::new(),
        }
    }

    /// Splits `name@range` (or scoped `@scope/name@range`) into its parts.
    /// The `@` separating a scope from the package name is not a version
    /// delimiter, so only the last `@` is considered, and never the first
    /// character.
    fn parse_reference_parts(raw: &str) -> (String, Option<String>) {
        let bytes = raw.as_bytes();
        for idx in (1..bytes.len()).rev() {
            if bytes[idx] == b'@' {
                let (name, range) = raw.split_at(idx);
                return (name.to_string(), Some(range[1..].to_string()));
            }
        }
        (raw.to_string(), None)
    }
}

#[async_trait]
impl EcosystemAdapter for NpmEcosystem {
    fn id(&self) -> &'static str {
        "npm"
    }

    fn display_name(&self) -> &'static str {
        "npm"
    }

    fn parse_reference(&self, raw: &str) -> Result<PackageRef> {
        let (name, version_req) = Self::parse_reference_parts(raw.trim());
        if name.is_empty() {
            return Err(CoreError::InvalidReference(raw.to_string()));
        }
        let mut package_ref = PackageRef::new(EcosystemKind::Npm, name);
        if let Some(version) = version_req {
            package_ref = package_ref.with_version(version);
        }
        Ok(package_ref)
    }

    fn registry(&self) -> Arc<dyn Registry> {
        Arc::clone(&self.registry) as Arc<dyn Registry>
    }

    async fn resolve(&self, root: &PackageRef, target: &TargetPlatform) -> Result<DependencyGraphResult> {
        let _ = target; // npm's registry is not platform-partitioned.
        let skipper = Skipper::new(DEFAULT_MAX_DEPTH);
        let mut tree = HoistTree::new();
        let mut result = DependencyGraphResult::default();

        struct Pending {
            name: String,
            version_req: Option<String>,
            depth: u32,
            sequence: u64,
            parent_path: Vec<String>,
            optional: bool,
        }

        let mut queue: VecDeque<Pending> = VecDeque::new();
        queue.push_back(Pending {
            name: root.name.clone(),
            version_req: root.version.clone(),
            depth: 0,
            sequence: skipper.next_sequence(),
            parent_path: vec![],
            optional: false,
        });

        let mut nodes: Vec<DependencyNode> = Vec::new();

        while let Some(item) = queue.pop_front() {
            let req = item.version_req.clone().unwrap_or_default();
            let version_result = self.registry.get_latest_matching(&item.name, &req).await;

            let version_obj = match version_result {
                Ok(Some(v)) => v,
                Ok(None) => {
                    if !item.optional {
                        result.failed.push(FailedPackage {
                            reference: format!("npm:{}@{}", item.name, req),
                            error: format!("no version of {} satisfies '{}'", item.name, req),
                        });
                    }
                    continue;
                }
                Err(err) => {
                    if !item.optional {
                        result.failed.push(FailedPackage {
                            reference: format!("npm:{}@{}", item.name, req),
                            error: err.to_string(),
                        });
                    }
                    continue;
                }
            };
            let version = version_obj.version_string().to_string();

            let verdict = skipper.skip_resolution(&item.name, &version, item.depth, item.sequence, &item.parent_path);
            if verdict.skip {
                continue;
            }
            skipper.record_resolved(&item.name, &version, item.depth, item.sequence);

            let packument = match self.registry.fetch_packument(&item.name).await {
                Ok(p) => p,
                Err(err) => {
                    if !item.optional {
                        result.failed.push(FailedPackage {
                            reference: format!("npm:{}@{}", item.name, version),
                            error: err.to_string(),
                        });
                    }
                    continue;
                }
            };

            let Some(version_meta) = packument.versions.get(&version) else {
                result.failed.push(FailedPackage {
                    reference: format!("npm:{}@{}", item.name, version),
                    error: "resolved version missing from packument".to_string(),
                });
                continue;
            };

            let placement = tree.place(&item.name, &version, &item.parent_path, |existing| existing == version);

            let resolved_pkg = ResolvedPackage {
                ecosystem: EcosystemKind::Npm,
                name: item.name.clone(),
                version: version.clone(),
                download_url: version_meta.dist.tarball.clone(),
                checksum: version_meta
                    .dist
                    .integrity
                    .clone()
                    .map(|hex| depssmuggler_core::Checksum {
                        kind: depssmuggler_core::ChecksumKind::Sha256,
                        hex,
                    })
                    .or_else(|| {
                        version_meta.dist.shasum.clone().map(|hex| depssmuggler_core::Checksum {
                            kind: depssmuggler_core::ChecksumKind::Sha1,
                            hex,
                        })
                    }),
                size_bytes: None,
                source_registry: "npm".to_string(),
                metadata: HashMap::from([
                    ("installPath".to_string(), HoistTree::render_path(&placement.path)),
                    ("hoisted".to_string(), placement.hoisted.to_string()),
                ]),
            };

            if !placement.hoisted {
                result.flat_list.push(resolved_pkg.clone());
            }

            let mut child_sequences = Vec::new();
            let mut push_children = |deps: &HashMap<String, String>, optional: bool, queue: &mut VecDeque<Pending>| {
                for (dep_name, dep_range) in deps {
                    let sequence = skipper.next_sequence();
                    child_sequences.push(sequence);
                    queue.push_back(Pending {
                        name: dep_name.clone(),
                        version_req: Some(dep_range.clone()),
                        depth: item.depth + 1,
                        sequence,
                        parent_path: placement.path.clone(),
                        optional,
                    });
                }
            };
            push_children(&version_meta.dependencies, false, &mut queue);
            push_children(&version_meta.optional_dependencies, true, &mut queue);

            nodes.push(DependencyNode {
                pkg: resolved_pkg,
                children: Vec::new(),
                scope: None,
                optional: item.optional,
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
        let filename = format!("{}-{}.tgz", pkg.name.replace('/', "-"), pkg.version);
        let dest_path = dest_dir.join(&filename);

        self.client.download_to_file(&pkg.download_url, &dest_path, |_tick| {}).await?;

        if let Some(checksum) = &pkg.checksum {
            // `integrity` (subresource integrity, base64) doesn't fit the
            // hex-digest verifier; only the legacy `shasum` hex digest is
            // checked here.
            if checksum.hex.chars().all(|c| c.is_ascii_hexdigit()) {
                depssmuggler_core::verify_file(&dest_path, checksum)?;
            }
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

    #[test]
    fn parse_reference_parts_splits_plain_name_and_range() {
        let (name, range) = NpmEcosystem::parse_reference_parts("express@^4.18.2");
        assert_eq!(name, "express");
        assert_eq!(range.as_deref(), Some("^4.18.2"));
    }

    #[test]
    fn parse_reference_parts_handles_scoped_package_without_range() {
        let (name, range) = NpmEcosystem::parse_reference_parts("@babel/core");
        assert_eq!(name, "@babel/core");
        assert_eq!(range, None);
    }

    #[test]
    fn parse_reference_parts_handles_scoped_package_with_range() {
        let (name, range) = NpmEcosystem::parse_reference_parts("@babel/core@^7.22.0");
        assert_eq!(name, "@babel/core");
        assert_eq!(range.as_deref(), Some("^7.22.0"));
    }

    #[test]
    fn parse_reference_builds_package_ref() {
        let eco = NpmEcosystem::new(Arc::new(NpmRegistry::new(
            "https://registry.npmjs.org",
            Arc::new(depssmuggler_core::TwoTierCache::new(None)),
        )));
        let reference = eco.parse_reference("left-pad@1.3.0").unwrap();
        assert_eq!(reference.name, "left-pad");
        assert_eq!(reference.version.as_deref(), Some("1.3.0"));
    }
}
