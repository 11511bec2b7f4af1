//! PyPI ecosystem adapter: parses `pip`-style references, resolves their
//! transitive `requires_dist` closure against the target platform using the
//! shared breadth-first Skipper kernel, and downloads the selected wheel or
//! sdist with checksum verification.

use crate::markers;
use crate::registry::PypiRegistry;
use crate::types::select_artifact;
use crate::version;
use async_trait::async_trait;
use depssmuggler_core::{
    CoreError, DependencyGraphResult, DependencyNode, Ecosystem as EcosystemKind, EcosystemAdapter, FailedPackage,
    PackageRef, Registry, ResolvedPackage, Result, Skipper, TargetPlatform,
};
use pep508_rs::{Requirement, VersionOrUrl};
use std::any::Any;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Default depth cap for pip's transitive closure. The spec names explicit
/// defaults for Maven (20) and Conda/YUM (10) but not pip; Python dependency
/// chains run shallower than Maven's, so the Maven default is reused rather
/// than inventing a new constant.
const DEFAULT_MAX_DEPTH: u32 = 20;

pub struct PypiEcosystem {
    registry: Arc<PypiRegistry>,
    client: depssmuggler_core::RegistryClientPool,
}

impl PypiEcosystem {
    pub fn new(registry: Arc<PypiRegistry>) -> Self {
        Self {
            registry,
            client: depssmuggler_core::RegistryClientPool::new(),
        }
    }

    /// Splits a PEP 508 requirement string on its (unbracketed) `;` marker
    /// separator, so the marker text can be evaluated without depending on
    /// `pep508_rs`'s marker-tree API surface.
    fn split_marker(raw: &str) -> (&str, Option<&str>) {
        match raw.split_once(';') {
            Some((requirement, marker)) => (requirement.trim(), Some(marker.trim())),
            None => (raw.trim(), None),
        }
    }

    fn parse_requirement(raw: &str) -> Result<(String, Option<String>, Vec<String>)> {
        let (requirement_part, _marker) = Self::split_marker(raw);
        let requirement = Requirement::from_str(requirement_part)
            .map_err(|e| CoreError::InvalidReference(format!("{raw}: {e}")))?;

        let name = requirement.name.to_string();
        let extras: Vec<String> = requirement.extras.into_iter().map(|e| e.to_string()).collect();
        let version_req = match requirement.version_or_url {
            Some(VersionOrUrl::VersionSpecifier(specs)) => Some(specs.to_string()),
            Some(VersionOrUrl::Url(_)) | None => None,
        };

        Ok((name, version_req, extras))
    }
}

#[async_trait]
impl EcosystemAdapter for PypiEcosystem {
    fn id(&self) -> &'static str {
        "pip"
    }

    fn display_name(&self) -> &'static str {
        "Python (PyPI)"
    }

    fn parse_reference(&self, raw: &str) -> Result<PackageRef> {
        let (name, version_req, extras) =
            Self::parse_requirement(raw).or_else(|_| -> Result<(String, Option<String>, Vec<String>)> {
                // Plain `name==version` without PEP 508 extras/markers; fall
                // back to a direct split so simple CLI input still works.
                for op in ["==", ">=", "<=", "~=", "!=", ">", "<"] {
                    if let Some((name, version)) = raw.split_once(op) {
                        return Ok((name.trim().to_string(), Some(format!("{op}{}", version.trim())), vec![]));
                    }
                }
                Ok((raw.trim().to_string(), None, vec![]))
            })?;

        let mut package_ref = PackageRef::new(EcosystemKind::Pip, name);
        package_ref.extras = extras;
        if let Some(version) = version_req {
            package_ref = package_ref.with_version(version);
        }
        Ok(package_ref)
    }

    fn registry(&self) -> Arc<dyn Registry> {
        Arc::clone(&self.registry) as Arc<dyn Registry>
    }

    async fn resolve(&self, root: &PackageRef, target: &TargetPlatform) -> Result<DependencyGraphResult> {
        let skipper = Skipper::new(DEFAULT_MAX_DEPTH);
        let mut result = DependencyGraphResult::default();

        #[derive(Clone)]
        struct Pending {
            name: String,
            version_req: Option<String>,
            depth: u32,
            sequence: u64,
            parent_path: Vec<String>,
        }

        let mut queue: VecDeque<Pending> = VecDeque::new();
        queue.push_back(Pending {
            name: root.name.clone(),
            version_req: root.version.clone(),
            depth: 0,
            sequence: skipper.next_sequence(),
            parent_path: vec![],
        });

        let mut nodes: Vec<DependencyNode> = Vec::new();

        while let Some(item) = queue.pop_front() {
            let resolved_version = match &item.version_req {
                Some(req) if version::parse_specifiers(req).is_ok() => {
                    let specifiers = version::parse_specifiers(req)?;
                    self.registry
                        .get_latest_matching(&item.name, &specifiers.to_string())
                        .await
                }
                _ => self.registry.get_latest_matching(&item.name, "").await,
            };

            let version_obj = match resolved_version {
                Ok(Some(v)) => v,
                Ok(None) => {
                    result.failed.push(FailedPackage {
                        reference: format!("pip:{}", item.name),
                        error: format!("no release of {} matches the requested version", item.name),
                    });
                    continue;
                }
                Err(err) => {
                    result.failed.push(FailedPackage {
                        reference: format!("pip:{}", item.name),
                        error: err.to_string(),
                    });
                    continue;
                }
            };
            let version = version_obj.version_string().to_string();

            let verdict = skipper.skip_resolution(&item.name, &version, item.depth, item.sequence, &item.parent_path);
            if verdict.skip {
                continue;
            }
            skipper.record_resolved(&item.name, &version, item.depth, item.sequence);

            let project_version = match self.registry.fetch_project_version(&item.name, &version).await {
                Ok(p) => p,
                Err(err) => {
                    result.failed.push(FailedPackage {
                        reference: format!("pip:{}=={}", item.name, version),
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            let artifact = select_artifact(&project_version.urls, target);
            let resolved_pkg = match artifact {
                Some(file) => ResolvedPackage {
                    ecosystem: EcosystemKind::Pip,
                    name: item.name.clone(),
                    version: version.clone(),
                    download_url: file.url.clone(),
                    checksum: file
                        .digests
                        .sha256
                        .clone()
                        .map(|hex| depssmuggler_core::Checksum {
                            kind: depssmuggler_core::ChecksumKind::Sha256,
                            hex,
                        })
                        .or_else(|| {
                            file.digests.md5.clone().map(|hex| depssmuggler_core::Checksum {
                                kind: depssmuggler_core::ChecksumKind::Md5,
                                hex,
                            })
                        }),
                    size_bytes: file.size,
                    source_registry: "pypi".to_string(),
                    metadata: std::collections::HashMap::from([
                        ("packagetype".to_string(), file.packagetype.clone()),
                        ("filename".to_string(), file.filename.clone()),
                    ]),
                },
                None => {
                    result.failed.push(FailedPackage {
                        reference: format!("pip:{}=={}", item.name, version),
                        error: format!("no wheel or sdist artifact available for {}=={}", item.name, version),
                    });
                    continue;
                }
            };

            result.flat_list.push(resolved_pkg.clone());

            let mut child_path = item.parent_path.clone();
            child_path.push(item.name.to_lowercase());

            let mut child_sequences = Vec::new();
            if let Some(requires) = &project_version.info.requires_dist {
                for dep_str in requires {
                    let (requirement_part, marker) = Self::split_marker(dep_str);
                    if let Some(marker_text) = marker {
                        if markers::excludes(marker_text, target) {
                            continue;
                        }
                    }
                    let Ok((dep_name, dep_req, _extras)) = Self::parse_requirement(requirement_part) else {
                        continue;
                    };
                    let sequence = skipper.next_sequence();
                    child_sequences.push(sequence);
                    queue.push_back(Pending {
                        name: dep_name,
                        version_req: dep_req,
                        depth: item.depth + 1,
                        sequence,
                        parent_path: child_path.clone(),
                    });
                }
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
            .unwrap_or_else(|| format!("{}-{}.tar.gz", pkg.name, pkg.version));
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reference_handles_pep508_with_extras_and_specifier() {
        let (name, req, extras) = PypiEcosystem::parse_requirement("requests[security]>=2.28.0,<3.0").unwrap();
        assert_eq!(name, "requests");
        assert_eq!(extras, vec!["security".to_string()]);
        assert!(req.unwrap().contains("2.28.0"));
    }

    #[test]
    fn split_marker_separates_requirement_from_marker_text() {
        let (requirement, marker) = PypiEcosystem::split_marker("numpy>=1.24; python_version>='3.9'");
        assert_eq!(requirement, "numpy>=1.24");
        assert_eq!(marker, Some("python_version>='3.9'"));
    }

    #[test]
    fn split_marker_handles_plain_requirement() {
        let (requirement, marker) = PypiEcosystem::split_marker("flask");
        assert_eq!(requirement, "flask");
        assert_eq!(marker, None);
    }

    #[test]
    fn parse_reference_falls_back_to_simple_split_on_pep508_failure() {
        let eco = PypiEcosystem::new(Arc::new(PypiRegistry::new(
            "https://pypi.org",
            Arc::new(depssmuggler_core::TwoTierCache::new(None)),
        )));
        let reference = eco.parse_reference("###not-a-name###==1.0").unwrap();
        assert_eq!(reference.version.as_deref(), Some("==1.0"));
    }
}
