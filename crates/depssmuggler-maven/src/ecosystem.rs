//! Maven ecosystem adapter: breadth-first resolution with "nearest
//! definition wins" (the shared Skipper kernel), parent-POM property
//! inheritance, `dependencyManagement`-seeded versions including recursive
//! BOM import, scope-transitivity filtering, and `.m2`-layout artifact
//! download with SHA-1 sidecar verification.

use crate::coordinate::{self, Coordinate};
use crate::error::{MavenError, Result};
use crate::pom::Dependency;
use crate::registry::MavenRegistry;
use async_trait::async_trait;
use depssmuggler_core::{
    Checksum, ChecksumKind, CoreError, DependencyGraphResult, DependencyNode, DependencyScope,
    Ecosystem as EcosystemKind, EcosystemAdapter, FailedPackage, PackageRef, Registry, ResolvedPackage, Skipper,
    TargetPlatform,
};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default cap on Maven's transitive closure depth.
const DEFAULT_MAX_DEPTH: u32 = 20;
/// Guards the parent-POM chain against malformed corporate repos that
/// declare a parent cycle; POM inheritance chains in practice run only a
/// few levels deep.
const MAX_PARENT_CHAIN: usize = 20;

pub struct MavenEcosystem {
    registry: Arc<MavenRegistry>,
    client: depssmuggler_core::RegistryClientPool,
    /// Whether `optional=true` (and test/provided/system scoped)
    /// dependencies are still walked transitively. Off by default, per
    /// Maven's own transitivity rules.
    include_optional: bool,
}

/// One POM's fully-inherited view: merged (child-overrides-parent)
/// properties, the effective `dependencyManagement` map (including BOM
/// imports and the parent chain's own management entries), and this POM's
/// own direct `<dependencies>` with `${...}` placeholders already resolved.
struct PomContext {
    packaging: String,
    properties: HashMap<String, String>,
    dependency_management: HashMap<String, String>,
    dependencies: Vec<Dependency>,
}

impl MavenEcosystem {
    pub fn new(registry: Arc<MavenRegistry>) -> Self {
        Self {
            registry,
            client: depssmuggler_core::RegistryClientPool::new(),
            include_optional: false,
        }
    }

    pub fn with_include_optional(mut self, include_optional: bool) -> Self {
        self.include_optional = include_optional;
        self
    }

    /// Loads `coord@version`'s POM plus its full parent chain, merging
    /// properties (child overrides parent) and resolving `${...}`
    /// placeholders — including `${project.version}`/`${pom.groupId}`-style
    /// self-references, which always resolve to the *referring* POM's own
    /// coordinate, never an ancestor's — with up to 10 substitution passes.
    async fn load_context(&self, coord: &Coordinate, version: &str) -> Result<PomContext> {
        self.load_context_inner(coord, version, &mut Vec::new()).await
    }

    /// Boxed because the parent-chain and BOM-import walks both call back
    /// into this method; `async fn` can't recurse directly since its
    /// future's type would be infinitely sized.
    fn load_context_inner<'a>(
        &'a self,
        coord: &'a Coordinate,
        version: &'a str,
        visited: &'a mut Vec<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<PomContext>> + Send + 'a>> {
        Box::pin(async move { self.load_context_body(coord, version, visited).await })
    }

    async fn load_context_body(&self, coord: &Coordinate, version: &str, visited: &mut Vec<String>) -> Result<PomContext> {
        let self_key = format!("{}:{}", coord.ga(), version);
        if visited.contains(&self_key) || visited.len() >= MAX_PARENT_CHAIN {
            return Err(MavenError::ParentCycle(self_key));
        }
        visited.push(self_key.clone());

        let pom = self.registry.fetch_pom(coord, version).await?;

        let group_id = pom.group_id.clone().unwrap_or_else(|| coord.group_id.clone());
        let artifact_id = pom.artifact_id.clone().unwrap_or_else(|| coord.artifact_id.clone());
        let effective_version = pom.version.clone().unwrap_or_else(|| version.to_string());
        let packaging = pom.packaging.clone().unwrap_or_else(|| "jar".to_string());

        let parent_ctx = match &pom.parent {
            Some(parent) => {
                let parent_coord = Coordinate::new(parent.group_id.clone(), parent.artifact_id.clone());
                self.load_context_inner(&parent_coord, &parent.version, visited).await.ok()
            }
            None => None,
        };

        let mut properties: HashMap<String, String> = parent_ctx
            .as_ref()
            .map(|p| p.properties.clone())
            .unwrap_or_default();
        for (k, v) in &pom.properties {
            properties.insert(k.clone(), v.clone());
        }
        let properties = resolve_properties(properties, (&group_id, &artifact_id, &effective_version));

        let self_coord_ref = (group_id.as_str(), artifact_id.as_str(), effective_version.as_str());

        let mut dependency_management: HashMap<String, String> = HashMap::new();
        let mut pending_imports: Vec<(Coordinate, String)> = Vec::new();
        for dep in &pom.dependency_management {
            let dep_version = dep.version.as_deref().map(|v| substitute(v, &properties, self_coord_ref));
            let is_import = dep.scope.as_deref() == Some("import") && dep.dep_type.as_deref() == Some("pom");
            if is_import {
                if let Some(v) = dep_version {
                    pending_imports.push((Coordinate::new(dep.group_id.clone(), dep.artifact_id.clone()), v));
                }
                continue;
            }
            if let Some(v) = dep_version {
                dependency_management.entry(Coordinate::new(dep.group_id.clone(), dep.artifact_id.clone()).ga()).or_insert(v);
            }
        }

        // BOM imports are independent of each other and of the parent
        // chain, so they're resolved concurrently.
        let import_futures = pending_imports
            .iter()
            .map(|(bom_coord, bom_version)| {
                let bom_coord = bom_coord.clone();
                let bom_version = bom_version.clone();
                async move {
                    let mut visited = Vec::new();
                    self.load_context_inner(&bom_coord, &bom_version, &mut visited).await
                }
            })
            .collect::<Vec<_>>();
        for result in futures::future::join_all(import_futures).await {
            if let Ok(bom_ctx) = result {
                for (k, v) in bom_ctx.dependency_management {
                    dependency_management.entry(k).or_insert(v);
                }
            }
        }

        if let Some(parent) = &parent_ctx {
            for (k, v) in &parent.dependency_management {
                dependency_management.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }

        let dependencies = pom
            .dependencies
            .iter()
            .map(|dep| Dependency {
                group_id: dep.group_id.clone(),
                artifact_id: dep.artifact_id.clone(),
                version: dep.version.as_deref().map(|v| substitute(v, &properties, self_coord_ref)),
                scope: dep.scope.clone(),
                dep_type: dep.dep_type.clone(),
                classifier: dep.classifier.clone(),
                optional: dep.optional,
                exclusions: dep.exclusions.clone(),
            })
            .collect();

        Ok(PomContext {
            packaging,
            properties,
            dependency_management,
            dependencies,
        })
    }
}

fn parse_scope(raw: Option<&str>) -> DependencyScope {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("runtime") => DependencyScope::Runtime,
        Some("test") => DependencyScope::Test,
        Some("provided") => DependencyScope::Provided,
        Some("system") => DependencyScope::System,
        _ => DependencyScope::Compile,
    }
}

/// Maps Maven packaging to a file extension and the classifier the
/// artifact conventionally carries.
fn packaging_extension(packaging: &str) -> (&'static str, Option<&'static str>) {
    match packaging.to_ascii_lowercase().as_str() {
        "war" => ("war", None),
        "ear" => ("ear", None),
        "rar" => ("rar", None),
        "aar" => ("aar", None),
        "hpi" => ("hpi", None),
        "pom" => ("pom", None),
        "ejb" | "maven-plugin" | "bundle" => ("jar", None),
        "test-jar" => ("jar", Some("tests")),
        "sources" => ("jar", Some("sources")),
        "javadoc" => ("jar", Some("javadoc")),
        _ => ("jar", None),
    }
}

/// Resolves every property's value against the whole map (properties may
/// reference each other), iterating until a fixed point or 10 passes,
/// whichever comes first.
fn resolve_properties(mut props: HashMap<String, String>, self_coord: (&str, &str, &str)) -> HashMap<String, String> {
    for _ in 0..10 {
        let mut changed = false;
        let keys: Vec<String> = props.keys().cloned().collect();
        for key in keys {
            let value = props.get(&key).cloned().unwrap_or_default();
            let substituted = substitute(&value, &props, self_coord);
            if substituted != value {
                props.insert(key, substituted);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    props
}

/// Replaces every `${...}` token in `s`. `project.version`/`pom.version`
/// (and the groupId/artifactId variants) always resolve to `self_coord`,
/// the POM doing the referencing — never an ancestor's coordinate. Unknown
/// keys are left untouched.
fn substitute(s: &str, props: &HashMap<String, String>, self_coord: (&str, &str, &str)) -> String {
    let mut result = String::new();
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                let replacement = match key {
                    "project.version" | "pom.version" => self_coord.2.to_string(),
                    "project.groupId" | "pom.groupId" => self_coord.0.to_string(),
                    "project.artifactId" | "pom.artifactId" => self_coord.1.to_string(),
                    _ => props.get(key).cloned().unwrap_or_else(|| format!("${{{key}}}")),
                };
                result.push_str(&replacement);
                rest = &after[end + 1..];
            }
            None => {
                result.push_str("${");
                rest = after;
                break;
            }
        }
    }
    result.push_str(rest);
    result
}

#[derive(Clone)]
struct Pending {
    coord: Coordinate,
    version_req: Option<String>,
    depth: u32,
    sequence: u64,
    parent_path: Vec<String>,
    effective_scope: DependencyScope,
    optional: bool,
    exclusions: Vec<(String, String)>,
    classifier: Option<String>,
}

#[async_trait]
impl EcosystemAdapter for MavenEcosystem {
    fn id(&self) -> &'static str {
        "maven"
    }

    fn display_name(&self) -> &'static str {
        "Maven"
    }

    fn parse_reference(&self, raw: &str) -> depssmuggler_core::Result<PackageRef> {
        let (coord, version) = coordinate::parse_reference(raw).map_err(CoreError::from)?;
        let mut package_ref = PackageRef::new(EcosystemKind::Maven, coord.ga());
        if let Some(version) = version {
            package_ref = package_ref.with_version(version);
        }
        Ok(package_ref)
    }

    fn registry(&self) -> Arc<dyn Registry> {
        Arc::clone(&self.registry) as Arc<dyn Registry>
    }

    async fn resolve(&self, root: &PackageRef, target: &TargetPlatform) -> depssmuggler_core::Result<DependencyGraphResult> {
        let _ = target; // Maven Central is not platform-partitioned.
        let Some(root_coord) = coordinate::parse_ga(&root.name) else {
            return Err(CoreError::InvalidReference(root.name.clone()));
        };

        let skipper = Skipper::new(DEFAULT_MAX_DEPTH);
        let mut result = DependencyGraphResult::default();
        let mut shared_management: HashMap<String, String> = HashMap::new();

        let root_version = match &root.version {
            Some(v) => crate::version::simplify_range_to_lower_bound(v),
            None => match self.registry.latest_matching(&root_coord, "").await {
                Ok(Some(v)) => v,
                Ok(None) | Err(_) => {
                    result.failed.push(FailedPackage {
                        reference: format!("maven:{}", root_coord.ga()),
                        error: "no version found".to_string(),
                    });
                    return Ok(result);
                }
            },
        };

        let mut queue: VecDeque<Pending> = VecDeque::new();
        queue.push_back(Pending {
            coord: root_coord,
            version_req: Some(root_version),
            depth: 0,
            sequence: skipper.next_sequence(),
            parent_path: vec![],
            effective_scope: DependencyScope::Compile,
            optional: false,
            exclusions: vec![],
            classifier: None,
        });

        let mut nodes: Vec<DependencyNode> = Vec::new();

        while let Some(item) = queue.pop_front() {
            let ga = item.coord.ga();

            let version = match item
                .version_req
                .clone()
                .or_else(|| shared_management.get(&ga).cloned())
            {
                Some(v) => crate::version::simplify_range_to_lower_bound(&v),
                None => {
                    result.failed.push(FailedPackage {
                        reference: format!("maven:{ga}"),
                        error: "no version declared and none found in dependencyManagement".to_string(),
                    });
                    continue;
                }
            };

            let verdict = skipper.skip_resolution(&ga, &version, item.depth, item.sequence, &item.parent_path);
            if verdict.skip {
                continue;
            }
            skipper.record_resolved(&ga, &version, item.depth, item.sequence);

            let context = match self.load_context(&item.coord, &version).await {
                Ok(ctx) => ctx,
                Err(err) => {
                    result.failed.push(FailedPackage {
                        reference: format!("maven:{ga}:{version}"),
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            for (k, v) in context.dependency_management.clone() {
                shared_management.entry(k).or_insert(v);
            }

            let (extension, default_classifier) = packaging_extension(&context.packaging);
            let classifier = item.classifier.clone().or_else(|| default_classifier.map(String::from));

            let sha1 = self.registry.fetch_sha1(&item.coord, &version, classifier.as_deref(), extension).await;
            let download_url = self.registry.artifact_url(&item.coord, &version, classifier.as_deref(), extension);
            let filename = download_url.rsplit('/').next().unwrap_or_default().to_string();

            let resolved_pkg = ResolvedPackage {
                ecosystem: EcosystemKind::Maven,
                name: ga.clone(),
                version: version.clone(),
                download_url,
                checksum: sha1.map(|hex| Checksum { kind: ChecksumKind::Sha1, hex }),
                size_bytes: None,
                source_registry: "maven-central".to_string(),
                metadata: HashMap::from([
                    ("packaging".to_string(), context.packaging.clone()),
                    ("filename".to_string(), filename),
                    ("classifier".to_string(), classifier.clone().unwrap_or_default()),
                ]),
            };

            result.flat_list.push(resolved_pkg.clone());

            let mut child_path = item.parent_path.clone();
            child_path.push(ga.to_lowercase());

            if context.packaging.eq_ignore_ascii_case("pom") {
                // A POM-packaged node (BOM/parent depended on directly)
                // carries no further runtime dependencies to install.
                nodes.push(DependencyNode {
                    pkg: resolved_pkg,
                    children: Vec::new(),
                    scope: Some(item.effective_scope),
                    optional: item.optional,
                    depth: item.depth,
                    sequence: item.sequence,
                });
                continue;
            }

            for dep in &context.dependencies {
                let dep_ga = Coordinate::new(dep.group_id.clone(), dep.artifact_id.clone());
                if item.exclusions.iter().any(|(g, a)| g == &dep.group_id && a == &dep.artifact_id) {
                    continue;
                }

                let declared_scope = parse_scope(dep.scope.as_deref());
                let excluded_scope = matches!(declared_scope, DependencyScope::Test | DependencyScope::Provided | DependencyScope::System);
                if (excluded_scope || dep.optional) && !self.include_optional {
                    continue;
                }

                let Some(new_scope) = DependencyScope::transitive(item.effective_scope, declared_scope) else {
                    continue;
                };

                let mut child_exclusions = item.exclusions.clone();
                child_exclusions.extend(dep.exclusions.iter().cloned());

                queue.push_back(Pending {
                    coord: dep_ga,
                    version_req: dep.version.clone(),
                    depth: item.depth + 1,
                    sequence: skipper.next_sequence(),
                    parent_path: child_path.clone(),
                    effective_scope: new_scope,
                    optional: dep.optional || item.optional,
                    exclusions: child_exclusions,
                    classifier: dep.classifier.clone(),
                });
            }

            nodes.push(DependencyNode {
                pkg: resolved_pkg,
                children: Vec::new(),
                scope: Some(item.effective_scope),
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

    async fn download(&self, pkg: &ResolvedPackage, dest_dir: &Path) -> depssmuggler_core::Result<PathBuf> {
        let coord = coordinate::parse_ga(&pkg.name).ok_or_else(|| CoreError::InvalidReference(pkg.name.clone()))?;
        let m2_dir = dest_dir.join(coord.group_path()).join(&coord.artifact_id).join(&pkg.version);
        std::fs::create_dir_all(&m2_dir)?;

        let filename = pkg
            .metadata
            .get("filename")
            .cloned()
            .unwrap_or_else(|| format!("{}-{}.jar", coord.artifact_id, pkg.version));
        let dest_path = m2_dir.join(&filename);

        self.client.download_to_file(&pkg.download_url, &dest_path, |_tick| {}).await?;

        if let Some(checksum) = &pkg.checksum {
            depssmuggler_core::verify_file(&dest_path, checksum)?;
        }

        let is_pom_artifact = pkg.metadata.get("packaging").map(String::as_str) == Some("pom");
        if !is_pom_artifact {
            let pom_url = self.registry.pom_url(&coord, &pkg.version);
            let pom_path = m2_dir.join(format!("{}-{}.pom", coord.artifact_id, pkg.version));
            let _ = self.client.download_to_file(&pom_url, &pom_path, |_tick| {}).await;
        }

        Ok(dest_path)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
