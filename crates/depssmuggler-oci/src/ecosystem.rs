//! OCI/Docker ecosystem adapter: image references have no transitive
//! dependency graph the way package ecosystems do, so `resolve` is a
//! single-node lookup (manifest fetch + platform selection) rather than a
//! BFS; `download` pulls config and every layer blob, synthesizes a
//! docker-load `manifest.json`, and tars the staging directory into
//! `<repo>-<sanitized-tag>.tar`.

use crate::registry::OciRegistry;
use crate::types::{parse_reference, DockerLoadEntry, ImageReference};
use async_trait::async_trait;
use depssmuggler_core::{
    DependencyGraphResult, DependencyNode, Ecosystem as EcosystemKind, EcosystemAdapter, Metadata, PackageRef,
    Registry, ResolvedPackage, Result, TargetPlatform, Version,
};
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One tag, wrapped to satisfy [`Version`]. OCI tags have no yanked
/// concept; `is_yanked` is always `false`.
struct ImageTag(String);

impl Version for ImageTag {
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

struct ImageMetadata {
    name: String,
    latest_tag: String,
}

impl Metadata for ImageMetadata {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> Option<&str> {
        None
    }
    fn latest_version(&self) -> &str {
        &self.latest_tag
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Wraps [`OciRegistry`] behind the cross-ecosystem [`Registry`] trait.
/// Since the registry's actual methods take an [`ImageReference`] rather
/// than a bare name, this wrapper is bound to one image's registry/tag
/// namespace at construction and ignores the `name` argument on calls
/// that only make sense per-repository.
pub struct OciRegistryAdapter {
    inner: Arc<OciRegistry>,
    default_registry: String,
}

impl OciRegistryAdapter {
    pub fn new(inner: Arc<OciRegistry>, default_registry: impl Into<String>) -> Self {
        Self {
            inner,
            default_registry: default_registry.into(),
        }
    }

    fn image_for(&self, name: &str) -> Result<ImageReference> {
        parse_reference(name).map_err(Into::into)
    }
}

#[async_trait]
impl Registry for OciRegistryAdapter {
    async fn get_versions(&self, name: &str) -> Result<Vec<Box<dyn Version>>> {
        let image = self.image_for(name)?;
        let tags = self.inner.list_tags(&image).await?;
        Ok(tags.into_iter().map(|t| Box::new(ImageTag(t)) as Box<dyn Version>).collect())
    }

    async fn get_latest_matching(&self, name: &str, req: &str) -> Result<Option<Box<dyn Version>>> {
        if !req.is_empty() {
            return Ok(Some(Box::new(ImageTag(req.to_string()))));
        }
        let image = self.image_for(name)?;
        let tags = self.inner.list_tags(&image).await?;
        Ok(tags
            .into_iter()
            .find(|t| t == "latest")
            .or_else(|| Some("latest".to_string()))
            .map(|t| Box::new(ImageTag(t)) as Box<dyn Version>))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Box<dyn Metadata>>> {
        let names = self.inner.search(&self.default_registry, query, limit).await?;
        Ok(names
            .into_iter()
            .map(|name| {
                Box::new(ImageMetadata {
                    name,
                    latest_tag: "latest".to_string(),
                }) as Box<dyn Metadata>
            })
            .collect())
    }

    fn package_url(&self, name: &str) -> String {
        format!("https://hub.docker.com/r/{name}")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct OciEcosystem {
    registry_adapter: Arc<OciRegistryAdapter>,
    registry: Arc<OciRegistry>,
}

impl OciEcosystem {
    pub fn new(registry: Arc<OciRegistry>, default_registry: impl Into<String>) -> Self {
        let default_registry = default_registry.into();
        Self {
            registry_adapter: Arc::new(OciRegistryAdapter::new(Arc::clone(&registry), default_registry)),
            registry,
        }
    }
}

#[async_trait]
impl EcosystemAdapter for OciEcosystem {
    fn id(&self) -> &'static str {
        "docker"
    }

    fn display_name(&self) -> &'static str {
        "Docker/OCI"
    }

    fn parse_reference(&self, raw: &str) -> Result<PackageRef> {
        let image = parse_reference(raw)?;
        let name = format!("{}/{}", image.registry, image.repository);
        Ok(PackageRef::new(EcosystemKind::Docker, name).with_version(image.tag))
    }

    fn registry(&self) -> Arc<dyn Registry> {
        Arc::clone(&self.registry_adapter) as Arc<dyn Registry>
    }

    /// A Docker image has no transitive dependency graph the way the
    /// other ecosystems do; this resolves one image to one
    /// [`ResolvedPackage`] node carrying the manifest's config digest,
    /// layer digests, and size so the orchestrator can download it like
    /// any other package.
    async fn resolve(&self, root: &PackageRef, target: &TargetPlatform) -> Result<DependencyGraphResult> {
        let mut result = DependencyGraphResult::default();
        let raw = match &root.version {
            Some(tag) => format!("{}:{}", root.name, tag),
            None => root.name.clone(),
        };
        let image = match parse_reference(&raw) {
            Ok(image) => image,
            Err(err) => {
                result.failed.push(depssmuggler_core::FailedPackage {
                    reference: raw,
                    error: err.to_string(),
                });
                return Ok(result);
            }
        };

        let os = target.os.as_deref().unwrap_or("linux");
        let arch = target.arch.as_deref().unwrap_or("amd64");

        let (manifest, digest) = match self.registry.fetch_manifest(&image, os, arch).await {
            Ok(pair) => pair,
            Err(err) => {
                result.failed.push(depssmuggler_core::FailedPackage {
                    reference: image.to_string(),
                    error: depssmuggler_core::CoreError::from(err).to_string(),
                });
                return Ok(result);
            }
        };

        let size_bytes: u64 = manifest.config.size + manifest.layers.iter().map(|l| l.size).sum::<u64>();
        let mut metadata = HashMap::new();
        metadata.insert("manifestDigest".to_string(), digest);
        metadata.insert("configDigest".to_string(), manifest.config.digest.clone());
        metadata.insert(
            "layerDigests".to_string(),
            manifest.layers.iter().map(|l| l.digest.clone()).collect::<Vec<_>>().join(","),
        );
        metadata.insert("tag".to_string(), image.tag.clone());
        metadata.insert("os".to_string(), os.to_string());
        metadata.insert("arch".to_string(), arch.to_string());

        let pkg = ResolvedPackage {
            ecosystem: EcosystemKind::Docker,
            name: format!("{}/{}", image.registry, image.repository),
            version: image.tag.clone(),
            download_url: format!("{}/{}", image.registry, image.repository),
            checksum: None,
            size_bytes: Some(size_bytes),
            source_registry: image.registry.clone(),
            metadata,
        };

        result.flat_list.push(pkg.clone());
        result.roots.push(DependencyNode {
            pkg,
            children: Vec::new(),
            scope: None,
            optional: false,
            depth: 0,
            sequence: 0,
        });
        Ok(result)
    }

    /// Downloads the config blob and every layer into a staging
    /// directory, synthesizes `manifest.json` in docker-load format, tars
    /// the staging directory (uncompressed, per the format) into
    /// `<repo>-<sanitized-tag>.tar` under `dest_dir`, and removes the
    /// staging directory.
    async fn download(&self, pkg: &ResolvedPackage, dest_dir: &Path) -> Result<PathBuf> {
        let image = parse_reference(&format!("{}:{}", pkg.name, pkg.version))?;
        // `resolve` already picked the right platform; reuse it rather
        // than re-deriving (and potentially re-selecting a different
        // manifest-list entry) here.
        let os = pkg.metadata.get("os").cloned().unwrap_or_else(|| "linux".to_string());
        let arch = pkg.metadata.get("arch").cloned().unwrap_or_else(|| "amd64".to_string());
        let (manifest, _digest) = self.registry.fetch_manifest(&image, &os, &arch).await?;

        let staging_name = format!(".{}-{}-staging", image.short_name(), image.sanitized_tag());
        let staging_dir = dest_dir.join(staging_name);
        tokio::fs::create_dir_all(&staging_dir).await?;

        let config_filename = format!("{}.json", strip_digest_prefix(&manifest.config.digest));
        self.registry
            .download_blob(&image, &manifest.config, &staging_dir.join(&config_filename))
            .await?;

        let mut layer_filenames = Vec::with_capacity(manifest.layers.len());
        for layer in &manifest.layers {
            let filename = format!("{}.tar.gz", strip_digest_prefix(&layer.digest));
            self.registry.download_blob(&image, layer, &staging_dir.join(&filename)).await?;
            layer_filenames.push(filename);
        }

        let entry = DockerLoadEntry {
            config: config_filename,
            repo_tags: vec![repo_tag(&image)],
            layers: layer_filenames,
        };
        let manifest_json = serde_json::to_vec(&vec![entry])?;
        tokio::fs::write(staging_dir.join("manifest.json"), manifest_json).await?;

        std::fs::create_dir_all(dest_dir)?;
        let tar_filename = tar_filename(&image);
        let tar_path = dest_dir.join(&tar_filename);
        let tar_file = std::fs::File::create(&tar_path)?;
        let mut builder = tar::Builder::new(tar_file);
        builder.append_dir_all(".", &staging_dir)?;
        builder.finish()?;
        drop(builder);

        std::fs::remove_dir_all(&staging_dir).ok();
        Ok(tar_path)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn strip_digest_prefix(digest: &str) -> &str {
    digest.split_once(':').map(|(_, hash)| hash).unwrap_or(digest)
}

/// The docker-load tar's filename: `<repo>-<sanitized-tag>.tar` with
/// `<repo>` the short, unqualified repository name (no registry or
/// namespace prefix), per the output-bundle layout.
fn tar_filename(image: &ImageReference) -> String {
    format!("{}-{}.tar", image.short_name(), image.sanitized_tag())
}

/// The `RepoTags` entry synthesized into `manifest.json`: the short
/// repository name the user referred to, not the internally-normalized
/// `registry/namespace/repo` path.
fn repo_tag(image: &ImageReference) -> String {
    format!("{}:{}", image.short_name(), image.tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_digest_prefix_removes_algorithm() {
        assert_eq!(strip_digest_prefix("sha256:abcdef"), "abcdef");
        assert_eq!(strip_digest_prefix("abcdef"), "abcdef");
    }

    #[test]
    fn parse_reference_maps_to_package_ref_with_tag_as_version() {
        let registry = Arc::new(OciRegistry::new());
        let eco = OciEcosystem::new(registry, "docker.io");
        let reference = eco.parse_reference("nginx:1.25").unwrap();
        assert_eq!(reference.name, "docker.io/library/nginx");
        assert_eq!(reference.version.as_deref(), Some("1.25"));
    }

    /// Scenario 4 (spec §8): an unqualified `nginx:1.25` pull must produce
    /// `nginx-1.25.tar` and a docker-load `manifest.json` carrying
    /// `RepoTags: ["nginx:1.25"]` — not `library_nginx-1.25.tar` /
    /// `["library/nginx:1.25"]`, which is what the internally-normalized
    /// `registry/library/nginx` reference would otherwise produce.
    #[test]
    fn unqualified_image_synthesizes_short_tar_name_and_repo_tag() {
        let image = crate::types::parse_reference("nginx:1.25").unwrap();
        assert_eq!(tar_filename(&image), "nginx-1.25.tar");
        assert_eq!(repo_tag(&image), "nginx:1.25");
    }

    #[test]
    fn namespaced_image_still_uses_its_own_short_name() {
        let image = crate::types::parse_reference("ghcr.io/myorg/myapp:2.0").unwrap();
        assert_eq!(tar_filename(&image), "myapp-2.0.tar");
        assert_eq!(repo_tag(&image), "myapp:2.0");
    }
}
