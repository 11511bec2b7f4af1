//! Image reference parsing and the OCI/Docker v2 manifest/config wire
//! shapes this adapter understands.

use crate::error::{OciError, Result};
use serde::{Deserialize, Serialize};

pub const DOCKER_MEDIA_TYPE_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MEDIA_TYPE_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_MEDIA_TYPE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_MEDIA_TYPE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// A fully-parsed `[registry/]namespace/repo[:tag|@digest]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    /// `library/nginx`, `myorg/myapp`, ...
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn name(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    pub fn sanitized_tag(&self) -> String {
        self.tag.replace([':', '/'], "_")
    }

    /// The repository's last path segment, with any registry namespace
    /// (`library/`, `myorg/`, ...) stripped — `docker.io/library/nginx`
    /// and `ghcr.io/myorg/nginx` both yield `nginx`. This is the `<repo>`
    /// the spec's output-bundle layout and docker-load `RepoTags` expect,
    /// not the fully-qualified internal repository path.
    pub fn short_name(&self) -> &str {
        self.repository.rsplit('/').next().unwrap_or(&self.repository)
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

/// Parses a Docker-style reference, applying the same normalization `docker
/// pull` does: no registry component means `docker.io`; an unqualified,
/// single-segment name means `library/<name>` under Docker Hub.
pub fn parse_reference(raw: &str) -> Result<ImageReference> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OciError::InvalidReference(raw.to_string()));
    }

    let (name_part, tag) = match trimmed.rsplit_once(':') {
        // A colon after the last '/' is a tag; a colon before it (or none)
        // is a registry port, e.g. `localhost:5000/myimage`.
        Some((name, tag)) if !tag.contains('/') && !tag.is_empty() => (name, tag.to_string()),
        _ => (trimmed, "latest".to_string()),
    };

    let segments: Vec<&str> = name_part.split('/').collect();
    let (registry, repository) = match segments.as_slice() {
        [single] => ("docker.io".to_string(), format!("library/{single}")),
        [first, rest @ ..] if looks_like_registry_host(first) => (first.to_string(), rest.join("/")),
        _ => ("docker.io".to_string(), name_part.to_string()),
    };

    if repository.is_empty() {
        return Err(OciError::InvalidReference(raw.to_string()));
    }

    Ok(ImageReference { registry, repository, tag })
}

/// A bare first path segment is a registry host only if it contains a dot,
/// a colon (port), or is literally `localhost` — otherwise it's a Docker
/// Hub namespace (`myorg/myapp`).
fn looks_like_registry_host(segment: &str) -> bool {
    segment == "localhost" || segment.contains('.') || segment.contains(':')
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestDescriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    #[serde(default)]
    pub platform: Option<PlatformSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformSpec {
    pub architecture: String,
    pub os: String,
    #[serde(default)]
    pub variant: Option<String>,
}

/// Either a single-platform manifest or a manifest list/image index; both
/// shapes are represented since the registry response's `mediaType` is only
/// known after the body is fetched.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestListBody {
    pub manifests: Vec<ManifestDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestBody {
    pub config: ManifestDescriptor,
    pub layers: Vec<ManifestDescriptor>,
}

/// One entry of a docker-load `manifest.json`.
#[derive(Debug, Clone, Serialize)]
pub struct DockerLoadEntry {
    #[serde(rename = "Config")]
    pub config: String,
    #[serde(rename = "RepoTags")]
    pub repo_tags: Vec<String>,
    #[serde(rename = "Layers")]
    pub layers: Vec<String>,
}

/// Normalizes architecture aliases the way Docker's own platform matcher
/// does: `x86_64` maps to `amd64`, `arm64`/`aarch64` are interchangeable,
/// `i686` maps to `386`.
pub fn normalize_arch(arch: &str) -> String {
    match arch.to_ascii_lowercase().as_str() {
        "x86_64" => "amd64".to_string(),
        "aarch64" => "arm64".to_string(),
        "i686" => "386".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unqualified_single_segment_as_library_image() {
        let r = parse_reference("nginx").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "library/nginx");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn parses_tag() {
        let r = parse_reference("nginx:1.25").unwrap();
        assert_eq!(r.tag, "1.25");
        assert_eq!(r.repository, "library/nginx");
    }

    #[test]
    fn parses_namespaced_image_without_registry() {
        let r = parse_reference("myorg/myapp:2.0").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "myorg/myapp");
        assert_eq!(r.tag, "2.0");
    }

    #[test]
    fn parses_fully_qualified_registry() {
        let r = parse_reference("ghcr.io/myorg/myapp:latest").unwrap();
        assert_eq!(r.registry, "ghcr.io");
        assert_eq!(r.repository, "myorg/myapp");
    }

    #[test]
    fn parses_registry_with_port_and_no_tag() {
        let r = parse_reference("localhost:5000/myimage").unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.repository, "myimage");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn sanitized_tag_replaces_colons_and_slashes() {
        let r = ImageReference {
            registry: "docker.io".into(),
            repository: "library/nginx".into(),
            tag: "1.25".into(),
        };
        assert_eq!(r.sanitized_tag(), "1.25");
    }

    #[test]
    fn short_name_strips_library_namespace() {
        let r = parse_reference("nginx:1.25").unwrap();
        assert_eq!(r.short_name(), "nginx");
    }

    #[test]
    fn short_name_strips_explicit_namespace() {
        let r = parse_reference("ghcr.io/myorg/myapp:latest").unwrap();
        assert_eq!(r.short_name(), "myapp");
    }

    #[test]
    fn normalize_arch_maps_aliases() {
        assert_eq!(normalize_arch("x86_64"), "amd64");
        assert_eq!(normalize_arch("aarch64"), "arm64");
        assert_eq!(normalize_arch("amd64"), "amd64");
    }
}
