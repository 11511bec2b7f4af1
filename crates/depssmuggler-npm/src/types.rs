//! npm registry wire types: the packument document (`GET /{package}`),
//! search results, and the trait adapters depssmuggler-core dispatches
//! against.

use serde::Deserialize;
use std::any::Any;
use std::collections::HashMap;

/// A single published version of an npm package.
#[derive(Debug, Clone)]
pub struct NpmVersion {
    pub version: String,
    pub deprecated: bool,
}

impl depssmuggler_core::Version for NpmVersion {
    fn version_string(&self) -> &str {
        &self.version
    }

    fn is_yanked(&self) -> bool {
        self.deprecated
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Package-level metadata surfaced from a packument or search hit.
#[derive(Debug, Clone)]
pub struct NpmPackage {
    pub name: String,
    pub description: Option<String>,
    pub latest_version: String,
}

impl depssmuggler_core::Metadata for NpmPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn latest_version(&self) -> &str {
        &self.latest_version
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The full packument returned by `GET {registry}/{package}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Packument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,
    #[serde(default)]
    pub versions: HashMap<String, VersionMetadata>,
    #[serde(default)]
    pub time: HashMap<String, String>,
}

impl Packument {
    /// The `latest` dist-tag, falling back to the lexicographically last
    /// key in `versions` if the tag is absent (abbreviated/corelist docs).
    pub fn latest_tag(&self) -> Option<&str> {
        self.dist_tags.get("latest").map(String::as_str)
    }

    pub fn is_deprecated(&self, version: &str) -> bool {
        self.versions
            .get(version)
            .map(|v| v.deprecated.is_some())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionMetadata {
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: HashMap<String, String>,
    #[serde(default)]
    pub optional_dependencies: HashMap<String, String>,
    #[serde(default)]
    pub peer_dependencies_meta: HashMap<String, PeerDependencyMeta>,
    pub dist: DistInfo,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PeerDependencyMeta {
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistInfo {
    pub tarball: String,
    #[serde(default)]
    pub shasum: Option<String>,
    #[serde(default)]
    pub integrity: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub objects: Vec<SearchObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchObject {
    pub package: SearchPackage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchPackage {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
}
