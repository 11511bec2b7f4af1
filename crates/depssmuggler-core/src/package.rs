//! The cross-ecosystem data model: package references, resolved packages,
//! and the dependency graph they compose into.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The set of package ecosystems this tool speaks natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Pip,
    Conda,
    Maven,
    Npm,
    Docker,
    Yum,
    Apt,
    Apk,
}

impl Ecosystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Ecosystem::Pip => "pip",
            Ecosystem::Conda => "conda",
            Ecosystem::Maven => "maven",
            Ecosystem::Npm => "npm",
            Ecosystem::Docker => "docker",
            Ecosystem::Yum => "yum",
            Ecosystem::Apt => "apt",
            Ecosystem::Apk => "apk",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Ecosystem {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pip" | "pypi" | "python" => Ok(Ecosystem::Pip),
            "conda" => Ok(Ecosystem::Conda),
            "maven" => Ok(Ecosystem::Maven),
            "npm" => Ok(Ecosystem::Npm),
            "docker" | "oci" => Ok(Ecosystem::Docker),
            "yum" | "dnf" | "rpm" => Ok(Ecosystem::Yum),
            "apt" | "deb" => Ok(Ecosystem::Apt),
            "apk" => Ok(Ecosystem::Apk),
            other => Err(crate::error::CoreError::UnsupportedEcosystem(other.to_string())),
        }
    }
}

/// Target platform a package closure is being resolved and downloaded for.
/// This may differ from the host the tool runs on — the whole point of an
/// air-gap courier is resolving artifacts for a machine you aren't on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPlatform {
    /// `linux`, `windows`, `darwin`, ...
    pub os: Option<String>,
    /// `x86_64`, `arm64`, `aarch64`, ...
    pub arch: Option<String>,
    /// CPython minor version, e.g. `3.10` (pip only).
    pub python_version: Option<String>,
}

impl TargetPlatform {
    pub fn is_unset(&self) -> bool {
        self.os.is_none() && self.arch.is_none() && self.python_version.is_none()
    }

    /// `x86_64` and `amd64` are considered equivalent everywhere this tool
    /// compares architectures (PyPI platform tags, OCI manifest-list
    /// entries).
    pub fn arch_matches(&self, candidate: &str) -> bool {
        let Some(arch) = &self.arch else { return true };
        normalize_arch(arch) == normalize_arch(candidate)
    }
}

/// Normalizes architecture aliases so `x86_64`/`amd64` and
/// `arm64`/`aarch64` compare equal.
pub fn normalize_arch(arch: &str) -> &'static str {
    match arch.to_ascii_lowercase().as_str() {
        "x86_64" | "amd64" | "win_amd64" => "amd64",
        "arm64" | "aarch64" | "macosx_arm64" => "arm64",
        "i386" | "i686" | "win32" | "386" => "386",
        "arm" | "armv7" | "arm/v7" => "arm",
        _ => "unknown",
    }
}

/// A reference to a package as supplied by the caller, before resolution:
/// `(ecosystem, name, version, architecture?, platform?, extras?)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub ecosystem: Ecosystem,
    /// Ecosystem-specific name grammar (e.g. Maven `groupId:artifactId`,
    /// npm `@scope/pkg`, Docker `registry/namespace/repo`).
    pub name: String,
    /// Free-form version / version-requirement string, validated by the
    /// owning adapter.
    pub version: Option<String>,
    pub extras: Vec<String>,
}

impl PackageRef {
    pub fn new(ecosystem: Ecosystem, name: impl Into<String>) -> Self {
        Self {
            ecosystem,
            name: name.into(),
            version: None,
            extras: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn key(&self) -> (Ecosystem, String) {
        (self.ecosystem, self.name.to_lowercase())
    }

    /// Splits a CLI-supplied `ecosystem:rest` coordinate (e.g.
    /// `pip:requests==2.31.0`, `maven:org.springframework.boot:spring-boot-starter:3.1.0`,
    /// `docker:nginx:1.25`) into its ecosystem and the remaining
    /// ecosystem-native string. Only the first colon is significant --
    /// everything after it is the owning adapter's own grammar, handed to
    /// its `parse_reference`.
    pub fn split_ecosystem_prefix(raw: &str) -> crate::error::Result<(Ecosystem, &str)> {
        let (prefix, rest) = raw
            .split_once(':')
            .ok_or_else(|| crate::error::CoreError::InvalidReference(raw.to_string()))?;
        let ecosystem: Ecosystem = prefix.parse()?;
        Ok((ecosystem, rest))
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}:{}=={}", self.ecosystem, self.name, v),
            None => write!(f, "{}:{}", self.ecosystem, self.name),
        }
    }
}

/// Checksum kind plus hex digest, attached to a [`ResolvedPackage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub kind: ChecksumKind,
    pub hex: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumKind {
    Sha1,
    Sha256,
    Md5,
}

/// A [`PackageRef`] extended with everything needed to download and verify
/// the artifact: exact version, URL, checksum, size, source registry, and
/// an ecosystem-specific metadata blob (wheel filename, OCI digest, Maven
/// packaging type, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: String,
    pub download_url: String,
    pub checksum: Option<Checksum>,
    pub size_bytes: Option<u64>,
    pub source_registry: String,
    /// Ecosystem metadata, e.g. `{"packaging": "jar", "classifier": "sources"}`.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ResolvedPackage {
    pub fn key(&self) -> (Ecosystem, String) {
        (self.ecosystem, self.name.to_lowercase())
    }
}

/// Scope of a dependency edge (meaningful mainly for Maven; other
/// ecosystems use `Runtime` uniformly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyScope {
    Compile,
    Runtime,
    Test,
    Provided,
    System,
}

impl DependencyScope {
    /// Maven's scope-transitivity table: the scope a child dependency is
    /// seen under, given the scope of the edge that reached it from the
    /// parent. `None` means the edge is dropped (the dependency is not
    /// transitively pulled in under that combination).
    pub fn transitive(parent_edge: DependencyScope, child_declared: DependencyScope) -> Option<DependencyScope> {
        use DependencyScope::*;
        match (parent_edge, child_declared) {
            (Compile, Compile) => Some(Compile),
            (Compile, Runtime) => Some(Runtime),
            (Runtime, Compile) => Some(Runtime),
            (Runtime, Runtime) => Some(Runtime),
            (Compile, Test) | (Runtime, Test) => None,
            (Compile, Provided) | (Runtime, Provided) => None,
            (Compile, System) | (Runtime, System) => None,
            (Test, _) | (Provided, _) | (System, _) => None,
        }
    }
}

/// A node in a resolved dependency tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyNode {
    pub pkg: ResolvedPackage,
    pub children: Vec<DependencyNode>,
    pub scope: Option<DependencyScope>,
    pub optional: bool,
    pub depth: u32,
    /// Insertion counter used as the BFS tie-breaker ("nearest-and-first
    /// wins").
    pub sequence: u64,
}

/// One recorded version conflict: several dependents wanted different
/// versions of the same package and the kernel picked a winner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub name: String,
    pub contending_versions: Vec<String>,
    pub winner: String,
    pub reason: String,
}

/// A package reference that could not be resolved, with the error that was
/// recorded for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedPackage {
    pub reference: String,
    pub error: String,
}

/// The output of resolving one or more root [`PackageRef`]s into their full
/// transitive closures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraphResult {
    pub roots: Vec<DependencyNode>,
    /// At most one entry per `(ecosystem, name)`; duplicates are collapsed
    /// by the Skipper.
    pub flat_list: Vec<ResolvedPackage>,
    pub conflicts: Vec<Conflict>,
    pub failed: Vec<FailedPackage>,
}

impl DependencyGraphResult {
    pub fn merge(&mut self, other: DependencyGraphResult) {
        self.roots.extend(other.roots);
        for pkg in other.flat_list {
            if !self
                .flat_list
                .iter()
                .any(|existing| existing.key() == pkg.key())
            {
                self.flat_list.push(pkg);
            }
        }
        self.conflicts.extend(other.conflicts);
        self.failed.extend(other.failed);
    }
}
