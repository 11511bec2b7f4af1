//! PyPI JSON API response shapes, plus the wheel/sdist artifact selection
//! logic described in the adapter's design: prefer wheels over sdists,
//! prefer universal wheels, otherwise match platform/arch/interpreter tags
//! against the requested target.

use depssmuggler_core::{normalize_arch, TargetPlatform};
use serde::Deserialize;
use std::any::Any;

/// One version's worth of metadata, independent of any specific release
/// file: the version string, its yanked status, and the release files
/// (wheels/sdists) published for it.
#[derive(Debug, Clone)]
pub struct PypiVersion {
    pub version: String,
    pub yanked: bool,
}

impl depssmuggler_core::Version for PypiVersion {
    fn version_string(&self) -> &str {
        &self.version
    }

    fn is_yanked(&self) -> bool {
        self.yanked
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Package-level metadata for search results.
#[derive(Debug, Clone)]
pub struct PypiPackage {
    pub name: String,
    pub summary: Option<String>,
    pub latest_version: String,
}

impl depssmuggler_core::Metadata for PypiPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    fn latest_version(&self) -> &str {
        &self.latest_version
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One release file (wheel or sdist) as published by the PyPI JSON API.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseFile {
    pub filename: String,
    pub url: String,
    pub packagetype: String,
    pub size: Option<u64>,
    pub digests: ReleaseDigests,
    #[serde(default)]
    pub yanked: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReleaseDigests {
    pub sha256: Option<String>,
    pub md5: Option<String>,
}

/// The project-version JSON document (`pypi.org/pypi/<name>/<version>/json`):
/// release files for that exact version plus its `requires_dist` markers.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectVersionResponse {
    pub info: ProjectVersionInfo,
    pub urls: Vec<ReleaseFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectVersionInfo {
    pub name: String,
    #[serde(default)]
    pub requires_dist: Option<Vec<String>>,
    pub summary: Option<String>,
    pub version: String,
}

/// Top-level project JSON document: `info` plus every release's files,
/// keyed by version string.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectResponse {
    pub info: ProjectVersionInfo,
    pub releases: std::collections::HashMap<String, Vec<ReleaseFile>>,
}

/// Picks the best release file for `target`, per the adapter's selection
/// rules: prefer wheels over sdists; among wheels prefer universal tags;
/// otherwise match the platform/arch/interpreter tags against `target`;
/// fall back to an sdist if no wheel matches.
pub fn select_artifact<'a>(files: &'a [ReleaseFile], target: &TargetPlatform) -> Option<&'a ReleaseFile> {
    let wheels: Vec<&ReleaseFile> = files.iter().filter(|f| f.packagetype == "bdist_wheel").collect();
    let sdists: Vec<&ReleaseFile> = files.iter().filter(|f| f.packagetype == "sdist").collect();

    if let Some(universal) = wheels.iter().find(|f| is_universal_wheel(&f.filename)) {
        return Some(universal);
    }

    if let Some(matching) = wheels.iter().find(|f| wheel_matches_target(&f.filename, target)) {
        return Some(matching);
    }

    sdists.first().copied()
}

fn is_universal_wheel(filename: &str) -> bool {
    let Some(tags) = wheel_tags(filename) else { return false };
    let (py_tag, _abi_tag, platform_tag) = tags;
    platform_tag == "any" && (py_tag == "py3" || py_tag == "py2.py3")
}

/// Splits a wheel filename into its `(python_tag, abi_tag, platform_tag)`
/// triple per the wheel filename spec:
/// `{distribution}-{version}(-{build})?-{python_tag}-{abi_tag}-{platform_tag}.whl`.
fn wheel_tags(filename: &str) -> Option<(&str, &str, &str)> {
    let stem = filename.strip_suffix(".whl")?;
    let parts: Vec<&str> = stem.split('-').collect();
    if parts.len() < 5 {
        return None;
    }
    let len = parts.len();
    Some((parts[len - 3], parts[len - 2], parts[len - 1]))
}

fn wheel_matches_target(filename: &str, target: &TargetPlatform) -> bool {
    let Some((py_tag, _abi_tag, platform_tag)) = wheel_tags(filename) else { return false };

    if let Some(os) = &target.os {
        if !platform_tag_matches_os(platform_tag, os) {
            return false;
        }
    }
    if let Some(arch) = &target.arch {
        if !platform_tag_matches_arch(platform_tag, arch) {
            return false;
        }
    }
    if let Some(python_version) = &target.python_version {
        if !python_tag_matches(py_tag, python_version) {
            return false;
        }
    }
    true
}

fn platform_tag_matches_os(platform_tag: &str, os: &str) -> bool {
    let tag = platform_tag.to_ascii_lowercase();
    match os.to_ascii_lowercase().as_str() {
        "windows" | "win32" => tag.starts_with("win_amd64") || tag.starts_with("win32"),
        "darwin" | "macos" | "osx" => tag.starts_with("macosx") || tag.contains("darwin"),
        "linux" => tag.starts_with("manylinux") || tag.starts_with("linux_"),
        _ => false,
    }
}

fn platform_tag_matches_arch(platform_tag: &str, arch: &str) -> bool {
    let tag = platform_tag.to_ascii_lowercase();
    match normalize_arch(arch) {
        "amd64" => tag.contains("x86_64") || tag.contains("amd64") || tag.contains("win_amd64"),
        "arm64" => tag.contains("arm64") || tag.contains("aarch64"),
        "386" => tag.contains("i386") || tag.contains("i686") || tag.contains("win32"),
        _ => false,
    }
}

/// `py3` is universal; otherwise match e.g. `cp310` against a target
/// Python version `3.10` by comparing the digits with the dot removed.
fn python_tag_matches(py_tag: &str, python_version: &str) -> bool {
    if py_tag == "py3" || py_tag == "py2.py3" {
        return true;
    }
    let condensed = python_version.replace('.', "");
    py_tag.contains(&condensed)
}
