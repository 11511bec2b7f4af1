//! The shared package record every OS-package backend (YUM/DNF, APT,
//! APK) normalizes its native repodata format into, plus the query
//! grammar the `OSPackageDownloader` facade accepts.

use serde::{Deserialize, Serialize};

/// Which backend produced/owns a given record. Distinct from
/// [`depssmuggler_core::Ecosystem`] only in that it's the internal
/// currency this crate's registries and codecs pass around before the
/// final `Ecosystem` adapter wraps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Yum,
    Apt,
    Apk,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Yum => "yum",
            Backend::Apt => "apt",
            Backend::Apk => "apk",
        }
    }
}

/// A package record normalized from `primary.xml` (YUM), `Packages`
/// (APT), or `APKINDEX` (APK).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsPackage {
    pub name: String,
    /// `[epoch:]version[-release]`, already assembled in the backend's
    /// native display form (RPM's `epoch:ver-rel`, APT's `version-rev`,
    /// APK's bare `version`).
    pub version: String,
    pub arch: String,
    pub download_url: String,
    pub filename: String,
    pub size_bytes: Option<u64>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    /// Capabilities this package satisfies, beyond its own name (RPM
    /// `Provides`, APT virtual packages, soname-less for APK).
    pub provides: Vec<String>,
    /// Raw dependency capability strings as the backend's metadata
    /// expresses them (RPM `Requires`, APT `Depends`/`Pre-Depends`, APK
    /// exact package names).
    pub requires: Vec<String>,
}

impl OsPackage {
    pub fn key(&self) -> (String, String) {
        (self.name.to_lowercase(), self.arch.to_lowercase())
    }
}

/// Match semantics for [`crate::registry::OSPackageDownloader::search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Partial,
    Wildcard,
}

/// What to do when a single package in a batch fails to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnErrorAction {
    Retry,
    Skip,
    Cancel,
}

/// `none` never persists between runs, `session` persists for the
/// lifetime of one `OSPackageDownloader` instance (in-memory repodata
/// index), `persistent` uses the two-tier disk cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    None,
    #[default]
    Session,
    Persistent,
}
