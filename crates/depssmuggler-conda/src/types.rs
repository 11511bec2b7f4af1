//! Conda repodata wire types and the trait adapters depssmuggler-core
//! dispatches against.

use serde::Deserialize;
use std::any::Any;
use std::collections::HashMap;

/// A single package record parsed out of `repodata.json`'s `packages` (or
/// `packages.conda`) map. The map key (tarball filename) is folded into
/// `filename` at parse time.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageRecord {
    #[serde(default)]
    pub name: String,
    pub version: String,
    pub build: String,
    #[serde(default)]
    pub build_number: u64,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub constrains: Vec<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(skip)]
    pub filename: String,
}

/// The raw `repodata.json` document shape.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RepodataDocument {
    #[serde(default)]
    pub packages: HashMap<String, PackageRecord>,
    #[serde(rename = "packages.conda", default)]
    pub packages_conda: HashMap<String, PackageRecord>,
}

impl RepodataDocument {
    /// Flattens both package maps into a single list, stamping each record
    /// with its tarball filename.
    pub fn into_records(self) -> Vec<PackageRecord> {
        self.packages
            .into_iter()
            .chain(self.packages_conda)
            .map(|(filename, mut record)| {
                record.filename = filename;
                record
            })
            .collect()
    }
}

/// A candidate build of a package, as surfaced through
/// [`depssmuggler_core::Version`]. `version_string` intentionally reports
/// just the semantic version; build disambiguation happens through
/// [`crate::matchspec::MatchSpec`] and candidate ordering, not through the
/// trait's single version string.
#[derive(Debug, Clone)]
pub struct CondaVersion {
    pub version: String,
    pub build: String,
    pub build_number: u64,
    pub timestamp: u64,
}

impl depssmuggler_core::Version for CondaVersion {
    fn version_string(&self) -> &str {
        &self.version
    }

    fn is_yanked(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone)]
pub struct CondaPackage {
    pub name: String,
    pub latest_version: String,
}

impl depssmuggler_core::Metadata for CondaPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        None
    }

    fn latest_version(&self) -> &str {
        &self.latest_version
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repodata_document_flattens_both_package_maps() {
        let body = r#"{
            "packages": {"numpy-1.26.4-py310_0.tar.bz2": {"name": "numpy", "version": "1.26.4", "build": "py310_0", "build_number": 0, "depends": []}},
            "packages.conda": {"numpy-1.26.4-py311_0.conda": {"name": "numpy", "version": "1.26.4", "build": "py311_0", "build_number": 0, "depends": []}}
        }"#;
        let doc: RepodataDocument = serde_json::from_str(body).unwrap();
        let records = doc.into_records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.filename == "numpy-1.26.4-py310_0.tar.bz2"));
        assert!(records.iter().any(|r| r.filename == "numpy-1.26.4-py311_0.conda"));
    }

    #[test]
    fn conda_version_trait_exposes_version_string() {
        use depssmuggler_core::Version;
        let v = CondaVersion {
            version: "1.26.4".into(),
            build: "py310_0".into(),
            build_number: 0,
            timestamp: 0,
        };
        assert_eq!(v.version_string(), "1.26.4");
        assert!(!v.is_yanked());
    }
}
