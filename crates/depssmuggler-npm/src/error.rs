//! Errors specific to the npm adapter: packument parsing, semver range
//! matching, and hoisting-tree placement.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NpmError {
    #[error("package '{0}' not found on the npm registry")]
    PackageNotFound(String),

    #[error("no version of '{name}' satisfies '{requirement}'")]
    NoMatchingVersion { name: String, requirement: String },

    #[error("invalid npm semver range '{0}'")]
    InvalidVersionSpecifier(String),

    #[error("invalid package reference '{0}'")]
    InvalidReference(String),

    #[error("packument for '{0}' has no dist entry for the resolved version")]
    MissingDist(String),

    #[error("failed to parse npm registry response for '{package}': {source}")]
    ApiResponse {
        package: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, NpmError>;

impl From<NpmError> for depssmuggler_core::CoreError {
    fn from(err: NpmError) -> Self {
        match err {
            NpmError::PackageNotFound(name) => depssmuggler_core::CoreError::NotFound {
                ecosystem: "npm".to_string(),
                name,
                version: None,
            },
            NpmError::NoMatchingVersion { name, requirement } => depssmuggler_core::CoreError::NotFound {
                ecosystem: "npm".to_string(),
                name,
                version: Some(requirement),
            },
            NpmError::InvalidVersionSpecifier(spec) => depssmuggler_core::CoreError::InvalidVersionReq(spec),
            NpmError::InvalidReference(raw) => depssmuggler_core::CoreError::InvalidReference(raw),
            NpmError::MissingDist(name) => depssmuggler_core::CoreError::ProtocolError {
                what: format!("npm packument for {name}"),
                message: "missing dist entry".to_string(),
            },
            NpmError::ApiResponse { package, source } => depssmuggler_core::CoreError::ProtocolError {
                what: format!("npm registry response for {package}"),
                message: source.to_string(),
            },
        }
    }
}
