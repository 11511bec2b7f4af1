//! Errors specific to the PyPI adapter: PEP 440/508 parse failures and
//! registry-response shape problems. Converted into `CoreError` at the
//! `Ecosystem` trait boundary so callers only ever see one error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipError {
    #[error("package '{0}' not found on PyPI")]
    PackageNotFound(String),

    #[error("no release for '{name}' matching '{requirement}'")]
    NoMatchingVersion { name: String, requirement: String },

    #[error("invalid PEP 440 version specifier '{0}'")]
    InvalidVersionSpecifier(String),

    #[error("invalid PEP 508 requirement '{0}'")]
    InvalidRequirement(String),

    #[error("no wheel or sdist artifact available for {name}=={version}")]
    NoArtifact { name: String, version: String },

    #[error("failed to parse PyPI response for '{package}': {source}")]
    ApiResponse {
        package: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, PipError>;

impl From<PipError> for depssmuggler_core::CoreError {
    fn from(err: PipError) -> Self {
        match err {
            PipError::PackageNotFound(name) => depssmuggler_core::CoreError::NotFound {
                ecosystem: "pip".to_string(),
                name,
                version: None,
            },
            PipError::NoMatchingVersion { name, requirement } => depssmuggler_core::CoreError::NotFound {
                ecosystem: "pip".to_string(),
                name,
                version: Some(requirement),
            },
            PipError::InvalidVersionSpecifier(spec) => depssmuggler_core::CoreError::InvalidVersionReq(spec),
            PipError::InvalidRequirement(raw) => depssmuggler_core::CoreError::InvalidReference(raw),
            PipError::NoArtifact { name, version } => depssmuggler_core::CoreError::UnsupportedArchitecture {
                name,
                target: version,
            },
            PipError::ApiResponse { package, source } => depssmuggler_core::CoreError::ProtocolError {
                what: format!("PyPI response for {package}"),
                message: source.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_not_found_converts_to_core_not_found() {
        let core_err: depssmuggler_core::CoreError = PipError::PackageNotFound("doesnotexist".into()).into();
        assert!(matches!(core_err, depssmuggler_core::CoreError::NotFound { .. }));
    }

    #[test]
    fn no_artifact_converts_to_unsupported_architecture() {
        let core_err: depssmuggler_core::CoreError = PipError::NoArtifact {
            name: "pywin32".into(),
            version: "308".into(),
        }
        .into();
        assert!(matches!(core_err, depssmuggler_core::CoreError::UnsupportedArchitecture { .. }));
    }
}
