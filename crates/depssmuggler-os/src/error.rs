//! Errors specific to the OS-package adapters: repodata acquisition and
//! parsing, and unresolved capability lookups.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OsError {
    #[error("no {backend} repodata index available for {repo}")]
    RepodataUnavailable { backend: &'static str, repo: String },

    #[error("failed to parse {backend} repodata for {repo}: {message}")]
    RepodataParse {
        backend: &'static str,
        repo: String,
        message: String,
    },

    #[error("package not found: {name} ({arch})")]
    PackageNotFound { name: String, arch: String },

    #[error("no provider found for capability '{0}'")]
    NoProvider(String),
}

pub type Result<T> = std::result::Result<T, OsError>;

impl From<OsError> for depssmuggler_core::CoreError {
    fn from(err: OsError) -> Self {
        match err {
            OsError::RepodataUnavailable { backend, repo } => depssmuggler_core::CoreError::ProtocolError {
                what: format!("{backend} repodata for {repo}"),
                message: "no repodata candidate succeeded".to_string(),
            },
            OsError::RepodataParse { backend, repo, message } => depssmuggler_core::CoreError::ProtocolError {
                what: format!("{backend} repodata for {repo}"),
                message,
            },
            OsError::PackageNotFound { name, arch } => depssmuggler_core::CoreError::NotFound {
                ecosystem: "os".to_string(),
                name: format!("{name}.{arch}"),
                version: None,
            },
            OsError::NoProvider(capability) => depssmuggler_core::CoreError::NotFound {
                ecosystem: "os".to_string(),
                name: capability,
                version: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_not_found_converts_to_core_not_found() {
        let core_err: depssmuggler_core::CoreError = OsError::PackageNotFound {
            name: "httpd".into(),
            arch: "x86_64".into(),
        }
        .into();
        assert!(matches!(core_err, depssmuggler_core::CoreError::NotFound { .. }));
    }
}
