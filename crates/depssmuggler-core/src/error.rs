use thiserror::Error;

/// Core error taxonomy shared by every ecosystem adapter.
///
/// Adapters translate transport- and format-specific failures into one of
/// these variants at the `Ecosystem`/`Registry` trait boundary, so the
/// resolver and orchestrator only ever have to reason about this one type.
/// Most variants are recorded per-node/per-package and never abort a
/// session; only [`CoreError::Cancelled`] is expected to propagate out of
/// the orchestrator.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A name/version tuple does not exist in the registry. Terminal for
    /// that node, aggregated into `failedPackages`, never fatal.
    #[error("package not found: {ecosystem}:{name}{}", version.as_ref().map(|v| format!("@{v}")).unwrap_or_default())]
    NotFound {
        ecosystem: String,
        name: String,
        version: Option<String>,
    },

    /// DNS, TLS, connection reset, or timeout. Retried at the HTTP layer;
    /// surfaces here only once retries are exhausted.
    #[error("network error fetching {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Malformed XML/JSON/tar or an unexpected media type. Never retried.
    #[error("failed to parse {what}: {message}")]
    ProtocolError { what: String, message: String },

    /// The computed digest disagrees with the registry's. The partial file
    /// is removed by the caller; never retried silently.
    #[error("checksum mismatch for {artifact}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    /// A manifest list / image index had no entry matching the requested
    /// target platform.
    #[error("no artifact for target {target} (package {name})")]
    UnsupportedArchitecture { name: String, target: String },

    /// Informational: a dependency cycle was detected and the BFS broke it.
    /// Recorded in the result, never fails the session.
    #[error("dependency cycle broken at {0}")]
    CycleBroken(String),

    /// Informational: two or more dependents required incompatible
    /// versions of the same package; the kernel's tie-break chose a winner.
    #[error("version conflict for {name}: {contenders:?}, winner {winner}")]
    VersionConflict {
        name: String,
        contenders: Vec<String>,
        winner: String,
    },

    /// The user (or a programmatic caller) cancelled an in-flight
    /// operation. The only variant allowed to propagate out of the
    /// orchestrator.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid package coordinate string supplied by the caller.
    #[error("invalid package reference: {0}")]
    InvalidReference(String),

    /// An invalid version requirement could not be parsed by the
    /// ecosystem's specifier engine.
    #[error("invalid version requirement: {0}")]
    InvalidVersionReq(String),

    /// A generic cache-layer error (disk I/O shape violations, corrupt
    /// metadata, etc).
    #[error("cache error: {0}")]
    CacheError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported ecosystem: {0}")]
    UnsupportedEcosystem(String),
}

impl CoreError {
    /// Whether this error kind is recorded per-node/per-package and should
    /// never abort a batch resolve or download (everything except
    /// [`CoreError::Cancelled`]).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CoreError::Cancelled)
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_with_version() {
        let err = CoreError::NotFound {
            ecosystem: "pip".into(),
            name: "doesnotexist".into(),
            version: Some("1.0.0".into()),
        };
        assert_eq!(err.to_string(), "package not found: pip:doesnotexist@1.0.0");
    }

    #[test]
    fn not_found_display_without_version() {
        let err = CoreError::NotFound {
            ecosystem: "npm".into(),
            name: "left-pad".into(),
            version: None,
        };
        assert_eq!(err.to_string(), "package not found: npm:left-pad");
    }

    #[test]
    fn cancelled_is_not_recoverable() {
        assert!(!CoreError::Cancelled.is_recoverable());
    }

    #[test]
    fn checksum_mismatch_is_recoverable_but_reported() {
        let err = CoreError::ChecksumMismatch {
            artifact: "requests-2.31.0.tar.gz".into(),
            expected: "abc".into(),
            actual: "def".into(),
        };
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn version_conflict_display() {
        let err = CoreError::VersionConflict {
            name: "guava".into(),
            contenders: vec!["1.0".into(), "2.0".into()],
            winner: "1.0".into(),
        };
        assert!(err.to_string().contains("guava"));
        assert!(err.to_string().contains("winner 1.0"));
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CoreError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }
}
