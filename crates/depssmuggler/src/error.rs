//! The bin crate's own error type. Every ecosystem adapter and
//! `depssmuggler-core` already translate their internal failures into
//! [`depssmuggler_core::CoreError`] at the `Ecosystem`/`Registry` trait
//! boundary; this enum only adds the handful of failure modes that belong
//! to the shell itself: bad CLI input and history-file I/O.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] depssmuggler_core::CoreError),

    #[error("unrecognized ecosystem prefix {0:?} (expected one of pip, conda, maven, npm, docker, yum, apt, apk)")]
    UnknownEcosystem(String),

    #[error("package reference {0:?} is missing an \"ecosystem:\" prefix")]
    MissingEcosystemPrefix(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported archive format: {0}")]
    UnsupportedArchiveFormat(String),
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ecosystem_display() {
        let err = CliError::UnknownEcosystem("npmz".to_string());
        assert!(err.to_string().contains("npmz"));
    }

    #[test]
    fn core_error_is_transparent() {
        let core = depssmuggler_core::CoreError::Cancelled;
        let err: CliError = core.into();
        assert_eq!(err.to_string(), "operation cancelled");
    }
}
