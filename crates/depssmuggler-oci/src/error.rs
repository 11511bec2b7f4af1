//! Errors specific to the OCI/Docker adapter: registry reference parsing,
//! bearer-token auth, manifest-list platform selection, and blob digest
//! verification.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OciError {
    #[error("invalid image reference '{0}'")]
    InvalidReference(String),

    #[error("failed to obtain a pull token for {repository} on {registry}: {message}")]
    AuthFailed { registry: String, repository: String, message: String },

    #[error("no manifest found for {reference}")]
    ManifestNotFound { reference: String },

    #[error("unrecognized manifest media type '{0}'")]
    UnsupportedMediaType(String),

    #[error("manifest list for {reference} has no entry matching os={os} arch={arch}")]
    NoMatchingPlatform { reference: String, os: String, arch: String },

    #[error("blob {digest} failed digest verification: expected {expected}, got {actual}")]
    BlobDigestMismatch { digest: String, expected: String, actual: String },

    #[error("failed to parse registry response: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, OciError>;

impl From<OciError> for depssmuggler_core::CoreError {
    fn from(err: OciError) -> Self {
        match err {
            OciError::InvalidReference(raw) => depssmuggler_core::CoreError::InvalidReference(raw),
            OciError::AuthFailed { registry, repository, message } => depssmuggler_core::CoreError::ProtocolError {
                what: format!("auth for {registry}/{repository}"),
                message,
            },
            OciError::ManifestNotFound { reference } => depssmuggler_core::CoreError::NotFound {
                ecosystem: "docker".to_string(),
                name: reference,
                version: None,
            },
            OciError::UnsupportedMediaType(media_type) => depssmuggler_core::CoreError::ProtocolError {
                what: "manifest media type".to_string(),
                message: media_type,
            },
            OciError::NoMatchingPlatform { reference, os, arch } => depssmuggler_core::CoreError::UnsupportedArchitecture {
                name: reference,
                target: format!("{os}/{arch}"),
            },
            OciError::BlobDigestMismatch { digest, expected, actual } => depssmuggler_core::CoreError::ChecksumMismatch {
                artifact: digest,
                expected,
                actual,
            },
            OciError::Protocol(message) => depssmuggler_core::CoreError::ProtocolError {
                what: "OCI registry response".to_string(),
                message,
            },
        }
    }
}
