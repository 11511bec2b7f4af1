//! Errors specific to the conda adapter: repodata acquisition and MatchSpec
//! parsing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CondaError {
    #[error("no repodata available for channel '{channel}' subdir '{subdir}'")]
    RepodataUnavailable { channel: String, subdir: String },

    #[error("package '{0}' not found in repodata")]
    PackageNotFound(String),

    #[error("no build of '{name}' satisfies match spec '{spec}'")]
    NoMatchingBuild { name: String, spec: String },

    #[error("invalid MatchSpec '{0}'")]
    InvalidMatchSpec(String),

    #[error("failed to decompress repodata for {channel}/{subdir}: {message}")]
    Decompression { channel: String, subdir: String, message: String },

    #[error("failed to parse repodata for {channel}/{subdir}: {source}")]
    RepodataParse {
        channel: String,
        subdir: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, CondaError>;

impl From<CondaError> for depssmuggler_core::CoreError {
    fn from(err: CondaError) -> Self {
        match err {
            CondaError::RepodataUnavailable { channel, subdir } => depssmuggler_core::CoreError::NotFound {
                ecosystem: "conda".to_string(),
                name: format!("{channel}/{subdir}"),
                version: None,
            },
            CondaError::PackageNotFound(name) => depssmuggler_core::CoreError::NotFound {
                ecosystem: "conda".to_string(),
                name,
                version: None,
            },
            CondaError::NoMatchingBuild { name, spec } => depssmuggler_core::CoreError::NotFound {
                ecosystem: "conda".to_string(),
                name,
                version: Some(spec),
            },
            CondaError::InvalidMatchSpec(spec) => depssmuggler_core::CoreError::InvalidVersionReq(spec),
            CondaError::Decompression { channel, subdir, message } => depssmuggler_core::CoreError::ProtocolError {
                what: format!("repodata for {channel}/{subdir}"),
                message,
            },
            CondaError::RepodataParse { channel, subdir, source } => depssmuggler_core::CoreError::ProtocolError {
                what: format!("repodata for {channel}/{subdir}"),
                message: source.to_string(),
            },
        }
    }
}
