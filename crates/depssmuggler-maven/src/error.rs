//! Errors specific to the Maven adapter: coordinate parsing, POM
//! acquisition, and XML parsing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MavenError {
    #[error("invalid Maven coordinate '{0}', expected groupId:artifactId[:version]")]
    InvalidCoordinate(String),

    #[error("no versions found for {group_id}:{artifact_id}")]
    NoVersions { group_id: String, artifact_id: String },

    #[error("artifact not found: {group_id}:{artifact_id}:{version}")]
    ArtifactNotFound {
        group_id: String,
        artifact_id: String,
        version: String,
    },

    #[error("failed to parse POM for {group_id}:{artifact_id}:{version}: {message}")]
    PomParse {
        group_id: String,
        artifact_id: String,
        version: String,
        message: String,
    },

    #[error("parent POM chain for {0} exceeded the maximum depth, likely a cycle")]
    ParentCycle(String),
}

pub type Result<T> = std::result::Result<T, MavenError>;

impl From<MavenError> for depssmuggler_core::CoreError {
    fn from(err: MavenError) -> Self {
        match err {
            MavenError::InvalidCoordinate(coord) => depssmuggler_core::CoreError::InvalidReference(coord),
            MavenError::NoVersions { group_id, artifact_id } => depssmuggler_core::CoreError::NotFound {
                ecosystem: "maven".to_string(),
                name: format!("{group_id}:{artifact_id}"),
                version: None,
            },
            MavenError::ArtifactNotFound {
                group_id,
                artifact_id,
                version,
            } => depssmuggler_core::CoreError::NotFound {
                ecosystem: "maven".to_string(),
                name: format!("{group_id}:{artifact_id}"),
                version: Some(version),
            },
            MavenError::PomParse {
                group_id,
                artifact_id,
                version,
                message,
            } => depssmuggler_core::CoreError::ProtocolError {
                what: format!("POM for {group_id}:{artifact_id}:{version}"),
                message,
            },
            MavenError::ParentCycle(coord) => depssmuggler_core::CoreError::CycleBroken(coord),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_versions_converts_to_not_found() {
        let core_err: depssmuggler_core::CoreError = MavenError::NoVersions {
            group_id: "org.example".into(),
            artifact_id: "widget".into(),
        }
        .into();
        assert!(matches!(core_err, depssmuggler_core::CoreError::NotFound { .. }));
    }

    #[test]
    fn parent_cycle_converts_to_cycle_broken() {
        let core_err: depssmuggler_core::CoreError = MavenError::ParentCycle("org.example:widget:1.0".into()).into();
        assert!(matches!(core_err, depssmuggler_core::CoreError::CycleBroken(_)));
    }
}
