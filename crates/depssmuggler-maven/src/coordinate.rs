//! Maven coordinate parsing: `groupId:artifactId[:version]`.

use crate::error::{MavenError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group_id: String,
    pub artifact_id: String,
}

impl Coordinate {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }

    pub fn ga(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }
}

/// Parses a `groupId:artifactId[:version]` reference into its coordinate
/// and optional version (which may itself be a range expression).
pub fn parse_reference(raw: &str) -> Result<(Coordinate, Option<String>)> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    match parts.as_slice() {
        [group_id, artifact_id] if !group_id.is_empty() && !artifact_id.is_empty() => {
            Ok((Coordinate::new(*group_id, *artifact_id), None))
        }
        [group_id, artifact_id, version] if !group_id.is_empty() && !artifact_id.is_empty() && !version.is_empty() => {
            Ok((Coordinate::new(*group_id, *artifact_id), Some((*version).to_string())))
        }
        _ => Err(MavenError::InvalidCoordinate(raw.to_string())),
    }
}

/// Splits `groupId:artifactId` (no version) as used inside `<exclusion>`
/// and dependencyManagement map keys.
pub fn parse_ga(raw: &str) -> Option<Coordinate> {
    let (group_id, artifact_id) = raw.split_once(':')?;
    Some(Coordinate::new(group_id, artifact_id))
}
