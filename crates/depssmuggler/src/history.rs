//! Session history store: `$HOME/.depssmuggler/history.json`, a list of
//! session records newest-first, capped at 100 entries. Schema is treated
//! as opaque by `depssmuggler-core` -- this is a thin shell concern, read
//! and written with plain `serde_json`, the same read-modify-write pattern
//! the teacher used for its own on-disk manifests.

use crate::error::Result;
use depssmuggler_core::BatchSummary;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MAX_ENTRIES: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    /// Unix epoch seconds. Passed in by the caller rather than sampled
    /// with `SystemTime::now()` here, so the store stays trivially
    /// testable.
    pub started_at_unix: u64,
    pub references: Vec<String>,
    pub output_dir: PathBuf,
    pub success: bool,
    pub package_count: usize,
    pub failed_count: usize,
}

impl SessionRecord {
    pub fn from_summary(
        id: impl Into<String>,
        started_at_unix: u64,
        references: Vec<String>,
        output_dir: PathBuf,
        summary: &BatchSummary,
    ) -> Self {
        Self {
            id: id.into(),
            started_at_unix,
            references,
            output_dir,
            success: summary.success,
            package_count: summary.items.len(),
            failed_count: summary.items.iter().filter(|i| !i.ok).count(),
        }
    }
}

pub fn default_history_path() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    home.join(".depssmuggler").join("history.json")
}

/// Loads the history list, newest first. A missing file is treated as an
/// empty history rather than an error (first run).
pub fn load(path: &Path) -> Result<Vec<SessionRecord>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// Prepends `record` to the history at `path`, capping the total at
/// [`MAX_ENTRIES`] and dropping the oldest entries first.
pub fn append(path: &Path, record: SessionRecord) -> Result<()> {
    let mut records = load(path)?;
    records.insert(0, record);
    records.truncate(MAX_ENTRIES);
    save(path, &records)
}

pub fn save(path: &Path, records: &[SessionRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn clear(path: &Path) -> Result<()> {
    save(path, &[])
}
