//! The progress/status event bus. These are a separate, structured channel
//! from `tracing` logs: logs are for operators debugging the tool, events
//! are for the hosting shell (the CLI, or any future UI) to render.

use crate::package::DependencyGraphResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadState {
    Pending,
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

/// One item in an orchestrated download batch's progress stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub package_id: String,
    pub state: DownloadState,
    pub progress_pct: f32,
    pub bytes_done: u64,
    pub bytes_total: Option<u64>,
    pub speed_bps: f64,
}

/// The events an [`Orchestrator`](crate::download::Orchestrator) run or a
/// resolve-only pass emits, per the external interface contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "download:status")]
    DownloadStatus { status: SessionStatus },

    #[serde(rename = "download:deps-resolved")]
    DownloadDepsResolved { result: DependencyGraphResult },

    #[serde(rename = "download:progress")]
    DownloadProgress { progress: DownloadProgress },

    #[serde(rename = "download:all-complete")]
    DownloadAllComplete { summary: BatchSummary },

    #[serde(rename = "os:resolveDependencies:progress")]
    OsResolveDependenciesProgress { package: String, depth: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Resolving,
    Downloading,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub id: String,
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub success: bool,
    pub items: Vec<BatchItemResult>,
}

/// A sink for [`Event`]s. The bin crate implements this to render to
/// stdout; tests implement it to assert on the emitted sequence.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// An [`EventSink`] that records every event for later assertion, used by
/// adapter and orchestrator unit tests in place of a real CLI renderer.
#[derive(Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}
