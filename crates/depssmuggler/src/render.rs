//! Renders [`Event`]s to the terminal. This is the "hosting shell" side of
//! the event bus described in the external-interfaces contract: logs (via
//! `tracing`) are for operators debugging the tool, these events are the
//! user-facing progress/status stream.

use depssmuggler_core::{Event, EventSink, SessionStatus};
use std::io::Write;
use std::sync::Mutex;

/// Renders events as single-line human-readable progress to stdout.
pub struct TextSink {
    verbose: bool,
}

impl TextSink {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl EventSink for TextSink {
    fn emit(&self, event: Event) {
        let mut stdout = std::io::stdout();
        match event {
            Event::DownloadStatus { status } => {
                let label = match status {
                    SessionStatus::Resolving => "resolving dependencies",
                    SessionStatus::Downloading => "downloading artifacts",
                };
                let _ = writeln!(stdout, "==> {label}");
            }
            Event::DownloadDepsResolved { result } => {
                let _ = writeln!(
                    stdout,
                    "==> resolved {} package(s), {} conflict(s), {} failure(s)",
                    result.flat_list.len(),
                    result.conflicts.len(),
                    result.failed.len()
                );
                if self.verbose {
                    for pkg in &result.flat_list {
                        let _ = writeln!(stdout, "    {}:{}=={}", pkg.ecosystem, pkg.name, pkg.version);
                    }
                    for conflict in &result.conflicts {
                        let _ = writeln!(
                            stdout,
                            "    conflict: {} {:?} -> winner {}",
                            conflict.name, conflict.contending_versions, conflict.winner
                        );
                    }
                    for failed in &result.failed {
                        let _ = writeln!(stdout, "    failed: {} ({})", failed.reference, failed.error);
                    }
                }
            }
            Event::DownloadProgress { progress } => {
                if self.verbose {
                    let _ = writeln!(
                        stdout,
                        "    {} {:.1}% ({} / {} bytes, {:.0} B/s)",
                        progress.package_id,
                        progress.progress_pct,
                        progress.bytes_done,
                        progress.bytes_total.map(|b| b.to_string()).unwrap_or_else(|| "?".to_string()),
                        progress.speed_bps
                    );
                }
            }
            Event::DownloadAllComplete { summary } => {
                let failed = summary.items.iter().filter(|i| !i.ok).count();
                let _ = writeln!(
                    stdout,
                    "==> done: {}/{} package(s) succeeded",
                    summary.items.len() - failed,
                    summary.items.len()
                );
                for item in summary.items.iter().filter(|i| !i.ok) {
                    let _ = writeln!(stdout, "    FAILED {}: {}", item.id, item.error.as_deref().unwrap_or("unknown error"));
                }
            }
            Event::OsResolveDependenciesProgress { package, depth } => {
                if self.verbose {
                    let _ = writeln!(stdout, "    resolving {package} (depth {depth})");
                }
            }
        }
    }
}

/// Renders each event as a single JSON line (`ndjson`), for scripting.
pub struct JsonSink;

impl EventSink for JsonSink {
    fn emit(&self, event: Event) {
        if let Ok(line) = serde_json::to_string(&event) {
            println!("{line}");
        }
    }
}

/// Fans an event out to multiple sinks, used to drive both terminal
/// rendering and history bookkeeping from the same orchestrator run.
pub struct RecordingTee {
    inner: Box<dyn EventSink>,
    captured: Mutex<Vec<Event>>,
}

impl RecordingTee {
    pub fn new(inner: Box<dyn EventSink>) -> Self {
        Self {
            inner,
            captured: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.captured.lock().unwrap().clone()
    }
}

impl EventSink for RecordingTee {
    fn emit(&self, event: Event) {
        self.captured.lock().unwrap().push(event.clone());
        self.inner.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depssmuggler_core::{BatchItemResult, BatchSummary};

    #[test]
    fn recording_tee_captures_everything_forwarded() {
        let tee = RecordingTee::new(Box::new(JsonSink));
        tee.emit(Event::DownloadStatus {
            status: SessionStatus::Resolving,
        });
        tee.emit(Event::DownloadAllComplete {
            summary: BatchSummary {
                success: true,
                items: vec![BatchItemResult {
                    id: "pip:requests".to_string(),
                    ok: true,
                    error: None,
                }],
            },
        });
        assert_eq!(tee.events().len(), 2);
    }
}
