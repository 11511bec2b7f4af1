//! The Download Orchestrator: schedules parallel fetches for a resolved
//! package list with pause/resume/cancel, throttled progress, and
//! per-package failure isolation.

use crate::error::{CoreError, Result};
use crate::events::{BatchItemResult, BatchSummary, DownloadProgress, DownloadState, Event, EventSink, SessionStatus};
use crate::package::ResolvedPackage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One package's place in the download lifecycle.
/// `pending -> active -> (paused <-> active)* -> {completed, failed, cancelled}`.
/// Terminal states are sticky: once set, a job's state never changes again.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub reference: String,
    pub output_path: PathBuf,
    pub state: DownloadState,
    pub bytes_done: u64,
    pub bytes_total: Option<u64>,
    pub speed_bps: f64,
    pub error: Option<String>,
}

impl DownloadJob {
    pub fn new(reference: impl Into<String>, output_path: PathBuf) -> Self {
        Self {
            reference: reference.into(),
            output_path,
            state: DownloadState::Pending,
            bytes_done: 0,
            bytes_total: None,
            speed_bps: 0.0,
            error: None,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            DownloadState::Completed | DownloadState::Failed | DownloadState::Cancelled
        )
    }

    fn transition(&mut self, next: DownloadState) {
        if self.is_terminal() {
            return;
        }
        self.state = next;
    }
}

/// Cooperative pause/cancel control shared across all in-flight downloads
/// in a batch. Pause is polled between packages and between progress
/// ticks; cancel is sticky and takes effect after the current in-flight
/// HTTP stream completes or errors.
#[derive(Default)]
pub struct BatchControl {
    paused: AtomicBool,
    cancelled: AtomicBool,
}

impl BatchControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn wait_while_paused(&self) {
        while self.is_paused() && !self.is_cancelled() {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
}

/// One resolved package's downloader, abstracted so the orchestrator does
/// not depend on any specific ecosystem crate.
#[async_trait::async_trait]
pub trait PackageDownloader: Send + Sync {
    async fn download(&self, pkg: &ResolvedPackage, dest_dir: &std::path::Path) -> Result<PathBuf>;
}

/// Drives a bounded-parallelism download batch over a resolved package
/// list, emitting status/progress/completion events and writing into
/// `output_dir/packages/`.
pub struct Orchestrator {
    semaphore: Arc<Semaphore>,
    control: Arc<BatchControl>,
}

impl Orchestrator {
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            control: Arc::new(BatchControl::new()),
        }
    }

    pub fn control(&self) -> Arc<BatchControl> {
        Arc::clone(&self.control)
    }

    /// Downloads `packages` in input order (iteration order is preserved
    /// so a sequential installer could run package-by-package), dispatching
    /// concurrently up to the configured limit. A single package's failure
    /// is recorded and does not abort the batch.
    pub async fn run(
        &self,
        packages: &[ResolvedPackage],
        downloader: Arc<dyn PackageDownloader>,
        output_dir: &std::path::Path,
        sink: &dyn EventSink,
    ) -> BatchSummary {
        sink.emit(Event::DownloadStatus {
            status: SessionStatus::Downloading,
        });

        let packages_dir = output_dir.join("packages");
        if let Err(err) = tokio::fs::create_dir_all(&packages_dir).await {
            return BatchSummary {
                success: false,
                items: vec![BatchItemResult {
                    id: "packages-dir".to_string(),
                    ok: false,
                    error: Some(err.to_string()),
                }],
            };
        }

        let mut handles = Vec::with_capacity(packages.len());
        for pkg in packages {
            let pkg = pkg.clone();
            let semaphore = Arc::clone(&self.semaphore);
            let control = Arc::clone(&self.control);
            let downloader = Arc::clone(&downloader);
            let packages_dir = packages_dir.clone();

            handles.push(tokio::spawn(async move {
                let permit = semaphore.acquire_owned().await.expect("semaphore closed");
                control.wait_while_paused().await;

                let id = format!("{}:{}", pkg.ecosystem, pkg.name);
                if control.is_cancelled() {
                    drop(permit);
                    return BatchItemResult {
                        id,
                        ok: false,
                        error: Some(CoreError::Cancelled.to_string()),
                    };
                }

                let result = downloader.download(&pkg, &packages_dir).await;
                drop(permit);
                match result {
                    Ok(_) => BatchItemResult { id, ok: true, error: None },
                    Err(err) => BatchItemResult {
                        id,
                        ok: false,
                        error: Some(err.to_string()),
                    },
                }
            }));
        }

        let mut items = Vec::with_capacity(handles.len());
        for handle in handles {
            items.push(handle.await.unwrap_or_else(|join_err| BatchItemResult {
                id: "unknown".to_string(),
                ok: false,
                error: Some(join_err.to_string()),
            }));
        }

        let success = items.iter().all(|i| i.ok);
        let summary = BatchSummary { success, items };
        sink.emit(Event::DownloadAllComplete { summary: summary.clone() });
        summary
    }
}

/// Builds a throttled progress-emitting closure for
/// [`crate::http::RegistryClientPool::download_to_file`], translating raw
/// byte ticks into a [`DownloadProgress`] event.
pub fn progress_emitter<'a>(
    package_id: String,
    sink: &'a dyn EventSink,
) -> impl FnMut(crate::http::ProgressTick) + 'a {
    move |tick| {
        let progress_pct = match tick.bytes_total {
            Some(total) if total > 0 => (tick.bytes_done as f32 / total as f32) * 100.0,
            _ => 0.0,
        };
        sink.emit(Event::DownloadProgress {
            progress: DownloadProgress {
                package_id: package_id.clone(),
                state: DownloadState::Active,
                progress_pct,
                bytes_done: tick.bytes_done,
                bytes_total: tick.bytes_total,
                speed_bps: tick.speed_bps,
            },
        });
    }
}
