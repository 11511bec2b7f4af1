//! The generic breadth-first resolution kernel ("the Skipper") shared by
//! every adapter that needs nearest-wins semantics: Maven fully, PyPI/Conda
//! partially, npm for its hoisting variant.
//!
//! The Skipper owns exactly one decision: given a dependency candidate at a
//! given depth/sequence, should the caller expand it, skip it as an
//! already-settled duplicate, skip it while recording a version conflict,
//! or skip it because it closes a cycle? It does not fetch metadata or
//! walk graphs itself — adapters drive their own BFS queues and consult the
//! Skipper once per dequeued candidate.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// `(depth, sequence)` — lower is "nearer", used as the tie-break whenever
/// two candidates for the same name compete for the resolved slot.
type Priority = (u32, u64);

#[derive(Debug, Clone)]
struct ResolvedEntry {
    version: String,
    priority: Priority,
}

/// Why the Skipper decided to skip a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyResolved,
    VersionConflict { winner: String },
    Cycle,
    DepthExceeded,
}

/// The Skipper's verdict for one dependency candidate.
#[derive(Debug, Clone)]
pub struct SkipResult {
    pub skip: bool,
    pub reason: Option<SkipReason>,
    /// Set when a later-dequeued-but-nearer candidate unseats a previously
    /// recorded winner; the caller must re-expand the new winner's subtree.
    pub force_resolution: bool,
}

impl SkipResult {
    fn emit() -> Self {
        Self {
            skip: false,
            reason: None,
            force_resolution: false,
        }
    }

    fn emit_forced() -> Self {
        Self {
            skip: false,
            reason: None,
            force_resolution: true,
        }
    }

    fn skip(reason: SkipReason) -> Self {
        Self {
            skip: true,
            reason: Some(reason),
            force_resolution: false,
        }
    }
}

/// Running tallies exposed for diagnostics / the CLI's summary output.
#[derive(Debug, Default)]
pub struct SkipperStats {
    pub resolved: AtomicU64,
    pub skipped_duplicate: AtomicU64,
    pub skipped_conflict: AtomicU64,
    pub cycles_broken: AtomicU64,
    pub depth_exceeded: AtomicU64,
}

impl SkipperStats {
    pub fn snapshot(&self) -> SkipperStatsSnapshot {
        SkipperStatsSnapshot {
            resolved: self.resolved.load(Ordering::Relaxed),
            skipped_duplicate: self.skipped_duplicate.load(Ordering::Relaxed),
            skipped_conflict: self.skipped_conflict.load(Ordering::Relaxed),
            cycles_broken: self.cycles_broken.load(Ordering::Relaxed),
            depth_exceeded: self.depth_exceeded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkipperStatsSnapshot {
    pub resolved: u64,
    pub skipped_duplicate: u64,
    pub skipped_conflict: u64,
    pub cycles_broken: u64,
    pub depth_exceeded: u64,
}

/// One recorded conflict, ready to be surfaced on
/// [`crate::package::DependencyGraphResult::conflicts`].
#[derive(Debug, Clone)]
pub struct RecordedConflict {
    pub name: String,
    pub contending_versions: Vec<String>,
    pub winner: String,
}

/// The resolution kernel: nearest-definition-wins BFS support, cycle
/// detection via parent-path membership, and a configurable depth cap.
pub struct Skipper {
    resolved: DashMap<String, ResolvedEntry>,
    conflicts: DashMap<String, RecordedConflict>,
    max_depth: u32,
    stats: SkipperStats,
    sequence_counter: AtomicU64,
}

impl Skipper {
    pub fn new(max_depth: u32) -> Self {
        Self {
            resolved: DashMap::new(),
            conflicts: DashMap::new(),
            max_depth,
            stats: SkipperStats::default(),
            sequence_counter: AtomicU64::new(0),
        }
    }

    /// Allocates the next FIFO-stable sequence number. Adapters must call
    /// this while enqueueing siblings under a single lock/serialized
    /// section so BFS ordering stays deterministic across concurrent
    /// producers.
    pub fn next_sequence(&self) -> u64 {
        self.sequence_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Consults the Skipper for one dequeued candidate. `parent_path` is
    /// the chain of ancestor names (lowercased) from the root down to this
    /// candidate's direct parent.
    pub fn skip_resolution(
        &self,
        name: &str,
        version: &str,
        depth: u32,
        sequence: u64,
        parent_path: &[String],
    ) -> SkipResult {
        let key = name.to_lowercase();

        if parent_path.iter().any(|ancestor| ancestor.eq_ignore_ascii_case(&key)) {
            self.stats.cycles_broken.fetch_add(1, Ordering::Relaxed);
            return SkipResult::skip(SkipReason::Cycle);
        }

        if depth > self.max_depth {
            self.stats.depth_exceeded.fetch_add(1, Ordering::Relaxed);
            return SkipResult::skip(SkipReason::DepthExceeded);
        }

        let candidate_priority = (depth, sequence);

        match self.resolved.get(&key) {
            None => SkipResult::emit(),
            Some(existing) if existing.version == version => {
                self.stats.skipped_duplicate.fetch_add(1, Ordering::Relaxed);
                SkipResult::skip(SkipReason::AlreadyResolved)
            }
            Some(existing) => {
                if candidate_priority < existing.priority {
                    // A nearer-or-earlier candidate for the same name just
                    // showed up after a farther one was already recorded;
                    // it must win and the caller re-expands its subtree.
                    self.record_conflict(&key, &existing.version, version);
                    SkipResult::emit_forced()
                } else {
                    self.stats.skipped_conflict.fetch_add(1, Ordering::Relaxed);
                    self.record_conflict(&key, version, &existing.version);
                    SkipResult::skip(SkipReason::VersionConflict {
                        winner: existing.version.clone(),
                    })
                }
            }
        }
    }

    fn record_conflict(&self, key: &str, loser_version: &str, winner_version: &str) {
        self.conflicts
            .entry(key.to_string())
            .and_modify(|c| {
                if !c.contending_versions.iter().any(|v| v == loser_version) {
                    c.contending_versions.push(loser_version.to_string());
                }
                c.winner = winner_version.to_string();
            })
            .or_insert_with(|| RecordedConflict {
                name: key.to_string(),
                contending_versions: vec![loser_version.to_string(), winner_version.to_string()],
                winner: winner_version.to_string(),
            });
    }

    /// Marks `name` as definitively resolved to `version` at `(depth,
    /// sequence)`. Must be called once per winning candidate, after
    /// `skip_resolution` returned `skip: false`.
    pub fn record_resolved(&self, name: &str, version: &str, depth: u32, sequence: u64) {
        let key = name.to_lowercase();
        self.resolved.insert(
            key,
            ResolvedEntry {
                version: version.to_string(),
                priority: (depth, sequence),
            },
        );
        self.stats.resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_resolved_version(&self, name: &str) -> Option<String> {
        self.resolved.get(&name.to_lowercase()).map(|e| e.version.clone())
    }

    pub fn stats(&self) -> SkipperStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn conflicts(&self) -> Vec<RecordedConflict> {
        self.conflicts.iter().map(|e| e.value().clone()).collect()
    }
}
