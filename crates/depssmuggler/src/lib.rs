//! `depssmuggler`: the thin CLI shell over the multi-ecosystem
//! dependency-resolution and artifact-acquisition core. Argument parsing,
//! event rendering, history-file I/O, and bundle archiving live here;
//! everything else (resolution, caching, checksum verification, the
//! download orchestrator) lives in `depssmuggler-core` and the
//! per-ecosystem adapter crates.

pub mod archive;
pub mod cli;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod render;

pub use error::{CliError, Result};
