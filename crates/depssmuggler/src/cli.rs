//! Command-line surface. Deliberately thin: argument parsing, wiring a
//! [`crate::context::CoreContext`], rendering events, and history-file
//! I/O. No resolution or download logic lives here -- that's all in
//! `depssmuggler-core` and the ecosystem adapter crates.

use clap::{Parser, Subcommand};

use crate::archive::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "depssmuggler", version, about = "Offline-package-transfer courier for air-gapped networks")]
pub struct Cli {
    /// Path to a config.toml overriding the default
    /// `$HOME/.depssmuggler/config.toml`.
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Emit structured JSON events (one per line) instead of human text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Print every resolved package and progress tick, not just
    /// summaries.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Parser)]
pub struct TargetArgs {
    /// Target operating system (`linux`, `windows`, `darwin`). Affects
    /// pip wheel selection, Conda subdir, and OCI manifest-list
    /// selection. Defaults to the host's.
    #[arg(long = "target-os")]
    pub os: Option<String>,

    /// Target CPU architecture (`x86_64`, `arm64`, ...). Defaults to the
    /// host's.
    #[arg(long, default_value = "x86_64")]
    pub arch: String,

    /// Target CPython minor version (pip only), e.g. `3.10`.
    #[arg(long = "python-version")]
    pub python_version: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve one or more package references' full transitive closure
    /// without downloading anything.
    Resolve {
        /// `ecosystem:name[==version]` references, e.g.
        /// `pip:requests==2.31.0`, `docker:nginx:1.25`.
        #[arg(required = true)]
        references: Vec<String>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Resolve (unless `--no-deps`) and download a full package bundle to
    /// `--out`.
    Download {
        #[arg(required = true)]
        references: Vec<String>,

        #[command(flatten)]
        target: TargetArgs,

        /// Destination directory for the bundle.
        #[arg(long = "out")]
        output_dir: std::path::PathBuf,

        /// Archive the finished bundle as well as leaving it on disk.
        #[arg(long, value_enum, default_value = "dir")]
        format: OutputFormat,

        /// Skip emitting `install.sh`/`install.ps1`.
        #[arg(long)]
        no_scripts: bool,

        /// Resolve only the references given, without pulling in their
        /// transitive dependencies.
        #[arg(long)]
        no_deps: bool,

        /// Maximum concurrent downloads.
        #[arg(long, default_value_t = 3)]
        concurrency: usize,
    },

    /// Inspect or clear the session history log.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum HistoryAction {
    /// Print recent sessions, newest first.
    Show {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete all recorded sessions.
    Clear,
}
