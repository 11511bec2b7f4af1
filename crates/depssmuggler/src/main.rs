use clap::Parser;
use depssmuggler::archive;
use depssmuggler::cli::{Cli, Command, HistoryAction, TargetArgs};
use depssmuggler::context::{AdapterOptions, CoreContext};
use depssmuggler::dispatch::MultiEcosystemDownloader;
use depssmuggler::error::Result;
use depssmuggler::history;
use depssmuggler::render::{JsonSink, TextSink};
use depssmuggler_core::{
    BundleWriter, Config, DependencyGraphResult, EventSink, Orchestrator, PackageRef, SessionStatus, TargetPlatform,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn target_platform(target: &TargetArgs) -> TargetPlatform {
    TargetPlatform {
        os: Some(target.os.clone().unwrap_or_else(|| std::env::consts::OS.to_string())),
        arch: Some(target.arch.clone()),
        python_version: target.python_version.clone(),
    }
}

/// Resolves every `ecosystem:reference` string against the context,
/// merging per-reference results into one [`DependencyGraphResult`].
/// Unparseable or unsupported references are recorded as failures rather
/// than aborting the whole batch, matching the resolver's own
/// never-throw-for-one-node policy.
async fn resolve_all(context: &CoreContext, references: &[String], target: &TargetPlatform) -> DependencyGraphResult {
    let mut merged = DependencyGraphResult::default();

    for raw in references {
        let (ecosystem, rest) = match PackageRef::split_ecosystem_prefix(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                merged.failed.push(depssmuggler_core::FailedPackage {
                    reference: raw.clone(),
                    error: err.to_string(),
                });
                continue;
            }
        };

        let Some(adapter) = context.adapter(ecosystem) else {
            merged.failed.push(depssmuggler_core::FailedPackage {
                reference: raw.clone(),
                error: format!("no adapter registered for ecosystem {ecosystem}"),
            });
            continue;
        };

        let reference = match adapter.parse_reference(rest) {
            Ok(r) => r,
            Err(err) => {
                merged.failed.push(depssmuggler_core::FailedPackage {
                    reference: raw.clone(),
                    error: err.to_string(),
                });
                continue;
            }
        };

        match adapter.resolve(&reference, target).await {
            Ok(result) => merged.merge(result),
            Err(err) => merged.failed.push(depssmuggler_core::FailedPackage {
                reference: raw.clone(),
                error: err.to_string(),
            }),
        }
    }

    merged
}

/// Drops everything but each root's own package from a resolved graph,
/// for `--no-deps` invocations that want the named packages without
/// pulling in their transitive closure.
fn keep_roots_only(mut result: DependencyGraphResult) -> DependencyGraphResult {
    let keep: HashSet<_> = result.roots.iter().map(|node| node.pkg.key()).collect();
    result.flat_list.retain(|pkg| keep.contains(&pkg.key()));
    result.conflicts.clear();
    result
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let sink: Box<dyn EventSink> = if cli.json { Box::new(JsonSink) } else { Box::new(TextSink::new(cli.verbose)) };

    match cli.command {
        Command::Resolve { references, target } => {
            let context = CoreContext::build(&config, &AdapterOptions::default(), &target.arch);
            let target_platform = target_platform(&target);

            sink.emit(depssmuggler_core::Event::DownloadStatus {
                status: SessionStatus::Resolving,
            });
            let result = resolve_all(&context, &references, &target_platform).await;
            sink.emit(depssmuggler_core::Event::DownloadDepsResolved { result });
            Ok(())
        }

        Command::Download {
            references,
            target,
            output_dir,
            format,
            no_scripts,
            no_deps,
            concurrency,
        } => {
            let context = Arc::new(CoreContext::build(&config, &AdapterOptions::default(), &target.arch));
            let target_platform = target_platform(&target);

            sink.emit(depssmuggler_core::Event::DownloadStatus {
                status: SessionStatus::Resolving,
            });
            let mut result = resolve_all(&context, &references, &target_platform).await;
            if no_deps {
                result = keep_roots_only(result);
            }
            sink.emit(depssmuggler_core::Event::DownloadDepsResolved { result: result.clone() });

            let bundle = BundleWriter::new(&output_dir);
            bundle.prepare()?;

            let orchestrator = Orchestrator::new(concurrency.max(1));
            let downloader = Arc::new(MultiEcosystemDownloader::new(Arc::clone(&context)));
            let summary = orchestrator.run(&result.flat_list, downloader, &output_dir, sink.as_ref()).await;

            if !no_scripts {
                bundle.write_install_scripts(&result.flat_list)?;
            }
            let archived = archive::archive(&output_dir, format)?;
            if let Some(path) = archived {
                println!("archived bundle to {}", path.display());
            }

            let started_at = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let record = history::SessionRecord::from_summary(
                uuid::Uuid::new_v4().to_string(),
                started_at,
                references,
                output_dir,
                &summary,
            );
            history::append(&history::default_history_path(), record)?;

            if !summary.success {
                std::process::exit(1);
            }
            Ok(())
        }

        Command::History { action } => match action {
            HistoryAction::Show { limit } => {
                let records = history::load(&history::default_history_path())?;
                if cli.json {
                    for record in records.iter().take(limit) {
                        println!("{}", serde_json::to_string(record)?);
                    }
                } else {
                    for record in records.iter().take(limit) {
                        println!(
                            "{} [{}] {} package(s), {} failure(s) -> {}",
                            record.id,
                            record.started_at_unix,
                            record.package_count,
                            record.failed_count,
                            record.output_dir.display()
                        );
                    }
                }
                Ok(())
            }
            HistoryAction::Clear => {
                history::clear(&history::default_history_path())?;
                println!("history cleared");
                Ok(())
            }
        },
    }
}
