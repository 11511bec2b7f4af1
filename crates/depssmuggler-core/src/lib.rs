//! Core abstractions for depssmuggler.
//!
//! This crate provides the foundations shared by every ecosystem adapter:
//! the cross-ecosystem package model, the two-tier HTTP cache, the
//! resolution kernel ("Skipper"), the registry client pool, checksum
//! verification, layered configuration, the structured event bus, the
//! download orchestrator, and output bundle assembly.
//!
//! # Architecture
//!
//! Each ecosystem adapter crate (`depssmuggler-pip`, `depssmuggler-npm`,
//! `depssmuggler-conda`, `depssmuggler-maven`, `depssmuggler-oci`,
//! `depssmuggler-os`) implements the [`ecosystem::Ecosystem`] trait against
//! its own registry protocol, and reuses everything in this crate: caching,
//! HTTP transport, checksum verification, the BFS resolution kernel, and
//! the event/orchestration plumbing that drives a download batch.

pub mod bundle;
pub mod cache;
pub mod checksum;
pub mod config;
pub mod download;
pub mod ecosystem;
pub mod error;
pub mod events;
pub mod http;
pub mod package;
pub mod resolver;

pub use bundle::BundleWriter;
pub use cache::{CacheSource, FetchOptions, TwoTierCache};
pub use checksum::{verify_bytes, verify_file, StreamingVerifier};
pub use config::{Config, ConcurrencyLimits, DepthCaps};
pub use download::{BatchControl, DownloadJob, Orchestrator, PackageDownloader};
pub use ecosystem::{Ecosystem as EcosystemAdapter, Metadata, Registry, Version};
pub use error::{CoreError, Result};
pub use events::{BatchItemResult, BatchSummary, DownloadProgress, DownloadState, Event, EventSink, RecordingSink, SessionStatus};
pub use http::{ProgressTick, RegistryClientPool};
pub use package::{
    Checksum, ChecksumKind, Conflict, DependencyGraphResult, DependencyNode, DependencyScope,
    Ecosystem, FailedPackage, PackageRef, ResolvedPackage, TargetPlatform,
};
pub use resolver::{SkipReason, SkipResult, Skipper, SkipperStats, SkipperStatsSnapshot};
