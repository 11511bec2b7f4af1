//! YUM/DNF, APT, and APK operating-system package adapter for
//! depssmuggler: repodata codecs, per-backend registries, RPM/dpkg
//! version comparators, and the `Ecosystem`/`Registry` trait glue shared
//! by all three backends.

pub mod codecs;
pub mod ecosystem;
pub mod error;
pub mod registry;
pub mod types;
pub mod version;

pub use ecosystem::{OsEcosystem, OsRegistryAdapter};
pub use error::{OsError, Result};
pub use registry::{ApkRegistry, AptRegistry, OSPackageDownloader, OsIndex, OsRegistry, YumRegistry};
pub use types::{Backend, CacheMode, MatchType, OnErrorAction, OsPackage};
