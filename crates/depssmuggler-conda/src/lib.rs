//! Conda/conda-forge channel adapter for depssmuggler.
//!
//! Implements [`depssmuggler_core::EcosystemAdapter`] against a
//! conda-style channel: repodata acquisition with a zstd/gzip/plain
//! fallback chain, MatchSpec-based candidate selection, system-package
//! exclusion, and `.conda`/`.tar.bz2` download with checksum verification.

pub mod ecosystem;
pub mod error;
pub mod matchspec;
pub mod registry;
pub mod types;
pub mod version;

pub use ecosystem::CondaEcosystem;
pub use error::{CondaError, Result};
pub use matchspec::MatchSpec;
pub use registry::CondaRegistry;
pub use types::{CondaPackage, CondaVersion};
