//! npm registry adapter for depssmuggler.
//!
//! Implements [`depssmuggler_core::EcosystemAdapter`] against the public
//! npm registry: packument fetch and caching, dist-tag/semver-range
//! version resolution, `node_modules` hoisting-tree construction, and
//! tarball download with integrity verification.

pub mod ecosystem;
pub mod error;
pub mod hoisting;
pub mod registry;
pub mod semver_range;
pub mod types;

pub use ecosystem::NpmEcosystem;
pub use error::{NpmError, Result};
pub use registry::NpmRegistry;
pub use types::{NpmPackage, NpmVersion};
