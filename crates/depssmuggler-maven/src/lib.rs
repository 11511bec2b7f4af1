//! Maven Central adapter for depssmuggler.
//!
//! Implements [`depssmuggler_core::EcosystemAdapter`] against Maven Central:
//! `groupId:artifactId[:version]` coordinate parsing, parent-POM and BOM
//! (`dependencyManagement` import scope) inheritance with `${...}` property
//! substitution, scope-transitivity-filtered breadth-first resolution
//! through the shared Skipper kernel, and `.m2`-layout artifact download
//! with SHA-1 sidecar verification.

pub mod coordinate;
pub mod ecosystem;
pub mod error;
pub mod pom;
pub mod registry;
pub mod version;

pub use coordinate::Coordinate;
pub use ecosystem::MavenEcosystem;
pub use error::{MavenError, Result};
pub use registry::MavenRegistry;
