//! PyPI/Python wheel and sdist adapter for depssmuggler.
//!
//! Implements [`depssmuggler_core::EcosystemAdapter`] against the PyPI JSON
//! API: PEP 508 requirement parsing, PEP 440 version/specifier matching,
//! environment-marker evaluation against a target platform rather than the
//! host, and wheel/sdist artifact selection by platform/arch/interpreter
//! tag.

pub mod ecosystem;
pub mod error;
pub mod markers;
pub mod registry;
pub mod types;
pub mod version;

pub use ecosystem::PypiEcosystem;
pub use error::{PipError, Result};
pub use registry::PypiRegistry;
pub use types::{PypiPackage, PypiVersion};
