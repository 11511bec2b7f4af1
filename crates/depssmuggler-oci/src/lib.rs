//! Docker/OCI registry adapter for depssmuggler.
//!
//! Implements [`depssmuggler_core::EcosystemAdapter`] against the OCI
//! Distribution Spec: registry/repository normalization, anonymous
//! bearer-token auth, manifest-list platform selection, digest-verified
//! blob streaming, and docker-load `.tar` bundle assembly.

pub mod ecosystem;
pub mod error;
pub mod registry;
pub mod types;

pub use ecosystem::{OciEcosystem, OciRegistryAdapter};
pub use error::{OciError, Result};
pub use registry::OciRegistry;
pub use types::{parse_reference, ImageReference};
