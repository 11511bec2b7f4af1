//! Adapts [`crate::context::CoreContext`] to
//! [`depssmuggler_core::PackageDownloader`], so the generic
//! [`depssmuggler_core::Orchestrator`] can drive a download batch that
//! spans every ecosystem without knowing any of their concrete types.

use crate::context::CoreContext;
use async_trait::async_trait;
use depssmuggler_core::{CoreError, PackageDownloader, ResolvedPackage, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct MultiEcosystemDownloader {
    context: Arc<CoreContext>,
}

impl MultiEcosystemDownloader {
    pub fn new(context: Arc<CoreContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl PackageDownloader for MultiEcosystemDownloader {
    async fn download(&self, pkg: &ResolvedPackage, dest_dir: &Path) -> Result<PathBuf> {
        let adapter = self.context.adapter(pkg.ecosystem).ok_or_else(|| CoreError::UnsupportedEcosystem(pkg.ecosystem.to_string()))?;
        adapter.download(pkg, dest_dir).await
    }
}
