//! PyPI JSON API client built on the shared two-tier cache and registry
//! client pool. Exposes both the top-level project document and the
//! per-version document (the latter carries `requires_dist` for the exact
//! release being resolved).

use crate::error::{PipError, Result};
use crate::types::{ProjectResponse, ProjectVersionResponse, PypiPackage, PypiVersion};
use async_trait::async_trait;
use depssmuggler_core::{CacheSource, FetchOptions, Metadata, TwoTierCache, Version};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

const CATALOG_TTL: Duration = Duration::from_millis(3_600_000);

pub struct PypiRegistry {
    base_url: String,
    cache: Arc<TwoTierCache>,
}

impl PypiRegistry {
    pub fn new(base_url: impl Into<String>, cache: Arc<TwoTierCache>) -> Self {
        Self {
            base_url: base_url.into(),
            cache,
        }
    }

    fn project_url(&self, name: &str) -> String {
        format!("{}/pypi/{}/json", self.base_url, urlencoding::encode(name))
    }

    fn project_version_url(&self, name: &str, version: &str) -> String {
        format!(
            "{}/pypi/{}/{}/json",
            self.base_url,
            urlencoding::encode(name),
            urlencoding::encode(version)
        )
    }

    /// Fetches and parses the top-level project document (all releases).
    pub async fn fetch_project(&self, name: &str) -> Result<ProjectResponse> {
        let url = self.project_url(name);
        let key = format!("pip:project:{}", name.to_lowercase());
        let (body, _source): (Arc<Vec<u8>>, CacheSource) = self
            .cache
            .fetch(&key, &url, &FetchOptions::new(CATALOG_TTL))
            .await
            .map_err(|_| PipError::PackageNotFound(name.to_string()))?;

        serde_json::from_slice(&body).map_err(|source| PipError::ApiResponse {
            package: name.to_string(),
            source,
        })
    }

    /// Fetches and parses the per-version project document, which carries
    /// `requires_dist` for that exact release.
    pub async fn fetch_project_version(&self, name: &str, version: &str) -> Result<ProjectVersionResponse> {
        let url = self.project_version_url(name, version);
        let key = format!("pip:version:{}:{}", name.to_lowercase(), version);
        let (body, _source) = self
            .cache
            .fetch(&key, &url, &FetchOptions::new(CATALOG_TTL))
            .await
            .map_err(|_| PipError::NoMatchingVersion {
                name: name.to_string(),
                requirement: version.to_string(),
            })?;

        serde_json::from_slice(&body).map_err(|source| PipError::ApiResponse {
            package: name.to_string(),
            source,
        })
    }
}

#[async_trait]
impl depssmuggler_core::Registry for PypiRegistry {
    async fn get_versions(&self, name: &str) -> depssmuggler_core::Result<Vec<Box<dyn Version>>> {
        let project = self.fetch_project(name).await?;
        let mut versions: Vec<(String, bool)> = project
            .releases
            .into_iter()
            .map(|(version, files)| {
                let yanked = !files.is_empty() && files.iter().all(|f| f.yanked);
                (version, yanked)
            })
            .collect();
        versions.sort_by(|a, b| crate::version::compare_pep440_like(&b.0, &a.0));

        Ok(versions
            .into_iter()
            .map(|(version, yanked)| Box::new(PypiVersion { version, yanked }) as Box<dyn Version>)
            .collect())
    }

    async fn get_latest_matching(&self, name: &str, req: &str) -> depssmuggler_core::Result<Option<Box<dyn Version>>> {
        let versions = self.get_versions(name).await?;
        if req.trim().is_empty() {
            return Ok(versions.into_iter().find(|v| !v.is_yanked()));
        }

        let specifiers = crate::version::parse_specifiers(req)?;

        for candidate in versions {
            if candidate.is_yanked() {
                continue;
            }
            if crate::version::satisfies(candidate.version_string(), &specifiers) {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    async fn search(&self, query: &str, limit: usize) -> depssmuggler_core::Result<Vec<Box<dyn Metadata>>> {
        // PyPI's simple-index is HTML-only and offers no search API; an
        // exact-name lookup through the JSON API is the only reliable hit
        // available without scraping.
        match self.fetch_project(query).await {
            Ok(project) => Ok(vec![Box::new(PypiPackage {
                name: project.info.name,
                summary: project.info.summary,
                latest_version: project.info.version,
            }) as Box<dyn Metadata>]),
            Err(_) => {
                let _ = limit;
                Ok(vec![])
            }
        }
    }

    fn package_url(&self, name: &str) -> String {
        format!("https://pypi.org/project/{name}/")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
