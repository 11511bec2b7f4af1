//! npm registry client built on the shared two-tier cache and registry
//! client pool. Exposes the packument document (versions, dist-tags, and
//! per-version `dependencies`/`dist`) plus the public search endpoint.

use crate::error::{NpmError, Result};
use crate::types::{NpmPackage, NpmVersion, Packument, SearchResponse};
use async_trait::async_trait;
use depssmuggler_core::{CacheSource, FetchOptions, Metadata, TwoTierCache, Version};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

const PACKUMENT_TTL: Duration = Duration::from_millis(300_000);

pub struct NpmRegistry {
    base_url: String,
    cache: Arc<TwoTierCache>,
}

impl NpmRegistry {
    pub fn new(base_url: impl Into<String>, cache: Arc<TwoTierCache>) -> Self {
        Self {
            base_url: base_url.into(),
            cache,
        }
    }

    fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, encode_package_name(name))
    }

    fn search_url(&self, query: &str, limit: usize) -> String {
        format!(
            "{}/-/v1/search?text={}&size={}",
            self.base_url,
            urlencoding::encode(query),
            limit
        )
    }

    /// Fetches and parses the full packument for a package.
    pub async fn fetch_packument(&self, name: &str) -> Result<Packument> {
        let url = self.package_url(name);
        let key = format!("npm:packument:{}", name.to_lowercase());
        let (body, _source): (Arc<Vec<u8>>, CacheSource) = self
            .cache
            .fetch(&key, &url, &FetchOptions::new(PACKUMENT_TTL))
            .await
            .map_err(|_| NpmError::PackageNotFound(name.to_string()))?;

        serde_json::from_slice(&body).map_err(|source| NpmError::ApiResponse {
            package: name.to_string(),
            source,
        })
    }
}

/// Scoped packages (`@scope/name`) carry a literal `/` in the path; only the
/// separator needs escaping, not the whole name.
fn encode_package_name(name: &str) -> String {
    if let Some(rest) = name.strip_prefix('@') {
        format!("@{}", rest.replacen('/', "%2F", 1))
    } else {
        urlencoding::encode(name).into_owned()
    }
}

#[async_trait]
impl depssmuggler_core::Registry for NpmRegistry {
    async fn get_versions(&self, name: &str) -> depssmuggler_core::Result<Vec<Box<dyn Version>>> {
        let packument = self.fetch_packument(name).await?;
        let mut versions: Vec<NpmVersion> = packument
            .versions
            .iter()
            .map(|(version, meta)| NpmVersion {
                version: version.clone(),
                deprecated: meta.deprecated.is_some(),
            })
            .collect();
        versions.sort_by(|a, b| crate::semver_range::compare(&b.version, &a.version));

        Ok(versions.into_iter().map(|v| Box::new(v) as Box<dyn Version>).collect())
    }

    async fn get_latest_matching(&self, name: &str, req: &str) -> depssmuggler_core::Result<Option<Box<dyn Version>>> {
        let packument = self.fetch_packument(name).await?;

        let trimmed = req.trim();
        if trimmed.is_empty() || trimmed == "*" {
            if let Some(tag) = packument.latest_tag() {
                return Ok(Some(Box::new(NpmVersion {
                    version: tag.to_string(),
                    deprecated: packument.is_deprecated(tag),
                })));
            }
        }

        // Dist-tags (`latest`, `next`, `beta`, ...) take priority over
        // interpreting the string as a semver range.
        if let Some(tagged) = packument.dist_tags.get(trimmed) {
            return Ok(Some(Box::new(NpmVersion {
                version: tagged.clone(),
                deprecated: packument.is_deprecated(tagged),
            })));
        }

        let range = crate::semver_range::parse(req)?;
        let mut candidates: Vec<&String> = packument.versions.keys().collect();
        candidates.sort_by(|a, b| crate::semver_range::compare(b, a));

        for version in candidates {
            if crate::semver_range::satisfies(version, &range) {
                return Ok(Some(Box::new(NpmVersion {
                    version: version.clone(),
                    deprecated: packument.is_deprecated(version),
                })));
            }
        }
        Ok(None)
    }

    async fn search(&self, query: &str, limit: usize) -> depssmuggler_core::Result<Vec<Box<dyn Metadata>>> {
        let url = self.search_url(query, limit);
        let key = format!("npm:search:{}:{}", query.to_lowercase(), limit);
        let (body, _source) = self
            .cache
            .fetch(&key, &url, &FetchOptions::new(PACKUMENT_TTL))
            .await
            .map_err(|_| NpmError::PackageNotFound(query.to_string()))?;

        let parsed: SearchResponse = serde_json::from_slice(&body).map_err(|source| NpmError::ApiResponse {
            package: query.to_string(),
            source,
        })?;

        Ok(parsed
            .objects
            .into_iter()
            .map(|obj| {
                Box::new(NpmPackage {
                    name: obj.package.name,
                    description: obj.package.description,
                    latest_version: obj.package.version,
                }) as Box<dyn Metadata>
            })
            .collect())
    }

    fn package_url(&self, name: &str) -> String {
        format!("https://www.npmjs.com/package/{name}")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_packument_parses_versions() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{
            "name": "left-pad",
            "dist-tags": {"latest": "1.3.0"},
            "versions": {
                "1.2.0": {"dependencies": {}, "dist": {"tarball": "https://r/left-pad-1.2.0.tgz"}},
                "1.3.0": {"dependencies": {}, "dist": {"tarball": "https://r/left-pad-1.3.0.tgz"}}
            },
            "time": {}
        }"#;
        let _m = server.mock("GET", "/left-pad").with_status(200).with_body(body).create_async().await;

        let cache = Arc::new(TwoTierCache::new(None));
        let registry = NpmRegistry::new(server.url(), cache);
        let packument = registry.fetch_packument("left-pad").await.unwrap();
        assert_eq!(packument.versions.len(), 2);
        assert_eq!(packument.latest_tag(), Some("1.3.0"));
    }

    #[tokio::test]
    async fn get_latest_matching_resolves_dist_tag_for_empty_requirement() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{
            "name": "left-pad",
            "dist-tags": {"latest": "1.3.0"},
            "versions": {
                "1.3.0": {"dependencies": {}, "dist": {"tarball": "https://r/left-pad-1.3.0.tgz"}}
            },
            "time": {}
        }"#;
        let _m = server.mock("GET", "/left-pad").with_status(200).with_body(body).create_async().await;

        let cache = Arc::new(TwoTierCache::new(None));
        let registry = NpmRegistry::new(server.url(), cache);
        let version = depssmuggler_core::Registry::get_latest_matching(&registry, "left-pad", "")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(version.version_string(), "1.3.0");
    }

    #[tokio::test]
    async fn package_not_found_surfaces_as_package_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/missing").with_status(404).create_async().await;

        let cache = Arc::new(TwoTierCache::new(None));
        let registry = NpmRegistry::new(server.url(), cache);
        let result = registry.fetch_packument("missing").await;
        assert!(matches!(result, Err(NpmError::PackageNotFound(_))));
    }

    #[test]
    fn encode_package_name_escapes_scoped_slash() {
        assert_eq!(encode_package_name("@babel/core"), "@babel%2Fcore");
        assert_eq!(encode_package_name("left-pad"), "left-pad");
    }
}
