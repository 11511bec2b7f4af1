//! Maven Central registry client: version listing via `maven-metadata.xml`
//! (falling back to the `solrsearch` search API), POM fetch through the
//! shared two-tier cache, and `.m2`-style artifact/POM URL construction.

use crate::coordinate::Coordinate;
use crate::error::{MavenError, Result};
use crate::pom::{self, Pom};
use crate::version::compare;
use async_trait::async_trait;
use depssmuggler_core::{FetchOptions, Metadata, TwoTierCache, Version};
use serde::Deserialize;
use std::any::Any;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

const POM_MEMORY_TTL: Duration = Duration::from_secs(5 * 60);
const POM_DISK_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const METADATA_TTL: Duration = Duration::from_secs(60 * 60);

pub struct MavenRegistry {
    base_url: String,
    search_url: String,
    cache: Arc<TwoTierCache>,
}

impl MavenRegistry {
    pub fn new(cache: Arc<TwoTierCache>) -> Self {
        Self::with_urls("https://repo1.maven.org/maven2", "https://search.maven.org/solrsearch/select", cache)
    }

    pub fn with_urls(base_url: impl Into<String>, search_url: impl Into<String>, cache: Arc<TwoTierCache>) -> Self {
        Self {
            base_url: base_url.into(),
            search_url: search_url.into(),
            cache,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn artifact_dir_url(&self, coord: &Coordinate, version: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, coord.group_path(), coord.artifact_id, version)
    }

    /// `.m2`-style path: `groupPath/artifactId/version/artifactId-version[-classifier].ext`.
    pub fn artifact_url(&self, coord: &Coordinate, version: &str, classifier: Option<&str>, extension: &str) -> String {
        let filename = match classifier {
            Some(c) => format!("{}-{}-{}.{}", coord.artifact_id, version, c, extension),
            None => format!("{}-{}.{}", coord.artifact_id, version, extension),
        };
        format!("{}/{}", self.artifact_dir_url(coord, version), filename)
    }

    pub fn pom_url(&self, coord: &Coordinate, version: &str) -> String {
        self.artifact_url(coord, version, None, "pom")
    }

    /// Fetches and validates the `.sha1` sidecar published alongside most
    /// Central artifacts. Sidecar files are sometimes a bare hex digest and
    /// sometimes `<digest>  <filename>`; either is accepted. Absence (404,
    /// malformed body) is not an error — callers treat a missing sidecar as
    /// "no checksum to verify against" rather than failing the download.
    pub async fn fetch_sha1(&self, coord: &Coordinate, version: &str, classifier: Option<&str>, extension: &str) -> Option<String> {
        let url = format!("{}.sha1", self.artifact_url(coord, version, classifier, extension));
        let key = format!("maven:sha1:{}:{}:{}:{:?}", coord.ga(), version, extension, classifier);
        let opts = FetchOptions::new(POM_DISK_TTL);
        let (bytes, _source) = self.cache.fetch(&key, &url, &opts).await.ok()?;
        let text = std::str::from_utf8(&bytes).ok()?.trim();
        let token = text.split_whitespace().next().unwrap_or("").to_ascii_lowercase();
        if token.len() == 40 && token.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(token)
        } else {
            None
        }
    }

    /// Fetches and parses the POM for one GAV, through the two-tier cache
    /// (5 min memory / 24h disk), so a BFS that revisits the same parent or
    /// BOM many times across siblings pays for exactly one network fetch.
    pub async fn fetch_pom(&self, coord: &Coordinate, version: &str) -> Result<Pom> {
        let url = self.pom_url(coord, version);
        let key = format!("maven:pom:{}:{}", coord.ga(), version);
        let opts = FetchOptions {
            memory_ttl: Some(POM_MEMORY_TTL),
            disk_ttl: POM_DISK_TTL,
            force: false,
        };
        let (bytes, _source) = self.cache.fetch(&key, &url, &opts).await.map_err(|_| MavenError::ArtifactNotFound {
            group_id: coord.group_id.clone(),
            artifact_id: coord.artifact_id.clone(),
            version: version.to_string(),
        })?;
        pom::parse_pom(&bytes).map_err(|e| MavenError::PomParse {
            group_id: coord.group_id.clone(),
            artifact_id: coord.artifact_id.clone(),
            version: version.to_string(),
            message: e.to_string(),
        })
    }

    /// `GET .../maven-metadata.xml`, falling back to the `solrsearch`
    /// search API (`core=gav`) when the metadata file is absent (common
    /// for artifacts only ever published through a mirrored/staged repo).
    pub async fn fetch_versions(&self, coord: &Coordinate) -> Result<Vec<String>> {
        let url = format!("{}/{}/{}/maven-metadata.xml", self.base_url, coord.group_path(), coord.artifact_id);
        let key = format!("maven:metadata:{}", coord.ga());
        let opts = FetchOptions::new(METADATA_TTL);

        match self.cache.fetch(&key, &url, &opts).await {
            Ok((bytes, _source)) => {
                let versions = pom::parse_metadata_versions(&bytes).map_err(|e| MavenError::PomParse {
                    group_id: coord.group_id.clone(),
                    artifact_id: coord.artifact_id.clone(),
                    version: "maven-metadata.xml".to_string(),
                    message: e.to_string(),
                })?;
                if versions.is_empty() {
                    self.fetch_versions_via_search(coord).await
                } else {
                    Ok(versions)
                }
            }
            Err(_) => self.fetch_versions_via_search(coord).await,
        }
    }

    async fn fetch_versions_via_search(&self, coord: &Coordinate) -> Result<Vec<String>> {
        let query = format!(
            "{}?q=g:%22{}%22+AND+a:%22{}%22&core=gav&rows=200&wt=json",
            self.search_url, coord.group_id, coord.artifact_id
        );
        let key = format!("maven:search:{}", coord.ga());
        let opts = FetchOptions::new(METADATA_TTL);

        let (bytes, _source) = self.cache.fetch(&key, &query, &opts).await.map_err(|_| MavenError::NoVersions {
            group_id: coord.group_id.clone(),
            artifact_id: coord.artifact_id.clone(),
        })?;

        let parsed: SolrSearchResponse = serde_json::from_slice(&bytes).map_err(|_| MavenError::NoVersions {
            group_id: coord.group_id.clone(),
            artifact_id: coord.artifact_id.clone(),
        })?;

        let versions: Vec<String> = parsed.response.docs.into_iter().map(|d| d.v).collect();
        if versions.is_empty() {
            Err(MavenError::NoVersions {
                group_id: coord.group_id.clone(),
                artifact_id: coord.artifact_id.clone(),
            })
        } else {
            Ok(versions)
        }
    }

    /// The highest version satisfying `req`. An empty/absent `req` means
    /// "latest". A bracketed range (`[1.0,2.0)`) is simplified to its lower
    /// bound and matched as an exact floor, per the adapter's documented
    /// non-goal of true Maven range resolution.
    pub async fn latest_matching(&self, coord: &Coordinate, req: &str) -> Result<Option<String>> {
        let mut versions = self.fetch_versions(coord).await?;
        versions.sort_by(|a, b| compare(a, b));

        let trimmed = req.trim();
        if trimmed.is_empty() {
            return Ok(versions.into_iter().next_back());
        }

        let floor = crate::version::simplify_range_to_lower_bound(trimmed);
        if floor != trimmed {
            // It was a range; find the exact floor if published, else the
            // lowest version >= floor.
            if versions.iter().any(|v| v == &floor) {
                return Ok(Some(floor));
            }
            return Ok(versions.into_iter().find(|v| compare(v, &floor) != Ordering::Less));
        }

        if versions.iter().any(|v| v == trimmed) {
            return Ok(Some(trimmed.to_string()));
        }
        Ok(versions.into_iter().next_back())
    }
}

#[derive(Debug, Deserialize)]
struct SolrSearchResponse {
    response: SolrSearchBody,
}

#[derive(Debug, Deserialize)]
struct SolrSearchBody {
    docs: Vec<SolrDoc>,
}

#[derive(Debug, Deserialize)]
struct SolrDoc {
    v: String,
}

#[derive(Debug, Clone)]
pub struct MavenVersion(pub String);

impl Version for MavenVersion {
    fn version_string(&self) -> &str {
        &self.0
    }

    fn is_yanked(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone)]
pub struct MavenPackage {
    pub coordinate: String,
    pub latest_version: String,
}

impl Metadata for MavenPackage {
    fn name(&self) -> &str {
        &self.coordinate
    }

    fn description(&self) -> Option<&str> {
        None
    }

    fn latest_version(&self) -> &str {
        &self.latest_version
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl depssmuggler_core::Registry for MavenRegistry {
    async fn get_versions(&self, name: &str) -> depssmuggler_core::Result<Vec<Box<dyn Version>>> {
        let coord = crate::coordinate::parse_ga(name).ok_or_else(|| MavenError::InvalidCoordinate(name.to_string()))?;
        let mut versions = self.fetch_versions(&coord).await?;
        versions.sort_by(|a, b| compare(b, a));
        Ok(versions.into_iter().map(|v| Box::new(MavenVersion(v)) as Box<dyn Version>).collect())
    }

    async fn get_latest_matching(&self, name: &str, req: &str) -> depssmuggler_core::Result<Option<Box<dyn Version>>> {
        let coord = crate::coordinate::parse_ga(name).ok_or_else(|| MavenError::InvalidCoordinate(name.to_string()))?;
        let version = self.latest_matching(&coord, req).await?;
        Ok(version.map(|v| Box::new(MavenVersion(v)) as Box<dyn Version>))
    }

    async fn search(&self, query: &str, limit: usize) -> depssmuggler_core::Result<Vec<Box<dyn Metadata>>> {
        let search_query = format!("{}?q={}&rows={}&wt=json", self.search_url, urlencoding_like(query), limit);
        let key = format!("maven:search-free:{query}");
        let opts = FetchOptions::new(METADATA_TTL);
        let (bytes, _source) = match self.cache.fetch(&key, &search_query, &opts).await {
            Ok(v) => v,
            Err(_) => return Ok(vec![]),
        };

        #[derive(Deserialize)]
        struct FreeSearchDoc {
            g: String,
            a: String,
            #[serde(rename = "latestVersion", default)]
            latest_version: Option<String>,
            #[serde(default)]
            v: Option<String>,
        }
        #[derive(Deserialize)]
        struct FreeSearchBody {
            docs: Vec<FreeSearchDoc>,
        }
        #[derive(Deserialize)]
        struct FreeSearchResponse {
            response: FreeSearchBody,
        }

        let parsed: FreeSearchResponse = match serde_json::from_slice(&bytes) {
            Ok(p) => p,
            Err(_) => return Ok(vec![]),
        };

        Ok(parsed
            .response
            .docs
            .into_iter()
            .map(|d| {
                Box::new(MavenPackage {
                    coordinate: format!("{}:{}", d.g, d.a),
                    latest_version: d.latest_version.or(d.v).unwrap_or_default(),
                }) as Box<dyn Metadata>
            })
            .collect())
    }

    fn package_url(&self, name: &str) -> String {
        format!("https://mvnrepository.com/artifact/{}", name.replace(':', "/"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The search endpoint wants `+`-joined tokens, not full percent-encoding;
/// this crate has no `urlencoding` dependency, so spaces are mapped by hand.
fn urlencoding_like(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join("+")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_versions_parses_maven_metadata() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/org/example/widget/maven-metadata.xml")
            .with_status(200)
            .with_body(
                r#"<metadata><versioning><versions><version>1.0.0</version><version>1.1.0</version></versions></versioning></metadata>"#,
            )
            .create_async()
            .await;

        let cache = Arc::new(TwoTierCache::new(None));
        let registry = MavenRegistry::with_urls(server.url(), format!("{}/solr", server.url()), cache);
        let coord = Coordinate::new("org.example", "widget");
        let versions = registry.fetch_versions(&coord).await.unwrap();
        assert_eq!(versions, vec!["1.0.0", "1.1.0"]);
    }

    #[tokio::test]
    async fn fetch_versions_falls_back_to_search_when_metadata_missing() {
        let mut server = mockito::Server::new_async().await;
        let _m1 = server
            .mock("GET", "/org/example/widget/maven-metadata.xml")
            .with_status(404)
            .create_async()
            .await;
        let _m2 = server
            .mock("GET", "/solr")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"response": {"docs": [{"v": "2.0.0"}, {"v": "1.0.0"}]}}"#)
            .create_async()
            .await;

        let cache = Arc::new(TwoTierCache::new(None));
        let registry = MavenRegistry::with_urls(server.url(), format!("{}/solr", server.url()), cache);
        let coord = Coordinate::new("org.example", "widget");
        let versions = registry.fetch_versions(&coord).await.unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[tokio::test]
    async fn latest_matching_with_empty_req_picks_highest() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/org/example/widget/maven-metadata.xml")
            .with_status(200)
            .with_body(r#"<metadata><versioning><versions><version>1.0.0</version><version>2.0.0</version><version>1.5.0</version></versions></versioning></metadata>"#)
            .create_async()
            .await;

        let cache = Arc::new(TwoTierCache::new(None));
        let registry = MavenRegistry::with_urls(server.url(), format!("{}/solr", server.url()), cache);
        let coord = Coordinate::new("org.example", "widget");
        let latest = registry.latest_matching(&coord, "").await.unwrap();
        assert_eq!(latest.as_deref(), Some("2.0.0"));
    }

    #[tokio::test]
    async fn latest_matching_with_range_picks_floor_or_above() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/org/example/widget/maven-metadata.xml")
            .with_status(200)
            .with_body(r#"<metadata><versioning><versions><version>1.0.0</version><version>1.5.0</version><version>2.0.0</version></versions></versioning></metadata>"#)
            .create_async()
            .await;

        let cache = Arc::new(TwoTierCache::new(None));
        let registry = MavenRegistry::with_urls(server.url(), format!("{}/solr", server.url()), cache);
        let coord = Coordinate::new("org.example", "widget");
        let picked = registry.latest_matching(&coord, "[1.2,2.0)").await.unwrap();
        assert_eq!(picked.as_deref(), Some("1.5.0"));
    }

    #[test]
    fn artifact_url_appends_classifier_when_present() {
        let cache = Arc::new(TwoTierCache::new(None));
        let registry = MavenRegistry::new(cache);
        let coord = Coordinate::new("org.example", "widget");
        let url = registry.artifact_url(&coord, "1.0.0", Some("sources"), "jar");
        assert!(url.ends_with("widget-1.0.0-sources.jar"));
    }

    #[test]
    fn pom_url_has_no_classifier() {
        let cache = Arc::new(TwoTierCache::new(None));
        let registry = MavenRegistry::new(cache);
        let coord = Coordinate::new("org.example", "widget");
        let url = registry.pom_url(&coord, "1.0.0");
        assert!(url.ends_with("widget-1.0.0.pom"));
    }
}