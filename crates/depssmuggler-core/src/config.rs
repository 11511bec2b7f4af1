//! Layered configuration: built-in defaults, `$HOME/.depssmuggler/config.toml`,
//! environment variables, then CLI flags (highest precedence), matching the
//! teacher's layering of defaults under an on-disk manifest.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthCaps {
    pub maven: u32,
    pub conda_yum: u32,
    pub os_dependency_lookahead: u32,
}

impl Default for DepthCaps {
    fn default() -> Self {
        Self {
            maven: 20,
            conda_yum: 10,
            os_dependency_lookahead: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyLimits {
    pub metadata: usize,
    pub prefetch: usize,
    pub size_probe: usize,
    pub download: usize,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            metadata: 3,
            prefetch: 5,
            size_probe: 15,
            download: 3,
        }
    }
}

/// The full configuration record described in the external-interfaces
/// section: cache location and TTLs, registry base URLs, depth caps, and
/// concurrency limits per phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub strict_ssl: bool,
    pub cache_dir: PathBuf,
    pub catalog_cache_ttl_ms: u64,
    pub pom_cache_ttl_ms: u64,
    pub conda_repodata_ttl_ms: u64,
    pub npm_packument_ttl_ms: u64,
    pub maven_repo_url: String,
    pub pypi_base_url: String,
    pub docker_default_registry: String,
    pub max_depth: DepthCaps,
    pub concurrency: ConcurrencyLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict_ssl: false,
            cache_dir: default_home_subdir("cache"),
            catalog_cache_ttl_ms: 3_600_000,
            pom_cache_ttl_ms: 300_000,
            conda_repodata_ttl_ms: 86_400_000,
            npm_packument_ttl_ms: 300_000,
            maven_repo_url: "https://repo1.maven.org/maven2".to_string(),
            pypi_base_url: "https://pypi.org".to_string(),
            docker_default_registry: "registry-1.docker.io".to_string(),
            max_depth: DepthCaps::default(),
            concurrency: ConcurrencyLimits::default(),
        }
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

fn default_home_subdir(leaf: &str) -> PathBuf {
    home_dir().join(".depssmuggler").join(leaf)
}

/// Returns the path to `$HOME/.depssmuggler/config.toml`, whether or not it
/// currently exists.
pub fn default_config_path() -> PathBuf {
    home_dir().join(".depssmuggler").join("config.toml")
}

impl Config {
    /// Loads the layered configuration: defaults, then an optional
    /// `config_path` (parsed with `toml_edit`, silently skipped if absent),
    /// then environment variable overrides. CLI flag overrides are applied
    /// by the caller afterward via the builder-style `with_*` methods.
    pub fn load(config_path: Option<&std::path::Path>) -> crate::error::Result<Self> {
        let mut config = Self::default();

        let path = config_path.map(PathBuf::from).unwrap_or_else(default_config_path);
        if let Ok(raw) = std::fs::read_to_string(&path) {
            let doc = raw
                .parse::<toml_edit::DocumentMut>()
                .map_err(|e| crate::error::CoreError::ProtocolError {
                    what: path.display().to_string(),
                    message: e.to_string(),
                })?;
            config.apply_toml(&doc);
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_toml(&mut self, doc: &toml_edit::DocumentMut) {
        if let Some(v) = doc.get("strict_ssl").and_then(|v| v.as_bool()) {
            self.strict_ssl = v;
        }
        if let Some(v) = doc.get("cache_dir").and_then(|v| v.as_str()) {
            self.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = doc.get("maven_repo_url").and_then(|v| v.as_str()) {
            self.maven_repo_url = v.to_string();
        }
        if let Some(v) = doc.get("pypi_base_url").and_then(|v| v.as_str()) {
            self.pypi_base_url = v.to_string();
        }
        if let Some(v) = doc.get("docker_default_registry").and_then(|v| v.as_str()) {
            self.docker_default_registry = v.to_string();
        }
        if let Some(v) = doc.get("catalog_cache_ttl_ms").and_then(|v| v.as_integer()) {
            self.catalog_cache_ttl_ms = v as u64;
        }
        if let Some(v) = doc.get("pom_cache_ttl_ms").and_then(|v| v.as_integer()) {
            self.pom_cache_ttl_ms = v as u64;
        }
        if let Some(v) = doc.get("conda_repodata_ttl_ms").and_then(|v| v.as_integer()) {
            self.conda_repodata_ttl_ms = v as u64;
        }
        if let Some(v) = doc.get("npm_packument_ttl_ms").and_then(|v| v.as_integer()) {
            self.npm_packument_ttl_ms = v as u64;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("DEPSSMUGGLER_STRICT_SSL") {
            self.strict_ssl = matches!(v.as_str(), "1" | "true" | "TRUE" | "yes");
        }
        if let Ok(v) = std::env::var("DEPSSMUGGLER_CACHE_DIR") {
            self.cache_dir = PathBuf::from(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::default();
        assert_eq!(config.catalog_cache_ttl_ms, 3_600_000);
        assert_eq!(config.conda_repodata_ttl_ms, 86_400_000);
        assert_eq!(config.max_depth.maven, 20);
        assert_eq!(config.max_depth.conda_yum, 10);
        assert_eq!(config.concurrency.download, 3);
        assert!(!config.strict_ssl);
    }

    #[test]
    fn load_falls_back_to_defaults_when_file_missing() {
        let config = Config::load(Some(std::path::Path::new("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_applies_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "strict_ssl = true\nmaven_repo_url = \"https://internal.example/maven2\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(config.strict_ssl);
        assert_eq!(config.maven_repo_url, "https://internal.example/maven2");
    }

    #[test]
    fn env_override_takes_precedence_over_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "strict_ssl = false\n").unwrap();

        std::env::set_var("DEPSSMUGGLER_STRICT_SSL", "1");
        let config = Config::load(Some(&path)).unwrap();
        std::env::remove_var("DEPSSMUGGLER_STRICT_SSL");

        assert!(config.strict_ssl);
    }
}
