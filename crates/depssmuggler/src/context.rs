//! Wires every ecosystem adapter crate into one [`depssmuggler_core::EcosystemAdapter`]
//! registry, sharing a single [`TwoTierCache`] and [`RegistryClientPool`]
//! the way the teacher's LSP backend shared one cache across its
//! per-ecosystem clients.

use depssmuggler_conda::{registry::subdir_for_target, CondaEcosystem, CondaRegistry};
use depssmuggler_core::{Config, Ecosystem, EcosystemAdapter, RegistryClientPool, TwoTierCache};
use depssmuggler_maven::{MavenEcosystem, MavenRegistry};
use depssmuggler_npm::{NpmEcosystem, NpmRegistry};
use depssmuggler_oci::{OciEcosystem, OciRegistry};
use depssmuggler_os::{ApkRegistry, AptRegistry, OsEcosystem, YumRegistry};
use depssmuggler_pip::{PypiEcosystem, PypiRegistry};
use std::collections::HashMap;
use std::sync::Arc;

/// CLI-supplied addresses for the three OS-package backends and the Conda
/// channel. These have no single public default the way PyPI or Maven
/// Central do -- every corporate deployment points them at its own
/// mirror -- so they live outside [`Config`] as command-line overrides
/// with well-known public mirrors as defaults.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub conda_channel: String,
    pub yum_repo_url: String,
    pub apt_repo_url: String,
    pub apt_suite: String,
    pub apt_component: String,
    pub apt_include_recommends: bool,
    pub apk_repo_url: String,
    pub apk_branch: String,
    pub apk_repo: String,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            conda_channel: "conda-forge".to_string(),
            yum_repo_url: "https://mirror.stream.centos.org/9-stream/BaseOS/x86_64/os".to_string(),
            apt_repo_url: "http://deb.debian.org/debian".to_string(),
            apt_suite: "stable".to_string(),
            apt_component: "main".to_string(),
            apt_include_recommends: false,
            apk_repo_url: "https://dl-cdn.alpinelinux.org/alpine".to_string(),
            apk_branch: "v3.19".to_string(),
            apk_repo: "main".to_string(),
        }
    }
}

/// The live set of ecosystem adapters a CLI invocation resolves/downloads
/// against, plus the shared cache backing all of them.
pub struct CoreContext {
    pub cache: Arc<TwoTierCache>,
    adapters: HashMap<Ecosystem, Arc<dyn EcosystemAdapter>>,
}

impl CoreContext {
    pub fn build(config: &Config, opts: &AdapterOptions, target_arch: &str) -> Self {
        let cache = Arc::new(TwoTierCache::new(Some(config.cache_dir.clone())));
        let client_pool = Arc::new(RegistryClientPool::new());

        let mut adapters: HashMap<Ecosystem, Arc<dyn EcosystemAdapter>> = HashMap::new();

        adapters.insert(
            Ecosystem::Pip,
            Arc::new(PypiEcosystem::new(Arc::new(PypiRegistry::new(
                config.pypi_base_url.clone(),
                Arc::clone(&cache),
            )))),
        );

        let subdir = subdir_for_target("linux", target_arch);
        adapters.insert(
            Ecosystem::Conda,
            Arc::new(CondaEcosystem::new(Arc::new(CondaRegistry::new(
                opts.conda_channel.clone(),
                subdir,
                Arc::clone(&cache),
            )))),
        );

        adapters.insert(
            Ecosystem::Maven,
            Arc::new(MavenEcosystem::new(Arc::new(MavenRegistry::with_urls(
                config.maven_repo_url.clone(),
                "https://search.maven.org/solrsearch/select",
                Arc::clone(&cache),
            )))),
        );

        adapters.insert(
            Ecosystem::Npm,
            Arc::new(NpmEcosystem::new(Arc::new(NpmRegistry::new(
                "https://registry.npmjs.org",
                Arc::clone(&cache),
            )))),
        );

        adapters.insert(
            Ecosystem::Docker,
            Arc::new(OciEcosystem::new(Arc::new(OciRegistry::new()), config.docker_default_registry.clone())),
        );

        adapters.insert(
            Ecosystem::Yum,
            Arc::new(OsEcosystem::new(
                Arc::new(YumRegistry::new(opts.yum_repo_url.clone(), target_arch.to_string(), Arc::clone(&cache))),
                Arc::clone(&client_pool),
                config.max_depth.conda_yum,
            )),
        );

        adapters.insert(
            Ecosystem::Apt,
            Arc::new(OsEcosystem::new(
                Arc::new(AptRegistry::new(
                    opts.apt_repo_url.clone(),
                    opts.apt_suite.clone(),
                    opts.apt_component.clone(),
                    target_arch.to_string(),
                    opts.apt_include_recommends,
                    Arc::clone(&cache),
                )),
                Arc::clone(&client_pool),
                config.max_depth.conda_yum,
            )),
        );

        adapters.insert(
            Ecosystem::Apk,
            Arc::new(OsEcosystem::new(
                Arc::new(ApkRegistry::new(
                    opts.apk_repo_url.clone(),
                    opts.apk_branch.clone(),
                    opts.apk_repo.clone(),
                    target_arch.to_string(),
                    Arc::clone(&cache),
                )),
                Arc::clone(&client_pool),
                config.max_depth.conda_yum,
            )),
        );

        Self { cache, adapters }
    }

    pub fn adapter(&self, ecosystem: Ecosystem) -> Option<Arc<dyn EcosystemAdapter>> {
        self.adapters.get(&ecosystem).cloned()
    }
}
