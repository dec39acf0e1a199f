//! Per-package configuration: entry point, subpath remaps, conditional
//! aliasing. Read from the installed package layout and memoized per
//! builder invocation.

use futures::future::{self, BoxFuture};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::env::Env;
use crate::error::Error;
use crate::pkg::PackageId;

/// A replacement target, either plain or conditioned on the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    /// A plain replacement path or specifier.
    Path(String),
    /// Condition-keyed branches. Matching follows the environment's
    /// priority order, with `default` last; JSON key order carries no
    /// meaning.
    Conditional(BTreeMap<String, Target>),
}

impl Target {
    /// Resolve this target under `env`. `None` when no branch applies.
    #[must_use]
    pub fn resolve(&self, env: &Env) -> Option<&str> {
        match self {
            Self::Path(path) => Some(path),
            Self::Conditional(branches) => {
                for condition in env.conditions() {
                    if let Some(target) = branches.get(condition) {
                        return target.resolve(env);
                    }
                }
                branches.get("default").and_then(|t| t.resolve(env))
            }
        }
    }
}

/// Configuration of one installed package, as written by the installer.
///
/// Unknown fields are tolerated; only the mapping-relevant subset is
/// modeled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Package's own name, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Default entry subpath; `index.js` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Subpath remaps: requested subpath → replacement file.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, Target>,
    /// Conditional aliasing: specifier → target.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub map: BTreeMap<String, Target>,
}

impl PackageConfig {
    /// The entry subpath for this package under `env`: the `main` field
    /// looked up through `paths`.
    #[must_use]
    pub fn main_entry(&self, env: &Env) -> String {
        let main = self.main.as_deref().unwrap_or("index.js");
        self.paths
            .get(main)
            .and_then(|t| t.resolve(env))
            .unwrap_or(main)
            .to_owned()
    }
}

/// Source of raw package-configuration text.
///
/// The seam exists so tests can serve configs from memory; production
/// use reads `<root>/<registry>/<name>@<version>/package.json`.
pub trait ConfigSource: Send + Sync {
    /// Load the raw configuration text for one package.
    fn load(&self, pkg: &PackageId) -> BoxFuture<'_, io::Result<String>>;
}

/// Reads package configs from the conventional on-disk layout.
#[derive(Debug, Clone)]
pub struct FsConfigSource {
    root: PathBuf,
}

impl FsConfigSource {
    /// Source rooted at the packages directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// On-disk config path for one package.
    #[must_use]
    pub fn config_path(&self, pkg: &PackageId) -> PathBuf {
        self.root
            .join(&pkg.registry)
            .join(format!("{}@{}", pkg.name, pkg.version))
            .join("package.json")
    }
}

impl ConfigSource for FsConfigSource {
    fn load(&self, pkg: &PackageId) -> BoxFuture<'_, io::Result<String>> {
        let path = self.config_path(pkg);
        Box::pin(async move { tokio::fs::read_to_string(path).await })
    }
}

/// In-memory config source for tests and synthetic graphs.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigSource {
    configs: HashMap<PackageId, String>,
}

impl MemoryConfigSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the raw config text for a package.
    pub fn insert(&mut self, pkg: PackageId, text: impl Into<String>) {
        self.configs.insert(pkg, text.into());
    }
}

impl ConfigSource for MemoryConfigSource {
    fn load(&self, pkg: &PackageId) -> BoxFuture<'_, io::Result<String>> {
        let result = self.configs.get(pkg).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no config for {pkg}"))
        });
        Box::pin(future::ready(result))
    }
}

/// Per-invocation memo of parsed package configs.
///
/// A diamond-shared package is read exactly once regardless of fan-in;
/// misses within one `ensure` call are read concurrently.
pub struct ConfigCache<'a> {
    source: &'a dyn ConfigSource,
    configs: FxHashMap<PackageId, Arc<PackageConfig>>,
}

impl<'a> ConfigCache<'a> {
    #[must_use]
    pub fn new(source: &'a dyn ConfigSource) -> Self {
        Self {
            source,
            configs: FxHashMap::default(),
        }
    }

    /// Make sure configs for all `ids` are loaded, reading misses
    /// concurrently. A missing or unparsable config is a hard error
    /// naming the package.
    pub async fn ensure<I>(&mut self, ids: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = PackageId>,
    {
        let mut seen = FxHashSet::default();
        let misses: Vec<PackageId> = ids
            .into_iter()
            .filter(|id| !self.configs.contains_key(id) && seen.insert(id.clone()))
            .collect();
        if misses.is_empty() {
            return Ok(());
        }

        let source = self.source;
        let reads = future::join_all(misses.into_iter().map(|id| async move {
            let text = source.load(&id).await;
            (id, text)
        }))
        .await;

        for (id, text) in reads {
            let text = text.map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    Error::config(&id, "package configuration not found")
                } else {
                    Error::config(&id, format!("failed to read package configuration: {e}"))
                }
            })?;
            let config: PackageConfig = serde_json::from_str(&text)
                .map_err(|e| Error::config(&id, format!("invalid package configuration: {e}")))?;
            self.configs.insert(id, Arc::new(config));
        }
        Ok(())
    }

    /// A previously ensured config.
    pub fn get(&self, id: &PackageId) -> Result<&Arc<PackageConfig>, Error> {
        self.configs
            .get(id)
            .ok_or_else(|| Error::config(id, "package configuration not loaded"))
    }
}
