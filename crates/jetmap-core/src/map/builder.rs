//! Package map construction.
//!
//! Turns the locked dependency graph into a full import map: root
//! dependencies land in the top-level `imports`, every transitive
//! package gets a scope carrying only the entries that differ from the
//! top-level view (the diamond-dependency disambiguation this module
//! exists for), and each package's conditional `map` field is folded
//! into its own scope.
//!
//! Packages are visited in waves: each wave batch-reads the configs it
//! needs concurrently, then folds entries single-threaded. Every
//! package writes only under its own scope prefix, so the merge is
//! conflict-free by construction and the map needs no lock.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};
use url::Url;

use super::{ImportMap, Mappings};
use crate::builtins::{builtin_name, is_builtin};
use crate::env::Env;
use crate::error::Error;
use crate::pkg::{ConfigCache, ConfigSource, DependencyGraph, PackageConfig, PackageId};

/// Options for map construction.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Environment conditions the map is built for.
    pub env: Env,
    /// `/`-terminated URL-path prefix under which packages are
    /// installed, e.g. `/jetmap_modules/`.
    pub packages_root: String,
    /// Package providing platform-builtin shims. A builtin alias with
    /// no shim configured is skipped with a warning.
    pub builtins: Option<PackageId>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            env: Env::default(),
            packages_root: "/jetmap_modules/".to_owned(),
            builtins: None,
        }
    }
}

impl BuildOptions {
    /// The `/`-terminated map address of one package's directory.
    #[must_use]
    fn package_path(&self, pkg: &PackageId) -> String {
        format!("{}{}/", self.packages_root, pkg.path_segment())
    }
}

/// Build the full import map for a resolved dependency graph.
///
/// `root_deps` is the project's own alias → package mapping; `source`
/// provides per-package configuration, read once per package for the
/// whole invocation. The graph is assumed consistently installed: a
/// missing package or config is a hard error, never repaired here.
pub async fn build_package_map(
    graph: &DependencyGraph,
    root_deps: &BTreeMap<String, PackageId>,
    opts: &BuildOptions,
    source: &dyn ConfigSource,
) -> Result<ImportMap, Error> {
    let mut cache = ConfigCache::new(source);
    let mut map = ImportMap::new();
    let mut visited: FxHashSet<PackageId> = FxHashSet::default();
    let mut pending: Vec<PackageId> = Vec::new();

    // root aliases land in the top-level imports
    cache.ensure(root_deps.values().cloned()).await?;
    for (alias, pkg) in root_deps {
        let config = cache.get(pkg)?.clone();
        emit_package_aliases(
            &mut map.imports,
            alias,
            &opts.package_path(pkg),
            &config,
            &opts.env,
        );
        if visited.insert(pkg.clone()) {
            pending.push(pkg.clone());
        }
    }

    while !pending.is_empty() {
        // batch-read every config this wave needs
        let mut wave_ids: Vec<PackageId> = Vec::new();
        for pkg in &pending {
            wave_ids.push(pkg.clone());
            if let Some(resolve) = graph.resolutions(pkg) {
                wave_ids.extend(resolve.values().cloned());
            }
        }
        cache.ensure(wave_ids).await?;

        let mut next: Vec<PackageId> = Vec::new();
        for pkg in std::mem::take(&mut pending) {
            let resolve = graph
                .resolutions(&pkg)
                .ok_or_else(|| Error::config(&pkg, "package missing from dependency graph"))?;

            let mut scope_entries = Mappings::new();
            for (alias, dep) in resolve {
                let dep_config = cache.get(dep)?.clone();
                let mut entries = Mappings::new();
                emit_package_aliases(
                    &mut entries,
                    alias,
                    &opts.package_path(dep),
                    &dep_config,
                    &opts.env,
                );
                // a scope entry identical to the top-level view is
                // redundant specificity; only the differing ones matter
                for (key, value) in entries {
                    if map.imports.get(&key) != Some(&value) {
                        scope_entries.insert(key, value);
                    }
                }
                if visited.insert(dep.clone()) {
                    next.push(dep.clone());
                }
            }

            fold_package_map(&mut scope_entries, &pkg, resolve, &cache, opts)?;

            if !scope_entries.is_empty() {
                map.scopes
                    .entry(opts.package_path(&pkg))
                    .or_default()
                    .extend(scope_entries);
            }
        }
        pending = next;
    }

    map.clean();
    debug!(packages = visited.len(), "package map built");
    Ok(map)
}

fn strip_dot(subpath: &str) -> &str {
    subpath.strip_prefix("./").unwrap_or(subpath)
}

/// Emit the mapping entries one dependency alias contributes: the main
/// entry, the `alias/` folder mapping, and any `paths` subpath remaps.
fn emit_package_aliases(
    entries: &mut Mappings,
    alias: &str,
    package_path: &str,
    config: &PackageConfig,
    env: &Env,
) {
    let main = config.main_entry(env);
    entries.insert(
        alias.to_owned(),
        format!("{package_path}{}", strip_dot(&main)),
    );
    entries.insert(format!("{alias}/"), package_path.to_owned());
    for (subpath, target) in &config.paths {
        let Some(file) = target.resolve(env) else {
            continue;
        };
        entries.insert(
            format!("{alias}/{}", strip_dot(subpath)),
            format!("{package_path}{}", strip_dot(file)),
        );
    }
}

/// Fold a package's own conditional `map` field into its scope,
/// translating self-references and aliases of its dependencies or of
/// platform builtins into concrete package paths.
fn fold_package_map(
    entries: &mut Mappings,
    pkg: &PackageId,
    resolve: &BTreeMap<String, PackageId>,
    cache: &ConfigCache<'_>,
    opts: &BuildOptions,
) -> Result<(), Error> {
    let config = cache.get(pkg)?.clone();
    if config.map.is_empty() {
        return Ok(());
    }
    let package_path = opts.package_path(pkg);
    for (from, target) in &config.map {
        if from.starts_with("./") || from.starts_with("../") || from.starts_with('/') {
            // the resolver never consults the map for path specifiers
            debug!(package = %pkg, specifier = %from, "skipping relative map key");
            continue;
        }
        let Some(raw) = target.resolve(&opts.env) else {
            continue;
        };
        match translate_map_target(raw, &package_path, resolve, cache, opts)? {
            Some(address) => {
                entries.insert(from.clone(), address);
            }
            None => {
                warn!(package = %pkg, target = %raw, "map target has no resolution; entry skipped");
            }
        }
    }
    Ok(())
}

/// Translate one `map` target into a map address: `./x` is a
/// self-reference, a bare specifier is an alias of the package's own
/// dependencies, and a builtin with no such alias lands on the shared
/// shim package.
fn translate_map_target(
    raw: &str,
    package_path: &str,
    resolve: &BTreeMap<String, PackageId>,
    cache: &ConfigCache<'_>,
    opts: &BuildOptions,
) -> Result<Option<String>, Error> {
    if let Some(rest) = raw.strip_prefix("./") {
        return Ok(Some(format!("{package_path}{rest}")));
    }
    let (alias, subpath) = split_specifier(raw);
    if let Some(dep) = resolve.get(alias) {
        let dep_path = opts.package_path(dep);
        return Ok(Some(match subpath {
            Some(sub) => format!("{dep_path}{sub}"),
            None => {
                let dep_config = cache.get(dep)?;
                format!("{dep_path}{}", strip_dot(&dep_config.main_entry(&opts.env)))
            }
        }));
    }
    // `node:fs` parses as a URL, so builtins come first
    if is_builtin(raw) {
        return Ok(opts
            .builtins
            .as_ref()
            .map(|shim| format!("{}{}.js", opts.package_path(shim), builtin_name(raw))));
    }
    if Url::parse(raw).is_ok() {
        return Ok(Some(raw.to_owned()));
    }
    Ok(None)
}

/// Split a bare specifier into its package alias and optional subpath,
/// scoped names included.
fn split_specifier(specifier: &str) -> (&str, Option<&str>) {
    let name_end = if specifier.starts_with('@') {
        // @scope/name[/subpath]: the name spans two segments
        specifier
            .find('/')
            .and_then(|i| specifier[i + 1..].find('/').map(|j| i + 1 + j))
    } else {
        specifier.find('/')
    };
    match name_end {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    }
}
