//! Locked dependency graph, as produced by the installer.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::pkg::PackageId;

/// The resolved dependency graph: for every installed package, how its
/// dependency aliases resolve to exact packages.
///
/// The graph is conceptually acyclic, but consumers tolerate cycles
/// defensively (visited sets, not recursion depth). It is immutable for
/// one build invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// Per-package resolution maps: alias → package.
    #[serde(default)]
    packages: HashMap<PackageId, BTreeMap<String, PackageId>>,
}

impl DependencyGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a package and its resolved dependency aliases.
    pub fn insert(&mut self, pkg: PackageId, resolve: BTreeMap<String, PackageId>) {
        self.packages.insert(pkg, resolve);
    }

    /// Record a package with no dependencies.
    pub fn insert_leaf(&mut self, pkg: PackageId) {
        self.packages.insert(pkg, BTreeMap::new());
    }

    /// The resolution map of one package, if it is in the graph.
    #[must_use]
    pub fn resolutions(&self, pkg: &PackageId) -> Option<&BTreeMap<String, PackageId>> {
        self.packages.get(pkg)
    }

    /// Whether the graph contains a package.
    #[must_use]
    pub fn contains(&self, pkg: &PackageId) -> bool {
        self.packages.contains_key(pkg)
    }

    /// Number of packages in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Iterate over all packages and their resolution maps.
    pub fn iter(&self) -> impl Iterator<Item = (&PackageId, &BTreeMap<String, PackageId>)> {
        self.packages.iter()
    }
}
