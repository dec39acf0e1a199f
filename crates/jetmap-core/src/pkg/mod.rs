//! Package model: identity, per-package configuration, dependency graph.

mod config;
mod graph;
mod id;

pub use config::{
    ConfigCache, ConfigSource, FsConfigSource, MemoryConfigSource, PackageConfig, Target,
};
pub use graph::DependencyGraph;
pub use id::{PackageId, ParsePackageIdError};
