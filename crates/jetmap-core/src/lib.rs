//! jetmap-core: import-map construction and module tracing.
//!
//! Sits between the installer (which produces the locked
//! [`DependencyGraph`]) and the dev server/bundler (which consume the
//! [`ImportMap`] and trace output). Three pieces:
//!
//! - [`build_package_map`] turns the graph into a full import map with
//!   per-package scopes disambiguating diamond dependencies.
//! - [`MapResolver`] resolves specifiers with browser-grade
//!   longest-prefix scope semantics and traces entry modules to their
//!   transitive module graph, using `dalkey-lexer` to read sources.
//! - Map hygiene (`clean`/`extend`/`rebase`) keeps emitted maps minimal
//!   and deterministic.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]

pub mod builtins;
pub mod env;
pub mod error;
pub mod map;
pub mod pkg;
pub mod resolver;

pub use env::Env;
pub use error::Error;
pub use map::{build_package_map, BuildOptions, ImportMap};
pub use pkg::{
    ConfigCache, ConfigSource, DependencyGraph, FsConfigSource, MemoryConfigSource, PackageConfig,
    PackageId, Target,
};
pub use resolver::{MapResolver, TraceMap};
