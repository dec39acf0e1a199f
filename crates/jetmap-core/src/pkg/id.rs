//! Package identity.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for an installed package.
///
/// Serializes as `registry:name@version` (e.g. `npm:lodash@4.17.21`),
/// the same key the installer uses for the on-disk layout, so it can key
/// JSON maps directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    /// Registry the package came from (e.g. `npm`).
    pub registry: String,
    /// Package name, possibly scoped (`@scope/name`).
    pub name: String,
    /// Exact resolved version.
    pub version: String,
}

impl PackageId {
    /// Create a new package id.
    #[must_use]
    pub fn new(
        registry: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// The package directory below the packages root:
    /// `registry/name@version`.
    #[must_use]
    pub fn path_segment(&self) -> String {
        format!("{}/{}@{}", self.registry, self.name, self.version)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.registry, self.name, self.version)
    }
}

/// Failure to parse a `registry:name@version` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid package id \"{input}\": expected registry:name@version")]
pub struct ParsePackageIdError {
    pub input: String,
}

impl FromStr for PackageId {
    type Err = ParsePackageIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePackageIdError {
            input: s.to_owned(),
        };
        let (registry, rest) = s.split_once(':').ok_or_else(err)?;
        // the version separator is the last `@`; scoped names start with one
        let at = rest.rfind('@').ok_or_else(err)?;
        let (name, version) = (&rest[..at], &rest[at + 1..]);
        if registry.is_empty() || name.is_empty() || version.is_empty() {
            return Err(err());
        }
        Ok(Self::new(registry, name, version))
    }
}

impl Serialize for PackageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
