//! The import map data type.
//!
//! Shape invariants: every scope prefix ends in `/`; specifier keys
//! ending in `/` are folder mappings and match by prefix, all others
//! match exactly; the longest match wins. `BTreeMap` storage makes the
//! serialized key order alphabetized and byte-stable for free.

mod builder;
mod hygiene;

pub use builder::{build_package_map, BuildOptions};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Error;

/// A specifier → address mapping set (the value type of both `imports`
/// and each scope).
pub type Mappings = BTreeMap<String, String>;

/// An import map in the standard `{ imports, scopes }` JSON shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    /// Top-level specifier mappings.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub imports: Mappings,
    /// Scoped overrides, keyed by `/`-terminated URL-path prefix.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scopes: BTreeMap<String, Mappings>,
}

impl ImportMap {
    /// An empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the map has no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.scopes.is_empty()
    }

    /// Serialize to the standard JSON shape: two-space indent, stable
    /// alphabetized keys, trailing newline.
    #[must_use]
    pub fn to_json(&self) -> String {
        let mut out = serde_json::to_string_pretty(self)
            .expect("string-keyed map serialization cannot fail");
        out.push('\n');
        out
    }

    /// Parse an import map, validating the scope-prefix invariant.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let map: Self = serde_json::from_str(text).map_err(|e| Error::Map {
            reason: e.to_string(),
        })?;
        for scope in map.scopes.keys() {
            if !scope.ends_with('/') {
                return Err(Error::Map {
                    reason: format!("scope prefix \"{scope}\" does not end in \"/\""),
                });
            }
        }
        Ok(map)
    }
}

/// Match a specifier against one mapping set: exact key first, else the
/// longest folder key (`…/`) prefixing the specifier, with the
/// remainder appended to its address. Returns the matched key, its raw
/// address, and the computed address.
pub(crate) fn match_specifier<'m>(
    mappings: &'m Mappings,
    specifier: &str,
) -> Option<(&'m str, &'m str, String)> {
    if let Some((key, value)) = mappings.get_key_value(specifier) {
        return Some((key, value, value.clone()));
    }
    let mut best: Option<(&'m String, &'m String)> = None;
    for (key, value) in mappings {
        if key.ends_with('/')
            && specifier.starts_with(key.as_str())
            && best.map_or(true, |(bk, _)| key.len() > bk.len())
        {
            best = Some((key, value));
        }
    }
    best.map(|(key, value)| {
        (
            key.as_str(),
            value.as_str(),
            format!("{value}{}", &specifier[key.len()..]),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ImportMap {
        let mut map = ImportMap::new();
        map.imports
            .insert("a".to_owned(), "/pkgs/a/index.js".to_owned());
        map.imports.insert("a/".to_owned(), "/pkgs/a/".to_owned());
        map.scopes.insert(
            "/pkgs/a/".to_owned(),
            Mappings::from([("b".to_owned(), "/pkgs/b/index.js".to_owned())]),
        );
        map
    }

    #[test]
    fn test_exact_match_beats_prefix() {
        let map = sample();
        let (key, _, address) = match_specifier(&map.imports, "a").unwrap();
        assert_eq!(key, "a");
        assert_eq!(address, "/pkgs/a/index.js");
    }

    #[test]
    fn test_prefix_match_appends_remainder() {
        let map = sample();
        let (key, _, address) = match_specifier(&map.imports, "a/util.js").unwrap();
        assert_eq!(key, "a/");
        assert_eq!(address, "/pkgs/a/util.js");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mappings = Mappings::from([
            ("a/".to_owned(), "/short/".to_owned()),
            ("a/deep/".to_owned(), "/long/".to_owned()),
        ]);
        let (key, _, address) = match_specifier(&mappings, "a/deep/x.js").unwrap();
        assert_eq!(key, "a/deep/");
        assert_eq!(address, "/long/x.js");
    }

    #[test]
    fn test_no_match() {
        let map = sample();
        assert!(match_specifier(&map.imports, "unmapped").is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let map = sample();
        let json = map.to_json();
        assert!(json.ends_with('\n'));
        let back = ImportMap::from_json(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_serialized_key_order_is_stable() {
        let mut map = ImportMap::new();
        map.imports.insert("zebra".to_owned(), "/z.js".to_owned());
        map.imports.insert("alpha".to_owned(), "/a.js".to_owned());
        let json = map.to_json();
        assert!(json.find("alpha").unwrap() < json.find("zebra").unwrap());
        assert_eq!(json, ImportMap::from_json(&json).unwrap().to_json());
    }

    #[test]
    fn test_from_json_rejects_bad_scope_prefix() {
        let err = ImportMap::from_json(r#"{ "scopes": { "/pkgs/a": {} } }"#).unwrap_err();
        assert!(err.to_string().contains("/pkgs/a"));
    }
}
