//! Map hygiene: redundancy removal, merging, rebasing.
//!
//! These operations are best-effort cleanup over an already-built map;
//! only `rebase` can fail, and only in absolute mode.

use tracing::debug;
use url::Url;

use super::{match_specifier, ImportMap, Mappings};
use crate::error::Error;

impl ImportMap {
    /// Remove redundant specificity: any scope entry the top-level
    /// `imports` would already resolve to the same address is deleted,
    /// and scopes left empty are dropped. Key order is structural, so
    /// the result is already alphabetized.
    pub fn clean(&mut self) {
        let imports = &self.imports;
        let mut dropped = 0usize;
        for entries in self.scopes.values_mut() {
            entries.retain(|key, value| {
                let redundant =
                    matches!(match_specifier(imports, key), Some((_, _, address)) if address == *value);
                dropped += usize::from(redundant);
                !redundant
            });
        }
        self.scopes.retain(|_, entries| !entries.is_empty());
        if dropped > 0 {
            debug!(dropped, "removed redundant scope entries");
        }
    }

    /// Merge `patch` onto this map: imports shallow-merge, scopes merge
    /// per prefix, the patch winning on conflicts. The result is
    /// cleaned.
    pub fn extend(&mut self, patch: ImportMap) {
        self.imports.extend(patch.imports);
        for (scope, entries) in patch.scopes {
            self.scopes.entry(scope).or_default().extend(entries);
        }
        self.clean();
    }

    /// Re-relativize every relative-looking value (and scope prefix)
    /// from `from_dir` to `to_dir`. With `absolute` set, values are
    /// emitted as `/`-rooted paths below `to_dir` instead, and a value
    /// that would climb above that base is an error.
    pub fn rebase(&self, from_dir: &str, to_dir: &str, absolute: bool) -> Result<ImportMap, Error> {
        let mut out = ImportMap::new();
        for (key, value) in &self.imports {
            out.imports
                .insert(key.clone(), rebase_value(value, from_dir, to_dir, absolute)?);
        }
        for (scope, entries) in &self.scopes {
            let scope = rebase_value(scope, from_dir, to_dir, absolute)?;
            let mut rebased = Mappings::new();
            for (key, value) in entries {
                rebased.insert(key.clone(), rebase_value(value, from_dir, to_dir, absolute)?);
            }
            out.scopes.insert(scope, rebased);
        }
        Ok(out)
    }
}

/// A value is relative-looking unless it is a full URL or already
/// rooted at `/`.
fn looks_relative(value: &str) -> bool {
    !value.starts_with('/') && Url::parse(value).is_err()
}

fn rebase_value(
    value: &str,
    from_dir: &str,
    to_dir: &str,
    absolute: bool,
) -> Result<String, Error> {
    if !looks_relative(value) {
        return Ok(value.to_owned());
    }
    let resolved = jetmap_util::join(from_dir, value);
    let rel = jetmap_util::relative(to_dir, &resolved).ok_or_else(|| Error::Rebase {
        value: value.to_owned(),
        base: to_dir.to_owned(),
    })?;
    if absolute {
        if rel == ".." || rel.starts_with("../") {
            return Err(Error::Rebase {
                value: value.to_owned(),
                base: to_dir.to_owned(),
            });
        }
        return Ok(match rel.as_str() {
            "." => "/".to_owned(),
            _ => format!("/{rel}"),
        });
    }
    Ok(match rel.as_str() {
        "." => "./".to_owned(),
        _ if rel.starts_with("../") => rel,
        _ => format!("./{rel}"),
    })
}
