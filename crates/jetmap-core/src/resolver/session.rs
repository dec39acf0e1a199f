//! The resolver session.
//!
//! One [`MapResolver`] owns everything a resolution run accumulates:
//! the used-entry map (for minimal-map extraction), the trace edge map,
//! and the seen set that makes cyclic module graphs terminate. None of
//! it is global state; drop the session, drop the scratch.

use std::collections::BTreeMap;

use dalkey_lexer::analyze;
use futures::future;
use rustc_hash::FxHashSet;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::map::{match_specifier, ImportMap};

/// Discovered module-graph edges:
/// resolved URL → (raw specifier → resolved URL).
///
/// Keyed by URL, not visitation order, so the result is a deterministic
/// function of the map and the source files.
pub type TraceMap = BTreeMap<String, BTreeMap<String, String>>;

/// A module queued for reading, with the import that led to it for
/// error context.
struct PendingRead {
    url: Url,
    specifier: String,
    importer: Option<Url>,
}

/// Scope-aware resolver and tracer over one import map.
pub struct MapResolver {
    map: ImportMap,
    base: Url,
    /// Scope prefixes resolved against the base, longest first, paired
    /// with their raw keys.
    scope_index: Vec<(String, String)>,
    used: ImportMap,
    trace: TraceMap,
    seen: FxHashSet<Url>,
}

impl MapResolver {
    /// Session over `map`, whose addresses and scope prefixes are
    /// resolved against `base`.
    #[must_use]
    pub fn new(map: ImportMap, base: Url) -> Self {
        let mut scope_index: Vec<(String, String)> = map
            .scopes
            .keys()
            .map(|key| {
                let abs = base
                    .join(key)
                    .map_or_else(|_| key.clone(), |url| url.to_string());
                (abs, key.clone())
            })
            .collect();
        // most specific scope first
        scope_index.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self {
            map,
            base,
            scope_index,
            used: ImportMap::new(),
            trace: TraceMap::new(),
            seen: FxHashSet::default(),
        }
    }

    /// The map this session resolves against.
    #[must_use]
    pub fn map(&self) -> &ImportMap {
        &self.map
    }

    /// Resolve one specifier from `parent`.
    ///
    /// URLs and `./`/`../`/`/` specifiers resolve directly against the
    /// parent, bypassing the map. Bare specifiers go through the most
    /// specific enclosing scope, then the top-level imports. A root
    /// entry (`top_level`) falls back to a same-directory relative
    /// interpretation; at any other depth an uncovered bare specifier
    /// is an error, since the map is expected to be complete for
    /// transitive dependencies.
    pub fn resolve(&mut self, specifier: &str, parent: &Url, top_level: bool) -> Result<Url, Error> {
        if let Ok(url) = Url::parse(specifier) {
            return Ok(url);
        }
        if specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
        {
            return parent
                .join(specifier)
                .map_err(|_| self.no_resolution(specifier, parent));
        }

        let parent_str = parent.as_str();
        for (abs, key) in &self.scope_index {
            if !parent_str.starts_with(abs.as_str()) {
                continue;
            }
            let Some(entries) = self.map.scopes.get(key) else {
                continue;
            };
            if let Some((matched, raw, address)) = match_specifier(entries, specifier) {
                self.used
                    .scopes
                    .entry(key.clone())
                    .or_default()
                    .insert(matched.to_owned(), raw.to_owned());
                return self.resolve_address(&address, specifier, parent);
            }
        }

        if let Some((matched, raw, address)) = match_specifier(&self.map.imports, specifier) {
            self.used
                .imports
                .insert(matched.to_owned(), raw.to_owned());
            return self.resolve_address(&address, specifier, parent);
        }

        if top_level {
            // root entry points may name a sibling file with no mapping
            if let Ok(url) = parent.join(specifier) {
                debug!(specifier, "unmapped root specifier treated as a relative path");
                return Ok(url);
            }
        }
        Err(self.no_resolution(specifier, parent))
    }

    /// Resolve an entry specifier, then trace the full transitive
    /// module graph underneath it: every reachable `file:` URL is read,
    /// analyzed, and its resolvable static and dynamic imports resolved
    /// in turn. Sibling reads run concurrently and unordered; the edge
    /// map comes out deterministic regardless. Already-seen modules and
    /// non-`file:` URLs are leaves, which is what makes cycles
    /// terminate.
    pub async fn resolve_all(&mut self, specifier: &str, parent: &Url) -> Result<Url, Error> {
        let entry = self.resolve(specifier, parent, true)?;
        let mut pending = vec![PendingRead {
            url: entry.clone(),
            specifier: specifier.to_owned(),
            importer: None,
        }];

        while !pending.is_empty() {
            let batch: Vec<PendingRead> = pending
                .drain(..)
                .filter(|p| p.url.scheme() == "file" && self.seen.insert(p.url.clone()))
                .collect();

            // fan the whole wave out to the filesystem at once
            let mut reads = future::join_all(batch.into_iter().map(|p| async move {
                let text = match p.url.to_file_path() {
                    Ok(path) => jetmap_util::read_to_string_lossy(&path).await,
                    Err(()) => Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "not a local file path",
                    )),
                };
                (p, text)
            }))
            .await;
            reads.sort_by(|a, b| a.0.url.cmp(&b.0.url));

            for (p, text) in reads {
                let source = match text {
                    Ok(source) => source,
                    Err(e) => {
                        return Err(Error::read(&p.url, &p.specifier, p.importer.as_ref(), e))
                    }
                };
                let analysis = analyze(&source).map_err(|e| Error::Analysis {
                    url: p.url.to_string(),
                    source: e,
                })?;

                let mut edges: BTreeMap<String, String> = BTreeMap::new();
                for record in &analysis.imports {
                    let Some(raw) = record.specifier(&source) else {
                        continue;
                    };
                    let resolved = self.resolve(raw, &p.url, false)?;
                    edges.insert(raw.to_owned(), resolved.to_string());
                    pending.push(PendingRead {
                        url: resolved,
                        specifier: raw.to_owned(),
                        importer: Some(p.url.clone()),
                    });
                }
                self.trace.insert(p.url.to_string(), edges);
            }
        }
        debug!(modules = self.trace.len(), "trace complete");
        Ok(entry)
    }

    /// The minimal map covering exactly the entries resolution has
    /// used so far, cleaned.
    #[must_use]
    pub fn used_map(&self) -> ImportMap {
        let mut map = self.used.clone();
        map.clean();
        map
    }

    /// Discovered edges so far.
    #[must_use]
    pub fn trace(&self) -> &TraceMap {
        &self.trace
    }

    /// Consume the session into its edge map.
    #[must_use]
    pub fn into_trace(self) -> TraceMap {
        self.trace
    }

    fn resolve_address(&self, address: &str, specifier: &str, parent: &Url) -> Result<Url, Error> {
        self.base
            .join(address)
            .map_err(|_| self.no_resolution(specifier, parent))
    }

    fn no_resolution(&self, specifier: &str, parent: &Url) -> Error {
        Error::Resolution {
            specifier: specifier.to_owned(),
            parent: parent.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Mappings;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn base() -> Url {
        Url::parse("file:///web/").unwrap()
    }

    fn mappings(entries: &[(&str, &str)]) -> Mappings {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn scoped_map() -> ImportMap {
        ImportMap {
            imports: mappings(&[("a", "/pkgA/index.js"), ("a/", "/pkgA/")]),
            scopes: BTreeMap::from([(
                "/pkgA/".to_owned(),
                mappings(&[("a", "/pkgA-other/index.js")]),
            )]),
        }
    }

    #[test]
    fn test_relative_specifiers_bypass_map() {
        let mut resolver = MapResolver::new(scoped_map(), base());
        let parent = Url::parse("file:///web/app/main.js").unwrap();
        let url = resolver.resolve("./sibling.js", &parent, false).unwrap();
        assert_eq!(url.as_str(), "file:///web/app/sibling.js");
        let url = resolver.resolve("../up.js", &parent, false).unwrap();
        assert_eq!(url.as_str(), "file:///web/up.js");
        let url = resolver.resolve("/rooted.js", &parent, false).unwrap();
        assert_eq!(url.as_str(), "file:///rooted.js");
        // nothing recorded as used
        assert!(resolver.used_map().is_empty());
    }

    #[test]
    fn test_full_url_specifier_passes_through() {
        let mut resolver = MapResolver::new(scoped_map(), base());
        let parent = Url::parse("file:///web/main.js").unwrap();
        let url = resolver
            .resolve("https://cdn.example.com/x.js", &parent, false)
            .unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/x.js");
    }

    #[test]
    fn test_scope_overrides_top_level() {
        let mut resolver = MapResolver::new(scoped_map(), base());

        let inside = Url::parse("file:///pkgA/lib/util.js").unwrap();
        let url = resolver.resolve("a", &inside, false).unwrap();
        assert_eq!(url.as_str(), "file:///pkgA-other/index.js");

        let outside = Url::parse("file:///web/main.js").unwrap();
        let url = resolver.resolve("a", &outside, false).unwrap();
        assert_eq!(url.as_str(), "file:///pkgA/index.js");
    }

    #[test]
    fn test_most_specific_scope_wins() {
        let map = ImportMap {
            imports: mappings(&[("x", "/top/x.js")]),
            scopes: BTreeMap::from([
                ("/nested/".to_owned(), mappings(&[("x", "/outer/x.js")])),
                (
                    "/nested/deep/".to_owned(),
                    mappings(&[("x", "/inner/x.js")]),
                ),
            ]),
        };
        let mut resolver = MapResolver::new(map, base());
        let parent = Url::parse("file:///nested/deep/mod.js").unwrap();
        let url = resolver.resolve("x", &parent, false).unwrap();
        assert_eq!(url.as_str(), "file:///inner/x.js");
    }

    #[test]
    fn test_folder_mapping_appends_remainder() {
        let mut resolver = MapResolver::new(scoped_map(), base());
        let parent = Url::parse("file:///web/main.js").unwrap();
        let url = resolver.resolve("a/lib/deep.js", &parent, false).unwrap();
        assert_eq!(url.as_str(), "file:///pkgA/lib/deep.js");
    }

    #[test]
    fn test_root_leniency_and_transitive_strictness() {
        let mut resolver = MapResolver::new(ImportMap::new(), base());
        let parent = Url::parse("file:///web/main.js").unwrap();

        // a root entry falls back to a same-directory relative file
        let url = resolver.resolve("entry.js", &parent, true).unwrap();
        assert_eq!(url.as_str(), "file:///web/entry.js");

        // the same specifier at depth is a hard error
        let err = resolver.resolve("entry.js", &parent, false).unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        let msg = err.to_string();
        assert!(msg.contains("entry.js"));
        assert!(msg.contains("file:///web/main.js"));
    }

    #[test]
    fn test_used_map_records_matched_entries() {
        let mut resolver = MapResolver::new(scoped_map(), base());
        let inside = Url::parse("file:///pkgA/lib/util.js").unwrap();
        resolver.resolve("a", &inside, false).unwrap();
        let outside = Url::parse("file:///web/main.js").unwrap();
        resolver.resolve("a/lib/deep.js", &outside, false).unwrap();

        let used = resolver.used_map();
        assert_eq!(used.imports.get("a/").unwrap(), "/pkgA/");
        assert!(!used.imports.contains_key("a"));
        assert_eq!(
            used.scopes.get("/pkgA/").unwrap().get("a").unwrap(),
            "/pkgA-other/index.js"
        );
    }

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn test_trace_walks_transitive_graph() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "main.js",
            "import './a.js';\nconst later = import('./b.js');\n",
        );
        write(dir.path(), "a.js", "export const a = 1;\n");
        write(dir.path(), "b.js", "import './a.js';\nexport default 2;\n");

        let base = Url::from_directory_path(dir.path()).unwrap();
        let mut resolver = MapResolver::new(ImportMap::new(), base.clone());
        let entry = resolver.resolve_all("./main.js", &base).await.unwrap();

        let trace = resolver.trace();
        assert_eq!(trace.len(), 3);
        let main_edges = trace.get(entry.as_str()).unwrap();
        assert_eq!(main_edges.len(), 2);
        assert!(main_edges.get("./a.js").unwrap().ends_with("/a.js"));
        assert!(main_edges.get("./b.js").unwrap().ends_with("/b.js"));
    }

    #[tokio::test]
    async fn test_trace_cycle_terminates_with_one_entry_each() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.js", "import './b.js'; export const a = 1;");
        write(dir.path(), "b.js", "import './a.js'; export const b = 2;");

        let base = Url::from_directory_path(dir.path()).unwrap();
        let mut resolver = MapResolver::new(ImportMap::new(), base.clone());
        resolver.resolve_all("./a.js", &base).await.unwrap();

        let trace = resolver.trace();
        assert_eq!(trace.len(), 2);
        for (_, edges) in trace.iter() {
            assert_eq!(edges.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_trace_through_scoped_map() {
        let dir = tempdir().unwrap();
        let pkgs = dir.path().join("pkgs");
        fs::create_dir_all(pkgs.join("dep")).unwrap();
        fs::create_dir_all(pkgs.join("dep2")).unwrap();
        write(dir.path(), "main.js", "import 'dep';\n");
        write(&pkgs.join("dep"), "index.js", "import 'helper';\n");
        write(&pkgs.join("dep2"), "index.js", "export default 0;\n");

        let map = ImportMap {
            imports: mappings(&[("dep", "pkgs/dep/index.js")]),
            scopes: BTreeMap::from([(
                "pkgs/dep/".to_owned(),
                mappings(&[("helper", "pkgs/dep2/index.js")]),
            )]),
        };
        let base = Url::from_directory_path(dir.path()).unwrap();
        let mut resolver = MapResolver::new(map, base.clone());
        resolver.resolve_all("./main.js", &base).await.unwrap();

        let trace = resolver.trace();
        assert_eq!(trace.len(), 3);
        let used = resolver.used_map();
        assert_eq!(used.imports.get("dep").unwrap(), "pkgs/dep/index.js");
        assert_eq!(
            used.scopes.get("pkgs/dep/").unwrap().get("helper").unwrap(),
            "pkgs/dep2/index.js"
        );
    }

    #[tokio::test]
    async fn test_unresolved_dynamic_imports_are_not_traced() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "main.js",
            "export async function load(name) { return import(name); }",
        );

        let base = Url::from_directory_path(dir.path()).unwrap();
        let mut resolver = MapResolver::new(ImportMap::new(), base.clone());
        resolver.resolve_all("./main.js", &base).await.unwrap();
        let trace = resolver.trace();
        assert_eq!(trace.len(), 1);
        assert!(trace.values().next().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_error_names_importer_and_specifier() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.js", "import './gone.js';");

        let base = Url::from_directory_path(dir.path()).unwrap();
        let mut resolver = MapResolver::new(ImportMap::new(), base.clone());
        let err = resolver.resolve_all("./main.js", &base).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        let msg = err.to_string();
        assert!(msg.contains("gone.js"));
        assert!(msg.contains("main.js"));
    }

    #[tokio::test]
    async fn test_lex_failure_is_analysis_error() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.js", "import './broken.js';");
        write(dir.path(), "broken.js", "const s = \"unterminated");

        let base = Url::from_directory_path(dir.path()).unwrap();
        let mut resolver = MapResolver::new(ImportMap::new(), base.clone());
        let err = resolver.resolve_all("./main.js", &base).await.unwrap_err();
        match err {
            Error::Analysis { url, .. } => assert!(url.ends_with("broken.js")),
            other => panic!("expected analysis error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_file_urls_are_leaves() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "main.js",
            "import 'https://cdn.example.com/lib.js';",
        );

        let base = Url::from_directory_path(dir.path()).unwrap();
        let mut resolver = MapResolver::new(ImportMap::new(), base.clone());
        resolver.resolve_all("./main.js", &base).await.unwrap();

        let trace = resolver.trace();
        assert_eq!(trace.len(), 1);
        let edges = trace.values().next().unwrap();
        assert_eq!(
            edges.get("https://cdn.example.com/lib.js").unwrap(),
            "https://cdn.example.com/lib.js"
        );
    }
}
