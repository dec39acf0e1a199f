//! Platform builtin module names.
//!
//! Package `map` fields may alias a builtin (`"process"`, `"node:fs"`);
//! in a browser-targeted map those land on a shared shim package rather
//! than a real module.

/// Builtin module names, sorted.
pub const BUILTINS: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

/// Whether a specifier names a platform builtin, with or without the
/// `node:` prefix.
#[must_use]
pub fn is_builtin(specifier: &str) -> bool {
    let name = specifier.strip_prefix("node:").unwrap_or(specifier);
    BUILTINS.binary_search(&name).is_ok()
}

/// The builtin name without its `node:` prefix.
#[must_use]
pub fn builtin_name(specifier: &str) -> &str {
    specifier.strip_prefix("node:").unwrap_or(specifier)
}
