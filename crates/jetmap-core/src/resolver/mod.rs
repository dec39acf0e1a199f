//! Scope-aware import-map resolution and module-graph tracing.

mod session;

pub use session::{MapResolver, TraceMap};
