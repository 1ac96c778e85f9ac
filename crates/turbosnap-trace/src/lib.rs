//! # turbosnap-trace
//!
//! Module graph tracing: the terminal decision point of selective
//! test-impact analysis.
//!
//! Input: the build tool's module stats (a reverse-adjacency list over the
//! import graph), the files git says changed, and the package names the
//! dependency analysis says changed. Output: either a map from affected
//! story module to its contributing files, or a bail decision whose blast
//! radius cannot be bounded (config, static assets, untraceable package
//! changes).
//!
//! The failure policy is asymmetric: skipping a story that actually changed
//! is unacceptable, testing too much is merely wasteful. Every heuristic in
//! this crate leans on the conservative side of that line.

pub mod error;
pub mod stats;
pub mod tracer;

pub use error::{Result, TraceError};
pub use stats::{ModuleId, ModuleStats, StatsModule};
pub use tracer::{BailReason, TraceDiagnostics, TraceOptions, TraceResult, trace_changed_files};
