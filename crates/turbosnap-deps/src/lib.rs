//! # turbosnap-deps
//!
//! Dependency analysis for selective test-impact decisions.
//!
//! Given per-baseline lists of changed files, this crate answers one
//! question: *which package names changed between HEAD and any baseline?*
//! The answer feeds the module graph tracer in `turbosnap-trace`, which maps
//! package names to concrete `node_modules` files.
//!
//! Two code paths exist at different price points:
//!
//! - the **deep** path ([`find_changed_dependencies`]) resolves full
//!   dependency graphs from manifest + lockfile pairs at HEAD and at every
//!   relevant baseline commit, then diffs them;
//! - the **shallow** path ([`find_changed_package_files`]) only compares the
//!   dependency-relevant fields of two manifest versions, without touching a
//!   lockfile, to classify "did this file's dependencies change at all."
//!
//! "No changed dependencies" is a strong claim: any failure to resolve
//! historical state propagates as an error instead of degrading to an empty
//! result, so the orchestrator can fall back to a full test run.

pub mod baseline;
pub mod error;
pub mod finder;
pub mod graph;
pub mod lockfile;
pub mod manifest;

pub use baseline::{BaselineRef, compare_baseline};
pub use error::{DepsError, Result};
pub use finder::{
    FindChangedOptions, PackageMetadataChange, find_changed_dependencies,
    find_changed_package_files, package_dependencies_equal,
};
pub use graph::DependencyGraph;
pub use lockfile::{LockfileKind, load_dependency_graph};
pub use manifest::{DEPENDENCY_FIELDS, PackageManifest};
