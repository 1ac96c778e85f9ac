//! # turbosnap-core
//!
//! TurboSnap core crate - shared foundation for selective test-impact
//! analysis.
//!
//! This crate provides the pieces the analysis crates
//! (`turbosnap-deps`, `turbosnap-trace`) depend on without depending on each
//! other:
//!
//! - [`Error`] / [`Result`] - shared error type for boundary operations
//! - [`git::GitCollaborator`] - the contract for the out-of-scope git
//!   plumbing (checkouts, file listing, historical file contents)
//! - [`git::MemoizedCheckout`] - a `(commit, path)`-keyed memoization
//!   wrapper over any [`git::GitCollaborator`]
//! - [`glob::GlobCache`] - a caller-owned pattern cache answering
//!   "does path P match pattern G"
//! - [`paths`] - the canonical POSIX path normalizer shared by the module
//!   graph tracer

pub mod git;
pub mod glob;
pub mod paths;

// Test utilities (available in test builds and when test-utils feature is
// enabled). The in-memory git double writes checked-out blobs to a tempdir.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use git::{GitCollaborator, MemoizedCheckout};
pub use glob::GlobCache;
pub use paths::{normalize, posix};

/// Error types for boundary operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A user-supplied glob pattern failed to compile.
    #[error("invalid glob pattern `{pattern}`: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// A git collaborator operation failed (missing blob, bad ref, ...).
    #[error("git operation failed: {0}")]
    Git(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
