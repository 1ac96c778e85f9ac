//! Error types for dependency analysis.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DepsError>;

#[derive(Debug, Error)]
pub enum DepsError {
    /// A lockfile exceeded the configured size limit. Scoped to one
    /// manifest/lockfile pair; callers may skip dependency tracing for that
    /// pair only.
    #[error("lockfile too large: {path} is {size} bytes (limit {limit})")]
    LockfileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// Lockfile format not recognized from its filename.
    #[error("unsupported lockfile format: {0}")]
    UnsupportedLockfile(PathBuf),

    /// Lockfile contents failed to parse.
    #[error("invalid lockfile {path}: {reason}")]
    InvalidLockfile { path: PathBuf, reason: String },

    /// Manifest contents failed to parse (deep path only; the shallow
    /// comparator treats parse failures as "changed" instead).
    #[error("invalid manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    /// No lockfile could be associated with a manifest.
    #[error("no lockfile found for manifest {0}")]
    MissingLockfile(PathBuf),

    /// A git collaborator operation failed (missing historical blob, ...).
    #[error(transparent)]
    Core(#[from] turbosnap_core::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
