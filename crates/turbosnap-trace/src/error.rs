//! Error types for module graph tracing.
//!
//! Only genuinely user-actionable conditions are errors here; a legitimate
//! "cannot bound the blast radius" outcome is data
//! ([`crate::tracer::BailReason`]), not an exception.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TraceError>;

#[derive(Debug, Error)]
pub enum TraceError {
    /// No module in the stats file is imported by a known stories entry.
    /// This indicates a misconfigured Storybook config directory, not a
    /// legitimate reason to fall back to a full run.
    #[error(
        "no story glob modules found in the stats file; \
         is the Storybook config directory configured correctly?{}",
        hint.as_deref().map(|h| format!(" (found entry-like module `{h}`)")).unwrap_or_default()
    )]
    NoCsfGlobsFound { hint: Option<String> },

    /// The stats file failed to deserialize.
    #[error("invalid module stats: {0}")]
    InvalidStats(String),

    /// I/O error reading the stats file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An invalid user-supplied glob pattern.
    #[error(transparent)]
    Core(#[from] turbosnap_core::Error),
}
