//! Caller-owned glob pattern cache.
//!
//! The `untraced` and `externals` configuration values are matched against
//! many paths per build; compiling each pattern once and reusing the matcher
//! is the whole point of this type. The cache is an explicit object owned by
//! the caller so tests run in isolation without cross-test pattern
//! pollution.

use std::collections::HashMap;
use std::path::Path;

use globset::{Glob, GlobMatcher};

use crate::{Error, Result};

/// Memo table from pattern string to compiled matcher.
#[derive(Default)]
pub struct GlobCache {
    matchers: HashMap<String, GlobMatcher>,
}

impl GlobCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Does `path` match `pattern`?
    ///
    /// Compiles and caches the pattern on first use. An invalid pattern is a
    /// configuration error and surfaces as [`Error::InvalidGlob`].
    pub fn matches(&mut self, path: impl AsRef<Path>, pattern: &str) -> Result<bool> {
        if !self.matchers.contains_key(pattern) {
            let glob = Glob::new(pattern).map_err(|source| Error::InvalidGlob {
                pattern: pattern.to_string(),
                source,
            })?;
            self.matchers
                .insert(pattern.to_string(), glob.compile_matcher());
        }
        Ok(self.matchers[pattern].is_match(path.as_ref()))
    }

    /// Does `path` match any of `patterns`? Empty pattern lists match
    /// nothing.
    pub fn matches_any(&mut self, path: impl AsRef<Path>, patterns: &[String]) -> Result<bool> {
        let path = path.as_ref();
        for pattern in patterns {
            if self.matches(path, pattern)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Number of compiled patterns held by the cache.
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
