//! Test doubles for the git boundary.
//!
//! [`InMemoryGit`] implements [`GitCollaborator`] over a map of
//! `(commit, path)` → contents plus a list of tracked worktree files.
//! Checked-out blobs are written to a tempdir so callers exercise the same
//! read-a-real-file path they use in production.

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::git::GitCollaborator;
use crate::{Error, Result};

/// In-memory [`GitCollaborator`] double.
pub struct InMemoryGit {
    dir: tempfile::TempDir,
    historical: Mutex<Vec<((String, String), String)>>,
    tracked: Mutex<Vec<String>>,
    checkout_count: AtomicUsize,
}

impl InMemoryGit {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir for InMemoryGit"),
            historical: Mutex::new(Vec::new()),
            tracked: Mutex::new(Vec::new()),
            checkout_count: AtomicUsize::new(0),
        }
    }

    /// Register the contents of `commit:path`.
    pub fn add_historical_file(&self, commit: &str, path: &str, contents: &str) {
        self.historical
            .lock()
            .unwrap()
            .push(((commit.to_string(), path.to_string()), contents.to_string()));
    }

    /// Register a tracked worktree file (repo-relative POSIX path) and write
    /// its contents under the repository root.
    pub fn add_worktree_file(&self, path: &str, contents: &str) {
        let full = self.dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("create worktree dirs");
        }
        std::fs::write(&full, contents).expect("write worktree file");
        self.tracked.lock().unwrap().push(path.to_string());
    }

    /// How many times a blob was actually checked out (memoization probes).
    pub fn checkout_count(&self) -> usize {
        self.checkout_count.load(Ordering::SeqCst)
    }

    fn lookup(&self, commit: &str, path: &str) -> Option<String> {
        self.historical
            .lock()
            .unwrap()
            .iter()
            .find(|((c, p), _)| c == commit && p == path)
            .map(|(_, contents)| contents.clone())
    }
}

impl Default for InMemoryGit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitCollaborator for InMemoryGit {
    async fn repository_root(&self) -> Result<PathBuf> {
        Ok(self.dir.path().to_path_buf())
    }

    async fn checkout_file(&self, commit: &str, path: &str) -> Result<PathBuf> {
        let contents = self
            .lookup(commit, path)
            .ok_or_else(|| Error::Git(format!("no blob for {commit}:{path}")))?;
        self.checkout_count.fetch_add(1, Ordering::SeqCst);

        let flat = path.replace('/', "__");
        let local = self.dir.path().join(format!("checkout-{commit}-{flat}"));
        std::fs::write(&local, contents)?;
        Ok(local)
    }

    async fn show_file(&self, commit: &str, path: &str) -> Result<String> {
        self.lookup(commit, path)
            .ok_or_else(|| Error::Git(format!("no blob for {commit}:{path}")))
    }

    async fn find_files_from_root(&self, patterns: &[&str]) -> Result<Vec<String>> {
        let mut matcher = crate::glob::GlobCache::new();
        let tracked = self.tracked.lock().unwrap().clone();
        let mut found = Vec::new();
        for path in tracked {
            for pattern in patterns {
                if matcher.matches(&path, pattern)? {
                    found.push(path.clone());
                    break;
                }
            }
        }
        Ok(found)
    }
}
