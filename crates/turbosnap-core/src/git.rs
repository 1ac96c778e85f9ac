//! Boundary contract for the out-of-scope git plumbing.
//!
//! The analysis crates never shell out to git themselves; they go through
//! [`GitCollaborator`], which the orchestrating CLI implements on top of its
//! own `git show` / `git ls-files` plumbing. Tests use the in-memory double
//! from `test_utils`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::Result;

/// Contract for the external git collaborator.
///
/// All paths exchanged over this trait are POSIX-style and relative to the
/// repository root, except the returned checkout locations which are
/// absolute paths to temporary copies of historical blobs.
#[async_trait]
pub trait GitCollaborator: Send + Sync {
    /// Absolute path of the repository root for the current working tree.
    async fn repository_root(&self) -> Result<PathBuf>;

    /// Check out the blob at `commit:path` to a local file and return its
    /// location. The file may be a temporary copy; callers must not assume
    /// it lives inside the working tree.
    async fn checkout_file(&self, commit: &str, path: &str) -> Result<PathBuf>;

    /// Raw contents of the blob at `commit:path` (`git show` contract).
    async fn show_file(&self, commit: &str, path: &str) -> Result<String>;

    /// Tracked files under the repository root matching any of the given
    /// glob patterns (`git ls-files` contract; never lists `node_modules`).
    async fn find_files_from_root(&self, patterns: &[&str]) -> Result<Vec<String>>;
}

/// Memoizes [`GitCollaborator::checkout_file`] per `(commit, path)` key.
///
/// Multiple baselines or multiple manifest/lockfile pairs frequently
/// reference the same historical blob; checking it out once is enough.
/// Other operations delegate straight through.
pub struct MemoizedCheckout<'a, G: ?Sized> {
    inner: &'a G,
    checkouts: DashMap<(String, String), Arc<PathBuf>>,
}

impl<'a, G: GitCollaborator + ?Sized> MemoizedCheckout<'a, G> {
    pub fn new(inner: &'a G) -> Self {
        Self {
            inner,
            checkouts: DashMap::new(),
        }
    }
}

#[async_trait]
impl<G: GitCollaborator + ?Sized> GitCollaborator for MemoizedCheckout<'_, G> {
    async fn repository_root(&self) -> Result<PathBuf> {
        self.inner.repository_root().await
    }

    async fn checkout_file(&self, commit: &str, path: &str) -> Result<PathBuf> {
        let key = (commit.to_string(), path.to_string());
        if let Some(hit) = self.checkouts.get(&key) {
            tracing::trace!(%commit, %path, "checkout cache hit");
            return Ok(hit.as_ref().clone());
        }
        // Concurrent misses may check out the same blob twice; the second
        // insert wins and both paths stay valid.
        let local = self.inner.checkout_file(commit, path).await?;
        self.checkouts.insert(key, Arc::new(local.clone()));
        Ok(local)
    }

    async fn show_file(&self, commit: &str, path: &str) -> Result<String> {
        self.inner.show_file(commit, path).await
    }

    async fn find_files_from_root(&self, patterns: &[&str]) -> Result<Vec<String>> {
        self.inner.find_files_from_root(patterns).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::InMemoryGit;

    #[tokio::test]
    async fn memoized_checkout_hits_inner_once_per_blob() {
        let git = InMemoryGit::new();
        git.add_historical_file("abc123", "package.json", "{}");

        let memo = MemoizedCheckout::new(&git);
        let first = memo.checkout_file("abc123", "package.json").await.unwrap();
        let second = memo.checkout_file("abc123", "package.json").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(git.checkout_count(), 1);
    }

    #[tokio::test]
    async fn memoized_checkout_distinguishes_commits() {
        let git = InMemoryGit::new();
        git.add_historical_file("aaa", "yarn.lock", "# a");
        git.add_historical_file("bbb", "yarn.lock", "# b");

        let memo = MemoizedCheckout::new(&git);
        memo.checkout_file("aaa", "yarn.lock").await.unwrap();
        memo.checkout_file("bbb", "yarn.lock").await.unwrap();

        assert_eq!(git.checkout_count(), 2);
    }

    #[tokio::test]
    async fn missing_blob_propagates() {
        let git = InMemoryGit::new();
        let memo = MemoizedCheckout::new(&git);
        let err = memo.checkout_file("abc", "gone.json").await.unwrap_err();
        assert!(matches!(err, crate::Error::Git(_)));
    }
}
