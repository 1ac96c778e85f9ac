//! Package-metadata change finding across a (possibly monorepo) working
//! tree and a set of baseline commits.
//!
//! The deep variant resolves full dependency graphs and diffs them per
//! baseline; the shallow variant only classifies whether a manifest's
//! dependency-relevant fields changed, without touching a lockfile.

use std::path::Path;

use futures::future::try_join_all;
use rustc_hash::FxHashSet;
use turbosnap_core::git::{GitCollaborator, MemoizedCheckout};
use turbosnap_core::glob::GlobCache;

use crate::baseline::{BaselineRef, compare_baseline};
use crate::error::{DepsError, Result};
use crate::lockfile::{LOCKFILE_BASENAMES, MAX_LOCKFILE_SIZE, load_dependency_graph};
use crate::manifest::dependency_fields_equal;

const MANIFEST_BASENAME: &str = "package.json";

/// Changed files of one baseline commit, as reported by the git
/// collaborator. Read-only input.
#[derive(Debug, Clone)]
pub struct PackageMetadataChange {
    pub commit: String,
    pub changed_files: Vec<String>,
}

/// Options for [`find_changed_dependencies`].
#[derive(Debug, Clone)]
pub struct FindChangedOptions {
    /// Globs excluding manifests from impact analysis entirely.
    pub untraced: Vec<String>,
    /// Lockfile size guard, see [`MAX_LOCKFILE_SIZE`].
    pub max_lockfile_size: u64,
}

impl Default for FindChangedOptions {
    fn default() -> Self {
        Self {
            untraced: Vec::new(),
            max_lockfile_size: MAX_LOCKFILE_SIZE,
        }
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn is_manifest(path: &str) -> bool {
    basename(path) == MANIFEST_BASENAME
}

fn is_lockfile(path: &str) -> bool {
    LOCKFILE_BASENAMES.contains(&basename(path))
}

/// Deduplicated bare names of packages whose resolved version or presence
/// changed between HEAD and *any* baseline commit.
///
/// Steps:
/// 1. locate the root manifest/lockfile pair and every nested manifest,
///    each paired with the lockfile in its own directory or the root one;
/// 2. keep only pairs that some baseline actually touched;
/// 3. drop pairs whose manifest matches an `untraced` glob;
/// 4. load each surviving pair's HEAD graph once, diff it against every
///    relevant baseline;
/// 5. union the names.
///
/// Independent pairs and independent baselines run concurrently; the first
/// failure propagates (a partial answer would be mistaken for "nothing
/// changed"). Returns without any git or filesystem I/O when no baseline
/// touched a manifest or lockfile.
pub async fn find_changed_dependencies<G: GitCollaborator + ?Sized>(
    git: &G,
    changes: &[PackageMetadataChange],
    options: &FindChangedOptions,
) -> Result<Vec<String>> {
    let metadata_touched = changes
        .iter()
        .flat_map(|c| c.changed_files.iter())
        .any(|f| is_manifest(f) || is_lockfile(f));
    if !metadata_touched {
        return Ok(Vec::new());
    }

    let git = MemoizedCheckout::new(git);
    let root = git.repository_root().await?;

    let manifests = git
        .find_files_from_root(&[MANIFEST_BASENAME, "**/package.json"])
        .await?;
    // Discovery covers every basename `is_lockfile` recognizes, including
    // pnpm-lock.yaml, so a pnpm repo surfaces UnsupportedLockfile instead of
    // a misleading MissingLockfile.
    let lockfile_globs: Vec<String> = LOCKFILE_BASENAMES
        .iter()
        .flat_map(|b| [(*b).to_string(), format!("**/{b}")])
        .collect();
    let lockfile_glob_refs: Vec<&str> = lockfile_globs.iter().map(String::as_str).collect();
    let lockfiles = git.find_files_from_root(&lockfile_glob_refs).await?;

    let root_lockfile = lockfiles.iter().find(|l| dirname(l).is_empty());
    let lockfile_for_dir = |dir: &str| {
        lockfiles
            .iter()
            .find(|l| dirname(l) == dir)
            .or(root_lockfile)
    };

    let mut matcher = GlobCache::new();
    let mut seen = FxHashSet::default();
    let mut pairs: Vec<(String, String, Vec<BaselineRef>)> = Vec::new();

    for manifest_path in &manifests {
        if !seen.insert(manifest_path.clone()) {
            continue;
        }
        if matcher.matches_any(manifest_path, &options.untraced)? {
            tracing::debug!(manifest = %manifest_path, "manifest matches untraced glob, skipped");
            continue;
        }
        let Some(lockfile_path) = lockfile_for_dir(dirname(manifest_path)) else {
            return Err(DepsError::MissingLockfile(manifest_path.into()));
        };

        let baselines: Vec<BaselineRef> = changes
            .iter()
            .filter(|c| {
                c.changed_files
                    .iter()
                    .any(|f| f == manifest_path || f == lockfile_path)
            })
            .map(|c| BaselineRef {
                commit: c.commit.clone(),
                manifest_path: manifest_path.clone(),
                lockfile_path: lockfile_path.clone(),
            })
            .collect();
        if baselines.is_empty() {
            continue;
        }
        pairs.push((manifest_path.clone(), lockfile_path.clone(), baselines));
    }

    let per_pair = try_join_all(pairs.iter().map(|(manifest_path, lockfile_path, baselines)| {
        let git = &git;
        let root = &root;
        async move {
            let head = load_dependency_graph(
                &root.join(manifest_path),
                &root.join(lockfile_path),
                options.max_lockfile_size,
            )?;
            let diffs = try_join_all(
                baselines
                    .iter()
                    .map(|baseline| compare_baseline(git, &head, baseline, options.max_lockfile_size)),
            )
            .await?;
            Ok::<FxHashSet<String>, DepsError>(diffs.into_iter().flatten().collect())
        }
    }))
    .await?;

    let mut names: Vec<String> = per_pair
        .into_iter()
        .flatten()
        .collect::<FxHashSet<String>>()
        .into_iter()
        .collect();
    names.sort();
    tracing::debug!(changed = names.len(), "changed dependency names resolved");
    Ok(names)
}

/// Manifest files whose dependency-relevant fields changed relative to any
/// baseline, deduplicated by path.
///
/// Cheaper than [`find_changed_dependencies`]: no lockfile resolution, just
/// a field-restricted comparison of the baseline and HEAD manifest text.
/// Any file that cannot be fetched or parsed is conservatively treated as
/// changed, never as unchanged.
pub async fn find_changed_package_files<G: GitCollaborator + ?Sized>(
    git: &G,
    changes: &[PackageMetadataChange],
) -> Result<Vec<String>> {
    let root = git.repository_root().await?;

    let mut changed: Vec<String> = Vec::new();
    let mut flagged = FxHashSet::default();

    for change in changes {
        for file in change.changed_files.iter().filter(|f| is_manifest(f)) {
            if flagged.contains(file.as_str()) {
                continue;
            }
            if !manifest_dependencies_unchanged(git, &root, &change.commit, file).await {
                flagged.insert(file.clone());
                changed.push(file.clone());
            }
        }
    }
    Ok(changed)
}

async fn manifest_dependencies_unchanged<G: GitCollaborator + ?Sized>(
    git: &G,
    root: &Path,
    commit: &str,
    file: &str,
) -> bool {
    let baseline_text = match git.show_file(commit, file).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(%commit, %file, error = %e, "cannot fetch baseline manifest, treating as changed");
            return false;
        }
    };
    let head_text = match tokio::fs::read_to_string(root.join(file)).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(%file, error = %e, "cannot read HEAD manifest, treating as changed");
            return false;
        }
    };
    package_dependencies_equal(&baseline_text, &head_text)
}

/// Are two manifest texts equal on all dependency-relevant fields?
///
/// Parse failures on either side are a conservative "no" (treated as
/// changed), never re-thrown.
pub fn package_dependencies_equal(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (
        serde_json::from_str::<serde_json::Value>(a),
        serde_json::from_str::<serde_json::Value>(b),
    ) else {
        tracing::warn!("malformed manifest JSON, treating dependencies as changed");
        return false;
    };
    dependency_fields_equal(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_and_dirname_split_posix_paths() {
        assert_eq!(basename("services/web/package.json"), "package.json");
        assert_eq!(basename("package.json"), "package.json");
        assert_eq!(dirname("services/web/package.json"), "services/web");
        assert_eq!(dirname("package.json"), "");
    }

    #[test]
    fn lockfile_basenames_are_recognized() {
        assert!(is_lockfile("yarn.lock"));
        assert!(is_lockfile("services/web/package-lock.json"));
        assert!(!is_lockfile("src/locks.rs"));
    }

    #[test]
    fn equality_is_restricted_to_dependency_fields() {
        let a = r#"{ "version": "1.0.0", "dependencies": { "react": "^18.0.0" } }"#;
        let b = r#"{ "version": "2.0.0", "dependencies": { "react": "^18.0.0" } }"#;
        assert!(package_dependencies_equal(a, b));

        let c = r#"{ "dependencies": { "react": "^17.0.0" } }"#;
        assert!(!package_dependencies_equal(a, c));
    }

    #[test]
    fn malformed_json_is_conservatively_changed() {
        assert!(!package_dependencies_equal("{ not json", "{}"));
        assert!(!package_dependencies_equal("{}", "also not json"));
    }
}
