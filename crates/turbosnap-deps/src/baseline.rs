//! Baseline dependency diffing.
//!
//! Checks out a baseline commit's manifest/lockfile pair via the git
//! collaborator, loads its graph, and diffs it against the HEAD graph.

use rustc_hash::FxHashSet;
use turbosnap_core::git::GitCollaborator;

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::lockfile::load_dependency_graph;

/// One baseline to compare HEAD against: a commit plus the repo-relative
/// manifest/lockfile pair to resolve at that commit.
#[derive(Debug, Clone)]
pub struct BaselineRef {
    pub commit: String,
    pub manifest_path: String,
    pub lockfile_path: String,
}

/// Package names whose resolved presence or version differs between the
/// HEAD graph and the given baseline.
///
/// Identical graphs yield the empty set. A missing historical blob
/// propagates as an error; "no changes" is never inferred from a failed
/// checkout.
pub async fn compare_baseline<G: GitCollaborator + ?Sized>(
    git: &G,
    head: &DependencyGraph,
    baseline: &BaselineRef,
    max_lockfile_size: u64,
) -> Result<FxHashSet<String>> {
    let manifest = git
        .checkout_file(&baseline.commit, &baseline.manifest_path)
        .await?;
    let lockfile = git
        .checkout_file(&baseline.commit, &baseline.lockfile_path)
        .await?;

    let baseline_graph = load_dependency_graph(&manifest, &lockfile, max_lockfile_size)?;
    let changed = head.changed_package_names(&baseline_graph);
    tracing::debug!(
        commit = %baseline.commit,
        manifest = %baseline.manifest_path,
        changed = changed.len(),
        "compared baseline dependency graph"
    );
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockfile::MAX_LOCKFILE_SIZE;
    use turbosnap_core::test_utils::InMemoryGit;

    const MANIFEST: &str = r#"{ "name": "app", "version": "1.0.0", "dependencies": { "react": "^18.0.0" } }"#;

    // Mirrors the loader's keying: the root occurrence carries no version.
    fn head_graph(react_version: &str) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        g.add_package("app", "");
        g.add_package("react", react_version);
        g
    }

    #[tokio::test]
    async fn reports_version_changes_against_baseline() {
        let git = InMemoryGit::new();
        git.add_historical_file("base1", "package.json", MANIFEST);
        git.add_historical_file(
            "base1",
            "package-lock.json",
            r#"{ "lockfileVersion": 3, "packages": {
                "": {},
                "node_modules/react": { "version": "17.0.2" }
            } }"#,
        );

        let baseline = BaselineRef {
            commit: "base1".into(),
            manifest_path: "package.json".into(),
            lockfile_path: "package-lock.json".into(),
        };
        let changed = compare_baseline(&git, &head_graph("18.2.0"), &baseline, MAX_LOCKFILE_SIZE)
            .await
            .unwrap();

        assert!(changed.contains("react"));
        assert_eq!(changed.len(), 1);
    }

    #[tokio::test]
    async fn identical_baseline_yields_empty_set() {
        let git = InMemoryGit::new();
        git.add_historical_file("base1", "package.json", MANIFEST);
        git.add_historical_file(
            "base1",
            "package-lock.json",
            r#"{ "lockfileVersion": 3, "packages": {
                "": {},
                "node_modules/react": { "version": "18.2.0" }
            } }"#,
        );

        let baseline = BaselineRef {
            commit: "base1".into(),
            manifest_path: "package.json".into(),
            lockfile_path: "package-lock.json".into(),
        };
        let changed = compare_baseline(&git, &head_graph("18.2.0"), &baseline, MAX_LOCKFILE_SIZE)
            .await
            .unwrap();
        assert!(changed.is_empty());
    }

    #[tokio::test]
    async fn missing_historical_blob_propagates() {
        let git = InMemoryGit::new();
        git.add_historical_file("base1", "package.json", MANIFEST);
        // lockfile blob missing at the baseline

        let baseline = BaselineRef {
            commit: "base1".into(),
            manifest_path: "package.json".into(),
            lockfile_path: "package-lock.json".into(),
        };
        let err = compare_baseline(&git, &head_graph("18.2.0"), &baseline, MAX_LOCKFILE_SIZE)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::DepsError::Core(_)));
    }
}
