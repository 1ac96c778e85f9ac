//! Lockfile parsing into a [`DependencyGraph`].
//!
//! Supported dialects: npm `package-lock.json` (v1 nested tree and v2/v3
//! `packages` map) and classic `yarn.lock`. `pnpm-lock.yaml` is detected
//! but rejected as unsupported so the orchestrator falls back to a full
//! run. Dev dependencies are always included.
//!
//! A size guard runs before any parse attempt: a lockfile over the limit
//! (default 10 MiB) aborts with [`DepsError::LockfileTooLarge`] rather than
//! risking unbounded memory use. The guard is a blocking `fs::metadata`
//! stat, so it fails fast without allocating large buffers.

use std::path::Path;

use serde_json::Value;

use crate::error::{DepsError, Result};
use crate::graph::DependencyGraph;
use crate::manifest::PackageManifest;

/// Default maximum lockfile size (10 MiB).
pub const MAX_LOCKFILE_SIZE: u64 = 10 * 1024 * 1024;

/// Lockfile basenames recognized when pairing manifests with lockfiles.
pub const LOCKFILE_BASENAMES: [&str; 4] = [
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
];

/// Lockfile dialect, detected from the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockfileKind {
    NpmPackageLock,
    YarnClassic,
    PnpmLock,
}

impl LockfileKind {
    /// Detect the dialect from a path. Matches on the trailing filename so
    /// checked-out temporary copies (which keep the original basename as a
    /// suffix) are recognized too.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with("package-lock.json") || name.ends_with("npm-shrinkwrap.json") {
            Some(Self::NpmPackageLock)
        } else if name.ends_with("yarn.lock") {
            Some(Self::YarnClassic)
        } else if name.ends_with("pnpm-lock.yaml") {
            Some(Self::PnpmLock)
        } else {
            None
        }
    }
}

/// Parse a manifest/lockfile pair into a dependency graph.
///
/// Both files must exist on disk; either may be a checked-out temporary
/// copy of a historical blob rather than the working tree. Pure read, no
/// side effects.
pub fn load_dependency_graph(
    manifest_path: &Path,
    lockfile_path: &Path,
    max_lockfile_size: u64,
) -> Result<DependencyGraph> {
    let kind = LockfileKind::from_path(lockfile_path)
        .ok_or_else(|| DepsError::UnsupportedLockfile(lockfile_path.to_path_buf()))?;

    let size = std::fs::metadata(lockfile_path)?.len();
    if size > max_lockfile_size {
        return Err(DepsError::LockfileTooLarge {
            path: lockfile_path.to_path_buf(),
            size,
            limit: max_lockfile_size,
        });
    }

    let manifest = PackageManifest::from_path(manifest_path)?;
    let contents = std::fs::read_to_string(lockfile_path)?;

    let mut graph = DependencyGraph::new();
    // Unnamed manifests get no root node; a one-sided phantom root would
    // show up as a changed package. The root is keyed by name alone: the
    // project's own `version` field is a release number, not a dependency,
    // and must not surface in the baseline diff.
    if let Some(root_name) = manifest.name.as_deref() {
        graph.add_package(root_name, "");
        for dep in manifest.declared_dependency_names() {
            graph.add_dependency(root_name, "", dep);
        }
    }

    match kind {
        LockfileKind::NpmPackageLock => {
            parse_package_lock(lockfile_path, &contents, &mut graph)?;
        }
        LockfileKind::YarnClassic => {
            parse_yarn_lock(&contents, &mut graph);
        }
        LockfileKind::PnpmLock => {
            return Err(DepsError::UnsupportedLockfile(lockfile_path.to_path_buf()));
        }
    }

    Ok(graph)
}

fn parse_package_lock(path: &Path, contents: &str, graph: &mut DependencyGraph) -> Result<()> {
    let value: Value = serde_json::from_str(contents).map_err(|e| DepsError::InvalidLockfile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let Some(packages) = value.get("packages").and_then(Value::as_object) {
        // Lockfile v2/v3: flat map keyed by install path.
        for (install_path, entry) in packages {
            if install_path.is_empty() {
                continue; // root project entry, covered by the manifest
            }
            let Some(name) = package_name_from_install_path(install_path) else {
                continue;
            };
            // Entries without a version are links or workspace stubs.
            let Some(version) = entry.get("version").and_then(Value::as_str) else {
                continue;
            };
            graph.add_package(name, version);
            for field in ["dependencies", "optionalDependencies"] {
                if let Some(deps) = entry.get(field).and_then(Value::as_object) {
                    for dep_name in deps.keys() {
                        graph.add_dependency(name, version, dep_name);
                    }
                }
            }
        }
    } else if let Some(dependencies) = value.get("dependencies").and_then(Value::as_object) {
        // Lockfile v1: nested tree.
        parse_package_lock_v1(dependencies, graph);
    } else if value.get("lockfileVersion").is_none() {
        return Err(DepsError::InvalidLockfile {
            path: path.to_path_buf(),
            reason: "unrecognized package-lock shape".to_string(),
        });
    }

    Ok(())
}

fn parse_package_lock_v1(dependencies: &serde_json::Map<String, Value>, graph: &mut DependencyGraph) {
    for (name, entry) in dependencies {
        let Some(version) = entry.get("version").and_then(Value::as_str) else {
            continue;
        };
        graph.add_package(name, version);
        if let Some(requires) = entry.get("requires").and_then(Value::as_object) {
            for dep_name in requires.keys() {
                graph.add_dependency(name, version, dep_name);
            }
        }
        if let Some(nested) = entry.get("dependencies").and_then(Value::as_object) {
            parse_package_lock_v1(nested, graph);
        }
    }
}

/// `node_modules/@scope/name` or `node_modules/a/node_modules/b` → last
/// package segment.
fn package_name_from_install_path(install_path: &str) -> Option<&str> {
    let idx = install_path.rfind("node_modules/")?;
    let name = &install_path[idx + "node_modules/".len()..];
    if name.is_empty() { None } else { Some(name) }
}

/// Classic (v1) yarn.lock: line-oriented, entries headed by one or more
/// comma-separated `name@range` specs ending in `:`.
fn parse_yarn_lock(contents: &str, graph: &mut DependencyGraph) {
    let mut entry_names: Vec<String> = Vec::new();
    let mut pending_deps: Vec<String> = Vec::new();
    let mut version: Option<String> = None;
    let mut in_dependencies = false;

    let mut flush = |names: &[String], version: &Option<String>, deps: &[String]| {
        let Some(version) = version else { return };
        for name in names {
            graph.add_package(name, version);
            for dep in deps {
                graph.add_dependency(name, version, dep);
            }
        }
    };

    for line in contents.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(' ') {
            // New entry header: flush the previous one.
            flush(&entry_names, &version, &pending_deps);
            entry_names = line
                .trim_end_matches(':')
                .split(',')
                .filter_map(|spec| yarn_spec_name(spec.trim()))
                .collect();
            pending_deps.clear();
            version = None;
            in_dependencies = false;
        } else if let Some(rest) = line.strip_prefix("  ") {
            if !rest.starts_with(' ') {
                in_dependencies = false;
                if let Some(v) = rest.strip_prefix("version ") {
                    version = Some(v.trim().trim_matches('"').to_string());
                } else if rest.trim_end() == "dependencies:" || rest.trim_end() == "optionalDependencies:" {
                    in_dependencies = true;
                }
            } else if in_dependencies {
                // `    "name" "range"` (4-space indent)
                if let Some(dep) = rest.trim().split_whitespace().next() {
                    pending_deps.push(dep.trim_matches('"').to_string());
                }
            }
        }
    }
    flush(&entry_names, &version, &pending_deps);
}

/// `"@scope/name@^1.0.0"` → `@scope/name`; `lodash@^4.17.0` → `lodash`.
fn yarn_spec_name(spec: &str) -> Option<String> {
    let spec = spec.trim_matches('"');
    if spec.is_empty() {
        return None;
    }
    let at = spec[1..].find('@').map(|i| i + 1)?;
    Some(spec[..at].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_pair(dir: &tempfile::TempDir, manifest: &str, lock_name: &str, lock: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let manifest_path = dir.path().join("package.json");
        std::fs::write(&manifest_path, manifest).unwrap();
        let lockfile_path = dir.path().join(lock_name);
        std::fs::write(&lockfile_path, lock).unwrap();
        (manifest_path, lockfile_path)
    }

    const MANIFEST: &str = r#"{
        "name": "app",
        "version": "1.0.0",
        "dependencies": { "react": "^18.0.0" },
        "devDependencies": { "typescript": "^5.0.0" }
    }"#;

    #[test]
    fn parses_package_lock_v3() {
        let dir = tempfile::tempdir().unwrap();
        let lock = r#"{
            "name": "app",
            "lockfileVersion": 3,
            "packages": {
                "": { "name": "app", "version": "1.0.0" },
                "node_modules/react": {
                    "version": "18.2.0",
                    "dependencies": { "loose-envify": "^1.1.0" }
                },
                "node_modules/loose-envify": { "version": "1.4.0" },
                "node_modules/typescript": { "version": "5.3.3", "dev": true },
                "node_modules/react/node_modules/scheduler": { "version": "0.23.0" }
            }
        }"#;
        let (m, l) = write_pair(&dir, MANIFEST, "package-lock.json", lock);
        let graph = load_dependency_graph(&m, &l, MAX_LOCKFILE_SIZE).unwrap();

        assert!(graph.packages().any(|k| k.name == "react" && k.version == "18.2.0"));
        assert!(graph.packages().any(|k| k.name == "scheduler"));
        // dev dependencies are included
        assert!(graph.packages().any(|k| k.name == "typescript"));
        assert!(
            graph
                .dependencies_of("react", "18.2.0")
                .unwrap()
                .contains("loose-envify")
        );
    }

    #[test]
    fn parses_package_lock_v1() {
        let dir = tempfile::tempdir().unwrap();
        let lock = r#"{
            "name": "app",
            "lockfileVersion": 1,
            "dependencies": {
                "react": {
                    "version": "18.2.0",
                    "requires": { "loose-envify": "^1.1.0" },
                    "dependencies": {
                        "scheduler": { "version": "0.23.0" }
                    }
                },
                "loose-envify": { "version": "1.4.0" }
            }
        }"#;
        let (m, l) = write_pair(&dir, MANIFEST, "package-lock.json", lock);
        let graph = load_dependency_graph(&m, &l, MAX_LOCKFILE_SIZE).unwrap();

        assert!(graph.packages().any(|k| k.name == "react" && k.version == "18.2.0"));
        assert!(graph.packages().any(|k| k.name == "scheduler" && k.version == "0.23.0"));
    }

    #[test]
    fn parses_classic_yarn_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock = r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


"@babel/code-frame@^7.0.0":
  version "7.22.13"
  resolved "https://registry.yarnpkg.com/..."
  integrity sha512-abc
  dependencies:
    "@babel/highlight" "^7.22.13"

react@^18.0.0, react@^18.2.0:
  version "18.2.0"
  dependencies:
    loose-envify "^1.1.0"

loose-envify@^1.1.0:
  version "1.4.0"
"#;
        let (m, l) = write_pair(&dir, MANIFEST, "yarn.lock", lock);
        let graph = load_dependency_graph(&m, &l, MAX_LOCKFILE_SIZE).unwrap();

        assert!(graph.packages().any(|k| k.name == "@babel/code-frame" && k.version == "7.22.13"));
        assert!(graph.packages().any(|k| k.name == "react" && k.version == "18.2.0"));
        assert!(
            graph
                .dependencies_of("@babel/code-frame", "7.22.13")
                .unwrap()
                .contains("@babel/highlight")
        );
        assert!(
            graph
                .dependencies_of("react", "18.2.0")
                .unwrap()
                .contains("loose-envify")
        );
    }

    #[test]
    fn oversized_lockfile_fails_before_parse() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("package.json");
        std::fs::write(&manifest_path, MANIFEST).unwrap();
        let lockfile_path = dir.path().join("yarn.lock");
        let mut f = std::fs::File::create(&lockfile_path).unwrap();
        f.write_all(b"# yarn lockfile v1\n").unwrap();

        let err = load_dependency_graph(&manifest_path, &lockfile_path, 4).unwrap_err();
        assert!(matches!(err, DepsError::LockfileTooLarge { limit: 4, .. }));
    }

    #[test]
    fn pnpm_lockfiles_are_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let (m, l) = write_pair(&dir, MANIFEST, "pnpm-lock.yaml", "lockfileVersion: '9.0'\n");
        let err = load_dependency_graph(&m, &l, MAX_LOCKFILE_SIZE).unwrap_err();
        assert!(matches!(err, DepsError::UnsupportedLockfile(_)));
    }

    #[test]
    fn identical_pairs_produce_identical_graphs() {
        let dir = tempfile::tempdir().unwrap();
        let lock = r#"{ "lockfileVersion": 3, "packages": {
            "": {},
            "node_modules/react": { "version": "18.2.0" }
        } }"#;
        let (m, l) = write_pair(&dir, MANIFEST, "package-lock.json", lock);
        let a = load_dependency_graph(&m, &l, MAX_LOCKFILE_SIZE).unwrap();
        let b = load_dependency_graph(&m, &l, MAX_LOCKFILE_SIZE).unwrap();
        assert!(a.changed_package_names(&b).is_empty());
    }

    #[test]
    fn root_version_bump_alone_changes_nothing() {
        let lock = r#"{ "lockfileVersion": 3, "packages": {
            "": {},
            "node_modules/react": { "version": "18.2.0" }
        } }"#;

        let head_dir = tempfile::tempdir().unwrap();
        let (m, l) = write_pair(&head_dir, MANIFEST, "package-lock.json", lock);
        let head = load_dependency_graph(&m, &l, MAX_LOCKFILE_SIZE).unwrap();

        // Release bump only: same dependencies, different project version.
        let base_dir = tempfile::tempdir().unwrap();
        let bumped = MANIFEST.replace("1.0.0", "0.9.0");
        let (m, l) = write_pair(&base_dir, &bumped, "package-lock.json", lock);
        let baseline = load_dependency_graph(&m, &l, MAX_LOCKFILE_SIZE).unwrap();

        assert!(head.changed_package_names(&baseline).is_empty());
    }

    #[test]
    fn scoped_install_paths_resolve_to_scoped_names() {
        assert_eq!(
            package_name_from_install_path("node_modules/@babel/core"),
            Some("@babel/core")
        );
        assert_eq!(
            package_name_from_install_path("node_modules/a/node_modules/b"),
            Some("b")
        );
        assert_eq!(package_name_from_install_path("not-a-package"), None);
    }

    #[test]
    fn yarn_spec_names_handle_scopes() {
        assert_eq!(yarn_spec_name("lodash@^4.17.0").as_deref(), Some("lodash"));
        assert_eq!(
            yarn_spec_name("\"@babel/core@^7.0.0\"").as_deref(),
            Some("@babel/core")
        );
        assert_eq!(yarn_spec_name("").as_deref(), None);
    }
}
