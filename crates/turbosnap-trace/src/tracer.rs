//! Reachability search over the reversed module import graph.
//!
//! From "files git says changed" toward "modules a stories entry imports",
//! with bail conditions that override the search. The traversal uses an
//! explicit work-stack and a visited set instead of recursion; large module
//! graphs must not be able to blow the call stack.

use rustc_hash::{FxHashMap, FxHashSet};

use turbosnap_core::glob::GlobCache;
use turbosnap_core::paths::normalize;

use crate::error::{Result, TraceError};
use crate::stats::{ModuleStats, StatsModule, base_chunk_name, is_user_module, node_modules_package};

/// Manifest/lockfile basenames whose change can never be narrowed to
/// individual stories.
const PACKAGE_FILES: [&str; 5] = [
    "package.json",
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
];

/// Basenames of the build tool's generated stories-entry modules.
const STORIES_ENTRY_BASENAMES: [&str; 4] = [
    "generated-stories-entry.js",
    "generated-stories-entry.cjs",
    "storybook-stories.js",
    "vite-app.js",
];

/// The vite builder's virtual stories entry.
const VIRTUAL_STORIES_ENTRY: &str = "/virtual:/@storybook/builder-vite/vite-app.js";

/// User configuration for one trace. Validated upstream; plain data here.
#[derive(Debug, Clone)]
pub struct TraceOptions {
    /// Storybook config directory, relative to the build invocation
    /// directory.
    pub storybook_config_dir: String,
    /// Directory, relative to the repo root, from which the build tool was
    /// invoked (monorepo setups).
    pub storybook_base_dir: String,
    /// Static asset directories; any change below one bails.
    pub static_dirs: Vec<String>,
    /// Globs excluding files from impact analysis regardless of
    /// reachability.
    pub untraced: Vec<String>,
    /// Globs naming packages that are intentionally not part of the bundle;
    /// a changed external that the stats cannot map to files is skipped
    /// instead of bailing.
    pub externals: Vec<String>,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            storybook_config_dir: ".storybook".to_string(),
            storybook_base_dir: String::new(),
            static_dirs: Vec::new(),
            untraced: Vec::new(),
            externals: Vec::new(),
        }
    }
}

/// Why selective analysis gave up. Carried as data: a bail is a successful
/// analysis outcome whose correct response is "test everything."
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BailReason {
    /// Package manifests/lockfiles changed (or changed dependencies could
    /// not be mapped to files in the stats).
    ChangedPackageFiles(Vec<String>),
    /// Files under the Storybook config directory changed.
    ChangedStorybookFiles(Vec<String>),
    /// Files under a static asset directory changed.
    ChangedStaticFiles(Vec<String>),
}

/// Out-of-band observations made while tracing, for diagnostic reporting.
#[derive(Debug, Clone, Default)]
pub struct TraceDiagnostics {
    /// Changed input files that entered the trace (post-filter).
    pub traced_files: Vec<String>,
    /// Full module-name paths from a changed file to an affected story
    /// module.
    pub traced_paths: Vec<Vec<String>>,
    /// Ids of affected story modules, sorted.
    pub affected_module_ids: Vec<String>,
    /// Changed files dropped by the `untraced` globs.
    pub untraced_files: Vec<String>,
}

/// Terminal state of one trace invocation.
#[derive(Debug, Clone)]
pub enum TraceResult {
    /// Analysis completed: affected story module id → contributing file
    /// paths. Possibly empty, meaning no story is reachable from any
    /// changed file.
    Traced {
        affected: FxHashMap<String, Vec<String>>,
        diagnostics: TraceDiagnostics,
    },
    /// Analysis gave up; the caller must fall back to a full test run.
    Bailed {
        reason: BailReason,
        diagnostics: TraceDiagnostics,
    },
}

impl TraceResult {
    pub fn bail_reason(&self) -> Option<&BailReason> {
        match self {
            Self::Traced { .. } => None,
            Self::Bailed { reason, .. } => Some(reason),
        }
    }

    pub fn diagnostics(&self) -> &TraceDiagnostics {
        match self {
            Self::Traced { diagnostics, .. } | Self::Bailed { diagnostics, .. } => diagnostics,
        }
    }
}

/// Index over the stats file, built in one pass.
struct TraceIndex<'a> {
    modules_by_name: FxHashMap<String, &'a StatsModule>,
    names_by_id: FxHashMap<String, String>,
    reasons_by_id: FxHashMap<String, Vec<String>>,
    csf_globs: FxHashSet<String>,
    /// package name → normalized module files under that package
    node_modules: FxHashMap<String, Vec<String>>,
}

impl<'a> TraceIndex<'a> {
    fn build(
        stats: &'a ModuleStats,
        repo_root: &str,
        base_dir: &str,
        config_dir: &str,
    ) -> Result<Self> {
        let entry_names = stories_entry_names(config_dir, base_dir, repo_root);

        let mut index = TraceIndex {
            modules_by_name: FxHashMap::default(),
            names_by_id: FxHashMap::default(),
            reasons_by_id: FxHashMap::default(),
            csf_globs: FxHashSet::default(),
            node_modules: FxHashMap::default(),
        };

        for module in stats.modules.iter().filter(|m| is_user_module(m)) {
            let name = normalize(base_chunk_name(&module.name), repo_root, base_dir);
            let id = module.id.as_ref().map(|id| id.as_key()).unwrap_or_default();

            index.modules_by_name.insert(name.clone(), module);
            index.names_by_id.insert(id.clone(), name.clone());
            index.register_node_modules_file(&name);

            // Each constituent of a multi-file chunk aliases its parent.
            if let Some(constituents) = &module.modules {
                for sub in constituents {
                    let sub_name = normalize(&sub.name, repo_root, base_dir);
                    index.register_node_modules_file(&sub_name);
                    index.modules_by_name.insert(sub_name, module);
                }
            }

            let reasons: Vec<String> = module
                .reasons
                .iter()
                .filter_map(|r| r.module_name.as_deref())
                .map(|r| normalize(r, repo_root, base_dir))
                .collect();
            if reasons.iter().any(|r| entry_names.contains(r)) {
                index.csf_globs.insert(name);
            }
            index.reasons_by_id.insert(id, reasons);
        }

        if index.csf_globs.is_empty() {
            let hint = stats
                .modules
                .iter()
                .map(|m| normalize(&m.name, repo_root, base_dir))
                .find(|name| {
                    STORIES_ENTRY_BASENAMES
                        .iter()
                        .any(|entry| name.ends_with(entry))
                });
            return Err(TraceError::NoCsfGlobsFound { hint });
        }

        Ok(index)
    }

    fn register_node_modules_file(&mut self, name: &str) {
        if let Some(package) = node_modules_package(name) {
            self.node_modules
                .entry(package.to_string())
                .or_default()
                .push(name.to_string());
        }
    }

    /// All known file paths contributing to a module: its chunk
    /// constituents, or its own normalized name.
    fn files_of(&self, id: &str, repo_root: &str, base_dir: &str) -> Vec<String> {
        let Some(name) = self.names_by_id.get(id) else {
            return Vec::new();
        };
        match self.modules_by_name.get(name).and_then(|m| m.modules.as_ref()) {
            Some(constituents) if !constituents.is_empty() => constituents
                .iter()
                .map(|sub| normalize(&sub.name, repo_root, base_dir))
                .collect(),
            _ => vec![name.clone()],
        }
    }
}

/// The known stories-entry module names, normalized. The config-dir
/// variants move with the configured directory; the virtual entry is
/// location-independent.
fn stories_entry_names(config_dir: &str, base_dir: &str, repo_root: &str) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    for basename in ["generated-stories-entry.js", "generated-stories-entry.cjs"] {
        names.insert(normalize(
            &format!("{}/{}", config_dir.trim_end_matches('/'), basename),
            repo_root,
            base_dir,
        ));
    }
    names.insert(normalize("./storybook-stories.js", repo_root, base_dir));
    names.insert(normalize("./vite-app.js", repo_root, base_dir));
    names.insert(VIRTUAL_STORIES_ENTRY.to_string());
    names
}

fn is_package_file(name: &str) -> bool {
    let basename = name.rsplit('/').next().unwrap_or(name);
    PACKAGE_FILES.contains(&basename)
}

fn in_dir(name: &str, dir: &str) -> bool {
    !dir.is_empty() && (name == dir || name.starts_with(&format!("{dir}/")))
}

/// Trace changed files and changed dependency names through the module
/// graph to the story modules they affect.
///
/// `changed_files` are repo-relative POSIX paths as reported by git;
/// `changed_dependency_names` are bare package names from the dependency
/// analysis. The stats object is only indexed, never mutated.
///
/// Returns [`TraceResult::Bailed`] when a change's blast radius cannot be
/// bounded; returns an error only for user-actionable misconfiguration.
pub fn trace_changed_files(
    stats: &ModuleStats,
    repo_root: &str,
    changed_files: &[String],
    changed_dependency_names: &[String],
    options: &TraceOptions,
) -> Result<TraceResult> {
    let base_dir = options.storybook_base_dir.as_str();
    let config_dir = normalize(&options.storybook_config_dir, repo_root, base_dir);
    let static_dirs: Vec<String> = options
        .static_dirs
        .iter()
        .map(|dir| normalize(dir, repo_root, base_dir))
        .collect();
    let entry_names = stories_entry_names(&options.storybook_config_dir, base_dir, repo_root);

    let index = TraceIndex::build(stats, repo_root, base_dir, &options.storybook_config_dir)?;
    let mut matcher = GlobCache::new();
    let mut diagnostics = TraceDiagnostics::default();

    // Seed the work stack with changed files...
    let mut stack: Vec<(String, Vec<String>)> = Vec::new();
    for file in changed_files {
        let name = normalize(file, repo_root, "");
        if matcher.matches_any(&name, &options.untraced)? {
            tracing::debug!(file = %name, "changed file matches untraced glob, skipped");
            diagnostics.untraced_files.push(name);
            continue;
        }
        diagnostics.traced_files.push(name.clone());
        stack.push((name, Vec::new()));
    }

    // ...and with every stats file under a changed package.
    if !changed_dependency_names.is_empty() && index.node_modules.is_empty() {
        // Stats too shallow to map dependency names to files: dependency
        // impact cannot be proven absent, so the trace cannot be trusted.
        tracing::debug!("stats contain no node_modules entries, bailing on dependency changes");
        return Ok(TraceResult::Bailed {
            reason: BailReason::ChangedPackageFiles(changed_dependency_names.to_vec()),
            diagnostics,
        });
    }
    for package in changed_dependency_names {
        match index.node_modules.get(package) {
            Some(files) => {
                for file in files {
                    if matcher.matches_any(file, &options.untraced)? {
                        diagnostics.untraced_files.push(file.clone());
                        continue;
                    }
                    diagnostics.traced_files.push(file.clone());
                    stack.push((file.clone(), Vec::new()));
                }
            }
            None if matcher.matches_any(package, &options.externals)? => {
                tracing::warn!(%package, "changed external package not present in stats, skipped");
            }
            None => {
                tracing::debug!(%package, "changed package not present in stats, bailing");
                return Ok(TraceResult::Bailed {
                    reason: BailReason::ChangedPackageFiles(vec![package.clone()]),
                    diagnostics,
                });
            }
        }
    }

    let mut checked_ids: FxHashSet<String> = FxHashSet::default();
    let mut affected: FxHashMap<String, Vec<String>> = FxHashMap::default();

    while let Some((name, trace_path)) = stack.pop() {
        // A recognized glob root needs no further tracing.
        if index.csf_globs.contains(&name) {
            continue;
        }

        // Bail checks short-circuit the whole traversal, first one wins.
        if is_package_file(&name) {
            return Ok(TraceResult::Bailed {
                reason: BailReason::ChangedPackageFiles(vec![name]),
                diagnostics,
            });
        }
        if in_dir(&name, &config_dir) && !entry_names.contains(&name) {
            return Ok(TraceResult::Bailed {
                reason: BailReason::ChangedStorybookFiles(vec![name]),
                diagnostics,
            });
        }
        if let Some(dir) = static_dirs.iter().find(|dir| in_dir(&name, dir)) {
            tracing::debug!(file = %name, dir = %dir, "changed file under static dir");
            return Ok(TraceResult::Bailed {
                reason: BailReason::ChangedStaticFiles(vec![name]),
                diagnostics,
            });
        }

        let Some(module) = index.modules_by_name.get(&name) else {
            tracing::debug!(file = %name, "changed file not present in the module graph");
            continue;
        };
        let id = module.id.as_ref().map(|id| id.as_key()).unwrap_or_default();
        if !checked_ids.insert(id.clone()) {
            continue;
        }

        let reasons = index.reasons_by_id.get(&id).cloned().unwrap_or_default();
        if reasons.iter().any(|r| index.csf_globs.contains(r)) {
            affected.insert(id.clone(), index.files_of(&id, repo_root, base_dir));
            let mut full_path = trace_path.clone();
            full_path.push(name.clone());
            diagnostics.traced_paths.push(full_path);
        }

        // Keep walking even after a match: one changed file can be imported
        // by multiple independent story files.
        for reason in reasons {
            if index.csf_globs.contains(&reason) {
                continue;
            }
            if matcher.matches_any(&reason, &options.untraced)? {
                diagnostics.untraced_files.push(reason);
                continue;
            }
            let mut next_path = trace_path.clone();
            next_path.push(name.clone());
            stack.push((reason, next_path));
        }
    }

    diagnostics.affected_module_ids = affected.keys().cloned().collect();
    diagnostics.affected_module_ids.sort();
    report(&diagnostics);

    Ok(TraceResult::Traced {
        affected,
        diagnostics,
    })
}

/// Pair each changed input file with the story modules it was found to
/// affect, or note that it affected none (pruned or unreachable).
fn report(diagnostics: &TraceDiagnostics) {
    for file in &diagnostics.traced_files {
        let hits: Vec<&str> = diagnostics
            .traced_paths
            .iter()
            .filter(|path| path.first() == Some(file))
            .filter_map(|path| path.last().map(String::as_str))
            .collect();
        if hits.is_empty() {
            tracing::debug!(file = %file, "changed file does not affect any story files");
        } else {
            tracing::info!(file = %file, affected = ?hits, "changed file affects story files");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_file_detection_uses_basenames() {
        assert!(is_package_file("package.json"));
        assert!(is_package_file("services/web/yarn.lock"));
        assert!(!is_package_file("src/package.json.md"));
    }

    #[test]
    fn dir_prefix_matching_is_component_wise() {
        assert!(in_dir(".storybook/main.js", ".storybook"));
        assert!(in_dir(".storybook", ".storybook"));
        assert!(!in_dir(".storybook-backup/main.js", ".storybook"));
        assert!(!in_dir("anything", ""));
    }

    #[test]
    fn entry_names_follow_the_config_dir() {
        let names = stories_entry_names("config/storybook", "", "/repo");
        assert!(names.contains("config/storybook/generated-stories-entry.js"));
        assert!(names.contains(VIRTUAL_STORIES_ENTRY));
        assert!(names.contains("storybook-stories.js"));
    }
}
