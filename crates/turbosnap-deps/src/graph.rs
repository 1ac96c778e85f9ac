//! Resolved dependency graph and the symmetric baseline diff.
//!
//! One entity per resolved package occurrence, keyed by `(name, version)`;
//! multiple versions of the same name coexist (diamond dependencies). A
//! graph is built fresh from one manifest/lockfile read, never mutated
//! afterwards, and dropped after a single diff.

use rustc_hash::{FxHashMap, FxHashSet};

/// Identity of one resolved package occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
}

impl PackageKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Dependency graph over `(name, version)` occurrences.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: FxHashMap<PackageKey, FxHashSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package occurrence. Idempotent.
    pub fn add_package(&mut self, name: &str, version: &str) {
        self.nodes
            .entry(PackageKey::new(name, version))
            .or_default();
    }

    /// Register a direct dependency edge by name. Self-references are
    /// dropped (lockfiles never encode true cycles, but tooling must
    /// tolerate them).
    pub fn add_dependency(&mut self, name: &str, version: &str, dep_name: &str) {
        let edges = self.nodes.entry(PackageKey::new(name, version)).or_default();
        if dep_name != name {
            edges.insert(dep_name.to_string());
        }
    }

    pub fn package_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn packages(&self) -> impl Iterator<Item = &PackageKey> {
        self.nodes.keys()
    }

    /// Direct dependency names of one occurrence, if present.
    pub fn dependencies_of(&self, name: &str, version: &str) -> Option<&FxHashSet<String>> {
        self.nodes.get(&PackageKey::new(name, version))
    }

    /// Bare names of packages whose presence or version differs between the
    /// two graphs: the symmetric difference of the `(name, version)` node
    /// sets, projected to names. Covers added, removed, and version-changed
    /// packages; symmetric in its arguments; empty for identical graphs.
    pub fn changed_package_names(&self, other: &Self) -> FxHashSet<String> {
        let mut changed = FxHashSet::default();
        for key in self.nodes.keys() {
            if !other.nodes.contains_key(key) {
                changed.insert(key.name.clone());
            }
        }
        for key in other.nodes.keys() {
            if !self.nodes.contains_key(key) {
                changed.insert(key.name.clone());
            }
        }
        changed
    }
}
