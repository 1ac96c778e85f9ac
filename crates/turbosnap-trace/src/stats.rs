//! Module stats deserialization and dialect normalization.
//!
//! The stats file is produced by an external build and must be treated as
//! untrusted and variable across build-tool versions. Several dialects are
//! tolerated: classic webpack "sync" factory modules, chunked `+ N modules`
//! entries, `lazy recursive` import maps, and vite virtual-module entries.
//! This module smooths the dialects into one shape before the tracer runs,
//! so the traversal has no knowledge of build-tool quirks.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, TraceError};

/// Module identifier as emitted by the build tool: a number, a string, or
/// absent/null for modules the build tool itself injects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum ModuleId {
    Number(i64),
    Text(String),
}

impl ModuleId {
    /// Stable string form used as a map key and in reported results.
    pub fn as_key(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// An `importer → imported` edge, pointing *at* the importer: a reason's
/// `module_name` is something that imports the module carrying the reason.
#[derive(Debug, Clone, Deserialize)]
pub struct Reason {
    #[serde(default, rename = "moduleName")]
    pub module_name: Option<String>,
}

/// A constituent file of a multi-file chunk module.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedModule {
    pub name: String,
}

/// One module entry in the stats file.
#[derive(Debug, Clone, Deserialize)]
pub struct StatsModule {
    /// `None` for build-tool-injected modules (never CSF candidates).
    #[serde(default)]
    pub id: Option<ModuleId>,
    #[serde(default)]
    pub name: String,
    /// Constituent files when several modules are concatenated into one
    /// chunk (`name` then carries a `+ N modules` marker).
    #[serde(default)]
    pub modules: Option<Vec<NamedModule>>,
    /// Reverse-adjacency: modules that import this one.
    #[serde(default)]
    pub reasons: Vec<Reason>,
}

/// The build tool's machine-readable module/import graph. Read-only; the
/// tracer only indexes it.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleStats {
    #[serde(default)]
    pub modules: Vec<StatsModule>,
}

impl ModuleStats {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TraceError::InvalidStats(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

static CHUNK_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.+?) \+ \d+ modules$").expect("chunk marker regex"));

/// Strip the `+ N modules` marker from a chunked module name, leaving the
/// primary file.
pub fn base_chunk_name(name: &str) -> &str {
    match CHUNK_MARKER.captures(name) {
        Some(caps) => caps.name("base").map(|m| m.as_str()).unwrap_or(name),
        None => name,
    }
}

/// Is this a module the user's code contributed, as opposed to webpack
/// runtime/hot-reload machinery?
pub fn is_user_module(module: &StatsModule) -> bool {
    module.id.is_some()
        && !module.name.starts_with("webpack/runtime")
        && !module.name.starts_with("webpack/hot")
        && !module.name.starts_with("(webpack)")
}

/// `node_modules/<scope?>/<name>/...` → bare package name, if the path
/// passes through a node_modules directory.
pub fn node_modules_package(path: &str) -> Option<&str> {
    let idx = path.rfind("node_modules/")?;
    let rest = &path[idx + "node_modules/".len()..];
    let mut segments = rest.split('/');
    let first = segments.next().filter(|s| !s.is_empty())?;
    if first.starts_with('@') {
        let second = segments.next().filter(|s| !s.is_empty())?;
        let len = first.len() + 1 + second.len();
        Some(&rest[..len])
    } else {
        Some(first)
    }
}
