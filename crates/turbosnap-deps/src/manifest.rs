//! Package manifest (`package.json`) parsing and dependency-field
//! comparison.
//!
//! Only dependency-relevant fields are semantically meaningful to this
//! subsystem. The typed [`PackageManifest`] carries the version maps the
//! graph loader needs; the shallow comparator works on raw
//! [`serde_json::Value`] trees restricted to [`DEPENDENCY_FIELDS`].

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DepsError, Result};

/// Maximum allowed size for package.json files (10MB).
pub const MAX_MANIFEST_SIZE: u64 = 10 * 1024 * 1024;

/// Top-level manifest fields that can change the resolved dependency set.
/// Everything else (scripts, version, name, license, ...) is ignored by the
/// shallow comparator.
pub const DEPENDENCY_FIELDS: [&str; 10] = [
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
    "resolutions",
    "overrides",
    "dependenciesMeta",
    "peerDependenciesMeta",
    "pnpm",
    "packageManager",
];

/// Parsed package.json, restricted to what the graph loader needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: HashMap<String, String>,
    #[serde(default, rename = "optionalDependencies")]
    pub optional_dependencies: HashMap<String, String>,
}

impl PackageManifest {
    /// Parse manifest text.
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| DepsError::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read and parse a manifest from disk, enforcing the size guard.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if metadata.len() > MAX_MANIFEST_SIZE {
            return Err(DepsError::InvalidManifest {
                path: path.to_path_buf(),
                reason: format!("exceeds maximum size of {}MB", MAX_MANIFEST_SIZE / 1024 / 1024),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(path, &contents)
    }

    /// Names of all directly declared dependencies, dev and optional
    /// included.
    pub fn declared_dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .chain(self.optional_dependencies.keys())
            .map(String::as_str)
    }
}

/// Compare two manifest JSON trees on [`DEPENDENCY_FIELDS`] only.
///
/// Comparison is recursive and order-independent (object keys are sorted
/// before comparison). Fields absent on both sides compare equal.
pub fn dependency_fields_equal(a: &Value, b: &Value) -> bool {
    DEPENDENCY_FIELDS.iter().all(|field| {
        canonical_eq(
            a.get(field).unwrap_or(&Value::Null),
            b.get(field).unwrap_or(&Value::Null),
        )
    })
}

fn canonical_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            let mut a_keys: Vec<&String> = a.keys().collect();
            let mut b_keys: Vec<&String> = b.keys().collect();
            a_keys.sort();
            b_keys.sort();
            a_keys == b_keys && a_keys.iter().all(|k| canonical_eq(&a[*k], &b[*k]))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| canonical_eq(x, y))
        }
        _ => a == b,
    }
}
