//! Canonical POSIX path normalization.
//!
//! Build tools emit module names in several shapes: repo-relative
//! (`./src/foo.js`), absolute (`/home/ci/repo/src/foo.js`), decorated with
//! query strings (`./src/foo.css?used`), or virtual (`/virtual:/...`). Git
//! reports repo-relative POSIX paths. [`normalize`] reconciles all of them
//! into one canonical form: POSIX, relative to the repository root.
//!
//! The mapping is total and deterministic. It is deliberately not
//! injective: several raw names collapsing onto one normalized name is
//! exactly how multi-file chunk modules are represented.

use std::path::Path;

use path_clean::clean;

/// Marker prefix for virtual modules (vite builder). A virtual module has
/// no filesystem counterpart, so its name passes through unchanged.
pub const VIRTUAL_MODULE_PREFIX: &str = "/virtual:";

/// Convert backslashes to forward slashes.
pub fn posix(path: &str) -> String {
    path.replace('\\', "/")
}

/// Webpack context modules ("generated glob" modules) carry regex-like
/// syntax in their names, e.g. `./src sync ^\.\/.*\.stories\.js$`.
/// Query-string stripping must not mangle these.
fn is_generated_glob(name: &str) -> bool {
    name.contains(" sync ") || name.contains(" lazy ")
}

fn strip_query(name: &str) -> &str {
    match name.find('?') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Lexically clean a POSIX path (resolve `.` and `..`, drop `./` prefixes).
fn clean_posix(path: &str) -> String {
    posix(&clean(Path::new(path)).to_string_lossy())
}

/// Make `path` relative to `root`, both POSIX-absolute.
fn relative_to(root: &str, path: &str) -> String {
    let root = clean_posix(root);
    let path = clean_posix(path);
    let root_parts: Vec<&str> = root.split('/').filter(|c| !c.is_empty()).collect();
    let path_parts: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();

    let common = root_parts
        .iter()
        .zip(path_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..root_parts.len() {
        parts.push("..");
    }
    parts.extend(&path_parts[common..]);
    parts.join("/")
}

/// Normalize a raw module name to a canonical repo-relative POSIX path.
///
/// Rules, in order:
/// 1. a virtual-module name passes through unchanged;
/// 2. query-string decorations are stripped, unless the name is a generated
///    glob module whose syntax legitimately contains `?`;
/// 3. an absolute path is made relative to `repo_root`;
/// 4. a relative path is joined under `base_dir` (the directory, relative
///    to the repo root, from which the build tool was invoked).
pub fn normalize(raw: &str, repo_root: &str, base_dir: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    if raw.starts_with(VIRTUAL_MODULE_PREFIX) {
        return raw.to_string();
    }

    let base = posix(base_dir);
    let base = base.trim_matches('/');

    // Generated glob modules keep their regex-like syntax intact: no query
    // stripping, no separator conversion, no lexical cleaning.
    if is_generated_glob(raw) {
        let trimmed = raw.strip_prefix("./").unwrap_or(raw);
        return if base.is_empty() {
            trimmed.to_string()
        } else {
            format!("{base}/{trimmed}")
        };
    }

    let name = posix(strip_query(raw));
    if name.starts_with('/') {
        relative_to(&posix(repo_root), &name)
    } else if base.is_empty() {
        clean_posix(&name)
    } else {
        clean_posix(&format!("{base}/{name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn relative_names_join_under_base_dir() {
        assert_eq!(normalize("./src/foo.js", "/repo", ""), "src/foo.js");
        assert_eq!(
            normalize("./src/foo.js", "/repo", "services/web"),
            "services/web/src/foo.js"
        );
        assert_eq!(
            normalize("../shared/util.js", "/repo", "services/web"),
            "services/shared/util.js"
        );
    }

    #[test]
    fn absolute_names_become_repo_relative() {
        assert_eq!(
            normalize("/repo/src/foo.js", "/repo", "services/web"),
            "src/foo.js"
        );
        assert_eq!(normalize("/elsewhere/x.js", "/repo", ""), "../elsewhere/x.js");
    }

    #[test]
    fn windows_separators_are_posixified() {
        assert_eq!(normalize(".\\src\\foo.js", "C:\\repo", ""), "src/foo.js");
    }

    #[test]
    fn query_strings_are_stripped() {
        assert_eq!(normalize("./src/foo.css?used", "/repo", ""), "src/foo.css");
        assert_eq!(
            normalize("./src/foo.svg?raw&inline", "/repo", ""),
            "src/foo.svg"
        );
    }

    #[test]
    fn generated_glob_names_keep_their_syntax() {
        let glob = r"./src sync ^\.\/.*\.stories\.js$";
        assert_eq!(normalize(glob, "/repo", ""), glob.trim_start_matches("./"));

        let lazy = r"./src lazy recursive ^\.\/.*\.stories\.js$";
        assert!(normalize(lazy, "/repo", "").contains("lazy recursive"));
    }

    #[test]
    fn virtual_modules_pass_through() {
        let name = "/virtual:/@storybook/builder-vite/vite-app.js";
        assert_eq!(normalize(name, "/repo", "services/web"), name);
    }

    #[test]
    fn multi_module_chunk_names_can_collide() {
        // Two raw spellings of the same file normalize identically.
        assert_eq!(
            normalize("./src/foo.js", "/repo", ""),
            normalize("/repo/src/foo.js", "/repo", "")
        );
    }

    proptest! {
        #[test]
        fn normalize_is_total_and_deterministic(
            raw in "\\PC{0,64}",
            base in "[a-z/]{0,16}",
        ) {
            let first = normalize(&raw, "/repo", &base);
            let second = normalize(&raw, "/repo", &base);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn normalize_never_emits_dot_slash_prefix(raw in "\\PC{0,64}") {
            prop_assert!(!normalize(&raw, "/repo", "").starts_with("./"));
        }
    }
}
