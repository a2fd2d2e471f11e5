//! Path scoping for file tools and process working directories.
//!
//! Paths are resolved before they are compared: existing paths are
//! canonicalized (symlinks followed), paths that do not exist yet are
//! resolved through their nearest existing ancestor, and any remaining
//! `.`/`..` components are folded lexically. Comparison is per component,
//! so `/work/app` does not admit `/work/app2`.

use std::path::{Component, Path, PathBuf};

use rivet_config::SecurityConfig;

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside allowed roots")]
    OutsideAllowedRoots { path: String },

    #[error("Path '{path}' matches forbidden pattern '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },
}

/// Allowed roots and forbidden prefixes for filesystem access.
#[derive(Debug, Clone, Default)]
pub struct PathPolicy {
    allowed_roots: Vec<(String, PathBuf)>,
    forbidden_paths: Vec<(String, PathBuf)>,
}

impl PathPolicy {
    /// Empty `allowed_roots` admits any path not forbidden.
    pub fn new(allowed_roots: &[String], forbidden_paths: &[String]) -> Self {
        let expand = |list: &[String]| {
            list.iter()
                .map(|raw| (raw.clone(), resolve(Path::new(&expand_tilde(raw)))))
                .collect::<Vec<_>>()
        };
        Self {
            allowed_roots: expand(allowed_roots),
            forbidden_paths: expand(forbidden_paths),
        }
    }

    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// A policy admitting only `root` and what lies beneath it.
    pub fn scoped_to(root: &Path) -> Self {
        Self {
            allowed_roots: vec![(root.display().to_string(), resolve(root))],
            forbidden_paths: Vec::new(),
        }
    }

    /// Validate `path` and return its resolved form.
    ///
    /// Forbidden prefixes win over allowed roots.
    pub fn check(&self, path: &Path) -> Result<PathBuf, PathValidationError> {
        let resolved = resolve(path);

        if let Some((pattern, _)) = self
            .forbidden_paths
            .iter()
            .find(|(_, prefix)| resolved.starts_with(prefix))
        {
            return Err(PathValidationError::ForbiddenPath {
                path: path.display().to_string(),
                pattern: pattern.clone(),
            });
        }

        if !self.allowed_roots.is_empty()
            && !self
                .allowed_roots
                .iter()
                .any(|(_, root)| resolved.starts_with(root))
        {
            return Err(PathValidationError::OutsideAllowedRoots {
                path: path.display().to_string(),
            });
        }

        Ok(resolved)
    }
}

impl From<&SecurityConfig> for PathPolicy {
    fn from(config: &SecurityConfig) -> Self {
        Self::new(&config.allowed_roots, &config.forbidden_paths)
    }
}

/// Resolve a path to an absolute form without requiring it to exist.
pub fn resolve(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let normalized = lexical_normalize(&absolute);

    // canonicalize the deepest existing ancestor, re-attach the rest
    let mut existing = normalized.as_path();
    let mut tail = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return tail.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
            break;
        };
        tail.push(name.to_os_string());
        existing = parent;
    }
    normalized
}

/// Fold `.` and `..` components without touching the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                // never pop past the root
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Expand ~ to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if (path.starts_with("~/") || path == "~")
        && let Some(home) = home_dir()
    {
        return path.replacen('~', &home, 1);
    }
    path.to_string()
}

fn home_dir() -> Option<String> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok()
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_allows_any_path() {
        let policy = PathPolicy::unrestricted();
        assert!(policy.check(Path::new("/any/path/file.txt")).is_ok());
    }

    #[test]
    fn lexical_normalize_folds_dots() {
        assert_eq!(
            lexical_normalize(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(lexical_normalize(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn allowed_roots_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let policy = PathPolicy::scoped_to(dir.path());

        assert!(policy.check(&dir.path().join("src/main.rs")).is_ok());
        let escaped = dir.path().join("../../etc/passwd");
        match policy.check(&escaped).unwrap_err() {
            PathValidationError::OutsideAllowedRoots { .. } => {}
            other => panic!("Expected OutsideAllowedRoots, got: {other}"),
        }
    }

    #[test]
    fn sibling_with_common_prefix_is_outside() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        std::fs::create_dir(&root).unwrap();
        let policy = PathPolicy::scoped_to(&root);
        assert!(policy.check(&dir.path().join("app2/file")).is_err());
    }

    #[test]
    fn forbidden_takes_precedence_over_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().display().to_string();
        let secret = dir.path().join(".ssh").display().to_string();
        let policy = PathPolicy::new(&[root], &[secret.clone()]);

        match policy.check(&dir.path().join(".ssh/id_rsa")).unwrap_err() {
            PathValidationError::ForbiddenPath { pattern, .. } => assert_eq!(pattern, secret),
            other => panic!("Expected ForbiddenPath, got: {other}"),
        }
        assert!(policy.check(&dir.path().join("notes.txt")).is_ok());
    }

    #[test]
    fn resolve_handles_missing_tail() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        let resolved = resolve(&dir.path().join("new/dir/../file.txt"));
        assert_eq!(resolved, canonical.join("new/file.txt"));
    }

    #[test]
    fn forbidden_with_tilde_expansion() {
        if let Some(home) = home_dir() {
            let policy = PathPolicy::new(&[], &["~/.ssh".into()]);
            let key = Path::new(&home).join(".ssh/id_rsa");
            assert!(policy.check(&key).is_err());
        }
    }
}
