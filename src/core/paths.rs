//! Shared path manipulation utilities.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Directory names that mark a repository root (and are excluded from scans).
pub const VCS_DIR_NAMES: &[&str] = &[".git", ".hg", ".svn", ".jj"];

/// Resolve a path to an absolute, normalized path.
///
/// If `fs::canonicalize` succeeds (path exists), it is used to resolve symlinks
/// and normalize components.
///
/// If it fails (e.g. path does not exist), the path is made absolute relative
/// to CWD and `..`/`.` components are resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

/// Locate the repository root for `start`: the nearest ancestor (including
/// `start` itself) that contains version-control metadata. Falls back to
/// `start` when no marker is found, so the guard still scans something
/// sensible outside a checkout.
pub fn find_repo_root(start: &Path) -> PathBuf {
    let start = resolve_absolute_path(start);
    let mut current: &Path = &start;
    loop {
        if VCS_DIR_NAMES.iter().any(|name| current.join(name).is_dir()) {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return start,
        }
    }
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_existing_path_canonically() {
        let cwd = env::current_dir().unwrap();
        let resolved = resolve_absolute_path(Path::new("."));
        assert_eq!(resolved, std::fs::canonicalize(&cwd).unwrap());
    }

    #[test]
    fn normalizes_nonexistent_path_syntactically() {
        // /nonexistent/foo/../bar -> /nonexistent/bar
        #[cfg(unix)]
        let root = Path::new("/");
        #[cfg(windows)]
        let root = Path::new("C:");

        let input = root.join("nonexistent").join("foo").join("..").join("bar");
        let expected = root.join("nonexistent").join("bar");

        assert!(std::fs::canonicalize(&input).is_err());

        let resolved = resolve_absolute_path(&input);
        assert_eq!(resolved, expected);
    }

    #[test]
    fn handles_parent_at_root() {
        #[cfg(unix)]
        {
            let input = Path::new("/../foo");
            let resolved = normalize_syntactic(input);
            assert_eq!(resolved, Path::new("/foo"));
        }
    }

    #[test]
    fn repo_root_found_from_nested_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();

        let found = find_repo_root(&nested);
        assert_eq!(found, resolve_absolute_path(&root));
    }

    #[test]
    fn repo_root_falls_back_to_start() {
        let tmp = tempfile::tempdir().unwrap();
        let plain = tmp.path().join("plain");
        std::fs::create_dir_all(&plain).unwrap();

        let found = find_repo_root(&plain);
        assert_eq!(found, resolve_absolute_path(&plain));
    }
}
