use glob::Pattern;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::error;
use walkdir::WalkDir;

/// Recordings under `root` with the given extension, sorted by path.
/// Shallow unless `recursive`. Symlinks are not followed and paths matching
/// any ignore glob are skipped.
pub fn discover_recordings(
    root: &Path,
    extension: &str,
    recursive: bool,
    ignore_globs: &[String],
) -> io::Result<Vec<PathBuf>> {
    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut found = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(entry.path()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if err.io_error().map(|e| e.kind()) == Some(io::ErrorKind::PermissionDenied) {
                    error!("Access denied: {}", err);
                    continue;
                }
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("Error walking {}: {}", root.display(), err),
                ));
            }
        };

        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|e| e == extension)
        {
            found.push(entry.into_path());
        }
    }

    found.sort();
    Ok(found)
}

/// Whether `path` lies inside a `completed_dir` directory below `root`.
pub fn is_in_completed_dir(path: &Path, root: &Path, completed_dir: &str) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let Some(parent) = relative.parent() else {
        return false;
    };
    parent
        .components()
        .any(|c| matches!(c, Component::Normal(part) if part == completed_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_shallow_and_recursive_discovery() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("a.bag"));
        touch(&root.join("notes.txt"));
        touch(&root.join("shadow/b.bag"));
        touch(&root.join("shadow/uploaded/c.bag"));

        let shallow = discover_recordings(root, "bag", false, &[]).unwrap();
        assert_eq!(shallow, vec![root.join("a.bag")]);

        let deep = discover_recordings(root, "bag", true, &[]).unwrap();
        assert_eq!(
            deep,
            vec![
                root.join("a.bag"),
                root.join("shadow/b.bag"),
                root.join("shadow/uploaded/c.bag"),
            ]
        );
    }

    #[test]
    fn test_ignore_patterns() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("keep/a.bag"));
        touch(&root.join("scratch/b.bag"));

        let ignore = vec![format!("{}/scratch", root.display())];
        let found = discover_recordings(root, "bag", true, &ignore).unwrap();
        assert_eq!(found, vec![root.join("keep/a.bag")]);
    }

    #[test]
    fn test_completed_dir_detection_is_relative_to_root() {
        let root = Path::new("/data/uploaded/run");
        assert!(!is_in_completed_dir(
            Path::new("/data/uploaded/run/a.bag"),
            root,
            "uploaded"
        ));
        assert!(is_in_completed_dir(
            Path::new("/data/uploaded/run/shadow/uploaded/a.bag"),
            root,
            "uploaded"
        ));
        assert!(!is_in_completed_dir(
            Path::new("/data/uploaded/run/uploaded"),
            root,
            "uploaded"
        ));
    }
}
