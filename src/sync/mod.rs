//! Bulk tree copy used at the start of every preview switch.
//!
//! Copies the feature workspace's exact working tree (committed and
//! uncommitted state alike) into the base tree, overwriting files in
//! place. Version-control metadata and dependency directories are skipped;
//! per-file gitignore filtering is left to the live watcher, a full copy
//! here is intentional.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::Result;

/// Directories never copied into the preview tree.
const SKIP_DIRS: [&str; 5] = [".git", "node_modules", "target", "__pycache__", ".venv"];

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIP_DIRS.contains(&name))
            .unwrap_or(false)
}

/// Recursively copy every file under `source` into `target`, creating
/// directories as needed and overwriting existing files. Returns the
/// number of files copied.
pub fn copy_tree(source: &Path, target: &Path) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(source)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                eprintln!("stand: skipping unreadable entry: {}", e);
                continue;
            }
        };

        let relative = match entry.path().strip_prefix(source) {
            Ok(r) if !r.as_os_str().is_empty() => r,
            _ => continue,
        };
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &destination)?;
            copied += 1;
        }
        // Symlinks are not followed; the preview tree only needs regular files.
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copies_nested_files_and_overwrites() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();

        fs::create_dir_all(source.path().join("backend/src")).unwrap();
        fs::write(source.path().join("backend/src/main.py"), "print(2)").unwrap();
        fs::write(source.path().join("README.md"), "new").unwrap();
        fs::write(target.path().join("README.md"), "old").unwrap();

        let copied = copy_tree(source.path(), target.path()).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(target.path().join("backend/src/main.py")).unwrap(),
            "print(2)"
        );
        assert_eq!(
            fs::read_to_string(target.path().join("README.md")).unwrap(),
            "new"
        );
    }

    #[test]
    fn test_skips_vcs_and_dependency_dirs() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();

        for dir in ["backend/.git", "node_modules/pkg", "backend/__pycache__"] {
            fs::create_dir_all(source.path().join(dir)).unwrap();
        }
        fs::write(source.path().join("backend/.git/HEAD"), "ref").unwrap();
        fs::write(source.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(source.path().join("backend/app.py"), "ok").unwrap();

        copy_tree(source.path(), target.path()).unwrap();

        assert!(target.path().join("backend/app.py").exists());
        assert!(!target.path().join("backend/.git").exists());
        assert!(!target.path().join("node_modules").exists());
    }

    #[test]
    fn test_rerun_with_no_changes_is_idempotent() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();

        fs::write(source.path().join("a.txt"), "same").unwrap();
        let first = copy_tree(source.path(), target.path()).unwrap();
        let second = copy_tree(source.path(), target.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(target.path().join("a.txt")).unwrap(), "same");
    }
}
