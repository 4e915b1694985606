//! Depth-first traversal of a project tree.
//!
//! The walker never yields the root itself and never descends into the
//! version-control metadata directory. Callers that mutate the tree take a
//! [`TreeWalker::snapshot`] first and work from that list.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Conventional name of the git metadata directory.
pub const DEFAULT_METADATA_DIR: &str = ".git";

/// Whether an entry is a directory or something to be relocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular files and symlinks (links are not followed).
    File,
    Directory,
}

/// A path discovered during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl FsEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// An entry that could not be read mid-walk.
#[derive(Debug, Error)]
#[error("failed to read {}: {source}", .path.display())]
pub struct WalkError {
    pub path: PathBuf,
    #[source]
    pub source: walkdir::Error,
}

impl WalkError {
    fn new(root: &Path, source: walkdir::Error) -> Self {
        let path = source
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        Self { path, source }
    }

    /// True when the entry disappeared between listing and reading.
    pub fn is_not_found(&self) -> bool {
        self.source
            .io_error()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type WalkResult<T> = Result<T, WalkError>;

/// Walks a directory tree, skipping the metadata directory.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: PathBuf,
    skip_name: OsString,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            skip_name: OsString::from(DEFAULT_METADATA_DIR),
        }
    }

    /// Overrides the name of the directory that is never visited.
    pub fn skipping(mut self, name: impl Into<OsString>) -> Self {
        self.skip_name = name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily yields every entry below the root in depth-first pre-order.
    ///
    /// Siblings come in file-name order. An unreadable entry is yielded as an
    /// `Err` and the walk continues with the next one.
    pub fn entries(&self) -> impl Iterator<Item = WalkResult<FsEntry>> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != self.skip_name.as_os_str())
            .map(|entry| match entry {
                Ok(entry) => {
                    let kind = if entry.file_type().is_dir() {
                        EntryKind::Directory
                    } else {
                        EntryKind::File
                    };
                    debug!(path = %entry.path().display(), ?kind, "visited");
                    Ok(FsEntry {
                        path: entry.into_path(),
                        kind,
                    })
                }
                Err(e) => Err(WalkError::new(&self.root, e)),
            })
    }

    /// Collects the whole tree up front, failing on the first unreadable entry.
    pub fn snapshot(&self) -> WalkResult<Vec<FsEntry>> {
        self.entries().collect()
    }

    /// Collects every directory, in discovery order, plus the errors met on
    /// the way. Used where the caller logs failures instead of aborting.
    pub fn directories_lenient(&self) -> (Vec<PathBuf>, Vec<WalkError>) {
        let mut dirs = Vec::new();
        let mut errors = Vec::new();
        for entry in self.entries() {
            match entry {
                Ok(entry) if entry.is_dir() => dirs.push(entry.path),
                Ok(_) => {}
                Err(e) => errors.push(e),
            }
        }
        (dirs, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn relative(root: &Path, entries: &[FsEntry]) -> Vec<(String, EntryKind)> {
        entries
            .iter()
            .map(|e| {
                let rel = e.path.strip_prefix(root).expect("entry outside root");
                (rel.to_string_lossy().replace('\\', "/"), e.kind)
            })
            .collect()
    }

    #[test]
    fn test_walk_excludes_root_and_orders_depth_first() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("b/inner")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b/inner/c.py"), "c").unwrap();

        let entries = TreeWalker::new(root).snapshot().expect("walk failed");
        assert_eq!(
            relative(root, &entries),
            vec![
                ("a.txt".to_string(), EntryKind::File),
                ("b".to_string(), EntryKind::Directory),
                ("b/inner".to_string(), EntryKind::Directory),
                ("b/inner/c.py".to_string(), EntryKind::File),
            ]
        );
    }

    #[test]
    fn test_walk_skips_metadata_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::write(root.join(".git/config.pdf"), "x").unwrap();
        fs::write(root.join("keep.md"), "x").unwrap();

        let entries = TreeWalker::new(root).snapshot().expect("walk failed");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].path.ends_with("keep.md"));
    }

    #[test]
    fn test_walk_custom_metadata_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".hg")).unwrap();
        fs::write(root.join(".hg/store.txt"), "x").unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();

        let entries = TreeWalker::new(root).skipping(".hg").snapshot().unwrap();
        let names = relative(root, &entries);
        assert_eq!(names, vec![(".git".to_string(), EntryKind::Directory)]);
    }

    #[test]
    fn test_walk_missing_root_reports_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let missing = temp_dir.path().join("gone");

        let result = TreeWalker::new(&missing).snapshot();
        let err = result.expect_err("walk of a missing root should fail");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_directories_lenient() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("x/y")).unwrap();
        fs::write(root.join("x/file.txt"), "x").unwrap();

        let (dirs, errors) = TreeWalker::new(root).directories_lenient();
        assert!(errors.is_empty());
        assert_eq!(dirs, vec![root.join("x"), root.join("x/y")]);
    }
}
