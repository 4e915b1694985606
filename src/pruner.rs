//! Removal of empty directories, deepest first.
//!
//! Pruning is best effort: a directory that cannot be inspected or removed is
//! recorded and logged, and the pass moves on. The root itself and the
//! metadata directory are never candidates.

use crate::walker::{DEFAULT_METADATA_DIR, TreeWalker};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A directory the pruner could not handle, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one or more prune passes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    /// Removed directories, in removal order.
    pub removed: Vec<PathBuf>,
    pub failures: Vec<PruneFailure>,
    /// Number of passes that were run.
    pub passes: usize,
}

impl PruneReport {
    fn absorb(&mut self, other: PruneReport) {
        self.removed.extend(other.removed);
        self.failures.extend(other.failures);
        self.passes += other.passes;
    }
}

/// Checks whether a directory has no entries.
///
/// Reads at most one entry. A directory that no longer exists counts as not
/// empty, so callers simply leave it alone.
pub fn is_directory_empty(path: &Path) -> io::Result<bool> {
    let mut entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    match entries.next() {
        None => Ok(true),
        Some(Ok(_)) => Ok(false),
        Some(Err(e)) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Some(Err(e)) => Err(e),
    }
}

/// Removes empty directories under a root.
#[derive(Debug, Clone)]
pub struct EmptyDirectoryPruner {
    metadata_dir: String,
}

impl EmptyDirectoryPruner {
    pub fn new() -> Self {
        Self {
            metadata_dir: DEFAULT_METADATA_DIR.to_string(),
        }
    }

    pub fn skipping(mut self, metadata_dir: impl Into<String>) -> Self {
        self.metadata_dir = metadata_dir.into();
        self
    }

    fn walker(&self, root: &Path) -> TreeWalker {
        TreeWalker::new(root).skipping(self.metadata_dir.as_str())
    }

    /// Runs exactly one pass.
    ///
    /// Directories are listed up front and visited in reverse discovery
    /// order, so children are checked before their parents and a chain of
    /// nested empty directories collapses within the pass.
    pub fn prune_once(&self, root: &Path) -> PruneReport {
        let mut report = PruneReport {
            passes: 1,
            ..Default::default()
        };

        let (dirs, walk_errors) = self.walker(root).directories_lenient();
        for error in walk_errors {
            if error.is_not_found() {
                continue;
            }
            warn!(%error, "skipping unreadable entry");
            report.failures.push(PruneFailure {
                path: error.path.clone(),
                reason: error.to_string(),
            });
        }

        for dir in dirs.into_iter().rev() {
            match is_directory_empty(&dir) {
                Ok(true) => match fs::remove_dir(&dir) {
                    Ok(()) => {
                        debug!(path = %dir.display(), "removed empty directory");
                        report.removed.push(dir);
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "failed to remove directory");
                        report.failures.push(PruneFailure {
                            path: dir,
                            reason: e.to_string(),
                        });
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "failed to inspect directory");
                    report.failures.push(PruneFailure {
                        path: dir,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Repeats passes until one removes nothing, running at most
    /// `max_passes` (and at least one).
    pub fn prune_until_settled(&self, root: &Path, max_passes: usize) -> PruneReport {
        let mut total = PruneReport::default();
        for _ in 0..max_passes.max(1) {
            let pass = self.prune_once(root);
            let removed_any = !pass.removed.is_empty();
            total.absorb(pass);
            if !removed_any {
                break;
            }
        }
        total
    }

    /// Lists directories that are empty right now, without removing them.
    pub fn empty_directories(&self, root: &Path) -> Vec<PathBuf> {
        let (dirs, _) = self.walker(root).directories_lenient();
        dirs.into_iter()
            .filter(|dir| matches!(is_directory_empty(dir), Ok(true)))
            .collect()
    }
}

impl Default for EmptyDirectoryPruner {
    fn default() -> Self {
        Self::new()
    }
}
