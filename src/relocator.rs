//! Moving loose files into their classified destination folders.
//!
//! Destinations are always resolved against the walk root, so files found
//! in nested folders bubble up into the top-level buckets. The tree is
//! snapshotted before the first move; files created by the relocation itself
//! are never revisited in the same pass.

use crate::classifier::Profile;
use crate::config::CompiledFilters;
use crate::walker::{DEFAULT_METADATA_DIR, TreeWalker, WalkError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// What to do when a file with the same name already sits at the destination.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Keep both: the incoming file gets a `_1`, `_2`, ... suffix.
    #[default]
    Rename,
    /// Replace the existing file.
    Overwrite,
    /// Abort the relocation pass.
    Fail,
}

/// A move computed from the snapshot but not yet performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    /// Intended final path of the file, before collision handling.
    pub destination: PathBuf,
    /// Top-level folder the file lands in (e.g. `src`).
    pub bucket: String,
    /// The file gets a subfolder named after its stem (`src/<stem>/`).
    pub own_folder: bool,
}

/// The planned moves for one tree, plus what was left alone.
#[derive(Debug, Clone, Default)]
pub struct RelocationPlan {
    pub moves: Vec<PlannedMove>,
    /// Files already at their destination.
    pub unchanged: usize,
    /// Files rejected by the configured filters.
    pub excluded: usize,
}

/// Represents a single performed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relocation {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub bucket: String,
}

/// Outcome of a relocation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelocationReport {
    pub moved: Vec<Relocation>,
    pub unchanged: usize,
    pub excluded: usize,
}

impl RelocationReport {
    /// Number of moved files per bucket, sorted by bucket name.
    pub fn bucket_counts(&self) -> BTreeMap<String, usize> {
        count_by_bucket(&self.moved)
    }
}

/// Tallies moves per bucket, sorted by bucket name.
pub fn count_by_bucket(moves: &[Relocation]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for relocation in moves {
        *counts.entry(relocation.bucket.clone()).or_insert(0) += 1;
    }
    counts
}

/// Errors that abort a relocation pass.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// The base directory path is invalid or doesn't exist.
    #[error("Invalid base path {}: {source}", .path.display())]
    InvalidBasePath {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Walk(#[from] WalkError),
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot move {} to {}: destination already exists", .from.display(), .to.display())]
    DestinationExists { from: PathBuf, to: PathBuf },
    #[error("Path has no file name component: {}", .0.display())]
    NoFileName(PathBuf),
}

/// Result type for relocation operations.
pub type RelocateResult<T> = Result<T, RelocateError>;

/// Applies a classification profile to every file under a root.
#[derive(Debug)]
pub struct FileRelocator {
    profile: Profile,
    filters: Option<CompiledFilters>,
    collision: CollisionPolicy,
    metadata_dir: String,
}

impl FileRelocator {
    /// Creates a relocator that moves every file and renames on collision.
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            filters: None,
            collision: CollisionPolicy::default(),
            metadata_dir: DEFAULT_METADATA_DIR.to_string(),
        }
    }

    /// Only relocate files accepted by `filters`.
    pub fn with_filters(mut self, filters: CompiledFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_collision(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }

    /// Name of the metadata directory the walk must skip.
    pub fn skipping(mut self, metadata_dir: impl Into<String>) -> Self {
        self.metadata_dir = metadata_dir.into();
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn collision(&self) -> CollisionPolicy {
        self.collision
    }

    /// Computes where every file under `root` belongs, without touching disk.
    ///
    /// Fails on the first entry that cannot be read.
    pub fn plan(&self, root: &Path) -> RelocateResult<RelocationPlan> {
        ensure_base_path(root)?;

        let snapshot = TreeWalker::new(root)
            .skipping(self.metadata_dir.as_str())
            .snapshot()?;

        let mut plan = RelocationPlan::default();
        for entry in snapshot.into_iter().filter(|e| e.is_file()) {
            let relative = entry.path.strip_prefix(root).unwrap_or(&entry.path);

            if let Some(filters) = &self.filters
                && !filters.should_include(relative)
            {
                debug!(path = %relative.display(), "excluded by filters");
                plan.excluded += 1;
                continue;
            }

            let file_name = entry
                .path
                .file_name()
                .ok_or_else(|| RelocateError::NoFileName(entry.path.clone()))?;
            let dest_dir = self.profile.classify_path(&entry.path);
            let destination = root.join(&dest_dir).join(file_name);

            if destination == entry.path {
                debug!(path = %relative.display(), "already in place");
                plan.unchanged += 1;
                continue;
            }

            let own_folder = self.profile.gives_own_folder(&entry.path);
            plan.moves.push(PlannedMove {
                source: entry.path,
                destination,
                bucket: bucket_name(&dest_dir),
                own_folder,
            });
        }

        Ok(plan)
    }

    /// Performs a plan, calling `on_move` after each successful move.
    ///
    /// The first failure aborts the pass; files already moved stay moved.
    pub fn apply<F>(
        &self,
        root: &Path,
        plan: &RelocationPlan,
        mut on_move: F,
    ) -> RelocateResult<RelocationReport>
    where
        F: FnMut(&Relocation),
    {
        ensure_base_path(root)?;

        let mut report = RelocationReport {
            moved: Vec::with_capacity(plan.moves.len()),
            unchanged: plan.unchanged,
            excluded: plan.excluded,
        };

        for planned in &plan.moves {
            let relocation = Self::move_file(planned, self.collision)?;
            info!(
                from = %relocation.original_path.display(),
                to = %relocation.new_path.display(),
                "moved"
            );
            on_move(&relocation);
            report.moved.push(relocation);
        }

        Ok(report)
    }

    /// Plans and applies in one go.
    pub fn relocate(&self, root: &Path) -> RelocateResult<RelocationReport> {
        let plan = self.plan(root)?;
        self.apply(root, &plan, |_| {})
    }

    /// Moves a single file to its planned destination.
    ///
    /// The destination folder is created (with parents) if it doesn't exist.
    /// Returns the performed move with the final path after collision handling.
    /// A renamed file that lives in its own stem folder gets a renamed folder
    /// too (`src/b_1/b_1.py`), so a later run classifies it in place.
    pub fn move_file(planned: &PlannedMove, collision: CollisionPolicy) -> RelocateResult<Relocation> {
        let new_path = if is_occupied(&planned.destination) {
            match collision {
                CollisionPolicy::Overwrite => planned.destination.clone(),
                CollisionPolicy::Rename if planned.own_folder => {
                    unique_stem_folder(&planned.destination)
                }
                CollisionPolicy::Rename => unique_destination(&planned.destination),
                CollisionPolicy::Fail => {
                    return Err(RelocateError::DestinationExists {
                        from: planned.source.clone(),
                        to: planned.destination.clone(),
                    });
                }
            }
        } else {
            planned.destination.clone()
        };

        let dest_dir = new_path
            .parent()
            .ok_or_else(|| RelocateError::NoFileName(new_path.clone()))?;
        if !dest_dir.is_dir() {
            fs::create_dir_all(dest_dir).map_err(|e| RelocateError::DirectoryCreationFailed {
                path: dest_dir.to_path_buf(),
                source: e,
            })?;
        }

        fs::rename(&planned.source, &new_path).map_err(|e| RelocateError::FileMoveFailure {
            from: planned.source.clone(),
            to: new_path.clone(),
            source: e,
        })?;

        Ok(Relocation {
            original_path: planned.source.clone(),
            new_path,
            bucket: planned.bucket.clone(),
        })
    }
}

fn ensure_base_path(root: &Path) -> RelocateResult<()> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(RelocateError::InvalidBasePath {
            path: root.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "base path is not a directory",
            ),
        }),
        Err(e) => Err(RelocateError::InvalidBasePath {
            path: root.to_path_buf(),
            source: e,
        }),
    }
}

fn bucket_name(dest_dir: &Path) -> String {
    dest_dir
        .components()
        .find_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .unwrap_or_else(|| dest_dir.to_string_lossy().into_owned())
}

/// Existence check that also sees dangling symlinks.
fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// First free `stem_N.ext` next to `destination`.
///
/// Example: `doc/notes.md` becomes `doc/notes_1.md`, then `doc/notes_2.md`.
fn unique_destination(destination: &Path) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let ext = destination
        .extension()
        .map(|e| e.to_string_lossy().into_owned());

    let mut counter = 1usize;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        let candidate = destination.with_file_name(name);
        if !is_occupied(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Like [`unique_destination`], but suffixes the stem folder as well:
/// `src/b/b.py` becomes `src/b_1/b_1.py`.
fn unique_stem_folder(destination: &Path) -> PathBuf {
    let (Some(stem), Some(base)) = (
        destination.file_stem(),
        destination.parent().and_then(Path::parent),
    ) else {
        return unique_destination(destination);
    };
    let ext = destination.extension();

    let mut counter = 1usize;
    loop {
        let mut folder = stem.to_os_string();
        folder.push(format!("_{counter}"));
        let mut file_name = folder.clone();
        if let Some(ext) = ext {
            file_name.push(".");
            file_name.push(ext);
        }
        let candidate = base.join(&folder).join(file_name);
        if !is_occupied(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
