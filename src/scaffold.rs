//! Creation of the fixed project layout.
//!
//! The builder only ever adds directories. Existing directories are left as
//! they are, so running it twice is harmless.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Top-level folders every project gets.
pub const DEFAULT_COMPONENTS: &[&str] = &["doc", "src", "job", "data", "ref", "eg", "media", "bin"];

/// Errors that stop scaffold creation.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateFailed { path: PathBuf, source: io::Error },
    /// Something other than a directory already occupies a scaffold path.
    #[error("Cannot create directory {}: a file is in the way", .0.display())]
    NotADirectory(PathBuf),
}

pub type ScaffoldResult<T> = Result<T, ScaffoldError>;

/// The directories a scaffold consists of, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldLayout {
    /// Top-level component folders.
    pub components: Vec<PathBuf>,
    /// Folder that receives a copy of the component layout (the report tree).
    pub report_dir: Option<PathBuf>,
    /// Additional nested folders.
    pub extras: Vec<PathBuf>,
}

impl ScaffoldLayout {
    /// Every directory of the layout, parents before children.
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.components.clone();
        if let Some(report_dir) = &self.report_dir {
            dirs.push(report_dir.clone());
            dirs.extend(self.components.iter().map(|c| report_dir.join(c)));
        }
        dirs.extend(self.extras.iter().cloned());
        dirs
    }
}

impl Default for ScaffoldLayout {
    fn default() -> Self {
        Self {
            components: DEFAULT_COMPONENTS.iter().map(PathBuf::from).collect(),
            report_dir: Some(PathBuf::from("doc").join("report")),
            extras: vec![
                PathBuf::from("data").join("large"),
                PathBuf::from("doc").join("report").join("sty"),
                PathBuf::from("eg").join("notebook"),
            ],
        }
    }
}

/// What a scaffold run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScaffoldReport {
    pub created: Vec<PathBuf>,
    /// Directories that were already there.
    pub existing: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScaffoldBuilder {
    layout: ScaffoldLayout,
}

impl ScaffoldBuilder {
    pub fn new(layout: ScaffoldLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ScaffoldLayout {
        &self.layout
    }

    /// Ensures every layout directory exists under `root`.
    pub fn build(&self, root: &Path) -> ScaffoldResult<ScaffoldReport> {
        let mut report = ScaffoldReport::default();
        for relative in self.layout.directories() {
            let path = root.join(&relative);
            if ensure_dir(&path)? {
                debug!(path = %path.display(), "created");
                report.created.push(path);
            } else {
                report.existing += 1;
            }
        }
        Ok(report)
    }

    /// Layout directories that do not exist yet (for dry runs).
    pub fn missing(&self, root: &Path) -> Vec<PathBuf> {
        self.layout
            .directories()
            .into_iter()
            .map(|relative| root.join(relative))
            .filter(|path| !path.is_dir())
            .collect()
    }
}

/// Creates `path` and its parents. Returns whether anything was created.
fn ensure_dir(path: &Path) -> ScaffoldResult<bool> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => return Ok(false),
        Ok(_) => return Err(ScaffoldError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(ScaffoldError::CreateFailed {
                path: path.to_path_buf(),
                source: e,
            });
        }
    }

    match fs::create_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(false),
        Err(e) => Err(ScaffoldError::CreateFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
