//! Version-control initialization.
//!
//! The orchestrator only talks to [`RepositoryInitializer`], so tests can
//! swap the external `git` process for an in-memory fake.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::{debug, info};

use crate::walker::DEFAULT_METADATA_DIR;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} init failed in {} ({status}): {stderr}", .root.display())]
    CommandFailed {
        program: String,
        root: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Something that can put a directory under version control.
pub trait RepositoryInitializer {
    /// Whether `root` already holds a repository.
    fn is_initialized(&self, root: &Path) -> bool;

    /// Creates a repository in `root`.
    fn initialize(&self, root: &Path) -> RepositoryResult<()>;
}

/// Runs `<program> -C <root> init`.
#[derive(Debug, Clone)]
pub struct GitInitializer {
    program: String,
    metadata_dir: String,
}

impl GitInitializer {
    pub fn new(program: impl Into<String>, metadata_dir: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            metadata_dir: metadata_dir.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for GitInitializer {
    fn default() -> Self {
        Self::new("git", DEFAULT_METADATA_DIR)
    }
}

impl RepositoryInitializer for GitInitializer {
    fn is_initialized(&self, root: &Path) -> bool {
        root.join(&self.metadata_dir).exists()
    }

    fn initialize(&self, root: &Path) -> RepositoryResult<()> {
        debug!(program = %self.program, root = %root.display(), "running init");
        let output = Command::new(&self.program)
            .arg("-C")
            .arg(root)
            .arg("init")
            .output()
            .map_err(|source| RepositoryError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RepositoryError::CommandFailed {
                program: self.program.clone(),
                root: root.to_path_buf(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(root = %root.display(), "initialized repository");
        Ok(())
    }
}
