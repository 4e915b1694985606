//! Choosing the project root.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("No directory selected")]
    Cancelled,
    #[error("Failed to read selection: {0}")]
    Io(#[from] io::Error),
}

/// Source of the directory to operate on.
pub trait PathProvider {
    fn select(&mut self) -> Result<PathBuf, SelectionError>;
}

/// A path that is already known, e.g. from the command line.
#[derive(Debug, Clone)]
pub struct FixedPath(pub PathBuf);

impl PathProvider for FixedPath {
    fn select(&mut self) -> Result<PathBuf, SelectionError> {
        Ok(self.0.clone())
    }
}

/// Asks for a path on a line-oriented reader.
///
/// Empty input or end of input cancels the selection.
pub struct PromptPath<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptPath<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptPath<io::StdinLock<'static>, io::Stderr> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> PathProvider for PromptPath<R, W> {
    fn select(&mut self) -> Result<PathBuf, SelectionError> {
        write!(self.output, "Project directory: ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(SelectionError::Cancelled);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(SelectionError::Cancelled);
        }
        Ok(PathBuf::from(trimmed))
    }
}
