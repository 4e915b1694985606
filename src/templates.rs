//! Starter files written into a fresh project.
//!
//! The contents are compiled into the binary. A template is only ever written
//! when its target does not exist yet; user files are never replaced.

use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file the emitter can place into a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    /// Target path relative to the project root, `/`-separated.
    pub relative_path: &'static str,
    pub contents: &'static str,
}

impl Template {
    pub const fn new(relative_path: &'static str, contents: &'static str) -> Self {
        Self {
            relative_path,
            contents,
        }
    }

    pub fn target(&self, root: &Path) -> PathBuf {
        self.relative_path
            .split('/')
            .fold(root.to_path_buf(), |path, part| path.join(part))
    }
}

/// The built-in starter set.
pub const TEMPLATES: &[Template] = &[
    Template::new("README.md", include_str!("../templates/README.md")),
    Template::new(".gitignore", include_str!("../templates/gitignore")),
    Template::new("eg/README.md", include_str!("../templates/examples_README.md")),
    Template::new(
        "eg/notebook/notebook.ipynb",
        include_str!("../templates/notebook.ipynb"),
    ),
    Template::new("doc/report/report.tex", include_str!("../templates/report.tex")),
    Template::new(
        "doc/report/sty/beamerthemelazy.sty",
        include_str!("../templates/sty/beamerthemelazy.sty"),
    ),
    Template::new(
        "doc/report/sty/beamercolorthemelazy.sty",
        include_str!("../templates/sty/beamercolorthemelazy.sty"),
    ),
    Template::new(
        "doc/report/sty/beamercolorthemelazyd.sty",
        include_str!("../templates/sty/beamercolorthemelazyd.sty"),
    ),
    Template::new(
        "doc/report/sty/beamerfontthemelazy.sty",
        include_str!("../templates/sty/beamerfontthemelazy.sty"),
    ),
    Template::new(
        "doc/report/sty/beamerinnerthemelazy.sty",
        include_str!("../templates/sty/beamerinnerthemelazy.sty"),
    ),
    Template::new(
        "doc/report/sty/beamerouterthemelazy.sty",
        include_str!("../templates/sty/beamerouterthemelazy.sty"),
    ),
];

/// What happened to a single template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TemplateOutcome {
    Written,
    /// Would be written; reported by dry runs.
    Planned,
    AlreadyExists,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedTemplate {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: TemplateOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EmitReport {
    pub templates: Vec<EmittedTemplate>,
}

impl EmitReport {
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, TemplateOutcome::Written))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TemplateOutcome::AlreadyExists))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TemplateOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&TemplateOutcome) -> bool) -> usize {
        self.templates.iter().filter(|t| pred(&t.outcome)).count()
    }
}

/// Writes templates that are not yet present.
#[derive(Debug, Clone)]
pub struct TemplateEmitter {
    templates: Vec<Template>,
}

impl TemplateEmitter {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Writes every template whose target is missing.
    ///
    /// A failure on one template is recorded and does not stop the others.
    pub fn emit(&self, root: &Path) -> EmitReport {
        let mut report = EmitReport::default();
        for template in &self.templates {
            let path = template.target(root);
            let outcome = match write_new(&path, template.contents) {
                Ok(true) => {
                    debug!(path = %path.display(), "template written");
                    TemplateOutcome::Written
                }
                Ok(false) => {
                    debug!(path = %path.display(), "template target exists, leaving it");
                    TemplateOutcome::AlreadyExists
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to write template");
                    TemplateOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.templates.push(EmittedTemplate { path, outcome });
        }
        report
    }

    /// Targets that would be written by [`TemplateEmitter::emit`].
    pub fn missing(&self, root: &Path) -> Vec<PathBuf> {
        self.templates
            .iter()
            .map(|t| t.target(root))
            .filter(|path| fs::symlink_metadata(path).is_err())
            .collect()
    }
}

impl Default for TemplateEmitter {
    fn default() -> Self {
        Self::new(TEMPLATES.to_vec())
    }
}

/// Creates `path` with `contents` unless something is already there.
fn write_new(path: &Path, contents: &str) -> io::Result<bool> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };
    file.write_all(contents.as_bytes())?;
    Ok(true)
}
