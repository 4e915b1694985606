//! Runs the phases of a tidy in order.
//!
//! select -> scaffold -> prune -> relocate -> prune -> templates -> repository

use crate::config::{Config, ConfigError};
use crate::pruner::{EmptyDirectoryPruner, PruneFailure, PruneReport};
use crate::relocator::{FileRelocator, RelocateError, Relocation};
use crate::repository::{GitInitializer, RepositoryError, RepositoryInitializer};
use crate::scaffold::{ScaffoldBuilder, ScaffoldError};
use crate::selection::{PathProvider, SelectionError};
use crate::templates::{EmittedTemplate, TemplateEmitter, TemplateOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Switches that change what a run is allowed to do.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Report what would happen without touching the disk.
    pub dry_run: bool,
    /// Relocate files even when the project is already under version control.
    pub force_sort: bool,
    /// Do not initialize a repository.
    pub skip_init: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Scaffold,
    PruneBefore,
    Relocate,
    PruneAfter,
    Templates,
    Repository,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Scaffold => "scaffold",
            Phase::PruneBefore => "prune (before)",
            Phase::Relocate => "relocate",
            Phase::PruneAfter => "prune (after)",
            Phase::Templates => "templates",
            Phase::Repository => "repository",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives progress events during a run. Every method defaults to a no-op.
pub trait RunObserver {
    fn phase_started(&mut self, _phase: Phase) {}
    fn relocation_planned(&mut self, _moves: usize) {}
    fn file_relocated(&mut self, _relocation: &Relocation) {}
    fn directory_pruned(&mut self, _path: &Path) {}
    fn template_emitted(&mut self, _template: &EmittedTemplate) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default)]
pub struct SilentObserver;

impl RunObserver for SilentObserver {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryStatus {
    Initialized,
    AlreadyPresent,
    Skipped,
    /// Would be initialized; reported by dry runs.
    Planned,
}

/// Everything a run did (or, for a dry run, would do).
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub profile: String,
    pub dry_run: bool,
    pub scaffold_created: Vec<PathBuf>,
    pub pruned_before: Vec<PathBuf>,
    pub pruned_after: Vec<PathBuf>,
    pub prune_failures: Vec<PruneFailure>,
    /// Relocation was not attempted because the project already had a repository.
    pub relocation_skipped: bool,
    pub relocations: Vec<Relocation>,
    pub unchanged: usize,
    pub excluded: usize,
    pub templates: Vec<EmittedTemplate>,
    pub repository: RepositoryStatus,
}

impl RunReport {
    fn new(root: &Path, profile: &str, dry_run: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            started_at: Utc::now(),
            profile: profile.to_string(),
            dry_run,
            scaffold_created: Vec::new(),
            pruned_before: Vec::new(),
            pruned_after: Vec::new(),
            prune_failures: Vec::new(),
            relocation_skipped: false,
            relocations: Vec::new(),
            unchanged: 0,
            excluded: 0,
            templates: Vec::new(),
            repository: RepositoryStatus::Skipped,
        }
    }

    /// Templates that were written (or would be, on a dry run).
    pub fn templates_written(&self) -> usize {
        self.templates
            .iter()
            .filter(|t| matches!(t.outcome, TemplateOutcome::Written | TemplateOutcome::Planned))
            .count()
    }
}

/// Errors that stop a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Target directory does not exist: {}", .0.display())]
    MissingTarget(PathBuf),
    #[error("Target is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("Cannot access {}: {source}", .path.display())]
    Inaccessible { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Scaffold(#[from] ScaffoldError),
    #[error(transparent)]
    Relocate(#[from] RelocateError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type RunResult<T> = Result<T, RunError>;

/// Drives a full run over one project directory.
pub struct Orchestrator<I = GitInitializer> {
    relocator: FileRelocator,
    pruner: EmptyDirectoryPruner,
    scaffold: ScaffoldBuilder,
    templates: Option<TemplateEmitter>,
    initializer: I,
    max_passes: usize,
    options: RunOptions,
}

impl Orchestrator<GitInitializer> {
    /// Builds an orchestrator that runs the configured git program.
    pub fn from_config(config: &Config, options: RunOptions) -> RunResult<Self> {
        let git = GitInitializer::new(
            config.repository.program.as_str(),
            config.repository.metadata_dir.as_str(),
        );
        Self::with_initializer(config, options, git)
    }
}

impl<I: RepositoryInitializer> Orchestrator<I> {
    pub fn with_initializer(config: &Config, options: RunOptions, initializer: I) -> RunResult<Self> {
        let metadata_dir = config.repository.metadata_dir.as_str();
        let relocator = FileRelocator::new(config.build_profile()?)
            .with_filters(config.compile_filters()?)
            .with_collision(config.relocate.collision)
            .skipping(metadata_dir);

        Ok(Self {
            relocator,
            pruner: EmptyDirectoryPruner::new().skipping(metadata_dir),
            scaffold: ScaffoldBuilder::default(),
            templates: config.templates.enabled.then(TemplateEmitter::default),
            initializer,
            max_passes: config.prune.max_passes.max(1),
            options,
        })
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    pub fn initializer(&self) -> &I {
        &self.initializer
    }

    /// Asks `provider` for the project root, then runs every phase on it.
    pub fn run(
        &self,
        provider: &mut dyn PathProvider,
        observer: &mut dyn RunObserver,
    ) -> RunResult<RunReport> {
        let root = provider.select()?;
        self.run_at(&root, observer)
    }

    /// Runs every phase on `root`.
    pub fn run_at(&self, root: &Path, observer: &mut dyn RunObserver) -> RunResult<RunReport> {
        check_target(root)?;

        let already_initialized = self.initializer.is_initialized(root);
        let sort = !already_initialized || self.options.force_sort;
        let mut report = RunReport::new(root, self.relocator.profile().name(), self.options.dry_run);

        info!(
            root = %root.display(),
            profile = %report.profile,
            dry_run = self.options.dry_run,
            "starting run"
        );

        if self.options.dry_run {
            self.preview(root, sort, already_initialized, &mut report, observer)?;
            return Ok(report);
        }

        observer.phase_started(Phase::Scaffold);
        report.scaffold_created = self.scaffold.build(root)?.created;

        observer.phase_started(Phase::PruneBefore);
        let pruned = self.prune(root, observer);
        report.pruned_before = pruned.removed;
        report.prune_failures.extend(pruned.failures);

        if sort {
            observer.phase_started(Phase::Relocate);
            let plan = self.relocator.plan(root)?;
            observer.relocation_planned(plan.moves.len());
            let relocated = self
                .relocator
                .apply(root, &plan, |relocation| observer.file_relocated(relocation))?;
            report.relocations = relocated.moved;
            report.unchanged = relocated.unchanged;
            report.excluded = relocated.excluded;
        } else {
            info!("repository already present, leaving files where they are");
            report.relocation_skipped = true;
        }

        observer.phase_started(Phase::PruneAfter);
        let pruned = self.prune(root, observer);
        report.pruned_after = pruned.removed;
        report.prune_failures.extend(pruned.failures);

        if let Some(templates) = &self.templates {
            observer.phase_started(Phase::Templates);
            for emitted in templates.emit(root).templates {
                observer.template_emitted(&emitted);
                report.templates.push(emitted);
            }
        }

        observer.phase_started(Phase::Repository);
        report.repository = if self.options.skip_init {
            RepositoryStatus::Skipped
        } else if already_initialized {
            RepositoryStatus::AlreadyPresent
        } else {
            self.initializer.initialize(root)?;
            RepositoryStatus::Initialized
        };

        info!(
            moved = report.relocations.len(),
            pruned = report.pruned_before.len() + report.pruned_after.len(),
            "run finished"
        );
        Ok(report)
    }

    fn prune(&self, root: &Path, observer: &mut dyn RunObserver) -> PruneReport {
        let pruned = self.pruner.prune_until_settled(root, self.max_passes);
        for dir in &pruned.removed {
            observer.directory_pruned(dir);
        }
        pruned
    }

    /// Fills `report` with what a real run would do, without writing.
    fn preview(
        &self,
        root: &Path,
        sort: bool,
        already_initialized: bool,
        report: &mut RunReport,
        observer: &mut dyn RunObserver,
    ) -> RunResult<()> {
        report.scaffold_created = self.scaffold.missing(root);
        report.pruned_before = self.pruner.empty_directories(root);

        if sort {
            let plan = self.relocator.plan(root)?;
            observer.relocation_planned(plan.moves.len());
            report.relocations = plan
                .moves
                .into_iter()
                .map(|planned| Relocation {
                    original_path: planned.source,
                    new_path: planned.destination,
                    bucket: planned.bucket,
                })
                .collect();
            report.unchanged = plan.unchanged;
            report.excluded = plan.excluded;
        } else {
            report.relocation_skipped = true;
        }

        if let Some(templates) = &self.templates {
            report.templates = templates
                .missing(root)
                .into_iter()
                .map(|path| EmittedTemplate {
                    path,
                    outcome: TemplateOutcome::Planned,
                })
                .collect();
        }

        report.repository = if self.options.skip_init {
            RepositoryStatus::Skipped
        } else if already_initialized {
            RepositoryStatus::AlreadyPresent
        } else {
            RepositoryStatus::Planned
        };
        Ok(())
    }
}

fn check_target(root: &Path) -> RunResult<()> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(RunError::NotADirectory(root.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(RunError::MissingTarget(root.to_path_buf()))
        }
        Err(source) => Err(RunError::Inaccessible {
            path: root.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryResult;
    use crate::selection::FixedPath;
    use std::cell::Cell;
    use tempfile::TempDir;

    /// Creates the metadata directory instead of spawning git.
    #[derive(Default)]
    struct FakeInitializer {
        calls: Cell<usize>,
    }

    impl RepositoryInitializer for FakeInitializer {
        fn is_initialized(&self, root: &Path) -> bool {
            root.join(".git").is_dir()
        }

        fn initialize(&self, root: &Path) -> RepositoryResult<()> {
            self.calls.set(self.calls.get() + 1);
            fs::create_dir_all(root.join(".git")).map_err(|source| RepositoryError::Spawn {
                program: "fake".to_string(),
                source,
            })
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        phases: Vec<Phase>,
        planned: Option<usize>,
        relocated: usize,
    }

    impl RunObserver for RecordingObserver {
        fn phase_started(&mut self, phase: Phase) {
            self.phases.push(phase);
        }

        fn relocation_planned(&mut self, moves: usize) {
            self.planned = Some(moves);
        }

        fn file_relocated(&mut self, _relocation: &Relocation) {
            self.relocated += 1;
        }
    }

    fn orchestrator(options: RunOptions) -> Orchestrator<FakeInitializer> {
        Orchestrator::with_initializer(&Config::default(), options, FakeInitializer::default())
            .expect("default config is valid")
    }

    #[test]
    fn test_phases_run_in_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("main.py"), "print()").unwrap();

        let mut observer = RecordingObserver::default();
        let report = orchestrator(RunOptions::default())
            .run_at(temp_dir.path(), &mut observer)
            .unwrap();

        assert_eq!(
            observer.phases,
            vec![
                Phase::Scaffold,
                Phase::PruneBefore,
                Phase::Relocate,
                Phase::PruneAfter,
                Phase::Templates,
                Phase::Repository,
            ]
        );
        assert_eq!(observer.planned, Some(1));
        assert_eq!(observer.relocated, 1);
        assert_eq!(report.repository, RepositoryStatus::Initialized);
        assert!(temp_dir.path().join("src/main/main.py").is_file());
    }

    #[test]
    fn test_run_uses_provider_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut provider = FixedPath(temp_dir.path().to_path_buf());

        let report = orchestrator(RunOptions::default())
            .run(&mut provider, &mut SilentObserver)
            .unwrap();

        assert_eq!(report.root, temp_dir.path());
        assert!(temp_dir.path().join("README.md").is_file());
    }

    #[test]
    fn test_missing_target() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let missing = temp_dir.path().join("nope");

        let err = orchestrator(RunOptions::default())
            .run_at(&missing, &mut SilentObserver)
            .unwrap_err();
        assert!(matches!(err, RunError::MissingTarget(_)));
    }

    #[test]
    fn test_target_is_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let err = orchestrator(RunOptions::default())
            .run_at(&file, &mut SilentObserver)
            .unwrap_err();
        assert!(matches!(err, RunError::NotADirectory(_)));
    }

    #[test]
    fn test_skip_init() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let orchestrator = orchestrator(RunOptions {
            skip_init: true,
            ..Default::default()
        });

        let report = orchestrator.run_at(temp_dir.path(), &mut SilentObserver).unwrap();

        assert_eq!(report.repository, RepositoryStatus::Skipped);
        assert_eq!(orchestrator.initializer().calls.get(), 0);
        assert!(!temp_dir.path().join(".git").exists());
    }

    #[test]
    fn test_templates_disabled() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config::from_toml_str("[templates]\nenabled = false\n").unwrap();
        let orchestrator =
            Orchestrator::with_initializer(&config, RunOptions::default(), FakeInitializer::default())
                .unwrap();

        let report = orchestrator.run_at(temp_dir.path(), &mut SilentObserver).unwrap();

        assert!(report.templates.is_empty());
        assert!(!temp_dir.path().join("README.md").exists());
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let config = Config::from_toml_str("[[classify.rules]]\nextensions = []\ndestination = \"x\"\n")
            .unwrap();
        let result =
            Orchestrator::with_initializer(&config, RunOptions::default(), FakeInitializer::default());
        assert!(matches!(result, Err(RunError::Config(_))));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("a.exe"), "bin").unwrap();

        let report = orchestrator(RunOptions::default())
            .run_at(temp_dir.path(), &mut SilentObserver)
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["profile"], "current");
        assert_eq!(json["repository"], "initialized");
        assert_eq!(json["relocations"][0]["bucket"], "bin");
        assert!(json["started_at"].is_string());
    }
}
