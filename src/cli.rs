//! Command-line interface for projtidy.
//!
//! Parses arguments, merges them over the loaded configuration and renders a
//! run either as colored console output or as a JSON report.

use crate::classifier::ProfileName;
use crate::config::{Config, ConfigError};
use crate::orchestrator::{
    Orchestrator, Phase, RepositoryStatus, RunError, RunObserver, RunOptions, RunReport,
    SilentObserver,
};
use crate::output::OutputFormatter;
use crate::relocator::{CollisionPolicy, Relocation, count_by_bucket};
use crate::selection::{FixedPath, PathProvider, PromptPath};
use crate::templates::{EmittedTemplate, TemplateOutcome};
use clap::{ArgAction, Parser};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Scaffold a project directory and sort its loose files by type.
#[derive(Debug, Parser)]
#[command(name = "projtidy", version, about)]
pub struct Cli {
    /// Project directory. Prompted for on stdin when omitted.
    pub path: Option<PathBuf>,

    /// Configuration file (defaults to .projtidyrc.toml, then ~/.config/projtidy/config.toml).
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Classification table to sort with.
    #[arg(long, value_enum)]
    pub profile: Option<ProfileName>,

    /// What to do when a file of the same name already sits at the destination.
    #[arg(long, value_enum)]
    pub collision: Option<CollisionPolicy>,

    /// Show what would happen without changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Sort files even if the directory is already a repository.
    #[arg(long)]
    pub force_sort: bool,

    /// Do not initialize a repository.
    #[arg(long)]
    pub no_init: bool,

    /// Print the run report as JSON instead of styled output.
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn options(&self) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            force_sort: self.force_sort,
            skip_init: self.no_init,
        }
    }

    /// Loads the configuration and applies command-line overrides.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(profile) = self.profile {
            config.classify.profile = profile;
        }
        if let Some(collision) = self.collision {
            config.relocate.collision = collision;
        }
        Ok(config)
    }

    fn provider(&self) -> Box<dyn PathProvider> {
        match &self.path {
            Some(path) => Box::new(FixedPath(path.clone())),
            None => Box::new(PromptPath::stdin()),
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("Failed to render report: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Run(RunError::Config(e))
    }
}

/// Runs the tool as described by `cli`.
pub fn run_cli(cli: &Cli) -> Result<RunReport, CliError> {
    let config = cli.load_config()?;
    let orchestrator = Orchestrator::from_config(&config, cli.options())?;
    let mut provider = cli.provider();

    if cli.json {
        let report = orchestrator.run(provider.as_mut(), &mut SilentObserver)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    let mut observer = ConsoleObserver::new(cli.dry_run);
    let result = orchestrator.run(provider.as_mut(), &mut observer);
    observer.finish_progress();
    let report = result?;
    print_summary(&report);
    Ok(report)
}

/// Streams run events to the terminal.
pub struct ConsoleObserver {
    dry_run: bool,
    progress: Option<ProgressBar>,
}

impl ConsoleObserver {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            progress: None,
        }
    }

    fn finish_progress(&mut self) {
        if let Some(pb) = self.progress.take() {
            pb.finish_and_clear();
        }
    }
}

impl RunObserver for ConsoleObserver {
    fn phase_started(&mut self, phase: Phase) {
        self.finish_progress();
        OutputFormatter::info(&format!("==> {phase}"));
    }

    fn relocation_planned(&mut self, moves: usize) {
        if self.dry_run {
            OutputFormatter::dry_run_notice(&format!("{moves} file(s) would be relocated"));
        } else if moves > 0 {
            self.progress = Some(OutputFormatter::create_progress_bar(moves as u64));
        }
    }

    fn file_relocated(&mut self, relocation: &Relocation) {
        match &self.progress {
            Some(pb) => {
                if let Some(name) = relocation.new_path.file_name() {
                    pb.set_message(name.to_string_lossy().into_owned());
                }
                pb.inc(1);
            }
            None => OutputFormatter::success(&describe_move(relocation)),
        }
    }

    fn directory_pruned(&mut self, path: &Path) {
        OutputFormatter::plain(&format!("  removed empty {}", path.display()));
    }

    fn template_emitted(&mut self, template: &EmittedTemplate) {
        let path = template.path.display();
        match &template.outcome {
            TemplateOutcome::Written => OutputFormatter::success(&format!("Wrote {path}")),
            TemplateOutcome::Planned => {
                OutputFormatter::dry_run_notice(&format!("Would write {path}"))
            }
            TemplateOutcome::AlreadyExists => {
                OutputFormatter::warning(&format!("{path} already exists, skipping"))
            }
            TemplateOutcome::Failed { reason } => {
                OutputFormatter::error(&format!("Could not write {path}: {reason}"))
            }
        }
    }
}

fn describe_move(relocation: &Relocation) -> String {
    format!(
        "{} -> {}",
        relocation.original_path.display(),
        relocation.new_path.display()
    )
}

fn print_summary(report: &RunReport) {
    if report.dry_run {
        OutputFormatter::header("PLAN");
        for dir in &report.scaffold_created {
            OutputFormatter::dry_run_notice(&format!("Would create {}", dir.display()));
        }
        for dir in &report.pruned_before {
            OutputFormatter::dry_run_notice(&format!("Would remove empty {}", dir.display()));
        }
        for relocation in &report.relocations {
            OutputFormatter::dry_run_notice(&format!("Would move {}", describe_move(relocation)));
        }
        for template in &report.templates {
            OutputFormatter::dry_run_notice(&format!("Would write {}", template.path.display()));
        }
    }

    if report.relocation_skipped {
        OutputFormatter::warning(
            "Repository already present: files were left in place (use --force-sort to sort)",
        );
    } else if !report.relocations.is_empty() {
        OutputFormatter::summary_table(
            &count_by_bucket(&report.relocations),
            report.relocations.len(),
        );
    }

    let pruned = report.pruned_before.len() + report.pruned_after.len();
    OutputFormatter::plain(&format!(
        "Profile: {} | unchanged: {} | excluded: {} | empty dirs removed: {} | templates written: {}",
        report.profile,
        report.unchanged,
        report.excluded,
        pruned,
        report.templates_written()
    ));

    for failure in &report.prune_failures {
        OutputFormatter::warning(&format!(
            "Could not prune {}: {}",
            failure.path.display(),
            failure.reason
        ));
    }

    match report.repository {
        RepositoryStatus::Initialized => OutputFormatter::success("Initialized repository"),
        RepositoryStatus::AlreadyPresent => OutputFormatter::info("Repository already present"),
        RepositoryStatus::Planned => OutputFormatter::dry_run_notice("Would initialize repository"),
        RepositoryStatus::Skipped => {}
    }

    if report.dry_run {
        OutputFormatter::dry_run_notice("No changes were made.");
    } else {
        OutputFormatter::success(&format!("Tidied {}", report.root.display()));
    }
}
