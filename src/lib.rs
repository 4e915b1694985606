//! projtidy - project scaffolding and file sorting
//!
//! Creates a conventional folder layout in a project directory, moves loose
//! files into it by extension, removes directories left empty, writes starter
//! files and initializes a repository.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod orchestrator;
pub mod output;
pub mod pruner;
pub mod relocator;
pub mod repository;
pub mod scaffold;
pub mod selection;
pub mod templates;
pub mod walker;

pub use classifier::{Destination, ExtensionRule, Profile, ProfileName};
pub use config::{CompiledFilters, Config, ConfigError};
pub use orchestrator::{Orchestrator, RunError, RunObserver, RunOptions, RunReport};
pub use pruner::{EmptyDirectoryPruner, PruneReport};
pub use relocator::{CollisionPolicy, FileRelocator, RelocateError, Relocation, RelocationReport};
pub use repository::{GitInitializer, RepositoryError, RepositoryInitializer};
pub use scaffold::{ScaffoldBuilder, ScaffoldLayout};
pub use selection::{FixedPath, PathProvider, PromptPath, SelectionError};
pub use templates::TemplateEmitter;
pub use walker::{FsEntry, TreeWalker};

pub use cli::{Cli, run_cli};
