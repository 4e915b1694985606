//! Run configuration loaded from TOML.
//!
//! Every section is optional. Filtering rules decide which loose files the
//! relocator may touch; the remaining sections pick the rule profile, the
//! collision policy, the prune budget, the repository tooling and whether
//! templates are written.
//!
//! # Configuration File Format
//!
//! ```toml
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp", "node_modules/**"]
//! extensions = ["bak", "tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [classify]
//! profile = "current"
//!
//! [[classify.rules]]
//! extensions = ["csv", "xlsx"]
//! destination = "data/tables"
//! per_file = false
//!
//! [relocate]
//! collision = "rename"
//!
//! [prune]
//! max_passes = 4
//!
//! [repository]
//! program = "git"
//! metadata_dir = ".git"
//!
//! [templates]
//! enabled = true
//! ```

use crate::classifier::{Destination, ExtensionRule, Profile, ProfileName};
use crate::relocator::CollisionPolicy;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_NAME: &str = ".projtidyrc.toml";

/// Errors that can occur during configuration loading and compilation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// A custom classification rule that cannot be used.
    #[error("Invalid classification rule for '{destination}': {reason}")]
    InvalidRule { destination: String, reason: String },
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub filters: FilterRules,
    #[serde(default)]
    pub classify: ClassifySettings,
    #[serde(default)]
    pub relocate: RelocateSettings,
    #[serde(default)]
    pub prune: PruneSettings,
    #[serde(default)]
    pub repository: RepositorySettings,
    #[serde(default)]
    pub templates: TemplateSettings,
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to relocate hidden files. Defaults to false.
    ///
    /// A file counts as hidden when any component of its path below the
    /// project root starts with `.`, so `.env` and everything under `.venv/`
    /// stay where they are. Set this to true to sort every regular file, as
    /// a plain recursive walk would.
    #[serde(default)]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist, overrides exclude rules.
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for keeping files where they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the path relative to the project root.
    #[serde(default)]
    pub patterns: Vec<String>,

    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Which rule table to classify with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifySettings {
    #[serde(default = "default_profile")]
    pub profile: ProfileName,

    /// Extra rules checked before the profile's own.
    #[serde(default)]
    pub rules: Vec<CustomRule>,
}

fn default_profile() -> ProfileName {
    ProfileName::Current
}

impl Default for ClassifySettings {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            rules: Vec::new(),
        }
    }
}

/// A user-supplied extension rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRule {
    pub extensions: Vec<String>,
    pub destination: String,
    /// Give every matching file its own subfolder named after its stem.
    #[serde(default)]
    pub per_file: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelocateSettings {
    #[serde(default)]
    pub collision: CollisionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneSettings {
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

fn default_max_passes() -> usize {
    4
}

impl Default for PruneSettings {
    fn default() -> Self {
        Self {
            max_passes: default_max_passes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: String,
}

fn default_program() -> String {
    "git".to_string()
}

fn default_metadata_dir() -> String {
    crate::walker::DEFAULT_METADATA_DIR.to_string()
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            metadata_dir: default_metadata_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSettings {
    #[serde(default = "default_templates_enabled")]
    pub enabled: bool,
}

fn default_templates_enabled() -> bool {
    true
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            enabled: default_templates_enabled(),
        }
    }
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.projtidyrc.toml` in the current directory
    /// 3. Look for `~/.config/projtidy/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any discovered file fails to parse.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("projtidy")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Compile the filter section into matchers.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }

    /// Builds the classification profile: the selected built-in table with
    /// custom rules placed ahead of it, in file order.
    pub fn build_profile(&self) -> Result<Profile, ConfigError> {
        let mut profile = Profile::builtin(self.classify.profile);
        for custom in self.classify.rules.iter().rev() {
            profile.prepend_rule(custom.to_rule()?);
        }
        Ok(profile)
    }
}

impl CustomRule {
    fn to_rule(&self) -> Result<ExtensionRule, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidRule {
            destination: self.destination.clone(),
            reason: reason.to_string(),
        };

        let dir = PathBuf::from(self.destination.trim());
        if dir.as_os_str().is_empty() {
            return Err(invalid("destination is empty"));
        }
        if dir.is_absolute()
            || dir
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(invalid("destination must stay inside the project root"));
        }

        let rule = ExtensionRule::new(
            &self.extensions,
            if self.per_file {
                Destination::PerStem(dir)
            } else {
                Destination::Flat(dir)
            },
        );
        if rule.extensions().is_empty() {
            return Err(invalid("no extensions listed"));
        }
        Ok(rule)
    }
}

/// Compiled filter structures for matching files against the rules.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Check if a file may be relocated.
    ///
    /// `relative_path` is the file's path below the project root. Checks are
    /// performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden filter - if the file or any parent below the root is hidden
    ///    and hidden files are disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.matches_include_patterns(relative_path) {
            return true;
        }

        if !self.enable_hidden_files && is_hidden(relative_path) {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension() {
            let ext_lower = ext.to_string_lossy().to_ascii_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.matches_exclude_patterns(relative_path) {
            return false;
        }

        if self.matches_exclude_regex(&file_name) {
            return false;
        }

        true
    }

    fn matches_include_patterns(&self, path: &Path) -> bool {
        self.include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    fn matches_exclude_patterns(&self, path: &Path) -> bool {
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    fn matches_exclude_regex(&self, file_name: &str) -> bool {
        self.exclude_regexes
            .iter()
            .any(|regex| regex.is_match(file_name))
    }
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

fn is_hidden(relative_path: &Path) -> bool {
    relative_path.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(rules: FilterRules) -> CompiledFilters {
        Config {
            filters: rules,
            ..Default::default()
        }
        .compile_filters()
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.filters.enable_hidden_files);
        assert_eq!(config.classify.profile, ProfileName::Current);
        assert_eq!(config.relocate.collision, CollisionPolicy::Rename);
        assert_eq!(config.prune.max_passes, 4);
        assert_eq!(config.repository.program, "git");
        assert_eq!(config.repository.metadata_dir, ".git");
        assert!(config.templates.enabled);
    }

    #[test]
    fn test_hidden_file_excluded_by_default() {
        let compiled = CompiledFilters::default();
        assert!(!compiled.should_include(Path::new(".DS_Store")));
        assert!(!compiled.should_include(Path::new("sub/.gitignore")));
        assert!(!compiled.should_include(Path::new(".vscode/settings.json")));
        assert!(compiled.should_include(Path::new("notes.md")));
    }

    #[test]
    fn test_hidden_file_included_when_enabled() {
        let compiled = filters(FilterRules {
            enable_hidden_files: true,
            ..Default::default()
        });
        assert!(compiled.should_include(Path::new(".DS_Store")));
    }

    #[test]
    fn test_exclude_exact_filename_and_extension() {
        let compiled = filters(FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                filenames: vec!["Thumbs.db".to_string()],
                extensions: vec!["bak".to_string(), ".tmp".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        });

        assert!(!compiled.should_include(Path::new("Thumbs.db")));
        assert!(!compiled.should_include(Path::new("file.BAK")));
        assert!(!compiled.should_include(Path::new("file.tmp")));
        assert!(compiled.should_include(Path::new("image.jpg")));
    }

    #[test]
    fn test_exclude_glob_patterns_on_relative_paths() {
        let compiled = filters(FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                patterns: vec!["**/vendor/**".to_string(), "*.cache".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        });

        assert!(!compiled.should_include(Path::new("vendor/lib.c")));
        assert!(!compiled.should_include(Path::new("third/vendor/lib.c")));
        assert!(!compiled.should_include(Path::new("file.cache")));
        assert!(compiled.should_include(Path::new("my_vendor/lib.c")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let compiled = filters(FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules::default(),
            include: IncludeRules {
                patterns: vec![".important".to_string()],
            },
        });

        assert!(compiled.should_include(Path::new(".important")));
        assert!(!compiled.should_include(Path::new(".other")));
    }

    #[test]
    fn test_exclude_regex() {
        let compiled = filters(FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                regex: vec![r"^draft_.*\.tex$".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        });

        assert!(!compiled.should_include(Path::new("draft_intro.tex")));
        assert!(compiled.should_include(Path::new("intro.tex")));
    }

    #[test]
    fn test_invalid_patterns_return_errors() {
        let bad_regex = Config {
            filters: FilterRules {
                exclude: ExcludeRules {
                    regex: vec!["[invalid(".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            bad_regex.compile_filters(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = Config {
            filters: FilterRules {
                exclude: ExcludeRules {
                    patterns: vec!["[invalid".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            bad_glob.compile_filters(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }

    #[test]
    fn test_parse_full_toml() {
        let config = Config::from_toml_str(
            r#"
            [filters]
            enable_hidden_files = true

            [classify]
            profile = "legacy"

            [[classify.rules]]
            extensions = ["csv", "XLSX"]
            destination = "data/tables"

            [[classify.rules]]
            extensions = [".step"]
            destination = "cad"
            per_file = true

            [relocate]
            collision = "fail"

            [prune]
            max_passes = 2

            [repository]
            program = "/usr/bin/git"

            [templates]
            enabled = false
            "#,
        )
        .expect("config should parse");

        assert!(config.filters.enable_hidden_files);
        assert_eq!(config.classify.profile, ProfileName::Legacy);
        assert_eq!(config.classify.rules.len(), 2);
        assert_eq!(config.relocate.collision, CollisionPolicy::Fail);
        assert_eq!(config.prune.max_passes, 2);
        assert_eq!(config.repository.program, "/usr/bin/git");
        assert_eq!(config.repository.metadata_dir, ".git");
        assert!(!config.templates.enabled);

        let profile = config.build_profile().expect("profile should build");
        assert_eq!(profile.name(), "legacy");
        assert_eq!(
            profile.classify(".xlsx", "sheet"),
            PathBuf::from("data/tables")
        );
        assert_eq!(
            profile.classify(".step", "bracket"),
            PathBuf::from("cad").join("bracket")
        );
        assert_eq!(profile.classify(".pdf", "a"), PathBuf::from("ref").join("a"));
    }

    #[test]
    fn test_custom_rules_keep_file_order() {
        let config = Config::from_toml_str(
            r#"
            [[classify.rules]]
            extensions = ["pdf"]
            destination = "papers"

            [[classify.rules]]
            extensions = ["pdf"]
            destination = "never"
            "#,
        )
        .unwrap();
        let profile = config.build_profile().unwrap();
        assert_eq!(profile.classify(".pdf", "a"), PathBuf::from("papers"));
    }

    #[test]
    fn test_invalid_custom_rules() {
        for body in [
            "[[classify.rules]]\nextensions = [\"a\"]\ndestination = \"\"",
            "[[classify.rules]]\nextensions = [\"a\"]\ndestination = \"../outside\"",
            "[[classify.rules]]\nextensions = []\ndestination = \"x\"",
        ] {
            let config = Config::from_toml_str(body).unwrap();
            assert!(matches!(
                config.build_profile(),
                Err(ConfigError::InvalidRule { .. })
            ));
        }
    }

    #[test]
    fn test_unknown_profile_is_invalid() {
        let result = Config::from_toml_str("[classify]\nprofile = \"ancient\"");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = Config::load(Some(Path::new("/non/existent/projtidy.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }
}
