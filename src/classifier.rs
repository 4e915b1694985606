//! Extension-based classification of files into destination buckets.
//!
//! A [`Profile`] is an ordered table of [`ExtensionRule`]s plus a fallback
//! bucket. Classification is total: every extension, including a missing
//! one, maps to exactly one non-empty relative destination.
//!
//! # Examples
//!
//! ```
//! use projtidy::classifier::Profile;
//! use std::path::PathBuf;
//!
//! let profile = Profile::current();
//! assert_eq!(profile.classify(".PDF", "paper"), PathBuf::from("doc"));
//! assert_eq!(profile.classify(".py", "solver"), PathBuf::from("src").join("solver"));
//! assert_eq!(profile.classify("", "Makefile"), PathBuf::from("data"));
//! ```

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

/// Built-in rule tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileName {
    /// doc / job / media / src / bin / data
    Current,
    /// ref / doc / eg / src / data
    Legacy,
}

impl ProfileName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileName::Current => "current",
            ProfileName::Legacy => "legacy",
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a matching file goes, relative to the walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A fixed folder shared by every matching file, e.g. `doc/`.
    Flat(PathBuf),
    /// A folder plus a per-file subfolder named after the file stem,
    /// e.g. `src/<stem>/`.
    PerStem(PathBuf),
}

impl Destination {
    /// Resolves the destination for a file with the given stem.
    ///
    /// An empty stem degrades to the flat folder.
    pub fn resolve(&self, stem: impl AsRef<OsStr>) -> PathBuf {
        let stem = stem.as_ref();
        match self {
            Destination::Flat(dir) => dir.clone(),
            Destination::PerStem(dir) if stem.is_empty() => dir.clone(),
            Destination::PerStem(dir) => dir.join(stem),
        }
    }

    /// The folder this destination lives under.
    pub fn base(&self) -> &Path {
        match self {
            Destination::Flat(dir) | Destination::PerStem(dir) => dir,
        }
    }
}

/// A set of extensions sharing one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRule {
    extensions: Vec<String>,
    destination: Destination,
}

impl ExtensionRule {
    /// Creates a rule. Extensions are normalized to lower case with a
    /// leading `.`; `"PDF"` and `".pdf"` are equivalent.
    pub fn new<I, S>(extensions: I, destination: Destination) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| !ext.is_empty())
                .collect(),
            destination,
        }
    }

    fn flat(dir: &str, extensions: &[&str]) -> Self {
        Self::new(extensions, Destination::Flat(PathBuf::from(dir)))
    }

    fn per_stem(dir: &str, extensions: &[&str]) -> Self {
        Self::new(extensions, Destination::PerStem(PathBuf::from(dir)))
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Returns true if this rule covers the (already normalized) extension.
    pub fn matches(&self, normalized_ext: &str) -> bool {
        self.extensions.iter().any(|ext| ext == normalized_ext)
    }
}

/// Lower-cases an extension with ASCII rules and ensures a leading `.`.
///
/// An empty input (or a lone `.`) normalizes to the empty string, which no
/// rule matches.
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return String::new();
    }
    format!(".{}", trimmed.to_ascii_lowercase())
}

/// A named, ordered extension-to-destination table.
///
/// Rules are checked in order and the first match wins; anything unmatched
/// goes to the fallback bucket.
#[derive(Debug, Clone)]
pub struct Profile {
    name: String,
    rules: Vec<ExtensionRule>,
    fallback: PathBuf,
}

impl Profile {
    /// Creates an empty profile that sends everything to `fallback`.
    pub fn new(name: impl Into<String>, fallback: impl Into<PathBuf>) -> Self {
        let fallback = fallback.into();
        Self {
            name: name.into(),
            rules: Vec::new(),
            fallback: if fallback.as_os_str().is_empty() {
                PathBuf::from("data")
            } else {
                fallback
            },
        }
    }

    /// The canonical table.
    pub fn current() -> Self {
        let mut profile = Self::new(ProfileName::Current.as_str(), "data");
        profile.push_rule(ExtensionRule::flat(
            "doc",
            &[
                ".pdf", ".djvu", ".epub", ".html", ".docx", ".md", ".tex", ".txt", ".doc",
                ".pptx", ".ipynb",
            ],
        ));
        profile.push_rule(ExtensionRule::flat(
            "job",
            &[
                ".rst", ".rth", ".cdb", ".ls-dyna", ".db", ".dbb", ".esav", ".out",
            ],
        ));
        profile.push_rule(ExtensionRule::per_stem(
            "media",
            &[
                ".mkv", ".mp4", ".aac", ".flac", ".wav", ".avi", ".png", ".jpeg", ".mov",
                ".wmv", ".jpg", ".mp3",
            ],
        ));
        profile.push_rule(ExtensionRule::per_stem(
            "src",
            &[
                ".py", ".go", ".ans", ".inp", ".c", ".m", ".for", ".cpp", ".java", ".scala",
                ".php", ".sh", ".asm", ".h", ".dat",
            ],
        ));
        profile.push_rule(ExtensionRule::flat("bin", &[".exe"]));
        profile
    }

    /// The earlier table, where reference material gets a folder per file.
    pub fn legacy() -> Self {
        let mut profile = Self::new(ProfileName::Legacy.as_str(), "data");
        profile.push_rule(ExtensionRule::per_stem(
            "ref",
            &[".pdf", ".djvu", ".epub", ".html", ".mkv", ".mp4"],
        ));
        profile.push_rule(ExtensionRule::flat(
            "doc",
            &[".docx", ".md", ".tex", ".txt", ".doc", ".pptx"],
        ));
        profile.push_rule(ExtensionRule::per_stem("eg", &[".ipynb"]));
        profile.push_rule(ExtensionRule::per_stem(
            "src",
            &[".py", ".go", ".inp", ".c", ".m", ".for", ".cpp", ".java"],
        ));
        profile
    }

    pub fn builtin(name: ProfileName) -> Self {
        match name {
            ProfileName::Current => Self::current(),
            ProfileName::Legacy => Self::legacy(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[ExtensionRule] {
        &self.rules
    }

    pub fn fallback(&self) -> &Path {
        &self.fallback
    }

    /// Appends a rule at the lowest priority.
    pub fn push_rule(&mut self, rule: ExtensionRule) {
        self.rules.push(rule);
    }

    /// Inserts a rule ahead of every existing one.
    pub fn prepend_rule(&mut self, rule: ExtensionRule) {
        self.rules.insert(0, rule);
    }

    /// Returns the rule that claims an extension, if any.
    pub fn rule_for(&self, ext: &str) -> Option<&ExtensionRule> {
        let normalized = normalize_extension(ext);
        if normalized.is_empty() {
            return None;
        }
        self.rules.iter().find(|rule| rule.matches(&normalized))
    }

    /// Maps an extension and file stem to a relative destination folder.
    ///
    /// # Examples
    ///
    /// ```
    /// use projtidy::classifier::Profile;
    /// use std::path::PathBuf;
    ///
    /// let profile = Profile::legacy();
    /// assert_eq!(profile.classify(".pdf", "a"), PathBuf::from("ref").join("a"));
    /// assert_eq!(profile.classify(".xyz", "a"), PathBuf::from("data"));
    /// ```
    pub fn classify(&self, ext: &str, stem: &str) -> PathBuf {
        match self.rule_for(ext) {
            Some(rule) => rule.destination().resolve(stem),
            None => self.fallback.clone(),
        }
    }

    /// Classifies a file path by its final component.
    ///
    /// The stem is used as-is, so non-UTF-8 names keep distinct folders.
    pub fn classify_path(&self, path: &Path) -> PathBuf {
        let stem = path.file_stem().unwrap_or_default();
        match self.rule_for_path(path) {
            Some(rule) => rule.destination().resolve(stem),
            None => self.fallback.clone(),
        }
    }

    /// True when `path` is sorted into a subfolder named after its stem.
    pub fn gives_own_folder(&self, path: &Path) -> bool {
        let has_stem = path.file_stem().is_some_and(|s| !s.is_empty());
        has_stem
            && matches!(
                self.rule_for_path(path).map(ExtensionRule::destination),
                Some(Destination::PerStem(_))
            )
    }

    fn rule_for_path(&self, path: &Path) -> Option<&ExtensionRule> {
        let ext = path.extension()?.to_string_lossy();
        self.rule_for(&ext)
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_profile_buckets() {
        let profile = Profile::current();
        assert_eq!(profile.classify(".pdf", "a"), PathBuf::from("doc"));
        assert_eq!(profile.classify(".ipynb", "nb"), PathBuf::from("doc"));
        assert_eq!(profile.classify(".rst", "run"), PathBuf::from("job"));
        assert_eq!(profile.classify(".ls-dyna", "crash"), PathBuf::from("job"));
        assert_eq!(
            profile.classify(".mp4", "clip"),
            PathBuf::from("media").join("clip")
        );
        assert_eq!(
            profile.classify(".dat", "mesh"),
            PathBuf::from("src").join("mesh")
        );
        assert_eq!(profile.classify(".exe", "tool"), PathBuf::from("bin"));
        assert_eq!(profile.classify(".xyz", "d"), PathBuf::from("data"));
    }

    #[test]
    fn test_legacy_profile_buckets() {
        let profile = Profile::legacy();
        assert_eq!(
            profile.classify(".pdf", "paper"),
            PathBuf::from("ref").join("paper")
        );
        assert_eq!(
            profile.classify(".mkv", "talk"),
            PathBuf::from("ref").join("talk")
        );
        assert_eq!(profile.classify(".md", "notes"), PathBuf::from("doc"));
        assert_eq!(
            profile.classify(".ipynb", "demo"),
            PathBuf::from("eg").join("demo")
        );
        assert_eq!(profile.classify(".exe", "tool"), PathBuf::from("data"));
    }

    #[test]
    fn test_classify_case_insensitive() {
        let profile = Profile::current();
        assert_eq!(profile.classify(".PDF", "a"), profile.classify(".pdf", "a"));
        assert_eq!(profile.classify(".Py", "b"), profile.classify(".py", "b"));
        assert_eq!(profile.classify("EXE", "c"), PathBuf::from("bin"));
    }

    #[test]
    fn test_classify_missing_extension_falls_back() {
        let profile = Profile::current();
        assert_eq!(profile.classify("", "Makefile"), PathBuf::from("data"));
        assert_eq!(profile.classify(".", "odd"), PathBuf::from("data"));
    }

    #[test]
    fn test_classification_is_total() {
        let samples = [
            "", ".", ".pdf", ".PDF", ".tar", ".gz", ".ß", ".verylongextension", "py", ".exe",
        ];
        for profile in [Profile::current(), Profile::legacy()] {
            for ext in samples {
                let dest = profile.classify(ext, "stem");
                assert!(!dest.as_os_str().is_empty(), "empty destination for {ext:?}");
            }
        }
    }

    #[test]
    fn test_classify_path_uses_final_component() {
        let profile = Profile::current();
        assert_eq!(
            profile.classify_path(Path::new("deep/nested/B.PY")),
            PathBuf::from("src").join("B")
        );
        assert_eq!(
            profile.classify_path(Path::new(".gitignore")),
            PathBuf::from("data")
        );
        assert_eq!(
            profile.classify_path(Path::new("bundle.tar.gz")),
            PathBuf::from("data")
        );
    }

    #[test]
    fn test_per_stem_with_empty_stem_is_flat() {
        let dest = Destination::PerStem(PathBuf::from("src"));
        assert_eq!(dest.resolve(""), PathBuf::from("src"));
        assert_eq!(dest.resolve("x"), PathBuf::from("src").join("x"));
    }

    #[test]
    fn test_prepended_rule_wins() {
        let mut profile = Profile::current();
        profile.prepend_rule(ExtensionRule::new(
            ["pdf"],
            Destination::PerStem(PathBuf::from("ref")),
        ));
        assert_eq!(
            profile.classify(".pdf", "a"),
            PathBuf::from("ref").join("a")
        );
        assert_eq!(profile.classify(".txt", "a"), PathBuf::from("doc"));
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("PDF"), ".pdf");
        assert_eq!(normalize_extension(".Md"), ".md");
        assert_eq!(normalize_extension(""), "");
        assert_eq!(normalize_extension("."), "");
    }

    #[test]
    fn test_builtin_profile_names() {
        assert_eq!(Profile::builtin(ProfileName::Current).name(), "current");
        assert_eq!(Profile::builtin(ProfileName::Legacy).name(), "legacy");
        assert_eq!(ProfileName::Legacy.to_string(), "legacy");
    }

    #[test]
    fn test_gives_own_folder() {
        let profile = Profile::current();
        assert!(profile.gives_own_folder(Path::new("b.py")));
        assert!(profile.gives_own_folder(Path::new("clip.MP4")));
        assert!(!profile.gives_own_folder(Path::new("a.pdf")));
        assert!(!profile.gives_own_folder(Path::new("d.xyz")));
        assert!(!profile.gives_own_folder(Path::new("Makefile")));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_stems_keep_distinct_folders() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let profile = Profile::current();
        let first = Path::new(OsStr::from_bytes(b"run\xff.py"));
        let second = Path::new(OsStr::from_bytes(b"run\xfe.py"));

        let first_dest = profile.classify_path(first);
        let second_dest = profile.classify_path(second);

        assert_ne!(first_dest, second_dest);
        assert_eq!(
            first_dest,
            PathBuf::from("src").join(OsStr::from_bytes(b"run\xff"))
        );
    }
}
