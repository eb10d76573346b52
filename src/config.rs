//! Run configuration and file filtering rules.
//!
//! A [`Configuration`] is supplied once per run and never changes while the run
//! is active. It can be written by hand, saved from the CLI, or built in code.
//!
//! # Configuration File Format
//!
//! ```toml
//! sources = ["/home/me/Downloads"]
//! target = "/home/me/Sorted"
//! mode = "by_type"
//! duplicates = "rename"
//! junk_threshold = 10240
//! recursive = true
//! find_duplicates = false
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp", "node_modules/**"]
//! extensions = ["part"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```

use crate::error::OrganizeError;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Default junk threshold: 10 KiB.
pub const DEFAULT_JUNK_THRESHOLD: u64 = 10 * 1024;

/// Errors that can occur while loading or compiling configuration.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

impl From<ConfigError> for OrganizeError {
    fn from(err: ConfigError) -> Self {
        OrganizeError::Configuration(err.to_string())
    }
}

/// How files are grouped into target subfolders.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationMode {
    /// Documents, Images, Videos, ... with small files routed to Junk.
    #[default]
    ByType,
    /// `YYYY/MM-MonthName` from the modification time.
    ByDate,
    /// Small, Medium, Large, VeryLarge.
    BySize,
    /// The lowercase extension.
    ByExtension,
}

/// What to do when the computed destination is already taken.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStrategy {
    /// Append `_1`, `_2`, ... before the extension.
    #[default]
    Rename,
    /// Leave the source file where it is.
    Skip,
    /// Overwrite the existing file. Not reversible.
    Replace,
    /// Send the file to the `Duplicates` folder of the target.
    MergeToDuplicates,
}

/// Settings for one organization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Folders to collect files from.
    #[serde(default)]
    pub sources: Vec<PathBuf>,

    /// Folder that receives the category subfolders.
    #[serde(default)]
    pub target: PathBuf,

    #[serde(default)]
    pub mode: OrganizationMode,

    #[serde(default)]
    pub duplicates: DuplicateStrategy,

    /// Files of this many bytes or fewer go to Junk under [`OrganizationMode::ByType`].
    #[serde(default = "default_junk_threshold")]
    pub junk_threshold: u64,

    /// Plan only, never touch the filesystem.
    #[serde(default)]
    pub dry_run: bool,

    /// Descend into subfolders of each source.
    #[serde(default = "default_recursive")]
    pub recursive: bool,

    /// Files under these folders are never moved.
    #[serde(default = "default_protected_dirs")]
    pub protected_dirs: Vec<PathBuf>,

    /// Remove folders left empty in the sources after a run.
    #[serde(default)]
    pub remove_empty_dirs: bool,

    /// Hash same-sized files while planning and report identical groups.
    #[serde(default)]
    pub find_duplicates: bool,

    #[serde(default)]
    pub filters: FilterRules,
}

fn default_junk_threshold() -> u64 {
    DEFAULT_JUNK_THRESHOLD
}

fn default_recursive() -> bool {
    true
}

/// System folders protected on this platform.
pub fn default_protected_dirs() -> Vec<PathBuf> {
    let dirs: &[&str] = if cfg!(windows) {
        &[
            r"C:\Windows",
            r"C:\Program Files",
            r"C:\Program Files (x86)",
            r"C:\ProgramData",
            r"C:\System Volume Information",
            r"C:\$Recycle.Bin",
            r"C:\Recovery",
            r"C:\Boot",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/System", "/Library", "/bin", "/sbin", "/usr", "/private/etc", "/dev", "/cores",
        ]
    } else {
        &[
            "/bin", "/boot", "/dev", "/etc", "/lib", "/lib32", "/lib64", "/proc", "/sbin", "/sys",
            "/usr",
        ]
    };
    dirs.iter().map(PathBuf::from).collect()
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            target: PathBuf::new(),
            mode: OrganizationMode::default(),
            duplicates: DuplicateStrategy::default(),
            junk_threshold: DEFAULT_JUNK_THRESHOLD,
            dry_run: false,
            recursive: true,
            protected_dirs: default_protected_dirs(),
            remove_empty_dirs: false,
            find_duplicates: false,
            filters: FilterRules::default(),
        }
    }
}

impl Configuration {
    /// Creates a configuration with default settings for the given folders.
    pub fn new(sources: Vec<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            sources,
            target: target.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.dirsortrc.toml` in the current directory
    /// 3. Look for `~/.config/dirsort/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".dirsortrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("dirsort")
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

        toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Writes this configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Checks that the folders are usable and the filters compile.
    ///
    /// Never touches the filesystem beyond reading metadata.
    pub fn validate(&self) -> Result<(), OrganizeError> {
        self.validate_sources()?;

        if self.target.as_os_str().is_empty() {
            return Err(OrganizeError::Configuration(
                "a target folder is required".to_string(),
            ));
        }
        if self.target.exists() && !self.target.is_dir() {
            return Err(OrganizeError::Configuration(format!(
                "target is not a folder: {}",
                self.target.display()
            )));
        }

        self.compile_filters()?;
        Ok(())
    }

    /// Checks only that every source is an existing folder.
    pub fn validate_sources(&self) -> Result<(), OrganizeError> {
        if self.sources.is_empty() {
            return Err(OrganizeError::Configuration(
                "at least one source folder is required".to_string(),
            ));
        }

        for source in &self.sources {
            if !source.exists() {
                return Err(OrganizeError::Configuration(format!(
                    "source folder does not exist: {}",
                    source.display()
                )));
            }
            if !source.is_dir() {
                return Err(OrganizeError::Configuration(format!(
                    "source is not a folder: {}",
                    source.display()
                )));
            }
        }
        Ok(())
    }

    /// Compiles the filter rules of this configuration.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Rules deciding which scanned files take part in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist that overrides every exclusion.
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for excluding files from a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.tmp", "node_modules/**").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude, case-insensitive.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Pre-compiled filter rules.
///
/// Paths handed to [`CompiledFilters::should_include`] are relative to the
/// source folder being scanned.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
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
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Check if a file should take part in the run.
    ///
    /// Include patterns win; otherwise hidden files or files under hidden
    /// folders, exact names, extensions, globs and regexes exclude, in that order.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return true;
        }

        if !self.enable_hidden_files && relative_path.components().any(is_hidden) {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }

    /// Check if the scan should enter a folder.
    ///
    /// Hidden folders are pruned unless hidden files are enabled or an include
    /// pattern reaches inside them (`.config/**`, `**/*.toml`).
    pub fn should_descend(&self, relative_dir: &Path) -> bool {
        if self.enable_hidden_files || !relative_dir.components().any(is_hidden) {
            return true;
        }

        let dir = relative_dir.to_string_lossy();
        self.include_patterns.iter().any(|pattern| {
            let pattern = pattern.as_str();
            pattern.starts_with('*') || pattern.starts_with(dir.as_ref())
        })
    }
}

fn is_hidden(component: Component<'_>) -> bool {
    matches!(component, Component::Normal(name) if name.to_string_lossy().starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rules_with_exclude(exclude: ExcludeRules) -> FilterRules {
        FilterRules {
            enable_hidden_files: true,
            exclude,
            include: IncludeRules::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.mode, OrganizationMode::ByType);
        assert_eq!(config.duplicates, DuplicateStrategy::Rename);
        assert_eq!(config.junk_threshold, 10240);
        assert!(config.recursive);
        assert!(!config.dry_run);
        assert!(!config.protected_dirs.is_empty());
    }

    #[test]
    fn test_parse_toml_with_snake_case_enums() {
        let config: Configuration = toml::from_str(
            r#"
            sources = ["/a", "/b"]
            target = "/out"
            mode = "by_extension"
            duplicates = "merge_to_duplicates"
            recursive = false
            "#,
        )
        .unwrap();

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.mode, OrganizationMode::ByExtension);
        assert_eq!(config.duplicates, DuplicateStrategy::MergeToDuplicates);
        assert!(!config.recursive);
        assert_eq!(config.junk_threshold, DEFAULT_JUNK_THRESHOLD);
    }

    #[test]
    fn test_save_and_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dirsort.toml");

        let mut config = Configuration::new(vec![PathBuf::from("/downloads")], "/sorted");
        config.mode = OrganizationMode::BySize;
        config.junk_threshold = 0;
        config.save(&path).unwrap();

        let loaded = Configuration::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_explicit_file_errors() {
        let result = Configuration::load(Some(Path::new("/no/such/dirsort.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let config = Configuration::new(
            vec![temp_dir.path().join("missing")],
            temp_dir.path().join("out"),
        );
        assert!(matches!(
            config.validate(),
            Err(OrganizeError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_sources_and_target() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Configuration::new(vec![], temp_dir.path()).validate().is_err());
        assert!(
            Configuration::new(vec![temp_dir.path().to_path_buf()], "")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_validate_rejects_file_as_target() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not_a_dir.txt");
        fs::write(&file, "x").unwrap();
        let config = Configuration::new(vec![temp_dir.path().to_path_buf()], &file);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_missing_target() {
        let temp_dir = TempDir::new().unwrap();
        let config = Configuration::new(
            vec![temp_dir.path().to_path_buf()],
            temp_dir.path().join("not_yet_created"),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hidden_file_excluded_by_default() {
        let compiled = CompiledFilters::new(&FilterRules::default()).unwrap();
        assert!(!compiled.should_include(Path::new(".DS_Store")));
        assert!(compiled.should_include(Path::new("notes.txt")));
    }

    #[test]
    fn test_files_under_hidden_folders_excluded_by_default() {
        let compiled = CompiledFilters::new(&FilterRules::default()).unwrap();
        assert!(!compiled.should_include(Path::new(".git/config")));
        assert!(!compiled.should_include(Path::new("project/.git/objects/pack.txt")));
        assert!(!compiled.should_descend(Path::new(".git")));
        assert!(!compiled.should_descend(Path::new("project/.git")));
        assert!(compiled.should_descend(Path::new("project/src")));
    }

    #[test]
    fn test_hidden_folders_scanned_when_enabled() {
        let compiled = CompiledFilters::new(&FilterRules {
            enable_hidden_files: true,
            ..Default::default()
        })
        .unwrap();
        assert!(compiled.should_descend(Path::new(".cache")));
        assert!(compiled.should_include(Path::new(".cache/blob.bin")));
    }

    #[test]
    fn test_include_pattern_reaches_into_hidden_folder() {
        let compiled = CompiledFilters::new(&FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules::default(),
            include: IncludeRules {
                patterns: vec![".config/**".to_string()],
            },
        })
        .unwrap();

        assert!(compiled.should_descend(Path::new(".config")));
        assert!(!compiled.should_descend(Path::new(".git")));
        assert!(compiled.should_include(Path::new(".config/app/settings.toml")));
        assert!(!compiled.should_include(Path::new(".git/config")));
    }

    #[test]
    fn test_validate_sources_ignores_target() {
        let temp_dir = TempDir::new().unwrap();
        let config = Configuration::new(vec![temp_dir.path().to_path_buf()], "");
        assert!(config.validate_sources().is_ok());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exclude_extensions_case_insensitive() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            extensions: vec!["part".to_string(), ".tmp".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("movie.PART")));
        assert!(!compiled.should_include(Path::new("scratch.tmp")));
        assert!(compiled.should_include(Path::new("movie.mkv")));
    }

    #[test]
    fn test_exclude_glob_respects_directory_boundaries() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            patterns: vec!["**/logs/**".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("logs/app.log")));
        assert!(!compiled.should_include(Path::new("work/logs/app.log")));
        assert!(compiled.should_include(Path::new("my_logs/app.log")));
    }

    #[test]
    fn test_exclude_filename_and_regex() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            filenames: vec!["Thumbs.db".to_string()],
            regex: vec![r"^~\$".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("Thumbs.db")));
        assert!(!compiled.should_include(Path::new("~$report.docx")));
        assert!(compiled.should_include(Path::new("report.docx")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let compiled = CompiledFilters::new(&FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules::default(),
            include: IncludeRules {
                patterns: vec![".keep-me".to_string()],
            },
        })
        .unwrap();

        assert!(compiled.should_include(Path::new(".keep-me")));
        assert!(!compiled.should_include(Path::new(".other")));
    }

    #[test]
    fn test_invalid_patterns_fail_validation() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Configuration::new(vec![temp_dir.path().to_path_buf()], temp_dir.path());
        config.filters.exclude.regex = vec!["[invalid(".to_string()];
        assert!(matches!(
            config.validate(),
            Err(OrganizeError::Configuration(_))
        ));

        config.filters.exclude.regex.clear();
        config.filters.exclude.patterns = vec!["[invalid".to_string()];
        assert!(config.compile_filters().is_err());
    }
}
