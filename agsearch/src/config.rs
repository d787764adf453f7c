use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{SearchError, SearchResult};

/// Default number of workers, and the cap used when sizing from the CPU count
pub const DEFAULT_WORKERS: usize = 8;

/// Default overlap window (bytes) for chunked scans of regex patterns
pub const DEFAULT_CHUNK_OVERLAP: usize = 4096;

/// Engine-wide search configuration.
///
/// A config is plain data: build one with [`default_config`], adjust the
/// public fields, then hand it to [`Engine::init`](crate::Engine::init),
/// which takes its own snapshot. Changing the original afterwards has no
/// effect on the running engine.
///
/// # Configuration Locations
///
/// [`EngineConfig::load`] layers these files, later ones winning:
/// 1. Global `$CONFIG_DIR/agsearch/config.yaml`
/// 2. Local `.agsearch.yaml` in the current directory
/// 3. A file passed to [`EngineConfig::load_from`]
///
/// # Configuration Format
///
/// ```yaml
/// # Concurrent workers (>= 1)
/// num_workers: 4
///
/// # Search files classified as binary
/// search_binary_files: false
///
/// # Glob rules; later rules override earlier ones, "!" re-includes
/// ignore_patterns:
///   - "*.log"
///   - "build/"
///   - "!build/keep.log"
///
/// case_sensitive: true
/// deterministic: true
///
/// # Stop dequeuing work after this long
/// timeout: "2s"
///
/// # on_init, manual or on_search
/// workers_behavior: on_search
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of concurrent workers (must be at least 1)
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Whether files classified as binary are scanned too
    #[serde(default)]
    pub search_binary_files: bool,

    /// Ignore rules (glob syntax)
    /// Examples:
    /// - "*.min.js": ignore minified files at any depth
    /// - "target/": ignore directories named target
    /// - "docs/*.md": ignore markdown directly under docs/ of the walk root
    /// - "!keep.md": re-include a file an earlier rule ignored
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Case-sensitive matching
    #[serde(default = "default_true")]
    pub case_sensitive: bool,

    /// When set, an all-lowercase pattern matches case-insensitively and any
    /// other pattern case-sensitively, overriding `case_sensitive`
    #[serde(default)]
    pub smart_case: bool,

    /// Treat the pattern as a fixed string instead of a regular expression
    #[serde(default)]
    pub literal: bool,

    /// Descend into subdirectories of the given roots
    #[serde(default = "default_true")]
    pub recurse_dirs: bool,

    /// Follow symbolic links while walking
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories
    #[serde(default = "default_true")]
    pub skip_hidden: bool,

    /// Honor .gitignore, .ignore and .agignore files
    #[serde(default = "default_true")]
    pub respect_ignore_files: bool,

    /// Sort results by path so repeated searches compare equal
    #[serde(default)]
    pub deterministic: bool,

    /// Stop collecting matches in a file after this many
    #[serde(default)]
    pub max_matches_per_file: Option<usize>,

    /// Wall-clock budget for one search
    #[serde(default, with = "humantime_opt")]
    pub timeout: Option<Duration>,

    /// When the worker threads run: from init until finish (default),
    /// only between explicit start/stop calls, or only during each search
    #[serde(default)]
    pub workers_behavior: WorkersBehavior,

    /// Bytes carried between chunks when scanning large files with a regex
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Lifecycle of the engine's worker threads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkersBehavior {
    /// Started by `Engine::init`, stopped by `Engine::finish`
    #[default]
    OnInit,
    /// Started and stopped only through `Engine::start_workers` and
    /// `Engine::stop_workers`; searching with stopped workers is an error
    Manual,
    /// Started at the beginning of every search and stopped at its end
    OnSearch,
}

/// Returns the default engine configuration: eight workers, binary files
/// skipped, case-sensitive matching and no ignore rules.
pub fn default_config() -> EngineConfig {
    EngineConfig::default()
}

fn default_num_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_true() -> bool {
    true
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            search_binary_files: false,
            ignore_patterns: Vec::new(),
            case_sensitive: true,
            smart_case: false,
            literal: false,
            recurse_dirs: true,
            follow_symlinks: false,
            skip_hidden: true,
            respect_ignore_files: true,
            deterministic: false,
            max_matches_per_file: None,
            timeout: None,
            workers_behavior: WorkersBehavior::default(),
            chunk_overlap: default_chunk_overlap(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus an optional file
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("agsearch/config.yaml")),
            Some(PathBuf::from(".agsearch.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicit file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Sizes the pool from the CPU count, capped at [`DEFAULT_WORKERS`]
    pub fn with_available_parallelism(mut self) -> Self {
        self.num_workers = num_cpus::get().clamp(1, DEFAULT_WORKERS);
        self
    }

    /// Checks the invariants `Engine::init` relies on
    pub fn validate(&self) -> SearchResult<()> {
        if self.num_workers < 1 {
            return Err(SearchError::config_error(
                "num_workers must be at least 1",
            ));
        }
        if self.chunk_overlap == 0 {
            return Err(SearchError::config_error(
                "chunk_overlap must be at least 1",
            ));
        }
        if matches!(self.max_matches_per_file, Some(0)) {
            return Err(SearchError::config_error(
                "max_matches_per_file must be at least 1 when set",
            ));
        }
        Ok(())
    }

    /// Resolves case sensitivity for a concrete pattern
    pub fn is_case_sensitive_for(&self, pattern: &str) -> bool {
        if self.smart_case {
            pattern.chars().any(|c| c.is_uppercase())
        } else {
            self.case_sensitive
        }
    }
}

/// Serde adapter for optional humantime durations ("500ms", "2s", "1m 30s")
mod humantime_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
