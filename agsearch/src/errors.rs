//! Error types for the search engine.
//!
//! Errors fall into three groups:
//!
//! 1. **Configuration errors** (`Config`, `ConfigLoad`, `AlreadyInitialized`)
//!    are fatal to [`Engine::init`](crate::Engine::init).
//!    `WorkersRunning` and `WorkersStopped` report worker start/stop calls
//!    made in the wrong state.
//! 2. **Pattern errors** (`EmptyPattern`, `InvalidPattern`) are fatal to a
//!    search and are reported before any worker starts.
//! 3. **I/O errors** (`FileNotFound`, `PermissionDenied`, `Io`, `Walk`) only
//!    ever concern a single path. Inside a search they are turned into
//!    [`SkippedPath`](crate::results::SkippedPath) warnings and the search
//!    carries on.
//!
//! ```rust,ignore
//! match engine.search("fo+", &["src"]) {
//!     Ok(output) => println!("{} matches", output.nresults),
//!     Err(e) if e.is_pattern_error() => eprintln!("bad pattern: {}", e),
//!     Err(e) => eprintln!("search failed: {}", e),
//! }
//! ```
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for engine operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur while configuring the engine or running a search
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),
    #[error("Search engine is already initialized")]
    AlreadyInitialized,
    #[error("Workers are already running")]
    WorkersRunning,
    #[error("Workers are not running")]
    WorkersStopped,
    #[error("Empty search pattern")]
    EmptyPattern,
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(String),
}

impl SearchError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Maps an I/O error on `path` to the matching variant
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::Io(err),
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::ConfigLoad(_) | Self::AlreadyInitialized
        )
    }

    /// Start/stop called in the wrong state, or a search with stopped workers
    pub fn is_workers_error(&self) -> bool {
        matches!(self, Self::WorkersRunning | Self::WorkersStopped)
    }

    pub fn is_pattern_error(&self) -> bool {
        matches!(self, Self::EmptyPattern | Self::InvalidPattern { .. })
    }

    /// True for errors that concern a single path and never abort a search
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::PermissionDenied(_) | Self::Io(_) | Self::Walk(_)
        )
    }
}

impl From<ignore::Error> for SearchError {
    fn from(err: ignore::Error) -> Self {
        let msg = err.to_string();
        match err.into_io_error() {
            Some(io) => Self::Io(io),
            None => Self::Walk(msg),
        }
    }
}
