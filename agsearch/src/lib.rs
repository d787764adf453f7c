//! Multi-threaded recursive search of file contents.
//!
//! An [`Engine`] is initialized once from an [`EngineConfig`], then runs any
//! number of searches. Each search walks the given roots, skips binary and
//! ignored files, scans the rest with a fixed pool of workers and returns
//! every match with its byte span:
//!
//! ```no_run
//! use agsearch::{default_config, Engine};
//!
//! let engine = Engine::init(default_config())?;
//! let output = engine.search(r"fo+\b", &["."])?;
//! println!("{}", output.to_json().unwrap_or_default());
//! engine.finish();
//! # Ok::<(), agsearch::SearchError>(())
//! ```
pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod errors;
pub mod filters;
pub mod logging;
pub mod metrics;
pub mod results;
pub mod search;
pub mod walker;

pub use config::{default_config, EngineConfig, WorkersBehavior};
pub use engine::{Engine, SearchRequest};
pub use errors::{SearchError, SearchResult};
pub use logging::init_logging;
pub use results::{
    FileEntry, FileResult, Match, ResultFlags, SearchOutput, SearchStats, SkippedPath,
};
