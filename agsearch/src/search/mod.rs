//! The per-file search machinery.
//!
//! - [`matcher`] compiles a pattern once and finds every non-overlapping
//!   match in a byte buffer or a reader.
//! - [`processor`] runs one work unit: classify a file, pick a read strategy
//!   by size (whole read, memory map or chunked stream) and scan it.
//! - [`pool`] drives a fixed number of workers over the files the walker
//!   yields and hands their results to the aggregator.
pub mod matcher;
pub mod pool;
pub mod processor;

pub use matcher::{PatternMatcher, PatternOptions};
pub use pool::WorkerPool;
pub use processor::FileProcessor;
