use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use crate::results::SearchStats;

/// Per-search counters shared by all workers
#[derive(Debug, Default)]
pub struct SearchMetrics {
    // Scan volume
    total_bytes: AtomicU64,
    total_files: AtomicU64,

    // Match counts
    total_matches: AtomicU64,
    total_file_matches: AtomicU64,

    // Skips
    binary_files_skipped: AtomicU64,
    warnings: AtomicU64,

    // Read strategy mix
    small_files: AtomicU64,
    mmap_files: AtomicU64,
    chunked_files: AtomicU64,
}

/// How a file's content was read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    Whole,
    Mmap,
    Chunked,
}

impl SearchMetrics {
    /// Creates a new SearchMetrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one scanned file
    pub fn record_file_scanned(&self, bytes: u64, strategy: ReadStrategy) {
        self.total_files.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
        let counter = match strategy {
            ReadStrategy::Whole => &self.small_files,
            ReadStrategy::Mmap => &self.mmap_files,
            ReadStrategy::Chunked => &self.chunked_files,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the matches of one file
    pub fn record_matches(&self, count: usize) {
        if count > 0 {
            self.total_matches
                .fetch_add(count as u64, Ordering::Relaxed);
            self.total_file_matches.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_binary_skipped(&self) {
        self.binary_files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warning(&self) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the counters
    pub fn get_stats(&self, elapsed: Duration) -> SearchStats {
        SearchStats {
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            total_files: self.total_files.load(Ordering::Relaxed),
            total_matches: self.total_matches.load(Ordering::Relaxed),
            total_file_matches: self.total_file_matches.load(Ordering::Relaxed),
            binary_files_skipped: self.binary_files_skipped.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            elapsed,
        }
    }

    /// Logs the counters of a finished search
    pub fn log_stats(&self, elapsed: Duration) {
        let stats = self.get_stats(elapsed);
        info!(
            "Search stats: {} bytes in {} files, {} matches in {} files, \
             {} binary skipped, {} warnings, took {}",
            stats.total_bytes,
            stats.total_files,
            stats.total_matches,
            stats.total_file_matches,
            stats.binary_files_skipped,
            stats.warnings,
            humantime::format_duration(elapsed)
        );
        debug!(
            "Files read (whole/mmap/chunked): {}/{}/{}",
            self.small_files.load(Ordering::Relaxed),
            self.mmap_files.load(Ordering::Relaxed),
            self.chunked_files.load(Ordering::Relaxed)
        );
    }
}
