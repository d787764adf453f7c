use memmap2::Mmap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

use super::matcher::PatternMatcher;
use crate::classifier::FileClassifier;
use crate::errors::{SearchError, SearchResult};
use crate::metrics::{ReadStrategy, SearchMetrics};
use crate::results::{FileResult, Match, ResultFlags};

// Constants for file processing
const BUFFER_CAPACITY: usize = 65536;
pub(crate) const SMALL_FILE_THRESHOLD: u64 = 32 * 1024; // 32KB
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// Runs one work unit: classify, read, scan
#[derive(Debug)]
pub struct FileProcessor {
    matcher: Arc<PatternMatcher>,
    classifier: FileClassifier,
    metrics: SearchMetrics,
    max_matches: Option<usize>,
    chunk_overlap: usize,
    small_threshold: u64,
    large_threshold: u64,
}

struct Scanned {
    matches: Vec<Match>,
    truncated: bool,
    bytes: u64,
    strategy: ReadStrategy,
}

impl FileProcessor {
    /// Creates a new FileProcessor for a compiled pattern
    pub fn new(
        matcher: Arc<PatternMatcher>,
        classifier: FileClassifier,
        max_matches: Option<usize>,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            matcher,
            classifier,
            metrics: SearchMetrics::new(),
            max_matches,
            chunk_overlap,
            small_threshold: SMALL_FILE_THRESHOLD,
            large_threshold: LARGE_FILE_THRESHOLD,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_thresholds(mut self, small: u64, large: u64) -> Self {
        self.small_threshold = small;
        self.large_threshold = large;
        self
    }

    /// Gets the counters of the current search
    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    /// Processes a file and returns its result when it has matches.
    ///
    /// Returns `Ok(None)` for files that are not eligible (binary while
    /// binary search is off) and for files without matches.
    pub fn process_file(&self, path: &Path) -> SearchResult<Option<FileResult>> {
        trace!("Processing file: {}", path.display());

        let mut entry = self.classifier.classify(path)?;
        if !self.classifier.is_eligible(&entry) {
            trace!("Skipping binary file: {}", path.display());
            self.metrics.record_binary_skipped();
            return Ok(None);
        }

        // Choose processing strategy based on file size
        let scanned = if entry.size < self.small_threshold {
            self.process_small_file(path)?
        } else if entry.size >= self.large_threshold {
            self.process_large_file(path)?
        } else {
            self.process_mmap_file(path)?
        };

        // Spans are checked against what was actually read
        entry.size = scanned.bytes;
        self.metrics
            .record_file_scanned(scanned.bytes, scanned.strategy);
        self.metrics.record_matches(scanned.matches.len());

        if scanned.matches.is_empty() {
            return Ok(None);
        }

        let mut flags = if entry.is_binary {
            ResultFlags::BINARY
        } else {
            ResultFlags::TEXT
        };
        if scanned.truncated {
            flags |= ResultFlags::TRUNCATED;
        }

        trace!(
            "Found {} matches in file {}",
            scanned.matches.len(),
            path.display()
        );
        Ok(Some(FileResult {
            file: entry,
            matches: scanned.matches,
            flags,
        }))
    }

    /// Process a small file by reading it whole
    fn process_small_file(&self, path: &Path) -> SearchResult<Scanned> {
        let bytes = std::fs::read(path).map_err(|e| SearchError::from_io(path, e))?;
        let (matches, truncated) = self.matcher.scan_limited(&bytes, self.max_matches);
        Ok(Scanned {
            matches,
            truncated,
            bytes: bytes.len() as u64,
            strategy: ReadStrategy::Whole,
        })
    }

    /// Process a file using memory mapping
    fn process_mmap_file(&self, path: &Path) -> SearchResult<Scanned> {
        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        // SAFETY: the map is read-only and dropped before this function returns
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| SearchError::from_io(path, e))?;
        let (matches, truncated) = self.matcher.scan_limited(&mmap, self.max_matches);
        Ok(Scanned {
            matches,
            truncated,
            bytes: mmap.len() as u64,
            strategy: ReadStrategy::Mmap,
        })
    }

    /// Process a large file in bounded chunks
    fn process_large_file(&self, path: &Path) -> SearchResult<Scanned> {
        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        let reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let scan = self
            .matcher
            .scan_reader(reader, self.chunk_overlap, self.max_matches)
            .map_err(|e| SearchError::from_io(path, e))?;
        Ok(Scanned {
            matches: scan.matches,
            truncated: scan.truncated,
            bytes: scan.bytes_read,
            strategy: ReadStrategy::Chunked,
        })
    }
}
