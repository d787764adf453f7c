//! Thread-safe collection of per-file results.
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::results::{FileResult, ResultFlags, SearchOutput, SearchStats, SkippedPath};

/// Collects results from any number of workers.
///
/// [`finalize`](Self::finalize) consumes the aggregator, so an output can
/// only be produced once and only after every worker has let go of it.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Mutex<Vec<FileResult>>,
    warnings: Mutex<Vec<SkippedPath>>,
    timed_out: AtomicBool,
    deterministic: bool,
}

impl ResultAggregator {
    pub fn new(deterministic: bool) -> Self {
        Self {
            deterministic,
            ..Default::default()
        }
    }

    /// Adds a file result; results without matches are dropped
    pub fn push(&self, result: FileResult) {
        if result.matches.is_empty() {
            return;
        }
        self.results.lock().push(result);
    }

    pub fn warn(&self, skipped: SkippedPath) {
        self.warnings.lock().push(skipped);
    }

    pub fn mark_timed_out(&self) {
        self.timed_out.store(true, Ordering::Relaxed);
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Builds the final output.
    ///
    /// Without deterministic mode results keep the order in which workers
    /// finished them. With it, results and warnings are sorted by the raw
    /// bytes of their paths, not component by component.
    pub fn finalize(self, stats: SearchStats) -> SearchOutput {
        let mut results = self.results.into_inner();
        let mut warnings = self.warnings.into_inner();

        if self.deterministic {
            results.sort_by(|a, b| path_bytes(&a.file.path).cmp(path_bytes(&b.file.path)));
            warnings.sort_by(|a, b| {
                let a_path = a.path.as_deref().map(path_bytes);
                let b_path = b.path.as_deref().map(path_bytes);
                a_path.cmp(&b_path).then_with(|| a.reason.cmp(&b.reason))
            });
        }

        let nresults = results.iter().map(|r| r.matches.len()).sum();
        let flags = if self.timed_out.load(Ordering::Relaxed) {
            ResultFlags::TIMED_OUT
        } else {
            ResultFlags::empty()
        };

        SearchOutput {
            nresults,
            results,
            flags,
            warnings,
            stats,
        }
    }
}

fn path_bytes(path: &Path) -> &[u8] {
    path.as_os_str().as_encoded_bytes()
}
