use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, trace, warn};

use super::processor::FileProcessor;
use crate::aggregator::ResultAggregator;
use crate::errors::{SearchError, SearchResult};
use crate::results::SkippedPath;

/// Queue slots per worker
const QUEUE_DEPTH_PER_WORKER: usize = 64;

/// A fixed set of workers that pull files from one shared queue.
///
/// The threads live as long as the pool, so consecutive searches reuse them.
/// Each [`run`](Self::run) spawns exactly `num_workers` worker tasks, feeds
/// them from the calling thread and returns once every worker has drained
/// the queue.
pub struct WorkerPool {
    pool: ThreadPool,
    num_workers: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_workers", &self.num_workers)
            .finish()
    }
}

impl WorkerPool {
    pub fn new(num_workers: usize) -> SearchResult<Self> {
        if num_workers < 1 {
            return Err(SearchError::config_error("num_workers must be at least 1"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("agsearch-worker-{}", i))
            .build()
            .map_err(|e| SearchError::config_error(format!("failed to start workers: {}", e)))?;
        debug!("Started worker pool with {} threads", num_workers);
        Ok(Self { pool, num_workers })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Runs one search over `paths`.
    ///
    /// `paths` is consumed on the calling thread while the workers process
    /// what it yields; skipped paths go straight to the aggregator. Once
    /// `deadline` passes, workers stop taking work and the aggregator is
    /// marked as timed out.
    pub fn run<I>(
        &self,
        paths: I,
        processor: &FileProcessor,
        aggregator: &ResultAggregator,
        deadline: Option<Instant>,
    ) where
        I: IntoIterator<Item = Result<PathBuf, SkippedPath>>,
    {
        let (tx, rx) = bounded::<PathBuf>(self.num_workers * QUEUE_DEPTH_PER_WORKER);

        self.pool.in_place_scope(|scope| {
            for id in 0..self.num_workers {
                let rx = rx.clone();
                scope.spawn(move |_| worker_loop(id, rx, processor, aggregator, deadline));
            }
            drop(rx);

            let mut queued = 0usize;
            for item in paths {
                if is_expired(deadline) {
                    warn!("Search timed out while walking, {} files queued", queued);
                    aggregator.mark_timed_out();
                    break;
                }
                match item {
                    Ok(path) => match enqueue(&tx, path, deadline) {
                        Enqueue::Sent => queued += 1,
                        Enqueue::TimedOut => {
                            warn!("Search timed out while walking, {} files queued", queued);
                            aggregator.mark_timed_out();
                            break;
                        }
                        Enqueue::Closed => {
                            debug!("All workers stopped, ending walk early");
                            break;
                        }
                    },
                    Err(skipped) => {
                        processor.metrics().record_warning();
                        aggregator.warn(skipped);
                    }
                }
            }
            debug!("Walk finished, {} files queued", queued);
            // Closing the queue lets idle workers exit
            drop(tx);
        });
    }
}

enum Enqueue {
    Sent,
    TimedOut,
    Closed,
}

fn enqueue(tx: &Sender<PathBuf>, path: PathBuf, deadline: Option<Instant>) -> Enqueue {
    match deadline {
        Some(deadline) => match tx.send_deadline(path, deadline) {
            Ok(()) => Enqueue::Sent,
            Err(SendTimeoutError::Timeout(_)) => Enqueue::TimedOut,
            Err(SendTimeoutError::Disconnected(_)) => Enqueue::Closed,
        },
        None => match tx.send(path) {
            Ok(()) => Enqueue::Sent,
            Err(_) => Enqueue::Closed,
        },
    }
}

fn is_expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

fn worker_loop(
    id: usize,
    rx: Receiver<PathBuf>,
    processor: &FileProcessor,
    aggregator: &ResultAggregator,
    deadline: Option<Instant>,
) {
    trace!("Worker {} started", id);
    let mut processed = 0usize;

    loop {
        // Queued work is abandoned once the deadline has passed
        if is_expired(deadline) {
            aggregator.mark_timed_out();
            break;
        }
        let path = match deadline {
            Some(deadline) => match rx.recv_deadline(deadline) {
                Ok(path) => path,
                Err(RecvTimeoutError::Timeout) => {
                    aggregator.mark_timed_out();
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(path) => path,
                Err(_) => break,
            },
        };
        if is_expired(deadline) {
            aggregator.mark_timed_out();
            break;
        }

        match processor.process_file(&path) {
            Ok(Some(result)) => aggregator.push(result),
            Ok(None) => {}
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                processor.metrics().record_warning();
                aggregator.warn(SkippedPath::new(Some(path), e));
            }
        }
        processed += 1;
    }

    trace!("Worker {} finished after {} files", id, processed);
}
