//! The engine handle: init, search, finish.
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::aggregator::ResultAggregator;
use crate::classifier::FileClassifier;
use crate::config::{EngineConfig, WorkersBehavior};
use crate::errors::{SearchError, SearchResult};
use crate::filters::IgnoreRules;
use crate::results::{SearchOutput, SearchStats};
use crate::search::matcher::{PatternMatcher, PatternOptions};
use crate::search::pool::WorkerPool;
use crate::search::processor::FileProcessor;
use crate::walker::{PathWalker, WalkOptions};

/// Set while an [`Engine`] exists in this process
static ENGINE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Compiled patterns kept per engine; the cache is emptied when full
const PATTERN_CACHE_LIMIT: usize = 128;

/// A pattern plus the roots to search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub pattern: String,
    pub paths: Vec<PathBuf>,
}

impl SearchRequest {
    pub fn new<P: AsRef<Path>>(pattern: impl Into<String>, paths: &[P]) -> Self {
        Self {
            pattern: pattern.into(),
            paths: paths.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }

    pub fn validate(&self) -> SearchResult<()> {
        if self.pattern.is_empty() {
            return Err(SearchError::EmptyPattern);
        }
        Ok(())
    }
}

/// A running search engine.
///
/// Only one engine may be initialized per process at a time; a second
/// [`Engine::init`] fails with [`SearchError::AlreadyInitialized`] until the
/// first one is finished or dropped. The engine owns a snapshot of its
/// configuration, a worker pool that is reused by every search, and a cache
/// of compiled patterns.
///
/// When the workers run is set by
/// [`EngineConfig::workers_behavior`]; with
/// [`WorkersBehavior::Manual`] they are driven through
/// [`start_workers`](Self::start_workers) and
/// [`stop_workers`](Self::stop_workers).
///
/// # Example
///
/// ```no_run
/// use agsearch::{default_config, Engine};
///
/// let mut config = default_config();
/// config.num_workers = 4;
/// let engine = Engine::init(config)?;
/// let output = engine.search("foo", &["src"])?;
/// for file in &output.results {
///     println!("{}: {} matches", file.file.path.display(), file.matches.len());
/// }
/// engine.finish();
/// # Ok::<(), agsearch::SearchError>(())
/// ```
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    pool: Option<WorkerPool>,
    rules: Arc<IgnoreRules>,
    patterns: DashMap<(String, PatternOptions), Arc<PatternMatcher>>,
    last_stats: Mutex<Option<SearchStats>>,
}

impl Engine {
    /// Validates `config`, takes a snapshot of it and starts the workers
    /// unless `workers_behavior` defers that
    pub fn init(config: EngineConfig) -> SearchResult<Self> {
        config.validate()?;

        if ENGINE_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SearchError::AlreadyInitialized);
        }

        let pool = match config.workers_behavior {
            WorkersBehavior::OnInit => match WorkerPool::new(config.num_workers) {
                Ok(pool) => Some(pool),
                Err(e) => {
                    ENGINE_ACTIVE.store(false, Ordering::Release);
                    return Err(e);
                }
            },
            WorkersBehavior::Manual | WorkersBehavior::OnSearch => None,
        };

        let rules = Arc::new(IgnoreRules::new(&config.ignore_patterns));
        info!(
            "Engine initialized with {} workers, {} ignore rules",
            config.num_workers,
            rules.len()
        );

        Ok(Self {
            config,
            pool,
            rules,
            patterns: DashMap::new(),
            last_stats: Mutex::new(None),
        })
    }

    /// The configuration snapshot in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the configuration of a live engine.
    ///
    /// The new config is validated first; on error nothing changes. Running
    /// workers stay running and are restarted only when `num_workers`
    /// changed. Ignore rules are rebuilt and the pattern cache is emptied.
    pub fn set_config(&mut self, config: EngineConfig) -> SearchResult<()> {
        config.validate()?;

        if let Some(pool) = &self.pool {
            if pool.num_workers() != config.num_workers {
                debug!(
                    "Resizing workers from {} to {}",
                    pool.num_workers(),
                    config.num_workers
                );
                self.pool = Some(WorkerPool::new(config.num_workers)?);
            }
        }

        self.rules = Arc::new(IgnoreRules::new(&config.ignore_patterns));
        self.patterns.clear();
        self.config = config;
        info!(
            "Engine reconfigured: {} workers, {} ignore rules",
            self.config.num_workers,
            self.rules.len()
        );
        Ok(())
    }

    /// Starts the worker threads; fails if they are already running
    pub fn start_workers(&mut self) -> SearchResult<()> {
        if self.pool.is_some() {
            return Err(SearchError::WorkersRunning);
        }
        self.pool = Some(WorkerPool::new(self.config.num_workers)?);
        Ok(())
    }

    /// Stops the worker threads; fails if none are running
    pub fn stop_workers(&mut self) -> SearchResult<()> {
        match self.pool.take() {
            Some(_) => {
                debug!("Workers stopped");
                Ok(())
            }
            None => Err(SearchError::WorkersStopped),
        }
    }

    pub fn workers_running(&self) -> bool {
        self.pool.is_some()
    }

    /// Stats of the most recent completed search
    pub fn last_stats(&self) -> Option<SearchStats> {
        *self.last_stats.lock()
    }

    /// Searches every file under `paths` for `pattern`
    pub fn search<P: AsRef<Path>>(&self, pattern: &str, paths: &[P]) -> SearchResult<SearchOutput> {
        self.search_request(&SearchRequest::new(pattern, paths))
    }

    /// Runs one search.
    ///
    /// Pattern problems are fatal and reported before any file is touched.
    /// Problems with individual paths are collected in
    /// [`SearchOutput::warnings`] and never abort the search.
    pub fn search_request(&self, request: &SearchRequest) -> SearchResult<SearchOutput> {
        let started = Instant::now();
        request.validate()?;
        let matcher = self.matcher_for(&request.pattern)?;

        let on_search;
        let pool = match (&self.pool, self.config.workers_behavior) {
            (Some(pool), _) => pool,
            (None, WorkersBehavior::OnSearch) => {
                on_search = WorkerPool::new(self.config.num_workers)?;
                &on_search
            }
            (None, _) => return Err(SearchError::WorkersStopped),
        };

        if request.paths.is_empty() {
            debug!("No paths given, returning empty result");
            *self.last_stats.lock() = Some(SearchStats::default());
            return Ok(SearchOutput::new());
        }

        info!(
            "Searching {} path(s) for {:?}",
            request.paths.len(),
            request.pattern
        );

        let deadline = self.config.timeout.map(|timeout| started + timeout);
        let processor = FileProcessor::new(
            matcher,
            FileClassifier::new(self.config.search_binary_files),
            self.config.max_matches_per_file,
            self.config.chunk_overlap,
        );
        let aggregator = ResultAggregator::new(self.config.deterministic);
        let walker = PathWalker::new(
            &request.paths,
            WalkOptions::from(&self.config),
            Arc::clone(&self.rules),
        );

        pool.run(walker, &processor, &aggregator, deadline);

        let elapsed = started.elapsed();
        processor.metrics().log_stats(elapsed);
        let stats = processor.metrics().get_stats(elapsed);
        *self.last_stats.lock() = Some(stats);

        let output = aggregator.finalize(stats);
        info!(
            "Search complete: {} matches in {} files{}",
            output.nresults,
            output.results.len(),
            if output.timed_out() { " (timed out)" } else { "" }
        );
        Ok(output)
    }

    /// Shuts the engine down; another engine may be initialized afterwards
    pub fn finish(self) {
        drop(self);
    }

    fn matcher_for(&self, pattern: &str) -> SearchResult<Arc<PatternMatcher>> {
        let options = PatternOptions {
            case_sensitive: self.config.is_case_sensitive_for(pattern),
            literal: self.config.literal,
        };
        let key = (pattern.to_string(), options);

        if let Some(cached) = self.patterns.get(&key) {
            debug!("Pattern cache hit: {:?}", pattern);
            return Ok(Arc::clone(cached.value()));
        }

        debug!("Pattern cache miss: {:?}", pattern);
        let matcher = Arc::new(PatternMatcher::compile(pattern, options)?);
        if self.patterns.len() >= PATTERN_CACHE_LIMIT {
            debug!("Pattern cache full, clearing {} entries", self.patterns.len());
            self.patterns.clear();
        }
        self.patterns.insert(key, Arc::clone(&matcher));
        Ok(matcher)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.patterns.clear();
        ENGINE_ACTIVE.store(false, Ordering::Release);
        debug!("Engine finished");
    }
}

/// Serializes tests that create engines, since only one may exist at a time
#[cfg(test)]
pub(crate) static TEST_ENGINE_LOCK: Mutex<()> = Mutex::new(());
