//! Lazy enumeration of candidate files under a set of root paths.
use ignore::{Walk, WalkBuilder};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::errors::SearchError;
use crate::filters::IgnoreRules;
use crate::results::SkippedPath;

/// Name of the engine's own ignore file, read next to .gitignore/.ignore
pub const IGNORE_FILENAME: &str = ".agignore";

/// The walk-related subset of the engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    pub recurse_dirs: bool,
    pub follow_symlinks: bool,
    pub skip_hidden: bool,
    pub respect_ignore_files: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for WalkOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            recurse_dirs: config.recurse_dirs,
            follow_symlinks: config.follow_symlinks,
            skip_hidden: config.skip_hidden,
            respect_ignore_files: config.respect_ignore_files,
        }
    }
}

/// Iterator over the files under a list of roots.
///
/// Roots are walked one after another and made absolute first. Each item is
/// either a file path or a [`SkippedPath`] for a root or directory that
/// could not be read; the walk always continues past those. When following
/// symlinks, directory cycles are reported as skipped instead of being
/// entered, and a file reached twice (overlapping roots, links) is yielded
/// once.
pub struct PathWalker {
    roots: VecDeque<PathBuf>,
    current: Option<Walk>,
    options: WalkOptions,
    rules: Arc<IgnoreRules>,
    seen: Option<HashSet<PathBuf>>,
}

impl PathWalker {
    pub fn new<P: AsRef<Path>>(roots: &[P], options: WalkOptions, rules: Arc<IgnoreRules>) -> Self {
        let dedupe = roots.len() > 1 || options.follow_symlinks;
        Self {
            roots: roots.iter().map(|r| r.as_ref().to_path_buf()).collect(),
            current: None,
            options,
            rules,
            seen: dedupe.then(HashSet::new),
        }
    }

    fn build_walk(&self, root: &Path) -> Walk {
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(self.options.skip_hidden)
            .ignore(self.options.respect_ignore_files)
            .git_ignore(self.options.respect_ignore_files)
            .git_global(self.options.respect_ignore_files)
            .git_exclude(self.options.respect_ignore_files)
            .parents(self.options.respect_ignore_files)
            .require_git(false)
            .follow_links(self.options.follow_symlinks)
            .max_depth(if self.options.recurse_dirs {
                None
            } else {
                Some(1)
            });

        if self.options.respect_ignore_files {
            builder.add_custom_ignore_filename(IGNORE_FILENAME);
        }

        if !self.rules.is_empty() {
            let rules = Arc::clone(&self.rules);
            let base = root.to_path_buf();
            builder.filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let relative = entry.path().strip_prefix(&base).unwrap_or(entry.path());
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !rules.is_ignored(relative, is_dir)
            });
        }

        builder.build()
    }

    /// Moves to the next root; yields a skip record when it cannot be resolved
    fn advance_root(&mut self) -> Option<Result<(), SkippedPath>> {
        let root = self.roots.pop_front()?;
        match root.canonicalize() {
            Ok(absolute) => {
                debug!("Walking root: {}", absolute.display());
                self.current = Some(self.build_walk(&absolute));
                Some(Ok(()))
            }
            Err(e) => {
                warn!("Skipping root {}: {}", root.display(), e);
                Some(Err(SkippedPath::new(Some(root), e)))
            }
        }
    }

    fn is_new(&mut self, path: &Path) -> bool {
        let Some(seen) = self.seen.as_mut() else {
            return true;
        };
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        seen.insert(key)
    }
}

impl Iterator for PathWalker {
    type Item = Result<PathBuf, SkippedPath>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(walk) = self.current.as_mut() else {
                match self.advance_root()? {
                    Ok(()) => continue,
                    Err(skipped) => return Some(Err(skipped)),
                }
            };

            match walk.next() {
                None => self.current = None,
                Some(Ok(entry)) => {
                    if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                        continue;
                    }
                    let path = entry.into_path();
                    if !self.is_new(&path) {
                        trace!("Already visited: {}", path.display());
                        continue;
                    }
                    trace!("Queueing file: {}", path.display());
                    return Some(Ok(path));
                }
                Some(Err(err)) => {
                    warn!("Skipping unreadable path: {}", err);
                    let path = error_path(&err);
                    return Some(Err(SkippedPath::new(path, SearchError::from(err))));
                }
            }
        }
    }
}

fn error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child.clone()),
        _ => None,
    }
}
