//! Ignore-rule evaluation for the path walker.
//!
//! Rules are glob patterns evaluated in order against paths relative to the
//! walk root, with gitignore-like shape:
//!
//! - `*.log` (no slash): matches the name of a file or directory at any depth
//! - `docs/*.md` (with a slash): matches the path relative to the walk root
//! - `build/` (trailing slash): only matches directories
//! - `!keep.log` (leading bang): re-includes what an earlier rule ignored
//!
//! When several rules match the same path the last one decides, so a later
//! rule always overrides an earlier one.
use glob::{MatchOptions, Pattern};
use std::path::Path;
use tracing::warn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A single compiled ignore rule
#[derive(Debug, Clone)]
struct IgnoreRule {
    pattern: Pattern,
    negated: bool,
    dir_only: bool,
    anchored: bool,
}

impl IgnoreRule {
    fn parse(raw: &str) -> Option<Self> {
        let mut text = raw.trim();
        if text.is_empty() {
            return None;
        }

        let negated = text.starts_with('!');
        if negated {
            text = &text[1..];
        }
        let dir_only = text.ends_with('/');
        let text = text.trim_end_matches('/');
        let anchored = text.contains('/');
        let text = text.trim_start_matches('/');
        if text.is_empty() {
            return None;
        }

        match Pattern::new(text) {
            Ok(pattern) => Some(Self {
                pattern,
                negated,
                dir_only,
                anchored,
            }),
            Err(e) => {
                warn!("Skipping invalid ignore pattern '{}': {}", raw, e);
                None
            }
        }
    }

    fn matches(&self, relative: &str, name: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        if self.anchored {
            self.pattern.matches_with(relative, MATCH_OPTIONS)
        } else {
            self.pattern.matches_with(name, MATCH_OPTIONS)
        }
    }
}

/// An ordered set of ignore rules
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    /// Compiles the given patterns, skipping (and logging) invalid ones
    pub fn new(patterns: &[String]) -> Self {
        Self {
            rules: patterns.iter().filter_map(|p| IgnoreRule::parse(p)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Decides whether `relative` (a path relative to the walk root) is ignored
    pub fn is_ignored(&self, relative: &Path, is_dir: bool) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        let normalized = relative.to_string_lossy().replace('\\', "/");
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(&normalized, &name, is_dir))
            .is_some_and(|rule| !rule.negated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(patterns: &[&str]) -> IgnoreRules {
        IgnoreRules::new(&patterns.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_name_patterns_match_at_any_depth() {
        let rules = rules(&["*.tmp", "test_[0-4].txt"]);

        assert!(rules.is_ignored(Path::new("a.tmp"), false));
        assert!(rules.is_ignored(Path::new("src/deep/b.tmp"), false));
        assert!(rules.is_ignored(Path::new("dir/test_2.txt"), false));

        assert!(!rules.is_ignored(Path::new("test_5.txt"), false));
        assert!(!rules.is_ignored(Path::new("src/main.rs"), false));
    }

    #[test]
    fn test_anchored_patterns() {
        let rules = rules(&["docs/*.md", "/top.txt"]);

        assert!(rules.is_ignored(Path::new("docs/readme.md"), false));
        assert!(!rules.is_ignored(Path::new("docs/nested/readme.md"), false));
        assert!(!rules.is_ignored(Path::new("other/docs/readme.md"), false));
        assert!(rules.is_ignored(Path::new("top.txt"), false));
        assert!(!rules.is_ignored(Path::new("sub/top.txt"), false));
    }

    #[test]
    fn test_dir_only_patterns() {
        let rules = rules(&["build/"]);

        assert!(rules.is_ignored(Path::new("build"), true));
        assert!(rules.is_ignored(Path::new("nested/build"), true));
        assert!(!rules.is_ignored(Path::new("build"), false));
    }

    #[test]
    fn test_later_rules_override_earlier_ones() {
        let rules = rules(&["*.log", "!keep.log"]);
        assert!(rules.is_ignored(Path::new("drop.log"), false));
        assert!(!rules.is_ignored(Path::new("keep.log"), false));

        let rules = self::rules(&["!keep.log", "*.log"]);
        assert!(rules.is_ignored(Path::new("keep.log"), false));
    }

    #[test]
    fn test_invalid_and_empty_patterns_are_skipped() {
        let rules = rules(&["", "[", "  ", "*.bak"]);
        assert_eq!(rules.len(), 1);
        assert!(rules.is_ignored(Path::new("x.bak"), false));
    }

    #[test]
    fn test_empty_rules_ignore_nothing() {
        let rules = IgnoreRules::default();
        assert!(rules.is_empty());
        assert!(!rules.is_ignored(Path::new("anything"), true));
    }
}
