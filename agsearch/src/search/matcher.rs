use memchr::memmem::Finder;
use regex::bytes::{Regex, RegexBuilder};
use std::io::{self, Read};
use tracing::debug;

use crate::errors::{SearchError, SearchResult};
use crate::results::Match;

/// Bytes read per chunk when scanning a stream
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Bytes kept before a window's scan start so `^` and `\b` see the real
/// preceding character (one UTF-8 char at most)
const LOOK_BEHIND: usize = 4;

const REGEX_META: &[char] = &[
    '\\', '^', '$', '.', '|', '?', '*', '+', '(', ')', '[', ']', '{', '}',
];

/// Options that shape how a pattern is compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternOptions {
    pub case_sensitive: bool,
    /// Force a fixed-string search even if the pattern has metacharacters
    pub literal: bool,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            literal: false,
        }
    }
}

/// Strategy for pattern matching
#[derive(Debug, Clone)]
enum MatchStrategy {
    Literal(Finder<'static>),
    Regex(Regex),
}

/// A compiled search pattern.
///
/// Matching works on raw bytes, so binary content can be scanned without
/// any text decoding. Patterns without regex metacharacters, and patterns
/// compiled with `literal`, use a substring finder; case-insensitive
/// literals and everything else go through `regex::bytes`.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: String,
    strategy: MatchStrategy,
}

/// Outcome of a chunked scan
#[derive(Debug, Default)]
pub struct ChunkedScan {
    pub matches: Vec<Match>,
    /// More matches existed past the limit
    pub truncated: bool,
    pub bytes_read: u64,
}

impl PatternMatcher {
    /// Compiles `pattern`; fails on an empty pattern or invalid syntax
    pub fn compile(pattern: &str, options: PatternOptions) -> SearchResult<Self> {
        if pattern.is_empty() {
            return Err(SearchError::EmptyPattern);
        }

        let literal = options.literal || !Self::is_regex(pattern);
        let strategy = if literal && options.case_sensitive {
            MatchStrategy::Literal(Finder::new(pattern.as_bytes()).into_owned())
        } else {
            let source = if literal {
                regex::escape(pattern)
            } else {
                pattern.to_string()
            };
            let regex = RegexBuilder::new(&source)
                .case_insensitive(!options.case_sensitive)
                .multi_line(true)
                .build()
                .map_err(|e| SearchError::invalid_pattern(pattern, e))?;
            MatchStrategy::Regex(regex)
        };

        debug!(
            "Compiled pattern '{}' as {} (case {})",
            pattern,
            match strategy {
                MatchStrategy::Literal(_) => "literal",
                MatchStrategy::Regex(_) => "regex",
            },
            if options.case_sensitive {
                "sensitive"
            } else {
                "insensitive"
            }
        );

        Ok(Self {
            pattern: pattern.to_string(),
            strategy,
        })
    }

    /// Whether a pattern contains regex metacharacters
    pub fn is_regex(pattern: &str) -> bool {
        pattern.contains(REGEX_META)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.strategy, MatchStrategy::Literal(_))
    }

    /// Upper bound on a match length, when the strategy knows one
    pub fn max_match_len(&self) -> Option<usize> {
        match &self.strategy {
            MatchStrategy::Literal(finder) => Some(finder.needle().len()),
            MatchStrategy::Regex(_) => None,
        }
    }

    /// Leftmost match starting at or after `start`, as `(start, end)`.
    /// Bytes before `start` still count as context for look-behind
    /// assertions such as `^` and `\b`.
    pub fn find_at(&self, haystack: &[u8], start: usize) -> Option<(usize, usize)> {
        if start > haystack.len() {
            return None;
        }
        match &self.strategy {
            MatchStrategy::Literal(finder) => finder
                .find(&haystack[start..])
                .map(|i| (start + i, start + i + finder.needle().len())),
            MatchStrategy::Regex(regex) => regex
                .find_at(haystack, start)
                .map(|m| (m.start(), m.end())),
        }
    }

    /// Iterates non-overlapping matches from left to right
    pub fn find_iter<'m, 'h>(&'m self, haystack: &'h [u8]) -> MatchIter<'m, 'h> {
        MatchIter::new(self, haystack, 0, None)
    }

    /// All non-overlapping matches in `haystack`, offsets relative to its start
    pub fn scan(&self, haystack: &[u8]) -> Vec<Match> {
        self.find_iter(haystack)
            .map(|(s, e)| Match::new(s as u64, &haystack[s..e]))
            .collect()
    }

    /// Like [`scan`](Self::scan) but stops after `limit` matches.
    /// The flag reports whether more matches existed.
    pub fn scan_limited(&self, haystack: &[u8], limit: Option<usize>) -> (Vec<Match>, bool) {
        let Some(limit) = limit else {
            return (self.scan(haystack), false);
        };
        let mut matches: Vec<Match> = self
            .find_iter(haystack)
            .take(limit.saturating_add(1))
            .map(|(s, e)| Match::new(s as u64, &haystack[s..e]))
            .collect();
        let truncated = matches.len() > limit;
        matches.truncate(limit);
        (matches, truncated)
    }

    /// Scans a stream in bounded chunks.
    ///
    /// The last `overlap` bytes of each window are carried into the next
    /// one, and a match that starts inside that tail is only reported once
    /// the next window is read, so matches that straddle a chunk edge are
    /// found exactly once. Literal patterns carry their own length instead
    /// of `overlap`.
    ///
    /// Limitation: a regex match longer than the overlap that runs into the
    /// end of a window is reported as found in that window and may be cut
    /// short there.
    pub fn scan_reader<R: Read>(
        &self,
        reader: R,
        overlap: usize,
        limit: Option<usize>,
    ) -> io::Result<ChunkedScan> {
        self.scan_reader_chunked(reader, CHUNK_SIZE, overlap, limit)
    }

    pub(crate) fn scan_reader_chunked<R: Read>(
        &self,
        mut reader: R,
        chunk_size: usize,
        overlap: usize,
        limit: Option<usize>,
    ) -> io::Result<ChunkedScan> {
        let overlap = self.max_match_len().unwrap_or(overlap).max(1);
        let mut buf = vec![0u8; chunk_size.max(1)];
        let mut window: Vec<u8> = Vec::with_capacity(chunk_size + overlap);
        // File offset of window[0]
        let mut window_offset: u64 = 0;
        // Matches must start at or after this file offset
        let mut next_start: u64 = 0;
        let mut last_end: Option<u64> = None;
        let mut scan = ChunkedScan::default();

        loop {
            let n = read_chunk(&mut reader, &mut buf)?;
            let eof = n == 0;
            window.extend_from_slice(&buf[..n]);
            scan.bytes_read += n as u64;

            let boundary = if eof {
                window.len()
            } else {
                window.len().saturating_sub(overlap)
            };
            let from = next_start.saturating_sub(window_offset) as usize;
            let local_last_end = last_end
                .filter(|&e| e >= window_offset)
                .map(|e| (e - window_offset) as usize);

            for (s, e) in MatchIter::new(self, &window, from, local_last_end) {
                if !eof && s >= boundary {
                    break;
                }
                if limit.is_some_and(|l| scan.matches.len() >= l) {
                    scan.truncated = true;
                    return Ok(scan);
                }
                let start = window_offset + s as u64;
                scan.matches.push(Match::new(start, &window[s..e]));
                let resume = if s == e { e + 1 } else { e };
                next_start = window_offset + resume as u64;
                last_end = Some(window_offset + e as u64);
            }

            if eof {
                break;
            }
            next_start = next_start.max(window_offset + boundary as u64);
            let drained = boundary.saturating_sub(LOOK_BEHIND);
            window.drain(..drained);
            window_offset += drained as u64;
        }

        Ok(scan)
    }
}

fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Iterator over non-overlapping `(start, end)` spans.
///
/// An empty match directly after the previous match is skipped, and the
/// search steps one byte past every empty match.
pub struct MatchIter<'m, 'h> {
    matcher: &'m PatternMatcher,
    haystack: &'h [u8],
    pos: usize,
    last_end: Option<usize>,
}

impl<'m, 'h> MatchIter<'m, 'h> {
    fn new(
        matcher: &'m PatternMatcher,
        haystack: &'h [u8],
        pos: usize,
        last_end: Option<usize>,
    ) -> Self {
        Self {
            matcher,
            haystack,
            pos,
            last_end,
        }
    }
}

impl Iterator for MatchIter<'_, '_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (s, e) = self.matcher.find_at(self.haystack, self.pos)?;
            if s == e {
                self.pos = e + 1;
                if self.last_end == Some(e) {
                    continue;
                }
            } else {
                self.pos = e;
            }
            self.last_end = Some(e);
            return Some((s, e));
        }
    }
}
