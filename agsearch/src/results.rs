//! Search result types.
//!
//! The shape follows what callers of the engine consume: a list of files,
//! each with its matches as byte spans, plus per-file flags. Flags are a
//! typed set with fixed bit values, so
//! `flags.bits() & 2` still means "binary file" on the wire.
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;

bitflags! {
    /// Flags attached to a file result or to a whole search output
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ResultFlags: u32 {
        /// The file was classified as text
        const TEXT = 1;
        /// The file was classified as binary
        const BINARY = 2;
        /// Matches stopped at `max_matches_per_file`
        const TRUNCATED = 4;
        /// The search hit its timeout; results are partial
        const TIMED_OUT = 8;
    }
}

/// A classified file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Whether the content sample looked binary
    pub is_binary: bool,
    /// Size in bytes
    pub size: u64,
}

/// A single match, as a half-open byte span `[byte_start, byte_end)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub byte_start: u64,
    pub byte_end: u64,
    /// The matched bytes; may not be valid UTF-8 in binary files
    pub matched_text: Vec<u8>,
}

impl Match {
    pub fn new(byte_start: u64, matched_text: &[u8]) -> Self {
        Self {
            byte_start,
            byte_end: byte_start + matched_text.len() as u64,
            matched_text: matched_text.to_vec(),
        }
    }

    pub fn len(&self) -> u64 {
        self.byte_end - self.byte_start
    }

    pub fn is_empty(&self) -> bool {
        self.byte_start == self.byte_end
    }

    /// The matched bytes as text, replacing invalid UTF-8
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.matched_text)
    }
}

/// All matches found in a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub file: FileEntry,
    /// Matches in order of occurrence
    pub matches: Vec<Match>,
    pub flags: ResultFlags,
}

impl FileResult {
    pub fn is_binary(&self) -> bool {
        self.flags.contains(ResultFlags::BINARY)
    }

    pub fn is_truncated(&self) -> bool {
        self.flags.contains(ResultFlags::TRUNCATED)
    }
}

/// A path that was skipped during a search, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPath {
    /// The path involved, when the failure could be tied to one
    pub path: Option<PathBuf>,
    pub reason: String,
}

impl SkippedPath {
    pub fn new(path: Option<PathBuf>, reason: impl ToString) -> Self {
        Self {
            path,
            reason: reason.to_string(),
        }
    }
}

/// Counters for one search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Bytes scanned
    pub total_bytes: u64,
    /// Files scanned
    pub total_files: u64,
    /// Matches found
    pub total_matches: u64,
    /// Files with at least one match
    pub total_file_matches: u64,
    /// Binary files left out of the scan
    pub binary_files_skipped: u64,
    /// Paths skipped because of errors
    pub warnings: u64,
    /// Wall-clock time of the search
    pub elapsed: Duration,
}

/// The complete output of one search
#[derive(Debug, Clone, Default)]
pub struct SearchOutput {
    /// Total number of matches across all files
    pub nresults: usize,
    /// Files with at least one match
    pub results: Vec<FileResult>,
    /// Flags for the search as a whole
    pub flags: ResultFlags,
    /// Paths that could not be searched
    pub warnings: Vec<SkippedPath>,
    pub stats: SearchStats,
}

impl SearchOutput {
    /// Creates an empty output
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn timed_out(&self) -> bool {
        self.flags.contains(ResultFlags::TIMED_OUT)
    }

    /// Files with matches, in output order
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.results.iter().map(|r| &r.file.path)
    }

    /// Serializes the output in the engine's wire shape:
    /// `{ nresults, results: [ { file, flags, matches: [ { match, byte_start, byte_end } ] } ] }`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&WireOutput::from(self))
    }
}

#[derive(Serialize)]
struct WireOutput<'a> {
    nresults: usize,
    results: Vec<WireFile<'a>>,
}

#[derive(Serialize)]
struct WireFile<'a> {
    file: Cow<'a, str>,
    flags: u32,
    matches: Vec<WireMatch<'a>>,
}

#[derive(Serialize)]
struct WireMatch<'a> {
    #[serde(rename = "match")]
    text: Cow<'a, str>,
    byte_start: u64,
    byte_end: u64,
}

impl<'a> From<&'a SearchOutput> for WireOutput<'a> {
    fn from(output: &'a SearchOutput) -> Self {
        Self {
            nresults: output.nresults,
            results: output
                .results
                .iter()
                .map(|r| WireFile {
                    file: r.file.path.to_string_lossy(),
                    flags: r.flags.bits(),
                    matches: r
                        .matches
                        .iter()
                        .map(|m| WireMatch {
                            text: m.text_lossy(),
                            byte_start: m.byte_start,
                            byte_end: m.byte_end,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}
