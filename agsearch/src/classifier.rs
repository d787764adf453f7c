//! Binary/text classification of candidate files.
use memchr::memchr;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::trace;

use crate::errors::{SearchError, SearchResult};
use crate::results::FileEntry;

/// Number of leading bytes inspected per file
pub const SAMPLE_SIZE: usize = 8 * 1024;

/// Share of suspicious bytes (in percent) above which a file counts as binary
pub const BINARY_RATIO_THRESHOLD: usize = 30;

const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Decides whether files are binary and whether they should be scanned
#[derive(Debug, Clone, Copy)]
pub struct FileClassifier {
    search_binary_files: bool,
}

impl FileClassifier {
    pub fn new(search_binary_files: bool) -> Self {
        Self {
            search_binary_files,
        }
    }

    /// Opens `path`, samples its first [`SAMPLE_SIZE`] bytes and tags it
    pub fn classify(&self, path: &Path) -> SearchResult<FileEntry> {
        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| SearchError::from_io(path, e))?
            .len();

        let mut sample = Vec::with_capacity(SAMPLE_SIZE);
        file.take(SAMPLE_SIZE as u64)
            .read_to_end(&mut sample)
            .map_err(|e| SearchError::from_io(path, e))?;

        let is_binary = looks_binary(&sample);
        trace!(
            "Classified {} as {} ({} bytes)",
            path.display(),
            if is_binary { "binary" } else { "text" },
            size
        );

        Ok(FileEntry {
            path: path.to_path_buf(),
            is_binary,
            size,
        })
    }

    /// Whether a classified file should be scanned
    pub fn is_eligible(&self, entry: &FileEntry) -> bool {
        !entry.is_binary || self.search_binary_files
    }
}

/// Binary heuristic over a content sample.
///
/// A sample is binary when it contains a NUL byte, starts with a PDF
/// signature, or when more than [`BINARY_RATIO_THRESHOLD`] percent of it is
/// suspicious: control bytes other than common whitespace, or bytes that
/// are not part of a valid UTF-8 sequence. A multi-byte sequence cut off by
/// the end of the sample is not counted.
pub fn looks_binary(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if memchr(0, sample).is_some() || sample.starts_with(PDF_SIGNATURE) {
        return true;
    }

    let suspicious = suspicious_bytes(sample);
    suspicious * 100 > sample.len() * BINARY_RATIO_THRESHOLD
}

fn suspicious_bytes(sample: &[u8]) -> usize {
    let mut count = sample
        .iter()
        .filter(|&&b| is_suspicious_control(b))
        .count();

    let mut rest = sample;
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(_) => break,
            Err(e) => {
                let valid = e.valid_up_to();
                match e.error_len() {
                    Some(len) => {
                        count += len;
                        rest = &rest[valid + len..];
                    }
                    // Truncated sequence at the end of the sample
                    None => break,
                }
            }
        }
    }
    count
}

fn is_suspicious_control(b: u8) -> bool {
    match b {
        b'\t' | b'\n' | b'\r' | 0x0c | 0x08 | 0x1b => false,
        0x00..=0x1f | 0x7f => true,
        _ => false,
    }
}
