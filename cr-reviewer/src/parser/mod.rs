//! Unified-diff parser: raw diff text → ordered per-file records.
//!
//! Features:
//! - One `FileDiff` per `diff --git` delimiter line, flushed at each
//!   boundary and at end of input (no shared state between calls).
//! - Binary detection within the first lines of a file section.
//! - `index <base>..<head>` metadata extraction.
//! - Hard failure on delimiter lines that cannot be split into paths.
//!
//! The parser does no I/O; both providers feed it a single raw diff stream.

use crate::errors::ParseError;

/// Path used by diff tooling for the "no file" side of an add or delete.
const NO_FILE: &str = "/dev/null";

/// How many lines after a `diff --git` delimiter are scanned for a
/// case-insensitive "binary" marker.
const BINARY_SCAN_LINES: usize = 4;

/// Change kind for one file within a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
}

/// One file's change within a pull/merge request.
///
/// Immutable after parsing: `additions`/`deletions` always equal the number
/// of `+`/`-` lines present in `patch` (file-header `+++`/`---` lines are
/// never counted or appended). `patch` is empty iff the file is binary or
/// has no hunks (pure rename).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Post-change path; pre-change path for deletions.
    pub filename: String,
    /// Pre-change path, when the file existed before (rename/delete/modify).
    pub previous_filename: Option<String>,
    pub status: FileStatus,
    pub additions: u32,
    pub deletions: u32,
    pub is_binary: bool,
    /// Extracted from the `index <base>..<head>` metadata line when present.
    pub base_sha: Option<String>,
    pub head_sha: Option<String>,
    /// Reconstructed hunk text (headers + content lines), `\n`-joined.
    pub patch: String,
}

/// In-progress file section; flushed into a `FileDiff` at each boundary.
struct FileAccumulator {
    filename: String,
    previous_filename: Option<String>,
    status: FileStatus,
    additions: u32,
    deletions: u32,
    is_binary: bool,
    base_sha: Option<String>,
    head_sha: Option<String>,
    patch_lines: Vec<String>,
}

impl FileAccumulator {
    fn finish(self) -> FileDiff {
        FileDiff {
            filename: self.filename,
            previous_filename: self.previous_filename,
            status: self.status,
            additions: self.additions,
            deletions: self.deletions,
            is_binary: self.is_binary,
            base_sha: self.base_sha,
            head_sha: self.head_sha,
            patch: self.patch_lines.join("\n"),
        }
    }
}

/// Parses a raw unified diff into ordered `FileDiff` records.
///
/// Empty input yields an empty vector. A malformed delimiter line (too few
/// whitespace-separated tokens) fails the whole parse: a lost file boundary
/// would silently drop review-relevant files.
pub fn parse_unified_diff(diff_text: &str) -> Result<Vec<FileDiff>, ParseError> {
    let lines: Vec<&str> = diff_text.lines().collect();
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<FileAccumulator> = None;

    for (idx, line) in lines.iter().enumerate() {
        if line.starts_with("diff --git") {
            if let Some(done) = current.take() {
                files.push(done.finish());
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return Err(ParseError::MalformedFileHeader((*line).to_string()));
            }
            let old_path = strip_side_prefix(parts[2]);
            let new_path = strip_side_prefix(parts[3]);

            let status = if old_path == NO_FILE {
                FileStatus::Added
            } else if new_path == NO_FILE {
                FileStatus::Deleted
            } else {
                FileStatus::Modified
            };
            let filename = if new_path != NO_FILE { new_path } else { old_path };
            let previous_filename =
                (old_path != NO_FILE).then(|| old_path.to_string());

            // Scan stops at the next delimiter so a short section never
            // inherits a marker from the following file.
            let scan_end = (idx + 1 + BINARY_SCAN_LINES).min(lines.len());
            let is_binary = lines[idx + 1..scan_end]
                .iter()
                .take_while(|l| !l.starts_with("diff --git"))
                .any(|l| l.to_lowercase().contains("binary"));

            current = Some(FileAccumulator {
                filename: filename.to_string(),
                previous_filename,
                status,
                additions: 0,
                deletions: 0,
                is_binary,
                base_sha: None,
                head_sha: None,
                patch_lines: Vec::new(),
            });
            continue;
        }

        let Some(cur) = current.as_mut() else {
            // Prelude before the first delimiter carries no file content.
            continue;
        };

        if let Some(rest) = line.strip_prefix("index ") {
            if let Some(token) = rest.split_whitespace().next() {
                if let Some((base, head)) = token.split_once("..") {
                    cur.base_sha = Some(base.to_string());
                    cur.head_sha = Some(head.to_string());
                }
            }
        } else if cur.is_binary {
            // No content lines are accumulated for binary files.
        } else if line.starts_with("@@ ") {
            cur.patch_lines.push((*line).to_string());
        } else if line.starts_with('+') && !line.starts_with("+++") {
            cur.additions += 1;
            cur.patch_lines.push((*line).to_string());
        } else if line.starts_with('-') && !line.starts_with("---") {
            cur.deletions += 1;
            cur.patch_lines.push((*line).to_string());
        } else if line.starts_with(' ') {
            cur.patch_lines.push((*line).to_string());
        }
    }

    if let Some(done) = current.take() {
        files.push(done.finish());
    }
    Ok(files)
}

/// Strips the conventional two-character `a/` / `b/` side prefix, leaving
/// the `/dev/null` sentinel (and any unprefixed path) untouched.
fn strip_side_prefix(token: &str) -> &str {
    token
        .strip_prefix("a/")
        .or_else(|| token.strip_prefix("b/"))
        .unwrap_or(token)
}
