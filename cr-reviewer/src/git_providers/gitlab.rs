//! GitLab provider (REST v4) for MR diff refs and changes.
//!
//! Endpoints used:
//! - GET /projects/:id/merge_requests/:iid           (diff_refs triple)
//! - GET /projects/:id/merge_requests/:iid/changes   (per-file diffs)
//!
//! The `/changes` payload carries hunk text without `diff --git` delimiter
//! lines, so this client synthesizes them and returns a single unified
//! stream the shared parser understands. Adds and deletes get a `/dev/null`
//! sentinel; binary files (no `diff` field) get a `Binary files differ`
//! marker line.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::errors::CrResult;
use crate::git_providers::types::{ChangeRequestId, DiffRefs};

#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: Client,
    base_api: String, // e.g. "https://gitlab.com/api/v4"
    token: String,    // "PRIVATE-TOKEN"
}

impl GitLabClient {
    /// Constructs a GitLab client with a shared reqwest instance and token.
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    /// Fetches MR metadata; `diff_refs` anchors every posted discussion.
    pub async fn get_diff_refs(&self, id: &ChangeRequestId) -> CrResult<DiffRefs> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}",
            self.base_api,
            urlencoding::encode(&id.repository),
            id.iid
        );
        debug!("fetch: gitlab meta url={}", url);
        let resp: GitLabMr = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(DiffRefs {
            base_sha: resp.diff_refs.base_sha,
            start_sha: Some(resp.diff_refs.start_sha),
            head_sha: resp.diff_refs.head_sha,
        })
    }

    /// Fetches the MR change list and rebuilds one raw unified diff.
    pub async fn get_raw_diff(&self, id: &ChangeRequestId) -> CrResult<String> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}/changes",
            self.base_api,
            urlencoding::encode(&id.repository),
            id.iid
        );
        debug!("fetch: gitlab changes url={}", url);
        let resp: GitLabMrChanges = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(assemble_raw_diff(&resp.changes))
    }
}

/// Joins per-file change entries into one parser-ready diff stream.
fn assemble_raw_diff(changes: &[GitLabMrChange]) -> String {
    let mut out = String::new();
    for c in changes {
        let old = if c.new_file {
            "/dev/null".to_string()
        } else {
            format!("a/{}", c.old_path)
        };
        let new = if c.deleted_file {
            "/dev/null".to_string()
        } else {
            format!("b/{}", c.new_path)
        };
        out.push_str(&format!("diff --git {} {}\n", old, new));

        match &c.diff {
            Some(d) if !d.is_empty() => {
                out.push_str(d);
                if !d.ends_with('\n') {
                    out.push('\n');
                }
            }
            // No diff body means the provider withheld content (binary).
            _ => out.push_str("Binary files differ\n"),
        }
    }
    out
}

/// --- GitLab response shapes (subset of fields we actually use) ---

#[derive(Debug, Deserialize)]
struct GitLabMr {
    diff_refs: GitLabDiffRefs,
}

#[derive(Debug, Deserialize)]
struct GitLabDiffRefs {
    base_sha: String,
    head_sha: String,
    start_sha: String,
}

#[derive(Debug, Deserialize)]
struct GitLabMrChanges {
    changes: Vec<GitLabMrChange>,
}

#[derive(Debug, Deserialize)]
struct GitLabMrChange {
    old_path: String,
    new_path: String,
    new_file: bool,
    deleted_file: bool,
    #[serde(default)]
    diff: Option<String>, // unified hunk text; None for binary/too large
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{FileStatus, parse_unified_diff};

    fn change(
        old: &str,
        new: &str,
        new_file: bool,
        deleted: bool,
        diff: Option<&str>,
    ) -> GitLabMrChange {
        GitLabMrChange {
            old_path: old.to_string(),
            new_path: new.to_string(),
            new_file,
            deleted_file: deleted,
            diff: diff.map(|d| d.to_string()),
        }
    }

    #[test]
    fn assembled_stream_parses_back_into_files() {
        let changes = vec![
            change(
                "a.py",
                "a.py",
                true,
                false,
                Some("@@ -0,0 +1,1 @@\n+print(1)\n"),
            ),
            change("logo.png", "logo.png", false, false, None),
        ];
        let raw = assemble_raw_diff(&changes);
        let files = parse_unified_diff(&raw).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "a.py");
        assert_eq!(files[0].status, FileStatus::Added);
        assert_eq!(files[0].additions, 1);
        assert!(files[1].is_binary);
        assert_eq!(files[1].patch, "");
    }

    #[test]
    fn deleted_file_gets_dev_null_on_the_new_side() {
        let changes = vec![change(
            "gone.rs",
            "gone.rs",
            false,
            true,
            Some("@@ -1,1 +0,0 @@\n-fn gone() {}\n"),
        )];
        let raw = assemble_raw_diff(&changes);
        let files = parse_unified_diff(&raw).unwrap();
        assert_eq!(files[0].status, FileStatus::Deleted);
        assert_eq!(files[0].deletions, 1);
    }
}
