//! GitHub provider (REST v3) for PR head SHA and raw diff text.
//!
//! Endpoints used:
//! - GET /repos/:repo/pulls/:id/commits   (head SHA = last commit)
//! - GET /repos/:repo/pulls/:id           (Accept: application/vnd.github.v3.diff)

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{CrResult, ProviderError};
use crate::git_providers::types::{ChangeRequestId, DiffRefs};

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String, // e.g. "https://api.github.com"
    token: String,    // "Authorization: token <value>"
}

impl GitHubClient {
    /// Constructs a GitHub client with a shared reqwest instance and token.
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    fn auth_value(&self) -> String {
        format!("token {}", self.token)
    }

    /// Head SHA of the PR = SHA of the last commit in the PR commit list.
    /// GitHub inline comments only need this single anchor.
    pub async fn get_diff_refs(&self, id: &ChangeRequestId) -> CrResult<DiffRefs> {
        let url = format!(
            "{}/repos/{}/pulls/{}/commits",
            self.base_api, id.repository, id.iid
        );
        debug!("fetch: github commits url={}", url);
        let commits: Vec<GitHubCommit> = self
            .http
            .get(url)
            .header("Authorization", self.auth_value())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let head_sha = commits
            .last()
            .map(|c| c.sha.clone())
            .ok_or_else(|| ProviderError::InvalidResponse("empty commit list".into()))?;

        Ok(DiffRefs {
            base_sha: String::new(),
            start_sha: None,
            head_sha,
        })
    }

    /// Raw unified diff for the whole PR via the diff media type.
    pub async fn get_raw_diff(&self, id: &ChangeRequestId) -> CrResult<String> {
        let url = format!("{}/repos/{}/pulls/{}", self.base_api, id.repository, id.iid);
        debug!("fetch: github diff url={}", url);
        let diff = self
            .http
            .get(url)
            .header("Authorization", self.auth_value())
            .header("Accept", "application/vnd.github.v3.diff")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(diff)
    }
}

/// --- GitHub response shapes (subset of fields we actually use) ---

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: String,
}
