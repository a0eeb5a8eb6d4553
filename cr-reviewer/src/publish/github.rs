//! GitHub posting backend (REST v3).
//!
//! Endpoints used:
//! - POST /repos/:repo/pulls/:id/comments              (inline comment)
//! - POST /repos/:repo/issues/:id/labels               (reviewed label)
//! - GET  /user                                        (token identity)
//! - POST /repos/:repo/pulls/:id/requested_reviewers   (self-assign)

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::CrResult;
use crate::git_providers::types::{ChangeRequestId, DiffRefs};
use crate::git_providers::ProviderKind;
use crate::parser::FileDiff;
use crate::publish::{ensure_success, render_comment_body};
use crate::review::ReviewFinding;

#[derive(Debug, Clone)]
pub struct GitHubPoster {
    http: Client,
    base_api: String,
    token: String,
}

impl GitHubPoster {
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

    /// Inline comment on the post-change (RIGHT) side, anchored to the
    /// PR head commit.
    pub async fn post_finding(
        &self,
        id: &ChangeRequestId,
        file: &FileDiff,
        finding: &ReviewFinding,
        refs: &DiffRefs,
    ) -> CrResult<()> {
        #[derive(Serialize)]
        struct Req<'a> {
            body: &'a str,
            commit_id: &'a str,
            path: &'a str,
            side: &'a str,
            line: u32,
        }

        let url = format!(
            "{}/repos/{}/pulls/{}/comments",
            self.base_api, id.repository, id.iid
        );
        debug!("post: github comment url={} path={}", url, file.filename);
        let body = render_comment_body(finding);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.auth_value())
            .header("Accept", "application/vnd.github.v3+json")
            .json(&Req {
                body: &body,
                commit_id: &refs.head_sha,
                path: &file.filename,
                side: "RIGHT",
                line: finding.line_number,
            })
            .send()
            .await?;
        ensure_success(ProviderKind::GitHub, resp).await
    }

    /// Adds the reviewed label and requests the token owner as reviewer.
    pub async fn finalize_request(&self, id: &ChangeRequestId, label: &str) -> CrResult<()> {
        #[derive(Serialize)]
        struct LabelReq<'a> {
            labels: [&'a str; 1],
        }
        #[derive(Serialize)]
        struct ReviewerReq<'a> {
            reviewers: [&'a str; 1],
        }
        #[derive(Deserialize)]
        struct User {
            login: String,
        }

        let label_url = format!(
            "{}/repos/{}/issues/{}/labels",
            self.base_api, id.repository, id.iid
        );
        debug!("post: github label url={} label={}", label_url, label);
        let resp = self
            .http
            .post(&label_url)
            .header("Authorization", self.auth_value())
            .header("Accept", "application/vnd.github.v3+json")
            .json(&LabelReq { labels: [label] })
            .send()
            .await?;
        ensure_success(ProviderKind::GitHub, resp).await?;

        let user: User = self
            .http
            .get(format!("{}/user", self.base_api))
            .header("Authorization", self.auth_value())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let reviewer_url = format!(
            "{}/repos/{}/pulls/{}/requested_reviewers",
            self.base_api, id.repository, id.iid
        );
        debug!(
            "post: github reviewer url={} login={}",
            reviewer_url, user.login
        );
        let resp = self
            .http
            .post(&reviewer_url)
            .header("Authorization", self.auth_value())
            .header("Accept", "application/vnd.github.v3+json")
            .json(&ReviewerReq {
                reviewers: [user.login.as_str()],
            })
            .send()
            .await?;
        ensure_success(ProviderKind::GitHub, resp).await
    }
}
