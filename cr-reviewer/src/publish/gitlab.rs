//! GitLab posting backend (REST v4).
//!
//! Endpoints used:
//! - POST /projects/:id/merge_requests/:iid/discussions   (inline comment)
//! - PUT  /projects/:id/merge_requests/:iid?add_labels=…  (reviewed label)
//! - GET  /user                                           (token identity)
//! - PUT  /projects/:id/merge_requests/:iid?reviewer_ids  (self-assign)

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
pub struct GitLabPoster {
    http: Client,
    base_api: String,
    token: String,
}

/// Position payload anchoring a discussion to one new-side line. All three
/// SHAs of the diff_refs triple are required by the API.
#[derive(Debug, Serialize)]
struct Position<'a> {
    position_type: &'a str,
    base_sha: &'a str,
    start_sha: &'a str,
    head_sha: &'a str,
    new_path: &'a str,
    new_line: u32,
}

impl GitLabPoster {
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    fn mr_url(&self, id: &ChangeRequestId) -> String {
        format!(
            "{}/projects/{}/merge_requests/{}",
            self.base_api,
            urlencoding::encode(&id.repository),
            id.iid
        )
    }

    /// Positioned discussion on the new side of the diff.
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
            position: Position<'a>,
        }

        let url = format!("{}/discussions", self.mr_url(id));
        debug!("post: gitlab discussion url={} path={}", url, file.filename);
        let body = render_comment_body(finding);
        let resp = self
            .http
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&Req {
                body: &body,
                position: Position {
                    position_type: "text",
                    base_sha: &refs.base_sha,
                    start_sha: refs.start_sha.as_deref().unwrap_or(&refs.base_sha),
                    head_sha: &refs.head_sha,
                    new_path: &file.filename,
                    new_line: finding.line_number,
                },
            })
            .send()
            .await?;
        ensure_success(ProviderKind::GitLab, resp).await
    }

    /// Adds the reviewed label and sets the token owner as MR reviewer.
    pub async fn finalize_request(&self, id: &ChangeRequestId, label: &str) -> CrResult<()> {
        #[derive(Deserialize)]
        struct User {
            id: u64,
            name: String,
        }

        let url = self.mr_url(id);
        debug!("post: gitlab label url={} label={}", url, label);
        let resp = self
            .http
            .put(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .query(&[("add_labels", label)])
            .send()
            .await?;
        ensure_success(ProviderKind::GitLab, resp).await?;

        let user: User = self
            .http
            .get(format!("{}/user", self.base_api))
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("post: gitlab reviewer id={} name={}", user.id, user.name);
        let resp = self
            .http
            .put(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .query(&[("reviewer_ids[]", user.id.to_string())])
            .send()
            .await?;
        ensure_success(ProviderKind::GitLab, resp).await
    }
}
