//! Posting validated findings back to the hosting platform.
//!
//! One capability set over enum dispatch:
//! - `post_finding`: inline comment anchored to the post-change line.
//! - `finalize_request`: reviewed label + self-assignment as reviewer.
//!
//! Every non-2xx response surfaces as a `PostError` carrying the platform,
//! status and response body; the orchestrator logs it and keeps going.

pub mod github;
pub mod gitlab;

use std::time::Duration;

use crate::errors::{CrResult, PostError};
use crate::git_providers::{ChangeRequestId, DiffRefs, ProviderConfig, ProviderKind};
use crate::parser::FileDiff;
use crate::review::ReviewFinding;

/// Concrete poster (enum-dispatch, mirrors `ProviderClient`).
#[derive(Debug, Clone)]
pub enum Poster {
    GitHub(github::GitHubPoster),
    GitLab(gitlab::GitLabPoster),
}

impl Poster {
    /// Constructs a concrete poster from generic provider config.
    pub fn from_config(cfg: &ProviderConfig) -> CrResult<Self> {
        let http = build_http_client()?;
        Ok(match cfg.kind {
            ProviderKind::GitHub => Self::GitHub(github::GitHubPoster::new(
                http,
                cfg.base_api.clone(),
                cfg.token.clone(),
            )),
            ProviderKind::GitLab => Self::GitLab(gitlab::GitLabPoster::new(
                http,
                cfg.base_api.clone(),
                cfg.token.clone(),
            )),
        })
    }

    /// Posts one finding as an inline comment on the post-change side.
    pub async fn post_finding(
        &self,
        id: &ChangeRequestId,
        file: &FileDiff,
        finding: &ReviewFinding,
        refs: &DiffRefs,
    ) -> CrResult<()> {
        match self {
            Self::GitHub(p) => p.post_finding(id, file, finding, refs).await,
            Self::GitLab(p) => p.post_finding(id, file, finding, refs).await,
        }
    }

    /// Marks the request reviewed: adds the label and self-assigns the
    /// token's identity as reviewer.
    pub async fn finalize_request(&self, id: &ChangeRequestId, label: &str) -> CrResult<()> {
        match self {
            Self::GitHub(p) => p.finalize_request(id, label).await,
            Self::GitLab(p) => p.finalize_request(id, label).await,
        }
    }
}

/// Renders the Markdown body of one inline comment.
///
/// The suggestion is kept as-is when the model already fenced it as a
/// `diff` block; anything else gets wrapped so the platform renders it
/// as code.
pub(crate) fn render_comment_body(finding: &ReviewFinding) -> String {
    let mut body = format!(
        "### {}\n**Line {}**\n\n{}\n\n",
        finding.title, finding.line_number, finding.comment
    );
    let suggestion = finding.code_suggestion.trim();
    if suggestion.starts_with("```diff") {
        body.push_str(suggestion);
        body.push('\n');
    } else {
        body.push_str("```diff\n");
        body.push_str(suggestion);
        body.push_str("\n```\n");
    }
    body
}

/// Shared reqwest client for the posting path.
fn build_http_client() -> CrResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent("cr-agent/0.1")
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .build()?;
    Ok(client)
}

/// Converts a non-success response into a `PostError` with the body text
/// attached; 2xx responses pass through untouched.
pub(crate) async fn ensure_success(
    platform: ProviderKind,
    resp: reqwest::Response,
) -> CrResult<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(PostError {
        platform,
        status: status.as_u16(),
        body,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(suggestion: &str) -> ReviewFinding {
        ReviewFinding {
            title: "Unchecked result".into(),
            comment: "Handle the error instead of dropping it.".into(),
            line_number: 12,
            code_suggestion: suggestion.into(),
        }
    }

    #[test]
    fn bare_suggestion_gets_a_diff_fence() {
        let body = render_comment_body(&finding("-foo();\n+foo()?;"));
        assert!(body.starts_with("### Unchecked result\n**Line 12**\n"));
        assert!(body.contains("```diff\n-foo();\n+foo()?;\n```\n"));
    }

    #[test]
    fn fenced_suggestion_is_not_double_wrapped() {
        let body = render_comment_body(&finding("```diff\n-a\n+b\n```"));
        assert_eq!(body.matches("```diff").count(), 1);
    }
}
