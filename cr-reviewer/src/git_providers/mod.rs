//! Provider facade w/o async-trait or dynamic trait objects.
//!
//! We expose an enum `ProviderClient` with concrete implementations per
//! provider. This keeps async fns simple and avoids boxing futures.

pub mod types;
pub use types::*;

pub mod github;
pub mod gitlab;

use crate::errors::{ConfigError, CrResult};

/// Runtime configuration for any provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// API base, e.g. "https://api.github.com" or "https://gitlab.com/api/v4".
    pub base_api: String,
    /// Access token for the provider (PAT or app token).
    pub token: String,
}

impl ProviderConfig {
    /// Builds config from the environment for the selected platform.
    ///
    /// GitHub: `GITHUB_TOKEN`, optional `GITHUB_API_URL`.
    /// GitLab: `GITLAB_TOKEN`, optional `GITLAB_API_URL`.
    pub fn from_env(kind: ProviderKind) -> CrResult<Self> {
        let (token_var, base_var, default_base) = match kind {
            ProviderKind::GitHub => {
                ("GITHUB_TOKEN", "GITHUB_API_URL", "https://api.github.com")
            }
            ProviderKind::GitLab => {
                ("GITLAB_TOKEN", "GITLAB_API_URL", "https://gitlab.com/api/v4")
            }
        };
        let token = std::env::var(token_var)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingVar(token_var))?;
        let base_api = std::env::var(base_var)
            .ok()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| default_base.to_string());
        Ok(Self {
            kind,
            base_api,
            token,
        })
    }
}

/// Concrete provider client (enum-dispatch).
#[derive(Debug, Clone)]
pub enum ProviderClient {
    GitHub(github::GitHubClient),
    GitLab(gitlab::GitLabClient),
}

impl ProviderClient {
    /// Constructs a concrete client from generic config.
    pub fn from_config(cfg: ProviderConfig) -> CrResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("cr-agent/0.1")
            .build()?;
        Ok(match cfg.kind {
            ProviderKind::GitHub => {
                Self::GitHub(github::GitHubClient::new(client, cfg.base_api, cfg.token))
            }
            ProviderKind::GitLab => {
                Self::GitLab(gitlab::GitLabClient::new(client, cfg.base_api, cfg.token))
            }
        })
    }

    /// Fetch addressing metadata (head SHA, and base/start on GitLab).
    pub async fn fetch_diff_refs(&self, id: &ChangeRequestId) -> CrResult<DiffRefs> {
        match self {
            Self::GitHub(c) => c.get_diff_refs(id).await,
            Self::GitLab(c) => c.get_diff_refs(id).await,
        }
    }

    /// Fetch the raw unified diff text for the whole change request.
    pub async fn fetch_raw_diff(&self, id: &ChangeRequestId) -> CrResult<String> {
        match self {
            Self::GitHub(c) => c.get_raw_diff(id).await,
            Self::GitLab(c) => c.get_raw_diff(id).await,
        }
    }
}
