//! Provider-agnostic identifiers and addressing metadata.

use serde::{Deserialize, Serialize};

/// Supported hosting platforms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderKind {
    GitHub,
    GitLab,
}

/// A unique reference to a change request inside a provider.
///
/// * `repository` – GitHub: "owner/repo"; GitLab: numeric ID or
///   "group/project".
/// * `iid`        – GitHub PR number or GitLab MR IID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequestId {
    pub repository: String,
    pub iid: u64,
}

/// SHAs used to anchor inline comments.
///
/// GitLab exposes base/start/head; GitHub comment posting needs only the
/// head commit, so `base_sha`/`start_sha` stay empty/`None` there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffRefs {
    pub base_sha: String,
    pub start_sha: Option<String>,
    pub head_sha: String,
}
