//! Public entry for the cr-reviewer pipeline.
//!
//! Single high-level function to run the whole review for a Pull Request /
//! Merge Request.
//!
//! 1) **Step 1 — Provider I/O**
//!    - Fetch addressing refs (`head_sha`, and the diff_refs triple on GitLab)
//!    - Fetch the raw unified diff (GitLab change lists are reassembled into
//!      one delimiter-bearing stream first)
//!
//! 2) **Step 2 — Diff parsing**
//!    - One `FileDiff` per `diff --git` section: status, counters, SHAs,
//!      binary flag, reconstructed patch
//!
//! 3) **Step 3 — Filtering**
//!    - Drop binary files and empty patches; apply the language policy to
//!      files with no recognized extension
//!
//! 4) **Step 4 — Review dispatch + posting**
//!    - Per file: rate-limited model calls with bounded retries and
//!      corrective feedback, strict four-field JSON validation, then an
//!      inline comment on the post-change line
//!
//! 5) **Step 5 — Finalization**
//!    - Label the request reviewed and self-assign the token's identity as
//!      reviewer (best-effort)
//!
//! The pipeline uses `tracing` for debug logging and avoids `async-trait`
//! and heap trait objects (no `Box<dyn ...>`). It relies on plain `async fn`
//! and enum-dispatch over thin provider clients.

pub mod errors;
pub mod git_providers;
pub mod instructions;
pub mod lang;
pub mod parser;
pub mod pipeline;
pub mod publish;
pub mod ratelimit;
pub mod review;

pub use errors::{CrResult, Error};
pub use git_providers::{ChangeRequestId, ProviderConfig, ProviderKind};
pub use parser::{FileDiff, FileStatus, parse_unified_diff};
pub use pipeline::{PipelineConfig, RunReport, run_review};
pub use review::{FailureReason, ReviewFinding, ReviewOutcome};
