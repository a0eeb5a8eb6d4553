//! End-to-end orchestrator: fetch → parse → filter → review → post.
//!
//! Steps:
//! 1) Fetch addressing refs and the raw unified diff from the provider.
//! 2) Parse the diff into per-file records (a parse error aborts the run).
//! 3) Filter out binary files, empty patches and, per policy, files with no
//!    recognized language.
//! 4) Dispatch each remaining file sequentially through the retry state
//!    machine; post each validated finding inline.
//! 5) If anything was posted, label the request and self-assign a reviewer.
//!
//! One file's failure (review or posting) never stops the run; only fetch
//! and parse errors do.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::CrResult;
use crate::git_providers::{ChangeRequestId, ProviderClient, ProviderConfig};
use crate::instructions::load_instructions;
use crate::lang::{LanguagePolicy, detect_languages};
use crate::parser::{FileDiff, parse_unified_diff};
use crate::publish::Poster;
use crate::ratelimit::{RateConfig, TokenBucket};
use crate::review::llm::{LlmClient, LlmConfig};
use crate::review::{FailureReason, ReviewDispatcher, ReviewOutcome};

/// Default label applied to fully processed requests.
pub const REVIEWED_LABEL: &str = "ReviewedByAI";

/// Everything a run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub provider: ProviderConfig,
    pub llm: LlmConfig,
    pub rate: RateConfig,
    /// Per-file model-call budget (validation and transport failures both
    /// count against it).
    pub max_attempts: u32,
    pub language_policy: LanguagePolicy,
    /// Directory of custom instruction files; `None` disables them.
    pub instructions_dir: Option<PathBuf>,
    /// Wall-clock budget for the dispatch loop; `None` means unbounded.
    pub run_timeout: Option<Duration>,
    pub reviewed_label: String,
}

impl PipelineConfig {
    /// Resolves the full run configuration from the environment for one
    /// provider. `REVIEW_MAX_ATTEMPTS` and `REVIEW_RUN_TIMEOUT_SECS` tune
    /// the budgets.
    pub fn from_env(provider: ProviderConfig) -> Self {
        let max_attempts = std::env::var("REVIEW_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);
        let run_timeout = std::env::var("REVIEW_RUN_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs);
        Self {
            provider,
            llm: LlmConfig::from_env(),
            rate: RateConfig::from_env(),
            max_attempts,
            language_policy: LanguagePolicy::from_env(),
            instructions_dir: std::env::var("REVIEW_INSTRUCTIONS_DIR")
                .ok()
                .map(PathBuf::from),
            run_timeout,
            reviewed_label: REVIEWED_LABEL.to_string(),
        }
    }
}

/// Terminal record for one dispatched (or skipped-by-deadline) file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub filename: String,
    pub outcome: ReviewOutcome,
    /// True when the finding was also posted successfully.
    pub posted: bool,
}

/// Aggregated result of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Files that survived filtering and entered dispatch.
    pub files_total: usize,
    /// Files whose finding was validated AND posted.
    pub files_reviewed: usize,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn from_files(files: Vec<FileReport>) -> Self {
        let files_reviewed = files.iter().filter(|f| f.posted).count();
        Self {
            files_total: files.len(),
            files_reviewed,
            files,
        }
    }

    /// A run that had reviewable files but posted nothing is a failure;
    /// a run with nothing to review is not.
    pub fn is_failure(&self) -> bool {
        self.files_total > 0 && self.files_reviewed == 0
    }
}

/// Applies the reviewability filter and resolves languages per file.
fn select_reviewable(
    parsed: Vec<FileDiff>,
    policy: LanguagePolicy,
) -> Vec<(FileDiff, Vec<&'static str>)> {
    let mut reviewable = Vec::new();
    for f in parsed {
        if f.is_binary {
            debug!("filter: {} skipped (binary)", f.filename);
            continue;
        }
        if f.patch.is_empty() {
            debug!("filter: {} skipped (empty patch)", f.filename);
            continue;
        }
        let langs = detect_languages(&f.filename);
        if langs.is_empty() && policy == LanguagePolicy::Skip {
            warn!("filter: {} skipped (no recognized language)", f.filename);
            continue;
        }
        reviewable.push((f, langs.to_vec()));
    }
    reviewable
}

/// Runs the whole review pipeline for one change request.
pub async fn run_review(cfg: PipelineConfig, id: &ChangeRequestId) -> CrResult<RunReport> {
    let started = Instant::now();
    info!(
        "run: platform={:?} repository={} request={}",
        cfg.provider.kind, id.repository, id.iid
    );

    // step 1: fetch
    let client = ProviderClient::from_config(cfg.provider.clone())?;
    let refs = client.fetch_diff_refs(id).await?;
    debug!("step1: refs ok head_sha={}", refs.head_sha);
    let raw = client.fetch_raw_diff(id).await?;
    debug!("step1: raw diff fetched ({} bytes)", raw.len());

    // step 2: parse
    let parsed = parse_unified_diff(&raw)?;
    info!("step2: parsed files={}", parsed.len());

    // step 3: filter
    let reviewable = select_reviewable(parsed, cfg.language_policy);
    if reviewable.is_empty() {
        warn!("step3: nothing reviewable; skipping request updates");
        return Ok(RunReport::from_files(Vec::new()));
    }
    info!("step3: reviewable files={}", reviewable.len());

    let instructions = match &cfg.instructions_dir {
        Some(dir) => load_instructions(dir).await,
        None => String::new(),
    };

    // step 4: sequential dispatch + posting
    let limiter = TokenBucket::new(cfg.rate);
    let model = LlmClient::new(cfg.llm.clone())?;
    let dispatcher = ReviewDispatcher::new(&model, &limiter, cfg.max_attempts);
    let poster = Poster::from_config(&cfg.provider)?;
    let deadline = cfg.run_timeout.map(|t| Instant::now() + t);

    let mut files = Vec::with_capacity(reviewable.len());
    for (file, langs) in &reviewable {
        let file_started = Instant::now();
        let outcome = dispatch_one(&dispatcher, file, langs, &instructions, deadline).await;
        debug!(
            "step4: {} reviewed in {} ms",
            file.filename,
            file_started.elapsed().as_millis()
        );

        let mut posted = false;
        match &outcome {
            ReviewOutcome::Succeeded { finding, attempts } => {
                debug!(
                    "step4: finding for {} (line {}, attempts={})",
                    file.filename, finding.line_number, attempts
                );
                match poster.post_finding(id, file, finding, &refs).await {
                    Ok(()) => {
                        posted = true;
                        info!("step4: posted review for {}", file.filename);
                    }
                    Err(e) => warn!("step4: posting failed for {}: {}", file.filename, e),
                }
            }
            ReviewOutcome::Failed { reason, attempts } => warn!(
                "step4: review failed for {}: {:?} after {} attempt(s)",
                file.filename, reason, attempts
            ),
        }
        files.push(FileReport {
            filename: file.filename.clone(),
            outcome,
            posted,
        });
    }

    let report = RunReport::from_files(files);
    info!(
        "run: {}/{} reviews posted in {} ms",
        report.files_reviewed,
        report.files_total,
        started.elapsed().as_millis()
    );

    // step 5: label + reviewer, best-effort
    if report.files_reviewed > 0 {
        if let Err(e) = poster.finalize_request(id, &cfg.reviewed_label).await {
            warn!("step5: label/reviewer update failed: {}", e);
        }
    } else {
        warn!("step5: no reviews posted; skipping request updates");
    }

    Ok(report)
}

/// Reviews one file under the optional run deadline. A file reached after
/// the deadline is `NotAttempted`; one cut short mid-flight counts as
/// `ExhaustedRetries`.
async fn dispatch_one<M: crate::review::ReviewModel>(
    dispatcher: &ReviewDispatcher<'_, M>,
    file: &FileDiff,
    langs: &[&str],
    instructions: &str,
    deadline: Option<Instant>,
) -> ReviewOutcome {
    let Some(deadline) = deadline else {
        return dispatcher.review_file(file, langs, instructions).await;
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        warn!("step4: deadline reached; {} not attempted", file.filename);
        return ReviewOutcome::Failed {
            reason: FailureReason::NotAttempted,
            attempts: 0,
        };
    }
    match tokio::time::timeout(remaining, dispatcher.review_file(file, langs, instructions)).await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(
                "step4: deadline reached mid-review of {}",
                file.filename
            );
            ReviewOutcome::Failed {
                reason: FailureReason::ExhaustedRetries,
                attempts: 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::FileStatus;

    fn file(name: &str, binary: bool, patch: &str) -> FileDiff {
        FileDiff {
            filename: name.to_string(),
            previous_filename: None,
            status: FileStatus::Added,
            additions: 1,
            deletions: 0,
            is_binary: binary,
            base_sha: None,
            head_sha: None,
            patch: patch.to_string(),
        }
    }

    #[test]
    fn filter_drops_binary_empty_and_unknown_language() {
        let parsed = vec![
            file("logo.png", true, ""),
            file("renamed.rs", false, ""),
            file("LICENSE", false, "@@ -0,0 +1,1 @@\n+MIT"),
            file("src/lib.rs", false, "@@ -0,0 +1,1 @@\n+fn x() {}"),
        ];
        let kept = select_reviewable(parsed, LanguagePolicy::Skip);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0.filename, "src/lib.rs");
        assert_eq!(kept[0].1, vec!["rust"]);
    }

    #[test]
    fn review_anyway_keeps_unknown_language_files() {
        let parsed = vec![file("LICENSE", false, "@@ -0,0 +1,1 @@\n+MIT")];
        let kept = select_reviewable(parsed, LanguagePolicy::ReviewAnyway);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].1.is_empty());
    }

    #[test]
    fn report_counts_posted_files_only() {
        let ok = FileReport {
            filename: "a.rs".into(),
            outcome: ReviewOutcome::Failed {
                reason: FailureReason::InvalidOutput,
                attempts: 3,
            },
            posted: false,
        };
        let posted = FileReport {
            posted: true,
            ..ok.clone()
        };
        let report = RunReport::from_files(vec![ok, posted]);
        assert_eq!(report.files_total, 2);
        assert_eq!(report.files_reviewed, 1);
        assert!(!report.is_failure());
    }

    #[test]
    fn run_with_files_but_no_posts_is_a_failure() {
        let failed = FileReport {
            filename: "a.rs".into(),
            outcome: ReviewOutcome::Failed {
                reason: FailureReason::TransportError,
                attempts: 3,
            },
            posted: false,
        };
        assert!(RunReport::from_files(vec![failed]).is_failure());
        assert!(!RunReport::from_files(Vec::new()).is_failure());
    }
}
