//! Per-file review dispatch: bounded retries + strict output validation.
//!
//! Each file goes through an explicit state machine:
//! `Pending → Requesting → Validating → (Succeeded | Retrying | Failed)`.
//! Every model call, including retries, first takes a token from the shared
//! rate limiter. Validation failures append corrective feedback to the next
//! prompt; transport failures retry with the prompt unchanged.
//!
//! Retry state never leaks across files: the dispatcher rebuilds the prompt
//! and feedback buffer per `review_file` call.

pub mod llm;
pub mod prompt;

use std::future::Future;

use tracing::{debug, warn};

use crate::errors::LlmError;
use crate::parser::FileDiff;
use crate::ratelimit::TokenBucket;

/// Prefix of the corrective feedback block, appended once on the first
/// validation failure; each subsequent failure appends its own error line.
const CORRECTIVE_HEADER: &str =
    "\n\n**Your output is not in the correct JSON format!** Please try again.";

/// The four mandatory keys of a model response, and nothing else.
const REQUIRED_KEYS: [&str; 4] = ["title", "comment", "line_number", "code_suggestion"];

/// One validated finding for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewFinding {
    pub title: String,
    pub comment: String,
    /// 1-based line in the post-change file the comment anchors to.
    pub line_number: u32,
    pub code_suggestion: String,
}

/// Why a file's review terminated without a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Every attempt produced output that failed schema validation.
    InvalidOutput,
    /// The retry budget ran out (also used when a run deadline cuts a
    /// review short mid-flight).
    ExhaustedRetries,
    /// Every attempt failed at the transport level.
    TransportError,
    /// The run deadline passed before this file was dispatched.
    NotAttempted,
}

/// Terminal result of reviewing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    Succeeded {
        finding: ReviewFinding,
        attempts: u32,
    },
    Failed {
        reason: FailureReason,
        attempts: u32,
    },
}

impl ReviewOutcome {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// The model seam. Static dispatch keeps the dispatcher testable with a
/// scripted fake and the production path free of boxed futures.
pub trait ReviewModel {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, LlmError>> + Send;
}

enum DispatchState {
    Pending,
    Requesting,
    Validating(String),
    Retrying,
    Succeeded(ReviewFinding),
    Failed(FailureReason),
}

/// Drives one file at a time through the retry state machine.
pub struct ReviewDispatcher<'a, M> {
    model: &'a M,
    limiter: &'a TokenBucket,
    max_attempts: u32,
}

impl<'a, M: ReviewModel> ReviewDispatcher<'a, M> {
    pub fn new(model: &'a M, limiter: &'a TokenBucket, max_attempts: u32) -> Self {
        Self {
            model,
            limiter,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Reviews one file and returns its terminal outcome. Never returns a
    /// non-terminal state and never errors: every failure mode maps to a
    /// `ReviewOutcome::Failed`.
    pub async fn review_file(
        &self,
        file: &FileDiff,
        languages: &[&str],
        instructions: &str,
    ) -> ReviewOutcome {
        let base_prompt = prompt::build_review_prompt(file, languages, instructions);
        let mut corrective = String::new();
        let mut attempts: u32 = 0;
        let mut state = DispatchState::Pending;

        loop {
            state = match state {
                DispatchState::Pending => DispatchState::Requesting,

                DispatchState::Requesting => {
                    self.limiter.await_tokens(1.0).await;
                    attempts += 1;
                    debug!(
                        "review: {} attempt {}/{}",
                        file.filename, attempts, self.max_attempts
                    );
                    let full_prompt = format!("{base_prompt}{corrective}");
                    match self.model.generate(&full_prompt).await {
                        Ok(raw) => DispatchState::Validating(raw),
                        Err(e) => {
                            warn!(
                                "review: {} attempt {} transport error: {}",
                                file.filename, attempts, e
                            );
                            if attempts >= self.max_attempts {
                                DispatchState::Failed(FailureReason::TransportError)
                            } else {
                                // Transport noise is not the model's fault;
                                // the prompt is retried unchanged.
                                DispatchState::Retrying
                            }
                        }
                    }
                }

                DispatchState::Validating(raw) => match validate_finding(&raw) {
                    Ok(finding) => DispatchState::Succeeded(finding),
                    Err(msg) => {
                        warn!(
                            "review: {} attempt {} invalid output: {}",
                            file.filename, attempts, msg
                        );
                        if attempts >= self.max_attempts {
                            DispatchState::Failed(FailureReason::InvalidOutput)
                        } else {
                            if corrective.is_empty() {
                                corrective.push_str(CORRECTIVE_HEADER);
                            }
                            corrective.push_str(&format!(
                                " Failed to validate output from your attempt #{attempts}! \
Error log: {msg}."
                            ));
                            DispatchState::Retrying
                        }
                    }
                },

                DispatchState::Retrying => DispatchState::Requesting,

                DispatchState::Succeeded(finding) => {
                    return ReviewOutcome::Succeeded { finding, attempts };
                }
                DispatchState::Failed(reason) => {
                    return ReviewOutcome::Failed { reason, attempts };
                }
            };
        }
    }
}

/// Validates one raw model response against the finding schema.
///
/// Literal control characters are stripped first: models occasionally emit
/// pretty-printed JSON with unescaped newlines/tabs inside string values,
/// which strict JSON rejects. Escaped sequences (`\n` etc.) are untouched.
pub fn validate_finding(raw: &str) -> Result<ReviewFinding, String> {
    let sanitized: String = raw
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t'))
        .collect();

    let value: serde_json::Value = serde_json::from_str(sanitized.trim())
        .map_err(|e| format!("output is not valid JSON: {e}"))?;
    let obj = value
        .as_object()
        .ok_or_else(|| "output is not a JSON object".to_string())?;

    for key in REQUIRED_KEYS {
        if !obj.contains_key(key) {
            return Err(format!("missing required key `{key}`"));
        }
    }
    if obj.len() > REQUIRED_KEYS.len() {
        let extra: Vec<&str> = obj
            .keys()
            .map(String::as_str)
            .filter(|k| !REQUIRED_KEYS.contains(k))
            .collect();
        return Err(format!("unexpected keys: {}", extra.join(", ")));
    }

    let title = non_empty_string(obj, "title")?;
    let comment = non_empty_string(obj, "comment")?;
    let code_suggestion = non_empty_string(obj, "code_suggestion")?;
    let line_number = obj["line_number"]
        .as_u64()
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| "`line_number` must be a positive integer".to_string())?;

    Ok(ReviewFinding {
        title,
        comment,
        line_number,
        code_suggestion,
    })
}

fn non_empty_string(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<String, String> {
    obj[key]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("`{key}` must be a non-empty string"))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::parser::{FileDiff, FileStatus};
    use crate::ratelimit::RateConfig;

    const VALID_JSON: &str = r#"{
        "title": "Missing error handling",
        "comment": "The call can fail and the result is ignored.",
        "line_number": 7,
        "code_suggestion": "```diff\n-foo();\n+foo()?;\n```"
    }"#;

    /// Replays a fixed script of responses; records every prompt it saw.
    struct ScriptedModel {
        script: Mutex<Vec<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(script: Vec<Result<String, LlmError>>) -> Self {
            Self {
                script: Mutex::new(script),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn prompt(&self, idx: usize) -> String {
            self.prompts.lock().unwrap()[idx].clone()
        }
    }

    impl ReviewModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut script = self.script.lock().unwrap();
            assert!(!script.is_empty(), "model called more often than scripted");
            script.remove(0)
        }
    }

    fn file() -> FileDiff {
        FileDiff {
            filename: "src/main.rs".into(),
            previous_filename: Some("src/main.rs".into()),
            status: FileStatus::Modified,
            additions: 1,
            deletions: 1,
            is_binary: false,
            base_sha: None,
            head_sha: None,
            patch: "@@ -7,1 +7,1 @@\n-foo();\n+foo()".into(),
        }
    }

    fn limiter() -> TokenBucket {
        TokenBucket::new(RateConfig {
            capacity: 100.0,
            refill_per_second: 100.0,
        })
    }

    #[tokio::test]
    async fn first_attempt_success() {
        let model = ScriptedModel::new(vec![Ok(VALID_JSON.to_string())]);
        let bucket = limiter();
        let d = ReviewDispatcher::new(&model, &bucket, 3);
        let outcome = d.review_file(&file(), &["rust"], "").await;

        match outcome {
            ReviewOutcome::Succeeded { finding, attempts } => {
                assert_eq!(attempts, 1);
                assert_eq!(finding.title, "Missing error handling");
                assert_eq!(finding.line_number, 7);
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn retry_budget_bounds_model_calls() {
        let model = ScriptedModel::new(vec![
            Ok("not json".into()),
            Ok("still not json".into()),
            Ok("{}".into()),
        ]);
        let bucket = limiter();
        let d = ReviewDispatcher::new(&model, &bucket, 3);
        let outcome = d.review_file(&file(), &["rust"], "").await;

        assert_eq!(
            outcome,
            ReviewOutcome::Failed {
                reason: FailureReason::InvalidOutput,
                attempts: 3
            }
        );
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn corrective_feedback_accumulates_across_attempts() {
        let model = ScriptedModel::new(vec![
            Ok("garbage one".into()),
            Ok(r#"{"title": "t"}"#.into()),
            Ok(VALID_JSON.to_string()),
        ]);
        let bucket = limiter();
        let d = ReviewDispatcher::new(&model, &bucket, 3);
        let outcome = d.review_file(&file(), &["rust"], "").await;
        assert!(outcome.is_succeeded());

        let first = model.prompt(0);
        assert!(!first.contains("not in the correct JSON format"));

        let second = model.prompt(1);
        assert!(second.contains("**Your output is not in the correct JSON format!**"));
        assert!(second.contains("attempt #1"));

        // Third prompt carries both prior error logs, oldest first.
        let third = model.prompt(2);
        assert!(third.contains("attempt #1"));
        assert!(third.contains("attempt #2"));
        assert!(third.contains("missing required key"));
        let header_count = third.matches("not in the correct JSON format").count();
        assert_eq!(header_count, 1);
    }

    #[tokio::test]
    async fn transport_error_retries_without_mutating_the_prompt() {
        let model = ScriptedModel::new(vec![
            Err(LlmError::Network("connection reset".into())),
            Ok(VALID_JSON.to_string()),
        ]);
        let bucket = limiter();
        let d = ReviewDispatcher::new(&model, &bucket, 3);
        let outcome = d.review_file(&file(), &["rust"], "").await;

        match outcome {
            ReviewOutcome::Succeeded { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(model.prompt(0), model.prompt(1));
    }

    #[tokio::test]
    async fn all_transport_failures_reports_transport_error() {
        let model = ScriptedModel::new(vec![
            Err(LlmError::Timeout),
            Err(LlmError::HttpStatus(502)),
            Err(LlmError::Network("dns".into())),
        ]);
        let bucket = limiter();
        let d = ReviewDispatcher::new(&model, &bucket, 3);
        let outcome = d.review_file(&file(), &["rust"], "").await;

        assert_eq!(
            outcome,
            ReviewOutcome::Failed {
                reason: FailureReason::TransportError,
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn retry_state_is_isolated_between_files() {
        // First file burns a validation failure before succeeding; the next
        // file must start from a clean prompt.
        let model = ScriptedModel::new(vec![
            Ok("nope".into()),
            Ok(VALID_JSON.to_string()),
            Ok(VALID_JSON.to_string()),
        ]);
        let bucket = limiter();
        let d = ReviewDispatcher::new(&model, &bucket, 3);

        assert!(d.review_file(&file(), &["rust"], "").await.is_succeeded());
        assert!(d.review_file(&file(), &["rust"], "").await.is_succeeded());

        let third = model.prompt(2);
        assert!(!third.contains("not in the correct JSON format"));
    }

    #[tokio::test]
    async fn failed_file_does_not_block_the_next_file() {
        // First file exhausts every attempt; the second must still reach a
        // clean Succeeded outcome through the same dispatcher.
        let model = ScriptedModel::new(vec![
            Ok("bad".into()),
            Ok("worse".into()),
            Ok("hopeless".into()),
            Ok(VALID_JSON.to_string()),
        ]);
        let bucket = limiter();
        let d = ReviewDispatcher::new(&model, &bucket, 3);

        let first = d.review_file(&file(), &["rust"], "").await;
        assert_eq!(
            first,
            ReviewOutcome::Failed {
                reason: FailureReason::InvalidOutput,
                attempts: 3
            }
        );

        let second = d.review_file(&file(), &["rust"], "").await;
        match second {
            ReviewOutcome::Succeeded { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("expected success, got {other:?}"),
        }
        // The failed file's feedback never leaks into the next prompt.
        assert!(!model.prompt(3).contains("not in the correct JSON format"));
    }

    #[test]
    fn validator_accepts_embedded_control_characters() {
        let raw = "{\n  \"title\": \"t\",\n  \"comment\": \"c\",\n  \
\"line_number\": 3,\n  \"code_suggestion\": \"s\"\n}";
        let finding = validate_finding(raw).unwrap();
        assert_eq!(finding.line_number, 3);
    }

    #[test]
    fn validator_rejects_extra_and_missing_keys() {
        let extra = r#"{"title":"t","comment":"c","line_number":1,
            "code_suggestion":"s","severity":"high"}"#;
        assert!(validate_finding(extra).unwrap_err().contains("unexpected keys"));

        let missing = r#"{"title":"t","comment":"c","line_number":1}"#;
        assert!(
            validate_finding(missing)
                .unwrap_err()
                .contains("missing required key")
        );
    }

    #[test]
    fn validator_rejects_bad_field_values() {
        let empty = r#"{"title":"","comment":"c","line_number":1,"code_suggestion":"s"}"#;
        assert!(validate_finding(empty).is_err());

        let zero = r#"{"title":"t","comment":"c","line_number":0,"code_suggestion":"s"}"#;
        assert!(validate_finding(zero).is_err());

        let negative = r#"{"title":"t","comment":"c","line_number":-4,"code_suggestion":"s"}"#;
        assert!(validate_finding(negative).is_err());

        let array = r#"[{"title":"t","comment":"c","line_number":1,"code_suggestion":"s"}]"#;
        assert!(validate_finding(array).unwrap_err().contains("not a JSON object"));
    }
}
