//! Prompt assembly for the reviewer model.
//!
//! The model is asked for exactly one JSON object with the four finding
//! fields; the validator in `review` enforces that contract.

use crate::parser::FileDiff;

/// Standing rules sent with every request. Custom user instructions are
/// injected above the output-format contract so they can tighten, but not
/// loosen, the schema.
const REVIEW_RULES: &str = "\
You are a senior code reviewer responsible for analyzing one file's diff \
from a pull request.

Return structured feedback as a single **JSON object** and nothing else. \
The response is parsed directly, so do not wrap it in prose or code fences.

## JSON output format
The object must contain **exactly** these four keys:

- `title`: a short, descriptive title summarizing the feedback.
- `comment`: a clear explanation of what the issue is, why it matters, and \
how to fix it. Be educational and constructive.
- `line_number`: the line number (from the new code) where the issue or \
suggestion applies. Use the first line number of the affected block.
- `code_suggestion`: a properly formatted code suggestion using `diff` \
syntax inside a Markdown fenced code block.

All four keys are mandatory and must be non-empty. Do not add, omit or \
rename keys.

## Review guidelines
Look for logic flaws, unsafe patterns, missing validation or error \
handling, poor naming, untested edge cases, and unnecessary complexity. \
Pick the single most valuable finding for this diff.";

/// Builds the full prompt for one file review.
pub fn build_review_prompt(
    file: &FileDiff,
    languages: &[&str],
    custom_instructions: &str,
) -> String {
    let instructions = if custom_instructions.trim().is_empty() {
        "No custom instructions provided."
    } else {
        custom_instructions
    };
    format!(
        "{REVIEW_RULES}\n\n## Custom instructions\n{instructions}\n\n\
# Filename: {}\n# Languages: {}\n{}\n",
        file.filename,
        if languages.is_empty() {
            "unknown".to_string()
        } else {
            languages.join(", ")
        },
        fence_patch(&file.patch),
    )
}

/// Wraps the patch in a ```diff fence, neutralizing embedded fences so the
/// prompt structure survives arbitrary diff content.
fn fence_patch(patch: &str) -> String {
    let safe = patch.replace("```", "''");
    format!("```diff\n{safe}\n```")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{FileDiff, FileStatus};

    fn file(patch: &str) -> FileDiff {
        FileDiff {
            filename: "src/lib.rs".into(),
            previous_filename: None,
            status: FileStatus::Modified,
            additions: 1,
            deletions: 0,
            is_binary: false,
            base_sha: None,
            head_sha: None,
            patch: patch.into(),
        }
    }

    #[test]
    fn prompt_carries_filename_languages_and_fenced_patch() {
        let p = build_review_prompt(&file("+let x = 1;"), &["rust"], "");
        assert!(p.contains("# Filename: src/lib.rs"));
        assert!(p.contains("# Languages: rust"));
        assert!(p.contains("```diff\n+let x = 1;\n```"));
        assert!(p.contains("No custom instructions provided."));
    }

    #[test]
    fn embedded_fences_are_neutralized() {
        let p = build_review_prompt(&file("+```rust"), &[], "house rules");
        assert!(!p.contains("```rust"));
        assert!(p.contains("house rules"));
        assert!(p.contains("# Languages: unknown"));
    }
}
