//! File-extension based language detection.
//!
//! Used by the pipeline to decide which files are worth sending to the
//! model. Whether unrecognized files are skipped or reviewed anyway is a
//! run-time policy, not a hard-coded exclusion.

/// What to do with files whose extension maps to no known language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LanguagePolicy {
    /// Skip unrecognized files (images, lockfiles, generated blobs...).
    #[default]
    Skip,
    /// Review every non-binary file with a non-empty patch.
    ReviewAnyway,
}

impl LanguagePolicy {
    /// Reads `REVIEW_LANGUAGE_POLICY` (`skip` | `review-anyway`).
    pub fn from_env() -> Self {
        match std::env::var("REVIEW_LANGUAGE_POLICY").ok().as_deref() {
            Some("review-anyway") => Self::ReviewAnyway,
            _ => Self::Skip,
        }
    }
}

/// Languages associated with a filename's extension, most specific first.
/// Empty when the extension is unknown or the name has no extension.
pub fn detect_languages(filename: &str) -> &'static [&'static str] {
    let basename = filename.rsplit('/').next().unwrap_or(filename);
    let Some((_, ext)) = basename.rsplit_once('.') else {
        return &[];
    };
    languages_for_extension(&ext.to_lowercase())
}

fn languages_for_extension(ext: &str) -> &'static [&'static str] {
    match ext {
        // Programming languages
        "py" => &["python"],
        "js" | "jsx" | "mjs" | "cjs" => &["javascript"],
        "ts" | "tsx" => &["typescript", "javascript"],
        "java" => &["java"],
        "go" => &["go"],
        "rb" => &["ruby"],
        "php" | "phtml" | "php3" | "php4" | "php5" | "php7" | "phps" => &["php"],
        "cs" => &["csharp"],
        "cpp" | "cxx" | "cc" => &["c++"],
        "hpp" | "hxx" | "hh" => &["c++", "c"],
        "c" => &["c"],
        "h" => &["c", "c++"],
        "swift" => &["swift"],
        "kt" | "kts" => &["kotlin"],
        "rs" => &["rust"],
        "scala" | "sc" => &["scala"],
        // Web and markup
        "html" | "htm" | "xhtml" | "html5" => &["html"],
        "css" => &["css"],
        "scss" => &["scss", "css"],
        "sass" => &["sass", "css"],
        "less" => &["less", "css"],
        // Template and configuration
        "json" => &["json"],
        "yaml" | "yml" => &["yaml"],
        "xml" => &["xml"],
        "md" | "markdown" => &["markdown"],
        // Shell and scripts
        "sh" | "bash" | "zsh" | "fish" => &["shell"],
        "ps1" | "psm1" | "psd1" => &["powershell"],
        // Database
        "sql" => &["sql"],
        // Configuration files
        "env" => &["dotenv"],
        "toml" => &["toml"],
        "ini" | "cfg" | "prefs" => &["ini"],
        "dockerfile" | "dockerignore" => &["dockerfile"],
        "gitignore" | "gitattributes" | "gitmodules" => &["git"],
        "editorconfig" => &["editorconfig"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_resolve() {
        assert_eq!(detect_languages("src/main.rs"), &["rust"]);
        assert_eq!(detect_languages("app.tsx"), &["typescript", "javascript"]);
        assert_eq!(detect_languages("deep/path/to/script.PY"), &["python"]);
    }

    #[test]
    fn unknown_or_missing_extension_is_empty() {
        assert!(detect_languages("logo.png").is_empty());
        assert!(detect_languages("Makefile").is_empty());
        assert!(detect_languages("").is_empty());
    }

    #[test]
    fn dotfiles_use_their_suffix() {
        assert_eq!(detect_languages(".gitignore"), &["git"]);
        assert_eq!(detect_languages("conf/.env"), &["dotenv"]);
    }
}
