//! Custom review instruction loading.
//!
//! Instructions are plain text/markdown files in a local directory; their
//! contents are concatenated (sorted by filename, `\n\n`-joined) and passed
//! verbatim into every review prompt of the run. A missing or unreadable
//! directory degrades to empty instructions with a warning.

use std::path::Path;

use tracing::{debug, warn};

/// Loads and concatenates every regular file in `dir`.
pub async fn load_instructions(dir: &Path) -> String {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "instructions: cannot read {}: {}; continuing without custom instructions",
                dir.display(),
                e
            );
            return String::new();
        }
    };

    let mut paths = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        match entry.file_type().await {
            Ok(ft) if ft.is_file() => paths.push(entry.path()),
            _ => {}
        }
    }
    // Directory iteration order is platform-defined; sort for stable prompts.
    paths.sort();

    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        match tokio::fs::read_to_string(&path).await {
            Ok(content) if !content.trim().is_empty() => {
                debug!("instructions: loaded {}", path.display());
                parts.push(content.trim().to_string());
            }
            Ok(_) => {}
            Err(e) => warn!("instructions: skipping {}: {}", path.display(), e),
        }
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_directory_yields_empty_instructions() {
        let loaded = load_instructions(Path::new("/nonexistent/instructions")).await;
        assert_eq!(loaded, "");
    }

    #[tokio::test]
    async fn files_are_concatenated_in_name_order() {
        let dir = std::env::temp_dir().join(format!("cr-instr-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("b.md"), "second rule").await.unwrap();
        tokio::fs::write(dir.join("a.md"), "first rule\n").await.unwrap();

        let loaded = load_instructions(&dir).await;
        assert_eq!(loaded, "first rule\n\nsecond rule");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
