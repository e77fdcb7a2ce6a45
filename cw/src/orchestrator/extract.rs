//! Artifact extractor
//!
//! Turns a model's raw completion text into named artifacts plus a
//! narrative explanation. Artifacts are fenced blocks whose opening fence
//! carries a filename-like tag; the explanation is the text with every
//! fenced block removed.

use std::sync::LazyLock;

use regex::Regex;

/// Opening fence with a tag, then content, then a closing fence
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_./\-]+)[ \t]*\r?\n(.*?)```").expect("hard-coded pattern")
});

/// Any fenced block, tagged or not
static ANY_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("hard-coded pattern"));

/// A named file extracted from completion text
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: String,
    pub content: String,
}

/// Result of extracting artifacts from completion text
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Artifacts in first-seen order; a repeated filename keeps its slot but
    /// takes the last content (last-wins)
    pub artifacts: Vec<Artifact>,

    /// Input text with all fenced blocks removed, edge-trimmed
    pub explanation: String,
}

impl Extraction {
    /// Look up an artifact's content by filename
    pub fn artifact(&self, name: &str) -> Option<&str> {
        self.artifacts.iter().find(|a| a.name == name).map(|a| a.content.as_str())
    }

    /// Short preview of all artifacts for prompt embedding
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview = String::new();
        for artifact in &self.artifacts {
            preview.push_str(&format!("----- {} -----\n{}\n", artifact.name, artifact.content));
        }
        truncate_chars(&preview, max_chars)
    }
}

/// A fence tag names a file only if it looks like a path; bare language
/// tags (```python) carry neither a dot nor a slash.
fn is_filename_like(tag: &str) -> bool {
    tag.contains('.') || tag.contains('/')
}

/// Truncate to a character budget, appending an ellipsis marker when cut
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

/// Extract named artifacts and the surrounding explanation
pub fn extract_artifacts(text: &str) -> Extraction {
    let mut artifacts: Vec<Artifact> = Vec::new();

    for capture in FENCE.captures_iter(text) {
        let tag = capture[1].trim();
        if !is_filename_like(tag) {
            continue;
        }

        let content = capture[2].trim().to_string();
        match artifacts.iter_mut().find(|a| a.name == tag) {
            Some(existing) => existing.content = content,
            None => artifacts.push(Artifact {
                name: tag.to_string(),
                content,
            }),
        }
    }

    let explanation = ANY_FENCE.replace_all(text, "").trim().to_string();

    Extraction { artifacts, explanation }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_code_passes_through() {
        let extraction = extract_artifacts("no code here");
        assert!(extraction.artifacts.is_empty());
        assert_eq!(extraction.explanation, "no code here");
    }

    #[test]
    fn test_single_named_block() {
        let text = "Here is the program:\n```main.py\nprint(1)\n```\nThat is all.";
        let extraction = extract_artifacts(text);

        assert_eq!(extraction.artifacts.len(), 1);
        assert_eq!(extraction.artifact("main.py"), Some("print(1)"));
        assert!(!extraction.explanation.contains("print(1)"));
        assert!(extraction.explanation.contains("Here is the program:"));
        assert!(extraction.explanation.contains("That is all."));
    }

    #[test]
    fn test_language_tag_is_not_an_artifact() {
        let text = "Intro.\n```python\nprint(1)\n```\nOutro.";
        let extraction = extract_artifacts(text);

        assert!(extraction.artifacts.is_empty());
        // The block is still stripped from the explanation.
        assert!(!extraction.explanation.contains("print(1)"));
        assert!(extraction.explanation.contains("Intro."));
    }

    #[test]
    fn test_multiple_files_keep_first_seen_order() {
        let text = "```src/app.js\nconsole.log(1)\n```\ntext\n```index.html\n<html></html>\n```";
        let extraction = extract_artifacts(text);

        let names: Vec<&str> = extraction.artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["src/app.js", "index.html"]);
    }

    #[test]
    fn test_duplicate_filename_last_wins() {
        let text = "```main.py\nprint(1)\n```\n```main.py\nprint(2)\n```";
        let extraction = extract_artifacts(text);

        assert_eq!(extraction.artifacts.len(), 1);
        assert_eq!(extraction.artifact("main.py"), Some("print(2)"));
    }

    #[test]
    fn test_content_is_trimmed() {
        let text = "```notes.txt\n\n  hello  \n\n```";
        let extraction = extract_artifacts(text);
        assert_eq!(extraction.artifact("notes.txt"), Some("hello"));
    }

    #[test]
    fn test_explanation_collapses_to_empty_for_code_only_input() {
        let text = "```main.py\nprint(1)\n```";
        let extraction = extract_artifacts(text);
        assert_eq!(extraction.explanation, "");
    }

    #[test]
    fn test_preview_truncates() {
        let text = "```main.py\nprint(1)\n```";
        let extraction = extract_artifacts(text);

        let full = extraction.preview(10_000);
        assert!(full.contains("----- main.py -----"));
        assert!(full.contains("print(1)"));

        let cut = extraction.preview(10);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 13);
    }

    #[test]
    fn test_crlf_after_fence_tag() {
        let text = "```main.py\r\nprint(1)\r\n```";
        let extraction = extract_artifacts(text);
        assert_eq!(extraction.artifact("main.py"), Some("print(1)"));
    }
}
