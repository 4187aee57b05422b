//! Shared text helpers for parsing model output.

use regex::Regex;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^```([A-Za-z0-9_+.-]*)[ \t]*\r?\n(.*?)^```").expect("fenced block regex is valid")
});

/// Extract a JSON object from text that may contain other content.
/// Uses brace-counting to find the outermost JSON object.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0;
    let mut end = start;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > start {
        Some(text[start..end].to_string())
    } else {
        None
    }
}

/// Return the body of the first fenced block, optionally restricted to one
/// language tag (case-insensitive).
pub fn extract_fenced_block(content: &str, lang: Option<&str>) -> Option<String> {
    FENCED_BLOCK
        .captures_iter(content)
        .find(|caps| match lang {
            Some(wanted) => caps[1].eq_ignore_ascii_case(wanted),
            None => true,
        })
        .map(|caps| caps[2].to_string())
}

/// Pull generated source out of a coding response.
///
/// Returns `None` when the model ignored the fenced-block format; callers fall
/// back to the full response text.
pub fn extract_code_from_content(content: &str) -> Option<String> {
    extract_fenced_block(content, None).filter(|code| !code.trim().is_empty())
}

/// Flatten a file identifier into a single path component for per-file
/// artifacts that live side by side (`models/net.py` -> `models_net.py`).
pub fn flat_name(file: &str) -> String {
    file.replace(['/', '\\'], "_")
}

/// Fence language for a file identifier, by extension.
pub fn fence_language(file: &str) -> &'static str {
    match file.rsplit_once('.').map(|(_, ext)| ext) {
        Some("py") => "python",
        Some("sh") => "bash",
        Some("yaml") | Some("yml") => "yaml",
        Some("json") => "json",
        Some("rs") => "rust",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("md") => "markdown",
        _ => "",
    }
}
