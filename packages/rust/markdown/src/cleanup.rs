//! Post-conversion cleanup pipeline for Markdown output.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline. The result is trimmed; empty input yields
/// an empty string.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = normalize_line_endings(md);

    result = tighten_list_markers(&result);
    result = trim_trailing_whitespace(&result);
    result = collapse_blank_lines(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings
// ---------------------------------------------------------------------------

fn normalize_line_endings(md: &str) -> String {
    md.replace("\r\n", "\n").replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: List markers
// ---------------------------------------------------------------------------

/// Use a single space after bullet and ordered-list markers, outside code.
fn tighten_list_markers(md: &str) -> String {
    static MARKER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(\s*)([-*+]|\d+\.) {2,}(\S)").expect("valid regex"));

    let mut in_code_block = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_code_block = !in_code_block;
                return line.to_string();
            }
            if in_code_block {
                return line.to_string();
            }
            MARKER_RE.replace(line, "$1$2 $3").into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Trailing whitespace
// ---------------------------------------------------------------------------

/// Strip trailing whitespace outside code blocks. A two-space hard break is
/// kept; whitespace-only lines become empty so blank runs collapse.
fn trim_trailing_whitespace(md: &str) -> String {
    let mut in_code_block = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_code_block = !in_code_block;
                return line.trim_end();
            }
            if line.trim().is_empty() {
                return "";
            }
            if in_code_block || line.ends_with("  ") {
                return line;
            }
            line.trim_end()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 4: Blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ newlines into exactly 2.
fn collapse_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
