//! Output path derivation.
//!
//! A page's file is `<sanitized title>-<id>.<ext>`, placed either directly in
//! the output directory (flat) or under one directory per ancestor title.

use std::path::{Path, PathBuf};

use confluence_export_shared::PageRecord;

/// Longest sanitized name, in characters.
pub const MAX_NAME_CHARS: usize = 200;

/// Substituted when a name sanitizes to nothing.
const FALLBACK_NAME: &str = "untitled";

/// Make `name` safe as a single path component on common filesystems.
///
/// Reserved characters (`< > : " / \ | ? *`), control characters and
/// whitespace become `_`, runs of `_` collapse to one, and leading or
/// trailing `_` are removed. The result is cut to [`MAX_NAME_CHARS`]
/// characters. Names that end up empty or made only of dots are replaced
/// by `untitled`. Non-ASCII characters pass through unchanged.
///
/// Applying the function twice gives the same result as applying it once.
pub fn sanitize_filename(name: &str) -> String {
    let mut collapsed = String::with_capacity(name.len());
    for ch in name.chars() {
        let ch = if is_reserved(ch) || ch.is_whitespace() || ch.is_control() {
            '_'
        } else {
            ch
        };
        if ch == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(ch);
    }

    let truncated: String = collapsed
        .trim_matches('_')
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();
    let name = truncated.trim_end_matches('_');

    if name.is_empty() || name.chars().all(|c| c == '.') {
        FALLBACK_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn is_reserved(ch: char) -> bool {
    matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
}

/// Build the output path for a page.
///
/// With `flat`, or when `hierarchy_path` is empty, the file goes directly
/// into `output_dir`. Otherwise every ancestor title is sanitized into one
/// nested directory, root first.
pub fn build_file_path(
    output_dir: &Path,
    title: &str,
    id: &str,
    extension: &str,
    hierarchy_path: &[String],
    flat: bool,
) -> PathBuf {
    let filename = format!("{}-{id}.{extension}", sanitize_filename(title));

    let mut path = output_dir.to_path_buf();
    if !flat {
        for segment in hierarchy_path {
            path.push(sanitize_filename(segment));
        }
    }
    path.push(filename);
    path
}

/// [`build_file_path`] for a fetched page.
pub fn page_file_path(output_dir: &Path, page: &PageRecord, extension: &str, flat: bool) -> PathBuf {
    build_file_path(
        output_dir,
        &page.title,
        &page.id,
        extension,
        &page.hierarchy_path,
        flat,
    )
}
