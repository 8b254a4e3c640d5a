//! Confluence storage format to Markdown and plain text.
//!
//! Bodies are parsed with a lenient storage-format parser, structured macros
//! are classified into [`Macro`] variants and rendered directly, and the
//! remaining standard HTML is converted with the `htmd` crate. A cleanup
//! pipeline normalizes the result.

mod cleanup;
mod macros;
mod render;
mod storage;
mod text;

use tracing::{debug, instrument};

use confluence_export_shared::Result;

pub use macros::{AdmonitionKind, Macro, classify};
pub use storage::{Element, Node, decode_entities, parse};
pub use text::storage_to_text;

/// Convert a storage-format body to Markdown.
///
/// Empty or whitespace-only input yields an empty string. Malformed markup
/// degrades to best-effort output; an error is only returned if the HTML
/// converter itself fails.
#[instrument(skip_all, fields(input_len = storage.len()))]
pub fn storage_to_markdown(storage: &str) -> Result<String> {
    if storage.trim().is_empty() {
        return Ok(String::new());
    }

    let nodes = parse(storage);
    let raw = render::convert_nodes(&nodes)?;
    let markdown = cleanup::run_pipeline(&raw);

    debug!(output_len = markdown.len(), "storage conversion complete");
    Ok(markdown)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
