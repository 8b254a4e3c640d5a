//! Output formats.
//!
//! Every format implements [`Exporter`]: it turns one [`PageRecord`] into
//! the bytes of one file. Paths and writing are handled by the export
//! runner, not by the exporters.

mod html;
mod markdown;
mod pdf;
mod text;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use confluence_export_client::ContentApi;
use confluence_export_shared::{ExportError, PageRecord, Result};

pub use html::HtmlExporter;
pub use markdown::MarkdownExporter;
pub use pdf::PdfExporter;
pub use text::TextExporter;

/// A format capable of rendering a page to file contents.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Canonical format name, as shown to users and in the manifest.
    fn name(&self) -> &'static str;

    /// Extension without the dot.
    fn file_extension(&self) -> &'static str;

    /// Render `page`. Malformed markup never fails; only collaborators
    /// (such as the remote PDF export) can.
    async fn convert(&self, page: &PageRecord) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// Format registry
// ---------------------------------------------------------------------------

/// The supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Markdown,
    Html,
    Txt,
    Pdf,
}

impl ExportFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Txt => "txt",
            Self::Pdf => "pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
            Self::Txt => "txt",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "txt" | "text" => Ok(Self::Txt),
            "pdf" => Ok(Self::Pdf),
            other => Err(ExportError::validation(format!(
                "unknown format '{other}' (expected one of: markdown, html, txt, pdf)"
            ))),
        }
    }
}

/// Parse format names and aliases, dropping duplicates but keeping the
/// first-seen order. Comma-separated entries are accepted.
pub fn parse_formats<S: AsRef<str>>(names: &[S]) -> Result<Vec<ExportFormat>> {
    let mut formats = Vec::new();
    for entry in names {
        for name in entry.as_ref().split(',').filter(|n| !n.trim().is_empty()) {
            let format = name.parse::<ExportFormat>()?;
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
    }
    if formats.is_empty() {
        return Err(ExportError::validation("no export format selected"));
    }
    Ok(formats)
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Format-specific switches.
#[derive(Debug, Clone, Copy)]
pub struct ExporterOptions {
    /// Markdown and text: start with the page title.
    pub include_title: bool,
    /// Markdown: YAML frontmatter with title, id and space.
    pub include_metadata: bool,
    /// HTML: wrap the body in a standalone document.
    pub html_wrapper: bool,
    /// HTML: embed the default stylesheet in the wrapper.
    pub html_styles: bool,
}

impl Default for ExporterOptions {
    fn default() -> Self {
        Self {
            include_title: true,
            include_metadata: false,
            html_wrapper: true,
            html_styles: true,
        }
    }
}

/// Build one exporter per format. PDF needs `api`.
pub fn build_exporters(
    formats: &[ExportFormat],
    options: ExporterOptions,
    api: Option<Arc<dyn ContentApi>>,
) -> Result<Vec<Box<dyn Exporter>>> {
    formats
        .iter()
        .map(|format| -> Result<Box<dyn Exporter>> {
            Ok(match format {
                ExportFormat::Markdown => Box::new(
                    MarkdownExporter::new()
                        .include_title(options.include_title)
                        .include_metadata(options.include_metadata),
                ),
                ExportFormat::Html => Box::new(
                    HtmlExporter::new()
                        .wrapper(options.html_wrapper)
                        .styles(options.html_styles),
                ),
                ExportFormat::Txt => {
                    Box::new(TextExporter::new().include_title(options.include_title))
                }
                ExportFormat::Pdf => {
                    let api = api.clone().ok_or_else(|| {
                        ExportError::config("PDF export requires a content API client")
                    })?;
                    Box::new(PdfExporter::new(api))
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_canonical_formats() {
        let formats = parse_formats(&["md", "HTML", "text", "pdf"]).unwrap();
        assert_eq!(
            formats,
            vec![
                ExportFormat::Markdown,
                ExportFormat::Html,
                ExportFormat::Txt,
                ExportFormat::Pdf
            ]
        );
        assert_eq!(ExportFormat::Txt.extension(), "txt");
        assert_eq!(ExportFormat::Markdown.extension(), "md");
    }

    #[test]
    fn duplicates_are_dropped_in_order() {
        let formats = parse_formats(&["txt,markdown", "md", "text"]).unwrap();
        assert_eq!(formats, vec![ExportFormat::Txt, ExportFormat::Markdown]);
    }

    #[test]
    fn unknown_or_empty_formats_are_rejected() {
        let err = parse_formats(&["docx"]).unwrap_err();
        assert!(err.to_string().contains("docx"));

        let empty: [&str; 0] = [];
        assert!(parse_formats(&empty).is_err());
    }

    #[test]
    fn pdf_requires_api() {
        let err = build_exporters(&[ExportFormat::Pdf], ExporterOptions::default(), None)
            .err()
            .unwrap();
        assert!(matches!(err, ExportError::Config { .. }));

        let exporters = build_exporters(
            &[ExportFormat::Markdown, ExportFormat::Txt],
            ExporterOptions::default(),
            None,
        )
        .unwrap();
        let names: Vec<_> = exporters.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["markdown", "txt"]);
    }
}
