//! Export side of confluence-export.
//!
//! Turns fetched [`PageRecord`](confluence_export_shared::PageRecord)s into
//! files: output path derivation, the per-format [`Exporter`]s, the export
//! runner that writes them, and the optional manifest.

pub mod export;
pub mod exporters;
pub mod manifest;
pub mod paths;

pub use export::{ExportFailure, ExportOptions, ExportOutcome, ExportedFile, export_pages};
pub use exporters::{
    ExportFormat, Exporter, ExporterOptions, HtmlExporter, MarkdownExporter, PdfExporter,
    TextExporter, build_exporters, parse_formats,
};
pub use manifest::{Manifest, ManifestContext, ManifestPaths, build_manifest, write_manifest};
pub use paths::{build_file_path, page_file_path, sanitize_filename};
