//! Export manifest: `manifest.json` plus a human-readable `INDEX.md`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use confluence_export_shared::{ExportError, PageRecord, Result};

use crate::export::{ExportOutcome, write_atomic};

pub const MANIFEST_VERSION: &str = "1.0";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const INDEX_FILE: &str = "INDEX.md";

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub manifest_version: String,
    pub generated_at: DateTime<Utc>,
    pub export_info: ExportInfo,
    pub statistics: Statistics,
    pub pages: Vec<ManifestPage>,
    pub hierarchy: Vec<HierarchyNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ManifestError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub base_url: String,
    pub output_directory: String,
    pub formats: Vec<String>,
    pub include_children: bool,
    pub flat_structure: bool,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_pages: usize,
    pub total_files: usize,
    pub failed_exports: usize,
    pub formats_used: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPage {
    pub id: String,
    pub title: String,
    pub space_key: Option<String>,
    pub hierarchy_path: Vec<String>,
    pub hierarchy_depth: usize,
    pub parent_id: Option<String>,
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub format: String,
    pub path: String,
    pub sha256: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: String,
    pub title: String,
    pub depth: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HierarchyNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestError {
    pub page_id: String,
    pub title: String,
    pub format: String,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Run-level facts recorded in `export_info`.
#[derive(Debug, Clone)]
pub struct ManifestContext {
    pub base_url: String,
    pub output_dir: PathBuf,
    pub formats: Vec<String>,
    pub include_children: bool,
    pub flat: bool,
    pub duration: Duration,
}

/// Assemble the manifest for an export run.
pub fn build_manifest(
    context: &ManifestContext,
    pages: &[PageRecord],
    outcome: &ExportOutcome,
) -> Manifest {
    let mut files_by_page: HashMap<&str, Vec<ManifestFile>> = HashMap::new();
    let mut formats_used: Vec<String> = Vec::new();
    for file in &outcome.files {
        files_by_page
            .entry(file.page_id.as_str())
            .or_default()
            .push(ManifestFile {
                format: file.format.clone(),
                path: file.path.display().to_string(),
                sha256: file.sha256.clone(),
                size_bytes: file.size_bytes,
            });
        if !formats_used.contains(&file.format) {
            formats_used.push(file.format.clone());
        }
    }

    let manifest_pages = pages
        .iter()
        .map(|page| ManifestPage {
            id: page.id.clone(),
            title: page.title.clone(),
            space_key: page.space_key.clone(),
            hierarchy_path: page.hierarchy_path.clone(),
            hierarchy_depth: page.hierarchy_depth,
            parent_id: page.parent_id.clone(),
            files: files_by_page.remove(page.id.as_str()).unwrap_or_default(),
        })
        .collect();

    let errors = outcome
        .failures
        .iter()
        .map(|failure| ManifestError {
            page_id: failure.page_id.clone(),
            title: failure.title.clone(),
            format: failure.format.clone(),
            error: failure.error.clone(),
        })
        .collect();

    Manifest {
        manifest_version: MANIFEST_VERSION.to_string(),
        generated_at: Utc::now(),
        export_info: ExportInfo {
            base_url: context.base_url.clone(),
            output_directory: context.output_dir.display().to_string(),
            formats: context.formats.clone(),
            include_children: context.include_children,
            flat_structure: context.flat,
            duration_seconds: (context.duration.as_secs_f64() * 100.0).round() / 100.0,
        },
        statistics: Statistics {
            total_pages: pages.len(),
            total_files: outcome.files.len(),
            failed_exports: outcome.failures.len(),
            formats_used,
        },
        pages: manifest_pages,
        hierarchy: build_hierarchy(pages),
        errors,
    }
}

/// Tree of the exported pages by parent id. Pages whose parent was not
/// exported become roots. Siblings are sorted by title.
pub fn build_hierarchy(pages: &[PageRecord]) -> Vec<HierarchyNode> {
    let exported: HashMap<&str, &PageRecord> =
        pages.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut roots: Vec<&PageRecord> = Vec::new();
    let mut children: HashMap<&str, Vec<&PageRecord>> = HashMap::new();
    for page in pages {
        match page.parent_id.as_deref() {
            Some(parent) if parent != page.id && exported.contains_key(parent) => {
                children.entry(parent).or_default().push(page);
            }
            _ => roots.push(page),
        }
    }

    fn node(page: &PageRecord, children: &HashMap<&str, Vec<&PageRecord>>) -> HierarchyNode {
        let mut kids = children.get(page.id.as_str()).cloned().unwrap_or_default();
        kids.sort_by(|a, b| a.title.cmp(&b.title));
        HierarchyNode {
            id: page.id.clone(),
            title: page.title.clone(),
            depth: page.hierarchy_depth,
            children: kids.into_iter().map(|kid| node(kid, children)).collect(),
        }
    }

    roots.sort_by(|a, b| a.title.cmp(&b.title));
    roots.into_iter().map(|root| node(root, &children)).collect()
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the Markdown index.
pub fn render_index(manifest: &Manifest) -> String {
    let info = &manifest.export_info;
    let stats = &manifest.statistics;
    let output_dir = Path::new(&info.output_directory);

    let mut lines = vec![
        "# Export Index".to_string(),
        String::new(),
        format!("Generated: {}", manifest.generated_at.to_rfc3339()),
        String::new(),
        "## Export Information".to_string(),
        String::new(),
        format!("- **Source**: {}", info.base_url),
        format!("- **Formats**: {}", info.formats.join(", ")),
        format!(
            "- **Include Children**: {}",
            if info.include_children { "Yes" } else { "No" }
        ),
        format!(
            "- **Structure**: {}",
            if info.flat_structure { "Flat" } else { "Hierarchical" }
        ),
        format!("- **Duration**: {}s", info.duration_seconds),
        String::new(),
        "## Statistics".to_string(),
        String::new(),
        format!("- **Total Pages**: {}", stats.total_pages),
        format!("- **Total Files**: {}", stats.total_files),
        format!("- **Failed**: {}", stats.failed_exports),
        String::new(),
        "## Page Hierarchy".to_string(),
        String::new(),
    ];

    let mut stack: Vec<(&HierarchyNode, usize)> =
        manifest.hierarchy.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, indent)) = stack.pop() {
        lines.push(format!(
            "{}- **{}** (ID: {})",
            "  ".repeat(indent),
            node.title,
            node.id
        ));
        stack.extend(node.children.iter().rev().map(|c| (c, indent + 1)));
    }
    lines.push(String::new());

    lines.push("## Exported Files".to_string());
    lines.push(String::new());
    for page in manifest.pages.iter().filter(|p| !p.files.is_empty()) {
        lines.push(format!("### {}", page.title));
        lines.push(String::new());
        for file in &page.files {
            lines.push(format!("- [{}]({})", file.format, relative_link(output_dir, &file.path)));
        }
        lines.push(String::new());
    }

    if !manifest.errors.is_empty() {
        lines.push("## Errors".to_string());
        lines.push(String::new());
        for error in &manifest.errors {
            lines.push(format!(
                "- **{}** ({}): {}",
                error.title, error.format, error.error
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Output-relative path with `/` separators, for Markdown links.
fn relative_link(output_dir: &Path, path: &str) -> String {
    let path = Path::new(path);
    let relative = path.strip_prefix(output_dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Paths of the written manifest files.
#[derive(Debug, Clone)]
pub struct ManifestPaths {
    pub json: PathBuf,
    pub index: PathBuf,
}

/// Write `manifest.json` and `INDEX.md` into `output_dir`.
#[instrument(skip_all, fields(output = %output_dir.display(), pages = manifest.pages.len()))]
pub fn write_manifest(manifest: &Manifest, output_dir: &Path) -> Result<ManifestPaths> {
    let json = serde_json::to_string_pretty(manifest).map_err(|e| {
        ExportError::validation(format!("manifest serialization failed: {e}"))
    })?;

    let paths = ManifestPaths {
        json: output_dir.join(MANIFEST_FILE),
        index: output_dir.join(INDEX_FILE),
    };
    write_atomic(&paths.json, json.as_bytes())?;
    write_atomic(&paths.index, render_index(manifest).as_bytes())?;

    info!(json = %paths.json.display(), index = %paths.index.display(), "manifest written");
    Ok(paths)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
