use async_trait::async_trait;

use confluence_export_markdown::storage_to_markdown;
use confluence_export_shared::{PageRecord, Result};

use super::Exporter;

/// Markdown with an optional frontmatter block and title heading.
#[derive(Debug, Clone)]
pub struct MarkdownExporter {
    include_title: bool,
    include_metadata: bool,
}

impl Default for MarkdownExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownExporter {
    pub fn new() -> Self {
        Self {
            include_title: true,
            include_metadata: false,
        }
    }

    pub fn include_title(mut self, include_title: bool) -> Self {
        self.include_title = include_title;
        self
    }

    pub fn include_metadata(mut self, include_metadata: bool) -> Self {
        self.include_metadata = include_metadata;
        self
    }

    /// Render to a string.
    pub fn render(&self, page: &PageRecord) -> Result<String> {
        let mut parts: Vec<String> = Vec::new();

        if self.include_metadata {
            parts.push("---".into());
            parts.push(format!("title: {}", yaml_quote(&page.title)));
            parts.push(format!("page_id: {}", yaml_quote(&page.id)));
            if let Some(space) = &page.space_key {
                parts.push(format!("space: {}", yaml_quote(space)));
            }
            parts.push("---".into());
            parts.push(String::new());
        }

        if self.include_title {
            parts.push(format!("# {}", page.title));
            parts.push(String::new());
        }

        parts.push(storage_to_markdown(&page.body)?);
        Ok(parts.join("\n"))
    }
}

/// Double-quoted YAML scalar.
fn yaml_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[async_trait]
impl Exporter for MarkdownExporter {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn file_extension(&self) -> &'static str {
        "md"
    }

    async fn convert(&self, page: &PageRecord) -> Result<Vec<u8>> {
        Ok(self.render(page)?.into_bytes())
    }
}
