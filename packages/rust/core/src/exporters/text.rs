use async_trait::async_trait;

use confluence_export_markdown::storage_to_text;
use confluence_export_shared::{PageRecord, Result};

use super::Exporter;

/// Plain text: an underlined title followed by the readable body text.
#[derive(Debug, Clone)]
pub struct TextExporter {
    include_title: bool,
}

impl Default for TextExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExporter {
    pub fn new() -> Self {
        Self {
            include_title: true,
        }
    }

    pub fn include_title(mut self, include_title: bool) -> Self {
        self.include_title = include_title;
        self
    }

    pub fn render(&self, page: &PageRecord) -> String {
        let mut parts = Vec::with_capacity(4);
        if self.include_title {
            parts.push(page.title.clone());
            parts.push("=".repeat(page.title.chars().count()));
            parts.push(String::new());
        }
        parts.push(storage_to_text(&page.body));
        parts.join("\n")
    }
}

#[async_trait]
impl Exporter for TextExporter {
    fn name(&self) -> &'static str {
        "txt"
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }

    async fn convert(&self, page: &PageRecord) -> Result<Vec<u8>> {
        Ok(self.render(page).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_underlined_by_char_count() {
        let page = PageRecord::top_level("1", "Café").with_body("<p>Menu</p>".into());
        assert_eq!(TextExporter::new().render(&page), "Café\n====\n\nMenu");
    }

    #[test]
    fn title_can_be_omitted() {
        let page = PageRecord::top_level("1", "Ignored").with_body("<ul><li>a</li></ul>".into());
        assert_eq!(TextExporter::new().include_title(false).render(&page), "• a");
    }
}
