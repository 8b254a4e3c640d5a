use async_trait::async_trait;

use confluence_export_shared::{PageRecord, Result};

use super::Exporter;

const STYLESHEET: &str = r#"<style>
    body {
        font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Oxygen, Ubuntu, sans-serif;
        line-height: 1.6;
        max-width: 900px;
        margin: 0 auto;
        padding: 2rem;
        color: #333;
    }
    h1, h2, h3, h4, h5, h6 { margin-top: 1.5em; margin-bottom: 0.5em; color: #1a1a1a; }
    h1 { font-size: 2em; border-bottom: 2px solid #eee; padding-bottom: 0.3em; }
    h2 { font-size: 1.5em; border-bottom: 1px solid #eee; padding-bottom: 0.3em; }
    code {
        background-color: #f4f4f4;
        padding: 0.2em 0.4em;
        border-radius: 3px;
        font-family: "SF Mono", Monaco, "Courier New", monospace;
        font-size: 0.9em;
    }
    pre { background-color: #f4f4f4; padding: 1em; border-radius: 5px; overflow-x: auto; }
    pre code { padding: 0; background: none; }
    table { border-collapse: collapse; width: 100%; margin: 1em 0; }
    th, td { border: 1px solid #ddd; padding: 0.75em; text-align: left; }
    th { background-color: #f4f4f4; }
    tr:nth-child(even) { background-color: #fafafa; }
    blockquote {
        border-left: 4px solid #ddd;
        margin: 1em 0;
        padding: 0.5em 1em;
        color: #666;
        background-color: #f9f9f9;
    }
    img { max-width: 100%; height: auto; }
    a { color: #0066cc; text-decoration: none; }
    a:hover { text-decoration: underline; }
    .panel { border: 1px solid #ddd; border-radius: 4px; margin: 1em 0; }
    .panelHeader {
        background-color: #f4f4f4;
        padding: 0.5em 1em;
        border-bottom: 1px solid #ddd;
        font-weight: bold;
    }
    .panelContent { padding: 1em; }
</style>"#;

/// The stored body, optionally wrapped in a standalone HTML document.
///
/// The body is written as stored; macros are not expanded.
#[derive(Debug, Clone)]
pub struct HtmlExporter {
    wrapper: bool,
    styles: bool,
}

impl Default for HtmlExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlExporter {
    pub fn new() -> Self {
        Self {
            wrapper: true,
            styles: true,
        }
    }

    pub fn wrapper(mut self, wrapper: bool) -> Self {
        self.wrapper = wrapper;
        self
    }

    pub fn styles(mut self, styles: bool) -> Self {
        self.styles = styles;
        self
    }

    pub fn render(&self, page: &PageRecord) -> String {
        if !self.wrapper {
            return page.body.clone();
        }

        let title = escape_html(&page.title);
        let styles = if self.styles { STYLESHEET } else { "" };
        format!(
            "<!DOCTYPE html>\n\
             <html lang=\"en\">\n\
             <head>\n\
             <meta charset=\"UTF-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
             <title>{title}</title>\n\
             {styles}\n\
             </head>\n\
             <body>\n\
             <article>\n\
             <h1>{title}</h1>\n\
             {body}\n\
             </article>\n\
             </body>\n\
             </html>\n",
            body = page.body,
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[async_trait]
impl Exporter for HtmlExporter {
    fn name(&self) -> &'static str {
        "html"
    }

    fn file_extension(&self) -> &'static str {
        "html"
    }

    async fn convert(&self, page: &PageRecord) -> Result<Vec<u8>> {
        Ok(self.render(page).into_bytes())
    }
}
