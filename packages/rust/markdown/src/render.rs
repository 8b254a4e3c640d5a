//! Storage format to Markdown.
//!
//! The parsed tree is re-serialised as plain HTML for `htmd`. Confluence
//! constructs are rendered to Markdown directly and travel through `htmd`
//! as opaque slot tokens, which are substituted back afterwards so their
//! output is never escaped.

use std::sync::LazyLock;

use htmd::options::{BulletListMarker, Options};
use regex::{Captures, Regex};
use tracing::debug;

use confluence_export_shared::{ExportError, Result};

use crate::cleanup;
use crate::macros::{Macro, classify};
use crate::storage::{Element, Node, is_void};

const SLOT_OPEN: char = '\u{E000}';
const SLOT_CLOSE: char = '\u{E001}';

/// Convert a node list to Markdown. Not cleaned up or trimmed.
pub(crate) fn convert_nodes(nodes: &[Node]) -> Result<String> {
    let mut renderer = Renderer::default();
    renderer.nodes(nodes)?;

    if renderer.html.trim().is_empty() {
        return Ok(String::new());
    }

    let markdown = html_to_markdown(&renderer.html)?;
    Ok(fill_slots(&markdown, &renderer.slots))
}

fn html_to_markdown(html: &str) -> Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .options(Options {
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .skip_tags(vec!["script", "style", "iframe", "noscript"])
        .build();

    converter
        .convert(html)
        .map_err(|e| ExportError::Conversion(format!("htmd conversion failed: {e}")))
}

/// Converted, cleaned and trimmed Markdown for a macro or task body.
fn body_markdown(body: Option<&Element>) -> Result<String> {
    match body {
        Some(el) => Ok(cleanup::run_pipeline(&convert_nodes(&el.children)?)),
        None => Ok(String::new()),
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Renderer {
    html: String,
    slots: Vec<String>,
}

impl Renderer {
    fn slot(&mut self, content: String) -> String {
        let index = self.slots.len();
        self.slots.push(content);
        format!("{SLOT_OPEN}{index}{SLOT_CLOSE}")
    }

    /// Emit pre-rendered Markdown as its own paragraph.
    fn block(&mut self, content: String) {
        if content.is_empty() {
            return;
        }
        let token = self.slot(content);
        self.html.push_str("<p>");
        self.html.push_str(&token);
        self.html.push_str("</p>");
    }

    /// Emit pre-rendered Markdown inside the current line.
    fn inline(&mut self, content: String) {
        if content.is_empty() {
            return;
        }
        let token = self.slot(content);
        self.html.push_str(&token);
    }

    fn nodes(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) | Node::CData(text) => push_escaped(&mut self.html, text),
                Node::Element(el) => self.element(el)?,
            }
        }
        Ok(())
    }

    fn element(&mut self, el: &Element) -> Result<()> {
        match el.name.as_str() {
            "ac:structured-macro" | "ac:macro" => self.structured_macro(el)?,
            "ac:image" => self.inline(image(el)),
            "ac:link" => self.inline(link(el)),
            "ri:user" => self.inline(mention(el)),
            "ac:emoticon" => self.inline(
                el.attr("ac:emoji-fallback")
                    .unwrap_or_default()
                    .to_string(),
            ),
            "ac:task-list" => self.block(task_list(el)?),
            "ac:task" => self.block(task_line(el)?),
            "ac:parameter" | "ac:placeholder" | "script" | "style" => {}
            "time" => match el.attr("datetime").filter(|v| !v.is_empty()) {
                Some(datetime) => self.inline(datetime.to_string()),
                None => self.nodes(&el.children)?,
            },
            "table" => self.block(table(el)?),
            // Preformatted paragraphs have no inner <code>, which htmd needs to fence.
            "pre" if el.child("code").is_none() => {
                let text = el.text();
                self.block(format!("```\n{}\n```", text.trim_end_matches('\n')));
            }
            _ if el.is_namespaced() => self.nodes(&el.children)?,
            _ => {
                self.open_tag(el);
                if !is_void(&el.name) {
                    self.nodes(&el.children)?;
                    self.html.push_str("</");
                    self.html.push_str(&el.name);
                    self.html.push('>');
                }
            }
        }
        Ok(())
    }

    fn open_tag(&mut self, el: &Element) {
        self.html.push('<');
        self.html.push_str(&el.name);
        for (key, value) in &el.attrs {
            self.html.push(' ');
            self.html.push_str(key);
            self.html.push_str("=\"");
            push_escaped(&mut self.html, value);
            self.html.push('"');
        }
        self.html.push('>');
    }

    fn structured_macro(&mut self, el: &Element) -> Result<()> {
        match classify(el) {
            Macro::Code { language, body } => {
                let body = body.strip_suffix('\n').unwrap_or(&body);
                self.block(format!("```{language}\n{body}\n```"));
            }
            Macro::Admonition { kind, body } => {
                let content = body_markdown(body)?;
                self.block(blockquote(&format!("**{}:** {content}", kind.label())));
            }
            Macro::Panel { body } => {
                let content = body_markdown(body)?;
                self.block(if content.is_empty() {
                    "---".to_string()
                } else {
                    format!("---\n\n{content}\n\n---")
                });
            }
            Macro::Toc => self.block("[TOC]".to_string()),
            Macro::Expand { title, body } => {
                let content = body_markdown(body)?;
                self.block(match title {
                    Some(title) => {
                        let mut summary = String::new();
                        push_escaped(&mut summary, &title);
                        format!(
                            "<details>\n<summary>{summary}</summary>\n\n{content}\n\n</details>"
                        )
                    }
                    None => content,
                });
            }
            Macro::Unknown { name, element } => {
                debug!(macro_name = %name, "unrecognised macro, keeping inner content");
                for child in &element.children {
                    match child {
                        Node::Element(inner) if inner.name == "ac:parameter" => {}
                        other => self.nodes(std::slice::from_ref(other))?,
                    }
                }
            }
        }
        Ok(())
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

// ---------------------------------------------------------------------------
// Confluence elements
// ---------------------------------------------------------------------------

fn blockquote(text: &str) -> String {
    text.trim_end()
        .lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn image(el: &Element) -> String {
    if let Some(attachment) = el.child("ri:attachment") {
        let filename = non_empty(attachment.attr("ri:filename")).unwrap_or("image");
        return format!("![{filename}]({filename})");
    }
    if let Some(url) = el.child("ri:url") {
        return format!("![]({})", url.attr("ri:value").unwrap_or_default());
    }
    String::new()
}

fn link(el: &Element) -> String {
    let label = el
        .child("ac:link-body")
        .or_else(|| el.child("ac:plain-text-link-body"))
        .map(|body| body.text().trim().to_string())
        .filter(|text| !text.is_empty());

    if let Some(page) = el.child("ri:page") {
        let title = non_empty(page.attr("ri:content-title"))
            .map(str::to_string)
            .or_else(|| label.clone())
            .unwrap_or_else(|| "link".to_string());
        let text = label.unwrap_or_else(|| title.clone());
        return format!("[{text}]({})", title.replace(' ', "-"));
    }

    if let Some(attachment) = el.child("ri:attachment") {
        let filename = non_empty(attachment.attr("ri:filename")).unwrap_or("attachment");
        let text = label.unwrap_or_else(|| filename.to_string());
        return format!("[{text}]({filename})");
    }

    if let Some(user) = el.child("ri:user") {
        return mention(user);
    }

    label.unwrap_or_else(|| el.text().trim().to_string())
}

fn mention(el: &Element) -> String {
    match non_empty(el.attr("ri:account-id")) {
        Some(id) => format!("@{id}"),
        None => "@user".to_string(),
    }
}

fn task_list(el: &Element) -> Result<String> {
    let lines = el
        .elements()
        .filter(|child| child.name == "ac:task")
        .map(task_line)
        .collect::<Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

fn task_line(el: &Element) -> Result<String> {
    let complete = el
        .child("ac:task-status")
        .is_some_and(|status| status.text().trim().eq_ignore_ascii_case("complete"));
    let checkbox = if complete { "[x]" } else { "[ ]" };
    let body = body_markdown(el.child("ac:task-body"))?;

    let line = format!("- {checkbox} {}", indent_continuation(&body, "  "));
    Ok(line.trim_end().to_string())
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Render a table as a pipe table. The first row is always the header.
fn table(el: &Element) -> Result<String> {
    let mut rows: Vec<Vec<String>> = Vec::new();

    for tr in table_rows(el) {
        let cells = tr
            .elements()
            .filter(|cell| cell.name == "td" || cell.name == "th")
            .map(cell_markdown)
            .collect::<Result<Vec<_>>>()?;
        if !cells.is_empty() {
            rows.push(cells);
        }
    }

    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    if col_count == 0 {
        return Ok(String::new());
    }

    for row in &mut rows {
        row.resize(col_count, String::new());
    }

    let mut md = String::new();
    let separator = vec!["---"; col_count].join(" | ");
    for (index, row) in rows.iter().enumerate() {
        md.push_str("| ");
        md.push_str(&row.join(" | "));
        md.push_str(" |\n");
        if index == 0 {
            md.push_str("| ");
            md.push_str(&separator);
            md.push_str(" |\n");
        }
    }

    Ok(md.trim_end().to_string())
}

/// Rows of this table only, not of nested tables.
fn table_rows(table: &Element) -> Vec<&Element> {
    let mut rows = Vec::new();
    for child in table.elements() {
        match child.name.as_str() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => {
                rows.extend(child.elements().filter(|row| row.name == "tr"));
            }
            _ => {}
        }
    }
    rows
}

fn cell_markdown(cell: &Element) -> Result<String> {
    let markdown = cleanup::run_pipeline(&convert_nodes(&cell.children)?);
    Ok(markdown
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("<br>")
        .replace('|', "\\|"))
}

// ---------------------------------------------------------------------------
// Slot substitution
// ---------------------------------------------------------------------------

/// Replace slot tokens with their content. Continuation lines of multi-line
/// content inherit the indentation (and quote or list prefix) of the line
/// holding the token.
fn fill_slots(markdown: &str, slots: &[String]) -> String {
    static SLOT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(&format!("{SLOT_OPEN}(\\d+){SLOT_CLOSE}")).expect("valid regex")
    });

    if slots.is_empty() {
        return markdown.to_string();
    }

    markdown
        .lines()
        .map(|line| {
            if !line.contains(SLOT_OPEN) {
                return line.to_string();
            }
            let prefix = continuation_prefix(line);
            SLOT_RE
                .replace_all(line, |caps: &Captures| {
                    let content = caps[1]
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| slots.get(index))
                        .map(String::as_str)
                        .unwrap_or_default();
                    indent_continuation(content, &prefix)
                })
                .into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn continuation_prefix(line: &str) -> String {
    static LIST_MARKER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(?:[-*+]|\d+[.)])\s+").expect("valid regex"));

    let rest = line.trim_start_matches(|c: char| c.is_whitespace() || c == '>');
    let lead = &line[..line.len() - rest.len()];
    match LIST_MARKER_RE.find(rest) {
        Some(marker) => format!("{lead}{}", " ".repeat(marker.len())),
        None => lead.to_string(),
    }
}

fn indent_continuation(content: &str, prefix: &str) -> String {
    if prefix.is_empty() || !content.contains('\n') {
        return content.to_string();
    }
    let mut lines = content.lines();
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(prefix);
        } else {
            out.push_str(prefix.trim_end());
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_inherit_list_indentation() {
        let slots = vec!["```\na\nb\n```".to_string()];
        let filled = fill_slots(&format!("- {SLOT_OPEN}0{SLOT_CLOSE}"), &slots);
        assert_eq!(filled, "- ```\n  a\n  b\n  ```");
    }

    #[test]
    fn slots_inherit_quote_prefix() {
        let slots = vec!["one\n\ntwo".to_string()];
        let filled = fill_slots(&format!("> {SLOT_OPEN}0{SLOT_CLOSE}"), &slots);
        assert_eq!(filled, "> one\n>\n> two");
    }

    #[test]
    fn blockquote_prefixes_every_line() {
        assert_eq!(blockquote("**NOTE:** a\n\nb"), "> **NOTE:** a\n>\n> b");
    }

    #[test]
    fn table_without_header_uses_first_row() {
        let nodes = crate::storage::parse(
            "<table><tbody><tr><td>a</td><td>b|c</td></tr><tr><td>d</td></tr></tbody></table>",
        );
        let Node::Element(el) = &nodes[0] else {
            panic!("expected table element");
        };
        let md = table(el).unwrap();
        assert_eq!(md, "| a | b\\|c |\n| --- | --- |\n| d |  |");
    }
}
