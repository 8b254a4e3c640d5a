//! Storage format to plain text.

use std::sync::LazyLock;

use regex::Regex;

use crate::storage::{Element, Node, parse};

/// Convert a storage-format body to readable plain text.
///
/// Block elements end with a newline, headings are surrounded by blank
/// lines, list items get a bullet and table cells are tab-separated.
pub fn storage_to_text(storage: &str) -> String {
    if storage.trim().is_empty() {
        return String::new();
    }

    let mut raw = String::new();
    walk(&parse(storage), &mut raw);
    normalize(&raw)
}

fn walk(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) | Node::CData(text) => out.push_str(text),
            Node::Element(el) => element(el, out),
        }
    }
}

fn element(el: &Element, out: &mut String) {
    match el.name.as_str() {
        "script" | "style" | "ac:parameter" | "ac:placeholder" => {}
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            out.push_str("\n\n");
            walk(&el.children, out);
            out.push('\n');
        }
        "li" => {
            out.push_str("• ");
            walk(&el.children, out);
            out.push('\n');
        }
        "p" | "div" | "br" | "tr" => {
            walk(&el.children, out);
            out.push('\n');
        }
        "td" | "th" => {
            walk(&el.children, out);
            out.push('\t');
        }
        "ri:user" => match el.attr("ri:account-id").filter(|id| !id.is_empty()) {
            Some(id) => {
                out.push('@');
                out.push_str(id);
            }
            None => out.push_str("@user"),
        },
        "ac:link" if el.child("ac:link-body").is_none()
            && el.child("ac:plain-text-link-body").is_none() =>
        {
            match el
                .child("ri:page")
                .and_then(|page| page.attr("ri:content-title"))
            {
                Some(title) => out.push_str(title),
                None => walk(&el.children, out),
            }
        }
        "time" => match el.attr("datetime").filter(|v| !v.is_empty()) {
            Some(datetime) => out.push_str(datetime),
            None => walk(&el.children, out),
        },
        _ => walk(&el.children, out),
    }
}

fn normalize(raw: &str) -> String {
    static SPACE_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));
    static BLANK_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let collapsed = SPACE_RUN_RE.replace_all(raw, " ");
    let lines = collapsed
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN_RE.replace_all(&lines, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_empty() {
        assert_eq!(storage_to_text(""), "");
        assert_eq!(storage_to_text("   "), "");
    }

    #[test]
    fn paragraphs_and_headings() {
        let text = storage_to_text("<h1>Title</h1><p>First   para.</p><p>Second</p>");
        assert_eq!(text, "Title\nFirst para.\nSecond");
    }

    #[test]
    fn headings_get_blank_line_before() {
        let text = storage_to_text("<p>Intro</p><h2>Section</h2><p>Body</p>");
        assert_eq!(text, "Intro\n\nSection\nBody");
    }

    #[test]
    fn list_items_are_bulleted() {
        let text = storage_to_text("<ul><li>one</li><li>two</li></ul>");
        assert_eq!(text, "• one\n• two");
    }

    #[test]
    fn table_cells_are_tab_separated() {
        let text = storage_to_text(
            "<table><tbody><tr><th>Name</th><th>Value</th></tr><tr><td>a</td><td>1</td></tr></tbody></table>",
        );
        assert_eq!(text, "Name\tValue\na\t1");
    }

    #[test]
    fn macros_keep_body_text_only() {
        let text = storage_to_text(
            r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language">python</ac:parameter><ac:plain-text-body><![CDATA[print("hi")]]></ac:plain-text-body></ac:structured-macro>"#,
        );
        assert_eq!(text, "print(\"hi\")");
    }

    #[test]
    fn mentions_and_page_links() {
        let text = storage_to_text(
            r#"<p>Ask <ac:link><ri:user ri:account-id="abc123"/></ac:link> about <ac:link><ri:page ri:content-title="Release Notes"/></ac:link></p>"#,
        );
        assert_eq!(text, "Ask @abc123 about Release Notes");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(storage_to_text("<p>Fish &amp; chips</p>"), "Fish & chips");
    }
}
