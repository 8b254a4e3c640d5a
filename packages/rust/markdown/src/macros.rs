//! Classification of `ac:structured-macro` elements.

use crate::storage::Element;

/// Callout flavours rendered as labelled blockquotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmonitionKind {
    Info,
    Note,
    Warning,
    Tip,
}

impl AdmonitionKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Note => "NOTE",
            Self::Warning => "WARNING",
            Self::Tip => "TIP",
        }
    }
}

/// A structured macro with its inputs extracted. Missing parameters and
/// bodies are represented as empty values rather than errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Macro<'a> {
    Code {
        language: String,
        body: String,
    },
    Admonition {
        kind: AdmonitionKind,
        body: Option<&'a Element>,
    },
    Panel {
        body: Option<&'a Element>,
    },
    Toc,
    Expand {
        title: Option<String>,
        body: Option<&'a Element>,
    },
    /// Any other macro; only its inner content is kept.
    Unknown {
        name: String,
        element: &'a Element,
    },
}

/// Classify a macro element by its `ac:name`.
pub fn classify(element: &Element) -> Macro<'_> {
    let name = element.attr("ac:name").unwrap_or_default().to_ascii_lowercase();
    let rich_body = element.child("ac:rich-text-body");

    match name.as_str() {
        "code" | "noformat" => Macro::Code {
            language: element.parameter("language").unwrap_or_default(),
            body: element
                .child("ac:plain-text-body")
                .map(Element::text)
                .unwrap_or_default(),
        },
        "info" => admonition(AdmonitionKind::Info, rich_body),
        "note" => admonition(AdmonitionKind::Note, rich_body),
        "warning" => admonition(AdmonitionKind::Warning, rich_body),
        "tip" => admonition(AdmonitionKind::Tip, rich_body),
        "panel" => Macro::Panel { body: rich_body },
        "toc" => Macro::Toc,
        "expand" => Macro::Expand {
            title: element.parameter("title").filter(|t| !t.is_empty()),
            body: rich_body,
        },
        _ => Macro::Unknown {
            name,
            element,
        },
    }
}

fn admonition(kind: AdmonitionKind, body: Option<&Element>) -> Macro<'_> {
    Macro::Admonition { kind, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Node, parse};

    fn first(markup: &str) -> Element {
        match parse(markup).into_iter().next() {
            Some(Node::Element(el)) => el,
            other => panic!("no element in {markup}: {other:?}"),
        }
    }

    #[test]
    fn code_macro_extracts_language_and_body() {
        let el = first(
            r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language">python</ac:parameter><ac:plain-text-body><![CDATA[print("hello")]]></ac:plain-text-body></ac:structured-macro>"#,
        );
        assert_eq!(
            classify(&el),
            Macro::Code {
                language: "python".into(),
                body: "print(\"hello\")".into(),
            }
        );
    }

    #[test]
    fn code_macro_without_pieces_degrades() {
        let el = first(r#"<ac:structured-macro ac:name="code"></ac:structured-macro>"#);
        assert_eq!(
            classify(&el),
            Macro::Code {
                language: String::new(),
                body: String::new(),
            }
        );
    }

    #[test]
    fn admonitions_map_to_labels() {
        for (name, label) in [("info", "INFO"), ("note", "NOTE"), ("warning", "WARNING"), ("tip", "TIP")] {
            let el = first(&format!(
                r#"<ac:structured-macro ac:name="{name}"><ac:rich-text-body><p>x</p></ac:rich-text-body></ac:structured-macro>"#
            ));
            match classify(&el) {
                Macro::Admonition { kind, body } => {
                    assert_eq!(kind.label(), label);
                    assert!(body.is_some());
                }
                other => panic!("{name} classified as {other:?}"),
            }
        }
    }

    #[test]
    fn expand_title_is_optional() {
        let el = first(
            r#"<ac:structured-macro ac:name="expand"><ac:parameter ac:name="title">  </ac:parameter></ac:structured-macro>"#,
        );
        assert_eq!(classify(&el), Macro::Expand { title: None, body: None });
    }

    #[test]
    fn unknown_macro_keeps_name() {
        let el = first(r#"<ac:structured-macro ac:name="jira"></ac:structured-macro>"#);
        assert!(matches!(classify(&el), Macro::Unknown { ref name, .. } if name == "jira"));

        let el = first(r#"<ac:structured-macro ac:name="TOC"/>"#);
        assert_eq!(classify(&el), Macro::Toc);
    }
}
