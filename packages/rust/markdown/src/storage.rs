//! Lenient parser for Confluence storage format.
//!
//! Storage format is XHTML with `ac:`/`ri:` namespaced elements, CDATA
//! sections and self-closing tags. Bodies are frequently not well-formed,
//! so the parser never fails: stray closing tags are ignored and unclosed
//! elements are closed at the end of input.

/// A node in the parsed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Text with entities decoded.
    Text(String),
    /// Raw CDATA content.
    CData(String),
}

/// An element with lower-cased name and attribute names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// HTML elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose content is raw text; both are dropped while parsing.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First direct child element called `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// Concatenated text and CDATA of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Trimmed text of the `ac:parameter` child named `name`.
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.elements()
            .find(|el| el.name == "ac:parameter" && el.attr("ac:name") == Some(name))
            .map(|el| el.text().trim().to_string())
    }

    pub fn is_namespaced(&self) -> bool {
        self.name.contains(':')
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) | Node::CData(text) => out.push_str(text),
            Node::Element(el) => collect_text(&el.children, out),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a storage-format fragment into a list of top-level nodes.
pub fn parse(input: &str) -> Vec<Node> {
    Parser::new(input).run()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    /// Open elements; index 0 is a synthetic root.
    stack: Vec<Element>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            stack: vec![Element::default()],
        }
    }

    fn run(mut self) -> Vec<Node> {
        let src = self.src;
        while self.pos < src.len() {
            let rest = &src[self.pos..];
            match rest.find('<') {
                Some(0) => self.markup(),
                Some(offset) => {
                    self.push_text(&rest[..offset]);
                    self.pos += offset;
                }
                None => {
                    self.push_text(rest);
                    self.pos = src.len();
                }
            }
        }

        while self.stack.len() > 1 {
            self.close_top();
        }
        self.stack.pop().map(|root| root.children).unwrap_or_default()
    }

    fn current(&mut self) -> &mut Element {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn push_text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let decoded = decode_entities(raw);
        let current = self.current();
        if let Some(Node::Text(existing)) = current.children.last_mut() {
            existing.push_str(&decoded);
        } else {
            current.children.push(Node::Text(decoded));
        }
    }

    fn close_top(&mut self) {
        if let Some(el) = self.stack.pop() {
            self.current().children.push(Node::Element(el));
        }
    }

    /// Handle markup starting at `self.pos` (which points at `<`).
    fn markup(&mut self) {
        let src = self.src;
        let rest = &src[self.pos..];

        if rest.starts_with("<!--") {
            self.pos += rest.find("-->").map_or(rest.len(), |end| end + 3);
        } else if let Some(body) = rest.strip_prefix("<![CDATA[") {
            let (content, consumed) = match body.find("]]>") {
                Some(end) => (&body[..end], "<![CDATA[".len() + end + 3),
                None => (body, rest.len()),
            };
            self.current().children.push(Node::CData(content.to_string()));
            self.pos += consumed;
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            self.pos += rest.find('>').map_or(rest.len(), |end| end + 1);
        } else if rest.starts_with("</") {
            self.closing_tag();
        } else {
            self.opening_tag();
        }
    }

    fn closing_tag(&mut self) {
        let src = self.src;
        let rest = &src[self.pos..];
        let end = rest.find('>').unwrap_or(rest.len());
        let name = rest[2..end].trim().to_ascii_lowercase();
        self.pos += (end + 1).min(rest.len());

        // Close up to the nearest matching open element; ignore strays.
        if let Some(index) = self.stack.iter().rposition(|el| el.name == name) {
            if index > 0 {
                while self.stack.len() > index {
                    self.close_top();
                }
            }
        }
    }

    fn opening_tag(&mut self) {
        let src = self.src;
        let bytes = src.as_bytes();
        let start = self.pos + 1;
        let mut i = start;
        while i < bytes.len() && is_name_byte(bytes[i]) {
            i += 1;
        }

        if i == start {
            // Not a tag: keep the `<` as text.
            self.push_text("<");
            self.pos += 1;
            return;
        }

        let name = src[start..i].to_ascii_lowercase();
        let (attrs, self_closing, next) = parse_attributes(src, i);
        self.pos = next;

        let element = Element {
            name,
            attrs,
            children: Vec::new(),
        };

        if RAW_TEXT_ELEMENTS.contains(&element.name.as_str()) && !self_closing {
            let closing = format!("</{}", element.name);
            let rest = &src[self.pos..];
            let lower = rest.to_ascii_lowercase();
            self.pos += match lower.find(&closing) {
                Some(at) => rest[at..].find('>').map_or(rest.len(), |gt| at + gt + 1),
                None => rest.len(),
            };
            return;
        }

        if self_closing || is_void(&element.name) {
            self.current().children.push(Node::Element(element));
        } else {
            self.stack.push(element);
        }
    }
}

pub(crate) fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b':' | b'-' | b'_' | b'.')
}

/// Parse attributes from `pos` up to and including the closing `>`.
/// Returns the attributes, whether the tag self-closes and the next position.
fn parse_attributes(src: &str, mut pos: usize) -> (Vec<(String, String)>, bool, usize) {
    let bytes = src.as_bytes();
    let mut attrs = Vec::new();

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            return (attrs, false, pos);
        }
        match bytes[pos] {
            b'>' => return (attrs, false, pos + 1),
            b'/' if bytes.get(pos + 1) == Some(&b'>') => return (attrs, true, pos + 2),
            b'/' => {
                pos += 1;
                continue;
            }
            _ => {}
        }

        let name_start = pos;
        while pos < bytes.len()
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'=' | b'>' | b'/')
        {
            pos += 1;
        }
        if pos == name_start {
            // Unexpected byte (e.g. a lone `=`); skip it.
            pos += 1;
            continue;
        }
        let name = src[name_start..pos].to_ascii_lowercase();

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let mut value = String::new();
        if bytes.get(pos) == Some(&b'=') {
            pos += 1;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            match bytes.get(pos) {
                Some(&(quote @ (b'"' | b'\''))) => {
                    let value_start = pos + 1;
                    let value_end = src[value_start..]
                        .find(quote as char)
                        .map_or(src.len(), |offset| value_start + offset);
                    value = decode_entities(&src[value_start..value_end]);
                    pos = (value_end + 1).min(src.len());
                }
                Some(_) => {
                    let value_start = pos;
                    while pos < bytes.len()
                        && !bytes[pos].is_ascii_whitespace()
                        && bytes[pos] != b'>'
                    {
                        pos += 1;
                    }
                    value = decode_entities(&src[value_start..pos]);
                }
                None => {}
            }
        }

        attrs.push((name, value));
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Decode named and numeric character references. Unknown references are
/// kept verbatim.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];

        let decoded = candidate
            .find(';')
            .filter(|&semi| semi > 1 && semi <= 10)
            .and_then(|semi| decode_reference(&candidate[1..semi]).map(|ch| (ch, semi)));

        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }

    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "bull" => '\u{2022}',
        "middot" => '\u{b7}',
        "rarr" => '\u{2192}',
        "larr" => '\u{2190}',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_element(nodes: &[Node]) -> &Element {
        match nodes {
            [Node::Element(el)] => el,
            other => panic!("expected a single element, got {other:?}"),
        }
    }

    #[test]
    fn parses_nested_elements_and_attributes() {
        let nodes = parse(r#"<p class="lead">Hello <strong>world</strong></p>"#);
        let p = only_element(&nodes);
        assert_eq!(p.name, "p");
        assert_eq!(p.attr("class"), Some("lead"));
        assert_eq!(p.text(), "Hello world");
        assert_eq!(p.child("strong").map(|s| s.text()), Some("world".into()));
    }

    #[test]
    fn captures_cdata_verbatim() {
        let nodes = parse(
            r#"<ac:plain-text-body><![CDATA[if a < b && c > d { }]]></ac:plain-text-body>"#,
        );
        let body = only_element(&nodes);
        assert_eq!(body.children, vec![Node::CData("if a < b && c > d { }".into())]);
    }

    #[test]
    fn self_closing_namespaced_tags() {
        let nodes = parse(r#"<ac:image><ri:attachment ri:filename="a.png" /></ac:image>"#);
        let image = only_element(&nodes);
        let attachment = image.child("ri:attachment").unwrap();
        assert_eq!(attachment.attr("ri:filename"), Some("a.png"));
        assert!(attachment.children.is_empty());
    }

    #[test]
    fn void_elements_do_not_swallow_siblings() {
        let nodes = parse("<p>one<br>two<hr></p>");
        let p = only_element(&nodes);
        assert_eq!(p.children.len(), 4);
        assert_eq!(p.text(), "onetwo");
    }

    #[test]
    fn tolerates_malformed_markup() {
        let nodes = parse("<div><p>open</span> text");
        let div = only_element(&nodes);
        assert_eq!(div.text(), "open text");

        let nodes = parse("a < b");
        assert_eq!(nodes, vec![Node::Text("a < b".into())]);
    }

    #[test]
    fn mismatched_close_pops_to_match() {
        let nodes = parse("<ul><li>one<li>two</ul><p>after</p>");
        assert_eq!(nodes.len(), 2);
        let ul = match &nodes[0] {
            Node::Element(el) => el,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(ul.name, "ul");
        assert_eq!(ul.text(), "onetwo");
    }

    #[test]
    fn drops_comments_and_scripts() {
        let nodes = parse("<!-- hidden --><p>shown</p><script>var x = '<p>';</script>");
        let p = only_element(&nodes);
        assert_eq!(p.text(), "shown");
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(decode_entities("&#65;&#x42;&quot;"), "AB\"");
        assert_eq!(decode_entities("&unknown; & alone"), "&unknown; & alone");
        assert_eq!(decode_entities("caf&eacute;"), "caf&eacute;");
    }

    #[test]
    fn reads_macro_parameters() {
        let nodes = parse(
            r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language"> python </ac:parameter></ac:structured-macro>"#,
        );
        let mac = only_element(&nodes);
        assert_eq!(mac.attr("ac:name"), Some("code"));
        assert_eq!(mac.parameter("language").as_deref(), Some("python"));
        assert_eq!(mac.parameter("title"), None);
    }

    #[test]
    fn unquoted_and_single_quoted_attributes() {
        let nodes = parse("<a href=/wiki/x title='A &amp; B'>x</a>");
        let a = only_element(&nodes);
        assert_eq!(a.attr("href"), Some("/wiki/x"));
        assert_eq!(a.attr("title"), Some("A & B"));
    }
}
