//! HTML fragments
//!
//! Lenient parsing of the service's HTML into a detached node tree. Void
//! elements need no closing tag, stray or mismatched end tags are tolerated,
//! and markup that still cannot be read degrades to plain text.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::dom::add_class_attr;
use super::ANNOTATION_CLASS;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FragmentNode {
    Text(String),
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<FragmentNode>,
    },
}

/// A detached list of nodes, not yet part of any document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    nodes: Vec<FragmentNode>,
}

struct OpenElement {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<FragmentNode>,
}

impl Fragment {
    /// Parse `html`. Never fails; unreadable markup becomes one text node.
    pub fn parse(html: &str) -> Self {
        match parse_nodes(html) {
            Ok(nodes) => Self { nodes },
            Err(e) => {
                debug!("HTML fragment unreadable, inserting as text: {}", e);
                Self::text(html)
            }
        }
    }

    pub fn text(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        Self {
            nodes: vec![FragmentNode::Text(text.to_string())],
        }
    }

    pub fn nodes(&self) -> &[FragmentNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<FragmentNode> {
        self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tag every `<ruby>` as an interactive annotation. Returns how many.
    pub fn mark_annotations(&mut self) -> usize {
        fn mark(nodes: &mut [FragmentNode]) -> usize {
            let mut count = 0;
            for node in nodes {
                if let FragmentNode::Element {
                    tag,
                    attrs,
                    children,
                } = node
                {
                    if *tag == "ruby" {
                        add_class_attr(attrs, ANNOTATION_CLASS);
                        count += 1;
                    }
                    count += mark(children);
                }
            }
            count
        }
        mark(&mut self.nodes)
    }
}

fn parse_nodes(html: &str) -> Result<Vec<FragmentNode>, quick_xml::Error> {
    let mut reader = Reader::from_str(html);
    reader.config_mut().check_end_names = false;

    let mut root: Vec<FragmentNode> = Vec::new();
    let mut stack: Vec<OpenElement> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let (tag, attrs) = read_start(&e);
                if is_void(&tag) {
                    push_node(&mut stack, &mut root, element(tag, attrs, Vec::new()));
                } else {
                    stack.push(OpenElement {
                        tag,
                        attrs,
                        children: Vec::new(),
                    });
                }
            }
            Event::Empty(e) => {
                let (tag, attrs) = read_start(&e);
                push_node(&mut stack, &mut root, element(tag, attrs, Vec::new()));
            }
            Event::End(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                if let Some(depth) = stack.iter().rposition(|open| open.tag == tag) {
                    while stack.len() > depth {
                        close_top(&mut stack, &mut root);
                    }
                }
            }
            Event::Text(e) => {
                let text = unescape_lenient(&String::from_utf8_lossy(&e));
                if !text.is_empty() {
                    push_node(&mut stack, &mut root, FragmentNode::Text(text));
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push_node(&mut stack, &mut root, FragmentNode::Text(text));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    while !stack.is_empty() {
        close_top(&mut stack, &mut root);
    }
    Ok(root)
}

fn read_start(e: &BytesStart<'_>) -> (String, Vec<(String, String)>) {
    let tag = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
    let attrs = e
        .html_attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();
            let value = unescape_lenient(&String::from_utf8_lossy(&attr.value));
            (key, value)
        })
        .collect();
    (tag, attrs)
}

fn element(tag: String, attrs: Vec<(String, String)>, children: Vec<FragmentNode>) -> FragmentNode {
    FragmentNode::Element {
        tag,
        attrs,
        children,
    }
}

fn push_node(stack: &mut [OpenElement], root: &mut Vec<FragmentNode>, node: FragmentNode) {
    match stack.last_mut() {
        Some(open) => open.children.push(node),
        None => root.push(node),
    }
}

fn close_top(stack: &mut Vec<OpenElement>, root: &mut Vec<FragmentNode>) {
    if let Some(open) = stack.pop() {
        let node = element(open.tag, open.attrs, open.children);
        push_node(stack, root, node);
    }
}

/// Resolve character and entity references one at a time. A reference that
/// can't be resolved stays in the text as written.
fn unescape_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let resolved = rest[1..]
            .find(';')
            .and_then(|end| resolve_reference(&rest[1..=end]).map(|c| (c, end + 2)));
        match resolved {
            Some((replacement, consumed)) => {
                out.push_str(&replacement);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_reference(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    html_entity(name).map(str::to_string)
}

/// XML's predefined entities plus the HTML ones that show up in practice
fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        "nbsp" => Some("\u{a0}"),
        "ensp" => Some("\u{2002}"),
        "emsp" => Some("\u{2003}"),
        "thinsp" => Some("\u{2009}"),
        "zwsp" => Some("\u{200b}"),
        "hellip" => Some("…"),
        "middot" => Some("·"),
        "copy" => Some("©"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FragmentNode {
        FragmentNode::Text(s.to_string())
    }

    #[test]
    fn test_parse_ruby() {
        let fragment = Fragment::parse("<ruby>今日<rt>きょう</rt></ruby>は");
        assert_eq!(
            fragment.nodes(),
            &[
                element(
                    "ruby".to_string(),
                    Vec::new(),
                    vec![
                        text("今日"),
                        element("rt".to_string(), Vec::new(), vec![text("きょう")])
                    ]
                ),
                text("は"),
            ]
        );
    }

    #[test]
    fn test_void_element_without_close() {
        let fragment = Fragment::parse("一<br>二");
        assert_eq!(fragment.nodes().len(), 3);
        assert!(matches!(&fragment.nodes()[1], FragmentNode::Element { tag, .. } if tag == "br"));
    }

    #[test]
    fn test_unclosed_and_stray_tags() {
        let fragment = Fragment::parse("<b>太字</i>");
        assert_eq!(
            fragment.nodes(),
            &[element("b".to_string(), Vec::new(), vec![text("太字")])]
        );
    }

    #[test]
    fn test_entities_and_attributes() {
        let fragment = Fragment::parse(r#"<span class="x" title="a &amp; b">A&nbsp;&lt;B</span>"#);
        match &fragment.nodes()[0] {
            FragmentNode::Element { attrs, children, .. } => {
                assert_eq!(attrs[0], ("class".to_string(), "x".to_string()));
                assert_eq!(attrs[1], ("title".to_string(), "a & b".to_string()));
                assert_eq!(children, &vec![text("A\u{a0}<B")]);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_unknown_entity_kept_beside_known_ones() {
        assert_eq!(Fragment::parse("A&nbsp;&rarr;B").nodes(), &[text("A\u{a0}&rarr;B")]);
        assert_eq!(
            Fragment::parse("&#x5B57;&#23383;&#xZZ; & x").nodes(),
            &[text("字字&#xZZ; & x")]
        );

        let fragment = Fragment::parse(r#"<a title="&bogus;&amp;">x</a>"#);
        match &fragment.nodes()[0] {
            FragmentNode::Element { attrs, .. } => {
                assert_eq!(attrs[0], ("title".to_string(), "&bogus;&".to_string()));
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(Fragment::parse("晴れです").nodes(), &[text("晴れです")]);
        assert!(Fragment::parse("").is_empty());
    }

    #[test]
    fn test_mark_annotations() {
        let mut fragment =
            Fragment::parse(r#"<ruby>今日<rt>きょう</rt></ruby>は<ruby class="k">晴<rt>は</rt></ruby>れ"#);
        assert_eq!(fragment.mark_annotations(), 2);
        match &fragment.nodes()[2] {
            FragmentNode::Element { attrs, .. } => {
                assert_eq!(attrs[0].1, format!("k {}", ANNOTATION_CLASS));
            }
            other => panic!("unexpected node {:?}", other),
        }
    }
}
