//! Page Document
//!
//! A small arena-backed document: the page content the agent reads its
//! selection from and splices annotated HTML into. Nodes are addressed by
//! [`NodeId`] handles, so a captured [`SelectionRange`] stays meaningful
//! when unrelated parts of the tree change.

use quick_xml::escape::{escape, partial_escape};
use std::sync::atomic::{AtomicU64, Ordering};

use super::fragment::{Fragment, FragmentNode};
use crate::error::AgentError;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Text(String),
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A point inside a text node, as a character offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Snapshot of a selected region, taken at one point in time.
///
/// Not `Clone`: a snapshot is consumed by the splice that uses it, or
/// dropped when a newer snapshot replaces it.
#[derive(Debug, PartialEq, Eq)]
pub struct SelectionRange {
    document: DocumentId,
    start: Boundary,
    end: Boundary,
}

impl SelectionRange {
    pub fn document(&self) -> DocumentId {
        self.document
    }

    pub fn start(&self) -> Boundary {
        self.start
    }

    pub fn end(&self) -> Boundary {
        self.end
    }
}

/// The user's live selection: where it was started and where it ends now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LiveSelection {
    anchor: Boundary,
    focus: Boundary,
}

/// A range checked against the current tree, boundaries in document order
#[derive(Debug, Clone, Copy)]
struct Resolved {
    start: Boundary,
    end: Boundary,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Preceding,
    Following,
}

#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    nodes: Vec<Option<NodeData>>,
    body: NodeId,
    selection: Option<LiveSelection>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document with a `<body>` root
    pub fn new() -> Self {
        let mut doc = Self {
            id: DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::SeqCst)),
            nodes: Vec::new(),
            body: NodeId(0),
            selection: None,
        };
        doc.body = doc.alloc(NodeKind::Element {
            tag: "body".to_string(),
            attrs: Vec::new(),
        });
        doc
    }

    /// A document whose body holds the parsed `html`
    pub fn from_html(html: &str) -> Self {
        let mut doc = Self::new();
        let body = doc.body;
        doc.append_fragment(body, Fragment::parse(html));
        doc
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Some(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        }));
        NodeId(self.nodes.len() - 1)
    }

    fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.0).and_then(Option::as_ref)
    }

    fn data_mut(&mut self, node: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(node.0).and_then(Option::as_mut)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.data(node).is_some()
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.data(node).map(|d| &d.kind)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).and_then(|d| d.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.data(node).map(|d| d.children.as_slice()).unwrap_or(&[])
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    pub fn create_element(&mut self, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_lowercase(),
            attrs,
        })
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(data) = self.data_mut(parent) {
            data.children.push(child);
        }
        if let Some(data) = self.data_mut(child) {
            data.parent = Some(parent);
        }
    }

    fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        if let Some(data) = self.data_mut(parent) {
            let index = index.min(data.children.len());
            data.children.insert(index, child);
        }
        if let Some(data) = self.data_mut(child) {
            data.parent = Some(parent);
        }
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(data) = self.data_mut(parent) {
            data.children.retain(|c| *c != node);
        }
        if let Some(data) = self.data_mut(node) {
            data.parent = None;
        }
    }

    /// Detach `node` and free it along with its descendants
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(data) = self.nodes.get_mut(current.0).and_then(Option::take) {
                stack.extend(data.children);
            }
        }
    }

    fn index_in_parent(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(node)?;
        let index = self.children(parent).iter().position(|c| *c == node)?;
        Some((parent, index))
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element { .. } => None,
        }
    }

    fn set_text(&mut self, node: NodeId, value: String) {
        if let Some(data) = self.data_mut(node) {
            data.kind = NodeKind::Text(value);
        }
    }

    /// Concatenated text of `node` and its descendants
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            Some(NodeKind::Text(text)) => out.push_str(text),
            Some(NodeKind::Element { .. }) => {
                for child in self.children(node) {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    pub fn body_text(&self) -> String {
        self.text_content(self.body)
    }

    /// Text nodes in document order
    pub fn text_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.body];
        while let Some(node) = stack.pop() {
            match self.kind(node) {
                Some(NodeKind::Text(_)) => out.push(node),
                Some(NodeKind::Element { .. }) => {
                    stack.extend(self.children(node).iter().rev().copied());
                }
                None => {}
            }
        }
        out
    }

    // ---- selection ----

    /// Set the live selection. Both boundaries must be text nodes attached
    /// to this document; they may sit under different elements.
    pub fn select(&mut self, anchor: Boundary, focus: Boundary) -> Result<(), AgentError> {
        self.resolve_boundaries(anchor, focus).ok_or_else(|| {
            AgentError::Dom("selection boundaries are not attached text nodes".to_string())
        })?;
        self.selection = Some(LiveSelection { anchor, focus });
        Ok(())
    }

    /// Select the first occurrence of `needle` in the page's rendered text.
    /// The match may run across element boundaries.
    pub fn select_text(&mut self, needle: &str) -> Result<(), AgentError> {
        if needle.is_empty() {
            return Err(AgentError::Dom("cannot select empty text".to_string()));
        }

        let nodes: Vec<(NodeId, usize)> = self
            .text_nodes()
            .into_iter()
            .map(|node| (node, self.text(node).map_or(0, |t| t.chars().count())))
            .collect();
        let text = self.body_text();
        let Some(byte_index) = text.find(needle) else {
            return Err(AgentError::Dom(format!("text '{}' not found in page", needle)));
        };
        let start = text[..byte_index].chars().count();
        let end = start + needle.chars().count();

        let mut anchor = None;
        let mut focus = None;
        let mut node_start = 0;
        for (node, len) in nodes {
            let node_end = node_start + len;
            if anchor.is_none() && start < node_end {
                anchor = Some(Boundary::new(node, start - node_start));
            }
            if focus.is_none() && end <= node_end && end > node_start {
                focus = Some(Boundary::new(node, end - node_start));
            }
            node_start = node_end;
        }

        match (anchor, focus) {
            (Some(anchor), Some(focus)) => self.select(anchor, focus),
            _ => Err(AgentError::Dom(format!("text '{}' not found in page", needle))),
        }
    }

    /// Collapse the live selection onto its focus point
    pub fn collapse_selection(&mut self) {
        if let Some(selection) = self.selection.as_mut() {
            selection.anchor = selection.focus;
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// The live selection as a snapshot, if it is non-empty and still valid
    pub fn live_range(&self) -> Option<SelectionRange> {
        let selection = self.selection?;
        let resolved = self.resolve_boundaries(selection.anchor, selection.focus)?;
        if self.range_text(resolved).is_empty() {
            return None;
        }
        Some(SelectionRange {
            document: self.id,
            start: resolved.start,
            end: resolved.end,
        })
    }

    /// Text of the live selection, empty when nothing is selected
    pub fn selection_text(&self) -> String {
        self.live_range()
            .and_then(|range| self.resolve(&range))
            .map(|resolved| self.range_text(resolved))
            .unwrap_or_default()
    }

    /// Check a snapshot against the current tree
    pub fn is_valid(&self, range: &SelectionRange) -> bool {
        self.resolve(range).is_some()
    }

    fn resolve(&self, range: &SelectionRange) -> Option<Resolved> {
        if range.document != self.id {
            return None;
        }
        let resolved = self.resolve_boundaries(range.start, range.end)?;
        (!self.range_text(resolved).is_empty()).then_some(resolved)
    }

    /// Clamp two boundaries to the current text and put them in document order
    fn resolve_boundaries(&self, a: Boundary, b: Boundary) -> Option<Resolved> {
        let a = self.clamp(a)?;
        let b = self.clamp(b)?;
        let a_key = (self.tree_position(a.node)?, a.offset);
        let b_key = (self.tree_position(b.node)?, b.offset);
        let (start, end) = if a_key <= b_key { (a, b) } else { (b, a) };
        Some(Resolved { start, end })
    }

    fn clamp(&self, boundary: Boundary) -> Option<Boundary> {
        let len = self.text(boundary.node)?.chars().count();
        Some(Boundary::new(boundary.node, boundary.offset.min(len)))
    }

    /// Child indices from the body down to `node`; `None` once detached
    fn tree_position(&self, node: NodeId) -> Option<Vec<usize>> {
        let mut position = Vec::new();
        let mut current = node;
        while current != self.body {
            let (parent, index) = self.index_in_parent(current)?;
            position.push(index);
            current = parent;
        }
        position.reverse();
        Some(position)
    }

    /// `node` and its ancestors, from the body down
    fn ancestry(&self, node: NodeId) -> Option<Vec<NodeId>> {
        let mut chain = vec![node];
        let mut current = node;
        while current != self.body {
            current = self.parent(current)?;
            chain.push(current);
        }
        chain.reverse();
        Some(chain)
    }

    fn range_text(&self, resolved: Resolved) -> String {
        let Resolved { start, end } = resolved;
        let mut out = String::new();
        let mut inside = false;
        for node in self.text_nodes() {
            if node == start.node {
                inside = true;
            }
            if inside {
                let text = self.text(node).unwrap_or_default();
                let from = if node == start.node { start.offset } else { 0 };
                let to = if node == end.node {
                    end.offset
                } else {
                    text.chars().count()
                };
                out.extend(text.chars().skip(from).take(to.saturating_sub(from)));
            }
            if node == end.node {
                break;
            }
        }
        out
    }

    // ---- splicing ----

    /// Replace the contents of `range` with `fragment`, consuming the
    /// snapshot. Returns the top-level nodes that were inserted.
    ///
    /// Nodes wholly inside the range are removed; elements the range only
    /// partly covers keep their remaining text. The fragment lands right
    /// after the start point, at the level of the boundaries' common ancestor.
    pub fn replace_range(
        &mut self,
        range: SelectionRange,
        fragment: Fragment,
    ) -> Result<Vec<NodeId>, AgentError> {
        let Resolved { start, end } = self
            .resolve(&range)
            .ok_or_else(|| AgentError::Dom("selection range is no longer valid".to_string()))?;

        let start_text: Vec<char> = self.text(start.node).unwrap_or_default().chars().collect();
        let end_text: Vec<char> = self.text(end.node).unwrap_or_default().chars().collect();
        let before: String = start_text[..start.offset].iter().collect();
        let after: String = end_text[end.offset..].iter().collect();

        if start.node == end.node {
            self.set_text(start.node, before);
            let (parent, index) = self
                .index_in_parent(start.node)
                .ok_or_else(|| AgentError::Dom("start node detached".to_string()))?;
            let inserted = self.insert_fragment(parent, index + 1, fragment);
            if !after.is_empty() {
                let tail = self.create_text(&after);
                self.insert_at(parent, index + 1 + inserted.len(), tail);
            }
            return Ok(inserted);
        }

        let detached = || AgentError::Dom("range boundary detached".to_string());
        let start_chain = self.ancestry(start.node).ok_or_else(detached)?;
        let end_chain = self.ancestry(end.node).ok_or_else(detached)?;
        let depth = start_chain
            .iter()
            .zip(&end_chain)
            .take_while(|(a, b)| a == b)
            .count();
        // Text nodes are leaves, so both chains go at least one level below
        // the common ancestor.
        let ancestor = start_chain[depth - 1];
        let start_top = start_chain[depth];
        let end_top = end_chain[depth];

        for node in start_chain[depth + 1..].iter().rev() {
            self.remove_siblings(*node, Side::Following);
        }
        for node in end_chain[depth + 1..].iter().rev() {
            self.remove_siblings(*node, Side::Preceding);
        }
        let between: Vec<NodeId> = self
            .children(ancestor)
            .iter()
            .copied()
            .skip_while(|n| *n != start_top)
            .skip(1)
            .take_while(|n| *n != end_top)
            .collect();
        for node in between {
            self.remove(node);
        }

        self.set_text(start.node, before);
        self.set_text(end.node, after);

        let (_, index) = self.index_in_parent(start_top).ok_or_else(detached)?;
        Ok(self.insert_fragment(ancestor, index + 1, fragment))
    }

    fn remove_siblings(&mut self, node: NodeId, side: Side) {
        let Some((parent, index)) = self.index_in_parent(node) else {
            return;
        };
        let children = self.children(parent);
        let siblings = match side {
            Side::Preceding => children[..index].to_vec(),
            Side::Following => children[index + 1..].to_vec(),
        };
        for sibling in siblings {
            self.remove(sibling);
        }
    }

    fn insert_fragment(
        &mut self,
        parent: NodeId,
        index: usize,
        fragment: Fragment,
    ) -> Vec<NodeId> {
        let inserted = self.build_fragment(fragment);
        for (offset, node) in inserted.iter().enumerate() {
            self.insert_at(parent, index + offset, *node);
        }
        inserted
    }

    fn append_fragment(&mut self, parent: NodeId, fragment: Fragment) {
        for node in self.build_fragment(fragment) {
            self.append_child(parent, node);
        }
    }

    fn build_fragment(&mut self, fragment: Fragment) -> Vec<NodeId> {
        fragment.into_nodes().into_iter().map(|n| self.build_node(n)).collect()
    }

    fn build_node(&mut self, node: FragmentNode) -> NodeId {
        match node {
            FragmentNode::Text(text) => self.create_text(&text),
            FragmentNode::Element { tag, attrs, children } => {
                let id = self.create_element(&tag, attrs);
                for child in children {
                    let child = self.build_node(child);
                    self.append_child(id, child);
                }
                id
            }
        }
    }

    // ---- classes ----

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        match self.kind(node) {
            Some(NodeKind::Element { attrs, .. }) => attrs
                .iter()
                .any(|(k, v)| k == "class" && v.split_whitespace().any(|c| c == class)),
            _ => false,
        }
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        if let Some(NodeData {
            kind: NodeKind::Element { attrs, .. },
            ..
        }) = self.data_mut(node)
        {
            add_class_attr(attrs, class);
        }
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(NodeData {
            kind: NodeKind::Element { attrs, .. },
            ..
        }) = self.data_mut(node)
        {
            for (key, value) in attrs.iter_mut() {
                if *key == "class" {
                    *value = value
                        .split_whitespace()
                        .filter(|c| *c != class)
                        .collect::<Vec<_>>()
                        .join(" ");
                }
            }
            attrs.retain(|(k, v)| k != "class" || !v.is_empty());
        }
    }

    /// Attached elements carrying `class`, in document order
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.body];
        while let Some(node) = stack.pop() {
            if self.has_class(node, class) {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// `node` or its nearest ancestor carrying `class`
    pub fn closest_with_class(&self, node: NodeId, class: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.has_class(n, class) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    // ---- serialisation ----

    /// Inner HTML of the body
    pub fn to_html(&self) -> String {
        self.inner_html(self.body)
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(*child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            Some(NodeKind::Text(text)) => out.push_str(&partial_escape(text.as_str())),
            Some(NodeKind::Element { tag, attrs }) => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in attrs {
                    out.push_str(&format!(" {}=\"{}\"", key, escape(value.as_str())));
                }
                out.push('>');
                if super::fragment::is_void(tag) {
                    return;
                }
                for child in self.children(node) {
                    self.write_html(*child, out);
                }
                out.push_str(&format!("</{}>", tag));
            }
            None => {}
        }
    }
}

pub(crate) fn add_class_attr(attrs: &mut Vec<(String, String)>, class: &str) {
    match attrs.iter_mut().find(|(k, _)| k == "class") {
        Some((_, value)) if value.trim().is_empty() => *value = class.to_string(),
        Some((_, value)) => {
            if !value.split_whitespace().any(|c| c == class) {
                value.push(' ');
                value.push_str(class);
            }
        }
        None => attrs.push(("class".to_string(), class.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_html_round_trip() {
        let doc = Document::from_html("<p>今日は<b>晴れ</b>です</p>");
        assert_eq!(doc.to_html(), "<p>今日は<b>晴れ</b>です</p>");
        assert_eq!(doc.body_text(), "今日は晴れです");
    }

    #[test]
    fn test_select_text_and_live_range() {
        let mut doc = Document::from_html("<p>今日は晴れです</p>");
        doc.select_text("晴れ").unwrap();
        assert_eq!(doc.selection_text(), "晴れ");

        let range = doc.live_range().expect("range");
        assert_eq!(range.start().offset, 3);
        assert_eq!(range.end().offset, 5);
    }

    #[test]
    fn test_collapsed_selection_has_no_range() {
        let mut doc = Document::from_html("<p>今日は晴れです</p>");
        doc.select_text("晴れ").unwrap();
        doc.collapse_selection();
        assert!(doc.live_range().is_none());
        assert_eq!(doc.selection_text(), "");
    }

    #[test]
    fn test_backwards_selection_is_ordered() {
        let mut doc = Document::from_html("<p>abcdef</p>");
        let text = doc.text_nodes()[0];
        doc.select(Boundary::new(text, 4), Boundary::new(text, 1)).unwrap();
        assert_eq!(doc.selection_text(), "bcd");
    }

    #[test]
    fn test_replace_within_single_text_node() {
        let mut doc = Document::from_html("<p>今日は晴れです</p>");
        doc.select_text("今日").unwrap();
        let range = doc.live_range().unwrap();

        doc.replace_range(range, Fragment::parse("<ruby>今日<rt>きょう</rt></ruby>"))
            .unwrap();
        assert_eq!(doc.to_html(), "<p><ruby>今日<rt>きょう</rt></ruby>は晴れです</p>");
    }

    #[test]
    fn test_replace_across_sibling_text_nodes() {
        let mut doc = Document::new();
        let body = doc.body();
        let first = doc.create_text("abc");
        let bold = doc.create_element("b", Vec::new());
        let inner = doc.create_text("XYZ");
        let last = doc.create_text("def");
        doc.append_child(body, first);
        doc.append_child(body, bold);
        doc.append_child(bold, inner);
        doc.append_child(body, last);

        doc.select(Boundary::new(first, 1), Boundary::new(last, 2)).unwrap();
        assert_eq!(doc.selection_text(), "bcXYZde");

        let range = doc.live_range().unwrap();
        doc.replace_range(range, Fragment::parse("<i>new</i>")).unwrap();
        assert_eq!(doc.to_html(), "a<i>new</i>f");
        assert!(!doc.contains(inner));
    }

    #[test]
    fn test_selection_into_inline_element() {
        let mut doc = Document::from_html("<p>今日は<b>晴れ</b>です</p>");
        let texts = doc.text_nodes();
        doc.select(Boundary::new(texts[0], 2), Boundary::new(texts[1], 1))
            .unwrap();
        assert_eq!(doc.selection_text(), "は晴");

        let range = doc.live_range().unwrap();
        doc.replace_range(range, Fragment::parse("X")).unwrap();
        assert_eq!(doc.to_html(), "<p>今日X<b>れ</b>です</p>");
    }

    #[test]
    fn test_selection_across_existing_annotation() {
        let mut doc = Document::from_html(
            r#"<p><ruby class="furigana-annotation">今日<rt>きょう</rt></ruby>は晴れです</p>"#,
        );
        doc.select_text("日きょうは").unwrap();
        assert_eq!(doc.selection_text(), "日きょうは");

        let range = doc.live_range().unwrap();
        doc.replace_range(range, Fragment::parse("X")).unwrap();
        assert_eq!(
            doc.to_html(),
            r#"<p><ruby class="furigana-annotation">今</ruby>X晴れです</p>"#
        );
    }

    #[test]
    fn test_selection_across_paragraphs() {
        let mut doc = Document::from_html("<p>ab<b>cd</b></p><p><i>ef</i>gh</p>");
        doc.select_text("def").unwrap();
        assert_eq!(doc.selection_text(), "def");

        let range = doc.live_range().unwrap();
        let inserted = doc.replace_range(range, Fragment::parse("X")).unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(doc.to_html(), "<p>ab<b>c</b></p>X<p><i></i>gh</p>");
    }

    #[test]
    fn test_selection_over_no_text_has_no_range() {
        let mut doc = Document::from_html("<p>ab<b>cd</b></p>");
        let texts = doc.text_nodes();
        doc.select(Boundary::new(texts[0], 2), Boundary::new(texts[1], 0))
            .unwrap();
        assert!(doc.live_range().is_none());
    }

    #[test]
    fn test_snapshot_survives_unrelated_mutation() {
        let mut doc = Document::from_html("<p>今日は晴れです</p><p>明日</p>");
        doc.select_text("晴れ").unwrap();
        let range = doc.live_range().unwrap();

        let body = doc.body();
        let extra = doc.create_text("追加");
        doc.append_child(body, extra);
        doc.clear_selection();

        assert!(doc.is_valid(&range));
        doc.replace_range(range, Fragment::parse("<ruby>晴<rt>は</rt></ruby>れ"))
            .unwrap();
        assert_eq!(
            doc.to_html(),
            "<p>今日は<ruby>晴<rt>は</rt></ruby>れです</p><p>明日</p>追加"
        );
    }

    #[test]
    fn test_snapshot_invalid_after_node_removed() {
        let mut doc = Document::from_html("<p>今日は晴れです</p>");
        doc.select_text("晴れ").unwrap();
        let range = doc.live_range().unwrap();

        let paragraph = doc.children(doc.body())[0];
        doc.remove(paragraph);
        assert!(!doc.is_valid(&range));
        assert!(doc.replace_range(range, Fragment::parse("x")).is_err());
    }

    #[test]
    fn test_snapshot_from_other_document_rejected() {
        let mut a = Document::from_html("abc");
        let mut b = Document::from_html("abc");
        a.select_text("b").unwrap();
        let range = a.live_range().unwrap();
        assert!(!b.is_valid(&range));
        assert!(b.replace_range(range, Fragment::parse("x")).is_err());
    }

    #[test]
    fn test_offsets_clamped_after_text_shrinks() {
        let mut doc = Document::from_html("abcdef");
        doc.select_text("cdef").unwrap();
        let range = doc.live_range().unwrap();
        let text = doc.text_nodes()[0];
        doc.set_text(text, "abcd".to_string());

        doc.replace_range(range, Fragment::parse("X")).unwrap();
        assert_eq!(doc.to_html(), "abX");
    }

    #[test]
    fn test_classes() {
        let mut doc = Document::from_html(r#"<span class="a">x</span>"#);
        let span = doc.children(doc.body())[0];
        doc.add_class(span, "b");
        assert!(doc.has_class(span, "a") && doc.has_class(span, "b"));
        doc.remove_class(span, "a");
        doc.remove_class(span, "b");
        assert_eq!(doc.to_html(), "<span>x</span>");
    }

    #[test]
    fn test_text_is_escaped() {
        let mut doc = Document::new();
        let body = doc.body();
        let text = doc.create_text("a < b & c");
        doc.append_child(body, text);
        assert_eq!(doc.to_html(), "a &lt; b &amp; c");
    }
}
