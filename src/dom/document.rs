use crate::dom::selector::SelectorList;
use crate::errors::Result;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node inside a [`Document`] arena.
///
/// Ids are only meaningful for the document (or snapshot) that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
    detached: bool,
}

/// Tags whose text never counts as visible content.
const NON_TEXT_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Mutable arena DOM built from HTML.
///
/// Removed nodes stay in the arena flagged as detached, so a [`NodeId`] taken before a
/// removal never points at a different node afterwards.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    pub fn empty() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
                detached: false,
            }],
        }
    }

    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut document = Self::empty();
        let root = document.root();
        document.import_element(parsed.root_element(), root);
        document
    }

    fn import_element(&mut self, element: ElementRef<'_>, parent: NodeId) {
        let value = element.value();
        let attrs = value
            .attrs()
            .map(|(name, val)| (name.to_ascii_lowercase(), val.to_string()))
            .collect();
        let id = self.push(
            parent,
            NodeData::Element(ElementData {
                tag: value.name().to_ascii_lowercase(),
                attrs,
            }),
        );

        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                self.import_element(child_element, id);
            } else if let Some(text) = child.value().as_text() {
                let content: &str = text;
                self.push(id, NodeData::Text(content.to_string()));
            }
        }
    }

    fn push(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            data,
            detached: false,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Content of a text node, `None` for elements.
    pub fn text_node(&self, id: NodeId) -> Option<&str> {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.node(id).map(|n| !n.detached).unwrap_or(false)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).map(|n| &n.data), Some(NodeData::Element(_)))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Element(data)) => Some(data),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| {
            e.attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        })
    }

    /// Attribute value, trimmed, `None` when missing or blank.
    pub fn attr_nonempty(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attr(id, name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// `true` for boolean-ish attribute values (`aria-checked="true"`, `data-selected=""`).
    pub fn attr_is_true(&self, id: NodeId, name: &str) -> bool {
        match self.attr(id, name) {
            Some(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "off" | "no"),
            None => false,
        }
    }

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        self.element(id).map(|e| e.attrs.as_slice()).unwrap_or(&[])
    }

    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).any(|c| c.eq_ignore_ascii_case(class))
    }

    /// Any class token containing `fragment` (case-insensitive).
    pub fn class_contains(&self, id: NodeId, fragment: &str) -> bool {
        self.classes(id)
            .any(|c| c.to_ascii_lowercase().contains(fragment))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.is_element(*c))
    }

    /// Element ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            document: self,
            next: self.parent_element(id),
        }
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Element descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements(id, &mut out);
        out
    }

    /// `id` followed by its element descendants, document order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.is_element(id) {
            out.push(id);
        }
        self.collect_elements(id, &mut out);
        out
    }

    fn collect_elements(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(id) {
            if self.is_element(*child) {
                out.push(*child);
                self.collect_elements(*child, out);
            }
        }
    }

    /// All attached elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(self.root())
    }

    pub fn find_first<F>(&self, scope: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        self.subtree(scope).into_iter().find(|n| predicate(self, *n))
    }

    pub fn find_all<F>(&self, scope: NodeId, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        self.subtree(scope)
            .into_iter()
            .filter(|n| predicate(self, *n))
            .collect()
    }

    pub fn find_tag(&self, tag: &str) -> Option<NodeId> {
        self.find_first(self.root(), |d, n| d.is_tag(n, tag))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.find_tag("body")
    }

    pub fn title(&self) -> String {
        self.find_tag("title")
            .map(|t| self.text_content(t))
            .unwrap_or_default()
    }

    /// Text content with whitespace runs collapsed and script/style bodies skipped.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut raw = String::new();
        self.collect_text(id, &mut raw);
        collapse_whitespace(&raw)
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Text(text)) => {
                out.push_str(text);
            }
            Some(NodeData::Element(e)) if NON_TEXT_TAGS.contains(&e.tag.as_str()) => {}
            Some(_) => {
                for child in self.children(id) {
                    self.collect_text(*child, out);
                    if self.is_element(*child) {
                        out.push(' ');
                    }
                }
            }
            None => {}
        }
    }

    /// Text content skipping every element subtree for which `skip` returns `true`.
    pub fn text_content_excluding<F>(&self, id: NodeId, skip: F) -> String
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        let mut raw = String::new();
        self.collect_text_filtered(id, &skip, &mut raw);
        collapse_whitespace(&raw)
    }

    fn collect_text_filtered<F>(&self, id: NodeId, skip: &F, out: &mut String)
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        for child in self.children(id) {
            match self.node(*child).map(|n| &n.data) {
                Some(NodeData::Text(text)) => out.push_str(text),
                Some(NodeData::Element(e)) => {
                    if NON_TEXT_TAGS.contains(&e.tag.as_str()) || skip(self, *child) {
                        continue;
                    }
                    self.collect_text_filtered(*child, skip, out);
                    out.push(' ');
                }
                _ => {}
            }
        }
    }

    /// Text of the direct text children only.
    pub fn own_text(&self, id: NodeId) -> String {
        let raw: String = self
            .children(id)
            .iter()
            .filter_map(|c| match self.node(*c).map(|n| &n.data) {
                Some(NodeData::Text(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ");
        collapse_whitespace(&raw)
    }

    /// Position among element siblings, 1-based.
    pub fn element_index(&self, id: NodeId) -> usize {
        match self.parent(id) {
            Some(parent) => self
                .element_children(parent)
                .position(|c| c == id)
                .map(|p| p + 1)
                .unwrap_or(1),
            None => 1,
        }
    }

    pub fn select(&self, selector: &str) -> Result<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select_parsed(self.root(), &list))
    }

    pub fn select_first(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.select(selector)?.into_iter().next())
    }

    pub fn select_within(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select_parsed(scope, &list))
    }

    pub fn select_parsed(&self, scope: NodeId, list: &SelectorList) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| list.matches(self, *n))
            .collect()
    }

    /// A selector that resolves back to `id` in this document and in the live page it was
    /// parsed from: `#id` when the id is unique and CSS-safe, otherwise an
    /// `:nth-child` path from `html`.
    pub fn unique_selector(&self, id: NodeId) -> String {
        if let Some(element_id) = self.attr_nonempty(id, "id") {
            if is_css_identifier(element_id) {
                let candidate = format!("#{}", element_id);
                if let Ok(matches) = self.select(&candidate) {
                    if matches.len() == 1 && matches[0] == id {
                        return candidate;
                    }
                }
            }
        }

        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let Some(tag) = self.tag(node) else { break };
            if tag == "html" {
                segments.push("html".to_string());
                break;
            }
            segments.push(format!("{}:nth-child({})", tag, self.element_index(node)));
            current = self.parent_element(node);
        }
        segments.reverse();
        segments.join(" > ")
    }

    // Mutation primitives. These back the in-memory page driver.

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(Node {
            data: NodeData::Element(element),
            ..
        }) = self.nodes.get_mut(id.0)
        {
            match element.attrs.iter_mut().find(|(k, _)| k == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => element.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(Node {
            data: NodeData::Element(element),
            ..
        }) = self.nodes.get_mut(id.0)
        {
            element.attrs.retain(|(k, _)| k != name);
        }
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if !self.contains_node(id) {
            return;
        }
        let old = std::mem::take(&mut self.nodes[id.0].children);
        for child in old {
            self.mark_detached(child);
        }
        self.push(id, NodeData::Text(text.to_string()));
    }

    /// Parse `html` and append its body content under `parent`; returns the new top-level
    /// element ids.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let fragment = Document::parse(html);
        let Some(body) = fragment.body() else {
            return Vec::new();
        };
        let mut added = Vec::new();
        for child in fragment.children(body).to_vec() {
            if let Some(id) = self.graft(&fragment, child, parent) {
                if self.is_element(id) {
                    added.push(id);
                }
            }
        }
        added
    }

    fn graft(&mut self, source: &Document, node: NodeId, parent: NodeId) -> Option<NodeId> {
        let data = source.node(node)?.data.clone();
        let id = self.push(parent, data);
        for child in source.children(node).to_vec() {
            self.graft(source, child, id);
        }
        Some(id)
    }

    /// Detach `id` (and its subtree) from the tree.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
        self.mark_detached(id);
    }

    fn mark_detached(&mut self, id: NodeId) {
        let children = match self.nodes.get_mut(id.0) {
            Some(node) => {
                node.detached = true;
                node.children.clone()
            }
            None => return,
        };
        for child in children {
            self.mark_detached(child);
        }
    }
}

pub struct Ancestors<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.document.parent_element(current);
        Some(current)
    }
}

pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_css_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>Sign up</title><style>.x { color: red }</style></head>
        <body>
          <div id="main" class="card  primary">
            <h1>Create   account</h1>
            <p>Hello <b>world</b></p>
            <button type="submit">Go</button>
          </div>
          <ul><li>a</li><li>b</li></ul>
        </body></html>"#;

    #[test]
    fn parses_elements_and_text() {
        let doc = Document::parse(PAGE);
        assert_eq!(doc.title(), "Sign up");
        let main = doc.select_first("#main").unwrap().unwrap();
        assert!(doc.has_class(main, "primary"));
        assert_eq!(doc.text_content(main), "Create account Hello world Go");
        let body = doc.body().unwrap();
        assert!(!doc.text_content(body).contains("color"));
    }

    #[test]
    fn unique_selectors_round_trip() {
        let doc = Document::parse(PAGE);
        for id in doc.elements() {
            let selector = doc.unique_selector(id);
            let found = doc.select(&selector).unwrap();
            assert_eq!(found, vec![id], "selector {} did not round-trip", selector);
        }
    }

    #[test]
    fn removal_detaches_subtree() {
        let mut doc = Document::parse(PAGE);
        let main = doc.select_first("#main").unwrap().unwrap();
        let button = doc.select_first("button").unwrap().unwrap();
        doc.remove(main);
        assert!(!doc.is_attached(main));
        assert!(!doc.is_attached(button));
        assert!(doc.select_first("button").unwrap().is_none());
    }

    #[test]
    fn appended_html_is_queryable() {
        let mut doc = Document::parse(PAGE);
        let body = doc.body().unwrap();
        let added = doc.append_html(body, r#"<form id="late"><input name="q"></form>"#);
        assert_eq!(added.len(), 1);
        assert_eq!(doc.select("#late input").unwrap().len(), 1);
    }
}
