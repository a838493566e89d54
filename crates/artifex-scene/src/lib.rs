//! Host-neutral output of a component render.
//!
//! A scene is a plain tree of elements and text. It carries no behaviour:
//! event handlers and other functions are dropped before a scene is built.
//! Hosts serialise it as HTML ([`to_html`]), JSON (serde) or an indented
//! outline ([`outline`]).

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Text { text: String },
    Element(ElementNode),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, AttributeValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Present without a value, like `disabled`.
    Flag(bool),
    Text(String),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    pub fn element(element: ElementNode) -> Self {
        Node::Element(element)
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text { .. } => None,
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text { text } => out.push_str(text),
            Node::Element(element) => {
                for child in &element.children {
                    child.collect_text(out);
                }
            }
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text { text } => escape_into(text, false, out),
            Node::Element(element) => element.write_html(out),
        }
    }
}

impl ElementNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into(), AttributeValue::Text(value.into()));
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), AttributeValue::Flag(true));
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Node::text(text))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self.attributes.get(name) {
            Some(AttributeValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Depth-first search for the first descendant element with `tag`.
    pub fn find(&self, tag: &str) -> Option<&ElementNode> {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .find_map(|child| {
                if child.tag == tag {
                    Some(child)
                } else {
                    child.find(tag)
                }
            })
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.as_str())
    }

    fn write_html(&self, out: &mut String) {
        self.write_open_tag(out);
        if self.is_void() {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }

    fn write_open_tag(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attributes {
            match value {
                AttributeValue::Flag(false) => continue,
                AttributeValue::Flag(true) => {
                    out.push(' ');
                    out.push_str(name);
                }
                AttributeValue::Text(value) => {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
            }
        }
        out.push('>');
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut html = String::new();
        self.write_html(&mut html);
        f.write_str(&html)
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// Serialises a scene as HTML.
pub fn to_html(nodes: &[Node]) -> String {
    let mut html = String::new();
    for node in nodes {
        node.write_html(&mut html);
    }
    html
}

/// Concatenated text of a whole scene.
pub fn text_content(nodes: &[Node]) -> String {
    nodes.iter().map(Node::text_content).collect()
}

/// Indented outline of a scene, one tag or text run per line.
pub fn outline(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        outline_node(node, 0, &mut out);
    }
    out
}

fn outline_node(node: &Node, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node {
        Node::Text { text } => {
            out.push_str(&indent);
            out.push_str(&format!("{text:?}"));
            out.push('\n');
        }
        Node::Element(element) => {
            out.push_str(&indent);
            element.write_open_tag(out);
            out.push('\n');
            for child in &element.children {
                outline_node(child, depth + 1, out);
            }
        }
    }
}
