//! Deterministic XML emission.
//!
//! [`XmlSink`] is the single emission abstraction for every regenerated part.
//! Output must be bit-stable across runs and hosts, so the sink enforces one
//! attribute contract: namespace declarations (`xmlns`, `xmlns:*`) are written
//! first, sorted by prefix, followed by the remaining attributes in the exact
//! order the codec supplied them (each part declares its own schema order).
//!
//! Two implementations are provided: [`WriterSink`] streams escaped bytes into
//! any [`std::io::Write`], and [`TreeSink`] builds an in-memory element tree
//! that tests use to assert structure without string matching.
//!
//! A sink drives one output part and is not thread-safe.

use std::io::Write;

use crate::XML_DECLARATION;

/// Sink abstraction for emitting well-formed XML.
///
/// Calls must be balanced: every `start_element` needs a matching
/// `end_element` before `end_document`. Attributes apply to the most recently
/// started element and must precede any child content.
pub trait XmlSink {
    /// Write the XML declaration. Call once, first.
    fn start_document(&mut self);

    /// Open an element. The tag is held pending until content or close so
    /// attributes can still be attached.
    fn start_element(&mut self, name: &str);

    /// Attach an attribute to the pending element.
    fn attr(&mut self, name: &str, value: &str);

    /// Write escaped character data into the current element.
    fn text(&mut self, s: &str);

    /// Splice a pre-serialized fragment verbatim into the current element.
    fn raw(&mut self, xml: &str);

    /// Close the current element, self-closing if it has no content.
    fn end_element(&mut self);
}

/// Escape character data: `&`, `<`, `>`.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape attribute values: character data plus `"`, and the control
/// characters Excel writes as character references.
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\t' => out.push_str("&#9;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(c),
        }
    }
    out
}

fn is_namespace_decl(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

/// Order attributes per the sink contract: namespace declarations first,
/// sorted by prefix, then the rest in supplied order.
fn order_attrs(attrs: &[(String, String)]) -> Vec<&(String, String)> {
    let mut ns: Vec<&(String, String)> = attrs
        .iter()
        .filter(|(n, _)| is_namespace_decl(n))
        .collect();
    ns.sort_by(|a, b| a.0.cmp(&b.0));
    let plain = attrs.iter().filter(|(n, _)| !is_namespace_decl(n));
    ns.into_iter().chain(plain).collect()
}

/// Streaming sink writing escaped bytes into a [`Write`].
pub struct WriterSink<W: Write> {
    out: W,
    // Pending open tag: (name, attrs). Flushed on first content or close.
    pending: Option<(String, Vec<(String, String)>)>,
    stack: Vec<String>,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            pending: None,
            stack: Vec::new(),
        }
    }

    /// Finish emission and return the underlying writer.
    ///
    /// Panics in debug builds if elements are still open; a codec that leaves
    /// the stack unbalanced is a bug, not an input condition.
    pub fn into_inner(mut self) -> W {
        self.flush_pending(false);
        debug_assert!(self.stack.is_empty(), "unbalanced element stack");
        self.out
    }

    fn flush_pending(&mut self, self_close: bool) {
        if let Some((name, attrs)) = self.pending.take() {
            let _ = write!(self.out, "<{name}");
            for (n, v) in order_attrs(&attrs) {
                let _ = write!(self.out, " {n}=\"{}\"", escape_attr(v));
            }
            if self_close {
                let _ = write!(self.out, "/>");
            } else {
                let _ = write!(self.out, ">");
                self.stack.push(name);
            }
        }
    }
}

impl<W: Write> XmlSink for WriterSink<W> {
    fn start_document(&mut self) {
        let _ = write!(self.out, "{XML_DECLARATION}\n");
    }

    fn start_element(&mut self, name: &str) {
        self.flush_pending(false);
        self.pending = Some((name.to_string(), Vec::new()));
    }

    fn attr(&mut self, name: &str, value: &str) {
        let (_, attrs) = self
            .pending
            .as_mut()
            .expect("attr() without a pending element");
        attrs.push((name.to_string(), value.to_string()));
    }

    fn text(&mut self, s: &str) {
        self.flush_pending(false);
        let _ = write!(self.out, "{}", escape_text(s));
    }

    fn raw(&mut self, xml: &str) {
        self.flush_pending(false);
        let _ = write!(self.out, "{xml}");
    }

    fn end_element(&mut self) {
        if self.pending.is_some() {
            self.flush_pending(true);
            return;
        }
        let name = self.stack.pop().expect("end_element() with empty stack");
        let _ = write!(self.out, "</{name}>");
    }
}

/// A node in the in-memory tree built by [`TreeSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Element(TreeElement),
    Text(String),
    Raw(String),
}

/// An element captured by [`TreeSink`], attributes already in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<TreeNode>,
}

impl TreeElement {
    /// Find the first direct child element with the given name.
    pub fn child(&self, name: &str) -> Option<&TreeElement> {
        self.children.iter().find_map(|n| match n {
            TreeNode::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Value of an attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// In-memory tree builder used by tests.
#[derive(Default)]
pub struct TreeSink {
    roots: Vec<TreeNode>,
    // Indices into the open-element chain, starting from `roots`.
    open: Vec<TreeElement>,
}

impl TreeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish and return the single root element.
    pub fn into_root(mut self) -> Option<TreeElement> {
        assert!(self.open.is_empty(), "unbalanced element stack");
        self.roots.drain(..).find_map(|n| match n {
            TreeNode::Element(e) => Some(e),
            _ => None,
        })
    }

    fn push_node(&mut self, node: TreeNode) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }
}

impl XmlSink for TreeSink {
    fn start_document(&mut self) {}

    fn start_element(&mut self, name: &str) {
        self.open.push(TreeElement {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        });
    }

    fn attr(&mut self, name: &str, value: &str) {
        let el = self
            .open
            .last_mut()
            .expect("attr() without a pending element");
        el.attrs.push((name.to_string(), value.to_string()));
    }

    fn text(&mut self, s: &str) {
        self.push_node(TreeNode::Text(s.to_string()));
    }

    fn raw(&mut self, xml: &str) {
        self.push_node(TreeNode::Raw(xml.to_string()));
    }

    fn end_element(&mut self) {
        let mut el = self.open.pop().expect("end_element() with empty stack");
        el.attrs = order_attrs(&el.attrs).into_iter().cloned().collect();
        self.push_node(TreeNode::Element(el));
    }
}
