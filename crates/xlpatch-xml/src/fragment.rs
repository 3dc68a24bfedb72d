//! Opaque child-element capture.
//!
//! A lossless rewriter must carry subtrees it does not understand. Instead of
//! re-synthesizing them through typed structs (and losing unknown attributes
//! or children), the scanner splits a part's root element into its direct
//! children as `(name, raw bytes)` pairs. Regeneration then splices the raw
//! fragments back verbatim, in schema order, around the children it rebuilds.

use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use thiserror::Error;

/// One direct child of a part's root element, kept as raw XML.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Local element name (prefix included when present, e.g. `mc:AlternateContent`).
    pub name: String,
    /// The exact source bytes of the subtree, start tag through end tag.
    pub raw: String,
}

/// The root element's tag: name plus attributes in source order.
///
/// Attribute order is preserved so regenerated parts can re-emit the source
/// root (namespace declarations included) without loss.
#[derive(Debug, Clone, PartialEq)]
pub struct RootTag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl RootTag {
    /// Value of a root attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    #[error("document has no root element")]
    NoRoot,
}

fn malformed(position: usize, e: impl std::fmt::Display) -> FragmentError {
    FragmentError::Malformed {
        position,
        message: e.to_string(),
    }
}

/// Split a document into its root tag and raw direct-child fragments.
pub fn split_children(xml: &str) -> Result<(RootTag, Vec<Fragment>), FragmentError> {
    let mut reader = Reader::from_str(xml);

    // Locate the root element and capture its tag.
    let root = loop {
        let pos = reader.buffer_position() as usize;
        match reader.read_event().map_err(|e| malformed(pos, e))? {
            Event::Start(e) => break decode_root(&e, pos)?,
            Event::Empty(e) => {
                // Self-closing root: no children.
                return Ok((decode_root(&e, pos)?, Vec::new()));
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::Text(_) => {}
            Event::Eof => return Err(FragmentError::NoRoot),
            _ => {}
        }
    };

    // Walk the root's direct children, slicing raw spans for each.
    let mut fragments = Vec::new();
    loop {
        let pos = reader.buffer_position() as usize;
        match reader.read_event().map_err(|e| malformed(pos, e))? {
            Event::Start(e) => {
                let name = qname_to_string(e.name());
                let owned = e.name().as_ref().to_vec();
                reader
                    .read_to_end(QName(&owned))
                    .map_err(|e| malformed(pos, e))?;
                let end = reader.buffer_position() as usize;
                fragments.push(Fragment {
                    name,
                    raw: xml[pos..end].to_string(),
                });
            }
            Event::Empty(e) => {
                let name = qname_to_string(e.name());
                let end = reader.buffer_position() as usize;
                fragments.push(Fragment {
                    name,
                    raw: xml[pos..end].to_string(),
                });
            }
            Event::End(_) => break,
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((root, fragments))
}

fn decode_root(
    e: &quick_xml::events::BytesStart<'_>,
    pos: usize,
) -> Result<RootTag, FragmentError> {
    let name = qname_to_string(e.name());
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| malformed(pos, e))?;
        let key = qname_to_string(attr.key);
        let value = attr
            .unescape_value()
            .map_err(|e| malformed(pos, e))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(RootTag { name, attrs })
}

fn qname_to_string(name: QName<'_>) -> String {
    String::from_utf8_lossy(name.as_ref()).into_owned()
}

/// Strip namespace declarations from a raw start tag when the fragment is
/// spliced into a document that already declares them on the root.
///
/// Only declarations whose URI matches one in `inherited` are removed; any
/// other declaration stays, since the child may genuinely rebind a prefix.
pub fn strip_redundant_ns_decls(raw: &str, inherited: &[(&str, &str)]) -> String {
    let mut out = raw.to_string();
    for (attr, uri) in inherited {
        for quote in ['"', '\''] {
            let needle = format!(" {attr}={quote}{uri}{quote}");
            while let Some(idx) = out.find(&needle) {
                out.replace_range(idx..idx + needle.len(), "");
            }
        }
    }
    out
}
