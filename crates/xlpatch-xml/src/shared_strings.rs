//! Shared Strings XML schema structures.
//!
//! Represents `xl/sharedStrings.xml` in the OOXML package.
//!
//! Parsing keeps the exact source bytes of every `<si>` alongside its decoded
//! content, so a preserve-and-append rewrite can re-emit untouched entries
//! verbatim (rich-text `<rPr>` fragments included) and only serialize the
//! entries it adds.

use serde::{Deserialize, Serialize};

use crate::fragment::{self, Fragment, FragmentError};
use crate::sink::XmlSink;
#[cfg(test)]
use crate::namespaces;
use crate::secure;

/// Shared String Table root element (`xl/sharedStrings.xml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "sst")]
pub struct Sst {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    /// Total reference count of shared strings in the workbook.
    #[serde(rename = "@count", skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,

    /// Number of unique string entries.
    #[serde(rename = "@uniqueCount", skip_serializing_if = "Option::is_none")]
    pub unique_count: Option<u64>,

    #[serde(rename = "si", default)]
    pub items: Vec<Si>,
}

/// Shared String Item (typed view; raw preservation happens in [`SstParsed`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Si {
    #[serde(rename = "t", skip_serializing_if = "Option::is_none")]
    pub t: Option<T>,

    #[serde(rename = "r", default)]
    pub r: Vec<R>,
}

/// Text element with optional space preservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct T {
    #[serde(
        rename = "@xml:space",
        alias = "@space",
        skip_serializing_if = "Option::is_none"
    )]
    pub xml_space: Option<String>,

    #[serde(rename = "$value", default)]
    pub value: String,
}

/// Rich text run (typed view, emission only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct R {
    #[serde(rename = "t")]
    pub t: T,
}

/// One shared-string entry with its exact source bytes retained.
#[derive(Debug, Clone, PartialEq)]
pub struct SiParsed {
    /// Exact `<si>...</si>` bytes from the source part.
    pub raw: String,
    /// Plain-text projection: `<t>` content, or all run texts concatenated.
    pub plain_text: String,
    /// Decoded runs when the entry is rich text, `None` for plain entries.
    pub runs: Option<Vec<RunParsed>>,
}

/// One decoded rich-text run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParsed {
    pub text: String,
    /// Exact `<rPr>...</rPr>` bytes, when the run carries properties.
    pub raw_rpr: Option<String>,
}

/// Parsed shared-strings part.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SstParsed {
    pub count: Option<u64>,
    pub unique_count: Option<u64>,
    pub entries: Vec<SiParsed>,
}

/// Parse `xl/sharedStrings.xml`, retaining raw `<si>` bytes.
pub fn parse_sst(xml: &str) -> Result<SstParsed, FragmentError> {
    secure::check_xml(xml).map_err(|e| FragmentError::Malformed {
        position: 0,
        message: e.to_string(),
    })?;

    let (root, children) = fragment::split_children(xml)?;
    let count = root.attr("count").and_then(|v| v.parse().ok());
    let unique_count = root.attr("uniqueCount").and_then(|v| v.parse().ok());

    let mut entries = Vec::with_capacity(children.len());
    for child in children {
        if child.name != "si" {
            continue;
        }
        entries.push(parse_si(&child)?);
    }

    Ok(SstParsed {
        count,
        unique_count,
        entries,
    })
}

fn parse_si(si: &Fragment) -> Result<SiParsed, FragmentError> {
    let (_, children) = fragment::split_children(&si.raw)?;

    let mut runs: Vec<RunParsed> = Vec::new();
    let mut plain: Option<String> = None;

    for child in &children {
        match child.name.as_str() {
            "t" => plain = Some(element_text(&child.raw)),
            "r" => {
                let (_, run_children) = fragment::split_children(&child.raw)?;
                let mut text = String::new();
                let mut raw_rpr = None;
                for rc in run_children {
                    match rc.name.as_str() {
                        "t" => text = element_text(&rc.raw),
                        "rPr" => raw_rpr = Some(rc.raw),
                        _ => {}
                    }
                }
                runs.push(RunParsed { text, raw_rpr });
            }
            // rPh / phoneticPr survive inside `raw`; they are not projected.
            _ => {}
        }
    }

    let (plain_text, runs) = if runs.is_empty() {
        (plain.unwrap_or_default(), None)
    } else {
        let joined: String = runs.iter().map(|r| r.text.as_str()).collect();
        (joined, Some(runs))
    };

    Ok(SiParsed {
        raw: si.raw.clone(),
        plain_text,
        runs,
    })
}

/// Decode the character data of a leaf element like `<t xml:space="preserve">a</t>`.
fn element_text(raw: &str) -> String {
    let mut reader = quick_xml::Reader::from_str(raw);
    let mut out = String::new();
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Text(t)) => {
                if let Ok(s) = t.unescape() {
                    out.push_str(&s);
                }
            }
            Ok(quick_xml::events::Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    out
}

/// Whether a `<t>` element needs `xml:space="preserve"`: leading, trailing,
/// or consecutive whitespace (tabs and newlines count).
pub fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
        || text.contains("  ")
        || text.contains('\n')
        || text.contains('\t')
}

/// A rich run ready for emission: text plus pre-serialized `<rPr>` bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RichRunXml {
    pub text: String,
    pub rpr_xml: Option<String>,
}

/// Emit a `<t>` element, adding `xml:space` when the text demands it.
pub fn write_t(sink: &mut dyn XmlSink, text: &str) {
    sink.start_element("t");
    if needs_space_preserve(text) {
        sink.attr("xml:space", "preserve");
    }
    sink.text(text);
    sink.end_element();
}

/// Emit a plain `<si><t>...</t></si>`.
pub fn write_plain_si(sink: &mut dyn XmlSink, text: &str) {
    sink.start_element("si");
    write_t(sink, text);
    sink.end_element();
}

/// Emit a rich `<si>` with one `<r>` per run, splicing `<rPr>` bytes verbatim.
pub fn write_rich_si(sink: &mut dyn XmlSink, runs: &[RichRunXml]) {
    sink.start_element("si");
    for run in runs {
        sink.start_element("r");
        if let Some(ref rpr) = run.rpr_xml {
            sink.raw(rpr);
        }
        write_t(sink, &run.text);
        sink.end_element();
    }
    sink.end_element();
}
