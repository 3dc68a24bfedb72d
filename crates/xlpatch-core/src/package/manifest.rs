//! Part manifest.
//!
//! An ordered table of every ZIP entry in the source package, retaining
//! encounter order for reproducible output. Each entry records the container
//! metadata needed to copy it verbatim later, plus whether the reader parsed
//! it or merely indexed it.

use std::collections::HashMap;

use zip::CompressionMethod;

/// Whether the reader parsed a part into the domain model or left it opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Parsed,
    Unparsed,
}

/// One ZIP entry of the source package.
#[derive(Debug, Clone, PartialEq)]
pub struct PartEntry {
    pub path: String,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    pub compression_method: CompressionMethod,
    pub kind: PartKind,
}

/// Ordered table of package parts.
#[derive(Debug, Clone, Default)]
pub struct PartManifest {
    entries: Vec<PartEntry>,
    index: HashMap<String, usize>,
}

impl PartManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, keeping encounter order. A duplicate path replaces
    /// the earlier record's metadata but keeps its position.
    pub fn push(&mut self, entry: PartEntry) {
        if let Some(&i) = self.index.get(&entry.path) {
            self.entries[i] = entry;
            return;
        }
        self.index.insert(entry.path.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn get(&self, path: &str) -> Option<&PartEntry> {
        self.index.get(path).map(|&i| &self.entries[i])
    }

    /// Flip an entry to [`PartKind::Parsed`] once the reader consumed it.
    pub fn mark_parsed(&mut self, path: &str) {
        if let Some(&i) = self.index.get(path) {
            self.entries[i].kind = PartKind::Parsed;
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Entries in encounter order.
    pub fn iter(&self) -> impl Iterator<Item = &PartEntry> {
        self.entries.iter()
    }

    /// Unparsed entries in encounter order.
    pub fn unparsed(&self) -> impl Iterator<Item = &PartEntry> {
        self.entries.iter().filter(|e| e.kind == PartKind::Unparsed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether the reader understands the part at this path.
///
/// Known paths are the structural fixed set plus the numbered worksheet,
/// comment, table, and worksheet-rels patterns.
pub fn is_known_part(path: &str) -> bool {
    const FIXED: &[&str] = &[
        "[Content_Types].xml",
        "_rels/.rels",
        "xl/workbook.xml",
        "xl/_rels/workbook.xml.rels",
        "xl/styles.xml",
        "xl/sharedStrings.xml",
        "xl/theme/theme1.xml",
    ];
    if FIXED.contains(&path) {
        return true;
    }
    numbered(path, "xl/worksheets/sheet", ".xml")
        || numbered(path, "xl/comments", ".xml")
        || numbered(path, "xl/tables/table", ".xml")
        || numbered(path, "xl/worksheets/_rels/sheet", ".xml.rels")
}

fn numbered(path: &str, prefix: &str, suffix: &str) -> bool {
    path.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(suffix))
        .map(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// The sheet number of a numbered part path, e.g. `3` for
/// `xl/worksheets/sheet3.xml`. 1-based, as in the part name.
pub fn numbered_part_index(path: &str, prefix: &str, suffix: &str) -> Option<usize> {
    path.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(suffix))
        .and_then(|digits| digits.parse().ok())
}
