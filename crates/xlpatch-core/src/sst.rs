//! Runtime shared string table.
//!
//! [`SharedStrings`] holds the ordered unique entries of the workbook's
//! string pool, a lookup map keyed by NFC-normalized text, and the total
//! reference count. Entries read from a source package keep their exact
//! `<si>` bytes; a preserve-and-append rewrite re-emits those verbatim and
//! serializes only the entries added since.

use std::collections::HashMap;

use unicode_normalization::UnicodeNormalization;
use xlpatch_xml::shared_strings::{self, RichRunXml, SstParsed};
use xlpatch_xml::sink::{WriterSink, XmlSink};
use xlpatch_xml::namespaces;

use crate::rich_text::{runs_plain_text, TextRun};

/// One entry in the table.
#[derive(Debug, Clone, PartialEq)]
pub enum SstEntry {
    Text(String),
    Rich(Vec<TextRun>),
}

impl SstEntry {
    /// Plain-text projection used for keying.
    pub fn plain_text(&self) -> String {
        match self {
            SstEntry::Text(s) => s.clone(),
            SstEntry::Rich(runs) => runs_plain_text(runs),
        }
    }
}

/// NFC-normalize a lookup key. The table stores original strings;
/// normalization applies to the key map only.
pub fn nfc_key(text: &str) -> String {
    text.nfc().collect()
}

/// Ordered unique strings plus a reference counter.
#[derive(Debug, Clone, Default)]
pub struct SharedStrings {
    entries: Vec<SstEntry>,
    /// Preserved raw `<si>` bytes, index-aligned with `entries`.
    raw: Vec<Option<String>>,
    keys: HashMap<String, usize>,
    total_count: u64,
    /// Entry count when loaded from source; entries past this are new.
    baseline_len: usize,
}

impl SharedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed source part, retaining raw entry bytes.
    ///
    /// Rich entries are keyed by their plain-text projection, so two
    /// formatted texts with identical plain text share one slot; the first
    /// one wins. This collision is deliberate, matching the table's observed
    /// dedup behavior.
    pub fn from_parsed(parsed: &SstParsed) -> Self {
        let mut table = Self::new();
        for si in &parsed.entries {
            let idx = table.entries.len();
            let entry = match &si.runs {
                None => SstEntry::Text(si.plain_text.clone()),
                Some(runs) => SstEntry::Rich(
                    runs.iter()
                        .map(|r| TextRun {
                            text: r.text.clone(),
                            font: None,
                            raw_rpr_xml: r.raw_rpr.clone(),
                        })
                        .collect(),
                ),
            };
            table.keys.entry(nfc_key(&si.plain_text)).or_insert(idx);
            table.entries.push(entry);
            table.raw.push(Some(si.raw.clone()));
        }
        table.total_count = parsed.count.unwrap_or(table.entries.len() as u64);
        table.baseline_len = table.entries.len();
        table
    }

    /// Number of unique entries.
    pub fn unique_count(&self) -> usize {
        self.entries.len()
    }

    /// Total cell references, duplicates included.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether entries were added after the source baseline.
    pub fn has_new_entries(&self) -> bool {
        self.entries.len() > self.baseline_len
    }

    pub fn get(&self, index: usize) -> Option<&SstEntry> {
        self.entries.get(index)
    }

    /// Index of a plain string, without inserting.
    pub fn lookup(&self, text: &str) -> Option<usize> {
        self.keys.get(&nfc_key(text)).copied()
    }

    /// Subtract references that are about to be re-interned, so a rewrite of
    /// a modified sheet does not double-count its pre-existing strings.
    pub(crate) fn discount_refs(&mut self, n: u64) {
        self.total_count = self.total_count.saturating_sub(n);
    }

    /// Intern a plain string, counting one reference.
    pub fn intern_text(&mut self, text: &str) -> usize {
        self.total_count += 1;
        let key = nfc_key(text);
        if let Some(&idx) = self.keys.get(&key) {
            return idx;
        }
        let idx = self.entries.len();
        self.entries.push(SstEntry::Text(text.to_string()));
        self.raw.push(None);
        self.keys.insert(key, idx);
        idx
    }

    /// Intern a rich-text entry, keyed by its plain-text projection.
    pub fn intern_rich(&mut self, runs: &[TextRun]) -> usize {
        self.total_count += 1;
        let key = nfc_key(&runs_plain_text(runs));
        if let Some(&idx) = self.keys.get(&key) {
            return idx;
        }
        let idx = self.entries.len();
        self.entries.push(SstEntry::Rich(runs.to_vec()));
        self.raw.push(None);
        self.keys.insert(key, idx);
        idx
    }

    /// Heuristic for the `Auto` policy: worth a shared table iff strings
    /// actually repeat and the workbook is not trivially small.
    pub fn should_use_sst(&self) -> bool {
        self.total_count > self.entries.len() as u64 && self.total_count > 10
    }

    /// Serialize the part: preserved entries verbatim, new entries built.
    pub fn to_xml_string(&self) -> String {
        let mut buf = Vec::new();
        {
            let mut sink = WriterSink::new(&mut buf);
            sink.start_document();
            sink.start_element("sst");
            sink.attr("xmlns", namespaces::SPREADSHEET_ML);
            sink.attr("count", &self.total_count.to_string());
            sink.attr("uniqueCount", &self.entries.len().to_string());
            for (i, entry) in self.entries.iter().enumerate() {
                if let Some(Some(raw)) = self.raw.get(i) {
                    sink.raw(raw);
                    continue;
                }
                match entry {
                    SstEntry::Text(text) => shared_strings::write_plain_si(&mut sink, text),
                    SstEntry::Rich(runs) => {
                        let xml_runs: Vec<RichRunXml> = runs
                            .iter()
                            .map(|r| RichRunXml {
                                text: r.text.clone(),
                                rpr_xml: r.rpr_xml(),
                            })
                            .collect();
                        shared_strings::write_rich_si(&mut sink, &xml_runs);
                    }
                }
            }
            sink.end_element();
            sink.into_inner();
        }
        String::from_utf8(buf).expect("sink emits UTF-8")
    }
}
