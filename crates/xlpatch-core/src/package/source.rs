//! Source binding: fingerprint, context, and the modification tracker.
//!
//! A workbook read from a package owns a [`SourceContext`] binding it to its
//! origin. The context holds no open file handle; the writer re-opens the
//! path (or re-reads the retained buffer) when it needs source bytes.

use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::manifest::PartManifest;

/// Size plus SHA-256 of the whole source file, captured during read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFingerprint {
    pub size: u64,
    pub digest: [u8; 32],
}

impl SourceFingerprint {
    /// Fingerprint a complete byte buffer.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        Self {
            size: bytes.len() as u64,
            digest,
        }
    }
}

/// The backing storage a workbook was read from.
///
/// File-backed workbooks keep only the path; buffer-backed workbooks share
/// the bytes via `Arc` so the writer can copy preserved parts without the
/// caller keeping its own copy alive.
#[derive(Debug, Clone)]
pub enum PackageOrigin {
    Path(PathBuf),
    Buffer(Arc<[u8]>),
}

/// Records which sheets a caller mutated. The domain API marks this
/// cooperatively; nothing is autodetected.
///
/// `modified` holds current (post-deletion) sheet indices, matching the
/// workbook's live sheet vector. `deleted` holds indices as they were at
/// read time, matching the relationship graph and the part manifest; the
/// `original` vector translates between the two.
#[derive(Debug, Clone, Default)]
pub struct ModificationTracker {
    modified: std::collections::BTreeSet<usize>,
    deleted: std::collections::BTreeSet<usize>,
    /// `original[current]` is the read-time index of the current sheet.
    original: Vec<usize>,
    reordered: bool,
}

impl ModificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker for a workbook read with `sheet_count` sheets.
    pub fn with_sheet_count(sheet_count: usize) -> Self {
        Self {
            original: (0..sheet_count).collect(),
            ..Self::default()
        }
    }

    pub fn mark_modified(&mut self, sheet: usize) {
        self.modified.insert(sheet);
    }

    /// Record a deletion: the sheet's read-time index joins `deleted`, and
    /// the current indices of later modified sheets shift down.
    pub fn mark_deleted(&mut self, sheet: usize) {
        if sheet < self.original.len() {
            let read_time = self.original.remove(sheet);
            self.deleted.insert(read_time);
        }
        self.modified.remove(&sheet);
        self.modified = self
            .modified
            .iter()
            .map(|&i| if i > sheet { i - 1 } else { i })
            .collect();
    }

    pub fn mark_reordered(&mut self) {
        self.reordered = true;
    }

    /// Clean means: no cell-level mutations, no deletions, no reorders.
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty() && !self.reordered
    }

    pub fn is_modified(&self, sheet: usize) -> bool {
        self.modified.contains(&sheet)
    }

    /// Modified sheets as current indices.
    pub fn modified_sheets(&self) -> impl Iterator<Item = usize> + '_ {
        self.modified.iter().copied()
    }

    /// Modified sheets translated to read-time indices, for manifest and
    /// relationship-graph queries.
    pub fn modified_sheets_at_read(&self) -> std::collections::BTreeSet<usize> {
        self.modified
            .iter()
            .map(|&i| self.original.get(i).copied().unwrap_or(i))
            .collect()
    }

    /// Deleted sheets as read-time indices.
    pub fn deleted_sheets(&self) -> std::collections::BTreeSet<usize> {
        self.deleted.clone()
    }

    pub fn has_deletions(&self) -> bool {
        !self.deleted.is_empty()
    }

    pub fn is_reordered(&self) -> bool {
        self.reordered
    }
}

/// Binding of a workbook to the package it was read from.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub origin: PackageOrigin,
    pub manifest: PartManifest,
    pub fingerprint: SourceFingerprint,
    pub tracker: ModificationTracker,
}

impl SourceContext {
    pub fn is_clean(&self) -> bool {
        self.tracker.is_clean()
    }
}
