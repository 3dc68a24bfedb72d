//! The domain workbook.
//!
//! A [`Workbook`] owns its sheets and, when it was read from a package, a
//! [`SourceContext`](crate::package::SourceContext) binding it to its origin
//! plus the parsed parts the writer reuses. Every mutating method marks the
//! modification tracker for the sheet it touches; the tracker is a
//! cooperative contract, nothing is autodetected.

use xlpatch_xml::relationships::Relationships;
use xlpatch_xml::workbook::{default_workbook, ParsedWorkbook, SheetState};
use xlpatch_xml::worksheet::ParsedWorksheet;
use xlpatch_xml::styles::ParsedStyles;

use crate::aref::{ARange, ARef};
use crate::error::{Error, Result};
use crate::package::{RelationshipGraph, SourceContext};
use crate::sheet::{ColProps, Comment, RowProps, Sheet, Table};
use crate::sst::SharedStrings;
use crate::style::CellStyle;
use crate::value::CellValue;

/// In-memory representation of an `.xlsx` workbook.
#[derive(Debug)]
pub struct Workbook {
    pub(crate) sheets: Vec<Sheet>,
    pub(crate) source: Option<SourceContext>,
    /// The workbook part: preserved metadata from source, or synthesized.
    pub(crate) workbook_part: ParsedWorkbook,
    /// Per-sheet preserved worksheet metadata, index-aligned with `sheets`.
    pub(crate) preserved_sheets: Vec<Option<ParsedWorksheet>>,
    /// Shared strings; holds the source table (raw entries included) after a
    /// read, an empty table otherwise.
    pub(crate) sst: SharedStrings,
    /// The source stylesheet, kept for preserve-and-extend emission.
    pub(crate) source_styles: Option<ParsedStyles>,
    /// The source `[Content_Types].xml`, kept so overrides for preserved
    /// unknown parts survive regeneration.
    pub(crate) source_content_types: Option<xlpatch_xml::content_types::ContentTypes>,
    /// Part-to-sheet dependency graph, computed eagerly on read.
    pub(crate) relgraph: Option<RelationshipGraph>,
    /// Source part path per sheet; empty string for sheets added in memory.
    pub(crate) source_sheet_paths: Vec<String>,
    /// Parsed per-sheet relationship files, index-aligned with `sheets`.
    pub(crate) sheet_rels: Vec<Option<Relationships>>,
}

impl Workbook {
    /// Create a new empty workbook containing a single empty sheet "Sheet1".
    pub fn new() -> Self {
        Self {
            sheets: vec![Sheet::new("Sheet1")],
            source: None,
            workbook_part: default_workbook(&["Sheet1".to_string()]),
            preserved_sheets: vec![None],
            sst: SharedStrings::new(),
            source_styles: None,
            source_content_types: None,
            relgraph: None,
            source_sheet_paths: vec![String::new()],
            sheet_rels: vec![None],
        }
    }

    // ===== Introspection =====

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    pub fn sheet_at(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    /// Whether the workbook has no unsaved mutations against its source.
    /// A workbook without a source is never clean.
    pub fn is_clean(&self) -> bool {
        self.source.as_ref().map(|s| s.is_clean()).unwrap_or(false)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.sheets
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| Error::SheetNotFound {
                name: name.to_string(),
            })
    }

    fn mark(&mut self, index: usize) {
        if let Some(ref mut src) = self.source {
            src.tracker.mark_modified(index);
        }
    }

    fn mark_structural(&mut self) {
        if let Some(ref mut src) = self.source {
            src.tracker.mark_reordered();
        }
    }

    // ===== Sheet operations =====

    /// Append a new empty sheet.
    pub fn add_sheet(&mut self, name: &str) -> Result<()> {
        validate_sheet_name(name)?;
        if self.sheet(name).is_some() {
            return Err(Error::SheetAlreadyExists {
                name: name.to_string(),
            });
        }
        self.sheets.push(Sheet::new(name));
        self.preserved_sheets.push(None);
        self.source_sheet_paths.push(String::new());
        self.sheet_rels.push(None);
        let index = self.sheets.len() - 1;
        self.mark_structural();
        self.mark(index);
        Ok(())
    }

    /// Rename a sheet, keeping its `sheetId` and visibility.
    pub fn rename_sheet(&mut self, old: &str, new: &str) -> Result<()> {
        validate_sheet_name(new)?;
        if old != new && self.sheet(new).is_some() {
            return Err(Error::SheetAlreadyExists {
                name: new.to_string(),
            });
        }
        let index = self.index_of(old)?;
        if let Some(r) = self.workbook_part.sheets.iter_mut().find(|s| s.name == old) {
            r.name = new.to_string();
        }
        self.sheets[index].set_name(new);
        self.mark_structural();
        Ok(())
    }

    /// Delete a sheet. The last remaining sheet cannot be deleted.
    pub fn delete_sheet(&mut self, name: &str) -> Result<()> {
        if self.sheets.len() == 1 {
            return Err(Error::InvalidWorkbook(
                "cannot delete the last sheet".to_string(),
            ));
        }
        let index = self.index_of(name)?;
        self.sheets.remove(index);
        self.preserved_sheets.remove(index);
        self.source_sheet_paths.remove(index);
        self.sheet_rels.remove(index);
        self.workbook_part.sheets.retain(|s| s.name != name);
        if let Some(ref mut src) = self.source {
            src.tracker.mark_deleted(index);
        }
        Ok(())
    }

    /// Change a sheet's visibility state.
    pub fn set_sheet_visibility(&mut self, name: &str, state: SheetState) -> Result<()> {
        let index = self.index_of(name)?;
        self.sheets[index].visibility = state;
        if let Some(r) = self.workbook_part.sheets.iter_mut().find(|s| s.name == name) {
            r.state = state;
        }
        self.mark_structural();
        Ok(())
    }

    // ===== Cell operations =====

    pub fn value(&self, sheet: &str, at: ARef) -> Result<CellValue> {
        Ok(self
            .sheet(sheet)
            .ok_or_else(|| Error::SheetNotFound {
                name: sheet.to_string(),
            })?
            .value(at))
    }

    pub fn set_value(&mut self, sheet: &str, at: ARef, value: CellValue) -> Result<()> {
        let index = self.index_of(sheet)?;
        self.sheets[index].set_value(at, value);
        self.mark(index);
        Ok(())
    }

    pub fn clear_cell(&mut self, sheet: &str, at: ARef) -> Result<()> {
        let index = self.index_of(sheet)?;
        self.sheets[index].clear_cell(at);
        self.mark(index);
        Ok(())
    }

    pub fn set_style(&mut self, sheet: &str, at: ARef, style: CellStyle) -> Result<()> {
        let index = self.index_of(sheet)?;
        self.sheets[index].set_style(at, style);
        self.mark(index);
        Ok(())
    }

    // ===== Comments =====

    pub fn set_comment(&mut self, sheet: &str, comment: Comment) -> Result<()> {
        let index = self.index_of(sheet)?;
        self.sheets[index].set_comment(comment);
        self.mark(index);
        Ok(())
    }

    pub fn remove_comment(&mut self, sheet: &str, at: ARef) -> Result<bool> {
        let index = self.index_of(sheet)?;
        let removed = self.sheets[index].remove_comment(at);
        if removed {
            self.mark(index);
        }
        Ok(removed)
    }

    // ===== Merges =====

    pub fn merge_cells(&mut self, sheet: &str, range: ARange) -> Result<()> {
        let index = self.index_of(sheet)?;
        self.sheets[index].add_merge(range)?;
        self.mark(index);
        Ok(())
    }

    pub fn unmerge_cells(&mut self, sheet: &str, range: ARange) -> Result<bool> {
        let index = self.index_of(sheet)?;
        let removed = self.sheets[index].remove_merge(range);
        if removed {
            self.mark(index);
        }
        Ok(removed)
    }

    // ===== Row / column properties =====

    pub fn set_row_props(&mut self, sheet: &str, row: u32, props: RowProps) -> Result<()> {
        let index = self.index_of(sheet)?;
        self.sheets[index].set_row_props(row, props);
        self.mark(index);
        Ok(())
    }

    pub fn set_col_props(&mut self, sheet: &str, col: u32, props: ColProps) -> Result<()> {
        let index = self.index_of(sheet)?;
        self.sheets[index].set_col_props(col, props);
        self.mark(index);
        Ok(())
    }

    // ===== Tables =====

    /// Add a table to a sheet. Table names must be unique workbook-wide.
    pub fn add_table(&mut self, sheet: &str, table: Table) -> Result<()> {
        let index = self.index_of(sheet)?;
        if self
            .sheets
            .iter()
            .flat_map(|s| s.tables())
            .any(|t| t.name == table.name)
        {
            return Err(Error::InvalidWorkbook(format!(
                "table '{}' already exists in the workbook",
                table.name
            )));
        }
        self.sheets[index].add_table(table)?;
        self.mark(index);
        Ok(())
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

/// Excel sheet-name rules: 1..=31 chars, none of `: \ / ? * [ ]`, no
/// leading or trailing apostrophe.
fn validate_sheet_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().count() > 31 {
        return Err(Error::InvalidSheetName(name.to_string()));
    }
    if name.contains([':', '\\', '/', '?', '*', '[', ']']) {
        return Err(Error::InvalidSheetName(name.to_string()));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(Error::InvalidSheetName(name.to_string()));
    }
    Ok(())
}
