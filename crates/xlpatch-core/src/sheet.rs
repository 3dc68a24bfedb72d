//! The domain worksheet.
//!
//! A [`Sheet`] owns its cells, comments, tables, merged ranges, and row and
//! column properties, plus a sheet-local [`StyleRegistry`]. Style ids stored
//! on cells are local to the sheet; the writer produces the workbook-wide
//! remapping at emission time.

use std::collections::BTreeMap;

use xlpatch_xml::workbook::SheetState;

use crate::aref::{ARange, ARef};
use crate::error::{Error, Result};
use crate::rich_text::TextRun;
use crate::style::{CellStyle, StyleRegistry};
use crate::value::CellValue;

/// A cell: value plus optional sheet-local style id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    pub style_id: Option<u32>,
}

/// Caller-settable row properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowProps {
    pub height: Option<f64>,
    pub hidden: bool,
    pub outline_level: Option<u8>,
    pub collapsed: bool,
    /// Sheet-local style id applied to the whole row.
    pub style_id: Option<u32>,
}

impl RowProps {
    pub fn is_default(&self) -> bool {
        *self == RowProps::default()
    }
}

/// Caller-settable column properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColProps {
    pub width: Option<f64>,
    pub hidden: bool,
    pub outline_level: Option<u8>,
    pub style_id: Option<u32>,
}

/// A cell comment.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub cell: ARef,
    pub author: String,
    pub body: Vec<TextRun>,
    pub guid: Option<String>,
}

/// A worksheet table (list object).
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub display_name: String,
    pub range: ARange,
    pub columns: Vec<String>,
    pub totals_row_count: u32,
    pub totals_row_shown: bool,
    pub style_name: Option<String>,
    pub auto_filter: bool,
}

/// One worksheet of the domain model.
#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    pub(crate) cells: BTreeMap<ARef, Cell>,
    pub(crate) styles: StyleRegistry,
    pub(crate) comments: Vec<Comment>,
    pub(crate) tables: Vec<Table>,
    pub(crate) merges: Vec<ARange>,
    pub(crate) row_props: BTreeMap<u32, RowProps>,
    pub(crate) col_props: BTreeMap<u32, ColProps>,
    pub(crate) visibility: SheetState,
    /// Table parts read from source, keyed by table name: the part path and
    /// the parsed XML, kept so ids and revision uids survive regeneration.
    pub(crate) preserved_tables: Vec<(String, xlpatch_xml::table::TableXml)>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            styles: StyleRegistry::new(),
            comments: Vec::new(),
            tables: Vec::new(),
            merges: Vec::new(),
            row_props: BTreeMap::new(),
            col_props: BTreeMap::new(),
            visibility: SheetState::Visible,
            preserved_tables: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn visibility(&self) -> SheetState {
        self.visibility
    }

    // ===== Cells =====

    /// Value at a cell; [`CellValue::Empty`] when absent.
    pub fn value(&self, at: ARef) -> CellValue {
        self.cells
            .get(&at)
            .map(|c| c.value.clone())
            .unwrap_or(CellValue::Empty)
    }

    /// The cell record, if present.
    pub fn cell(&self, at: ARef) -> Option<&Cell> {
        self.cells.get(&at)
    }

    pub(crate) fn set_value(&mut self, at: ARef, value: CellValue) {
        let cell = self.cells.entry(at).or_default();
        cell.value = value;
    }

    pub(crate) fn set_style(&mut self, at: ARef, style: CellStyle) {
        let id = self.styles.register(style);
        let cell = self.cells.entry(at).or_default();
        cell.style_id = Some(id);
    }

    pub(crate) fn set_local_style_id(&mut self, at: ARef, id: Option<u32>) {
        let cell = self.cells.entry(at).or_default();
        cell.style_id = id;
    }

    pub(crate) fn clear_cell(&mut self, at: ARef) {
        self.cells.remove(&at);
    }

    /// The style attached to a cell, if any.
    pub fn style(&self, at: ARef) -> Option<&CellStyle> {
        let id = self.cells.get(&at)?.style_id?;
        self.styles.get(id)
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (ARef, &Cell)> {
        self.cells.iter().map(|(r, c)| (*r, c))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Minimal bounding rectangle of the non-empty cells, `None` for an
    /// empty sheet.
    pub fn used_range(&self) -> Option<ARange> {
        let mut iter = self.cells.keys();
        let first = *iter.next()?;
        let mut min_col = first.col();
        let mut max_col = first.col();
        let max_row = self.cells.keys().next_back().map(|r| r.row()).unwrap_or(first.row());
        let min_row = first.row();
        for cell in self.cells.keys() {
            min_col = min_col.min(cell.col());
            max_col = max_col.max(cell.col());
        }
        Some(ARange::new(
            ARef::new(min_col, min_row).expect("existing cell is valid"),
            ARef::new(max_col, max_row).expect("existing cell is valid"),
        ))
    }

    // ===== Merged ranges =====

    pub(crate) fn add_merge(&mut self, range: ARange) -> Result<()> {
        if let Some(existing) = self.merges.iter().find(|m| m.intersects(&range)) {
            return Err(Error::InvalidWorkbook(format!(
                "merge {range} overlaps existing merge {existing}"
            )));
        }
        self.merges.push(range);
        Ok(())
    }

    pub(crate) fn remove_merge(&mut self, range: ARange) -> bool {
        let before = self.merges.len();
        self.merges.retain(|m| *m != range);
        before != self.merges.len()
    }

    pub fn merges(&self) -> &[ARange] {
        &self.merges
    }

    // ===== Comments =====

    pub(crate) fn set_comment(&mut self, comment: Comment) {
        self.comments.retain(|c| c.cell != comment.cell);
        self.comments.push(comment);
    }

    pub(crate) fn remove_comment(&mut self, at: ARef) -> bool {
        let before = self.comments.len();
        self.comments.retain(|c| c.cell != at);
        before != self.comments.len()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    // ===== Tables =====

    pub(crate) fn add_table(&mut self, table: Table) -> Result<()> {
        if table.columns.is_empty() {
            return Err(Error::InvalidWorkbook(format!(
                "table '{}' has no columns",
                table.name
            )));
        }
        if self.tables.iter().any(|t| t.name == table.name) {
            return Err(Error::InvalidWorkbook(format!(
                "table '{}' already exists on sheet '{}'",
                table.name, self.name
            )));
        }
        self.tables.push(table);
        Ok(())
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    // ===== Row / column properties =====

    pub(crate) fn set_row_props(&mut self, row: u32, props: RowProps) {
        if props.is_default() {
            self.row_props.remove(&row);
        } else {
            self.row_props.insert(row, props);
        }
    }

    pub fn row_props(&self, row: u32) -> Option<&RowProps> {
        self.row_props.get(&row)
    }

    pub(crate) fn set_col_props(&mut self, col: u32, props: ColProps) {
        self.col_props.insert(col, props);
    }

    pub fn col_props(&self, col: u32) -> Option<&ColProps> {
        self.col_props.get(&col)
    }
}
