//! xlpatch-core: surgical read-modify-write engine for Excel (.xlsx) files.
//!
//! An `.xlsx` file is a ZIP package of XML parts. This crate opens such a
//! package, parses the parts it understands into a typed model, indexes
//! everything else by identity, tracks which sheets a caller mutated, and on
//! save emits a package that is byte-identical to the original except where
//! those mutations require regeneration. Charts, drawings, images, macros,
//! unknown extension parts, the style indices of untouched sheets, and the
//! shared-strings table all survive a partial rewrite.
//!
//! # Quick start
//!
//! ```no_run
//! use xlpatch_core::{ARef, CellValue, Workbook};
//!
//! let mut wb = Workbook::open("report.xlsx")?;
//! wb.set_value("Sheet2", ARef::parse("A1")?, CellValue::Number(42.0))?;
//! // Sheets 1 and 3 are copied byte-for-byte; only sheet 2 is rebuilt.
//! wb.save("report-patched.xlsx")?;
//! # Ok::<(), xlpatch_core::Error>(())
//! ```

pub mod aref;
pub mod config;
pub mod error;
pub mod package;
pub mod rich_text;
pub mod sheet;
pub mod sst;
pub mod style;
pub mod style_index;
pub mod value;
pub mod vml;
pub mod workbook;

mod comment;
mod ws_writer;

pub use aref::{ARange, ARef};
pub use config::{Compression, Config, SstPolicy};
pub use error::{Error, Result};
pub use package::{PackageReader, PackageWriter, ReadResult};
pub use sheet::{Cell, ColProps, Comment, RowProps, Sheet, Table};
pub use style::{
    AlignSpec, BorderEdge, BorderSpec, CellStyle, FillSpec, FontSpec, HAlign, StyleRegistry,
    VAlign,
};
pub use rich_text::{RunFont, TextRun};
pub use sst::{SharedStrings, SstEntry};
pub use style_index::StyleIndex;
pub use value::{CellErrorKind, CellValue};
pub use workbook::Workbook;
pub use xlpatch_xml::workbook::SheetState;
