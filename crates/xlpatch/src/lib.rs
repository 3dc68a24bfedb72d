//! xlpatch: surgical read-modify-write for Excel (.xlsx) files.
//!
//! Open a workbook, change what you need, save: parts untouched by your
//! changes are copied byte-for-byte from the source package, so charts,
//! drawings, macros, and the formatting of other sheets survive intact.
//!
//! # Quick Start
//!
//! ```no_run
//! use xlpatch::{ARef, CellValue, Workbook};
//!
//! let mut wb = Workbook::open("input.xlsx").unwrap();
//! wb.set_value("Sheet1", ARef::parse("B2").unwrap(), CellValue::Number(42.0))
//!     .unwrap();
//! wb.save("output.xlsx").unwrap();
//! ```

pub use xlpatch_core::error::{Error, Result};
pub use xlpatch_core::{
    ARange, ARef, Cell, CellErrorKind, CellStyle, CellValue, ColProps, Comment, Compression,
    Config, PackageReader, PackageWriter, ReadResult, RowProps, RunFont, Sheet, SheetState,
    SstPolicy, Table, TextRun, Workbook,
};

/// Style building blocks.
pub mod style {
    pub use xlpatch_core::{
        AlignSpec, BorderEdge, BorderSpec, CellStyle, FillSpec, FontSpec, HAlign, VAlign,
    };
}
