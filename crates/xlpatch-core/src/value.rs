//! Cell value representation.
//!
//! Provides the [`CellValue`] enum which represents the typed value of a
//! single cell in a worksheet, plus Excel serial-date conversion.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::rich_text::TextRun;

/// Epoch of the 1900 date system. Serial 1 is 1900-01-01; the offset of two
/// days absorbs Lotus 1-2-3's phantom 1900-02-29.
fn excel_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("static date")
}

/// Represents the value of a cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// No value (empty cell, possibly styled).
    #[default]
    Empty,
    /// Numeric value (integers are stored as f64 in Excel).
    Number(f64),
    /// Boolean value.
    Bool(bool),
    /// Plain string value.
    Text(String),
    /// Formatted text composed of runs.
    RichText(Vec<TextRun>),
    /// Formula with optional cached result.
    Formula {
        expr: String,
        cached: Option<Box<CellValue>>,
    },
    /// Error value (e.g. #DIV/0!, #N/A, #VALUE!).
    Error(CellErrorKind),
    /// Date-time, stored as a calendar value and serialized as a serial day.
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Whether the cell carries no value at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// The Excel serial-day representation of a [`CellValue::DateTime`].
    pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
        let delta = *dt - excel_epoch().and_hms_opt(0, 0, 0).expect("static time");
        delta.num_seconds() as f64 / 86_400.0
    }

    /// Build a [`NaiveDateTime`] from an Excel serial day, `None` when the
    /// serial falls outside chrono's representable range.
    pub fn datetime_from_serial(serial: f64) -> Option<NaiveDateTime> {
        let seconds = (serial * 86_400.0).round() as i64;
        excel_epoch()
            .and_hms_opt(0, 0, 0)
            .expect("static time")
            .checked_add_signed(Duration::seconds(seconds))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => write!(f, ""),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::RichText(runs) => {
                for run in runs {
                    write!(f, "{}", run.text)?;
                }
                Ok(())
            }
            CellValue::Formula { expr, cached } => {
                if let Some(cached) = cached {
                    write!(f, "{cached}")
                } else {
                    write!(f, "={expr}")
                }
            }
            CellValue::Error(e) => write!(f, "{}", e.as_str()),
            CellValue::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(f64::from(n))
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::DateTime(dt)
    }
}

/// The Excel error literals, plus nothing else: an undecodable error code is
/// downgraded to [`CellErrorKind::Value`] by the reader rather than failing
/// the parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellErrorKind {
    /// `#DIV/0!`
    Div0,
    /// `#N/A`
    NA,
    /// `#NAME?`
    Name,
    /// `#NULL!`
    Null,
    /// `#NUM!`
    Num,
    /// `#REF!` — also used as the substitution marker for out-of-range
    /// shared-string or style indices.
    Ref,
    /// `#VALUE!`
    Value,
}

impl CellErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellErrorKind::Div0 => "#DIV/0!",
            CellErrorKind::NA => "#N/A",
            CellErrorKind::Name => "#NAME?",
            CellErrorKind::Null => "#NULL!",
            CellErrorKind::Num => "#NUM!",
            CellErrorKind::Ref => "#REF!",
            CellErrorKind::Value => "#VALUE!",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "#DIV/0!" => Some(CellErrorKind::Div0),
            "#N/A" => Some(CellErrorKind::NA),
            "#NAME?" => Some(CellErrorKind::Name),
            "#NULL!" => Some(CellErrorKind::Null),
            "#NUM!" => Some(CellErrorKind::Num),
            "#REF!" => Some(CellErrorKind::Ref),
            "#VALUE!" => Some(CellErrorKind::Value),
            _ => None,
        }
    }
}
