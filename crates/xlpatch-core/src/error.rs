//! Error types for the xlpatch core library.
//!
//! Provides the [`Error`] enum covering all failure modes encountered when
//! reading, rewriting, and manipulating Excel workbooks. All public entry
//! points return [`Result`]; nothing is thrown across crate boundaries.

use thiserror::Error;

/// The top-level error type for xlpatch.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Cell reference errors =====
    /// The given string is not a valid A1-style cell reference.
    #[error("invalid cell reference: {0}")]
    InvalidCellReference(String),

    /// The row index is out of the allowed range (0..=1_048_575).
    #[error("invalid row index: {0}")]
    InvalidRowIndex(u32),

    /// The column index is out of the allowed range (0..=16_383).
    #[error("invalid column index: {0}")]
    InvalidColumnIndex(u32),

    // ===== Sheet errors =====
    /// No sheet with the given name exists in the workbook.
    #[error("sheet '{name}' does not exist")]
    SheetNotFound { name: String },

    /// A sheet with the given name already exists.
    #[error("sheet '{name}' already exists")]
    SheetAlreadyExists { name: String },

    /// The sheet name violates Excel naming rules.
    #[error("invalid sheet name: {0}")]
    InvalidSheetName(String),

    // ===== I/O errors =====
    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error originating from the ZIP layer.
    #[error("ZIP error: {0}")]
    Zip(String),

    /// An error encountered while parsing XML, with the part it came from.
    #[error("parse error in {location}: {message}")]
    Parse { location: String, message: String },

    // ===== Package errors =====
    /// The package is structurally unusable (missing required part,
    /// zero sheets, dangling sheet relationship).
    #[error("invalid workbook: {0}")]
    InvalidWorkbook(String),

    /// A configured security limit was exceeded, or the input attempted a
    /// forbidden XML construct.
    #[error("security violation: {0}")]
    Security(String),

    /// The source file changed between read and write.
    #[error("source file changed since it was read")]
    FingerprintMismatch,
}

impl Error {
    /// A [`Error::Parse`] with the part path attached.
    pub fn parse_in(location: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Parse {
            location: location.into(),
            message: message.to_string(),
        }
    }
}

/// A convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_cell_reference() {
        let err = Error::InvalidCellReference("XYZ0".to_string());
        assert_eq!(err.to_string(), "invalid cell reference: XYZ0");
    }

    #[test]
    fn test_error_display_sheet_not_found() {
        let err = Error::SheetNotFound {
            name: "Missing".to_string(),
        };
        assert_eq!(err.to_string(), "sheet 'Missing' does not exist");
    }

    #[test]
    fn test_error_display_parse() {
        let err = Error::parse_in("xl/worksheets/sheet1.xml", "unexpected EOF");
        assert_eq!(
            err.to_string(),
            "parse error in xl/worksheets/sheet1.xml: unexpected EOF"
        );
    }

    #[test]
    fn test_error_display_security() {
        let err = Error::Security("entry count 20000 exceeds limit 10000".to_string());
        assert_eq!(
            err.to_string(),
            "security violation: entry count 20000 exceeds limit 10000"
        );
    }

    #[test]
    fn test_error_display_fingerprint_mismatch() {
        assert_eq!(
            Error::FingerprintMismatch.to_string(),
            "source file changed since it was read"
        );
    }

    #[test]
    fn test_error_display_invalid_workbook() {
        let err = Error::InvalidWorkbook("workbook has no sheets".to_string());
        assert_eq!(err.to_string(), "invalid workbook: workbook has no sheets");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
