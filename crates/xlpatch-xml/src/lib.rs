//! xlpatch-xml: Low-level XML parsing and serialization for Office Open XML
//! spreadsheet packages.
//!
//! This crate provides Rust structures for the OOXML Excel part schemas,
//! with serde-based serialization and deserialization via quick-xml, plus
//! the pieces a lossless rewriter needs on top of serde:
//!
//! - [`namespaces`] - OOXML namespace URI constants
//! - [`secure`] - hardened parse entry point (DTD/entity rejection)
//! - [`sink`] - deterministic XML emission with namespace-first attributes
//! - [`fragment`] - opaque child-element capture for round-tripping
//! - [`content_types`] - `[Content_Types].xml` structures
//! - [`relationships`] - Relationships (`.rels`) structures
//! - [`workbook`] - `xl/workbook.xml` structures
//! - [`worksheet`] - `xl/worksheets/sheet*.xml` structures
//! - [`styles`] - `xl/styles.xml` structures
//! - [`shared_strings`] - `xl/sharedStrings.xml` structures
//! - [`comments`] - `xl/comments*.xml` structures
//! - [`table`] - `xl/tables/table*.xml` structures

pub mod comments;
pub mod content_types;
pub mod fragment;
pub mod namespaces;
pub mod relationships;
pub mod secure;
pub mod shared_strings;
pub mod sink;
pub mod styles;
pub mod table;
pub mod workbook;
pub mod worksheet;

/// XML declaration prepended to every XML part in the package.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
