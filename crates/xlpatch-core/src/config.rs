//! Engine configuration.
//!
//! One record covers both directions: the reader consumes the security
//! limits, the writer the emission options. Defaults match what Excel
//! produces (shared strings on demand, DEFLATE output).

/// Shared-string emission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SstPolicy {
    /// Use the table iff the workbook's strings make it worthwhile.
    #[default]
    Auto,
    /// Always emit a shared-strings part and reference strings by index.
    Always,
    /// Always emit inline strings; no shared-strings part.
    Never,
}

/// Output compression for regenerated entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// DEFLATE level 1, matching Excel's own output.
    #[default]
    Deflated,
    /// Uncompressed entries with precomputed CRCs, for debugging.
    Stored,
}

/// Recognized engine options.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub sst_policy: SstPolicy,
    pub compression: Compression,
    /// Re-indent regenerated XML parts for human inspection. Costs byte
    /// stability against Excel-written files; determinism is unaffected.
    pub pretty_print: bool,
    /// Prefix text values starting with `=`, `+`, `-`, `@` with `'`.
    pub escape_formulas: bool,

    /// Maximum per-entry ratio of uncompressed to compressed size.
    pub max_compression_ratio: u64,
    /// Maximum total uncompressed size across all entries.
    pub max_uncompressed_size: u64,
    /// Maximum number of ZIP entries.
    pub max_entry_count: usize,
    /// Maximum number of cells per sheet.
    pub max_cell_count: u64,
    /// Maximum length of a single string value, in bytes.
    pub max_string_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sst_policy: SstPolicy::Auto,
            compression: Compression::Deflated,
            pretty_print: false,
            escape_formulas: false,
            max_compression_ratio: 100,
            max_uncompressed_size: 1 << 30,
            max_entry_count: 10_000,
            max_cell_count: 10_000_000,
            max_string_length: 32_767,
        }
    }
}
