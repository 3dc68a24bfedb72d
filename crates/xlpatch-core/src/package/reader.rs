//! Package reader.
//!
//! Drives ZIP iteration, enforces the configured security limits, populates
//! the part manifest, dispatches known parts to their codecs, and binds the
//! resulting workbook to its origin via a [`SourceContext`].
//!
//! Parse order matters for cross-part references: workbook, shared strings,
//! styles, workbook relationships, then per-sheet worksheet XML followed by
//! that sheet's relationships, comments, and tables.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use xlpatch_xml::relationships::{rel_types, Relationships};
use xlpatch_xml::shared_strings::parse_sst;
use xlpatch_xml::styles::{default_styles, parse_styles, ParsedStyles};
use xlpatch_xml::workbook::parse_workbook;
use xlpatch_xml::worksheet::{cell_types, parse_worksheet, ParsedWorksheet};

use crate::aref::ARef;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::package::manifest::{PartEntry, PartKind, PartManifest};
use crate::package::paths::{relationship_part_path, resolve_relationship_target};
use crate::package::relgraph::RelationshipGraph;
use crate::package::source::{
    ModificationTracker, PackageOrigin, SourceContext, SourceFingerprint,
};
use crate::rich_text::{RunFont, TextRun};
use crate::sheet::{Sheet, Table};
use crate::sst::{SharedStrings, SstEntry};
use crate::style_index::{key_of_xf, style_from_xf};
use crate::value::{CellErrorKind, CellValue};
use crate::workbook::Workbook;

/// Successful read: the workbook plus non-fatal degradations.
#[derive(Debug)]
pub struct ReadResult {
    pub workbook: Workbook,
    pub warnings: Vec<String>,
}

impl Workbook {
    /// Open an `.xlsx` file with default limits, discarding warnings.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        PackageReader::new(Config::default())
            .read_path(path)
            .map(|r| r.workbook)
    }

    /// Open an `.xlsx` file, surfacing warnings.
    pub fn open_with<P: AsRef<Path>>(path: P, config: Config) -> Result<ReadResult> {
        PackageReader::new(config).read_path(path)
    }

    /// Open an in-memory `.xlsx` buffer with default limits.
    pub fn open_buffer(data: &[u8]) -> Result<Self> {
        PackageReader::new(Config::default())
            .read_buffer(data)
            .map(|r| r.workbook)
    }
}

/// The reading half of the engine.
pub struct PackageReader {
    config: Config,
}

impl PackageReader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Read from a file path; the source context retains the path.
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<ReadResult> {
        let data = std::fs::read(path.as_ref())?;
        let origin = PackageOrigin::Path(path.as_ref().to_path_buf());
        self.read(&data, origin)
    }

    /// Read from a buffer; the source context retains (shares) the bytes.
    pub fn read_buffer(&self, data: &[u8]) -> Result<ReadResult> {
        let origin = PackageOrigin::Buffer(Arc::from(data));
        self.read(data, origin)
    }

    fn read(&self, data: &[u8], origin: PackageOrigin) -> Result<ReadResult> {
        let fingerprint = SourceFingerprint::of_bytes(data);
        let mut archive = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| Error::Zip(e.to_string()))?;

        let mut manifest = self.scan_entries(&mut archive)?;
        let mut warnings = Vec::new();

        let mut workbook = self.parse_parts(&mut archive, &mut manifest, &mut warnings)?;

        let tracker = ModificationTracker::with_sheet_count(workbook.sheets.len());
        workbook.source = Some(SourceContext {
            origin,
            manifest,
            fingerprint,
            tracker,
        });
        Ok(ReadResult { workbook, warnings })
    }

    /// First pass: enforce container limits and populate the manifest in
    /// encounter order. All limit violations abort before any parse.
    fn scan_entries<R: Read + std::io::Seek>(
        &self,
        archive: &mut zip::ZipArchive<R>,
    ) -> Result<PartManifest> {
        if archive.len() > self.config.max_entry_count {
            return Err(Error::Security(format!(
                "entry count {} exceeds limit {}",
                archive.len(),
                self.config.max_entry_count
            )));
        }

        let mut manifest = PartManifest::new();
        let mut total_uncompressed: u64 = 0;

        for i in 0..archive.len() {
            let entry = archive
                .by_index_raw(i)
                .map_err(|e| Error::Zip(e.to_string()))?;
            if entry.is_dir() {
                continue;
            }
            let uncompressed = entry.size();
            let compressed = entry.compressed_size();

            total_uncompressed = total_uncompressed.saturating_add(uncompressed);
            if total_uncompressed > self.config.max_uncompressed_size {
                return Err(Error::Security(format!(
                    "total uncompressed size exceeds limit {}",
                    self.config.max_uncompressed_size
                )));
            }
            // Ratio checks only bite past a floor; tiny entries compress
            // arbitrarily well without being bombs.
            if uncompressed > 64 * 1024
                && compressed > 0
                && uncompressed / compressed > self.config.max_compression_ratio
            {
                return Err(Error::Security(format!(
                    "entry '{}' expands {}x, over the ratio limit {}",
                    entry.name(),
                    uncompressed / compressed,
                    self.config.max_compression_ratio
                )));
            }

            manifest.push(PartEntry {
                path: entry.name().to_string(),
                uncompressed_size: uncompressed,
                compressed_size: compressed,
                crc32: entry.crc32(),
                compression_method: entry.compression(),
                kind: PartKind::Unparsed,
            });
        }

        Ok(manifest)
    }

    /// Second pass: parse known parts in dependency order.
    fn parse_parts<R: Read + std::io::Seek>(
        &self,
        archive: &mut zip::ZipArchive<R>,
        manifest: &mut PartManifest,
        warnings: &mut Vec<String>,
    ) -> Result<Workbook> {
        // Content types are retained so overrides for preserved unknown
        // parts (drawings, charts, document properties) survive rewriting.
        let content_types_xml = self.read_required(archive, manifest, "[Content_Types].xml")?;
        xlpatch_xml::secure::check_xml(&content_types_xml)
            .map_err(|e| Error::parse_in("[Content_Types].xml", e))?;
        let content_types: xlpatch_xml::content_types::ContentTypes =
            quick_xml::de::from_str(&content_types_xml)
                .map_err(|e| Error::parse_in("[Content_Types].xml", e))?;

        // Package relationships are parsed for validation only; the part is
        // synthesized on write.
        let package_rels_xml = self.read_required(archive, manifest, "_rels/.rels")?;
        xlpatch_xml::secure::check_xml(&package_rels_xml)
            .map_err(|e| Error::parse_in("_rels/.rels", e))?;
        let _: Relationships = quick_xml::de::from_str(&package_rels_xml)
            .map_err(|e| Error::parse_in("_rels/.rels", e))?;

        let workbook_xml = self.read_required(archive, manifest, "xl/workbook.xml")?;
        let workbook_part = parse_workbook(&workbook_xml)
            .map_err(|e| Error::parse_in("xl/workbook.xml", e))?;
        if workbook_part.sheets.is_empty() {
            return Err(Error::InvalidWorkbook("workbook has no sheets".to_string()));
        }

        // Shared strings (optional).
        let sst = match self.read_optional(archive, manifest, "xl/sharedStrings.xml")? {
            Some(xml) => {
                let parsed =
                    parse_sst(&xml).map_err(|e| Error::parse_in("xl/sharedStrings.xml", e))?;
                for entry in &parsed.entries {
                    if entry.plain_text.len() > self.config.max_string_length {
                        return Err(Error::Security(format!(
                            "shared string of {} bytes exceeds limit {}",
                            entry.plain_text.len(),
                            self.config.max_string_length
                        )));
                    }
                }
                SharedStrings::from_parsed(&parsed)
            }
            None => {
                warnings.push("missing optional part xl/sharedStrings.xml".to_string());
                SharedStrings::new()
            }
        };

        // Styles (optional, defaults on absence).
        let styles = match self.read_optional(archive, manifest, "xl/styles.xml")? {
            Some(xml) => parse_styles(&xml).map_err(|e| Error::parse_in("xl/styles.xml", e))?,
            None => {
                warnings.push("missing optional part xl/styles.xml, using defaults".to_string());
                default_styles()
            }
        };

        if manifest.get("xl/theme/theme1.xml").is_none() {
            warnings.push("missing optional part xl/theme/theme1.xml".to_string());
        }

        // Workbook relationships locate the sheet parts.
        let workbook_rels_xml = self
            .read_optional(archive, manifest, "xl/_rels/workbook.xml.rels")?
            .ok_or_else(|| {
                Error::InvalidWorkbook("missing xl/_rels/workbook.xml.rels".to_string())
            })?;
        xlpatch_xml::secure::check_xml(&workbook_rels_xml)
            .map_err(|e| Error::parse_in("xl/_rels/workbook.xml.rels", e))?;
        let workbook_rels: Relationships = quick_xml::de::from_str(&workbook_rels_xml)
            .map_err(|e| Error::parse_in("xl/_rels/workbook.xml.rels", e))?;

        // Per-sheet parsing.
        let mut sheets = Vec::with_capacity(workbook_part.sheets.len());
        let mut preserved_sheets = Vec::with_capacity(workbook_part.sheets.len());
        let mut source_sheet_paths = Vec::with_capacity(workbook_part.sheets.len());
        let mut sheet_rels: Vec<Option<Relationships>> = Vec::new();
        let mut rels_by_owner: HashMap<String, Relationships> = HashMap::new();

        for sheet_ref in &workbook_part.sheets {
            let rel = workbook_rels
                .by_id(&sheet_ref.rid)
                .filter(|r| r.rel_type == rel_types::WORKSHEET)
                .ok_or_else(|| {
                    Error::InvalidWorkbook(format!(
                        "missing worksheet relationship for sheet '{}'",
                        sheet_ref.name
                    ))
                })?;
            let sheet_path = resolve_relationship_target("xl/workbook.xml", &rel.target)
                .ok_or_else(|| {
                    Error::InvalidWorkbook(format!(
                        "worksheet target '{}' escapes the package",
                        rel.target
                    ))
                })?;

            let ws_xml = self
                .read_optional(archive, manifest, &sheet_path)?
                .ok_or_else(|| {
                    Error::InvalidWorkbook(format!("missing worksheet part {sheet_path}"))
                })?;
            let preserved =
                parse_worksheet(&ws_xml).map_err(|e| Error::parse_in(&sheet_path, e))?;

            let mut sheet = Sheet::new(sheet_ref.name.clone());
            sheet.visibility = sheet_ref.state;
            self.populate_cells(&mut sheet, &preserved, &sst, &styles, &sheet_path)?;

            // Sheet relationships, comments, and tables.
            let rels_path = relationship_part_path(&sheet_path);
            let rels = match self.read_optional(archive, manifest, &rels_path)? {
                Some(xml) => {
                    xlpatch_xml::secure::check_xml(&xml)
                        .map_err(|e| Error::parse_in(&rels_path, e))?;
                    let rels: Relationships = quick_xml::de::from_str(&xml)
                        .map_err(|e| Error::parse_in(&rels_path, e))?;
                    Some(rels)
                }
                None => None,
            };

            if let Some(ref rels) = rels {
                if let Some(comment_rel) = rels.by_type(rel_types::COMMENTS) {
                    if let Some(comment_path) =
                        resolve_relationship_target(&sheet_path, &comment_rel.target)
                    {
                        if let Some(xml) =
                            self.read_optional(archive, manifest, &comment_path)?
                        {
                            sheet.comments =
                                crate::comment::parse_comments_part(&xml, &comment_path)?;
                        }
                    }
                }
                for table_rel in rels.all_of_type(rel_types::TABLE) {
                    let table_path = resolve_relationship_target(&sheet_path, &table_rel.target)
                        .ok_or_else(|| {
                            Error::InvalidWorkbook(format!(
                                "table target '{}' escapes the package",
                                table_rel.target
                            ))
                        })?;
                    let xml = self
                        .read_optional(archive, manifest, &table_path)?
                        .ok_or_else(|| {
                            Error::InvalidWorkbook(format!("missing table part {table_path}"))
                        })?;
                    let table_xml = xlpatch_xml::table::parse_table(&xml)
                        .map_err(|e| Error::parse_in(&table_path, e))?;
                    sheet.tables.push(domain_table(&table_xml, &table_path)?);
                    sheet.preserved_tables.push((table_path, table_xml));
                }
                rels_by_owner.insert(sheet_path.clone(), rels.clone());
            }

            source_sheet_paths.push(sheet_path);
            preserved_sheets.push(Some(preserved));
            sheet_rels.push(rels);
            sheets.push(sheet);
        }

        rels_by_owner.insert("xl/workbook.xml".to_string(), workbook_rels);
        let graph = RelationshipGraph::build(
            manifest,
            &source_sheet_paths
                .iter()
                .enumerate()
                .map(|(i, p)| (i, p.clone()))
                .collect::<Vec<_>>(),
            &rels_by_owner,
        );

        Ok(Workbook {
            sheets,
            source: None,
            workbook_part,
            preserved_sheets,
            sst,
            source_styles: Some(styles),
            source_content_types: Some(content_types),
            relgraph: Some(graph),
            source_sheet_paths,
            sheet_rels,
        })
    }

    /// Decode the cells of one sheet into the domain model. Individual bad
    /// cells are collected and surfaced as one joined parse error.
    fn populate_cells(
        &self,
        sheet: &mut Sheet,
        preserved: &ParsedWorksheet,
        sst: &SharedStrings,
        styles: &ParsedStyles,
        location: &str,
    ) -> Result<()> {
        let mut problems: Vec<String> = Vec::new();
        let mut cell_count: u64 = 0;

        for row in &preserved.sheet_data.rows {
            for cell in &row.cells {
                cell_count += 1;
                if cell_count > self.config.max_cell_count {
                    return Err(Error::Security(format!(
                        "sheet cell count exceeds limit {}",
                        self.config.max_cell_count
                    )));
                }

                let at: ARef = match cell.r.parse() {
                    Ok(at) => at,
                    Err(_) => {
                        problems.push(format!("bad cell reference '{}'", cell.r));
                        continue;
                    }
                };

                let mut value = match self.decode_value(cell, sst, &mut problems) {
                    Some(v) => v,
                    None => continue,
                };

                if let CellValue::Text(ref s) = value {
                    if s.len() > self.config.max_string_length {
                        return Err(Error::Security(format!(
                            "cell {} string of {} bytes exceeds limit {}",
                            at,
                            s.len(),
                            self.config.max_string_length
                        )));
                    }
                }

                let mut style_id = None;
                if let Some(s) = cell.s {
                    match styles.cell_xfs.xfs.get(s as usize) {
                        Some(xf) => {
                            let key = key_of_xf(styles, xf);
                            let style = style_from_xf(styles, xf);
                            style_id = Some(sheet.styles.register_with_key(style, key));
                        }
                        // Out-of-range style index degrades the cell.
                        None => value = CellValue::Error(CellErrorKind::Ref),
                    }
                }

                if !value.is_empty() || style_id.is_some() {
                    sheet.set_value(at, value);
                    sheet.set_local_style_id(at, style_id);
                }
            }
        }

        if let Some(ref merges) = preserved.merge_cells {
            for m in &merges.merge_cells {
                match m.reference.parse() {
                    Ok(range) => sheet.merges.push(range),
                    Err(_) => problems.push(format!("bad merge range '{}'", m.reference)),
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::parse_in(location, problems.join("; ")))
        }
    }

    /// Cell-type dispatch. `None` marks a problem already recorded.
    fn decode_value(
        &self,
        cell: &xlpatch_xml::worksheet::Cell,
        sst: &SharedStrings,
        problems: &mut Vec<String>,
    ) -> Option<CellValue> {
        // A formula wins regardless of the type attribute; the cached value
        // is typed by `t`.
        if let Some(ref f) = cell.f {
            let expr = f.value.clone().unwrap_or_default();
            let cached = cell.v.as_ref().map(|v| {
                Box::new(match cell.t.as_deref() {
                    Some(cell_types::FORMULA_STRING) => CellValue::Text(v.clone()),
                    Some(cell_types::BOOLEAN) => CellValue::Bool(v == "1"),
                    Some(cell_types::ERROR) => CellValue::Error(
                        CellErrorKind::parse(v).unwrap_or(CellErrorKind::Value),
                    ),
                    _ => v
                        .parse::<f64>()
                        .map(CellValue::Number)
                        .unwrap_or_else(|_| CellValue::Text(v.clone())),
                })
            });
            return Some(CellValue::Formula { expr, cached });
        }

        match cell.t.as_deref() {
            None | Some("") | Some(cell_types::NUMBER) => match cell.v {
                None => Some(CellValue::Empty),
                Some(ref v) => match v.parse::<f64>() {
                    Ok(n) => Some(CellValue::Number(n)),
                    Err(_) => {
                        problems.push(format!("cell {} has non-numeric value '{v}'", cell.r));
                        None
                    }
                },
            },
            Some(cell_types::SHARED_STRING) => {
                let index = cell.v.as_ref().and_then(|v| v.parse::<usize>().ok());
                match index.and_then(|i| sst.get(i)) {
                    Some(SstEntry::Text(s)) => Some(CellValue::Text(s.clone())),
                    Some(SstEntry::Rich(runs)) => Some(CellValue::RichText(runs.clone())),
                    // Out-of-range index degrades, the read continues.
                    None => Some(CellValue::Error(CellErrorKind::Ref)),
                }
            }
            Some(cell_types::BOOLEAN) => Some(CellValue::Bool(
                cell.v.as_deref().map(|v| v == "1").unwrap_or(false),
            )),
            Some(cell_types::ERROR) => Some(CellValue::Error(
                cell.v
                    .as_deref()
                    .and_then(CellErrorKind::parse)
                    .unwrap_or(CellErrorKind::Value),
            )),
            Some(cell_types::INLINE_STRING) => {
                let Some(ref is) = cell.is else {
                    return Some(CellValue::Empty);
                };
                if is.r.is_empty() {
                    Some(CellValue::Text(
                        is.t.as_ref().map(|t| t.value.clone()).unwrap_or_default(),
                    ))
                } else {
                    // Any run present makes the cell rich text.
                    Some(CellValue::RichText(
                        is.r.iter()
                            .map(|run| TextRun {
                                text: run.t.value.clone(),
                                font: run
                                    .r_pr
                                    .as_ref()
                                    .map(RunFont::from_props)
                                    .filter(|f| !f.is_default()),
                                raw_rpr_xml: None,
                            })
                            .collect(),
                    ))
                }
            }
            Some(cell_types::FORMULA_STRING) => Some(CellValue::Text(
                cell.v.clone().unwrap_or_default(),
            )),
            Some(other) => {
                problems.push(format!("cell {} has unknown type '{other}'", cell.r));
                None
            }
        }
    }

    fn read_required<R: Read + std::io::Seek>(
        &self,
        archive: &mut zip::ZipArchive<R>,
        manifest: &mut PartManifest,
        path: &str,
    ) -> Result<String> {
        self.read_optional(archive, manifest, path)?
            .ok_or_else(|| Error::InvalidWorkbook(format!("missing required part {path}")))
    }

    fn read_optional<R: Read + std::io::Seek>(
        &self,
        archive: &mut zip::ZipArchive<R>,
        manifest: &mut PartManifest,
        path: &str,
    ) -> Result<Option<String>> {
        if !manifest.contains(path) {
            return Ok(None);
        }
        let mut entry = match archive.by_name(path) {
            Ok(e) => e,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(Error::Zip(e.to_string())),
        };
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| Error::parse_in(path, format!("not valid UTF-8: {e}")))?;
        manifest.mark_parsed(path);
        Ok(Some(content))
    }
}

/// Convert a parsed table part into the domain record.
fn domain_table(xml: &xlpatch_xml::table::TableXml, location: &str) -> Result<Table> {
    Ok(Table {
        name: xml.name.clone(),
        display_name: xml.display_name.clone(),
        range: xml
            .reference
            .parse()
            .map_err(|_| Error::parse_in(location, format!("bad table ref '{}'", xml.reference)))?,
        columns: xml
            .table_columns
            .columns
            .iter()
            .map(|c| c.name.clone())
            .collect(),
        totals_row_count: xml.totals_row_count.unwrap_or(0),
        totals_row_shown: xml.totals_row_shown.unwrap_or(false),
        style_name: xml.table_style_info.as_ref().and_then(|i| i.name.clone()),
        auto_filter: xml.auto_filter.is_some(),
    })
}
