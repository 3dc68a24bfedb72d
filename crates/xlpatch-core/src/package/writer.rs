//! Package writer.
//!
//! Chooses between three emission strategies:
//!
//! 1. no source context: full regeneration of every part;
//! 2. clean workbook written to a file: verbatim copy of the source file,
//!    guarded by a re-stat and a re-hash of its fingerprint;
//! 3. otherwise: one unified hybrid path that regenerates the structural
//!    parts, the styles, the shared strings (when touched), and the modified
//!    sheets, while copying every other entry byte-for-byte from the source
//!    package (compression method, sizes, and CRC replicated).
//!
//! Entries are emitted in canonical order: structural parts, styles, shared
//! strings, sheets (with their comments, VML, and rels), tables, then
//! preserved parts in manifest order. Regenerated entries carry the epoch
//! DOS timestamp and DEFLATE level 1, matching Excel's own output.

use std::collections::{BTreeSet, HashSet};
use std::io::{Cursor, Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use xlpatch_xml::content_types::{mime_types, ContentTypes};
use xlpatch_xml::relationships::{package_rels, rel_types, Relationships};
use xlpatch_xml::styles::default_styles;
use xlpatch_xml::table::{
    write_table, TableAutoFilter, TableColumn, TableColumns, TableStyleInfo, TableXml,
};
use xlpatch_xml::sink::{WriterSink, XmlSink};
use xlpatch_xml::workbook::SheetRef;
use xlpatch_xml::XML_DECLARATION;

use crate::config::{Compression, Config, SstPolicy};
use crate::error::{Error, Result};
use crate::package::paths::{
    relationship_part_path, relative_relationship_target, resolve_relationship_target,
};
use crate::package::source::{PackageOrigin, SourceFingerprint};
use crate::sheet::{Sheet, Table};
use crate::sst::SharedStrings;
use crate::style_index::StyleIndex;
use crate::value::CellValue;
use crate::vml;
use crate::workbook::Workbook;
use crate::ws_writer::{escape_formula_text, serialize_worksheet, WorksheetEmit};

impl Workbook {
    /// Save to a file with default options.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        PackageWriter::new(Config::default()).write_path(self, path.as_ref())
    }

    /// Save to a file with explicit options.
    pub fn save_with<P: AsRef<Path>>(&self, path: P, config: Config) -> Result<()> {
        PackageWriter::new(config).write_path(self, path.as_ref())
    }

    /// Serialize to an in-memory `.xlsx` buffer with default options.
    pub fn save_to_buffer(&self) -> Result<Vec<u8>> {
        PackageWriter::new(Config::default()).write_buffer(self)
    }

    /// Serialize to an in-memory `.xlsx` buffer with explicit options.
    pub fn save_to_buffer_with(&self, config: Config) -> Result<Vec<u8>> {
        PackageWriter::new(config).write_buffer(self)
    }
}

/// The writing half of the engine.
pub struct PackageWriter {
    config: Config,
}

/// One table part scheduled for emission.
struct TablePlan {
    path: String,
    rid: String,
    /// `Some` regenerates the part; `None` copies it verbatim from source.
    xml: Option<TableXml>,
}

/// Everything one sheet's emission needs, resolved up front.
struct SheetPlan {
    out_path: String,
    serialize: bool,
    rels: Option<Relationships>,
    comments_path: Option<String>,
    vml_path: Option<String>,
    vml_generate: bool,
    legacy_drawing_rid: Option<String>,
    tables: Vec<TablePlan>,
    /// Source paths this sheet's plan replaces or drops; never copied by the
    /// preserved-parts sweep.
    suppressed: Vec<String>,
}

impl PackageWriter {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Write to a file, taking the verbatim-copy fast path for a clean
    /// file-backed workbook.
    pub fn write_path(&self, workbook: &Workbook, target: &Path) -> Result<()> {
        if workbook.is_clean() {
            if let Some(source) = &workbook.source {
                match &source.origin {
                    PackageOrigin::Path(p) => {
                        return self.verbatim_copy(p, target, &source.fingerprint)
                    }
                    PackageOrigin::Buffer(bytes) => {
                        std::fs::write(target, bytes)?;
                        return Ok(());
                    }
                }
            }
        }
        let bytes = self.write_package(workbook)?;
        std::fs::write(target, bytes)?;
        Ok(())
    }

    /// Write to an in-memory buffer.
    pub fn write_buffer(&self, workbook: &Workbook) -> Result<Vec<u8>> {
        if workbook.is_clean() {
            if let Some(source) = &workbook.source {
                match &source.origin {
                    PackageOrigin::Buffer(bytes) => return Ok(bytes.to_vec()),
                    PackageOrigin::Path(p) => {
                        let data = std::fs::read(p)?;
                        if SourceFingerprint::of_bytes(&data) != source.fingerprint {
                            return Err(Error::FingerprintMismatch);
                        }
                        return Ok(data);
                    }
                }
            }
        }
        self.write_package(workbook)
    }

    /// Byte-for-byte file copy, hashing while copying. A partial target is
    /// removed when the source no longer matches its fingerprint.
    fn verbatim_copy(
        &self,
        source: &Path,
        target: &Path,
        fingerprint: &SourceFingerprint,
    ) -> Result<()> {
        let meta = std::fs::metadata(source)?;
        if meta.len() != fingerprint.size {
            return Err(Error::FingerprintMismatch);
        }

        let mut reader = std::fs::File::open(source)?;
        let mut writer = std::fs::File::create(target)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        let copy = loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) => break Err(Error::Io(e)),
            };
            hasher.update(&buf[..n]);
            if let Err(e) = writer.write_all(&buf[..n]) {
                break Err(Error::Io(e));
            }
        };
        drop(writer);

        if copy.is_err() || <[u8; 32]>::from(hasher.finalize()) != fingerprint.digest {
            let _ = std::fs::remove_file(target);
            return copy.and(Err(Error::FingerprintMismatch));
        }
        Ok(())
    }

    /// The unified regeneration path. Without a source every sheet is
    /// treated as modified and the preserved-parts set is empty.
    fn write_package(&self, workbook: &Workbook) -> Result<Vec<u8>> {
        if workbook.sheets.is_empty() {
            return Err(Error::InvalidWorkbook("workbook has no sheets".to_string()));
        }

        // Source bytes, re-read and re-verified.
        let source_bytes: Option<Vec<u8>> = match workbook.source.as_ref().map(|s| &s.origin) {
            Some(PackageOrigin::Path(p)) => {
                let data = std::fs::read(p)?;
                if SourceFingerprint::of_bytes(&data)
                    != workbook.source.as_ref().expect("source checked").fingerprint
                {
                    return Err(Error::FingerprintMismatch);
                }
                Some(data)
            }
            Some(PackageOrigin::Buffer(b)) => Some(b.to_vec()),
            None => None,
        };
        let mut source_archive = match source_bytes.as_deref() {
            Some(bytes) => Some(
                ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::Zip(e.to_string()))?,
            ),
            None => None,
        };

        let has_source = source_archive.is_some();
        let tracker = workbook.source.as_ref().map(|s| &s.tracker);
        let manifest = workbook.source.as_ref().map(|s| &s.manifest);

        // Sheets that get serialized: the tracked modifications plus any
        // sheet with no source part (added in memory). No source: all.
        let serialize_set: BTreeSet<usize> = if has_source {
            let mut set: BTreeSet<usize> =
                tracker.map(|t| t.modified_sheets().collect()).unwrap_or_default();
            for (i, preserved) in workbook.preserved_sheets.iter().enumerate() {
                if preserved.is_none() {
                    set.insert(i);
                }
            }
            set
        } else {
            (0..workbook.sheets.len()).collect()
        };
        let deleted_at_read = tracker.map(|t| t.deleted_sheets()).unwrap_or_default();

        // ===== Shared strings =====
        let mut sst = workbook.sst.clone();
        if has_source {
            // Serialized sheets re-intern their strings below; drop their
            // source reference counts first so they are not counted twice.
            for &i in &serialize_set {
                if let Some(preserved) = workbook.preserved_sheets[i].as_ref() {
                    let refs = preserved
                        .sheet_data
                        .rows
                        .iter()
                        .flat_map(|r| &r.cells)
                        .filter(|c| c.t.as_deref() == Some("s"))
                        .count() as u64;
                    sst.discount_refs(refs);
                }
            }
        }
        for &i in &serialize_set {
            intern_sheet_strings(&mut sst, &workbook.sheets[i], self.config.escape_formulas);
        }

        let any_copied_sheet = (0..workbook.sheets.len()).any(|i| !serialize_set.contains(&i));
        let source_has_sst = manifest
            .map(|m| m.contains("xl/sharedStrings.xml"))
            .unwrap_or(false);
        // Copied sheets keep their SST indices, so the table must stay.
        let use_sst = if any_copied_sheet && source_has_sst && !sst.is_empty() {
            true
        } else {
            match self.config.sst_policy {
                SstPolicy::Always => !sst.is_empty(),
                SstPolicy::Never => false,
                SstPolicy::Auto => sst.should_use_sst(),
            }
        };
        let sst_verbatim = use_sst && source_has_sst && !sst.has_new_entries();

        // ===== Styles =====
        let style_index = if has_source {
            let source_styles = workbook.source_styles.clone().unwrap_or_else(default_styles);
            StyleIndex::build_preserving(source_styles, &workbook.sheets, &serialize_set)
        } else {
            StyleIndex::build_full(&workbook.sheets)
        };

        // ===== Workbook part =====
        let mut workbook_part = workbook.workbook_part.clone();
        let old_refs = workbook_part.sheets.clone();
        let mut next_sheet_id = old_refs.iter().map(|r| r.sheet_id).max().unwrap_or(0) + 1;
        workbook_part.sheets = workbook
            .sheets
            .iter()
            .enumerate()
            .map(|(i, sheet)| {
                let sheet_id = match old_refs.iter().find(|r| r.name == sheet.name()) {
                    Some(r) => r.sheet_id,
                    None => {
                        let id = next_sheet_id;
                        next_sheet_id += 1;
                        id
                    }
                };
                SheetRef {
                    name: sheet.name().to_string(),
                    sheet_id,
                    rid: format!("rId{}", i + 1),
                    state: sheet.visibility(),
                }
            })
            .collect();

        let theme_present = manifest
            .map(|m| m.contains("xl/theme/theme1.xml"))
            .unwrap_or(false);

        // ===== Per-sheet plans =====
        let mut used_table_numbers: BTreeSet<u32> = BTreeSet::new();
        let mut used_table_ids: BTreeSet<u32> = BTreeSet::new();
        if let Some(m) = manifest {
            for entry in m.iter() {
                if let Some(n) = crate::package::manifest::numbered_part_index(
                    &entry.path,
                    "xl/tables/table",
                    ".xml",
                ) {
                    used_table_numbers.insert(n as u32);
                }
            }
        }
        for sheet in &workbook.sheets {
            for (_, xml) in &sheet.preserved_tables {
                used_table_ids.insert(xml.id);
            }
        }
        let mut used_comment_numbers: BTreeSet<u32> = BTreeSet::new();
        let mut used_vml_numbers: BTreeSet<u32> = BTreeSet::new();
        if let Some(m) = manifest {
            for entry in m.iter() {
                if let Some(n) = crate::package::manifest::numbered_part_index(
                    &entry.path,
                    "xl/comments",
                    ".xml",
                ) {
                    used_comment_numbers.insert(n as u32);
                }
                if let Some(n) = crate::package::manifest::numbered_part_index(
                    &entry.path,
                    "xl/drawings/vmlDrawing",
                    ".vml",
                ) {
                    used_vml_numbers.insert(n as u32);
                }
            }
        }

        let mut plans: Vec<SheetPlan> = Vec::with_capacity(workbook.sheets.len());
        for (i, sheet) in workbook.sheets.iter().enumerate() {
            let out_path = format!("xl/worksheets/sheet{}.xml", i + 1);
            if !serialize_set.contains(&i) {
                // Copied verbatim; tables come along as verbatim copies too.
                let tables = sheet
                    .preserved_tables
                    .iter()
                    .map(|(path, _)| TablePlan {
                        path: path.clone(),
                        rid: String::new(),
                        xml: None,
                    })
                    .collect();
                plans.push(SheetPlan {
                    out_path,
                    serialize: false,
                    rels: None,
                    comments_path: None,
                    vml_path: None,
                    vml_generate: false,
                    legacy_drawing_rid: None,
                    tables,
                    suppressed: Vec::new(),
                });
                continue;
            }

            plans.push(self.plan_serialized_sheet(
                workbook,
                i,
                sheet,
                out_path,
                &mut used_table_numbers,
                &mut used_table_ids,
                &mut used_comment_numbers,
                &mut used_vml_numbers,
            ));
        }

        // ===== Workbook relationships =====
        let mut workbook_rels = Relationships::empty();
        for i in 0..workbook.sheets.len() {
            workbook_rels.add(rel_types::WORKSHEET, &format!("worksheets/sheet{}.xml", i + 1));
        }
        workbook_rels.add(rel_types::STYLES, "styles.xml");
        if use_sst {
            workbook_rels.add(rel_types::SHARED_STRINGS, "sharedStrings.xml");
        }
        if theme_present {
            workbook_rels.add(rel_types::THEME, "theme/theme1.xml");
        }

        // ===== Preserved unparsed parts =====
        let suppressed: HashSet<&str> = plans
            .iter()
            .flat_map(|p| p.suppressed.iter().map(String::as_str))
            .collect();
        let graph = workbook.relgraph.clone().unwrap_or_default();
        let mut preserved_copies: Vec<String> = Vec::new();
        if let Some(m) = manifest {
            for entry in m.unparsed() {
                if suppressed.contains(entry.path.as_str()) {
                    continue;
                }
                // Parts serving a deleted sheet vanish with it. Parts
                // serving modified sheets are still copied: cell edits do
                // not invalidate drawings or media.
                let deps = graph.dependencies_for(&entry.path);
                if !deps.is_disjoint(&deleted_at_read) {
                    continue;
                }
                preserved_copies.push(entry.path.clone());
            }
        }

        // ===== Content types =====
        let mut content_types = workbook
            .source_content_types
            .clone()
            .unwrap_or_else(|| {
                let mut ct = ContentTypes::default();
                ct.overrides.clear();
                ct.set_override("/xl/workbook.xml", mime_types::WORKBOOK);
                ct
            });
        content_types.ensure_default("rels", mime_types::RELS);
        content_types.ensure_default("xml", mime_types::XML);
        content_types
            .overrides
            .retain(|o| o.content_type != mime_types::WORKSHEET);
        content_types
            .overrides
            .retain(|o| o.content_type != mime_types::TABLE);
        content_types
            .overrides
            .retain(|o| o.content_type != mime_types::COMMENTS);
        content_types.set_override("/xl/styles.xml", mime_types::STYLES);
        if use_sst {
            content_types.set_override("/xl/sharedStrings.xml", mime_types::SHARED_STRINGS);
        } else {
            content_types.remove_override("/xl/sharedStrings.xml");
        }
        if theme_present {
            content_types.set_override("/xl/theme/theme1.xml", mime_types::THEME);
        }
        let mut any_vml = false;
        for (i, plan) in plans.iter().enumerate() {
            content_types.set_override(&format!("/{}", plan.out_path), mime_types::WORKSHEET);
            for table in &plan.tables {
                content_types.set_override(&format!("/{}", table.path), mime_types::TABLE);
            }
            if plan.serialize {
                if let Some(ref path) = plan.comments_path {
                    content_types.set_override(&format!("/{path}"), mime_types::COMMENTS);
                }
                any_vml |= plan.vml_path.is_some();
            } else if let Some(rels) = workbook.sheet_rels[i].as_ref() {
                // Copied sheets keep their comment parts at source paths.
                let src_path = &workbook.source_sheet_paths[i];
                if let Some(rel) = rels.by_type(rel_types::COMMENTS) {
                    if let Some(path) = resolve_relationship_target(src_path, &rel.target) {
                        content_types.set_override(&format!("/{path}"), mime_types::COMMENTS);
                    }
                }
                any_vml |= rels.by_type(rel_types::VML_DRAWING).is_some();
            }
        }
        any_vml |= preserved_copies.iter().any(|p| p.ends_with(".vml"));
        if any_vml {
            content_types.ensure_default("vml", mime_types::VML_DRAWING);
        }

        // Overrides for parts that no longer exist (deleted sheets' leavings)
        // are filtered against the full set of output paths.
        let mut output_paths: HashSet<String> = HashSet::new();
        output_paths.insert("xl/workbook.xml".to_string());
        output_paths.insert("xl/styles.xml".to_string());
        if use_sst {
            output_paths.insert("xl/sharedStrings.xml".to_string());
        }
        for (i, plan) in plans.iter().enumerate() {
            output_paths.insert(plan.out_path.clone());
            for table in &plan.tables {
                output_paths.insert(table.path.clone());
            }
            if plan.serialize {
                if let Some(ref p) = plan.comments_path {
                    output_paths.insert(p.clone());
                }
                if let Some(ref p) = plan.vml_path {
                    output_paths.insert(p.clone());
                }
            } else if let Some(rels) = workbook.sheet_rels[i].as_ref() {
                let src_path = &workbook.source_sheet_paths[i];
                for rel in &rels.relationships {
                    if let Some(p) = resolve_relationship_target(src_path, &rel.target) {
                        output_paths.insert(p);
                    }
                }
            }
        }
        for p in &preserved_copies {
            output_paths.insert(p.clone());
        }
        content_types
            .overrides
            .retain(|o| output_paths.contains(o.part_name.trim_start_matches('/')));
        content_types.sort_canonical();

        // ===== Emission =====
        let mut out = Vec::new();
        {
            let cursor = Cursor::new(&mut out);
            let mut zip = ZipWriter::new(cursor);
            let options = self.entry_options();
            let mut written: HashSet<String> = HashSet::new();

            self.write_xml_entry(
                &mut zip,
                options,
                &mut written,
                "[Content_Types].xml",
                &serde_part(&content_types)?,
            )?;
            let mut pkg_rels = package_rels();
            pkg_rels.sort_canonical();
            self.write_xml_entry(
                &mut zip,
                options,
                &mut written,
                "_rels/.rels",
                &serde_part(&pkg_rels)?,
            )?;
            self.write_xml_entry(
                &mut zip,
                options,
                &mut written,
                "xl/workbook.xml",
                &workbook_part.to_xml_string(),
            )?;
            workbook_rels.sort_canonical();
            self.write_xml_entry(
                &mut zip,
                options,
                &mut written,
                "xl/_rels/workbook.xml.rels",
                &serde_part(&workbook_rels)?,
            )?;
            self.write_xml_entry(
                &mut zip,
                options,
                &mut written,
                "xl/styles.xml",
                &style_index.styles.to_xml_string(),
            )?;

            if use_sst {
                if sst_verbatim {
                    let archive = source_archive.as_mut().expect("source checked");
                    copy_entry(&mut zip, archive, "xl/sharedStrings.xml", "xl/sharedStrings.xml")?;
                    written.insert("xl/sharedStrings.xml".to_string());
                } else {
                    self.write_xml_entry(
                        &mut zip,
                        options,
                        &mut written,
                        "xl/sharedStrings.xml",
                        &sst.to_xml_string(),
                    )?;
                }
            }

            // Sheets, each with its comments, VML, and rels.
            for (i, plan) in plans.iter().enumerate() {
                if plan.serialize {
                    let sheet = &workbook.sheets[i];
                    let table_parts_xml = table_parts_element(&plan.tables);
                    let lookup = |local: u32| style_index.remap(i, local);
                    let xml = serialize_worksheet(&WorksheetEmit {
                        sheet,
                        preserved: workbook.preserved_sheets[i].as_ref(),
                        style_lookup: &lookup,
                        sst: use_sst.then_some(&sst),
                        table_parts_xml,
                        legacy_drawing_rid: plan.legacy_drawing_rid.clone(),
                        escape_formulas: self.config.escape_formulas,
                    });
                    self.write_xml_entry(&mut zip, options, &mut written, &plan.out_path, &xml)?;

                    if let Some(ref comments_path) = plan.comments_path {
                        let part = crate::comment::build_comments_part(sheet.comments());
                        self.write_xml_entry(
                            &mut zip,
                            options,
                            &mut written,
                            comments_path,
                            &serde_part(&part)?,
                        )?;
                    }
                    if let Some(ref vml_path) = plan.vml_path {
                        if plan.vml_generate {
                            let cells: Vec<crate::aref::ARef> =
                                sheet.comments().iter().map(|c| c.cell).collect();
                            let body = vml::build_vml_drawing(i, &cells);
                            self.write_raw_entry(
                                &mut zip,
                                options,
                                &mut written,
                                vml_path,
                                body.as_bytes(),
                            )?;
                        } else {
                            let archive = source_archive.as_mut().expect("source checked");
                            copy_entry(&mut zip, archive, vml_path, vml_path)?;
                            written.insert(vml_path.clone());
                        }
                    }
                    if let Some(ref rels) = plan.rels {
                        if !rels.relationships.is_empty() {
                            let mut rels = rels.clone();
                            rels.sort_canonical();
                            let rels_path = relationship_part_path(&plan.out_path);
                            self.write_xml_entry(
                                &mut zip,
                                options,
                                &mut written,
                                &rels_path,
                                &serde_part(&rels)?,
                            )?;
                        }
                    }
                } else {
                    // Verbatim sheet copy from the source package, with its
                    // rels, comments, and VML at their source paths.
                    let archive = source_archive.as_mut().expect("copied sheet has source");
                    let src_path = &workbook.source_sheet_paths[i];
                    copy_entry(&mut zip, archive, src_path, &plan.out_path)?;
                    written.insert(plan.out_path.clone());

                    let src_rels_path = relationship_part_path(src_path);
                    let out_rels_path = relationship_part_path(&plan.out_path);
                    if copy_entry_if_present(&mut zip, archive, &src_rels_path, &out_rels_path)? {
                        written.insert(out_rels_path);
                        written.insert(src_rels_path);
                    }
                    if let Some(rels) = workbook.sheet_rels[i].as_ref() {
                        for rel in &rels.relationships {
                            if rel.rel_type != rel_types::COMMENTS
                                && rel.rel_type != rel_types::VML_DRAWING
                            {
                                continue;
                            }
                            if let Some(path) = resolve_relationship_target(src_path, &rel.target)
                            {
                                if copy_entry_if_present(&mut zip, archive, &path, &path)? {
                                    written.insert(path);
                                }
                            }
                        }
                    }
                }
            }

            // Tables: regenerated for serialized sheets, copied for others.
            for plan in &plans {
                for table in &plan.tables {
                    match &table.xml {
                        Some(xml) => {
                            let mut buf = Vec::new();
                            {
                                let mut sink = WriterSink::new(&mut buf);
                                write_table(&mut sink, xml);
                                sink.into_inner();
                            }
                            let body = String::from_utf8(buf).expect("sink emits UTF-8");
                            self.write_xml_entry(
                                &mut zip,
                                options,
                                &mut written,
                                &table.path,
                                &body,
                            )?;
                        }
                        None => {
                            let archive = source_archive.as_mut().expect("copied table has source");
                            if copy_entry_if_present(&mut zip, archive, &table.path, &table.path)? {
                                written.insert(table.path.clone());
                            }
                        }
                    }
                }
            }

            // Everything else the source carried, byte for byte.
            if let Some(archive) = source_archive.as_mut() {
                for path in &preserved_copies {
                    if written.contains(path) {
                        continue;
                    }
                    copy_entry(&mut zip, archive, path, path)?;
                    written.insert(path.clone());
                }
            }

            zip.finish().map_err(|e| Error::Zip(e.to_string()))?;
        }
        Ok(out)
    }

    /// Resolve the relationships, comment/VML parts, and table parts of a
    /// sheet that will be serialized.
    #[allow(clippy::too_many_arguments)]
    fn plan_serialized_sheet(
        &self,
        workbook: &Workbook,
        index: usize,
        sheet: &Sheet,
        out_path: String,
        used_table_numbers: &mut BTreeSet<u32>,
        used_table_ids: &mut BTreeSet<u32>,
        used_comment_numbers: &mut BTreeSet<u32>,
        used_vml_numbers: &mut BTreeSet<u32>,
    ) -> SheetPlan {
        let src_path = workbook
            .source_sheet_paths
            .get(index)
            .filter(|p| !p.is_empty())
            .cloned();
        let mut rels = workbook.sheet_rels[index]
            .clone()
            .unwrap_or_else(Relationships::empty);
        let resolve_base = src_path.clone().unwrap_or_else(|| out_path.clone());
        let mut suppressed = Vec::new();

        // Comments and their VML indicator part.
        let mut comments_path = None;
        let mut vml_path = None;
        let mut vml_generate = false;
        let mut legacy_drawing_rid = None;
        if sheet.comments().is_empty() {
            for rel in rels.relationships.clone() {
                if rel.rel_type == rel_types::COMMENTS || rel.rel_type == rel_types::VML_DRAWING {
                    if let Some(path) = resolve_relationship_target(&resolve_base, &rel.target) {
                        suppressed.push(path);
                    }
                }
            }
            rels.relationships
                .retain(|r| r.rel_type != rel_types::COMMENTS && r.rel_type != rel_types::VML_DRAWING);
        } else {
            let path = rels
                .by_type(rel_types::COMMENTS)
                .and_then(|r| resolve_relationship_target(&resolve_base, &r.target))
                .unwrap_or_else(|| {
                    let n = next_free(used_comment_numbers, index as u32 + 1);
                    format!("xl/comments{n}.xml")
                });
            if rels.by_type(rel_types::COMMENTS).is_none() {
                let target = relative_relationship_target(&out_path, &path);
                rels.add(rel_types::COMMENTS, &target);
            }
            comments_path = Some(path);

            match rels.by_type(rel_types::VML_DRAWING) {
                Some(rel) => {
                    legacy_drawing_rid = Some(rel.id.clone());
                    vml_path = resolve_relationship_target(&resolve_base, &rel.target);
                    // The part will be copied as part of this sheet's plan.
                    if let Some(ref p) = vml_path {
                        suppressed.push(p.clone());
                    }
                }
                None => {
                    let n = next_free(used_vml_numbers, index as u32 + 1);
                    let path = format!("xl/drawings/vmlDrawing{n}.vml");
                    let target = relative_relationship_target(&out_path, &path);
                    let rid = rels.add(rel_types::VML_DRAWING, &target);
                    legacy_drawing_rid = Some(rid);
                    vml_path = Some(path);
                    vml_generate = true;
                }
            }
        }

        // Table parts: preserved ones keep their path and revision ids, new
        // ones get fresh numbers and name-derived uids.
        let mut tables = Vec::with_capacity(sheet.tables().len());
        for table in sheet.tables() {
            let preserved = sheet
                .preserved_tables
                .iter()
                .find(|(_, xml)| xml.name == table.name);
            let (path, xml) = match preserved {
                Some((path, src_xml)) => (path.clone(), rebuild_table_xml(src_xml, table)),
                None => {
                    let n = next_free(used_table_numbers, 1);
                    let id = next_free(used_table_ids, 1);
                    (format!("xl/tables/table{n}.xml"), new_table_xml(table, id))
                }
            };
            let rid = rels
                .relationships
                .iter()
                .find(|r| {
                    r.rel_type == rel_types::TABLE
                        && resolve_relationship_target(&resolve_base, &r.target).as_deref()
                            == Some(path.as_str())
                })
                .map(|r| r.id.clone())
                .unwrap_or_else(|| {
                    let target = relative_relationship_target(&out_path, &path);
                    rels.add(rel_types::TABLE, &target)
                });
            tables.push(TablePlan {
                path,
                rid,
                xml: Some(xml),
            });
        }

        SheetPlan {
            out_path,
            serialize: true,
            rels: Some(rels),
            comments_path,
            vml_path,
            vml_generate,
            legacy_drawing_rid,
            tables,
            suppressed,
        }
    }

    fn entry_options(&self) -> SimpleFileOptions {
        let options = SimpleFileOptions::default()
            .last_modified_time(zip::DateTime::default())
            .large_file(false);
        match self.config.compression {
            Compression::Deflated => options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(1)),
            Compression::Stored => options.compression_method(CompressionMethod::Stored),
        }
    }

    fn write_xml_entry<W: Write + std::io::Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        options: SimpleFileOptions,
        written: &mut HashSet<String>,
        name: &str,
        xml: &str,
    ) -> Result<()> {
        let body = if self.config.pretty_print {
            indent_xml(xml)
        } else {
            xml.to_string()
        };
        self.write_raw_entry(zip, options, written, name, body.as_bytes())
    }

    fn write_raw_entry<W: Write + std::io::Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        options: SimpleFileOptions,
        written: &mut HashSet<String>,
        name: &str,
        bytes: &[u8],
    ) -> Result<()> {
        zip.start_file(name, options)
            .map_err(|e| Error::Zip(e.to_string()))?;
        zip.write_all(bytes)?;
        written.insert(name.to_string());
        Ok(())
    }
}

/// Intern every string value of a sheet into the table, applying the
/// formula-injection escape first so emission-time lookups hit.
fn intern_sheet_strings(sst: &mut SharedStrings, sheet: &Sheet, escape: bool) {
    for (_, cell) in sheet.cells() {
        match &cell.value {
            CellValue::Text(text) => {
                sst.intern_text(&escape_formula_text(text, escape));
            }
            CellValue::RichText(runs) => {
                sst.intern_rich(runs);
            }
            _ => {}
        }
    }
}

/// Lowest number not yet in `used`, starting the scan at `hint`.
fn next_free(used: &mut BTreeSet<u32>, hint: u32) -> u32 {
    let mut n = hint.max(1);
    if let Some(&max) = used.iter().next_back() {
        n = n.max(max + 1);
    }
    while !used.insert(n) {
        n += 1;
    }
    n
}

/// The `<tableParts>` element for a serialized sheet, `None` without tables.
fn table_parts_element(tables: &[TablePlan]) -> Option<String> {
    if tables.is_empty() {
        return None;
    }
    let mut buf = Vec::new();
    {
        let mut sink = WriterSink::new(&mut buf);
        sink.start_element("tableParts");
        sink.attr("count", &tables.len().to_string());
        for table in tables {
            sink.start_element("tablePart");
            sink.attr("r:id", &table.rid);
            sink.end_element();
        }
        sink.end_element();
        sink.into_inner();
    }
    Some(String::from_utf8(buf).expect("sink emits UTF-8"))
}

/// Rebuild a table part from the domain record, keeping the source part's
/// id and revision uids (columns matched by name).
fn rebuild_table_xml(src: &TableXml, table: &Table) -> TableXml {
    let columns: Vec<TableColumn> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let preserved = src.table_columns.columns.iter().find(|c| c.name == *name);
            TableColumn {
                id: preserved.map(|c| c.id).unwrap_or(i as u32 + 1),
                xr3_uid: preserved
                    .and_then(|c| c.xr3_uid.clone())
                    .or_else(|| Some(table_uid(&format!("{}/{name}", table.name), "column"))),
                name: name.clone(),
                totals_row_function: preserved.and_then(|c| c.totals_row_function.clone()),
                totals_row_label: preserved.and_then(|c| c.totals_row_label.clone()),
            }
        })
        .collect();

    TableXml {
        id: src.id,
        xr_uid: src.xr_uid.clone(),
        name: table.name.clone(),
        display_name: table.display_name.clone(),
        reference: table.range.to_string(),
        header_row_count: src.header_row_count,
        totals_row_count: (table.totals_row_count > 0).then_some(table.totals_row_count),
        totals_row_shown: Some(table.totals_row_shown),
        auto_filter: if table.auto_filter {
            src.auto_filter.clone().or_else(|| {
                Some(TableAutoFilter {
                    reference: table.range.to_string(),
                    xr_uid: None,
                })
            })
        } else {
            None
        },
        table_columns: TableColumns {
            count: columns.len() as u32,
            columns,
        },
        table_style_info: table.style_name.as_ref().map(|name| TableStyleInfo {
            name: Some(name.clone()),
            ..src.table_style_info.clone().unwrap_or_default()
        }),
    }
}

/// A table part for a table created through the API.
fn new_table_xml(table: &Table, id: u32) -> TableXml {
    TableXml {
        id,
        xr_uid: Some(table_uid(&table.name, "table")),
        name: table.name.clone(),
        display_name: table.display_name.clone(),
        reference: table.range.to_string(),
        header_row_count: None,
        totals_row_count: (table.totals_row_count > 0).then_some(table.totals_row_count),
        totals_row_shown: Some(table.totals_row_shown),
        auto_filter: table.auto_filter.then(|| TableAutoFilter {
            reference: table.range.to_string(),
            xr_uid: Some(table_uid(&table.name, "autoFilter")),
        }),
        table_columns: TableColumns {
            count: table.columns.len() as u32,
            columns: table
                .columns
                .iter()
                .enumerate()
                .map(|(i, name)| TableColumn {
                    id: i as u32 + 1,
                    xr3_uid: Some(table_uid(&format!("{}/{name}", table.name), "column")),
                    name: name.clone(),
                    totals_row_function: None,
                    totals_row_label: None,
                })
                .collect(),
        },
        table_style_info: table.style_name.as_ref().map(|name| TableStyleInfo {
            name: Some(name.clone()),
            show_first_column: Some(false),
            show_last_column: Some(false),
            show_row_stripes: Some(true),
            show_column_stripes: Some(false),
        }),
    }
}

/// Name-derived revision uid in Excel's braced uppercase form. Derivation is
/// stable, so writing the same workbook twice yields identical bytes.
fn table_uid(name: &str, tag: &str) -> String {
    let uid = Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("xlpatch:{tag}:{name}").as_bytes(),
    );
    format!("{{{}}}", uid.to_string().to_uppercase())
}

fn serde_part<T: serde::Serialize>(value: &T) -> Result<String> {
    let body = quick_xml::se::to_string(value)
        .map_err(|e| Error::parse_in("<emission>", e))?;
    Ok(format!("{XML_DECLARATION}\n{body}"))
}

/// Copy one entry raw: stored bytes, compression method, and CRC replicated.
fn copy_entry<W: Write + std::io::Seek, R: Read + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    archive: &mut ZipArchive<R>,
    src_name: &str,
    dst_name: &str,
) -> Result<()> {
    let index = archive
        .index_for_name(src_name)
        .ok_or_else(|| Error::Zip(format!("missing source entry {src_name}")))?;
    let file = archive
        .by_index_raw(index)
        .map_err(|e| Error::Zip(e.to_string()))?;
    zip.raw_copy_file_rename(file, dst_name)
        .map_err(|e| Error::Zip(e.to_string()))?;
    Ok(())
}

fn copy_entry_if_present<W: Write + std::io::Seek, R: Read + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    archive: &mut ZipArchive<R>,
    src_name: &str,
    dst_name: &str,
) -> Result<bool> {
    if archive.index_for_name(src_name).is_none() {
        return Ok(false);
    }
    copy_entry(zip, archive, src_name, dst_name)?;
    Ok(true)
}

/// Re-indent a document for human inspection.
fn indent_xml(xml: &str) -> String {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut writer = quick_xml::Writer::new_with_indent(Vec::new(), b' ', 2);
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(event) => {
                if writer.write_event(event).is_err() {
                    return xml.to_string();
                }
            }
            Err(_) => return xml.to_string(),
        }
    }
    String::from_utf8(writer.into_inner()).unwrap_or_else(|_| xml.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aref::ARef;

    fn aref(s: &str) -> ARef {
        s.parse().unwrap()
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn entry_string(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut out = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_empty_workbook_layout() {
        let wb = Workbook::new();
        let bytes = wb.save_to_buffer().unwrap();
        let names = entry_names(&bytes);
        assert_eq!(
            names,
            vec![
                "[Content_Types].xml",
                "_rels/.rels",
                "xl/workbook.xml",
                "xl/_rels/workbook.xml.rels",
                "xl/styles.xml",
                "xl/worksheets/sheet1.xml",
            ]
        );
    }

    #[test]
    fn test_empty_workbook_styles_have_one_default_xf() {
        let wb = Workbook::new();
        let bytes = wb.save_to_buffer().unwrap();
        let styles = entry_string(&bytes, "xl/styles.xml");
        assert!(styles.contains("<cellXfs count=\"1\">"));
        assert!(styles.contains("cellStyle name=\"Normal\""));
    }

    #[test]
    fn test_single_cell_inline_string() {
        let mut wb = Workbook::new();
        wb.set_value("Sheet1", aref("B2"), CellValue::Text("hi".to_string()))
            .unwrap();
        let config = Config {
            sst_policy: SstPolicy::Never,
            ..Config::default()
        };
        let bytes = wb.save_to_buffer_with(config).unwrap();
        let sheet = entry_string(&bytes, "xl/worksheets/sheet1.xml");
        assert!(
            sheet.contains(r#"<c r="B2" t="inlineStr"><is><t>hi</t></is></c>"#),
            "{sheet}"
        );
        assert!(sheet.contains(r#"<dimension ref="B2"/>"#));
        assert!(!entry_names(&bytes).contains(&"xl/sharedStrings.xml".to_string()));
    }

    #[test]
    fn test_sst_policy_always() {
        let mut wb = Workbook::new();
        wb.set_value("Sheet1", aref("A1"), CellValue::Text("x".to_string()))
            .unwrap();
        let config = Config {
            sst_policy: SstPolicy::Always,
            ..Config::default()
        };
        let bytes = wb.save_to_buffer_with(config).unwrap();
        let sheet = entry_string(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<c r="A1" t="s"><v>0</v></c>"#), "{sheet}");
        let sst = entry_string(&bytes, "xl/sharedStrings.xml");
        assert!(sst.contains("<si><t>x</t></si>"));
        assert!(sst.contains("uniqueCount=\"1\""));
    }

    #[test]
    fn test_determinism_same_workbook_same_bytes() {
        let mut wb = Workbook::new();
        wb.set_value("Sheet1", aref("A1"), CellValue::Number(1.5))
            .unwrap();
        wb.set_value("Sheet1", aref("C3"), CellValue::Text("t".to_string()))
            .unwrap();
        wb.add_sheet("Two").unwrap();
        wb.set_value("Two", aref("B2"), CellValue::Bool(true)).unwrap();
        assert_eq!(wb.save_to_buffer().unwrap(), wb.save_to_buffer().unwrap());
    }

    #[test]
    fn test_workbook_part_lists_sheets_in_order() {
        let mut wb = Workbook::new();
        wb.add_sheet("Extra").unwrap();
        let bytes = wb.save_to_buffer().unwrap();
        let xml = entry_string(&bytes, "xl/workbook.xml");
        assert!(xml.contains(r#"<sheet name="Sheet1" sheetId="1" r:id="rId1"/>"#));
        assert!(xml.contains(r#"<sheet name="Extra" sheetId="2" r:id="rId2"/>"#));
    }

    #[test]
    fn test_comment_emission_produces_vml_and_rels() {
        let mut wb = Workbook::new();
        wb.set_comment(
            "Sheet1",
            crate::sheet::Comment {
                cell: aref("B2"),
                author: "Alice".to_string(),
                body: vec![crate::rich_text::TextRun::plain("note")],
                guid: None,
            },
        )
        .unwrap();
        let bytes = wb.save_to_buffer().unwrap();
        let names = entry_names(&bytes);
        assert!(names.contains(&"xl/comments1.xml".to_string()));
        assert!(names.contains(&"xl/drawings/vmlDrawing1.vml".to_string()));
        assert!(names.contains(&"xl/worksheets/_rels/sheet1.xml.rels".to_string()));

        let sheet = entry_string(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains("<legacyDrawing r:id=\"rId2\"/>"), "{sheet}");

        let rels = entry_string(&bytes, "xl/worksheets/_rels/sheet1.xml.rels");
        assert!(rels.contains("comments1.xml"));
        assert!(rels.contains("vmlDrawing1.vml"));

        let ct = entry_string(&bytes, "[Content_Types].xml");
        assert!(ct.contains("Extension=\"vml\""));
        assert!(ct.contains("/xl/comments1.xml"));
    }

    #[test]
    fn test_table_emission() {
        let mut wb = Workbook::new();
        wb.set_value("Sheet1", aref("A1"), CellValue::Text("Name".to_string()))
            .unwrap();
        wb.add_table(
            "Sheet1",
            Table {
                name: "Table1".to_string(),
                display_name: "Table1".to_string(),
                range: "A1:B4".parse().unwrap(),
                columns: vec!["Name".to_string(), "Amount".to_string()],
                totals_row_count: 0,
                totals_row_shown: false,
                style_name: Some("TableStyleMedium2".to_string()),
                auto_filter: true,
            },
        )
        .unwrap();
        let bytes = wb.save_to_buffer().unwrap();
        let names = entry_names(&bytes);
        assert!(names.contains(&"xl/tables/table1.xml".to_string()));

        let table = entry_string(&bytes, "xl/tables/table1.xml");
        assert!(table.contains("displayName=\"Table1\""));
        assert!(table.contains("xr:uid=\"{"));

        let sheet = entry_string(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains("<tableParts count=\"1\">"), "{sheet}");

        // Stable uids: two writes agree.
        assert_eq!(bytes, wb.save_to_buffer().unwrap());
    }

    #[test]
    fn test_table_uid_is_stable_and_braced() {
        let a = table_uid("Table1", "table");
        let b = table_uid("Table1", "table");
        assert_eq!(a, b);
        assert!(a.starts_with('{') && a.ends_with('}'));
        assert_eq!(a.len(), 38);
        assert_ne!(a, table_uid("Table2", "table"));
        assert_ne!(a, table_uid("Table1", "autoFilter"));
    }

    #[test]
    fn test_next_free_allocates_past_max() {
        let mut used = BTreeSet::from([1, 2, 5]);
        assert_eq!(next_free(&mut used, 1), 6);
        assert_eq!(next_free(&mut used, 1), 7);
        let mut empty = BTreeSet::new();
        assert_eq!(next_free(&mut empty, 3), 3);
    }

    #[test]
    fn test_stored_compression_option() {
        let mut wb = Workbook::new();
        wb.set_value("Sheet1", aref("A1"), CellValue::Number(1.0))
            .unwrap();
        let config = Config {
            compression: Compression::Stored,
            ..Config::default()
        };
        let bytes = wb.save_to_buffer_with(config).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let entry = archive.by_name("xl/workbook.xml").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Stored);
        assert_eq!(entry.size(), entry.compressed_size());
    }

    #[test]
    fn test_entry_mtime_is_epoch() {
        let wb = Workbook::new();
        let bytes = wb.save_to_buffer().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let entry = archive.by_name("xl/workbook.xml").unwrap();
        let mtime = entry.last_modified().unwrap();
        assert_eq!(mtime.year(), 1980);
        assert_eq!(mtime.month(), 1);
        assert_eq!(mtime.day(), 1);
    }

    #[test]
    fn test_pretty_print_indents() {
        let wb = Workbook::new();
        let config = Config {
            pretty_print: true,
            ..Config::default()
        };
        let bytes = wb.save_to_buffer_with(config).unwrap();
        let xml = entry_string(&bytes, "xl/workbook.xml");
        assert!(xml.contains("\n  <"), "{xml}");
    }

    #[test]
    fn test_indent_xml_roundtrip_safe() {
        let xml = r#"<?xml version="1.0"?><a><b x="1"/><c>t</c></a>"#;
        let out = indent_xml(xml);
        assert!(out.contains("<b x=\"1\"/>"));
        assert!(out.contains('\n'));
    }

    #[test]
    fn test_zero_sheets_rejected() {
        let mut wb = Workbook::new();
        // Bypass the API guard to simulate a degenerate model.
        wb.sheets.clear();
        wb.preserved_sheets.clear();
        wb.source_sheet_paths.clear();
        wb.sheet_rels.clear();
        assert!(matches!(
            wb.save_to_buffer(),
            Err(Error::InvalidWorkbook(_))
        ));
    }
}
