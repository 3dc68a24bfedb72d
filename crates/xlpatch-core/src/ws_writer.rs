//! Worksheet serialization.
//!
//! Merges the domain cells of a sheet with the preserved metadata of its
//! source part: opaque fragments are spliced back in schema order around the
//! regenerated `sheetData`, `dimension`, and `mergeCells`; preserved row
//! attributes survive under replaced cells; rows that exist only in the
//! source (empty) or only as domain row properties are still emitted.

use std::collections::BTreeMap;

use xlpatch_xml::shared_strings::{needs_space_preserve, write_t};
use xlpatch_xml::sink::{WriterSink, XmlSink};
use xlpatch_xml::worksheet::{
    cell_types, child_order_index, default_root, ParsedWorksheet, Row,
};

use crate::rich_text::fmt_float;
use crate::sheet::Sheet;
use crate::sst::SharedStrings;
use crate::value::CellValue;

/// Everything one worksheet emission needs.
pub(crate) struct WorksheetEmit<'a> {
    pub sheet: &'a Sheet,
    pub preserved: Option<&'a ParsedWorksheet>,
    /// Sheet-local style id to workbook-wide `cellXfs` index.
    pub style_lookup: &'a dyn Fn(u32) -> Option<u32>,
    /// When set, text values already present in the table emit as `t="s"`;
    /// anything else falls back to inline strings.
    pub sst: Option<&'a SharedStrings>,
    /// Regenerated `<tableParts>`; wins over a preserved one.
    pub table_parts_xml: Option<String>,
    /// Synthesized `<legacyDrawing>` relationship id, for sheets that gained
    /// comments when the source had no legacy drawing.
    pub legacy_drawing_rid: Option<String>,
    pub escape_formulas: bool,
}

/// Apply the formula-injection guard: a leading `=`, `+`, `-`, or `@` gets a
/// quoting apostrophe.
pub(crate) fn escape_formula_text(text: &str, escape: bool) -> String {
    if escape && text.starts_with(['=', '+', '-', '@']) {
        format!("'{text}")
    } else {
        text.to_string()
    }
}

pub(crate) fn serialize_worksheet(emit: &WorksheetEmit) -> String {
    let default = default_root();
    let root = emit.preserved.map(|p| &p.root).unwrap_or(&default);

    // Regenerated children, keyed by their schema position.
    let mut pieces: Vec<(usize, usize, String)> = Vec::new();
    let mut seq = 0usize;
    let mut push = |pieces: &mut Vec<(usize, usize, String)>, name: &str, xml: String| {
        pieces.push((child_order_index(name), seq, xml));
        seq += 1;
    };

    if let Some(range) = emit.sheet.used_range() {
        push(
            &mut pieces,
            "dimension",
            format!(r#"<dimension ref="{range}"/>"#),
        );
    }
    if !emit.sheet.col_props.is_empty() {
        push(&mut pieces, "cols", cols_xml(emit));
    }
    push(&mut pieces, "sheetData", sheet_data_xml(emit));
    if !emit.sheet.merges().is_empty() {
        push(&mut pieces, "mergeCells", merge_cells_xml(emit.sheet));
    }
    if let Some(ref tp) = emit.table_parts_xml {
        push(&mut pieces, "tableParts", tp.clone());
    }
    if let Some(ref rid) = emit.legacy_drawing_rid {
        let has_preserved = emit
            .preserved
            .map(|p| p.has_preserved("legacyDrawing"))
            .unwrap_or(false);
        if !has_preserved {
            push(
                &mut pieces,
                "legacyDrawing",
                format!(r#"<legacyDrawing r:id="{rid}"/>"#),
            );
        }
    }

    // Preserved fragments, skipping the children regenerated above.
    if let Some(preserved) = emit.preserved {
        for frag in &preserved.preserved {
            let regenerated = matches!(frag.name.as_str(), "dimension" | "mergeCells")
                || (frag.name == "cols" && !emit.sheet.col_props.is_empty())
                || (frag.name == "tableParts" && emit.table_parts_xml.is_some());
            if !regenerated {
                pieces.push((child_order_index(&frag.name), seq, frag.raw.clone()));
                seq += 1;
            }
        }
    }

    pieces.sort_by_key(|(order, seq, _)| (*order, *seq));

    let mut buf = Vec::new();
    {
        let mut sink = WriterSink::new(&mut buf);
        sink.start_document();
        sink.start_element(&root.name);
        for (name, value) in &root.attrs {
            sink.attr(name, value);
        }
        for (_, _, xml) in &pieces {
            sink.raw(xml);
        }
        sink.end_element();
        sink.into_inner();
    }
    String::from_utf8(buf).expect("sink emits UTF-8")
}

fn cols_xml(emit: &WorksheetEmit) -> String {
    let mut buf = Vec::new();
    {
        let mut sink = WriterSink::new(&mut buf);
        sink.start_element("cols");
        for (col, props) in &emit.sheet.col_props {
            sink.start_element("col");
            let n = (col + 1).to_string();
            sink.attr("min", &n);
            sink.attr("max", &n);
            if let Some(w) = props.width {
                sink.attr("width", &fmt_float(w));
            }
            if let Some(global) = props.style_id.and_then(|id| (emit.style_lookup)(id)) {
                sink.attr("style", &global.to_string());
            }
            if props.hidden {
                sink.attr("hidden", "1");
            }
            if props.width.is_some() {
                sink.attr("customWidth", "1");
            }
            if let Some(level) = props.outline_level {
                sink.attr("outlineLevel", &level.to_string());
            }
            sink.end_element();
        }
        sink.end_element();
        sink.into_inner();
    }
    String::from_utf8(buf).expect("sink emits UTF-8")
}

fn merge_cells_xml(sheet: &Sheet) -> String {
    let mut buf = Vec::new();
    {
        let mut sink = WriterSink::new(&mut buf);
        sink.start_element("mergeCells");
        sink.attr("count", &sheet.merges().len().to_string());
        for merge in sheet.merges() {
            sink.start_element("mergeCell");
            sink.attr("ref", &merge.to_string());
            sink.end_element();
        }
        sink.end_element();
        sink.into_inner();
    }
    String::from_utf8(buf).expect("sink emits UTF-8")
}

fn sheet_data_xml(emit: &WorksheetEmit) -> String {
    // Preserved row records by 1-based row number.
    let preserved_rows: BTreeMap<u32, &Row> = emit
        .preserved
        .map(|p| p.sheet_data.rows.iter().map(|r| (r.r, r)).collect())
        .unwrap_or_default();

    // Domain cells grouped by 1-based row number, already column-sorted.
    let mut cells_by_row: BTreeMap<u32, Vec<(crate::aref::ARef, &crate::sheet::Cell)>> =
        BTreeMap::new();
    for (at, cell) in emit.sheet.cells() {
        cells_by_row.entry(at.row_number()).or_default().push((at, cell));
    }

    // Union of row numbers: preserved rows (to retain empty source rows),
    // domain cells, and domain row properties.
    let mut row_numbers: std::collections::BTreeSet<u32> = preserved_rows.keys().copied().collect();
    row_numbers.extend(cells_by_row.keys().copied());
    row_numbers.extend(emit.sheet.row_props.keys().map(|r| r + 1));

    let mut buf = Vec::new();
    {
        let mut sink = WriterSink::new(&mut buf);
        sink.start_element("sheetData");
        for row_number in row_numbers {
            let cells = cells_by_row.get(&row_number);
            let preserved = preserved_rows.get(&row_number).copied();
            // A source row whose cells were all deleted still appears, but a
            // fully empty synthetic row without properties would be noise.
            write_row(&mut sink, emit, row_number, preserved, cells);
        }
        sink.end_element();
        sink.into_inner();
    }
    String::from_utf8(buf).expect("sink emits UTF-8")
}

fn write_row(
    sink: &mut dyn XmlSink,
    emit: &WorksheetEmit,
    row_number: u32,
    preserved: Option<&Row>,
    cells: Option<&Vec<(crate::aref::ARef, &crate::sheet::Cell)>>,
) {
    let props = emit.sheet.row_props.get(&(row_number - 1));

    sink.start_element("row");
    sink.attr("r", &row_number.to_string());

    // Preserved attributes first, then the domain properties on top.
    let spans = preserved.and_then(|p| p.spans.clone()).or_else(|| {
        cells.map(|cells| {
            let min = cells.first().map(|(a, _)| a.col_number()).unwrap_or(1);
            let max = cells.last().map(|(a, _)| a.col_number()).unwrap_or(min);
            format!("{min}:{max}")
        })
    });
    if let Some(spans) = spans {
        sink.attr("spans", &spans);
    }

    let row_style = props
        .and_then(|p| p.style_id)
        .and_then(|id| (emit.style_lookup)(id))
        .or_else(|| preserved.and_then(|p| p.s));
    if let Some(s) = row_style {
        sink.attr("s", &s.to_string());
    }
    let custom_format = preserved.and_then(|p| p.custom_format).unwrap_or(false)
        || props.map(|p| p.style_id.is_some()).unwrap_or(false);
    if custom_format {
        sink.attr("customFormat", "1");
    }

    let height = props.and_then(|p| p.height).or_else(|| preserved.and_then(|p| p.ht));
    if let Some(ht) = height {
        sink.attr("ht", &fmt_float(ht));
    }
    let hidden = props.map(|p| p.hidden).unwrap_or(false)
        || preserved.and_then(|p| p.hidden).unwrap_or(false);
    if hidden {
        sink.attr("hidden", "1");
    }
    let custom_height = props.map(|p| p.height.is_some()).unwrap_or(false)
        || preserved.and_then(|p| p.custom_height).unwrap_or(false);
    if custom_height {
        sink.attr("customHeight", "1");
    }
    let outline = props
        .and_then(|p| p.outline_level)
        .or_else(|| preserved.and_then(|p| p.outline_level));
    if let Some(level) = outline {
        sink.attr("outlineLevel", &level.to_string());
    }
    let collapsed = props.map(|p| p.collapsed).unwrap_or(false)
        || preserved.and_then(|p| p.collapsed).unwrap_or(false);
    if collapsed {
        sink.attr("collapsed", "1");
    }
    if preserved.and_then(|p| p.thick_bot).unwrap_or(false) {
        sink.attr("thickBot", "1");
    }
    if preserved.and_then(|p| p.thick_top).unwrap_or(false) {
        sink.attr("thickTop", "1");
    }
    if let Some(dy) = preserved.and_then(|p| p.dy_descent) {
        sink.attr("x14ac:dyDescent", &format!("{dy}"));
    }

    if let Some(cells) = cells {
        for (at, cell) in cells {
            write_cell(sink, emit, *at, cell);
        }
    }
    sink.end_element();
}

fn write_cell(
    sink: &mut dyn XmlSink,
    emit: &WorksheetEmit,
    at: crate::aref::ARef,
    cell: &crate::sheet::Cell,
) {
    sink.start_element("c");
    sink.attr("r", &at.to_string());
    if let Some(global) = cell.style_id.and_then(|id| (emit.style_lookup)(id)) {
        sink.attr("s", &global.to_string());
    }

    match &cell.value {
        CellValue::Empty => {}
        CellValue::Number(n) => {
            sink.start_element("v");
            sink.text(&fmt_float(*n));
            sink.end_element();
        }
        CellValue::Bool(b) => {
            sink.attr("t", cell_types::BOOLEAN);
            sink.start_element("v");
            sink.text(if *b { "1" } else { "0" });
            sink.end_element();
        }
        CellValue::DateTime(dt) => {
            sink.start_element("v");
            sink.text(&fmt_float(CellValue::datetime_to_serial(dt)));
            sink.end_element();
        }
        CellValue::Error(kind) => {
            sink.attr("t", cell_types::ERROR);
            sink.start_element("v");
            sink.text(kind.as_str());
            sink.end_element();
        }
        CellValue::Text(text) => {
            let text = escape_formula_text(text, emit.escape_formulas);
            match emit.sst.and_then(|sst| sst.lookup(&text)) {
                Some(index) => {
                    sink.attr("t", cell_types::SHARED_STRING);
                    sink.start_element("v");
                    sink.text(&index.to_string());
                    sink.end_element();
                }
                None => {
                    sink.attr("t", cell_types::INLINE_STRING);
                    sink.start_element("is");
                    write_t(sink, &text);
                    sink.end_element();
                }
            }
        }
        CellValue::RichText(runs) => {
            let projection = crate::rich_text::runs_plain_text(runs);
            match emit.sst.and_then(|sst| sst.lookup(&projection)) {
                Some(index) => {
                    sink.attr("t", cell_types::SHARED_STRING);
                    sink.start_element("v");
                    sink.text(&index.to_string());
                    sink.end_element();
                }
                None => {
                    sink.attr("t", cell_types::INLINE_STRING);
                    sink.start_element("is");
                    for run in runs {
                        sink.start_element("r");
                        if let Some(rpr) = run.rpr_xml() {
                            sink.raw(&rpr);
                        }
                        write_t(sink, &run.text);
                        sink.end_element();
                    }
                    sink.end_element();
                }
            }
        }
        CellValue::Formula { expr, cached } => {
            let cached_type = match cached.as_deref() {
                Some(CellValue::Text(_)) => Some(cell_types::FORMULA_STRING),
                Some(CellValue::Bool(_)) => Some(cell_types::BOOLEAN),
                Some(CellValue::Error(_)) => Some(cell_types::ERROR),
                _ => None,
            };
            if let Some(t) = cached_type {
                sink.attr("t", t);
            }
            sink.start_element("f");
            sink.text(expr);
            sink.end_element();
            if let Some(cached) = cached.as_deref() {
                let text = match cached {
                    CellValue::Number(n) => Some(fmt_float(*n)),
                    CellValue::Text(s) => Some(s.clone()),
                    CellValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
                    CellValue::Error(k) => Some(k.as_str().to_string()),
                    _ => None,
                };
                if let Some(text) = text {
                    sink.start_element("v");
                    if needs_space_preserve(&text) {
                        sink.attr("xml:space", "preserve");
                    }
                    sink.text(&text);
                    sink.end_element();
                }
            }
        }
    }
    sink.end_element();
}
