//! Workbook-wide style index construction.
//!
//! Two build modes, selected by whether the workbook has a source context:
//!
//! - **Full dedup** (no source): every sheet's local registry is folded into
//!   one dense `cellXfs` vector starting from the default stylesheet, with a
//!   per-sheet local-to-global remapping.
//! - **Preserve and extend** (with source): the original component vectors
//!   and `cellXfs` survive element-for-element (duplicates included), so
//!   unmodified sheets' style indices stay valid. Only modified sheets are
//!   processed; their styles resolve to existing indices by equality key when
//!   possible and are appended at the end otherwise. A remapping is emitted
//!   only for modified sheets.

use std::collections::{BTreeSet, HashMap};

use xlpatch_xml::styles::{
    default_styles, CellStyles, Fill, NamedCellStyle, NumFmt, ParsedStyles, Xf,
};

use crate::sheet::Sheet;
use crate::style::{
    builtin_num_fmt_id, component_key, CellStyle, CUSTOM_NUM_FMT_BASE,
};

/// The product of an index build: the stylesheet to emit plus the
/// local-to-global remappings for the sheets that were processed.
#[derive(Debug, Clone)]
pub struct StyleIndex {
    pub styles: ParsedStyles,
    remaps: HashMap<usize, HashMap<u32, u32>>,
}

impl StyleIndex {
    /// Global `cellXfs` index for a sheet-local style id. `None` when the
    /// sheet was not processed (its cells keep their original indices).
    pub fn remap(&self, sheet: usize, local: u32) -> Option<u32> {
        self.remaps.get(&sheet)?.get(&local).copied()
    }

    /// Full-dedup build over every sheet.
    pub fn build_full(sheets: &[Sheet]) -> Self {
        let base = default_styles();
        let all: BTreeSet<usize> = (0..sheets.len()).collect();
        Self::build(base, sheets, &all)
    }

    /// Preserve-and-extend build over the modified sheets only.
    pub fn build_preserving(
        source: ParsedStyles,
        sheets: &[Sheet],
        modified: &BTreeSet<usize>,
    ) -> Self {
        let mut base = source;
        // ECMA-376 requires one default cellStyleXf and one Normal style;
        // degenerate sources get them restored.
        if base.cell_style_xfs.xfs.is_empty() {
            base.cell_style_xfs.xfs.push(Xf {
                num_fmt_id: Some(0),
                font_id: Some(0),
                fill_id: Some(0),
                border_id: Some(0),
                ..Xf::default()
            });
        }
        if base.cell_styles.cell_styles.is_empty() {
            base.cell_styles = CellStyles {
                count: None,
                cell_styles: vec![NamedCellStyle {
                    name: "Normal".to_string(),
                    xf_id: 0,
                    builtin_id: Some(0),
                }],
            };
        }
        if base.cell_xfs.xfs.is_empty() {
            base.cell_xfs.xfs.push(Xf {
                num_fmt_id: Some(0),
                font_id: Some(0),
                fill_id: Some(0),
                border_id: Some(0),
                xf_id: Some(0),
                ..Xf::default()
            });
        }
        Self::build(base, sheets, modified)
    }

    fn build(mut styles: ParsedStyles, sheets: &[Sheet], process: &BTreeSet<usize>) -> Self {
        // Index each existing cellXf key to the list of original indices;
        // duplicates in source all survive, lookups take the first.
        let mut xf_index: HashMap<String, u32> = HashMap::new();
        for (i, xf) in styles.cell_xfs.xfs.iter().enumerate() {
            let key = key_of_xf(&styles, xf);
            xf_index.entry(key).or_insert(i as u32);
        }

        let mut remaps: HashMap<usize, HashMap<u32, u32>> = HashMap::new();

        for (sheet_idx, sheet) in sheets.iter().enumerate() {
            if !process.contains(&sheet_idx) {
                continue;
            }
            let mut remap = HashMap::new();
            for (local, style) in sheet.styles.iter() {
                let key = sheet
                    .styles
                    .key_of(local)
                    .expect("registered style has a key")
                    .to_string();
                let global = match xf_index.get(&key) {
                    Some(&g) => g,
                    None => {
                        let g = append_xf(&mut styles, style);
                        xf_index.insert(key, g);
                        g
                    }
                };
                remap.insert(local, global);
            }
            remaps.insert(sheet_idx, remap);
        }

        StyleIndex { styles, remaps }
    }
}

/// Equality key of a `cellXf` against its stylesheet's component vectors.
///
/// Component id 0 (the defaults) keys as empty, matching a domain style with
/// that component unset; other ids key by the component's serialized form.
pub(crate) fn key_of_xf(styles: &ParsedStyles, xf: &Xf) -> String {
    let font = match xf.font_id.unwrap_or(0) {
        0 => String::new(),
        id => styles
            .fonts
            .fonts
            .get(id as usize)
            .map(component_key)
            .unwrap_or_default(),
    };
    let fill = match xf.fill_id.unwrap_or(0) {
        0 => String::new(),
        id => styles
            .fills
            .fills
            .get(id as usize)
            .map(component_key)
            .unwrap_or_default(),
    };
    let border = match xf.border_id.unwrap_or(0) {
        0 => String::new(),
        id => styles
            .borders
            .borders
            .get(id as usize)
            .map(component_key)
            .unwrap_or_default(),
    };
    let numfmt = match xf.num_fmt_id.unwrap_or(0) {
        0 => String::new(),
        id => num_fmt_code(styles, id).unwrap_or_else(|| format!("#id{id}")),
    };
    let align = xf
        .alignment
        .as_ref()
        .map(component_key)
        .unwrap_or_default();
    format!("f:{font}|p:{fill}|b:{border}|n:{numfmt}|a:{align}")
}

/// The format code behind a `numFmtId`: the stylesheet's custom table first,
/// then the built-in table.
pub(crate) fn num_fmt_code(styles: &ParsedStyles, id: u32) -> Option<String> {
    styles
        .num_fmts
        .num_fmts
        .iter()
        .find(|n| n.num_fmt_id == id)
        .map(|n| n.format_code.clone())
        .or_else(|| crate::style::builtin_num_fmt_code(id).map(str::to_string))
}

/// Append a new `cellXf` for a domain style, deduplicating its components
/// against the existing vectors. Returns the new index.
fn append_xf(styles: &mut ParsedStyles, style: &CellStyle) -> u32 {
    let font_id = match &style.font {
        None => 0,
        Some(spec) => {
            let xml = spec.to_xml();
            find_or_push(&mut styles.fonts.fonts, xml)
        }
    };
    let fill_id = match &style.fill {
        None => 0,
        Some(spec) => {
            ensure_mandatory_fills(&mut styles.fills.fills);
            find_or_push(&mut styles.fills.fills, spec.to_xml())
        }
    };
    let border_id = match &style.border {
        None => 0,
        Some(spec) => find_or_push(&mut styles.borders.borders, spec.to_xml()),
    };
    let num_fmt_id = resolve_num_fmt(styles, style);

    let alignment = style.alignment.as_ref().and_then(|a| a.to_xml());
    let xf = Xf {
        num_fmt_id: Some(num_fmt_id),
        font_id: Some(font_id),
        fill_id: Some(fill_id),
        border_id: Some(border_id),
        xf_id: Some(0),
        apply_number_format: (num_fmt_id != 0).then_some(true),
        apply_font: (font_id != 0).then_some(true),
        apply_fill: (fill_id != 0).then_some(true),
        apply_border: (border_id != 0).then_some(true),
        apply_alignment: alignment.is_some().then_some(true),
        apply_protection: None,
        alignment,
        protection: None,
    };

    styles.cell_xfs.xfs.push(xf);
    (styles.cell_xfs.xfs.len() - 1) as u32
}

/// The two mandatory fills occupy indices 0 and 1 in every stylesheet.
fn ensure_mandatory_fills(fills: &mut Vec<Fill>) {
    if fills.is_empty() {
        fills.push(Fill::pattern("none"));
    }
    if fills.len() == 1 {
        fills.push(Fill::pattern("gray125"));
    }
}

fn find_or_push<T: serde::Serialize + PartialEq>(vec: &mut Vec<T>, item: T) -> u32 {
    if let Some(i) = vec.iter().position(|existing| *existing == item) {
        return i as u32;
    }
    vec.push(item);
    (vec.len() - 1) as u32
}

/// Resolve the `numFmtId` for a domain style: the preserved source id wins,
/// then a matching existing custom format, then a built-in id, then a fresh
/// custom entry.
fn resolve_num_fmt(styles: &mut ParsedStyles, style: &CellStyle) -> u32 {
    if let Some(id) = style.num_fmt_id {
        return id;
    }
    let Some(code) = style.num_fmt.clone() else {
        return 0;
    };
    if let Some(existing) = styles
        .num_fmts
        .num_fmts
        .iter()
        .find(|n| n.format_code == code)
    {
        return existing.num_fmt_id;
    }
    if let Some(builtin) = builtin_num_fmt_id(&code) {
        return builtin;
    }
    let next = styles
        .num_fmts
        .num_fmts
        .iter()
        .map(|n| n.num_fmt_id + 1)
        .max()
        .unwrap_or(CUSTOM_NUM_FMT_BASE)
        .max(CUSTOM_NUM_FMT_BASE);
    styles.num_fmts.num_fmts.push(NumFmt {
        num_fmt_id: next,
        format_code: code,
    });
    next
}

/// Best-effort domain view of a source `cellXf`, for API introspection.
///
/// The exact source id is preserved in `num_fmt_id`; equality against the
/// source goes through the registry's key override, never through this
/// conversion, so lossy corners (theme colors, gradient fills) cost nothing
/// on the write path.
pub(crate) fn style_from_xf(styles: &ParsedStyles, xf: &Xf) -> CellStyle {
    use crate::style::{AlignSpec, BorderEdge, BorderSpec, FillSpec, FontSpec, HAlign, VAlign};

    let font = match xf.font_id.unwrap_or(0) {
        0 => None,
        id => styles.fonts.fonts.get(id as usize).map(|f| FontSpec {
            bold: f.b.as_ref().map(|b| b.is_set()).unwrap_or(false),
            italic: f.i.as_ref().map(|b| b.is_set()).unwrap_or(false),
            strike: f.strike.as_ref().map(|b| b.is_set()).unwrap_or(false),
            underline: f
                .u
                .as_ref()
                .map(|u| u.val.clone().unwrap_or_else(|| "single".to_string())),
            size: f.sz.as_ref().map(|s| s.val),
            color_rgb: f.color.as_ref().and_then(|c| c.rgb.clone()),
            name: f.name.as_ref().map(|n| n.val.clone()),
            family: f.family.as_ref().map(|n| n.val),
            scheme: f.scheme.as_ref().map(|s| s.val.clone()),
        }),
    };
    let fill = match xf.fill_id.unwrap_or(0) {
        0 => None,
        id => styles
            .fills
            .fills
            .get(id as usize)
            .and_then(|f| f.pattern_fill.as_ref())
            .map(|p| FillSpec {
                pattern: p.pattern_type.clone(),
                fg_rgb: p.fg_color.as_ref().and_then(|c| c.rgb.clone()),
                bg_rgb: p.bg_color.as_ref().and_then(|c| c.rgb.clone()),
            }),
    };
    let border = match xf.border_id.unwrap_or(0) {
        0 => None,
        id => styles.borders.borders.get(id as usize).map(|b| {
            let edge = |side: &Option<xlpatch_xml::styles::BorderSide>| {
                side.as_ref()
                    .filter(|s| s.style.is_some())
                    .map(|s| BorderEdge {
                        style: s.style.clone(),
                        color_rgb: s.color.as_ref().and_then(|c| c.rgb.clone()),
                    })
            };
            BorderSpec {
                left: edge(&b.left),
                right: edge(&b.right),
                top: edge(&b.top),
                bottom: edge(&b.bottom),
                diagonal: edge(&b.diagonal),
            }
        }),
    };
    let num_fmt_id = xf.num_fmt_id.filter(|id| *id != 0);
    let num_fmt = num_fmt_id.and_then(|id| {
        styles
            .num_fmts
            .num_fmts
            .iter()
            .find(|n| n.num_fmt_id == id)
            .map(|n| n.format_code.clone())
    });
    let alignment = xf.alignment.as_ref().map(|a| AlignSpec {
        horizontal: a.horizontal.as_deref().and_then(HAlign::parse),
        vertical: a.vertical.as_deref().and_then(VAlign::parse),
        wrap_text: a.wrap_text.unwrap_or(false),
        text_rotation: a.text_rotation,
        indent: a.indent,
        shrink_to_fit: a.shrink_to_fit.unwrap_or(false),
    });

    CellStyle {
        font,
        fill,
        border,
        num_fmt,
        num_fmt_id,
        alignment,
    }
}
