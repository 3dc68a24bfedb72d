//! Worksheet XML schema structures.
//!
//! Represents `xl/worksheets/sheet*.xml` in the OOXML package.
//!
//! Reading splits the part into opaque child fragments (everything the engine
//! preserves) plus typed parses of the children it regenerates (`sheetData`,
//! `mergeCells`, `dimension`). Writing is sink-driven so preserved fragments
//! can be spliced back in schema order around the regenerated children.

use serde::{Deserialize, Serialize};

use crate::fragment::{self, Fragment, FragmentError, RootTag};
use crate::shared_strings::T;
use crate::{namespaces, secure};

/// Child order of `<worksheet>` per ECMA-376 §18.3.1.99 (CT_Worksheet).
///
/// Preserved fragments are re-emitted in this order; ties (same element name)
/// keep source order.
pub const WORKSHEET_CHILD_ORDER: &[&str] = &[
    "sheetPr",
    "dimension",
    "sheetViews",
    "sheetFormatPr",
    "cols",
    "sheetData",
    "sheetCalcPr",
    "sheetProtection",
    "protectedRanges",
    "scenarios",
    "autoFilter",
    "sortState",
    "dataConsolidate",
    "customSheetViews",
    "mergeCells",
    "phoneticPr",
    "conditionalFormatting",
    "dataValidations",
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

/// Position of a child element in the schema sequence. Unknown elements sort
/// last, keeping their source order among themselves.
pub fn child_order_index(name: &str) -> usize {
    WORKSHEET_CHILD_ORDER
        .iter()
        .position(|n| *n == name)
        .unwrap_or(WORKSHEET_CHILD_ORDER.len())
}

/// Sheet data container holding all rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SheetData {
    #[serde(rename = "row", default)]
    pub rows: Vec<Row>,
}

/// A single row of cells.
///
/// The full attribute set round-trips, including style ids that violate the
/// schema; Excel is known to accept and depend on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// 1-based row number.
    #[serde(rename = "@r")]
    pub r: u32,

    #[serde(rename = "@spans", skip_serializing_if = "Option::is_none")]
    pub spans: Option<String>,

    #[serde(rename = "@s", skip_serializing_if = "Option::is_none")]
    pub s: Option<u32>,

    #[serde(rename = "@customFormat", skip_serializing_if = "Option::is_none")]
    pub custom_format: Option<bool>,

    #[serde(rename = "@ht", skip_serializing_if = "Option::is_none")]
    pub ht: Option<f64>,

    #[serde(rename = "@customHeight", skip_serializing_if = "Option::is_none")]
    pub custom_height: Option<bool>,

    #[serde(rename = "@hidden", skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,

    #[serde(rename = "@outlineLevel", skip_serializing_if = "Option::is_none")]
    pub outline_level: Option<u8>,

    #[serde(rename = "@collapsed", skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,

    #[serde(rename = "@thickBot", skip_serializing_if = "Option::is_none")]
    pub thick_bot: Option<bool>,

    #[serde(rename = "@thickTop", skip_serializing_if = "Option::is_none")]
    pub thick_top: Option<bool>,

    #[serde(
        rename = "@x14ac:dyDescent",
        alias = "@dyDescent",
        skip_serializing_if = "Option::is_none"
    )]
    pub dy_descent: Option<f64>,

    #[serde(rename = "c", default)]
    pub cells: Vec<Cell>,
}

impl Row {
    /// A row with only its number set.
    pub fn new(r: u32) -> Self {
        Self {
            r,
            spans: None,
            s: None,
            custom_format: None,
            ht: None,
            custom_height: None,
            hidden: None,
            outline_level: None,
            collapsed: None,
            thick_bot: None,
            thick_top: None,
            dy_descent: None,
            cells: Vec::new(),
        }
    }
}

/// A single cell. Attribute order on emit is `r, s, t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Cell reference (e.g., "A1").
    #[serde(rename = "@r")]
    pub r: String,

    /// Style index.
    #[serde(rename = "@s", skip_serializing_if = "Option::is_none")]
    pub s: Option<u32>,

    /// Cell type: "b", "e", "inlineStr", "n", "s", "str" (absent means number).
    #[serde(rename = "@t", skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    #[serde(rename = "f", skip_serializing_if = "Option::is_none")]
    pub f: Option<CellFormula>,

    #[serde(rename = "v", skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,

    #[serde(rename = "is", skip_serializing_if = "Option::is_none")]
    pub is: Option<InlineString>,
}

/// Cell type constants.
pub mod cell_types {
    pub const BOOLEAN: &str = "b";
    pub const ERROR: &str = "e";
    pub const INLINE_STRING: &str = "inlineStr";
    pub const NUMBER: &str = "n";
    pub const SHARED_STRING: &str = "s";
    pub const FORMULA_STRING: &str = "str";
}

/// Cell formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellFormula {
    #[serde(rename = "@t", skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    #[serde(rename = "@ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(rename = "@si", skip_serializing_if = "Option::is_none")]
    pub si: Option<u32>,

    #[serde(rename = "$value", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Inline string within a cell. A cell is rich text iff any `<r>` is present,
/// even when a plain `<t>` also exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InlineString {
    #[serde(rename = "t", skip_serializing_if = "Option::is_none")]
    pub t: Option<T>,

    #[serde(rename = "r", default)]
    pub r: Vec<InlineRun>,
}

/// Rich run inside an inline string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineRun {
    #[serde(rename = "rPr", skip_serializing_if = "Option::is_none")]
    pub r_pr: Option<RunProps>,

    #[serde(rename = "t")]
    pub t: T,
}

/// Rich-run properties (CT_RPrElt), the typed subset this engine rebuilds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunProps {
    #[serde(rename = "b", skip_serializing_if = "Option::is_none")]
    pub b: Option<BoolProp>,

    #[serde(rename = "i", skip_serializing_if = "Option::is_none")]
    pub i: Option<BoolProp>,

    #[serde(rename = "strike", skip_serializing_if = "Option::is_none")]
    pub strike: Option<BoolProp>,

    #[serde(rename = "u", skip_serializing_if = "Option::is_none")]
    pub u: Option<UProp>,

    #[serde(rename = "sz", skip_serializing_if = "Option::is_none")]
    pub sz: Option<FloatProp>,

    #[serde(rename = "color", skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorProp>,

    #[serde(rename = "rFont", skip_serializing_if = "Option::is_none")]
    pub r_font: Option<ValProp>,

    #[serde(rename = "family", skip_serializing_if = "Option::is_none")]
    pub family: Option<IntProp>,

    #[serde(rename = "scheme", skip_serializing_if = "Option::is_none")]
    pub scheme: Option<ValProp>,

    #[serde(rename = "vertAlign", skip_serializing_if = "Option::is_none")]
    pub vert_align: Option<ValProp>,
}

/// Underline element; a bare `<u/>` means single underline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UProp {
    #[serde(rename = "@val", skip_serializing_if = "Option::is_none")]
    pub val: Option<String>,
}

/// Boolean property element like `<b/>` or `<b val="0"/>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BoolProp {
    #[serde(rename = "@val", skip_serializing_if = "Option::is_none")]
    pub val: Option<bool>,
}

impl BoolProp {
    pub fn is_set(&self) -> bool {
        self.val.unwrap_or(true)
    }
}

/// String-valued property element like `<rFont val="Calibri"/>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValProp {
    #[serde(rename = "@val")]
    pub val: String,
}

/// Float-valued property element like `<sz val="11"/>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatProp {
    #[serde(rename = "@val")]
    pub val: f64,
}

/// Integer-valued property element like `<family val="2"/>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntProp {
    #[serde(rename = "@val")]
    pub val: i32,
}

/// Color property element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ColorProp {
    #[serde(rename = "@rgb", skip_serializing_if = "Option::is_none")]
    pub rgb: Option<String>,

    #[serde(rename = "@theme", skip_serializing_if = "Option::is_none")]
    pub theme: Option<u32>,

    #[serde(rename = "@tint", skip_serializing_if = "Option::is_none")]
    pub tint: Option<f64>,

    #[serde(rename = "@indexed", skip_serializing_if = "Option::is_none")]
    pub indexed: Option<u32>,

    #[serde(rename = "@auto", skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
}

/// Merge cells container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MergeCells {
    #[serde(rename = "@count", skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(rename = "mergeCell", default)]
    pub merge_cells: Vec<MergeCell>,
}

/// Individual merge cell reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeCell {
    #[serde(rename = "@ref")]
    pub reference: String,
}

/// A worksheet part split for surgical rewriting: typed views of the
/// regenerated children plus every other child kept as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedWorksheet {
    /// Root tag with every source attribute (namespace declarations included).
    pub root: RootTag,
    /// Typed rows and cells from `<sheetData>`.
    pub sheet_data: SheetData,
    /// Typed merge ranges from `<mergeCells>`, if present.
    pub merge_cells: Option<MergeCells>,
    /// The source `<dimension ref="..."/>` value, if present.
    pub dimension: Option<String>,
    /// All other children in source order, raw.
    pub preserved: Vec<Fragment>,
}

impl ParsedWorksheet {
    /// First preserved fragment with the given element name.
    pub fn preserved_fragment(&self, name: &str) -> Option<&Fragment> {
        self.preserved.iter().find(|f| f.name == name)
    }

    /// Whether a preserved child with the given name exists.
    pub fn has_preserved(&self, name: &str) -> bool {
        self.preserved_fragment(name).is_some()
    }
}

/// Parse a worksheet part, splitting regenerated from preserved children.
pub fn parse_worksheet(xml: &str) -> Result<ParsedWorksheet, FragmentError> {
    secure::check_xml(xml).map_err(|e| FragmentError::Malformed {
        position: 0,
        message: e.to_string(),
    })?;

    let (root, children) = fragment::split_children(xml)?;

    let mut sheet_data = SheetData::default();
    let mut merge_cells = None;
    let mut dimension = None;
    let mut preserved = Vec::new();

    for child in children {
        match child.name.as_str() {
            "sheetData" => {
                sheet_data = quick_xml::de::from_str(&child.raw).map_err(|e| {
                    FragmentError::Malformed {
                        position: 0,
                        message: e.to_string(),
                    }
                })?;
            }
            "mergeCells" => {
                merge_cells = Some(quick_xml::de::from_str(&child.raw).map_err(|e| {
                    FragmentError::Malformed {
                        position: 0,
                        message: e.to_string(),
                    }
                })?);
            }
            "dimension" => {
                let (tag, _) = fragment::split_children(&child.raw)?;
                dimension = tag.attr("ref").map(str::to_string);
            }
            _ => preserved.push(child),
        }
    }

    Ok(ParsedWorksheet {
        root,
        sheet_data,
        merge_cells,
        dimension,
        preserved,
    })
}

/// Default root attributes for a synthesized worksheet.
pub fn default_root() -> RootTag {
    RootTag {
        name: "worksheet".to_string(),
        attrs: vec![
            ("xmlns".to_string(), namespaces::SPREADSHEET_ML.to_string()),
            ("xmlns:r".to_string(), namespaces::RELATIONSHIPS.to_string()),
        ],
    }
}
