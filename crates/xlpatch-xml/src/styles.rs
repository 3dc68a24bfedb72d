//! Styles XML schema structures.
//!
//! Represents `xl/styles.xml` in the OOXML package. The component tables
//! (`numFmts`, `fonts`, `fills`, `borders`, `cellStyleXfs`, `cellXfs`,
//! `cellStyles`) are typed; `dxfs`, `tableStyles`, `colors`, and `extLst`
//! are preserved as opaque fragments so differential formats survive
//! regeneration byte-for-byte. Root namespace declarations are preserved.

use serde::{Deserialize, Serialize};

use crate::fragment::{self, Fragment, FragmentError, RootTag};
use crate::sink::{WriterSink, XmlSink};
use crate::worksheet::{BoolProp, ColorProp, FloatProp, IntProp, UProp, ValProp};
use crate::{namespaces, secure};

/// Number formats container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NumFmts {
    #[serde(rename = "@count", skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(rename = "numFmt", default)]
    pub num_fmts: Vec<NumFmt>,
}

/// Individual number format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumFmt {
    #[serde(rename = "@numFmtId")]
    pub num_fmt_id: u32,

    #[serde(rename = "@formatCode")]
    pub format_code: String,
}

/// Fonts container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Fonts {
    #[serde(rename = "@count", skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(rename = "font", default)]
    pub fonts: Vec<Font>,
}

/// Individual font definition, children in CT_Font schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Font {
    #[serde(rename = "b", skip_serializing_if = "Option::is_none")]
    pub b: Option<BoolProp>,

    #[serde(rename = "i", skip_serializing_if = "Option::is_none")]
    pub i: Option<BoolProp>,

    #[serde(rename = "strike", skip_serializing_if = "Option::is_none")]
    pub strike: Option<BoolProp>,

    #[serde(rename = "u", skip_serializing_if = "Option::is_none")]
    pub u: Option<UProp>,

    #[serde(rename = "vertAlign", skip_serializing_if = "Option::is_none")]
    pub vert_align: Option<ValProp>,

    #[serde(rename = "sz", skip_serializing_if = "Option::is_none")]
    pub sz: Option<FloatProp>,

    #[serde(rename = "color", skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorProp>,

    #[serde(rename = "name", skip_serializing_if = "Option::is_none")]
    pub name: Option<ValProp>,

    #[serde(rename = "family", skip_serializing_if = "Option::is_none")]
    pub family: Option<IntProp>,

    #[serde(rename = "charset", skip_serializing_if = "Option::is_none")]
    pub charset: Option<IntProp>,

    #[serde(rename = "scheme", skip_serializing_if = "Option::is_none")]
    pub scheme: Option<ValProp>,
}

/// Fills container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Fills {
    #[serde(rename = "@count", skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(rename = "fill", default)]
    pub fills: Vec<Fill>,
}

/// Individual fill definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Fill {
    #[serde(rename = "patternFill", skip_serializing_if = "Option::is_none")]
    pub pattern_fill: Option<PatternFill>,

    #[serde(rename = "gradientFill", skip_serializing_if = "Option::is_none")]
    pub gradient_fill: Option<GradientFill>,
}

impl Fill {
    /// A pattern fill with only a pattern type, e.g. `none` or `gray125`.
    pub fn pattern(pattern_type: &str) -> Self {
        Self {
            pattern_fill: Some(PatternFill {
                pattern_type: Some(pattern_type.to_string()),
                fg_color: None,
                bg_color: None,
            }),
            gradient_fill: None,
        }
    }
}

/// Pattern fill definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PatternFill {
    #[serde(rename = "@patternType", skip_serializing_if = "Option::is_none")]
    pub pattern_type: Option<String>,

    #[serde(rename = "fgColor", skip_serializing_if = "Option::is_none")]
    pub fg_color: Option<ColorProp>,

    #[serde(rename = "bgColor", skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<ColorProp>,
}

/// Gradient fill definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GradientFill {
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub gradient_type: Option<String>,

    #[serde(rename = "@degree", skip_serializing_if = "Option::is_none")]
    pub degree: Option<f64>,

    #[serde(rename = "stop", default)]
    pub stops: Vec<GradientStop>,
}

/// A single gradient stop with position and color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    #[serde(rename = "@position")]
    pub position: f64,

    #[serde(rename = "color")]
    pub color: ColorProp,
}

/// Borders container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Borders {
    #[serde(rename = "@count", skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(rename = "border", default)]
    pub borders: Vec<Border>,
}

/// Individual border definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Border {
    #[serde(rename = "@diagonalUp", skip_serializing_if = "Option::is_none")]
    pub diagonal_up: Option<bool>,

    #[serde(rename = "@diagonalDown", skip_serializing_if = "Option::is_none")]
    pub diagonal_down: Option<bool>,

    #[serde(rename = "left", skip_serializing_if = "Option::is_none")]
    pub left: Option<BorderSide>,

    #[serde(rename = "right", skip_serializing_if = "Option::is_none")]
    pub right: Option<BorderSide>,

    #[serde(rename = "top", skip_serializing_if = "Option::is_none")]
    pub top: Option<BorderSide>,

    #[serde(rename = "bottom", skip_serializing_if = "Option::is_none")]
    pub bottom: Option<BorderSide>,

    #[serde(rename = "diagonal", skip_serializing_if = "Option::is_none")]
    pub diagonal: Option<BorderSide>,
}

impl Border {
    /// The default border: all sides present and empty.
    pub fn empty_sides() -> Self {
        Self {
            diagonal_up: None,
            diagonal_down: None,
            left: Some(BorderSide::default()),
            right: Some(BorderSide::default()),
            top: Some(BorderSide::default()),
            bottom: Some(BorderSide::default()),
            diagonal: Some(BorderSide::default()),
        }
    }
}

/// Border side definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BorderSide {
    #[serde(rename = "@style", skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    #[serde(rename = "color", skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorProp>,
}

/// Cell style XFs container (base style formats).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CellStyleXfs {
    #[serde(rename = "@count", skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(rename = "xf", default)]
    pub xfs: Vec<Xf>,
}

/// Cell XFs container (applied cell formats).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CellXfs {
    #[serde(rename = "@count", skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(rename = "xf", default)]
    pub xfs: Vec<Xf>,
}

/// Cell format entry, attributes in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Xf {
    #[serde(rename = "@numFmtId", skip_serializing_if = "Option::is_none")]
    pub num_fmt_id: Option<u32>,

    #[serde(rename = "@fontId", skip_serializing_if = "Option::is_none")]
    pub font_id: Option<u32>,

    #[serde(rename = "@fillId", skip_serializing_if = "Option::is_none")]
    pub fill_id: Option<u32>,

    #[serde(rename = "@borderId", skip_serializing_if = "Option::is_none")]
    pub border_id: Option<u32>,

    #[serde(rename = "@xfId", skip_serializing_if = "Option::is_none")]
    pub xf_id: Option<u32>,

    #[serde(rename = "@applyNumberFormat", skip_serializing_if = "Option::is_none")]
    pub apply_number_format: Option<bool>,

    #[serde(rename = "@applyFont", skip_serializing_if = "Option::is_none")]
    pub apply_font: Option<bool>,

    #[serde(rename = "@applyFill", skip_serializing_if = "Option::is_none")]
    pub apply_fill: Option<bool>,

    #[serde(rename = "@applyBorder", skip_serializing_if = "Option::is_none")]
    pub apply_border: Option<bool>,

    #[serde(rename = "@applyAlignment", skip_serializing_if = "Option::is_none")]
    pub apply_alignment: Option<bool>,

    #[serde(rename = "@applyProtection", skip_serializing_if = "Option::is_none")]
    pub apply_protection: Option<bool>,

    #[serde(rename = "alignment", skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,

    #[serde(rename = "protection", skip_serializing_if = "Option::is_none")]
    pub protection: Option<Protection>,
}

/// Cell alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Alignment {
    #[serde(rename = "@horizontal", skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<String>,

    #[serde(rename = "@vertical", skip_serializing_if = "Option::is_none")]
    pub vertical: Option<String>,

    #[serde(rename = "@textRotation", skip_serializing_if = "Option::is_none")]
    pub text_rotation: Option<u32>,

    #[serde(rename = "@wrapText", skip_serializing_if = "Option::is_none")]
    pub wrap_text: Option<bool>,

    #[serde(rename = "@indent", skip_serializing_if = "Option::is_none")]
    pub indent: Option<u32>,

    #[serde(rename = "@shrinkToFit", skip_serializing_if = "Option::is_none")]
    pub shrink_to_fit: Option<bool>,
}

/// Cell protection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Protection {
    #[serde(rename = "@locked", skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,

    #[serde(rename = "@hidden", skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

/// Named cell styles container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CellStyles {
    #[serde(rename = "@count", skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(rename = "cellStyle", default)]
    pub cell_styles: Vec<NamedCellStyle>,
}

/// A named style like `Normal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCellStyle {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@xfId")]
    pub xf_id: u32,

    #[serde(rename = "@builtinId", skip_serializing_if = "Option::is_none")]
    pub builtin_id: Option<u32>,
}

/// A styles part split for surgical rewriting.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStyles {
    /// Root tag with every source attribute (extension namespaces included).
    pub root: RootTag,
    pub num_fmts: NumFmts,
    pub fonts: Fonts,
    pub fills: Fills,
    pub borders: Borders,
    pub cell_style_xfs: CellStyleXfs,
    pub cell_xfs: CellXfs,
    pub cell_styles: CellStyles,
    /// `dxfs`, `tableStyles`, `colors`, `extLst` and anything unknown,
    /// raw and in source order; emitted after `cellStyles`.
    pub trailing: Vec<Fragment>,
}

impl ParsedStyles {
    /// Serialize the part. Component counts are recomputed; trailing opaque
    /// fragments are spliced back verbatim.
    pub fn to_xml_string(&self) -> String {
        let mut this = self.clone();
        this.num_fmts.count = Some(this.num_fmts.num_fmts.len() as u32);
        this.fonts.count = Some(this.fonts.fonts.len() as u32);
        this.fills.count = Some(this.fills.fills.len() as u32);
        this.borders.count = Some(this.borders.borders.len() as u32);
        this.cell_style_xfs.count = Some(this.cell_style_xfs.xfs.len() as u32);
        this.cell_xfs.count = Some(this.cell_xfs.xfs.len() as u32);
        this.cell_styles.count = Some(this.cell_styles.cell_styles.len() as u32);

        let mut buf = Vec::new();
        {
            let mut sink = WriterSink::new(&mut buf);
            sink.start_document();
            sink.start_element(&this.root.name);
            for (name, value) in &this.root.attrs {
                sink.attr(name, value);
            }
            if !this.num_fmts.num_fmts.is_empty() {
                sink.raw(&se_with_root("numFmts", &this.num_fmts));
            }
            sink.raw(&se_with_root("fonts", &this.fonts));
            sink.raw(&se_with_root("fills", &this.fills));
            sink.raw(&se_with_root("borders", &this.borders));
            sink.raw(&se_with_root("cellStyleXfs", &this.cell_style_xfs));
            sink.raw(&se_with_root("cellXfs", &this.cell_xfs));
            sink.raw(&se_with_root("cellStyles", &this.cell_styles));
            for frag in &this.trailing {
                sink.raw(&frag.raw);
            }
            sink.end_element();
            sink.into_inner();
        }
        String::from_utf8(buf).expect("sink emits UTF-8")
    }
}

fn se_with_root<T: Serialize>(root: &str, value: &T) -> String {
    quick_xml::se::to_string_with_root(root, value).expect("style structs serialize")
}

/// Parse `xl/styles.xml`.
pub fn parse_styles(xml: &str) -> Result<ParsedStyles, FragmentError> {
    secure::check_xml(xml).map_err(|e| FragmentError::Malformed {
        position: 0,
        message: e.to_string(),
    })?;

    let (root, children) = fragment::split_children(xml)?;

    let mut styles = ParsedStyles {
        root,
        num_fmts: NumFmts::default(),
        fonts: Fonts::default(),
        fills: Fills::default(),
        borders: Borders::default(),
        cell_style_xfs: CellStyleXfs::default(),
        cell_xfs: CellXfs::default(),
        cell_styles: CellStyles::default(),
        trailing: Vec::new(),
    };

    for child in children {
        match child.name.as_str() {
            "numFmts" => styles.num_fmts = de_fragment(&child.raw)?,
            "fonts" => styles.fonts = de_fragment(&child.raw)?,
            "fills" => styles.fills = de_fragment(&child.raw)?,
            "borders" => styles.borders = de_fragment(&child.raw)?,
            "cellStyleXfs" => styles.cell_style_xfs = de_fragment(&child.raw)?,
            "cellXfs" => styles.cell_xfs = de_fragment(&child.raw)?,
            "cellStyles" => styles.cell_styles = de_fragment(&child.raw)?,
            _ => styles.trailing.push(child),
        }
    }

    Ok(styles)
}

fn de_fragment<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, FragmentError> {
    quick_xml::de::from_str(raw).map_err(|e| FragmentError::Malformed {
        position: 0,
        message: e.to_string(),
    })
}

/// A minimal Excel-compatible default stylesheet: one font, the two mandatory
/// fills, one empty border, one default xf, and the `Normal` named style.
pub fn default_styles() -> ParsedStyles {
    ParsedStyles {
        root: RootTag {
            name: "styleSheet".to_string(),
            attrs: vec![(
                "xmlns".to_string(),
                namespaces::SPREADSHEET_ML.to_string(),
            )],
        },
        num_fmts: NumFmts::default(),
        fonts: Fonts {
            count: None,
            fonts: vec![Font {
                sz: Some(FloatProp { val: 11.0 }),
                color: Some(ColorProp {
                    theme: Some(1),
                    ..ColorProp::default()
                }),
                name: Some(ValProp {
                    val: "Calibri".to_string(),
                }),
                family: Some(IntProp { val: 2 }),
                scheme: Some(ValProp {
                    val: "minor".to_string(),
                }),
                ..Font::default()
            }],
        },
        fills: Fills {
            count: None,
            fills: vec![Fill::pattern("none"), Fill::pattern("gray125")],
        },
        borders: Borders {
            count: None,
            borders: vec![Border::empty_sides()],
        },
        cell_style_xfs: CellStyleXfs {
            count: None,
            xfs: vec![Xf {
                num_fmt_id: Some(0),
                font_id: Some(0),
                fill_id: Some(0),
                border_id: Some(0),
                ..Xf::default()
            }],
        },
        cell_xfs: CellXfs {
            count: None,
            xfs: vec![Xf {
                num_fmt_id: Some(0),
                font_id: Some(0),
                fill_id: Some(0),
                border_id: Some(0),
                xf_id: Some(0),
                ..Xf::default()
            }],
        },
        cell_styles: CellStyles {
            count: None,
            cell_styles: vec![NamedCellStyle {
                name: "Normal".to_string(),
                xf_id: 0,
                builtin_id: Some(0),
            }],
        },
        trailing: Vec::new(),
    }
}
