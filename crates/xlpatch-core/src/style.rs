//! Cell styles.
//!
//! [`CellStyle`] is the domain record a caller attaches to cells; the
//! [`StyleRegistry`] deduplicates styles per sheet under local ids that are
//! remapped to workbook-wide `cellXfs` indices at write time.
//!
//! Equivalence is decided by [`CellStyle::canonical_key`], a deterministic
//! string over every field. The key is also computed for the `cellXfs` of a
//! source package, which is how a caller-created style resolves to an
//! existing index during a surgical write.

use xlpatch_xml::styles::{
    Alignment, Border, BorderSide, Fill, Font, PatternFill,
};
use xlpatch_xml::worksheet::{BoolProp, ColorProp, FloatProp, IntProp, UProp, ValProp};

/// First id available for custom number formats; lower ids are built in.
pub const CUSTOM_NUM_FMT_BASE: u32 = 164;

/// Typed font properties of a cell style.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontSpec {
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    pub underline: Option<String>,
    pub size: Option<f64>,
    pub color_rgb: Option<String>,
    pub name: Option<String>,
    pub family: Option<i32>,
    pub scheme: Option<String>,
}

impl FontSpec {
    /// Convert to the schema struct.
    pub fn to_xml(&self) -> Font {
        Font {
            b: self.bold.then(BoolProp::default),
            i: self.italic.then(BoolProp::default),
            strike: self.strike.then(BoolProp::default),
            u: self.underline.as_ref().map(|u| UProp {
                val: (u != "single").then(|| u.clone()),
            }),
            sz: self.size.map(|val| FloatProp { val }),
            color: self.color_rgb.as_ref().map(|rgb| ColorProp {
                rgb: Some(rgb.clone()),
                ..ColorProp::default()
            }),
            name: self.name.as_ref().map(|val| ValProp { val: val.clone() }),
            family: self.family.map(|val| IntProp { val }),
            scheme: self.scheme.as_ref().map(|val| ValProp { val: val.clone() }),
            ..Font::default()
        }
    }
}

/// Pattern-fill properties of a cell style.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FillSpec {
    /// Pattern type (`solid`, `gray125`, ...); `None` means no fill.
    pub pattern: Option<String>,
    pub fg_rgb: Option<String>,
    pub bg_rgb: Option<String>,
}

impl FillSpec {
    /// A solid fill of the given ARGB color.
    pub fn solid(rgb: &str) -> Self {
        Self {
            pattern: Some("solid".to_string()),
            fg_rgb: Some(rgb.to_string()),
            bg_rgb: None,
        }
    }

    pub fn to_xml(&self) -> Fill {
        Fill {
            pattern_fill: Some(PatternFill {
                pattern_type: Some(
                    self.pattern.clone().unwrap_or_else(|| "none".to_string()),
                ),
                fg_color: self.fg_rgb.as_ref().map(|rgb| ColorProp {
                    rgb: Some(rgb.clone()),
                    ..ColorProp::default()
                }),
                bg_color: self.bg_rgb.as_ref().map(|rgb| ColorProp {
                    rgb: Some(rgb.clone()),
                    ..ColorProp::default()
                }),
            }),
            gradient_fill: None,
        }
    }
}

/// One border edge: a line style plus optional color.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BorderEdge {
    pub style: Option<String>,
    pub color_rgb: Option<String>,
}

impl BorderEdge {
    pub fn thin() -> Self {
        Self {
            style: Some("thin".to_string()),
            color_rgb: None,
        }
    }

    fn to_xml(&self) -> BorderSide {
        BorderSide {
            style: self.style.clone(),
            color: self.color_rgb.as_ref().map(|rgb| ColorProp {
                rgb: Some(rgb.clone()),
                ..ColorProp::default()
            }),
        }
    }
}

/// Border properties of a cell style.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BorderSpec {
    pub left: Option<BorderEdge>,
    pub right: Option<BorderEdge>,
    pub top: Option<BorderEdge>,
    pub bottom: Option<BorderEdge>,
    pub diagonal: Option<BorderEdge>,
}

impl BorderSpec {
    /// A thin border on all four sides.
    pub fn all_thin() -> Self {
        Self {
            left: Some(BorderEdge::thin()),
            right: Some(BorderEdge::thin()),
            top: Some(BorderEdge::thin()),
            bottom: Some(BorderEdge::thin()),
            diagonal: None,
        }
    }

    pub fn to_xml(&self) -> Border {
        let side = |edge: &Option<BorderEdge>| {
            Some(edge.as_ref().map(|e| e.to_xml()).unwrap_or_default())
        };
        Border {
            diagonal_up: None,
            diagonal_down: None,
            left: side(&self.left),
            right: side(&self.right),
            top: side(&self.top),
            bottom: side(&self.bottom),
            diagonal: side(&self.diagonal),
        }
    }
}

/// Horizontal alignment values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterContinuous,
    Distributed,
}

impl HAlign {
    /// Attribute value: lowercase except `centerContinuous`.
    pub fn as_attr(self) -> &'static str {
        match self {
            HAlign::Left => "left",
            HAlign::Center => "center",
            HAlign::Right => "right",
            HAlign::Fill => "fill",
            HAlign::Justify => "justify",
            HAlign::CenterContinuous => "centerContinuous",
            HAlign::Distributed => "distributed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(HAlign::Left),
            "center" => Some(HAlign::Center),
            "right" => Some(HAlign::Right),
            "fill" => Some(HAlign::Fill),
            "justify" => Some(HAlign::Justify),
            "centerContinuous" => Some(HAlign::CenterContinuous),
            "distributed" => Some(HAlign::Distributed),
            _ => None,
        }
    }
}

/// Vertical alignment values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    Bottom,
    Justify,
    Distributed,
}

impl VAlign {
    /// Attribute value: lowercase, with `Middle` spelled `center`.
    pub fn as_attr(self) -> &'static str {
        match self {
            VAlign::Top => "top",
            VAlign::Middle => "center",
            VAlign::Bottom => "bottom",
            VAlign::Justify => "justify",
            VAlign::Distributed => "distributed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "top" => Some(VAlign::Top),
            "center" => Some(VAlign::Middle),
            "bottom" => Some(VAlign::Bottom),
            "justify" => Some(VAlign::Justify),
            "distributed" => Some(VAlign::Distributed),
            _ => None,
        }
    }
}

/// Alignment properties of a cell style.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignSpec {
    pub horizontal: Option<HAlign>,
    pub vertical: Option<VAlign>,
    pub wrap_text: bool,
    pub text_rotation: Option<u32>,
    pub indent: Option<u32>,
    pub shrink_to_fit: bool,
}

impl AlignSpec {
    pub fn is_default(&self) -> bool {
        *self == AlignSpec::default()
    }

    /// Convert to the schema struct, `None` when the record is default: the
    /// `<alignment>` child (and `applyAlignment`) is emitted only then.
    pub fn to_xml(&self) -> Option<Alignment> {
        if self.is_default() {
            return None;
        }
        Some(Alignment {
            horizontal: self.horizontal.map(|h| h.as_attr().to_string()),
            vertical: self.vertical.map(|v| v.as_attr().to_string()),
            text_rotation: self.text_rotation,
            wrap_text: self.wrap_text.then_some(true),
            indent: self.indent,
            shrink_to_fit: self.shrink_to_fit.then_some(true),
        })
    }
}

/// A complete cell style record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellStyle {
    pub font: Option<FontSpec>,
    pub fill: Option<FillSpec>,
    pub border: Option<BorderSpec>,
    /// Number format code, e.g. `0.00%`.
    pub num_fmt: Option<String>,
    /// The exact format id read from source, if any. Lets an untouched cell
    /// round-trip to the same id even when reverse lookup from `num_fmt`
    /// would pick a different one.
    pub num_fmt_id: Option<u32>,
    pub alignment: Option<AlignSpec>,
}

impl CellStyle {
    pub fn is_default(&self) -> bool {
        *self == CellStyle::default()
    }

    /// The effective number format code, resolving built-in ids.
    pub fn effective_num_fmt(&self) -> Option<String> {
        if let Some(ref code) = self.num_fmt {
            return Some(code.clone());
        }
        self.num_fmt_id.and_then(builtin_num_fmt_code).map(str::to_string)
    }

    /// Deterministic equality key over every field.
    ///
    /// Components are keyed by their serialized schema form so keys computed
    /// from domain styles and from a re-parsed `styles.xml` agree. The
    /// number format is keyed by its effective code, so a source style with
    /// a built-in id matches a caller style carrying the same code.
    pub fn canonical_key(&self) -> String {
        let font = self
            .font
            .as_ref()
            .map(|f| component_key(&f.to_xml()))
            .unwrap_or_default();
        let fill = self
            .fill
            .as_ref()
            .map(|f| component_key(&f.to_xml()))
            .unwrap_or_default();
        let border = self
            .border
            .as_ref()
            .map(|b| component_key(&b.to_xml()))
            .unwrap_or_default();
        let numfmt = self
            .effective_num_fmt()
            .or_else(|| self.num_fmt_id.map(|id| format!("#id{id}")))
            .unwrap_or_default();
        let align = self
            .alignment
            .as_ref()
            .and_then(|a| a.to_xml())
            .map(|a| component_key(&a))
            .unwrap_or_default();
        format!("f:{font}|p:{fill}|b:{border}|n:{numfmt}|a:{align}")
    }
}

/// Deterministic serialization of a schema component, used as its equality
/// key. Keys computed from domain specs and from re-parsed source components
/// agree whenever the underlying records do.
pub(crate) fn component_key<T: serde::Serialize>(value: &T) -> String {
    quick_xml::se::to_string_with_root("k", value).unwrap_or_default()
}

/// Format code for a built-in number format id, `None` for custom ids.
pub fn builtin_num_fmt_code(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        37 => Some("#,##0 ;(#,##0)"),
        38 => Some("#,##0 ;[Red](#,##0)"),
        39 => Some("#,##0.00;(#,##0.00)"),
        40 => Some("#,##0.00;[Red](#,##0.00)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mmss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}

/// Reverse lookup: built-in id for a format code.
pub fn builtin_num_fmt_id(code: &str) -> Option<u32> {
    (0..=49).find(|id| builtin_num_fmt_code(*id) == Some(code))
}

/// Sheet-local style table. Local id 0 is always the default style.
///
/// Each entry carries its equality key. Styles registered by the caller use
/// [`CellStyle::canonical_key`]; styles registered by the reader carry the
/// exact key of the source `cellXf` they came from, so a surgical write
/// resolves them back to their original index without loss.
#[derive(Debug, Clone)]
pub struct StyleRegistry {
    styles: Vec<(CellStyle, String)>,
    keys: std::collections::HashMap<String, u32>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        let default = CellStyle::default();
        let key = default.canonical_key();
        let mut keys = std::collections::HashMap::new();
        keys.insert(key.clone(), 0);
        Self {
            styles: vec![(default, key)],
            keys,
        }
    }

    /// Register a style, returning its local id (existing id on key match).
    pub fn register(&mut self, style: CellStyle) -> u32 {
        let key = style.canonical_key();
        self.register_with_key(style, key)
    }

    /// Register a style under an explicit equality key.
    pub(crate) fn register_with_key(&mut self, style: CellStyle, key: String) -> u32 {
        if let Some(&id) = self.keys.get(&key) {
            return id;
        }
        let id = self.styles.len() as u32;
        self.styles.push((style, key.clone()));
        self.keys.insert(key, id);
        id
    }

    pub fn get(&self, id: u32) -> Option<&CellStyle> {
        self.styles.get(id as usize).map(|(s, _)| s)
    }

    /// The equality key of a registered style.
    pub(crate) fn key_of(&self, id: u32) -> Option<&str> {
        self.styles.get(id as usize).map(|(_, k)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// All styles in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &CellStyle)> {
        self.styles.iter().enumerate().map(|(i, (s, _))| (i as u32, s))
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold_style() -> CellStyle {
        CellStyle {
            font: Some(FontSpec {
                bold: true,
                size: Some(11.0),
                ..FontSpec::default()
            }),
            ..CellStyle::default()
        }
    }

    #[test]
    fn test_canonical_key_equal_for_equal_styles() {
        assert_eq!(bold_style().canonical_key(), bold_style().canonical_key());
    }

    #[test]
    fn test_canonical_key_differs_per_field() {
        let base = bold_style();
        let mut other = bold_style();
        other.fill = Some(FillSpec::solid("FFFFFF00"));
        assert_ne!(base.canonical_key(), other.canonical_key());

        let mut aligned = bold_style();
        aligned.alignment = Some(AlignSpec {
            horizontal: Some(HAlign::Center),
            ..AlignSpec::default()
        });
        assert_ne!(base.canonical_key(), aligned.canonical_key());
    }

    #[test]
    fn test_canonical_key_numfmt_by_effective_code() {
        // A built-in id and its literal code are the same style.
        let by_id = CellStyle {
            num_fmt_id: Some(10),
            ..CellStyle::default()
        };
        let by_code = CellStyle {
            num_fmt: Some("0.00%".to_string()),
            ..CellStyle::default()
        };
        assert_eq!(by_id.canonical_key(), by_code.canonical_key());
    }

    #[test]
    fn test_default_alignment_emits_nothing() {
        assert!(AlignSpec::default().to_xml().is_none());
        let a = AlignSpec {
            wrap_text: true,
            ..AlignSpec::default()
        };
        assert!(a.to_xml().is_some());
    }

    #[test]
    fn test_halign_attr_values() {
        assert_eq!(HAlign::Center.as_attr(), "center");
        assert_eq!(HAlign::CenterContinuous.as_attr(), "centerContinuous");
        assert_eq!(HAlign::parse("centerContinuous"), Some(HAlign::CenterContinuous));
    }

    #[test]
    fn test_valign_middle_is_center() {
        assert_eq!(VAlign::Middle.as_attr(), "center");
        assert_eq!(VAlign::parse("center"), Some(VAlign::Middle));
    }

    #[test]
    fn test_builtin_num_fmt_round_trip() {
        assert_eq!(builtin_num_fmt_code(14), Some("mm-dd-yy"));
        assert_eq!(builtin_num_fmt_id("0.00%"), Some(10));
        assert_eq!(builtin_num_fmt_id("not a format"), None);
        assert_eq!(builtin_num_fmt_code(164), None);
    }

    #[test]
    fn test_registry_default_is_id_zero() {
        let reg = StyleRegistry::new();
        assert_eq!(reg.len(), 1);
        assert!(reg.get(0).unwrap().is_default());
    }

    #[test]
    fn test_registry_dedups_by_key() {
        let mut reg = StyleRegistry::new();
        let a = reg.register(bold_style());
        let b = reg.register(bold_style());
        assert_eq!(a, b);
        assert_eq!(reg.len(), 2);

        let c = reg.register(CellStyle {
            fill: Some(FillSpec::solid("FF00FF00")),
            ..CellStyle::default()
        });
        assert_ne!(a, c);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_registry_register_default_returns_zero() {
        let mut reg = StyleRegistry::new();
        assert_eq!(reg.register(CellStyle::default()), 0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_font_spec_to_xml() {
        let font = FontSpec {
            bold: true,
            underline: Some("double".to_string()),
            size: Some(12.0),
            name: Some("Arial".to_string()),
            ..FontSpec::default()
        };
        let xml = font.to_xml();
        assert!(xml.b.is_some());
        assert_eq!(xml.u.as_ref().unwrap().val.as_deref(), Some("double"));
        assert_eq!(xml.sz.as_ref().unwrap().val, 12.0);
        assert_eq!(xml.name.as_ref().unwrap().val, "Arial");
        assert!(xml.i.is_none());
    }

    #[test]
    fn test_border_spec_all_sides_present_in_xml() {
        let xml = BorderSpec::all_thin().to_xml();
        assert_eq!(xml.left.as_ref().unwrap().style.as_deref(), Some("thin"));
        assert_eq!(xml.diagonal.as_ref().unwrap().style, None);
    }
}
