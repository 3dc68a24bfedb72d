//! Rich-text runs.
//!
//! A [`TextRun`] is one contiguous span of formatted text. Runs read from a
//! source package keep the exact `<rPr>` bytes so untouched formatting
//! round-trips verbatim; runs built through the API carry a typed
//! [`RunFont`] that is serialized on demand. When both are present the raw
//! bytes win.

use xlpatch_xml::fragment::strip_redundant_ns_decls;
use xlpatch_xml::namespaces;
use xlpatch_xml::sink::{WriterSink, XmlSink};
use xlpatch_xml::worksheet::RunProps;

/// Typed font properties of a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunFont {
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    /// Underline style (`single`, `double`, ...); `Some("single")` for `<u/>`.
    pub underline: Option<String>,
    pub size: Option<f64>,
    /// ARGB hex color like `FFFF0000`.
    pub color_rgb: Option<String>,
    pub name: Option<String>,
    pub family: Option<i32>,
    pub scheme: Option<String>,
    /// `superscript` / `subscript` vertical alignment.
    pub vert_align: Option<String>,
}

impl RunFont {
    pub fn is_default(&self) -> bool {
        *self == RunFont::default()
    }

    /// Build from the typed schema properties of an inline-string run.
    pub fn from_props(props: &RunProps) -> Self {
        Self {
            bold: props.b.as_ref().map(|b| b.is_set()).unwrap_or(false),
            italic: props.i.as_ref().map(|b| b.is_set()).unwrap_or(false),
            strike: props.strike.as_ref().map(|b| b.is_set()).unwrap_or(false),
            underline: props
                .u
                .as_ref()
                .map(|u| u.val.clone().unwrap_or_else(|| "single".to_string())),
            size: props.sz.as_ref().map(|s| s.val),
            color_rgb: props.color.as_ref().and_then(|c| c.rgb.clone()),
            name: props.r_font.as_ref().map(|f| f.val.clone()),
            family: props.family.as_ref().map(|f| f.val),
            scheme: props.scheme.as_ref().map(|s| s.val.clone()),
            vert_align: props.vert_align.as_ref().map(|v| v.val.clone()),
        }
    }

    /// Serialize as an `<rPr>` fragment, children in CT_RPrElt order.
    /// Returns `None` for a default (unformatted) font.
    pub fn to_rpr_xml(&self) -> Option<String> {
        if self.is_default() {
            return None;
        }
        let mut buf = Vec::new();
        {
            let mut sink = WriterSink::new(&mut buf);
            sink.start_element("rPr");
            if self.bold {
                sink.start_element("b");
                sink.end_element();
            }
            if self.italic {
                sink.start_element("i");
                sink.end_element();
            }
            if self.strike {
                sink.start_element("strike");
                sink.end_element();
            }
            if let Some(ref u) = self.underline {
                sink.start_element("u");
                if u != "single" {
                    sink.attr("val", u);
                }
                sink.end_element();
            }
            if let Some(ref va) = self.vert_align {
                sink.start_element("vertAlign");
                sink.attr("val", va);
                sink.end_element();
            }
            if let Some(size) = self.size {
                sink.start_element("sz");
                sink.attr("val", &fmt_float(size));
                sink.end_element();
            }
            if let Some(ref rgb) = self.color_rgb {
                sink.start_element("color");
                sink.attr("rgb", rgb);
                sink.end_element();
            }
            if let Some(ref name) = self.name {
                sink.start_element("rFont");
                sink.attr("val", name);
                sink.end_element();
            }
            if let Some(family) = self.family {
                sink.start_element("family");
                sink.attr("val", &family.to_string());
                sink.end_element();
            }
            if let Some(ref scheme) = self.scheme {
                sink.start_element("scheme");
                sink.attr("val", scheme);
                sink.end_element();
            }
            sink.end_element();
            sink.into_inner();
        }
        Some(String::from_utf8(buf).expect("sink emits UTF-8"))
    }
}

/// Format a float the way Excel writes numeric attributes: no trailing `.0`.
pub fn fmt_float(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// One run of rich text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextRun {
    pub text: String,
    /// Typed font, used when no raw fragment exists.
    pub font: Option<RunFont>,
    /// Exact `<rPr>` bytes from the source; wins over `font` on emission.
    pub raw_rpr_xml: Option<String>,
}

impl TextRun {
    /// An unformatted run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: None,
            raw_rpr_xml: None,
        }
    }

    /// A run with a typed font.
    pub fn styled(text: impl Into<String>, font: RunFont) -> Self {
        Self {
            text: text.into(),
            font: Some(font),
            raw_rpr_xml: None,
        }
    }

    /// The `<rPr>` fragment to emit for this run, raw bytes taking
    /// precedence. Redundant spreadsheet-namespace declarations are stripped
    /// from raw fragments: the run inherits the part root's namespace.
    pub fn rpr_xml(&self) -> Option<String> {
        if let Some(ref raw) = self.raw_rpr_xml {
            return Some(strip_redundant_ns_decls(
                raw,
                &[("xmlns", namespaces::SPREADSHEET_ML)],
            ));
        }
        self.font.as_ref().and_then(|f| f.to_rpr_xml())
    }
}

/// Plain-text projection of a run sequence.
pub fn runs_plain_text(runs: &[TextRun]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}
