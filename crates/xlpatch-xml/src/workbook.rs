//! Workbook XML schema structures.
//!
//! Represents `xl/workbook.xml` in the OOXML package. Only `<sheets>` is ever
//! regenerated; every other child (`fileVersion`, `workbookPr`, `bookViews`,
//! `definedNames`, `calcPr`, `mc:AlternateContent`, `xr:revisionPtr`, ...)
//! is preserved as an opaque fragment and re-emitted in source order around
//! the rebuilt `<sheets>`.

use serde::{Deserialize, Serialize};

use crate::fragment::{self, Fragment, FragmentError, RootTag};
use crate::sink::{WriterSink, XmlSink};
use crate::{namespaces, secure};

/// Visibility state of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SheetState {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

impl SheetState {
    /// Attribute value, `None` for the visible default.
    pub fn as_attr(self) -> Option<&'static str> {
        match self {
            SheetState::Visible => None,
            SheetState::Hidden => Some("hidden"),
            SheetState::VeryHidden => Some("veryHidden"),
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "hidden" => SheetState::Hidden,
            "veryHidden" => SheetState::VeryHidden,
            _ => SheetState::Visible,
        }
    }
}

/// One `<sheet>` entry in `<sheets>`.
///
/// `sheet_id` is preserved from source and never renumbered; `rid` is
/// reassigned by ordinal when the workbook part is regenerated.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRef {
    pub name: String,
    pub sheet_id: u32,
    pub rid: String,
    pub state: SheetState,
}

/// Serde view of `<sheets>` used during parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SheetsXml {
    #[serde(rename = "sheet", default)]
    sheets: Vec<SheetXml>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SheetXml {
    #[serde(rename = "@name")]
    name: String,

    #[serde(rename = "@sheetId")]
    sheet_id: u32,

    #[serde(rename = "@state", skip_serializing_if = "Option::is_none")]
    state: Option<String>,

    #[serde(rename = "@r:id", alias = "@id")]
    r_id: String,
}

/// A workbook part split for surgical rewriting.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedWorkbook {
    pub root: RootTag,
    pub sheets: Vec<SheetRef>,
    /// Opaque children in source order.
    pub preserved: Vec<Fragment>,
    /// Index into `preserved` where the regenerated `<sheets>` is spliced.
    pub sheets_position: usize,
}

impl ParsedWorkbook {
    /// Next sheet id for a newly added sheet: `max(existing) + 1`.
    pub fn next_sheet_id(&self) -> u32 {
        self.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1
    }

    /// Look up a sheet by name.
    pub fn sheet_by_name(&self, name: &str) -> Option<&SheetRef> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Serialize the part, splicing preserved children around `<sheets>`.
    pub fn to_xml_string(&self) -> String {
        let mut buf = Vec::new();
        {
            let mut sink = WriterSink::new(&mut buf);
            sink.start_document();
            sink.start_element(&self.root.name);
            for (name, value) in &self.root.attrs {
                sink.attr(name, value);
            }
            for (i, frag) in self.preserved.iter().enumerate() {
                if i == self.sheets_position {
                    write_sheets(&mut sink, &self.sheets);
                }
                sink.raw(&frag.raw);
            }
            if self.sheets_position >= self.preserved.len() {
                write_sheets(&mut sink, &self.sheets);
            }
            sink.end_element();
            sink.into_inner();
        }
        String::from_utf8(buf).expect("sink emits UTF-8")
    }
}

fn write_sheets(sink: &mut dyn XmlSink, sheets: &[SheetRef]) {
    sink.start_element("sheets");
    for sheet in sheets {
        sink.start_element("sheet");
        sink.attr("name", &sheet.name);
        sink.attr("sheetId", &sheet.sheet_id.to_string());
        if let Some(state) = sheet.state.as_attr() {
            sink.attr("state", state);
        }
        sink.attr("r:id", &sheet.rid);
        sink.end_element();
    }
    sink.end_element();
}

/// Parse `xl/workbook.xml`.
pub fn parse_workbook(xml: &str) -> Result<ParsedWorkbook, FragmentError> {
    secure::check_xml(xml).map_err(|e| FragmentError::Malformed {
        position: 0,
        message: e.to_string(),
    })?;

    let (root, children) = fragment::split_children(xml)?;

    let mut sheets = Vec::new();
    let mut preserved = Vec::new();
    let mut sheets_position = None;

    for child in children {
        if child.name == "sheets" {
            let parsed: SheetsXml =
                quick_xml::de::from_str(&child.raw).map_err(|e| FragmentError::Malformed {
                    position: 0,
                    message: e.to_string(),
                })?;
            sheets = parsed
                .sheets
                .into_iter()
                .map(|s| SheetRef {
                    name: s.name,
                    sheet_id: s.sheet_id,
                    rid: s.r_id,
                    state: s.state.as_deref().map(SheetState::parse).unwrap_or_default(),
                })
                .collect();
            sheets_position = Some(preserved.len());
        } else {
            preserved.push(child);
        }
    }

    let sheets_position = sheets_position.unwrap_or(preserved.len());
    Ok(ParsedWorkbook {
        root,
        sheets,
        preserved,
        sheets_position,
    })
}

/// A minimal synthesized workbook part with one visible sheet per entry.
pub fn default_workbook(sheet_names: &[String]) -> ParsedWorkbook {
    ParsedWorkbook {
        root: RootTag {
            name: "workbook".to_string(),
            attrs: vec![
                ("xmlns".to_string(), namespaces::SPREADSHEET_ML.to_string()),
                ("xmlns:r".to_string(), namespaces::RELATIONSHIPS.to_string()),
            ],
        },
        sheets: sheet_names
            .iter()
            .enumerate()
            .map(|(i, name)| SheetRef {
                name: name.clone(),
                sheet_id: i as u32 + 1,
                rid: format!("rId{}", i + 1),
                state: SheetState::Visible,
            })
            .collect(),
        preserved: Vec::new(),
        sheets_position: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <fileVersion appName="xl" lastEdited="7" lowestEdited="7" rupBuild="27029"/>
  <workbookPr defaultThemeVersion="166925"/>
  <bookViews><workbookView xWindow="0" yWindow="0" windowWidth="28800" windowHeight="12000"/></bookViews>
  <sheets>
    <sheet name="Data" sheetId="1" r:id="rId1"/>
    <sheet name="Secret" sheetId="4" state="veryHidden" r:id="rId2"/>
  </sheets>
  <definedNames><definedName name="mine">Data!$A$1</definedName></definedNames>
  <calcPr calcId="191029"/>
</workbook>"#;

    #[test]
    fn test_parse_sheets() {
        let wb = parse_workbook(SAMPLE).unwrap();
        assert_eq!(wb.sheets.len(), 2);
        assert_eq!(wb.sheets[0].name, "Data");
        assert_eq!(wb.sheets[0].sheet_id, 1);
        assert_eq!(wb.sheets[0].rid, "rId1");
        assert_eq!(wb.sheets[0].state, SheetState::Visible);
        assert_eq!(wb.sheets[1].state, SheetState::VeryHidden);
        assert_eq!(wb.sheets[1].sheet_id, 4);
    }

    #[test]
    fn test_parse_preserves_other_children_in_order() {
        let wb = parse_workbook(SAMPLE).unwrap();
        let names: Vec<&str> = wb.preserved.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["fileVersion", "workbookPr", "bookViews", "definedNames", "calcPr"]
        );
        // <sheets> sat between bookViews and definedNames.
        assert_eq!(wb.sheets_position, 3);
    }

    #[test]
    fn test_next_sheet_id_is_max_plus_one() {
        let wb = parse_workbook(SAMPLE).unwrap();
        assert_eq!(wb.next_sheet_id(), 5);
    }

    #[test]
    fn test_roundtrip_keeps_fragment_order() {
        let wb = parse_workbook(SAMPLE).unwrap();
        let xml = wb.to_xml_string();
        let wb2 = parse_workbook(&xml).unwrap();
        assert_eq!(wb.sheets, wb2.sheets);
        assert_eq!(wb.preserved, wb2.preserved);
        assert_eq!(wb.sheets_position, wb2.sheets_position);

        // Opaque children keep their exact bytes.
        assert!(xml.contains(r#"<fileVersion appName="xl" lastEdited="7" lowestEdited="7" rupBuild="27029"/>"#));
        assert!(xml.contains("<definedNames><definedName name=\"mine\">Data!$A$1</definedName></definedNames>"));
    }

    #[test]
    fn test_emit_sheet_state_attribute() {
        let wb = parse_workbook(SAMPLE).unwrap();
        let xml = wb.to_xml_string();
        assert!(xml.contains(r#"<sheet name="Secret" sheetId="4" state="veryHidden" r:id="rId2"/>"#));
        assert!(xml.contains(r#"<sheet name="Data" sheetId="1" r:id="rId1"/>"#));
    }

    #[test]
    fn test_default_workbook() {
        let wb = default_workbook(&["Sheet1".to_string(), "Sheet2".to_string()]);
        assert_eq!(wb.sheets.len(), 2);
        assert_eq!(wb.sheets[1].sheet_id, 2);
        assert_eq!(wb.sheets[1].rid, "rId2");
        let xml = wb.to_xml_string();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<sheets>"));
    }

    #[test]
    fn test_sheet_state_parse_and_attr() {
        assert_eq!(SheetState::parse("hidden"), SheetState::Hidden);
        assert_eq!(SheetState::parse("veryHidden"), SheetState::VeryHidden);
        assert_eq!(SheetState::parse("visible"), SheetState::Visible);
        assert_eq!(SheetState::Hidden.as_attr(), Some("hidden"));
        assert_eq!(SheetState::Visible.as_attr(), None);
    }

    #[test]
    fn test_parse_rejects_doctype() {
        assert!(parse_workbook("<!DOCTYPE wb><workbook/>").is_err());
    }

    #[test]
    fn test_workbook_without_sheets_splices_at_end() {
        let wb = parse_workbook("<workbook><workbookPr/></workbook>").unwrap();
        assert!(wb.sheets.is_empty());
        assert_eq!(wb.sheets_position, 1);
        let xml = wb.to_xml_string();
        assert!(xml.contains("<workbookPr/><sheets/>"));
    }
}
