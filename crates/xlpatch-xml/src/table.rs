//! Table XML schema structures.
//!
//! Represents `xl/tables/table{N}.xml` in the OOXML package. Table parts are
//! always regenerated from the domain model, so emission is sink-driven with
//! the exact root attribute order Excel expects; parsing feeds the domain on
//! read.

use serde::{Deserialize, Serialize};

use crate::sink::XmlSink;
use crate::{namespaces, secure};

/// Root element for a table definition part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "table")]
pub struct TableXml {
    /// Workbook-unique table id.
    #[serde(rename = "@id")]
    pub id: u32,

    #[serde(rename = "@xr:uid", alias = "@uid", skip_serializing_if = "Option::is_none")]
    pub xr_uid: Option<String>,

    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@displayName")]
    pub display_name: String,

    #[serde(rename = "@ref")]
    pub reference: String,

    #[serde(rename = "@headerRowCount", skip_serializing_if = "Option::is_none")]
    pub header_row_count: Option<u32>,

    #[serde(rename = "@totalsRowCount", skip_serializing_if = "Option::is_none")]
    pub totals_row_count: Option<u32>,

    #[serde(rename = "@totalsRowShown", skip_serializing_if = "Option::is_none")]
    pub totals_row_shown: Option<bool>,

    #[serde(rename = "autoFilter", skip_serializing_if = "Option::is_none")]
    pub auto_filter: Option<TableAutoFilter>,

    #[serde(rename = "tableColumns")]
    pub table_columns: TableColumns,

    #[serde(rename = "tableStyleInfo", skip_serializing_if = "Option::is_none")]
    pub table_style_info: Option<TableStyleInfo>,
}

/// Auto-filter reference within a table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAutoFilter {
    #[serde(rename = "@ref")]
    pub reference: String,

    #[serde(rename = "@xr:uid", alias = "@uid", skip_serializing_if = "Option::is_none")]
    pub xr_uid: Option<String>,
}

/// Container for table column definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TableColumns {
    #[serde(rename = "@count")]
    pub count: u32,

    #[serde(rename = "tableColumn", default)]
    pub columns: Vec<TableColumn>,
}

/// A single column within a table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    #[serde(rename = "@id")]
    pub id: u32,

    #[serde(rename = "@xr3:uid", alias = "@uid", skip_serializing_if = "Option::is_none")]
    pub xr3_uid: Option<String>,

    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@totalsRowFunction", skip_serializing_if = "Option::is_none")]
    pub totals_row_function: Option<String>,

    #[serde(rename = "@totalsRowLabel", skip_serializing_if = "Option::is_none")]
    pub totals_row_label: Option<String>,
}

/// Style information for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TableStyleInfo {
    #[serde(rename = "@name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "@showFirstColumn", skip_serializing_if = "Option::is_none")]
    pub show_first_column: Option<bool>,

    #[serde(rename = "@showLastColumn", skip_serializing_if = "Option::is_none")]
    pub show_last_column: Option<bool>,

    #[serde(rename = "@showRowStripes", skip_serializing_if = "Option::is_none")]
    pub show_row_stripes: Option<bool>,

    #[serde(rename = "@showColumnStripes", skip_serializing_if = "Option::is_none")]
    pub show_column_stripes: Option<bool>,
}

/// Parse a table part.
pub fn parse_table(xml: &str) -> Result<TableXml, crate::fragment::FragmentError> {
    secure::check_xml(xml).map_err(|e| crate::fragment::FragmentError::Malformed {
        position: 0,
        message: e.to_string(),
    })?;
    quick_xml::de::from_str(xml).map_err(|e| crate::fragment::FragmentError::Malformed {
        position: 0,
        message: e.to_string(),
    })
}

fn bool_attr(v: bool) -> &'static str {
    if v {
        "1"
    } else {
        "0"
    }
}

/// Emit a table part with the namespace set and attribute order Excel
/// expects on the root element.
pub fn write_table(sink: &mut dyn XmlSink, table: &TableXml) {
    sink.start_document();
    sink.start_element("table");
    sink.attr("xmlns", namespaces::SPREADSHEET_ML);
    sink.attr("xmlns:mc", namespaces::MC);
    sink.attr("mc:Ignorable", "xr xr3");
    sink.attr("xmlns:xr", namespaces::XR);
    sink.attr("xmlns:xr3", namespaces::XR3);
    sink.attr("id", &table.id.to_string());
    if let Some(ref uid) = table.xr_uid {
        sink.attr("xr:uid", uid);
    }
    sink.attr("name", &table.name);
    sink.attr("displayName", &table.display_name);
    sink.attr("ref", &table.reference);
    if let Some(n) = table.header_row_count {
        sink.attr("headerRowCount", &n.to_string());
    }
    if let Some(n) = table.totals_row_count {
        sink.attr("totalsRowCount", &n.to_string());
    }
    if let Some(shown) = table.totals_row_shown {
        sink.attr("totalsRowShown", bool_attr(shown));
    }

    if let Some(ref af) = table.auto_filter {
        sink.start_element("autoFilter");
        sink.attr("ref", &af.reference);
        if let Some(ref uid) = af.xr_uid {
            sink.attr("xr:uid", uid);
        }
        sink.end_element();
    }

    sink.start_element("tableColumns");
    sink.attr("count", &table.table_columns.columns.len().to_string());
    for col in &table.table_columns.columns {
        sink.start_element("tableColumn");
        sink.attr("id", &col.id.to_string());
        if let Some(ref uid) = col.xr3_uid {
            sink.attr("xr3:uid", uid);
        }
        sink.attr("name", &col.name);
        if let Some(ref f) = col.totals_row_function {
            sink.attr("totalsRowFunction", f);
        }
        if let Some(ref l) = col.totals_row_label {
            sink.attr("totalsRowLabel", l);
        }
        sink.end_element();
    }
    sink.end_element();

    if let Some(ref info) = table.table_style_info {
        sink.start_element("tableStyleInfo");
        if let Some(ref name) = info.name {
            sink.attr("name", name);
        }
        if let Some(v) = info.show_first_column {
            sink.attr("showFirstColumn", bool_attr(v));
        }
        if let Some(v) = info.show_last_column {
            sink.attr("showLastColumn", bool_attr(v));
        }
        if let Some(v) = info.show_row_stripes {
            sink.attr("showRowStripes", bool_attr(v));
        }
        if let Some(v) = info.show_column_stripes {
            sink.attr("showColumnStripes", bool_attr(v));
        }
        sink.end_element();
    }

    sink.end_element();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::WriterSink;

    fn sample_table() -> TableXml {
        TableXml {
            id: 1,
            xr_uid: Some("{00000000-000C-0000-FFFF-FFFF00000000}".to_string()),
            name: "Table1".to_string(),
            display_name: "Table1".to_string(),
            reference: "A1:B4".to_string(),
            header_row_count: None,
            totals_row_count: None,
            totals_row_shown: Some(false),
            auto_filter: Some(TableAutoFilter {
                reference: "A1:B4".to_string(),
                xr_uid: Some("{00000000-0001-0000-FFFF-FFFF00000000}".to_string()),
            }),
            table_columns: TableColumns {
                count: 2,
                columns: vec![
                    TableColumn {
                        id: 1,
                        xr3_uid: Some("{00000000-0010-0000-FFFF-FFFF00000000}".to_string()),
                        name: "Name".to_string(),
                        totals_row_function: None,
                        totals_row_label: None,
                    },
                    TableColumn {
                        id: 2,
                        xr3_uid: Some("{00000000-0010-0001-FFFF-FFFF00000000}".to_string()),
                        name: "Amount".to_string(),
                        totals_row_function: None,
                        totals_row_label: None,
                    },
                ],
            },
            table_style_info: Some(TableStyleInfo {
                name: Some("TableStyleMedium2".to_string()),
                show_first_column: Some(false),
                show_last_column: Some(false),
                show_row_stripes: Some(true),
                show_column_stripes: Some(false),
            }),
        }
    }

    fn emit(table: &TableXml) -> String {
        let mut buf = Vec::new();
        {
            let mut sink = WriterSink::new(&mut buf);
            write_table(&mut sink, table);
            sink.into_inner();
        }
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_write_table_root_attr_order() {
        let xml = emit(&sample_table());
        let root_start = xml.find("<table ").unwrap();
        let root_end = xml[root_start..].find('>').unwrap() + root_start;
        let root = &xml[root_start..root_end];

        // Namespace declarations first (sorted), then the schema attributes.
        let positions: Vec<usize> = [
            "xmlns=",
            "xmlns:mc=",
            "xmlns:xr=",
            "xmlns:xr3=",
            "mc:Ignorable=",
            "id=",
            "xr:uid=",
            "name=",
            "displayName=",
            "ref=",
            "totalsRowShown=",
        ]
        .iter()
        .map(|a| root.find(a).unwrap_or_else(|| panic!("missing {a}")))
        .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted, "root attributes out of order: {root}");
    }

    #[test]
    fn test_write_table_columns_and_filter() {
        let xml = emit(&sample_table());
        assert!(xml.contains(r#"<autoFilter ref="A1:B4" xr:uid="{00000000-0001-0000-FFFF-FFFF00000000}"/>"#));
        assert!(xml.contains(r#"<tableColumns count="2">"#));
        assert!(xml.contains(r#"<tableColumn id="2" xr3:uid="{00000000-0010-0001-FFFF-FFFF00000000}" name="Amount"/>"#));
        assert!(xml.contains(r#"<tableStyleInfo name="TableStyleMedium2" showFirstColumn="0" showLastColumn="0" showRowStripes="1" showColumnStripes="0"/>"#));
    }

    #[test]
    fn test_emit_parse_roundtrip() {
        let table = sample_table();
        let xml = emit(&table);
        let parsed = parse_table(&xml).unwrap();
        assert_eq!(parsed.id, table.id);
        assert_eq!(parsed.name, table.name);
        assert_eq!(parsed.display_name, table.display_name);
        assert_eq!(parsed.reference, table.reference);
        assert_eq!(parsed.xr_uid, table.xr_uid);
        assert_eq!(parsed.table_columns.columns.len(), 2);
        assert_eq!(parsed.table_columns.columns[1].name, "Amount");
        assert_eq!(
            parsed.auto_filter.as_ref().unwrap().reference,
            "A1:B4"
        );
    }

    #[test]
    fn test_parse_real_excel_table() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<table xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" id="2" name="Sales" displayName="Sales" ref="C1:D9" totalsRowCount="1">
  <autoFilter ref="C1:D8"/>
  <tableColumns count="2">
    <tableColumn id="1" name="Region"/>
    <tableColumn id="2" name="Total" totalsRowFunction="sum"/>
  </tableColumns>
</table>"#;
        let parsed = parse_table(xml).unwrap();
        assert_eq!(parsed.id, 2);
        assert_eq!(parsed.totals_row_count, Some(1));
        assert!(parsed.xr_uid.is_none());
        assert_eq!(
            parsed.table_columns.columns[1].totals_row_function.as_deref(),
            Some("sum")
        );
        assert!(parsed.table_style_info.is_none());
    }

    #[test]
    fn test_parse_rejects_doctype() {
        assert!(parse_table("<!DOCTYPE t><table/>").is_err());
    }
}
