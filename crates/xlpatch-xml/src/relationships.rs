//! Relationships XML schema structures.
//!
//! Used in `_rels/.rels`, `xl/_rels/workbook.xml.rels`, and per-sheet
//! relationship files. Emission sorts relationships by numeric `Id` so
//! regenerated parts are byte-stable.

use serde::{Deserialize, Serialize};

use crate::namespaces;

/// Relationships root element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Relationships")]
pub struct Relationships {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    #[serde(rename = "Relationship", default)]
    pub relationships: Vec<Relationship>,
}

/// Individual relationship entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "@Id")]
    pub id: String,

    #[serde(rename = "@Type")]
    pub rel_type: String,

    #[serde(rename = "@Target")]
    pub target: String,

    #[serde(rename = "@TargetMode", skip_serializing_if = "Option::is_none")]
    pub target_mode: Option<String>,
}

impl Relationships {
    /// An empty relationship set in the package-relationships namespace.
    pub fn empty() -> Self {
        Self {
            xmlns: namespaces::PACKAGE_RELATIONSHIPS.to_string(),
            relationships: Vec::new(),
        }
    }

    /// Look up a relationship by its `Id`.
    pub fn by_id(&self, id: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.id == id)
    }

    /// First relationship of the given type.
    pub fn by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.rel_type == rel_type)
    }

    /// All relationships of the given type, in document order.
    pub fn all_of_type<'a>(&'a self, rel_type: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.relationships
            .iter()
            .filter(move |r| r.rel_type == rel_type)
    }

    /// Append a relationship under the next free `rId{N}` and return the id.
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.next_rid();
        self.relationships.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode: None,
        });
        id
    }

    /// Next unused `rId{N}` identifier.
    pub fn next_rid(&self) -> String {
        let max = self
            .relationships
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }

    /// Canonical emission order: ascending numeric `Id`, non-`rId` ids last.
    pub fn sort_canonical(&mut self) {
        self.relationships.sort_by_key(|r| {
            r.id.strip_prefix("rId")
                .and_then(|n| n.parse::<u32>().ok())
                .unwrap_or(u32::MAX)
        });
    }
}

/// Creates the package-level relationships (`_rels/.rels`): a single
/// `officeDocument` relationship pointing at the workbook part.
pub fn package_rels() -> Relationships {
    Relationships {
        xmlns: namespaces::PACKAGE_RELATIONSHIPS.to_string(),
        relationships: vec![Relationship {
            id: "rId1".to_string(),
            rel_type: rel_types::OFFICE_DOCUMENT.to_string(),
            target: "xl/workbook.xml".to_string(),
            target_mode: None,
        }],
    }
}

/// Relationship type URI constants.
pub mod rel_types {
    // Package level
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

    // Workbook level
    pub const WORKSHEET: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
    pub const SHARED_STRINGS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
    pub const STYLES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
    pub const THEME: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";

    // Worksheet level
    pub const COMMENTS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
    pub const VML_DRAWING: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/vmlDrawing";
    pub const TABLE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/table";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_rels_factory() {
        let rels = package_rels();
        assert_eq!(rels.xmlns, namespaces::PACKAGE_RELATIONSHIPS);
        assert_eq!(rels.relationships.len(), 1);
        assert_eq!(rels.relationships[0].id, "rId1");
        assert_eq!(rels.relationships[0].rel_type, rel_types::OFFICE_DOCUMENT);
        assert_eq!(rels.relationships[0].target, "xl/workbook.xml");
        assert!(rels.relationships[0].target_mode.is_none());
    }

    #[test]
    fn test_by_id_and_by_type() {
        let mut rels = Relationships::empty();
        rels.add(rel_types::STYLES, "styles.xml");
        rels.add(rel_types::WORKSHEET, "worksheets/sheet1.xml");

        assert_eq!(rels.by_id("rId2").unwrap().target, "worksheets/sheet1.xml");
        assert_eq!(rels.by_type(rel_types::STYLES).unwrap().id, "rId1");
        assert!(rels.by_id("rId9").is_none());
        assert!(rels.by_type(rel_types::COMMENTS).is_none());
    }

    #[test]
    fn test_next_rid_skips_used_ids() {
        let mut rels = Relationships::empty();
        assert_eq!(rels.next_rid(), "rId1");
        rels.add(rel_types::WORKSHEET, "worksheets/sheet1.xml");
        rels.add(rel_types::WORKSHEET, "worksheets/sheet2.xml");
        assert_eq!(rels.next_rid(), "rId3");
    }

    #[test]
    fn test_sort_canonical_orders_numerically() {
        let mut rels = Relationships::empty();
        for id in ["rId10", "rId2", "rId1"] {
            rels.relationships.push(Relationship {
                id: id.to_string(),
                rel_type: rel_types::WORKSHEET.to_string(),
                target: "x".to_string(),
                target_mode: None,
            });
        }
        rels.sort_canonical();
        let ids: Vec<&str> = rels.relationships.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rId1", "rId2", "rId10"]);
    }

    #[test]
    fn test_relationships_roundtrip() {
        let rels = package_rels();
        let xml = quick_xml::se::to_string(&rels).unwrap();
        let parsed: Relationships = quick_xml::de::from_str(&xml).unwrap();
        assert_eq!(rels.xmlns, parsed.xmlns);
        assert_eq!(rels.relationships.len(), parsed.relationships.len());
        assert_eq!(rels.relationships[0].id, parsed.relationships[0].id);
    }

    #[test]
    fn test_relationship_with_target_mode() {
        let rel = Relationship {
            id: "rId1".to_string(),
            rel_type: "hyperlink".to_string(),
            target: "https://example.com".to_string(),
            target_mode: Some("External".to_string()),
        };
        let xml = quick_xml::se::to_string(&rel).unwrap();
        assert!(xml.contains("TargetMode=\"External\""));

        let parsed: Relationship = quick_xml::de::from_str(&xml).unwrap();
        assert_eq!(parsed.target_mode, Some("External".to_string()));
    }

    #[test]
    fn test_parse_real_excel_workbook_rels() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;

        let parsed: Relationships = quick_xml::de::from_str(xml).unwrap();
        assert_eq!(parsed.relationships.len(), 3);
        assert_eq!(parsed.relationships[0].rel_type, rel_types::WORKSHEET);
        assert_eq!(parsed.relationships[1].rel_type, rel_types::STYLES);
        assert_eq!(parsed.relationships[2].rel_type, rel_types::SHARED_STRINGS);
    }
}
