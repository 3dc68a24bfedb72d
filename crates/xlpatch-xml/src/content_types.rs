//! [Content_Types].xml schema structures.
//!
//! Defines the content types for all parts in the OOXML package. Emission is
//! canonicalized: `<Default>` entries sorted by extension, `<Override>`
//! entries sorted by part name, so regenerated packages are byte-stable.

use serde::{Deserialize, Serialize};

use crate::namespaces;

/// `[Content_Types].xml` root element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Types")]
pub struct ContentTypes {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    #[serde(rename = "Default", default)]
    pub defaults: Vec<ContentTypeDefault>,

    #[serde(rename = "Override", default)]
    pub overrides: Vec<ContentTypeOverride>,
}

/// Extension-based default content type mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeDefault {
    #[serde(rename = "@Extension")]
    pub extension: String,

    #[serde(rename = "@ContentType")]
    pub content_type: String,
}

/// Path-specific content type override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeOverride {
    #[serde(rename = "@PartName")]
    pub part_name: String,

    #[serde(rename = "@ContentType")]
    pub content_type: String,
}

impl ContentTypes {
    /// Register a default mapping unless the extension is already present.
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) {
        if !self.defaults.iter().any(|d| d.extension == extension) {
            self.defaults.push(ContentTypeDefault {
                extension: extension.to_string(),
                content_type: content_type.to_string(),
            });
        }
    }

    /// Register an override for `part_name` (leading slash included),
    /// replacing any previous entry for the same part.
    pub fn set_override(&mut self, part_name: &str, content_type: &str) {
        self.overrides.retain(|o| o.part_name != part_name);
        self.overrides.push(ContentTypeOverride {
            part_name: part_name.to_string(),
            content_type: content_type.to_string(),
        });
    }

    /// Remove the override for `part_name`, if any.
    pub fn remove_override(&mut self, part_name: &str) {
        self.overrides.retain(|o| o.part_name != part_name);
    }

    /// Look up the content type for a part path (leading slash included).
    pub fn content_type_of(&self, part_name: &str) -> Option<&str> {
        if let Some(o) = self.overrides.iter().find(|o| o.part_name == part_name) {
            return Some(&o.content_type);
        }
        let ext = part_name.rsplit('.').next()?;
        self.defaults
            .iter()
            .find(|d| d.extension.eq_ignore_ascii_case(ext))
            .map(|d| d.content_type.as_str())
    }

    /// Canonical emission order: defaults by extension, overrides by part name.
    pub fn sort_canonical(&mut self) {
        self.defaults.sort_by(|a, b| a.extension.cmp(&b.extension));
        self.overrides.sort_by(|a, b| a.part_name.cmp(&b.part_name));
    }
}

impl Default for ContentTypes {
    fn default() -> Self {
        Self {
            xmlns: namespaces::CONTENT_TYPES.to_string(),
            defaults: vec![
                ContentTypeDefault {
                    extension: "rels".to_string(),
                    content_type: mime_types::RELS.to_string(),
                },
                ContentTypeDefault {
                    extension: "xml".to_string(),
                    content_type: mime_types::XML.to_string(),
                },
            ],
            overrides: vec![
                ContentTypeOverride {
                    part_name: "/xl/workbook.xml".to_string(),
                    content_type: mime_types::WORKBOOK.to_string(),
                },
                ContentTypeOverride {
                    part_name: "/xl/worksheets/sheet1.xml".to_string(),
                    content_type: mime_types::WORKSHEET.to_string(),
                },
                ContentTypeOverride {
                    part_name: "/xl/styles.xml".to_string(),
                    content_type: mime_types::STYLES.to_string(),
                },
            ],
        }
    }
}

/// Standard content type MIME string constants.
pub mod mime_types {
    // Default extensions
    pub const RELS: &str = "application/vnd.openxmlformats-package.relationships+xml";
    pub const XML: &str = "application/xml";

    // Workbook
    pub const WORKBOOK: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";

    // Worksheet
    pub const WORKSHEET: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

    // Shared elements
    pub const SHARED_STRINGS: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
    pub const STYLES: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
    pub const THEME: &str = "application/vnd.openxmlformats-officedocument.theme+xml";

    // Table
    pub const TABLE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.table+xml";

    // Comments and their VML indicator shapes
    pub const COMMENTS: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.comments+xml";
    pub const VML_DRAWING: &str = "application/vnd.openxmlformats-officedocument.vmlDrawing";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types_default() {
        let ct = ContentTypes::default();
        assert_eq!(ct.xmlns, namespaces::CONTENT_TYPES);
        assert_eq!(ct.defaults.len(), 2);

        let part_names: Vec<&str> = ct.overrides.iter().map(|o| o.part_name.as_str()).collect();
        assert!(part_names.contains(&"/xl/workbook.xml"));
        assert!(part_names.contains(&"/xl/worksheets/sheet1.xml"));
        assert!(part_names.contains(&"/xl/styles.xml"));
    }

    #[test]
    fn test_content_types_roundtrip() {
        let ct = ContentTypes::default();
        let xml = quick_xml::se::to_string(&ct).unwrap();
        let parsed: ContentTypes = quick_xml::de::from_str(&xml).unwrap();
        assert_eq!(ct.defaults.len(), parsed.defaults.len());
        assert_eq!(ct.overrides.len(), parsed.overrides.len());
        assert_eq!(ct.xmlns, parsed.xmlns);
    }

    #[test]
    fn test_sort_canonical() {
        let mut ct = ContentTypes::default();
        ct.ensure_default("vml", mime_types::VML_DRAWING);
        ct.set_override("/xl/comments1.xml", mime_types::COMMENTS);
        ct.sort_canonical();

        let exts: Vec<&str> = ct.defaults.iter().map(|d| d.extension.as_str()).collect();
        assert_eq!(exts, vec!["rels", "vml", "xml"]);

        let mut sorted = ct.overrides.clone();
        sorted.sort_by(|a, b| a.part_name.cmp(&b.part_name));
        assert_eq!(ct.overrides, sorted);
    }

    #[test]
    fn test_ensure_default_is_idempotent() {
        let mut ct = ContentTypes::default();
        ct.ensure_default("vml", mime_types::VML_DRAWING);
        ct.ensure_default("vml", mime_types::VML_DRAWING);
        assert_eq!(ct.defaults.iter().filter(|d| d.extension == "vml").count(), 1);
    }

    #[test]
    fn test_set_override_replaces() {
        let mut ct = ContentTypes::default();
        ct.set_override("/xl/sharedStrings.xml", mime_types::SHARED_STRINGS);
        ct.set_override("/xl/sharedStrings.xml", mime_types::SHARED_STRINGS);
        assert_eq!(
            ct.overrides
                .iter()
                .filter(|o| o.part_name == "/xl/sharedStrings.xml")
                .count(),
            1
        );
    }

    #[test]
    fn test_content_type_of_prefers_override() {
        let ct = ContentTypes::default();
        assert_eq!(
            ct.content_type_of("/xl/workbook.xml"),
            Some(mime_types::WORKBOOK)
        );
        assert_eq!(ct.content_type_of("/xl/anything.xml"), Some(mime_types::XML));
        assert_eq!(ct.content_type_of("/xl/media/image1.png"), None);
    }

    #[test]
    fn test_parse_real_excel_content_types() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
  <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
  <Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
</Types>"#;

        let parsed: ContentTypes = quick_xml::de::from_str(xml).unwrap();
        assert_eq!(parsed.defaults.len(), 2);
        assert_eq!(parsed.overrides.len(), 4);
        assert_eq!(parsed.overrides[0].part_name, "/xl/workbook.xml");
    }
}
