//! OOXML namespace definitions.
//! Standard namespaces used across all XML documents.

// Core spreadsheet namespace
pub const SPREADSHEET_ML: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

// Relationship namespaces
pub const RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const PACKAGE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

// Content Types
pub const CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

// Markup Compatibility
pub const MC: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

// Revision extension namespaces used by table parts
pub const XR: &str = "http://schemas.microsoft.com/office/spreadsheetml/2014/revision";
pub const XR3: &str = "http://schemas.microsoft.com/office/spreadsheetml/2016/revision3";

// Accessibility extension carried on rows
pub const X14AC: &str = "http://schemas.microsoft.com/office/spreadsheetml/2009/9/ac";

// XML standard
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

// VML namespaces for legacy comment indicator shapes
pub const VML: &str = "urn:schemas-microsoft-com:vml";
pub const VML_OFFICE: &str = "urn:schemas-microsoft-com:office:office";
pub const VML_EXCEL: &str = "urn:schemas-microsoft-com:office:excel";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_constants_are_valid_uris() {
        // All namespace constants should be non-empty strings starting with http or urn
        let namespaces = [
            SPREADSHEET_ML,
            RELATIONSHIPS,
            PACKAGE_RELATIONSHIPS,
            CONTENT_TYPES,
            MC,
            XR,
            XR3,
            X14AC,
            XML,
            VML,
            VML_OFFICE,
            VML_EXCEL,
        ];
        for ns in namespaces {
            assert!(!ns.is_empty());
            assert!(
                ns.starts_with("http://") || ns.starts_with("urn:"),
                "Namespace should start with http:// or urn: but got: {ns}"
            );
        }
    }

    #[test]
    fn test_spreadsheet_ml_namespace() {
        assert_eq!(
            SPREADSHEET_ML,
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main"
        );
    }

    #[test]
    fn test_relationships_namespace() {
        assert_eq!(
            RELATIONSHIPS,
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships"
        );
    }
}
