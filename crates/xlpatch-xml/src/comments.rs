//! Comments XML schema structures.
//!
//! Represents `xl/comments{N}.xml` in the OOXML package. The display-text
//! conventions (synthesized author prefix, prefix stripping on read) live in
//! the core crate; this module is the schema layer.

use serde::{Deserialize, Serialize};

use crate::namespaces;
use crate::shared_strings::T;
use crate::worksheet::RunProps;

/// Comments root element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "comments")]
pub struct CommentsXml {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    #[serde(rename = "authors")]
    pub authors: Authors,

    #[serde(rename = "commentList")]
    pub comment_list: CommentList,
}

/// Authors container. Index position is the `authorId` referenced by comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Authors {
    #[serde(rename = "author", default)]
    pub authors: Vec<String>,
}

/// Comment list container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CommentList {
    #[serde(rename = "comment", default)]
    pub comments: Vec<CommentXml>,
}

/// Individual comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentXml {
    #[serde(rename = "@ref")]
    pub r#ref: String,

    #[serde(rename = "@authorId")]
    pub author_id: u32,

    #[serde(rename = "@guid", skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,

    #[serde(rename = "text")]
    pub text: CommentText,
}

/// Comment text content: rich runs, or a bare `<t>` from minimal writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CommentText {
    #[serde(rename = "r", default)]
    pub runs: Vec<CommentRun>,

    #[serde(rename = "t", skip_serializing_if = "Option::is_none")]
    pub t: Option<T>,
}

/// A text run within a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRun {
    #[serde(rename = "rPr", skip_serializing_if = "Option::is_none")]
    pub rpr: Option<RunProps>,

    #[serde(rename = "t")]
    pub t: T,
}

impl CommentRun {
    /// Whether this run is rendered bold.
    pub fn is_bold(&self) -> bool {
        self.rpr
            .as_ref()
            .and_then(|p| p.b.as_ref())
            .map(|b| b.is_set())
            .unwrap_or(false)
    }
}

impl Default for CommentsXml {
    fn default() -> Self {
        Self {
            xmlns: namespaces::SPREADSHEET_ML.to_string(),
            authors: Authors::default(),
            comment_list: CommentList::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_default() {
        let comments = CommentsXml::default();
        assert_eq!(comments.xmlns, namespaces::SPREADSHEET_ML);
        assert!(comments.authors.authors.is_empty());
        assert!(comments.comment_list.comments.is_empty());
    }

    #[test]
    fn test_comments_roundtrip() {
        let comments = CommentsXml {
            xmlns: namespaces::SPREADSHEET_ML.to_string(),
            authors: Authors {
                authors: vec!["".to_string(), "Reviewer".to_string()],
            },
            comment_list: CommentList {
                comments: vec![CommentXml {
                    r#ref: "B2".to_string(),
                    author_id: 1,
                    guid: None,
                    text: CommentText {
                        runs: vec![CommentRun {
                            rpr: None,
                            t: T {
                                xml_space: None,
                                value: "Check this".to_string(),
                            },
                        }],
                        t: None,
                    },
                }],
            },
        };

        let xml = quick_xml::se::to_string(&comments).unwrap();
        let parsed: CommentsXml = quick_xml::de::from_str(&xml).unwrap();
        assert_eq!(parsed.authors.authors.len(), 2);
        assert_eq!(parsed.comment_list.comments[0].r#ref, "B2");
        assert_eq!(parsed.comment_list.comments[0].author_id, 1);
        assert_eq!(parsed.comment_list.comments[0].text.runs[0].t.value, "Check this");
    }

    #[test]
    fn test_parse_real_excel_comment_with_bold_run() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<comments xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <authors><author>Alice</author></authors>
  <commentList>
    <comment ref="A1" authorId="0">
      <text>
        <r><rPr><b/><sz val="9"/></rPr><t>Alice:</t></r>
        <r><rPr><sz val="9"/></rPr><t xml:space="preserve">
note body</t></r>
      </text>
    </comment>
  </commentList>
</comments>"#;

        let parsed: CommentsXml = quick_xml::de::from_str(xml).unwrap();
        let comment = &parsed.comment_list.comments[0];
        assert_eq!(comment.text.runs.len(), 2);
        assert!(comment.text.runs[0].is_bold());
        assert_eq!(comment.text.runs[0].t.value, "Alice:");
        assert!(!comment.text.runs[1].is_bold());
        assert!(comment.text.runs[1].t.value.starts_with('\n'));
    }

    #[test]
    fn test_comment_guid_passthrough() {
        let c = CommentXml {
            r#ref: "A1".to_string(),
            author_id: 0,
            guid: Some("{11111111-2222-3333-4444-555555555555}".to_string()),
            text: CommentText::default(),
        };
        let xml = quick_xml::se::to_string_with_root("comment", &c).unwrap();
        assert!(xml.contains("guid=\"{11111111-2222-3333-4444-555555555555}\""));
        let parsed: CommentXml = quick_xml::de::from_str(&xml).unwrap();
        assert_eq!(parsed.guid, c.guid);
    }

    #[test]
    fn test_plain_t_only_comment() {
        let xml = r#"<comment ref="C3" authorId="0"><text><t>bare</t></text></comment>"#;
        let parsed: CommentXml = quick_xml::de::from_str(xml).unwrap();
        assert!(parsed.text.runs.is_empty());
        assert_eq!(parsed.text.t.as_ref().unwrap().value, "bare");
    }
}
