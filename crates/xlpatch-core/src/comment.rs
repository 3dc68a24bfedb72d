//! Comment part assembly.
//!
//! Excel shows a comment's author inside the pop-up text, so emission
//! synthesizes a display prefix: a bold `"Author:"` run, then a run starting
//! with a newline carrying the user's body. Parsing strips exactly that
//! shape back off; comments written by other tools (any other shape) pass
//! through with their text intact.

use xlpatch_xml::comments::{Authors, CommentList, CommentText, CommentRun, CommentsXml};
use xlpatch_xml::shared_strings::T;
use xlpatch_xml::worksheet::{BoolProp, FloatProp, RunProps, ValProp};

use crate::aref::ARef;
use crate::error::{Error, Result};
use crate::rich_text::{RunFont, TextRun};
use crate::sheet::Comment;

/// Build the deduplicated author vector. The empty author, when any comment
/// is unauthored, sits at index 0; the rest follow in first-use order.
fn author_vector(comments: &[Comment]) -> Vec<String> {
    let mut authors: Vec<String> = Vec::new();
    if comments.iter().any(|c| c.author.is_empty()) {
        authors.push(String::new());
    }
    for comment in comments {
        if !comment.author.is_empty() && !authors.iter().any(|a| *a == comment.author) {
            authors.push(comment.author.clone());
        }
    }
    authors
}

fn prefix_run_props() -> RunProps {
    RunProps {
        b: Some(BoolProp::default()),
        sz: Some(FloatProp { val: 9.0 }),
        r_font: Some(ValProp {
            val: "Tahoma".to_string(),
        }),
        ..RunProps::default()
    }
}

fn body_run_props(font: Option<&RunFont>) -> Option<RunProps> {
    let font = font?;
    if font.is_default() {
        return None;
    }
    Some(RunProps {
        b: font.bold.then(BoolProp::default),
        i: font.italic.then(BoolProp::default),
        strike: font.strike.then(BoolProp::default),
        u: font.underline.as_ref().map(|u| xlpatch_xml::worksheet::UProp {
            val: (u != "single").then(|| u.clone()),
        }),
        sz: font.size.map(|val| FloatProp { val }),
        color: font.color_rgb.as_ref().map(|rgb| {
            xlpatch_xml::worksheet::ColorProp {
                rgb: Some(rgb.clone()),
                ..Default::default()
            }
        }),
        r_font: font.name.as_ref().map(|val| ValProp { val: val.clone() }),
        family: font.family.map(|val| xlpatch_xml::worksheet::IntProp { val }),
        scheme: font.scheme.as_ref().map(|val| ValProp { val: val.clone() }),
        vert_align: font.vert_align.as_ref().map(|val| ValProp { val: val.clone() }),
    })
}

fn text_el(value: String) -> T {
    let preserve = xlpatch_xml::shared_strings::needs_space_preserve(&value);
    T {
        xml_space: preserve.then(|| "preserve".to_string()),
        value,
    }
}

/// Assemble the comments part for one sheet.
pub(crate) fn build_comments_part(comments: &[Comment]) -> CommentsXml {
    let authors = author_vector(comments);

    let mut list = Vec::with_capacity(comments.len());
    for comment in comments {
        let author_id = authors
            .iter()
            .position(|a| *a == comment.author)
            .unwrap_or(0) as u32;

        let mut runs = Vec::with_capacity(comment.body.len() + 2);
        if comment.author.is_empty() {
            for run in &comment.body {
                runs.push(CommentRun {
                    rpr: body_run_props(run.font.as_ref()),
                    t: text_el(run.text.clone()),
                });
            }
        } else {
            runs.push(CommentRun {
                rpr: Some(prefix_run_props()),
                t: text_el(format!("{}:", comment.author)),
            });
            // An empty body emits the prefix run alone; the absence of any
            // second run is what marks it as empty on re-parse.
            for (i, run) in comment.body.iter().enumerate() {
                let text = if i == 0 {
                    format!("\n{}", run.text)
                } else {
                    run.text.clone()
                };
                runs.push(CommentRun {
                    rpr: body_run_props(run.font.as_ref()),
                    t: text_el(text),
                });
            }
        }

        list.push(xlpatch_xml::comments::CommentXml {
            r#ref: comment.cell.to_string(),
            author_id,
            guid: comment.guid.clone(),
            text: CommentText { runs, t: None },
        });
    }

    CommentsXml {
        xmlns: xlpatch_xml::namespaces::SPREADSHEET_ML.to_string(),
        authors: Authors { authors },
        comment_list: CommentList { comments: list },
    }
}

/// Parse a comments part back into domain comments, undoing the synthesized
/// author prefix when (and only when) its exact shape is present.
pub(crate) fn parse_comments_part(xml: &str, location: &str) -> Result<Vec<Comment>> {
    xlpatch_xml::secure::check_xml(xml).map_err(|e| Error::parse_in(location, e))?;
    let parsed: CommentsXml =
        quick_xml::de::from_str(xml).map_err(|e| Error::parse_in(location, e))?;

    let authors = &parsed.authors.authors;
    let mut comments = Vec::with_capacity(parsed.comment_list.comments.len());

    for c in &parsed.comment_list.comments {
        let author = authors
            .get(c.author_id as usize)
            .cloned()
            .ok_or_else(|| {
                Error::parse_in(
                    location,
                    format!("comment at {} references author {} of {}", c.r#ref, c.author_id, authors.len()),
                )
            })?;
        let cell: ARef = c
            .r#ref
            .parse()
            .map_err(|_| Error::parse_in(location, format!("bad comment ref '{}'", c.r#ref)))?;

        let mut runs: Vec<TextRun> = c
            .text
            .runs
            .iter()
            .map(|r| TextRun {
                text: r.t.value.clone(),
                font: r.rpr.as_ref().map(RunFont::from_props).filter(|f| !f.is_default()),
                raw_rpr_xml: None,
            })
            .collect();
        if runs.is_empty() {
            if let Some(ref t) = c.text.t {
                runs.push(TextRun::plain(t.value.clone()));
            }
        }

        let body = strip_author_prefix(runs, &author, &c.text);
        comments.push(Comment {
            cell,
            author,
            body,
            guid: c.guid.clone(),
        });
    }

    Ok(comments)
}

/// Undo the synthesized prefix iff the exact shape is present: a bold first
/// run equal to `"Author:"`, followed either by nothing (an empty body) or
/// by a run starting with a newline.
///
/// Splicing only removes the leading newline; a first body run whose text
/// normalizes to empty stays in place, since a user can author such a run.
fn strip_author_prefix(runs: Vec<TextRun>, author: &str, source: &CommentText) -> Vec<TextRun> {
    let prefix_matches = !author.is_empty()
        && !runs.is_empty()
        && source.runs.first().map(|r| r.is_bold()).unwrap_or(false)
        && runs[0].text == format!("{author}:");
    if !prefix_matches {
        return runs;
    }
    if runs.len() == 1 {
        return Vec::new();
    }
    if !runs[1].text.starts_with('\n') {
        return runs;
    }

    let mut body: Vec<TextRun> = runs.into_iter().skip(1).collect();
    body[0].text.remove(0);
    body
}
