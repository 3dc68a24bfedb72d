use std::io::{Cursor, Read};

use pretty_assertions::assert_eq;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use xlpatch::style::{FontSpec, FillSpec};
use xlpatch::{ARef, CellStyle, CellValue, Comment, Config, SstPolicy, TextRun, Workbook};

fn aref(s: &str) -> ARef {
    ARef::parse(s).unwrap()
}

fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

fn entry_bytes(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut out = Vec::new();
    archive
        .by_name(name)
        .unwrap_or_else(|_| panic!("missing entry {name}"))
        .read_to_end(&mut out)
        .unwrap();
    out
}

fn entry_string(bytes: &[u8], name: &str) -> String {
    String::from_utf8(entry_bytes(bytes, name)).unwrap()
}

#[test]
fn test_create_and_save_empty_workbook() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.xlsx");

    let wb = Workbook::new();
    wb.save(&path).unwrap();

    assert!(path.exists());
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn test_empty_workbook_roundtrip() {
    let wb = Workbook::new();
    let buf = wb.save_to_buffer().unwrap();

    let wb2 = Workbook::open_buffer(&buf).unwrap();
    assert_eq!(wb2.sheet_names(), vec!["Sheet1"]);
    assert_eq!(wb2.sheet("Sheet1").unwrap().cell_count(), 0);

    // Styles carry one default cellXf; no shared strings part.
    let styles = entry_string(&buf, "xl/styles.xml");
    assert!(styles.contains("<cellXfs count=\"1\">"));
    assert!(!entry_names(&buf).contains(&"xl/sharedStrings.xml".to_string()));
}

#[test]
fn test_single_cell_write_inline() {
    let mut wb = Workbook::new();
    wb.set_value("Sheet1", aref("B2"), CellValue::Text("hi".to_string()))
        .unwrap();
    let config = Config {
        sst_policy: SstPolicy::Never,
        ..Config::default()
    };
    let buf = wb.save_to_buffer_with(config).unwrap();
    let sheet = entry_string(&buf, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<c r="B2" t="inlineStr"><is><t>hi</t></is></c>"#));
    assert!(sheet.contains(r#"<dimension ref="B2"/>"#));
}

#[test]
fn test_value_roundtrip_all_kinds() {
    let mut wb = Workbook::new();
    wb.set_value("Sheet1", aref("A1"), CellValue::Number(3.5)).unwrap();
    wb.set_value("Sheet1", aref("A2"), CellValue::Bool(true)).unwrap();
    wb.set_value("Sheet1", aref("A3"), CellValue::Text("text".to_string()))
        .unwrap();
    wb.set_value(
        "Sheet1",
        aref("A4"),
        CellValue::Formula {
            expr: "A1*2".to_string(),
            cached: Some(Box::new(CellValue::Number(7.0))),
        },
    )
    .unwrap();
    wb.set_value(
        "Sheet1",
        aref("A5"),
        CellValue::Error(xlpatch::CellErrorKind::NA),
    )
    .unwrap();
    wb.set_value(
        "Sheet1",
        aref("A6"),
        CellValue::RichText(vec![
            TextRun::styled(
                "Bold",
                xlpatch::RunFont {
                    bold: true,
                    ..Default::default()
                },
            ),
            TextRun::plain(" rest"),
        ]),
    )
    .unwrap();

    let buf = wb.save_to_buffer().unwrap();
    let wb2 = Workbook::open_buffer(&buf).unwrap();

    assert_eq!(wb2.value("Sheet1", aref("A1")).unwrap(), CellValue::Number(3.5));
    assert_eq!(wb2.value("Sheet1", aref("A2")).unwrap(), CellValue::Bool(true));
    assert_eq!(
        wb2.value("Sheet1", aref("A3")).unwrap(),
        CellValue::Text("text".to_string())
    );
    assert_eq!(
        wb2.value("Sheet1", aref("A4")).unwrap(),
        CellValue::Formula {
            expr: "A1*2".to_string(),
            cached: Some(Box::new(CellValue::Number(7.0))),
        }
    );
    assert_eq!(
        wb2.value("Sheet1", aref("A5")).unwrap(),
        CellValue::Error(xlpatch::CellErrorKind::NA)
    );
    match wb2.value("Sheet1", aref("A6")).unwrap() {
        CellValue::RichText(runs) => {
            assert_eq!(runs.len(), 2);
            assert_eq!(runs[0].text, "Bold");
            assert_eq!(runs[1].text, " rest");
        }
        other => panic!("expected rich text, got {other:?}"),
    }
}

#[test]
fn test_merge_and_row_props_roundtrip() {
    let mut wb = Workbook::new();
    wb.merge_cells("Sheet1", "A1:B2".parse().unwrap()).unwrap();
    wb.set_row_props(
        "Sheet1",
        4,
        xlpatch::RowProps {
            height: Some(30.0),
            hidden: true,
            ..Default::default()
        },
    )
    .unwrap();

    let buf = wb.save_to_buffer().unwrap();
    let wb2 = Workbook::open_buffer(&buf).unwrap();
    assert_eq!(wb2.sheet("Sheet1").unwrap().merges().len(), 1);
    assert_eq!(wb2.sheet("Sheet1").unwrap().merges()[0].to_string(), "A1:B2");

    let sheet_xml = entry_string(&buf, "xl/worksheets/sheet1.xml");
    assert!(sheet_xml.contains(r#"<row r="5" ht="30" hidden="1" customHeight="1"/>"#));
}

#[test]
fn test_clean_verbatim_copy_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.xlsx");
    let target = dir.path().join("copy.xlsx");

    let mut wb = Workbook::new();
    wb.set_value("Sheet1", aref("A1"), CellValue::Text("stable".to_string()))
        .unwrap();
    wb.add_sheet("Two").unwrap();
    wb.set_value("Two", aref("C3"), CellValue::Number(9.0)).unwrap();
    wb.save(&source).unwrap();

    let read_back = Workbook::open(&source).unwrap();
    assert!(read_back.is_clean());
    read_back.save(&target).unwrap();

    let a = std::fs::read(&source).unwrap();
    let b = std::fs::read(&target).unwrap();
    assert_eq!(Sha256::digest(&a), Sha256::digest(&b));
}

#[test]
fn test_verbatim_copy_detects_source_change() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.xlsx");
    let target = dir.path().join("copy.xlsx");

    let wb = Workbook::new();
    wb.save(&source).unwrap();

    let read_back = Workbook::open(&source).unwrap();
    // Replace the source with different content of a different size.
    std::fs::write(&source, b"tampered").unwrap();

    let err = read_back.save(&target).unwrap_err();
    assert!(matches!(err, xlpatch::Error::FingerprintMismatch));
    assert!(!target.exists());
}

#[test]
fn test_surgical_edit_preserves_untouched_sheets() {
    // Build a 3-sheet workbook, then edit only the middle sheet.
    let mut wb = Workbook::new();
    wb.set_value("Sheet1", aref("A1"), CellValue::Text("one".to_string()))
        .unwrap();
    wb.add_sheet("Middle").unwrap();
    wb.set_value("Middle", aref("A1"), CellValue::Text("two".to_string()))
        .unwrap();
    wb.add_sheet("Last").unwrap();
    wb.set_value("Last", aref("A1"), CellValue::Text("three".to_string()))
        .unwrap();
    let original = wb.save_to_buffer().unwrap();

    let mut edited = Workbook::open_buffer(&original).unwrap();
    assert!(edited.is_clean());
    edited
        .set_value("Middle", aref("A1"), CellValue::Number(42.0))
        .unwrap();
    assert!(!edited.is_clean());
    let patched = edited.save_to_buffer().unwrap();

    // Untouched sheet entries are byte-identical.
    assert_eq!(
        entry_bytes(&original, "xl/worksheets/sheet1.xml"),
        entry_bytes(&patched, "xl/worksheets/sheet1.xml")
    );
    assert_eq!(
        entry_bytes(&original, "xl/worksheets/sheet3.xml"),
        entry_bytes(&patched, "xl/worksheets/sheet3.xml")
    );
    // The edited sheet changed.
    assert_ne!(
        entry_bytes(&original, "xl/worksheets/sheet2.xml"),
        entry_bytes(&patched, "xl/worksheets/sheet2.xml")
    );
    let sheet2 = entry_string(&patched, "xl/worksheets/sheet2.xml");
    assert!(sheet2.contains("<v>42</v>"));

    // Structural parts are present and the workbook still reads.
    let names = entry_names(&patched);
    assert!(names.contains(&"[Content_Types].xml".to_string()));
    assert!(names.contains(&"xl/workbook.xml".to_string()));
    let reread = Workbook::open_buffer(&patched).unwrap();
    assert_eq!(reread.value("Middle", aref("A1")).unwrap(), CellValue::Number(42.0));
    assert_eq!(
        reread.value("Last", aref("A1")).unwrap(),
        CellValue::Text("three".to_string())
    );
}

#[test]
fn test_surgical_edit_copies_sst_verbatim_when_no_new_strings() {
    let mut wb = Workbook::new();
    wb.add_sheet("Two").unwrap();
    // Force a shared-strings part with duplicates.
    for row in 1..=6 {
        wb.set_value("Sheet1", aref(&format!("A{row}")), CellValue::Text("dup".to_string()))
            .unwrap();
        wb.set_value("Two", aref(&format!("A{row}")), CellValue::Text("dup".to_string()))
            .unwrap();
    }
    let original = wb.save_to_buffer().unwrap();
    assert!(entry_names(&original).contains(&"xl/sharedStrings.xml".to_string()));

    // Edit sheet 2 using only strings the table already holds.
    let mut edited = Workbook::open_buffer(&original).unwrap();
    edited
        .set_value("Two", aref("B1"), CellValue::Text("dup".to_string()))
        .unwrap();
    let patched = edited.save_to_buffer().unwrap();
    assert_eq!(
        entry_bytes(&original, "xl/sharedStrings.xml"),
        entry_bytes(&patched, "xl/sharedStrings.xml")
    );

    // A new string forces regeneration: original entries keep their indices.
    let mut extended = Workbook::open_buffer(&original).unwrap();
    extended
        .set_value("Two", aref("B1"), CellValue::Text("fresh".to_string()))
        .unwrap();
    let grown = extended.save_to_buffer().unwrap();
    let sst = entry_string(&grown, "xl/sharedStrings.xml");
    let dup_pos = sst.find("<t>dup</t>").unwrap();
    let fresh_pos = sst.find("<t>fresh</t>").unwrap();
    assert!(dup_pos < fresh_pos);

    let reread = Workbook::open_buffer(&grown).unwrap();
    assert_eq!(
        reread.value("Sheet1", aref("A1")).unwrap(),
        CellValue::Text("dup".to_string())
    );
    assert_eq!(
        reread.value("Two", aref("B1")).unwrap(),
        CellValue::Text("fresh".to_string())
    );
}

#[test]
fn test_style_reuse_across_sheets() {
    let mut wb = Workbook::new();
    wb.add_sheet("Two").unwrap();
    let style = CellStyle {
        font: Some(FontSpec {
            bold: true,
            size: Some(14.0),
            ..Default::default()
        }),
        fill: Some(FillSpec::solid("FFFFFF00")),
        ..Default::default()
    };
    wb.set_value("Sheet1", aref("A1"), CellValue::Number(1.0)).unwrap();
    wb.set_style("Sheet1", aref("A1"), style.clone()).unwrap();
    wb.set_value("Two", aref("B2"), CellValue::Number(2.0)).unwrap();
    wb.set_style("Two", aref("B2"), style).unwrap();

    let buf = wb.save_to_buffer().unwrap();
    let styles = entry_string(&buf, "xl/styles.xml");
    // Default plus exactly one shared style record.
    assert!(styles.contains("<cellXfs count=\"2\">"), "{styles}");

    let sheet1 = entry_string(&buf, "xl/worksheets/sheet1.xml");
    let sheet2 = entry_string(&buf, "xl/worksheets/sheet2.xml");
    assert!(sheet1.contains(r#"<c r="A1" s="1">"#), "{sheet1}");
    assert!(sheet2.contains(r#"<c r="B2" s="1">"#), "{sheet2}");

    // Re-read: both cells carry the same style content.
    let wb2 = Workbook::open_buffer(&buf).unwrap();
    let s1 = wb2.sheet("Sheet1").unwrap().style(aref("A1")).unwrap().clone();
    let s2 = wb2.sheet("Two").unwrap().style(aref("B2")).unwrap().clone();
    assert_eq!(s1.canonical_key(), s2.canonical_key());
    assert!(s1.font.as_ref().unwrap().bold);
}

#[test]
fn test_surgical_edit_keeps_untouched_style_indices_valid() {
    let mut wb = Workbook::new();
    wb.add_sheet("Two").unwrap();
    wb.set_value("Sheet1", aref("A1"), CellValue::Number(1.0)).unwrap();
    wb.set_style(
        "Sheet1",
        aref("A1"),
        CellStyle {
            font: Some(FontSpec {
                italic: true,
                ..Default::default()
            }),
            ..Default::default()
        },
    )
    .unwrap();
    let original = wb.save_to_buffer().unwrap();

    // Touch only sheet 2 with a brand-new style.
    let mut edited = Workbook::open_buffer(&original).unwrap();
    edited.set_value("Two", aref("A1"), CellValue::Number(2.0)).unwrap();
    edited
        .set_style(
            "Two",
            aref("A1"),
            CellStyle {
                fill: Some(FillSpec::solid("FF00B0F0")),
                ..Default::default()
            },
        )
        .unwrap();
    let patched = edited.save_to_buffer().unwrap();

    // Sheet 1 was copied verbatim; its style index must still resolve to
    // the italic font, which requires the original cellXfs prefix intact.
    assert_eq!(
        entry_bytes(&original, "xl/worksheets/sheet1.xml"),
        entry_bytes(&patched, "xl/worksheets/sheet1.xml")
    );
    let reread = Workbook::open_buffer(&patched).unwrap();
    let s1 = reread.sheet("Sheet1").unwrap().style(aref("A1")).unwrap();
    assert!(s1.font.as_ref().unwrap().italic);
    let s2 = reread.sheet("Two").unwrap().style(aref("A1")).unwrap();
    assert_eq!(s2.fill.as_ref().unwrap().fg_rgb.as_deref(), Some("FF00B0F0"));
}

#[test]
fn test_comment_roundtrip() {
    let mut wb = Workbook::new();
    wb.set_comment(
        "Sheet1",
        Comment {
            cell: aref("B2"),
            author: "Reviewer".to_string(),
            body: vec![TextRun::plain("please check")],
            guid: None,
        },
    )
    .unwrap();
    let buf = wb.save_to_buffer().unwrap();

    let names = entry_names(&buf);
    assert!(names.contains(&"xl/comments1.xml".to_string()));
    assert!(names.contains(&"xl/drawings/vmlDrawing1.vml".to_string()));

    let wb2 = Workbook::open_buffer(&buf).unwrap();
    let comments = wb2.sheet("Sheet1").unwrap().comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author, "Reviewer");
    assert_eq!(comments[0].cell, aref("B2"));
    assert_eq!(comments[0].body.len(), 1);
    assert_eq!(comments[0].body[0].text, "please check");
}

#[test]
fn test_table_roundtrip() {
    let mut wb = Workbook::new();
    wb.set_value("Sheet1", aref("A1"), CellValue::Text("Name".to_string()))
        .unwrap();
    wb.set_value("Sheet1", aref("B1"), CellValue::Text("Amount".to_string()))
        .unwrap();
    wb.add_table(
        "Sheet1",
        xlpatch::Table {
            name: "Table1".to_string(),
            display_name: "Table1".to_string(),
            range: "A1:B4".parse().unwrap(),
            columns: vec!["Name".to_string(), "Amount".to_string()],
            totals_row_count: 0,
            totals_row_shown: false,
            style_name: Some("TableStyleMedium2".to_string()),
            auto_filter: true,
        },
    )
    .unwrap();
    let buf = wb.save_to_buffer().unwrap();

    let wb2 = Workbook::open_buffer(&buf).unwrap();
    let tables = wb2.sheet("Sheet1").unwrap().tables();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].display_name, "Table1");
    assert_eq!(tables[0].range.to_string(), "A1:B4");
    assert_eq!(tables[0].columns, vec!["Name", "Amount"]);
    assert!(tables[0].auto_filter);

    // Surgical pass: reopening and saving without changes copies the table
    // part byte-for-byte.
    let again = wb2.save_to_buffer().unwrap();
    assert_eq!(buf, again);
}

#[test]
fn test_delete_sheet_drops_its_parts() {
    let mut wb = Workbook::new();
    wb.add_sheet("Doomed").unwrap();
    wb.set_comment(
        "Doomed",
        Comment {
            cell: aref("A1"),
            author: "x".to_string(),
            body: vec![TextRun::plain("gone")],
            guid: None,
        },
    )
    .unwrap();
    wb.add_sheet("Keeper").unwrap();
    wb.set_value("Keeper", aref("A1"), CellValue::Number(1.0)).unwrap();
    let original = wb.save_to_buffer().unwrap();
    assert!(entry_names(&original).contains(&"xl/comments2.xml".to_string()));

    let mut edited = Workbook::open_buffer(&original).unwrap();
    edited.delete_sheet("Doomed").unwrap();
    let patched = edited.save_to_buffer().unwrap();

    let names = entry_names(&patched);
    assert!(!names.iter().any(|n| n.contains("comments")), "{names:?}");
    assert!(!names.iter().any(|n| n.contains("vmlDrawing")), "{names:?}");
    assert_eq!(
        names.iter().filter(|n| n.starts_with("xl/worksheets/sheet")).filter(|n| n.ends_with(".xml")).count(),
        2
    );

    let reread = Workbook::open_buffer(&patched).unwrap();
    assert_eq!(reread.sheet_names(), vec!["Sheet1", "Keeper"]);
    assert_eq!(reread.value("Keeper", aref("A1")).unwrap(), CellValue::Number(1.0));

    let wb_xml = entry_string(&patched, "xl/workbook.xml");
    assert!(!wb_xml.contains("Doomed"));
}

#[test]
fn test_sheet_visibility_roundtrip() {
    let mut wb = Workbook::new();
    wb.add_sheet("Hidden").unwrap();
    wb.set_sheet_visibility("Hidden", xlpatch::SheetState::VeryHidden)
        .unwrap();
    let buf = wb.save_to_buffer().unwrap();
    let wb2 = Workbook::open_buffer(&buf).unwrap();
    assert_eq!(
        wb2.sheet("Hidden").unwrap().visibility(),
        xlpatch::SheetState::VeryHidden
    );
}

#[test]
fn test_xxe_rejection() {
    // A package whose workbook part carries a DOCTYPE with an external
    // entity must be rejected, not resolved.
    let benign = Workbook::new().save_to_buffer().unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(benign.as_slice())).unwrap();

    let mut out = Vec::new();
    {
        let cursor = Cursor::new(&mut out);
        let mut writer = zip::ZipWriter::new(cursor);
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let name = entry.name().to_string();
            let mut body = Vec::new();
            entry.read_to_end(&mut body).unwrap();
            if name == "xl/workbook.xml" {
                body = br#"<?xml version="1.0"?>
<!DOCTYPE x [ <!ENTITY e SYSTEM "file:///etc/passwd"> ]>
<workbook><sheets><sheet name="S" sheetId="1" r:id="rId1"/></sheets></workbook>"#
                    .to_vec();
            }
            writer
                .start_file(name, zip::write::SimpleFileOptions::default())
                .unwrap();
            std::io::Write::write_all(&mut writer, &body).unwrap();
        }
        writer.finish().unwrap();
    }

    let err = Workbook::open_buffer(&out).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("DOCTYPE") || msg.contains("security"),
        "unexpected error: {msg}"
    );
}

#[test]
fn test_zip_bomb_rejection() {
    // A small entry that inflates far beyond the configured cap.
    let mut out = Vec::new();
    {
        let cursor = Cursor::new(&mut out);
        let mut writer = zip::ZipWriter::new(cursor);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        writer.start_file("xl/workbook.xml", options).unwrap();
        let chunk = vec![0u8; 1024 * 1024];
        for _ in 0..200 {
            std::io::Write::write_all(&mut writer, &chunk).unwrap();
        }
        writer.finish().unwrap();
    }

    let config = Config {
        max_uncompressed_size: 64 * 1024 * 1024,
        ..Config::default()
    };
    let reader = xlpatch::PackageReader::new(config);
    let err = reader.read_buffer(&out).unwrap_err();
    assert!(matches!(err, xlpatch::Error::Security(_)), "{err}");
}

#[test]
fn test_entry_count_limit() {
    let wb = Workbook::new();
    let buf = wb.save_to_buffer().unwrap();
    let config = Config {
        max_entry_count: 2,
        ..Config::default()
    };
    let err = xlpatch::PackageReader::new(config)
        .read_buffer(&buf)
        .unwrap_err();
    assert!(matches!(err, xlpatch::Error::Security(_)));
}

#[test]
fn test_aref_bounds() {
    assert!(ARef::new(16_383, 1_048_575).is_ok());
    assert!(ARef::new(16_384, 0).is_err());
    assert!(ARef::new(0, 1_048_576).is_err());
    assert!(ARef::parse("XFD1048576").is_ok());
    assert!(ARef::parse("XFE1").is_err());
}

#[test]
fn test_unknown_parts_survive_a_surgical_edit() {
    // Inject a custom part the engine does not understand and check it
    // survives a cell edit byte-for-byte.
    let base = {
        let mut wb = Workbook::new();
        wb.add_sheet("Two").unwrap();
        wb.set_value("Sheet1", aref("A1"), CellValue::Number(1.0)).unwrap();
        wb.save_to_buffer().unwrap()
    };

    let custom_payload = b"custom binary \x00\x01\x02 payload".to_vec();
    let mut with_custom = Vec::new();
    {
        let mut archive = zip::ZipArchive::new(Cursor::new(base.as_slice())).unwrap();
        let cursor = Cursor::new(&mut with_custom);
        let mut writer = zip::ZipWriter::new(cursor);
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).unwrap();
            writer.raw_copy_file(entry).unwrap();
        }
        writer
            .start_file(
                "customXml/item1.bin",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        std::io::Write::write_all(&mut writer, &custom_payload).unwrap();
        writer.finish().unwrap();
    }

    let mut wb = Workbook::open_buffer(&with_custom).unwrap();
    wb.set_value("Two", aref("B2"), CellValue::Number(5.0)).unwrap();
    let patched = wb.save_to_buffer().unwrap();

    assert_eq!(entry_bytes(&patched, "customXml/item1.bin"), custom_payload);
    // The untouched sheet also survives byte-for-byte.
    assert_eq!(
        entry_bytes(&with_custom, "xl/worksheets/sheet1.xml"),
        entry_bytes(&patched, "xl/worksheets/sheet1.xml")
    );
}

#[test]
fn test_formula_escape_option() {
    let mut wb = Workbook::new();
    wb.set_value(
        "Sheet1",
        aref("A1"),
        CellValue::Text("=cmd|' /C calc'!A0".to_string()),
    )
    .unwrap();
    let config = Config {
        escape_formulas: true,
        sst_policy: SstPolicy::Never,
        ..Config::default()
    };
    let buf = wb.save_to_buffer_with(config).unwrap();
    let sheet = entry_string(&buf, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<t>'=cmd|"), "{sheet}");
}

#[test]
fn test_write_twice_identical() {
    let mut wb = Workbook::new();
    wb.set_value("Sheet1", aref("A1"), CellValue::Text("d".to_string()))
        .unwrap();
    wb.merge_cells("Sheet1", "B2:C3".parse().unwrap()).unwrap();
    assert_eq!(wb.save_to_buffer().unwrap(), wb.save_to_buffer().unwrap());

    // Determinism also holds through a read-edit cycle.
    let base = wb.save_to_buffer().unwrap();
    let mut a = Workbook::open_buffer(&base).unwrap();
    let mut b = Workbook::open_buffer(&base).unwrap();
    a.set_value("Sheet1", aref("Z9"), CellValue::Number(1.0)).unwrap();
    b.set_value("Sheet1", aref("Z9"), CellValue::Number(1.0)).unwrap();
    assert_eq!(a.save_to_buffer().unwrap(), b.save_to_buffer().unwrap());
}

#[test]
fn test_dimension_matches_bounding_rectangle() {
    let mut wb = Workbook::new();
    wb.set_value("Sheet1", aref("C3"), CellValue::Number(1.0)).unwrap();
    wb.set_value("Sheet1", aref("E7"), CellValue::Number(2.0)).unwrap();
    wb.set_value("Sheet1", aref("B5"), CellValue::Number(3.0)).unwrap();
    let buf = wb.save_to_buffer().unwrap();
    let sheet = entry_string(&buf, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<dimension ref="B3:E7"/>"#), "{sheet}");
}
