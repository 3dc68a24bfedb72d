//! VML generation for comment indicator shapes.
//!
//! Excel renders comment pop-ups from legacy VML drawing parts
//! (`xl/drawings/vmlDrawingN.vml`). The part is generated procedurally, never
//! parsed: one `<o:shapelayout>`, one shared `<v:shapetype>`, and one
//! `<v:shape>` per comment. Shape ids are `base_shape_id(sheet) + index`
//! with per-sheet bases spaced a million apart so ids stay workbook-unique.

use std::fmt::Write as _;

use crate::aref::ARef;

/// Comment box width, in columns.
const COMMENT_WIDTH_COLS: u32 = 2;
/// Comment box height, in rows.
const COMMENT_HEIGHT_ROWS: u32 = 4;

/// First shape id for a sheet's comment shapes.
pub fn base_shape_id(sheet_index: usize) -> usize {
    1024 + (sheet_index + 1) * 1_000_000
}

/// Build a complete VML drawing part for the comment cells of one sheet.
pub fn build_vml_drawing(sheet_index: usize, cells: &[ARef]) -> String {
    let mut shapes = String::new();
    for (i, cell) in cells.iter().enumerate() {
        let shape_id = base_shape_id(sheet_index) + i;
        write_vml_shape(&mut shapes, shape_id, i + 1, *cell);
    }

    let mut doc = String::with_capacity(1024 + shapes.len());
    doc.push_str("<xml xmlns:v=\"urn:schemas-microsoft-com:vml\"");
    doc.push_str(" xmlns:o=\"urn:schemas-microsoft-com:office:office\"");
    doc.push_str(" xmlns:x=\"urn:schemas-microsoft-com:office:excel\">\n");
    doc.push_str(" <o:shapelayout v:ext=\"edit\">\n");
    doc.push_str("  <o:idmap v:ext=\"edit\" data=\"1\"/>\n");
    doc.push_str(" </o:shapelayout>\n");
    doc.push_str(" <v:shapetype id=\"_x0000_t202\" coordsize=\"21600,21600\"");
    doc.push_str(" o:spt=\"202\" path=\"m,l,21600r21600,l21600,xe\">\n");
    doc.push_str("  <v:stroke joinstyle=\"miter\"/>\n");
    doc.push_str("  <v:path gradientshapeok=\"t\" o:connecttype=\"rect\"/>\n");
    doc.push_str(" </v:shapetype>\n");
    doc.push_str(&shapes);
    doc.push_str("</xml>\n");
    doc
}

fn write_vml_shape(out: &mut String, shape_id: usize, z_index: usize, cell: ARef) {
    let _ = write!(out, " <v:shape id=\"_x0000_s{shape_id}\"");
    out.push_str(" type=\"#_x0000_t202\"");
    let _ = write!(
        out,
        " style=\"position:absolute;margin-left:59.25pt;margin-top:1.5pt;\
         width:108pt;height:59.25pt;z-index:{z_index};visibility:hidden\""
    );
    out.push_str(" fillcolor=\"#ffffe1\" o:insetmode=\"auto\">\n");
    out.push_str("  <v:fill color2=\"#ffffe1\"/>\n");
    out.push_str("  <v:shadow on=\"t\" color=\"black\" obscured=\"t\"/>\n");
    out.push_str("  <v:path o:connecttype=\"none\"/>\n");
    out.push_str("  <v:textbox/>\n");
    out.push_str("  <x:ClientData ObjectType=\"Note\">\n");
    out.push_str("   <x:MoveWithCells/>\n");
    out.push_str("   <x:SizeWithCells/>\n");
    let _ = writeln!(out, "   <x:Anchor>{}</x:Anchor>", comment_anchor(cell));
    let _ = writeln!(out, "   <x:Row>{}</x:Row>", cell.row());
    let _ = writeln!(out, "   <x:Column>{}</x:Column>", cell.col());
    out.push_str("  </x:ClientData>\n");
    out.push_str(" </v:shape>\n");
}

/// The 8-value anchor string placing the box beside its cell:
/// "LeftCol, LeftOff, TopRow, TopOff, RightCol, RightOff, BottomRow, BottomOff".
fn comment_anchor(cell: ARef) -> String {
    let left_col = cell.col() + 1;
    let top_row = cell.row().saturating_sub(1);
    let right_col = left_col + COMMENT_WIDTH_COLS;
    let bottom_row = top_row + COMMENT_HEIGHT_ROWS;
    format!("{left_col}, 15, {top_row}, 10, {right_col}, 15, {bottom_row}, 4")
}
