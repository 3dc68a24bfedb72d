//! Package-internal path arithmetic.
//!
//! OOXML relationship targets are relative to the source part's directory.
//! Resolution normalizes `.` and `..` segments; a target that climbs above
//! the package root is rejected rather than silently clamped, since a
//! relationship pointing outside the package is never legitimate.

/// Resolve a relationship target against the source part path.
///
/// Both arguments are package-internal paths (e.g. `xl/workbook.xml`).
/// Returns `None` when the target escapes the package root.
pub(crate) fn resolve_relationship_target(source_part: &str, target: &str) -> Option<String> {
    if target.starts_with('/') {
        return Some(target.trim_start_matches('/').to_string());
    }

    let base_dir = source_part
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or_default();
    let mut parts: Vec<&str> = if base_dir.is_empty() {
        vec![]
    } else {
        base_dir.split('/').collect()
    };

    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return None;
                }
            }
            _ => parts.push(seg),
        }
    }

    Some(parts.join("/"))
}

/// Get the `.rels` part path for a package part.
pub(crate) fn relationship_part_path(part_path: &str) -> String {
    let normalized = part_path.trim_start_matches('/');
    let (dir, file) = normalized.rsplit_once('/').unwrap_or(("", normalized));
    if dir.is_empty() {
        format!("_rels/{file}.rels")
    } else {
        format!("{dir}/_rels/{file}.rels")
    }
}

/// Build a relative relationship target from `source_part` to `target_part`.
pub(crate) fn relative_relationship_target(source_part: &str, target_part: &str) -> String {
    let source_dir = source_part
        .trim_start_matches('/')
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or_default();
    let source_parts: Vec<&str> = if source_dir.is_empty() {
        vec![]
    } else {
        source_dir.split('/').collect()
    };
    let target_parts: Vec<&str> = target_part.trim_start_matches('/').split('/').collect();

    let mut common = 0usize;
    while common < source_parts.len()
        && common < target_parts.len()
        && source_parts[common] == target_parts[common]
    {
        common += 1;
    }

    let mut rel_parts: Vec<String> = Vec::new();
    for _ in 0..(source_parts.len() - common) {
        rel_parts.push("..".to_string());
    }
    rel_parts.extend(target_parts[common..].iter().map(|s| s.to_string()));

    if rel_parts.is_empty() {
        ".".to_string()
    } else {
        rel_parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relationship_target() {
        assert_eq!(
            resolve_relationship_target("xl/workbook.xml", "worksheets/sheet1.xml").as_deref(),
            Some("xl/worksheets/sheet1.xml")
        );
        assert_eq!(
            resolve_relationship_target("xl/worksheets/sheet1.xml", "../comments1.xml").as_deref(),
            Some("xl/comments1.xml")
        );
        assert_eq!(
            resolve_relationship_target("xl/workbook.xml", "/xl/styles.xml").as_deref(),
            Some("xl/styles.xml")
        );
    }

    #[test]
    fn test_resolve_rejects_escape_above_root() {
        assert_eq!(
            resolve_relationship_target("xl/workbook.xml", "../../../etc/passwd"),
            None
        );
        assert_eq!(resolve_relationship_target("a.xml", "../b.xml"), None);
    }

    #[test]
    fn test_relationship_part_path() {
        assert_eq!(
            relationship_part_path("xl/worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
        assert_eq!(relationship_part_path("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(relationship_part_path("a.xml"), "_rels/a.xml.rels");
    }

    #[test]
    fn test_relative_relationship_target() {
        assert_eq!(
            relative_relationship_target("xl/worksheets/sheet1.xml", "xl/comments1.xml"),
            "../comments1.xml"
        );
        assert_eq!(
            relative_relationship_target("xl/worksheets/sheet1.xml", "xl/drawings/vmlDrawing1.vml"),
            "../drawings/vmlDrawing1.vml"
        );
        assert_eq!(
            relative_relationship_target("xl/workbook.xml", "xl/worksheets/sheet1.xml"),
            "worksheets/sheet1.xml"
        );
    }
}
