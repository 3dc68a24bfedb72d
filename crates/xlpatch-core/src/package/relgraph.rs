//! Relationship graph.
//!
//! Maps every part of the source package to the set of sheet indices it
//! transitively serves, computed eagerly on read from the parsed `.rels`
//! files plus the numbered-part conventions. The writer consults it when
//! sweeping unparsed parts: anything whose sheet set reaches a deleted
//! sheet vanishes with that sheet, everything else is copied.

use std::collections::{BTreeSet, HashMap, VecDeque};

use xlpatch_xml::relationships::Relationships;

use super::manifest::{numbered_part_index, PartManifest};
use super::paths::{relationship_part_path, resolve_relationship_target};

static EMPTY: BTreeSet<usize> = BTreeSet::new();

/// Part-path to sheet-set adjacency.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    deps: HashMap<String, BTreeSet<usize>>,
    /// Conservative fallback for parts the traversal never named: when any
    /// relationship target failed to resolve, the sheets that owned those
    /// relationships land here, and every unknown part inherits them.
    fallback: BTreeSet<usize>,
}

impl RelationshipGraph {
    /// Build the graph.
    ///
    /// `sheet_paths` pairs each 0-based sheet index with its part path.
    /// `rels_by_owner` maps a part path to its parsed sibling `.rels`.
    pub fn build(
        manifest: &PartManifest,
        sheet_paths: &[(usize, String)],
        rels_by_owner: &HashMap<String, Relationships>,
    ) -> Self {
        let mut graph = Self::default();

        // Seed: the sheet parts themselves, their rels parts, and the
        // numbered-part conventions for comment parts.
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        for (idx, path) in sheet_paths {
            graph.insert(path.clone(), *idx);
            graph.insert(relationship_part_path(path), *idx);
            queue.push_back((path.clone(), *idx));
        }
        for entry in manifest.iter() {
            if let Some(n) = numbered_part_index(&entry.path, "xl/comments", ".xml") {
                if n >= 1 && n <= sheet_paths.len() {
                    graph.insert(entry.path.clone(), n - 1);
                }
            }
        }

        // Transitive closure: a part referenced from a sheet's subtree
        // serves that sheet.
        while let Some((part, sheet)) = queue.pop_front() {
            let rels_path = relationship_part_path(&part);
            let Some(rels) = rels_by_owner.get(&part).or_else(|| rels_by_owner.get(&rels_path))
            else {
                continue;
            };
            for rel in &rels.relationships {
                if rel.target_mode.as_deref() == Some("External") {
                    continue;
                }
                match resolve_relationship_target(&part, &rel.target) {
                    Some(target) => {
                        if graph.insert(target.clone(), sheet) {
                            graph.insert(relationship_part_path(&target), sheet);
                            queue.push_back((target, sheet));
                        }
                    }
                    None => {
                        // Escaping target: taint the fallback with this sheet.
                        graph.fallback.insert(sheet);
                    }
                }
            }
        }

        graph
    }

    /// Record that `path` serves `sheet`; returns true when this is new.
    fn insert(&mut self, path: String, sheet: usize) -> bool {
        self.deps.entry(path).or_default().insert(sheet)
    }

    /// Sheet indices the part transitively serves. An empty set means
    /// sheet-agnostic (theme, doc properties, ...).
    pub fn dependencies_for(&self, path: &str) -> &BTreeSet<usize> {
        self.deps.get(path).unwrap_or(if self.fallback.is_empty() {
            &EMPTY
        } else {
            &self.fallback
        })
    }

}
