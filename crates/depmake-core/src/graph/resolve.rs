//! Include resolution and graph construction.
//!
//! An include target is matched against the whole inventory by basename
//! only: `#include "../net/socket.h"` resolves to whichever file is named
//! `socket.h`. The include search path is never reconstructed.
//!
//! Only source and header files are scanned for includes, but any file can
//! be a target. Fragments such as `table.inc` or `impl.tpp` become
//! prerequisites of the units that include them without being scanned
//! themselves.
//!
//! ## Ambiguity
//!
//! When several files share a basename, [`ResolutionStrategy`]
//! decides. Both strategies end in first-match-wins over inventory order,
//! which is stable because the inventory is sorted.
//!
//! ## Misses
//!
//! A target with no matching basename is assumed to be a system or external
//! header and is dropped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::DependencyGraph;
use crate::config::ScanConfig;
use crate::include::{extract_includes, target_basename};
use crate::inventory::{FileKind, FileRecord};

/// How a basename shared by several files is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// First file with the same basename, in inventory order.
    #[default]
    FirstMatch,
    /// The target joined onto the including file's directory when that file
    /// exists; otherwise first-match.
    RelativeFirst,
}

/// A resolved include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a> {
    pub record: &'a FileRecord,
    /// How many inventory files share the target's basename.
    pub candidates: usize,
}

impl Match<'_> {
    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        self.candidates > 1
    }
}

/// Basename index over the inventory.
#[derive(Debug)]
pub struct Resolver<'a> {
    strategy: ResolutionStrategy,
    by_name: HashMap<&'a str, Vec<&'a FileRecord>>,
    by_id: HashMap<&'a str, &'a FileRecord>,
}

impl<'a> Resolver<'a> {
    /// Index `files`, which must be in inventory order.
    #[must_use]
    pub fn new(files: &[&'a FileRecord], strategy: ResolutionStrategy) -> Self {
        let mut by_name: HashMap<&'a str, Vec<&'a FileRecord>> = HashMap::new();
        let mut by_id = HashMap::with_capacity(files.len());
        for &record in files {
            by_name.entry(record.file_name.as_str()).or_default().push(record);
            by_id.insert(record.id.as_str(), record);
        }
        Self {
            strategy,
            by_name,
            by_id,
        }
    }

    /// Resolve `target` as included from `includer`.
    #[must_use]
    pub fn resolve(&self, includer: &FileRecord, target: &str) -> Option<Match<'a>> {
        let candidates = self.by_name.get(target_basename(target))?;
        let first = *candidates.first()?;

        let record = match self.strategy {
            ResolutionStrategy::FirstMatch => first,
            ResolutionStrategy::RelativeFirst => join_relative(&includer.id, target)
                .and_then(|id| self.by_id.get(id.as_str()).copied())
                .unwrap_or(first),
        };

        Some(Match {
            record,
            candidates: candidates.len(),
        })
    }
}

/// Resolve `target` against the directory of `includer_id`, both
/// root-relative. Returns `None` when the result would leave the root.
fn join_relative(includer_id: &str, target: &str) -> Option<String> {
    let mut parts: Vec<&str> = includer_id.split('/').collect();
    parts.pop();

    for segment in target.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Counters collected while building the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Files with a source or header extension.
    pub files_scanned: usize,
    /// Local include directives found.
    pub includes_found: usize,
    /// Includes matched to an inventory file.
    pub resolved: usize,
    /// Includes with no matching basename (dropped).
    pub unresolved: usize,
    /// Resolved includes whose basename matched more than one file.
    pub ambiguous: usize,
}

/// Scan every source/header record and build the include graph.
///
/// Includes resolve against all of `records`.
#[must_use]
pub fn build_graph(records: &[FileRecord], scan: &ScanConfig) -> (DependencyGraph, ScanReport) {
    build_graph_with(records, scan, |record| extract_includes(&record.full_path))
}

/// [`build_graph`] with a caller-supplied include extractor.
#[instrument(skip_all, fields(files = records.len()))]
pub fn build_graph_with<F>(
    records: &[FileRecord],
    scan: &ScanConfig,
    mut extract: F,
) -> (DependencyGraph, ScanReport)
where
    F: FnMut(&FileRecord) -> Vec<String>,
{
    let scanned: Vec<&FileRecord> = records
        .iter()
        .filter(|r| scan.classify(r.extension.as_deref()) != FileKind::Other)
        .collect();
    let candidates: Vec<&FileRecord> = records.iter().collect();
    let resolver = Resolver::new(&candidates, scan.resolution);

    let mut graph = DependencyGraph::new();
    let mut report = ScanReport {
        files_scanned: scanned.len(),
        ..ScanReport::default()
    };

    for &record in &scanned {
        graph.add_node(&record.id);

        for target in extract(record) {
            report.includes_found += 1;

            let Some(found) = resolver.resolve(record, &target) else {
                report.unresolved += 1;
                debug!(file = %record.id, include = %target, "dropping unresolved include");
                continue;
            };

            report.resolved += 1;
            if found.is_ambiguous() {
                report.ambiguous += 1;
                debug!(
                    file = %record.id,
                    include = %target,
                    chosen = %found.record.id,
                    candidates = found.candidates,
                    "ambiguous include basename"
                );
            }
            graph.connect(&record.id, &found.record.id);
        }
    }

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        unresolved = report.unresolved,
        "include graph built"
    );
    (graph, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn record(id: &str) -> FileRecord {
        FileRecord::new(Path::new(""), PathBuf::from(id))
    }

    fn build(
        files: Vec<(&str, Vec<&str>)>,
        strategy: ResolutionStrategy,
    ) -> (DependencyGraph, ScanReport) {
        let records: Vec<FileRecord> = files.iter().map(|(id, _)| record(id)).collect();
        let includes: HashMap<String, Vec<String>> = files
            .iter()
            .map(|(id, incs)| {
                (
                    (*id).to_string(),
                    incs.iter().map(ToString::to_string).collect(),
                )
            })
            .collect();
        let scan = ScanConfig {
            resolution: strategy,
            ..ScanConfig::default()
        };
        build_graph_with(&records, &scan, |r| {
            includes.get(&r.id).cloned().unwrap_or_default()
        })
    }

    #[test]
    fn simple_chain() {
        let (graph, report) = build(
            vec![
                ("bar.h", vec![]),
                ("foo.h", vec!["bar.h"]),
                ("main.cpp", vec!["foo.h"]),
            ],
            ResolutionStrategy::FirstMatch,
        );
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.contains_edge("main.cpp", "foo.h"));
        assert!(graph.contains_edge("foo.h", "bar.h"));
        assert_eq!(report.resolved, 2);
        assert_eq!(report.unresolved, 0);
    }

    #[test]
    fn unreferenced_files_have_no_in_edges() {
        let (graph, _) = build(
            vec![("lonely.h", vec![]), ("main.cpp", vec!["used.h"]), ("used.h", vec![])],
            ResolutionStrategy::FirstMatch,
        );
        assert!(graph.contains_node("lonely.h"));
        assert_eq!(graph.in_degree("lonely.h"), 0);
        assert_eq!(graph.in_degree("main.cpp"), 0);
        assert_eq!(graph.in_degree("used.h"), 1);
    }

    #[test]
    fn unresolved_includes_are_dropped() {
        let (graph, report) = build(
            vec![("main.cpp", vec!["boost/asio.hpp", "local.h"]), ("local.h", vec![])],
            ResolutionStrategy::FirstMatch,
        );
        assert_eq!(graph.out_edges("main.cpp"), vec!["local.h"]);
        assert_eq!(report.unresolved, 1);
        assert_eq!(report.includes_found, 2);
    }

    #[test]
    fn duplicate_basename_picks_first_in_inventory_order() {
        let (graph, report) = build(
            vec![
                ("a/util.h", vec![]),
                ("b/util.h", vec![]),
                ("main.cpp", vec!["util.h"]),
            ],
            ResolutionStrategy::FirstMatch,
        );
        assert_eq!(graph.out_edges("main.cpp"), vec!["a/util.h"]);
        assert_eq!(report.ambiguous, 1);
    }

    #[test]
    fn path_fragments_match_by_basename() {
        let (graph, _) = build(
            vec![("gfx/mesh.h", vec![]), ("app/main.cpp", vec!["../whatever/mesh.h"])],
            ResolutionStrategy::FirstMatch,
        );
        assert_eq!(graph.out_edges("app/main.cpp"), vec!["gfx/mesh.h"]);
    }

    #[test]
    fn relative_first_prefers_sibling() {
        let (graph, _) = build(
            vec![
                ("a/util.h", vec![]),
                ("b/main.cpp", vec!["util.h"]),
                ("b/util.h", vec![]),
            ],
            ResolutionStrategy::RelativeFirst,
        );
        assert_eq!(graph.out_edges("b/main.cpp"), vec!["b/util.h"]);
    }

    #[test]
    fn relative_first_falls_back_to_first_match() {
        let (graph, _) = build(
            vec![
                ("a/util.h", vec![]),
                ("b/util.h", vec![]),
                ("c/main.cpp", vec!["util.h"]),
            ],
            ResolutionStrategy::RelativeFirst,
        );
        assert_eq!(graph.out_edges("c/main.cpp"), vec!["a/util.h"]);
    }

    #[test]
    fn non_source_files_are_matched_but_not_scanned() {
        let (graph, report) = build(
            vec![
                ("impl.tpp", vec!["main.cpp"]),
                ("main.cpp", vec!["table.inc", "impl.tpp"]),
                ("table.inc", vec!["impl.tpp"]),
            ],
            ResolutionStrategy::FirstMatch,
        );
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.unresolved, 0);
        assert_eq!(graph.out_edges("main.cpp"), vec!["table.inc", "impl.tpp"]);
        assert_eq!(graph.out_degree("table.inc"), 0);
        assert_eq!(graph.out_degree("impl.tpp"), 0);
    }

    #[test]
    fn unincluded_other_files_stay_out_of_the_graph() {
        let (graph, _) = build(
            vec![("README", vec![]), ("main.cpp", vec![])],
            ResolutionStrategy::FirstMatch,
        );
        assert!(!graph.contains_node("README"));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn self_include_is_dropped() {
        let (graph, report) = build(vec![("a.h", vec!["a.h"])], ResolutionStrategy::FirstMatch);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(report.resolved, 1);
    }

    #[test]
    fn join_relative_handles_dots() {
        assert_eq!(join_relative("src/a/x.cpp", "../b/y.h").as_deref(), Some("src/b/y.h"));
        assert_eq!(join_relative("x.cpp", "./y.h").as_deref(), Some("y.h"));
        assert_eq!(join_relative("x.cpp", "../y.h"), None);
    }
}
