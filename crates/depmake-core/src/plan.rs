//! Rule planning: which object files to build, from what, in which order.
//!
//! # Prerequisites
//!
//! A unit's prerequisites are the unit itself followed by every file
//! reachable from it over include edges, in depth-first first-visit order.
//! The walk keeps a visited set, so include cycles terminate and each file
//! appears once.
//!
//! # Ordering
//!
//! Units are sorted by ascending out-degree (direct includes). The sort is
//! stable over inventory order, so equal-degree units keep their on-disk
//! order and the emitted Makefile is reproducible.
//!
//! # Object names
//!
//! A unit's object file is named after its stem (`src/net.cpp` → `net.o`).
//! When two planned units share a stem, each of them is named after its
//! root-relative directory instead (`a/util.cpp` → `a_util.o`), and a name
//! still shared after that falls back to the whole id (`a_util_cpp.o`).
//!
//! # Link scope
//!
//! With [`LinkScope::All`] every compilation unit is planned. With
//! [`LinkScope::Reachable`] only the entry point and its companion units are:
//! a unit is a companion when its stem matches the stem of a header that an
//! already selected unit depends on (`foo.h` pulls in `foo.cpp`).

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::visit::{VisitMap, Visitable};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::ScanConfig;
use crate::error::ErrorCode;
use crate::graph::DependencyGraph;
use crate::include::target_basename;
use crate::inventory::{FileKind, FileRecord};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("no entry point supplied")]
    MissingEntry,

    #[error("entry point `{0}` was not found among the scanned files")]
    EntryNotFound(String),

    #[error("entry point `{0}` is not a compilation unit")]
    EntryNotSource(String),
}

impl PlanError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingEntry => ErrorCode::MissingEntryPoint,
            Self::EntryNotFound(_) => ErrorCode::EntryPointNotFound,
            Self::EntryNotSource(_) => ErrorCode::EntryPointNotSource,
        }
    }
}

/// Which compilation units end up in the plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkScope {
    /// Every compilation unit in the tree.
    #[default]
    All,
    /// The entry point plus companion units reachable through its headers.
    Reachable,
}

/// One object-file rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildUnit {
    /// Object file basename without `.o`.
    pub object_stem: String,
    /// Id of the compilation unit.
    pub primary_source: String,
    /// `primary_source` followed by its transitive includes.
    pub prerequisites: Vec<String>,
    /// Number of direct includes; the ordering key.
    pub out_degree: usize,
}

/// Everything an emitter needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    /// Program name (the entry point's stem).
    pub program: String,
    /// Id of the entry point unit.
    pub entry: String,
    /// Rules in emission order.
    pub units: Vec<BuildUnit>,
    /// Include cycles found in the graph, for diagnostics.
    pub cycles: Vec<Vec<String>>,
}

impl BuildPlan {
    /// Object stems in emission order.
    pub fn object_stems(&self) -> impl Iterator<Item = &str> + '_ {
        self.units.iter().map(|u| u.object_stem.as_str())
    }

    #[must_use]
    pub fn unit(&self, primary_source: &str) -> Option<&BuildUnit> {
        self.units.iter().find(|u| u.primary_source == primary_source)
    }
}

/// Every file reachable from `start`, `start` first, in depth-first
/// first-visit order. Unknown ids yield an empty list.
#[must_use]
pub fn transitive_closure(graph: &DependencyGraph, start: &str) -> Vec<String> {
    let Some(start_idx) = graph.node_index(start) else {
        return Vec::new();
    };

    let mut visited = graph.inner().visit_map();
    let mut stack = vec![start_idx];
    let mut order = Vec::new();

    while let Some(idx) = stack.pop() {
        if !visited.visit(idx) {
            continue;
        }
        order.push(graph.id(idx).to_string());

        // Reverse so the first include is popped (visited) first.
        let next = graph.out_indices(idx);
        stack.extend(next.into_iter().rev().filter(|n| !visited.is_visited(n)));
    }

    order
}

/// Build the rule plan for `entry` over a completed graph.
///
/// `inventory` supplies classification and tie-break order; every graph node
/// is expected to have a record in it.
///
/// # Errors
///
/// Returns [`PlanError`] when `entry` is empty, matches no scanned file, or
/// names a file that is not a compilation unit.
#[instrument(skip(graph, inventory, scan))]
pub fn plan(
    graph: &DependencyGraph,
    inventory: &[FileRecord],
    scan: &ScanConfig,
    link: LinkScope,
    entry: &str,
) -> Result<BuildPlan, PlanError> {
    let index = NodeTable::new(graph, inventory, scan);

    let entry_record = index.find_entry(entry)?;
    debug!(entry = %entry_record.id, "entry point resolved");

    let mut units = index.ordered_units(graph);
    if link == LinkScope::Reachable {
        let keep = index.reachable_units(graph, entry_record);
        units.retain(|record| keep.contains(record.id.as_str()));
    }

    let stems = assign_object_names(&units);
    let units: Vec<BuildUnit> = units
        .into_iter()
        .zip(stems)
        .map(|(record, object_stem)| BuildUnit {
            object_stem,
            primary_source: record.id.clone(),
            prerequisites: transitive_closure(graph, &record.id),
            out_degree: graph.out_degree(&record.id),
        })
        .collect();

    warn_duplicate_stems(&units);

    Ok(BuildPlan {
        program: entry_record.stem.clone(),
        entry: entry_record.id.clone(),
        units,
        cycles: graph.find_cycles(),
    })
}

/// Graph nodes joined with their inventory records, in inventory order.
struct NodeTable<'a> {
    nodes: Vec<(&'a FileRecord, FileKind)>,
}

impl<'a> NodeTable<'a> {
    fn new(graph: &DependencyGraph, inventory: &'a [FileRecord], scan: &ScanConfig) -> Self {
        let nodes = inventory
            .iter()
            .filter(|record| graph.contains_node(&record.id))
            .map(|record| (record, scan.classify(record.extension.as_deref())))
            .collect();
        Self { nodes }
    }

    /// Exact id first, then first basename match in inventory order.
    fn find_entry(&self, entry: &str) -> Result<&'a FileRecord, PlanError> {
        let wanted = entry.trim().replace('\\', "/");
        let wanted = wanted.trim_start_matches("./");
        if wanted.is_empty() {
            return Err(PlanError::MissingEntry);
        }

        let basename = target_basename(wanted);
        let (record, kind) = self
            .nodes
            .iter()
            .find(|(record, _)| record.id == wanted)
            .or_else(|| self.nodes.iter().find(|(record, _)| record.file_name == basename))
            .copied()
            .ok_or_else(|| PlanError::EntryNotFound(entry.to_string()))?;

        if kind != FileKind::Source {
            return Err(PlanError::EntryNotSource(record.id.clone()));
        }
        Ok(record)
    }

    /// Compilation units, ascending out-degree, ties in inventory order.
    fn ordered_units(&self, graph: &DependencyGraph) -> Vec<&'a FileRecord> {
        let mut units: Vec<&FileRecord> = self
            .nodes
            .iter()
            .filter(|(_, kind)| *kind == FileKind::Source)
            .map(|(record, _)| *record)
            .collect();
        units.sort_by_key(|record| graph.out_degree(&record.id));
        units
    }

    /// Entry plus companion units, found breadth-first.
    fn reachable_units(&self, graph: &DependencyGraph, entry: &'a FileRecord) -> HashSet<&'a str> {
        let mut by_stem: HashMap<&str, &'a FileRecord> = HashMap::new();
        let mut kinds: HashMap<&str, FileKind> = HashMap::new();
        for &(record, kind) in &self.nodes {
            kinds.insert(record.id.as_str(), kind);
            if kind == FileKind::Source {
                by_stem.entry(record.stem.as_str()).or_insert(record);
            }
        }

        let mut selected: HashSet<&'a str> = HashSet::from([entry.id.as_str()]);
        let mut queue: VecDeque<&'a FileRecord> = VecDeque::from([entry]);

        while let Some(unit) = queue.pop_front() {
            for dep in transitive_closure(graph, &unit.id) {
                if kinds.get(dep.as_str()) != Some(&FileKind::Header) {
                    continue;
                }
                let Some(&companion) = by_stem.get(header_stem(&dep)) else {
                    continue;
                };
                if selected.insert(companion.id.as_str()) {
                    debug!(header = %dep, unit = %companion.id, "companion unit selected");
                    queue.push_back(companion);
                }
            }
        }

        selected
    }
}

/// Distinct object names for `units`, renaming only units whose stem
/// collides.
fn assign_object_names(units: &[&FileRecord]) -> Vec<String> {
    let mut stems: Vec<String> = units.iter().map(|record| record.stem.clone()).collect();

    let renames: [fn(&FileRecord) -> String; 2] = [directory_stem, flattened_id];
    for rename in renames {
        let shared = collisions(&stems);
        for ((stem, record), clash) in stems.iter_mut().zip(units).zip(shared) {
            if clash {
                let renamed = rename(record);
                debug!(unit = %record.id, from = %stem, to = %renamed, "object name collision");
                *stem = renamed;
            }
        }
    }
    stems
}

fn collisions(stems: &[String]) -> Vec<bool> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in stems {
        *counts.entry(stem.as_str()).or_default() += 1;
    }
    stems
        .iter()
        .map(|stem| counts.get(stem.as_str()).is_some_and(|&n| n > 1))
        .collect()
}

/// `a/b/util.cpp` → `a_b_util`; top-level units keep their stem.
fn directory_stem(record: &FileRecord) -> String {
    match record.id.rsplit_once('/') {
        Some((dir, _)) => format!("{}_{}", dir.replace('/', "_"), record.stem),
        None => record.stem.clone(),
    }
}

/// `a/util.cpp` → `a_util_cpp`.
fn flattened_id(record: &FileRecord) -> String {
    record.id.replace(['/', '.'], "_")
}

fn header_stem(id: &str) -> &str {
    let name = target_basename(id);
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

fn warn_duplicate_stems(units: &[BuildUnit]) {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for unit in units {
        if let Some(previous) = seen.insert(&unit.object_stem, &unit.primary_source) {
            warn!(
                object = %unit.object_stem,
                first = %previous,
                second = %unit.primary_source,
                "two compilation units share an object file name"
            );
        }
    }
}
