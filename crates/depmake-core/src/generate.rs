//! End-to-end pipeline: root directory → inventory → graph → plan → text.

use std::path::Path;

use tracing::{info, instrument};

use crate::config::Config;
use crate::emit::render_makefile;
use crate::error::Error;
use crate::graph::{DependencyGraph, ScanReport, build_graph};
use crate::inventory::{FileRecord, FileSource, WalkDirSource};
use crate::plan::{BuildPlan, plan};

/// A scanned project tree.
#[derive(Debug)]
pub struct Project {
    pub inventory: Vec<FileRecord>,
    pub graph: DependencyGraph,
    pub report: ScanReport,
}

impl Project {
    /// List files under `root` with `source` and build the include graph.
    ///
    /// # Errors
    ///
    /// Fails if the root directory cannot be listed.
    #[instrument(skip(config, source))]
    pub fn scan(root: &Path, config: &Config, source: &dyn FileSource) -> Result<Self, Error> {
        let inventory = source.list_files(root)?;
        let (graph, report) = build_graph(&inventory, &config.scan);

        info!(
            files = inventory.len(),
            scanned = report.files_scanned,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "project scanned"
        );

        Ok(Self {
            inventory,
            graph,
            report,
        })
    }

    /// Plan rules for `entry`.
    ///
    /// # Errors
    ///
    /// Fails when the entry point is missing, unknown, or a header.
    pub fn plan(&self, entry: &str, config: &Config) -> Result<BuildPlan, Error> {
        Ok(plan(
            &self.graph,
            &self.inventory,
            &config.scan,
            config.plan.link,
            entry,
        )?)
    }
}

/// The result of one run.
#[derive(Debug)]
pub struct Generated {
    pub plan: BuildPlan,
    pub makefile: String,
    pub report: ScanReport,
    /// [`DependencyGraph::content_hash`] of the scanned graph.
    pub graph_hash: String,
}

/// The traversal used by [`generate`]: configured depth and hidden-file
/// policy, skipping the object directory.
#[must_use]
pub fn default_source(config: &Config) -> WalkDirSource {
    WalkDirSource::new(config.scan.max_depth, config.scan.skip_hidden)
        .skip_dir(&config.toolchain.object_dir)
}

/// Scan `root`, plan `entry`, and render the Makefile. Nothing is written.
///
/// # Errors
///
/// Propagates inventory and planning failures.
pub fn generate(root: &Path, entry: &str, config: &Config) -> Result<Generated, Error> {
    let project = Project::scan(root, config, &default_source(config))?;
    let plan = project.plan(entry, config)?;
    let makefile = render_makefile(&plan, &config.toolchain);

    Ok(Generated {
        makefile,
        report: project.report,
        graph_hash: project.graph.content_hash(),
        plan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, body).expect("write");
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "main.cpp", "#include \"foo.h\"\n#include <iostream>\nint main() {}\n");
        write(dir.path(), "foo.h", "#include \"bar.h\"\n");
        write(dir.path(), "bar.h", "#pragma once\n");
        dir
    }

    #[test]
    fn concrete_scenario_end_to_end() {
        let dir = fixture();
        let out = generate(dir.path(), "main.cpp", &Config::default()).expect("generate");

        assert_eq!(out.report.files_scanned, 3);
        assert_eq!(out.plan.units.len(), 1);
        assert_eq!(out.plan.units[0].prerequisites, vec!["main.cpp", "foo.h", "bar.h"]);
        assert!(out.makefile.contains("OBJS = $(ODIR)/main.o\n"));
        assert!(out.makefile.contains("$(ODIR)/main.o : main.cpp foo.h bar.h | $(ODIR)\n"));
    }

    #[test]
    fn scanned_graph_has_expected_edges() {
        let dir = fixture();
        let config = Config::default();
        let project = Project::scan(dir.path(), &config, &default_source(&config)).expect("scan");
        assert_eq!(project.graph.node_count(), 3);
        assert_eq!(project.graph.edge_count(), 2);
        assert!(project.graph.contains_edge("main.cpp", "foo.h"));
        assert!(project.graph.contains_edge("foo.h", "bar.h"));
    }

    #[test]
    fn output_is_idempotent() {
        let dir = fixture();
        write(dir.path(), "sub/util.h", "");
        write(dir.path(), "sub/util.cpp", "#include \"util.h\"\n#include \"bar.h\"\n");
        let first = generate(dir.path(), "main.cpp", &Config::default()).expect("first");
        let second = generate(dir.path(), "main.cpp", &Config::default()).expect("second");
        assert_eq!(first.makefile, second.makefile);
        assert_eq!(first.graph_hash, second.graph_hash);
    }

    #[test]
    fn ambiguous_header_resolves_to_first_in_inventory() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "a/util.h", "");
        write(dir.path(), "b/util.h", "");
        write(dir.path(), "main.cpp", "#include \"util.h\"\n");

        let out = generate(dir.path(), "main.cpp", &Config::default()).expect("generate");
        assert_eq!(out.plan.units[0].prerequisites, vec!["main.cpp", "a/util.h"]);
        assert_eq!(out.report.ambiguous, 1);
    }

    #[test]
    fn mutual_includes_terminate() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "a.h", "#include \"b.h\"\n");
        write(dir.path(), "b.h", "#include \"a.h\"\n");
        write(dir.path(), "main.cpp", "#include \"a.h\"\n");

        let out = generate(dir.path(), "main.cpp", &Config::default()).expect("generate");
        assert_eq!(out.plan.units[0].prerequisites, vec!["main.cpp", "a.h", "b.h"]);
        assert_eq!(out.plan.cycles.len(), 1);
    }

    #[test]
    fn unknown_entry_is_a_configuration_error() {
        let dir = fixture();
        let err = generate(dir.path(), "missing.cpp", &Config::default()).expect_err("must fail");
        assert_eq!(err.code(), ErrorCode::EntryPointNotFound);
        assert_eq!(err.code().exit_code(), 1);
    }

    #[test]
    fn dotted_object_dir_is_still_skipped() {
        let dir = fixture();
        write(dir.path(), "build/stale.cpp", "");
        let mut config = Config::default();
        config.toolchain.object_dir = "./build/".into();

        let out = generate(dir.path(), "main.cpp", &config).expect("generate");
        assert!(out.plan.unit("build/stale.cpp").is_none());
        assert_eq!(out.plan.units.len(), 1);
    }

    #[test]
    fn object_dir_contents_are_ignored() {
        let dir = fixture();
        write(dir.path(), "obj/generated.cpp", "");
        let out = generate(dir.path(), "main.cpp", &Config::default()).expect("generate");
        assert!(out.plan.unit("obj/generated.cpp").is_none());
    }
}
