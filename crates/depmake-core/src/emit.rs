//! Makefile emission.
//!
//! Output layout, in order:
//!
//! ```text
//! # header comment
//! CC / ODIR / PROG / CXXFLAGS / OBJS   variables
//! $(PROG) : $(OBJS)                    default target, links every object
//! $(ODIR)/<stem>.o : <closure> | $(ODIR)   one rule per unit, plan order
//! $(ODIR) :                            creates the object directory
//! clean :                              removes $(ODIR) and $(PROG)
//! ```
//!
//! Rendering is a pure function of the plan and toolchain settings, so an
//! unchanged tree always renders byte-identical output.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::config::ToolchainConfig;
use crate::plan::BuildPlan;

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Render `plan` as Makefile text.
#[must_use]
pub fn render_makefile(plan: &BuildPlan, toolchain: &ToolchainConfig) -> String {
    let objects: Vec<String> = plan
        .object_stems()
        .map(|stem| format!("$(ODIR)/{}.o", escape(stem)))
        .collect();

    let mut lines: Vec<String> = vec![
        format!("# Generated by depmake for {}. Do not edit.", plan.entry),
        variable("CC", &toolchain.compiler),
        variable("ODIR", &toolchain.object_dir),
        variable("PROG", &plan.program),
        variable("CXXFLAGS", &toolchain.flags),
        variable("OBJS", &objects.join(" ")),
        String::new(),
        "$(PROG) : $(OBJS)".to_string(),
        "\t$(CC) -o $@ $(OBJS) $(CXXFLAGS)".to_string(),
        String::new(),
    ];

    for unit in &plan.units {
        let prerequisites: Vec<String> = unit.prerequisites.iter().map(|p| escape(p)).collect();
        lines.push(format!(
            "$(ODIR)/{}.o : {} | $(ODIR)",
            escape(&unit.object_stem),
            prerequisites.join(" ")
        ));
        lines.push("\t$(CC) $(CXXFLAGS) -c $< -o $@".to_string());
        lines.push(String::new());
    }

    lines.extend(
        [
            "$(ODIR) :",
            "\tmkdir -p $(ODIR)",
            "",
            ".PHONY : clean",
            "clean :",
            "\trm -rf $(ODIR)",
            "\trm -f $(PROG)",
        ]
        .map(String::from),
    );

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Write `contents` to `path` through a sibling temp file and a rename, so
/// a failed write never leaves a truncated build file behind.
///
/// # Errors
///
/// Returns [`EmitError::Write`] if the temp file cannot be written or moved
/// into place.
#[instrument(skip(contents), fields(bytes = contents.len()))]
pub fn write_makefile(path: &Path, contents: &str) -> Result<(), EmitError> {
    let file_name = path
        .file_name()
        .map_or_else(|| "Makefile".into(), |n| n.to_string_lossy().into_owned());
    let tmp_path = path.with_file_name(format!(".{file_name}.depmake.tmp"));

    let result = fs::write(&tmp_path, contents).and_then(|()| fs::rename(&tmp_path, path));
    if let Err(source) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(EmitError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    debug!(path = %path.display(), "build file written");
    Ok(())
}

fn variable(name: &str, value: &str) -> String {
    if value.is_empty() {
        format!("{name} =")
    } else {
        format!("{name} = {value}")
    }
}

/// Escape characters make treats specially inside a prerequisite list.
fn escape(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            ' ' => out.push_str("\\ "),
            '#' => out.push_str("\\#"),
            '$' => out.push_str("$$"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::BuildUnit;
    use tempfile::TempDir;

    fn unit(stem: &str, prereqs: &[&str]) -> BuildUnit {
        BuildUnit {
            object_stem: stem.to_string(),
            primary_source: prereqs[0].to_string(),
            prerequisites: prereqs.iter().map(ToString::to_string).collect(),
            out_degree: prereqs.len() - 1,
        }
    }

    fn sample_plan() -> BuildPlan {
        BuildPlan {
            program: "main".to_string(),
            entry: "main.cpp".to_string(),
            units: vec![unit("main", &["main.cpp", "foo.h", "bar.h"])],
            cycles: Vec::new(),
        }
    }

    #[test]
    fn renders_full_makefile() {
        let text = render_makefile(&sample_plan(), &ToolchainConfig::default());
        let expected = "\
# Generated by depmake for main.cpp. Do not edit.
CC = g++
ODIR = obj
PROG = main
CXXFLAGS =
OBJS = $(ODIR)/main.o

$(PROG) : $(OBJS)
\t$(CC) -o $@ $(OBJS) $(CXXFLAGS)

$(ODIR)/main.o : main.cpp foo.h bar.h | $(ODIR)
\t$(CC) $(CXXFLAGS) -c $< -o $@

$(ODIR) :
\tmkdir -p $(ODIR)

.PHONY : clean
clean :
\trm -rf $(ODIR)
\trm -f $(PROG)
";
        assert_eq!(text, expected);
    }

    #[test]
    fn one_rule_per_unit_in_plan_order() {
        let mut plan = sample_plan();
        plan.units.insert(0, unit("util", &["lib/util.cpp", "lib/util.h"]));
        let text = render_makefile(&plan, &ToolchainConfig::default());

        assert!(text.contains("OBJS = $(ODIR)/util.o $(ODIR)/main.o\n"));
        let util = text.find("$(ODIR)/util.o : lib/util.cpp lib/util.h").expect("util rule");
        let main = text.find("$(ODIR)/main.o : main.cpp").expect("main rule");
        assert!(util < main);
    }

    #[test]
    fn toolchain_settings_are_used() {
        let toolchain = ToolchainConfig {
            compiler: "clang++".into(),
            flags: "-O2 -Wall".into(),
            object_dir: "build".into(),
        };
        let text = render_makefile(&sample_plan(), &toolchain);
        assert!(text.contains("CC = clang++\n"));
        assert!(text.contains("CXXFLAGS = -O2 -Wall\n"));
        assert!(text.contains("ODIR = build\n"));
    }

    #[test]
    fn special_characters_are_escaped() {
        assert_eq!(escape("my dir/a b.h"), "my\\ dir/a\\ b.h");
        assert_eq!(escape("c#/x$.h"), "c\\#/x$$.h");
    }

    #[test]
    fn write_replaces_existing_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("Makefile");
        fs::write(&path, "old").expect("seed");

        write_makefile(&path, "new\n").expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "new\n");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("absent/Makefile");
        let err = write_makefile(&path, "x").expect_err("must fail");
        assert!(matches!(err, EmitError::Write { .. }));
        assert!(!path.exists());
    }
}
