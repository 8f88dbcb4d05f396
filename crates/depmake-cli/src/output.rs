//! Shared output layer for text/JSON parity.
//!
//! The Makefile itself is always plain text. Everything else the CLI prints
//! (plan summaries, errors) is rendered in the [`OutputMode`] selected with
//! `--plan text|json`; without `--plan`, text is used.

use std::io::{self, Write};

use clap::ValueEnum;
use depmake_core::graph::ScanReport;
use depmake_core::plan::BuildPlan;
use serde::Serialize;

/// Shared width for section separators.
pub const RULE_WIDTH: usize = 72;

/// Write a section heading followed by a separator.
pub fn section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    writeln!(w, "{:-<width$}", "", width = RULE_WIDTH)
}

/// Render a left-aligned key/value line.
pub fn kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Plain text for terminals and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "E1002").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Create a simple error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }
}

impl From<&depmake_core::Error> for CliError {
    fn from(err: &depmake_core::Error) -> Self {
        let code = err.code();
        Self {
            message: err.to_string(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

/// Everything `--plan` reports.
#[derive(Debug, Serialize)]
pub struct PlanOutput<'a> {
    #[serde(flatten)]
    pub plan: &'a BuildPlan,
    pub scan: ScanReport,
    pub graph_hash: &'a str,
}

/// Render a serializable value to `w` in the requested format.
///
/// In JSON mode, the value is serialized with `serde_json`. In text mode,
/// the provided `text_fn` closure produces the output.
pub fn render_to<T: Serialize>(
    w: &mut dyn Write,
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *w, value)?;
            writeln!(w)?;
        }
        OutputMode::Text => text_fn(value, w)?,
    }
    Ok(())
}

/// [`render_to`] on stdout.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_to(&mut out, mode, value, text_fn)
}

/// Render an error to `w` in the requested format.
pub fn render_error_to(
    w: &mut dyn Write,
    mode: OutputMode,
    error: &CliError,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut *w, &wrapper)?;
            writeln!(w)?;
        }
        OutputMode::Text => {
            match error.error_code {
                Some(ref code) => writeln!(w, "error[{code}]: {}", error.message)?,
                None => writeln!(w, "error: {}", error.message)?,
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(w, "  hint: {suggestion}")?;
            }
        }
    }
    Ok(())
}

/// Render an error to stderr.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    render_error_to(&mut out, mode, error)
}

/// Human-readable plan summary.
pub fn render_plan_text(output: &PlanOutput<'_>, w: &mut dyn Write) -> io::Result<()> {
    let plan = output.plan;
    section(w, &format!("Build plan for {}", plan.program))?;
    kv(w, "entry", &plan.entry)?;
    kv(w, "scanned", output.scan.files_scanned.to_string())?;
    kv(
        w,
        "includes",
        format!(
            "{} found, {} resolved, {} dropped, {} ambiguous",
            output.scan.includes_found,
            output.scan.resolved,
            output.scan.unresolved,
            output.scan.ambiguous
        ),
    )?;
    kv(w, "graph", output.graph_hash)?;
    writeln!(w)?;

    writeln!(w, "Rules ({})", plan.units.len())?;
    for unit in &plan.units {
        writeln!(w, "  {}.o  <- {}", unit.object_stem, unit.prerequisites.join(" "))?;
    }

    if !plan.cycles.is_empty() {
        writeln!(w)?;
        writeln!(w, "Include cycles ({})", plan.cycles.len())?;
        for cycle in &plan.cycles {
            writeln!(w, "  - {}", cycle.join(" <-> "))?;
        }
    }
    Ok(())
}
