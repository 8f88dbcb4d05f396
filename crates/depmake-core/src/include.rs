//! Local include extraction.
//!
//! A line counts as a local include when, with all whitespace removed, it
//! starts with `#include"`. The target is everything up to the next `"`.
//! Angle-bracket includes, conditional blocks and macro-expanded includes
//! are not recognised.

use std::path::Path;

use tracing::{trace, warn};

const DIRECTIVE: &str = "#include\"";

/// Extract the local include targets of the file at `path`, in order.
///
/// An unreadable file yields no targets; the failure is logged and the scan
/// carries on.
#[must_use]
pub fn extract_includes(path: &Path) -> Vec<String> {
    match std::fs::read(path) {
        Ok(bytes) => parse_includes(&String::from_utf8_lossy(&bytes)),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "cannot read file; treating as no includes"
            );
            Vec::new()
        }
    }
}

/// Extract local include targets from file contents, one per matching line.
#[must_use]
pub fn parse_includes(text: &str) -> Vec<String> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<String> {
    let compact: String = line.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let rest = compact.strip_prefix(DIRECTIVE)?;
    let end = rest.find('"')?;
    let target = &rest[..end];
    if target.is_empty() {
        return None;
    }
    trace!(include = target, "found local include");
    Some(target.to_string())
}

/// The basename of an include target (`"../gfx/mesh.h"` → `"mesh.h"`).
///
/// Both `/` and `\` are treated as separators.
#[must_use]
pub fn target_basename(target: &str) -> &str {
    target.rsplit(['/', '\\']).next().unwrap_or(target)
}
