//! File inventory: every regular file under a project root.
//!
//! The inventory does not filter by extension; callers classify records with
//! [`crate::config::ScanConfig::classify`]. Entries are sorted by file name
//! within each directory, so the inventory order (which drives basename
//! tie-breaking) is the same on every platform.

use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{instrument, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("cannot read project root {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("project root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

impl InventoryError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::RootUnreadable { .. } => ErrorCode::RootUnreadable,
            Self::NotADirectory(_) => ErrorCode::RootNotDirectory,
        }
    }
}

/// How a file participates in the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// A compilation unit; gets an object-file rule.
    Source,
    /// Included by other files; never compiled on its own.
    Header,
    Other,
}

/// One discovered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Path as found on disk (root joined with the relative path).
    pub full_path: PathBuf,
    /// Root-relative path with `/` separators; the graph node id.
    pub id: String,
    /// Basename, used for include matching.
    pub file_name: String,
    /// Basename without its final extension; names the object file.
    pub stem: String,
    /// Lower-cased extension without the dot.
    pub extension: Option<String>,
}

impl FileRecord {
    /// Build a record for `full_path`, which must live under `root`.
    #[must_use]
    pub fn new(root: &Path, full_path: PathBuf) -> Self {
        let relative = full_path.strip_prefix(root).unwrap_or(&full_path);
        let id = relative_id(relative);
        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = full_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = full_path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());

        Self {
            full_path,
            id,
            file_name,
            stem,
            extension,
        }
    }
}

/// Join the normal components of a relative path with `/`.
fn relative_id(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// The single "list all files under root" capability the pipeline uses.
pub trait FileSource {
    /// List every regular file under `root`.
    ///
    /// # Errors
    ///
    /// Fails only when `root` itself is unusable; unreadable entries below
    /// it are skipped.
    fn list_files(&self, root: &Path) -> Result<Vec<FileRecord>, InventoryError>;
}

/// [`FileSource`] backed by a recursive `walkdir` traversal.
#[derive(Debug, Clone)]
pub struct WalkDirSource {
    max_depth: usize,
    skip_hidden: bool,
    skip_dirs: Vec<String>,
}

impl Default for WalkDirSource {
    fn default() -> Self {
        Self {
            max_depth: 64,
            skip_hidden: true,
            skip_dirs: Vec::new(),
        }
    }
}

impl WalkDirSource {
    #[must_use]
    pub fn new(max_depth: usize, skip_hidden: bool) -> Self {
        Self {
            max_depth,
            skip_hidden,
            skip_dirs: Vec::new(),
        }
    }

    /// Skip a root-relative directory (e.g. the object output directory).
    ///
    /// The path is normalised like a record id, so `./obj/` skips `obj`.
    /// Paths that point outside the root are ignored.
    #[must_use]
    pub fn skip_dir(mut self, relative: impl AsRef<Path>) -> Self {
        let dir = relative.as_ref();
        let escapes_root = dir.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes_root {
            return self;
        }
        let id = relative_id(dir);
        if !id.is_empty() {
            self.skip_dirs.push(id);
        }
        self
    }

    fn is_skipped(&self, root: &Path, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        if self.skip_hidden && entry.file_name().to_string_lossy().starts_with('.') {
            return true;
        }
        if entry.file_type().is_dir() && !self.skip_dirs.is_empty() {
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let id = relative_id(rel);
            return self.skip_dirs.iter().any(|d| *d == id);
        }
        false
    }
}

impl FileSource for WalkDirSource {
    #[instrument(skip(self))]
    fn list_files(&self, root: &Path) -> Result<Vec<FileRecord>, InventoryError> {
        let meta = std::fs::metadata(root).map_err(|source| InventoryError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(InventoryError::NotADirectory(root.to_path_buf()));
        }
        std::fs::read_dir(root).map_err(|source| InventoryError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;

        let walker = WalkDir::new(root)
            .follow_links(false)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_skipped(root, entry));

        let mut records = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    records.push(FileRecord::new(root, entry.into_path()));
                }
                Ok(_) => {}
                Err(err) => {
                    let path = err.path().map(|p| p.display().to_string());
                    warn!(path = ?path, error = %err, "skipping unreadable entry");
                }
            }
        }

        Ok(records)
    }
}
