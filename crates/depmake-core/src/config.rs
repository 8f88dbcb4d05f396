//! Layered configuration.
//!
//! Precedence, lowest first: built-in defaults, the user config at
//! `$XDG_CONFIG_HOME/depmake/config.toml`, the project config at
//! `<root>/depmake.toml`, then command-line overrides ([`Overrides`]).
//!
//! Layers are merged key-by-key, so a project file that only sets
//! `toolchain.compiler` keeps the user's `toolchain.flags`.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ErrorCode;
use crate::graph::ResolutionStrategy;
use crate::inventory::FileKind;
use crate::plan::LinkScope;

/// File name of the per-project configuration.
pub const PROJECT_CONFIG_FILE: &str = "depmake.toml";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("extension `{0}` is listed as both a source and a header extension")]
    ConflictingExtension(String),

    #[error("no {0} extensions configured")]
    EmptyExtensions(&'static str),
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::ConfigReadFailed,
            Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::ConflictingExtension(_) | Self::EmptyExtensions(_) => {
                ErrorCode::InvalidExtension
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub plan: PlanConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Variables written into the generated Makefile header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default = "default_compiler")]
    pub compiler: String,
    #[serde(default)]
    pub flags: String,
    #[serde(default = "default_object_dir")]
    pub object_dir: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: default_compiler(),
            flags: String::new(),
            object_dir: default_object_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Extensions of compilation units, without the leading dot.
    #[serde(default = "default_source_extensions")]
    pub sources: Vec<String>,
    /// Extensions of headers, without the leading dot.
    #[serde(default = "default_header_extensions")]
    pub headers: Vec<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_true")]
    pub skip_hidden: bool,
    #[serde(default)]
    pub resolution: ResolutionStrategy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sources: default_source_extensions(),
            headers: default_header_extensions(),
            max_depth: default_max_depth(),
            skip_hidden: true,
            resolution: ResolutionStrategy::default(),
        }
    }
}

impl ScanConfig {
    /// Classify a lower-cased extension (no leading dot).
    #[must_use]
    pub fn classify(&self, extension: Option<&str>) -> FileKind {
        let Some(ext) = extension else {
            return FileKind::Other;
        };
        if self.sources.iter().any(|s| s == ext) {
            FileKind::Source
        } else if self.headers.iter().any(|h| h == ext) {
            FileKind::Header
        } else {
            FileKind::Other
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default)]
    pub link: LinkScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_output_file(),
        }
    }
}

/// Command-line values that take precedence over every config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub compiler: Option<String>,
    pub flags: Option<String>,
    pub object_dir: Option<String>,
    pub resolution: Option<ResolutionStrategy>,
    pub link: Option<LinkScope>,
    pub output_file: Option<PathBuf>,
}

impl Config {
    /// Apply command-line overrides on top of the loaded layers.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(compiler) = overrides.compiler {
            self.toolchain.compiler = compiler;
        }
        if let Some(flags) = overrides.flags {
            self.toolchain.flags = flags;
        }
        if let Some(dir) = overrides.object_dir {
            self.toolchain.object_dir = dir;
        }
        if let Some(resolution) = overrides.resolution {
            self.scan.resolution = resolution;
        }
        if let Some(link) = overrides.link {
            self.plan.link = link;
        }
        if let Some(file) = overrides.output_file {
            self.output.file = file;
        }
    }

    /// Normalize extension lists (strip dots, lower-case, dedup) and reject
    /// lists that would make classification ambiguous.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConflictingExtension`] when an extension is
    /// both a source and a header, and [`ConfigError::EmptyExtensions`] when
    /// no source extension remains.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.scan.sources = normalize_extensions(&self.scan.sources);
        self.scan.headers = normalize_extensions(&self.scan.headers);

        if self.scan.sources.is_empty() {
            return Err(ConfigError::EmptyExtensions("source"));
        }
        if let Some(clash) = self
            .scan
            .sources
            .iter()
            .find(|ext| self.scan.headers.contains(ext))
        {
            return Err(ConfigError::ConflictingExtension(clash.clone()));
        }
        Ok(self)
    }
}

/// Path of the per-user config file, if the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("depmake/config.toml"))
}

/// Load user and project layers for `project_root`.
///
/// # Errors
///
/// Returns an error if a present config file cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<Config, ConfigError> {
    let mut layers = Vec::with_capacity(2);
    if let Some(user) = user_config_path() {
        layers.push(user);
    }
    layers.push(project_root.join(PROJECT_CONFIG_FILE));
    load_layers(&layers)
}

/// Merge the given TOML files in order; later files win. Missing files are
/// skipped.
///
/// # Errors
///
/// Returns an error if a present file cannot be read, is not valid TOML, or
/// does not match the config schema.
pub fn load_layers(paths: &[PathBuf]) -> Result<Config, ConfigError> {
    let mut merged = toml::Table::new();

    for path in paths {
        let Some(table) = read_layer(path)? else {
            continue;
        };
        debug!(path = %path.display(), "loaded config layer");
        merge_tables(&mut merged, table);
    }

    toml::Value::Table(merged)
        .try_into::<Config>()
        .map_err(|source| ConfigError::Parse {
            path: paths.last().cloned().unwrap_or_default(),
            source,
        })
}

fn read_layer(path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let table = toml::from_str::<toml::Table>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    // Schema check per layer so type errors name the offending file.
    toml::Value::Table(table.clone())
        .try_into::<Config>()
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(Some(table))
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn normalize_extensions(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for ext in raw {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}

fn default_compiler() -> String {
    "g++".to_string()
}

fn default_object_dir() -> String {
    "obj".to_string()
}

fn default_source_extensions() -> Vec<String> {
    ["cpp", "cc", "cxx", "c++", "cp", "c"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_header_extensions() -> Vec<String> {
    ["h", "hpp", "hh", "hxx"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

const fn default_max_depth() -> usize {
    64
}

const fn default_true() -> bool {
    true
}

fn default_output_file() -> PathBuf {
    PathBuf::from("Makefile")
}
