use std::fmt;

use crate::config::ConfigError;
use crate::emit::EmitError;
use crate::inventory::InventoryError;
use crate::plan::PlanError;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingEntryPoint,
    EntryPointNotFound,
    EntryPointNotSource,
    ConfigReadFailed,
    ConfigParseError,
    InvalidExtension,
    RootUnreadable,
    RootNotDirectory,
    OutputWriteFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingEntryPoint => "E1001",
            Self::EntryPointNotFound => "E1002",
            Self::EntryPointNotSource => "E1003",
            Self::ConfigReadFailed => "E1101",
            Self::ConfigParseError => "E1102",
            Self::InvalidExtension => "E1103",
            Self::RootUnreadable => "E2001",
            Self::RootNotDirectory => "E2002",
            Self::OutputWriteFailed => "E3001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingEntryPoint => "No entry point supplied",
            Self::EntryPointNotFound => "Entry point not found in scanned tree",
            Self::EntryPointNotSource => "Entry point is not a compilation unit",
            Self::ConfigReadFailed => "Config file could not be read",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidExtension => "Invalid extension list",
            Self::RootUnreadable => "Project root could not be read",
            Self::RootNotDirectory => "Project root is not a directory",
            Self::OutputWriteFailed => "Build file write failed",
        }
    }

    /// Optional remediation hint surfaced next to the error.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingEntryPoint => {
                Some("Pass the file containing main(), e.g. `depmake main.cpp`.")
            }
            Self::EntryPointNotFound => {
                Some("Check the file name and that it lives under the project root.")
            }
            Self::EntryPointNotSource => {
                Some("Name a source file (.cpp, .cc, ...), not a header.")
            }
            Self::ConfigReadFailed => Some("Check permissions on depmake.toml."),
            Self::ConfigParseError => Some("Fix syntax in depmake.toml and retry."),
            Self::InvalidExtension => {
                Some("An extension may appear in either `sources` or `headers`, not both.")
            }
            Self::RootUnreadable | Self::RootNotDirectory => {
                Some("Run from the project directory or pass `-C <dir>`.")
            }
            Self::OutputWriteFailed => Some("Check disk space and write permissions."),
        }
    }

    /// Process exit code for this class of failure.
    ///
    /// Configuration errors exit 1, input errors 2, output errors 3.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::MissingEntryPoint
            | Self::EntryPointNotFound
            | Self::EntryPointNotSource
            | Self::ConfigReadFailed
            | Self::ConfigParseError
            | Self::InvalidExtension => 1,
            Self::RootUnreadable | Self::RootNotDirectory => 2,
            Self::OutputWriteFailed => 3,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Any failure that aborts a generation run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl Error {
    /// The stable code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Config(e) => e.code(),
            Self::Inventory(e) => e.code(),
            Self::Plan(e) => e.code(),
            Self::Emit(_) => ErrorCode::OutputWriteFailed,
        }
    }
}
