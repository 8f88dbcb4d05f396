#![forbid(unsafe_code)]
//! depmake-core library.
//!
//! Infers build rules for a C/C++ tree from its local `#include "..."`
//! directives and renders them as a Makefile.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per module, aggregated in [`Error`], each
//!   mapped to a stable [`ErrorCode`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).
//!
//! # Example
//!
//! ```rust,ignore
//! use depmake_core::{config::Config, generate};
//!
//! let out = generate(std::path::Path::new("."), "main.cpp", &Config::default())?;
//! depmake_core::emit::write_makefile("Makefile".as_ref(), &out.makefile)?;
//! ```

pub mod config;
pub mod emit;
pub mod error;
pub mod generate;
pub mod graph;
pub mod include;
pub mod inventory;
pub mod plan;

pub use error::{Error, ErrorCode};
pub use generate::{Generated, Project, generate};
