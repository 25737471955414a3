//! Custom error types for the application.
//!
//! This module defines the primary error type, `GliderError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different failure classes the converter
//! distinguishes:
//!
//! - **Configuration errors** (`Config`, `ConfigValidation`) are fatal and
//!   abort the run before any file is touched.
//! - **Source errors** (`EmptySource`, `MalformedSource`, `DegenerateSignal`,
//!   `InsufficientPosition`, `MissingSensor`) cause a single input file to be
//!   skipped with a warning while the batch continues.
//! - **Profile errors** (`WriterInit`, `WriterOpen`, `UnknownVariable`,
//!   `NanMeanTime`) cause a single profile to be skipped and its staged
//!   artifact removed.
//!
//! NaN inside the physics pipeline is a valid datum, never an error.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, GliderError>;

#[derive(Error, Debug)]
pub enum GliderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration validation error: {0}")]
    ConfigValidation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("Sensor '{0}' has no definition")]
    MissingSensor(String),

    #[error("Degenerate depth signal: {0}")]
    DegenerateSignal(String),

    #[error("No valid {0} values anywhere in source")]
    InsufficientPosition(&'static str),

    #[error("Empty source file: {0}")]
    EmptySource(PathBuf),

    #[error("Malformed dba file {file}: {reason}")]
    MalformedSource { file: PathBuf, reason: String },

    #[error("Error initializing {path}: {source}")]
    WriterInit {
        path: PathBuf,
        source: netcdf::Error,
    },

    #[error("Error opening {path}: {source}")]
    WriterOpen {
        path: PathBuf,
        source: netcdf::Error,
    },

    #[error("Unknown variable '{0}' cannot be inserted: no sensor definition found")]
    UnknownVariable(String),

    #[error("Writer is in the wrong state for {0}")]
    WriterState(&'static str),

    #[error("Profile mean timestamp is NaN")]
    NanMeanTime,
}
