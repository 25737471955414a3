//! # Glider Profile NetCDF Library
//!
//! This crate converts Slocum glider dba ASCII telemetry into per-profile
//! NetCDF files that satisfy the IOOS National Glider Data Assembly Center
//! (NGDAC) conventions. The library holds the whole pipeline; the
//! `dba2profile-nc` binary (`main.rs`) is a thin batch orchestrator over it.
//!
//! ## Crate Structure
//!
//! - **`config`**: Loads and cross-checks the deployment configuration
//!   directory (deployment, global attributes, instruments, sensor
//!   definitions). See `config::DeploymentContext`.
//! - **`constants`**: Slocum sensor name tables, NGDAC required variable
//!   names, and the NetCDF output format enum.
//! - **`ctd`**: Derived CTD quantities behind the `Physics` seam: practical
//!   salinity (PSS-78), in-situ density (EOS-80) and depth from pressure.
//! - **`dba`**: The dba parser, producing a dense sensor frame with the
//!   derived `llat_*` navigation sensors prepended.
//! - **`error`**: The crate-wide `GliderError` enum, separating fatal
//!   configuration errors from per-file and per-profile skips.
//! - **`frame`**: The `SensorFrame` matrix every pipeline stage works on.
//! - **`segment`**: Noise-tolerant segmentation of the depth time-series
//!   into monotonic profile intervals.
//! - **`sensors`**: Sensor-definition mapping and validation against the
//!   NGDAC variable requirements.
//! - **`writer`**: The per-profile NetCDF writer state machine and the
//!   staged-write/atomic-publish helpers.

pub mod config;
pub mod constants;
pub mod ctd;
pub mod dba;
pub mod error;
pub mod frame;
pub mod segment;
pub mod sensors;
pub mod writer;

pub use error::{AppResult, GliderError};
