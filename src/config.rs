//! Deployment configuration management.
//!
//! A deployment configuration directory holds four JSON documents:
//!
//! - `deployment.json`: glider name, trajectory naming, platform attributes
//! - `global_attributes.json`: NetCDF global attributes for every file
//! - `instruments.json`: instrument container variable definitions
//! - `sensor_defs.json`: sensor-to-variable mapping (see [`crate::sensors`])
//!
//! All four must exist; a missing or unparsable document is a fatal
//! configuration error.

use crate::error::{AppResult, GliderError};
use crate::sensors::{SensorDefinition, SensorDefs};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Contents of `deployment.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Glider name, used in trajectory ids and output file names.
    pub glider: String,
    /// Explicit trajectory name. Overrides `trajectory_datetime` when set.
    #[serde(default)]
    pub trajectory_name: Option<String>,
    /// Deployment start used to derive the trajectory name.
    #[serde(default)]
    pub trajectory_datetime: Option<String>,
    /// Attributes written onto the platform container variable.
    #[serde(default)]
    pub platform: BTreeMap<String, serde_json::Value>,
    /// Extra deployment fields are preserved but unused.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One entry of `instruments.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub nc_var_name: String,
    #[serde(rename = "type", default)]
    pub nc_type: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

/// Fully loaded deployment context for one run.
#[derive(Debug, Clone)]
pub struct DeploymentContext {
    pub config_path: PathBuf,
    pub deployment: DeploymentConfig,
    pub global_attributes: BTreeMap<String, serde_json::Value>,
    pub instruments: Vec<InstrumentConfig>,
    pub sensor_defs: SensorDefs,
    pub sensor_defs_file: PathBuf,
    /// Trajectory id string, `<glider>-<YYYYmmddTHHMM>-rt` unless configured.
    pub trajectory: String,
}

impl DeploymentContext {
    /// Load and cross-check every configuration document under `config_path`.
    pub fn load(config_path: &Path) -> AppResult<Self> {
        if !config_path.is_dir() {
            return Err(GliderError::Config(format!(
                "invalid configuration path: {}",
                config_path.display()
            )));
        }

        let deployment_file = config_path.join("deployment.json");
        let global_attributes_file = config_path.join("global_attributes.json");
        let instruments_file = config_path.join("instruments.json");
        let sensor_defs_file = config_path.join("sensor_defs.json");
        for required in [
            &deployment_file,
            &global_attributes_file,
            &instruments_file,
            &sensor_defs_file,
        ] {
            if !required.is_file() {
                return Err(GliderError::Config(format!(
                    "configuration file not found: {}",
                    required.display()
                )));
            }
        }

        log::debug!(
            "Loading deployment configuration: {}",
            deployment_file.display()
        );
        let deployment: DeploymentConfig = read_json(&deployment_file)?;
        log::debug!(
            "Loading global attributes: {}",
            global_attributes_file.display()
        );
        let global_attributes: BTreeMap<String, serde_json::Value> =
            read_json(&global_attributes_file)?;
        log::debug!(
            "Loading instrument configurations: {}",
            instruments_file.display()
        );
        let instruments: Vec<InstrumentConfig> = read_json(&instruments_file)?;
        log::debug!(
            "Loading deployment sensor definitions: {}",
            sensor_defs_file.display()
        );
        let defs: BTreeMap<String, SensorDefinition> = read_json(&sensor_defs_file)?;
        let sensor_defs = SensorDefs::new(defs);

        let trajectory = trajectory_name(&deployment)?;

        Ok(Self {
            config_path: config_path.to_path_buf(),
            deployment,
            global_attributes,
            instruments,
            sensor_defs,
            sensor_defs_file,
            trajectory,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> AppResult<T> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        GliderError::Config(format!("error parsing {}: {}", path.display(), e))
    })
}

/// Derive the trajectory id: `trajectory_name` when configured, otherwise
/// `<glider>-<YYYYmmddTHHMM>-rt` from the parsed `trajectory_datetime`.
fn trajectory_name(deployment: &DeploymentConfig) -> AppResult<String> {
    if let Some(name) = deployment
        .trajectory_name
        .as_ref()
        .filter(|name| !name.is_empty())
    {
        return Ok(name.clone());
    }

    let Some(raw) = deployment.trajectory_datetime.as_ref() else {
        return Err(GliderError::Config(
            "no trajectory_name or trajectory_datetime key in deployment.json".to_string(),
        ));
    };
    let dt = parse_trajectory_datetime(raw).ok_or_else(|| {
        GliderError::Config(format!("error parsing deployment trajectory_datetime: {raw}"))
    })?;
    Ok(format!(
        "{}-{}-rt",
        deployment.glider,
        dt.format("%Y%m%dT%H%M")
    ))
}

fn parse_trajectory_datetime(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
    ];
    for fmt in FORMATS {
        if fmt == "%Y-%m-%d" {
            if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, fmt) {
                return date.and_hms_opt(0, 0, 0);
            }
        } else if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    None
}
