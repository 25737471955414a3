//! Profile NetCDF writer.
//!
//! [`ProfileNetCdfWriter`] drives one output file per detected profile
//! through a single forward path:
//!
//! ```text
//! uninitialized -> initialized -> opened -> populated -> finalized
//! ```
//!
//! `init_nc` establishes the full schema (record dimension, global
//! attributes, platform and instrument container variables) against a fresh
//! staged file and closes it; `open_nc` reopens it for appending and stamps
//! a history line; population inserts variable data by name-based lookup
//! against the sensor definitions, failing closed on undefined names;
//! `finish_nc` writes the scalar profile variables and coverage attributes,
//! closes the file permanently and returns the artifact descriptor. Only a
//! finalized file may be published (see [`stage`]).
//!
//! The writer owns the profile-id sequence for the whole batch: an explicit
//! starting id >= 1 selects a monotonically increasing counter, anything
//! else derives each id from its own interval's mean timestamp. Ids are
//! committed at finalization only, so a skipped or aborted profile never
//! consumes one and the sequence stays gap-free.

pub mod stage;

use crate::config::DeploymentContext;
use crate::constants::{NetcdfFormat, FILL_DOUBLE};
use crate::error::{AppResult, GliderError};
use crate::frame::nanmean;
use crate::sensors::SensorDefinition;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Sensors whose inserted data the writer keeps for the scalar profile
/// variables and coverage attributes written at finalization.
const CACHED_SENSORS: [&str; 4] = ["llat_time", "llat_latitude", "llat_longitude", "llat_depth"];

/// How profile ids are assigned across one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileIdPolicy {
    /// Writer-owned counter, strictly increasing across the whole batch.
    Sequential { next: i64 },
    /// Truncated mean-epoch timestamp of each interval, independent of
    /// other profiles.
    MeanTimestamp,
}

impl ProfileIdPolicy {
    /// Ids below 1 select the timestamp-derived policy.
    pub fn from_start_id(start_profile_id: i64) -> Self {
        if start_profile_id >= 1 {
            Self::Sequential {
                next: start_profile_id,
            }
        } else {
            Self::MeanTimestamp
        }
    }
}

/// Descriptor of one finalized profile file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileArtifact {
    /// Location the file was finalized at (the staged path; publication is
    /// the caller's move).
    pub path: PathBuf,
    /// Record-dimension length.
    pub rows: usize,
    /// Number of variables created in the file.
    pub variables: usize,
    /// Scalar profile id recorded in the file.
    pub profile_id: i64,
}

/// Per-profile NetCDF writer state machine.
pub struct ProfileNetCdfWriter {
    context: DeploymentContext,
    nc_format: NetcdfFormat,
    comp_level: u8,
    clobber: bool,
    id_policy: ProfileIdPolicy,

    nc: Option<netcdf::FileMut>,
    out_nc: Option<PathBuf>,
    opened: bool,
    pending_epoch: Option<f64>,
    history: String,
    rows: usize,
    created_vars: usize,
    cached: BTreeMap<String, Vec<f64>>,
}

impl ProfileNetCdfWriter {
    pub fn new(
        context: DeploymentContext,
        nc_format: NetcdfFormat,
        comp_level: u8,
        clobber: bool,
        start_profile_id: i64,
    ) -> AppResult<Self> {
        // Resolve the record dimension up front so a bad configuration
        // fails before any file is touched.
        context.sensor_defs.record_dimension()?;
        Ok(Self {
            context,
            nc_format,
            comp_level,
            clobber,
            id_policy: ProfileIdPolicy::from_start_id(start_profile_id),
            nc: None,
            out_nc: None,
            opened: false,
            pending_epoch: None,
            history: String::new(),
            rows: 0,
            created_vars: 0,
            cached: BTreeMap::new(),
        })
    }

    pub fn context(&self) -> &DeploymentContext {
        &self.context
    }

    pub fn trajectory(&self) -> &str {
        &self.context.trajectory
    }

    pub fn glider(&self) -> &str {
        &self.context.deployment.glider
    }

    pub fn clobber(&self) -> bool {
        self.clobber
    }

    pub fn id_policy(&self) -> ProfileIdPolicy {
        self.id_policy
    }

    /// Merge attributes discovered in a source file into the run's sensor
    /// definitions.
    pub fn update_data_file_sensor_defs(
        &mut self,
        source_attrs: &[(String, BTreeMap<String, serde_json::Value>)],
    ) {
        for (sensor, attrs) in source_attrs {
            self.context.sensor_defs.merge_source_attrs(sensor, attrs);
        }
    }

    /// Start a profile at the given mean epoch timestamp.
    ///
    /// The profile's id is not committed here: under the sequential policy
    /// the counter only advances in [`Self::finish_nc`], so a profile that
    /// is skipped or aborted before finalization never consumes an id.
    pub fn begin_profile(&mut self, mean_epoch: f64) {
        self.pending_epoch = Some(mean_epoch);
    }

    /// Create the output schema against a fresh file, then close it.
    ///
    /// On error the attempted file must not be left in a readable state;
    /// the caller discards the staged path.
    pub fn init_nc(&mut self, out_nc: &Path) -> AppResult<()> {
        if self.nc.is_some() || self.out_nc.is_some() {
            return Err(GliderError::WriterState("init_nc"));
        }

        self.history = self
            .context
            .global_attributes
            .get("history")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        if !self.history.is_empty() {
            self.history.push('\n');
        }
        self.rows = 0;
        self.created_vars = 0;
        self.cached.clear();

        let record_def = self.context.sensor_defs.record_dimension()?.clone();
        self.write_schema(out_nc, &record_def).map_err(|source| {
            GliderError::WriterInit {
                path: out_nc.to_path_buf(),
                source,
            }
        })?;

        self.out_nc = Some(out_nc.to_path_buf());
        Ok(())
    }

    fn write_schema(
        &mut self,
        out_nc: &Path,
        record_def: &SensorDefinition,
    ) -> Result<(), netcdf::Error> {
        let mut nc = netcdf::create_with(out_nc, format_options(self.nc_format))?;

        match record_def.dimension_length {
            Some(len) => nc.add_dimension(&record_def.nc_var_name, len)?,
            None => nc.add_unlimited_dimension(&record_def.nc_var_name)?,
        };

        // Global attributes, with the creation stamps and feature typing
        // the conventions require.
        let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        for (key, value) in &self.context.global_attributes {
            if key == "history" || key == "id" {
                continue;
            }
            put_file_attr(&mut nc, key, value)?;
        }
        nc.add_attribute("date_created", now.as_str())?;
        nc.add_attribute("date_issued", now.as_str())?;
        nc.add_attribute("date_modified", now.as_str())?;
        nc.add_attribute("cdm_data_type", "Profile")?;
        nc.add_attribute("featureType", "profile")?;
        nc.add_attribute(
            "id",
            self.context
                .global_attributes
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or(" "),
        )?;

        append_history(
            &mut nc,
            &mut self.history,
            &format!("{} created", out_nc.display()),
        )?;

        // Platform container variable.
        if self.context.sensor_defs.contains("platform") {
            let mut var = nc.add_variable::<f64>("platform", &[])?;
            var.set_fill_value(FILL_DOUBLE)?;
            for (key, value) in &self.context.deployment.platform {
                put_var_attr(&mut var, key, value)?;
            }
            self.created_vars += 1;
        } else {
            log::warn!("No platform sensor definition found; skipping platform variable");
        }

        // Instrument container variables.
        for instrument in &self.context.instruments.clone() {
            if nc.variable_mut(&instrument.nc_var_name).is_none() {
                let mut var = nc.add_variable::<f64>(&instrument.nc_var_name, &[])?;
                var.set_fill_value(FILL_DOUBLE)?;
                for (key, value) in &instrument.attrs {
                    put_var_attr(&mut var, key, value)?;
                }
                self.created_vars += 1;
            }
        }

        nc.add_attribute("uuid", uuid::Uuid::new_v4().to_string().as_str())?;

        // init_nc establishes the schema then closes; open_nc reopens for
        // data. Dropping the handle closes the file.
        drop(nc);
        Ok(())
    }

    /// Reopen the initialized file for appending.
    pub fn open_nc(&mut self) -> AppResult<()> {
        let Some(out_nc) = self.out_nc.clone() else {
            return Err(GliderError::WriterState("open_nc before init_nc"));
        };
        if self.nc.is_some() {
            return Err(GliderError::WriterState("open_nc on open file"));
        }
        let nc = netcdf::append(&out_nc).map_err(|source| GliderError::WriterOpen {
            path: out_nc.clone(),
            source,
        })?;
        self.nc = Some(nc);
        self.opened = true;
        Ok(())
    }

    /// Append a provenance line to the global history attribute.
    pub fn update_history(&mut self, message: &str) -> AppResult<()> {
        let Some(nc) = self.nc.as_mut() else {
            return Err(GliderError::WriterState("update_history"));
        };
        append_history(nc, &mut self.history, message)?;
        Ok(())
    }

    /// Write the trajectory id variable and the global id attribute.
    pub fn set_trajectory_id(&mut self) -> AppResult<()> {
        let trajectory = self.context.trajectory.clone();
        let configured_id = self
            .context
            .global_attributes
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or("");
        let Some(nc) = self.nc.as_mut() else {
            return Err(GliderError::WriterState("set_trajectory_id"));
        };

        if nc.variable_mut("trajectory").is_none() {
            nc.add_dimension("traj_strlen", trajectory.len())?;
            let mut var = nc.add_variable::<i8>("trajectory", &["traj_strlen"])?;
            var.put_attribute("cf_role", "trajectory_id")?;
            var.put_attribute("long_name", "Trajectory/Deployment Name")?;
            var.put_attribute(
                "comment",
                "A trajectory is a single deployment of a glider and may span multiple data files.",
            )?;
            self.created_vars += 1;
        }
        let bytes: Vec<i8> = trajectory.bytes().map(|b| b as i8).collect();
        if let Some(mut var) = nc.variable_mut("trajectory") {
            var.put_values(&bytes, (&[0usize], &[bytes.len()]))?;
        }

        if configured_id.is_empty() {
            nc.add_attribute("id", trajectory.as_str())?;
        }
        Ok(())
    }

    /// Set the global title attribute.
    pub fn set_title(&mut self, title: &str) -> AppResult<()> {
        let Some(nc) = self.nc.as_mut() else {
            return Err(GliderError::WriterState("set_title"));
        };
        nc.add_attribute("title", title)?;
        Ok(())
    }

    /// Write the source-file character variable and the global source
    /// attribute.
    pub fn set_source_file_var(
        &mut self,
        source_file: &str,
        attrs: &BTreeMap<String, serde_json::Value>,
    ) -> AppResult<()> {
        let configured_source = self
            .context
            .global_attributes
            .get("source")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or("");
        let Some(nc) = self.nc.as_mut() else {
            return Err(GliderError::WriterState("set_source_file_var"));
        };

        if nc.variable_mut("source_file").is_none() {
            nc.add_dimension("source_file_strlen", source_file.len())?;
            let mut var = nc.add_variable::<i8>("source_file", &["source_file_strlen"])?;
            for (key, value) in attrs {
                put_var_attr(&mut var, key, value)?;
            }
            var.put_attribute("long_name", "Source data file")?;
            var.put_attribute(
                "comment",
                "Name of the source data file and associated file metadata",
            )?;
            self.created_vars += 1;
        }
        let bytes: Vec<i8> = source_file.bytes().map(|b| b as i8).collect();
        if let Some(mut var) = nc.variable_mut("source_file") {
            var.put_values(&bytes, (&[0usize], &[bytes.len()]))?;
        }

        if configured_source.is_empty() {
            nc.add_attribute(
                "source",
                format!("Observational Slocum glider data from source dba file {source_file}")
                    .as_str(),
            )?;
        }
        Ok(())
    }

    /// Create every configured container variable (dimension-less
    /// definitions with attributes) not yet present in the file.
    pub fn set_container_variables(&mut self) -> AppResult<()> {
        if self.nc.is_none() {
            return Err(GliderError::WriterState("set_container_variables"));
        }
        let containers: Vec<String> = self
            .context
            .sensor_defs
            .iter()
            .filter(|(_, def)| def.dimension.is_none() && !def.attrs.is_empty())
            .map(|(sensor, _)| sensor.clone())
            .collect();
        for sensor in containers {
            self.ensure_variable(&sensor)?;
        }
        Ok(())
    }

    /// Insert one sensor's sliced data array by name-based lookup.
    ///
    /// Inserting a name with no sensor definition is a contract violation
    /// ([`GliderError::UnknownVariable`]); NaN values are stored as the
    /// variable's fill value.
    pub fn insert_var_data(&mut self, sensor: &str, data: &[f64]) -> AppResult<()> {
        if !self.opened || self.nc.is_none() {
            return Err(GliderError::WriterState("insert_var_data"));
        }
        let nc_var_name = self.ensure_variable(sensor)?;

        if CACHED_SENSORS.contains(&sensor) {
            self.cached.insert(sensor.to_string(), data.to_vec());
        }
        self.rows = self.rows.max(data.len());

        let filled: Vec<f64> = data
            .iter()
            .map(|v| if v.is_nan() { FILL_DOUBLE } else { *v })
            .collect();
        let Some(nc) = self.nc.as_mut() else {
            return Err(GliderError::WriterState("insert_var_data"));
        };
        let Some(mut var) = nc.variable_mut(&nc_var_name) else {
            return Err(GliderError::UnknownVariable(sensor.to_string()));
        };
        var.put_values(&filled, (&[0usize], &[filled.len()]))?;
        Ok(())
    }

    /// Write a scalar variable's value, NaN becoming the fill value.
    pub fn set_scalar(&mut self, sensor: &str, value: Option<f64>) -> AppResult<()> {
        let nc_var_name = self.ensure_variable(sensor)?;
        let stored = match value {
            Some(v) if v.is_finite() => v,
            _ => FILL_DOUBLE,
        };
        let Some(nc) = self.nc.as_mut() else {
            return Err(GliderError::WriterState("set_scalar"));
        };
        let Some(mut var) = nc.variable_mut(&nc_var_name) else {
            return Err(GliderError::UnknownVariable(sensor.to_string()));
        };
        var.put_values(&[stored], ..)?;
        Ok(())
    }

    fn set_scalar_if_defined(&mut self, sensor: &str, value: Option<f64>) -> AppResult<()> {
        if !self.context.sensor_defs.contains(sensor) {
            log::debug!("{sensor} not created: sensor definition does not exist");
            return Ok(());
        }
        self.set_scalar(sensor, value)
    }

    /// Write the scalar profile variables and coverage attributes, close
    /// the file permanently and return the artifact descriptor.
    pub fn finish_nc(&mut self) -> AppResult<ProfileArtifact> {
        if !self.opened || self.nc.is_none() {
            return Err(GliderError::WriterState("finish_nc"));
        }
        let Some(mean_epoch) = self.pending_epoch else {
            return Err(GliderError::WriterState("finish_nc before begin_profile"));
        };

        // The id commits here and nowhere else; a profile that never
        // reaches finalization leaves the sequence untouched.
        let profile_id = match &mut self.id_policy {
            ProfileIdPolicy::Sequential { next } => {
                let id = *next;
                *next += 1;
                id
            }
            ProfileIdPolicy::MeanTimestamp => mean_epoch.trunc() as i64,
        };

        log::debug!("Updating profile scalar variables");
        self.set_scalar("profile_id", Some(profile_id as f64))?;

        let times = self.cached.get("llat_time").cloned().unwrap_or_default();
        let lats = self
            .cached
            .get("llat_latitude")
            .cloned()
            .unwrap_or_default();
        let lons = self
            .cached
            .get("llat_longitude")
            .cloned()
            .unwrap_or_default();
        let depths = self.cached.get("llat_depth").cloned().unwrap_or_default();

        if times.is_empty() {
            log::warn!("Skipping creation of profile_time variable");
        } else {
            self.set_scalar_if_defined("profile_time", Some(nanmean(&times)))?;
            self.set_scalar_if_defined("time_uv", Some(nanmean(&times)))?;
        }
        if lats.is_empty() {
            log::warn!("Skipping creation of profile_lat");
        } else {
            let mean_lat = nanmean(&lats);
            self.set_scalar_if_defined("profile_lat", Some(mean_lat))?;
            self.set_scalar_if_defined("lat_uv", Some(mean_lat))?;
        }
        if lons.is_empty() {
            log::warn!("Skipping creation of profile_lon");
        } else {
            let mean_lon = nanmean(&lons);
            self.set_scalar_if_defined("profile_lon", Some(mean_lon))?;
            self.set_scalar_if_defined("lon_uv", Some(mean_lon))?;
        }

        self.write_coverage_attributes(&times, &lats, &lons, &depths)?;

        let Some(nc) = self.nc.as_mut() else {
            return Err(GliderError::WriterState("finish_nc"));
        };
        nc.add_attribute("uuid", uuid::Uuid::new_v4().to_string().as_str())?;

        // Close permanently and reset for the next profile.
        self.nc = None;
        self.opened = false;
        self.pending_epoch = None;
        let path = self
            .out_nc
            .take()
            .unwrap_or_default();

        Ok(ProfileArtifact {
            path,
            rows: self.rows,
            variables: self.created_vars,
            profile_id,
        })
    }

    /// Discard the in-progress file without finalizing it. The pending
    /// profile's id was never committed, so the sequence is unaffected.
    pub fn abort_nc(&mut self) {
        self.nc = None;
        self.opened = false;
        self.pending_epoch = None;
        if let Some(path) = self.out_nc.take() {
            stage::discard(&path);
        }
    }

    fn write_coverage_attributes(
        &mut self,
        times: &[f64],
        lats: &[f64],
        lons: &[f64],
        depths: &[f64],
    ) -> AppResult<()> {
        let Some(nc) = self.nc.as_mut() else {
            return Err(GliderError::WriterState("finish_nc"));
        };

        let (min_lat, max_lat) = finite_min_max(lats);
        let (min_lon, max_lon) = finite_min_max(lons);
        let bounds = if [min_lat, max_lat, min_lon, max_lon]
            .iter()
            .any(|v| v.is_nan())
        {
            "POLYGON EMPTY".to_string()
        } else {
            format!(
                "POLYGON (({max_lat} {min_lon}, {max_lat} {max_lon}, {min_lat} {max_lon}, \
                 {min_lat} {min_lon}, {max_lat} {min_lon}))"
            )
        };
        nc.add_attribute("geospatial_lat_min", min_lat)?;
        nc.add_attribute("geospatial_lat_max", max_lat)?;
        nc.add_attribute("geospatial_lon_min", min_lon)?;
        nc.add_attribute("geospatial_lon_max", max_lon)?;
        nc.add_attribute("geospatial_bounds", bounds.as_str())?;

        let (min_depth, max_depth) = finite_min_max(depths);
        nc.add_attribute("geospatial_vertical_min", min_depth)?;
        nc.add_attribute("geospatial_vertical_max", max_depth)?;

        let (min_time, max_time) = finite_min_max(times);
        if min_time.is_finite() && max_time.is_finite() {
            if let (Some(dt0), Some(dt1)) = (
                DateTime::from_timestamp(min_time as i64, 0),
                DateTime::from_timestamp(max_time as i64, 0),
            ) {
                nc.add_attribute(
                    "time_coverage_start",
                    dt0.format("%Y-%m-%dT%H:%M:%SZ").to_string().as_str(),
                )?;
                nc.add_attribute(
                    "time_coverage_end",
                    dt1.format("%Y-%m-%dT%H:%M:%SZ").to_string().as_str(),
                )?;
                nc.add_attribute(
                    "time_coverage_duration",
                    iso8601_duration(max_time - min_time).as_str(),
                )?;
            }
        } else {
            log::warn!("Skipping set global time_coverage_start/end attributes");
        }
        Ok(())
    }

    /// Look a sensor up and create its variable in the file if absent,
    /// returning the NetCDF variable name. Fails closed on undefined
    /// sensors.
    fn ensure_variable(&mut self, sensor: &str) -> AppResult<String> {
        let def = self
            .context
            .sensor_defs
            .get(sensor)
            .ok_or_else(|| GliderError::UnknownVariable(sensor.to_string()))?
            .clone();
        let Some(nc) = self.nc.as_mut() else {
            return Err(GliderError::WriterState("variable creation"));
        };
        if nc.variable_mut(&def.nc_var_name).is_some() {
            return Ok(def.nc_var_name);
        }

        create_variable(nc, sensor, &def, self.nc_format, self.comp_level)?;
        self.created_vars += 1;
        Ok(def.nc_var_name)
    }
}

impl fmt::Display for ProfileNetCdfWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<ProfileNetCDFWriter(config_path={}, trajectory={}, format={})>",
            self.context.config_path.display(),
            self.context.trajectory,
            self.nc_format
        )
    }
}

fn create_variable(
    nc: &mut netcdf::FileMut,
    sensor: &str,
    def: &SensorDefinition,
    nc_format: NetcdfFormat,
    comp_level: u8,
) -> Result<(), netcdf::Error> {
    let mut var = match &def.dimension {
        Some(dim) => nc.add_variable::<f64>(&def.nc_var_name, &[dim.as_str()])?,
        None => nc.add_variable::<f64>(&def.nc_var_name, &[])?,
    };
    if def.is_record_variable() && comp_level > 0 && nc_format.supports_compression() {
        var.set_compression(i32::from(comp_level), true)?;
    }
    var.set_fill_value(FILL_DOUBLE)?;

    let has_long_name = def
        .attrs
        .get("long_name")
        .and_then(|v| v.as_str())
        .map_or(false, |s| !s.trim().is_empty());
    if !has_long_name {
        var.put_attribute("long_name", sensor)?;
    }
    for (key, value) in &def.attrs {
        if key == "long_name" && !has_long_name {
            continue;
        }
        put_var_attr(&mut var, key, value)?;
    }
    Ok(())
}

fn append_history(
    nc: &mut netcdf::FileMut,
    history: &mut String,
    message: &str,
) -> Result<(), netcdf::Error> {
    let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    history.push_str(&format!("{now}: {message}\n"));
    nc.add_attribute("history", history.as_str()).map(|_| ())
}

fn put_file_attr(
    nc: &mut netcdf::FileMut,
    key: &str,
    value: &serde_json::Value,
) -> Result<(), netcdf::Error> {
    match value {
        serde_json::Value::String(s) => nc.add_attribute(key, s.as_str()).map(|_| ()),
        serde_json::Value::Number(n) => nc
            .add_attribute(key, n.as_f64().unwrap_or(f64::NAN))
            .map(|_| ()),
        other => nc.add_attribute(key, other.to_string().as_str()).map(|_| ()),
    }
}

fn put_var_attr(
    var: &mut netcdf::VariableMut<'_>,
    key: &str,
    value: &serde_json::Value,
) -> Result<(), netcdf::Error> {
    match value {
        serde_json::Value::String(s) => var.put_attribute(key, s.as_str()).map(|_| ()),
        serde_json::Value::Number(n) => var
            .put_attribute(key, n.as_f64().unwrap_or(f64::NAN))
            .map(|_| ()),
        other => var.put_attribute(key, other.to_string().as_str()).map(|_| ()),
    }
}

fn format_options(format: NetcdfFormat) -> netcdf::Options {
    match format {
        NetcdfFormat::Netcdf3Classic => netcdf::Options::empty(),
        NetcdfFormat::Netcdf4Classic => netcdf::Options::NETCDF4 | netcdf::Options::CLASSIC,
        NetcdfFormat::Netcdf4 => netcdf::Options::NETCDF4,
    }
}

fn finite_min_max(values: &[f64]) -> (f64, f64) {
    let mut min = f64::NAN;
    let mut max = f64::NAN;
    for v in values {
        if !v.is_finite() {
            continue;
        }
        if min.is_nan() || *v < min {
            min = *v;
        }
        if max.is_nan() || *v > max {
            max = *v;
        }
    }
    (min, max)
}

/// ISO 8601:2004 duration string for a span of seconds.
fn iso8601_duration(total_seconds: f64) -> String {
    let mut seconds = total_seconds;
    let days = (seconds / 86_400.0).floor();
    seconds -= days * 86_400.0;
    let hours = (seconds / 3_600.0).floor();
    seconds -= hours * 3_600.0;
    let minutes = (seconds / 60.0).floor();
    seconds -= minutes * 60.0;
    let seconds = (seconds * 1e6).round() / 1e6;

    let mut out = String::from("P");
    if days > 0.0 {
        out.push_str(&format!("{}D", days as i64));
    }
    out.push('T');
    if days > 0.0 || hours > 0.0 {
        out.push_str(&format!("{:02}H", hours as i64));
    }
    if days > 0.0 || hours > 0.0 || minutes > 0.0 {
        out.push_str(&format!("{:02}M", minutes as i64));
    }
    if seconds.fract() == 0.0 {
        out.push_str(&format!("{:02}S", seconds as i64));
    } else {
        let formatted = format!("{seconds:09.6}");
        out.push_str(formatted.trim_end_matches('0'));
        out.push('S');
    }
    out
}
