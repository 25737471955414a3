//! Sensor definitions: the mapping from raw glider sensor names to NetCDF
//! variables.
//!
//! A [`SensorDefinition`] carries everything needed to create one NetCDF
//! variable: the output variable name, whether it spans the record dimension
//! or is a scalar/container, and its attribute map. Definitions are loaded
//! once per run from the deployment configuration directory and validated
//! before any input file is touched; every sensor the pipeline references
//! must have exactly one definition.

use crate::constants::NGDAC_VAR_NAMES;
use crate::error::{AppResult, GliderError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Definition of a single output variable, keyed by source sensor name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorDefinition {
    /// NetCDF variable name this sensor is written as.
    pub nc_var_name: String,
    /// NetCDF storage type ("f8", "f4", "i4"). Only doubles are written by
    /// this converter; the field is preserved for configuration fidelity.
    #[serde(rename = "type", default = "default_nc_type")]
    pub nc_type: String,
    /// Dimension the variable spans. `None` marks a scalar or container
    /// variable.
    #[serde(default)]
    pub dimension: Option<String>,
    /// True for the single sensor that defines the record dimension.
    #[serde(default)]
    pub is_dimension: bool,
    /// Fixed dimension length. `None` means unlimited.
    #[serde(default)]
    pub dimension_length: Option<usize>,
    /// NetCDF variable attributes (units, standard_name, ...).
    #[serde(default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

fn default_nc_type() -> String {
    "f8".to_string()
}

impl SensorDefinition {
    /// True when the variable spans the record dimension.
    pub fn is_record_variable(&self) -> bool {
        self.dimension.is_some()
    }
}

/// The validated sensor-definition mapping for one run.
#[derive(Debug, Clone, Default)]
pub struct SensorDefs {
    defs: BTreeMap<String, SensorDefinition>,
}

impl SensorDefs {
    pub fn new(defs: BTreeMap<String, SensorDefinition>) -> Self {
        Self { defs }
    }

    pub fn get(&self, sensor: &str) -> Option<&SensorDefinition> {
        self.defs.get(sensor)
    }

    pub fn contains(&self, sensor: &str) -> bool {
        self.defs.contains_key(sensor)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SensorDefinition)> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// The sensor definition that owns the record dimension.
    ///
    /// Exactly one definition should set `is_dimension`. When several do,
    /// the first in name order wins and the rest are reported, matching the
    /// permissive behavior of the source ecosystem.
    pub fn record_dimension(&self) -> AppResult<&SensorDefinition> {
        let mut dims = self
            .defs
            .values()
            .filter(|def| def.is_dimension)
            .collect::<Vec<_>>();
        if dims.is_empty() {
            return Err(GliderError::ConfigValidation(
                "no record dimension specified in sensor definitions".to_string(),
            ));
        }
        if dims.len() > 1 {
            for dim in &dims {
                log::warn!("Extra record dimension candidate: {}", dim.nc_var_name);
            }
            log::warn!("Only one record dimension is allowed; using the first");
        }
        Ok(dims.remove(0))
    }

    /// Check that every sensor in `required` has a definition.
    ///
    /// Each missing sensor is logged; the run must abort when this returns
    /// false.
    pub fn validate_sensors(&self, required: &[&str]) -> bool {
        let mut validated = true;
        for sensor in required {
            if !self.defs.contains_key(*sensor) {
                log::warn!("Missing required sensor definition: {}", sensor);
                validated = false;
            }
        }
        validated
    }

    /// Check that the configured definitions cover every NetCDF variable
    /// name the NGDAC requires.
    pub fn validate_ngdac_var_names(&self) -> bool {
        let mut validated = true;
        let nc_var_names = self
            .defs
            .values()
            .map(|def| def.nc_var_name.as_str())
            .collect::<Vec<_>>();
        for ngdac_var in NGDAC_VAR_NAMES {
            if !nc_var_names.contains(&ngdac_var) {
                log::warn!("Missing required IOOS NGDAC nc_var_name: {}", ngdac_var);
                validated = false;
            }
        }
        validated
    }

    /// Run both pre-flight checks, failing on the first problem.
    ///
    /// A definition set that misses a required sensor or any NGDAC variable
    /// name is a fatal configuration error; no input file may be processed
    /// against it.
    pub fn validate(&self, required: &[&str]) -> AppResult<()> {
        if !self.validate_sensors(required) {
            return Err(GliderError::ConfigValidation(
                "one or more required sensor definitions are missing".to_string(),
            ));
        }
        if !self.validate_ngdac_var_names() {
            return Err(GliderError::ConfigValidation(
                "sensor definitions do not cover every required NGDAC variable name".to_string(),
            ));
        }
        Ok(())
    }

    /// Merge attributes discovered in a source data file into the configured
    /// definitions.
    ///
    /// Attribute keys already configured win, and `units` is never
    /// overridden so the configured UDUNITS strings survive.
    pub fn merge_source_attrs(
        &mut self,
        sensor: &str,
        attrs: &BTreeMap<String, serde_json::Value>,
    ) {
        let Some(def) = self.defs.get_mut(sensor) else {
            return;
        };
        for (key, value) in attrs {
            if key == "units" || def.attrs.contains_key(key) {
                continue;
            }
            def.attrs.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(nc_var_name: &str, is_dimension: bool) -> SensorDefinition {
        SensorDefinition {
            nc_var_name: nc_var_name.to_string(),
            nc_type: "f8".to_string(),
            dimension: Some("time".to_string()),
            is_dimension,
            dimension_length: None,
            attrs: BTreeMap::new(),
        }
    }

    #[test]
    fn validate_sensors_flags_missing_names() {
        let mut defs = BTreeMap::new();
        defs.insert("llat_time".to_string(), def("time", true));
        let defs = SensorDefs::new(defs);
        assert!(defs.validate_sensors(&["llat_time"]));
        assert!(!defs.validate_sensors(&["llat_time", "llat_depth"]));
    }

    #[test]
    fn record_dimension_requires_a_candidate() {
        let mut defs = BTreeMap::new();
        defs.insert("llat_depth".to_string(), def("depth", false));
        let defs = SensorDefs::new(defs);
        assert!(defs.record_dimension().is_err());
    }

    #[test]
    fn validate_is_fatal_on_missing_ngdac_var_name() {
        let mut map = BTreeMap::new();
        for name in NGDAC_VAR_NAMES {
            map.insert(name.to_string(), def(name, name == "time"));
        }
        let complete = SensorDefs::new(map.clone());
        assert!(complete.validate(&["time"]).is_ok());

        // A definition set without a depth variable passes the required-
        // sensor check but must still fail the run.
        map.remove("depth");
        let incomplete = SensorDefs::new(map);
        assert!(incomplete.validate_sensors(&["time"]));
        assert!(matches!(
            incomplete.validate(&["time"]),
            Err(GliderError::ConfigValidation(_))
        ));
    }

    #[test]
    fn merge_never_overrides_units() {
        let mut map = BTreeMap::new();
        let mut base = def("temperature", false);
        base.attrs.insert(
            "units".to_string(),
            serde_json::Value::String("Celsius".to_string()),
        );
        map.insert("sci_water_temp".to_string(), base);
        let mut defs = SensorDefs::new(map);

        let mut source_attrs = BTreeMap::new();
        source_attrs.insert(
            "units".to_string(),
            serde_json::Value::String("c".to_string()),
        );
        source_attrs.insert(
            "source_sensor".to_string(),
            serde_json::Value::String("sci_water_temp".to_string()),
        );
        defs.merge_source_attrs("sci_water_temp", &source_attrs);

        let merged = defs.get("sci_water_temp").unwrap();
        assert_eq!(
            merged.attrs.get("units"),
            Some(&serde_json::Value::String("Celsius".to_string()))
        );
        assert!(merged.attrs.contains_key("source_sensor"));
    }
}
