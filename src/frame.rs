//! Dense sensor frames.
//!
//! A [`SensorFrame`] is the time-ordered numeric matrix every pipeline stage
//! works on: one row per record timestamp, one named column per sensor, NaN
//! for missing values. The first column is always the master timestamp and
//! timestamps are non-decreasing. Frames are immutable once handed
//! downstream except for the explicit column-append and depth-replacement
//! operations used by the derived-variable pipeline.

use crate::error::{AppResult, GliderError};
use crate::sensors::SensorDefs;

/// Dense two-dimensional sensor matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl SensorFrame {
    /// Build a frame from column names and row-major data.
    ///
    /// Every row must have one value per column and rows must already be
    /// sorted by the first (timestamp) column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> AppResult<Self> {
        for row in &rows {
            if row.len() != columns.len() {
                return Err(GliderError::ConfigValidation(format!(
                    "row width {} does not match {} columns",
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Copy of one column by name.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Extract a dense sub-frame for an ordered list of requested sensors.
    ///
    /// The first output column is always the master timestamp (the frame's
    /// own first column), whether or not it was requested. A requested
    /// sensor with a definition but no data in this frame yields an all-NaN
    /// column; a sensor with no definition at all is a
    /// [`GliderError::MissingSensor`].
    pub fn select(&self, sensors: &[&str], defs: &SensorDefs) -> AppResult<SensorFrame> {
        let time_name = self.columns.first().cloned().unwrap_or_default();
        let mut out_names: Vec<String> = vec![time_name.clone()];
        for sensor in sensors {
            if *sensor == time_name {
                continue;
            }
            if self.column_index(sensor).is_none() && !defs.contains(sensor) {
                return Err(GliderError::MissingSensor((*sensor).to_string()));
            }
            out_names.push((*sensor).to_string());
        }

        let indices: Vec<Option<usize>> = out_names
            .iter()
            .map(|name| self.column_index(name))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| idx.map_or(f64::NAN, |i| row[i]))
                    .collect()
            })
            .collect();

        SensorFrame::new(out_names, rows)
    }

    /// Append a derived column, aligned row-for-row with the frame.
    pub fn append_column(&mut self, name: &str, values: &[f64]) -> AppResult<()> {
        if values.len() != self.rows.len() {
            return Err(GliderError::ConfigValidation(format!(
                "derived column '{}' has {} rows, frame has {}",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(*value);
        }
        Ok(())
    }

    /// Overwrite an existing column in place.
    pub fn replace_column(&mut self, name: &str, values: &[f64]) -> AppResult<()> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| GliderError::MissingSensor(name.to_string()))?;
        if values.len() != self.rows.len() {
            return Err(GliderError::ConfigValidation(format!(
                "replacement column '{}' has {} rows, frame has {}",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = *value;
        }
        Ok(())
    }

    /// Indices of rows whose timestamp lies in `[t0, t1]`.
    pub fn rows_between(&self, t0: f64, t1: f64) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                let t = row[0];
                t >= t0 && t <= t1
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Values of one column restricted to the given row indices.
    pub fn column_slice(&self, column: usize, indices: &[usize]) -> Vec<f64> {
        indices.iter().map(|&i| self.rows[i][column]).collect()
    }
}

/// Mean of the finite values in `values`; NaN when none are finite.
pub fn nanmean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        if v.is_finite() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// True when every value is NaN (or the slice is empty).
pub fn all_nan(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorDefinition;
    use std::collections::BTreeMap;

    fn defs_with(names: &[&str]) -> SensorDefs {
        let mut map = BTreeMap::new();
        for name in names {
            map.insert(
                name.to_string(),
                SensorDefinition {
                    nc_var_name: name.to_string(),
                    nc_type: "f8".to_string(),
                    dimension: Some("time".to_string()),
                    is_dimension: false,
                    dimension_length: None,
                    attrs: BTreeMap::new(),
                },
            );
        }
        SensorDefs::new(map)
    }

    fn frame() -> SensorFrame {
        SensorFrame::new(
            vec!["llat_time".to_string(), "llat_depth".to_string()],
            vec![
                vec![10.0, 1.0],
                vec![20.0, 2.0],
                vec![30.0, f64::NAN],
                vec![40.0, 4.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn select_keeps_timestamp_first_and_fills_missing_with_nan() {
        let frame = frame();
        let defs = defs_with(&["llat_depth", "sci_water_temp"]);
        let sub = frame
            .select(&["llat_time", "sci_water_temp", "llat_depth"], &defs)
            .unwrap();
        assert_eq!(
            sub.column_names(),
            &["llat_time", "sci_water_temp", "llat_depth"]
        );
        assert!(sub.column("sci_water_temp").unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(sub.column("llat_depth").unwrap()[1], 2.0);
    }

    #[test]
    fn select_rejects_undefined_sensor() {
        let frame = frame();
        let defs = defs_with(&["llat_depth"]);
        match frame.select(&["llat_bogus"], &defs) {
            Err(GliderError::MissingSensor(name)) => assert_eq!(name, "llat_bogus"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rows_between_is_inclusive() {
        let frame = frame();
        assert_eq!(frame.rows_between(20.0, 30.0), vec![1, 2]);
        assert_eq!(frame.rows_between(5.0, 45.0).len(), 4);
        assert!(frame.rows_between(41.0, 50.0).is_empty());
    }

    #[test]
    fn nanmean_skips_nan() {
        assert_eq!(nanmean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(nanmean(&[f64::NAN, f64::NAN]).is_nan());
        assert!(nanmean(&[]).is_nan());
    }

    #[test]
    fn append_and_replace_column() {
        let mut frame = frame();
        frame.append_column("salinity", &[35.0, 35.1, 35.2, 35.3]).unwrap();
        assert_eq!(frame.num_columns(), 3);
        frame
            .replace_column("llat_depth", &[0.9, 1.9, 2.9, 3.9])
            .unwrap();
        assert_eq!(frame.column("llat_depth").unwrap()[0], 0.9);
        assert!(frame.append_column("density", &[1.0]).is_err());
    }
}
