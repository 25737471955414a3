//! Slocum dba ASCII telemetry parser.
//!
//! A dba file is the ASCII dump of a Slocum glider binary log: a block of
//! `key: value` header tags, a sensor-name line, a units line, a byte-size
//! line, then whitespace-separated data rows with `NaN` marking missing
//! values. Sensor readings are sparse: each row carries a timestamp and
//! whichever sensors reported during that cycle.
//!
//! Parsing produces a dense [`SensorFrame`] with the derived `llat_*`
//! sensors prepended: the master timestamp, pressure in dbar, decimal-degree
//! latitude/longitude converted from the NMEA-style GPS sensors, and a
//! placeholder depth column that the physics pipeline later replaces.

use crate::constants::{
    SLOCUM_DEPTH_SENSORS, SLOCUM_GPS_LAT_SENSORS, SLOCUM_GPS_LON_SENSORS,
    SLOCUM_PRESSURE_SENSORS, SLOCUM_TIMESTAMP_SENSORS,
};
use crate::error::{AppResult, GliderError};
use crate::frame::SensorFrame;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Header tags and identity of one parsed dba file.
#[derive(Debug, Clone)]
pub struct DbaMetadata {
    /// All `key: value` header tags, in file order.
    pub headers: BTreeMap<String, String>,
    /// Basename of the parsed file.
    pub source_file: String,
}

impl DbaMetadata {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Segment label, e.g. `unit_595-2024-123-4-5-sbd(01230405)`.
    pub fn filename_label(&self) -> &str {
        self.header("filename_label").unwrap_or(&self.source_file)
    }

    /// Source file class extension (`sbd`, `dbd`, ...), used in output
    /// artifact names.
    pub fn filename_extension(&self) -> &str {
        self.header("filename_extension").unwrap_or("dba")
    }

    /// Header tags as a JSON attribute map for the `source_file` variable.
    pub fn as_attrs(&self) -> BTreeMap<String, serde_json::Value> {
        self.headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect()
    }
}

/// One sensor column as declared in the dba label lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbaSensor {
    pub name: String,
    pub units: String,
}

/// A fully parsed dba file: metadata, sensor declarations and the dense
/// llat frame.
#[derive(Debug, Clone)]
pub struct DbaFile {
    pub metadata: DbaMetadata,
    pub sensors: Vec<DbaSensor>,
    pub frame: SensorFrame,
}

impl DbaFile {
    /// Per-sensor attribute maps for merging into the sensor definitions.
    pub fn sensor_attrs(&self) -> Vec<(String, BTreeMap<String, serde_json::Value>)> {
        self.sensors
            .iter()
            .map(|sensor| {
                let mut attrs = BTreeMap::new();
                attrs.insert(
                    "units".to_string(),
                    serde_json::Value::String(sensor.units.clone()),
                );
                attrs.insert(
                    "source_sensor".to_string(),
                    serde_json::Value::String(sensor.name.clone()),
                );
                (sensor.name.clone(), attrs)
            })
            .collect()
    }
}

/// Parse a dba file and derive the llat sensors.
///
/// Fails with [`GliderError::EmptySource`] when the file holds no data rows
/// and [`GliderError::MalformedSource`] on structural problems; both are
/// source-level skips for the caller, never fatal to the batch.
pub fn read_dba(path: &Path) -> AppResult<DbaFile> {
    let file = File::open(path)?;
    let mut lines = BufReader::new(file).lines();

    let mut headers = BTreeMap::new();
    let mut num_ascii_tags = None;
    let mut read_tags = 0usize;
    while num_ascii_tags.map_or(true, |n| read_tags < n) {
        let Some(line) = lines.next() else {
            return Err(malformed(path, "unexpected end of header"));
        };
        let line = line?;
        let Some((key, value)) = line.split_once(':') else {
            return Err(malformed(path, &format!("bad header line: {line}")));
        };
        let key = key.trim().to_string();
        let value = value.trim().to_string();
        if key == "num_ascii_tags" {
            num_ascii_tags = Some(value.parse::<usize>().map_err(|_| {
                malformed(path, &format!("unparsable num_ascii_tags: {value}"))
            })?);
        }
        headers.insert(key, value);
        read_tags += 1;
        // Files without the tag count end their header at the sensor line;
        // that case is caught below when the "header" fails to split.
        if num_ascii_tags.is_none() && read_tags > 64 {
            return Err(malformed(path, "no num_ascii_tags header found"));
        }
    }

    let num_label_lines: usize = headers
        .get("num_label_lines")
        .and_then(|v| v.parse().ok())
        .unwrap_or(3);

    let mut label_lines = Vec::with_capacity(num_label_lines);
    for _ in 0..num_label_lines {
        let Some(line) = lines.next() else {
            return Err(malformed(path, "missing sensor label lines"));
        };
        label_lines.push(line?);
    }
    if label_lines.is_empty() {
        return Err(malformed(path, "no sensor label lines"));
    }

    let names: Vec<&str> = label_lines[0].split_whitespace().collect();
    let units: Vec<&str> = label_lines
        .get(1)
        .map(|l| l.split_whitespace().collect())
        .unwrap_or_default();
    if names.is_empty() {
        return Err(malformed(path, "empty sensor name line"));
    }
    let sensors: Vec<DbaSensor> = names
        .iter()
        .enumerate()
        .map(|(i, name)| DbaSensor {
            name: (*name).to_string(),
            units: units.get(i).map_or_else(String::new, |u| (*u).to_string()),
        })
        .collect();

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let values: Vec<f64> = line
            .split_whitespace()
            .map(|tok| tok.parse::<f64>().unwrap_or(f64::NAN))
            .collect();
        if values.len() != sensors.len() {
            log::warn!(
                "{}: skipping row with {} values ({} sensors declared)",
                path.display(),
                values.len(),
                sensors.len()
            );
            continue;
        }
        rows.push(values);
    }

    if rows.is_empty() {
        return Err(GliderError::EmptySource(path.to_path_buf()));
    }

    let metadata = DbaMetadata {
        headers,
        source_file: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    let frame = build_llat_frame(path, &sensors, rows)?;

    Ok(DbaFile {
        metadata,
        sensors,
        frame,
    })
}

/// Prepend the derived llat columns and sort rows by the master timestamp.
fn build_llat_frame(
    path: &Path,
    sensors: &[DbaSensor],
    rows: Vec<Vec<f64>>,
) -> AppResult<SensorFrame> {
    let index_of = |candidates: &[&str]| -> Option<usize> {
        candidates
            .iter()
            .find_map(|name| sensors.iter().position(|s| s.name == *name))
    };

    let Some(time_idx) = index_of(&SLOCUM_TIMESTAMP_SENSORS) else {
        return Err(malformed(path, "no native timestamp sensor present"));
    };
    let pressure_idx = index_of(&SLOCUM_PRESSURE_SENSORS);
    let depth_idx = index_of(&SLOCUM_DEPTH_SENSORS);
    let lat_idx = index_of(&SLOCUM_GPS_LAT_SENSORS);
    let lon_idx = index_of(&SLOCUM_GPS_LON_SENSORS);

    let mut columns = vec![
        "llat_time".to_string(),
        "llat_pressure".to_string(),
        "llat_latitude".to_string(),
        "llat_longitude".to_string(),
        "llat_depth".to_string(),
    ];
    columns.extend(sensors.iter().map(|s| s.name.clone()));

    let mut llat_rows: Vec<Vec<f64>> = Vec::with_capacity(rows.len());
    for row in rows {
        let time = row[time_idx];
        if !time.is_finite() {
            continue;
        }
        // Native pressure is bar; every downstream consumer wants dbar.
        let pressure = pressure_idx.map_or(f64::NAN, |i| row[i] * 10.0);
        let depth = depth_idx.map_or(f64::NAN, |i| row[i]);
        let latitude = lat_idx.map_or(f64::NAN, |i| iso2deg(row[i]));
        let longitude = lon_idx.map_or(f64::NAN, |i| iso2deg(row[i]));

        let mut out = Vec::with_capacity(columns.len());
        out.extend([time, pressure, latitude, longitude, depth]);
        out.extend(row);
        llat_rows.push(out);
    }

    llat_rows.sort_by(|a, b| a[0].total_cmp(&b[0]));

    SensorFrame::new(columns, llat_rows)
}

/// Convert an NMEA-style `ddmm.mmmm` coordinate to decimal degrees.
fn iso2deg(value: f64) -> f64 {
    if !value.is_finite() {
        return f64::NAN;
    }
    let sign = if value < 0.0 { -1.0 } else { 1.0 };
    let magnitude = value.abs();
    let degrees = (magnitude / 100.0).trunc();
    let minutes = magnitude - degrees * 100.0;
    sign * (degrees + minutes / 60.0)
}

fn malformed(path: &Path, reason: &str) -> GliderError {
    GliderError::MalformedSource {
        file: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Append the llat sensor declarations the frame derives, so they merge
/// into the output sensor definitions like any native sensor.
pub fn llat_sensor_decls() -> Vec<DbaSensor> {
    vec![
        DbaSensor {
            name: "llat_time".to_string(),
            units: "seconds since 1970-01-01T00:00:00Z".to_string(),
        },
        DbaSensor {
            name: "llat_pressure".to_string(),
            units: "dbar".to_string(),
        },
        DbaSensor {
            name: "llat_latitude".to_string(),
            units: "degrees_north".to_string(),
        },
        DbaSensor {
            name: "llat_longitude".to_string(),
            units: "degrees_east".to_string(),
        },
        DbaSensor {
            name: "llat_depth".to_string(),
            units: "m".to_string(),
        },
    ]
}
