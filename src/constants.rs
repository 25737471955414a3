//! Slocum sensor name tables and NGDAC variable conventions.

use clap::ValueEnum;

/// Sensors every llat frame must carry, in extraction order.
///
/// The order is load-bearing: the CTD slice indexes pressure, latitude,
/// longitude and depth positionally against this list.
pub const LLAT_SENSORS: [&str; 5] = [
    "llat_time",
    "llat_pressure",
    "llat_latitude",
    "llat_longitude",
    "llat_depth",
];

/// NetCDF variable names the IOOS NGDAC requires in every profile file.
pub const NGDAC_VAR_NAMES: [&str; 15] = [
    "trajectory",
    "time",
    "lat",
    "lon",
    "pressure",
    "depth",
    "temperature",
    "conductivity",
    "salinity",
    "density",
    "profile_id",
    "profile_time",
    "profile_lat",
    "profile_lon",
    "source_file",
];

/// Slocum native timestamp sensors, in preference order.
pub const SLOCUM_TIMESTAMP_SENSORS: [&str; 2] = ["m_present_time", "sci_m_present_time"];

/// Slocum native pressure sensors (bar), in preference order.
pub const SLOCUM_PRESSURE_SENSORS: [&str; 3] =
    ["sci_water_pressure", "m_water_pressure", "m_pressure"];

/// Slocum native depth sensors (m).
pub const SLOCUM_DEPTH_SENSORS: [&str; 1] = ["m_depth"];

/// Slocum native GPS sensors (NMEA ddmm.mmm), in preference order.
pub const SLOCUM_GPS_LAT_SENSORS: [&str; 2] = ["m_gps_lat", "m_lat"];
pub const SLOCUM_GPS_LON_SENSORS: [&str; 2] = ["m_gps_lon", "m_lon"];

/// Default NetCDF fill value for double variables (NC_FILL_DOUBLE).
pub const FILL_DOUBLE: f64 = 9.969_209_968_386_869e36;

/// Supported output NetCDF file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NetcdfFormat {
    /// Classic NetCDF-3 format. No per-variable compression.
    Netcdf3Classic,
    /// NetCDF-4 (HDF5) storage restricted to the classic data model.
    Netcdf4Classic,
    /// Full NetCDF-4 data model.
    Netcdf4,
}

impl NetcdfFormat {
    /// True when the format supports per-variable deflate compression.
    pub fn supports_compression(self) -> bool {
        !matches!(self, NetcdfFormat::Netcdf3Classic)
    }
}

impl std::fmt::Display for NetcdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NetcdfFormat::Netcdf3Classic => "NETCDF3_CLASSIC",
            NetcdfFormat::Netcdf4Classic => "NETCDF4_CLASSIC",
            NetcdfFormat::Netcdf4 => "NETCDF4",
        };
        f.write_str(name)
    }
}
