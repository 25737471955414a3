//! CLI entry point for dba2profile-nc.
//!
//! Batch-converts Slocum glider dba ASCII telemetry into one NetCDF file per
//! detected vertical profile. The pipeline per input file:
//!
//! 1. Parse the dba file into a dense sensor frame with derived `llat_*`
//!    navigation sensors prepended.
//! 2. Compute practical salinity, in-situ density and depth for the CTD
//!    sensor set.
//! 3. Segment the depth time-series into monotonic profile intervals.
//! 4. Write each interval to a staged NetCDF file and atomically publish it
//!    into the output directory.
//!
//! A bad input file or a failed profile is logged and skipped; only
//! configuration problems and end-of-run cleanup failures abort the batch
//! with a non-zero exit. The absolute path of every published file is
//! printed to stdout, one per line.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use glider_nc::config::DeploymentContext;
use glider_nc::constants::{NetcdfFormat, LLAT_SENSORS};
use glider_nc::ctd::{derive_variables, UnescoPhysics};
use glider_nc::dba::{self, DbaFile};
use glider_nc::error::GliderError;
use glider_nc::segment::{find_profiles, ProfileInterval, SegmenterConfig};
use glider_nc::writer::{stage, ProfileNetCdfWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dba2profile-nc")]
#[command(
    about = "Convert Slocum glider dba files to IOOS NGDAC-compliant profile NetCDF files",
    version
)]
struct Cli {
    /// Deployment configuration directory containing deployment.json,
    /// global_attributes.json, instruments.json and sensor_defs.json
    config_path: PathBuf,

    /// One or more Slocum dba files to convert
    #[arg(required = true)]
    dba_files: Vec<PathBuf>,

    /// Source of the CTD sensors: science controller (sci) or flight
    /// controller (m)
    #[arg(long = "ctd_sensor_prefix", value_enum, default_value_t = CtdPrefix::Sci)]
    ctd_sensor_prefix: CtdPrefix,

    /// Starting profile id. Values below 1 derive each id from the profile's
    /// mean timestamp instead
    #[arg(short = 'p', long = "start_profile_id", default_value_t = 0)]
    start_profile_id: i64,

    /// Directory the published profile files are written to
    #[arg(short = 'o', long = "output_path")]
    output_path: Option<PathBuf>,

    /// Overwrite existing profile files
    #[arg(short = 'c', long)]
    clobber: bool,

    /// Output NetCDF format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = NetcdfFormat::Netcdf4Classic)]
    nc_format: NetcdfFormat,

    /// Deflate level for record variables, 0 disables (NetCDF-4 formats
    /// only)
    #[arg(long = "compression", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=9))]
    compression_level: u8,

    /// Check configuration and print the writer description without
    /// processing any file
    #[arg(short = 'x', long)]
    debug: bool,

    /// Log verbosity
    #[arg(short = 'l', long, value_enum, default_value_t = LogLevel::Info)]
    loglevel: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CtdPrefix {
    Sci,
    M,
}

impl CtdPrefix {
    fn as_str(self) -> &'static str {
        match self {
            CtdPrefix::Sci => "sci",
            CtdPrefix::M => "m",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Error | LogLevel::Critical => log::LevelFilter::Error,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.loglevel.filter())
        .format_timestamp_secs()
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let output_path = match &cli.output_path {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("cannot resolve current directory")?,
    };
    if !output_path.is_dir() {
        anyhow::bail!("invalid output_path: {}", output_path.display());
    }

    let context = DeploymentContext::load(&cli.config_path)
        .with_context(|| format!("configuration: {}", cli.config_path.display()))?;

    // The CTD sensor set: the five llat navigation sensors followed by the
    // conductivity/temperature pair from the selected controller.
    let cond_sensor = format!("{}_water_cond", cli.ctd_sensor_prefix.as_str());
    let temp_sensor = format!("{}_water_temp", cli.ctd_sensor_prefix.as_str());
    let mut ctd_sensors: Vec<&str> = LLAT_SENSORS.to_vec();
    ctd_sensors.push(&cond_sensor);
    ctd_sensors.push(&temp_sensor);

    context
        .sensor_defs
        .validate(&ctd_sensors)
        .with_context(|| format!("bad sensor definitions: {}", context.sensor_defs_file.display()))?;

    let mut writer = ProfileNetCdfWriter::new(
        context,
        cli.nc_format,
        cli.compression_level,
        cli.clobber,
        cli.start_profile_id,
    )?;

    if cli.debug {
        println!("{writer}");
        return Ok(ExitCode::SUCCESS);
    }

    let staging = stage::StagingArea::new()?;
    let physics = UnescoPhysics;
    let segmenter = SegmenterConfig::default();
    let mut published: Vec<PathBuf> = Vec::new();

    for dba_file in &cli.dba_files {
        if !dba_file.is_file() {
            log::error!("Invalid dba file specified: {}", dba_file.display());
            continue;
        }
        log::info!("Processing dba file: {}", dba_file.display());

        let (dba, intervals) =
            match prepare_source(dba_file, &mut writer, &physics, &ctd_sensors, &segmenter) {
                Ok(prepared) => prepared,
                Err(e) => {
                    log::warn!("Skipping {}: {}", dba_file.display(), e);
                    continue;
                }
            };
        if intervals.is_empty() {
            log::info!("No profiles indexed: {}", dba_file.display());
            continue;
        }
        log::info!(
            "{} profiles indexed in {}",
            intervals.len(),
            dba_file.display()
        );

        for interval in &intervals {
            match write_profile(
                &mut writer,
                &staging,
                &output_path,
                dba_file,
                &dba,
                interval,
            ) {
                Ok(Some(dest)) => published.push(dest),
                Ok(None) => {}
                Err(e) => {
                    log::warn!(
                        "Skipping profile [{:.1}, {:.1}] of {}: {}",
                        interval.start,
                        interval.end,
                        dba_file.display(),
                        e
                    );
                    writer.abort_nc();
                }
            }
        }
    }

    for artifact in &published {
        stage::relax_permissions(artifact)?;
        println!("{}", artifact.display());
    }

    staging
        .remove()
        .context("failed to remove temporary staging directory")?;
    Ok(ExitCode::SUCCESS)
}

/// Parse one dba file, derive the CTD variables and index its profiles.
///
/// Any error here skips the whole source file.
fn prepare_source(
    dba_file: &Path,
    writer: &mut ProfileNetCdfWriter,
    physics: &UnescoPhysics,
    ctd_sensors: &[&str],
    segmenter: &SegmenterConfig,
) -> anyhow::Result<(DbaFile, Vec<ProfileInterval>)> {
    let mut dba = dba::read_dba(dba_file)?;

    // Fold the units and source-sensor names declared by this file (and the
    // derived llat sensors) into the run's sensor definitions.
    let mut source_attrs = dba.sensor_attrs();
    for decl in dba::llat_sensor_decls() {
        let mut attrs = std::collections::BTreeMap::new();
        attrs.insert(
            "units".to_string(),
            serde_json::Value::String(decl.units.clone()),
        );
        source_attrs.push((decl.name, attrs));
    }
    writer.update_data_file_sensor_defs(&source_attrs);

    let defs = writer.context().sensor_defs.clone();
    let ctd_frame = dba.frame.select(ctd_sensors, &defs)?;
    let derived = derive_variables(physics, &ctd_frame)?;

    // The llat depth column is a placeholder until here; the physical depth
    // from pressure replaces it before segmentation and output.
    dba.frame.replace_column("llat_depth", &derived.depth)?;
    dba.frame.append_column("salinity", &derived.salinity)?;
    dba.frame.append_column("density", &derived.density)?;

    let times = dba
        .frame
        .column("llat_time")
        .ok_or_else(|| GliderError::MissingSensor("llat_time".to_string()))?;
    let depths = dba
        .frame
        .column("llat_depth")
        .ok_or_else(|| GliderError::MissingSensor("llat_depth".to_string()))?;
    let intervals = find_profiles(&times, &depths, segmenter)?;

    Ok((dba, intervals))
}

/// Stage, populate, finalize and publish one profile file.
///
/// Returns the published destination, or `None` when the profile was
/// skipped (too few rows, NaN mean time, or an existing file without
/// clobber).
fn write_profile(
    writer: &mut ProfileNetCdfWriter,
    staging: &stage::StagingArea,
    output_path: &Path,
    dba_file: &Path,
    dba: &DbaFile,
    interval: &ProfileInterval,
) -> anyhow::Result<Option<PathBuf>> {
    let rows = dba.frame.rows_between(interval.start, interval.end);
    if rows.len() < 2 {
        log::debug!(
            "Profile [{:.1}, {:.1}] has too few rows; skipping",
            interval.start,
            interval.end
        );
        return Ok(None);
    }

    let mean_epoch = interval.mean_time();
    if mean_epoch.is_nan() {
        log::warn!("{}", GliderError::NanMeanTime);
        return Ok(None);
    }
    let Some(mean_dt) = chrono::DateTime::from_timestamp(mean_epoch.trunc() as i64, 0) else {
        log::warn!("Profile mean timestamp out of range; skipping");
        return Ok(None);
    };

    let file_base = format!(
        "{}-{}-{}-profile",
        writer.glider(),
        mean_dt.format("%Y%m%dT%H%M%SZ"),
        dba.metadata.filename_extension()
    );
    let dest = output_path.join(format!("{file_base}.nc"));
    if dest.exists() && !writer.clobber() {
        log::info!("Profile file exists and clobber=false: {}", dest.display());
        return Ok(None);
    }

    let staged = staging.stage_file(&file_base)?;
    log::debug!("Profile {} staged at {}", file_base, staged.display());

    writer.begin_profile(mean_epoch);
    if let Err(e) = writer.init_nc(&staged) {
        stage::discard(&staged);
        return Err(e.into());
    }
    writer.open_nc()?;
    let argv0 = std::env::args()
        .next()
        .unwrap_or_else(|| "dba2profile-nc".to_string());
    writer.update_history(&format!("{argv0} {}", dba_file.display()))?;
    writer.set_trajectory_id()?;
    writer.set_title(&format!(
        "{}-{} Vertical Profile",
        writer.glider(),
        mean_dt.format("%Y%m%d%H%M%SZ")
    ))?;
    writer.set_source_file_var(dba.metadata.filename_label(), &dba.metadata.as_attrs())?;
    writer.set_container_variables()?;

    // Insert every frame column that has a record-variable definition; the
    // rest of the columns are raw sensors this deployment does not publish.
    let defs = writer.context().sensor_defs.clone();
    for (idx, sensor) in dba.frame.column_names().iter().enumerate() {
        let Some(def) = defs.get(sensor) else {
            log::debug!("No sensor definition for {sensor}; not written");
            continue;
        };
        if !def.is_record_variable() {
            continue;
        }
        let data = dba.frame.column_slice(idx, &rows);
        writer.insert_var_data(sensor, &data)?;
    }

    let artifact = writer.finish_nc()?;
    stage::publish(&artifact.path, &dest)?;
    log::info!(
        "Published profile {} ({} rows, {} variables): {}",
        artifact.profile_id,
        artifact.rows,
        artifact.variables,
        dest.display()
    );
    Ok(Some(dest))
}
