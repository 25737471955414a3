//! End-to-end pipeline tests: dba text in, published profile NetCDF files
//! out.

use glider_nc::config::DeploymentContext;
use glider_nc::constants::NetcdfFormat;
use glider_nc::ctd::{derive_variables, UnescoPhysics};
use glider_nc::dba;
use glider_nc::segment::{find_profiles, SegmenterConfig};
use glider_nc::writer::{stage, ProfileNetCdfWriter};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const CTD_SENSORS: [&str; 7] = [
    "llat_time",
    "llat_pressure",
    "llat_latitude",
    "llat_longitude",
    "llat_depth",
    "sci_water_cond",
    "sci_water_temp",
];

fn record_def(nc_var_name: &str, units: &str, is_dimension: bool) -> serde_json::Value {
    serde_json::json!({
        "nc_var_name": nc_var_name,
        "type": "f8",
        "dimension": "time",
        "is_dimension": is_dimension,
        "attrs": { "units": units }
    })
}

fn scalar_def(nc_var_name: &str, units: &str) -> serde_json::Value {
    serde_json::json!({
        "nc_var_name": nc_var_name,
        "type": "f8",
        "attrs": { "units": units }
    })
}

fn write_config_dir(dir: &Path) {
    let deployment = serde_json::json!({
        "glider": "unit_595",
        "trajectory_datetime": "2024-03-01T06:00:00",
        "platform": {
            "long_name": "Slocum Glider unit_595",
            "wmo_id": "4801234"
        }
    });
    let global_attributes = serde_json::json!({
        "Conventions": "CF-1.6",
        "Metadata_Conventions": "CF-1.6, Unidata Dataset Discovery v1.0",
        "institution": "Test Institution",
        "naming_authority": "edu.test"
    });
    let instruments = serde_json::json!([
        {
            "nc_var_name": "instrument_ctd",
            "type": "i4",
            "attrs": {
                "long_name": "Pumped CTD",
                "make_model": "Sea-Bird GPCTD"
            }
        }
    ]);
    let mut defs = serde_json::Map::new();
    defs.insert("llat_time".into(), record_def("time", "seconds since 1970-01-01T00:00:00Z", true));
    defs.insert("llat_pressure".into(), record_def("pressure", "dbar", false));
    defs.insert("llat_latitude".into(), record_def("lat", "degrees_north", false));
    defs.insert("llat_longitude".into(), record_def("lon", "degrees_east", false));
    defs.insert("llat_depth".into(), record_def("depth", "m", false));
    defs.insert("sci_water_cond".into(), record_def("conductivity", "S m-1", false));
    defs.insert("sci_water_temp".into(), record_def("temperature", "Celsius", false));
    defs.insert("salinity".into(), record_def("salinity", "1e-3", false));
    defs.insert("density".into(), record_def("density", "kg m-3", false));
    defs.insert("profile_id".into(), scalar_def("profile_id", "1"));
    defs.insert("profile_time".into(), scalar_def("profile_time", "seconds since 1970-01-01T00:00:00Z"));
    defs.insert("profile_lat".into(), scalar_def("profile_lat", "degrees_north"));
    defs.insert("profile_lon".into(), scalar_def("profile_lon", "degrees_east"));
    defs.insert("platform".into(), serde_json::json!({ "nc_var_name": "platform" }));
    // The writer creates these two character variables itself; the
    // definitions exist to satisfy the NGDAC variable-name check.
    defs.insert("trajectory".into(), serde_json::json!({ "nc_var_name": "trajectory" }));
    defs.insert("source_file".into(), serde_json::json!({ "nc_var_name": "source_file" }));

    fs::write(dir.join("deployment.json"), deployment.to_string()).unwrap();
    fs::write(dir.join("global_attributes.json"), global_attributes.to_string()).unwrap();
    fs::write(dir.join("instruments.json"), instruments.to_string()).unwrap();
    fs::write(
        dir.join("sensor_defs.json"),
        serde_json::Value::Object(defs).to_string(),
    )
    .unwrap();
}

/// A three-leg (dive, climb, dive) trace sampled every 10 seconds: three
/// segmentable profiles, each leg 200 s and 20 dbar.
fn write_dba_file(path: &Path) {
    let mut body = String::from(
        "dbd_label: DBD(dinkum_binary_data)file\n\
         encoding_ver: 2\n\
         num_ascii_tags: 8\n\
         filename: unit_595-2024-061-1-0\n\
         filename_extension: sbd\n\
         filename_label: unit_595-2024-061-1-0-sbd(01230000)\n\
         sensors_per_cycle: 6\n\
         num_label_lines: 3\n\
         m_present_time sci_water_pressure sci_water_cond sci_water_temp m_gps_lat m_gps_lon\n\
         timestamp bar S/m degC lat lon\n\
         8 4 4 4 8 8\n",
    );
    let t0 = 1_709_280_000.0f64;
    for i in 0..=60 {
        let t = t0 + i as f64 * 10.0;
        // bar; one leg is 20 samples up or down
        let leg = i / 20;
        let pos = (i % 20) as f64 / 20.0;
        let bar = if leg % 2 == 0 { pos * 2.0 } else { (1.0 - pos) * 2.0 };
        let temp = 15.0 - bar;
        body.push_str(&format!(
            "{t:.1} {bar:.4} 4.25 {temp:.3} 4330.50 -7015.25\n"
        ));
    }
    let mut f = fs::File::create(path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
}

/// Run the full conversion over one dba file, returning the published
/// artifact paths in processing order.
fn convert(
    config_dir: &Path,
    dba_path: &Path,
    output_dir: &Path,
    start_profile_id: i64,
    clobber: bool,
) -> Vec<PathBuf> {
    let context = DeploymentContext::load(config_dir).unwrap();
    context.sensor_defs.validate(&CTD_SENSORS).unwrap();
    let mut writer = ProfileNetCdfWriter::new(
        context,
        NetcdfFormat::Netcdf4Classic,
        1,
        clobber,
        start_profile_id,
    )
    .unwrap();

    let mut dba = dba::read_dba(dba_path).unwrap();
    let mut source_attrs = dba.sensor_attrs();
    for decl in dba::llat_sensor_decls() {
        let mut attrs = BTreeMap::new();
        attrs.insert(
            "units".to_string(),
            serde_json::Value::String(decl.units.clone()),
        );
        source_attrs.push((decl.name, attrs));
    }
    writer.update_data_file_sensor_defs(&source_attrs);

    let defs = writer.context().sensor_defs.clone();
    let ctd_frame = dba.frame.select(&CTD_SENSORS, &defs).unwrap();
    let derived = derive_variables(&UnescoPhysics, &ctd_frame).unwrap();
    dba.frame.replace_column("llat_depth", &derived.depth).unwrap();
    dba.frame.append_column("salinity", &derived.salinity).unwrap();
    dba.frame.append_column("density", &derived.density).unwrap();

    let times = dba.frame.column("llat_time").unwrap();
    let depths = dba.frame.column("llat_depth").unwrap();
    let intervals = find_profiles(&times, &depths, &SegmenterConfig::default()).unwrap();
    assert!(!intervals.is_empty());

    let staging = stage::StagingArea::new().unwrap();
    let mut published = Vec::new();
    for interval in &intervals {
        let rows = dba.frame.rows_between(interval.start, interval.end);
        assert!(rows.len() >= 2);
        let mean_epoch = interval.mean_time();
        let mean_dt = chrono::DateTime::from_timestamp(mean_epoch.trunc() as i64, 0).unwrap();
        let file_base = format!(
            "{}-{}-{}-profile",
            writer.glider(),
            mean_dt.format("%Y%m%dT%H%M%SZ"),
            dba.metadata.filename_extension()
        );
        let dest = output_dir.join(format!("{file_base}.nc"));
        if dest.exists() && !writer.clobber() {
            continue;
        }

        let staged = staging.stage_file(&file_base).unwrap();
        writer.begin_profile(mean_epoch);
        writer.init_nc(&staged).unwrap();
        writer.open_nc().unwrap();
        writer
            .update_history(&format!("{} converted", dba_path.display()))
            .unwrap();
        writer.set_trajectory_id().unwrap();
        writer
            .set_title(&format!("{} Vertical Profile", writer.glider()))
            .unwrap();
        writer
            .set_source_file_var(dba.metadata.filename_label(), &dba.metadata.as_attrs())
            .unwrap();
        writer.set_container_variables().unwrap();

        let defs = writer.context().sensor_defs.clone();
        for (idx, sensor) in dba.frame.column_names().iter().enumerate() {
            let Some(def) = defs.get(sensor) else { continue };
            if !def.is_record_variable() {
                continue;
            }
            let data = dba.frame.column_slice(idx, &rows);
            writer.insert_var_data(sensor, &data).unwrap();
        }

        let artifact = writer.finish_nc().unwrap();
        stage::publish(&artifact.path, &dest).unwrap();
        published.push(dest);
    }
    for dest in &published {
        stage::relax_permissions(dest).unwrap();
    }
    staging.remove().unwrap();
    published
}

#[test]
fn three_leg_trace_yields_three_profiles_with_sequential_ids() {
    let config_dir = tempfile::tempdir().unwrap();
    write_config_dir(config_dir.path());
    let data_dir = tempfile::tempdir().unwrap();
    let dba_path = data_dir.path().join("unit_595-2024-061-1-0.sbd.dba");
    write_dba_file(&dba_path);
    let out_dir = tempfile::tempdir().unwrap();

    let published = convert(config_dir.path(), &dba_path, out_dir.path(), 1, false);
    assert_eq!(published.len(), 3);

    for (i, artifact) in published.iter().enumerate() {
        assert!(artifact.is_file(), "missing artifact {}", artifact.display());
        let nc = netcdf::open(artifact).unwrap();
        let id = nc
            .variable("profile_id")
            .unwrap()
            .get_values::<f64, _>(..)
            .unwrap();
        assert_eq!(id[0] as i64, (i + 1) as i64);
    }
}

#[test]
fn scalar_profile_variables_round_trip() {
    let config_dir = tempfile::tempdir().unwrap();
    write_config_dir(config_dir.path());
    let data_dir = tempfile::tempdir().unwrap();
    let dba_path = data_dir.path().join("unit_595-2024-061-1-0.sbd.dba");
    write_dba_file(&dba_path);
    let out_dir = tempfile::tempdir().unwrap();

    let published = convert(config_dir.path(), &dba_path, out_dir.path(), 1, false);
    let nc = netcdf::open(&published[0]).unwrap();

    // First leg spans t0 .. t0+200 s; the scalar profile_time is the
    // interval midpoint.
    let t0 = 1_709_280_000.0f64;
    let profile_time = nc
        .variable("profile_time")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap()[0];
    assert!((profile_time - (t0 + 100.0)).abs() < 15.0, "got {profile_time}");

    // GPS was fixed at 4330.50 / -7015.25 (ddmm.mm).
    let lat = nc
        .variable("profile_lat")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap()[0];
    let lon = nc
        .variable("profile_lon")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap()[0];
    assert!((lat - (43.0 + 30.5 / 60.0)).abs() < 1e-6, "got {lat}");
    assert!((lon - -(70.0 + 15.25 / 60.0)).abs() < 1e-6, "got {lon}");

    // Record variables hold the interval's rows with physics applied.
    let salinity = nc
        .variable("salinity")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap();
    assert!(salinity.len() >= 20);
    assert!(salinity.iter().all(|s| (2.0..42.0).contains(s)));
    let depth = nc
        .variable("depth")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap();
    let max_depth = depth.iter().cloned().fold(f64::MIN, f64::max);
    assert!((max_depth - 19.0).abs() < 1.5, "got {max_depth}");
}

#[test]
fn existing_artifacts_are_not_clobbered() {
    let config_dir = tempfile::tempdir().unwrap();
    write_config_dir(config_dir.path());
    let data_dir = tempfile::tempdir().unwrap();
    let dba_path = data_dir.path().join("unit_595-2024-061-1-0.sbd.dba");
    write_dba_file(&dba_path);
    let out_dir = tempfile::tempdir().unwrap();

    let first = convert(config_dir.path(), &dba_path, out_dir.path(), 1, false);
    assert_eq!(first.len(), 3);
    let stamps: Vec<_> = first
        .iter()
        .map(|p| fs::metadata(p).unwrap().modified().unwrap())
        .collect();

    // Same input, clobber off: nothing published, nothing rewritten.
    let second = convert(config_dir.path(), &dba_path, out_dir.path(), 1, false);
    assert!(second.is_empty());
    for (path, stamp) in first.iter().zip(&stamps) {
        assert_eq!(fs::metadata(path).unwrap().modified().unwrap(), *stamp);
    }

    // Clobber on rewrites in place without changing the artifact count.
    let third = convert(config_dir.path(), &dba_path, out_dir.path(), 1, true);
    assert_eq!(third.len(), 3);
    let names: Vec<_> = fs::read_dir(out_dir.path()).unwrap().collect();
    assert_eq!(names.len(), 3);
}

#[test]
fn skipped_profiles_do_not_consume_sequential_ids() {
    let config_dir = tempfile::tempdir().unwrap();
    write_config_dir(config_dir.path());
    let data_dir = tempfile::tempdir().unwrap();
    let dba_path = data_dir.path().join("unit_595-2024-061-1-0.sbd.dba");
    write_dba_file(&dba_path);
    let out_dir = tempfile::tempdir().unwrap();

    let first = convert(config_dir.path(), &dba_path, out_dir.path(), 1, false);
    assert_eq!(first.len(), 3);

    // Leave only the middle artifact in place. On the rerun the middle
    // profile is skipped without consuming an id, so the two rewritten
    // profiles get 1 and 2, not 1 and 3.
    fs::remove_file(&first[0]).unwrap();
    fs::remove_file(&first[2]).unwrap();
    let second = convert(config_dir.path(), &dba_path, out_dir.path(), 1, false);
    assert_eq!(second.len(), 2);

    let mut ids = Vec::new();
    for artifact in &second {
        let nc = netcdf::open(artifact).unwrap();
        let id = nc
            .variable("profile_id")
            .unwrap()
            .get_values::<f64, _>(..)
            .unwrap()[0] as i64;
        ids.push(id);
    }
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn aborted_profile_leaves_no_artifact() {
    let config_dir = tempfile::tempdir().unwrap();
    write_config_dir(config_dir.path());
    let out_dir = tempfile::tempdir().unwrap();

    let context = DeploymentContext::load(config_dir.path()).unwrap();
    let mut writer =
        ProfileNetCdfWriter::new(context, NetcdfFormat::Netcdf4Classic, 1, false, 1).unwrap();
    let staging = stage::StagingArea::new().unwrap();
    let staged = staging.stage_file("unit_595-failed-profile").unwrap();

    writer.begin_profile(1_709_280_100.0);
    writer.init_nc(&staged).unwrap();
    writer.open_nc().unwrap();
    writer.set_trajectory_id().unwrap();

    // A sensor with no definition fails closed and the profile is aborted.
    let err = writer
        .insert_var_data("sci_bogus_sensor", &[1.0, 2.0])
        .unwrap_err();
    assert!(matches!(err, glider_nc::GliderError::UnknownVariable(_)));
    writer.abort_nc();

    assert!(!staged.exists());
    assert_eq!(fs::read_dir(out_dir.path()).unwrap().count(), 0);

    // The aborted profile never committed an id: the next profile on the
    // same writer still opens the sequence.
    let retry = staging.stage_file("unit_595-retry-profile").unwrap();
    writer.begin_profile(1_709_280_300.0);
    writer.init_nc(&retry).unwrap();
    writer.open_nc().unwrap();
    writer.set_trajectory_id().unwrap();
    writer
        .insert_var_data("llat_time", &[1_709_280_200.0, 1_709_280_400.0])
        .unwrap();
    writer
        .insert_var_data("llat_latitude", &[43.5, 43.5])
        .unwrap();
    writer
        .insert_var_data("llat_longitude", &[-70.2, -70.2])
        .unwrap();
    writer.insert_var_data("llat_depth", &[2.0, 18.0]).unwrap();
    let artifact = writer.finish_nc().unwrap();
    assert_eq!(artifact.profile_id, 1);
    staging.remove().unwrap();
}

#[test]
fn mean_timestamp_policy_derives_ids_from_time() {
    let config_dir = tempfile::tempdir().unwrap();
    write_config_dir(config_dir.path());
    let data_dir = tempfile::tempdir().unwrap();
    let dba_path = data_dir.path().join("unit_595-2024-061-1-0.sbd.dba");
    write_dba_file(&dba_path);
    let out_dir = tempfile::tempdir().unwrap();

    // start_profile_id of 0 selects the mean-timestamp policy.
    let published = convert(config_dir.path(), &dba_path, out_dir.path(), 0, false);
    assert_eq!(published.len(), 3);
    let t0 = 1_709_280_000i64;
    for artifact in &published {
        let nc = netcdf::open(artifact).unwrap();
        let id = nc
            .variable("profile_id")
            .unwrap()
            .get_values::<f64, _>(..)
            .unwrap()[0] as i64;
        assert!(id > t0 && id < t0 + 700, "got {id}");
    }
}
