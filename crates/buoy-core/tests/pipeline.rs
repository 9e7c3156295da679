use std::fs::{self, File};
use std::path::{Path, PathBuf};

use buoy_core::{IngestPipeline, PipelineConfig, PipelineError, Storage};
use buoy_reader::{DEPTH_DIM, TIME_DIM};
use polars::prelude::*;
use tempfile::TempDir;

fn reader_fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../buoy-reader/tests/data")
        .join(name)
}

fn stage_input(dir: &TempDir, name: &str) -> PathBuf {
    let target = dir.path().join(name);
    fs::copy(reader_fixture(name), &target)
        .unwrap_or_else(|err| panic!("failed to stage {name}: {err}"));
    target
}

fn pipeline(yaml: &str, storage_root: &Path) -> IngestPipeline {
    let config = PipelineConfig::from_yaml_str(yaml, "test").expect("valid config");
    IngestPipeline::from_config(config)
        .expect("pipeline builds")
        .with_storage(Storage::new(storage_root))
}

const METOCEAN: &str = r#"
pipeline:
  name: metocean
  location_id: morro
  datastream: morro.buoy_z06.a1
retriever:
  readers:
    - pattern: "buoy.*.csv"
      reader:
        type: buoy
        time:
          column: time
          format: "%Y-%m-%d %H:%M:%S"
storage:
  root: unused
"#;

const LIDAR: &str = r#"
pipeline:
  name: lidar
  location_id: morro
  datastream: morro.buoy_z06-lidar-10m.a1
retriever:
  readers:
    - pattern: "lidar.*.sta.7z"
      reader:
        type: sta
storage:
  root: unused
hooks: summary
"#;

#[test]
fn metocean_currents_run_saves_depth_profile() {
    let input = TempDir::new().expect("tempdir");
    let storage = TempDir::new().expect("tempdir");
    let path = stage_input(&input, "buoy.z06.00.20201201.000000.currents.csv");

    let output = pipeline(METOCEAN, storage.path())
        .run(&path)
        .expect("pipeline run");

    assert_eq!(output.dataset.dim_len(DEPTH_DIM), Some(2));
    assert_eq!(output.dataset.dim_len(TIME_DIM), Some(3));
    assert_eq!(
        output.dataset.attrs().get("datastream").map(String::as_str),
        Some("morro.buoy_z06.a1")
    );
    assert!(output.artifacts.is_empty());

    assert_eq!(
        output.saved.data,
        storage
            .path()
            .join("morro.buoy_z06.a1")
            .join("morro.buoy_z06.a1.20201201.000000.parquet")
    );

    let file = File::open(&output.saved.data).expect("parquet exists");
    let df = ParquetReader::new(file).finish().expect("parquet reads");
    assert_eq!(df.height(), 6);
    assert!(df.column("current_speed").is_ok());
    assert!(df.column("Vel1 (mm/s)").is_err());

    let sidecar: serde_json::Value =
        serde_json::from_slice(&fs::read(&output.saved.metadata).expect("sidecar exists"))
            .expect("sidecar is json");
    assert_eq!(sidecar["dims"]["depth"], 2);
    assert_eq!(sidecar["attrs"]["variants"], "currents");
    assert_eq!(sidecar["variables"]["current_speed"]["dims"][1], "depth");
}

#[test]
fn lidar_run_stores_summary_artifact() {
    let input = TempDir::new().expect("tempdir");
    let storage = TempDir::new().expect("tempdir");
    let path = stage_input(&input, "lidar.z06.00.20201201.001000.sta.7z");

    let output = pipeline(LIDAR, storage.path())
        .run(&path)
        .expect("pipeline run");

    assert_eq!(output.dataset.dim_len(TIME_DIM), Some(3));
    assert!(!output.dataset.has_dim(DEPTH_DIM));
    assert_eq!(
        output.saved.data.file_name().and_then(|name| name.to_str()),
        Some("morro.buoy_z06-lidar-10m.a1.20201201.001000.parquet")
    );

    assert_eq!(output.artifacts.len(), 1);
    let summary_path = &output.artifacts[0];
    assert_eq!(
        summary_path.file_name().and_then(|name| name.to_str()),
        Some("morro.buoy_z06-lidar-10m.a1.20201201.001000.summary.json")
    );
    assert!(summary_path.starts_with(storage.path().join("morro.buoy_z06-lidar-10m.a1")));

    let summary: serde_json::Value =
        serde_json::from_slice(&fs::read(summary_path).expect("summary exists"))
            .expect("summary is json");
    assert_eq!(summary["location_id"], "morro");
    let variables = summary["variables"].as_array().expect("variables");
    let pressure = variables
        .iter()
        .find(|variable| variable["name"] == "Pressure (hPa)")
        .expect("pressure summarized");
    assert_eq!(pressure["valid"], 3);
    approx::assert_abs_diff_eq!(pressure["max"].as_f64().expect("max"), 1016.2);
}

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

fn file_names(paths: &[PathBuf]) -> Vec<&str> {
    paths
        .iter()
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
        .collect()
}

#[test]
fn metocean_hooks_plot_current_profile() {
    let input = TempDir::new().expect("tempdir");
    let storage = TempDir::new().expect("tempdir");
    let path = stage_input(&input, "buoy.z06.00.20201201.000000.currents.csv");
    let yaml = format!("{METOCEAN}hooks: metocean\n");

    let output = pipeline(&yaml, storage.path())
        .run(&path)
        .expect("pipeline run");

    assert_eq!(
        file_names(&output.artifacts),
        vec!["morro.buoy_z06.a1.20201201.000000.current_velocity.png"]
    );
    let plot = storage
        .path()
        .join("morro.buoy_z06.a1")
        .join("morro.buoy_z06.a1.20201201.000000.current_velocity.png");
    assert_eq!(output.artifacts[0], plot);
    let bytes = fs::read(&plot).expect("plot stored");
    assert!(bytes.starts_with(PNG_SIGNATURE));
}

#[test]
fn metocean_hooks_plot_surface_time_series() {
    let input = TempDir::new().expect("tempdir");
    let storage = TempDir::new().expect("tempdir");
    let path = stage_input(&input, "buoy.z06.00.20201201.000000.surfacetemp.csv");
    let yaml = format!("{METOCEAN}hooks: metocean\n");

    let output = pipeline(&yaml, storage.path())
        .run(&path)
        .expect("pipeline run");

    assert_eq!(
        file_names(&output.artifacts),
        vec![
            "morro.buoy_z06.a1.20201201.000000.conductivity.png",
            "morro.buoy_z06.a1.20201201.000000.surface_met_parameters.png",
        ]
    );
    for artifact in &output.artifacts {
        assert!(artifact.starts_with(storage.path().join("morro.buoy_z06.a1")));
        let bytes = fs::read(artifact).expect("plot stored");
        assert!(bytes.starts_with(PNG_SIGNATURE));
    }
}

#[test]
fn unmatched_file_has_no_reader() {
    let storage = TempDir::new().expect("tempdir");
    let err = pipeline(LIDAR, storage.path())
        .run(Path::new("buoy.z06.00.20201201.000000.imu.bin"))
        .err()
        .expect("no reader");
    assert!(matches!(err, PipelineError::NoReader { ref file } if file.ends_with("imu.bin")));
}

#[test]
fn reader_errors_abort_before_anything_is_saved() {
    let input = TempDir::new().expect("tempdir");
    let storage = TempDir::new().expect("tempdir");
    let path = input.path().join("buoy.z06.00.20201201.000000.currents.csv");
    fs::write(&path, "time,Vel1 (mm/s),Dir1 (deg)\n2020-12-01 00:00:00,1.0,2.0\n")
        .expect("write input");

    let err = pipeline(METOCEAN, storage.path())
        .run(&path)
        .err()
        .expect("missing markers");
    assert!(matches!(err, PipelineError::Reader(_)));
    assert!(!storage.path().join("morro.buoy_z06.a1").exists());
}

#[test]
fn shipped_pipeline_configs_load() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../pipelines");
    for name in ["lidar", "metocean", "waves"] {
        let path = root.join(name).join("config/pipeline.yaml");
        let config = PipelineConfig::from_yaml_path(&path)
            .unwrap_or_else(|err| panic!("{}: {err}", path.display()));
        assert_eq!(config.pipeline.name, name);
        IngestPipeline::from_config(config).expect("pipeline builds");
    }
}
