use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn reader_fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../buoy-reader/tests/data")
        .join(name)
}

#[test]
fn readers_lists_every_reader() {
    Command::cargo_bin("buoy")
        .expect("binary")
        .arg("readers")
        .assert()
        .success()
        .stdout(predicate::str::contains("sta"))
        .stdout(predicate::str::contains("buoy"))
        .stdout(predicate::str::contains("summary"));
}

#[test]
fn inspect_prints_binned_currents() {
    Command::cargo_bin("buoy")
        .expect("binary")
        .args(["inspect", "--reader", "buoy"])
        .arg(reader_fixture("buoy.z06.00.20201201.000000.currents.csv"))
        .assert()
        .success()
        .stdout(predicate::str::contains("depth: 2"))
        .stdout(predicate::str::contains("current_speed"));
}

#[test]
fn inspect_honours_explicit_variants() {
    Command::cargo_bin("buoy")
        .expect("binary")
        .args(["inspect", "--reader", "buoy", "--variant", "gill"])
        .arg(reader_fixture("buoy.z06.00.20201201.000000.currents.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Horizontal Speed (m/s)"));
}

#[test]
fn run_writes_parquet_into_storage() {
    let storage = tempfile::TempDir::new().expect("tempdir");
    let config = storage.path().join("pipeline.yaml");
    std::fs::write(
        &config,
        format!(
            "pipeline:\n  name: lidar\n  location_id: morro\n  datastream: morro.buoy_z06-lidar-10m.a1\n\
             retriever:\n  readers:\n    - pattern: \"*.sta.7z\"\n      reader:\n        type: sta\n\
             storage:\n  root: {}\n",
            storage.path().join("out").display()
        ),
    )
    .expect("write config");

    Command::cargo_bin("buoy")
        .expect("binary")
        .args(["run", "--config"])
        .arg(&config)
        .arg(reader_fixture("lidar.z06.00.20201201.001000.sta.7z"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "morro.buoy_z06-lidar-10m.a1.20201201.001000.parquet",
        ));

    assert!(storage
        .path()
        .join("out/morro.buoy_z06-lidar-10m.a1/morro.buoy_z06-lidar-10m.a1.20201201.001000.parquet")
        .exists());
}
