use assert_cmd::prelude::*;
use std::process::Command;
use zonalstats_operators::util::test::{
    RectangleZone, quadrant_values, write_geotiff, write_rectangle_zones,
};

#[test]
fn it_reports_missing_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let zones = dir.path().join("states.shp");

    let output = Command::cargo_bin("zonalstats")
        .unwrap()
        .args(["--zones", zones.to_str().unwrap()])
        .args(["--raster", dir.path().join("glc2000.tif").to_str().unwrap()])
        .args(["--array", "GLC2000"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(&format!("FilePath {} does not exist", zones.display())),
        "{stderr}"
    );
}

#[test]
fn it_rejects_unknown_modes() {
    Command::cargo_bin("zonalstats")
        .unwrap()
        .args(["--zones", "states.shp", "--raster", "glc2000.tif"])
        .args(["--array", "GLC2000", "--mode", "4"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn it_fails_without_a_reachable_engine() {
    let dir = tempfile::tempdir().unwrap();
    let zones = dir.path().join("zones.geojson");
    let raster = dir.path().join("raster.tif");
    let report = dir.path().join("report.csv");

    write_rectangle_zones(
        &zones,
        "ID",
        &[RectangleZone {
            id: 1,
            min_x: 0.,
            max_x: 2.,
            min_y: 2.,
            max_y: 4.,
        }],
    )
    .unwrap();
    write_geotiff(&raster, [0., 1., 0., 4., 0., -1.], 4, 4, quadrant_values()).unwrap();

    let output = Command::cargo_bin("zonalstats")
        .unwrap()
        .current_dir(dir.path())
        // nothing listens on the discard port
        .env("ZONALSTATS__ENGINE__URL", "http://127.0.0.1:9")
        .args(["--zones", zones.to_str().unwrap()])
        .args(["--raster", raster.to_str().unwrap()])
        .args(["--array", "GLC2000", "--tests", "1"])
        .args(["--csv", report.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!report.exists());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Array engine request failed"), "{stderr}");
}
