//! Configuration resolution scenarios: subset accommodation, inference
//! artifact adoption, and existing-build continuation.

mod common;

use std::fs;

use serde_json::json;

use common::*;
use strata::config::Resolved;
use strata::error::Error;

fn xyz_schema_json() -> serde_json::Value {
    json!([
        {"name": "X", "type": "floating", "size": 8},
        {"name": "Y", "type": "floating", "size": 8},
        {"name": "Z", "type": "floating", "size": 8},
    ])
}

#[test]
fn test_subset_bumps_depths() {
    let d = build(
        MockDriver::default(),
        json!({
            "bounds": [0, 0, 0, 10, 10, 10],
            "schema": xyz_schema_json(),
            "numPointsHint": 1000,
            "subset": {"id": 1, "of": 4},
            "nullDepth": 0,
            "baseDepth": 1,
            "pointsPerChunk": 16,
        }),
    );

    // log4(4) = 1, and 16 points per chunk nominally fill depth 2, so four
    // subsets push the base out one more level.
    assert_eq!(d.null_depth, 1);
    assert_eq!(d.base_depth, 3);
    assert_eq!(d.bump_depth, Some(1));

    // A user-supplied schema is taken verbatim.
    assert_eq!(d.schema.dims().len(), 3);
    assert!(!d.schema.contains("PointId"));
}

#[test]
fn test_subset_leaves_sufficient_depths_alone() {
    let d = build(
        MockDriver::default(),
        json!({
            "bounds": [0, 0, 0, 10, 10, 10],
            "schema": xyz_schema_json(),
            "numPointsHint": 1000,
            "subset": {"id": 3, "of": 4},
        }),
    );

    assert_eq!(d.null_depth, 7);
    assert_eq!(d.base_depth, 10);
    assert_eq!(d.bump_depth, None);
}

#[test]
fn test_invalid_subset_rejected() {
    let err = resolve(
        MockDriver::default(),
        json!({
            "bounds": [0, 0, 0, 10, 10, 10],
            "schema": xyz_schema_json(),
            "numPointsHint": 1000,
            "subset": {"id": 1, "of": 8},
        }),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidSubset(_)));
}

#[test]
fn test_adopts_inference_artifact_without_probing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prior.entwine-inference");

    // Five billion points in one file forces 8-byte point ids.
    let artifact = json!({
        "fileInfo": [{
            "path": "clouds/huge.las",
            "status": "inserted",
            "numPoints": 5_000_000_000u64,
            "bounds": [0, 0, 0, 100, 100, 100],
        }],
        "schema": xyz_schema_json(),
        "bounds": [0, 0, 0, 100, 100, 100],
        "numPoints": 5_000_000_000u64,
    });
    fs::write(&path, serde_json::to_vec(&artifact).unwrap()).unwrap();

    // An empty driver proves no probing happens: any probe would come up
    // empty and fail the run.
    let d = build(
        MockDriver::default(),
        json!({"input": path.to_string_lossy()}),
    );

    assert_eq!(d.num_points, 5_000_000_000);
    assert_eq!(d.bounds, bounds([0.0, 0.0, 0.0], [100.0, 100.0, 100.0]));
    assert_eq!(d.file_info.len(), 1);
    assert_eq!(d.file_info[0].path, "clouds/huge.las");

    let names: Vec<&str> = d.schema.dims().iter().map(|dim| dim.name.as_str()).collect();
    assert_eq!(names, ["X", "Y", "Z", "PointId", "OriginId"]);
    let point_id = &d.schema.dims()[3];
    let origin_id = &d.schema.dims()[4];
    assert_eq!(point_id.size, 8);
    assert_eq!(origin_id.size, 4);
}

#[test]
fn test_existing_build_returns_continuation() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("entwine"), b"{}").unwrap();
    let output = dir.path().to_string_lossy().into_owned();

    let resolved = resolve(
        MockDriver::default(),
        json!({"input": ["/data/new.las"], "output": output}),
    )
    .unwrap();

    match resolved {
        Resolved::Continuation(c) => {
            assert_eq!(c.marker, "entwine");
            assert_eq!(c.appended.len(), 1);
            assert_eq!(c.appended[0].path, "/data/new.las");
        }
        Resolved::Build(_) => panic!("expected a continuation"),
    }
}

#[test]
fn test_subset_marker_is_postfixed() {
    let dir = tempfile::tempdir().unwrap();
    // Only the whole-build marker exists; subset 2 has never run.
    fs::write(dir.path().join("entwine"), b"{}").unwrap();
    let output = dir.path().to_string_lossy().into_owned();

    let resolved = resolve(
        MockDriver::default(),
        json!({
            "output": output,
            "bounds": [0, 0, 0, 10, 10, 10],
            "schema": xyz_schema_json(),
            "numPointsHint": 1000,
            "subset": {"id": 2, "of": 4},
        }),
    )
    .unwrap();
    assert!(matches!(resolved, Resolved::Build(_)));

    // Once the subset's own marker lands, it continues.
    fs::write(dir.path().join("entwine-2"), b"{}").unwrap();
    let resolved = resolve(
        MockDriver::default(),
        json!({
            "output": dir.path().to_string_lossy(),
            "subset": {"id": 2, "of": 4},
        }),
    )
    .unwrap();
    match resolved {
        Resolved::Continuation(c) => assert_eq!(c.marker, "entwine-2"),
        Resolved::Build(_) => panic!("expected a continuation"),
    }
}

#[test]
fn test_force_ignores_existing_build() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("entwine"), b"{}").unwrap();

    let resolved = resolve(
        MockDriver::default(),
        json!({
            "output": dir.path().to_string_lossy(),
            "force": true,
            "bounds": [0, 0, 0, 10, 10, 10],
            "schema": xyz_schema_json(),
            "numPointsHint": 1000,
        }),
    )
    .unwrap();

    assert!(matches!(resolved, Resolved::Build(_)));
}

#[test]
fn test_config_overrides_adopted_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prior.entwine-inference");

    let artifact = json!({
        "fileInfo": [{"path": "a.las", "status": "inserted", "numPoints": 100,
                      "bounds": [0, 0, 0, 1, 1, 1]}],
        "schema": xyz_schema_json(),
        "bounds": [0, 0, 0, 1, 1, 1],
        "numPoints": 100u64,
    });
    fs::write(&path, serde_json::to_vec(&artifact).unwrap()).unwrap();

    let d = build(
        MockDriver::default(),
        json!({
            "input": path.to_string_lossy(),
            "bounds": [-5, -5, -5, 5, 5, 5],
            "numPointsHint": 42,
        }),
    );

    // User values win over adopted ones.
    assert_eq!(d.bounds, bounds([-5.0, -5.0, -5.0], [5.0, 5.0, 5.0]));
    assert_eq!(d.num_points, 42);
}

#[test]
fn test_descriptor_serializes_stable_names() {
    let d = build(
        MockDriver::default(),
        json!({
            "bounds": [0, 0, 0, 10, 10, 10],
            "schema": xyz_schema_json(),
            "numPointsHint": 1000,
            "scale": 0.01,
        }),
    );

    let json = serde_json::to_value(&d).unwrap();
    assert!(json.get("fileInfo").is_some());
    assert!(json.get("numPoints").is_some());
    assert!(json.get("nullDepth").is_some());
    assert!(json.get("pointsPerChunk").is_some());
    assert_eq!(json["scale"].as_array().unwrap().len(), 3);
    assert_eq!(json["offset"].as_array().unwrap().len(), 3);
    assert!(json.get("bumpDepth").is_none());
}
