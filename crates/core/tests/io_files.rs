//! File-based I/O tests for subregion tables and polygon layers.

use lagosnet_core::io::{
    read_flow_table, read_polygons, read_segment_table, read_waterbody_table, write_polygons,
    FlowColumns, SegmentColumns, WaterbodyColumns,
};
use lagosnet_core::vector::PolygonFeature;
use lagosnet_core::Error;
use geo_types::{LineString, MultiPolygon, Polygon};
use std::fs;

fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Polygon::new(
        LineString::from(vec![
            (x0, y0),
            (x0 + size, y0),
            (x0 + size, y0 + size),
            (x0, y0 + size),
            (x0, y0),
        ]),
        vec![],
    )])
}

#[test]
fn subregion_tables_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let flow = dir.path().join("flow.csv");
    let segments = dir.path().join("segments.csv");
    let waterbodies = dir.path().join("waterbodies.csv");

    fs::write(&flow, "FromNHDPID,ToNHDPID\n0,1\n1,2\n2,3\n3,0\n").unwrap();
    fs::write(
        &segments,
        "NHDPlusID,WBArea_Permanent_Identifier,FCode,Permanent_Identifier\n\
         1,,46003,s1\n2,,46006,s2\n3,wb-9,55800,s3\n",
    )
    .unwrap();
    fs::write(
        &waterbodies,
        "NHDPlusID,AreaSqKm,FCode,Permanent_Identifier\n9,0.5,39004,wb-9\n",
    )
    .unwrap();

    let rows = read_flow_table(&flow, &FlowColumns::default()).unwrap();
    let segs = read_segment_table(&segments, &SegmentColumns::default()).unwrap();
    let wbs = read_waterbody_table(&waterbodies, &WaterbodyColumns::default()).unwrap();

    assert_eq!(rows.len(), 4);
    assert_eq!(segs.iter().filter(|s| s.intermittent).count(), 1);
    assert_eq!(segs[2].waterbody_id.as_deref(), Some("wb-9"));
    assert_eq!(wbs[0].source_id.as_deref(), Some("wb-9"));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_flow_table(dir.path().join("nope.csv"), &FlowColumns::default()).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn watershed_layer_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("watersheds.geojson");

    let features = vec![
        PolygonFeature::new(square(0.0, 0.0, 10.0))
            .with_property("lake_id", "A")
            .with_property("equals_network_watershed", None::<bool>),
        PolygonFeature::new(square(20.0, 0.0, 5.0)).with_property("lake_id", "B"),
    ];
    write_polygons(&path, &features).unwrap();

    let back = read_polygons(&path, "lake_id").unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back["A"], square(0.0, 0.0, 10.0));
    assert_eq!(back["B"], square(20.0, 0.0, 5.0));
}
