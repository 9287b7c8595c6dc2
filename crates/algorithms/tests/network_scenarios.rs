//! Tracing and connectivity scenarios on small hand-built networks.
//!
//! Each network is built from in-memory tables the same way the CLI builds
//! one from CSV: flow rows + segment table -> FlowGraphStore -> HydroNetwork.

use lagosnet_algorithms::network::{
    Connectivity, ConnectivityClassifier, ConnectivityParams, Direction, ExternalIds, FlowGraphParams,
    FlowGraphStore, HydroNetwork, LakePopulation, TraceConfiguration,
};
use lagosnet_core::{Error, FlowRow, SegmentRecord, Waterbody};
use std::collections::BTreeSet;

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn build(rows: &[(&str, &str)], segments: Vec<SegmentRecord>, waterbodies: Vec<Waterbody>) -> HydroNetwork {
    let rows = rows.iter().map(|&(f, t)| FlowRow::new(f, t)).collect();
    let store = FlowGraphStore::new(rows, segments, FlowGraphParams::default());
    HydroNetwork::from_store(&store, waterbodies, false).unwrap()
}

fn population(waterbodies: &[Waterbody]) -> LakePopulation {
    waterbodies.iter().map(|w| (w.id.clone(), w.area_km2)).collect()
}

/// Dendritic test network:
///
/// ```text
///  10 -> 11 -> 12(A) -> 13 -> 14(C) -> 15 -> 0
///        20 -> 21(B) -> 13
///        30 -> 31 -> 0            (separate; headwater lake H owns 30)
///  40(T): terminal lake fed by 41;  no outflow
/// ```
fn dendritic() -> (HydroNetwork, LakePopulation) {
    let rows = [
        ("0", "10"),
        ("10", "11"),
        ("11", "12"),
        ("12", "13"),
        ("20", "21"),
        ("21", "13"),
        ("13", "14"),
        ("14", "15"),
        ("15", "0"),
        ("0", "30"),
        ("30", "31"),
        ("31", "0"),
        ("0", "41"),
        ("41", "40"),
        ("40", "0"),
    ];
    let segments = vec![
        SegmentRecord::new("10"),
        SegmentRecord::new("11"),
        SegmentRecord::new("12").in_waterbody("A"),
        SegmentRecord::new("13"),
        SegmentRecord::new("14").in_waterbody("C"),
        SegmentRecord::new("15"),
        SegmentRecord::new("20"),
        SegmentRecord::new("21").in_waterbody("B"),
        SegmentRecord::new("30").in_waterbody("H"),
        SegmentRecord::new("31"),
        SegmentRecord::new("40").in_waterbody("T"),
        SegmentRecord::new("41"),
    ];
    let waterbodies = vec![
        Waterbody::new("A", 0.04, 39004),
        Waterbody::new("B", 0.12, 39004),
        Waterbody::new("C", 0.5, 39004),
        Waterbody::new("H", 0.02, 39004),
        Waterbody::new("T", 0.3, 39004),
        Waterbody::new("L", 0.05, 39004),
    ];
    let lakes = population(&waterbodies);
    (build(&rows, segments, waterbodies), lakes)
}

// ---------------------------------------------------------------------------
// Basic trace properties
// ---------------------------------------------------------------------------

#[test]
fn every_trace_contains_its_start() {
    let (net, lakes) = dendritic();
    let stops = TraceConfiguration::new().with_size_threshold_stops(&net, &lakes, 0.1);
    for config in [TraceConfiguration::new(), stops] {
        let tracer = net.tracer(&config);
        for s in net.graph().segments() {
            let id = net.graph().id(s);
            assert!(tracer.trace_up(id).contains(id), "trace_up({id})");
            assert!(tracer.trace_down(id).contains(id), "trace_down({id})");
        }
    }
}

#[test]
fn three_node_cycle_terminates() {
    let net = build(
        &[("A", "B"), ("B", "C"), ("C", "A")],
        vec![SegmentRecord::new("A"), SegmentRecord::new("B"), SegmentRecord::new("C")],
        vec![],
    );
    let config = TraceConfiguration::new();
    let tracer = net.tracer(&config);
    assert_eq!(tracer.trace_up("A"), set(&["A", "B", "C"]));
    assert_eq!(tracer.trace_down("B"), set(&["A", "B", "C"]));
}

#[test]
fn cycle_hanging_off_a_chain_terminates() {
    let net = build(
        &[("0", "1"), ("1", "2"), ("2", "3"), ("3", "2"), ("3", "4"), ("4", "0")],
        ["1", "2", "3", "4"].into_iter().map(SegmentRecord::new).collect(),
        vec![],
    );
    let config = TraceConfiguration::new();
    assert_eq!(net.tracer(&config).trace_up("4"), set(&["1", "2", "3", "4"]));
}

#[test]
fn traces_are_idempotent() {
    let (net, lakes) = dendritic();
    let config = TraceConfiguration::new().with_size_threshold_stops(&net, &lakes, 0.1);
    let tracer = net.tracer(&config);
    assert_eq!(tracer.trace_up("15"), tracer.trace_up("15"));
    assert_eq!(tracer.trace_up_from_waterbody("C"), tracer.trace_up_from_waterbody("C"));
}

#[test]
fn absent_ids_give_empty_traces() {
    let (net, _) = dendritic();
    let config = TraceConfiguration::new();
    let tracer = net.tracer(&config);
    assert!(tracer.trace_up("nope").is_empty());
    assert!(tracer.trace_down("nope").is_empty());
    assert!(tracer.trace_up_from_waterbody("nope").is_empty());
}

// ---------------------------------------------------------------------------
// Stops
// ---------------------------------------------------------------------------

#[test]
fn stop_segment_blocks_everything_above_it() {
    let (net, _) = dendritic();
    let config = TraceConfiguration::new().with_stop_segments(&net, ["13"]);
    let up = net.tracer(&config).trace_up("15");
    assert_eq!(up, set(&["14", "15"]));
    for above in ["10", "11", "12", "13", "20", "21"] {
        assert!(!up.contains(above), "{above} is above the stop");
    }
}

#[test]
fn start_at_a_stop_still_traces() {
    let (net, _) = dendritic();
    let config = TraceConfiguration::new().with_stop_segments(&net, ["13"]);
    let up = net.tracer(&config).trace_up("13");
    assert_eq!(up, set(&["10", "11", "12", "13", "20", "21"]));
}

#[test]
fn lake_is_never_its_own_barrier() {
    let (net, lakes) = dendritic();
    let config = TraceConfiguration::new().with_size_threshold_stops(&net, &lakes, 0.1);
    let tracer = net.tracer(&config);
    // C (0.5 km²) is itself a stop
    let up = tracer.trace_up_from_waterbody("C");
    assert!(up.contains("14"));
    assert!(up.contains("13"));
    assert!(up.contains("C"));
    // B (0.12 km²) blocks the trace but is recorded
    assert!(up.contains("B"));
    assert!(!up.contains("21"));
    assert!(!up.contains("20"));
    // A is small, so the trace runs through it
    assert!(up.contains("A"));
    assert!(up.contains("10"));
}

#[test]
fn stops_do_not_leak_between_configurations() {
    let (net, lakes) = dendritic();
    let with_stops = TraceConfiguration::new().with_size_threshold_stops(&net, &lakes, 0.1);
    let plain = TraceConfiguration::new();
    let blocked = net.tracer(&with_stops).trace_up("15");
    let open = net.tracer(&plain).trace_up("15");
    assert!(blocked.len() < open.len());
    assert_eq!(open, set(&["10", "11", "12", "13", "14", "15", "20", "21"]));
}

// ---------------------------------------------------------------------------
// Worked scenarios
// ---------------------------------------------------------------------------

#[test]
fn lake_at_bottom_of_chain() {
    let net = build(
        &[("1", "2"), ("2", "3"), ("3", "0")],
        vec![
            SegmentRecord::new("1"),
            SegmentRecord::new("2"),
            SegmentRecord::new("3").in_waterbody("lake"),
        ],
        vec![Waterbody::new("lake", 0.2, 39004)],
    );
    let config = TraceConfiguration::new();
    let up = net.tracer(&config).trace_up_from_waterbody("lake");
    assert_eq!(up, set(&["1", "2", "3", "lake"]));
}

#[test]
fn interlake_trace_stops_at_upstream_big_lake() {
    // B (12 ha) directly upstream of A (4 ha)
    let waterbodies = vec![Waterbody::new("A", 0.04, 39004), Waterbody::new("B", 0.12, 39004)];
    let lakes = population(&waterbodies);
    let net = build(
        &[("0", "b1"), ("b1", "b2"), ("b2", "a1"), ("a1", "0")],
        vec![
            SegmentRecord::new("b1"),
            SegmentRecord::new("b2").in_waterbody("B"),
            SegmentRecord::new("a1").in_waterbody("A"),
        ],
        waterbodies,
    );
    let interlake = TraceConfiguration::new().with_size_threshold_stops(&net, &lakes, 0.1);
    let trace = net.tracer(&interlake).trace_waterbody("A", Direction::Up);
    let ids = trace.ids(&net);
    assert_eq!(ids, set(&["a1", "A", "B"]));
    assert_eq!(trace.barriers.len(), 1);

    let network = TraceConfiguration::new();
    let full = net.tracer(&network).trace_up_from_waterbody("A");
    assert_eq!(full, set(&["a1", "b1", "b2", "A", "B"]));
}

#[test]
fn multi_segment_lake_traces_from_its_outlet() {
    // Lake L spans 2 -> 3 -> 4; tributary 9 enters at 3
    let net = build(
        &[("1", "2"), ("2", "3"), ("9", "3"), ("3", "4"), ("4", "5"), ("5", "0")],
        vec![
            SegmentRecord::new("1"),
            SegmentRecord::new("2").in_waterbody("L"),
            SegmentRecord::new("3").in_waterbody("L"),
            SegmentRecord::new("4").in_waterbody("L"),
            SegmentRecord::new("5"),
            SegmentRecord::new("9"),
        ],
        vec![Waterbody::new("L", 1.0, 39004)],
    );
    let config = TraceConfiguration::new();
    let tracer = net.tracer(&config);
    assert_eq!(tracer.trace_up_from_waterbody("L"), set(&["1", "2", "3", "4", "9", "L"]));
    assert_eq!(tracer.trace_down_from_waterbody("L"), set(&["2", "3", "4", "5", "L"]));
}

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

#[test]
fn connectivity_classes() {
    let (net, lakes) = dendritic();
    let classifier = ConnectivityClassifier::new(&net, &lakes, &ConnectivityParams::default());
    assert_eq!(classifier.classify("A"), Some(Connectivity::Drainage));
    assert_eq!(classifier.classify("B"), Some(Connectivity::Drainage));
    assert_eq!(classifier.classify("C"), Some(Connectivity::DrainageLk));
    assert_eq!(classifier.classify("H"), Some(Connectivity::Headwater));
    assert_eq!(classifier.classify("T"), Some(Connectivity::Terminal));
    assert_eq!(classifier.classify("L"), Some(Connectivity::Isolated));
}

#[test]
fn terminal_lake_below_a_big_lake() {
    let waterbodies = vec![Waterbody::new("up", 0.5, 39004), Waterbody::new("end", 0.05, 39004)];
    let lakes = population(&waterbodies);
    let net = build(
        &[("0", "1"), ("1", "2"), ("2", "3"), ("3", "0")],
        vec![
            SegmentRecord::new("1").in_waterbody("up"),
            SegmentRecord::new("2"),
            SegmentRecord::new("3").in_waterbody("end"),
        ],
        waterbodies,
    );
    let classifier = ConnectivityClassifier::new(&net, &lakes, &ConnectivityParams::default());
    assert_eq!(classifier.classify("end"), Some(Connectivity::TerminalLk));
}

#[test]
fn isolated_iff_traces_hold_only_own_segments() {
    let (net, lakes) = dendritic();
    let classifier = ConnectivityClassifier::new(&net, &lakes, &ConnectivityParams::default());
    let config = TraceConfiguration::new();
    let tracer = net.tracer(&config);

    for (id, _) in lakes.iter() {
        let own: BTreeSet<String> = net
            .ids()
            .segments_of(id)
            .iter()
            .map(|&s| net.graph().id(s).to_string())
            .collect();
        let up = tracer.trace_waterbody(id, Direction::Up).segment_ids(&net);
        let down = tracer.trace_waterbody(id, Direction::Down).segment_ids(&net);
        let isolated = classifier.classify(id) == Some(Connectivity::Isolated);
        assert_eq!(isolated, up == own && down == own, "lake {id}");
    }
}

#[test]
fn landlocked_lake_is_isolated() {
    let (net, lakes) = dendritic();
    assert!(net.ids().segments_of("L").is_empty());
    let classifier = ConnectivityClassifier::new(&net, &lakes, &ConnectivityParams::default());
    assert_eq!(classifier.classify("L"), Some(Connectivity::Isolated));
    let config = TraceConfiguration::new();
    assert_eq!(net.tracer(&config).trace_up_from_waterbody("L"), set(&["L"]));
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn intermittent_segments_removed_at_load() {
    let rows = vec![FlowRow::new("1", "2"), FlowRow::new("2", "3"), FlowRow::new("3", "0")];
    let segments = vec![
        SegmentRecord::new("1"),
        SegmentRecord::new("2").intermittent(),
        SegmentRecord::new("3").in_waterbody("lake"),
    ];
    let store = FlowGraphStore::new(rows, segments, FlowGraphParams::default());
    let net = HydroNetwork::from_store(&store, vec![Waterbody::new("lake", 0.2, 39004)], true).unwrap();
    let config = TraceConfiguration::new();
    assert_eq!(net.tracer(&config).trace_up_from_waterbody("lake"), set(&["3", "lake"]));
}

#[test]
fn missing_reference_is_a_data_error() {
    let store = FlowGraphStore::new(
        vec![FlowRow::new("1", "2")],
        vec![SegmentRecord::new("1")],
        FlowGraphParams::default(),
    );
    assert!(matches!(HydroNetwork::from_store(&store, vec![], false), Err(Error::Data(_))));
}

#[test]
fn boundary_nodes_become_inlets() {
    let store = FlowGraphStore::new(
        vec![FlowRow::new("upstream-region", "1"), FlowRow::new("1", "2"), FlowRow::new("2", "0")],
        vec![SegmentRecord::new("1"), SegmentRecord::new("2")],
        FlowGraphParams {
            external_ids: ExternalIds::AsBoundary,
            ..Default::default()
        },
    );
    let net = HydroNetwork::from_store(&store, vec![], false).unwrap();
    let inlets: Vec<&str> = net.subregion_inlets().iter().map(|&s| net.graph().id(s)).collect();
    assert_eq!(inlets, vec!["1"]);
}
