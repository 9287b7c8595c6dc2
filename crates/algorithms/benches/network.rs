//! Benchmarks for network tracing and lake connectivity

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lagosnet_algorithms::network::{
    ConnectivityClassifier, ConnectivityParams, Direction, FlowGraphParams, FlowGraphStore, HydroNetwork,
    LakePopulation, TraceConfiguration,
};
use lagosnet_core::{FlowRow, SegmentRecord, Waterbody};

/// Binary dendritic network: segment k receives 2k+1 and 2k+2, segment 0
/// drains out. Every 7th segment sits in a lake; every 21st lake is large.
fn create_dendritic_network(depth: u32) -> (HydroNetwork, LakePopulation) {
    let n = (1usize << depth) - 1;
    let mut rows = Vec::with_capacity(n);
    let mut segments = Vec::with_capacity(n);
    let mut waterbodies = Vec::new();

    rows.push(FlowRow::new("s0", "0"));
    for k in 0..n {
        for child in [2 * k + 1, 2 * k + 2] {
            if child < n {
                rows.push(FlowRow::new(format!("s{child}"), format!("s{k}")));
            }
        }
        let mut seg = SegmentRecord::new(format!("s{k}"));
        if k % 7 == 3 {
            let lake = format!("w{k}");
            let area = if k % 21 == 3 { 0.5 } else { 0.03 };
            waterbodies.push(Waterbody::new(lake.clone(), area, 39004));
            seg = seg.in_waterbody(lake);
        }
        segments.push(seg);
    }

    let lakes: LakePopulation = waterbodies.iter().map(|w| (w.id.clone(), w.area_km2)).collect();
    let store = FlowGraphStore::new(rows, segments, FlowGraphParams::default());
    let net = HydroNetwork::from_store(&store, waterbodies, false).unwrap();
    (net, lakes)
}

fn bench_trace_up(c: &mut Criterion) {
    let mut group = c.benchmark_group("network/trace_up");
    for depth in [10, 14, 17] {
        let (net, _) = create_dendritic_network(depth);
        let config = TraceConfiguration::new();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| net.tracer(&config).trace_up(black_box("s0")))
        });
    }
    group.finish();
}

fn bench_interlake_trace(c: &mut Criterion) {
    let mut group = c.benchmark_group("network/interlake_trace");
    for depth in [10, 14, 17] {
        let (net, lakes) = create_dendritic_network(depth);
        let config = TraceConfiguration::new().with_size_threshold_stops(&net, &lakes, 0.1);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| net.tracer(&config).trace_waterbody(black_box("w3"), Direction::Up))
        });
    }
    group.finish();
}

fn bench_classify_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("network/classify_all");
    group.sample_size(10);
    for depth in [8, 11, 13] {
        let (net, lakes) = create_dendritic_network(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                let classifier = ConnectivityClassifier::new(&net, &lakes, &ConnectivityParams::default());
                classifier.classify_all(black_box(&lakes))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_trace_up, bench_interlake_trace, bench_classify_all);
criterion_main!(benches);
