//! Upstream and downstream network tracing with stop barriers
//!
//! A trace is a breadth-first expansion over the flow graph. The set of
//! barriers lives in an immutable [`TraceConfiguration`] that is passed to
//! each trace, so one configuration can be shared by many workers and a
//! lake's own segments are exempted per call instead of by editing the stop
//! list.

use super::flow_graph::{Direction, SegmentIx};
use super::identifiers::WaterbodyIx;
use super::lakes::LakePopulation;
use super::HydroNetwork;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Start and stop ids for a batch of traces.
///
/// Building a new configuration is the only way to change the stops: a
/// size-threshold configuration never leaks into an unrelated trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceConfiguration {
    start: Vec<SegmentIx>,
    stops: HashSet<SegmentIx>,
    stop_waterbodies: HashSet<WaterbodyIx>,
}

impl TraceConfiguration {
    /// No starts, no stops
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from every segment owned by these waterbodies.
    pub fn with_start_ids<'a, I>(mut self, net: &HydroNetwork, waterbody_ids: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ids = net.ids();
        for id in waterbody_ids {
            match ids.waterbody_ix(id) {
                Some(wix) => self.start.extend_from_slice(ids.waterbody_to_segments(wix)),
                None => warn!("start waterbody '{}' is not in this subregion, ignored", id),
            }
        }
        self.start.sort_unstable();
        self.start.dedup();
        self
    }

    /// Make every segment owned by these waterbodies a barrier.
    pub fn with_stop_ids<'a, I>(mut self, net: &HydroNetwork, waterbody_ids: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ids = net.ids();
        for id in waterbody_ids {
            match ids.waterbody_ix(id) {
                Some(wix) => self.add_stop_waterbody(net, wix),
                None => warn!("stop waterbody '{}' is not in this subregion, ignored", id),
            }
        }
        self
    }

    /// Make individual segments barriers.
    pub fn with_stop_segments<'a, I>(mut self, net: &HydroNetwork, segment_ids: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for id in segment_ids {
            match net.graph().lookup(id) {
                Some(six) => {
                    self.stops.insert(six);
                }
                None => warn!("stop segment '{}' is not in the flow graph, ignored", id),
            }
        }
        self
    }

    /// Make every lake of at least `threshold_km2` a barrier (10-hectare lakes at 0.1).
    pub fn with_size_threshold_stops(mut self, net: &HydroNetwork, lakes: &LakePopulation, threshold_km2: f64) -> Self {
        let ids = net.ids();
        let mut count = 0_usize;
        for id in lakes.at_least(threshold_km2) {
            if let Some(wix) = ids.waterbody_ix(&id) {
                self.add_stop_waterbody(net, wix);
                count += 1;
            }
        }
        debug!(
            "size-threshold stops: {} lakes >= {} km², {} stop segments",
            count,
            threshold_km2,
            self.stops.len()
        );
        self
    }

    fn add_stop_waterbody(&mut self, net: &HydroNetwork, wix: WaterbodyIx) {
        self.stop_waterbodies.insert(wix);
        self.stops.extend(net.ids().waterbody_to_segments(wix).iter().copied());
    }

    pub fn start_segments(&self) -> &[SegmentIx] {
        &self.start
    }

    pub fn is_stop(&self, segment: SegmentIx) -> bool {
        self.stops.contains(&segment)
    }

    pub fn is_stop_waterbody(&self, waterbody: WaterbodyIx) -> bool {
        self.stop_waterbodies.contains(&waterbody)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }
}

/// Result of one trace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    /// Visited segments, start included
    pub segments: BTreeSet<SegmentIx>,
    /// Waterbodies owning visited segments (the traced waterbody included)
    pub waterbodies: BTreeSet<WaterbodyIx>,
    /// Stop waterbodies the trace ran into but did not cross
    pub barriers: BTreeSet<WaterbodyIx>,
}

impl Trace {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.waterbodies.is_empty()
    }

    /// Every id in the trace: segments, waterbodies and barrier waterbodies.
    pub fn ids(&self, net: &HydroNetwork) -> BTreeSet<String> {
        let graph = net.graph();
        let ids = net.ids();
        self.segments
            .iter()
            .map(|&s| graph.id(s).to_string())
            .chain(
                self.waterbodies
                    .iter()
                    .chain(&self.barriers)
                    .map(|&w| ids.waterbody_id(w).to_string()),
            )
            .collect()
    }

    pub fn segment_ids(&self, net: &HydroNetwork) -> BTreeSet<String> {
        self.segments.iter().map(|&s| net.graph().id(s).to_string()).collect()
    }
}

/// Runs traces over one network under one configuration.
#[derive(Debug, Clone, Copy)]
pub struct NetworkTracer<'a> {
    net: &'a HydroNetwork,
    config: &'a TraceConfiguration,
}

impl<'a> NetworkTracer<'a> {
    pub fn new(net: &'a HydroNetwork, config: &'a TraceConfiguration) -> Self {
        Self { net, config }
    }

    pub fn config(&self) -> &TraceConfiguration {
        self.config
    }

    /// Segment ids upstream of a segment, the segment included. Unknown ids give an empty set.
    pub fn trace_up(&self, segment_id: &str) -> BTreeSet<String> {
        self.trace_segment(segment_id, Direction::Up)
    }

    /// Segment ids downstream of a segment, the segment included. Unknown ids give an empty set.
    pub fn trace_down(&self, segment_id: &str) -> BTreeSet<String> {
        self.trace_segment(segment_id, Direction::Down)
    }

    fn trace_segment(&self, segment_id: &str, direction: Direction) -> BTreeSet<String> {
        match self.net.graph().lookup(segment_id) {
            Some(six) => self.trace_from(&[six], direction).segment_ids(self.net),
            None => {
                debug!("segment '{}' is not in the flow graph, empty trace", segment_id);
                BTreeSet::new()
            }
        }
    }

    /// Trace from the configured start segments.
    pub fn trace_configured(&self, direction: Direction) -> Trace {
        self.trace_from(self.config.start_segments(), direction)
    }

    /// Trace from explicit segments, no stops exempted.
    pub fn trace_from(&self, starts: &[SegmentIx], direction: Direction) -> Trace {
        let mut trace = Trace::default();
        self.expand(starts, direction, &HashSet::new(), None, &mut trace);
        self.resolve_waterbodies(&mut trace, None);
        trace
    }

    /// All ids upstream of a waterbody: segments, the waterbody, and the waterbodies reached.
    pub fn trace_up_from_waterbody(&self, waterbody_id: &str) -> BTreeSet<String> {
        self.trace_waterbody(waterbody_id, Direction::Up).ids(self.net)
    }

    /// All ids downstream of a waterbody: segments, the waterbody, and the waterbodies reached.
    pub fn trace_down_from_waterbody(&self, waterbody_id: &str) -> BTreeSet<String> {
        self.trace_waterbody(waterbody_id, Direction::Down).ids(self.net)
    }

    /// Trace outward from a waterbody.
    ///
    /// Starts from the waterbody's edge segments in the direction of travel
    /// (outlets when tracing up, inlets when tracing down). The waterbody's
    /// own segments never act as stops. An unknown waterbody gives an empty
    /// trace; a waterbody owning no segments gives a trace holding only itself.
    pub fn trace_waterbody(&self, waterbody_id: &str, direction: Direction) -> Trace {
        let ids = self.net.ids();
        let Some(wix) = ids.waterbody_ix(waterbody_id) else {
            debug!("waterbody '{}' is not in this subregion, empty trace", waterbody_id);
            return Trace::default();
        };

        let mut trace = Trace::default();
        trace.waterbodies.insert(wix);
        let owned = ids.waterbody_to_segments(wix);
        if owned.is_empty() {
            return trace;
        }

        let own: HashSet<SegmentIx> = owned.iter().copied().collect();
        let graph = self.net.graph();
        let mut edges: Vec<SegmentIx> = owned
            .iter()
            .copied()
            .filter(|&s| {
                graph
                    .neighbors(s, direction.reverse())
                    .iter()
                    .all(|n| !own.contains(n))
            })
            .collect();
        if edges.is_empty() {
            // Segments form a loop inside the waterbody
            edges = owned.to_vec();
        }

        self.expand(&edges, direction, &own, Some(wix), &mut trace);
        let missed: Vec<SegmentIx> = owned
            .iter()
            .copied()
            .filter(|s| !trace.segments.contains(s))
            .collect();
        if !missed.is_empty() {
            self.expand(&missed, direction, &own, Some(wix), &mut trace);
        }

        self.resolve_waterbodies(&mut trace, Some(wix));
        trace
    }

    /// Breadth-first expansion into `trace.segments`.
    ///
    /// Starts are always included. Segments in `exempt` are never treated
    /// as stops. Blocked stop segments record their waterbody as a barrier
    /// unless it is `origin`.
    fn expand(
        &self,
        starts: &[SegmentIx],
        direction: Direction,
        exempt: &HashSet<SegmentIx>,
        origin: Option<WaterbodyIx>,
        trace: &mut Trace,
    ) {
        let graph = self.net.graph();
        let ids = self.net.ids();
        let total = graph.len();

        let mut frontier: Vec<SegmentIx> = Vec::with_capacity(starts.len());
        for &s in starts {
            if trace.segments.insert(s) {
                frontier.push(s);
            }
        }

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for &s in &frontier {
                for &n in graph.neighbors(s, direction) {
                    if trace.segments.contains(&n) {
                        continue;
                    }
                    if self.config.is_stop(n) && !exempt.contains(&n) {
                        if let Some(w) = ids.segment_to_waterbody(n) {
                            if Some(w) != origin {
                                trace.barriers.insert(w);
                            }
                        }
                        continue;
                    }
                    if trace.segments.insert(n) {
                        next.push(n);
                    }
                }
            }
            if trace.segments.len() >= total {
                // Everything visited; nothing left to expand into
                break;
            }
            frontier = next;
        }
    }

    fn resolve_waterbodies(&self, trace: &mut Trace, origin: Option<WaterbodyIx>) {
        let ids = self.net.ids();
        for &s in &trace.segments {
            if let Some(w) = ids.segment_to_waterbody(s) {
                if Some(w) == origin || !self.config.is_stop_waterbody(w) {
                    trace.waterbodies.insert(w);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::flow_graph::{FlowGraphParams, FlowGraphStore};
    use lagosnet_core::{FlowRow, SegmentRecord, Waterbody};

    /// 1 -> 2 -> 3 -> 4 -> 0, with 5 -> 3. Lake U owns 2, lake D owns 4.
    fn net() -> HydroNetwork {
        let rows = vec![
            FlowRow::new("0", "1"),
            FlowRow::new("1", "2"),
            FlowRow::new("2", "3"),
            FlowRow::new("5", "3"),
            FlowRow::new("3", "4"),
            FlowRow::new("4", "0"),
        ];
        let segments = vec![
            SegmentRecord::new("1"),
            SegmentRecord::new("2").in_waterbody("U"),
            SegmentRecord::new("3"),
            SegmentRecord::new("4").in_waterbody("D"),
            SegmentRecord::new("5"),
        ];
        let waterbodies = vec![Waterbody::new("U", 0.5, 39004), Waterbody::new("D", 0.5, 39004)];
        let store = FlowGraphStore::new(rows, segments, FlowGraphParams::default());
        HydroNetwork::from_store(&store, waterbodies, false).unwrap()
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_trace_includes_start() {
        let net = net();
        let config = TraceConfiguration::new();
        let tracer = net.tracer(&config);
        assert_eq!(tracer.trace_up("1"), set(&["1"]));
        assert_eq!(tracer.trace_down("1"), set(&["1", "2", "3", "4"]));
        assert_eq!(tracer.trace_up("4"), set(&["1", "2", "3", "4", "5"]));
    }

    #[test]
    fn test_unknown_segment_gives_empty_trace() {
        let net = net();
        let config = TraceConfiguration::new();
        assert!(net.tracer(&config).trace_up("999").is_empty());
        assert!(net.tracer(&config).trace_up_from_waterbody("nope").is_empty());
    }

    #[test]
    fn test_stop_is_not_crossed() {
        let net = net();
        let config = TraceConfiguration::new().with_stop_ids(&net, ["U"]);
        let up = net.tracer(&config).trace_up("4");
        assert_eq!(up, set(&["3", "4", "5"]));
    }

    #[test]
    fn test_waterbody_trace_records_barrier() {
        let net = net();
        let config = TraceConfiguration::new().with_stop_ids(&net, ["U"]);
        let ids = net.tracer(&config).trace_up_from_waterbody("D");
        assert_eq!(ids, set(&["3", "4", "5", "D", "U"]));
    }

    #[test]
    fn test_own_stop_is_exempt() {
        let net = net();
        let config = TraceConfiguration::new().with_stop_ids(&net, ["U", "D"]);
        let tracer = net.tracer(&config);
        let up = tracer.trace_up_from_waterbody("U");
        assert_eq!(up, set(&["1", "2", "U"]));
        let down = tracer.trace_down_from_waterbody("U");
        assert_eq!(down, set(&["2", "3", "U", "D"]));
    }

    #[test]
    fn test_unknown_stop_is_ignored() {
        let net = net();
        let config = TraceConfiguration::new()
            .with_stop_segments(&net, ["missing"])
            .with_stop_ids(&net, ["ghost"]);
        assert_eq!(config.stop_count(), 0);
        assert_eq!(net.tracer(&config).trace_up("3").len(), 4);
    }

    #[test]
    fn test_configured_start() {
        let net = net();
        let config = TraceConfiguration::new().with_start_ids(&net, ["D"]);
        let trace = net.tracer(&config).trace_configured(Direction::Up);
        assert_eq!(trace.segment_ids(&net), set(&["1", "2", "3", "4", "5"]));
    }
}
