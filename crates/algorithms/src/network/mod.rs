//! Hydrologic network: flow graph, identifier maps, lakes, tracing
//!
//! [`HydroNetwork`] bundles everything built once per hydrologic subregion.
//! It is read-only after construction (lazy caches aside) and can be shared
//! across worker threads.

mod connectivity;
mod flow_graph;
mod identifiers;
mod lakes;
mod outlets;
mod trace;

pub use connectivity::{classify_connectivity, Connectivity, ConnectivityClassifier, ConnectivityParams};
pub use flow_graph::{Direction, ExternalIds, FlowGraph, FlowGraphParams, FlowGraphStore, SegmentIx};
pub use identifiers::{IdentifierMaps, WaterbodyIx};
pub use lakes::{
    define_lakes, LakeFilterParams, LakePopulation, LakePopulationFilter, LAKE_FCODES,
    RELAXED_MIN_SIZE_KM2, RESERVOIR_FCODES, RESERVOIR_MIN_SIZE_KM2, STRICT_MIN_SIZE_KM2,
};
pub use outlets::{find_subregion_inlets, find_subregion_outlets, SECONDARY_OUTLET_FRACTION};
pub use trace::{NetworkTracer, Trace, TraceConfiguration};

use lagosnet_core::{Result, SegmentRecord, Waterbody};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Flow graph plus the tables it was built from, for one subregion
#[derive(Debug)]
pub struct HydroNetwork {
    graph: FlowGraph,
    segments: Vec<SegmentRecord>,
    waterbodies: Vec<Waterbody>,
    waterbody_index: HashMap<String, usize>,
    ids: OnceLock<IdentifierMaps>,
    outlets: OnceLock<Vec<SegmentIx>>,
    inlets: OnceLock<Vec<SegmentIx>>,
}

impl HydroNetwork {
    pub fn new(graph: FlowGraph, segments: Vec<SegmentRecord>, waterbodies: Vec<Waterbody>) -> Self {
        let waterbody_index = waterbodies
            .iter()
            .enumerate()
            .map(|(i, w)| (w.id.clone(), i))
            .collect();
        Self {
            graph,
            segments,
            waterbodies,
            waterbody_index,
            ids: OnceLock::new(),
            outlets: OnceLock::new(),
            inlets: OnceLock::new(),
        }
    }

    /// Load the graph from a store, optionally without intermittent segments.
    pub fn from_store(store: &FlowGraphStore, waterbodies: Vec<Waterbody>, exclude_intermittent: bool) -> Result<Self> {
        let graph = if exclude_intermittent {
            store.load_perennial()?
        } else {
            store.load()?
        };
        Ok(Self::new(graph, store.segments().to_vec(), waterbodies))
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    /// Identifier maps, built on first use
    pub fn ids(&self) -> &IdentifierMaps {
        self.ids
            .get_or_init(|| IdentifierMaps::build(&self.graph, &self.segments, &self.waterbodies))
    }

    pub fn waterbodies(&self) -> &[Waterbody] {
        &self.waterbodies
    }

    pub fn waterbody(&self, id: &str) -> Option<&Waterbody> {
        self.waterbody_index.get(id).map(|&i| &self.waterbodies[i])
    }

    pub fn has_waterbody(&self, id: &str) -> bool {
        self.waterbody_index.contains_key(id)
    }

    pub fn tracer<'a>(&'a self, config: &'a TraceConfiguration) -> NetworkTracer<'a> {
        NetworkTracer::new(self, config)
    }

    /// Segments where water leaves the subregion, computed once
    pub fn subregion_outlets(&self) -> &[SegmentIx] {
        self.outlets.get_or_init(|| find_subregion_outlets(&self.graph))
    }

    /// Segments fed from a neighbouring subregion, computed once
    pub fn subregion_inlets(&self) -> &[SegmentIx] {
        self.inlets.get_or_init(|| find_subregion_inlets(&self.graph))
    }
}
