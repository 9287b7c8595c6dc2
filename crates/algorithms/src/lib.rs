//! # lagosnet Algorithms
//!
//! Hydrologic network algorithms for lakes and their watersheds.
//!
//! ## Available Algorithm Categories
//!
//! - **network**: flow graph loading, identifier maps, lake population,
//!   upstream/downstream tracing, subregion outlets/inlets, lake connectivity
//! - **watershed**: per-lake accumulated watersheds (network and interlake)
//! - **vector**: a `geo`-backed [`GeometryEngine`](lagosnet_core::GeometryEngine)

pub mod network;
pub mod vector;
pub mod watershed;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::network::{
        classify_connectivity, define_lakes, Connectivity, ConnectivityClassifier,
        ConnectivityParams, Direction, ExternalIds, FlowGraph, FlowGraphParams, FlowGraphStore,
        HydroNetwork, IdentifierMaps, LakeFilterParams, LakePopulation, LakePopulationFilter,
        NetworkTracer, SegmentIx, Trace, TraceConfiguration, WaterbodyIx,
    };
    pub use crate::vector::GeoEngine;
    pub use crate::watershed::{
        flag_network_equivalence, AccumulatedWatershed, AccumulationMode, AccumulationParams,
        BatchReport, CatchmentKeys, WatershedAccumulator, WatershedSubtype,
    };
    pub use lagosnet_core::prelude::*;
    pub use lagosnet_parallel::ProcessingMode;
}
