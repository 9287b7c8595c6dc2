//! Sink sub-networks removed in interlake mode
//!
//! A size-threshold lake with no outflow on the mapped network (Isolated or
//! Terminal) collects everything upstream of it. That basin, minus whatever
//! also drains to the subregion outlets, is erased from other lakes'
//! interlake watersheds.

use crate::network::{ConnectivityClassifier, Direction, HydroNetwork, LakePopulation, TraceConfiguration};
use lagosnet_core::{GeometryEngine, Result};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Upstream basin of one off-network lake
#[derive(Debug, Clone)]
pub(crate) struct SinkRegion<P> {
    pub lake_id: String,
    pub ids: BTreeSet<String>,
    pub polygon: P,
}

/// Ids upstream of the subregion outlets
pub(crate) fn main_trunk(net: &HydroNetwork) -> BTreeSet<String> {
    let config = TraceConfiguration::new();
    net.tracer(&config)
        .trace_from(net.subregion_outlets(), Direction::Up)
        .ids(net)
}

/// Compute the sink regions of a subregion.
///
/// `dissolve` turns a set of trace ids into a polygon (`None` when no
/// catchment matches). A lake whose geometry fails is logged and left out.
pub(crate) fn sink_regions<E, F>(
    net: &HydroNetwork,
    lakes: &LakePopulation,
    classifier: &ConnectivityClassifier<'_>,
    threshold_km2: f64,
    engine: &E,
    dissolve: F,
) -> Vec<SinkRegion<E::Polygon>>
where
    E: GeometryEngine,
    F: Fn(&BTreeSet<String>) -> Result<Option<E::Polygon>>,
{
    let trunk = main_trunk(net);
    let config = TraceConfiguration::new();
    let tracer = net.tracer(&config);

    let mut regions = Vec::new();
    for lake_id in lakes.at_least(threshold_km2) {
        let Some(class) = classifier.classify(&lake_id) else {
            continue;
        };
        if !class.is_off_network() {
            continue;
        }
        let ids: BTreeSet<String> = tracer
            .trace_up_from_waterbody(&lake_id)
            .into_iter()
            .filter(|id| !trunk.contains(id))
            .collect();
        if ids.is_empty() {
            continue;
        }
        match dissolve(&ids) {
            Ok(Some(polygon)) if !engine.is_empty(&polygon) => regions.push(SinkRegion { lake_id, ids, polygon }),
            Ok(_) => debug!("sink lake {} has no catchment geometry", lake_id),
            Err(e) => warn!("sink region for lake {} skipped: {}", lake_id, e),
        }
    }
    debug!("{} sink regions, main trunk of {} ids", regions.len(), trunk.len());
    regions
}
