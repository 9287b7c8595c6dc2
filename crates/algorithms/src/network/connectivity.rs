//! Lake connectivity classes
//!
//! A lake is classified from its upstream and downstream traces with its
//! own segments removed:
//!
//! | upstream | downstream | class |
//! |----------|------------|-------|
//! | no       | no         | Isolated |
//! | no       | yes        | Headwater |
//! | yes      | no         | Terminal / TerminalLk |
//! | yes      | yes        | Drainage / DrainageLk |
//!
//! The `Lk` variants apply when another lake of at least the threshold size
//! appears upstream.

use super::flow_graph::Direction;
use super::lakes::LakePopulation;
use super::trace::TraceConfiguration;
use super::HydroNetwork;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Connectivity class of a lake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Connectivity {
    Isolated,
    Headwater,
    Drainage,
    DrainageLk,
    Terminal,
    TerminalLk,
}

impl Connectivity {
    pub fn label(self) -> &'static str {
        match self {
            Connectivity::Isolated => "Isolated",
            Connectivity::Headwater => "Headwater",
            Connectivity::Drainage => "Drainage",
            Connectivity::DrainageLk => "DrainageLk",
            Connectivity::Terminal => "Terminal",
            Connectivity::TerminalLk => "TerminalLk",
        }
    }

    /// No outflow on the mapped network
    pub fn is_off_network(self) -> bool {
        matches!(
            self,
            Connectivity::Isolated | Connectivity::Terminal | Connectivity::TerminalLk
        )
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parameters for connectivity classification
#[derive(Debug, Clone)]
pub struct ConnectivityParams {
    /// Upstream lakes at least this large (km²) make a lake DrainageLk/TerminalLk
    pub lake_threshold_km2: f64,
}

impl Default for ConnectivityParams {
    fn default() -> Self {
        Self {
            lake_threshold_km2: 0.1,
        }
    }
}

/// Classifies lakes of one network
pub struct ConnectivityClassifier<'a> {
    net: &'a HydroNetwork,
    threshold_lakes: HashSet<String>,
    config: TraceConfiguration,
}

impl<'a> ConnectivityClassifier<'a> {
    pub fn new(net: &'a HydroNetwork, lakes: &LakePopulation, params: &ConnectivityParams) -> Self {
        Self {
            net,
            threshold_lakes: lakes.at_least(params.lake_threshold_km2).into_iter().collect(),
            config: TraceConfiguration::new(),
        }
    }

    /// Connectivity class of one waterbody; `None` if it is not in this subregion.
    pub fn classify(&self, waterbody_id: &str) -> Option<Connectivity> {
        let ids = self.net.ids();
        let wix = ids.waterbody_ix(waterbody_id)?;
        let own = ids.waterbody_to_segments(wix);
        let tracer = self.net.tracer(&self.config);

        let mut up = tracer.trace_waterbody(waterbody_id, Direction::Up);
        let mut down = tracer.trace_waterbody(waterbody_id, Direction::Down);
        for s in own {
            up.segments.remove(s);
            down.segments.remove(s);
        }
        let has_up = !up.segments.is_empty();
        let has_down = !down.segments.is_empty();

        let lake_upstream = up
            .waterbodies
            .iter()
            .filter(|&&w| w != wix)
            .any(|&w| self.threshold_lakes.contains(ids.waterbody_id(w)));

        Some(match (has_up, has_down) {
            (false, false) => Connectivity::Isolated,
            (false, true) => Connectivity::Headwater,
            (true, false) if lake_upstream => Connectivity::TerminalLk,
            (true, false) => Connectivity::Terminal,
            (true, true) if lake_upstream => Connectivity::DrainageLk,
            (true, true) => Connectivity::Drainage,
        })
    }

    /// Classify every lake of the population present in this subregion.
    pub fn classify_all(&self, lakes: &LakePopulation) -> BTreeMap<String, Connectivity> {
        lakes
            .ids()
            .filter_map(|id| self.classify(id).map(|c| (id.to_string(), c)))
            .collect()
    }
}

/// Classify one waterbody with default parameters.
pub fn classify_connectivity(net: &HydroNetwork, lakes: &LakePopulation, waterbody_id: &str) -> Option<Connectivity> {
    ConnectivityClassifier::new(net, lakes, &ConnectivityParams::default()).classify(waterbody_id)
}
