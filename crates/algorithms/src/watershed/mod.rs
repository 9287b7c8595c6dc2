//! Accumulated lake watersheds
//!
//! For each lake the upstream trace selects local catchment polygons, which
//! are dissolved into one feature, cleaned of holes, stripped of sink
//! sub-networks (interlake mode) and of the lake's own footprint.
//!
//! - `Network` mode: the full upstream network within the subregion
//! - `Interlake` mode: lakes of at least 0.1 km² act as barriers and sinks

mod accumulate;
mod islands;
mod sinks;

pub use accumulate::WatershedAccumulator;

use lagosnet_parallel::ProcessingMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// Accumulation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccumulationMode {
    /// No barriers: the whole upstream network
    #[default]
    Network,
    /// Size-threshold lakes are barriers and their sink basins are removed
    Interlake,
}

impl AccumulationMode {
    pub fn label(self) -> &'static str {
        match self {
            AccumulationMode::Network => "network",
            AccumulationMode::Interlake => "interlake",
        }
    }
}

impl fmt::Display for AccumulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the watershed of a lake was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WatershedSubtype {
    /// The lake's own local catchment, no upstream accumulation
    LocalCatchment,
    /// Accumulated in network mode
    Network,
    /// Accumulated in interlake mode
    Interlake,
    /// Re-derived for a lake enclosed by another lake
    Island,
}

impl WatershedSubtype {
    pub fn label(self) -> &'static str {
        match self {
            WatershedSubtype::LocalCatchment => "LC",
            WatershedSubtype::Network => "NWS",
            WatershedSubtype::Interlake => "IWS",
            WatershedSubtype::Island => "ISL",
        }
    }
}

impl fmt::Display for WatershedSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which ids key the local catchment layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatchmentKeys {
    /// Canonical segment and waterbody ids
    #[default]
    Canonical,
    /// Raw source ids, translated through the identifier maps
    Raw,
}

/// Parameters for watershed accumulation
#[derive(Debug, Clone)]
pub struct AccumulationParams {
    pub mode: AccumulationMode,
    /// Lakes at least this large (km²) are barriers and sinks in interlake mode
    pub lake_threshold_km2: f64,
    /// Two watersheds are the same when their areas differ by at most this (CRS units²)
    pub area_tolerance: f64,
    pub catchment_keys: CatchmentKeys,
    pub processing: ProcessingMode,
}

impl Default for AccumulationParams {
    fn default() -> Self {
        Self {
            mode: AccumulationMode::Network,
            lake_threshold_km2: 0.1,
            area_tolerance: 10.0,
            catchment_keys: CatchmentKeys::Canonical,
            processing: ProcessingMode::Sequential,
        }
    }
}

/// One lake's accumulated watershed
#[derive(Debug, Clone)]
pub struct AccumulatedWatershed<P> {
    pub lake_id: String,
    pub polygon: P,
    /// Area as reported by the geometry engine
    pub area: f64,
    pub mode: AccumulationMode,
    pub subtype: WatershedSubtype,
    /// The trace reached a segment fed from a neighbouring subregion
    pub includes_subregion_inlet: bool,
    /// Interlake area equals network area; set by [`flag_network_equivalence`]
    pub equals_network_watershed: Option<bool>,
    /// Number of ids in the lake's trace
    pub trace_size: usize,
}

/// Outcome of a batch run
#[derive(Debug, Clone)]
pub struct BatchReport<P> {
    pub mode: AccumulationMode,
    pub watersheds: Vec<AccumulatedWatershed<P>>,
    /// Requested ids with no waterbody in this subregion
    pub skipped: Vec<String>,
    /// Lakes whose accumulation failed, with the error
    pub failed: Vec<(String, String)>,
    /// Lakes whose watershed came out empty
    pub empty: Vec<String>,
    /// Lakes repaired as enclosed islands
    pub islands: Vec<String>,
}

impl<P> BatchReport<P> {
    pub fn new(mode: AccumulationMode) -> Self {
        Self {
            mode,
            watersheds: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            empty: Vec::new(),
            islands: Vec::new(),
        }
    }

    pub fn get(&self, lake_id: &str) -> Option<&AccumulatedWatershed<P>> {
        self.watersheds.iter().find(|w| w.lake_id == lake_id)
    }

    /// True when every requested lake present in the subregion produced a watershed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.empty.is_empty()
    }

    /// Log the end-of-batch summary.
    pub fn log_summary(&self) {
        info!(
            "{} watersheds: {} produced, {} skipped, {} failed, {} empty, {} island repairs",
            self.mode,
            self.watersheds.len(),
            self.skipped.len(),
            self.failed.len(),
            self.empty.len(),
            self.islands.len()
        );
        if !self.skipped.is_empty() {
            warn!("not in this subregion: {}", self.skipped.join(", "));
        }
        for (id, err) in &self.failed {
            warn!("lake {} failed: {}", id, err);
        }
        if !self.empty.is_empty() {
            warn!("empty watersheds: {}", self.empty.join(", "));
        }
    }
}

/// Set `equals_network_watershed` on interlake watersheds by comparing their
/// area with the network watershed of the same lake.
///
/// Lakes without a network counterpart keep `None`.
pub fn flag_network_equivalence<P>(
    interlake: &mut [AccumulatedWatershed<P>],
    network: &[AccumulatedWatershed<P>],
    tolerance: f64,
) {
    let network_area: HashMap<&str, f64> = network.iter().map(|w| (w.lake_id.as_str(), w.area)).collect();
    for ws in interlake.iter_mut() {
        ws.equals_network_watershed = network_area
            .get(ws.lake_id.as_str())
            .map(|&a| (a - ws.area).abs() <= tolerance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws(id: &str, area: f64, mode: AccumulationMode) -> AccumulatedWatershed<()> {
        AccumulatedWatershed {
            lake_id: id.to_string(),
            polygon: (),
            area,
            mode,
            subtype: WatershedSubtype::Network,
            includes_subregion_inlet: false,
            equals_network_watershed: None,
            trace_size: 1,
        }
    }

    #[test]
    fn test_equivalence_within_tolerance() {
        let network = vec![
            ws("a", 1000.0, AccumulationMode::Network),
            ws("b", 1000.0, AccumulationMode::Network),
        ];
        let mut interlake = vec![
            ws("a", 995.0, AccumulationMode::Interlake),
            ws("b", 900.0, AccumulationMode::Interlake),
            ws("c", 10.0, AccumulationMode::Interlake),
        ];
        flag_network_equivalence(&mut interlake, &network, 10.0);
        assert_eq!(interlake[0].equals_network_watershed, Some(true));
        assert_eq!(interlake[1].equals_network_watershed, Some(false));
        assert_eq!(interlake[2].equals_network_watershed, None);
    }

    #[test]
    fn test_report_completeness() {
        let mut report: BatchReport<()> = BatchReport::new(AccumulationMode::Network);
        report.watersheds.push(ws("a", 1.0, AccumulationMode::Network));
        report.skipped.push("elsewhere".into());
        assert!(report.is_complete());
        assert!(report.get("a").is_some());
        report.empty.push("b".into());
        assert!(!report.is_complete());
    }

    #[test]
    fn test_labels() {
        assert_eq!(WatershedSubtype::Interlake.to_string(), "IWS");
        assert_eq!(AccumulationMode::Interlake.to_string(), "interlake");
    }
}
