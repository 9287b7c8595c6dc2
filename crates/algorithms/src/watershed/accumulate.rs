//! Per-lake and batch watershed accumulation

use super::islands::{enclosing_lake, repair_island};
use super::sinks::{sink_regions, SinkRegion};
use super::{AccumulatedWatershed, AccumulationMode, AccumulationParams, BatchReport, CatchmentKeys, WatershedSubtype};
use crate::network::{
    ConnectivityClassifier, ConnectivityParams, Direction, HydroNetwork, LakePopulation, Trace,
    TraceConfiguration,
};
use lagosnet_core::{CatchmentStore, Error, GeometryEngine, Result};
use lagosnet_parallel::ParallelStrategy;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Merged catchment of one lake, before its footprint is erased
struct Draft<P> {
    lake_id: String,
    polygon: P,
    subtype: WatershedSubtype,
    includes_inlet: bool,
    trace_size: usize,
}

/// Builds accumulated watersheds for the lakes of one subregion.
///
/// The network, catchments and the trace configuration are shared
/// read-only, so a batch can be processed by several workers.
pub struct WatershedAccumulator<'a, E: GeometryEngine> {
    net: &'a HydroNetwork,
    catchments: &'a CatchmentStore<E::Polygon>,
    engine: &'a E,
    lakes: &'a LakePopulation,
    params: AccumulationParams,
    config: TraceConfiguration,
    classifier: ConnectivityClassifier<'a>,
    sinks: OnceLock<Vec<SinkRegion<E::Polygon>>>,
}

impl<'a, E: GeometryEngine> WatershedAccumulator<'a, E> {
    pub fn new(
        net: &'a HydroNetwork,
        catchments: &'a CatchmentStore<E::Polygon>,
        engine: &'a E,
        lakes: &'a LakePopulation,
        params: AccumulationParams,
    ) -> Self {
        let config = match params.mode {
            AccumulationMode::Network => TraceConfiguration::new(),
            AccumulationMode::Interlake => {
                TraceConfiguration::new().with_size_threshold_stops(net, lakes, params.lake_threshold_km2)
            }
        };
        let classifier = ConnectivityClassifier::new(
            net,
            lakes,
            &ConnectivityParams {
                lake_threshold_km2: params.lake_threshold_km2,
            },
        );
        Self {
            net,
            catchments,
            engine,
            lakes,
            params,
            config,
            classifier,
            sinks: OnceLock::new(),
        }
    }

    pub fn params(&self) -> &AccumulationParams {
        &self.params
    }

    /// Upstream trace of a lake under this accumulator's mode
    pub fn trace(&self, lake_id: &str) -> Trace {
        self.net.tracer(&self.config).trace_waterbody(lake_id, Direction::Up)
    }

    fn key<'k>(&'k self, id: &'k str) -> Option<&'k str> {
        match self.params.catchment_keys {
            CatchmentKeys::Canonical => Some(id),
            CatchmentKeys::Raw => self.net.ids().raw_id(id),
        }
    }

    fn footprint(&self, lake_id: &str) -> Option<&'a E::Polygon> {
        let catchments = self.catchments;
        self.key(lake_id).and_then(|k| catchments.footprint(k))
    }

    /// Dissolve the catchments of `ids`; `None` when no catchment matches.
    fn dissolve_ids<'i, I>(&self, ids: I) -> Result<Option<E::Polygon>>
    where
        I: IntoIterator<Item = &'i str>,
    {
        let parts: Vec<&E::Polygon> = ids
            .into_iter()
            .filter_map(|id| self.key(id).and_then(|k| self.catchments.catchment(k)))
            .collect();
        if parts.is_empty() {
            return Ok(None);
        }
        self.engine.dissolve(&parts).map(Some)
    }

    /// Off-network sink basins, computed once per accumulator
    fn sinks(&self) -> &[SinkRegion<E::Polygon>] {
        self.sinks.get_or_init(|| {
            sink_regions(
                self.net,
                self.lakes,
                &self.classifier,
                self.params.lake_threshold_km2,
                self.engine,
                |ids| self.dissolve_ids(ids.iter().map(String::as_str)),
            )
        })
    }

    fn draft(&self, lake_id: &str) -> Result<Draft<E::Polygon>> {
        if !self.net.has_waterbody(lake_id) {
            return Err(Error::MissingFeature(lake_id.to_string()));
        }
        let trace = self.trace(lake_id);
        let ids = trace.ids(self.net);
        let own = self.net.ids().segments_of(lake_id);
        let includes_inlet = self
            .net
            .subregion_inlets()
            .iter()
            .any(|s| trace.segments.contains(s));
        let grew = trace.segments.len() > own.len() || trace.waterbodies.len() > 1 || !trace.barriers.is_empty();

        let merged = self
            .dissolve_ids(ids.iter().map(String::as_str))?
            .ok_or_else(|| Error::MissingCatchment(lake_id.to_string()))?;

        if !grew {
            return Ok(Draft {
                lake_id: lake_id.to_string(),
                polygon: merged,
                subtype: WatershedSubtype::LocalCatchment,
                includes_inlet,
                trace_size: ids.len(),
            });
        }

        let mut polygon = self.engine.fill_holes(&merged)?;
        let subtype = match self.params.mode {
            AccumulationMode::Network => WatershedSubtype::Network,
            AccumulationMode::Interlake => {
                for region in self.sinks() {
                    if !region.ids.contains(lake_id) {
                        debug!("lake {}: erasing sink region of lake {}", lake_id, region.lake_id);
                        polygon = self.engine.erase(&polygon, &region.polygon)?;
                    }
                }
                let ids_map = self.net.ids();
                for &barrier in &trace.barriers {
                    let barrier_id = ids_map.waterbody_id(barrier);
                    let barrier_catchment = self.key(barrier_id).and_then(|k| self.catchments.catchment(k));
                    for part in [barrier_catchment, self.footprint(barrier_id)].into_iter().flatten() {
                        polygon = self.engine.erase(&polygon, part)?;
                    }
                }
                WatershedSubtype::Interlake
            }
        };

        debug!(
            "lake {}: {} trace ids, {} barriers, {}",
            lake_id,
            ids.len(),
            trace.barriers.len(),
            subtype
        );
        Ok(Draft {
            lake_id: lake_id.to_string(),
            polygon,
            subtype,
            includes_inlet,
            trace_size: ids.len(),
        })
    }

    fn erase_own_footprint(&self, lake_id: &str, polygon: &E::Polygon) -> Result<E::Polygon> {
        match self.footprint(lake_id) {
            Some(fp) => self.engine.erase(polygon, fp),
            None => {
                if self.catchments.has_footprints() {
                    warn!("no footprint for lake {}, footprint erase skipped", lake_id);
                }
                Ok(polygon.clone())
            }
        }
    }

    fn finish(&self, draft: Draft<E::Polygon>, polygon: E::Polygon) -> AccumulatedWatershed<E::Polygon> {
        AccumulatedWatershed {
            area: self.engine.area(&polygon),
            lake_id: draft.lake_id,
            polygon,
            mode: self.params.mode,
            subtype: draft.subtype,
            includes_subregion_inlet: draft.includes_inlet,
            equals_network_watershed: None,
            trace_size: draft.trace_size,
        }
    }

    /// Accumulated watershed of one lake.
    ///
    /// Fails with `MissingFeature` for a lake outside this subregion and
    /// `MissingCatchment` when none of its trace ids has a catchment.
    pub fn accumulate(&self, lake_id: &str) -> Result<AccumulatedWatershed<E::Polygon>> {
        let draft = self.draft(lake_id)?;
        let polygon = self.erase_own_footprint(lake_id, &draft.polygon)?;
        Ok(self.finish(draft, polygon))
    }

    /// Accumulate every lake of the population.
    pub fn accumulate_all(&self) -> BatchReport<E::Polygon> {
        let ids: Vec<String> = self.lakes.ids().map(String::from).collect();
        self.accumulate_batch(&ids)
    }

    /// Accumulate a batch of lakes.
    ///
    /// Ids not in this subregion are skipped; a lake whose geometry fails is
    /// reported and the batch continues. Lakes needing no accumulation go
    /// through one shared footprint-erase pass, followed by island repair.
    pub fn accumulate_batch(&self, lake_ids: &[String]) -> BatchReport<E::Polygon> {
        let mut report = BatchReport::new(self.params.mode);

        let (present, skipped): (Vec<&str>, Vec<&str>) = lake_ids
            .iter()
            .map(String::as_str)
            .partition(|id| self.net.has_waterbody(id));
        report.skipped = skipped.into_iter().map(String::from).collect();

        if self.params.mode == AccumulationMode::Interlake {
            // Build the shared sink regions before fanning out
            let _ = self.sinks();
        }

        let drafts = self.params.processing.par_map(0..present.len(), |i| self.draft(present[i]));

        let mut accumulated = Vec::new();
        let mut singles = Vec::new();
        for (id, draft) in present.iter().zip(drafts) {
            match draft {
                Ok(d) if d.subtype == WatershedSubtype::LocalCatchment => singles.push(d),
                Ok(d) => accumulated.push(d),
                Err(e) => {
                    warn!("lake {}: {}", id, e);
                    report.failed.push((id.to_string(), e.to_string()));
                }
            }
        }

        let erased = self.params.processing.par_map(0..accumulated.len(), |i| {
            let d = &accumulated[i];
            self.erase_own_footprint(&d.lake_id, &d.polygon)
        });
        for (draft, result) in accumulated.into_iter().zip(erased) {
            self.record(&mut report, draft, result);
        }

        self.single_catchment_pass(singles, &present, &mut report);

        report.watersheds.sort_by(|a, b| a.lake_id.cmp(&b.lake_id));
        report
    }

    fn record(&self, report: &mut BatchReport<E::Polygon>, draft: Draft<E::Polygon>, result: Result<E::Polygon>) {
        match result {
            Ok(p) if self.engine.is_empty(&p) => report.empty.push(draft.lake_id),
            Ok(p) => report.watersheds.push(self.finish(draft, p)),
            Err(e) => {
                warn!("lake {}: {}", draft.lake_id, e);
                report.failed.push((draft.lake_id, e.to_string()));
            }
        }
    }

    /// Erase the batch lakes' hole-free footprints from every single-catchment
    /// watershed at once, then repair island lakes that came out empty.
    fn single_catchment_pass(&self, singles: Vec<Draft<E::Polygon>>, batch: &[&str], report: &mut BatchReport<E::Polygon>) {
        if singles.is_empty() {
            return;
        }
        let expected = singles.len();

        let holeless: Vec<(String, E::Polygon)> = batch
            .iter()
            .filter_map(|&id| {
                let fp = self.footprint(id)?;
                match self.engine.fill_holes(fp) {
                    Ok(p) => Some((id.to_string(), p)),
                    Err(e) => {
                        warn!("footprint of lake {} unusable: {}", id, e);
                        None
                    }
                }
            })
            .collect();

        let eraser = if holeless.is_empty() {
            None
        } else {
            let parts: Vec<&E::Polygon> = holeless.iter().map(|(_, p)| p).collect();
            match self.engine.dissolve(&parts) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("batch footprint union failed ({}), erasing footprints per lake", e);
                    None
                }
            }
        };

        let results = self.params.processing.par_map(0..singles.len(), |i| {
            let d = &singles[i];
            match &eraser {
                Some(all) => self.engine.erase(&d.polygon, all),
                None => self.erase_own_footprint(&d.lake_id, &d.polygon),
            }
        });

        let mut vanished = Vec::new();
        let mut produced = 0_usize;
        for (draft, result) in singles.into_iter().zip(results) {
            match result {
                Ok(p) if self.engine.is_empty(&p) => vanished.push(draft),
                Ok(p) => {
                    produced += 1;
                    report.watersheds.push(self.finish(draft, p));
                }
                Err(e) => {
                    warn!("lake {}: {}", draft.lake_id, e);
                    report.failed.push((draft.lake_id, e.to_string()));
                }
            }
        }

        if produced == expected {
            return;
        }
        info!(
            "{} of {} single-catchment watersheds produced, checking for island lakes",
            produced, expected
        );
        for draft in vanished {
            self.repair(draft, &holeless, report);
        }
    }

    fn repair(&self, mut draft: Draft<E::Polygon>, holeless: &[(String, E::Polygon)], report: &mut BatchReport<E::Polygon>) {
        let own = self.footprint(&draft.lake_id);
        let inner = own.unwrap_or(&draft.polygon);
        let Some(enclosing) = enclosing_lake(self.engine, &draft.lake_id, inner, holeless) else {
            report.empty.push(draft.lake_id);
            return;
        };
        let Some(enclosing_fp) = self.footprint(enclosing) else {
            report.empty.push(draft.lake_id);
            return;
        };
        debug!("lake {} is an island in lake {}", draft.lake_id, enclosing);

        let result = repair_island(self.engine, &draft.polygon, enclosing_fp, own);
        if matches!(&result, Ok(p) if !self.engine.is_empty(p)) {
            report.islands.push(draft.lake_id.clone());
            draft.subtype = WatershedSubtype::Island;
        }
        self.record(report, draft, result);
    }
}
