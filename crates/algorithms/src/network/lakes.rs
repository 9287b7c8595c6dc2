//! Lake population filter
//!
//! Decides which waterbodies count as lakes. A waterbody qualifies when its
//! area reaches the minimum size and its FCode is on the lake allow-list, or
//! when it is a reservoir of at least 0.1 km², or when its id is forced in
//! (parity with an externally published lake census).

use lagosnet_core::{Algorithm, Error, Result, Waterbody};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Minimum lake area under the strict cutoff, km²
pub const STRICT_MIN_SIZE_KM2: f64 = 0.01;
/// Minimum lake area under the relaxed cutoff, km².
/// Absorbs area differences between coordinate systems.
pub const RELAXED_MIN_SIZE_KM2: f64 = 0.009;
/// Minimum area for reservoir FCodes, km²
pub const RESERVOIR_MIN_SIZE_KM2: f64 = 0.1;

/// Lake/pond FCodes plus the reservoir codes accepted at the normal size cutoff
pub const LAKE_FCODES: [u32; 13] = [
    39000, 39004, 39009, 39010, 39011, 39012, 43600, 43613, 43615, 43617, 43618, 43619, 43621,
];

/// Reservoir FCodes accepted only at [`RESERVOIR_MIN_SIZE_KM2`] or larger
pub const RESERVOIR_FCODES: [u32; 13] = [
    43601, 43603, 43604, 43605, 43606, 43607, 43608, 43609, 43610, 43611, 43612, 43614, 43626,
];

/// Parameters for the lake population filter
#[derive(Debug, Clone)]
pub struct LakeFilterParams {
    /// Use the 0.01 km² cutoff instead of 0.009 km²
    pub strict_min_size: bool,
    /// Waterbody ids included regardless of size and type
    pub force_include: HashSet<String>,
    pub allowed_fcodes: Vec<u32>,
    pub reservoir_fcodes: Vec<u32>,
    pub reservoir_min_km2: f64,
}

impl Default for LakeFilterParams {
    fn default() -> Self {
        Self {
            strict_min_size: false,
            force_include: HashSet::new(),
            allowed_fcodes: LAKE_FCODES.to_vec(),
            reservoir_fcodes: RESERVOIR_FCODES.to_vec(),
            reservoir_min_km2: RESERVOIR_MIN_SIZE_KM2,
        }
    }
}

impl LakeFilterParams {
    pub fn min_size_km2(&self) -> f64 {
        if self.strict_min_size {
            STRICT_MIN_SIZE_KM2
        } else {
            RELAXED_MIN_SIZE_KM2
        }
    }

    fn qualifies(&self, wb: &Waterbody) -> bool {
        if self.force_include.contains(&wb.id) {
            return true;
        }
        if wb.area_km2 >= self.min_size_km2() && self.allowed_fcodes.contains(&wb.fcode) {
            return true;
        }
        wb.area_km2 >= self.reservoir_min_km2 && self.reservoir_fcodes.contains(&wb.fcode)
    }
}

/// Eligible lakes: lake id -> area in km², ordered by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LakePopulation {
    areas: BTreeMap<String, f64>,
}

impl LakePopulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, area_km2: f64) {
        self.areas.insert(id.into(), area_km2);
    }

    pub fn area(&self, id: &str) -> Option<f64> {
        self.areas.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.areas.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.areas.iter().map(|(id, &a)| (id.as_str(), a))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.areas.keys().map(String::as_str)
    }

    /// Ids of lakes at least `threshold_km2` in area (the "10-hectare" lakes at 0.1)
    pub fn at_least(&self, threshold_km2: f64) -> BTreeSet<String> {
        self.areas
            .iter()
            .filter(|(_, &a)| a >= threshold_km2)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl FromIterator<(String, f64)> for LakePopulation {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self {
            areas: iter.into_iter().collect(),
        }
    }
}

/// Select the lake population from a waterbody table.
///
/// Returns a fresh mapping on every call. Forced ids that are not in the
/// table cannot be given an area and are left out.
pub fn define_lakes(waterbodies: &[Waterbody], params: &LakeFilterParams) -> LakePopulation {
    let lakes: LakePopulation = waterbodies
        .iter()
        .filter(|wb| params.qualifies(wb))
        .map(|wb| (wb.id.clone(), wb.area_km2))
        .collect();

    let missing_forced = params
        .force_include
        .iter()
        .filter(|id| !lakes.contains(id))
        .count();
    if missing_forced > 0 {
        debug!("{} forced lake ids are not in this waterbody table", missing_forced);
    }
    debug!(
        "lake population: {} of {} waterbodies (min size {} km²)",
        lakes.len(),
        waterbodies.len(),
        params.min_size_km2()
    );
    lakes
}

/// Lake population filter as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct LakePopulationFilter;

impl Algorithm for LakePopulationFilter {
    type Input = Vec<Waterbody>;
    type Output = LakePopulation;
    type Params = LakeFilterParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Lake Population"
    }

    fn description(&self) -> &'static str {
        "Select waterbodies that qualify as lakes by size and FCode"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        if params.reservoir_min_km2.is_nan() || params.reservoir_min_km2 < 0.0 {
            return Err(Error::InvalidParameter {
                name: "reservoir_min_km2",
                value: params.reservoir_min_km2.to_string(),
                reason: "must be a non-negative area".to_string(),
            });
        }
        Ok(define_lakes(&input, &params))
    }
}
