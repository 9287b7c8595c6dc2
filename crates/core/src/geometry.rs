//! Geometry collaborator interface and catchment storage
//!
//! Polygon algorithms (union, erase, hole removal, area, containment) are
//! not implemented by the network code itself. The watershed accumulator
//! talks to them through [`GeometryEngine`], so any backend that can
//! perform those five operations can drive an accumulation run.

use std::collections::HashMap;

use crate::error::Result;

/// Polygon operations consumed by the watershed accumulator.
///
/// Implementations must be shareable across worker threads: a batch may be
/// processed in parallel with one engine reference per worker.
pub trait GeometryEngine: Send + Sync {
    /// Polygon handle (possibly multi-part) produced and consumed by the engine
    type Polygon: Clone + Send + Sync;

    /// Union/dissolve many polygons into one feature.
    fn dissolve(&self, parts: &[&Self::Polygon]) -> Result<Self::Polygon>;

    /// Polygon difference: `target` minus `eraser`.
    fn erase(&self, target: &Self::Polygon, eraser: &Self::Polygon) -> Result<Self::Polygon>;

    /// Remove every interior ring.
    fn fill_holes(&self, polygon: &Self::Polygon) -> Result<Self::Polygon>;

    /// Planar area in CRS units squared.
    fn area(&self, polygon: &Self::Polygon) -> f64;

    /// Point-in-polygon containment: true if a point inside `inner` lies inside `outer`.
    fn encloses(&self, outer: &Self::Polygon, inner: &Self::Polygon) -> bool;

    /// True if the polygon has no area left.
    fn is_empty(&self, polygon: &Self::Polygon) -> bool {
        self.area(polygon) <= 0.0
    }
}

/// Local catchment polygons and lake footprints keyed by feature id.
///
/// Local catchments are the pre-delineated drainage areas keyed by segment or
/// waterbody id. Footprints are the lake polygons themselves, keyed by
/// waterbody id.
#[derive(Debug, Clone)]
pub struct CatchmentStore<P> {
    catchments: HashMap<String, P>,
    footprints: HashMap<String, P>,
}

impl<P> Default for CatchmentStore<P> {
    fn default() -> Self {
        Self {
            catchments: HashMap::new(),
            footprints: HashMap::new(),
        }
    }
}

impl<P> CatchmentStore<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already keyed polygon maps.
    pub fn from_maps(catchments: HashMap<String, P>, footprints: HashMap<String, P>) -> Self {
        Self { catchments, footprints }
    }

    pub fn insert_catchment(&mut self, id: impl Into<String>, polygon: P) {
        self.catchments.insert(id.into(), polygon);
    }

    pub fn insert_footprint(&mut self, id: impl Into<String>, polygon: P) {
        self.footprints.insert(id.into(), polygon);
    }

    pub fn catchment(&self, id: &str) -> Option<&P> {
        self.catchments.get(id)
    }

    pub fn footprint(&self, id: &str) -> Option<&P> {
        self.footprints.get(id)
    }

    pub fn has_catchment(&self, id: &str) -> bool {
        self.catchments.contains_key(id)
    }

    /// Capability check: were any lake footprints supplied at all?
    pub fn has_footprints(&self) -> bool {
        !self.footprints.is_empty()
    }

    /// All catchments whose key is in `ids`, in iteration order of `ids`.
    pub fn select<'a, I>(&self, ids: I) -> Vec<&P>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter().filter_map(|id| self.catchments.get(id)).collect()
    }

    /// Iterate over `(waterbody id, footprint)` pairs.
    pub fn footprints(&self) -> impl Iterator<Item = (&str, &P)> {
        self.footprints.iter().map(|(id, p)| (id.as_str(), p))
    }

    pub fn catchment_count(&self) -> usize {
        self.catchments.len()
    }

    pub fn footprint_count(&self) -> usize {
        self.footprints.len()
    }
}
