//! Island lakes: lakes sitting inside another lake's outline
//!
//! When a batch erases every lake's hole-free footprint at once, a lake on
//! an island of a larger lake loses its whole catchment. Such lakes are
//! re-derived from their own catchment minus the enclosing lake's real
//! footprint (which keeps the island hole) minus their own footprint.

use lagosnet_core::{GeometryEngine, Result};

/// Smallest other lake whose hole-free footprint encloses `inner`.
pub(crate) fn enclosing_lake<'c, E: GeometryEngine>(
    engine: &E,
    lake_id: &str,
    inner: &E::Polygon,
    holeless: &'c [(String, E::Polygon)],
) -> Option<&'c str> {
    holeless
        .iter()
        .filter(|(id, _)| id != lake_id)
        .filter(|(_, outer)| engine.encloses(outer, inner))
        .map(|(id, outer)| (id.as_str(), engine.area(outer)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Catchment minus the enclosing footprint, minus the lake's own footprint.
pub(crate) fn repair_island<E: GeometryEngine>(
    engine: &E,
    catchment: &E::Polygon,
    enclosing_footprint: &E::Polygon,
    own_footprint: Option<&E::Polygon>,
) -> Result<E::Polygon> {
    let outside = engine.erase(catchment, enclosing_footprint)?;
    match own_footprint {
        Some(fp) => engine.erase(&outside, fp),
        None => Ok(outside),
    }
}
