//! Vector geometry backend
//!
//! - `GeoEngine`: dissolve, erase, hole removal, area and containment
//!   over `geo` multipolygons
//! - `BoundingBox`: envelopes for quick rejection before boolean ops

mod engine;
mod spatial;

pub use engine::GeoEngine;
pub use spatial::BoundingBox;
