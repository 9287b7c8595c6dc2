//! Records read once per hydrologic subregion
//!
//! These are the plain rows handed over by the table readers (or built in
//! memory by callers). They carry external string ids; the flow graph
//! interns them into dense indices when it is built.

use serde::{Deserialize, Serialize};

/// Id used in flow tables for "no segment": a `from` sentinel marks a
/// network source, a `to` sentinel marks terminal outflow.
pub const SENTINEL_ID: &str = "0";

/// One row of the flow relation table: water moves from `from_id` to `to_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowRow {
    pub from_id: String,
    pub to_id: String,
}

impl FlowRow {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
        }
    }
}

/// A flowline segment as listed in the segment table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Canonical segment id (the key used by the flow table)
    pub id: String,
    /// Associated waterbody attribute (canonical or raw waterbody id), if any
    pub waterbody_id: Option<String>,
    /// Intermittent or ephemeral flow
    pub intermittent: bool,
    /// Raw source id (e.g. a permanent identifier), if the source carries one
    pub source_id: Option<String>,
}

impl SegmentRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            waterbody_id: None,
            intermittent: false,
            source_id: None,
        }
    }

    /// Attach the segment to a waterbody.
    pub fn in_waterbody(mut self, waterbody_id: impl Into<String>) -> Self {
        self.waterbody_id = Some(waterbody_id.into());
        self
    }

    /// Mark the segment as intermittent.
    pub fn intermittent(mut self) -> Self {
        self.intermittent = true;
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}

/// A polygon-backed waterbody (lake, pond, reservoir, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waterbody {
    pub id: String,
    /// Surface area in km²
    pub area_km2: f64,
    /// NHD feature code (type code)
    pub fcode: u32,
    /// Raw source id, if the source carries one
    pub source_id: Option<String>,
}

impl Waterbody {
    pub fn new(id: impl Into<String>, area_km2: f64, fcode: u32) -> Self {
        Self {
            id: id.into(),
            area_km2,
            fcode,
            source_id: None,
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}
