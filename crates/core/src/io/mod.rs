//! I/O for subregion tables and polygon layers
//!
//! - Tables (flow relation, segments, waterbodies) are read from CSV with
//!   configurable column names.
//! - Local catchments and lake footprints are read from GeoJSON, keyed by an
//!   id property; accumulated watersheds are written back as GeoJSON.

mod polygons;
mod tables;

pub use polygons::{read_polygons, read_polygons_from_str, write_polygons, write_polygons_to_string};
pub use tables::{
    normalize_id, read_flow_rows, read_flow_table, read_segment_rows, read_segment_table,
    read_waterbody_rows, read_waterbody_table, FlowColumns, SegmentColumns, WaterbodyColumns,
    INTERMITTENT_FCODES,
};
