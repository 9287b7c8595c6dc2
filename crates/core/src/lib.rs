//! # lagosnet Core
//!
//! Core types, traits and I/O for the lagosnet hydrologic network library.
//!
//! This crate provides:
//! - `FlowRow`, `SegmentRecord`, `Waterbody`: records read once per subregion
//! - `GeometryEngine`: the polygon collaborator the watershed accumulator calls into
//! - `CatchmentStore`: local catchments and lake footprints keyed by feature id
//! - I/O for flow/segment/waterbody tables (CSV) and polygons (GeoJSON)

pub mod error;
pub mod geometry;
pub mod io;
pub mod model;
pub mod vector;

pub use error::{Error, Result};
pub use geometry::{CatchmentStore, GeometryEngine};
pub use model::{FlowRow, SegmentRecord, Waterbody, SENTINEL_ID};

/// Common trait for table-driven algorithms with a parameter struct
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::Algorithm;
    pub use crate::error::{Error, Result};
    pub use crate::geometry::{CatchmentStore, GeometryEngine};
    pub use crate::model::{FlowRow, SegmentRecord, Waterbody, SENTINEL_ID};
}
