//! Error types for lagosnet

use thiserror::Error;

/// Main error type for lagosnet operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    #[error("Missing column '{column}' in {table} table")]
    MissingColumn { table: &'static str, column: String },

    /// Malformed or inconsistent input tables. Fatal for the current subregion.
    #[error("Data error: {0}")]
    Data(String),

    /// A requested feature has no matching waterbody or segment in this subregion.
    #[error("Feature '{0}' not found in this subregion")]
    MissingFeature(String),

    #[error("No local catchment polygon for '{0}'")]
    MissingCatchment(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("{0}")]
    Other(String),
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::GeoJson(Box::new(e))
    }
}

/// Result type alias for lagosnet operations
pub type Result<T> = std::result::Result<T, Error>;
