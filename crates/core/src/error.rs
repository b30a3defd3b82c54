//! Error types for dkrige

use thiserror::Error;

/// Main error type for detrended kriging operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Regression impossible: all independent-variable values are equal")]
    DegenerateIndependentVariable,

    #[error("Regression impossible: all x and y values are equal (y = {value})")]
    AllValuesEqual { value: f64 },

    #[error("Insufficient data: {required} points required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("Singular kriging system (cell {cell:?})")]
    SingularSystem { cell: Option<usize> },

    #[error("Insufficient stations: {available} reporting, at least 2 required")]
    InsufficientStations { available: usize },

    #[error("Capacity exceeded: {requested} {what} requested, limit is {limit}")]
    CapacityExceeded {
        what: &'static str,
        requested: usize,
        limit: usize,
    },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a period regression failing with this error is recovered
    /// locally (span marked invalid) instead of aborting the run.
    pub fn is_degenerate_fit(&self) -> bool {
        matches!(
            self,
            Error::DegenerateIndependentVariable
                | Error::AllValuesEqual { .. }
                | Error::InsufficientData { .. }
                | Error::Algorithm(_)
        )
    }
}

/// Result type alias for dkrige operations
pub type Result<T> = std::result::Result<T, Error>;
