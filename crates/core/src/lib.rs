//! # dkrige Core
//!
//! Core types and traits for detrended kriging of station observations
//! onto elevation grids.
//!
//! This crate provides:
//! - `Station`, `Series` and `Reading`: station records and their dense
//!   `(year, step)` observation tables, with missing/accumulation decoding
//! - `Timeline`: the year/step calendar shared by all series
//! - `CellTable`: target grid cells with mask and zone narrowing
//! - `RunConfig`: serde-backed run configuration
//! - `Raster<T>` and `GeoTransform` for building cell tables from grids and
//!   reshaping per-cell output
//! - Algorithm traits for consistent API

pub mod cells;
pub mod config;
pub mod error;
pub mod raster;
pub mod station;
pub mod timeline;

pub use cells::{CellTable, GridCell, Overlays, ZoneSummary};
pub use config::{
    Aggregation, CoordinateSystem, DataKind, Limits, RegressionMethod, RunConfig, SingularPolicy,
    StormRule, WeightingMethod,
};
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use station::{Location, Reading, Series, Station};
pub use timeline::{TimeIndex, Timeline, YearSpan};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cells::{CellTable, GridCell, Overlays};
    pub use crate::config::{DataKind, RunConfig};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::station::{Location, Reading, Series, Station};
    pub use crate::timeline::{TimeIndex, Timeline};
    pub use crate::Algorithm;
}

/// Core trait for the algorithms of dkrige.
///
/// Algorithms are pure functions that transform input data according to parameters.
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
