//! # dkrige Algorithms
//!
//! Numerical engine for detrended kriging.
//!
//! ## Components
//!
//! - **geometry**: station and cell distances (planar or latitude/longitude
//!   lookup tables)
//! - **regression**: least squares and least absolute deviation fits of
//!   value on elevation
//! - **kriging**: linear-semivariogram weight solver with negative-weight
//!   station exclusion, and the all-stations weight table
//! - **temporal**: period and storm partitioning, detrending, per-step
//!   interpolation, areal and zonal means

pub mod geometry;
pub mod kriging;
mod maybe_rayon;
pub mod regression;
pub mod temporal;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::geometry::{distance, distance_matrix};
    pub use crate::kriging::{solve_weights, StationGeometry, WeightTable};
    pub use crate::regression::{
        fit, least_absolute_deviation, least_squares, ElevationRegression, FitQuality, LinearFit,
        RegressionParams,
    };
    pub use crate::temporal::{
        run, CollectingSink, DetrendedKriging, DetrendedKrigingParams, RunContext, RunOutput, RunSummary,
        StepResult, StepSink, TrendModel, TrendOutcome,
    };
    pub use dkrige_core::prelude::*;
}
