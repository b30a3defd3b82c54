//! Elevation regression
//!
//! Fits `value = intercept + slope * elevation` to the period-aggregated
//! station values:
//!
//! - **Least squares**: closed-form normal equations, reporting the
//!   correlation coefficient, standard error and slope t-statistic.
//! - **Least absolute deviation**: robust fit minimizing Σ|residual|, by
//!   bracketing and bisecting the slope (see [`least_absolute_deviation`]).
//!
//! Both refuse degenerate input: when every elevation is identical the
//! slope is undefined and the fit fails with
//! [`Error::DegenerateIndependentVariable`], or with
//! [`Error::AllValuesEqual`] when the values are identical as well. The
//! latter carries the common value so a caller can substitute
//! [`LinearFit::flat`].

mod lad;
mod least_squares;

pub use lad::least_absolute_deviation;
pub use least_squares::least_squares;

use dkrige_core::{Algorithm, Error, RegressionMethod, Result};
use serde::Serialize;

/// Goodness-of-fit statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitQuality {
    LeastSquares {
        /// Correlation coefficient
        r: f64,
        standard_error: f64,
        t_statistic: f64,
    },
    LeastAbsoluteDeviation {
        mean_absolute_deviation: f64,
    },
    /// Line was not fitted (flat or overridden trend)
    NotFitted,
}

/// Fitted straight line
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    pub quality: FitQuality,
}

impl LinearFit {
    /// Zero-slope line through `value`
    pub fn flat(value: f64) -> Self {
        Self {
            intercept: value,
            slope: 0.0,
            quality: FitQuality::NotFitted,
        }
    }

    /// Evaluate the line at `x`
    pub fn evaluate(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit with the chosen method
pub fn fit(method: RegressionMethod, x: &[f64], y: &[f64]) -> Result<LinearFit> {
    match method {
        RegressionMethod::LeastSquares => least_squares(x, y),
        RegressionMethod::LeastAbsoluteDeviation => least_absolute_deviation(x, y),
    }
}

/// Fit with the chosen method, accepting identical data as a flat line
pub fn fit_or_flat(method: RegressionMethod, x: &[f64], y: &[f64]) -> Result<LinearFit> {
    match fit(method, x, y) {
        Err(Error::AllValuesEqual { value }) => Ok(LinearFit::flat(value)),
        other => other,
    }
}

fn all_equal(values: &[f64]) -> bool {
    values.iter().all(|&v| v == values[0])
}

/// Shared input checks: matching lengths, at least two points, and a
/// non-constant independent variable. Returns whether `y` is constant.
pub(crate) fn check_input(x: &[f64], y: &[f64]) -> Result<bool> {
    if x.len() != y.len() {
        return Err(Error::SizeMismatch {
            er: x.len(),
            ec: 1,
            ar: y.len(),
            ac: 1,
        });
    }
    if x.len() < 2 {
        return Err(Error::InsufficientData {
            required: 2,
            available: x.len(),
        });
    }

    let y_equal = all_equal(y);
    if all_equal(x) {
        if y_equal {
            return Err(Error::AllValuesEqual { value: y[0] });
        }
        return Err(Error::DegenerateIndependentVariable);
    }
    Ok(y_equal)
}

/// Parameters for [`ElevationRegression`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionParams {
    pub method: RegressionMethod,
}

/// Regression of values on elevation as an [`Algorithm`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ElevationRegression;

impl Algorithm for ElevationRegression {
    /// `(elevations, values)`
    type Input = (Vec<f64>, Vec<f64>);
    type Output = LinearFit;
    type Params = RegressionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ElevationRegression"
    }

    fn description(&self) -> &'static str {
        "Fit a straight line of value against elevation"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (x, y) = input;
        fit(params.method, &x, &y)
    }
}
