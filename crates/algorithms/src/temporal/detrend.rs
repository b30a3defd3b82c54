//! Elevation trends per span and residualization of station series

use super::aggregate::ZeroSteps;
use super::partition::{Span, SpanKind};
use crate::regression::{fit, FitQuality};
use dkrige_core::{DataKind, Reading, RegressionMethod, Result, Station};
use serde::Serialize;
use tracing::warn;

/// `intercept + slope * elevation`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TrendCoefficients {
    pub intercept: f64,
    pub slope: f64,
}

impl TrendCoefficients {
    pub const ZERO: Self = Self {
        intercept: 0.0,
        slope: 0.0,
    };

    pub fn new(intercept: f64, slope: f64) -> Self {
        Self { intercept, slope }
    }

    pub fn evaluate(&self, elevation: f64) -> f64 {
        self.intercept + self.slope * elevation
    }
}

/// Steep segment joining the highest zero station to the lowest nonzero
/// one; applies to cells below `top_elevation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LowerSegment {
    pub line: TrendCoefficients,
    pub top_elevation: f64,
}

/// Trend removed from stations and restored at cells
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendModel {
    /// One line at all elevations
    Uniform(TrendCoefficients),
    /// Snow water equivalent: zero at or below the snow line, the lower
    /// segment (if any) up to the lowest nonzero station, the main line
    /// above.
    SnowlineSplit {
        main: TrendCoefficients,
        lower: Option<LowerSegment>,
        snowline: f64,
    },
}

/// Main-line slopes at or below this are treated as flat when re-trending
pub const FLAT_SLOPE: f64 = 1e-7;

impl TrendModel {
    pub const ZERO: Self = TrendModel::Uniform(TrendCoefficients::ZERO);

    /// Trend subtracted from a station reading at `elevation`
    pub fn station_trend(&self, elevation: f64) -> f64 {
        match self {
            TrendModel::Uniform(line) => line.evaluate(elevation),
            TrendModel::SnowlineSplit { main, snowline, .. } => {
                if elevation <= *snowline {
                    0.0
                } else {
                    main.evaluate(elevation)
                }
            }
        }
    }

    /// Whether a cell at `elevation` takes an interpolated value; cells at
    /// or below the snow line are zero.
    pub fn covers(&self, elevation: f64) -> bool {
        match self {
            TrendModel::Uniform(_) => true,
            TrendModel::SnowlineSplit { snowline, .. } => elevation > *snowline,
        }
    }

    /// Cell value from the interpolated residual
    pub fn retrend(&self, elevation: f64, residual: f64) -> f64 {
        match self {
            TrendModel::Uniform(line) => residual + line.evaluate(elevation),
            TrendModel::SnowlineSplit { main, lower, snowline } => {
                if elevation <= *snowline {
                    return 0.0;
                }
                match lower {
                    Some(seg) if elevation < seg.top_elevation => residual + seg.line.evaluate(elevation),
                    _ if main.slope > FLAT_SLOPE => residual + main.evaluate(elevation),
                    _ => residual,
                }
            }
        }
    }

    pub fn snowline(&self) -> Option<f64> {
        match self {
            TrendModel::SnowlineSplit { snowline, .. } => Some(*snowline),
            TrendModel::Uniform(_) => None,
        }
    }

    pub fn main_line(&self) -> TrendCoefficients {
        match self {
            TrendModel::Uniform(line) => *line,
            TrendModel::SnowlineSplit { main, .. } => *main,
        }
    }
}

/// Result of fitting one span
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendOutcome {
    Fitted {
        model: TrendModel,
        quality: FitQuality,
        /// The fitted slope had the wrong physical sign and was zeroed
        sign_overridden: bool,
    },
    /// No trend could be fitted; the span produces no values
    Invalid { reason: String },
}

impl TrendOutcome {
    pub(crate) fn zero() -> Self {
        TrendOutcome::Fitted {
            model: TrendModel::ZERO,
            quality: FitQuality::NotFitted,
            sign_overridden: false,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        TrendOutcome::Invalid { reason: reason.into() }
    }

    pub fn model(&self) -> Option<&TrendModel> {
        match self {
            TrendOutcome::Fitted { model, .. } => Some(model),
            TrendOutcome::Invalid { .. } => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.model().is_some()
    }
}

/// Trend outcome and the number of stations that entered the regression
#[derive(Debug, Clone, PartialEq)]
pub struct SpanFit {
    pub outcome: TrendOutcome,
    pub points: usize,
}

/// Fit a single line to the span means.
///
/// Fixed periods regress every station with a mean (precipitation only
/// those with a positive mean): no point is invalid, one point gives a
/// zero trend. Storms need two points. Isolated and quiet spans carry a
/// zero trend. Slopes of the wrong physical sign are zeroed.
pub fn fit_uniform(
    kind: DataKind,
    method: RegressionMethod,
    span: &Span,
    elevations: &[f64],
    means: &[Option<f64>],
) -> Result<SpanFit> {
    if !span.is_fitted() {
        return Ok(SpanFit {
            outcome: TrendOutcome::zero(),
            points: 0,
        });
    }

    let positive_only = span.kind == SpanKind::Period && kind == DataKind::Precipitation;
    let (x, y): (Vec<f64>, Vec<f64>) = elevations
        .iter()
        .zip(means)
        .filter_map(|(&e, m)| m.map(|m| (e, m)))
        .filter(|&(_, m)| !positive_only || m > 0.0)
        .unzip();
    let points = x.len();

    let outcome = match (span.kind, points) {
        (SpanKind::Storm, 0..=1) | (_, 0) => TrendOutcome::invalid(format!("{} regression points", points)),
        (_, 1) => TrendOutcome::zero(),
        _ => match fit(method, &x, &y) {
            Ok(line) if kind.contradicts_slope(line.slope) => {
                warn!(
                    start = ?span.start(),
                    slope = line.slope,
                    "slope contradicts expected sign, trend set to zero"
                );
                TrendOutcome::Fitted {
                    model: TrendModel::ZERO,
                    quality: FitQuality::NotFitted,
                    sign_overridden: true,
                }
            }
            Ok(line) => TrendOutcome::Fitted {
                model: TrendModel::Uniform(TrendCoefficients::new(line.intercept, line.slope)),
                quality: line.quality,
                sign_overridden: false,
            },
            Err(e) if e.is_degenerate_fit() => TrendOutcome::invalid(e.to_string()),
            Err(e) => return Err(e),
        },
    };

    Ok(SpanFit { outcome, points })
}

/// Subtract the trend from every observed reading of the span, zero steps
/// excepted.
pub fn residualize(stations: &mut [Station], span: &Span, model: &TrendModel, zero: &ZeroSteps) {
    for station in stations.iter_mut() {
        let trend = model.station_trend(station.elevation);
        if trend == 0.0 {
            continue;
        }
        for &t in &span.steps {
            if zero.contains(t) {
                continue;
            }
            if let Reading::Observed(v) = station.reading(t) {
                station.series.set(t, Reading::Observed(v - trend));
            }
        }
    }
}
