//! Snow line split trend for snow water equivalent
//!
//! Stations are ranked by elevation. The *lowest nonzero* station is the
//! lowest one whose span mean exceeds [`SNOW_PRESENT`]; the *highest zero*
//! station is the highest station below it with a valid mean at or under
//! that threshold.
//!
//! With at least two nonzero stations from the lowest nonzero upward, the
//! main line is regressed on every valid station from the lowest nonzero
//! upward and the snow line is its x-intercept, never below the highest
//! zero station. A lower segment joins `(highest zero, 0)` to
//! `(lowest nonzero, mean)`. A negative slope is zeroed and the snow line
//! falls back to the highest zero station. With fewer nonzero stations
//! the trend is zero; with fewer than two valid stations the span is
//! invalid.

use super::detrend::{LowerSegment, SpanFit, TrendCoefficients, TrendModel, TrendOutcome};
use crate::regression::{fit, FitQuality};
use dkrige_core::{CellTable, RegressionMethod, Result};
use tracing::warn;

/// Span means above this count as snow
pub const SNOW_PRESENT: f64 = 1e-4;

pub fn fit_snowline_split(method: RegressionMethod, elevations: &[f64], means: &[Option<f64>]) -> Result<SpanFit> {
    let mut order: Vec<usize> = (0..elevations.len()).collect();
    order.sort_by(|&a, &b| elevations[a].total_cmp(&elevations[b]));

    let snowy = |s: usize| means[s].is_some_and(|m| m > SNOW_PRESENT);
    let lowest_nonzero = order.iter().position(|&s| snowy(s));
    let below = &order[..lowest_nonzero.unwrap_or(order.len())];
    let highest_zero = below.iter().rev().copied().find(|&s| means[s].is_some());
    let floor = highest_zero.map_or(f64::NEG_INFINITY, |s| elevations[s]);

    let nonzero = lowest_nonzero.map_or(0, |pos| order[pos..].iter().filter(|&&s| snowy(s)).count());
    let valid = means.iter().filter(|m| m.is_some()).count();

    let pos = match lowest_nonzero {
        Some(pos) if nonzero >= 2 => pos,
        _ if valid >= 2 => {
            return Ok(SpanFit {
                outcome: TrendOutcome::Fitted {
                    model: TrendModel::SnowlineSplit {
                        main: TrendCoefficients::ZERO,
                        lower: None,
                        snowline: floor,
                    },
                    quality: FitQuality::NotFitted,
                    sign_overridden: false,
                },
                points: valid,
            });
        }
        _ => {
            return Ok(SpanFit {
                outcome: TrendOutcome::invalid(format!("{} valid stations", valid)),
                points: valid,
            })
        }
    };

    let ln = order[pos];
    let lower = highest_zero.and_then(|hz| {
        let rise = elevations[ln] - elevations[hz];
        let mean = means[ln]?;
        (rise > 0.0).then(|| {
            let slope = mean / rise;
            LowerSegment {
                line: TrendCoefficients::new(-slope * elevations[hz], slope),
                top_elevation: elevations[ln],
            }
        })
    });

    let (x, y): (Vec<f64>, Vec<f64>) = order[pos..]
        .iter()
        .filter_map(|&s| means[s].map(|m| (elevations[s], m)))
        .unzip();
    let points = x.len();

    let line = match fit(method, &x, &y) {
        Ok(line) => line,
        Err(e) if e.is_degenerate_fit() => {
            return Ok(SpanFit {
                outcome: TrendOutcome::invalid(e.to_string()),
                points,
            })
        }
        Err(e) => return Err(e),
    };

    let outcome = if line.slope < 0.0 {
        warn!(slope = line.slope, "negative snow slope, trend set to zero");
        TrendOutcome::Fitted {
            model: TrendModel::SnowlineSplit {
                main: TrendCoefficients::ZERO,
                lower,
                snowline: floor,
            },
            quality: FitQuality::NotFitted,
            sign_overridden: true,
        }
    } else {
        let crossing = if line.slope > 0.0 {
            -line.intercept / line.slope
        } else {
            floor
        };
        TrendOutcome::Fitted {
            model: TrendModel::SnowlineSplit {
                main: TrendCoefficients::new(line.intercept, line.slope),
                lower,
                snowline: crossing.max(floor),
            },
            quality: line.quality,
            sign_overridden: false,
        }
    };

    Ok(SpanFit { outcome, points })
}

/// Percentage of mean-contributing cells lying above `snowline`
pub fn snow_covered_area(cells: &CellTable, use_mask: bool, snowline: f64) -> f64 {
    let (covered, total) = cells
        .cells()
        .iter()
        .enumerate()
        .filter(|&(i, _)| cells.counts_toward_mean(i, use_mask))
        .fold((0usize, 0usize), |(covered, total), (_, cell)| {
            (covered + usize::from(cell.elevation > snowline), total + 1)
        });
    if total == 0 {
        0.0
    } else {
        100.0 * covered as f64 / total as f64
    }
}
