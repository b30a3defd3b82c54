//! Least absolute deviation line
//!
//! Minimizes Σ|yᵢ − a − b·xᵢ|. For a fixed slope `b` the optimal intercept
//! is the median of `yᵢ − b·xᵢ`; the slope is then the root of
//!
//! ```text
//! f(b) = Σ xᵢ · sign(yᵢ − a(b) − b·xᵢ)
//! ```
//!
//! Starting from the least-squares line, a probe 3σ(b) away in the
//! downhill direction is expanded by doubling until `f` changes sign, then
//! the bracket is bisected until it is narrower than 1% of σ(b).
//!
//! Reference:
//! Press, W.H., Flannery, B.P., Teukolsky, S.A. & Vetterling, W.T. (1988).
//! Numerical Recipes in C, §14.6 (medfit/rofunc). Cambridge University Press.

use super::{check_input, FitQuality, LinearFit};
use dkrige_core::{Error, Result};

/// Residuals this close to zero do not vote in `f(b)`.
const SIGN_TOLERANCE: f64 = 1e-4;

/// Upper bound on bracket doublings
const MAX_BRACKET_STEPS: usize = 64;

struct Deviation {
    intercept: f64,
    /// `f(b)`
    direction: f64,
    total_abs: f64,
}

/// Median intercept, directional derivative and total absolute deviation
/// at slope `b`. `scratch` is reused between calls.
fn deviation(x: &[f64], y: &[f64], b: f64, scratch: &mut Vec<f64>) -> Deviation {
    let n = x.len();
    scratch.clear();
    scratch.extend(x.iter().zip(y).map(|(&xi, &yi)| yi - b * xi));
    scratch.sort_by(|a, c| a.total_cmp(c));

    let lo = (n + 1) / 2 - 1;
    let hi = n + 1 - lo - 2;
    let intercept = 0.5 * (scratch[lo] + scratch[hi]);

    let mut direction = 0.0;
    let mut total_abs = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let d = yi - (intercept + b * xi);
        total_abs += d.abs();
        if d > SIGN_TOLERANCE {
            direction += xi;
        } else if d < -SIGN_TOLERANCE {
            direction -= xi;
        }
    }

    Deviation {
        intercept,
        direction,
        total_abs,
    }
}

/// Robust line of `y` on `x` minimizing the sum of absolute deviations.
///
/// The fit quality is the mean absolute deviation. When the least-squares
/// line is already exact it is returned unchanged.
pub fn least_absolute_deviation(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    check_input(x, y)?;
    let n = x.len() as f64;

    let (mut sx, mut sy, mut sxy, mut sxx) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
    for (&xi, &yi) in x.iter().zip(y) {
        sx += xi;
        sy += yi;
        sxy += xi * yi;
        sxx += xi * xi;
    }
    let del = n * sxx - sx * sx;
    let ls_intercept = (sxx * sy - sx * sxy) / del;
    let ls_slope = (n * sxy - sx * sy) / del;

    let chisq: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - (ls_intercept + ls_slope * xi);
            r * r
        })
        .sum();
    let mut sigb = (chisq / del).sqrt();

    let mut scratch = Vec::with_capacity(x.len());

    if sigb == 0.0 {
        let dev = deviation(x, y, ls_slope, &mut scratch);
        return Ok(LinearFit {
            intercept: ls_intercept,
            slope: ls_slope,
            quality: FitQuality::LeastAbsoluteDeviation {
                mean_absolute_deviation: dev.total_abs / n,
            },
        });
    }

    let mut b1 = ls_slope;
    let mut f1 = deviation(x, y, b1, &mut scratch).direction;
    let step = (3.0 * sigb).abs();
    let mut b2 = if f1 > 0.0 { b1 + step } else { b1 - step };
    let mut f2 = deviation(x, y, b2, &mut scratch).direction;

    let mut bracket_steps = 0;
    while f1 * f2 > 0.0 {
        bracket_steps += 1;
        if bracket_steps > MAX_BRACKET_STEPS {
            return Err(Error::Algorithm(format!(
                "LAD: slope not bracketed after {} doublings",
                MAX_BRACKET_STEPS
            )));
        }
        let next = 2.0 * b2 - b1;
        b1 = b2;
        f1 = f2;
        b2 = next;
        f2 = deviation(x, y, b2, &mut scratch).direction;
    }

    sigb *= 0.01;
    let mut slope = b2;
    while (b2 - b1).abs() > sigb {
        let mid = 0.5 * (b1 + b2);
        if mid == b1 || mid == b2 {
            break;
        }
        slope = mid;
        let f = deviation(x, y, mid, &mut scratch).direction;
        if f * f1 >= 0.0 {
            f1 = f;
            b1 = mid;
        } else {
            b2 = mid;
        }
    }

    let dev = deviation(x, y, slope, &mut scratch);
    Ok(LinearFit {
        intercept: dev.intercept,
        slope,
        quality: FitQuality::LeastAbsoluteDeviation {
            mean_absolute_deviation: dev.total_abs / n,
        },
    })
}
