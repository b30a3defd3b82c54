//! Ordinary least squares line

use super::{check_input, FitQuality, LinearFit};
use dkrige_core::Result;

/// Least-squares line of `y` on `x`.
///
/// Standard error and t-statistic need more than two points and are
/// reported as 0 otherwise. Constant `y` gives a perfect flat fit with
/// `r = 1`.
pub fn least_squares(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    let y_equal = check_input(x, y)?;
    let n = x.len() as f64;

    let mut sx = 0.0_f64;
    let mut sy = 0.0_f64;
    let mut sxx = 0.0_f64;
    let mut sxy = 0.0_f64;
    let mut syy = 0.0_f64;

    for (&xi, &yi) in x.iter().zip(y) {
        sx += xi;
        sy += yi;
        sxx += xi * xi;
        sxy += xi * yi;
        syy += yi * yi;
    }

    let cov = n * sxy - sx * sy;
    let var_x = n * sxx - sx * sx;
    let var_y = n * syy - sy * sy;

    let slope = cov / var_x;
    let intercept = sy / n - slope * sx / n;

    if y_equal {
        return Ok(LinearFit {
            intercept,
            slope,
            quality: FitQuality::LeastSquares {
                r: 1.0,
                standard_error: 0.0,
                t_statistic: 0.0,
            },
        });
    }

    let r = cov / (var_x * var_y).sqrt();

    let (standard_error, t_statistic) = if x.len() > 2 {
        let sse: f64 = x
            .iter()
            .zip(y)
            .map(|(&xi, &yi)| {
                let err = yi - intercept - slope * xi;
                err * err
            })
            .sum();
        let se = (sse / (n - 2.0)).sqrt();
        let t = if se > 0.0 {
            (slope / se) * (var_x / n).sqrt()
        } else {
            0.0
        };
        (se, t)
    } else {
        (0.0, 0.0)
    };

    Ok(LinearFit {
        intercept,
        slope,
        quality: FitQuality::LeastSquares {
            r,
            standard_error,
            t_statistic,
        },
    })
}
