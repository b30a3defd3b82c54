//! Areal and zonal means of one step's cell values

use dkrige_core::CellTable;
use serde::Serialize;

/// Means of one step's field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepMeans {
    /// Mean over contributing cells; NaN when none contributed
    pub areal: f64,
    /// One mean per zone, ascending zone order
    pub zones: Vec<f64>,
}

/// Areal mean over usable cells (only masked ones with `use_mask`) and
/// per-zone means. Cells without a value (NaN) are left out of both.
pub fn step_means(cells: &CellTable, values: &[f64], use_mask: bool) -> StepMeans {
    let mut sum = 0.0;
    let mut count = 0usize;
    let mut zone_acc = vec![(0.0, 0usize); cells.zones().len()];

    for (i, (cell, &v)) in cells.cells().iter().zip(values).enumerate() {
        if !cell.usable || v.is_nan() {
            continue;
        }
        if cells.counts_toward_mean(i, use_mask) {
            sum += v;
            count += 1;
        }
        if let Some(z) = cells.zone_index(cell.zone) {
            zone_acc[z].0 += v;
            zone_acc[z].1 += 1;
        }
    }

    StepMeans {
        areal: mean(sum, count),
        zones: zone_acc.into_iter().map(|(s, n)| mean(s, n)).collect(),
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
