//! All-stations weight table

use super::{solve_weights, StationGeometry};
use crate::maybe_rayon::*;
use dkrige_core::{CellTable, Error, Result, SingularPolicy};
use ndarray::{Array2, ArrayView1};
use tracing::{info, warn};

/// Per-cell station weights for steps on which every station reports.
///
/// Rows of unusable cells, and of cells skipped under
/// [`SingularPolicy::SkipCell`], are unavailable.
#[derive(Debug, Clone)]
pub struct WeightTable {
    weights: Array2<f64>,
    available: Vec<bool>,
}

impl WeightTable {
    /// Kriging weights for every usable cell, solved in parallel
    pub fn kriging(geometry: &StationGeometry, cells: &CellTable, policy: SingularPolicy) -> Result<Self> {
        let n_sta = geometry.len();
        if n_sta == 0 {
            return Err(Error::InsufficientStations { available: 0 });
        }
        let active: Vec<usize> = (0..n_sta).collect();

        let rows: Vec<Option<Vec<f64>>> = (0..cells.len())
            .into_par_iter()
            .map(|i| {
                let cell = &cells.cells()[i];
                if !cell.usable {
                    return Ok(None);
                }
                let target = geometry.target_distances(cell.location);
                match solve_weights(geometry, &active, &target) {
                    Ok(w) => Ok(Some(w)),
                    Err(Error::SingularSystem { .. }) if policy == SingularPolicy::SkipCell => {
                        warn!(cell = i, "singular kriging system, cell skipped");
                        Ok(None)
                    }
                    Err(Error::SingularSystem { .. }) => Err(Error::SingularSystem { cell: Some(i) }),
                    Err(e) => Err(e),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let table = Self::from_rows(rows, n_sta);
        info!(
            cells = table.available_count(),
            stations = n_sta,
            "computed all-stations kriging weights"
        );
        Ok(table)
    }

    /// Every station weighted `1/n` at every usable cell
    pub fn equal(cells: &CellTable, n_stations: usize) -> Result<Self> {
        if n_stations == 0 {
            return Err(Error::InsufficientStations { available: 0 });
        }
        let w = 1.0 / n_stations as f64;
        let rows = cells
            .cells()
            .iter()
            .map(|c| c.usable.then(|| vec![w; n_stations]))
            .collect();
        Ok(Self::from_rows(rows, n_stations))
    }

    /// Pre-computed weights, one row per cell and one column per station
    pub fn supplied(weights: Array2<f64>, cells: &CellTable, n_stations: usize) -> Result<Self> {
        let (rows, cols) = weights.dim();
        if rows != cells.len() || cols != n_stations {
            return Err(Error::SizeMismatch {
                er: cells.len(),
                ec: n_stations,
                ar: rows,
                ac: cols,
            });
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "weights",
                value: bad.to_string(),
                reason: "supplied weights must be finite".into(),
            });
        }
        let available = cells.cells().iter().map(|c| c.usable).collect();
        Ok(Self { weights, available })
    }

    fn from_rows(rows: Vec<Option<Vec<f64>>>, n_stations: usize) -> Self {
        let mut weights = Array2::zeros((rows.len(), n_stations));
        let mut available = vec![false; rows.len()];
        for (i, row) in rows.into_iter().enumerate() {
            if let Some(row) = row {
                for (j, w) in row.into_iter().enumerate() {
                    weights[[i, j]] = w;
                }
                available[i] = true;
            }
        }
        Self { weights, available }
    }

    /// Weights for `cell`, if it has them
    pub fn row(&self, cell: usize) -> Option<ArrayView1<'_, f64>> {
        self.available[cell].then(|| self.weights.row(cell))
    }

    pub fn n_cells(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_stations(&self) -> usize {
        self.weights.ncols()
    }

    pub fn available_count(&self) -> usize {
        self.available.iter().filter(|&&a| a).count()
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }
}
