//! Per-step interpolation of residuals onto the cells

use super::detrend::TrendModel;
use crate::kriging::{solve_weights, weighted_sum, StationGeometry, WeightTable};
use crate::maybe_rayon::*;
use dkrige_core::{CellTable, DataKind, Error, Result, SingularPolicy, Station, TimeIndex};
use ndarray::ArrayView1;
use tracing::{debug, warn};

/// Where weights come from when some stations are missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSource {
    /// Solve a kriging system over the reporting stations
    Kriging,
    /// `1/ns` for each of the `ns` reporting stations
    Equal,
    /// Supplied weights renormalized over the reporting stations
    Supplied,
}

/// Interpolates one time step at a time; the all-stations weight table is
/// shared across steps.
pub struct StepInterpolator<'a> {
    pub geometry: &'a StationGeometry,
    pub cells: &'a CellTable,
    pub table: &'a WeightTable,
    pub source: WeightSource,
    pub kind: DataKind,
    pub policy: SingularPolicy,
}

impl StepInterpolator<'_> {
    /// Cell values for step `t` (NaN where a cell has no value), or `None`
    /// when fewer than two stations report.
    pub fn interpolate(&self, stations: &[Station], t: TimeIndex, model: &TrendModel) -> Result<Option<Vec<f64>>> {
        let mut residuals = vec![0.0; stations.len()];
        let mut reporting = Vec::with_capacity(stations.len());
        for (s, station) in stations.iter().enumerate() {
            if let Some(v) = station.reading(t).observed() {
                residuals[s] = v;
                reporting.push(s);
            }
        }

        if reporting.len() <= 1 {
            debug!(?t, reporting = reporting.len(), "too few reporting stations, step skipped");
            return Ok(None);
        }
        let complete = reporting.len() == stations.len();

        let values = (0..self.cells.len())
            .into_par_iter()
            .map(|i| self.cell_value(i, &residuals, &reporting, complete, model))
            .collect::<Result<Vec<f64>>>()?;
        Ok(Some(values))
    }

    fn cell_value(
        &self,
        i: usize,
        residuals: &[f64],
        reporting: &[usize],
        complete: bool,
        model: &TrendModel,
    ) -> Result<f64> {
        let cell = &self.cells.cells()[i];
        if !cell.usable {
            return Ok(f64::NAN);
        }
        if !model.covers(cell.elevation) {
            return Ok(0.0);
        }

        let residual = if complete {
            match self.table.row(i) {
                Some(w) => w.dot(&ArrayView1::from(residuals)),
                None => return Ok(f64::NAN),
            }
        } else {
            match self.partial_residual(i, residuals, reporting)? {
                Some(r) => r,
                None => return Ok(f64::NAN),
            }
        };

        let value = model.retrend(cell.elevation, residual);
        Ok(if self.kind.is_non_negative() {
            value.max(0.0)
        } else {
            value
        })
    }

    fn partial_residual(&self, i: usize, residuals: &[f64], reporting: &[usize]) -> Result<Option<f64>> {
        let equal = || reporting.iter().map(|&s| residuals[s]).sum::<f64>() / reporting.len() as f64;

        match self.source {
            WeightSource::Equal => Ok(Some(equal())),
            WeightSource::Supplied => Ok(self.table.row(i).map(|w| {
                let total: f64 = reporting.iter().map(|&s| w[s]).sum();
                if total > 0.0 {
                    reporting.iter().map(|&s| w[s] * residuals[s]).sum::<f64>() / total
                } else {
                    equal()
                }
            })),
            WeightSource::Kriging => {
                let target = self.geometry.target_distances(self.cells.cells()[i].location);
                match solve_weights(self.geometry, reporting, &target) {
                    Ok(w) => Ok(Some(weighted_sum(&w, residuals))),
                    Err(Error::SingularSystem { .. }) if self.policy == SingularPolicy::SkipCell => {
                        warn!(cell = i, "singular kriging system, cell skipped");
                        Ok(None)
                    }
                    Err(Error::SingularSystem { .. }) => Err(Error::SingularSystem { cell: Some(i) }),
                    Err(e) => Err(e),
                }
            }
        }
    }
}
