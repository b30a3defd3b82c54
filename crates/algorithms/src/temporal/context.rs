//! Run-level context: configuration, calendar, stations and cells

use dkrige_core::{CellTable, Error, Limits, Result, RunConfig, Station, Timeline};
use ndarray::Array2;

/// Everything one run reads and mutates.
///
/// Station series are residualized in place while the run proceeds.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub(crate) config: RunConfig,
    pub(crate) timeline: Timeline,
    pub(crate) stations: Vec<Station>,
    pub(crate) cells: CellTable,
    pub(crate) weights: Option<Array2<f64>>,
}

impl RunContext {
    /// Validate the configuration, capacity limits and series shapes
    pub fn new(config: RunConfig, timeline: Timeline, stations: Vec<Station>, cells: CellTable) -> Result<Self> {
        config.validate()?;
        let limits = &config.limits;
        Limits::check("stations", stations.len(), limits.max_stations)?;
        Limits::check("cells", cells.len(), limits.max_cells)?;
        Limits::check("zones", cells.zones().len(), limits.max_zones)?;
        Limits::check("steps per year", timeline.steps_per_year(), limits.max_steps_per_year)?;

        if stations.is_empty() {
            return Err(Error::InsufficientStations { available: 0 });
        }
        let expected = (timeline.n_years(), timeline.steps_per_year());
        for station in &stations {
            let actual = station.series.shape();
            if actual != expected {
                return Err(Error::SizeMismatch {
                    er: expected.0,
                    ec: expected.1,
                    ar: actual.0,
                    ac: actual.1,
                });
            }
        }

        Ok(Self {
            config,
            timeline,
            stations,
            cells,
            weights: None,
        })
    }

    /// Use pre-computed weights (cells × stations) instead of solving
    pub fn with_weights(mut self, weights: Array2<f64>) -> Result<Self> {
        let expected = (self.cells.len(), self.stations.len());
        if weights.dim() != expected {
            return Err(Error::SizeMismatch {
                er: expected.0,
                ec: expected.1,
                ar: weights.nrows(),
                ac: weights.ncols(),
            });
        }
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Station records; residualized after a run
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn cells(&self) -> &CellTable {
        &self.cells
    }

    pub fn weights(&self) -> Option<&Array2<f64>> {
        self.weights.as_ref()
    }
}
