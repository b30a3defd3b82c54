//! Stations and their observation series

use crate::config::DataKind;
use crate::error::{Error, Result};
use crate::timeline::{TimeIndex, Timeline};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Raw values at or above this are missing.
pub const MISSING_CODE: f64 = 9999.8;

/// Raw precipitation values strictly between this and [`MISSING_CODE`]
/// flag a step whose amount is included in the next valid reading.
pub const ACCUMULATION_CODE: f64 = 8888.7;

/// Point position.
///
/// `x` is easting (m) or longitude (decimal degrees, negative west), `y`
/// is northing (m) or latitude (decimal degrees), depending on the run's
/// [`CoordinateSystem`](crate::config::CoordinateSystem).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One entry of a station series
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Reading {
    /// Value observed on this step (after detrending: its residual)
    Observed(f64),
    /// Share of an accumulated total spread over several steps. Counts
    /// toward period aggregation but is never interpolated.
    Redistributed(f64),
    #[default]
    Missing,
}

impl Reading {
    /// Value usable for aggregation
    pub fn value(self) -> Option<f64> {
        match self {
            Reading::Observed(v) | Reading::Redistributed(v) => Some(v),
            Reading::Missing => None,
        }
    }

    /// Value usable for interpolation
    pub fn observed(self) -> Option<f64> {
        match self {
            Reading::Observed(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Reading::Missing)
    }

    /// Whether this reading is wet. Redistributed shares always are: their
    /// step was flagged as carrying precipitation.
    pub fn is_wet(self, threshold: f64) -> bool {
        match self {
            Reading::Observed(v) => v > threshold,
            Reading::Redistributed(_) => true,
            Reading::Missing => false,
        }
    }
}

/// Dense `(year, step)` table of readings
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    data: Array2<Reading>,
}

impl Series {
    pub fn new(data: Array2<Reading>) -> Self {
        Self { data }
    }

    /// Series with every entry missing, shaped for `timeline`
    pub fn missing(timeline: &Timeline) -> Self {
        Self::new(Array2::from_elem(
            (timeline.n_years(), timeline.steps_per_year()),
            Reading::Missing,
        ))
    }

    /// Plain values, `NaN` marking missing entries
    pub fn from_values(values: &Array2<f64>) -> Self {
        Self::new(values.mapv(|v| {
            if v.is_nan() {
                Reading::Missing
            } else {
                Reading::Observed(v)
            }
        }))
    }

    /// Decode raw values carrying the missing and accumulation codes.
    ///
    /// For precipitation, a run of flagged steps closed by a valid total
    /// `T` becomes `n` redistributed readings of `T / n`, the closing step
    /// included. Runs may cross year boundaries; a run closed by a missing
    /// value or by the end of the record is missing. Steps outside a year's
    /// data range are missing.
    pub fn from_coded(kind: DataKind, timeline: &Timeline, coded: &Array2<f64>) -> Result<Self> {
        let expected = (timeline.n_years(), timeline.steps_per_year());
        if coded.dim() != expected {
            let (ar, ac) = coded.dim();
            return Err(Error::SizeMismatch {
                er: expected.0,
                ec: expected.1,
                ar,
                ac,
            });
        }

        let mut series = Self::missing(timeline);
        let mut pending: Vec<TimeIndex> = Vec::new();

        for t in timeline.iter() {
            let raw = coded[[t.year, t.step]];
            if raw.is_nan() || raw >= MISSING_CODE {
                for p in pending.drain(..) {
                    series.set(p, Reading::Missing);
                }
            } else if kind.has_accumulations() && raw > ACCUMULATION_CODE {
                pending.push(t);
            } else if pending.is_empty() {
                series.set(t, Reading::Observed(raw));
            } else {
                pending.push(t);
                let share = raw / pending.len() as f64;
                for p in pending.drain(..) {
                    series.set(p, Reading::Redistributed(share));
                }
            }
        }

        Ok(series)
    }

    pub fn get(&self, t: TimeIndex) -> Reading {
        self.data[[t.year, t.step]]
    }

    pub fn set(&mut self, t: TimeIndex, reading: Reading) {
        self.data[[t.year, t.step]] = reading;
    }

    /// Shape as (years, steps per year)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array2<Reading> {
        &self.data
    }
}

/// Observation station
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    /// Elevation, in the same units as the grid cell elevations
    pub elevation: f64,
    pub location: Location,
    pub series: Series,
}

impl Station {
    pub fn new(id: impl Into<String>, elevation: f64, location: Location, series: Series) -> Self {
        Self {
            id: id.into(),
            elevation,
            location,
            series,
        }
    }

    pub fn reading(&self, t: TimeIndex) -> Reading {
        self.series.get(t)
    }
}
