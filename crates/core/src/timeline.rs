//! Year/step calendar of a run
//!
//! Station series are dense `(year, step)` tables. Each year carries the
//! half-open range of steps that hold data, so a record may start late in
//! its first year and end early in its last. Walking the timeline visits
//! those ranges chronologically, rolling from the last data step of one
//! year into the first data step of the next.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Position of one time step: year index into the timeline and step within
/// the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeIndex {
    pub year: usize,
    pub step: usize,
}

impl TimeIndex {
    pub fn new(year: usize, step: usize) -> Self {
        Self { year, step }
    }
}

/// Data-bearing steps of one year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSpan {
    /// Calendar label (water year, calendar year...)
    pub year: i32,
    /// First step holding data
    pub first: usize,
    /// One past the last step holding data
    pub end: usize,
}

impl YearSpan {
    pub fn len(&self) -> usize {
        self.end - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.first
    }
}

/// Calendar shared by every station series of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    steps_per_year: usize,
    years: Vec<YearSpan>,
}

impl Timeline {
    /// Create a timeline, checking every span fits in the year
    pub fn new(steps_per_year: usize, years: Vec<YearSpan>) -> Result<Self> {
        if steps_per_year == 0 {
            return Err(Error::InvalidParameter {
                name: "steps_per_year",
                value: "0".into(),
                reason: "a year needs at least one time step".into(),
            });
        }
        for span in &years {
            if span.first > span.end || span.end > steps_per_year {
                return Err(Error::InvalidParameter {
                    name: "years",
                    value: format!("{}: [{}, {})", span.year, span.first, span.end),
                    reason: format!("span must lie within 0..{}", steps_per_year),
                });
            }
        }
        Ok(Self {
            steps_per_year,
            years,
        })
    }

    /// `n_years` consecutive complete years starting at `first_year`
    pub fn complete(steps_per_year: usize, first_year: i32, n_years: usize) -> Result<Self> {
        let years = (0..n_years)
            .map(|k| YearSpan {
                year: first_year + k as i32,
                first: 0,
                end: steps_per_year,
            })
            .collect();
        Self::new(steps_per_year, years)
    }

    pub fn steps_per_year(&self) -> usize {
        self.steps_per_year
    }

    pub fn n_years(&self) -> usize {
        self.years.len()
    }

    pub fn years(&self) -> &[YearSpan] {
        &self.years
    }

    pub fn year(&self, index: usize) -> &YearSpan {
        &self.years[index]
    }

    /// Number of data-bearing steps across all years
    pub fn total_steps(&self) -> usize {
        self.years.iter().map(YearSpan::len).sum()
    }

    /// Whether `t` falls in its year's data range
    pub fn contains(&self, t: TimeIndex) -> bool {
        self.years
            .get(t.year)
            .is_some_and(|span| t.step >= span.first && t.step < span.end)
    }

    /// Chronological iterator over every data-bearing step
    pub fn iter(&self) -> impl Iterator<Item = TimeIndex> + '_ {
        self.years.iter().enumerate().flat_map(|(year, span)| {
            (span.first..span.end).map(move |step| TimeIndex::new(year, step))
        })
    }
}
