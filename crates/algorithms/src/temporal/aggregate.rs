//! Station aggregation over spans, and zero-step detection

use super::partition::{Span, SpanKind};
use dkrige_core::{DataKind, Reading, Station, TimeIndex, Timeline};
use ndarray::Array2;

/// Whether `t` is a zero step: at least one station reports and every
/// report is an observation at or below `threshold`.
pub fn is_zero_step(stations: &[Station], t: TimeIndex, threshold: f64) -> bool {
    let mut reported = false;
    for station in stations {
        match station.reading(t) {
            Reading::Observed(v) if v > threshold => return false,
            Reading::Observed(_) => reported = true,
            Reading::Redistributed(_) => return false,
            Reading::Missing => {}
        }
    }
    reported
}

/// Zero-step flags for the whole record
#[derive(Debug, Clone)]
pub struct ZeroSteps {
    flags: Array2<bool>,
}

impl ZeroSteps {
    /// No step is a zero step
    pub fn none(timeline: &Timeline) -> Self {
        Self {
            flags: Array2::from_elem((timeline.n_years(), timeline.steps_per_year()), false),
        }
    }

    pub fn detect(timeline: &Timeline, stations: &[Station], threshold: f64) -> Self {
        let mut zero = Self::none(timeline);
        for t in timeline.iter() {
            zero.flags[[t.year, t.step]] = is_zero_step(stations, t, threshold);
        }
        zero
    }

    pub fn contains(&self, t: TimeIndex) -> bool {
        self.flags[[t.year, t.step]]
    }

    pub fn count(&self) -> usize {
        self.flags.iter().filter(|&&z| z).count()
    }
}

/// Mean of each station over `span`, or `None` when the station misses
/// any step of it.
///
/// Storm spans and non-accumulating kinds divide by the span length. For
/// precipitation and snow water equivalent over fixed periods the divisor
/// is the number of steps on which some included station was wet (above
/// `threshold`); with no wet step the sum is kept.
pub fn span_means(kind: DataKind, span: &Span, stations: &[Station], threshold: f64) -> Vec<Option<f64>> {
    let sums: Vec<Option<f64>> = stations
        .iter()
        .map(|station| {
            span.steps
                .iter()
                .map(|&t| station.reading(t).value())
                .sum::<Option<f64>>()
        })
        .collect();

    let divisor = if span.kind == SpanKind::Storm || !kind.is_non_negative() {
        span.len()
    } else {
        span.steps
            .iter()
            .filter(|&&t| {
                stations
                    .iter()
                    .zip(&sums)
                    .any(|(station, sum)| sum.is_some() && station.reading(t).is_wet(threshold))
            })
            .count()
    };

    if divisor == 0 {
        return sums;
    }
    let divisor = divisor as f64;
    sums.into_iter().map(|s| s.map(|v| v / divisor)).collect()
}
