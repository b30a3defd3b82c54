//! Partitioning the record into trend spans
//!
//! Every data-bearing step belongs to exactly one span; one elevation trend
//! applies per span.
//!
//! - **Fixed periods**: each year's data range is cut into runs of `N`
//!   steps, the last run holding the remainder.
//! - **Storms** (precipitation): walking the record chronologically, a step
//!   on which at least `min_stations` stations are wet and one exceeds the
//!   heavy threshold extends the open storm (or opens one). Any other step
//!   closes an open storm and is examined again; if no storm is open it
//!   becomes a single-step span of its own, *isolated* when some station is
//!   wet and *quiet* otherwise. The last step of the record closes any open
//!   storm. Storms may span year boundaries.

use dkrige_core::{Station, StormRule, TimeIndex, Timeline};
use serde::Serialize;

/// How a span was delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// Fixed-length period
    Period,
    /// Multi-station heavy precipitation run
    Storm,
    /// Single step with light or scattered precipitation; zero trend
    Isolated,
    /// Single step with no wet station; zero trend
    Quiet,
}

/// Contiguous run of time steps sharing one trend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    pub kind: SpanKind,
    /// Steps in chronological order
    pub steps: Vec<TimeIndex>,
}

impl Span {
    pub fn start(&self) -> TimeIndex {
        self.steps[0]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the trend of this span is fitted (rather than fixed at zero)
    pub fn is_fitted(&self) -> bool {
        matches!(self.kind, SpanKind::Period | SpanKind::Storm)
    }
}

/// Fixed-length periods of `steps` time steps
pub fn fixed_periods(timeline: &Timeline, steps: usize) -> Vec<Span> {
    let steps = steps.max(1);
    let mut spans = Vec::new();
    for (year, span) in timeline.years().iter().enumerate() {
        let mut first = span.first;
        while first < span.end {
            let end = (first + steps).min(span.end);
            spans.push(Span {
                kind: SpanKind::Period,
                steps: (first..end).map(|s| TimeIndex::new(year, s)).collect(),
            });
            first = end;
        }
    }
    spans
}

#[derive(Debug, Clone, Copy)]
struct Activity {
    wet: usize,
    heavy: bool,
}

fn activity(stations: &[Station], t: TimeIndex, rule: &StormRule) -> Activity {
    let mut wet = 0;
    let mut heavy = false;
    for station in stations {
        if let Some(v) = station.reading(t).value() {
            if v > rule.wet_threshold {
                wet += 1;
            }
            if v > rule.heavy_threshold {
                heavy = true;
            }
        }
    }
    Activity { wet, heavy }
}

/// Storm spans interleaved with single-step isolated and quiet spans
pub fn storms(timeline: &Timeline, stations: &[Station], rule: &StormRule) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut open: Vec<TimeIndex> = Vec::new();

    for t in timeline.iter() {
        let act = activity(stations, t, rule);
        if act.wet >= rule.min_stations && act.heavy {
            open.push(t);
            continue;
        }
        if !open.is_empty() {
            spans.push(Span {
                kind: SpanKind::Storm,
                steps: std::mem::take(&mut open),
            });
        }
        let kind = if act.wet >= 1 {
            SpanKind::Isolated
        } else {
            SpanKind::Quiet
        };
        spans.push(Span { kind, steps: vec![t] });
    }

    if !open.is_empty() {
        spans.push(Span {
            kind: SpanKind::Storm,
            steps: open,
        });
    }
    spans
}
