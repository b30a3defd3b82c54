//! Temporal orchestration of detrended kriging
//!
//! A run walks the record in two phases:
//!
//! 1. **Detrend**: the record is partitioned into spans (fixed periods or
//!    storms); for each span the station means are regressed on elevation,
//!    the trend's sign is checked against the data kind, and the trend is
//!    subtracted from the station readings.
//! 2. **Interpolate**: each step of a valid span is kriged from the
//!    residuals of the reporting stations, the trend is added back at every
//!    cell, and the areal and zonal means are taken. Steps where every
//!    reporting station is dry (precipitation and snow water equivalent)
//!    short-circuit to zero.
//!
//! Finished steps go to a [`StepSink`] in chronological order.
//!
//! ```text
//!   stations ──▶ partition ──▶ span means ──▶ trend fit ──▶ residuals
//!                                                              │
//!   cells ◀── re-trend + clamp ◀── kriged residual ◀───────────┘
//!     │
//!     └──▶ areal mean, zone means ──▶ StepSink
//! ```

mod aggregate;
mod context;
mod detrend;
mod interpolate;
mod partition;
mod sink;
mod snowline;
mod zonal;

pub use aggregate::{is_zero_step, span_means, ZeroSteps};
pub use context::RunContext;
pub use detrend::{
    fit_uniform, residualize, LowerSegment, SpanFit, TrendCoefficients, TrendModel, TrendOutcome, FLAT_SLOPE,
};
pub use interpolate::{StepInterpolator, WeightSource};
pub use partition::{fixed_periods, storms, Span, SpanKind};
pub use sink::{CollectingSink, StepResult, StepSink};
pub use snowline::{fit_snowline_split, snow_covered_area, SNOW_PRESENT};
pub use zonal::{step_means, StepMeans};

use crate::kriging::{StationGeometry, WeightTable};
use crate::regression::FitQuality;
use dkrige_core::{
    Aggregation, Algorithm, CellTable, DataKind, Error, Result, RunConfig, Station, TimeIndex, WeightingMethod,
};
use dkrige_parallel::ProcessingMode;
use ndarray::Array2;
use serde::Serialize;
use tracing::{debug, info};

/// Trend record of one span
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanTrend {
    pub span: Span,
    pub outcome: TrendOutcome,
    /// Stations that entered the regression
    pub points: usize,
    /// Percent of cells above the snow line (snow water equivalent)
    pub snow_cover: Option<f64>,
}

impl SpanTrend {
    pub fn quality(&self) -> FitQuality {
        match &self.outcome {
            TrendOutcome::Fitted { quality, .. } => *quality,
            TrendOutcome::Invalid { .. } => FitQuality::NotFitted,
        }
    }
}

/// What a run leaves behind besides the streamed steps
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// `(years, steps_per_year)`; NaN where no value was produced
    pub areal_means: Array2<f64>,
    pub trends: Vec<SpanTrend>,
    pub steps_produced: usize,
    pub steps_skipped: usize,
    /// Steps produced by the dry-step fast path
    pub zero_steps: usize,
}

impl RunSummary {
    pub fn areal_mean(&self, t: TimeIndex) -> Option<f64> {
        self.areal_means
            .get([t.year, t.step])
            .copied()
            .filter(|v| !v.is_nan())
    }
}

/// Run detrended kriging over the whole record, streaming steps to `sink`.
///
/// Station series in `context` are residualized in place.
pub fn run(context: &mut RunContext, sink: &mut dyn StepSink) -> Result<RunSummary> {
    let mode = ProcessingMode::from_threads(context.config.threads);
    mode.install(|| run_in_pool(context, sink))?
}

fn run_in_pool(context: &mut RunContext, sink: &mut dyn StepSink) -> Result<RunSummary> {
    let config = context.config.clone();
    let kind = config.data_kind;
    let timeline = &context.timeline;
    let cells = &context.cells;
    let stations = &mut context.stations;

    info!(
        kind = ?kind,
        stations = stations.len(),
        cells = cells.len(),
        usable = cells.usable_count(),
        years = timeline.n_years(),
        "starting detrended kriging run"
    );

    let zero = if kind.has_zero_steps() {
        ZeroSteps::detect(timeline, stations, config.zero_threshold)
    } else {
        ZeroSteps::none(timeline)
    };

    let spans = match config.aggregation {
        Aggregation::FixedPeriod { steps } => fixed_periods(timeline, steps),
        Aggregation::Storm(rule) => storms(timeline, stations, &rule),
    };
    info!(spans = spans.len(), zero_steps = zero.count(), "partitioned record");

    let elevations: Vec<f64> = stations.iter().map(|s| s.elevation).collect();
    let trends = spans
        .into_iter()
        .map(|span| detrend_span(&config, cells, stations, &elevations, span, &zero))
        .collect::<Result<Vec<_>>>()?;
    let invalid = trends.iter().filter(|t| !t.outcome.is_valid()).count();
    info!(spans = trends.len(), invalid, "detrended station series");

    let stations: &[Station] = stations;
    let geometry = StationGeometry::from_stations(config.coordinates, stations);
    let (table, source) = match (&context.weights, config.weighting) {
        (Some(weights), _) => (
            WeightTable::supplied(weights.clone(), cells, stations.len())?,
            WeightSource::Supplied,
        ),
        (None, WeightingMethod::Kriging) => (
            WeightTable::kriging(&geometry, cells, config.singular_policy)?,
            WeightSource::Kriging,
        ),
        (None, WeightingMethod::Equal) => (WeightTable::equal(cells, stations.len())?, WeightSource::Equal),
    };

    let interpolator = StepInterpolator {
        geometry: &geometry,
        cells,
        table: &table,
        source,
        kind,
        policy: config.singular_policy,
    };

    let mut summary = RunSummary {
        areal_means: Array2::from_elem((timeline.n_years(), timeline.steps_per_year()), f64::NAN),
        trends: Vec::new(),
        steps_produced: 0,
        steps_skipped: 0,
        zero_steps: 0,
    };
    let wants_fields = sink.wants_fields();

    for trend in &trends {
        for &t in &trend.span.steps {
            let zero_step = zero.contains(t);
            let values = if zero_step {
                zero_field(cells)
            } else {
                let produced = match trend.outcome.model() {
                    Some(model) => interpolator.interpolate(stations, t, model)?,
                    None => None,
                };
                match produced {
                    Some(values) => values,
                    None => {
                        summary.steps_skipped += 1;
                        continue;
                    }
                }
            };

            let means = step_means(cells, &values, config.use_mask);
            summary.areal_means[[t.year, t.step]] = means.areal;
            summary.steps_produced += 1;
            if zero_step {
                summary.zero_steps += 1;
            }

            sink.on_step(&StepResult {
                time: t,
                year: timeline.year(t.year).year,
                values: if wants_fields { values } else { Vec::new() },
                areal_mean: means.areal,
                zone_means: means.zones,
                zero_step,
            })?;
        }
    }

    info!(
        produced = summary.steps_produced,
        skipped = summary.steps_skipped,
        zero = summary.zero_steps,
        "run complete"
    );
    summary.trends = trends;
    Ok(summary)
}

fn detrend_span(
    config: &RunConfig,
    cells: &CellTable,
    stations: &mut [Station],
    elevations: &[f64],
    span: Span,
    zero: &ZeroSteps,
) -> Result<SpanTrend> {
    let kind = config.data_kind;
    let means = if span.is_fitted() {
        span_means(kind, &span, stations, config.zero_threshold)
    } else {
        Vec::new()
    };

    let fit = match kind {
        DataKind::SnowWaterEquivalent => fit_snowline_split(config.regression, elevations, &means)?,
        _ => fit_uniform(kind, config.regression, &span, elevations, &means)?,
    };

    let snow_cover = fit
        .outcome
        .model()
        .and_then(TrendModel::snowline)
        .map(|line| snow_covered_area(cells, config.use_mask, line));

    if let Some(model) = fit.outcome.model() {
        residualize(stations, &span, model, zero);
    }

    if span.is_fitted() {
        debug!(
            start = ?span.start(),
            len = span.len(),
            kind = ?span.kind,
            points = fit.points,
            outcome = ?fit.outcome,
            "span trend"
        );
    }

    Ok(SpanTrend {
        span,
        outcome: fit.outcome,
        points: fit.points,
        snow_cover,
    })
}

fn zero_field(cells: &CellTable) -> Vec<f64> {
    cells
        .cells()
        .iter()
        .map(|c| if c.usable { 0.0 } else { f64::NAN })
        .collect()
}

/// Parameters for [`DetrendedKriging`]
#[derive(Debug, Clone, Copy)]
pub struct DetrendedKrigingParams {
    /// Keep per-cell values of every step in the output
    pub keep_fields: bool,
}

impl Default for DetrendedKrigingParams {
    fn default() -> Self {
        Self { keep_fields: true }
    }
}

/// Summary and collected steps of a run
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub steps: Vec<StepResult>,
}

/// Detrended kriging as an [`Algorithm`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DetrendedKriging;

impl Algorithm for DetrendedKriging {
    type Input = RunContext;
    type Output = RunOutput;
    type Params = DetrendedKrigingParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "DetrendedKriging"
    }

    fn description(&self) -> &'static str {
        "Interpolate station series onto grid cells by elevation-detrended kriging"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let mut context = input;
        let mut sink = if params.keep_fields {
            CollectingSink::new()
        } else {
            CollectingSink::means_only()
        };
        let summary = run(&mut context, &mut sink)?;
        Ok(RunOutput {
            summary,
            steps: sink.into_steps(),
        })
    }
}
