//! End-to-end runs of the detrended kriging engine on small synthetic
//! station networks.
//!
//! Positions are planar metres, so kriging distances are kilometres.
//! Every network is built so the expected cell values can be worked out by
//! hand.

use approx::assert_relative_eq;
use dkrige_algorithms::regression::FitQuality;
use dkrige_algorithms::temporal::{
    run, CollectingSink, DetrendedKriging, DetrendedKrigingParams, RunContext, SpanKind, TrendModel,
    TrendOutcome,
};
use dkrige_core::{
    Aggregation, Algorithm, CellTable, DataKind, Error, GridCell, Location, Overlays, Reading,
    RegressionMethod, RunConfig, Series, SingularPolicy, Station, StormRule, TimeIndex, Timeline,
};
use ndarray::Array2;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Station at `(x_km, y_km)` with one year of `values` (NaN = missing)
fn station(x_km: f64, y_km: f64, elevation: f64, values: &[f64]) -> Station {
    let data = Array2::from_shape_vec((1, values.len()), values.to_vec()).unwrap();
    Station::new(
        format!("{}-{}", x_km, y_km),
        elevation,
        Location::new(x_km * 1000.0, y_km * 1000.0),
        Series::from_values(&data),
    )
}

fn cell(x_km: f64, y_km: f64, elevation: f64) -> GridCell {
    GridCell::new(Location::new(x_km * 1000.0, y_km * 1000.0), elevation)
}

fn cells(list: Vec<GridCell>) -> CellTable {
    CellTable::from_cells(list, Overlays::default())
}

fn config(kind: DataKind, period: usize) -> RunConfig {
    RunConfig {
        data_kind: kind,
        aggregation: Aggregation::FixedPeriod { steps: period },
        threads: Some(2),
        ..Default::default()
    }
}

fn slope_of(outcome: &TrendOutcome) -> f64 {
    outcome.model().expect("valid trend").main_line().slope
}

/// Three stations along the x axis; least squares gives
/// `2/3 + 10 * elevation` and residuals `[-2/3, 4/3, -2/3]`.
fn line_network(extra: Option<Station>) -> Vec<Station> {
    let mut stations = vec![
        station(0.0, 0.0, 0.0, &[0.0]),
        station(10.0, 0.0, 1.0, &[12.0]),
        station(20.0, 0.0, 2.0, &[20.0]),
    ];
    stations.extend(extra);
    stations
}

// ---------------------------------------------------------------------------
// Exact linear data
// ---------------------------------------------------------------------------

#[test]
fn linear_field_round_trip() {
    init_tracing();
    let base = [20.0, 22.0, 18.0, 25.0];
    let sites = [
        (0.0, 0.0, 0.2),
        (20.0, 5.0, 1.0),
        (8.0, 30.0, 1.7),
        (35.0, 25.0, 2.4),
        (15.0, 15.0, 0.9),
    ];
    let stations: Vec<Station> = sites
        .iter()
        .map(|&(x, y, e)| {
            let values: Vec<f64> = base.iter().map(|a| a - 5.0 * e).collect();
            station(x, y, e, &values)
        })
        .collect();
    let grid = vec![
        cell(5.0, 5.0, 0.5),
        cell(25.0, 20.0, 2.0),
        cell(12.0, 28.0, 1.3),
        cell(50.0, 50.0, 3.0),
        cell(1.0, 1.0, f64::NAN),
    ];

    let timeline = Timeline::complete(4, 1990, 1).unwrap();
    let mut ctx = RunContext::new(config(DataKind::Temperature, 2), timeline, stations, cells(grid.clone())).unwrap();
    let mut sink = CollectingSink::new();
    let summary = run(&mut ctx, &mut sink).unwrap();

    assert_eq!(summary.trends.len(), 2);
    for trend in &summary.trends {
        assert_relative_eq!(slope_of(&trend.outcome), -5.0, epsilon = 1e-9);
        assert_eq!(trend.points, 5);
    }

    assert_eq!(sink.steps().len(), 4);
    for (step, &a) in sink.steps().iter().zip(&base) {
        assert_eq!(step.year, 1990);
        for (value, c) in step.values.iter().zip(&grid[..4]) {
            assert_relative_eq!(*value, a - 5.0 * c.elevation, epsilon = 1e-9);
        }
        assert!(step.values[4].is_nan(), "unusable cell should have no value");

        let expected = (0..4).map(|i| a - 5.0 * grid[i].elevation).sum::<f64>() / 4.0;
        assert_relative_eq!(step.areal_mean, expected, epsilon = 1e-9);
    }

    // stations now hold residuals: step 0 sits 1 below its period mean
    match ctx.stations()[2].reading(TimeIndex::new(0, 0)) {
        Reading::Observed(r) => assert_relative_eq!(r, -1.0, epsilon = 1e-9),
        other => panic!("expected observed residual, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Regression scenarios
// ---------------------------------------------------------------------------

#[test]
fn four_station_trend() {
    init_tracing();
    let stations = vec![
        station(0.0, 0.0, 0.0, &[0.0]),
        station(10.0, 0.0, 1.0, &[10.0]),
        station(0.0, 10.0, 2.0, &[20.0]),
        station(10.0, 10.0, 3.0, &[30.0]),
    ];
    let timeline = Timeline::complete(1, 2000, 1).unwrap();
    let ctx = RunContext::new(
        config(DataKind::Other, 1),
        timeline,
        stations,
        cells(vec![cell(5.0, 5.0, 1.5)]),
    )
    .unwrap();
    let out = DetrendedKriging.execute_default(ctx).unwrap();

    let trend = &out.summary.trends[0];
    assert_eq!(trend.points, 4);
    assert_relative_eq!(slope_of(&trend.outcome), 10.0, epsilon = 1e-9);
    assert_relative_eq!(trend.outcome.model().unwrap().main_line().intercept, 0.0, epsilon = 1e-9);
    match trend.quality() {
        FitQuality::LeastSquares { r, .. } => assert_relative_eq!(r, 1.0, epsilon = 1e-9),
        other => panic!("expected least squares statistics, got {:?}", other),
    }
    assert_relative_eq!(out.steps[0].values[0], 15.0, epsilon = 1e-9);
}

#[test]
fn distant_station_keeps_sign_decision() {
    init_tracing();
    let stations = vec![
        station(0.0, 0.0, 0.0, &[0.0]),
        station(10.0, 0.0, 1.0, &[10.0]),
        station(0.0, 10.0, 2.0, &[20.0]),
        station(10.0, 10.0, 3.0, &[30.0]),
        station(400.0, 400.0, 1.5, &[1.0]),
    ];
    let timeline = Timeline::complete(1, 2000, 1).unwrap();
    let ctx = RunContext::new(
        config(DataKind::Precipitation, 1),
        timeline,
        stations,
        cells(vec![cell(5.0, 5.0, 1.5)]),
    )
    .unwrap();
    let out = DetrendedKriging.execute_default(ctx).unwrap();

    let trend = &out.summary.trends[0];
    // the dry station is left out of the precipitation regression
    assert_eq!(trend.points, 4);
    assert!(
        matches!(trend.outcome, TrendOutcome::Fitted { sign_overridden: false, .. }),
        "slope should stay positive, got {:?}",
        trend.outcome
    );
    assert_relative_eq!(slope_of(&trend.outcome), 12.4, epsilon = 1e-9);
}

fn outlier_network() -> Vec<Station> {
    let sites = [
        (0.0, 0.0),
        (10.0, 0.0),
        (20.0, 0.0),
        (0.0, 10.0),
        (10.0, 10.0),
        (20.0, 10.0),
        (0.0, 20.0),
    ];
    sites
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| {
            let e = i as f64;
            let value = if i == 6 { 40.0 } else { 2.0 + 0.5 * e };
            station(x, y, e, &[value])
        })
        .collect()
}

#[test]
fn least_absolute_deviation_resists_outlier_station() {
    init_tracing();
    let fit_with = |method| {
        let cfg = RunConfig {
            regression: method,
            ..config(DataKind::Other, 1)
        };
        let timeline = Timeline::complete(1, 2000, 1).unwrap();
        let ctx = RunContext::new(cfg, timeline, outlier_network(), cells(vec![cell(5.0, 5.0, 2.0)])).unwrap();
        DetrendedKriging.execute_default(ctx).unwrap()
    };

    let robust = fit_with(RegressionMethod::LeastAbsoluteDeviation);
    let trend = &robust.summary.trends[0];
    assert_eq!(trend.points, 7);
    let line = trend.outcome.model().unwrap().main_line();
    assert!((line.slope - 0.5).abs() < 0.05, "LAD slope should ignore the outlier, got {:.4}", line.slope);
    assert!((line.intercept - 2.0).abs() < 0.1);
    assert!(
        matches!(trend.quality(), FitQuality::LeastAbsoluteDeviation { .. }),
        "expected LAD statistics, got {:?}",
        trend.quality()
    );
    assert!(robust.steps[0].values[0].is_finite());

    let ls = fit_with(RegressionMethod::LeastSquares);
    assert!(slope_of(&ls.summary.trends[0].outcome) > 2.0);
}

// ---------------------------------------------------------------------------
// Station availability
// ---------------------------------------------------------------------------

#[test]
fn single_reporting_station_skips_step() {
    init_tracing();
    let stations = vec![
        station(0.0, 0.0, 0.0, &[1.0, 3.0]),
        station(10.0, 0.0, 1.0, &[2.0, f64::NAN]),
    ];
    let timeline = Timeline::complete(2, 2000, 1).unwrap();
    let ctx = RunContext::new(
        config(DataKind::Other, 2),
        timeline,
        stations,
        cells(vec![cell(5.0, 0.0, 0.5)]),
    )
    .unwrap();
    let out = DetrendedKriging.execute_default(ctx).unwrap();

    assert_eq!(out.summary.steps_produced, 1);
    assert_eq!(out.summary.steps_skipped, 1);
    assert!(out.summary.areal_mean(TimeIndex::new(0, 0)).is_some());
    assert_eq!(out.summary.areal_mean(TimeIndex::new(0, 1)), None);
    // one station with a complete period: zero trend, raw values kriged
    assert_relative_eq!(out.steps[0].areal_mean, 1.5, epsilon = 1e-9);
}

#[test]
fn missing_station_uses_reporting_subset() {
    init_tracing();
    let stations = line_network(Some(station(30.0, 0.0, 3.0, &[f64::NAN])));
    let timeline = Timeline::complete(1, 2000, 1).unwrap();
    let ctx = RunContext::new(
        config(DataKind::Other, 1),
        timeline,
        stations,
        cells(vec![cell(5.0, 0.0, 0.5)]),
    )
    .unwrap();
    let out = DetrendedKriging.execute_default(ctx).unwrap();

    // halfway between the first two stations: residual (−2/3 + 4/3) / 2
    // on top of the trend 2/3 + 5
    assert_relative_eq!(out.steps[0].values[0], 6.0, epsilon = 1e-9);
}

#[test]
fn all_dry_step_is_exactly_zero() {
    init_tracing();
    let stations = vec![
        station(0.0, 0.0, 0.0, &[0.0, 0.0]),
        station(10.0, 0.0, 1.0, &[f64::NAN, 0.001]),
        station(0.0, 10.0, 2.0, &[f64::NAN, 0.0008]),
    ];
    let timeline = Timeline::complete(2, 2000, 1).unwrap();
    let grid = vec![
        GridCell {
            zone: 1,
            ..cell(5.0, 5.0, 1.0)
        },
        GridCell {
            zone: 2,
            ..cell(2.0, 2.0, 0.5)
        },
    ];
    let table = CellTable::from_cells(grid, Overlays { mask: false, zones: true });
    let ctx = RunContext::new(config(DataKind::Precipitation, 2), timeline, stations, table).unwrap();
    let out = DetrendedKriging.execute_default(ctx).unwrap();

    // only the always-dry station has a complete period, so no regression points
    assert!(!out.summary.trends[0].outcome.is_valid());
    assert_eq!(out.summary.zero_steps, 2);
    for step in &out.steps {
        assert!(step.zero_step);
        assert_eq!(step.areal_mean, 0.0);
        assert_eq!(step.zone_means, vec![0.0, 0.0]);
        assert!(step.values.iter().all(|&v| v == 0.0));
    }
}

// ---------------------------------------------------------------------------
// Storms and snow
// ---------------------------------------------------------------------------

#[test]
fn storm_mode_partitions_and_fits() {
    init_tracing();
    let stations = vec![
        station(0.0, 0.0, 3.0, &[0.0, 6.0, 8.0, 0.5]),
        station(10.0, 0.0, 2.0, &[0.0, 2.0, 3.0, 0.0]),
        station(0.0, 10.0, 1.0, &[0.0, 1.0, 1.0, 0.0]),
    ];
    let timeline = Timeline::complete(4, 2000, 1).unwrap();
    let cfg = RunConfig {
        aggregation: Aggregation::Storm(StormRule::default()),
        ..config(DataKind::Precipitation, 1)
    };
    let ctx = RunContext::new(cfg, timeline, stations, cells(vec![cell(3.0, 3.0, 2.0)])).unwrap();
    let out = DetrendedKriging.execute_default(ctx).unwrap();

    let kinds: Vec<SpanKind> = out.summary.trends.iter().map(|t| t.span.kind).collect();
    assert_eq!(kinds, vec![SpanKind::Quiet, SpanKind::Storm, SpanKind::Isolated]);

    let storm = &out.summary.trends[1];
    assert_eq!(storm.span.len(), 2);
    assert_eq!(storm.points, 3);
    assert_relative_eq!(slope_of(&storm.outcome), 3.0, epsilon = 1e-9);

    assert_eq!(out.summary.steps_produced, 4);
    assert!(out.steps[0].zero_step);
    assert!(out.steps.iter().all(|s| s.areal_mean >= 0.0));
}

#[test]
fn snow_water_equivalent_snowline() {
    init_tracing();
    let stations = vec![
        station(0.0, 0.0, 0.5, &[0.0]),
        station(10.0, 0.0, 1.0, &[10.0]),
        station(0.0, 10.0, 2.0, &[20.0]),
        station(10.0, 10.0, 3.0, &[30.0]),
    ];
    let timeline = Timeline::complete(1, 2000, 1).unwrap();
    let grid = vec![cell(5.0, 5.0, 0.3), cell(5.0, 5.0, 0.75), cell(5.0, 5.0, 2.5)];
    let ctx = RunContext::new(
        config(DataKind::SnowWaterEquivalent, 1),
        timeline,
        stations,
        cells(grid),
    )
    .unwrap();
    let out = DetrendedKriging.execute_default(ctx).unwrap();

    let trend = &out.summary.trends[0];
    match trend.outcome.model() {
        Some(TrendModel::SnowlineSplit { snowline, lower, .. }) => {
            assert_relative_eq!(*snowline, 0.5, epsilon = 1e-9);
            assert!(lower.is_some());
        }
        other => panic!("expected snow line split, got {:?}", other),
    }
    assert_relative_eq!(trend.snow_cover.unwrap(), 200.0 / 3.0, epsilon = 1e-9);

    let json = serde_json::to_string(&out.summary).unwrap();
    assert!(json.contains("snowline_split"), "summary should serialize the trend model: {}", json);

    let values = &out.steps[0].values;
    assert_eq!(values[0], 0.0);
    assert_relative_eq!(values[1], 5.0, epsilon = 1e-9);
    assert_relative_eq!(values[2], 25.0, epsilon = 1e-9);
}

// ---------------------------------------------------------------------------
// Zones, weights and configuration
// ---------------------------------------------------------------------------

#[test]
fn zone_means_in_ascending_order() {
    init_tracing();
    let stations = vec![
        station(0.0, 0.0, 0.0, &[2.0]),
        station(10.0, 0.0, 1.0, &[5.0]),
        station(0.0, 10.0, 2.0, &[8.0]),
    ];
    let grid = vec![
        GridCell {
            zone: 5,
            ..cell(4.0, 4.0, 1.0)
        },
        GridCell {
            zone: 5,
            ..cell(6.0, 2.0, 2.0)
        },
        GridCell {
            zone: 2,
            ..cell(1.0, 1.0, 0.0)
        },
        cell(2.0, 2.0, 1.0),
    ];
    let table = CellTable::from_cells(grid, Overlays { mask: false, zones: true });
    let timeline = Timeline::complete(1, 2000, 1).unwrap();
    let ctx = RunContext::new(config(DataKind::Other, 1), timeline, stations, table).unwrap();
    let out = DetrendedKriging
        .execute(ctx, DetrendedKrigingParams { keep_fields: false })
        .unwrap();

    let step = &out.steps[0];
    assert!(step.values.is_empty());
    assert_eq!(step.zone_means.len(), 2);
    assert_relative_eq!(step.zone_means[0], 2.0, epsilon = 1e-9);
    assert_relative_eq!(step.zone_means[1], 6.5, epsilon = 1e-9);
    // the zone-less cell is unusable
    assert_relative_eq!(step.areal_mean, 5.0, epsilon = 1e-9);
}

#[test]
fn equal_weighting_from_json_config() {
    init_tracing();
    let cfg = RunConfig::from_json_str(
        r#"{
            "data_kind": "other",
            "aggregation": { "mode": "fixed_period", "steps": 1 },
            "weighting": "equal",
            "threads": 2
        }"#,
    )
    .unwrap();
    let timeline = Timeline::complete(1, 2000, 1).unwrap();
    let ctx = RunContext::new(cfg, timeline, line_network(None), cells(vec![cell(5.0, 0.0, 0.5)])).unwrap();
    let out = DetrendedKriging.execute_default(ctx).unwrap();

    // residuals average to zero, leaving the trend
    assert_relative_eq!(out.steps[0].values[0], 17.0 / 3.0, epsilon = 1e-9);
}

#[test]
fn supplied_weights_bypass_solver() {
    init_tracing();
    let timeline = Timeline::complete(1, 2000, 1).unwrap();
    let weights = Array2::from_shape_vec((1, 3), vec![1.0, 0.0, 0.0]).unwrap();
    let ctx = RunContext::new(
        config(DataKind::Other, 1),
        timeline,
        line_network(None),
        cells(vec![cell(5.0, 0.0, 0.5)]),
    )
    .unwrap()
    .with_weights(weights)
    .unwrap();
    let out = DetrendedKriging.execute_default(ctx).unwrap();

    assert_relative_eq!(out.steps[0].values[0], 5.0, epsilon = 1e-9);
}

#[test]
fn capacity_exceeded_before_any_output() {
    init_tracing();
    let mut cfg = config(DataKind::Other, 1);
    cfg.limits.max_stations = 2;
    let timeline = Timeline::complete(1, 2000, 1).unwrap();
    let err = RunContext::new(cfg, timeline, line_network(None), cells(vec![cell(5.0, 0.0, 0.5)])).unwrap_err();
    assert!(
        matches!(err, Error::CapacityExceeded { what: "stations", requested: 3, limit: 2 }),
        "unexpected error {:?}",
        err
    );
}

#[test]
fn coincident_stations_abort_run() {
    init_tracing();
    let stations = vec![
        station(0.0, 0.0, 0.0, &[1.0]),
        station(0.0, 0.0, 1.0, &[2.0]),
        station(10.0, 0.0, 2.0, &[3.0]),
    ];
    let timeline = Timeline::complete(1, 2000, 1).unwrap();
    let ctx = RunContext::new(config(DataKind::Other, 1), timeline, stations, cells(vec![cell(5.0, 0.0, 0.5)])).unwrap();
    let err = DetrendedKriging.execute_default(ctx).unwrap_err();
    assert!(matches!(err, Error::SingularSystem { cell: Some(0) }), "unexpected error {:?}", err);
}

#[test]
fn coincident_stations_skipped_cells_leave_rest_of_step() {
    init_tracing();
    // the first two stations share a position; the third reports on step 0
    // only, the first on steps 0 and 1
    let stations = vec![
        station(0.0, 0.0, 0.5, &[0.0, 0.0, f64::NAN]),
        station(0.0, 0.0, 1.0, &[10.0, 10.0, 10.0]),
        station(10.0, 0.0, 2.0, &[20.0, f64::NAN, 20.0]),
        station(20.0, 0.0, 3.0, &[30.0, 30.0, 30.0]),
    ];
    let cfg = RunConfig {
        singular_policy: SingularPolicy::SkipCell,
        ..config(DataKind::SnowWaterEquivalent, 1)
    };
    let timeline = Timeline::complete(3, 2000, 1).unwrap();
    let grid = vec![cell(5.0, 5.0, 0.3), cell(5.0, 5.0, 2.5)];
    let ctx = RunContext::new(cfg, timeline, stations, cells(grid)).unwrap();
    let out = DetrendedKriging.execute_default(ctx).unwrap();

    assert_eq!(out.summary.steps_produced, 3);
    assert_eq!(out.steps.len(), 3);

    // steps 0 and 1 include both coincident stations: the cell below the
    // snow line is zero, the one above has no value
    for step in &out.steps[..2] {
        assert_eq!(step.values[0], 0.0);
        assert!(step.values[1].is_nan(), "expected skipped cell, got {:?}", step.values);
        assert_eq!(step.areal_mean, 0.0);
    }
    assert_eq!(out.summary.areal_mean(TimeIndex::new(0, 1)), Some(0.0));

    // with the first station missing the system is regular again
    let last = &out.steps[2];
    assert_relative_eq!(last.values[0], 3.0, epsilon = 1e-9);
    assert_relative_eq!(last.values[1], 25.0, epsilon = 1e-9);
    assert_relative_eq!(last.areal_mean, 14.0, epsilon = 1e-9);
}
