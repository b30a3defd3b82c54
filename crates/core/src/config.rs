//! Run configuration
//!
//! Everything that selects *how* a run behaves, as opposed to the station
//! and grid data it runs on. Configurations are plain serde structs so the
//! host can keep them in JSON next to its station and grid files:
//!
//! ```json
//! {
//!   "data_kind": "precipitation",
//!   "coordinates": "planar",
//!   "aggregation": { "mode": "fixed_period", "steps": 5 },
//!   "regression": "least_absolute_deviation",
//!   "use_mask": true
//! }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Kind of quantity being interpolated.
///
/// Selects the slope sign override, non-negativity clamping, the zero-step
/// fast path and whether accumulated precipitation codes are honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    #[default]
    Precipitation,
    Temperature,
    SnowWaterEquivalent,
    Other,
}

impl DataKind {
    /// Whether interpolated values are clamped at zero
    pub fn is_non_negative(self) -> bool {
        matches!(self, DataKind::Precipitation | DataKind::SnowWaterEquivalent)
    }

    /// Whether steps where every station is dry are short-circuited to zero
    pub fn has_zero_steps(self) -> bool {
        self.is_non_negative()
    }

    /// Whether accumulation codes are recognised in raw station data
    pub fn has_accumulations(self) -> bool {
        self == DataKind::Precipitation
    }

    /// Whether a fitted slope contradicts the expected physical sign
    /// (precipitation and snow decreasing with elevation, temperature
    /// increasing with it).
    pub fn contradicts_slope(self, slope: f64) -> bool {
        match self {
            DataKind::Precipitation | DataKind::SnowWaterEquivalent => slope < 0.0,
            DataKind::Temperature => slope > 0.0,
            DataKind::Other => false,
        }
    }
}

/// How station and cell positions are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    /// Easting/northing in metres
    #[default]
    Planar,
    /// Longitude/latitude in decimal degrees (northern hemisphere)
    Geographic,
}

/// Elevation regression method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionMethod {
    #[default]
    LeastSquares,
    LeastAbsoluteDeviation,
}

/// How residuals are weighted when interpolated to the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMethod {
    /// Linear-semivariogram kriging with negative-weight exclusion
    #[default]
    Kriging,
    /// Every reporting station weighted `1/n`
    Equal,
}

/// What to do when a cell's kriging system is singular
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingularPolicy {
    /// Abort the run with [`Error::SingularSystem`]
    #[default]
    Abort,
    /// Leave the cell without a value, log a warning and keep going
    SkipCell,
}

/// Activity rule that delimits precipitation storms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StormRule {
    /// Minimum number of wet stations on a storm step
    pub min_stations: usize,
    /// A station is wet when its reading exceeds this
    pub wet_threshold: f64,
    /// At least one station must exceed this on a storm step
    pub heavy_threshold: f64,
}

impl Default for StormRule {
    fn default() -> Self {
        Self {
            min_stations: 3,
            wet_threshold: 0.01,
            heavy_threshold: 5.0,
        }
    }
}

/// Temporal aggregation policy for trend fitting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Aggregation {
    /// Fixed-length periods of `steps` time steps; the last period of a year
    /// may be shorter
    FixedPeriod { steps: usize },
    /// Variable-length storms (precipitation only)
    Storm(StormRule),
}

impl Default for Aggregation {
    fn default() -> Self {
        Aggregation::FixedPeriod { steps: 1 }
    }
}

/// Capacity limits checked before any computation starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_stations: usize,
    pub max_cells: usize,
    pub max_zones: usize,
    pub max_steps_per_year: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_stations: 1000,
            max_cells: 16_000_000,
            max_zones: 1000,
            max_steps_per_year: 8784,
        }
    }
}

impl Limits {
    /// Fail with [`Error::CapacityExceeded`] if `requested > limit`
    pub fn check(what: &'static str, requested: usize, limit: usize) -> Result<()> {
        if requested > limit {
            return Err(Error::CapacityExceeded {
                what,
                requested,
                limit,
            });
        }
        Ok(())
    }
}

/// Complete configuration of a detrended kriging run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data_kind: DataKind,
    pub coordinates: CoordinateSystem,
    pub aggregation: Aggregation,
    pub regression: RegressionMethod,
    pub weighting: WeightingMethod,
    pub singular_policy: SingularPolicy,
    /// Restrict areal means to cells inside the mask
    pub use_mask: bool,
    /// Worker threads; `None` uses every hardware thread
    pub threads: Option<usize>,
    /// Readings at or below this count as dry
    pub zero_threshold: f64,
    pub limits: Limits,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_kind: DataKind::default(),
            coordinates: CoordinateSystem::default(),
            aggregation: Aggregation::default(),
            regression: RegressionMethod::default(),
            weighting: WeightingMethod::default(),
            singular_policy: SingularPolicy::default(),
            use_mask: false,
            threads: None,
            zero_threshold: 0.001,
            limits: Limits::default(),
        }
    }
}

impl RunConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the combination of options
    pub fn validate(&self) -> Result<()> {
        match self.aggregation {
            Aggregation::FixedPeriod { steps } => {
                if steps == 0 {
                    return Err(Error::InvalidParameter {
                        name: "aggregation.steps",
                        value: steps.to_string(),
                        reason: "period length must be at least one time step".into(),
                    });
                }
            }
            Aggregation::Storm(rule) => {
                if self.data_kind != DataKind::Precipitation {
                    return Err(Error::Config(format!(
                        "storm aggregation requires precipitation data, got {:?}",
                        self.data_kind
                    )));
                }
                if rule.min_stations == 0 {
                    return Err(Error::InvalidParameter {
                        name: "aggregation.min_stations",
                        value: "0".into(),
                        reason: "a storm needs at least one wet station".into(),
                    });
                }
                if !(rule.wet_threshold >= 0.0 && rule.heavy_threshold >= rule.wet_threshold) {
                    return Err(Error::InvalidParameter {
                        name: "aggregation.heavy_threshold",
                        value: rule.heavy_threshold.to_string(),
                        reason: format!(
                            "must be finite and at least the wet threshold ({})",
                            rule.wet_threshold
                        ),
                    });
                }
            }
        }

        if self.threads == Some(0) {
            return Err(Error::InvalidParameter {
                name: "threads",
                value: "0".into(),
                reason: "use null for all hardware threads".into(),
            });
        }

        if !(self.zero_threshold >= 0.0 && self.zero_threshold.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "zero_threshold",
                value: self.zero_threshold.to_string(),
                reason: "must be a finite non-negative number".into(),
            });
        }

        Ok(())
    }

    /// Whether the run partitions time into storms
    pub fn storm_rule(&self) -> Option<StormRule> {
        match self.aggregation {
            Aggregation::Storm(rule) => Some(rule),
            Aggregation::FixedPeriod { .. } => None,
        }
    }
}
