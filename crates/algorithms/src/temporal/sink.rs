//! Hand-off of finished steps to output collaborators

use dkrige_core::{Result, TimeIndex};
use serde::Serialize;

/// One finished time step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub time: TimeIndex,
    /// Calendar year label
    pub year: i32,
    /// One value per cell; NaN for cells without a value. Empty when the
    /// sink asked for means only.
    pub values: Vec<f64>,
    pub areal_mean: f64,
    /// Ascending zone order
    pub zone_means: Vec<f64>,
    /// Produced by the dry-step fast path
    pub zero_step: bool,
}

/// Receives finished steps in chronological order
pub trait StepSink: Send {
    /// Whether the sink uses per-cell values; when false the engine may
    /// hand over an empty `values` array.
    fn wants_fields(&self) -> bool {
        true
    }

    fn on_step(&mut self, step: &StepResult) -> Result<()>;
}

/// Keeps every step in memory
#[derive(Debug, Clone)]
pub struct CollectingSink {
    keep_fields: bool,
    steps: Vec<StepResult>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self {
            keep_fields: true,
            steps: Vec::new(),
        }
    }

    /// Keep means only, dropping per-cell values
    pub fn means_only() -> Self {
        Self {
            keep_fields: false,
            steps: Vec::new(),
        }
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<StepResult> {
        self.steps
    }
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StepSink for CollectingSink {
    fn wants_fields(&self) -> bool {
        self.keep_fields
    }

    fn on_step(&mut self, step: &StepResult) -> Result<()> {
        self.steps.push(step.clone());
        Ok(())
    }
}
