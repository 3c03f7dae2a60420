//! Time representation shared by every component.
//!
//! Simulation time is measured in seconds from the start of a scenario.
//! The model advances on a uniform grid so that a run is fully described by
//! its step size and the number of steps.

use crate::errors::{TwinError, TwinResult};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

pub type FloatValue = f64;
pub type Time = f64;

/// A uniform time axis
///
/// The axis holds `n_steps + 1` points: the start of every step plus the end of the final step.
/// Values stored against index `i` describe the state at the start of step `i`
/// (which is also the end of step `i - 1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    values: Array1<Time>,
    step: Time,
}

impl TimeAxis {
    /// Create an axis covering `[0, duration]` with a fixed step
    ///
    /// A duration that isn't a multiple of `step` is rounded up to include the final partial step
    /// as a full step.
    pub fn from_duration(duration: Time, step: Time) -> TwinResult<Self> {
        if !(step > 0.0) || !step.is_finite() {
            return Err(TwinError::configuration(
                "dt_s",
                format!("time step must be positive and finite, got {}", step),
            ));
        }
        if !(duration > 0.0) || !duration.is_finite() {
            return Err(TwinError::configuration(
                "duration_s",
                format!("duration must be positive and finite, got {}", duration),
            ));
        }

        // Tolerate rounding noise such as 1.1 / 0.1 = 11.000000000000002
        let n_steps = ((duration / step) - 1e-9).ceil().max(1.0) as usize;
        let values = Array1::from_iter((0..=n_steps).map(|i| i as Time * step));
        Ok(Self { values, step })
    }

    /// Number of points on the axis (one more than the number of steps)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of steps covered by the axis
    pub fn n_steps(&self) -> usize {
        self.values.len().saturating_sub(1)
    }

    /// Step size in seconds
    pub fn step(&self) -> Time {
        self.step
    }

    /// Time at a given index
    pub fn at(&self, index: usize) -> Option<Time> {
        self.values.get(index).copied()
    }

    /// Start and end of the step that begins at `index`
    pub fn at_bounds(&self, index: usize) -> Option<(Time, Time)> {
        match (self.values.get(index), self.values.get(index + 1)) {
            (Some(start), Some(end)) => Some((*start, *end)),
            _ => None,
        }
    }

    pub fn values(&self) -> &Array1<Time> {
        &self.values
    }
}
