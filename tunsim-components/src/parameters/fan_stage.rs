//! Ventilation control parameters
//!
//! The hysteresis table lives here so that it can be validated in one place before a run starts.

use super::{ensure_non_negative, ensure_positive};
use serde::{Deserialize, Serialize};
use tunsim_core::errors::{TwinError, TwinResult};
use tunsim_core::timeseries::FloatValue;

/// Switching thresholds of a single fan stage
///
/// The controller switches up into the stage once the control signal reaches `upper`
/// and back down out of it once the signal is at or below `lower`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageThresholds {
    pub upper: FloatValue,
    pub lower: FloatValue,
}

impl StageThresholds {
    pub const fn new(upper: FloatValue, lower: FloatValue) -> Self {
        Self { upper, lower }
    }
}

/// Parameters for the fan stage controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanStageParameters {
    /// Thresholds of the `Low`, `Medium` and `High` stages
    /// default: (0.35, 0.25), (0.5, 0.4), (0.8, 0.65)
    pub thresholds: [StageThresholds; 3],

    /// CO removal rate of the `Off`, `Low`, `Medium` and `High` stages
    /// unit: 1 / s
    /// default: [0.002, 0.012, 0.025, 0.04]
    pub removal_rates: [FloatValue; 4],

    /// CO level that produces a control signal of 1
    /// unit: ppm
    /// default: 50.0
    pub co_reference_ppm: FloatValue,
}

impl Default for FanStageParameters {
    fn default() -> Self {
        Self {
            thresholds: [
                StageThresholds::new(0.35, 0.25),
                StageThresholds::new(0.5, 0.4),
                StageThresholds::new(0.8, 0.65),
            ],
            removal_rates: [0.002, 0.012, 0.025, 0.04],
            co_reference_ppm: 50.0,
        }
    }
}

impl FanStageParameters {
    /// Largest removal rate in the table
    pub fn max_removal_rate(&self) -> FloatValue {
        self.removal_rates
            .iter()
            .copied()
            .fold(0.0, FloatValue::max)
    }

    /// Check the hysteresis table
    ///
    /// Every stage needs `lower < upper` and both thresholds must strictly increase
    /// from one stage to the next.
    pub fn validate(&self) -> TwinResult<()> {
        ensure_positive("fan_stage.co_reference_ppm", self.co_reference_ppm)?;
        for (i, rate) in self.removal_rates.iter().enumerate() {
            ensure_non_negative(&format!("fan_stage.removal_rates[{}]", i), *rate)?;
        }

        for (i, stage) in self.thresholds.iter().enumerate() {
            let field = format!("fan_stage.thresholds[{}]", i);
            if !(stage.lower.is_finite() && stage.upper.is_finite()) {
                return Err(TwinError::configuration(field, "thresholds must be finite"));
            }
            if stage.lower >= stage.upper {
                return Err(TwinError::configuration(
                    field,
                    format!(
                        "lower threshold {} must be below upper threshold {}",
                        stage.lower, stage.upper
                    ),
                ));
            }
        }

        for (i, pair) in self.thresholds.windows(2).enumerate() {
            if pair[1].upper <= pair[0].upper || pair[1].lower <= pair[0].lower {
                return Err(TwinError::configuration(
                    format!("fan_stage.thresholds[{}]", i + 1),
                    "thresholds must increase from one stage to the next",
                ));
            }
        }
        Ok(())
    }
}
