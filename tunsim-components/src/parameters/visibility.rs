use super::{ensure_fraction, ensure_positive};
use serde::{Deserialize, Serialize};
use tunsim_core::errors::TwinResult;
use tunsim_core::timeseries::FloatValue;

/// Parameters for the visibility proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityParameters {
    /// Visibility in clean air without weather
    /// unit: dimensionless
    /// default: 1.0
    pub baseline: FloatValue,

    /// CO level that reduces visibility by a factor of e
    /// unit: ppm
    /// default: 150.0
    pub co_extinction_ppm: FloatValue,

    /// Fraction of visibility lost during weather of severity 1
    /// unit: dimensionless
    /// default: 0.6
    pub weather_visibility_loss: FloatValue,

    /// Time constant of the recovery towards the target
    /// unit: s
    /// default: 60.0
    pub recovery_tau_s: FloatValue,
}

impl Default for VisibilityParameters {
    fn default() -> Self {
        Self {
            baseline: 1.0,
            co_extinction_ppm: 150.0,
            weather_visibility_loss: 0.6,
            recovery_tau_s: 60.0,
        }
    }
}

impl VisibilityParameters {
    pub fn validate(&self) -> TwinResult<()> {
        ensure_fraction("visibility.baseline", self.baseline)?;
        ensure_positive("visibility.baseline", self.baseline)?;
        ensure_positive("visibility.co_extinction_ppm", self.co_extinction_ppm)?;
        ensure_fraction(
            "visibility.weather_visibility_loss",
            self.weather_visibility_loss,
        )?;
        ensure_positive("visibility.recovery_tau_s", self.recovery_tau_s)?;
        Ok(())
    }
}
