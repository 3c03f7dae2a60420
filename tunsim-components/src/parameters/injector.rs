use super::{ensure_fraction, ensure_non_negative, ensure_positive};
use serde::{Deserialize, Serialize};
use tunsim_core::errors::{TwinError, TwinResult};
use tunsim_core::timeseries::FloatValue;

/// Parameters for the weather and incident injector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorParameters {
    /// Speed limit shown when no window is active
    /// unit: km / h
    /// default: 80.0
    pub base_speed_limit: FloatValue,

    /// Reduction of the speed limit during weather of severity 1
    /// unit: km / h
    /// default: 20.0
    pub weather_speed_drop_kmh: FloatValue,

    /// Lowest speed limit set in response to weather
    /// unit: km / h
    /// default: 40.0
    pub min_speed_limit_kmh: FloatValue,

    /// Capacity lost to an incident before scaling by severity
    /// default: 0.35
    pub incident_capacity_drop: FloatValue,

    /// Capacity multiplier while any weather window is active
    /// default: 0.92
    pub weather_capacity_factor: FloatValue,

    /// Lower bound of the combined capacity multiplier
    /// default: 0.1
    pub min_capacity_factor: FloatValue,
}

impl Default for InjectorParameters {
    fn default() -> Self {
        Self {
            base_speed_limit: 80.0,
            weather_speed_drop_kmh: 20.0,
            min_speed_limit_kmh: 40.0,
            incident_capacity_drop: 0.35,
            weather_capacity_factor: 0.92,
            min_capacity_factor: 0.1,
        }
    }
}

impl InjectorParameters {
    pub fn validate(&self) -> TwinResult<()> {
        ensure_positive("injector.base_speed_limit", self.base_speed_limit)?;
        ensure_non_negative(
            "injector.weather_speed_drop_kmh",
            self.weather_speed_drop_kmh,
        )?;
        ensure_positive("injector.min_speed_limit_kmh", self.min_speed_limit_kmh)?;
        if self.min_speed_limit_kmh > self.base_speed_limit {
            return Err(TwinError::configuration(
                "injector.min_speed_limit_kmh",
                format!(
                    "must not exceed the base speed limit ({}), got {}",
                    self.base_speed_limit, self.min_speed_limit_kmh
                ),
            ));
        }
        ensure_fraction("injector.incident_capacity_drop", self.incident_capacity_drop)?;
        ensure_fraction(
            "injector.weather_capacity_factor",
            self.weather_capacity_factor,
        )?;
        ensure_fraction("injector.min_capacity_factor", self.min_capacity_factor)?;
        ensure_positive("injector.min_capacity_factor", self.min_capacity_factor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_are_valid() {
        InjectorParameters::default().validate().unwrap();
    }

    #[test]
    fn min_limit_above_base() {
        let params = InjectorParameters {
            base_speed_limit: 30.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
