//! Traffic flow parameters
//!
//! Parameters of the fundamental diagram and of the queue model used by
//! [`crate::components::TrafficComponent`].

use super::{ensure_fraction, ensure_non_negative, ensure_positive};
use serde::{Deserialize, Serialize};
use tunsim_core::errors::{TwinError, TwinResult};
use tunsim_core::timeseries::FloatValue;

/// Parameters for the segment traffic model
///
/// The equilibrium speed follows
///
/// $$v_e(\rho) = v_{free} \left(1 - (\rho / \rho_{jam})^\gamma\right)$$
///
/// and the capacity is constant up to the critical density before falling linearly
/// by `congested_capacity_drop` at jam density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficParameters {
    /// Length of each segment
    /// unit: km
    /// default: 1.0
    pub segment_length_km: FloatValue,

    /// Speed at zero density
    /// unit: km / h
    /// default: 100.0
    pub free_flow_speed: FloatValue,

    /// Density at which traffic stops
    /// unit: veh / km
    /// default: 180.0
    pub jam_density: FloatValue,

    /// Density above which the capacity starts to drop
    /// unit: veh / km
    /// default: 45.0
    pub critical_density: FloatValue,

    /// Exponent of the fundamental diagram
    /// unit: dimensionless
    /// default: 2.0
    pub gamma: FloatValue,

    /// Maximum sustainable outflow of a segment
    /// unit: veh / h
    /// default: 3600.0
    pub max_flow: FloatValue,

    /// Fraction of `max_flow` lost once a segment is at jam density
    /// unit: dimensionless
    /// default: 0.1
    pub congested_capacity_drop: FloatValue,

    /// Rate at which speed relaxes towards its target
    /// unit: 1 / s
    /// default: 0.25
    pub speed_relaxation: FloatValue,

    /// Fraction of the queue remaining after one second without excess demand, below 1
    /// unit: dimensionless
    /// default: 0.97
    pub queue_relaxation: FloatValue,

    /// Speed reduction caused by a fully developed queue
    /// unit: dimensionless
    /// default: 0.45
    pub queue_speed_penalty: FloatValue,

    /// Lower bound of the queue speed multiplier
    /// unit: dimensionless
    /// default: 0.25
    pub min_queue_drag: FloatValue,

    /// Increase of the heavy vehicle ratio at jam density
    /// unit: dimensionless
    /// default: 0.0
    pub heavy_vehicle_gain: FloatValue,
}

impl Default for TrafficParameters {
    fn default() -> Self {
        Self {
            segment_length_km: 1.0,
            free_flow_speed: 100.0,
            jam_density: 180.0,
            critical_density: 45.0,
            gamma: 2.0,
            max_flow: 3600.0,
            congested_capacity_drop: 0.1,
            speed_relaxation: 0.25,
            queue_relaxation: 0.97,
            queue_speed_penalty: 0.45,
            min_queue_drag: 0.25,
            heavy_vehicle_gain: 0.0,
        }
    }
}

impl TrafficParameters {
    pub fn validate(&self) -> TwinResult<()> {
        ensure_positive("traffic.segment_length_km", self.segment_length_km)?;
        ensure_positive("traffic.free_flow_speed", self.free_flow_speed)?;
        ensure_positive("traffic.jam_density", self.jam_density)?;
        ensure_positive("traffic.critical_density", self.critical_density)?;
        if self.critical_density >= self.jam_density {
            return Err(TwinError::configuration(
                "traffic.critical_density",
                format!(
                    "must be below the jam density ({}), got {}",
                    self.jam_density, self.critical_density
                ),
            ));
        }
        ensure_positive("traffic.gamma", self.gamma)?;
        ensure_positive("traffic.max_flow", self.max_flow)?;
        ensure_fraction(
            "traffic.congested_capacity_drop",
            self.congested_capacity_drop,
        )?;
        ensure_positive("traffic.speed_relaxation", self.speed_relaxation)?;
        if !(0.0..1.0).contains(&self.queue_relaxation) {
            return Err(TwinError::configuration(
                "traffic.queue_relaxation",
                format!(
                    "must be within [0, 1) for queues to clear, got {}",
                    self.queue_relaxation
                ),
            ));
        }
        ensure_fraction("traffic.queue_speed_penalty", self.queue_speed_penalty)?;
        ensure_fraction("traffic.min_queue_drag", self.min_queue_drag)?;
        ensure_non_negative("traffic.heavy_vehicle_gain", self.heavy_vehicle_gain)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_are_valid() {
        TrafficParameters::default().validate().unwrap();
    }

    #[test]
    fn critical_density_above_jam() {
        let params = TrafficParameters {
            critical_density: 200.0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(TwinError::Configuration { field, .. }) if field == "traffic.critical_density"
        ));
    }

    #[test]
    fn queue_must_decay() {
        for queue_relaxation in [1.0, 1.2, -0.1, FloatValue::NAN] {
            let params = TrafficParameters {
                queue_relaxation,
                ..Default::default()
            };
            assert!(matches!(
                params.validate(),
                Err(TwinError::Configuration { field, .. }) if field == "traffic.queue_relaxation"
            ));
        }
        let params = TrafficParameters {
            queue_relaxation: 0.0,
            ..Default::default()
        };
        params.validate().unwrap();
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"free_flow_speed": 80.0, "jam_density": 150.0}"#;
        let params: TrafficParameters = serde_json::from_str(json).unwrap();

        assert_eq!(params.free_flow_speed, 80.0);
        assert_eq!(params.jam_density, 150.0);
        assert_eq!(params.critical_density, 45.0);
        assert_eq!(params.queue_relaxation, 0.97);
    }
}
