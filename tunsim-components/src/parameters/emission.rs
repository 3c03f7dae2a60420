use super::{ensure_non_negative, ensure_positive};
use serde::{Deserialize, Serialize};
use tunsim_core::errors::TwinResult;
use tunsim_core::timeseries::FloatValue;

/// Parameters for the CO source and filter
///
/// The per-vehicle emission curve is
///
/// $$e(v) = a_0 + \frac{a_1}{v + \delta} + a_2 v$$
///
/// which is high for crawling traffic, has a minimum at moderate speeds and grows slowly
/// at high speeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionParameters {
    /// Conversion from weighted vehicle emissions to a CO level
    /// unit: ppm km / veh
    /// default: 0.3
    pub source_scale: FloatValue,

    /// Constant term of the per-vehicle emission curve
    /// default: 0.6
    pub emission_a0: FloatValue,

    /// Low speed term of the per-vehicle emission curve
    /// unit: km / h
    /// default: 40.0
    pub emission_a1: FloatValue,

    /// High speed term of the per-vehicle emission curve
    /// unit: h / km
    /// default: 0.005
    pub emission_a2: FloatValue,

    /// Speed offset of the low speed term
    /// unit: km / h
    /// default: 5.0
    pub emission_delta: FloatValue,

    /// Additional weight of heavy vehicles
    /// default: 1.4
    pub heavy_vehicle_weight: FloatValue,

    /// Speed below which stop-and-go driving increases emissions
    /// unit: km / h
    /// default: 40.0
    pub stop_go_speed: FloatValue,

    /// Increase of emissions for stationary traffic
    /// default: 1.2
    pub stop_go_gain: FloatValue,

    /// Time constant of the source filter
    /// unit: s
    /// default: 35.0
    pub source_tau_s: FloatValue,

    /// Increase of the source per unit of incident severity
    /// default: 1.5
    pub amplification_factor: FloatValue,
}

impl Default for EmissionParameters {
    fn default() -> Self {
        Self {
            source_scale: 0.3,
            emission_a0: 0.6,
            emission_a1: 40.0,
            emission_a2: 0.005,
            emission_delta: 5.0,
            heavy_vehicle_weight: 1.4,
            stop_go_speed: 40.0,
            stop_go_gain: 1.2,
            source_tau_s: 35.0,
            amplification_factor: 1.5,
        }
    }
}

impl EmissionParameters {
    pub fn validate(&self) -> TwinResult<()> {
        ensure_non_negative("emission.source_scale", self.source_scale)?;
        ensure_non_negative("emission.emission_a0", self.emission_a0)?;
        ensure_non_negative("emission.emission_a1", self.emission_a1)?;
        ensure_non_negative("emission.emission_a2", self.emission_a2)?;
        ensure_positive("emission.emission_delta", self.emission_delta)?;
        ensure_non_negative("emission.heavy_vehicle_weight", self.heavy_vehicle_weight)?;
        ensure_positive("emission.stop_go_speed", self.stop_go_speed)?;
        ensure_non_negative("emission.stop_go_gain", self.stop_go_gain)?;
        ensure_positive("emission.source_tau_s", self.source_tau_s)?;
        ensure_non_negative("emission.amplification_factor", self.amplification_factor)?;
        Ok(())
    }
}
