//! Component parameters
//!
//! This module contains parameter structures for all tunnel components.
//! Each parameter struct provides defaults tuned for a two-lane urban tunnel
//! and can be partially overridden when deserialised.

mod emission;
mod fan_stage;
mod injector;
mod traffic;
mod visibility;

pub use emission::EmissionParameters;
pub use fan_stage::{FanStageParameters, StageThresholds};
pub use injector::InjectorParameters;
pub use traffic::TrafficParameters;
pub use visibility::VisibilityParameters;

use tunsim_core::errors::{TwinError, TwinResult};
use tunsim_core::timeseries::FloatValue;

pub(crate) fn ensure_positive(field: &str, value: FloatValue) -> TwinResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TwinError::configuration(
            field,
            format!("must be positive and finite, got {}", value),
        ))
    }
}

pub(crate) fn ensure_non_negative(field: &str, value: FloatValue) -> TwinResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TwinError::configuration(
            field,
            format!("must be non-negative and finite, got {}", value),
        ))
    }
}

/// Check that a value lies in `[0, 1]`
pub(crate) fn ensure_fraction(field: &str, value: FloatValue) -> TwinResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TwinError::configuration(
            field,
            format!("must be within [0, 1], got {}", value),
        ))
    }
}
