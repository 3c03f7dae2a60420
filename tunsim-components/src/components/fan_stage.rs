//! Fan stage controller
//!
//! A discrete state machine that commands the ventilation fans from the air quality in the
//! tunnel. Switching uses a hysteresis band per stage so that a signal hovering around a
//! threshold doesn't make the fans chatter.
//!
//! # Control signal
//!
//! The signal combines the worst CO level and the worst visibility over all segments:
//!
//! $$u = \max\left(\frac{\max_i c_i}{c_{ref}}, 1 - \min_i V_i\right)$$
//!
//! # Transitions
//!
//! From stage $k$ the controller moves up to $k + 1$ once $u$ reaches the upper threshold of
//! stage $k + 1$. Otherwise it moves down to $k - 1$ once $u$ is at or below the lower
//! threshold of stage $k$. It never moves more than one stage per step.
//!
//! The removal rate of the commanded stage is published for the emission component, which
//! applies it on the following step.

use crate::parameters::FanStageParameters;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use tunsim_core::component::{
    Component, GridType, InputState, OutputState, RequirementDefinition, StateValue,
};
use tunsim_core::errors::{TwinError, TwinResult};
use tunsim_core::standard_variables::{
    VAR_CO, VAR_CONTROL_SIGNAL, VAR_FAN_STAGE, VAR_REMOVAL_RATE, VAR_VISIBILITY,
};
use tunsim_core::timeseries::{FloatValue, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FanStage {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl FanStage {
    pub const ALL: [FanStage; 4] = [FanStage::Off, FanStage::Low, FanStage::Medium, FanStage::High];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_float(self) -> FloatValue {
        self.index() as FloatValue
    }

    fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Stage commanded for the next step given the current control signal
    pub fn transition(self, signal: FloatValue, parameters: &FanStageParameters) -> Self {
        let k = self.index();
        if k < 3 && signal >= parameters.thresholds[k].upper {
            return Self::ALL[k + 1];
        }
        if k > 0 && signal <= parameters.thresholds[k - 1].lower {
            return Self::ALL[k - 1];
        }
        self
    }
}

impl fmt::Display for FanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TryFrom<FloatValue> for FanStage {
    type Error = TwinError;

    /// Stages are stored as floats in the model so only exact integers are accepted
    fn try_from(value: FloatValue) -> Result<Self, Self::Error> {
        if value.fract() == 0.0 && value >= 0.0 {
            if let Some(stage) = Self::from_index(value as usize) {
                return Ok(stage);
            }
        }
        Err(TwinError::Error(format!("{} is not a valid fan stage", value)))
    }
}

/// Hysteresis controller for the tunnel fans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanStageController {
    parameters: FanStageParameters,
    n_segments: usize,
}

impl FanStageController {
    pub fn from_parameters(parameters: FanStageParameters, n_segments: usize) -> Self {
        Self {
            parameters,
            n_segments,
        }
    }

    pub fn parameters(&self) -> &FanStageParameters {
        &self.parameters
    }

    pub fn control_signal(&self, co: &[FloatValue], visibility: &[FloatValue]) -> FloatValue {
        let co_max = co.iter().copied().fold(0.0, FloatValue::max);
        let visibility_min = visibility.iter().copied().fold(1.0, FloatValue::min);
        (co_max / self.parameters.co_reference_ppm).max(1.0 - visibility_min)
    }

    pub fn removal_rate(&self, stage: FanStage) -> FloatValue {
        self.parameters.removal_rates[stage.index()]
    }

    fn violation(tick: usize, variable: &str, value: FloatValue) -> TwinError {
        TwinError::InvariantViolation {
            tick,
            variable: variable.to_string(),
            segment: None,
            value,
        }
    }
}

#[typetag::serde]
impl Component for FanStageController {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        let grid = GridType::Segments(self.n_segments);
        vec![
            VAR_CO.input(grid),
            VAR_VISIBILITY.input(grid),
            VAR_FAN_STAGE.state(GridType::Scalar),
            VAR_REMOVAL_RATE.output(GridType::Scalar),
            VAR_CONTROL_SIGNAL.output(GridType::Scalar),
        ]
    }

    fn solve(
        &self,
        t_current: Time,
        _t_next: Time,
        input_state: &InputState,
    ) -> TwinResult<OutputState> {
        let co = input_state.segments(VAR_CO.name, self.n_segments)?.to_vec();
        let visibility = input_state
            .segments(VAR_VISIBILITY.name, self.n_segments)?
            .to_vec();
        let stage = FanStage::try_from(input_state.scalar(VAR_FAN_STAGE.name)?)?;

        let signal = self.control_signal(&co, &visibility);
        let next = stage.transition(signal, &self.parameters);
        if next != stage {
            debug!(
                "Fan stage {} -> {} at t = {} s (signal {:.3})",
                stage, next, t_current, signal
            );
        }

        Ok(OutputState::from([
            (
                VAR_FAN_STAGE.name.to_string(),
                StateValue::Scalar(next.as_float()),
            ),
            (
                VAR_REMOVAL_RATE.name.to_string(),
                StateValue::Scalar(self.removal_rate(next)),
            ),
            (
                VAR_CONTROL_SIGNAL.name.to_string(),
                StateValue::Scalar(signal),
            ),
        ]))
    }

    fn check_invariants(
        &self,
        tick: usize,
        previous: &InputState,
        current: &InputState,
    ) -> TwinResult<()> {
        let value = current.scalar(VAR_FAN_STAGE.name)?;
        let stage = FanStage::try_from(value)
            .map_err(|_| Self::violation(tick, VAR_FAN_STAGE.name, value))?;
        let previous_stage = previous.scalar(VAR_FAN_STAGE.name)?;
        if (value - previous_stage).abs() > 1.0 {
            return Err(Self::violation(tick, VAR_FAN_STAGE.name, value));
        }

        let removal_rate = current.scalar(VAR_REMOVAL_RATE.name)?;
        if removal_rate != self.removal_rate(stage) {
            return Err(Self::violation(tick, VAR_REMOVAL_RATE.name, removal_rate));
        }
        Ok(())
    }
}
