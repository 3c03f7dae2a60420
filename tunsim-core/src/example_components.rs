use crate::component::{Component, InputState, OutputState, RequirementDefinition};
use crate::errors::{TwinError, TwinResult};
use crate::state::StateValue;
use crate::timeseries::{FloatValue, Time};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TestComponentParameters {
    pub conversion_factor: FloatValue,
}

/// Converts an exogenous demand into a load
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TestComponent {
    pub parameters: TestComponentParameters,
}

impl TestComponent {
    pub fn from_parameters(parameters: TestComponentParameters) -> Self {
        Self { parameters }
    }
}

#[typetag::serde]
impl Component for TestComponent {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::scalar_input("Demand", "veh / h"),
            RequirementDefinition::scalar_output("Load", "1"),
        ]
    }

    fn solve(
        &self,
        _t_current: Time,
        _t_next: Time,
        input_state: &InputState,
    ) -> TwinResult<OutputState> {
        let demand = input_state.scalar("Demand")?;
        Ok(OutputState::from([(
            "Load".to_string(),
            StateValue::Scalar(demand * self.parameters.conversion_factor),
        )]))
    }
}

/// A store that fills with the load and drains at a rate set in the previous step
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TestReservoir {
    pub max_level: FloatValue,
}

#[typetag::serde]
impl Component for TestReservoir {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::scalar_input("Load", "1"),
            RequirementDefinition::scalar_lagged("Drain", "1 / s"),
            RequirementDefinition::scalar_state("Level", "1"),
        ]
    }

    fn solve(
        &self,
        t_current: Time,
        t_next: Time,
        input_state: &InputState,
    ) -> TwinResult<OutputState> {
        let dt = t_next - t_current;
        let load = input_state.scalar("Load")?;
        let drain = input_state.scalar("Drain")?;
        let level = input_state.scalar("Level")?;

        Ok(OutputState::from([(
            "Level".to_string(),
            StateValue::Scalar(level + dt * (load - drain * level)),
        )]))
    }

    fn check_invariants(
        &self,
        tick: usize,
        _previous: &InputState,
        current: &InputState,
    ) -> TwinResult<()> {
        let level = current.scalar("Level")?;
        if level > self.max_level {
            return Err(TwinError::InvariantViolation {
                tick,
                variable: "Level".to_string(),
                segment: None,
                value: level,
            });
        }
        Ok(())
    }
}

/// Sets the drain rate from the current level
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TestDrain {
    pub gain: FloatValue,
}

#[typetag::serde]
impl Component for TestDrain {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::scalar_input("Level", "1"),
            RequirementDefinition::scalar_output("Drain", "1 / s"),
        ]
    }

    fn solve(
        &self,
        _t_current: Time,
        _t_next: Time,
        input_state: &InputState,
    ) -> TwinResult<OutputState> {
        let level = input_state.scalar("Level")?;
        Ok(OutputState::from([(
            "Drain".to_string(),
            StateValue::Scalar(self.gain * level),
        )]))
    }
}

/// Copies one variable into another
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TestLink {
    pub from: String,
    pub to: String,
}

#[typetag::serde]
impl Component for TestLink {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::scalar_input(&self.from, "1"),
            RequirementDefinition::scalar_output(&self.to, "1"),
        ]
    }

    fn solve(
        &self,
        _t_current: Time,
        _t_next: Time,
        input_state: &InputState,
    ) -> TwinResult<OutputState> {
        let value = input_state.scalar(&self.from)?;
        Ok(OutputState::from([(
            self.to.clone(),
            StateValue::Scalar(value),
        )]))
    }
}
