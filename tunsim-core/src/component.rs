//! Components are the building blocks of a model.
//!
//! Each component declares the variables it reads and writes through a set of
//! [`RequirementDefinition`]s and is solved once per time step by the [`crate::model::Model`].
//! Components hold only their parameters; all evolving state lives in the model's
//! [`crate::timeseries_collection::TimeseriesCollection`].

pub use crate::state::{InputState, OutputState, StateValue};

use crate::errors::TwinResult;
use crate::timeseries::Time;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// Spatial resolution of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridType {
    /// A single tunnel-wide value
    Scalar,
    /// One value per tunnel segment
    Segments(usize),
}

impl GridType {
    /// Number of values stored for each time point
    pub fn size(&self) -> usize {
        match self {
            GridType::Scalar => 1,
            GridType::Segments(n) => *n,
        }
    }
}

impl Display for GridType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GridType::Scalar => write!(f, "Scalar"),
            GridType::Segments(n) => write!(f, "Segments({})", n),
        }
    }
}

/// How a component uses a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequirementType {
    /// Read during the step.
    ///
    /// If another component produces the variable, its value for the end of the current step
    /// is read and the producer is always solved first.
    /// Otherwise the variable is exogenous and its value at the start of the step is used.
    Input,
    /// Written at the end of the step
    Output,
    /// Owned by the component: read at the start of the step and written for the end of the step
    State,
    /// Produced by another component but read at the start of the step.
    ///
    /// Lagged reads do not order components, which lets a feedback loop be closed with a
    /// one-step delay.
    Lagged,
}

/// A single variable used by a component
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementDefinition {
    pub name: String,
    pub unit: String,
    pub requirement_type: RequirementType,
    pub grid_type: GridType,
}

impl RequirementDefinition {
    pub fn new(
        name: &str,
        unit: &str,
        requirement_type: RequirementType,
        grid_type: GridType,
    ) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            requirement_type,
            grid_type,
        }
    }

    pub fn scalar_input(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Input, GridType::Scalar)
    }

    pub fn scalar_output(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Output, GridType::Scalar)
    }

    pub fn scalar_state(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::State, GridType::Scalar)
    }

    pub fn scalar_lagged(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Lagged, GridType::Scalar)
    }

    pub fn segment_input(name: &str, unit: &str, n_segments: usize) -> Self {
        Self::new(
            name,
            unit,
            RequirementType::Input,
            GridType::Segments(n_segments),
        )
    }

    pub fn segment_output(name: &str, unit: &str, n_segments: usize) -> Self {
        Self::new(
            name,
            unit,
            RequirementType::Output,
            GridType::Segments(n_segments),
        )
    }

    pub fn segment_state(name: &str, unit: &str, n_segments: usize) -> Self {
        Self::new(
            name,
            unit,
            RequirementType::State,
            GridType::Segments(n_segments),
        )
    }

    /// Whether the component reads this variable
    pub fn is_read(&self) -> bool {
        !matches!(self.requirement_type, RequirementType::Output)
    }

    /// Whether the component writes this variable
    pub fn is_written(&self) -> bool {
        matches!(
            self.requirement_type,
            RequirementType::Output | RequirementType::State
        )
    }
}

/// Component of a reduced order model
///
/// Each component encapsulates some set of physics that can be solved for a given time step.
/// Generally these components can be modelled as a set of ordinary differential equations (ODEs)
/// with an input state that can be solved as an initial value problem over a given time domain.
/// Here every component uses a single explicit update per step.
///
/// The resulting state of a component can then be used by other components as part of a `Model`
/// or solved alone during calibration.
///
/// Each component contains:
/// * parameters: Time invariant constants used to parameterize the components physics
/// * inputs: State information required to solve the model. This come from either other
///   components as part of a coupled system or from exogenous data.
/// * outputs: Information that is solved by the component
#[typetag::serde]
pub trait Component: Debug + Send + Sync {
    fn definitions(&self) -> Vec<RequirementDefinition>;

    /// Variables that are read by the component
    fn inputs(&self) -> Vec<RequirementDefinition> {
        self.definitions()
            .into_iter()
            .filter(|d| d.is_read())
            .collect()
    }

    fn input_names(&self) -> Vec<String> {
        self.inputs().into_iter().map(|d| d.name).collect()
    }

    /// Variables that are written by the component
    fn outputs(&self) -> Vec<RequirementDefinition> {
        self.definitions()
            .into_iter()
            .filter(|d| d.is_written())
            .collect()
    }

    fn output_names(&self) -> Vec<String> {
        self.outputs().into_iter().map(|d| d.name).collect()
    }

    /// Solve the component for the step `[t_current, t_next]`
    fn solve(
        &self,
        t_current: Time,
        t_next: Time,
        input_state: &InputState,
    ) -> TwinResult<OutputState>;

    /// Check the bounds of this component's variables once a step has completed
    ///
    /// `previous` holds the values at the start of the step and `current` the values at the end.
    /// Both expose the component's inputs and outputs.
    /// `tick` is the index of the step that was just solved.
    fn check_invariants(
        &self,
        _tick: usize,
        _previous: &InputState,
        _current: &InputState,
    ) -> TwinResult<()> {
        Ok(())
    }
}
