//! Running a scenario
//!
//! [`reset`] assembles the tunnel model for a [`Scenario`] and [`Simulation::step`] advances it
//! one tick at a time, returning a [`Frame`] for every completed tick.
//! A simulation owns all of its state so independent runs can be moved to separate threads.

use crate::scenario::Scenario;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tunsim_components::components::{
    EmissionComponent, FanStageController, TrafficComponent, VisibilityComponent,
};
use tunsim_core::component::{GridType, StateValue};
use tunsim_core::errors::{TwinError, TwinResult};
use tunsim_core::frame::Frame;
use tunsim_core::model::{Model, ModelBuilder};
use tunsim_core::standard_variables::{
    VAR_CO, VAR_DEMAND, VAR_DENSITY, VAR_FAN_STAGE, VAR_QUEUE, VAR_REMOVAL_RATE, VAR_SPEED,
    VAR_VISIBILITY,
};
use tunsim_core::timeseries::{FloatValue, Time};

/// A single run of a scenario
#[derive(Debug, Serialize, Deserialize)]
pub struct Simulation {
    scenario_id: String,
    model: Model,
}

/// Validate a scenario and build the model that runs it
pub fn reset(scenario: &Scenario) -> TwinResult<Simulation> {
    Simulation::reset(scenario)
}

/// Advance a simulation by one tick
pub fn step(simulation: &mut Simulation) -> TwinResult<Frame> {
    simulation.step()
}

pub fn is_finished(simulation: &Simulation) -> bool {
    simulation.is_finished()
}

impl Simulation {
    pub fn reset(scenario: &Scenario) -> TwinResult<Self> {
        scenario.validate()?;

        let n = scenario.n_segments();
        let time_axis = scenario.time_axis()?;
        let demand = scenario.demand.sample(&time_axis);
        let base_heavy_vehicle_ratio = scenario
            .segments
            .iter()
            .map(|s| s.heavy_vehicle_ratio)
            .collect();

        let emission = EmissionComponent::from_parameters(scenario.emission.clone(), n);
        let initial_values = initial_values(scenario, &emission);

        let model = ModelBuilder::new()
            .with_component(Arc::new(scenario.injector()?))
            .with_component(Arc::new(TrafficComponent::from_parameters(
                scenario.traffic.clone(),
                base_heavy_vehicle_ratio,
            )))
            .with_component(Arc::new(emission))
            .with_component(Arc::new(VisibilityComponent::from_parameters(
                scenario.visibility.clone(),
                n,
            )))
            .with_component(Arc::new(FanStageController::from_parameters(
                scenario.fan_stage.clone(),
                n,
            )))
            .with_exogenous_variable(VAR_DEMAND.name, VAR_DEMAND.unit, GridType::Scalar, demand)
            .with_initial_values(initial_values)
            .with_time_axis(time_axis)
            .build()?;

        info!(
            "Reset scenario '{}': {} segments, {} steps of {} s",
            scenario.id,
            n,
            model.time_axis().n_steps(),
            scenario.dt_s
        );

        Ok(Self {
            scenario_id: scenario.id.clone(),
            model,
        })
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    /// Solve the next tick
    ///
    /// A failed tick aborts the run without advancing the clock.
    pub fn step(&mut self) -> TwinResult<Frame> {
        self.model.step()
    }

    pub fn is_finished(&self) -> bool {
        self.model.finished()
    }

    /// Step until the end of the scenario, returning the frame of every remaining tick
    pub fn run_to_end(&mut self) -> TwinResult<Vec<Frame>> {
        self.model.run()
    }

    /// Index of the next tick to be solved
    pub fn tick(&self) -> usize {
        self.model.time_index()
    }

    pub fn current_time(&self) -> Time {
        self.model.current_time()
    }

    /// Frame of an already completed tick
    pub fn frame(&self, tick: usize) -> Option<Frame> {
        self.model.frame(tick)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Serialise the full state of the run
    ///
    /// Restoring a checkpoint continues the run exactly where it was taken.
    pub fn checkpoint(&self) -> TwinResult<String> {
        toml::to_string(self).map_err(|e| TwinError::Error(format!("checkpoint failed: {}", e)))
    }

    pub fn restore(checkpoint: &str) -> TwinResult<Self> {
        toml::from_str(checkpoint)
            .map_err(|e| TwinError::Error(format!("invalid checkpoint: {}", e)))
    }

    /// Graphviz representation of the component graph
    pub fn to_dot(&self) -> String {
        format!("{:?}", self.model.as_dot())
    }
}

/// State of every segment at the start of the run
///
/// The CO level defaults to the balance between the initial traffic's emissions and the
/// removal rate of the initial fan stage.
fn initial_values(
    scenario: &Scenario,
    emission: &EmissionComponent,
) -> HashMap<String, StateValue> {
    let segments = &scenario.segments;
    let per_segment = |f: &dyn Fn(usize) -> FloatValue| {
        StateValue::Segments((0..segments.len()).map(f).collect())
    };
    let removal_rate = scenario.fan_stage.removal_rates[scenario.initial_fan_stage.index()];

    let co = per_segment(&|i| {
        let s = &segments[i];
        s.co.unwrap_or_else(|| {
            let source = emission.raw_source(s.density, s.speed, s.heavy_vehicle_ratio, 0.0);
            emission.steady_state(source, removal_rate)
        })
    });
    let visibility = per_segment(&|i| {
        segments[i]
            .visibility
            .unwrap_or(scenario.visibility.baseline)
    });

    HashMap::from([
        (
            VAR_DENSITY.name.to_string(),
            per_segment(&|i| segments[i].density),
        ),
        (VAR_SPEED.name.to_string(), per_segment(&|i| segments[i].speed)),
        (VAR_QUEUE.name.to_string(), per_segment(&|i| segments[i].queue)),
        (VAR_CO.name.to_string(), co),
        (VAR_VISIBILITY.name.to_string(), visibility),
        (
            VAR_FAN_STAGE.name.to_string(),
            StateValue::Scalar(scenario.initial_fan_stage.as_float()),
        ),
        (
            VAR_REMOVAL_RATE.name.to_string(),
            StateValue::Scalar(removal_rate),
        ),
    ])
}
