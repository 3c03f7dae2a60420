//! Model struct and runtime execution.

use crate::errors::{TwinError, TwinResult};
use crate::frame::Frame;
use crate::timeseries::{Time, TimeAxis};
use crate::timeseries_collection::TimeseriesCollection;
use log::{debug, warn};
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::state_extraction::{extract_snapshot, extract_state};
use super::types::{component_name, CGraph, C};

/// A coupled set of components that are solved on a common time axis.
///
/// These components are solved over time steps defined by the [`TimeAxis`].
/// Components may pass state between themselves.
/// Each component may require information from other components to be solved (endogenous) or
/// predefined data (exogenous).
///
/// For example, an emission component may require the traffic density and speed of each segment
/// and provide the CO level.
/// The component is agnostic about where/how that state is defined.
/// If the model also contains a traffic component which produces the density,
/// then the emission component will be solved after the traffic component.
///
/// A step either completes for every component or leaves the model aborted with the clock
/// unchanged, so a partially solved step is never exposed.
#[derive(Debug, Serialize, Deserialize)]
pub struct Model {
    /// A directed graph with components as nodes and the edges defining the same-step
    /// dependencies between nodes.
    components: CGraph,
    /// Order in which components are solved each step.
    order: Vec<NodeIndex>,
    /// The model state.
    ///
    /// Variable names within the model are unique and these variable names are used by
    /// components to request state.
    collection: TimeseriesCollection,
    time_axis: Arc<TimeAxis>,
    time_index: usize,
    #[serde(default)]
    aborted: bool,
}

impl Model {
    /// Create a new Model with the given components and collection.
    ///
    /// `order` must be a topological ordering of `components`.
    pub fn new(
        components: CGraph,
        order: Vec<NodeIndex>,
        collection: TimeseriesCollection,
        time_axis: Arc<TimeAxis>,
    ) -> Self {
        Self {
            components,
            order,
            collection,
            time_axis,
            time_index: 0,
            aborted: false,
        }
    }

    /// Gets the time value at the start of the current step.
    pub fn current_time(&self) -> Time {
        self.time_axis.values()[self.time_index]
    }

    /// Index of the next step to be solved.
    pub fn time_index(&self) -> usize {
        self.time_index
    }

    pub fn time_axis(&self) -> &TimeAxis {
        &self.time_axis
    }

    fn current_time_bounds(&self) -> TwinResult<(Time, Time)> {
        self.time_axis
            .at_bounds(self.time_index)
            .ok_or(TwinError::Finished)
    }

    /// Solve a single component for the current timestep.
    ///
    /// The updated state from the component is then pushed into the model's timeseries collection
    /// to be later used by other components.
    /// The output state defines the values at the next time index as it represents the state
    /// at the start of the next timestep.
    fn step_model_component(&mut self, component: C) -> TwinResult<()> {
        let (start, end) = self.current_time_bounds()?;
        let definitions = component.definitions();

        let output_state = {
            let input_state =
                extract_state(&self.collection, &definitions, self.time_index, start)?;
            component.solve(start, end, &input_state)?
        };

        let output_names = component.output_names();
        for (key, state_value) in output_state.iter() {
            if !output_names.contains(key) {
                return Err(TwinError::Error(format!(
                    "{} returned '{}' which it doesn't declare as an output",
                    component_name(&component),
                    key
                )));
            }
            self.collection
                .set_row(key, self.time_index + 1, state_value)?;
        }
        if let Some(missing) = output_names
            .iter()
            .find(|name| !output_state.contains_key(*name))
        {
            return Err(TwinError::MissingVariable(missing.clone()));
        }

        Ok(())
    }

    /// Check the invariants of every component against the start and end of the current step.
    fn check_invariants(&self) -> TwinResult<()> {
        let (start, end) = self.current_time_bounds()?;

        for node in &self.order {
            let component = &self.components[*node];
            let names: Vec<String> = component
                .definitions()
                .into_iter()
                .map(|d| d.name)
                .collect();

            let previous = extract_snapshot(&self.collection, &names, self.time_index, start)?;
            let current = extract_snapshot(&self.collection, &names, self.time_index + 1, end)?;
            component.check_invariants(self.time_index, &previous, &current)?;
        }
        Ok(())
    }

    /// Solve each component for the current time step in dependency order.
    fn step_model(&mut self) -> TwinResult<()> {
        for node in self.order.clone() {
            let component = self.components[node].clone();
            self.step_model_component(component)?;
        }
        self.check_invariants()
    }

    /// Steps the model forward one time step.
    ///
    /// This solves the current time step, checks every component's invariants and then
    /// updates the index.
    /// Any failure aborts the model: the partially written step is discarded, the time index
    /// is left unchanged and further calls to `step` fail with [`TwinError::Aborted`].
    pub fn step(&mut self) -> TwinResult<Frame> {
        if self.aborted {
            return Err(TwinError::Aborted);
        }
        if self.finished() {
            return Err(TwinError::Finished);
        }

        let tick = self.time_index;
        if let Err(err) = self.step_model() {
            warn!("Step {} failed, aborting the model: {}", tick, err);
            self.collection.clear_row(tick + 1);
            self.aborted = true;
            return Err(err);
        }

        let frame = Frame::from_collection(&self.collection, tick, self.current_time())?;
        self.time_index += 1;
        debug!("Completed step {} (t = {} s)", tick, frame.time);

        Ok(frame)
    }

    /// Steps the model until the end of the time axis.
    ///
    /// Returns the frames of every step that was solved.
    pub fn run(&mut self) -> TwinResult<Vec<Frame>> {
        let mut frames = Vec::with_capacity(self.time_axis.n_steps() - self.time_index);
        while !self.finished() {
            frames.push(self.step()?);
        }
        Ok(frames)
    }

    /// Frame of a step that has already been solved.
    pub fn frame(&self, tick: usize) -> Option<Frame> {
        if tick >= self.time_index {
            return None;
        }
        let time = self.time_axis.at(tick)?;
        Frame::from_collection(&self.collection, tick, time).ok()
    }

    /// Create a diagram that represents the component graph.
    ///
    /// Useful for debugging.
    pub fn as_dot(&self) -> Dot<'_, &CGraph> {
        Dot::with_attr_getters(
            &self.components,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, er| format!("label = {:?}", er.weight().name),
            &|_, (_, component)| format!("label = {:?}", component_name(component)),
        )
    }

    /// Names of the components in the order they are solved.
    pub fn component_names(&self) -> Vec<String> {
        self.order
            .iter()
            .map(|node| component_name(&self.components[*node]))
            .collect()
    }

    /// Returns true if the model has no more time steps to process.
    pub fn finished(&self) -> bool {
        self.time_index >= self.time_axis.n_steps()
    }

    /// Returns true if a step failed.
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Returns a reference to the timeseries collection.
    pub fn timeseries(&self) -> &TimeseriesCollection {
        &self.collection
    }
}
