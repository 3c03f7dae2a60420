//! Model builder for constructing models from components.

use crate::component::{Component, GridType, RequirementType, StateValue};
use crate::errors::{TwinError, TwinResult};
use crate::timeseries::{FloatValue, TimeAxis};
use crate::timeseries_collection::{TimeseriesCollection, TimeseriesItem, VariableType};
use log::{debug, info};
use ndarray::Array2;
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::Graph;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::runtime::Model;
use super::types::{component_name, CGraph, VariableDefinition, C};
use super::validation::verify_definition;

/// Build a new model from a set of components.
///
/// The builder generates a graph that defines the inter-component dependencies
/// and determines what variables are endogenous and exogenous to the model.
/// This graph is used by the model to define the order in which components are solved.
#[derive(Default)]
pub struct ModelBuilder {
    components: Vec<C>,
    exogenous_variables: Vec<TimeseriesItem>,
    initial_values: HashMap<String, StateValue>,
    time_axis: Option<Arc<TimeAxis>>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with the builder.
    pub fn with_component(&mut self, component: Arc<dyn Component>) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Supply exogenous data to be used by the model.
    ///
    /// `values` must contain a row for every point on the time axis.
    /// Any unneeded timeseries will be ignored.
    pub fn with_exogenous_variable(
        &mut self,
        name: &str,
        unit: &str,
        grid_type: GridType,
        values: Array2<FloatValue>,
    ) -> &mut Self {
        self.exogenous_variables.push(TimeseriesItem {
            name: name.to_string(),
            unit: unit.to_string(),
            grid_type,
            variable_type: VariableType::Exogenous,
            values,
        });
        self
    }

    /// Adds some state to the set of initial values.
    ///
    /// These initial values are used to provide the values at `t_0`.
    /// Every variable that is read as `RequirementType::State` or `RequirementType::Lagged`
    /// needs an initial value, otherwise building the model fails.
    pub fn with_initial_values(
        &mut self,
        initial_values: HashMap<String, StateValue>,
    ) -> &mut Self {
        for (name, value) in initial_values.into_iter() {
            self.initial_values.insert(name, value);
        }
        self
    }

    /// Specify the time axis that will be used by the model.
    pub fn with_time_axis(&mut self, time_axis: TimeAxis) -> &mut Self {
        self.time_axis = Some(Arc::new(time_axis));
        self
    }

    /// Builds the component graph for the registered components and creates a concrete model.
    ///
    /// Returns an error if the component definitions are inconsistent, if the same-step
    /// dependencies contain a cycle or if any exogenous data or initial values are missing.
    pub fn build(&self) -> TwinResult<Model> {
        let time_axis = self
            .time_axis
            .clone()
            .ok_or_else(|| TwinError::configuration("time_axis", "no time axis was provided"))?;

        let mut graph: CGraph = Graph::new();
        let mut definitions: HashMap<String, VariableDefinition> = HashMap::new();
        let mut producers: HashMap<String, (NodeIndex, String)> = HashMap::new();
        let mut needs_initial_value: HashSet<String> = HashSet::new();

        let nodes: Vec<NodeIndex> = self
            .components
            .iter()
            .map(|component| graph.add_node(component.clone()))
            .collect();

        // Register every variable and its producer before linking so that
        // the registration order of components doesn't matter
        for (component, node) in self.components.iter().zip(&nodes) {
            let name = component_name(component);

            for requirement in component.definitions() {
                verify_definition(&mut definitions, &requirement, &name)?;

                if matches!(
                    requirement.requirement_type,
                    RequirementType::State | RequirementType::Lagged
                ) {
                    needs_initial_value.insert(requirement.name.clone());
                }

                if requirement.is_written() {
                    if let Some((_, first)) = producers.get(&requirement.name) {
                        return Err(TwinError::DuplicateProducer {
                            variable: requirement.name.clone(),
                            first: first.clone(),
                            second: name,
                        });
                    }
                    producers.insert(requirement.name.clone(), (*node, name.clone()));
                }
            }
        }

        // Same-step inputs must be solved after their producer.
        // State and lagged reads use values from the start of the step so they add no edges.
        for (component, node) in self.components.iter().zip(&nodes) {
            for requirement in component.inputs() {
                if requirement.requirement_type != RequirementType::Input {
                    continue;
                }
                if let Some((producer, _)) = producers.get(&requirement.name) {
                    graph.add_edge(*producer, *node, requirement.clone());
                }
            }
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| TwinError::CyclicDependency(component_name(&graph[cycle.node_id()])))?;

        // Create the timeseries collection using the information from the components.
        // Variables are added in name order so that checkpoints are stable.
        let mut names: Vec<&String> = definitions.keys().collect();
        names.sort();

        let n_times = time_axis.len();
        let mut collection = TimeseriesCollection::new();
        for name in names {
            let definition = &definitions[name];

            if producers.contains_key(name) {
                let mut values =
                    Array2::from_elem((n_times, definition.grid_type.size()), FloatValue::NAN);

                match self.initial_values.get(name) {
                    Some(initial) => {
                        if initial.len() != definition.grid_type.size() {
                            return Err(TwinError::WrongShape {
                                name: name.clone(),
                                expected: definition.grid_type.size(),
                                found: initial.len(),
                            });
                        }
                        values
                            .row_mut(0)
                            .iter_mut()
                            .zip(initial.as_slice())
                            .for_each(|(target, v)| *target = *v);
                    }
                    None if needs_initial_value.contains(name) => {
                        return Err(TwinError::MissingInitialValue(name.clone()));
                    }
                    None => {}
                }

                collection.add_timeseries(
                    name,
                    &definition.unit,
                    definition.grid_type,
                    values,
                    VariableType::Endogenous,
                )?;
            } else {
                let item = self
                    .exogenous_variables
                    .iter()
                    .find(|item| &item.name == name)
                    .ok_or_else(|| TwinError::MissingExogenous(name.clone()))?;

                if item.grid_type != definition.grid_type || item.unit != definition.unit {
                    return Err(TwinError::DefinitionMismatch {
                        variable: name.clone(),
                        component: "exogenous data".to_string(),
                        expected: format!(
                            "unit '{}' on grid {} ({})",
                            definition.unit, definition.grid_type, definition.declared_by
                        ),
                        found: format!("unit '{}' on grid {}", item.unit, item.grid_type),
                    });
                }
                if item.n_times() != n_times {
                    return Err(TwinError::Error(format!(
                        "exogenous data for '{}' has {} time points but the time axis has {}",
                        name,
                        item.n_times(),
                        n_times
                    )));
                }

                collection.add_timeseries(
                    name,
                    &item.unit,
                    item.grid_type,
                    item.values.clone(),
                    VariableType::Exogenous,
                )?;
            }
        }

        for item in &self.exogenous_variables {
            if !definitions.contains_key(&item.name) {
                debug!("Ignoring unused exogenous variable '{}'", item.name);
            }
        }

        info!(
            "Built model with {} components and {} variables over {} steps",
            self.components.len(),
            collection.len(),
            time_axis.n_steps()
        );

        Ok(Model::new(graph, order, collection, time_axis))
    }
}
