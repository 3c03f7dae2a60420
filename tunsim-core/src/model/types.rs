//! Type definitions for the model module.

use crate::component::{Component, GridType, RequirementDefinition};
use petgraph::Graph;
use std::sync::Arc;

/// Type alias for a component wrapped in an Arc for shared ownership.
pub type C = Arc<dyn Component>;

/// Type alias for the component dependency graph.
///
/// Edges run from the producer of a variable to the component that reads it within the same step.
pub type CGraph = Graph<C, RequirementDefinition>;

/// Internal definition tracking for a variable during model building.
#[derive(Debug)]
pub(crate) struct VariableDefinition {
    pub name: String,
    pub unit: String,
    pub grid_type: GridType,
    /// Name of the component that first declared the variable
    pub declared_by: String,
}

impl VariableDefinition {
    pub fn from_requirement_definition(
        definition: &RequirementDefinition,
        component_name: &str,
    ) -> Self {
        Self {
            name: definition.name.clone(),
            unit: definition.unit.clone(),
            grid_type: definition.grid_type,
            declared_by: component_name.to_string(),
        }
    }
}

/// Short name of a component, derived from its `Debug` representation
pub(crate) fn component_name(component: &C) -> String {
    let name = format!("{:?}", component);
    name.split(['{', ' ', '('])
        .next()
        .unwrap_or("UnknownComponent")
        .to_string()
}
