//! Validation functions for model building.

use crate::component::RequirementDefinition;
use crate::errors::{TwinError, TwinResult};
use std::collections::HashMap;

use super::types::VariableDefinition;

/// Checks if the new definition is valid.
///
/// If any definitions share a name then the units and grid types must be equivalent.
///
/// Returns an error if the definition is inconsistent with any existing definitions.
pub(crate) fn verify_definition(
    definitions: &mut HashMap<String, VariableDefinition>,
    definition: &RequirementDefinition,
    component_name: &str,
) -> TwinResult<()> {
    match definitions.get(&definition.name) {
        Some(existing) => {
            if existing.unit != definition.unit {
                return Err(TwinError::DefinitionMismatch {
                    variable: definition.name.clone(),
                    component: component_name.to_string(),
                    expected: format!("unit '{}' ({})", existing.unit, existing.declared_by),
                    found: format!("unit '{}'", definition.unit),
                });
            }
            if existing.grid_type != definition.grid_type {
                return Err(TwinError::DefinitionMismatch {
                    variable: definition.name.clone(),
                    component: component_name.to_string(),
                    expected: format!("grid {} ({})", existing.grid_type, existing.declared_by),
                    found: format!("grid {}", definition.grid_type),
                });
            }
        }
        None => {
            definitions.insert(
                definition.name.clone(),
                VariableDefinition::from_requirement_definition(definition, component_name),
            );
        }
    }
    Ok(())
}
