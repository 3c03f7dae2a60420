//! State extraction functions for model components.

use crate::component::{InputState, RequirementDefinition, RequirementType};
use crate::errors::{TwinError, TwinResult};
use crate::timeseries::Time;
use crate::timeseries_collection::{TimeseriesCollection, VariableType};

/// Row of the collection that a requirement reads while solving the step starting at `time_index`
///
/// Same-step inputs produced by another component come from the end of the step,
/// everything else (exogenous data, a component's own state and lagged reads) from the start.
pub fn read_index(
    requirement_type: RequirementType,
    variable_type: VariableType,
    time_index: usize,
) -> usize {
    match (requirement_type, variable_type) {
        (RequirementType::Input, VariableType::Endogenous) => time_index + 1,
        _ => time_index,
    }
}

/// Extract the input state for the step starting at `time_index`.
///
/// The result contains a view of the values for every requirement that the component reads.
pub fn extract_state<'a>(
    collection: &'a TimeseriesCollection,
    requirements: &[RequirementDefinition],
    time_index: usize,
    t_current: Time,
) -> TwinResult<InputState<'a>> {
    let mut state = Vec::with_capacity(requirements.len());

    for requirement in requirements.iter().filter(|r| r.is_read()) {
        let item = collection
            .get_by_name(&requirement.name)
            .ok_or_else(|| TwinError::MissingVariable(requirement.name.clone()))?;
        let index = read_index(requirement.requirement_type, item.variable_type, time_index);
        let row = item
            .row(index)
            .ok_or_else(|| TwinError::MissingVariable(requirement.name.clone()))?;
        state.push((item.name.as_str(), row));
    }

    Ok(InputState::build(state, t_current))
}

/// Extract the values of a set of variables at a single time index.
///
/// Used to compare the state of a component before and after a step.
pub fn extract_snapshot<'a>(
    collection: &'a TimeseriesCollection,
    names: &[String],
    time_index: usize,
    time: Time,
) -> TwinResult<InputState<'a>> {
    let mut state = Vec::with_capacity(names.len());

    for name in names {
        let item = collection
            .get_by_name(name)
            .ok_or_else(|| TwinError::MissingVariable(name.clone()))?;
        let row = item
            .row(time_index)
            .ok_or_else(|| TwinError::MissingVariable(name.clone()))?;
        state.push((item.name.as_str(), row));
    }

    Ok(InputState::build(state, time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::GridType;
    use ndarray::array;

    fn collection() -> TimeseriesCollection {
        let mut collection = TimeseriesCollection::new();
        collection
            .add_timeseries(
                "Demand",
                "veh / h",
                GridType::Scalar,
                array![[1.0], [2.0], [3.0]],
                VariableType::Exogenous,
            )
            .unwrap();
        collection
            .add_timeseries(
                "Speed",
                "km / h",
                GridType::Scalar,
                array![[10.0], [20.0], [30.0]],
                VariableType::Endogenous,
            )
            .unwrap();
        collection
    }

    #[test]
    fn input_rows() {
        let collection = collection();
        let requirements = vec![
            RequirementDefinition::scalar_input("Demand", "veh / h"),
            RequirementDefinition::scalar_input("Speed", "km / h"),
        ];
        let state = extract_state(&collection, &requirements, 1, 1.0).unwrap();

        // Exogenous data is read at the start of the step
        assert_eq!(state.scalar("Demand").unwrap(), 2.0);
        // Endogenous inputs have already been solved for the end of the step
        assert_eq!(state.scalar("Speed").unwrap(), 30.0);
    }

    #[test]
    fn state_and_lagged_rows() {
        let collection = collection();
        let requirements = vec![
            RequirementDefinition::scalar_state("Speed", "km / h"),
            RequirementDefinition::scalar_output("Ignored", "1"),
        ];
        let state = extract_state(&collection, &requirements, 1, 1.0).unwrap();
        assert_eq!(state.scalar("Speed").unwrap(), 20.0);
        assert!(!state.has("Ignored"));

        let lagged = vec![RequirementDefinition::scalar_lagged("Speed", "km / h")];
        let state = extract_state(&collection, &lagged, 0, 0.0).unwrap();
        assert_eq!(state.scalar("Speed").unwrap(), 10.0);
    }

    #[test]
    fn missing_variable() {
        let collection = collection();
        let requirements = vec![RequirementDefinition::scalar_input("Density", "veh / km")];
        assert_eq!(
            extract_state(&collection, &requirements, 0, 0.0).unwrap_err(),
            TwinError::MissingVariable("Density".to_string())
        );
    }

    #[test]
    fn snapshot() {
        let collection = collection();
        let state =
            extract_snapshot(&collection, &["Demand".to_string(), "Speed".to_string()], 2, 2.0)
                .unwrap();
        assert_eq!(state.scalar("Demand").unwrap(), 3.0);
        assert_eq!(state.scalar("Speed").unwrap(), 30.0);
    }
}
