use crate::component::GridType;
use crate::errors::{TwinError, TwinResult};
use crate::state::StateValue;
use crate::timeseries::FloatValue;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialOrd, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum VariableType {
    /// Values that are defined outside of the model
    Exogenous,
    /// Values that are determined within the model
    Endogenous,
}

/// The values of one variable across the whole time axis
///
/// `values` has one row per time point and one column per region
/// (a single column for scalar variables).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeseriesItem {
    pub name: String,
    pub unit: String,
    pub grid_type: GridType,
    pub variable_type: VariableType,
    pub values: Array2<FloatValue>,
}

impl TimeseriesItem {
    /// Values at a time index
    pub fn row(&self, index: usize) -> Option<ArrayView1<'_, FloatValue>> {
        if index < self.values.nrows() {
            Some(self.values.row(index))
        } else {
            None
        }
    }

    pub fn n_times(&self) -> usize {
        self.values.nrows()
    }
}

/// A collection of time series data.
/// Allows for easy access to time series data by name across the whole model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeseriesCollection {
    items: Vec<TimeseriesItem>,
}

impl TimeseriesCollection {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add a new timeseries to the collection
    ///
    /// Returns an error if a timeseries with the same name already exists in the collection
    /// or the number of columns doesn't match the grid.
    pub fn add_timeseries(
        &mut self,
        name: &str,
        unit: &str,
        grid_type: GridType,
        values: Array2<FloatValue>,
        variable_type: VariableType,
    ) -> TwinResult<()> {
        if self.get_by_name(name).is_some() {
            return Err(TwinError::Error(format!(
                "timeseries {} already exists",
                name
            )));
        }
        if values.ncols() != grid_type.size() {
            return Err(TwinError::WrongShape {
                name: name.to_string(),
                expected: grid_type.size(),
                found: values.ncols(),
            });
        }

        self.items.push(TimeseriesItem {
            name: name.to_string(),
            unit: unit.to_string(),
            grid_type,
            variable_type,
            values,
        });
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&TimeseriesItem> {
        self.items.iter().find(|x| x.name == name)
    }

    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut TimeseriesItem> {
        self.items.iter_mut().find(|x| x.name == name)
    }

    /// Values of a variable at a time index
    pub fn row(&self, name: &str, index: usize) -> Option<ArrayView1<'_, FloatValue>> {
        self.get_by_name(name).and_then(|item| item.row(index))
    }

    /// Overwrite the values of a variable at a time index
    pub fn set_row(&mut self, name: &str, index: usize, value: &StateValue) -> TwinResult<()> {
        let item = self
            .get_by_name_mut(name)
            .ok_or_else(|| TwinError::MissingVariable(name.to_string()))?;

        let expected = item.values.ncols();
        if value.len() != expected {
            return Err(TwinError::WrongShape {
                name: name.to_string(),
                expected,
                found: value.len(),
            });
        }
        if index >= item.values.nrows() {
            return Err(TwinError::Error(format!(
                "time index {} is outside of the timeseries {}",
                index, name
            )));
        }

        item.values
            .row_mut(index)
            .iter_mut()
            .zip(value.as_slice())
            .for_each(|(target, v)| *target = *v);
        Ok(())
    }

    /// Reset the endogenous values at a time index to NaN
    ///
    /// Exogenous values are left untouched.
    pub fn clear_row(&mut self, index: usize) {
        self.items
            .iter_mut()
            .filter(|item| item.variable_type == VariableType::Endogenous)
            .filter(|item| index < item.values.nrows())
            .for_each(|item| item.values.row_mut(index).fill(FloatValue::NAN));
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeseriesItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
