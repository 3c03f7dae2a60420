use crate::errors::{TwinError, TwinResult};
use crate::timeseries::{FloatValue, Time};
use ndarray::ArrayView1;
use std::collections::HashMap;

/// Represents a value that can be either scalar or resolved per segment
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    /// A single tunnel-wide value
    Scalar(FloatValue),
    /// One value per tunnel segment, ordered from the entry portal
    Segments(Vec<FloatValue>),
}

impl StateValue {
    /// Convert to a scalar value, aggregating if necessary
    ///
    /// For Segments variants, computes the mean of all segment values.
    pub fn to_scalar(&self) -> FloatValue {
        match self {
            StateValue::Scalar(v) => *v,
            StateValue::Segments(values) => {
                let sum: FloatValue = values.iter().sum();
                sum / (values.len() as FloatValue)
            }
        }
    }

    /// Check if this is a scalar value
    pub fn is_scalar(&self) -> bool {
        matches!(self, StateValue::Scalar(_))
    }

    /// Get the scalar value if this is a Scalar variant
    pub fn as_scalar(&self) -> Option<FloatValue> {
        match self {
            StateValue::Scalar(v) => Some(*v),
            StateValue::Segments(_) => None,
        }
    }

    /// Get the segment values if this is a Segments variant
    pub fn as_segments(&self) -> Option<&[FloatValue]> {
        match self {
            StateValue::Scalar(_) => None,
            StateValue::Segments(values) => Some(values),
        }
    }

    /// Values as a flat slice, one entry for a scalar
    pub fn as_slice(&self) -> &[FloatValue] {
        match self {
            StateValue::Scalar(v) => std::slice::from_ref(v),
            StateValue::Segments(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Input state for a component
///
/// A state is a collection of named values that can be used to represent the state of a system
/// at a given time.
/// Each entry is a view into one row of the model's storage so building a state doesn't copy.
#[derive(Debug, Clone)]
pub struct InputState<'a> {
    current_time: Time,
    state: Vec<(&'a str, ArrayView1<'a, FloatValue>)>,
}

impl<'a> InputState<'a> {
    pub fn build(values: Vec<(&'a str, ArrayView1<'a, FloatValue>)>, current_time: Time) -> Self {
        Self {
            current_time,
            state: values,
        }
    }

    pub fn empty() -> Self {
        Self {
            current_time: Time::NAN,
            state: vec![],
        }
    }

    pub fn current_time(&self) -> Time {
        self.current_time
    }

    /// Get all values of a variable
    pub fn get(&self, name: &str) -> TwinResult<ArrayView1<'a, FloatValue>> {
        self.state
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, view)| view.clone())
            .ok_or_else(|| TwinError::MissingVariable(name.to_string()))
    }

    /// Get the value of a scalar variable
    pub fn scalar(&self, name: &str) -> TwinResult<FloatValue> {
        let view = self.get(name)?;
        match view.len() {
            1 => Ok(view[0]),
            found => Err(TwinError::WrongShape {
                name: name.to_string(),
                expected: 1,
                found,
            }),
        }
    }

    /// Get the per-segment values of a variable, checking the segment count
    pub fn segments(&self, name: &str, n_segments: usize) -> TwinResult<ArrayView1<'a, FloatValue>> {
        let view = self.get(name)?;
        if view.len() != n_segments {
            return Err(TwinError::WrongShape {
                name: name.to_string(),
                expected: n_segments,
                found: view.len(),
            });
        }
        Ok(view)
    }

    /// Test if the state contains a value with the given name
    pub fn has(&self, name: &str) -> bool {
        self.state.iter().any(|(n, _)| *n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'a str, ArrayView1<'a, FloatValue>)> {
        self.state.iter()
    }

    /// Converts the state into an equivalent hashmap
    pub fn to_hashmap(&self) -> HashMap<String, StateValue> {
        self.state
            .iter()
            .map(|(name, view)| {
                let value = if view.len() == 1 {
                    StateValue::Scalar(view[0])
                } else {
                    StateValue::Segments(view.to_vec())
                };
                (name.to_string(), value)
            })
            .collect()
    }
}

/// Output state from a component
///
/// Each value is stored by the model against the end of the current step.
pub type OutputState = HashMap<String, StateValue>;
