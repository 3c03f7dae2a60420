//! Per-step snapshots of the model state.
//!
//! A [`Frame`] flattens every variable of the model into `key -> value` pairs so that it can be
//! consumed by recorders or streaming clients without knowledge of the component graph.
//! Scalar variables use their name as the key while segment-resolved variables are split into
//! one key per segment using [`segment_key`].

use crate::component::GridType;
use crate::errors::{TwinError, TwinResult};
use crate::timeseries::{FloatValue, Time};
use crate::timeseries_collection::{TimeseriesCollection, VariableType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key used for the value of a variable in a single segment
///
/// Segments are numbered from one, starting at the entry portal.
pub fn segment_key(name: &str, segment: usize) -> String {
    format!("{}|S{:02}", name, segment + 1)
}

/// The state of the model after a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Index of the step
    pub tick: usize,
    /// Time at the start of the step in seconds
    pub time: Time,
    pub values: BTreeMap<String, FloatValue>,
}

impl Frame {
    /// Collect the state of the step `tick` from a collection
    ///
    /// Endogenous values are taken from the end of the step and exogenous values are
    /// those that were used while solving it.
    pub fn from_collection(
        collection: &TimeseriesCollection,
        tick: usize,
        time: Time,
    ) -> TwinResult<Self> {
        let mut values = BTreeMap::new();

        for item in collection.iter() {
            let index = match item.variable_type {
                VariableType::Exogenous => tick,
                VariableType::Endogenous => tick + 1,
            };
            let row = item.row(index).ok_or_else(|| {
                TwinError::Error(format!("tick {} is outside of '{}'", tick, item.name))
            })?;

            match item.grid_type {
                GridType::Scalar => {
                    values.insert(item.name.clone(), row[0]);
                }
                GridType::Segments(_) => {
                    for (segment, value) in row.iter().enumerate() {
                        values.insert(segment_key(&item.name, segment), *value);
                    }
                }
            }
        }

        Ok(Self { tick, time, values })
    }

    pub fn get(&self, key: &str) -> Option<FloatValue> {
        self.values.get(key).copied()
    }

    /// Value of a segment-resolved variable in one segment (zero-based)
    pub fn segment(&self, name: &str, segment: usize) -> Option<FloatValue> {
        self.get(&segment_key(name, segment))
    }

    /// All segment values of a variable, ordered from the entry portal
    pub fn segments(&self, name: &str) -> Vec<FloatValue> {
        (0..)
            .map_while(|segment| self.segment(name, segment))
            .collect()
    }

    /// Largest value of a segment-resolved variable
    pub fn max_over_segments(&self, name: &str) -> Option<FloatValue> {
        self.segments(name).into_iter().reduce(FloatValue::max)
    }
}
