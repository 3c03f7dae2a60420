pub mod component;
#[cfg(test)]
mod example_components;
pub mod frame;
pub mod model;
pub mod standard_variables;
pub mod state;
pub mod timeseries;
pub mod timeseries_collection;

pub mod errors;
