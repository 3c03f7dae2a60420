pub mod components;
pub mod parameters;
