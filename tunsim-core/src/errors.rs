use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TwinError {
    #[error("{0}")]
    Error(String),
    #[error("Invalid configuration for '{field}': {reason}")]
    Configuration { field: String, reason: String },
    #[error("Invariant violated at tick {tick}: {variable}{} = {value}", segment_suffix(.segment))]
    InvariantViolation {
        tick: usize,
        variable: String,
        segment: Option<usize>,
        value: f64,
    },
    #[error("No variable named '{0}' is available in this state")]
    MissingVariable(String),
    #[error("Variable '{0}' is required but is neither produced by a component nor supplied as exogenous data")]
    MissingExogenous(String),
    #[error("Variable '{0}' is read from a previous tick but has no initial value")]
    MissingInitialValue(String),
    #[error("Inconsistent definitions for '{variable}': component '{component}' declares {found} but {expected} was already declared")]
    DefinitionMismatch {
        variable: String,
        component: String,
        expected: String,
        found: String,
    },
    #[error("Variable '{variable}' is produced by both '{first}' and '{second}'")]
    DuplicateProducer {
        variable: String,
        first: String,
        second: String,
    },
    #[error("Component graph contains a cycle through '{0}'. Use a lagged requirement to close feedback loops")]
    CyclicDependency(String),
    #[error("Wrong number of values for '{name}'. Expected {expected}, got {found}")]
    WrongShape {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("The run has already reached the end of its time axis")]
    Finished,
    #[error("The run was aborted by an earlier failure and cannot be stepped")]
    Aborted,
}

impl TwinError {
    /// Shorthand for a configuration error on a named field
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TwinError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn segment_suffix(segment: &Option<usize>) -> String {
    match segment {
        Some(index) => format!("[segment {}]", index),
        None => String::new(),
    }
}

/// Convenience type for `Result<T, TwinError>`.
pub type TwinResult<T> = Result<T, TwinError>;
