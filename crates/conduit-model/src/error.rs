use thiserror::Error;

use crate::parameter::ParameterType;

/// Errors raised while building or binding the step model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A step type string that is not one of START, MIDDLE or END
    #[error("Invalid step type: {0}")]
    InvalidStepType(String),

    /// A value that cannot be represented as the parameter's declared type
    #[error("Cannot convert {value} to {expected} for parameter '{parameter}'")]
    Coercion {
        parameter: String,
        expected: ParameterType,
        value: String,
    },

    /// A required field that names no parameter of the step
    #[error("Step '{step}' requires unknown parameter '{parameter}'")]
    MissingRequiredParameter { step: String, parameter: String },

    /// Two parameters of the same step share an id
    #[error("Step '{step}' declares parameter '{parameter}' more than once")]
    DuplicateParameter { step: String, parameter: String },
}

impl ModelError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ModelError::InvalidStepType(_) => "ERR_MODEL_STEP_TYPE",
            ModelError::Coercion { .. } => "ERR_MODEL_COERCION",
            ModelError::MissingRequiredParameter { .. } => "ERR_MODEL_REQUIRED_PARAMETER",
            ModelError::DuplicateParameter { .. } => "ERR_MODEL_DUPLICATE_PARAMETER",
        }
    }
}
