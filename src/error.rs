use thiserror::Error;

/// Error types for the welltest-fit library.
#[derive(Error, Debug)]
pub enum WellTestError {
    /// Rejected input: non-positive time, mismatched lengths, missing parameter, ...
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Parameter not found.
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    ParameterError(String),

    /// Error for boundary constraint violations.
    #[error("Bounds error: {0}")]
    BoundsError(String),

    /// Error indicating a singular (or numerically singular) matrix was encountered.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// Error during model or residual evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Error raised by the background fit controller.
    #[error("Controller error: {0}")]
    ControllerError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<crate::parameters::ParameterError> for WellTestError {
    fn from(err: crate::parameters::ParameterError) -> Self {
        match err {
            crate::parameters::ParameterError::ParameterNotFound { name } => {
                WellTestError::ParameterNotFound(name)
            }
            crate::parameters::ParameterError::BoundsError(e) => {
                WellTestError::BoundsError(e.to_string())
            }
            other => WellTestError::ParameterError(other.to_string()),
        }
    }
}

/// Result type alias for welltest-fit operations.
pub type Result<T> = std::result::Result<T, WellTestError>;
