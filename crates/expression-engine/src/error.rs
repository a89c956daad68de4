use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformationError {
    #[error("Unknown transformation: {0}")]
    UnknownTransformation(String),

    #[error("Operation '{0}' requires an argument")]
    MissingArgument(String),

    #[error("Invalid argument '{argument}' for '{operation}': expected {expected}")]
    InvalidArgument {
        operation: String,
        argument: String,
        expected: String,
    },

    #[error("Cannot divide by zero")]
    DivideByZero,

    #[error("Cannot take square root of negative number")]
    NegativeSqrt,

    #[error("Operation '{0}' produced a result that is not a finite number")]
    NonFiniteResult(String),

    #[error("Error applying transformation '{expression}' to value '{value}': {source}")]
    Application {
        expression: String,
        value: String,
        #[source]
        source: Box<TransformationError>,
    },
}

impl TransformationError {
    /// The innermost error, unwrapping application context.
    pub fn root_cause(&self) -> &TransformationError {
        match self {
            TransformationError::Application { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformationError>;
