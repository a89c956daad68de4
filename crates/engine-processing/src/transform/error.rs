use model::error::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Unterminated placeholder at position {position} in template '{template}'")]
    UnterminatedPlaceholder { template: String, position: usize },

    #[error("Empty placeholder at position {position} in template '{template}'")]
    EmptyPlaceholder { template: String, position: usize },

    #[error("Invalid column mappings: {0}")]
    InvalidMappings(#[from] ModelError),
}
