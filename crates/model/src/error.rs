use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Cannot encode non-finite number {0}")]
    NonFiniteNumber(f64),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Attribute '{attribute}': {source}")]
    Attribute {
        attribute: String,
        #[source]
        source: Box<ModelError>,
    },

    #[error("Invalid column mapping: {0}")]
    InvalidMapping(String),
}
