use model::error::ModelError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or rejected our credentials.
    #[error("Store unreachable or unauthenticated: {0}")]
    Connectivity(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Request rate exceeded the table's capacity.
    #[error("Request throttled: {0}")]
    Throttled(String),

    /// Timeouts and 5xx responses.
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Store service error: {0}")]
    Service(String),

    #[error("Table '{table}' did not become active within {waited:?}")]
    NotActive { table: String, waited: Duration },

    #[error("Malformed data: {0}")]
    Model(#[from] ModelError),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Throttled(_) | StoreError::Transient(_))
    }
}
