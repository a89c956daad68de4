use connectors::error::StoreError;
use model::error::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriterError {
    /// The store kept leaving operations unprocessed (or kept failing
    /// transiently) until the retry policy gave up.
    #[error(
        "Retry attempts exhausted for table '{table}' after {attempts} attempts ({remaining} operations pending): {last_error}"
    )]
    RetriesExhausted {
        table: String,
        attempts: usize,
        remaining: usize,
        last_error: String,
    },

    #[error("Failed to write batch to table '{table}': {source}")]
    Store {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to encode record: {0}")]
    Encode(#[from] ModelError),
}

impl WriterError {
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            WriterError::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}
