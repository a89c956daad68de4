use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("State storage failure: {0}")]
    Storage(#[from] sled::Error),

    /// A persisted document could not be decoded.
    #[error("Corrupt state entry '{key}': {message}")]
    Corrupt { key: String, message: String },

    #[error("Failed to encode state entry '{key}': {message}")]
    Encode { key: String, message: String },

    #[error("Migration job not found: {0}")]
    JobNotFound(String),

    /// The job was saved by someone else since it was loaded.
    #[error("Migration job '{job_id}' was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        job_id: String,
        expected: u64,
        found: u64,
    },
}

impl StateStoreError {
    pub fn is_corruption(&self) -> bool {
        matches!(self, StateStoreError::Corrupt { .. })
    }
}
