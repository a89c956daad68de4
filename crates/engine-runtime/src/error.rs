use connectors::error::StoreError;
use engine_core::error::StateStoreError;
use engine_processing::{error::WriterError, transform::error::MappingError};
use model::error::ModelError;
use std::fmt;
use thiserror::Error;

/// Broad class of a [`MigrationError`], used for reporting and for deciding
/// whether the job itself can be marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Store unreachable or credentials rejected.
    Connectivity,
    /// The store kept leaving writes unprocessed.
    PartialWrite,
    Mapping,
    /// Target table missing and not created, or creation failed.
    Schema,
    /// Persisted jobs or ledgers could not be read.
    StateCorruption,
    /// Other job store failures, including concurrent modification.
    State,
    /// Any other store failure.
    Store,
    /// Operator input rejected before touching any table.
    Input,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::PartialWrite => "partial write",
            ErrorKind::Mapping => "mapping",
            ErrorKind::Schema => "schema",
            ErrorKind::StateCorruption => "state corruption",
            ErrorKind::State => "state",
            ErrorKind::Store => "store",
            ErrorKind::Input => "input",
        };
        f.write_str(name)
    }
}

/// Top-level errors for the migration and undo engines.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Cannot reach the store: {0}")]
    Connectivity(#[source] StoreError),

    #[error("Store operation '{operation}' failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Write(#[from] WriterError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Failed to convert record: {0}")]
    Record(#[from] ModelError),

    #[error("Schema error for table '{table}': {message}")]
    Schema { table: String, message: String },

    #[error(transparent)]
    State(#[from] StateStoreError),

    #[error("Migration job not found: {0}")]
    JobNotFound(String),

    #[error("Migration job '{0}' is already completed; delete it before running again")]
    JobAlreadyCompleted(String),

    #[error("Cannot undo '{job_id}': {reason}")]
    UndoRefused { job_id: String, reason: String },

    #[error("Invalid job definition: {0}")]
    InvalidJob(String),
}

impl MigrationError {
    /// Wraps a store error, keeping connectivity failures distinct.
    pub fn from_store(operation: &'static str, source: StoreError) -> Self {
        match source {
            StoreError::Connectivity(_) => MigrationError::Connectivity(source),
            source => MigrationError::Store { operation, source },
        }
    }

    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrationError::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::Connectivity(_) => ErrorKind::Connectivity,
            MigrationError::Store { .. } => ErrorKind::Store,
            MigrationError::Write(WriterError::RetriesExhausted { .. }) => ErrorKind::PartialWrite,
            MigrationError::Write(WriterError::Store {
                source: StoreError::Connectivity(_),
                ..
            }) => ErrorKind::Connectivity,
            MigrationError::Write(WriterError::Store { .. }) => ErrorKind::Store,
            MigrationError::Write(WriterError::Encode(_)) => ErrorKind::Mapping,
            MigrationError::Mapping(_) | MigrationError::Record(_) => ErrorKind::Mapping,
            MigrationError::Schema { .. } => ErrorKind::Schema,
            MigrationError::State(e) if e.is_corruption() => ErrorKind::StateCorruption,
            MigrationError::State(_) => ErrorKind::State,
            MigrationError::JobNotFound(_)
            | MigrationError::JobAlreadyCompleted(_)
            | MigrationError::UndoRefused { .. }
            | MigrationError::InvalidJob(_) => ErrorKind::Input,
        }
    }

    /// Whether the failing job should be saved with status `error`. State
    /// failures are not job-scoped, and input errors never started a run.
    pub fn marks_job(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::StateCorruption | ErrorKind::State | ErrorKind::Input
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_into_taxonomy() {
        let err = MigrationError::from_store("ping", StoreError::Connectivity("down".into()));
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert!(err.marks_job());

        let err = MigrationError::Write(WriterError::RetriesExhausted {
            table: "t".into(),
            attempts: 8,
            remaining: 3,
            last_error: "3 of 3 operations left unprocessed".into(),
        });
        assert_eq!(err.kind(), ErrorKind::PartialWrite);

        let err = MigrationError::State(StateStoreError::Corrupt {
            key: "job:x".into(),
            message: "eof".into(),
        });
        assert_eq!(err.kind(), ErrorKind::StateCorruption);
        assert!(!err.marks_job());

        assert_eq!(
            MigrationError::schema("t", "creation declined").kind(),
            ErrorKind::Schema
        );
    }
}
