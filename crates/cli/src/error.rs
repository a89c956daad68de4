use engine_config::SettingsError;
use engine_core::error::StateStoreError;
use engine_runtime::error::MigrationError;
use model::error::ModelError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to open state store at {}: {source}", .path.display())]
    StateOpen {
        path: PathBuf,
        #[source]
        source: StateStoreError,
    },

    #[error("Failed to open log file {}: {source}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Migration(#[from] MigrationError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Mapping(#[from] ModelError),

    #[error("No migration job to run; create one first")]
    NoJob,

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
