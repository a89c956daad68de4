use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating engine settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid env file: malformed line {line} (expected KEY=VALUE)")]
    MalformedLine { line: usize },

    #[error("Invalid env file: empty key at line {line}")]
    EmptyKey { line: usize },

    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// The store's batch API accepts at most 25 operations.
    #[error("Batch size must be between 1 and {max}, got {value}")]
    BatchSize { value: usize, max: usize },

    #[error("Could not determine home directory; set DDBMIGRATE_STATE_DIR")]
    NoHomeDir,
}
