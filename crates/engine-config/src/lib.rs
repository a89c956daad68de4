//! Engine settings and the sources they are resolved from.

pub mod env;
pub mod settings;

pub use env::EnvManager;
pub use settings::{EngineSettings, SettingsOverrides, error::SettingsError};
