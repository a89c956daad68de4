use crate::env::EnvManager;
use connectors::dynamodb::DynamoDbConfig;
use engine_core::retry::RetryPolicy;
use error::SettingsError;
use serde::Serialize;
use std::{path::PathBuf, str::FromStr, time::Duration};
use tracing::debug;

pub mod error;

/// Hard ceiling of the store's batch-write API.
pub const MAX_BATCH_SIZE: usize = 25;

pub const ENV_STATE_DIR: &str = "DDBMIGRATE_STATE_DIR";
pub const ENV_REGION: &str = "DDBMIGRATE_REGION";
pub const ENV_ENDPOINT: &str = "DDBMIGRATE_ENDPOINT";
pub const ENV_OPERATION_TIMEOUT_SECS: &str = "DDBMIGRATE_OPERATION_TIMEOUT_SECS";
pub const ENV_TABLE_ACTIVE_TIMEOUT_SECS: &str = "DDBMIGRATE_TABLE_ACTIVE_TIMEOUT_SECS";
pub const ENV_SCAN_PAGE_LIMIT: &str = "DDBMIGRATE_SCAN_PAGE_LIMIT";
pub const ENV_RETRY_ATTEMPTS: &str = "DDBMIGRATE_RETRY_ATTEMPTS";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "DDBMIGRATE_RETRY_BASE_DELAY_MS";
pub const ENV_RETRY_MAX_DELAY_MS: &str = "DDBMIGRATE_RETRY_MAX_DELAY_MS";
pub const ENV_BATCH_SIZE: &str = "DDBMIGRATE_BATCH_SIZE";

/// Resolved configuration for one process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSettings {
    /// Directory holding the job store and undo ledgers
    pub state_dir: PathBuf,
    /// AWS region (SDK default chain when unset)
    pub region: Option<String>,
    /// Endpoint override, e.g. a local emulator
    pub endpoint: Option<String>,
    pub operation_timeout: Duration,
    /// How long to wait for a freshly created table to become active
    pub table_active_timeout: Duration,
    /// Items requested per scan page (store default when unset)
    pub scan_page_limit: Option<usize>,
    pub retry_attempts: usize,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub batch_size: usize,
}

/// Values given explicitly on the command line. They win over every other
/// source.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub state_dir: Option<PathBuf>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub scan_page_limit: Option<usize>,
    pub retry_attempts: Option<usize>,
    pub batch_size: Option<usize>,
}

impl EngineSettings {
    /// Built-in defaults. The state directory lives under the home
    /// directory.
    pub fn defaults() -> Result<Self, SettingsError> {
        let home = dirs::home_dir().ok_or(SettingsError::NoHomeDir)?;
        Ok(Self::with_state_dir(home.join(".ddbmigrate/state")))
    }

    pub fn with_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        let retry = RetryPolicy::default();
        Self {
            state_dir: state_dir.into(),
            region: None,
            endpoint: None,
            operation_timeout: Duration::from_secs(30),
            table_active_timeout: Duration::from_secs(300),
            scan_page_limit: None,
            retry_attempts: retry.max_attempts,
            retry_base_delay: retry.base_delay,
            retry_max_delay: retry.max_delay,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Defaults, then `env` (env file overlaid by the process environment),
    /// then `overrides`.
    pub fn resolve(env: &EnvManager, overrides: &SettingsOverrides) -> Result<Self, SettingsError> {
        let state_dir = overrides
            .state_dir
            .clone()
            .or_else(|| env.get(ENV_STATE_DIR).map(PathBuf::from));

        let mut settings = match state_dir {
            Some(dir) => Self::with_state_dir(dir),
            None => Self::defaults()?,
        };

        if let Some(region) = env.get(ENV_REGION) {
            settings.region = Some(region.to_string());
        }
        if let Some(endpoint) = env.get(ENV_ENDPOINT) {
            settings.endpoint = Some(endpoint.to_string());
        }
        if let Some(secs) = parse_var::<u64>(env, ENV_OPERATION_TIMEOUT_SECS, "seconds")? {
            settings.operation_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(env, ENV_TABLE_ACTIVE_TIMEOUT_SECS, "seconds")? {
            settings.table_active_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = parse_var::<usize>(env, ENV_SCAN_PAGE_LIMIT, "a positive integer")? {
            settings.scan_page_limit = Some(limit);
        }
        if let Some(n) = parse_var::<usize>(env, ENV_RETRY_ATTEMPTS, "a positive integer")? {
            settings.retry_attempts = n;
        }
        if let Some(ms) = parse_var::<u64>(env, ENV_RETRY_BASE_DELAY_MS, "milliseconds")? {
            settings.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(env, ENV_RETRY_MAX_DELAY_MS, "milliseconds")? {
            settings.retry_max_delay = Duration::from_millis(ms);
        }
        if let Some(size) = parse_var::<usize>(env, ENV_BATCH_SIZE, "a positive integer")? {
            settings.batch_size = size;
        }

        settings.apply(overrides);
        settings.validate()?;

        debug!(state_dir = %settings.state_dir.display(), batch_size = settings.batch_size, "Settings resolved");
        Ok(settings)
    }

    fn apply(&mut self, overrides: &SettingsOverrides) {
        if let Some(region) = &overrides.region {
            self.region = Some(region.clone());
        }
        if let Some(endpoint) = &overrides.endpoint {
            self.endpoint = Some(endpoint.clone());
        }
        if let Some(limit) = overrides.scan_page_limit {
            self.scan_page_limit = Some(limit);
        }
        if let Some(n) = overrides.retry_attempts {
            self.retry_attempts = n;
        }
        if let Some(size) = overrides.batch_size {
            self.batch_size = size;
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(SettingsError::BatchSize {
                value: self.batch_size,
                max: MAX_BATCH_SIZE,
            });
        }
        if self.retry_attempts == 0 {
            return Err(SettingsError::InvalidValue {
                key: ENV_RETRY_ATTEMPTS.to_string(),
                value: "0".to_string(),
                expected: "a positive integer",
            });
        }
        if self.scan_page_limit == Some(0) {
            return Err(SettingsError::InvalidValue {
                key: ENV_SCAN_PAGE_LIMIT.to_string(),
                value: "0".to_string(),
                expected: "a positive integer",
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            self.retry_base_delay,
            self.retry_max_delay,
        )
    }

    pub fn dynamodb_config(&self) -> DynamoDbConfig {
        DynamoDbConfig {
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            operation_timeout: Some(self.operation_timeout),
            poll_interval: None,
        }
    }
}

fn parse_var<T: FromStr>(
    env: &EnvManager,
    key: &str,
    expected: &'static str,
) -> Result<Option<T>, SettingsError> {
    env.get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| SettingsError::InvalidValue {
                    key: key.to_string(),
                    value: raw.to_string(),
                    expected,
                })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvManager {
        let mut env = EnvManager::new();
        for (k, v) in pairs {
            env.set(*k, *v);
        }
        env
    }

    #[test]
    fn env_values_override_defaults() {
        let env = env(&[
            (ENV_STATE_DIR, "/tmp/ddb-state"),
            (ENV_REGION, "eu-west-1"),
            (ENV_RETRY_ATTEMPTS, "3"),
            (ENV_RETRY_BASE_DELAY_MS, "50"),
            (ENV_BATCH_SIZE, "10"),
        ]);

        let settings = EngineSettings::resolve(&env, &SettingsOverrides::default()).unwrap();
        assert_eq!(settings.state_dir, PathBuf::from("/tmp/ddb-state"));
        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.batch_size, 10);

        let retry = settings.retry_policy();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.base_delay, Duration::from_millis(50));
    }

    #[test]
    fn overrides_win_over_env() {
        let env = env(&[(ENV_STATE_DIR, "/tmp/a"), (ENV_REGION, "eu-west-1")]);
        let overrides = SettingsOverrides {
            state_dir: Some(PathBuf::from("/tmp/b")),
            region: Some("us-east-1".into()),
            batch_size: Some(5),
            ..Default::default()
        };

        let settings = EngineSettings::resolve(&env, &overrides).unwrap();
        assert_eq!(settings.state_dir, PathBuf::from("/tmp/b"));
        assert_eq!(settings.region.as_deref(), Some("us-east-1"));
        assert_eq!(settings.batch_size, 5);
    }

    #[test]
    fn rejects_oversized_batches_and_bad_numbers() {
        let env = env(&[(ENV_STATE_DIR, "/tmp/a"), (ENV_BATCH_SIZE, "26")]);
        assert!(matches!(
            EngineSettings::resolve(&env, &SettingsOverrides::default()),
            Err(SettingsError::BatchSize { value: 26, .. })
        ));

        let env = self::env(&[(ENV_STATE_DIR, "/tmp/a"), (ENV_OPERATION_TIMEOUT_SECS, "soon")]);
        assert!(matches!(
            EngineSettings::resolve(&env, &SettingsOverrides::default()),
            Err(SettingsError::InvalidValue { .. })
        ));
    }
}
