use crate::settings::error::SettingsError;
use std::{collections::HashMap, fs, path::Path};

/// Key/value variables gathered from `.env`-style files and the process
/// environment. Later loads override earlier ones.
#[derive(Debug, Clone, Default)]
pub struct EnvManager {
    vars: HashMap<String, String>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// File variables overlaid by the process environment.
    pub fn load(env_file: Option<&Path>) -> Result<Self, SettingsError> {
        let mut env = Self::new();
        if let Some(path) = env_file {
            env.load_from_file(path)?;
        }
        env.load_process_env();
        Ok(env)
    }

    /// Load variables from a .env file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SettingsError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;

        self.parse_env_content(&content)
    }

    pub fn load_process_env(&mut self) {
        self.vars.extend(std::env::vars());
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub(crate) fn parse_env_content(&mut self, content: &str) -> Result<(), SettingsError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                return Err(SettingsError::MalformedLine {
                    line: line_num + 1,
                });
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(SettingsError::EmptyKey { line: line_num + 1 });
            }

            self.vars
                .insert(key.to_string(), Self::unquote_value(value));
        }

        Ok(())
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();

        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return value[1..value.len() - 1].to_string();
            }
        }

        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_basic_env() {
        let mut env = EnvManager::new();
        let content = r#"
# Comment
DDBMIGRATE_REGION=eu-west-1
export DDBMIGRATE_BATCH_SIZE=10
        "#;

        env.parse_env_content(content).unwrap();
        assert_eq!(env.get("DDBMIGRATE_REGION"), Some("eu-west-1"));
        assert_eq!(env.get("DDBMIGRATE_BATCH_SIZE"), Some("10"));
    }

    #[test]
    fn test_parse_quoted_values() {
        let mut env = EnvManager::new();
        let content = r#"
QUOTED="value with spaces"
SINGLE='single quoted'
UNQUOTED=no_spaces
EMPTY=
        "#;

        env.parse_env_content(content).unwrap();
        assert_eq!(env.get("QUOTED"), Some("value with spaces"));
        assert_eq!(env.get("SINGLE"), Some("single quoted"));
        assert_eq!(env.get("UNQUOTED"), Some("no_spaces"));
        assert_eq!(env.get("EMPTY"), None);
    }

    #[test]
    fn test_invalid_env_format() {
        let mut env = EnvManager::new();
        assert!(matches!(
            env.parse_env_content("INVALID LINE WITHOUT EQUALS"),
            Err(SettingsError::MalformedLine { line: 1 })
        ));
        assert!(matches!(
            env.parse_env_content("OK=1\n=value"),
            Err(SettingsError::EmptyKey { line: 2 })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "DDBMIGRATE_ENDPOINT=http://localhost:8000").unwrap();

        let mut env = EnvManager::new();
        env.load_from_file(file.path()).unwrap();
        assert_eq!(env.get("DDBMIGRATE_ENDPOINT"), Some("http://localhost:8000"));

        let missing = env.load_from_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(SettingsError::EnvFile { .. })));
    }
}
