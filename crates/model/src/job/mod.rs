use crate::{
    core::attribute::{AttributeValue, Item},
    pagination::cursor::Cursor,
    transform::mapping::ColumnMappings,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Lifecycle state of a migration job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Error,
    Completed,
    Undone,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "in_progress",
            JobStatus::Error => "error",
            JobStatus::Completed => "completed",
            JobStatus::Undone => "undone",
        }
    }

    /// Every state except `Completed` resumes from the persisted cursor.
    pub fn is_resumable(&self) -> bool {
        !matches!(self, JobStatus::Completed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(JobStatus::InProgress),
            "error" => Ok(JobStatus::Error),
            "completed" => Ok(JobStatus::Completed),
            "undone" => Ok(JobStatus::Undone),
            other => Err(format!("Unknown job status: {other}")),
        }
    }
}

/// Role an attribute plays in a table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyRole {
    #[serde(rename = "HASH")]
    Hash,
    #[serde(rename = "RANGE")]
    Range,
}

impl KeyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyRole::Hash => "HASH",
            KeyRole::Range => "RANGE",
        }
    }
}

impl FromStr for KeyRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HASH" => Ok(KeyRole::Hash),
            "RANGE" => Ok(KeyRole::Range),
            other => Err(format!("Unknown key type: {other}")),
        }
    }
}

/// Key role to attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeySchema(BTreeMap<KeyRole, String>);

impl KeySchema {
    pub fn new(hash: impl Into<String>, range: Option<String>) -> Self {
        let mut roles = BTreeMap::new();
        roles.insert(KeyRole::Hash, hash.into());
        if let Some(range) = range {
            roles.insert(KeyRole::Range, range);
        }
        KeySchema(roles)
    }

    pub fn insert(&mut self, role: KeyRole, attribute: impl Into<String>) {
        self.0.insert(role, attribute.into());
    }

    pub fn get(&self, role: KeyRole) -> Option<&str> {
        self.0.get(&role).map(String::as_str)
    }

    pub fn hash_key(&self) -> Option<&str> {
        self.get(KeyRole::Hash)
    }

    pub fn range_key(&self) -> Option<&str> {
        self.get(KeyRole::Range)
    }

    /// Key attribute names, hash first.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Projects `item` down to its key attributes. Missing attributes are
    /// skipped.
    pub fn project(&self, item: &Item) -> Item {
        self.attributes()
            .filter_map(|name| item.get(name).map(|v| (name.to_string(), v.clone())))
            .collect()
    }
}

impl FromIterator<(KeyRole, String)> for KeySchema {
    fn from_iter<T: IntoIterator<Item = (KeyRole, String)>>(iter: T) -> Self {
        KeySchema(iter.into_iter().collect())
    }
}

/// A persisted migration job definition plus its progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationJob {
    pub id: String,
    pub source_table: String,
    pub target_table: String,
    pub column_mappings: ColumnMappings,
    #[serde(default)]
    pub key_schema: Option<KeySchema>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
    #[serde(default)]
    pub processed_count: u64,
    pub status: JobStatus,
    /// Bumped on every successful save; a save carrying a stale version is
    /// rejected by the job store.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MigrationJob {
    pub fn new(
        source_table: impl Into<String>,
        target_table: impl Into<String>,
        column_mappings: ColumnMappings,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Self::id_at(now),
            source_table: source_table.into(),
            target_table: target_table.into(),
            column_mappings,
            key_schema: None,
            cursor: None,
            processed_count: 0,
            status: JobStatus::InProgress,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Time-derived job identifier, e.g. `migration_20250129_134501_123`.
    pub fn id_at(at: DateTime<Utc>) -> String {
        format!("migration_{}", at.format("%Y%m%d_%H%M%S_%3f"))
    }

    pub fn mark_in_progress(&mut self) {
        self.status = JobStatus::InProgress;
    }

    pub fn mark_error(&mut self) {
        self.status = JobStatus::Error;
    }

    /// Terminal success: the cursor is meaningless once the scan is exhausted.
    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        self.cursor = None;
    }

    /// Applies the post-undo transition. Only completed jobs move to `Undone`
    /// (and lose their processed count); other states are left untouched.
    /// Returns whether the status changed.
    pub fn mark_undone(&mut self) -> bool {
        if self.status != JobStatus::Completed {
            return false;
        }
        self.status = JobStatus::Undone;
        self.processed_count = 0;
        self.cursor = None;
        true
    }

    pub fn advance(&mut self, written: u64) {
        self.processed_count = self.processed_count.saturating_add(written);
    }

    /// Builds the undo key for one written record: per key attribute, the
    /// mapped target value if present, else the source attribute rendered as
    /// a string, else an empty string.
    pub fn undo_key(&self, target: &Item, source: &Item) -> Item {
        let Some(schema) = &self.key_schema else {
            return Item::new();
        };

        schema
            .attributes()
            .map(|name| {
                let value = match (target.get(name), source.get(name)) {
                    (Some(v), _) => v.clone(),
                    (None, Some(v)) => AttributeValue::S(stringify_attribute(v)),
                    (None, None) => AttributeValue::S(String::new()),
                };
                (name.to_string(), value)
            })
            .collect()
    }
}

fn stringify_attribute(attr: &AttributeValue) -> String {
    match attr {
        AttributeValue::S(s) | AttributeValue::N(s) => s.clone(),
        AttributeValue::Bool(b) => b.to_string(),
        AttributeValue::Null(_) => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> MigrationJob {
        let mut job = MigrationJob::new("src", "dst", ColumnMappings::passthrough(Vec::<String>::new()));
        job.key_schema = Some(KeySchema::new("id", Some("sk".to_string())));
        job
    }

    #[test]
    fn new_jobs_start_in_progress_without_cursor() {
        let job = job();
        assert_eq!(job.status, JobStatus::InProgress);
        assert!(job.cursor.is_none());
        assert_eq!(job.processed_count, 0);
        assert!(job.id.starts_with("migration_"));
    }

    #[test]
    fn undone_transition_only_from_completed() {
        let mut job = job();
        job.processed_count = 10;
        assert!(!job.mark_undone());
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.processed_count, 10);

        job.mark_completed();
        assert!(job.mark_undone());
        assert_eq!(job.status, JobStatus::Undone);
        assert_eq!(job.processed_count, 0);
    }

    #[test]
    fn undo_key_prefers_target_then_source_then_empty() {
        let job = job();
        let mut target = Item::new();
        target.insert("id".into(), AttributeValue::s("t-1"));
        let mut source = Item::new();
        source.insert("id".into(), AttributeValue::s("s-1"));

        let key = job.undo_key(&target, &source);
        assert_eq!(key.get("id"), Some(&AttributeValue::s("t-1")));
        assert_eq!(key.get("sk"), Some(&AttributeValue::s("")));

        let mut source = Item::new();
        source.insert("sk".into(), AttributeValue::n(5));
        let key = job.undo_key(&Item::new(), &source);
        assert_eq!(key.get("sk"), Some(&AttributeValue::s("5")));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(JobStatus::InProgress).unwrap(),
            serde_json::json!("in_progress")
        );
        let schema = KeySchema::new("id", None);
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            serde_json::json!({"HASH": "id"})
        );
    }
}
