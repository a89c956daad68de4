use crate::{
    error::StateStoreError,
    state::{JobStore, UndoLedger},
};
use async_trait::async_trait;
use chrono::Utc;
use model::{core::attribute::Item, job::MigrationJob};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::{collections::BTreeMap, path::Path};
use tracing::debug;

const JOB_PREFIX: &str = "job:";
const LEDGER_PREFIX: &str = "ledger:";

/// Jobs and undo ledgers in one sled database.
///
/// Jobs are JSON documents under `job:<id>`. Each ledger key is its own
/// entry under `ledger:<id>:<seq>`, so appends never rewrite earlier keys.
pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn job_key(id: &str) -> String {
        format!("{JOB_PREFIX}{id}")
    }

    #[inline]
    fn ledger_prefix(job_id: &str) -> String {
        format!("{LEDGER_PREFIX}{job_id}:")
    }

    fn decode_job(key: &[u8], bytes: &[u8]) -> Result<MigrationJob, StateStoreError> {
        serde_json::from_slice(bytes).map_err(|e| StateStoreError::Corrupt {
            key: String::from_utf8_lossy(key).to_string(),
            message: e.to_string(),
        })
    }

    fn decode_key(key: &[u8], bytes: &[u8]) -> Result<Item, StateStoreError> {
        bincode::deserialize(bytes).map_err(|e| StateStoreError::Corrupt {
            key: String::from_utf8_lossy(key).to_string(),
            message: e.to_string(),
        })
    }

    fn ledger_keys(&self, job_id: &str) -> Result<Vec<sled::IVec>, StateStoreError> {
        self.db
            .scan_prefix(Self::ledger_prefix(job_id))
            .keys()
            .map(|k| k.map_err(StateStoreError::from))
            .collect()
    }
}

#[async_trait]
impl JobStore for SledStateStore {
    async fn list_jobs(&self) -> Result<Vec<MigrationJob>, StateStoreError> {
        let mut jobs = Vec::new();
        for entry in self.db.scan_prefix(JOB_PREFIX) {
            let (key, value) = entry?;
            jobs.push(Self::decode_job(&key, &value)?);
        }
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn get_job(&self, id: &str) -> Result<Option<MigrationJob>, StateStoreError> {
        let key = Self::job_key(id);
        match self.db.get(&key)? {
            Some(bytes) => Ok(Some(Self::decode_job(key.as_bytes(), &bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_job(&self, job: &MigrationJob) -> Result<MigrationJob, StateStoreError> {
        if job.id.is_empty() || job.id.contains(':') {
            return Err(StateStoreError::Encode {
                key: job.id.clone(),
                message: "job ids must be non-empty and may not contain ':'".into(),
            });
        }
        let key = Self::job_key(&job.id);

        // Compare-and-set on the version inside one transaction so two writers
        // of the same job cannot both win.
        let result = self
            .db
            .transaction::<_, _, StateStoreError>(|tx_db| {
                let found = match tx_db.get(&key)? {
                    Some(existing) => {
                        Self::decode_job(key.as_bytes(), &existing)
                            .map_err(ConflictableTransactionError::Abort)?
                            .version
                    }
                    None if job.version == 0 => 0,
                    None => {
                        return Err(ConflictableTransactionError::Abort(
                            StateStoreError::JobNotFound(job.id.clone()),
                        ));
                    }
                };

                if found != job.version {
                    return Err(ConflictableTransactionError::Abort(
                        StateStoreError::VersionConflict {
                            job_id: job.id.clone(),
                            expected: job.version,
                            found,
                        },
                    ));
                }

                let mut saved = job.clone();
                saved.version = found + 1;
                saved.updated_at = Utc::now();

                let bytes = serde_json::to_vec(&saved).map_err(|e| {
                    ConflictableTransactionError::Abort(StateStoreError::Encode {
                        key: key.clone(),
                        message: e.to_string(),
                    })
                })?;
                tx_db.insert(key.as_bytes(), bytes)?;
                Ok(saved)
            });

        let saved = match result {
            Ok(saved) => saved,
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(e.into()),
        };

        self.db.flush_async().await?;
        debug!(job_id = %saved.id, version = saved.version, "Saved migration job");
        Ok(saved)
    }

    async fn delete_job(&self, id: &str) -> Result<bool, StateStoreError> {
        let removed = self.db.remove(Self::job_key(id))?.is_some();
        self.db.flush_async().await?;
        Ok(removed)
    }
}

#[async_trait]
impl UndoLedger for SledStateStore {
    async fn entries(&self) -> Result<BTreeMap<String, Vec<Item>>, StateStoreError> {
        let mut entries: BTreeMap<String, Vec<Item>> = BTreeMap::new();
        for entry in self.db.scan_prefix(LEDGER_PREFIX) {
            let (key, value) = entry?;
            let raw = String::from_utf8_lossy(&key).to_string();
            let job_id = raw
                .strip_prefix(LEDGER_PREFIX)
                .and_then(|rest| rest.rsplit_once(':'))
                .map(|(job_id, _seq)| job_id.to_string())
                .ok_or_else(|| StateStoreError::Corrupt {
                    key: raw.clone(),
                    message: "malformed ledger key".into(),
                })?;
            entries
                .entry(job_id)
                .or_default()
                .push(Self::decode_key(&key, &value)?);
        }
        Ok(entries)
    }

    async fn load(&self, job_id: &str) -> Result<Vec<Item>, StateStoreError> {
        let mut keys = Vec::new();
        for entry in self.db.scan_prefix(Self::ledger_prefix(job_id)) {
            let (key, value) = entry?;
            keys.push(Self::decode_key(&key, &value)?);
        }
        Ok(keys)
    }

    async fn append(&self, job_id: &str, keys: &[Item]) -> Result<(), StateStoreError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut batch = sled::Batch::default();
        for item in keys {
            // Zero-padded so lexicographic order is append order.
            let seq = self.db.generate_id()?;
            let key = format!("{}{seq:020}", Self::ledger_prefix(job_id));
            let value = bincode::serialize(item).map_err(|e| StateStoreError::Encode {
                key: key.clone(),
                message: e.to_string(),
            })?;
            batch.insert(key.as_bytes(), value);
        }

        self.db.apply_batch(batch)?;
        self.db.flush_async().await?;
        debug!(job_id, keys = keys.len(), "Appended undo keys");
        Ok(())
    }

    async fn remove(&self, job_id: &str) -> Result<usize, StateStoreError> {
        let keys = self.ledger_keys(job_id)?;
        let count = keys.len();

        let mut batch = sled::Batch::default();
        for key in keys {
            batch.remove(key);
        }
        self.db.apply_batch(batch)?;
        self.db.flush_async().await?;
        Ok(count)
    }
}
