//! Versioned key-value backend abstraction.
//!
//! The engine talks to its backing store through [`StateBackend`], which
//! captures the minimum contract the merge protocol needs: per-item
//! conditional writes with a server-side version counter, and an optional
//! all-or-nothing multi-item write. Any store offering conditional puts
//! (DynamoDB-style) can implement it; [`MemoryBackend`] is the in-process
//! implementation used in production fallback paths and throughout the
//! tests.

use std::collections::HashMap;
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::store::record::{RecordKey, StoredRecord, VersionedRecord};

/// A single conditional write inside a transactional batch.
#[derive(Debug, Clone)]
pub struct ConditionalWrite {
    pub key: RecordKey,
    /// `None` requires the record to be absent (insert); `Some(v)` requires
    /// the record to be absent or its stored version to equal `v`.
    pub expected_version: Option<i64>,
    pub record: StoredRecord,
}

/// Versioned key-value store with conditional-write semantics.
///
/// Every successful write increments the record version by exactly one on
/// the backend side; callers never pick version numbers themselves.
pub trait StateBackend: Send + Sync + 'static {
    /// Fetch a record, or `None` when absent.
    fn get(&self, key: &RecordKey) -> impl Future<Output = Result<Option<VersionedRecord>>> + Send;

    /// Fetch several records; the result aligns with `keys`.
    fn batch_get(
        &self,
        keys: &[RecordKey],
    ) -> impl Future<Output = Result<Vec<Option<VersionedRecord>>>> + Send;

    /// Conditional write: succeeds as an insert when the record is absent
    /// (whatever the expectation), else requires the stored version to match
    /// `expected_version`. Returns the new version.
    ///
    /// # Errors
    ///
    /// [`Error::ConcurrencyConflict`] when the condition does not hold.
    fn conditional_put(
        &self,
        key: RecordKey,
        expected_version: Option<i64>,
        record: StoredRecord,
    ) -> impl Future<Output = Result<i64>> + Send;

    /// All-or-nothing batch of conditional writes. Returns the new version
    /// of each item, aligned with the input.
    ///
    /// # Errors
    ///
    /// [`Error::TransactionRejected`] when any item fails its condition; in
    /// that case nothing is applied.
    fn transactional_put(
        &self,
        writes: Vec<ConditionalWrite>,
    ) -> impl Future<Output = Result<Vec<i64>>> + Send;
}

/// In-memory [`StateBackend`] backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<RecordKey, VersionedRecord>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Physically remove records whose TTL has passed.
    pub fn purge_expired(&self) -> usize {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, v| v.record.ttl_epoch_seconds > now);
        before - records.len()
    }

    fn check_condition(
        stored: Option<&VersionedRecord>,
        expected: Option<i64>,
        key: &RecordKey,
    ) -> Result<i64> {
        match (stored, expected) {
            // An absent record accepts any expectation as a fresh insert; it
            // may have expired and been purged between a writer's read and
            // its write.
            (None, _) => Ok(1),
            (Some(current), Some(version)) if current.version == version => Ok(version + 1),
            _ => Err(Error::ConcurrencyConflict {
                domain: key.partition.clone(),
            }),
        }
    }
}

impl StateBackend for MemoryBackend {
    async fn get(&self, key: &RecordKey) -> Result<Option<VersionedRecord>> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn batch_get(&self, keys: &[RecordKey]) -> Result<Vec<Option<VersionedRecord>>> {
        let records = self.records.read();
        Ok(keys.iter().map(|key| records.get(key).cloned()).collect())
    }

    async fn conditional_put(
        &self,
        key: RecordKey,
        expected_version: Option<i64>,
        record: StoredRecord,
    ) -> Result<i64> {
        let mut records = self.records.write();
        let new_version = Self::check_condition(records.get(&key), expected_version, &key)?;
        records.insert(
            key,
            VersionedRecord {
                version: new_version,
                record,
            },
        );
        Ok(new_version)
    }

    async fn transactional_put(&self, writes: Vec<ConditionalWrite>) -> Result<Vec<i64>> {
        let mut records = self.records.write();

        // Validate every condition before touching anything.
        let mut new_versions = Vec::with_capacity(writes.len());
        for write in &writes {
            match Self::check_condition(records.get(&write.key), write.expected_version, &write.key)
            {
                Ok(version) => new_versions.push(version),
                Err(_) => {
                    return Err(Error::TransactionRejected(format!(
                        "condition failed for {:?}",
                        write.key.partition
                    )));
                }
            }
        }

        for (write, &version) in writes.into_iter().zip(new_versions.iter()) {
            records.insert(
                write.key,
                VersionedRecord {
                    version,
                    record: write.record,
                },
            );
        }

        Ok(new_versions)
    }
}
