//! Persisted record layout for domain state.
//!
//! The backing store holds one record per `(domain, "STATE")` key with the
//! attributes `TotalQueries`, `NxDomainCount`, `HllState` (the serialized
//! cardinality sketch, 1024 bytes), `Suspicious` and `TTL` (epoch seconds).
//! The version counter lives next to the record, managed by the backend.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::analysis::stats::DomainStatistics;
use crate::cardinality::CardinalityEstimator;
use crate::error::Result;

/// Composite key addressing a record in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub partition: String,
    pub sort: String,
}

impl RecordKey {
    /// Sort key shared by all domain-state records.
    pub const STATE_SORT: &'static str = "STATE";

    /// Key of the state record for a domain.
    #[must_use]
    pub fn state(domain: &str) -> Self {
        Self {
            partition: domain.to_string(),
            sort: Self::STATE_SORT.to_string(),
        }
    }
}

/// Data attributes of a domain-state record, without the version counter.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub total_queries: i64,
    pub nx_domain_count: i64,
    /// Opaque serialized [`CardinalityEstimator`], exactly 1024 bytes.
    pub hll_state: Vec<u8>,
    pub suspicious: bool,
    /// Expiry instant as seconds since the Unix epoch.
    pub ttl_epoch_seconds: i64,
}

/// A record together with its optimistic-concurrency token.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedRecord {
    pub version: i64,
    pub record: StoredRecord,
}

impl StoredRecord {
    /// Snapshot the persisted attributes of a statistics record, stamping a
    /// fresh expiry `ttl` from now.
    #[must_use]
    pub fn from_stats(stats: &DomainStatistics, ttl: Duration) -> Self {
        Self {
            total_queries: stats.total_queries,
            nx_domain_count: stats.nx_domain_count,
            hll_state: stats.unique_subdomains.serialize(),
            suspicious: stats.is_suspicious,
            ttl_epoch_seconds: epoch_seconds(SystemTime::now() + ttl),
        }
    }

    /// Rebuild in-memory statistics from a fetched record.
    ///
    /// The subdomain-shape metrics (entropy, length, label counts) are not
    /// persisted; they restart from zero and only influence classification
    /// through the observations of the current process.
    pub fn into_stats(self, domain: &str, version: i64) -> Result<DomainStatistics> {
        let mut stats = DomainStatistics::new(domain);
        stats.total_queries = self.total_queries;
        stats.nx_domain_count = self.nx_domain_count;
        stats.unique_subdomains = CardinalityEstimator::deserialize(&self.hll_state)?;
        stats.is_suspicious = self.suspicious;
        stats.version = Some(version);
        stats.expires = UNIX_EPOCH + Duration::from_secs(self.ttl_epoch_seconds.max(0) as u64);
        stats.rebase();
        Ok(stats)
    }
}

fn epoch_seconds(at: SystemTime) -> i64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
