//! Domain state persistence with optimistic concurrency and conflict merge.
//!
//! Writers never lock. An update is a conditional write ("insert if absent,
//! else require the stored version to match"); when it loses the race the
//! store re-fetches the winner, re-applies this writer's counter deltas on
//! top of it, merges the cardinality sketches pointwise, and retries with
//! the fresh version. This makes concurrent updates commutative instead of
//! last-writer-wins.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::analysis::stats::DomainStatistics;
use crate::config::StoreSettings;
use crate::error::{Error, Result};
use crate::store::backend::{ConditionalWrite, StateBackend};
use crate::store::record::{RecordKey, StoredRecord};

/// Client for per-domain statistics records.
pub struct DomainStateStore<B: StateBackend> {
    backend: B,
    settings: StoreSettings,
}

impl<B: StateBackend> DomainStateStore<B> {
    /// Create a store over the given backend.
    pub fn new(backend: B, settings: StoreSettings) -> Self {
        Self { backend, settings }
    }

    /// Direct access to the backend, mainly for maintenance tasks.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.record_ttl_days * 24 * 60 * 60)
    }

    /// Fetch the statistics record for a domain, or `None` when absent.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when `domain` is empty.
    pub async fn get(&self, domain: &str) -> Result<Option<DomainStatistics>> {
        if domain.is_empty() {
            return Err(Error::InvalidArgument("domain cannot be empty".into()));
        }

        match self.backend.get(&RecordKey::state(domain)).await? {
            Some(versioned) => Ok(Some(versioned.record.into_stats(domain, versioned.version)?)),
            None => Ok(None),
        }
    }

    /// Fetch several records at once, aligned with `domains`.
    ///
    /// With `fill_missing`, absent domains are synthesized as fresh
    /// zero-valued records (version absent) so downstream aggregation never
    /// has to special-case absence.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when `domains` is empty or contains an
    /// empty string.
    pub async fn batch_get(
        &self,
        domains: &[String],
        fill_missing: bool,
    ) -> Result<Vec<Option<DomainStatistics>>> {
        if domains.is_empty() {
            return Err(Error::InvalidArgument("domains cannot be empty".into()));
        }
        if domains.iter().any(String::is_empty) {
            return Err(Error::InvalidArgument(
                "domains cannot contain an empty string".into(),
            ));
        }

        let keys: Vec<RecordKey> = domains.iter().map(|d| RecordKey::state(d)).collect();
        let fetched = self.backend.batch_get(&keys).await?;

        let mut results = Vec::with_capacity(domains.len());
        for (domain, versioned) in domains.iter().zip(fetched) {
            let stats = match versioned {
                Some(v) => Some(v.record.into_stats(domain, v.version)?),
                None if fill_missing => Some(DomainStatistics::new(domain.clone())),
                None => None,
            };
            results.push(stats);
        }
        Ok(results)
    }

    /// Persist a statistics record, merging on version conflicts.
    ///
    /// On success the record's version reflects the stored one, the expiry
    /// is refreshed and the delta baseline is reset. On a conflict the
    /// freshly stored record is fetched, this writer's counter deltas are
    /// re-applied to it, the sketches are merged and the write is retried
    /// with exponential backoff.
    ///
    /// # Errors
    ///
    /// [`Error::ConcurrencyExhausted`] once the retry budget is spent; the
    /// caller must re-derive its update from fresh data.
    pub async fn update(&self, stats: &mut DomainStatistics) -> Result<()> {
        let domain = stats.domain().to_string();
        let (delta_total, delta_nx) = stats.counter_deltas();

        let mut candidate = stats.clone();
        let mut delay = Duration::from_millis(self.settings.initial_backoff_ms);

        for attempt in 1..=self.settings.max_retries {
            let record = StoredRecord::from_stats(&candidate, self.record_ttl());
            let result = self
                .backend
                .conditional_put(RecordKey::state(&domain), candidate.version, record)
                .await;

            match result {
                Ok(new_version) => {
                    *stats = candidate;
                    stats.version = Some(new_version);
                    stats.rebase();
                    debug!(domain = %domain, version = new_version, "persisted domain state");
                    return Ok(());
                }
                Err(Error::ConcurrencyConflict { .. }) => {
                    if attempt == self.settings.max_retries {
                        break;
                    }
                    warn!(
                        domain = %domain,
                        attempt,
                        "version conflict, merging with stored state"
                    );

                    tokio::time::sleep(self.jittered(delay)).await;
                    delay *= 2;

                    match self.get(&domain).await? {
                        Some(fetched) => {
                            candidate =
                                self.merge_conflict(fetched, &candidate, delta_total, delta_nx)?;
                        }
                        // Purged between the conflict and the re-fetch;
                        // retry as a fresh insert.
                        None => candidate.version = None,
                    }
                }
                Err(other) => return Err(other),
            }
        }

        Err(Error::ConcurrencyExhausted {
            domain,
            attempts: self.settings.max_retries,
        })
    }

    /// Merge this writer's contribution into the freshly fetched record.
    ///
    /// Counters get the delta re-applied rather than overwritten, sketches
    /// merge via pointwise max, the sticky flag is OR-ed, and the shape
    /// metrics (which are not persisted) carry over from the local record.
    fn merge_conflict(
        &self,
        mut fetched: DomainStatistics,
        local: &DomainStatistics,
        delta_total: i64,
        delta_nx: i64,
    ) -> Result<DomainStatistics> {
        fetched.total_queries += delta_total;
        fetched.nx_domain_count += delta_nx;
        fetched.unique_subdomains.merge(&local.unique_subdomains)?;
        fetched.is_suspicious |= local.is_suspicious;

        fetched.max_entropy = fetched.max_entropy.max(local.max_entropy);
        fetched.avg_entropy = local.avg_entropy;
        fetched.max_length = fetched.max_length.max(local.max_length);
        fetched.avg_length = local.avg_length;
        fetched.max_label_count = fetched.max_label_count.max(local.max_label_count);
        fetched.avg_label_count = local.avg_label_count;

        Ok(fetched)
    }

    /// Persist a cohort of records as one all-or-nothing transaction.
    ///
    /// Each item is individually conditioned on "insert if absent, else
    /// version match". There is no merge-retry here: if any condition
    /// fails the whole batch is rejected and the caller decides how to
    /// re-derive it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] on an empty batch,
    /// [`Error::TransactionRejected`] when the backend refuses the batch.
    pub async fn batch_update(&self, states: &mut [DomainStatistics]) -> Result<()> {
        if states.is_empty() {
            return Err(Error::InvalidArgument("states cannot be empty".into()));
        }
        if states.iter().any(|s| s.domain().is_empty()) {
            return Err(Error::InvalidArgument(
                "states cannot contain an empty domain".into(),
            ));
        }

        let writes = states
            .iter()
            .map(|stats| ConditionalWrite {
                key: RecordKey::state(stats.domain()),
                expected_version: stats.version,
                record: StoredRecord::from_stats(stats, self.record_ttl()),
            })
            .collect();

        let new_versions = self.backend.transactional_put(writes).await?;

        for (stats, version) in states.iter_mut().zip(new_versions) {
            stats.version = Some(version);
            stats.rebase();
        }
        Ok(())
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let jitter = self.settings.backoff_jitter;
        if jitter <= 0.0 {
            return delay;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(0.0..jitter);
        delay.mul_f64(factor)
    }
}
