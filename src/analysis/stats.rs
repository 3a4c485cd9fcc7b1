//! Per-domain query statistics.
//!
//! One [`DomainStatistics`] record exists per registrable domain. The record
//! aggregates query counts, subdomain shape (entropy, length, label count)
//! and a cardinality sketch of distinct subdomains. Averages are maintained
//! incrementally so a record never has to retain the observations themselves.

use std::time::{Duration, SystemTime};

use crate::analysis::entropy::EntropyCache;
use crate::cardinality::CardinalityEstimator;
use crate::error::{Error, Result};

/// Default rolling expiry window for untouched records.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Aggregate query statistics for one registrable domain.
#[derive(Debug, Clone)]
pub struct DomainStatistics {
    domain: String,

    /// Total observed queries, monotonically increasing.
    pub total_queries: i64,
    /// Observed NXDOMAIN responses, monotonically increasing.
    pub nx_domain_count: i64,

    /// Sketch of distinct subdomain labels ever observed.
    pub unique_subdomains: CardinalityEstimator,

    pub max_entropy: f64,
    pub avg_entropy: f64,
    pub max_length: f64,
    pub avg_length: f64,
    pub max_label_count: f64,
    pub avg_label_count: f64,

    /// Sticky suspicion flag; once set it is never cleared automatically.
    pub is_suspicious: bool,

    /// Optimistic-concurrency token. `None` for a never-persisted record.
    pub version: Option<i64>,

    /// The record is eligible for deletion after this instant.
    pub expires: SystemTime,

    // Counter values at load time, so the store can re-derive this writer's
    // delta when resolving a version conflict.
    base_total_queries: i64,
    base_nx_domain_count: i64,
}

impl DomainStatistics {
    /// Create a fresh, zero-valued record for a domain.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            total_queries: 0,
            nx_domain_count: 0,
            unique_subdomains: CardinalityEstimator::new(),
            max_entropy: 0.0,
            avg_entropy: 0.0,
            max_length: 0.0,
            avg_length: 0.0,
            max_label_count: 0.0,
            avg_label_count: 0.0,
            is_suspicious: false,
            version: None,
            expires: SystemTime::now() + DEFAULT_TTL,
            base_total_queries: 0,
            base_nx_domain_count: 0,
        }
    }

    /// The registrable domain this record describes.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Fold a deduplicated batch of subdomain observations into the record.
    ///
    /// Each observation increments `total_queries` and updates the running
    /// extrema and means; `nx_count` of the observations resolved to
    /// NXDOMAIN. Means use `avg' = (avg·(n-1) + x) / n` with `n` being the
    /// post-increment query total, so the record stays consistent when
    /// batches of different sizes arrive over time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `nx_count` is negative or
    /// exceeds the number of observations, which would break the
    /// `total_queries >= nx_domain_count` invariant.
    pub fn update<S: AsRef<str>>(
        &mut self,
        subdomains: &[S],
        nx_count: i64,
        entropy: &EntropyCache,
    ) -> Result<()> {
        if nx_count < 0 || nx_count > subdomains.len() as i64 {
            return Err(Error::InvalidArgument(format!(
                "nx_count {nx_count} out of range for {} observations",
                subdomains.len()
            )));
        }

        for subdomain in subdomains {
            let subdomain = subdomain.as_ref();

            self.total_queries += 1;
            let n = self.total_queries as f64;

            let value = entropy.entropy(subdomain);
            self.max_entropy = self.max_entropy.max(value);
            self.avg_entropy = (self.avg_entropy * (n - 1.0) + value) / n;

            // Length of the full query name: subdomain + '.' + domain.
            let length = (self.domain.len() + subdomain.len() + 1) as f64;
            self.max_length = self.max_length.max(length);
            self.avg_length = (self.avg_length * (n - 1.0) + length) / n;

            let labels = subdomain.split('.').count() as f64;
            self.max_label_count = self.max_label_count.max(labels);
            self.avg_label_count = (self.avg_label_count * (n - 1.0) + labels) / n;

            self.unique_subdomains.add(subdomain);
        }

        self.nx_domain_count += nx_count;

        Ok(())
    }

    /// Ratio of NXDOMAIN responses to total queries; zero before any query.
    #[must_use]
    pub fn nx_domain_ratio(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.nx_domain_count as f64 / self.total_queries as f64
        }
    }

    /// Counter growth since this record was loaded from the store, as
    /// `(total_queries, nx_domain_count)` deltas.
    #[must_use]
    pub fn counter_deltas(&self) -> (i64, i64) {
        (
            self.total_queries - self.base_total_queries,
            self.nx_domain_count - self.base_nx_domain_count,
        )
    }

    /// Mark the current counter values as the persisted baseline. Called by
    /// the store after a load or a successful write.
    pub fn rebase(&mut self) {
        self.base_total_queries = self.total_queries;
        self.base_nx_domain_count = self.nx_domain_count;
    }
}
