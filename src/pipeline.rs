//! Observation pipeline: from deduplicated query batches to persisted,
//! classified domain state.
//!
//! The external log ingester groups raw DNS observations into one
//! [`DomainObservation`] per registrable domain. The analyzer folds each
//! batch into the stored statistics, runs the classifier, emits a one-shot
//! notification for domains crossing into suspicion, and persists the
//! result through the merge-on-conflict store.

use tracing::{info, instrument};

use crate::analysis::classifier::SuspicionClassifier;
use crate::analysis::entropy::EntropyCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::notify::{Notifier, SuspiciousDomainEvent};
use crate::store::backend::StateBackend;
use crate::store::domain_store::DomainStateStore;

/// Deduplicated observations for one registrable domain.
#[derive(Debug, Clone)]
pub struct DomainObservation {
    /// Registrable (base) domain the queries belong to.
    pub domain: String,
    /// One entry per observed query: the subdomain part of the query name,
    /// possibly repeated and possibly empty for apex queries.
    pub subdomains: Vec<String>,
    /// How many of those queries were answered NXDOMAIN.
    pub nx_count: i64,
}

impl DomainObservation {
    /// Build an observation from per-subdomain query counts, the shape the
    /// log-ingestion step produces.
    pub fn from_counts<I>(domain: impl Into<String>, counts: I, nx_count: i64) -> Self
    where
        I: IntoIterator<Item = (String, usize)>,
    {
        let subdomains = counts
            .into_iter()
            .flat_map(|(subdomain, queries)| std::iter::repeat(subdomain).take(queries))
            .collect();
        Self {
            domain: domain.into(),
            subdomains,
            nx_count,
        }
    }
}

/// Summary of one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Domains whose state was updated and persisted.
    pub updated: usize,
    /// Domains that crossed into suspicion during this batch.
    pub newly_suspicious: usize,
}

/// Core analyzer tying statistics, classification, notification and
/// persistence together.
pub struct DomainAnalyzer<B: StateBackend, N: Notifier> {
    store: DomainStateStore<B>,
    classifier: SuspicionClassifier,
    notifier: N,
    entropy: EntropyCache,
}

impl<B: StateBackend, N: Notifier> DomainAnalyzer<B, N> {
    /// Create an analyzer from configuration and its collaborators.
    pub fn new(config: &Config, backend: B, notifier: N) -> Self {
        Self {
            store: DomainStateStore::new(backend, config.store.clone()),
            classifier: SuspicionClassifier::new(config.classifier.clone()),
            notifier,
            entropy: EntropyCache::new(config.entropy_cache_capacity),
        }
    }

    /// The underlying state store.
    pub fn store(&self) -> &DomainStateStore<B> {
        &self.store
    }

    /// Fold a batch of observations into the store.
    ///
    /// Each domain is fetched (absent domains start fresh), updated with
    /// its observations, classified, and persisted. A domain transitioning
    /// to suspicious is notified exactly once; the sticky flag stored with
    /// the record suppresses both re-classification and re-notification on
    /// later batches.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] on an empty batch or empty domain;
    /// store and notifier errors propagate with the domain attached via
    /// their own variants.
    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    pub async fn process_batch(&self, batch: &[DomainObservation]) -> Result<BatchOutcome> {
        if batch.is_empty() {
            return Err(Error::InvalidArgument("batch cannot be empty".into()));
        }

        let domains: Vec<String> = batch.iter().map(|obs| obs.domain.clone()).collect();
        let states = self.store.batch_get(&domains, true).await?;

        let mut outcome = BatchOutcome::default();
        for (observation, state) in batch.iter().zip(states) {
            // fill_missing guarantees presence.
            let mut state = state.ok_or_else(|| {
                Error::Storage(format!(
                    "missing state for {:?} despite fill_missing",
                    observation.domain
                ))
            })?;

            state.update(
                &observation.subdomains,
                observation.nx_count,
                &self.entropy,
            )?;

            if !state.is_suspicious {
                let verdict = self.classifier.classify(&state);
                if verdict.suspicious {
                    state.is_suspicious = true;
                    outcome.newly_suspicious += 1;
                    info!(
                        domain = %state.domain(),
                        reasons = ?verdict.reasons,
                        "domain crossed suspicion threshold"
                    );
                    self.notifier
                        .notify(SuspiciousDomainEvent {
                            domain: state.domain().to_string(),
                            total_queries: state.total_queries,
                            nx_domain_count: state.nx_domain_count,
                            reasons: verdict.reasons,
                        })
                        .await?;
                }
            }

            self.store.update(&mut state).await?;
            outcome.updated += 1;
        }

        Ok(outcome)
    }
}
