//! Suspicious-domain notifications.
//!
//! The pipeline emits exactly one event per domain, on the transition from
//! not-suspicious to suspicious; the sticky flag persisted with the record
//! guarantees the event is never re-emitted.

use std::future::Future;

use serde::Serialize;
use tracing::warn;

use crate::error::Result;

/// Payload emitted when a domain is newly flagged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuspiciousDomainEvent {
    pub domain: String,
    pub total_queries: i64,
    pub nx_domain_count: i64,
    pub reasons: Vec<String>,
}

/// Sink for suspicious-domain events (event bus, webhook, ...).
pub trait Notifier: Send + Sync + 'static {
    /// Deliver one event.
    fn notify(&self, event: SuspiciousDomainEvent) -> impl Future<Output = Result<()>> + Send;
}

/// Default notifier that logs the JSON payload through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    async fn notify(&self, event: SuspiciousDomainEvent) -> Result<()> {
        let payload = serde_json::to_string(&event)?;
        warn!(
            domain = %event.domain,
            payload = %payload,
            "domain newly flagged as suspicious"
        );
        Ok(())
    }
}
