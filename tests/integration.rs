//! Integration tests for the analysis engine.
//!
//! These tests verify the complete observation-to-notification flow using
//! mock components, plus the ASN lookup path from feed to resolution.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use dnsward::Config;
use dnsward::asn::{AsnLookupService, AsnRangeTable, TableSource};
use dnsward::notify::{Notifier, SuspiciousDomainEvent};
use dnsward::pipeline::{DomainAnalyzer, DomainObservation};
use dnsward::store::{MemoryBackend, StateBackend};
use dnsward::{Error, Result};
use tokio::sync::Mutex;

/// Notifier that records every delivered event.
#[derive(Clone, Default)]
struct RecordingNotifier {
    events: Arc<Mutex<Vec<SuspiciousDomainEvent>>>,
}

impl RecordingNotifier {
    async fn events(&self) -> Vec<SuspiciousDomainEvent> {
        self.events.lock().await.clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, event: SuspiciousDomainEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Backend handle that can outlive one analyzer, simulating a restart
/// against the same storage.
#[derive(Clone, Default)]
struct SharedBackend(Arc<MemoryBackend>);

impl StateBackend for SharedBackend {
    async fn get(
        &self,
        key: &dnsward::store::RecordKey,
    ) -> Result<Option<dnsward::store::VersionedRecord>> {
        self.0.get(key).await
    }

    async fn batch_get(
        &self,
        keys: &[dnsward::store::RecordKey],
    ) -> Result<Vec<Option<dnsward::store::VersionedRecord>>> {
        self.0.batch_get(keys).await
    }

    async fn conditional_put(
        &self,
        key: dnsward::store::RecordKey,
        expected_version: Option<i64>,
        record: dnsward::store::StoredRecord,
    ) -> Result<i64> {
        self.0.conditional_put(key, expected_version, record).await
    }

    async fn transactional_put(
        &self,
        writes: Vec<dnsward::store::ConditionalWrite>,
    ) -> Result<Vec<i64>> {
        self.0.transactional_put(writes).await
    }
}

fn analyzer_on(
    backend: SharedBackend,
    notifier: RecordingNotifier,
) -> DomainAnalyzer<SharedBackend, RecordingNotifier> {
    DomainAnalyzer::new(&Config::default(), backend, notifier)
}

/// Distinct machine-generated subdomains, the query pattern a DGA or a
/// DNS-tunneling client produces.
fn generated_subdomains(count: usize) -> Vec<String> {
    (0..count as u64)
        .map(|i| format!("{:016x}", i.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
        .collect()
}

#[tokio::test]
async fn should_flag_domain_with_thousands_of_unique_subdomains() {
    let notifier = RecordingNotifier::default();
    let analyzer = analyzer_on(SharedBackend::default(), notifier.clone());

    let observation = DomainObservation {
        domain: "evil.example".into(),
        subdomains: generated_subdomains(3000),
        nx_count: 0,
    };

    let outcome = analyzer.process_batch(&[observation]).await.unwrap();
    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.newly_suspicious, 1);

    let events = notifier.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].domain, "evil.example");
    assert_eq!(events[0].total_queries, 3000);
    assert!(
        events[0]
            .reasons
            .iter()
            .any(|r| r.starts_with("High unique subdomains")),
        "unexpected reasons: {:?}",
        events[0].reasons
    );
}

#[tokio::test]
async fn should_not_flag_ordinary_traffic() {
    let notifier = RecordingNotifier::default();
    let analyzer = analyzer_on(SharedBackend::default(), notifier.clone());

    let observation = DomainObservation {
        domain: "github.com".into(),
        subdomains: [
            "www", "api", "gist", "raw", "docs", "pages", "status", "support", "blog", "help",
        ]
        .iter()
        .map(ToString::to_string)
        .collect(),
        nx_count: 0,
    };

    let outcome = analyzer.process_batch(&[observation]).await.unwrap();
    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.newly_suspicious, 0);
    assert!(notifier.events().await.is_empty());

    let state = analyzer.store().get("github.com").await.unwrap().unwrap();
    assert!(!state.is_suspicious);
    assert_eq!(state.total_queries, 10);
}

#[tokio::test]
async fn should_keep_sticky_flag_across_restart() {
    let backend = SharedBackend::default();

    // First process crosses the NXDOMAIN ratio threshold and notifies.
    {
        let notifier = RecordingNotifier::default();
        let analyzer = analyzer_on(backend.clone(), notifier.clone());
        let subdomains: Vec<String> = (0..100).map(|i| format!("probe{i}")).collect();
        analyzer
            .process_batch(&[DomainObservation {
                domain: "shady.example".into(),
                subdomains,
                nx_count: 40,
            }])
            .await
            .unwrap();
        assert_eq!(notifier.events().await.len(), 1);
    }

    // A fresh analyzer over the same storage sees the persisted flag and
    // never re-notifies, even when the signal fires again.
    let notifier = RecordingNotifier::default();
    let analyzer = analyzer_on(backend, notifier.clone());
    let subdomains: Vec<String> = (100..200).map(|i| format!("probe{i}")).collect();
    let outcome = analyzer
        .process_batch(&[DomainObservation {
            domain: "shady.example".into(),
            subdomains,
            nx_count: 40,
        }])
        .await
        .unwrap();

    assert_eq!(outcome.newly_suspicious, 0);
    assert!(notifier.events().await.is_empty());

    let state = analyzer.store().get("shady.example").await.unwrap().unwrap();
    assert!(state.is_suspicious);
    assert_eq!(state.total_queries, 200);
    assert_eq!(state.nx_domain_count, 80);
}

#[tokio::test]
async fn should_accumulate_unique_subdomains_across_batches() {
    let notifier = RecordingNotifier::default();
    let analyzer = analyzer_on(SharedBackend::default(), notifier.clone());

    // 800 distinct names leave the (skewed-high) estimate below the 2000
    // flagging threshold; the persisted sketch carries the first batch's
    // population into the second, whose disjoint 800 push it past.
    let all = generated_subdomains(1600);
    for half in all.chunks(800) {
        analyzer
            .process_batch(&[DomainObservation {
                domain: "tunnel.example".into(),
                subdomains: half.to_vec(),
                nx_count: 0,
            }])
            .await
            .unwrap();
    }

    let events = notifier.events().await;
    assert_eq!(events.len(), 1);
    assert!(
        events[0]
            .reasons
            .iter()
            .any(|r| r.starts_with("High unique subdomains"))
    );
}

#[tokio::test]
async fn should_handle_mixed_batch_independently() {
    let notifier = RecordingNotifier::default();
    let analyzer = analyzer_on(SharedBackend::default(), notifier.clone());

    let outcome = analyzer
        .process_batch(&[
            DomainObservation {
                domain: "evil.example".into(),
                subdomains: generated_subdomains(3000),
                nx_count: 0,
            },
            DomainObservation {
                domain: "github.com".into(),
                subdomains: vec!["www".into(), "api".into()],
                nx_count: 0,
            },
        ])
        .await
        .unwrap();

    assert_eq!(outcome.updated, 2);
    assert_eq!(outcome.newly_suspicious, 1);

    let events = notifier.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].domain, "evil.example");
}

/// Source serving a fixed serialized table.
struct StaticSource(Vec<u8>);

impl TableSource for StaticSource {
    async fn load(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn should_resolve_blocked_asns_from_feed() {
    // Feed in the upstream TSV shape; AS64500 and AS64502 are blocked,
    // AS13335 is not, and one line is garbage.
    let feed = [
        "1.0.0.0\t1.0.0.255\t13335\tUS\tCLOUDFLARENET",
        "10.0.0.0\t10.0.0.255\t64500\tZZ\tTEST-NET-A",
        "not a feed line",
        "2001:db8::\t2001:db8::ffff\t64502\tZZ\tTEST-NET-B",
    ];
    let blocked: HashSet<u32> = [64500, 64502].into_iter().collect();
    let table = AsnRangeTable::build(feed.iter().copied(), &blocked);
    assert_eq!(table.len(), 2);

    let service = AsnLookupService::new(StaticSource(table.serialize()));

    // Before initialization every lookup fails.
    let ip: IpAddr = "10.0.0.7".parse().unwrap();
    assert!(matches!(service.lookup(ip), Err(Error::NotInitialized)));

    service.initialize().await.unwrap();

    assert_eq!(service.lookup(ip).unwrap(), Some(64500));
    assert_eq!(
        service.lookup("2001:db8::1".parse().unwrap()).unwrap(),
        Some(64502)
    );
    // Unblocked ASN ranges are not in the table at all.
    assert_eq!(service.lookup("1.0.0.42".parse().unwrap()).unwrap(), None);
}
