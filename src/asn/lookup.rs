//! ASN lookup service with an atomically swapped table + cache snapshot.
//!
//! Many readers resolve IPs concurrently while a single refresher rebuilds
//! the table from the serialized blob. The table and its memoized results
//! always travel together as one immutable snapshot behind an `ArcSwap`, so
//! a reader either sees the old pair or the new pair, never a half-updated
//! mix.

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::asn::table::AsnRangeTable;
use crate::error::{Error, Result};

/// Source of the serialized range-table blob (object store, file, ...).
pub trait TableSource: Send + Sync + 'static {
    /// Load the current serialized table.
    fn load(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// An immutable (table, memoized results) pair published to readers.
struct Snapshot {
    table: AsnRangeTable,
    /// Resolution results for previously queried IPs, misses included.
    cache: DashMap<IpAddr, Option<u32>>,
}

/// Per-IP ASN resolution over a refreshable blocklist table.
///
/// Lifecycle: `Uninitialized → Ready` via [`initialize`](Self::initialize)
/// or the first successful [`refresh`](Self::refresh). Lookups before that
/// fail with [`Error::NotInitialized`].
pub struct AsnLookupService<S: TableSource> {
    source: S,
    snapshot: ArcSwapOption<Snapshot>,
    /// Serializes refreshes; lookups never take it.
    refresh_guard: Mutex<()>,
}

impl<S: TableSource> AsnLookupService<S> {
    /// Create a service in the uninitialized state.
    pub fn new(source: S) -> Self {
        Self {
            source,
            snapshot: ArcSwapOption::const_empty(),
            refresh_guard: Mutex::new(()),
        }
    }

    /// Whether a table has been published.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.snapshot.load().is_some()
    }

    /// Load the table if the service has never been initialized; otherwise
    /// a no-op. Concurrent initializers serialize on the refresh guard, so
    /// the blob is loaded once.
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.refresh_guard.lock().await;
        if self.is_ready() {
            return Ok(());
        }
        self.refresh_locked().await
    }

    /// Replace the table with a freshly loaded one.
    ///
    /// Cached resolutions from the previous snapshot are re-validated
    /// against the new table; entries whose resolution changed are
    /// discarded, so the cache is never partially stale. The swap itself is
    /// a single atomic pointer replace and in-flight readers keep the old
    /// snapshot until they finish.
    pub async fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_guard.lock().await;
        self.refresh_locked().await
    }

    /// Refresh body; the caller holds the refresh guard.
    async fn refresh_locked(&self) -> Result<()> {
        let data = self.source.load().await?;
        let table = AsnRangeTable::deserialize(&data)?;

        let cache = DashMap::new();
        if let Some(previous) = self.snapshot.load_full() {
            for entry in previous.cache.iter() {
                let revalidated = table.lookup(*entry.key());
                if revalidated == *entry.value() {
                    cache.insert(*entry.key(), revalidated);
                }
            }
        }

        info!(
            ranges = table.len(),
            cached_ips = cache.len(),
            "published new ASN range table"
        );
        self.snapshot.store(Some(Arc::new(Snapshot { table, cache })));
        Ok(())
    }

    /// Resolve the blocked ASN containing `ip`, or `None` when no blocked
    /// range contains it. Results, including misses, are memoized until the
    /// next refresh invalidates them.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] before the first successful refresh.
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<u32>> {
        let snapshot = self.snapshot.load_full().ok_or(Error::NotInitialized)?;

        if let Some(cached) = snapshot.cache.get(&ip) {
            return Ok(*cached);
        }

        let resolved = snapshot.table.lookup(ip);
        snapshot.cache.insert(ip, resolved);
        Ok(resolved)
    }
}
