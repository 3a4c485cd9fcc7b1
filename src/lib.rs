//! Dnsward - the analytic core of a DNS-filtering platform.
//!
//! Dnsward decides, from observed query traffic, which domains look like
//! DNS-tunneling or DGA activity, and resolves IP addresses to blocked
//! autonomous systems. Wire-format handling, event delivery and CLI
//! plumbing live outside this crate; dnsward only consumes their outputs.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cardinality`]: mergeable probabilistic distinct-count sketch
//! - [`analysis`]: per-domain statistics and the suspicion classifier
//! - [`store`]: versioned state persistence with merge-on-conflict updates
//! - [`asn`]: binary-searchable ASN range table and its lookup service
//! - [`pipeline`]: batch processing tying the pieces together
//! - [`notify`]: one-shot suspicious-domain notifications
//! - [`config`]: configuration loading and validation
//! - [`error`]: error types
//!
//! # Testing
//!
//! The seams are trait-based so every component can be exercised without a
//! real backing store or feed:
//!
//! ```rust
//! use dnsward::store::{DomainStateStore, MemoryBackend};
//! use dnsward::config::StoreSettings;
//!
//! let store = DomainStateStore::new(MemoryBackend::new(), StoreSettings::default());
//! ```

pub mod analysis;
pub mod asn;
pub mod cardinality;
pub mod config;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
