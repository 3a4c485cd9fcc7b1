//! Versioned persistence for domain statistics.

pub mod backend;
pub mod domain_store;
pub mod record;

pub use backend::{ConditionalWrite, MemoryBackend, StateBackend};
pub use domain_store::DomainStateStore;
pub use record::{RecordKey, StoredRecord, VersionedRecord};
