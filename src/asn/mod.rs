//! ASN range table: build, codec, lookup and the refreshable service.

pub mod lookup;
pub mod range;
pub mod table;

pub use lookup::{AsnLookupService, TableSource};
pub use range::{AsnRange, IpBytes, normalize_ip};
pub use table::{AsnRangeTable, RECORD_SIZE};
