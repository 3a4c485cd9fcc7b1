//! Binary-searchable table of blocked ASN ranges, with its wire codec.
//!
//! The table serializes to a flat sequence of 40-byte records (4 reserved
//! zero bytes, 16-byte start, 16-byte end, 4-byte big-endian ASN) in sort
//! order. Record order is the binary-search precondition and is preserved,
//! not re-validated, at deserialize time.

use std::collections::HashSet;
use std::net::IpAddr;

use tracing::debug;

use crate::asn::range::{AsnRange, normalize_ip};
use crate::error::{Error, Result};

/// Serialized size of one range record.
pub const RECORD_SIZE: usize = 40;

const START_OFFSET: usize = 4;
const END_OFFSET: usize = 20;
const ASN_OFFSET: usize = 36;

/// Immutable, sorted collection of non-overlapping ASN ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsnRangeTable {
    ranges: Vec<AsnRange>,
}

impl AsnRangeTable {
    /// Build a table from raw feed lines, keeping only ranges whose ASN is
    /// in `blocked_asns`. Malformed lines are skipped. The result is sorted
    /// ascending by start address.
    #[must_use]
    pub fn build<I, S>(feed_lines: I, blocked_asns: &HashSet<u32>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut skipped = 0usize;
        let mut total = 0usize;
        let ranges = feed_lines
            .into_iter()
            .filter(|line| !line.as_ref().trim().is_empty())
            .filter_map(|line| {
                total += 1;
                let parsed = AsnRange::parse_feed_line(line.as_ref());
                if parsed.is_none() {
                    skipped += 1;
                }
                parsed
            })
            .filter(|range| blocked_asns.contains(&range.asn))
            .collect();

        if skipped > 0 {
            debug!(skipped, total, "skipped malformed feed lines");
        }

        Self::from_ranges(ranges)
    }

    /// Build a table from pre-parsed ranges, sorting by start address.
    #[must_use]
    pub fn from_ranges(mut ranges: Vec<AsnRange>) -> Self {
        ranges.sort_by(|a, b| a.start.cmp(&b.start));
        Self { ranges }
    }

    /// Serialize to the flat 40-byte-record format.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; self.ranges.len() * RECORD_SIZE];
        for (i, range) in self.ranges.iter().enumerate() {
            let offset = i * RECORD_SIZE;
            buffer[offset + START_OFFSET..offset + START_OFFSET + 16]
                .copy_from_slice(&range.start);
            buffer[offset + END_OFFSET..offset + END_OFFSET + 16].copy_from_slice(&range.end);
            buffer[offset + ASN_OFFSET..offset + ASN_OFFSET + 4]
                .copy_from_slice(&range.asn.to_be_bytes());
        }
        buffer
    }

    /// Reconstruct a table from serialized bytes, preserving record order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] unless the length is a whole number
    /// of records.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() % RECORD_SIZE != 0 {
            return Err(Error::SizeMismatch {
                expected: data.len() / RECORD_SIZE * RECORD_SIZE + RECORD_SIZE,
                actual: data.len(),
            });
        }

        let ranges = data
            .chunks_exact(RECORD_SIZE)
            .map(|record| {
                let mut start = [0u8; 16];
                start.copy_from_slice(&record[START_OFFSET..START_OFFSET + 16]);
                let mut end = [0u8; 16];
                end.copy_from_slice(&record[END_OFFSET..END_OFFSET + 16]);
                let asn = u32::from_be_bytes([
                    record[ASN_OFFSET],
                    record[ASN_OFFSET + 1],
                    record[ASN_OFFSET + 2],
                    record[ASN_OFFSET + 3],
                ]);
                AsnRange { start, end, asn }
            })
            .collect();

        Ok(Self { ranges })
    }

    /// Binary-search for the range containing `ip`; returns its ASN.
    #[must_use]
    pub fn lookup(&self, ip: IpAddr) -> Option<u32> {
        let target = normalize_ip(ip);

        let mut low = 0usize;
        let mut high = self.ranges.len();
        while low < high {
            let mid = low + (high - low) / 2;
            let range = &self.ranges[mid];

            if target < range.start {
                high = mid;
            } else if target > range.end {
                low = mid + 1;
            } else {
                return Some(range.asn);
            }
        }

        None
    }

    /// Number of ranges in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
