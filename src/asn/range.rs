//! IP ranges attributed to autonomous systems.
//!
//! Addresses are normalized to 16 bytes big-endian so IPv4 and IPv6 ranges
//! live in one ordered space: IPv4 addresses take their IPv6-mapped form
//! (`::ffff:a.b.c.d`).

use std::net::IpAddr;

/// A 16-byte big-endian address, comparable lexicographically.
pub type IpBytes = [u8; 16];

/// Normalize an address to its 16-byte big-endian form.
#[must_use]
pub fn normalize_ip(ip: IpAddr) -> IpBytes {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

/// One contiguous address range announced by an autonomous system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsnRange {
    pub start: IpBytes,
    pub end: IpBytes,
    pub asn: u32,
}

impl AsnRange {
    /// Parse one line of the IP-to-ASN feed: tab-separated
    /// `start end asn [...]`. Returns `None` for malformed lines (too few
    /// columns, unparsable address or ASN); feed hygiene is the feed's
    /// problem, not a fatal condition here.
    #[must_use]
    pub fn parse_feed_line(line: &str) -> Option<Self> {
        let mut parts = line.split('\t');
        let start: IpAddr = parts.next()?.parse().ok()?;
        let end: IpAddr = parts.next()?.parse().ok()?;
        let asn: u32 = parts.next()?.parse().ok()?;

        Some(Self {
            start: normalize_ip(start),
            end: normalize_ip(end),
            asn,
        })
    }

    /// Whether a normalized address falls within `[start, end]`.
    #[must_use]
    pub fn contains(&self, ip: &IpBytes) -> bool {
        *ip >= self.start && *ip <= self.end
    }
}
