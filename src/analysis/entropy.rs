//! Shannon entropy over character frequency, with a bounded memo cache.

use std::collections::BTreeMap;

use moka::sync::Cache;

/// Compute the Shannon entropy of a string in bits (`-Σ p·log2(p)` over
/// character frequencies). Empty input has zero entropy.
///
/// Frequencies are collected into an ordered map so the summation order,
/// and therefore the floating-point rounding, is identical on every call.
#[must_use]
pub fn shannon_entropy(input: &str) -> f64 {
    if input.is_empty() {
        return 0.0;
    }

    let mut frequencies: BTreeMap<char, usize> = BTreeMap::new();
    let mut total = 0usize;
    for c in input.chars() {
        *frequencies.entry(c).or_insert(0) += 1;
        total += 1;
    }

    let total = total as f64;
    frequencies
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Bounded memo cache for subdomain entropy values.
///
/// Query streams repeat the same subdomains heavily, so memoization pays off,
/// but the key space is attacker-controlled and must not grow without bound.
/// Moka evicts least-recently-used entries once the capacity is reached.
#[derive(Clone)]
pub struct EntropyCache {
    inner: Cache<String, f64>,
}

impl EntropyCache {
    /// Create a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Entropy of `input`, computed on first sight and memoized after.
    #[must_use]
    pub fn entropy(&self, input: &str) -> f64 {
        self.inner
            .get_with_by_ref(input, || shannon_entropy(input))
    }

    /// Number of memoized entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
