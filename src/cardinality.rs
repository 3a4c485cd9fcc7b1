//! Probabilistic distinct-count estimation (HyperLogLog-style).
//!
//! Fixed 1024-register sketch used to track how many distinct subdomains a
//! domain has ever been queried with. Registers hold the maximum observed
//! leading-zero run (plus one) of SHA-256-derived hash values, so two
//! sketches merge losslessly via pointwise maximum.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Number of single-byte registers in the sketch.
pub const REGISTER_COUNT: usize = 1024;

/// Mergeable estimator of the number of distinct strings added to it.
///
/// The raw estimate `alpha * N^2 * harmonic_mean(2^register)` is used
/// without small- or large-range bias correction. This is a documented
/// limitation: the estimate systematically skews high (an empty sketch
/// already reads around 700), so it serves as a flood detector against
/// thresholds in the thousands, not as a precise count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardinalityEstimator {
    registers: Box<[u8]>,
}

impl Default for CardinalityEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl CardinalityEstimator {
    /// Create an empty estimator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registers: vec![0u8; REGISTER_COUNT].into_boxed_slice(),
        }
    }

    /// Add an item to the sketch.
    ///
    /// The item is hashed with SHA-256; the low 10 bits of the hash route to
    /// a register and the remaining bits supply the leading-zero rank.
    pub fn add(&mut self, item: &str) {
        let digest = Sha256::digest(item.as_bytes());
        let hash = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);

        let index = (hash as usize) % REGISTER_COUNT;
        // The |1 guarantees a non-zero value so the rank is well-defined.
        let rank = ((hash >> 10) | 1).leading_zeros() as u8 + 1;

        if rank > self.registers[index] {
            self.registers[index] = rank;
        }
    }

    /// Estimate the number of distinct items added so far.
    #[must_use]
    pub fn estimate(&self) -> f64 {
        let n = REGISTER_COUNT as f64;

        let mut harmonic = 0.0;
        for &register in self.registers.iter() {
            harmonic += 2.0_f64.powi(-i32::from(register));
        }
        let harmonic = 1.0 / harmonic;

        let alpha = 0.7213 / (1.0 + 1.079 / n);
        alpha * n * n * harmonic
    }

    /// Merge another sketch into this one via pointwise maximum.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] if the register counts differ.
    /// Register counts are fixed at compile time today, but serialized
    /// sketches from a different build could disagree.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if other.registers.len() != self.registers.len() {
            return Err(Error::SizeMismatch {
                expected: self.registers.len(),
                actual: other.registers.len(),
            });
        }

        for (mine, theirs) in self.registers.iter_mut().zip(other.registers.iter()) {
            if *theirs > *mine {
                *mine = *theirs;
            }
        }

        Ok(())
    }

    /// Serialize the sketch to its raw register bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        self.registers.to_vec()
    }

    /// Reconstruct a sketch from raw register bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] unless `data` is exactly
    /// [`REGISTER_COUNT`] bytes long.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() != REGISTER_COUNT {
            return Err(Error::SizeMismatch {
                expected: REGISTER_COUNT,
                actual: data.len(),
            });
        }

        Ok(Self {
            registers: data.to_vec().into_boxed_slice(),
        })
    }

    /// Whether no item has ever been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|&r| r == 0)
    }
}
