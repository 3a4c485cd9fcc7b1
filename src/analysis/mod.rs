//! Domain statistics, entropy tooling and the suspicion classifier.

pub mod classifier;
pub mod entropy;
pub mod stats;

pub use classifier::{SuspicionClassifier, Verdict};
pub use entropy::{EntropyCache, shannon_entropy};
pub use stats::DomainStatistics;
