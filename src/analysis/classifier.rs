//! Suspicion classification over domain statistics.
//!
//! Pure threshold evaluation: no state is carried between calls. Stickiness
//! of the suspicious flag lives in the record itself and is enforced by the
//! pipeline, not here.

use crate::analysis::stats::DomainStatistics;
use crate::config::ClassifierThresholds;

/// Outcome of classifying one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub suspicious: bool,
    /// One entry per firing condition, in evaluation order.
    pub reasons: Vec<String>,
}

impl Verdict {
    fn clean() -> Self {
        Self {
            suspicious: false,
            reasons: Vec::new(),
        }
    }
}

/// Classifier evaluating DNS-tunneling and DGA signals.
///
/// Every signal exists in two strengths: a hard threshold that flags the
/// domain on its own, and a soft threshold that contributes 0.2 to a
/// composite risk score. When the composite reaches the configured trigger
/// (0.6 by default, i.e. three soft signals) the domain is flagged even
/// though no single hard threshold fired.
#[derive(Debug, Clone)]
pub struct SuspicionClassifier {
    thresholds: ClassifierThresholds,
}

impl Default for SuspicionClassifier {
    fn default() -> Self {
        Self::new(ClassifierThresholds::default())
    }
}

impl SuspicionClassifier {
    /// Create a classifier with the given thresholds.
    #[must_use]
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate a statistics record. Pure: no memory between calls.
    #[must_use]
    pub fn classify(&self, stats: &DomainStatistics) -> Verdict {
        let t = &self.thresholds;
        let mut verdict = Verdict::clean();
        let mut risk_score = 0.0;

        let nx_ratio = stats.nx_domain_ratio();
        if nx_ratio >= t.nx_domain_ratio_hard {
            verdict.suspicious = true;
            verdict.reasons.push(format!(
                "High NXDOMAIN ratio: {nx_ratio:.2} (threshold: {})",
                t.nx_domain_ratio_hard
            ));
        }
        if nx_ratio >= t.nx_domain_ratio_soft {
            risk_score += 0.2;
        }

        let unique = stats.unique_subdomains.estimate();
        if unique >= t.unique_subdomains_hard {
            verdict.suspicious = true;
            verdict.reasons.push(format!(
                "High unique subdomains: {unique:.0} (threshold: {})",
                t.unique_subdomains_hard
            ));
        }
        if unique >= t.unique_subdomains_soft {
            risk_score += 0.2;
        }

        if stats.max_length > t.max_length_hard || stats.avg_length > t.avg_length_hard {
            verdict.suspicious = true;
            verdict.reasons.push(format!(
                "Long subdomain names: max {:.0}, avg {:.1}",
                stats.max_length, stats.avg_length
            ));
        }
        if stats.max_length > t.max_length_soft || stats.avg_length > t.avg_length_soft {
            risk_score += 0.2;
        }

        if stats.max_label_count > t.max_label_count_hard
            || stats.avg_label_count > t.avg_label_count_hard
        {
            verdict.suspicious = true;
            verdict.reasons.push(format!(
                "Too many labels: max {:.0}, avg {:.1}",
                stats.max_label_count, stats.avg_label_count
            ));
        }
        if stats.max_label_count > t.max_label_count_soft
            || stats.avg_label_count > t.avg_label_count_soft
        {
            risk_score += 0.2;
        }

        if stats.avg_entropy >= t.avg_entropy_hard || stats.max_entropy >= t.max_entropy_hard {
            verdict.suspicious = true;
            verdict.reasons.push(format!(
                "High Shannon entropy: max {:.2}, avg {:.2}",
                stats.max_entropy, stats.avg_entropy
            ));
        }
        if stats.avg_entropy >= t.avg_entropy_soft || stats.max_entropy >= t.max_entropy_soft {
            risk_score += 0.2;
        }

        if risk_score >= t.composite_trigger {
            verdict.suspicious = true;
            verdict
                .reasons
                .push(format!("High composite risk score: {risk_score:.1}"));
        }

        verdict
    }
}
