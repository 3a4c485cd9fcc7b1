//! Configuration loading and validation.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Result, ValidationError};

/// Main configuration for the dnsward engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Suspicion classifier thresholds.
    #[serde(default)]
    pub classifier: ClassifierThresholds,

    /// State store retry and TTL settings.
    #[serde(default)]
    pub store: StoreSettings,

    /// Maximum number of memoized subdomain entropy values.
    #[serde(default = "default_entropy_cache_capacity")]
    pub entropy_cache_capacity: u64,
}

/// Thresholds for the suspicion classifier.
///
/// Each signal has a hard threshold that flags a domain on its own and a
/// soft variant that contributes 0.2 to a composite risk score. A composite
/// score of 0.6 or more also flags the domain.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierThresholds {
    /// NXDOMAIN-to-total query ratio that flags on its own.
    #[serde(default = "default_nx_ratio_hard")]
    pub nx_domain_ratio_hard: f64,
    /// NXDOMAIN ratio contributing to the composite score.
    #[serde(default = "default_nx_ratio_soft")]
    pub nx_domain_ratio_soft: f64,

    /// Estimated unique subdomain count that flags on its own.
    #[serde(default = "default_unique_hard")]
    pub unique_subdomains_hard: f64,
    /// Unique subdomain estimate contributing to the composite score.
    #[serde(default = "default_unique_soft")]
    pub unique_subdomains_soft: f64,

    /// Name length limits (max observed / running average) that flag alone.
    #[serde(default = "default_max_length_hard")]
    pub max_length_hard: f64,
    #[serde(default = "default_avg_length_hard")]
    pub avg_length_hard: f64,
    #[serde(default = "default_max_length_soft")]
    pub max_length_soft: f64,
    #[serde(default = "default_avg_length_soft")]
    pub avg_length_soft: f64,

    /// Label count limits (max observed / running average) that flag alone.
    #[serde(default = "default_max_labels_hard")]
    pub max_label_count_hard: f64,
    #[serde(default = "default_avg_labels_hard")]
    pub avg_label_count_hard: f64,
    #[serde(default = "default_max_labels_soft")]
    pub max_label_count_soft: f64,
    #[serde(default = "default_avg_labels_soft")]
    pub avg_label_count_soft: f64,

    /// Shannon entropy limits (running average / max observed) that flag alone.
    #[serde(default = "default_avg_entropy_hard")]
    pub avg_entropy_hard: f64,
    #[serde(default = "default_max_entropy_hard")]
    pub max_entropy_hard: f64,
    #[serde(default = "default_avg_entropy_soft")]
    pub avg_entropy_soft: f64,
    #[serde(default = "default_max_entropy_soft")]
    pub max_entropy_soft: f64,

    /// Composite score at which the domain is flagged even when no hard
    /// threshold fired.
    #[serde(default = "default_composite_trigger")]
    pub composite_trigger: f64,
}

/// State store retry and expiry settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSettings {
    /// Maximum conditional-write attempts before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before the first retry; doubles on each subsequent one.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Random jitter added to each backoff, as a fraction of the delay.
    #[serde(default = "default_backoff_jitter")]
    pub backoff_jitter: f64,

    /// Rolling expiry window refreshed on every successful update.
    #[serde(default = "default_record_ttl_days")]
    pub record_ttl_days: u64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            nx_domain_ratio_hard: default_nx_ratio_hard(),
            nx_domain_ratio_soft: default_nx_ratio_soft(),
            unique_subdomains_hard: default_unique_hard(),
            unique_subdomains_soft: default_unique_soft(),
            max_length_hard: default_max_length_hard(),
            avg_length_hard: default_avg_length_hard(),
            max_length_soft: default_max_length_soft(),
            avg_length_soft: default_avg_length_soft(),
            max_label_count_hard: default_max_labels_hard(),
            avg_label_count_hard: default_avg_labels_hard(),
            max_label_count_soft: default_max_labels_soft(),
            avg_label_count_soft: default_avg_labels_soft(),
            avg_entropy_hard: default_avg_entropy_hard(),
            max_entropy_hard: default_max_entropy_hard(),
            avg_entropy_soft: default_avg_entropy_soft(),
            max_entropy_soft: default_max_entropy_soft(),
            composite_trigger: default_composite_trigger(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_jitter: default_backoff_jitter(),
            record_ttl_days: default_record_ttl_days(),
        }
    }
}

const fn default_nx_ratio_hard() -> f64 {
    0.25
}

const fn default_nx_ratio_soft() -> f64 {
    0.10
}

const fn default_unique_hard() -> f64 {
    2000.0
}

const fn default_unique_soft() -> f64 {
    1000.0
}

const fn default_max_length_hard() -> f64 {
    54.0
}

const fn default_avg_length_hard() -> f64 {
    32.0
}

const fn default_max_length_soft() -> f64 {
    48.0
}

const fn default_avg_length_soft() -> f64 {
    28.0
}

const fn default_max_labels_hard() -> f64 {
    10.0
}

const fn default_avg_labels_hard() -> f64 {
    8.0
}

const fn default_max_labels_soft() -> f64 {
    12.0
}

const fn default_avg_labels_soft() -> f64 {
    10.0
}

const fn default_avg_entropy_hard() -> f64 {
    4.2
}

const fn default_max_entropy_hard() -> f64 {
    4.7
}

const fn default_avg_entropy_soft() -> f64 {
    4.5
}

const fn default_max_entropy_soft() -> f64 {
    5.0
}

const fn default_composite_trigger() -> f64 {
    0.6
}

const fn default_max_retries() -> u32 {
    5
}

const fn default_initial_backoff_ms() -> u64 {
    100
}

const fn default_backoff_jitter() -> f64 {
    0.2
}

const fn default_record_ttl_days() -> u64 {
    7
}

const fn default_entropy_cache_capacity() -> u64 {
    100_000
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.store.max_retries == 0 {
            return Err(ConfigError::from(ValidationError::ZeroMaxRetries).into());
        }

        if self.store.initial_backoff_ms == 0 {
            return Err(ConfigError::from(ValidationError::ZeroInitialBackoff).into());
        }

        if self.store.record_ttl_days == 0 {
            return Err(ConfigError::from(ValidationError::ZeroRecordTtl).into());
        }

        if self.entropy_cache_capacity == 0 {
            return Err(ConfigError::from(ValidationError::ZeroEntropyCacheCapacity).into());
        }

        let c = &self.classifier;
        if c.nx_domain_ratio_hard > 1.0 {
            return Err(ConfigError::from(ValidationError::RatioOutOfRange {
                value: c.nx_domain_ratio_hard,
            })
            .into());
        }

        for (name, value) in [
            ("nx_domain_ratio_hard", c.nx_domain_ratio_hard),
            ("nx_domain_ratio_soft", c.nx_domain_ratio_soft),
            ("unique_subdomains_hard", c.unique_subdomains_hard),
            ("unique_subdomains_soft", c.unique_subdomains_soft),
            ("max_length_hard", c.max_length_hard),
            ("avg_length_hard", c.avg_length_hard),
            ("max_label_count_hard", c.max_label_count_hard),
            ("avg_label_count_hard", c.avg_label_count_hard),
            ("avg_entropy_hard", c.avg_entropy_hard),
            ("max_entropy_hard", c.max_entropy_hard),
            ("composite_trigger", c.composite_trigger),
        ] {
            if value <= 0.0 {
                return Err(
                    ConfigError::from(ValidationError::NonPositiveThreshold { name }).into(),
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.classifier.nx_domain_ratio_hard, 0.25);
        assert_eq!(config.classifier.unique_subdomains_hard, 2000.0);
        assert_eq!(config.classifier.composite_trigger, 0.6);
        assert_eq!(config.store.max_retries, 5);
        assert_eq!(config.store.initial_backoff_ms, 100);
        assert_eq!(config.store.record_ttl_days, 7);
    }

    #[test]
    fn test_parse_overrides() {
        let toml = r#"
            entropy_cache_capacity = 500

            [classifier]
            nx_domain_ratio_hard = 0.5
            unique_subdomains_hard = 4000.0

            [store]
            max_retries = 3
            initial_backoff_ms = 50
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.classifier.nx_domain_ratio_hard, 0.5);
        assert_eq!(config.classifier.unique_subdomains_hard, 4000.0);
        assert_eq!(config.store.max_retries, 3);
        assert_eq!(config.store.initial_backoff_ms, 50);
        assert_eq!(config.entropy_cache_capacity, 500);
    }

    #[test]
    fn test_zero_max_retries_rejected() {
        let toml = r#"
            [store]
            max_retries = 0
        "#;

        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_ratio_above_one_rejected() {
        let toml = r#"
            [classifier]
            nx_domain_ratio_hard = 1.5
        "#;

        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_non_positive_threshold_rejected() {
        let toml = r#"
            [classifier]
            unique_subdomains_hard = 0.0
        "#;

        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
            unknown_field = "value"
        "#;

        assert!(Config::parse(toml).is_err());
    }
}
