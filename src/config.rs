//! Estimator configuration.
//!
//! [`EstimatorConfig`] is plain data: it can be built in code, or loaded
//! from TOML with every field optional.
//!
//! ```toml
//! max_samples = 100000
//! target_cov = 0.05
//! batch_size = 256
//! confidence_level = 0.95
//! on_error = "discard"
//! parallel = true
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for invalid estimator configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// What to do when a model evaluation fails inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Abort the run and report the failing input.
    #[default]
    Propagate,
    /// Drop the whole batch, log it, and keep sampling.
    Discard,
}

/// Parameters of a sequential exceedance estimation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorConfig {
    /// Upper bound on the number of input draws.
    pub max_samples: u64,
    /// Stop once the coefficient of variation of the estimate is at most
    /// this value.
    pub target_cov: f64,
    /// Draws evaluated between two convergence checks.
    ///
    /// With the default of 1 the CoV is checked after every draw, so a run
    /// can stop on a lucky streak long before the estimate is stable,
    /// typically for moderate targets. Batches of 50 or more make such
    /// early stops rare and also amortize parallel evaluation.
    pub batch_size: usize,
    /// Level of the reported two-sided confidence interval.
    pub confidence_level: f64,
    pub on_error: ErrorPolicy,
    /// Evaluate the draws of a batch on the rayon thread pool.
    pub parallel: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            max_samples: 1000,
            target_cov: 0.01,
            batch_size: 1,
            confidence_level: 0.95,
            on_error: ErrorPolicy::Propagate,
            parallel: false,
        }
    }
}

impl EstimatorConfig {
    pub fn with_max_samples(mut self, max_samples: u64) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_target_cov(mut self, target_cov: f64) -> Self {
        self.target_cov = target_cov;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Parses a TOML document; missing fields take their defaults.
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed TOML or unknown fields,
    /// [`ConfigError::Invalid`] if the values fail [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field against its domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_samples == 0 {
            return Err(ConfigError::Invalid {
                field: "max_samples",
                reason: "must be > 0".into(),
            });
        }
        if !(self.target_cov.is_finite() && self.target_cov > 0.0) {
            return Err(ConfigError::Invalid {
                field: "target_cov",
                reason: format!("must be a finite value > 0, got {}", self.target_cov),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_size",
                reason: "must be >= 1".into(),
            });
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ConfigError::Invalid {
                field: "confidence_level",
                reason: format!("must lie in (0, 1), got {}", self.confidence_level),
            });
        }
        Ok(())
    }
}
