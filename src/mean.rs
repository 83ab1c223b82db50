//! Sequential Monte Carlo estimator of an output mean.
//!
//! Same batch loop as the exceedance estimator, with the model outputs
//! folded into a [`WelfordAccumulator`] instead of event indicators:
//!
//! ```text
//! loop:
//!     draw and evaluate b = min(batch_size, max_samples − draws) inputs
//!     batch moments ← outputs;  running.merge(batch)
//!     se = s / √n,  CoV = se / |ȳ|
//!     stop if draws ≥ max_samples or 0 < CoV ≤ target_cov
//! ```
//!
//! The confidence interval is the normal approximation `ȳ ± z·se`.

use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ErrorPolicy, EstimatorConfig};
use crate::estimator::{
    check_input_dimension, evaluate_batch, EstimationError, EvaluatedBatch, StopReason,
};
use crate::function::EvaluationFunction;
use crate::input::InputSpec;
use crate::stats::{ConfidenceInterval, WelfordAccumulator};

/// Result of a mean estimation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanEstimate {
    pub mean: f64,
    /// Sample standard deviation of the outputs; 0 for a single output.
    pub std_dev: f64,
    /// `std_dev / √samples_used`.
    pub standard_error: f64,
    pub confidence_interval: ConfidenceInterval,
    /// `None` while fewer than two outputs were kept or the mean is 0.
    pub coefficient_of_variation: Option<f64>,
    pub samples_used: u64,
    /// All draws, including those of discarded batches.
    pub draws: u64,
    pub batches: u64,
    pub discarded_batches: u64,
    pub stop_reason: StopReason,
}

impl MeanEstimate {
    /// Pretty-printed JSON report of the run.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn standard_error(moments: &WelfordAccumulator) -> Option<f64> {
    let variance = moments.sample_variance()?;
    Some((variance / moments.count() as f64).sqrt())
}

fn coefficient_of_variation(moments: &WelfordAccumulator) -> Option<f64> {
    let mean = moments.mean()?;
    if mean == 0.0 {
        return None;
    }
    Some(standard_error(moments)? / mean.abs())
}

/// Sequential Monte Carlo estimator of `E[g(X)]`.
///
/// Shares [`EstimatorConfig`] with the exceedance estimator: the budget,
/// the CoV target, the batch size, the interval level, the error policy
/// and parallel evaluation all mean the same thing here.
///
/// # Examples
/// ```
/// use u_reliability::config::EstimatorConfig;
/// use u_reliability::distributions::Uniform;
/// use u_reliability::function::from_fn;
/// use u_reliability::input::InputSpec;
/// use u_reliability::mean::MeanEstimator;
/// use u_reliability::random::create_rng;
///
/// let input = InputSpec::builder()
///     .marginal("U", Uniform::new(1.0, 3.0).unwrap())
///     .build()
///     .unwrap();
/// let config = EstimatorConfig::default()
///     .with_max_samples(100_000)
///     .with_target_cov(0.005)
///     .with_batch_size(100);
/// let est = MeanEstimator::new(config)
///     .unwrap()
///     .estimate(&input, &from_fn(|x: &[f64]| x[0]), &mut create_rng(7))
///     .unwrap();
/// assert!((est.mean - 2.0).abs() < 0.05);
/// ```
#[derive(Debug, Clone)]
pub struct MeanEstimator {
    config: EstimatorConfig,
}

impl MeanEstimator {
    /// # Errors
    /// [`EstimationError::Config`] if the configuration is invalid.
    pub fn new(config: EstimatorConfig) -> Result<Self, EstimationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Runs one estimation.
    ///
    /// # Errors
    /// The same as [`ExceedanceEstimator::estimate`](crate::estimator::ExceedanceEstimator::estimate).
    #[tracing::instrument(level = "debug", skip_all, fields(max_samples = self.config.max_samples))]
    pub fn estimate<F, R>(
        &self,
        input: &InputSpec,
        function: &F,
        rng: &mut R,
    ) -> Result<MeanEstimate, EstimationError>
    where
        F: EvaluationFunction + ?Sized,
        R: RngCore,
    {
        check_input_dimension(input, function)?;

        let config = &self.config;
        let mut running = WelfordAccumulator::new();
        let mut draws = 0_u64;
        let mut batches = 0_u64;
        let mut discarded_batches = 0_u64;

        let stop_reason = loop {
            let size = (config.batch_size as u64).min(config.max_samples - draws);
            let batch_index = batches;
            batches += 1;

            let EvaluatedBatch { inputs, results } =
                evaluate_batch(input, function, size, config.parallel, &mut *rng);
            let batch_draws = draws;
            draws += size;

            let mut batch = WelfordAccumulator::new();
            let failure = results.iter().enumerate().find_map(|(i, result)| match result {
                Ok(y) => {
                    batch.update(*y);
                    None
                }
                Err(e) => Some((i, e.clone())),
            });
            match failure {
                None => running.merge(&batch),
                Some((index, source)) => match config.on_error {
                    ErrorPolicy::Propagate => {
                        return Err(EstimationError::Evaluation {
                            batch: batch_index,
                            draw: batch_draws + index as u64,
                            input: inputs[index].clone(),
                            source,
                        });
                    }
                    ErrorPolicy::Discard => {
                        discarded_batches += 1;
                        warn!(
                            batch = batch_index,
                            input = ?inputs[index],
                            error = %source,
                            "discarding batch after evaluation failure"
                        );
                    }
                },
            }

            let cov = coefficient_of_variation(&running);
            debug!(
                batch = batch_index,
                draws,
                samples = running.count(),
                mean = running.mean().unwrap_or(f64::NAN),
                cov = cov.unwrap_or(f64::NAN),
                "batch folded"
            );

            if let Some(cov) = cov {
                // Zero spread so far is not convergence
                if cov > 0.0 && cov <= config.target_cov {
                    break StopReason::TargetCoefficientOfVariation;
                }
            }
            if draws >= config.max_samples {
                break StopReason::MaxSamples;
            }
        };

        let no_samples = EstimationError::NoValidSamples {
            draws,
            discarded_batches,
        };
        let Some(mean) = running.mean() else {
            return Err(no_samples);
        };
        let standard_error = standard_error(&running).unwrap_or(0.0);
        let confidence_interval =
            ConfidenceInterval::for_mean(mean, standard_error, config.confidence_level)
                .ok_or(no_samples)?;

        let estimate = MeanEstimate {
            mean,
            std_dev: running.sample_std_dev().unwrap_or(0.0),
            standard_error,
            confidence_interval,
            coefficient_of_variation: coefficient_of_variation(&running),
            samples_used: running.count(),
            draws,
            batches,
            discarded_batches,
            stop_reason,
        };
        info!(
            mean = estimate.mean,
            lower = estimate.confidence_interval.lower,
            upper = estimate.confidence_interval.upper,
            samples = estimate.samples_used,
            stop = ?estimate.stop_reason,
            "mean estimation finished"
        );
        Ok(estimate)
    }
}

// ============================================================================
// Tests
// ============================================================================
