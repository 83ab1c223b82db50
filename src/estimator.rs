//! Sequential Monte Carlo exceedance estimator.
//!
//! Estimates `P(g(X) <op> t)` by drawing batches of input vectors,
//! evaluating the model on each, and folding the 0/1 event indicators
//! into a [`RunningEstimate`]. After every batch the coefficient of
//! variation of the estimate is compared with the target.
//!
//! # Algorithm
//!
//! ```text
//! loop:
//!     draw b = min(batch_size, max_samples − draws) inputs (+ one seed each)
//!     evaluate g on the batch           (optionally on the rayon pool)
//!     batch estimate ← indicators;  running.merge(batch)
//!     p̂ = S/n,  CoV = √(Var/n) / p̂
//!     stop if draws ≥ max_samples or 0 < CoV ≤ target_cov
//! ```
//!
//! # Reproducibility
//!
//! Inputs and per-evaluation seeds are drawn from the caller's generator
//! in a fixed order before the batch is evaluated. Each evaluation gets
//! its own generator, so results do not depend on whether the batch runs
//! sequentially or in parallel, and stochastic models stay reproducible
//! from the seed.

use rand::RngCore;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ErrorPolicy, EstimatorConfig};
use crate::event::ExceedanceEvent;
use crate::function::{EvaluationError, EvaluationFunction};
use crate::input::InputSpec;
use crate::random::create_rng;
use crate::stats::{ConfidenceInterval, RunningEstimate, WelfordAccumulator};

/// Error type for an estimation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model expects {function} inputs but the input specification has {input}")]
    DimensionMismatch { input: usize, function: usize },
    /// A draw failed under [`ErrorPolicy::Propagate`].
    #[error("evaluation failed in batch {batch} (draw {draw}) at input {input:?}: {source}")]
    Evaluation {
        batch: u64,
        draw: u64,
        input: Vec<f64>,
        #[source]
        source: EvaluationError,
    },
    /// Every batch was discarded.
    #[error("no valid samples after {draws} draws ({discarded_batches} batches discarded)")]
    NoValidSamples { draws: u64, discarded_batches: u64 },
}

/// Why an estimation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxSamples,
    TargetCoefficientOfVariation,
}

/// Descriptive statistics of the model outputs seen during a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputStatistics {
    pub mean: f64,
    /// Sample standard deviation; 0 for a single output.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Result of an estimation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    /// `p̂`, the fraction of evaluated draws for which the event occurred.
    pub probability: f64,
    pub confidence_interval: ConfidenceInterval,
    /// Draws that entered the estimate.
    pub samples_used: u64,
    /// All draws, including those of discarded batches.
    pub draws: u64,
    pub exceedances: u64,
    /// `None` while no event has been observed.
    pub coefficient_of_variation: Option<f64>,
    pub standard_error: f64,
    pub batches: u64,
    pub discarded_batches: u64,
    pub discarded_samples: u64,
    pub stop_reason: StopReason,
    pub output: OutputStatistics,
}

impl Estimate {
    /// Full width of the confidence interval.
    pub fn confidence_length(&self) -> f64 {
        self.confidence_interval.length()
    }

    /// Pretty-printed JSON report of the run.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Output accumulator: Welford moments plus extremes.
#[derive(Debug, Clone, Default)]
struct OutputAccumulator {
    moments: WelfordAccumulator,
    min: f64,
    max: f64,
}

impl OutputAccumulator {
    fn update(&mut self, y: f64) {
        if self.moments.count() == 0 {
            self.min = y;
            self.max = y;
        } else {
            self.min = self.min.min(y);
            self.max = self.max.max(y);
        }
        self.moments.update(y);
    }

    fn merge(&mut self, other: &OutputAccumulator) {
        if other.moments.count() == 0 {
            return;
        }
        if self.moments.count() == 0 {
            *self = other.clone();
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.moments.merge(&other.moments);
    }

    fn statistics(&self) -> OutputStatistics {
        OutputStatistics {
            mean: self.moments.mean().unwrap_or(f64::NAN),
            std_dev: self.moments.sample_std_dev().unwrap_or(0.0),
            min: self.min,
            max: self.max,
        }
    }
}

/// One batch folded into partial accumulators before the merge.
#[derive(Debug, Default)]
struct BatchAccumulator {
    estimate: RunningEstimate,
    output: OutputAccumulator,
}

/// Sequential Monte Carlo estimator of exceedance probabilities.
///
/// # Examples
/// ```
/// use u_reliability::config::EstimatorConfig;
/// use u_reliability::distributions::Normal;
/// use u_reliability::estimator::ExceedanceEstimator;
/// use u_reliability::event::ExceedanceEvent;
/// use u_reliability::function::from_fn;
/// use u_reliability::input::InputSpec;
/// use u_reliability::random::create_rng;
///
/// let input = InputSpec::builder()
///     .marginal("R", Normal::new(4.0, 1.0).unwrap())
///     .marginal("S", Normal::new(2.0, 1.0).unwrap())
///     .build()
///     .unwrap();
/// let g = from_fn(|x: &[f64]| x[0] - x[1]);
/// let config = EstimatorConfig::default().with_batch_size(100);
/// let estimator = ExceedanceEstimator::new(config).unwrap();
/// let mut rng = create_rng(42);
/// let est = estimator
///     .estimate(&input, &g, &ExceedanceEvent::greater_or_equal(0.0), &mut rng)
///     .unwrap();
/// assert!((est.probability - 0.9214).abs() < 0.05);
/// assert!(est.confidence_interval.contains(est.probability));
/// ```
#[derive(Debug, Clone)]
pub struct ExceedanceEstimator {
    config: EstimatorConfig,
}

impl ExceedanceEstimator {
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
    /// - [`EstimationError::DimensionMismatch`] if the model fixes an input
    ///   length different from the specification's.
    /// - [`EstimationError::Evaluation`] on the first failing draw under
    ///   [`ErrorPolicy::Propagate`].
    /// - [`EstimationError::NoValidSamples`] if every batch was discarded.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(event = %event, max_samples = self.config.max_samples)
    )]
    pub fn estimate<F, R>(
        &self,
        input: &InputSpec,
        function: &F,
        event: &ExceedanceEvent,
        rng: &mut R,
    ) -> Result<Estimate, EstimationError>
    where
        F: EvaluationFunction + ?Sized,
        R: RngCore,
    {
        check_input_dimension(input, function)?;

        let config = &self.config;
        let mut running = RunningEstimate::new();
        let mut outputs = OutputAccumulator::default();
        let mut draws = 0_u64;
        let mut batches = 0_u64;
        let mut discarded_batches = 0_u64;
        let mut discarded_samples = 0_u64;

        let stop_reason = loop {
            let size = (config.batch_size as u64).min(config.max_samples - draws);
            let batch_index = batches;
            batches += 1;

            let EvaluatedBatch { inputs, results } =
                evaluate_batch(input, function, size, config.parallel, &mut *rng);

            let batch_draws = draws;
            draws += size;

            match fold_batch(&results, event) {
                Ok(batch) => {
                    running.merge(&batch.estimate);
                    outputs.merge(&batch.output);
                }
                Err((index, source)) => match config.on_error {
                    ErrorPolicy::Propagate => {
                        return Err(EstimationError::Evaluation {
                            batch: batch_index,
                            draw: batch_draws + index as u64,
                            input: inputs[index].clone(),
                            source,
                        });
                    }
                    ErrorPolicy::Discard => {
                        let failures = results.iter().filter(|r| r.is_err()).count();
                        discarded_batches += 1;
                        discarded_samples += size;
                        warn!(
                            batch = batch_index,
                            failures,
                            input = ?inputs[index],
                            error = %source,
                            "discarding batch after evaluation failure"
                        );
                    }
                },
            }

            let cov = running.coefficient_of_variation();
            debug!(
                batch = batch_index,
                draws,
                samples = running.count(),
                p_hat = running.probability().unwrap_or(f64::NAN),
                cov = cov.unwrap_or(f64::NAN),
                "batch folded"
            );

            if let Some(cov) = cov {
                // A zero CoV means the estimate sits at 0 or 1, which is
                // not convergence.
                if cov > 0.0 && cov <= config.target_cov {
                    break StopReason::TargetCoefficientOfVariation;
                }
            }
            if draws >= config.max_samples {
                break StopReason::MaxSamples;
            }
        };

        let (Some(probability), Some(standard_error)) =
            (running.probability(), running.standard_error())
        else {
            return Err(EstimationError::NoValidSamples {
                draws,
                discarded_batches,
            });
        };
        let confidence_interval = running
            .confidence_interval(config.confidence_level)
            .ok_or(EstimationError::NoValidSamples {
                draws,
                discarded_batches,
            })?;
        if confidence_interval.degenerate {
            warn!(
                p_hat = probability,
                samples = running.count(),
                "estimate is 0 or 1; using exact binomial bound for the interval"
            );
        }

        let estimate = Estimate {
            probability,
            confidence_interval,
            samples_used: running.count(),
            draws,
            exceedances: running.exceedances(),
            coefficient_of_variation: running.coefficient_of_variation(),
            standard_error,
            batches,
            discarded_batches,
            discarded_samples,
            stop_reason,
            output: outputs.statistics(),
        };
        info!(
            p_hat = estimate.probability,
            lower = estimate.confidence_interval.lower,
            upper = estimate.confidence_interval.upper,
            samples = estimate.samples_used,
            stop = ?estimate.stop_reason,
            "exceedance estimation finished"
        );
        Ok(estimate)
    }
}

/// Inputs of one batch and the model outputs on them, in draw order.
pub(crate) struct EvaluatedBatch {
    pub(crate) inputs: Vec<Vec<f64>>,
    pub(crate) results: Vec<Result<f64, EvaluationError>>,
}

/// Draws `size` inputs, each followed by one evaluation seed, then
/// evaluates them. Non-finite outputs are failures.
pub(crate) fn evaluate_batch<F, R>(
    input: &InputSpec,
    function: &F,
    size: u64,
    parallel: bool,
    rng: &mut R,
) -> EvaluatedBatch
where
    F: EvaluationFunction + ?Sized,
    R: RngCore,
{
    let points: Vec<(Vec<f64>, u64)> = (0..size)
        .map(|_| (input.sample(&mut *rng), rng.next_u64()))
        .collect();
    let evaluate = |(x, seed): &(Vec<f64>, u64)| -> Result<f64, EvaluationError> {
        let mut eval_rng = create_rng(*seed);
        let y = function.evaluate(x, &mut eval_rng)?;
        if y.is_finite() {
            Ok(y)
        } else {
            Err(EvaluationError::NonFinite(y))
        }
    };
    let results: Vec<Result<f64, EvaluationError>> = if parallel {
        points.par_iter().map(evaluate).collect()
    } else {
        points.iter().map(evaluate).collect()
    };
    EvaluatedBatch {
        inputs: points.into_iter().map(|(x, _)| x).collect(),
        results,
    }
}

/// Rejects a model whose fixed input length differs from the
/// specification's.
pub(crate) fn check_input_dimension<F>(input: &InputSpec, function: &F) -> Result<(), EstimationError>
where
    F: EvaluationFunction + ?Sized,
{
    match function.input_dimension() {
        Some(expected) if expected != input.dimension() => Err(EstimationError::DimensionMismatch {
            input: input.dimension(),
            function: expected,
        }),
        _ => Ok(()),
    }
}

/// Folds a fully evaluated batch, or returns the first failure.
fn fold_batch(
    results: &[Result<f64, EvaluationError>],
    event: &ExceedanceEvent,
) -> Result<BatchAccumulator, (usize, EvaluationError)> {
    let mut batch = BatchAccumulator::default();
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(y) => {
                batch.estimate.record(event.occurs(*y));
                batch.output.update(*y);
            }
            Err(e) => return Err((i, e.clone())),
        }
    }
    Ok(batch)
}

/// One-call form of [`ExceedanceEstimator::estimate`] with the remaining
/// settings at their defaults.
///
/// # Errors
/// See [`ExceedanceEstimator::new`] and [`ExceedanceEstimator::estimate`].
pub fn estimate_exceedance<F, R>(
    input: &InputSpec,
    function: &F,
    event: &ExceedanceEvent,
    max_samples: u64,
    target_cov: f64,
    batch_size: usize,
    rng: &mut R,
) -> Result<Estimate, EstimationError>
where
    F: EvaluationFunction + ?Sized,
    R: RngCore,
{
    let config = EstimatorConfig::default()
        .with_max_samples(max_samples)
        .with_target_cov(target_cov)
        .with_batch_size(batch_size);
    ExceedanceEstimator::new(config)?.estimate(input, function, event, rng)
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::distributions::Uniform;
    use crate::function::from_fn;
    use crate::random::create_rng;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn interval_always_brackets_estimate(
            seed in 0_u64..10000,
            threshold in -0.1_f64..1.1,
            max_samples in 1_u64..400,
            batch_size in 1_usize..50,
        ) {
            let input = InputSpec::builder()
                .marginal("U", Uniform::new(0.0, 1.0).unwrap())
                .build()
                .unwrap();
            let est = ExceedanceEstimator::new(
                EstimatorConfig::default()
                    .with_max_samples(max_samples)
                    .with_target_cov(0.05)
                    .with_batch_size(batch_size),
            )
            .unwrap()
            .estimate(
                &input,
                &from_fn(|x: &[f64]| x[0]),
                &ExceedanceEvent::greater_or_equal(threshold),
                &mut create_rng(seed),
            )
            .unwrap();
            let ci = est.confidence_interval;
            prop_assert!(0.0 <= ci.lower && ci.lower <= est.probability);
            prop_assert!(est.probability <= ci.upper && ci.upper <= 1.0);
            prop_assert!(est.draws <= max_samples);
        }

        #[test]
        fn batch_size_does_not_change_full_budget_estimate(
            seed in 0_u64..10000,
            batch_a in 1_usize..64,
            batch_b in 1_usize..64,
        ) {
            // Without early stopping, both runs consume the same draws
            let input = InputSpec::builder()
                .marginal("U", Uniform::new(0.0, 1.0).unwrap())
                .build()
                .unwrap();
            let run = |batch_size: usize| {
                ExceedanceEstimator::new(
                    EstimatorConfig::default()
                        .with_max_samples(300)
                        .with_target_cov(1e-9)
                        .with_batch_size(batch_size),
                )
                .unwrap()
                .estimate(
                    &input,
                    &from_fn(|x: &[f64]| x[0]),
                    &ExceedanceEvent::greater(0.3),
                    &mut create_rng(seed),
                )
                .unwrap()
            };
            let a = run(batch_a);
            let b = run(batch_b);
            prop_assert_eq!(a.exceedances, b.exceedances);
            prop_assert_eq!(a.probability, b.probability);
        }
    }
}
