//! Plain Monte Carlo uncertainty propagation.
//!
//! [`propagate`] pushes `n` input draws through a model and keeps both
//! sides, so the output distribution can be summarised, binned, or
//! written out as a table.

use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::function::{EvaluationError, EvaluationFunction};
use crate::input::InputSpec;
use crate::io::{write_samples, IoError};
use crate::random::derive_rng;
use crate::stats::{mean, quantile_sorted, sorted_copy, variance};

/// Probabilities reported by [`OutputSample::summary`].
pub const SUMMARY_PROBABILITIES: [f64; 5] = [0.05, 0.25, 0.5, 0.75, 0.95];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropagationError {
    #[error("model expects {function} inputs but the input specification has {input}")]
    DimensionMismatch { input: usize, function: usize },
    #[error("evaluation {index} failed at input {input:?}: {source}")]
    Evaluation {
        index: usize,
        input: Vec<f64>,
        #[source]
        source: EvaluationError,
    },
}

/// Inputs and outputs of a propagation run, row-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSample {
    pub input_names: Vec<String>,
    pub inputs: Vec<Vec<f64>>,
    pub outputs: Vec<f64>,
}

/// Descriptive statistics of an [`OutputSample`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSummary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// `(probability, quantile)` pairs for [`SUMMARY_PROBABILITIES`].
    pub quantiles: Vec<(f64, f64)>,
}

/// Draws `n` inputs and evaluates `function` on each.
///
/// Every evaluation gets a child generator derived from `rng`, the same
/// scheme the estimator uses.
///
/// # Errors
/// Returns the first evaluation failure (non-finite outputs included)
/// together with its input.
pub fn propagate<F, R>(
    input: &InputSpec,
    function: &F,
    n: usize,
    rng: &mut R,
) -> Result<OutputSample, PropagationError>
where
    F: EvaluationFunction + ?Sized,
    R: RngCore,
{
    if let Some(expected) = function.input_dimension() {
        if expected != input.dimension() {
            return Err(PropagationError::DimensionMismatch {
                input: input.dimension(),
                function: expected,
            });
        }
    }

    let mut inputs = Vec::with_capacity(n);
    let mut outputs = Vec::with_capacity(n);
    for index in 0..n {
        let x = input.sample(&mut *rng);
        let mut eval_rng = derive_rng(rng);
        let y = function
            .evaluate(&x, &mut eval_rng)
            .and_then(|y| if y.is_finite() { Ok(y) } else { Err(EvaluationError::NonFinite(y)) });
        match y {
            Ok(y) => {
                inputs.push(x);
                outputs.push(y);
            }
            Err(source) => {
                return Err(PropagationError::Evaluation {
                    index,
                    input: x,
                    source,
                })
            }
        }
    }
    debug!(n, "propagation finished");

    Ok(OutputSample {
        input_names: input.names().into_iter().map(String::from).collect(),
        inputs,
        outputs,
    })
}

impl OutputSample {
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Mean, spread, extremes, and quartile-style quantiles of the outputs.
    /// `None` for an empty sample.
    pub fn summary(&self) -> Option<OutputSummary> {
        if self.outputs.is_empty() {
            return None;
        }
        let sorted = sorted_copy(&self.outputs)?;
        let quantiles = SUMMARY_PROBABILITIES
            .iter()
            .filter_map(|&p| quantile_sorted(&sorted, p).map(|q| (p, q)))
            .collect();
        Some(OutputSummary {
            count: sorted.len(),
            mean: mean(&sorted)?,
            std_dev: variance(&sorted).map_or(0.0, f64::sqrt),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            quantiles,
        })
    }

    /// Equal-width histogram of the outputs as `(bin centre, density)`
    /// pairs; densities integrate to 1.
    ///
    /// Empty for an empty sample or `bins == 0`. A constant sample yields
    /// a single unit-width bin.
    pub fn histogram(&self, bins: usize) -> Vec<(f64, f64)> {
        if bins == 0 || self.outputs.is_empty() {
            return Vec::new();
        }
        let min = self.outputs.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.outputs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let n = self.outputs.len() as f64;
        if max <= min {
            return vec![(min, 1.0)];
        }

        let width = (max - min) / bins as f64;
        let mut counts = vec![0_usize; bins];
        for &y in &self.outputs {
            let k = (((y - min) / width) as usize).min(bins - 1);
            counts[k] += 1;
        }
        counts
            .into_iter()
            .enumerate()
            .map(|(k, c)| (min + (k as f64 + 0.5) * width, c as f64 / (n * width)))
            .collect()
    }

    /// Writes the sample as CSV, one row per draw.
    pub fn write_csv<W: std::io::Write>(&self, writer: W, output_name: &str) -> Result<(), IoError> {
        let names: Vec<&str> = self.input_names.iter().map(String::as_str).collect();
        write_samples(writer, &names, output_name, &self.inputs, &self.outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{Normal, Uniform};
    use crate::function::{from_fn, try_from_fn};
    use crate::random::create_rng;

    fn uniform_input() -> InputSpec {
        InputSpec::builder()
            .marginal("U", Uniform::new(0.0, 1.0).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_propagate_keeps_rows_aligned() {
        let sample = propagate(
            &uniform_input(),
            &from_fn(|x: &[f64]| 2.0 * x[0]),
            100,
            &mut create_rng(1),
        )
        .unwrap();
        assert_eq!(sample.len(), 100);
        assert_eq!(sample.input_names, vec!["U".to_string()]);
        for (x, y) in sample.inputs.iter().zip(&sample.outputs) {
            assert_eq!(*y, 2.0 * x[0]);
        }
    }

    #[test]
    fn test_summary_of_normal_output() {
        let input = InputSpec::builder()
            .marginal("X", Normal::new(10.0, 2.0).unwrap())
            .build()
            .unwrap();
        let sample = propagate(&input, &from_fn(|x: &[f64]| x[0]), 20_000, &mut create_rng(2)).unwrap();
        let s = sample.summary().unwrap();
        assert_eq!(s.count, 20_000);
        assert!((s.mean - 10.0).abs() < 0.1, "mean = {}", s.mean);
        assert!((s.std_dev - 2.0).abs() < 0.1, "std = {}", s.std_dev);
        let median = s.quantiles.iter().find(|(p, _)| *p == 0.5).unwrap().1;
        assert!((median - 10.0).abs() < 0.1);
        assert!(s.min < median && median < s.max);
    }

    #[test]
    fn test_empty_sample() {
        let sample = propagate(&uniform_input(), &from_fn(|x: &[f64]| x[0]), 0, &mut create_rng(3)).unwrap();
        assert!(sample.is_empty());
        assert!(sample.summary().is_none());
        assert!(sample.histogram(10).is_empty());
    }

    #[test]
    fn test_histogram_integrates_to_one() {
        let sample = propagate(&uniform_input(), &from_fn(|x: &[f64]| x[0]), 5000, &mut create_rng(4)).unwrap();
        let hist = sample.histogram(20);
        assert_eq!(hist.len(), 20);
        let width = hist[1].0 - hist[0].0;
        let total: f64 = hist.iter().map(|(_, d)| d * width).sum();
        assert!((total - 1.0).abs() < 1e-9);
        // Roughly flat for a uniform output
        assert!(hist.iter().all(|(_, d)| (*d - 1.0).abs() < 0.3));
    }

    #[test]
    fn test_histogram_constant_output() {
        let sample = OutputSample {
            input_names: vec!["X".into()],
            inputs: vec![vec![1.0]; 3],
            outputs: vec![4.0; 3],
        };
        assert_eq!(sample.histogram(5), vec![(4.0, 1.0)]);
        assert!(sample.histogram(0).is_empty());
    }

    #[test]
    fn test_failure_reports_index_and_input() {
        let g = try_from_fn(|x: &[f64]| {
            if x[0] > 0.5 {
                Err(EvaluationError::failed("too large"))
            } else {
                Ok(x[0])
            }
        });
        match propagate(&uniform_input(), &g, 1000, &mut create_rng(5)) {
            Err(PropagationError::Evaluation { input, .. }) => assert!(input[0] > 0.5),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let g = from_fn(|x: &[f64]| x[0]).with_dimension(3);
        assert_eq!(
            propagate(&uniform_input(), &g, 10, &mut create_rng(6)).unwrap_err(),
            PropagationError::DimensionMismatch { input: 1, function: 3 }
        );
    }
}
