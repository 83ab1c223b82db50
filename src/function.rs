//! Evaluation functions: the black-box models under study.
//!
//! A model maps an input vector to a scalar. Deterministic models ignore
//! the generator they are handed; stochastic models draw their internal
//! uncertainty from it, so a run stays reproducible from its seed.
//!
//! # Wrappers
//!
//! - [`Instrumented`] counts calls and can record the input/output history.
//! - [`Memoized`] caches outputs by exact input. It refuses stochastic
//!   models: two calls with the same input are *supposed* to differ.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rand::RngCore;
use thiserror::Error;

/// Error type for a single model evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// The model rejected the input or failed internally.
    #[error("evaluation failed: {message}")]
    Failed { message: String },
    #[error("expected an input vector of length {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("model returned a non-finite value ({0})")]
    NonFinite(f64),
    #[error("refusing to memoize a stochastic function")]
    StochasticMemoization,
}

impl EvaluationError {
    pub fn failed(message: impl Into<String>) -> Self {
        EvaluationError::Failed {
            message: message.into(),
        }
    }
}

/// A scalar model of a random input vector.
pub trait EvaluationFunction: Send + Sync {
    /// Evaluates the model at `input`.
    ///
    /// `rng` is the source of any internal randomness. Deterministic
    /// models must not draw from it.
    fn evaluate(&self, input: &[f64], rng: &mut dyn RngCore) -> Result<f64, EvaluationError>;

    /// Whether two calls with the same input may return different values.
    fn is_stochastic(&self) -> bool {
        false
    }

    /// Expected input length, when the model fixes one.
    fn input_dimension(&self) -> Option<usize> {
        None
    }
}

impl<F: EvaluationFunction + ?Sized> EvaluationFunction for &F {
    fn evaluate(&self, input: &[f64], rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        (**self).evaluate(input, rng)
    }

    fn is_stochastic(&self) -> bool {
        (**self).is_stochastic()
    }

    fn input_dimension(&self) -> Option<usize> {
        (**self).input_dimension()
    }
}

impl<F: EvaluationFunction + ?Sized> EvaluationFunction for Box<F> {
    fn evaluate(&self, input: &[f64], rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        (**self).evaluate(input, rng)
    }

    fn is_stochastic(&self) -> bool {
        (**self).is_stochastic()
    }

    fn input_dimension(&self) -> Option<usize> {
        (**self).input_dimension()
    }
}

impl<F: EvaluationFunction + ?Sized> EvaluationFunction for Arc<F> {
    fn evaluate(&self, input: &[f64], rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        (**self).evaluate(input, rng)
    }

    fn is_stochastic(&self) -> bool {
        (**self).is_stochastic()
    }

    fn input_dimension(&self) -> Option<usize> {
        (**self).input_dimension()
    }
}

pub(crate) fn check_dimension(expected: Option<usize>, input: &[f64]) -> Result<(), EvaluationError> {
    match expected {
        Some(expected) if expected != input.len() => Err(EvaluationError::DimensionMismatch {
            expected,
            actual: input.len(),
        }),
        _ => Ok(()),
    }
}

// ============================================================================
// Closure adapters
// ============================================================================

/// Deterministic model backed by a closure. See [`from_fn`].
#[derive(Debug, Clone)]
pub struct FnFunction<F> {
    f: F,
    dimension: Option<usize>,
}

/// Wraps a deterministic closure.
///
/// # Examples
/// ```
/// use u_reliability::function::{from_fn, EvaluationFunction};
/// use u_reliability::random::create_rng;
///
/// let g = from_fn(|x: &[f64]| x[0] - x[1]).with_dimension(2);
/// let mut rng = create_rng(0);
/// assert_eq!(g.evaluate(&[4.0, 2.0], &mut rng), Ok(2.0));
/// assert!(g.evaluate(&[4.0], &mut rng).is_err());
/// ```
pub fn from_fn<F>(f: F) -> FnFunction<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    FnFunction { f, dimension: None }
}

impl<F> FnFunction<F> {
    /// Rejects inputs whose length differs from `dimension`.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

impl<F> EvaluationFunction for FnFunction<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn evaluate(&self, input: &[f64], _rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(self.dimension, input)?;
        Ok((self.f)(input))
    }

    fn input_dimension(&self) -> Option<usize> {
        self.dimension
    }
}

/// Deterministic model backed by a fallible closure. See [`try_from_fn`].
#[derive(Debug, Clone)]
pub struct TryFnFunction<F> {
    f: F,
    dimension: Option<usize>,
}

/// Wraps a deterministic closure that can reject its input.
pub fn try_from_fn<F>(f: F) -> TryFnFunction<F>
where
    F: Fn(&[f64]) -> Result<f64, EvaluationError> + Send + Sync,
{
    TryFnFunction { f, dimension: None }
}

impl<F> TryFnFunction<F> {
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

impl<F> EvaluationFunction for TryFnFunction<F>
where
    F: Fn(&[f64]) -> Result<f64, EvaluationError> + Send + Sync,
{
    fn evaluate(&self, input: &[f64], _rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(self.dimension, input)?;
        (self.f)(input)
    }

    fn input_dimension(&self) -> Option<usize> {
        self.dimension
    }
}

/// Stochastic model backed by a closure. See [`stochastic_fn`].
#[derive(Debug, Clone)]
pub struct StochasticFnFunction<F> {
    f: F,
    dimension: Option<usize>,
}

/// Wraps a closure whose output depends on draws from the generator.
pub fn stochastic_fn<F>(f: F) -> StochasticFnFunction<F>
where
    F: Fn(&[f64], &mut dyn RngCore) -> f64 + Send + Sync,
{
    StochasticFnFunction { f, dimension: None }
}

impl<F> StochasticFnFunction<F> {
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

impl<F> EvaluationFunction for StochasticFnFunction<F>
where
    F: Fn(&[f64], &mut dyn RngCore) -> f64 + Send + Sync,
{
    fn evaluate(&self, input: &[f64], rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(self.dimension, input)?;
        Ok((self.f)(input, rng))
    }

    fn is_stochastic(&self) -> bool {
        true
    }

    fn input_dimension(&self) -> Option<usize> {
        self.dimension
    }
}

// ============================================================================
// Instrumented
// ============================================================================

/// Call counter and optional input/output recorder around a model.
///
/// Safe to share across the estimator's worker threads.
#[derive(Debug)]
pub struct Instrumented<F> {
    inner: F,
    calls: AtomicU64,
    history: Option<Mutex<Vec<(Vec<f64>, f64)>>>,
}

impl<F: EvaluationFunction> Instrumented<F> {
    /// Counts calls only.
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
            history: None,
        }
    }

    /// Also records every successful `(input, output)` pair.
    pub fn with_history(inner: F) -> Self {
        Self {
            history: Some(Mutex::new(Vec::new())),
            ..Self::new(inner)
        }
    }

    /// Number of calls, including failed ones.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Recorded `(input, output)` pairs in completion order. Empty when
    /// history is disabled.
    pub fn history(&self) -> Vec<(Vec<f64>, f64)> {
        match &self.history {
            Some(h) => h.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            None => Vec::new(),
        }
    }

    /// Recorded outputs only.
    pub fn output_history(&self) -> Vec<f64> {
        self.history().into_iter().map(|(_, y)| y).collect()
    }

    /// Clears the counter and the history.
    pub fn reset(&self) {
        self.calls.store(0, Ordering::Relaxed);
        if let Some(h) = &self.history {
            h.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: EvaluationFunction> EvaluationFunction for Instrumented<F> {
    fn evaluate(&self, input: &[f64], rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let output = self.inner.evaluate(input, rng)?;
        if let Some(h) = &self.history {
            h.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((input.to_vec(), output));
        }
        Ok(output)
    }

    fn is_stochastic(&self) -> bool {
        self.inner.is_stochastic()
    }

    fn input_dimension(&self) -> Option<usize> {
        self.inner.input_dimension()
    }
}

// ============================================================================
// Memoized
// ============================================================================

/// Output cache keyed by the exact bit pattern of the input.
///
/// Only successful evaluations are cached.
#[derive(Debug)]
pub struct Memoized<F> {
    inner: F,
    cache: Mutex<HashMap<Vec<u64>, f64>>,
    hits: AtomicU64,
}

impl<F: EvaluationFunction> Memoized<F> {
    /// # Errors
    /// [`EvaluationError::StochasticMemoization`] if `inner` is stochastic.
    pub fn new(inner: F) -> Result<Self, EvaluationError> {
        if inner.is_stochastic() {
            return Err(EvaluationError::StochasticMemoization);
        }
        Ok(Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
        })
    }

    /// Number of distinct inputs cached.
    pub fn cached(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of calls answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn key(input: &[f64]) -> Vec<u64> {
        input.iter().map(|x| x.to_bits()).collect()
    }
}

impl<F: EvaluationFunction> EvaluationFunction for Memoized<F> {
    fn evaluate(&self, input: &[f64], rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        let key = Self::key(input);
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied();
        if let Some(output) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(output);
        }
        let output = self.inner.evaluate(input, rng)?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, output);
        Ok(output)
    }

    fn input_dimension(&self) -> Option<usize> {
        self.inner.input_dimension()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_rng;
    use rand::Rng;

    #[test]
    fn test_from_fn_evaluates() {
        let g = from_fn(|x: &[f64]| x[0] - x[1]);
        let mut rng = create_rng(0);
        assert_eq!(g.evaluate(&[4.0, 2.5], &mut rng), Ok(1.5));
        assert!(!g.is_stochastic());
        assert_eq!(g.input_dimension(), None);
    }

    #[test]
    fn test_dimension_check() {
        let g = from_fn(|x: &[f64]| x.iter().sum()).with_dimension(3);
        let mut rng = create_rng(0);
        assert_eq!(
            g.evaluate(&[1.0, 2.0], &mut rng),
            Err(EvaluationError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(g.input_dimension(), Some(3));
    }

    #[test]
    fn test_try_from_fn_propagates_failure() {
        let g = try_from_fn(|x: &[f64]| {
            if x[0] < 0.0 {
                Err(EvaluationError::failed("negative flow"))
            } else {
                Ok(x[0].sqrt())
            }
        });
        let mut rng = create_rng(0);
        assert_eq!(g.evaluate(&[4.0], &mut rng), Ok(2.0));
        assert!(matches!(
            g.evaluate(&[-1.0], &mut rng),
            Err(EvaluationError::Failed { .. })
        ));
    }

    #[test]
    fn test_stochastic_fn_differs_between_calls() {
        let g = stochastic_fn(|x: &[f64], rng: &mut dyn RngCore| x[0] + rng.random::<f64>());
        assert!(g.is_stochastic());
        let mut rng = create_rng(3);
        let a = g.evaluate(&[1.0], &mut rng).unwrap();
        let b = g.evaluate(&[1.0], &mut rng).unwrap();
        assert_ne!(a, b);
        // Same generator state, same output
        let mut r1 = create_rng(3);
        let mut r2 = create_rng(3);
        assert_eq!(g.evaluate(&[1.0], &mut r1), g.evaluate(&[1.0], &mut r2));
    }

    #[test]
    fn test_instrumented_counts_and_records() {
        let g = Instrumented::with_history(from_fn(|x: &[f64]| 2.0 * x[0]));
        let mut rng = create_rng(0);
        for i in 0..5 {
            g.evaluate(&[i as f64], &mut rng).unwrap();
        }
        assert_eq!(g.calls(), 5);
        assert_eq!(g.output_history(), vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(g.history()[2].0, vec![2.0]);
        g.reset();
        assert_eq!(g.calls(), 0);
        assert!(g.history().is_empty());
    }

    #[test]
    fn test_instrumented_counts_failures_without_recording() {
        let g = Instrumented::with_history(try_from_fn(|_: &[f64]| Err(EvaluationError::failed("boom"))));
        let mut rng = create_rng(0);
        assert!(g.evaluate(&[1.0], &mut rng).is_err());
        assert_eq!(g.calls(), 1);
        assert!(g.history().is_empty());
    }

    #[test]
    fn test_memoized_caches() {
        let counted = Instrumented::new(from_fn(|x: &[f64]| x[0] * x[0]));
        let g = Memoized::new(&counted).unwrap();
        let mut rng = create_rng(0);
        for _ in 0..3 {
            assert_eq!(g.evaluate(&[3.0], &mut rng), Ok(9.0));
        }
        assert_eq!(g.evaluate(&[2.0], &mut rng), Ok(4.0));
        assert_eq!(counted.calls(), 2);
        assert_eq!(g.hits(), 2);
        assert_eq!(g.cached(), 2);
    }

    #[test]
    fn test_memoized_refuses_stochastic() {
        let g = stochastic_fn(|x: &[f64], rng: &mut dyn RngCore| x[0] * rng.random::<f64>());
        assert_eq!(
            Memoized::new(g).err(),
            Some(EvaluationError::StochasticMemoization)
        );
    }

    #[test]
    fn test_boxed_trait_object() {
        let g: Box<dyn EvaluationFunction> = Box::new(from_fn(|x: &[f64]| x[0]).with_dimension(1));
        let mut rng = create_rng(0);
        assert_eq!(g.evaluate(&[7.0], &mut rng), Ok(7.0));
        assert_eq!(g.input_dimension(), Some(1));
    }
}
