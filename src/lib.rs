//! # u-reliability
//!
//! Monte Carlo reliability analysis: estimate the probability that a
//! black-box model output crosses a threshold, with a confidence interval
//! and a coefficient-of-variation stopping rule.
//!
//! ## Modules
//!
//! - [`special`]: normal CDF, PDF, and inverse CDF
//! - [`random`]: seeded generators and child-generator derivation
//! - [`distributions`]: univariate marginals, truncation
//! - [`copula`]: independent and Gaussian dependence structures
//! - [`input`]: named joint input distribution
//! - [`function`]: evaluation functions, instrumentation, memoization
//! - [`event`]: threshold events on a model output
//! - [`stats`]: Welford accumulators, running estimates, intervals
//! - [`config`]: estimator settings, loadable from TOML
//! - [`estimator`]: sequential Monte Carlo exceedance estimator
//! - [`mean`]: sequential Monte Carlo estimator of an output mean
//! - [`propagation`]: plain Monte Carlo propagation and output summaries
//! - [`models`]: reference models with their input distributions
//! - [`io`]: CSV sample tables
//!
//! ## Quick start
//!
//! ```
//! use u_reliability::config::EstimatorConfig;
//! use u_reliability::estimator::ExceedanceEstimator;
//! use u_reliability::models::{ReferenceModel, StressStrength};
//! use u_reliability::random::create_rng;
//!
//! let model = StressStrength;
//! let input = model.input_spec().unwrap();
//! let config = EstimatorConfig::default().with_batch_size(100);
//! let estimator = ExceedanceEstimator::new(config).unwrap();
//! let estimate = estimator
//!     .estimate(&input, &model, &StressStrength::event(), &mut create_rng(0))
//!     .unwrap();
//! assert!(estimate.probability > 0.85 && estimate.probability < 0.98);
//! ```
//!
//! ## Conventions
//!
//! - Randomness is always passed in explicitly; nothing reads a global
//!   generator, so a seed reproduces a run.
//! - The library logs through `tracing` and never installs a subscriber.

pub mod config;
pub mod copula;
pub mod distributions;
pub mod estimator;
pub mod event;
pub mod function;
pub mod input;
pub mod io;
pub mod mean;
pub mod models;
pub mod propagation;
pub mod random;
pub mod special;
pub mod stats;
