//! Random input specification.
//!
//! An [`InputSpec`] is an ordered list of named marginals plus a
//! [`Copula`]. Together they define a joint sampler producing vectors
//! whose length equals the number of marginals.

use std::collections::HashSet;
use std::fmt;

use rand::RngCore;
use thiserror::Error;
use tracing::warn;

use crate::copula::Copula;
use crate::distributions::Marginal;

/// Error type for invalid input specifications.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("input specification has no marginals")]
    Empty,
    #[error("input names must be non-empty (position {0})")]
    EmptyName(usize),
    #[error("duplicate input name `{0}`")]
    DuplicateName(String),
    #[error("copula dimension {copula} does not match {marginals} marginals")]
    CopulaDimension { copula: usize, marginals: usize },
}

struct NamedMarginal {
    name: String,
    distribution: Box<dyn Marginal>,
}

/// Joint distribution of a model's random inputs.
///
/// Draws are i.i.d. across calls; the only state involved is the
/// generator passed to [`sample`](Self::sample).
///
/// # Examples
/// ```
/// use u_reliability::distributions::Normal;
/// use u_reliability::input::InputSpec;
/// use u_reliability::random::create_rng;
///
/// let spec = InputSpec::builder()
///     .marginal("R", Normal::new(4.0, 1.0).unwrap())
///     .marginal("S", Normal::new(2.0, 1.0).unwrap())
///     .build()
///     .unwrap();
/// let mut rng = create_rng(42);
/// let x = spec.sample(&mut rng);
/// assert_eq!(x.len(), 2);
/// assert_eq!(spec.names(), vec!["R", "S"]);
/// ```
pub struct InputSpec {
    marginals: Vec<NamedMarginal>,
    copula: Copula,
}

impl fmt::Debug for InputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for m in &self.marginals {
            map.entry(&m.name, &m.distribution);
        }
        map.finish()?;
        if !matches!(self.copula, Copula::Independent) {
            write!(f, " with {:?}", self.copula)?;
        }
        Ok(())
    }
}

impl InputSpec {
    pub fn builder() -> InputSpecBuilder {
        InputSpecBuilder::default()
    }

    /// Number of coordinates of a sampled vector.
    pub fn dimension(&self) -> usize {
        self.marginals.len()
    }

    /// Input names in order.
    pub fn names(&self) -> Vec<&str> {
        self.marginals.iter().map(|m| m.name.as_str()).collect()
    }

    /// Position of the input called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.marginals.iter().position(|m| m.name == name)
    }

    /// Marginal of coordinate `index`.
    pub fn marginal(&self, index: usize) -> Option<&dyn Marginal> {
        self.marginals.get(index).map(|m| m.distribution.as_ref())
    }

    pub fn copula(&self) -> &Copula {
        &self.copula
    }

    /// Draws one input vector.
    pub fn sample(&self, rng: &mut dyn RngCore) -> Vec<f64> {
        match &self.copula {
            Copula::Independent => self
                .marginals
                .iter()
                .map(|m| m.distribution.sample(&mut *rng))
                .collect(),
            copula => copula
                .sample_uniforms(self.dimension(), rng)
                .into_iter()
                .zip(&self.marginals)
                .map(|(u, m)| match m.distribution.quantile(u) {
                    Some(x) => x,
                    None => {
                        warn!(u, input = %m.name, "quantile undefined inside (0, 1), drawing NaN");
                        f64::NAN
                    }
                })
                .collect(),
        }
    }

    /// Draws `n` input vectors.
    pub fn sample_n(&self, n: usize, rng: &mut dyn RngCore) -> Vec<Vec<f64>> {
        (0..n).map(|_| self.sample(&mut *rng)).collect()
    }
}

/// Builder for [`InputSpec`]. Validation happens in [`build`](Self::build).
#[derive(Default)]
pub struct InputSpecBuilder {
    marginals: Vec<NamedMarginal>,
    copula: Copula,
}

impl InputSpecBuilder {
    /// Appends a named marginal.
    pub fn marginal(mut self, name: impl Into<String>, distribution: impl Marginal + 'static) -> Self {
        self.marginals.push(NamedMarginal {
            name: name.into(),
            distribution: Box::new(distribution),
        });
        self
    }

    /// Appends an already boxed marginal.
    pub fn boxed_marginal(mut self, name: impl Into<String>, distribution: Box<dyn Marginal>) -> Self {
        self.marginals.push(NamedMarginal {
            name: name.into(),
            distribution,
        });
        self
    }

    pub fn copula(mut self, copula: Copula) -> Self {
        self.copula = copula;
        self
    }

    /// # Errors
    /// Rejects empty specifications, empty or duplicate names, and a
    /// copula whose dimension differs from the marginal count.
    pub fn build(self) -> Result<InputSpec, InputError> {
        if self.marginals.is_empty() {
            return Err(InputError::Empty);
        }
        let mut seen = HashSet::new();
        for (i, m) in self.marginals.iter().enumerate() {
            if m.name.trim().is_empty() {
                return Err(InputError::EmptyName(i));
            }
            if !seen.insert(m.name.as_str()) {
                return Err(InputError::DuplicateName(m.name.clone()));
            }
        }
        if let Some(copula) = self.copula.dimension() {
            if copula != self.marginals.len() {
                return Err(InputError::CopulaDimension {
                    copula,
                    marginals: self.marginals.len(),
                });
            }
        }
        Ok(InputSpec {
            marginals: self.marginals,
            copula: self.copula,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{Dirac, Normal, Uniform};
    use crate::random::create_rng;

    fn two_normals() -> InputSpec {
        InputSpec::builder()
            .marginal("R", Normal::new(4.0, 1.0).unwrap())
            .marginal("S", Normal::new(2.0, 1.0).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_dimension_and_names() {
        let spec = two_normals();
        assert_eq!(spec.dimension(), 2);
        assert_eq!(spec.names(), vec!["R", "S"]);
        assert_eq!(spec.index_of("S"), Some(1));
        assert_eq!(spec.index_of("Q"), None);
        assert!(spec.marginal(0).is_some());
        assert!(spec.marginal(2).is_none());
    }

    #[test]
    fn test_sample_is_reproducible() {
        let spec = two_normals();
        let mut rng1 = create_rng(5);
        let mut rng2 = create_rng(5);
        assert_eq!(spec.sample_n(20, &mut rng1), spec.sample_n(20, &mut rng2));
    }

    #[test]
    fn test_successive_draws_differ() {
        let spec = two_normals();
        let mut rng = create_rng(5);
        let a = spec.sample(&mut rng);
        let b = spec.sample(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_dirac_coordinate_is_constant() {
        let spec = InputSpec::builder()
            .marginal("strain", Uniform::new(0.0, 0.07).unwrap())
            .marginal("R", Dirac::new(750e6).unwrap())
            .build()
            .unwrap();
        let mut rng = create_rng(1);
        for x in spec.sample_n(100, &mut rng) {
            assert_eq!(x.len(), 2);
            assert!(x[0] > 0.0 && x[0] < 0.07);
            assert_eq!(x[1], 750e6);
        }
    }

    #[test]
    fn test_build_rejects_invalid() {
        assert_eq!(InputSpec::builder().build().unwrap_err(), InputError::Empty);
        let dup = InputSpec::builder()
            .marginal("X", Normal::standard())
            .marginal("X", Normal::standard())
            .build();
        assert_eq!(dup.unwrap_err(), InputError::DuplicateName("X".into()));
        let unnamed = InputSpec::builder().marginal(" ", Normal::standard()).build();
        assert_eq!(unnamed.unwrap_err(), InputError::EmptyName(0));
    }

    #[test]
    fn test_build_rejects_copula_dimension() {
        let copula = Copula::gaussian(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ])
        .unwrap();
        let err = InputSpec::builder()
            .marginal("A", Normal::standard())
            .marginal("B", Normal::standard())
            .copula(copula)
            .build()
            .unwrap_err();
        assert_eq!(err, InputError::CopulaDimension { copula: 3, marginals: 2 });
    }

    #[test]
    fn test_gaussian_copula_couples_uniform_marginals() {
        let copula = Copula::gaussian(vec![vec![1.0, 0.9], vec![0.9, 1.0]]).unwrap();
        let spec = InputSpec::builder()
            .marginal("Zv", Uniform::new(49.0, 51.0).unwrap())
            .marginal("Zm", Uniform::new(54.0, 56.0).unwrap())
            .copula(copula)
            .build()
            .unwrap();
        let mut rng = create_rng(77);
        let draws = spec.sample_n(5000, &mut rng);
        // Strong positive dependence: most pairs fall on the same side
        // of their respective medians.
        let concordant = draws
            .iter()
            .filter(|x| (x[0] > 50.0) == (x[1] > 55.0))
            .count();
        assert!(concordant as f64 / 5000.0 > 0.8, "concordant = {concordant}");
        assert!(draws.iter().all(|x| x[0] >= 49.0 && x[0] <= 51.0));
    }

    /// A marginal whose inverse CDF is undefined everywhere.
    #[derive(Debug)]
    struct NoQuantile;

    impl Marginal for NoQuantile {
        fn pdf(&self, _x: f64) -> f64 {
            0.0
        }

        fn cdf(&self, _x: f64) -> f64 {
            0.5
        }

        fn quantile(&self, _p: f64) -> Option<f64> {
            None
        }

        fn support(&self) -> (f64, f64) {
            (f64::NEG_INFINITY, f64::INFINITY)
        }
    }

    #[test]
    fn test_undefined_quantile_draws_nan() {
        let independent = InputSpec::builder()
            .marginal("A", Uniform::new(0.0, 1.0).unwrap())
            .marginal("B", NoQuantile)
            .build()
            .unwrap();
        let coupled = InputSpec::builder()
            .marginal("A", Uniform::new(0.0, 1.0).unwrap())
            .marginal("B", NoQuantile)
            .copula(Copula::gaussian(vec![vec![1.0, 0.5], vec![0.5, 1.0]]).unwrap())
            .build()
            .unwrap();
        let mut rng = create_rng(4);
        for spec in [independent, coupled] {
            let x = spec.sample(&mut rng);
            assert!((0.0..=1.0).contains(&x[0]));
            assert!(x[1].is_nan());
        }
    }

    #[test]
    fn test_debug_lists_names() {
        let text = format!("{:?}", two_normals());
        assert!(text.contains("\"R\""));
        assert!(text.contains("Normal"));
    }
}
