//! Dependence structures between the coordinates of an input vector.
//!
//! A copula produces a vector of uniforms on `(0, 1)^d`; the input
//! specification maps each coordinate through its marginal's quantile.
//!
//! # Gaussian copula
//!
//! ```text
//! ε ~ N(0, I),  z = L·ε  (L Lᵀ = R),  u_i = Φ(z_i)
//! ```
//!
//! where `R` is the correlation matrix and `L` its Cholesky factor.

use rand::RngCore;
use thiserror::Error;

use crate::distributions::{Marginal, Normal};
use crate::random::open_unit;
use crate::special;

/// Error type for invalid copula parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CopulaError {
    #[error("correlation matrix must be square and non-empty, got {rows} rows with a row of length {columns}")]
    NotSquare { rows: usize, columns: usize },
    #[error("correlation matrix must have a unit diagonal, R[{index}][{index}] = {value}")]
    Diagonal { index: usize, value: f64 },
    #[error("correlation matrix must be symmetric with entries in [-1, 1], offending entry R[{row}][{column}] = {value}")]
    Entry { row: usize, column: usize, value: f64 },
    #[error("correlation matrix is not positive definite (pivot {index})")]
    NotPositiveDefinite { index: usize },
}

/// Dependence structure of an input vector.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Copula {
    /// Coordinates drawn independently.
    #[default]
    Independent,
    /// Normal copula with the given correlation, stored as its lower
    /// Cholesky factor.
    Gaussian(GaussianCopula),
}

impl Copula {
    /// Builds a Gaussian copula from a correlation matrix.
    pub fn gaussian(correlation: Vec<Vec<f64>>) -> Result<Self, CopulaError> {
        GaussianCopula::new(correlation).map(Copula::Gaussian)
    }

    /// Dimension fixed by the copula, if any.
    pub fn dimension(&self) -> Option<usize> {
        match self {
            Copula::Independent => None,
            Copula::Gaussian(g) => Some(g.dimension()),
        }
    }

    /// Draws `dim` uniforms on `(0, 1)`.
    pub fn sample_uniforms(&self, dim: usize, rng: &mut dyn RngCore) -> Vec<f64> {
        match self {
            Copula::Independent => (0..dim).map(|_| open_unit(&mut *rng)).collect(),
            Copula::Gaussian(g) => g.sample_uniforms(rng),
        }
    }
}

/// Gaussian (normal) copula.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianCopula {
    correlation: Vec<Vec<f64>>,
    cholesky: Vec<Vec<f64>>,
}

impl GaussianCopula {
    /// # Errors
    /// Rejects non-square, non-symmetric, non-unit-diagonal or non
    /// positive-definite matrices.
    pub fn new(correlation: Vec<Vec<f64>>) -> Result<Self, CopulaError> {
        let d = correlation.len();
        if d == 0 {
            return Err(CopulaError::NotSquare { rows: 0, columns: 0 });
        }
        if let Some(row) = correlation.iter().find(|row| row.len() != d) {
            return Err(CopulaError::NotSquare {
                rows: d,
                columns: row.len(),
            });
        }
        for i in 0..d {
            let value = correlation[i][i];
            if (value - 1.0).abs() > 1e-12 {
                return Err(CopulaError::Diagonal { index: i, value });
            }
            for j in 0..i {
                let value = correlation[i][j];
                if !(-1.0..=1.0).contains(&value) || (value - correlation[j][i]).abs() > 1e-12 {
                    return Err(CopulaError::Entry {
                        row: i,
                        column: j,
                        value,
                    });
                }
            }
        }
        let cholesky = cholesky(&correlation)?;
        Ok(Self {
            correlation,
            cholesky,
        })
    }

    pub fn dimension(&self) -> usize {
        self.correlation.len()
    }

    pub fn correlation(&self) -> &[Vec<f64>] {
        &self.correlation
    }

    fn sample_uniforms(&self, rng: &mut dyn RngCore) -> Vec<f64> {
        let standard = Normal::standard();
        let eps: Vec<f64> = (0..self.dimension()).map(|_| standard.sample(&mut *rng)).collect();
        self.cholesky
            .iter()
            .map(|row| {
                let z: f64 = row.iter().zip(&eps).map(|(l, e)| l * e).sum();
                // Keep away from the endpoints where quantiles diverge
                special::standard_normal_cdf(z).clamp(f64::EPSILON, 1.0 - f64::EPSILON)
            })
            .collect()
    }
}

/// Lower Cholesky factor `L` with `L Lᵀ = A`.
fn cholesky(a: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, CopulaError> {
    let d = a.len();
    let mut l = vec![vec![0.0; d]; d];
    for i in 0..d {
        for j in 0..=i {
            let partial: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let pivot = a[i][i] - partial;
                if pivot <= 0.0 || !pivot.is_finite() {
                    return Err(CopulaError::NotPositiveDefinite { index: i });
                }
                l[i][j] = pivot.sqrt();
            } else {
                l[i][j] = (a[i][j] - partial) / l[j][j];
            }
        }
    }
    Ok(l)
}

// ============================================================================
// Tests
// ============================================================================
