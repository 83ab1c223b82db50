//! Scalar marginal distributions.
//!
//! Every family implements [`Marginal`]: density, CDF, quantile and
//! inverse-CDF sampling from a caller-supplied generator. Analytical
//! moments are provided as inherent methods where closed forms exist.
//!
//! # Supported Distributions
//!
//! | Distribution | Parameters | Mean | Variance |
//! |---|---|---|---|
//! | [`Uniform`] | min, max | (a+b)/2 | (b−a)²/12 |
//! | [`Triangular`] | min, mode, max | (a+b+c)/3 | (a²+b²+c²−ab−ac−bc)/18 |
//! | [`Normal`] | μ, σ | μ | σ² |
//! | [`LogNormal`] | μ, σ | exp(μ+σ²/2) | (exp(σ²)−1)·exp(2μ+σ²) |
//! | [`Gumbel`] | a (mode), b (scale) | a + γb | π²b²/6 |
//! | [`Dirac`] | value | value | 0 |
//! | [`Truncated`] | inner, lower, upper | numerical | numerical |

use std::fmt;

use rand::RngCore;
use thiserror::Error;
use tracing::warn;

use crate::random::open_unit;
use crate::special;

/// Euler–Mascheroni constant γ.
const EULER_GAMMA: f64 = 0.5772156649015328606065120900824024310422;

/// Error type for invalid distribution parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    /// Parameters violate distribution constraints.
    #[error("invalid distribution parameters: {0}")]
    InvalidParameters(String),
    /// Truncation bounds leave no probability mass.
    #[error("truncation to [{lower}, {upper}] leaves no probability mass")]
    EmptyTruncation { lower: f64, upper: f64 },
}

/// A univariate distribution usable as one coordinate of an input vector.
pub trait Marginal: fmt::Debug + Send + Sync {
    /// Probability density at `x`.
    fn pdf(&self, x: f64) -> f64;

    /// Cumulative distribution `P(X ≤ x)`.
    fn cdf(&self, x: f64) -> f64;

    /// Inverse CDF. `None` when `p` is outside the family's domain.
    fn quantile(&self, p: f64) -> Option<f64>;

    /// Closed support `(lower, upper)`, possibly infinite.
    fn support(&self) -> (f64, f64);

    /// Draws one value by inverse-CDF sampling.
    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        let u = open_unit(rng);
        match self.quantile(u) {
            Some(x) => x,
            None => {
                warn!(u, distribution = ?self, "quantile undefined inside (0, 1), drawing NaN");
                f64::NAN
            }
        }
    }
}

impl<M: Marginal + ?Sized> Marginal for Box<M> {
    fn pdf(&self, x: f64) -> f64 {
        (**self).pdf(x)
    }

    fn cdf(&self, x: f64) -> f64 {
        (**self).cdf(x)
    }

    fn quantile(&self, p: f64) -> Option<f64> {
        (**self).quantile(p)
    }

    fn support(&self) -> (f64, f64) {
        (**self).support()
    }

    fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        (**self).sample(rng)
    }
}

// ============================================================================
// Uniform Distribution
// ============================================================================

/// Continuous uniform distribution on `[min, max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform {
    min: f64,
    max: f64,
}

impl Uniform {
    /// # Errors
    /// Returns `Err` if `min >= max` or either parameter is not finite.
    pub fn new(min: f64, max: f64) -> Result<Self, DistributionError> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(DistributionError::InvalidParameters(format!(
                "Uniform requires min < max, got min={min}, max={max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn variance(&self) -> f64 {
        let range = self.max - self.min;
        range * range / 12.0
    }
}

impl Marginal for Uniform {
    fn pdf(&self, x: f64) -> f64 {
        if x >= self.min && x <= self.max {
            1.0 / (self.max - self.min)
        } else {
            0.0
        }
    }

    fn cdf(&self, x: f64) -> f64 {
        if x <= self.min {
            0.0
        } else if x >= self.max {
            1.0
        } else {
            (x - self.min) / (self.max - self.min)
        }
    }

    fn quantile(&self, p: f64) -> Option<f64> {
        if !(0.0..=1.0).contains(&p) {
            return None;
        }
        Some(self.min + p * (self.max - self.min))
    }

    fn support(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}

// ============================================================================
// Triangular Distribution
// ============================================================================

/// Triangular distribution with parameters `[min, mode, max]`.
///
/// ```text
/// f(x) = 2(x−a) / ((c−a)(b−a))  for a ≤ x ≤ b
///      = 2(c−x) / ((c−a)(c−b))  for b < x ≤ c
/// ```
///
/// Reference: Johnson, Kotz & Balakrishnan (1995), *Continuous Univariate
/// Distributions*, Vol. 2, Chapter 26.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangular {
    min: f64,
    mode: f64,
    max: f64,
}

impl Triangular {
    /// # Errors
    /// Returns `Err` if `min >= max` or `mode` is outside `[min, max]`.
    pub fn new(min: f64, mode: f64, max: f64) -> Result<Self, DistributionError> {
        if !min.is_finite() || !mode.is_finite() || !max.is_finite() {
            return Err(DistributionError::InvalidParameters(
                "Triangular parameters must be finite".into(),
            ));
        }
        if min > mode || mode > max || min >= max {
            return Err(DistributionError::InvalidParameters(format!(
                "Triangular requires min ≤ mode ≤ max and min < max, got {min}, {mode}, {max}"
            )));
        }
        Ok(Self { min, mode, max })
    }

    pub fn mode(&self) -> f64 {
        self.mode
    }

    pub fn mean(&self) -> f64 {
        (self.min + self.mode + self.max) / 3.0
    }

    pub fn variance(&self) -> f64 {
        let (a, b, c) = (self.min, self.mode, self.max);
        (a * a + b * b + c * c - a * b - a * c - b * c) / 18.0
    }
}

impl Marginal for Triangular {
    fn pdf(&self, x: f64) -> f64 {
        let (a, b, c) = (self.min, self.mode, self.max);
        if x < a || x > c {
            0.0
        } else if x <= b {
            2.0 * (x - a) / ((c - a) * (b - a).max(f64::MIN_POSITIVE))
        } else {
            2.0 * (c - x) / ((c - a) * (c - b).max(f64::MIN_POSITIVE))
        }
    }

    fn cdf(&self, x: f64) -> f64 {
        let (a, b, c) = (self.min, self.mode, self.max);
        if x <= a {
            0.0
        } else if x <= b {
            (x - a) * (x - a) / ((c - a) * (b - a).max(f64::MIN_POSITIVE))
        } else if x < c {
            1.0 - (c - x) * (c - x) / ((c - a) * (c - b).max(f64::MIN_POSITIVE))
        } else {
            1.0
        }
    }

    /// ```text
    /// F⁻¹(p) = a + √(p·(c−a)·(b−a))       if p < F(b)
    ///        = c − √((1−p)·(c−a)·(c−b))    otherwise
    /// ```
    fn quantile(&self, p: f64) -> Option<f64> {
        if !(0.0..=1.0).contains(&p) {
            return None;
        }
        let (a, b, c) = (self.min, self.mode, self.max);
        let at_mode = (b - a) / (c - a);
        if p < at_mode {
            Some(a + ((c - a) * (b - a) * p).sqrt())
        } else {
            Some(c - ((c - a) * (c - b) * (1.0 - p)).sqrt())
        }
    }

    fn support(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}

// ============================================================================
// Normal Distribution
// ============================================================================

/// Normal (Gaussian) distribution N(μ, σ²).
#[derive(Debug, Clone, PartialEq)]
pub struct Normal {
    mu: f64,
    sigma: f64,
}

impl Normal {
    /// # Errors
    /// Returns `Err` if `sigma ≤ 0` or parameters are not finite.
    pub fn new(mu: f64, sigma: f64) -> Result<Self, DistributionError> {
        if !mu.is_finite() || !sigma.is_finite() || sigma <= 0.0 {
            return Err(DistributionError::InvalidParameters(format!(
                "Normal requires finite μ and σ > 0, got μ={mu}, σ={sigma}"
            )));
        }
        Ok(Self { mu, sigma })
    }

    /// N(0, 1).
    pub fn standard() -> Self {
        Self {
            mu: 0.0,
            sigma: 1.0,
        }
    }

    pub fn mean(&self) -> f64 {
        self.mu
    }

    pub fn std_dev(&self) -> f64 {
        self.sigma
    }

    pub fn variance(&self) -> f64 {
        self.sigma * self.sigma
    }
}

impl Marginal for Normal {
    fn pdf(&self, x: f64) -> f64 {
        special::standard_normal_pdf((x - self.mu) / self.sigma) / self.sigma
    }

    fn cdf(&self, x: f64) -> f64 {
        special::standard_normal_cdf((x - self.mu) / self.sigma)
    }

    /// μ + σ·Φ⁻¹(p); `None` outside `(0, 1)`.
    fn quantile(&self, p: f64) -> Option<f64> {
        if p <= 0.0 || p >= 1.0 {
            return None;
        }
        Some(self.mu + self.sigma * special::inverse_normal_cdf(p))
    }

    fn support(&self) -> (f64, f64) {
        (f64::NEG_INFINITY, f64::INFINITY)
    }
}

// ============================================================================
// LogNormal Distribution
// ============================================================================

/// Log-normal distribution: ln(X) ~ N(μ, σ²).
///
/// Reference: Johnson, Kotz & Balakrishnan (1994), *Continuous Univariate
/// Distributions*, Vol. 1, Chapter 14.
#[derive(Debug, Clone, PartialEq)]
pub struct LogNormal {
    mu: f64,
    sigma: f64,
}

impl LogNormal {
    /// `mu` and `sigma` are the mean and std dev of ln(X).
    ///
    /// # Errors
    /// Returns `Err` if `sigma ≤ 0` or parameters are not finite.
    pub fn new(mu: f64, sigma: f64) -> Result<Self, DistributionError> {
        if !mu.is_finite() || !sigma.is_finite() || sigma <= 0.0 {
            return Err(DistributionError::InvalidParameters(format!(
                "LogNormal requires finite μ and σ > 0, got μ={mu}, σ={sigma}"
            )));
        }
        Ok(Self { mu, sigma })
    }

    /// Builds the distribution from the mean and standard deviation of X:
    ///
    /// ```text
    /// σ² = ln(1 + (s/m)²),   μ = ln m − σ²/2
    /// ```
    ///
    /// # Errors
    /// Returns `Err` unless `mean > 0` and `std_dev > 0` are finite.
    pub fn from_mean_std(mean: f64, std_dev: f64) -> Result<Self, DistributionError> {
        if !mean.is_finite() || !std_dev.is_finite() || mean <= 0.0 || std_dev <= 0.0 {
            return Err(DistributionError::InvalidParameters(format!(
                "LogNormal requires mean > 0 and std dev > 0, got mean={mean}, std={std_dev}"
            )));
        }
        let cov = std_dev / mean;
        let s2 = cov.mul_add(cov, 1.0).ln();
        Self::new(mean.ln() - s2 / 2.0, s2.sqrt())
    }

    /// Mean = exp(μ + σ²/2).
    pub fn mean(&self) -> f64 {
        (self.mu + self.sigma * self.sigma / 2.0).exp()
    }

    /// Variance = (exp(σ²) − 1) · exp(2μ + σ²).
    pub fn variance(&self) -> f64 {
        let s2 = self.sigma * self.sigma;
        (s2.exp() - 1.0) * (2.0 * self.mu + s2).exp()
    }
}

impl Marginal for LogNormal {
    fn pdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        let z = (x.ln() - self.mu) / self.sigma;
        special::standard_normal_pdf(z) / (x * self.sigma)
    }

    fn cdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        special::standard_normal_cdf((x.ln() - self.mu) / self.sigma)
    }

    fn quantile(&self, p: f64) -> Option<f64> {
        if p <= 0.0 || p >= 1.0 {
            return None;
        }
        Some((self.mu + self.sigma * special::inverse_normal_cdf(p)).exp())
    }

    fn support(&self) -> (f64, f64) {
        (0.0, f64::INFINITY)
    }
}

// ============================================================================
// Gumbel Distribution
// ============================================================================

/// Gumbel (type I extreme value, maximum) distribution.
///
/// Parametrized by its mode `a` and scale `b > 0`:
///
/// ```text
/// F(x) = exp(−exp(−(x−a)/b))
/// f(x) = (1/b)·exp(−(z + exp(−z))),  z = (x−a)/b
/// ```
///
/// Annual maximum river flow rates are the usual application; the flood
/// models use `Gumbel(1013, 558)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gumbel {
    mode: f64,
    scale: f64,
}

impl Gumbel {
    /// # Errors
    /// Returns `Err` if `scale ≤ 0` or parameters are not finite.
    pub fn new(mode: f64, scale: f64) -> Result<Self, DistributionError> {
        if !mode.is_finite() || !scale.is_finite() || scale <= 0.0 {
            return Err(DistributionError::InvalidParameters(format!(
                "Gumbel requires finite mode and scale > 0, got a={mode}, b={scale}"
            )));
        }
        Ok(Self { mode, scale })
    }

    pub fn mode(&self) -> f64 {
        self.mode
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Mean = a + γ·b.
    pub fn mean(&self) -> f64 {
        self.mode + EULER_GAMMA * self.scale
    }

    /// Variance = π²·b²/6.
    pub fn variance(&self) -> f64 {
        let pi = std::f64::consts::PI;
        pi * pi * self.scale * self.scale / 6.0
    }
}

impl Marginal for Gumbel {
    fn pdf(&self, x: f64) -> f64 {
        let z = (x - self.mode) / self.scale;
        (-(z + (-z).exp())).exp() / self.scale
    }

    fn cdf(&self, x: f64) -> f64 {
        let z = (x - self.mode) / self.scale;
        (-(-z).exp()).exp()
    }

    /// a − b·ln(−ln p); `None` outside `(0, 1)`.
    fn quantile(&self, p: f64) -> Option<f64> {
        if p <= 0.0 || p >= 1.0 {
            return None;
        }
        Some(self.mode - self.scale * (-p.ln()).ln())
    }

    fn support(&self) -> (f64, f64) {
        (f64::NEG_INFINITY, f64::INFINITY)
    }
}

// ============================================================================
// Dirac Distribution
// ============================================================================

/// Point mass at a fixed value.
///
/// Pins an input of a model to a constant while keeping it in the input
/// vector, so the same model can later be run with that input uncertain.
#[derive(Debug, Clone, PartialEq)]
pub struct Dirac {
    value: f64,
}

impl Dirac {
    /// # Errors
    /// Returns `Err` if `value` is not finite.
    pub fn new(value: f64) -> Result<Self, DistributionError> {
        if !value.is_finite() {
            return Err(DistributionError::InvalidParameters(format!(
                "Dirac requires a finite value, got {value}"
            )));
        }
        Ok(Self { value })
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Marginal for Dirac {
    fn pdf(&self, x: f64) -> f64 {
        if x == self.value {
            f64::INFINITY
        } else {
            0.0
        }
    }

    fn cdf(&self, x: f64) -> f64 {
        if x >= self.value {
            1.0
        } else {
            0.0
        }
    }

    fn quantile(&self, p: f64) -> Option<f64> {
        if !(0.0..=1.0).contains(&p) {
            return None;
        }
        Some(self.value)
    }

    fn support(&self) -> (f64, f64) {
        (self.value, self.value)
    }

    fn sample(&self, _rng: &mut dyn RngCore) -> f64 {
        self.value
    }
}

// ============================================================================
// Truncated Distribution
// ============================================================================

/// Restriction of a distribution to `[lower, upper]`, renormalized.
///
/// ```text
/// F_T(x) = (F(x) − F(lower)) / (F(upper) − F(lower))
/// F_T⁻¹(p) = F⁻¹(F(lower) + p·(F(upper) − F(lower)))
/// ```
///
/// Either bound may be omitted, in which case the inner support bound
/// is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Truncated<D> {
    inner: D,
    lower: f64,
    upper: f64,
    cdf_lower: f64,
    mass: f64,
}

impl<D: Marginal> Truncated<D> {
    /// # Errors
    /// Returns `Err` if a bound is NaN, `lower >= upper`, or the interval
    /// carries no probability mass under `inner`.
    pub fn new(inner: D, lower: Option<f64>, upper: Option<f64>) -> Result<Self, DistributionError> {
        let (support_lo, support_hi) = inner.support();
        let lower = lower.unwrap_or(support_lo).max(support_lo);
        let upper = upper.unwrap_or(support_hi).min(support_hi);
        if lower.is_nan() || upper.is_nan() || lower >= upper {
            return Err(DistributionError::InvalidParameters(format!(
                "Truncated requires lower < upper, got lower={lower}, upper={upper}"
            )));
        }

        let cdf_lower = inner.cdf(lower);
        let mass = inner.cdf(upper) - cdf_lower;
        if mass.is_nan() || mass <= 0.0 {
            return Err(DistributionError::EmptyTruncation { lower, upper });
        }

        Ok(Self {
            inner,
            lower,
            upper,
            cdf_lower,
            mass,
        })
    }

    /// Truncation to `[bound, +∞)`.
    pub fn above(inner: D, bound: f64) -> Result<Self, DistributionError> {
        Self::new(inner, Some(bound), None)
    }

    /// Truncation to `(−∞, bound]`.
    pub fn below(inner: D, bound: f64) -> Result<Self, DistributionError> {
        Self::new(inner, None, Some(bound))
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Probability mass of the inner distribution kept by the truncation.
    pub fn retained_mass(&self) -> f64 {
        self.mass
    }
}

impl<D: Marginal> Marginal for Truncated<D> {
    fn pdf(&self, x: f64) -> f64 {
        if x < self.lower || x > self.upper {
            0.0
        } else {
            self.inner.pdf(x) / self.mass
        }
    }

    fn cdf(&self, x: f64) -> f64 {
        if x <= self.lower {
            0.0
        } else if x >= self.upper {
            1.0
        } else {
            ((self.inner.cdf(x) - self.cdf_lower) / self.mass).clamp(0.0, 1.0)
        }
    }

    fn quantile(&self, p: f64) -> Option<f64> {
        if !(0.0..=1.0).contains(&p) {
            return None;
        }
        if p == 0.0 && self.lower.is_finite() {
            return Some(self.lower);
        }
        if p == 1.0 && self.upper.is_finite() {
            return Some(self.upper);
        }
        self.inner
            .quantile(self.cdf_lower + p * self.mass)
            .map(|x| x.clamp(self.lower, self.upper))
    }

    fn support(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::random::create_rng;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn uniform_cdf_in_01(
            min in -100.0_f64..0.0,
            max in 1.0_f64..100.0,
            x in -200.0_f64..200.0,
        ) {
            let u = Uniform::new(min, max).unwrap();
            let c = u.cdf(x);
            prop_assert!((0.0..=1.0).contains(&c));
        }

        #[test]
        fn triangular_quantile_roundtrip(
            min in -50.0_f64..0.0,
            mode_frac in 0.01_f64..0.99,
            range in 1.0_f64..50.0,
            p in 0.001_f64..0.999,
        ) {
            let max = min + range;
            let mode = min + mode_frac * range;
            let t = Triangular::new(min, mode, max).unwrap();
            let x = t.quantile(p).unwrap();
            let p_back = t.cdf(x);
            prop_assert!(
                (p_back - p).abs() < 1e-8,
                "roundtrip: p={p} -> x={x} -> p_back={p_back}"
            );
        }

        #[test]
        fn gumbel_cdf_monotonic(
            mode in -100.0_f64..100.0,
            scale in 0.1_f64..50.0,
            x1 in -500.0_f64..500.0,
            x2 in -500.0_f64..500.0,
        ) {
            let g = Gumbel::new(mode, scale).unwrap();
            let (lo, hi) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
            prop_assert!(g.cdf(lo) <= g.cdf(hi));
        }

        #[test]
        fn truncated_samples_stay_in_bounds(
            seed in 0_u64..10000,
            mu in -1.0_f64..1.0,
            lower in -3.0_f64..0.0,
            width in 0.5_f64..4.0,
        ) {
            let upper = lower + width;
            let t = Truncated::new(Normal::new(mu, 1.0).unwrap(), Some(lower), Some(upper)).unwrap();
            let mut rng = create_rng(seed);
            for _ in 0..20 {
                let x = t.sample(&mut rng);
                prop_assert!(x >= lower && x <= upper, "x={x} outside [{lower}, {upper}]");
            }
        }
    }
}
