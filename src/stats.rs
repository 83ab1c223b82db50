//! Running statistics for Monte Carlo estimation.
//!
//! All functions in this module handle edge cases explicitly and use
//! numerically stable algorithms to avoid catastrophic cancellation.
//!
//! # Algorithms
//!
//! - **Mean**: Kahan compensated summation for O(ε) error independent of n.
//! - **Variance**: Welford's online algorithm, with Chan's pairwise merge
//!   so partial accumulators built on different threads can be combined.
//!   Reference: Welford (1962), "Note on a Method for Calculating
//!   Corrected Sums of Squares and Products", *Technometrics* 4(3).
//! - **Quantile**: R-7 linear interpolation (default in R, Python, Excel).
//!   Reference: Hyndman & Fan (1996), "Sample Quantiles in Statistical
//!   Packages", *The American Statistician* 50(4).
//! - **Exceedance probability**: [`RunningEstimate`] tracks the mean and
//!   variance of the 0/1 event indicator and derives the coefficient of
//!   variation and a [`ConfidenceInterval`].

use serde::{Deserialize, Serialize};

use crate::special;

/// Computes the arithmetic mean using Kahan compensated summation.
///
/// # Returns
/// - `None` if `data` is empty or contains any NaN/Inf.
///
/// # Examples
/// ```
/// use u_reliability::stats::mean;
/// let v = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert!((mean(&v).unwrap() - 3.0).abs() < 1e-15);
/// ```
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    if !data.iter().all(|x| x.is_finite()) {
        return None;
    }
    Some(kahan_sum(data) / data.len() as f64)
}

/// Computes the sample variance (denominator `n − 1`) with Welford's
/// online algorithm.
///
/// # Returns
/// - `None` if `data.len() < 2` or contains NaN/Inf.
///
/// # Examples
/// ```
/// use u_reliability::stats::variance;
/// let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
/// assert!((variance(&v).unwrap() - 4.571428571428571).abs() < 1e-10);
/// ```
pub fn variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    if !data.iter().all(|x| x.is_finite()) {
        return None;
    }
    let mut acc = WelfordAccumulator::new();
    for &x in data {
        acc.update(x);
    }
    acc.sample_variance()
}

/// Computes the `p`-th quantile using the R-7 linear interpolation method.
///
/// # Returns
/// - `None` if `data` is empty, `p` is outside `[0, 1]`, or data contains NaN.
///
/// # Examples
/// ```
/// use u_reliability::stats::quantile;
/// let data = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(quantile(&data, 0.0), Some(1.0));
/// assert_eq!(quantile(&data, 1.0), Some(5.0));
/// assert_eq!(quantile(&data, 0.5), Some(3.0));
/// ```
pub fn quantile(data: &[f64], p: f64) -> Option<f64> {
    if data.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let sorted = sorted_copy(data)?;
    quantile_sorted(&sorted, p)
}

/// Computes the `p`-th quantile on **pre-sorted** data (R-7 method).
///
/// ```text
/// h = (n − 1)·p,  j = ⌊h⌋,  g = h − j
/// Q(p) = (1 − g)·x[j] + g·x[j+1]
/// ```
///
/// The caller must guarantee that `sorted_data` is sorted in
/// non-decreasing order.
///
/// # Returns
/// - `None` if `sorted_data` is empty or `p` is outside `[0, 1]`.
pub fn quantile_sorted(sorted_data: &[f64], p: f64) -> Option<f64> {
    let n = sorted_data.len();
    if n == 0 || !(0.0..=1.0).contains(&p) {
        return None;
    }
    if n == 1 {
        return Some(sorted_data[0]);
    }

    let h = (n - 1) as f64 * p;
    let j = h.floor() as usize;
    let g = h - h.floor();

    if j + 1 >= n {
        Some(sorted_data[n - 1])
    } else {
        Some((1.0 - g) * sorted_data[j] + g * sorted_data[j + 1])
    }
}

/// Returns a sorted copy of `data`, or `None` if it contains NaN.
pub fn sorted_copy(data: &[f64]) -> Option<Vec<f64>> {
    if data.iter().any(|x| x.is_nan()) {
        return None;
    }
    let mut sorted = data.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    Some(sorted)
}

/// Neumaier-improved Kahan summation.
///
/// Maintains a running compensation variable `c`; the branch captures the
/// low-order bits of whichever operand is smaller in magnitude.
///
/// Reference: Neumaier (1974), *Zeitschrift für Angewandte Mathematik und
/// Mechanik* 54(1), pp. 39–51.
pub fn kahan_sum(data: &[f64]) -> f64 {
    let mut sum = 0.0_f64;
    let mut c = 0.0_f64;
    for &x in data {
        let t = sum + x;
        if sum.abs() >= x.abs() {
            c += (sum - t) + x;
        } else {
            c += (x - t) + sum;
        }
        sum = t;
    }
    sum + c
}

// ---------------------------------------------------------------------------
// Welford online accumulator
// ---------------------------------------------------------------------------

/// Streaming accumulator for mean and variance.
///
/// Single pass, O(1) memory. Accumulators built independently (one per
/// batch, one per thread) are combined with [`merge`](Self::merge), which
/// gives the same moments as feeding every value into one accumulator.
///
/// References:
/// - Welford (1962), *Technometrics* 4(3), pp. 419–420.
/// - Chan, Golub & LeVeque (1979), "Updating Formulae and a Pairwise
///   Algorithm for Computing Sample Variances".
///
/// # Examples
/// ```
/// use u_reliability::stats::WelfordAccumulator;
/// let mut acc = WelfordAccumulator::new();
/// for &x in &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
///     acc.update(x);
/// }
/// assert!((acc.mean().unwrap() - 5.0).abs() < 1e-15);
/// assert!((acc.sample_variance().unwrap() - 4.571428571428571).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WelfordAccumulator {
    count: u64,
    mean_acc: f64,
    m2: f64,
}

impl WelfordAccumulator {
    /// Creates a new empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a new sample into the accumulator.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.mean_acc = value;
            return;
        }
        let delta = value - self.mean_acc;
        self.mean_acc += delta / self.count as f64;
        self.m2 += delta * (value - self.mean_acc);
    }

    /// Merges another accumulator into this one.
    ///
    /// ```text
    /// δ = mean_b − mean_a
    /// mean = mean_a + δ·n_b/n
    /// M₂ = M₂a + M₂b + δ²·n_a·n_b/n
    /// ```
    pub fn merge(&mut self, other: &WelfordAccumulator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let na = self.count as f64;
        let nb = other.count as f64;
        let total = self.count + other.count;
        let n = total as f64;
        let delta = other.mean_acc - self.mean_acc;

        self.mean_acc += delta * (nb / n);
        self.m2 += other.m2 + delta * delta * na * nb / n;
        self.count = total;
    }

    /// Returns the number of samples seen so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the running mean, or `None` if no samples have been added.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean_acc)
        }
    }

    /// Sample variance (n − 1 denominator); `None` below 2 samples.
    pub fn sample_variance(&self) -> Option<f64> {
        if self.count < 2 {
            None
        } else {
            Some(self.m2 / (self.count - 1) as f64)
        }
    }

    /// Population variance (n denominator); `None` when empty.
    pub fn population_variance(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.m2 / self.count as f64)
        }
    }

    pub fn sample_std_dev(&self) -> Option<f64> {
        self.sample_variance().map(f64::sqrt)
    }
}

// ---------------------------------------------------------------------------
// Confidence interval
// ---------------------------------------------------------------------------

/// Two-sided confidence interval for an exceedance probability or a mean.
///
/// Always satisfies `lower ≤ estimate ≤ upper`, and for a probability
/// also `0 ≤ lower` and `upper ≤ 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    /// Confidence level in `(0, 1)`, e.g. 0.95.
    pub level: f64,
    /// Set when the estimate is exactly 0 or 1 and the normal
    /// approximation collapses; bounds then come from the exact binomial
    /// interval.
    pub degenerate: bool,
}

impl ConfidenceInterval {
    /// Builds the interval for `exceedances` successes out of `n` draws.
    ///
    /// Normal approximation `p ± z·se`, clamped to `[0, 1]`. When no
    /// event or only events were observed the standard error is zero, so
    /// the exact Clopper–Pearson bound on the open side is used instead:
    ///
    /// ```text
    /// p = 0:  [0, 1 − (α/2)^(1/n)]
    /// p = 1:  [(α/2)^(1/n), 1]        α = 1 − level
    /// ```
    ///
    /// Returns `None` if `n == 0` or `level` is outside `(0, 1)`.
    pub fn for_proportion(exceedances: u64, n: u64, standard_error: f64, level: f64) -> Option<Self> {
        if n == 0 || !(level > 0.0 && level < 1.0) || exceedances > n {
            return None;
        }

        let half_alpha = 0.5 * (1.0 - level);
        if exceedances == 0 {
            return Some(Self {
                lower: 0.0,
                upper: 1.0 - half_alpha.powf(1.0 / n as f64),
                level,
                degenerate: true,
            });
        }
        if exceedances == n {
            return Some(Self {
                lower: half_alpha.powf(1.0 / n as f64),
                upper: 1.0,
                level,
                degenerate: true,
            });
        }

        let p = exceedances as f64 / n as f64;
        let half_width = special::two_sided_z(level) * standard_error.max(0.0);
        Some(Self {
            lower: (p - half_width).clamp(0.0, p),
            upper: (p + half_width).clamp(p, 1.0),
            level,
            degenerate: false,
        })
    }

    /// Normal-approximation interval `mean ± z·se` for a sample mean.
    ///
    /// Returns `None` if `mean` or `standard_error` is not finite, or
    /// `level` is outside `(0, 1)`.
    pub fn for_mean(mean: f64, standard_error: f64, level: f64) -> Option<Self> {
        if !mean.is_finite() || !standard_error.is_finite() || !(level > 0.0 && level < 1.0) {
            return None;
        }
        let half_width = special::two_sided_z(level) * standard_error.max(0.0);
        Some(Self {
            lower: mean - half_width,
            upper: mean + half_width,
            level,
            degenerate: false,
        })
    }

    /// Full width `upper − lower`.
    pub fn length(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, p: f64) -> bool {
        p >= self.lower && p <= self.upper
    }
}

// ---------------------------------------------------------------------------
// Running exceedance estimate
// ---------------------------------------------------------------------------

/// Accumulated state of one exceedance-probability estimation run.
///
/// Tracks the event indicator (1 if the event occurred, 0 otherwise)
/// through a [`WelfordAccumulator`] together with the raw event count.
/// A fresh estimate is created per run and grows by merging batches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningEstimate {
    indicator: WelfordAccumulator,
    exceedances: u64,
}

impl RunningEstimate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one draw.
    pub fn record(&mut self, occurred: bool) {
        if occurred {
            self.exceedances += 1;
        }
        self.indicator.update(if occurred { 1.0 } else { 0.0 });
    }

    /// Folds a batch estimate into this one.
    pub fn merge(&mut self, other: &RunningEstimate) {
        self.indicator.merge(&other.indicator);
        self.exceedances += other.exceedances;
    }

    /// Number of draws recorded.
    pub fn count(&self) -> u64 {
        self.indicator.count()
    }

    /// Number of draws for which the event occurred.
    pub fn exceedances(&self) -> u64 {
        self.exceedances
    }

    /// `p̂ = S/n`, or `None` before the first draw.
    pub fn probability(&self) -> Option<f64> {
        let n = self.count();
        if n == 0 {
            None
        } else {
            Some(self.exceedances as f64 / n as f64)
        }
    }

    /// Sample variance of the indicator. A single draw has variance 0.
    pub fn indicator_variance(&self) -> Option<f64> {
        match self.count() {
            0 => None,
            1 => Some(0.0),
            _ => self.indicator.sample_variance().map(|v| v.max(0.0)),
        }
    }

    /// Standard error of `p̂`: `√(Var / n)`.
    pub fn standard_error(&self) -> Option<f64> {
        let var = self.indicator_variance()?;
        Some((var / self.count() as f64).sqrt())
    }

    /// Relative standard error `se / p̂`.
    ///
    /// `None` while `p̂ = 0`: the ratio is undefined and the caller must
    /// keep sampling.
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        if self.exceedances == 0 {
            return None;
        }
        let p = self.probability()?;
        Some(self.standard_error()? / p)
    }

    pub fn confidence_interval(&self, level: f64) -> Option<ConfidenceInterval> {
        ConfidenceInterval::for_proportion(
            self.exceedances,
            self.count(),
            self.standard_error()?,
            level,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
