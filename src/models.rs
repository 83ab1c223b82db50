//! Reference models with their input distributions.
//!
//! Each model implements [`EvaluationFunction`] and [`ReferenceModel`],
//! which pairs it with the probabilistic input it is usually studied with.
//!
//! | Model | Inputs | Output |
//! |-------|--------|--------|
//! | [`StressStrength`] | R, S | `R − S` |
//! | [`FloodHeight`] | Q, Ks, Zv, Zm | water height `H` |
//! | [`FloodOverflow`] | Q, Ks, Zv, Zm | overflow `Zv + H − (Zb + Hd)` |
//! | [`StochasticFloodOverflow`] | Q, Ks, Zv, Zm | mean overflow over random dike data |
//! | [`TubeDeflection`] | F, L, a, D, d, E | deflection |
//! | [`ChabocheStress`] | strain, R, C, gamma | stress |
//! | [`Ishigami`] | X1, X2, X3 | Ishigami function |
//! | [`FreeFall`] | z0, v0, m, c, zmin | altitude at a fixed time |
//! | [`LogisticGrowth`] | y0, a, b | population at a fixed year |
//! | [`NonlinearOscillator`] | mp, ms, kp, ks, xi_p, xi_s, S0 | spring peak force |

use std::f64::consts::PI;

use rand::RngCore;
use thiserror::Error;

use crate::distributions::{
    Dirac, DistributionError, Gumbel, LogNormal, Normal, Triangular, Truncated, Uniform,
};
use crate::event::ExceedanceEvent;
use crate::function::{check_dimension, EvaluationError, EvaluationFunction};
use crate::input::{InputError, InputSpec};
use crate::random::open_unit;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Input(#[from] InputError),
}

/// A model shipped with its usual input distribution.
pub trait ReferenceModel: EvaluationFunction {
    /// Input distribution, in the order [`EvaluationFunction::evaluate`]
    /// expects.
    fn input_spec(&self) -> Result<InputSpec, ModelError>;

    /// Column name of the model output.
    fn output_name(&self) -> &'static str;
}

// ============================================================================
// Stress / strength
// ============================================================================

/// Margin `R − S` between a resistance and a solicitation.
///
/// With `R ~ N(4, 1)` and `S ~ N(2, 1)`, `R − S ~ N(2, √2)` and
/// `P(R − S ≥ 0) = Φ(√2) ≈ 0.9214`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StressStrength;

impl StressStrength {
    /// The safe-margin event `R − S ≥ 0`.
    pub fn event() -> ExceedanceEvent {
        ExceedanceEvent::greater_or_equal(0.0)
    }
}

impl EvaluationFunction for StressStrength {
    fn evaluate(&self, input: &[f64], _rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(Some(2), input)?;
        Ok(input[0] - input[1])
    }

    fn input_dimension(&self) -> Option<usize> {
        Some(2)
    }
}

impl ReferenceModel for StressStrength {
    fn input_spec(&self) -> Result<InputSpec, ModelError> {
        Ok(InputSpec::builder()
            .marginal("R", Normal::new(4.0, 1.0)?)
            .marginal("S", Normal::new(2.0, 1.0)?)
            .build()?)
    }

    fn output_name(&self) -> &'static str {
        "G"
    }
}

// ============================================================================
// Flood
// ============================================================================

/// Water height of a river with a rectangular section (Manning–Strickler):
///
/// ```text
/// H = (Q / (Ks · B · √((Zm − Zv) / L)))^(3/5)
/// ```
fn water_height(q: f64, ks: f64, zv: f64, zm: f64, length: f64, width: f64) -> f64 {
    let slope = (zm - zv) / length;
    (q / (ks * width * slope.sqrt())).powf(0.6)
}

/// Flood inputs: annual maximal flow, Strickler coefficient, downstream
/// and upstream river levels.
fn flood_input() -> Result<InputSpec, ModelError> {
    Ok(InputSpec::builder()
        .marginal("Q", Truncated::above(Gumbel::new(1013.0, 558.0)?, 0.0)?)
        .marginal("Ks", Truncated::above(Normal::new(30.0, 7.5)?, 0.0)?)
        .marginal("Zv", Uniform::new(49.0, 51.0)?)
        .marginal("Zm", Uniform::new(54.0, 56.0)?)
        .build()?)
}

/// River geometry and dike data shared by the flood models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dike {
    /// River section length (m).
    pub length: f64,
    /// River width (m).
    pub width: f64,
    /// Dike base level (m).
    pub base: f64,
    /// Dike height (m).
    pub height: f64,
}

impl Default for Dike {
    fn default() -> Self {
        Self {
            length: 5000.0,
            width: 300.0,
            base: 55.5,
            height: 3.0,
        }
    }
}

/// Water height `H` in the river section.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloodHeight {
    pub dike: Dike,
}

impl EvaluationFunction for FloodHeight {
    fn evaluate(&self, input: &[f64], _rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(Some(4), input)?;
        let d = &self.dike;
        Ok(water_height(input[0], input[1], input[2], input[3], d.length, d.width))
    }

    fn input_dimension(&self) -> Option<usize> {
        Some(4)
    }
}

impl ReferenceModel for FloodHeight {
    fn input_spec(&self) -> Result<InputSpec, ModelError> {
        flood_input()
    }

    fn output_name(&self) -> &'static str {
        "H"
    }
}

/// Overflow `S = Zv + H − (Zb + Hd)`; the dike overflows when `S ≥ 0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloodOverflow {
    pub dike: Dike,
}

impl FloodOverflow {
    /// The overflow event `S ≥ 0`.
    pub fn event() -> ExceedanceEvent {
        ExceedanceEvent::greater_or_equal(0.0)
    }
}

impl EvaluationFunction for FloodOverflow {
    fn evaluate(&self, input: &[f64], _rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(Some(4), input)?;
        let d = &self.dike;
        let h = water_height(input[0], input[1], input[2], input[3], d.length, d.width);
        Ok(input[2] + h - (d.base + d.height))
    }

    fn input_dimension(&self) -> Option<usize> {
        Some(4)
    }
}

impl ReferenceModel for FloodOverflow {
    fn input_spec(&self) -> Result<InputSpec, ModelError> {
        flood_input()
    }

    fn output_name(&self) -> &'static str {
        "S"
    }
}

/// Mean overflow over an inner sample of uncertain dike data.
///
/// For each call, `inner_samples` draws of `Hd ~ U(4, 14)`,
/// `Zb ~ U(50, 60)`, `L ~ U(1000, 10000)` and `B ~ U(50, 500)` are taken
/// from the generator and the overflow is averaged over them.
#[derive(Debug, Clone, Copy)]
pub struct StochasticFloodOverflow {
    pub inner_samples: usize,
}

impl Default for StochasticFloodOverflow {
    fn default() -> Self {
        Self { inner_samples: 10 }
    }
}

fn uniform_draw(rng: &mut dyn RngCore, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * open_unit(rng)
}

impl EvaluationFunction for StochasticFloodOverflow {
    fn evaluate(&self, input: &[f64], rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(Some(4), input)?;
        if self.inner_samples == 0 {
            return Err(EvaluationError::failed("inner sample size must be > 0"));
        }
        let (q, ks, zv, zm) = (input[0], input[1], input[2], input[3]);
        let mut total = 0.0;
        for _ in 0..self.inner_samples {
            let height = uniform_draw(rng, 4.0, 14.0);
            let base = uniform_draw(rng, 50.0, 60.0);
            let length = uniform_draw(rng, 1000.0, 10000.0);
            let width = uniform_draw(rng, 50.0, 500.0);
            total += zv + water_height(q, ks, zv, zm, length, width) - (base + height);
        }
        Ok(total / self.inner_samples as f64)
    }

    fn is_stochastic(&self) -> bool {
        true
    }

    fn input_dimension(&self) -> Option<usize> {
        Some(4)
    }
}

impl ReferenceModel for StochasticFloodOverflow {
    fn input_spec(&self) -> Result<InputSpec, ModelError> {
        flood_input()
    }

    fn output_name(&self) -> &'static str {
        "Smean"
    }
}

// ============================================================================
// Mechanics
// ============================================================================

/// Deflection of a tube under a point load:
///
/// ```text
/// y = −F a² (L − a)² / (3 E L I),   I = π (D⁴ − d⁴) / 32
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TubeDeflection;

impl EvaluationFunction for TubeDeflection {
    fn evaluate(&self, input: &[f64], _rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(Some(6), input)?;
        let [f, l, a, d_ext, d_int, e] = [input[0], input[1], input[2], input[3], input[4], input[5]];
        let inertia = PI * (d_ext.powi(4) - d_int.powi(4)) / 32.0;
        Ok(-f * a * a * (l - a).powi(2) / (3.0 * e * l * inertia))
    }

    fn input_dimension(&self) -> Option<usize> {
        Some(6)
    }
}

impl ReferenceModel for TubeDeflection {
    fn input_spec(&self) -> Result<InputSpec, ModelError> {
        Ok(InputSpec::builder()
            .marginal("F", Normal::new(1.0, 0.1)?)
            .marginal("L", Normal::new(1.5, 0.01)?)
            .marginal("a", Uniform::new(0.7, 1.2)?)
            .marginal("D", Triangular::new(0.75, 0.8, 0.85)?)
            .marginal("d", Triangular::new(0.09, 0.1, 0.11)?)
            .marginal("E", Normal::new(200_000.0, 2000.0)?)
            .build()?)
    }

    fn output_name(&self) -> &'static str {
        "Deflection"
    }
}

/// Chaboche hardening law `σ = R + C (1 − e^(−γ ε))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChabocheStress;

impl EvaluationFunction for ChabocheStress {
    fn evaluate(&self, input: &[f64], _rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(Some(4), input)?;
        let (strain, r, c, gamma) = (input[0], input[1], input[2], input[3]);
        Ok(r + c * (1.0 - (-gamma * strain).exp()))
    }

    fn input_dimension(&self) -> Option<usize> {
        Some(4)
    }
}

impl ReferenceModel for ChabocheStress {
    /// Random strain; the material parameters are fixed at their
    /// calibrated values.
    fn input_spec(&self) -> Result<InputSpec, ModelError> {
        Ok(InputSpec::builder()
            .marginal("Strain", Uniform::new(0.0, 0.07)?)
            .marginal("R", Dirac::new(750e6)?)
            .marginal("C", Dirac::new(2750e6)?)
            .marginal("Gamma", Dirac::new(10.0)?)
            .build()?)
    }

    fn output_name(&self) -> &'static str {
        "Sigma"
    }
}

// ============================================================================
// Benchmarks
// ============================================================================

/// Ishigami function `sin X1 + a sin² X2 + b X3⁴ sin X1` on `[−π, π]³`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ishigami {
    pub a: f64,
    pub b: f64,
}

impl Default for Ishigami {
    fn default() -> Self {
        Self { a: 7.0, b: 0.1 }
    }
}

impl Ishigami {
    /// `E[Y] = a / 2`.
    pub fn mean(&self) -> f64 {
        self.a / 2.0
    }
}

impl EvaluationFunction for Ishigami {
    fn evaluate(&self, input: &[f64], _rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(Some(3), input)?;
        let s1 = input[0].sin();
        Ok(s1 + self.a * input[1].sin().powi(2) + self.b * input[2].powi(4) * s1)
    }

    fn input_dimension(&self) -> Option<usize> {
        Some(3)
    }
}

impl ReferenceModel for Ishigami {
    fn input_spec(&self) -> Result<InputSpec, ModelError> {
        Ok(InputSpec::builder()
            .marginal("X1", Uniform::new(-PI, PI)?)
            .marginal("X2", Uniform::new(-PI, PI)?)
            .marginal("X3", Uniform::new(-PI, PI)?)
            .build()?)
    }

    fn output_name(&self) -> &'static str {
        "Y"
    }
}

/// Altitude at `time` of an object in viscous free fall, floored at the
/// ground level `zmin`:
///
/// ```text
/// τ = m / c,   v∞ = −m g / c
/// z(t) = max(z0 + v∞ t + τ (v0 − v∞)(1 − e^(−t/τ)), zmin)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeFall {
    /// Observation time (s).
    pub time: f64,
}

impl FreeFall {
    pub const GRAVITY: f64 = 9.81;
}

impl Default for FreeFall {
    fn default() -> Self {
        Self { time: 12.0 }
    }
}

impl EvaluationFunction for FreeFall {
    fn evaluate(&self, input: &[f64], _rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(Some(5), input)?;
        let (z0, v0, m, c, zmin) = (input[0], input[1], input[2], input[3], input[4]);
        if m <= 0.0 || c <= 0.0 {
            return Err(EvaluationError::failed(format!(
                "mass and drag must be positive, got m={m}, c={c}"
            )));
        }
        let tau = m / c;
        let v_inf = -m * Self::GRAVITY / c;
        let t = self.time;
        let z = z0 + v_inf * t + tau * (v0 - v_inf) * (1.0 - (-t / tau).exp());
        Ok(z.max(zmin))
    }

    fn input_dimension(&self) -> Option<usize> {
        Some(5)
    }
}

impl ReferenceModel for FreeFall {
    fn input_spec(&self) -> Result<InputSpec, ModelError> {
        Ok(InputSpec::builder()
            .marginal("z0", Uniform::new(100.0, 150.0)?)
            .marginal("v0", Normal::new(55.0, 10.0)?)
            .marginal("m", Normal::new(80.0, 8.0)?)
            .marginal("c", Uniform::new(0.0, 30.0)?)
            .marginal("zmin", Dirac::new(0.0)?)
            .build()?)
    }

    fn output_name(&self) -> &'static str {
        "z"
    }
}

/// Logistic population growth from the 1790 census, in millions:
///
/// ```text
/// y(t) = a y0 / (b y0 + (a − b y0) e^(−a (t − t0)))
/// ```
///
/// The population tends to `a / b` as `t` grows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticGrowth {
    /// Observation year.
    pub time: f64,
}

impl LogisticGrowth {
    /// Year of the initial population `y0`.
    pub const ORIGIN: f64 = 1790.0;
    /// Calibrated initial population.
    pub const Y0: f64 = 3.9e6;
    /// Calibrated growth rate (1/year).
    pub const A: f64 = 0.03134;
    /// Calibrated competition coefficient.
    pub const B: f64 = 1.5887e-10;
}

impl Default for LogisticGrowth {
    fn default() -> Self {
        Self { time: 2001.0 }
    }
}

impl EvaluationFunction for LogisticGrowth {
    fn evaluate(&self, input: &[f64], _rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(Some(3), input)?;
        let (y0, a, b) = (input[0], input[1], input[2]);
        let decay = (-a * (self.time - Self::ORIGIN)).exp();
        Ok(a * y0 / (b * y0 + (a - b * y0) * decay) / 1e6)
    }

    fn input_dimension(&self) -> Option<usize> {
        Some(3)
    }
}

impl ReferenceModel for LogisticGrowth {
    /// Normal laws around the calibrated values, with 10 % relative
    /// spread on `y0` and 30 % on `a` and `b`.
    fn input_spec(&self) -> Result<InputSpec, ModelError> {
        Ok(InputSpec::builder()
            .marginal("y0", Normal::new(Self::Y0, 0.1 * Self::Y0)?)
            .marginal("a", Normal::new(Self::A, 0.3 * Self::A)?)
            .marginal("b", Normal::new(Self::B, 0.3 * Self::B)?)
            .build()?)
    }

    fn output_name(&self) -> &'static str {
        "Population"
    }
}

// ============================================================================
// Oscillator
// ============================================================================

/// Peak force in the spring of a secondary oscillator mounted on a primary
/// one, under white-noise excitation of intensity `S0`.
///
/// Inputs are the masses `mp, ms`, stiffnesses `kp, ks`, damping ratios
/// `ξp, ξs` and `S0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonlinearOscillator;

impl NonlinearOscillator {
    /// Input names, means and coefficients of variation.
    const INPUTS: [(&'static str, f64, f64); 7] = [
        ("mp", 1.5, 0.1),
        ("ms", 0.01, 0.1),
        ("kp", 1.0, 0.2),
        ("ks", 0.01, 0.2),
        ("xi_p", 0.05, 0.4),
        ("xi_s", 0.02, 0.5),
        ("S0", 100.0, 0.1),
    ];

    /// The input means, where the force is about 4.31.
    pub fn nominal() -> [f64; 7] {
        Self::INPUTS.map(|(_, mean, _)| mean)
    }
}

impl EvaluationFunction for NonlinearOscillator {
    fn evaluate(&self, input: &[f64], _rng: &mut dyn RngCore) -> Result<f64, EvaluationError> {
        check_dimension(Some(7), input)?;
        let [mp, ms, kp, ks, xi_p, xi_s, s0] =
            [input[0], input[1], input[2], input[3], input[4], input[5], input[6]];
        let omega_p = (kp / mp).sqrt();
        let omega_s = (ks / ms).sqrt();
        let gamma = ms / mp;
        let omega_a = (omega_p + omega_s) / 2.0;
        let xi_a = (xi_p + xi_s) / 2.0;
        let theta = (omega_p - omega_s) / omega_a;

        let excitation = PI * s0 / (4.0 * xi_s * omega_s.powi(3));
        let coupling = xi_a * xi_s
            / (xi_p * xi_s * (4.0 * xi_a * xi_a + theta * theta) + gamma * xi_a * xi_a);
        let response = (xi_p * omega_p.powi(3) + xi_s * omega_s.powi(3)) * omega_p
            / (4.0 * xi_a * omega_a.powi(4));
        Ok(3.0 * ks * (excitation * coupling * response).sqrt())
    }

    fn input_dimension(&self) -> Option<usize> {
        Some(7)
    }
}

impl ReferenceModel for NonlinearOscillator {
    /// Independent log-normal laws given by their mean and CoV.
    fn input_spec(&self) -> Result<InputSpec, ModelError> {
        let mut builder = InputSpec::builder();
        for (name, mean, cov) in Self::INPUTS {
            builder = builder.marginal(name, LogNormal::from_mean_std(mean, mean * cov)?);
        }
        Ok(builder.build()?)
    }

    fn output_name(&self) -> &'static str {
        "F"
    }
}

// ============================================================================
// Tests
// ============================================================================
