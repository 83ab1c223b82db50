//! Exceedance events: a comparison of a model output against a threshold.

use serde::{Deserialize, Serialize};

/// Comparison operator defining "failure".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparison {
    /// Applies `lhs <op> rhs`. Any comparison involving NaN is false.
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Less => lhs < rhs,
            Comparison::LessOrEqual => lhs <= rhs,
            Comparison::Greater => lhs > rhs,
            Comparison::GreaterOrEqual => lhs >= rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
        }
    }
}

/// The event `output <op> threshold`.
///
/// # Examples
/// ```
/// use u_reliability::event::ExceedanceEvent;
/// let overflow = ExceedanceEvent::greater_or_equal(0.0);
/// assert!(overflow.occurs(0.0));
/// assert!(!overflow.occurs(-0.5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExceedanceEvent {
    pub comparison: Comparison,
    pub threshold: f64,
}

impl ExceedanceEvent {
    pub fn new(comparison: Comparison, threshold: f64) -> Self {
        Self {
            comparison,
            threshold,
        }
    }

    pub fn less(threshold: f64) -> Self {
        Self::new(Comparison::Less, threshold)
    }

    pub fn less_or_equal(threshold: f64) -> Self {
        Self::new(Comparison::LessOrEqual, threshold)
    }

    pub fn greater(threshold: f64) -> Self {
        Self::new(Comparison::Greater, threshold)
    }

    pub fn greater_or_equal(threshold: f64) -> Self {
        Self::new(Comparison::GreaterOrEqual, threshold)
    }

    /// Whether the event occurred for model output `value`.
    pub fn occurs(&self, value: f64) -> bool {
        self.comparison.holds(value, self.threshold)
    }

    /// The complementary event: `P(complement) = 1 − P(self)`.
    pub fn complement(&self) -> Self {
        let comparison = match self.comparison {
            Comparison::Less => Comparison::GreaterOrEqual,
            Comparison::LessOrEqual => Comparison::Greater,
            Comparison::Greater => Comparison::LessOrEqual,
            Comparison::GreaterOrEqual => Comparison::Less,
        };
        Self::new(comparison, self.threshold)
    }
}

impl std::fmt::Display for ExceedanceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g(X) {} {}", self.comparison.symbol(), self.threshold)
    }
}
