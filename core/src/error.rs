//! Error types for the localization filter and its collaborators.

use thiserror::Error;

/// Failures reported by the localization filter.
///
/// Out-of-range landmark map access is not an error; the map treats it as a no-op.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocalizationError {
    /// A construction or call parameter is out of its valid domain (non-positive particle
    /// count, map size or sigma, negative or non-finite noise).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The measurement sequence does not pair up with the filter's landmark sequence.
    #[error("Measurement arity mismatch: expected {expected} measurements, found {found}")]
    MeasurementArityMismatch { expected: usize, found: usize },

    /// The total importance weight of the population is zero or non-finite.
    #[error("Degenerate weights: total importance weight is {sum}")]
    DegenerateWeights { sum: f64 },

    /// A cycle operation was called before the population was initialized.
    #[error("Particle filter has not been initialized")]
    Uninitialized,
}

pub type Result<T> = std::result::Result<T, LocalizationError>;
