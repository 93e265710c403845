//! Error types for the error statistics engine.

use thiserror::Error;

/// Failures of the engine itself.
///
/// These are configuration problems on the caller's side, never a report of
/// the errors being counted. See [`ErrorReport`] for the latter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatsError {
    /// A value was visited whose type has no registered encoder.
    #[error("no encoder registered for type `{type_name}`")]
    MissingEncoder {
        /// Rust type name of the offending value.
        type_name: &'static str,
    },

    /// A `dyn Error` was visited whose concrete type has no encoder
    /// registered through `set_encoder`.
    #[error("no encoder registered for the error type behind `dyn Error`: {error}")]
    MissingErrorEncoder {
        /// Display output of the offending error.
        error: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, StatsError>;

/// Aggregate of everything logged since construction or the last reset.
///
/// Returned by [`ErrorStats::err`](crate::ErrorStats::err) and
/// [`ErrorStats::err_and_reset`](crate::ErrorStats::err_and_reset) so that
/// callers can use `?` or `is_err()` to ask whether anything went wrong.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{total} errors logged across {distinct} fingerprints: {counts}")]
pub struct ErrorReport {
    /// Sum of all counters.
    pub total: u64,
    /// Number of distinct fingerprints.
    pub distinct: usize,
    /// Counters serialised as a JSON object.
    pub counts: String,
}
