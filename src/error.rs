//! Error taxonomy for the benchmark core.
//!
//! Errors fall into two groups. `Parse` and `ShapeMismatch` are fatal and
//! surface before any benchmarking starts. The remaining variants are
//! recovered locally by the sweep: an invalid Configuration is dropped, a
//! rejected Configuration is marked failed with zero trials, and a trial I/O
//! failure abandons the remaining trials of that Configuration only.

use thiserror::Error;

/// Errors produced while resolving axes, building the parameter space and
/// executing trials.
#[derive(Debug, Error)]
pub enum BenchError {
    /// A malformed user-supplied value (e.g. a non-integer in a shape list)
    #[error("parse error: {0}")]
    Parse(String),

    /// A chunk shape that does not fit the source array
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An axis combination that can never be valid (e.g. endianness "none"
    /// with a multi-byte element type)
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The storage backend cannot realize a Configuration
    #[error("backend rejected configuration: {0}")]
    BackendRejection(String),

    /// A write or delete failed during an individual trial
    #[error("trial I/O error: {0}")]
    TrialIo(String),

    /// Failure reading the source data
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Whether this error aborts the run before benchmarking starts.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BenchError::Parse(_) | BenchError::ShapeMismatch(_) | BenchError::Io(_)
        )
    }
}

pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BenchError::Parse("x".into()).is_fatal());
        assert!(BenchError::ShapeMismatch("x".into()).is_fatal());
        assert!(!BenchError::Configuration("x".into()).is_fatal());
        assert!(!BenchError::BackendRejection("x".into()).is_fatal());
        assert!(!BenchError::TrialIo("x".into()).is_fatal());
    }

    #[test]
    fn test_display_includes_reason() {
        let err = BenchError::ShapeMismatch("chunk has 2 dimensions, source has 3".into());
        assert_eq!(
            err.to_string(),
            "shape mismatch: chunk has 2 dimensions, source has 3"
        );
    }
}
