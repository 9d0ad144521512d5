//! Storage backends.
//!
//! The benchmark executor talks to storage only through [`StorageBackend`].
//! A backend is opened once per Configuration, then driven through one
//! `reset` + `write` pair per trial. Only `write` is timed.

use crate::error::BenchError;
use crate::source::SourceDescriptor;
use crate::space::Configuration;
use thiserror::Error;

pub mod zarr;

pub use zarr::ZarrBackend;

/// Failures reported by a backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend cannot realize this Configuration at all
    #[error("{0}")]
    Rejected(String),

    /// A delete, create or write failed
    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}

impl From<BackendError> for BenchError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected(reason) => BenchError::BackendRejection(reason),
            BackendError::Io(reason) => BenchError::TrialIo(reason),
        }
    }
}

/// Array storage under benchmark.
///
/// Calls for one Configuration arrive in the order `open`, then `reset` and
/// `write` once per trial, then `close`. Calls never overlap.
pub trait StorageBackend: Send {
    /// Short name for logs and result metadata
    fn name(&self) -> &'static str;

    /// Check that `config` can be realized for `source` and remember it for
    /// the following trials. Must not touch the destination.
    ///
    /// Returns [`BackendError::Rejected`] for unsupported combinations.
    fn open(
        &mut self,
        config: &Configuration,
        source: &SourceDescriptor,
    ) -> Result<(), BackendError>;

    /// Delete and recreate the destination so the next write starts empty.
    fn reset(&mut self) -> Result<(), BackendError>;

    /// Write the entire source with the opened Configuration.
    ///
    /// Must not return until every byte has been handed to the store, so the
    /// caller can stop its timer on return.
    fn write(&mut self, source: &SourceDescriptor) -> Result<(), BackendError>;

    /// Release whatever `open` acquired. Called even after a failed trial.
    fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_map_to_sweep_errors() {
        let err: BenchError = BackendError::Rejected("no such codec".into()).into();
        assert!(matches!(err, BenchError::BackendRejection(_)));

        let err: BenchError = BackendError::Io("disk full".into()).into();
        assert!(matches!(err, BenchError::TrialIo(_)));
        assert_eq!(err.to_string(), "trial I/O error: disk full");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(BackendError::from(io), BackendError::Io(_)));
    }
}
