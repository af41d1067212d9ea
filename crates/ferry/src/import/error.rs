use std::time::Duration;

use thiserror::Error;

use crate::entity::ConnectionStatus;
use crate::provider::ProviderError;

use super::types::ImportPhase;

/// Fatal outcome of an import run.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Cancellation observed at a checkpoint.
    #[error("Import cancelled")]
    Cancelled,

    /// The run exceeded its configured wall-clock limit.
    #[error("Import exceeded its time limit of {0:?}")]
    TimedOut(Duration),

    /// The connection was not usable when the run started.
    #[error("Connection is not usable (status: {status})")]
    ConnectionUnusable { status: ConnectionStatus },

    /// A provider call failed in a phase where failure aborts the run.
    #[error("{phase} failed: {source}")]
    Phase {
        phase: ImportPhase,
        #[source]
        source: ProviderError,
    },
}

impl ImportError {
    /// Attribute a provider error to the phase it occurred in.
    ///
    /// Provider-side cancellation stays the cancellation sentinel.
    pub fn from_provider(phase: ImportPhase, source: ProviderError) -> Self {
        match source {
            ProviderError::Cancelled => Self::Cancelled,
            source => Self::Phase { phase, source },
        }
    }

    /// Whether this is a cancellation rather than a genuine failure.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the connection's credential was rejected.
    #[inline]
    pub fn is_connection_invalid(&self) -> bool {
        self.connection_status().is_some()
    }

    /// The status the connection should move to, when the credential was
    /// rejected.
    pub fn connection_status(&self) -> Option<ConnectionStatus> {
        match self {
            Self::ConnectionUnusable { status } => Some(*status),
            Self::Phase { source, .. } => source.connection_status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_provider_preserves_cancellation() {
        let err = ImportError::from_provider(ImportPhase::FetchingUsers, ProviderError::Cancelled);
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_phase_error_message() {
        let err = ImportError::from_provider(
            ImportPhase::Validating,
            ProviderError::Auth {
                message: "invalid_auth".to_string(),
            },
        );
        assert!(!err.is_cancelled());
        assert!(err.is_connection_invalid());
        assert_eq!(
            err.to_string(),
            "Validating connection failed: Authentication failed: invalid_auth"
        );
    }

    #[test]
    fn test_network_failure_during_validation_keeps_connection() {
        let err = ImportError::from_provider(
            ImportPhase::Validating,
            ProviderError::connection_invalid(
                "auth.test failed",
                ProviderError::network("connection reset"),
            ),
        );
        assert!(!err.is_connection_invalid());
        assert_eq!(err.connection_status(), None);
    }

    #[test]
    fn test_timed_out_is_not_cancellation() {
        let err = ImportError::TimedOut(Duration::from_secs(5));
        assert!(!err.is_cancelled());
        assert!(!err.is_connection_invalid());
    }
}
