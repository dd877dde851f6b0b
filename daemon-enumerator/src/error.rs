//! Error types for the enumerator and its endpoint registry.

use crate::endpoint::EndpointPath;
use crate::enumerator::Mode;

/// Errors surfaced by [`Enumerator`](crate::Enumerator) operations.
///
/// Usage errors ([`EnumeratorError::is_usage`]) are reported synchronously and never
/// reach the remote daemon. [`EnumeratorError::Cancelled`] is only ever delivered
/// through a batch future.
#[derive(Debug, thiserror::Error)]
pub enum EnumeratorError {
    /// The pull operation does not belong to this enumerator's mode.
    #[error("operation not supported in {mode} mode")]
    WrongMode {
        /// Mode the enumerator was created with.
        mode: Mode,
    },

    /// A batch request is already outstanding on this enumerator.
    #[error("a batch request is already pending")]
    BatchPending,

    /// Batch requests must ask for at least one entry.
    #[error("batch size must be greater than zero")]
    InvalidBatchSize,

    /// The enumerator has been closed.
    #[error("enumerator is closed")]
    Closed,

    /// The batch request was cancelled before it could complete.
    #[error("operation was cancelled")]
    Cancelled,

    /// The endpoint could not be registered; the enumerator was not created.
    #[error("failed to register endpoint {path}: {source}")]
    Registration {
        /// Path that failed to register.
        path: EndpointPath,
        /// Underlying registry failure.
        #[source]
        source: RegistryError,
    },

    /// An async enumerator was built outside of a Tokio runtime.
    #[error("async enumerators require a Tokio runtime")]
    NoRuntime,
}

impl EnumeratorError {
    /// Whether this error is a local usage error.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            EnumeratorError::WrongMode { .. }
                | EnumeratorError::BatchPending
                | EnumeratorError::InvalidBatchSize
                | EnumeratorError::Closed
        )
    }
}

/// Errors from an [`EndpointRegistry`](crate::EndpointRegistry).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Another receiver already owns this path.
    #[error("endpoint already registered: {path}")]
    AlreadyRegistered {
        /// The contested path.
        path: EndpointPath,
    },

    /// No receiver is registered for this path.
    #[error("endpoint not found: {path}")]
    NotFound {
        /// The path that was looked up.
        path: EndpointPath,
    },

    /// The registry no longer accepts registrations.
    #[error("endpoint registry shut down")]
    Shutdown,
}
