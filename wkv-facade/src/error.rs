use thiserror::Error;

use wkv_common::Operation;

/// Boxed collaborator error carried as the `source` of a `FacadeError`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for facade operations.
pub type FacadeResult<T> = Result<T, FacadeError>;

/// Failures surfaced by `KeyValueFacade`.
///
/// A missing key is not an error: `get` returns `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum FacadeError {
    /// The key was empty; nothing was leased.
    #[error("{op}: key must not be empty")]
    InvalidKey { op: Operation },
    /// The pool could not supply a connection (exhausted, timed out, closed
    /// or store unreachable). No store call was made.
    #[error("{op}: no store connection available")]
    Unavailable {
        op: Operation,
        #[source]
        source: BoxError,
    },
    /// The store call itself failed.
    #[error("{op}: store call failed")]
    OperationFailed {
        op: Operation,
        #[source]
        source: BoxError,
    },
}

impl FacadeError {
    /// Returns the operation that failed.
    pub fn operation(&self) -> Operation {
        match self {
            FacadeError::InvalidKey { op }
            | FacadeError::Unavailable { op, .. }
            | FacadeError::OperationFailed { op, .. } => *op,
        }
    }

    /// Returns true when no connection could be leased.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FacadeError::Unavailable { .. })
    }

    /// Returns true when the store call was made and failed.
    pub fn is_operation_failed(&self) -> bool {
        matches!(self, FacadeError::OperationFailed { .. })
    }
}
