use aurelius_contracts::{EntryPointError, FailedOp};
use thiserror::Error;

/// Errors of the bundle submission path
#[derive(Debug, Error)]
pub enum BundlerError {
    /// `handleOps` would revert because of this user operation
    #[error("{0}")]
    FailedOp(FailedOp),

    /// The upstream node does not expose a method this bundler is configured
    /// to use; fatal, an operator has to fix the configuration
    #[error("method not found: {inner}")]
    MethodNotFound {
        /// The inner error message
        inner: String,
    },

    /// Provider error
    #[error("provider error: {inner}")]
    Provider {
        /// The inner error message
        inner: String,
    },

    /// Any other error
    #[error("other error: {inner}")]
    Other {
        /// The inner error message
        inner: String,
    },
}

impl From<EntryPointError> for BundlerError {
    fn from(err: EntryPointError) -> Self {
        match err {
            EntryPointError::FailedOp(op) => BundlerError::FailedOp(op),
            EntryPointError::MethodNotFound { inner } => BundlerError::MethodNotFound { inner },
            EntryPointError::Provider { inner } => BundlerError::Provider { inner },
            _ => BundlerError::Other { inner: err.to_string() },
        }
    }
}
