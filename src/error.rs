//! Error Module - region arena error types

use thiserror::Error;

/// Main error type for region arena operations.
///
/// Most operations in this crate return [`Result`] rather than
/// panicking. The exceptions are spelled out where they occur: free's
/// validation-contract failure is a silent no-op, and internal
/// invariants are checked with `debug_assert!` on the hot path rather
/// than promoted to this type.
#[derive(Debug, Error)]
pub enum RegionError {
    #[error("out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("virtual memory error: {0}")]
    VirtualMemoryError(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RegionError {
    /// Check if this error is recoverable (a resource condition, not a bug).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RegionError::OutOfMemory { .. })
    }

    /// Check if this error indicates a bug (contract violation) rather
    /// than a transient resource condition.
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            RegionError::InvalidArgument(_) | RegionError::Internal(_)
        )
    }
}

/// Result type alias for region arena operations.
pub type Result<T> = std::result::Result<T, RegionError>;

/// Early return with an error, in the style of `anyhow::bail!`.
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($err)
    };
}

/// Ensure a condition holds, otherwise return the given error.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
