//! Executor-level error type.

use thiserror::Error;

/// Errors returned by an executor's `execute` method.
///
/// The variant carries retry advice for decorators layered above `execute`
/// (the core scheduler never retries on its own):
/// - `Retryable` — transient; a retry wrapper may re-invoke with back-off.
/// - `Failed`    — permanent; recorded as the action's Failed state as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Transient failure; safe to re-attempt.
    #[error("retryable action error: {0}")]
    Retryable(String),

    /// Permanent failure; no retry should be attempted.
    #[error("action failed: {0}")]
    Failed(String),
}
