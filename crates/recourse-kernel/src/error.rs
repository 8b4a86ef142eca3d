//! Crate-level error types for `recourse-kernel`.
//!
//! One taxonomy covers the whole engine: configuration faults, transient
//! external failures and their exhaustion, missing entities, snapshot
//! corruption, and cancellation. The transport layer maps these onto HTTP
//! statuses; the kernel itself never swallows an error class except cache
//! corruption, which the memoization layer downgrades to a miss.

use thiserror::Error;

/// Engine operation result type
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// No step is registered for the dispatched event kind
    #[error("no step registered for event kind: {0}")]
    UnroutableEvent(String),

    /// Two steps were registered for the same event kind
    #[error("duplicate step registered for event kind: {0}")]
    DuplicateStep(String),

    /// Transient external failure (timeout, rate limit, 5xx); retryable
    #[error("transient external error: {0}")]
    Transient(String),

    /// The backoff executor exhausted its attempt budget
    #[error("external call failed after {attempts} attempts: {last}")]
    TransientExhausted { attempts: u32, last: String },

    /// Missing entity, file, or reference; never retried
    #[error("not found: {0}")]
    NotFound(String),

    /// Corrupt durable snapshot; fatal for the run identifier
    #[error("snapshot deserialization failed: {0}")]
    Deserialization(String),

    /// Cancellation observed at a suspension point
    #[error("run was cancelled")]
    Cancelled,

    /// Invalid wiring, e.g. missing credentials in the run context
    #[error("configuration error: {0}")]
    Config(String),

    /// Transition budget exhausted; guards against event cycles
    #[error("step limit exceeded after {0} transitions")]
    StepLimitExceeded(u32),

    /// Step handler failure outside the classes above
    #[error("step execution failed: {0}")]
    Step(String),

    /// IO 错误
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// 序列化错误
    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// 其他错误
    /// Other error
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Whether the backoff executor may retry this failure.
    ///
    /// Configuration, not-found, deserialization, and cancellation faults
    /// are surfaced immediately; only transient and IO failures go back
    /// through the retry loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Io(_))
    }

    /// Create a transient error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
