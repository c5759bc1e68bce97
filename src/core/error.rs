//! Error types for THK protocol.

use thiserror::Error;

/// Errors raised by a response generator.
///
/// These never escape a data cycle: the orchestrator substitutes a fallback
/// reply and logs the failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    /// The backend reported a failure.
    #[error("response generation failed: {0}")]
    Failed(String),

    /// The backend did not answer in time.
    #[error("response generation timed out")]
    Timeout,
}

/// Top-level THK errors.
#[derive(Debug, Error)]
pub enum ThkError {
    /// Protocol engine error.
    #[cfg(feature = "protocol")]
    #[error("protocol error: {0}")]
    Protocol(#[from] crate::protocol::ProtocolError),

    /// Orchestrator error.
    #[cfg(feature = "orchestrator")]
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] crate::orchestrator::OrchestratorError),

    /// Participant registry error.
    #[cfg(feature = "agents")]
    #[error("registry error: {0}")]
    Registry(#[from] crate::agents::RegistryError),

    /// Response generation error.
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
