//! Orchestrator error types.

use thiserror::Error;

use crate::core::{EndpointId, ParticipantId};
use crate::protocol::ProtocolError;

/// Errors that end a single lifecycle request.
///
/// None of these are fatal to the orchestrator; they are scoped to the
/// request that triggered them.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The participant is not known to the client registry.
    #[error("participant not found: {0}")]
    ParticipantUnknown(ParticipantId),

    /// The participant exists but is not connected.
    #[error("participant is offline: {0}")]
    ParticipantOffline(ParticipantId),

    /// Data was about to flow on a connection that is not established.
    #[error("connection {participant}-{endpoint} is not established")]
    NotEstablished {
        /// Participant side.
        participant: ParticipantId,
        /// Endpoint side.
        endpoint: EndpointId,
    },

    /// A state transition was rejected by the engine.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A per-endpoint lifecycle task panicked or was cancelled.
    #[error("lifecycle task failed: {0}")]
    TaskFailed(String),
}

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
