//! Collaborator traits.
//!
//! The protocol core calls out through these traits for everything it does
//! not own: choosing an endpoint for a message, generating the endpoint's
//! reply, and reading or updating a participant's status.

use std::future::Future;

use serde::{Deserialize, Serialize};

use super::error::GeneratorError;
use super::ids::{EndpointId, ParticipantId};

/// Whether a participant may currently exchange data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    /// All handshakes completed.
    Connected,
    /// Torn down or never connected.
    Disconnected,
}

/// How a participant came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    /// Registered by a live session.
    Live,
    /// Provisioned by hand through the API.
    Manual,
}

/// What the orchestrator needs to know about a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStatus {
    /// Current status.
    pub status: ParticipantStatus,
    /// Display name.
    pub display_name: String,
}

/// Produces the endpoint's reply to a message.
///
/// Invoked once per data cycle. Implementations may be slow or fail; the
/// orchestrator bounds the call with a timeout and falls back to a fixed
/// reply on either.
pub trait ResponseGenerator: Send + Sync + 'static {
    /// Generate the reply of `endpoint` to `message` sent by `participant`.
    fn answer(
        &self,
        endpoint: &EndpointId,
        message: &str,
        participant: &ParticipantId,
    ) -> impl Future<Output = Result<String, GeneratorError>> + Send;
}

/// Read/update access to participant status, owned by the client registry.
pub trait ClientStatusLookup: Send + Sync + 'static {
    /// Look up a participant. `None` if unknown.
    fn get(&self, participant: &ParticipantId)
    -> impl Future<Output = Option<ClientStatus>> + Send;

    /// Record a participant's new status. Returns `false` if unknown.
    fn set_status(
        &self,
        participant: &ParticipantId,
        status: ParticipantStatus,
    ) -> impl Future<Output = bool> + Send;
}

/// Chooses the endpoint a message is delivered to.
pub trait MessageRouter: Send + Sync + 'static {
    /// Pick an endpoint for `message`.
    fn route(&self, message: &str) -> EndpointId;
}
