//! Outbound events.
//!
//! Consumers (visualizers, transcript writers, roster broadcasters) receive
//! these as fire-and-forget telemetry; the orchestrator never waits on them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::core::{Address, EndpointId, ParticipantId};
use crate::protocol::Packet;

/// Unique id of an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// Raw value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Monotonic event id source.
#[derive(Debug)]
pub struct EventIdGenerator {
    next: AtomicU64,
}

impl Default for EventIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl EventIdGenerator {
    /// Create a generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Take the next id.
    pub fn next_id(&self) -> EventId {
        EventId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Label of an animated hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnimationKind {
    /// SYN hop.
    #[serde(rename = "SYN")]
    Syn,
    /// SYN-ACK hop.
    #[serde(rename = "SYN-ACK")]
    SynAck,
    /// ACK hop.
    #[serde(rename = "ACK")]
    Ack,
    /// FIN hop.
    #[serde(rename = "FIN")]
    Fin,
    /// FIN-ACK hop.
    #[serde(rename = "FIN-ACK")]
    FinAck,
    /// Message on its way to an endpoint.
    #[serde(rename = "DATA_SEND")]
    DataSend,
    /// Reply on its way back to the participant.
    #[serde(rename = "DATA_RECEIVE")]
    DataReceive,
}

/// One packet hop.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketAnimation {
    /// Unique event id.
    pub id: EventId,
    /// Sending party.
    pub from: Address,
    /// Receiving party.
    pub to: Address,
    /// The packet.
    pub packet: Packet,
    /// Hop label.
    #[serde(rename = "type")]
    pub kind: AnimationKind,
    /// Participant whose lifecycle produced the hop.
    pub participant_id: ParticipantId,
}

/// A completed data cycle, for transcript persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// Sender.
    pub participant_id: ParticipantId,
    /// Endpoint that answered.
    pub endpoint: EndpointId,
    /// Original message.
    pub message: String,
    /// Delivered reply.
    pub response: String,
}

/// A reply delivered back to its participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    /// Recipient.
    pub participant_id: ParticipantId,
    /// Endpoint that answered.
    pub endpoint: EndpointId,
    /// Reply text.
    pub response: String,
    /// Whether the reply is the local fallback.
    pub fallback: bool,
}

/// Kind of completed participant lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    /// First connection after registration.
    ClientRegistered,
    /// Every endpoint handshake completed.
    ClientConnected,
    /// Every established connection torn down on request.
    ClientDisconnectedManual,
    /// Every endpoint re-handshaken.
    ClientReconnected,
}

impl LifecycleKind {
    /// Event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleKind::ClientRegistered => "client_registered",
            LifecycleKind::ClientConnected => "client_connected",
            LifecycleKind::ClientDisconnectedManual => "client_disconnected_manual",
            LifecycleKind::ClientReconnected => "client_reconnected",
        }
    }
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant lifecycle finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleNotice {
    /// What finished.
    pub kind: LifecycleKind,
    /// Participant.
    pub participant_id: ParticipantId,
    /// Display name.
    pub name: String,
}

/// Everything the orchestrator publishes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// A packet hop.
    PacketAnimation(PacketAnimation),
    /// A data cycle to append to the transcript.
    Transcript(TranscriptEntry),
    /// A reply reached its participant.
    Delivery(Delivery),
    /// A participant lifecycle finished.
    Lifecycle(LifecycleNotice),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ids_are_unique_and_increasing() {
        let ids = EventIdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(b > a);
        assert_eq!(a.get(), 1);
    }

    #[test]
    fn test_lifecycle_event_serialization() {
        let event = OrchestratorEvent::Lifecycle(LifecycleNotice {
            kind: LifecycleKind::ClientDisconnectedManual,
            participant_id: "alice".into(),
            name: "Alice".to_string(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "lifecycle");
        assert_eq!(value["kind"], "client_disconnected_manual");
        assert_eq!(value["participantId"], "alice");
        assert!(value.get("participant_id").is_none());
    }
}
