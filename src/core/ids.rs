//! Identifiers and addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::constants::ROUTER_ADDRESS;

/// Identity of a participant (a registered session or a manual client).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a participant id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity of a logical destination (e.g. `travel`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    /// Create an endpoint id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EndpointId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Addressable party of a hop.
///
/// Serializes as the bare id, with the router rendered as `router`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// A participant.
    Participant(ParticipantId),
    /// The intermediate router.
    Router,
    /// An endpoint.
    Endpoint(EndpointId),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Participant(id) => id.fmt(f),
            Address::Router => f.write_str(ROUTER_ADDRESS),
            Address::Endpoint(id) => id.fmt(f),
        }
    }
}

impl From<&ParticipantId> for Address {
    fn from(id: &ParticipantId) -> Self {
        Address::Participant(id.clone())
    }
}

impl From<&EndpointId> for Address {
    fn from(id: &EndpointId) -> Self {
        Address::Endpoint(id.clone())
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Key of a connection record: one per (participant, endpoint) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionKey {
    /// Participant side.
    pub participant: ParticipantId,
    /// Endpoint side.
    pub endpoint: EndpointId,
}

impl ConnectionKey {
    /// Create a key.
    pub fn new(participant: ParticipantId, endpoint: EndpointId) -> Self {
        Self {
            participant,
            endpoint,
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.participant, self.endpoint)
    }
}
