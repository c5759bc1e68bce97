//! Connection records and the registry that owns them.
//!
//! One record per (participant, endpoint) pair. A completed teardown removes
//! the record: absence means "no connection", not "closed".

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::{ConnectionKey, EndpointId, ParticipantId};

/// Handshake/teardown state of a connection.
///
/// `CLOSED` is not a variant: a closed connection has no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// SYN sent, waiting for SYN-ACK.
    SynSent,
    /// SYN-ACK sent, waiting for the final ACK.
    SynAckSent,
    /// Handshake complete, data may flow.
    Established,
    /// FIN sent, waiting for FIN-ACK.
    FinSent,
    /// FIN-ACK sent, waiting for the final ACK.
    FinAckSent,
}

impl ConnectionState {
    /// Wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::SynSent => "SYN_SENT",
            ConnectionState::SynAckSent => "SYN_ACK_SENT",
            ConnectionState::Established => "ESTABLISHED",
            ConnectionState::FinSent => "FIN_SENT",
            ConnectionState::FinAckSent => "FIN_ACK_SENT",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connection record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Current state.
    pub state: ConnectionState,
    /// Sequence number of the last packet produced on this connection.
    pub last_sequence: u64,
    /// When the record was last written.
    pub last_activity: Instant,
    /// Endpoint side of the pair.
    pub endpoint: EndpointId,
}

impl Connection {
    /// Time since the last write, measured at `now`.
    pub fn idle_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}

/// Read-only view of a connection, as returned by status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Endpoint side of the pair.
    pub endpoint: EndpointId,
    /// Sequence number of the last packet produced on this connection.
    pub last_sequence: u64,
    /// Milliseconds since the last write.
    pub idle_ms: u64,
    /// Whether the last write falls within the liveness window.
    pub is_active: bool,
}

/// What a transition does to the record once its check passes.
#[derive(Debug)]
pub(crate) enum RecordUpdate {
    /// Insert or overwrite.
    Set(Connection),
    /// Delete.
    Remove,
}

/// Map from (participant, endpoint) to connection record.
///
/// Every mutation runs as one read-modify-write under the registry lock, so
/// concurrent lifecycles never observe or produce a half-applied transition.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    records: RwLock<HashMap<ConnectionKey, Connection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one record.
    pub fn get(&self, key: &ConnectionKey) -> Option<Connection> {
        self.read(|records| records.get(key).cloned())
    }

    /// State of one record.
    pub fn state(&self, key: &ConnectionKey) -> Option<ConnectionState> {
        self.read(|records| records.get(key).map(|conn| conn.state))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.read(|records| records.len())
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records in `state`.
    pub fn count_in(&self, state: ConnectionState) -> usize {
        self.read(|records| records.values().filter(|conn| conn.state == state).count())
    }

    /// Records belonging to `participant`, keyed by endpoint.
    pub fn for_participant(&self, participant: &ParticipantId) -> BTreeMap<EndpointId, Connection> {
        self.read(|records| {
            records
                .iter()
                .filter(|(key, _)| &key.participant == participant)
                .map(|(key, conn)| (key.endpoint.clone(), conn.clone()))
                .collect()
        })
    }

    /// Atomically inspect and update the record for `key`.
    ///
    /// `transition` sees the current record; on `Ok` its update is applied,
    /// on `Err` the record is left alone.
    pub(crate) fn apply<T, E>(
        &self,
        key: &ConnectionKey,
        transition: impl FnOnce(Option<&Connection>) -> Result<(RecordUpdate, T), E>,
    ) -> Result<T, E> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let (update, output) = transition(records.get(key))?;
        match update {
            RecordUpdate::Set(conn) => {
                records.insert(key.clone(), conn);
            }
            RecordUpdate::Remove => {
                records.remove(key);
            }
        }
        Ok(output)
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<ConnectionKey, Connection>) -> T) -> T {
        f(&self.records.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ProtocolError, ProtocolResult};

    fn key(participant: &str, endpoint: &str) -> ConnectionKey {
        ConnectionKey::new(participant.into(), endpoint.into())
    }

    fn record(state: ConnectionState, endpoint: &str) -> Connection {
        Connection {
            state,
            last_sequence: 1000,
            last_activity: Instant::now(),
            endpoint: endpoint.into(),
        }
    }

    #[test]
    fn test_apply_set_and_remove() {
        let registry = ConnectionRegistry::new();
        let k = key("alice", "food");

        registry
            .apply::<_, ProtocolError>(&k, |current| {
                assert!(current.is_none());
                Ok((RecordUpdate::Set(record(ConnectionState::SynSent, "food")), ()))
            })
            .unwrap();
        assert_eq!(registry.state(&k), Some(ConnectionState::SynSent));
        assert_eq!(registry.len(), 1);

        registry
            .apply::<_, ProtocolError>(&k, |_| Ok((RecordUpdate::Remove, ())))
            .unwrap();
        assert!(registry.get(&k).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_apply_error_leaves_record() {
        let registry = ConnectionRegistry::new();
        let k = key("alice", "food");
        let update = RecordUpdate::Set(record(ConnectionState::SynSent, "food"));
        registry
            .apply::<_, ProtocolError>(&k, |_| Ok((update, ())))
            .unwrap();

        let result: ProtocolResult<()> = registry.apply(&k, |_| {
            Err(ProtocolError::UnknownConnection { key: k.clone() })
        });
        assert!(result.is_err());
        assert_eq!(registry.state(&k), Some(ConnectionState::SynSent));
    }

    #[test]
    fn test_for_participant_matches_exactly() {
        let registry = ConnectionRegistry::new();
        for (p, e) in [("alice", "food"), ("alice", "travel"), ("alice2", "food")] {
            registry
                .apply::<_, ProtocolError>(&key(p, e), |_| {
                    Ok((RecordUpdate::Set(record(ConnectionState::Established, e)), ()))
                })
                .unwrap();
        }

        let alice = registry.for_participant(&"alice".into());
        assert_eq!(alice.len(), 2);
        assert!(alice.contains_key(&EndpointId::from("food")));
        assert!(alice.contains_key(&EndpointId::from("travel")));
        assert_eq!(registry.count_in(ConnectionState::Established), 3);
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ConnectionState::SynAckSent.to_string(), "SYN_ACK_SENT");
        assert_eq!(
            serde_json::to_value(ConnectionState::FinAckSent).unwrap(),
            "FIN_ACK_SENT"
        );
    }
}
