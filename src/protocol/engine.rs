//! Protocol engine.
//!
//! Composes the sequence allocator, checksum, packet factory, and connection
//! registry into the handshake, teardown, and reconnection transitions. Each
//! transition produces exactly one packet and updates the pair's record in
//! a single atomic step.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Value};

use super::connection::{
    Connection, ConnectionRegistry, ConnectionState, ConnectionStatus, RecordUpdate,
};
use super::error::{ProtocolError, ProtocolResult};
use super::packet::{Packet, PacketFactory, PacketHistory, PacketType};
use super::sequence::SequenceAllocator;
use crate::core::{
    Address, ConnectionKey, EndpointId, ParticipantId, INITIAL_CONGESTION_WINDOW,
    LIVENESS_WINDOW, MAX_CONGESTION_WINDOW, PACKET_HISTORY_CAPACITY, SEQUENCE_BASE,
};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// First sequence number per source.
    pub sequence_base: u64,
    /// Packets kept for introspection.
    pub history_capacity: usize,
    /// Activity window for `is_active`.
    pub liveness_window: Duration,
    /// Congestion window reported by [`ProtocolEngine::stats`].
    pub congestion_window: u32,
    /// Upper bound on the congestion window, reported alongside it.
    pub max_window: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sequence_base: SEQUENCE_BASE,
            history_capacity: PACKET_HISTORY_CAPACITY,
            liveness_window: LIVENESS_WINDOW,
            congestion_window: INITIAL_CONGESTION_WINDOW,
            max_window: MAX_CONGESTION_WINDOW,
        }
    }
}

/// Reporting snapshot of the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolStats {
    /// Connection records of any state.
    pub total_connections: usize,
    /// Records in `ESTABLISHED`.
    pub established: usize,
    /// Reported congestion window.
    pub congestion_window: u32,
    /// Reported maximum window.
    pub max_window: u32,
    /// Most recent packets, oldest first.
    pub recent_packets: Vec<Packet>,
}

/// Connection bookkeeping and packet construction.
///
/// The engine checks the documented precondition of each transition and
/// rejects violations with a [`ProtocolError`]; it never reorders or repairs
/// out-of-order calls.
#[derive(Debug)]
pub struct ProtocolEngine {
    config: EngineConfig,
    factory: PacketFactory,
    registry: ConnectionRegistry,
}

impl Default for ProtocolEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolEngine {
    /// Create an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let factory = PacketFactory::new(
            SequenceAllocator::with_base(config.sequence_base),
            PacketHistory::new(config.history_capacity),
        );
        Self {
            config,
            factory,
            registry: ConnectionRegistry::new(),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Handshake
    // -------------------------------------------------------------------------

    /// SYN, participant → router. Any prior record is overwritten.
    pub fn initiate_handshake(&self, participant: &ParticipantId, endpoint: &EndpointId) -> Packet {
        let payload = json!({ "agentType": endpoint, "handshake": "initiated" });
        self.open(participant, endpoint, payload)
    }

    /// SYN-ACK, endpoint → router, acknowledging `syn_sequence`.
    ///
    /// Requires `SYN_SENT`.
    pub fn complete_handshake(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
        syn_sequence: u64,
    ) -> ProtocolResult<Packet> {
        self.transition(
            participant,
            endpoint,
            ConnectionState::SynSent,
            Some(ConnectionState::SynAckSent),
            Address::from(endpoint),
            PacketType::SynAck,
            json!({ "ack": syn_sequence.wrapping_add(1), "handshake": "acknowledged" }),
        )
    }

    /// ACK, participant → router, acknowledging `syn_ack_sequence`.
    ///
    /// Requires `SYN_ACK_SENT`; the connection becomes `ESTABLISHED`.
    pub fn finalize_handshake(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
        syn_ack_sequence: u64,
    ) -> ProtocolResult<Packet> {
        self.transition(
            participant,
            endpoint,
            ConnectionState::SynAckSent,
            Some(ConnectionState::Established),
            Address::from(participant),
            PacketType::Ack,
            json!({ "ack": syn_ack_sequence.wrapping_add(1), "handshake": "completed" }),
        )
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// FIN, participant → router. Requires `ESTABLISHED`.
    pub fn initiate_disconnection(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
    ) -> ProtocolResult<Packet> {
        self.transition(
            participant,
            endpoint,
            ConnectionState::Established,
            Some(ConnectionState::FinSent),
            Address::from(participant),
            PacketType::Fin,
            json!({ "agentType": endpoint, "disconnect": "initiated" }),
        )
    }

    /// FIN-ACK, endpoint → router, acknowledging `fin_sequence`.
    ///
    /// Requires `FIN_SENT`.
    pub fn acknowledge_disconnection(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
        fin_sequence: u64,
    ) -> ProtocolResult<Packet> {
        self.transition(
            participant,
            endpoint,
            ConnectionState::FinSent,
            Some(ConnectionState::FinAckSent),
            Address::from(endpoint),
            PacketType::FinAck,
            json!({ "ack": fin_sequence.wrapping_add(1), "disconnect": "acknowledged" }),
        )
    }

    /// ACK, participant → router, acknowledging `fin_ack_sequence`.
    ///
    /// Requires `FIN_ACK_SENT`; the record is deleted.
    pub fn complete_disconnection(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
        fin_ack_sequence: u64,
    ) -> ProtocolResult<Packet> {
        self.transition(
            participant,
            endpoint,
            ConnectionState::FinAckSent,
            None,
            Address::from(participant),
            PacketType::Ack,
            json!({ "ack": fin_ack_sequence.wrapping_add(1), "disconnect": "completed" }),
        )
    }

    // -------------------------------------------------------------------------
    // Reconnection
    // -------------------------------------------------------------------------

    /// SYN, participant → router, for a pair that was connected before.
    /// Any prior record is overwritten.
    pub fn initiate_reconnection(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
    ) -> Packet {
        let payload = json!({ "agentType": endpoint, "reconnect": "initiated" });
        self.open(participant, endpoint, payload)
    }

    // -------------------------------------------------------------------------
    // Relay and data packets
    // -------------------------------------------------------------------------

    /// Build a packet that does not change any connection state: router
    /// hops and DATA packets.
    pub fn relay(
        &self,
        from: Address,
        to: Address,
        packet_type: PacketType,
        payload: Value,
    ) -> Packet {
        self.factory.create(from, to, packet_type, payload)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Whether the pair may exchange DATA: true iff its record is
    /// `ESTABLISHED`.
    pub fn can_send_data(&self, participant: &ParticipantId, endpoint: &EndpointId) -> bool {
        self.connection_state(participant, endpoint) == Some(ConnectionState::Established)
    }

    /// State of the pair's record, `None` if there is no connection.
    pub fn connection_state(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
    ) -> Option<ConnectionState> {
        self.registry
            .state(&ConnectionKey::new(participant.clone(), endpoint.clone()))
    }

    /// Every record of `participant`, keyed by endpoint.
    pub fn connection_status(
        &self,
        participant: &ParticipantId,
    ) -> BTreeMap<EndpointId, ConnectionStatus> {
        self.connection_status_at(participant, Instant::now())
    }

    /// [`connection_status`](Self::connection_status) evaluated at `now`.
    pub fn connection_status_at(
        &self,
        participant: &ParticipantId,
        now: Instant,
    ) -> BTreeMap<EndpointId, ConnectionStatus> {
        self.registry
            .for_participant(participant)
            .into_iter()
            .map(|(endpoint, conn)| {
                let idle = conn.idle_at(now);
                let status = ConnectionStatus {
                    state: conn.state,
                    endpoint: conn.endpoint,
                    last_sequence: conn.last_sequence,
                    idle_ms: idle.as_millis() as u64,
                    is_active: idle < self.config.liveness_window,
                };
                (endpoint, status)
            })
            .collect()
    }

    /// Endpoints where `participant` has an `ESTABLISHED` connection.
    pub fn established_endpoints(&self, participant: &ParticipantId) -> Vec<EndpointId> {
        self.registry
            .for_participant(participant)
            .into_iter()
            .filter(|(_, conn)| conn.state == ConnectionState::Established)
            .map(|(endpoint, _)| endpoint)
            .collect()
    }

    /// Reporting snapshot.
    pub fn stats(&self) -> ProtocolStats {
        ProtocolStats {
            total_connections: self.registry.len(),
            established: self.registry.count_in(ConnectionState::Established),
            congestion_window: self.config.congestion_window,
            max_window: self.config.max_window,
            recent_packets: self.factory.history().recent(),
        }
    }

    /// Most recent packets, oldest first.
    pub fn recent_packets(&self) -> Vec<Packet> {
        self.factory.history().recent()
    }

    /// The connection registry (read access).
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// The sequence allocator (read access).
    pub fn sequences(&self) -> &SequenceAllocator {
        self.factory.sequences()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn open(&self, participant: &ParticipantId, endpoint: &EndpointId, payload: Value) -> Packet {
        let key = ConnectionKey::new(participant.clone(), endpoint.clone());
        let opened: Result<Packet, Infallible> = self.registry.apply(&key, |_| {
            Ok(self.stamp(
                endpoint,
                Some(ConnectionState::SynSent),
                Address::from(participant),
                PacketType::Syn,
                payload,
            ))
        });
        match opened {
            Ok(packet) => packet,
            Err(never) => match never {},
        }
    }

    /// Check `expected`, build the packet, and write the record as one
    /// registry step.
    #[allow(clippy::too_many_arguments)]
    fn transition(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
        expected: ConnectionState,
        next: Option<ConnectionState>,
        source: Address,
        packet_type: PacketType,
        payload: Value,
    ) -> ProtocolResult<Packet> {
        let key = ConnectionKey::new(participant.clone(), endpoint.clone());
        self.registry.apply(&key, |current| match current {
            None => Err(ProtocolError::UnknownConnection { key: key.clone() }),
            Some(conn) if conn.state != expected => Err(ProtocolError::PreconditionViolation {
                key: key.clone(),
                expected,
                found: conn.state,
            }),
            Some(_) => Ok(self.stamp(endpoint, next, source, packet_type, payload)),
        })
    }

    fn stamp(
        &self,
        endpoint: &EndpointId,
        next: Option<ConnectionState>,
        source: Address,
        packet_type: PacketType,
        payload: Value,
    ) -> (RecordUpdate, Packet) {
        let packet = self
            .factory
            .create(source, Address::Router, packet_type, payload);
        let update = match next {
            Some(state) => RecordUpdate::Set(Connection {
                state,
                last_sequence: packet.sequence(),
                last_activity: Instant::now(),
                endpoint: endpoint.clone(),
            }),
            None => RecordUpdate::Remove,
        };
        (update, packet)
    }
}
