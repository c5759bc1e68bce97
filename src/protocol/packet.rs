//! Packet records, construction, and the bounded packet history.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::checksum::packet_checksum;
use super::sequence::SequenceAllocator;
use crate::core::{Address, PACKET_HISTORY_CAPACITY};

/// Packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PacketType {
    /// Handshake initiation.
    #[serde(rename = "SYN")]
    Syn,
    /// Handshake acknowledgment.
    #[serde(rename = "SYN-ACK")]
    SynAck,
    /// Final acknowledgment of a handshake or teardown.
    #[serde(rename = "ACK")]
    Ack,
    /// Teardown initiation.
    #[serde(rename = "FIN")]
    Fin,
    /// Teardown acknowledgment.
    #[serde(rename = "FIN-ACK")]
    FinAck,
    /// Application data.
    #[serde(rename = "DATA")]
    Data,
}

impl PacketType {
    /// Wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketType::Syn => "SYN",
            PacketType::SynAck => "SYN-ACK",
            PacketType::Ack => "ACK",
            PacketType::Fin => "FIN",
            PacketType::FinAck => "FIN-ACK",
            PacketType::Data => "DATA",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable packet.
///
/// Built only by [`PacketFactory`]; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    source: Address,
    destination: Address,
    #[serde(rename = "type")]
    packet_type: PacketType,
    payload: Value,
    sequence: u64,
    #[serde(rename = "timestamp")]
    created_at: u64,
    checksum: u16,
}

impl Packet {
    /// Sending party.
    pub fn source(&self) -> &Address {
        &self.source
    }

    /// Receiving party.
    pub fn destination(&self) -> &Address {
        &self.destination
    }

    /// Packet type.
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// Payload (structured or text).
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Sequence number, unique per source.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Creation time in milliseconds since the Unix epoch.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Checksum over source, destination, type, and payload.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Recompute the checksum and compare.
    pub fn verify(&self) -> bool {
        packet_checksum(
            &self.source,
            &self.destination,
            self.packet_type,
            &self.payload,
        ) == self.checksum
    }
}

/// The most recent packets, oldest evicted first.
#[derive(Debug)]
pub struct PacketHistory {
    capacity: usize,
    entries: Mutex<VecDeque<Packet>>,
}

impl Default for PacketHistory {
    fn default() -> Self {
        Self::new(PACKET_HISTORY_CAPACITY)
    }
}

impl PacketHistory {
    /// Create a history keeping at most `capacity` packets.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a packet, evicting the oldest past capacity.
    pub fn push(&self, packet: Packet) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(packet);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Retained packets, oldest first.
    pub fn recent(&self) -> Vec<Packet> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Number of retained packets.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been retained yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds packets: numbers, checksums, and records them.
#[derive(Debug, Default)]
pub struct PacketFactory {
    sequences: SequenceAllocator,
    history: PacketHistory,
}

impl PacketFactory {
    /// Create a factory from its parts.
    pub fn new(sequences: SequenceAllocator, history: PacketHistory) -> Self {
        Self { sequences, history }
    }

    /// Build a packet and append it to the history.
    pub fn create(
        &self,
        source: Address,
        destination: Address,
        packet_type: PacketType,
        payload: Value,
    ) -> Packet {
        let sequence = self.sequences.next(&source);
        let checksum = packet_checksum(&source, &destination, packet_type, &payload);
        let packet = Packet {
            source,
            destination,
            packet_type,
            payload,
            sequence,
            created_at: now_millis(),
            checksum,
        };

        debug!(
            source = %packet.source,
            destination = %packet.destination,
            packet_type = %packet.packet_type,
            sequence,
            "packet created"
        );

        self.history.push(packet.clone());
        packet
    }

    /// Sequence allocator backing this factory.
    pub fn sequences(&self) -> &SequenceAllocator {
        &self.sequences
    }

    /// Packet history.
    pub fn history(&self) -> &PacketHistory {
        &self.history
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SEQUENCE_BASE;
    use serde_json::json;

    fn alice() -> Address {
        Address::Participant("alice".into())
    }

    #[test]
    fn test_create_fills_every_field() {
        let factory = PacketFactory::default();
        let packet = factory.create(alice(), Address::Router, PacketType::Data, json!("hello"));

        assert_eq!(packet.source(), &alice());
        assert_eq!(packet.destination(), &Address::Router);
        assert_eq!(packet.packet_type(), PacketType::Data);
        assert_eq!(packet.payload(), &json!("hello"));
        assert_eq!(packet.sequence(), SEQUENCE_BASE);
        assert!(packet.created_at() > 0);
        assert!(packet.verify());
    }

    #[test]
    fn test_create_records_history() {
        let factory = PacketFactory::default();
        assert!(factory.history().is_empty());
        factory.create(alice(), Address::Router, PacketType::Syn, json!(null));
        factory.create(Address::Router, alice(), PacketType::SynAck, json!(null));
        assert_eq!(factory.history().len(), 2);
        assert_eq!(factory.history().recent()[1].packet_type(), PacketType::SynAck);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let factory = PacketFactory::new(SequenceAllocator::new(), PacketHistory::new(3));
        for i in 0..5 {
            factory.create(alice(), Address::Router, PacketType::Data, json!(i));
        }
        let recent = factory.history().recent();
        assert_eq!(recent.len(), 3);
        let payloads: Vec<_> = recent.iter().map(|p| p.payload().clone()).collect();
        assert_eq!(payloads, vec![json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn test_packet_serialization_shape() {
        let factory = PacketFactory::default();
        let packet = factory.create(
            alice(),
            Address::Router,
            PacketType::SynAck,
            json!({"ack": 1001, "handshake": "acknowledged"}),
        );
        let value = serde_json::to_value(&packet).unwrap();
        assert_eq!(value["source"], "alice");
        assert_eq!(value["destination"], "router");
        assert_eq!(value["type"], "SYN-ACK");
        assert_eq!(value["payload"]["ack"], 1001);
        assert_eq!(value["sequence"], SEQUENCE_BASE);
        assert_eq!(value["checksum"], packet.checksum());
    }

    #[test]
    fn test_tampered_packet_fails_verify() {
        let factory = PacketFactory::default();
        let mut packet = factory.create(alice(), Address::Router, PacketType::Data, json!("a"));
        packet.payload = json!("b");
        assert!(!packet.verify());
    }
}
