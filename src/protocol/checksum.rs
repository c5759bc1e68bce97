//! Packet checksum.
//!
//! Each UTF-16 code unit of the input contributes `unit * (index + 1)`; the
//! sum is reduced modulo 65536. Position weighting makes the value
//! order-sensitive, and the 16-bit range is what status surfaces display.

use serde_json::Value;

use super::packet::PacketType;
use crate::core::{Address, CHECKSUM_MODULUS};

/// Checksum of an arbitrary string.
pub fn checksum(data: &str) -> u16 {
    let modulus = u64::from(CHECKSUM_MODULUS);
    let sum = data
        .encode_utf16()
        .enumerate()
        .fold(0u64, |acc, (index, unit)| {
            (acc + u64::from(unit) * (index as u64 + 1)) % modulus
        });
    sum as u16
}

/// Checksum over a packet's logical content.
///
/// The input is `source-destination-TYPE-payload` with the payload rendered
/// as compact JSON.
pub fn packet_checksum(
    source: &Address,
    destination: &Address,
    packet_type: PacketType,
    payload: &Value,
) -> u16 {
    checksum(&format!("{source}-{destination}-{packet_type}-{payload}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_known_values() {
        assert_eq!(checksum(""), 0);
        assert_eq!(checksum("a"), 97);
        // 97 * 1 + 98 * 2
        assert_eq!(checksum("ab"), 293);
        assert_eq!(checksum("ba"), 98 + 97 * 2);
    }

    #[test]
    fn test_checksum_stays_in_range() {
        let long = "z".repeat(10_000);
        let value = checksum(&long);
        // sum of 122 * k for k in 1..=10000, reduced
        let expected = (122u64 * 10_000 * 10_001 / 2) % 65536;
        assert_eq!(u64::from(value), expected);
    }

    #[test]
    fn test_checksum_counts_utf16_units() {
        // U+1F600 is a surrogate pair: 0xD83D, 0xDE00
        let expected = (0xD83Du64 + 0xDE00 * 2) % 65536;
        assert_eq!(u64::from(checksum("\u{1F600}")), expected);
    }

    #[test]
    fn test_packet_checksum_renders_payload_as_json() {
        let source = Address::Participant("alice".into());
        let payload = json!("hi");
        let direct = checksum("alice-router-SYN-\"hi\"");
        assert_eq!(
            packet_checksum(&source, &Address::Router, PacketType::Syn, &payload),
            direct
        );
    }

    #[test]
    fn test_packet_checksum_is_deterministic_and_field_sensitive() {
        let alice = Address::Participant("alice".into());
        let travel = Address::Endpoint("travel".into());
        let payload = json!({"agentType": "travel", "handshake": "initiated"});

        let a = packet_checksum(&alice, &Address::Router, PacketType::Syn, &payload);
        let b = packet_checksum(&alice, &Address::Router, PacketType::Syn, &payload);
        assert_eq!(a, b);

        assert_ne!(a, packet_checksum(&travel, &Address::Router, PacketType::Syn, &payload));
        assert_ne!(a, packet_checksum(&alice, &Address::Router, PacketType::Fin, &payload));
        assert_ne!(
            a,
            packet_checksum(&alice, &Address::Router, PacketType::Syn, &json!("other"))
        );
    }
}
