//! THK Protocol - Protocol Layer
//!
//! Bookkeeping and packet construction for the connection state machine:
//!
//! - **Sequencing**: [`SequenceAllocator`], per-source monotonic counters
//! - **Integrity**: [`checksum`], order-sensitive 16-bit accumulation
//! - **Packets**: [`PacketFactory`] and the bounded [`PacketHistory`]
//! - **Connections**: [`ConnectionRegistry`] keyed by (participant, endpoint)
//! - **Engine**: [`ProtocolEngine`], handshake/teardown/reconnection transitions
//!
//! # State machine
//!
//! ```text
//!   (none) ──SYN──▶ SYN_SENT ──SYN-ACK──▶ SYN_ACK_SENT ──ACK──▶ ESTABLISHED
//!                                                                   │
//!   (none) ◀──ACK── FIN_ACK_SENT ◀──FIN-ACK── FIN_SENT ◀────FIN─────┘
//! ```
//!
//! The engine checks each transition's documented precondition and rejects
//! violations without touching the record. It does not reorder or repair
//! calls; sequencing the steps is the caller's job.

mod checksum;
mod connection;
mod engine;
mod error;
mod packet;
mod sequence;

pub use checksum::{checksum, packet_checksum};
pub use connection::*;
pub use engine::*;
pub use error::*;
pub use packet::*;
pub use sequence::*;
