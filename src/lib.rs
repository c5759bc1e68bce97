//! # THK Protocol
//!
//! A simulated, TCP-flavoured transport protocol between participants and
//! named endpoints, where every packet hops through a central router.
//!
//! The crate models the connection state machine (SYN / SYN-ACK / ACK
//! handshake, FIN / FIN-ACK / ACK teardown), allocates per-source sequence
//! numbers, checksums packets, and drives whole lifecycles as timed,
//! observable exchanges. It moves no real network traffic: packets are
//! values, and their hops are published as events for a visualizer.
//!
//! ## Feature Flags
//!
//! - `protocol` (default): sequencing, checksums, packets, connection registry, engine
//! - `orchestrator` (default): timed lifecycles over `tokio`, outbound events
//! - `agents` (default): keyword router, canned responder, participant registry
//!
//! ## Modules
//!
//! - [`core`]: identifiers, constants, errors, and collaborator traits (always included)
//! - [`protocol`]: the protocol engine (requires `protocol` feature)
//! - [`orchestrator`]: lifecycle orchestration (requires `orchestrator` feature)
//! - [`agents`]: default collaborators (requires `agents` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use thk_protocol::prelude::*;
//!
//! let engine = ProtocolEngine::new();
//! let alice = ParticipantId::from("alice");
//! let travel = EndpointId::from("travel");
//!
//! let syn = engine.initiate_handshake(&alice, &travel);
//! let syn_ack = engine.complete_handshake(&alice, &travel, syn.sequence())?;
//! engine.finalize_handshake(&alice, &travel, syn_ack.sequence())?;
//!
//! assert!(engine.can_send_data(&alice, &travel));
//! assert!(syn.verify());
//! # Ok::<(), ProtocolError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Protocol engine (feature-gated)
#[cfg(feature = "protocol")]
#[cfg_attr(docsrs, doc(cfg(feature = "protocol")))]
pub mod protocol;

// Orchestration (feature-gated)
#[cfg(feature = "orchestrator")]
#[cfg_attr(docsrs, doc(cfg(feature = "orchestrator")))]
pub mod orchestrator;

// Default collaborators (feature-gated)
#[cfg(feature = "agents")]
#[cfg_attr(docsrs, doc(cfg(feature = "agents")))]
pub mod agents;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    #[cfg(feature = "protocol")]
    pub use crate::protocol::*;

    #[cfg(feature = "orchestrator")]
    pub use crate::orchestrator::*;

    #[cfg(feature = "agents")]
    pub use crate::agents::*;
}

// Re-export commonly used items at crate root
pub use crate::core::{Address, EndpointId, ParticipantId, ThkError};

#[cfg(feature = "protocol")]
pub use crate::protocol::{Packet, PacketType, ProtocolEngine};

#[cfg(feature = "orchestrator")]
pub use crate::orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig};
