//! THK Protocol - Orchestration Layer
//!
//! Drives connection lifecycles as timed, observable multi-hop exchanges.
//! Every logical step travels origin → router → destination, so each step
//! becomes two packets separated by a fixed hop delay:
//!
//! ```text
//!  participant          router           endpoint
//!      │──── SYN ──────▶│                    │
//!      │                │────── SYN ────────▶│
//!      │                │◀──── SYN-ACK ──────│
//!      │◀── SYN-ACK ────│                    │
//!      │──── ACK ──────▶│                    │
//!      │                │────── ACK ────────▶│   ESTABLISHED
//! ```
//!
//! Lifecycles on the same (participant, endpoint) pair never overlap; pairs
//! run concurrently with each other. A lifecycle runs to completion even if
//! its caller stops waiting. Every packet is published as an
//! [`OrchestratorEvent`] on a broadcast channel.

mod config;
mod error;
mod events;
mod lifecycle;
mod locks;

pub use config::*;
pub use error::*;
pub use events::*;
pub use lifecycle::*;
