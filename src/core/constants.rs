//! Protocol constants.
//!
//! Defaults for the engine and the orchestrator. Every value here can be
//! overridden through `EngineConfig` / `OrchestratorConfig`.

use std::time::Duration;

// =============================================================================
// IDENTIFICATION
// =============================================================================

/// Protocol name reported by status surfaces.
pub const PROTOCOL_NAME: &str = "THK";

/// Protocol version reported by status surfaces.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Address label of the intermediate hop every packet passes through.
pub const ROUTER_ADDRESS: &str = "router";

/// Endpoints known to a default deployment.
pub const DEFAULT_ENDPOINTS: [&str; 3] = ["food", "travel", "realestate"];

// =============================================================================
// SEQUENCING AND PACKETS
// =============================================================================

/// First sequence number handed out for a previously unseen source.
pub const SEQUENCE_BASE: u64 = 1000;

/// Number of most recent packets kept for introspection.
pub const PACKET_HISTORY_CAPACITY: usize = 20;

/// Checksums are reduced into this range.
pub const CHECKSUM_MODULUS: u32 = 65536;

// =============================================================================
// CONNECTION BOOKKEEPING
// =============================================================================

/// A connection is reported active if it saw activity within this window.
pub const LIVENESS_WINDOW: Duration = Duration::from_secs(30);

/// Reported congestion window. Not enforced.
pub const INITIAL_CONGESTION_WINDOW: u32 = 1;

/// Upper bound of the reported congestion window.
pub const MAX_CONGESTION_WINDOW: u32 = 10;

// =============================================================================
// TIMING - ORCHESTRATION
// =============================================================================

/// Delay between consecutive hops of a handshake or teardown.
pub const HANDSHAKE_HOP_DELAY: Duration = Duration::from_millis(300);

/// Delay between the two hops of a data transfer.
pub const DATA_HOP_DELAY: Duration = Duration::from_millis(400);

/// Upper bound on the external response generation step.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// Capacity of the outbound event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
