//! Protocol engine error types.

use thiserror::Error;

use super::connection::ConnectionState;
use crate::core::ConnectionKey;

/// Errors from connection state transitions.
///
/// A rejected transition creates no packet, consumes no sequence number, and
/// leaves the connection record as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// No connection record exists for the pair.
    #[error("no connection for {key}")]
    UnknownConnection {
        /// The pair that was referenced.
        key: ConnectionKey,
    },

    /// The record exists but is in the wrong state for the operation.
    #[error("connection {key} is {found}, expected {expected}")]
    PreconditionViolation {
        /// The pair that was referenced.
        key: ConnectionKey,
        /// State the operation requires.
        expected: ConnectionState,
        /// State the record is actually in.
        found: ConnectionState,
    },
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
