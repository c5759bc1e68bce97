//! Event log.

use thk_protocol::prelude::*;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Log every orchestrator event until the channel closes.
pub async fn log_events(mut rx: broadcast::Receiver<OrchestratorEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => log_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "event log fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("event log stopped");
}

fn log_event(event: &OrchestratorEvent) {
    match event {
        OrchestratorEvent::PacketAnimation(hop) => debug!(
            id = %hop.id,
            from = %hop.from,
            to = %hop.to,
            kind = ?hop.kind,
            sequence = hop.packet.sequence(),
            checksum = hop.packet.checksum(),
            "packet"
        ),
        OrchestratorEvent::Transcript(entry) => info!(
            participant = %entry.participant_id,
            endpoint = %entry.endpoint,
            message = %entry.message,
            response = %entry.response,
            "transcript"
        ),
        OrchestratorEvent::Delivery(delivery) => info!(
            participant = %delivery.participant_id,
            endpoint = %delivery.endpoint,
            fallback = delivery.fallback,
            "delivered"
        ),
        OrchestratorEvent::Lifecycle(notice) => info!(
            participant = %notice.participant_id,
            name = %notice.name,
            "{}",
            notice.kind
        ),
    }
}
