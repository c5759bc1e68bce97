//! THK Hub
//!
//! Serves the protocol over HTTP and logs every packet hop.
//!
//! Environment variables:
//! - THK_BIND_ADDR: listen address (default 0.0.0.0:5000)
//! - THK_RESPONSE_TIMEOUT_MS: bound on reply generation (default 15000)
//! - THK_HOP_DELAY_MS: handshake/teardown hop delay (default 300)
//! - THK_DATA_HOP_DELAY_MS: data hop delay (default 400)
//! - RUST_LOG: log filter

mod api;
mod config;
mod events;

use thk_protocol::ThkError;
use tracing::info;

use crate::config::HubConfig;

#[tokio::main]
async fn main() -> Result<(), ThkError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = HubConfig::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        endpoints = config.orchestrator.endpoints.len(),
        "starting hub"
    );

    let hub = api::hub(config.orchestrator);
    tokio::spawn(events::log_events(hub.subscribe()));
    api::serve(config.bind_addr, hub).await
}
