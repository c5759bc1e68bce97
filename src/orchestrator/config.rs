//! Orchestrator configuration.

use std::time::Duration;

use crate::core::{
    EndpointId, DATA_HOP_DELAY, DEFAULT_ENDPOINTS, EVENT_CHANNEL_CAPACITY, HANDSHAKE_HOP_DELAY,
    RESPONSE_TIMEOUT,
};
use crate::protocol::EngineConfig;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay between hops of a handshake or teardown.
    pub handshake_hop_delay: Duration,

    /// Delay between the two hops of a data transfer.
    pub data_hop_delay: Duration,

    /// Bound on the response generation step.
    pub response_timeout: Duration,

    /// Endpoints every participant connects to.
    pub endpoints: Vec<EndpointId>,

    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,

    /// Protocol engine configuration.
    pub engine: EngineConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            handshake_hop_delay: HANDSHAKE_HOP_DELAY,
            data_hop_delay: DATA_HOP_DELAY,
            response_timeout: RESPONSE_TIMEOUT,
            endpoints: DEFAULT_ENDPOINTS.iter().map(|e| EndpointId::from(*e)).collect(),
            event_capacity: EVENT_CHANNEL_CAPACITY,
            engine: EngineConfig::default(),
        }
    }
}

/// Builder for [`OrchestratorConfig`].
#[derive(Debug)]
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
        }
    }

    /// Set the handshake/teardown hop delay.
    pub fn handshake_hop_delay(mut self, delay: Duration) -> Self {
        self.config.handshake_hop_delay = delay;
        self
    }

    /// Set the data hop delay.
    pub fn data_hop_delay(mut self, delay: Duration) -> Self {
        self.config.data_hop_delay = delay;
        self
    }

    /// Set the response generation timeout.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Set the endpoint set.
    pub fn endpoints<I, E>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<EndpointId>,
    {
        self.config.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Set the event channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Set the engine configuration.
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OrchestratorConfig {
        self.config
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.handshake_hop_delay, Duration::from_millis(300));
        assert_eq!(config.data_hop_delay, Duration::from_millis(400));
        assert_eq!(config.response_timeout, Duration::from_secs(15));
        assert_eq!(
            config.endpoints,
            vec![
                EndpointId::from("food"),
                EndpointId::from("travel"),
                EndpointId::from("realestate")
            ]
        );
    }

    #[test]
    fn test_builder() {
        let config = OrchestratorBuilder::new()
            .handshake_hop_delay(Duration::from_millis(5))
            .data_hop_delay(Duration::from_millis(7))
            .response_timeout(Duration::from_secs(1))
            .endpoints(["a", "b"])
            .event_capacity(16)
            .build();
        assert_eq!(config.handshake_hop_delay, Duration::from_millis(5));
        assert_eq!(config.data_hop_delay, Duration::from_millis(7));
        assert_eq!(config.response_timeout, Duration::from_secs(1));
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.event_capacity, 16);
    }
}
