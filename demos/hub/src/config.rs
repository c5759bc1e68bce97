//! Hub configuration from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use thk_protocol::ThkError;
use thk_protocol::orchestrator::{OrchestratorBuilder, OrchestratorConfig};

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// HTTP listen address.
    pub bind_addr: SocketAddr,
    /// Orchestrator timing and endpoints.
    pub orchestrator: OrchestratorConfig,
}

impl HubConfig {
    /// Read `THK_BIND_ADDR`, `THK_RESPONSE_TIMEOUT_MS`, `THK_HOP_DELAY_MS`
    /// and `THK_DATA_HOP_DELAY_MS`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ThkError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ThkError> {
        let bind = lookup("THK_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|e| ThkError::Config(format!("THK_BIND_ADDR={bind:?}: {e}")))?;

        let mut builder = OrchestratorBuilder::new();
        if let Some(ms) = millis(&lookup, "THK_RESPONSE_TIMEOUT_MS")? {
            builder = builder.response_timeout(ms);
        }
        if let Some(ms) = millis(&lookup, "THK_HOP_DELAY_MS")? {
            builder = builder.handshake_hop_delay(ms);
        }
        if let Some(ms) = millis(&lookup, "THK_DATA_HOP_DELAY_MS")? {
            builder = builder.data_hop_delay(ms);
        }

        Ok(Self {
            bind_addr,
            orchestrator: builder.build(),
        })
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, ThkError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| ThkError::Config(format!("{key}={raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HubConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(config.orchestrator.response_timeout, Duration::from_secs(15));
        assert_eq!(config.orchestrator.handshake_hop_delay, Duration::from_millis(300));
        assert_eq!(config.orchestrator.data_hop_delay, Duration::from_millis(400));
    }

    #[test]
    fn test_overrides() {
        let config = HubConfig::from_lookup(lookup(&[
            ("THK_BIND_ADDR", "127.0.0.1:8080"),
            ("THK_RESPONSE_TIMEOUT_MS", "2000"),
            ("THK_HOP_DELAY_MS", " 10 "),
            ("THK_DATA_HOP_DELAY_MS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.orchestrator.response_timeout, Duration::from_secs(2));
        assert_eq!(config.orchestrator.handshake_hop_delay, Duration::from_millis(10));
        assert_eq!(config.orchestrator.data_hop_delay, Duration::ZERO);
    }

    #[test]
    fn test_invalid_values() {
        let err = HubConfig::from_lookup(lookup(&[("THK_BIND_ADDR", "nowhere")])).unwrap_err();
        assert!(matches!(err, ThkError::Config(msg) if msg.contains("THK_BIND_ADDR")));

        let err = HubConfig::from_lookup(lookup(&[("THK_HOP_DELAY_MS", "-5")])).unwrap_err();
        assert!(matches!(err, ThkError::Config(msg) if msg.contains("THK_HOP_DELAY_MS")));
    }
}
