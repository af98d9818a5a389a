//! Coordinator configuration.

use serde::Deserialize;

/// Configuration for the swap coordinator.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::bind_address")]
    pub bind_address: String,

    /// Chain the sandbox ledger reports in its events.
    #[serde(default = "defaults::chain_id")]
    pub chain_id: u64,

    /// Capacity of the ledger event broadcast channel.
    #[serde(default = "defaults::event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Per-request timeout applied by the HTTP layer.
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Notifications retained per recipient before the oldest are dropped.
    #[serde(default = "defaults::notification_cap")]
    pub notification_cap: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: defaults::bind_address(),
            chain_id: defaults::chain_id(),
            event_channel_capacity: defaults::event_channel_capacity(),
            request_timeout_secs: defaults::request_timeout_secs(),
            notification_cap: defaults::notification_cap(),
        }
    }
}

mod defaults {
    pub fn bind_address() -> String {
        "0.0.0.0:3050".into()
    }

    pub fn chain_id() -> u64 {
        std::env::var("SWAPMEET_CHAIN_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
    }

    pub fn event_channel_capacity() -> usize {
        1024
    }

    pub fn request_timeout_secs() -> u64 {
        30
    }

    pub fn notification_cap() -> usize {
        200
    }
}
