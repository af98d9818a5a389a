//! Response types for the coordinator API.

use serde::Serialize;

/// Response for ledger-submitting endpoints. A pending response means the
/// transaction was accepted, not that it is confirmed; confirmation
/// arrives through the watcher.
#[derive(Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub status: &'static str,
    pub tx_hash: String,
}

impl SubmitResponse {
    pub fn pending(tx_hash: String) -> Self {
        Self {
            success: true,
            status: "pending",
            tx_hash,
        }
    }
}

/// Response from the health endpoint.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub chain_id: u64,
    pub uptime_secs: u64,
    pub requests: u64,
    pub open_offers: usize,
    pub active_trades: usize,
}

/// Response from the registry refresh endpoint.
#[derive(Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub assets: usize,
}
