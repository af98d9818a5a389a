//! Typed error handling for swap coordination.
//!
//! Negotiation errors stay off-chain and are surfaced to the acting party;
//! ledger rejections preserve the raw revert reason verbatim so users can
//! self-correct. Nothing here is ever retried automatically.

use serde::{Deserialize, Serialize};

use crate::AssetKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SwapError {
    /// Malformed input from the caller; no state was mutated.
    Validation(String),
    /// Action attempted against a stale status or the wrong turn holder.
    InvalidState(String),
    /// Bundle-exclusivity violation detected at accept/initiate time.
    AssetConflict {
        message: String,
        /// The offer already holding the asset, when known.
        conflicting_offer: Option<u64>,
    },
    /// Requested entity does not exist.
    NotFound(String),
    /// Caller is not a party to the offer or trade.
    Unauthorized(String),
    /// Simulation or submission reverted; carries the raw revert reason.
    LedgerRejection(String),
}

impl std::fmt::Display for SwapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Invalid input: {msg}"),
            Self::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
            Self::AssetConflict { message, .. } => write!(f, "Asset conflict: {message}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::LedgerRejection(reason) => write!(f, "Ledger rejected: {reason}"),
        }
    }
}

impl std::error::Error for SwapError {}

// ── Factory helpers for common errors ────────────────────────────────────────

impl SwapError {
    pub fn offer_not_found(id: u64) -> Self {
        Self::NotFound(format!("Offer {id} not found"))
    }

    pub fn trade_not_found(id: u64) -> Self {
        Self::NotFound(format!("Trade {id} not found"))
    }

    pub fn empty_bundle(side: &str) -> Self {
        Self::Validation(format!("Bundle for {side} must not be empty"))
    }

    pub fn not_owner(asset: &AssetKey, wallet: &str) -> Self {
        Self::Validation(format!("Asset {asset} is not owned by {wallet}"))
    }

    pub fn not_turn_holder(username: &str) -> Self {
        Self::InvalidState(format!("It is not {username}'s turn to act"))
    }

    pub fn asset_locked(asset: &AssetKey, offer_id: u64) -> Self {
        Self::AssetConflict {
            message: format!("Asset {asset} is committed to offer {offer_id}"),
            conflicting_offer: Some(offer_id),
        }
    }

    pub fn not_a_party(username: &str, offer_id: u64) -> Self {
        Self::Unauthorized(format!("{username} is not a party to offer {offer_id}"))
    }
}
