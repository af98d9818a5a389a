//! On-chain trade state as mirrored by the coordinator.

use serde::{Deserialize, Serialize};

use crate::{Asset, TokenType};

/// One asset entry in the ledger's trade-creation call. `recipient` is
/// always the counterparty of the depositor — assets flow across on
/// settlement, never back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeAssetSpec {
    pub token: String,
    pub token_id: String,
    pub amount: u64,
    pub asset_type: TokenType,
    pub recipient: String,
}

impl TradeAssetSpec {
    pub fn from_asset(asset: &Asset, recipient: &str) -> Self {
        Self {
            token: asset.collection_contract.clone(),
            token_id: asset.token_id.clone(),
            amount: asset.amount,
            asset_type: asset.token_type,
            recipient: recipient.to_string(),
        }
    }
}

/// Per-asset escrow state within a trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeAsset {
    #[serde(flatten)]
    pub spec: TradeAssetSpec,
    pub is_deposited: bool,
}

impl TradeAsset {
    pub fn pending(spec: TradeAssetSpec) -> Self {
        Self {
            spec,
            is_deposited: false,
        }
    }
}

/// Read-only mirror of an on-chain trade. Populated from confirmed events
/// (or a `get_trade_assets` resync), never from optimistic local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowTrade {
    pub trade_id: u64,
    pub chain_id: u64,
    pub participants: [String; 2],
    /// Asset lists keyed by participant index.
    pub assets: [Vec<TradeAsset>; 2],
    pub is_active: bool,
}

impl EscrowTrade {
    pub fn participant_index(&self, wallet: &str) -> Option<usize> {
        self.participants
            .iter()
            .position(|p| p.eq_ignore_ascii_case(wallet))
    }

    pub fn deposited_count(&self) -> usize {
        self.assets
            .iter()
            .flat_map(|side| side.iter())
            .filter(|a| a.is_deposited)
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.assets.iter().map(Vec::len).sum()
    }

    pub fn fully_deposited(&self) -> bool {
        self.deposited_count() == self.total_count()
    }
}
