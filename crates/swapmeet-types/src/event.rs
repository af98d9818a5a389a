//! Confirmed ledger events and the notifications derived from offer
//! transitions.

use serde::{Deserialize, Serialize};

/// A confirmed event from the escrow contract's log. Delivery is
/// at-least-once; consumers must treat replays as no-ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChainEvent {
    TradeCreated {
        chain_id: u64,
        trade_id: u64,
        participants: [String; 2],
    },
    AssetDeposited {
        trade_id: u64,
        participant: String,
        asset_index: usize,
    },
    TradeCompleted {
        trade_id: u64,
    },
    TradeCancelled {
        trade_id: u64,
    },
}

impl ChainEvent {
    pub fn trade_id(&self) -> u64 {
        match self {
            Self::TradeCreated { trade_id, .. }
            | Self::AssetDeposited { trade_id, .. }
            | Self::TradeCompleted { trade_id }
            | Self::TradeCancelled { trade_id } => *trade_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TradeCreated { .. } => "trade_created",
            Self::AssetDeposited { .. } => "asset_deposited",
            Self::TradeCompleted { .. } => "trade_completed",
            Self::TradeCancelled { .. } => "trade_cancelled",
        }
    }
}

/// What happened to an offer, from the recipient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OfferReceived,
    OfferCountered,
    OfferAccepted,
    NegotiationCancelled,
    TradeCreated,
    AssetDeposited,
    TradeCompleted,
    TradeCancelled,
}

/// Side-channel output addressed to the party who did not act.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub offer_id: u64,
    /// Username of the party whose action triggered the notification.
    pub actor: String,
    pub created_at: u64,
}
