//! Offer entity and its lifecycle.

use serde::{Deserialize, Serialize};

use crate::{Asset, AssetKey};

/// Lifecycle status of an offer. Terminal states: `Completed`, `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Countered,
    Accepted,
    TradeCreated,
    Depositing,
    Completed,
    Cancelled,
}

impl OfferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether the offer's bundles are committed — assets locked against
    /// appearing in any other committed offer.
    pub fn is_committed(self) -> bool {
        matches!(self, Self::Accepted | Self::TradeCreated | Self::Depositing)
    }

    pub fn is_negotiating(self) -> bool {
        matches!(self, Self::Pending | Self::Countered)
    }

    pub fn phase(self) -> OfferPhase {
        match self {
            Self::Pending | Self::Countered => OfferPhase::Negotiating,
            Self::Accepted | Self::TradeCreated => OfferPhase::AwaitingEscrow,
            Self::Depositing => OfferPhase::Depositing,
            Self::Completed => OfferPhase::Settled,
            Self::Cancelled => OfferPhase::Cancelled,
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Countered => "countered",
            Self::Accepted => "accepted",
            Self::TradeCreated => "trade_created",
            Self::Depositing => "depositing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Coarse lifecycle variant. Handlers gate operations on the phase instead
/// of matching raw statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferPhase {
    Negotiating,
    AwaitingEscrow,
    Depositing,
    Settled,
    Cancelled,
}

/// A proposed swap between two parties. `bundle_a` is what `user_a` gives
/// up, `bundle_b` what `user_b` gives up; both flow to the counterparty on
/// settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: u64,
    pub chain_id: u64,
    pub user_a: String,
    pub wallet_a: String,
    pub user_b: String,
    pub wallet_b: String,
    pub bundle_a: Vec<Asset>,
    pub bundle_b: Vec<Asset>,
    pub status: OfferStatus,
    /// Whichever side last received a proposal — the only side allowed to
    /// counter or accept.
    pub turn_holder: String,
    /// On-chain identifier, bound by the watcher once `TradeCreated` is
    /// confirmed.
    pub trade_id: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
    pub accepted_at: Option<u64>,
}

impl Offer {
    pub fn phase(&self) -> OfferPhase {
        self.status.phase()
    }

    pub fn is_party(&self, username: &str) -> bool {
        self.user_a == username || self.user_b == username
    }

    /// The other party's username, if `username` is a party at all.
    pub fn counterparty_of(&self, username: &str) -> Option<&str> {
        if self.user_a == username {
            Some(&self.user_b)
        } else if self.user_b == username {
            Some(&self.user_a)
        } else {
            None
        }
    }

    pub fn wallet_of(&self, username: &str) -> Option<&str> {
        if self.user_a == username {
            Some(&self.wallet_a)
        } else if self.user_b == username {
            Some(&self.wallet_b)
        } else {
            None
        }
    }

    /// Order-insensitive wallet pair match, used for event correlation.
    pub fn involves_wallets(&self, w1: &str, w2: &str) -> bool {
        (self.wallet_a.eq_ignore_ascii_case(w1) && self.wallet_b.eq_ignore_ascii_case(w2))
            || (self.wallet_a.eq_ignore_ascii_case(w2) && self.wallet_b.eq_ignore_ascii_case(w1))
    }

    pub fn asset_keys(&self) -> impl Iterator<Item = AssetKey> + '_ {
        self.bundle_a
            .iter()
            .chain(self.bundle_b.iter())
            .map(Asset::key)
    }

    pub fn contains_asset(&self, key: &AssetKey) -> bool {
        self.asset_keys().any(|k| &k == key)
    }
}
