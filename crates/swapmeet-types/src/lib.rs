//! Shared domain types for the Swapmeet swap coordinator.
//! Zero service dependency — usable by the coordinator, tools, and tests.

mod asset;
mod error;
mod event;
mod offer;
mod trade;

pub use asset::{is_valid_address, Actor, Asset, AssetKey, TokenType};
pub use error::SwapError;
pub use event::{ChainEvent, Notification, NotificationKind};
pub use offer::{Offer, OfferPhase, OfferStatus};
pub use trade::{EscrowTrade, TradeAsset, TradeAssetSpec};
