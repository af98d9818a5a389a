//! Abstract escrow-ledger surface.
//!
//! Every state-changing call is split into a mandatory dry run
//! ([`Ledger::simulate`]) and a submission ([`Ledger::submit`]), so revert
//! reasons are available before value moves. Submissions are one attempt
//! per user action; resubmission is always a new explicit call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use swapmeet_types::{ChainEvent, EscrowTrade, SwapError, TokenType, TradeAssetSpec};

mod memory;

pub use memory::InMemoryLedger;

/// Transaction hash, as returned by the chain.
pub type TxHash = String;

/// A state-changing call against the escrow contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerCall {
    CreateTrade {
        participants: [String; 2],
        /// Asset lists keyed by participant index; every `recipient` is the
        /// other participant.
        assets: [Vec<TradeAssetSpec>; 2],
    },
    DepositAsset {
        trade_id: u64,
        depositor: String,
        token: String,
        token_id: String,
        amount: u64,
        asset_type: TokenType,
    },
    SetApprovalForAll {
        owner: String,
        token: String,
    },
    CancelTrade {
        trade_id: u64,
        caller: String,
    },
}

impl LedgerCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTrade { .. } => "create_trade",
            Self::DepositAsset { .. } => "deposit_asset",
            Self::SetApprovalForAll { .. } => "set_approval_for_all",
            Self::CancelTrade { .. } => "cancel_trade",
        }
    }
}

/// Ledger failure: a revert carries the contract's reason verbatim; a
/// transport error means the call was never evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    Reverted(String),
    Transport(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reverted(reason) => write!(f, "reverted: {reason}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<LedgerError> for crate::Error {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Reverted(reason) => crate::Error::Swap(SwapError::LedgerRejection(reason)),
            LedgerError::Transport(msg) => crate::Error::Rpc(msg),
        }
    }
}

/// The escrow contract surface the coordinator drives and reconciles
/// against. Implementations may sit on JSON-RPC, a local node, or the
/// in-memory sandbox.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Dry-run `call` without submitting, surfacing the revert reason.
    async fn simulate(&self, call: &LedgerCall) -> Result<(), LedgerError>;

    /// Submit `call`; resolves once the transaction is accepted.
    async fn submit(&self, call: LedgerCall) -> Result<TxHash, LedgerError>;

    /// Read-only trade state, used for reconciliation and recovery.
    async fn get_trade_assets(&self, trade_id: u64) -> Result<EscrowTrade, LedgerError>;

    /// Whether the escrow contract may move `owner`'s tokens on `token`.
    async fn is_approved_for_all(&self, owner: &str, token: &str) -> Result<bool, LedgerError>;

    /// Confirmed-event stream. At-least-once delivery.
    fn subscribe(&self) -> broadcast::Receiver<ChainEvent>;
}

/// The mandatory call pattern: simulate first, submit only when the dry
/// run passes.
pub async fn simulate_then_submit(
    ledger: &dyn Ledger,
    call: LedgerCall,
) -> Result<TxHash, LedgerError> {
    ledger.simulate(&call).await?;
    ledger.submit(call).await
}
