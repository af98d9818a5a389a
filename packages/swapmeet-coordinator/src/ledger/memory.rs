//! In-memory reference ledger.
//!
//! Implements the escrow contract surface for sandbox mode and tests:
//! token ownership, operator approvals, per-trade deposit tracking with
//! auto-settlement on the last deposit, and cancellation that returns
//! deposited assets. Revert reasons match what the coordinator surfaces
//! to users, so failure paths exercise the real wiring.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use swapmeet_types::{ChainEvent, EscrowTrade, TradeAsset};

use super::{Ledger, LedgerCall, LedgerError, TxHash};

#[derive(Default)]
struct LedgerState {
    /// (token contract, token id) → owner wallet. All keys lowercase.
    tokens: HashMap<(String, String), String>,
    /// (owner, token contract) pairs with operator approval. Lowercase.
    approvals: HashSet<(String, String)>,
    trades: HashMap<u64, EscrowTrade>,
    next_trade_id: u64,
    next_tx: u64,
}

pub struct InMemoryLedger {
    chain_id: u64,
    state: Mutex<LedgerState>,
    events: broadcast::Sender<ChainEvent>,
}

impl InMemoryLedger {
    pub fn new(chain_id: u64, event_capacity: usize) -> Self {
        Self {
            chain_id,
            state: Mutex::new(LedgerState {
                next_trade_id: 1,
                ..LedgerState::default()
            }),
            events: broadcast::Sender::new(event_capacity),
        }
    }

    /// Seed a token into existence. Sandbox/test helper.
    pub fn mint(&self, token: &str, token_id: &str, owner: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .tokens
            .insert(token_key(token, token_id), owner.to_lowercase());
    }

    pub fn owner_of(&self, token: &str, token_id: &str) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.tokens.get(&token_key(token, token_id)).cloned()
    }

    fn check(state: &LedgerState, call: &LedgerCall) -> Result<(), LedgerError> {
        match call {
            LedgerCall::CreateTrade {
                participants,
                assets,
            } => {
                if participants[0].eq_ignore_ascii_case(&participants[1]) {
                    return Err(LedgerError::Reverted("participants must be distinct".into()));
                }
                if assets.iter().any(Vec::is_empty) {
                    return Err(LedgerError::Reverted("empty asset list".into()));
                }
                for (i, side) in assets.iter().enumerate() {
                    let counterparty = &participants[1 - i];
                    if side
                        .iter()
                        .any(|s| !s.recipient.eq_ignore_ascii_case(counterparty))
                    {
                        return Err(LedgerError::Reverted(
                            "recipient must be the counterparty".into(),
                        ));
                    }
                }
                Ok(())
            }
            LedgerCall::DepositAsset {
                trade_id,
                depositor,
                token,
                token_id,
                ..
            } => {
                let trade = state
                    .trades
                    .get(trade_id)
                    .ok_or_else(|| LedgerError::Reverted("unknown trade".into()))?;
                if !trade.is_active {
                    return Err(LedgerError::Reverted("trade not active".into()));
                }
                let pi = trade
                    .participant_index(depositor)
                    .ok_or_else(|| LedgerError::Reverted("not a participant".into()))?;
                let asset = trade.assets[pi]
                    .iter()
                    .find(|a| {
                        a.spec.token.eq_ignore_ascii_case(token) && a.spec.token_id == *token_id
                    })
                    .ok_or_else(|| LedgerError::Reverted("asset not in trade".into()))?;
                if asset.is_deposited {
                    return Err(LedgerError::Reverted("already deposited".into()));
                }
                if !state
                    .approvals
                    .contains(&(depositor.to_lowercase(), token.to_lowercase()))
                {
                    return Err(LedgerError::Reverted("not approved".into()));
                }
                match state.tokens.get(&token_key(token, token_id)) {
                    Some(owner) if owner.eq_ignore_ascii_case(depositor) => Ok(()),
                    _ => Err(LedgerError::Reverted("depositor does not own asset".into())),
                }
            }
            LedgerCall::SetApprovalForAll { .. } => Ok(()),
            LedgerCall::CancelTrade { trade_id, caller } => {
                let trade = state
                    .trades
                    .get(trade_id)
                    .ok_or_else(|| LedgerError::Reverted("unknown trade".into()))?;
                if !trade.is_active {
                    return Err(LedgerError::Reverted("trade not active".into()));
                }
                if trade.participant_index(caller).is_none() {
                    return Err(LedgerError::Reverted("not a participant".into()));
                }
                Ok(())
            }
        }
    }

    fn apply(&self, state: &mut LedgerState, call: LedgerCall) -> Vec<ChainEvent> {
        match call {
            LedgerCall::CreateTrade {
                participants,
                assets,
            } => {
                let trade_id = state.next_trade_id;
                state.next_trade_id += 1;
                let trade = EscrowTrade {
                    trade_id,
                    chain_id: self.chain_id,
                    participants: participants.clone(),
                    assets: assets.map(|side| side.into_iter().map(TradeAsset::pending).collect()),
                    is_active: true,
                };
                state.trades.insert(trade_id, trade);
                vec![ChainEvent::TradeCreated {
                    chain_id: self.chain_id,
                    trade_id,
                    participants,
                }]
            }
            LedgerCall::DepositAsset {
                trade_id,
                depositor,
                token,
                token_id,
                ..
            } => {
                let mut events = Vec::new();
                // check() established the trade, participant, and asset.
                let trade = match state.trades.get_mut(&trade_id) {
                    Some(t) => t,
                    None => return events,
                };
                let Some(pi) = trade.participant_index(&depositor) else {
                    return events;
                };
                let Some(ai) = trade.assets[pi].iter().position(|a| {
                    a.spec.token.eq_ignore_ascii_case(&token) && a.spec.token_id == token_id
                }) else {
                    return events;
                };
                trade.assets[pi][ai].is_deposited = true;
                events.push(ChainEvent::AssetDeposited {
                    trade_id,
                    participant: trade.participants[pi].clone(),
                    asset_index: ai,
                });

                if trade.fully_deposited() {
                    // Settlement: every asset to its recorded recipient.
                    trade.is_active = false;
                    let transfers: Vec<((String, String), String)> = trade
                        .assets
                        .iter()
                        .flat_map(|side| side.iter())
                        .map(|a| {
                            (
                                token_key(&a.spec.token, &a.spec.token_id),
                                a.spec.recipient.to_lowercase(),
                            )
                        })
                        .collect();
                    for (key, recipient) in transfers {
                        state.tokens.insert(key, recipient);
                    }
                    events.push(ChainEvent::TradeCompleted { trade_id });
                }
                events
            }
            LedgerCall::SetApprovalForAll { owner, token } => {
                state
                    .approvals
                    .insert((owner.to_lowercase(), token.to_lowercase()));
                Vec::new()
            }
            LedgerCall::CancelTrade { trade_id, .. } => {
                if let Some(trade) = state.trades.get_mut(&trade_id) {
                    trade.is_active = false;
                    // Deposited assets return to their depositors; owners
                    // never changed pre-settlement, so clearing the flags
                    // is the whole refund.
                    for side in trade.assets.iter_mut() {
                        for asset in side.iter_mut() {
                            asset.is_deposited = false;
                        }
                    }
                }
                vec![ChainEvent::TradeCancelled { trade_id }]
            }
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn simulate(&self, call: &LedgerCall) -> Result<(), LedgerError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::check(&state, call)
    }

    async fn submit(&self, call: LedgerCall) -> Result<TxHash, LedgerError> {
        let events = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            Self::check(&state, &call)?;
            debug!(call = call.name(), "Ledger call accepted");
            self.apply(&mut state, call)
        };
        for event in events {
            // No subscribers is fine; the watcher may not be running.
            let _ = self.events.send(event);
        }
        let tx = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.next_tx += 1;
            format!("0x{:064x}", state.next_tx)
        };
        Ok(tx)
    }

    async fn get_trade_assets(&self, trade_id: u64) -> Result<EscrowTrade, LedgerError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .trades
            .get(&trade_id)
            .cloned()
            .ok_or_else(|| LedgerError::Reverted("unknown trade".into()))
    }

    async fn is_approved_for_all(&self, owner: &str, token: &str) -> Result<bool, LedgerError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .approvals
            .contains(&(owner.to_lowercase(), token.to_lowercase())))
    }

    fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }
}

fn token_key(token: &str, token_id: &str) -> (String, String) {
    (token.to_lowercase(), token_id.to_string())
}
