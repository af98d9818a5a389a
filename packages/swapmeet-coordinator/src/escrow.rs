//! Escrow coordinator: bridges an accepted offer into on-chain escrow and
//! drives approvals, deposits, and cancellation.
//!
//! Submitting never advances offer status — a submitted transaction can
//! still revert or be dropped, so only the watcher, acting on confirmed
//! events, moves the offer forward. Deposits are value-bearing: one
//! attempt per user action, revert reasons surfaced verbatim, no
//! automatic resubmission.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use swapmeet_types::{Actor, Asset, EscrowTrade, Offer, OfferStatus, SwapError, TradeAssetSpec};

use crate::ledger::{simulate_then_submit, Ledger, LedgerCall, LedgerError, TxHash};
use crate::metrics::METRICS;
use crate::store::OfferStore;

pub struct EscrowCoordinator {
    store: Arc<OfferStore>,
    ledger: Arc<dyn Ledger>,
}

impl EscrowCoordinator {
    pub fn new(store: Arc<OfferStore>, ledger: Arc<dyn Ledger>) -> Self {
        Self { store, ledger }
    }

    /// Submit the trade-creation call for an accepted offer. Each asset's
    /// recipient is the *other* party; on settlement assets flow across,
    /// never back.
    pub async fn initiate_trade(&self, offer_id: u64, actor: &Actor) -> Result<TxHash, crate::Error> {
        let offer = self.party_offer(offer_id, actor)?;
        match offer.status {
            OfferStatus::Accepted => {}
            s if s.is_negotiating() => {
                return Err(SwapError::InvalidState(format!(
                    "Offer {offer_id} has not been accepted"
                ))
                .into());
            }
            s => {
                return Err(SwapError::InvalidState(format!(
                    "Offer {offer_id} is already {s}"
                ))
                .into());
            }
        }

        // Time has passed since acceptance; the assets may have been
        // committed elsewhere in the meantime.
        let keys: Vec<_> = offer.asset_keys().collect();
        if let Some((key, holder)) = self.store.scan_committed_conflict(&keys, Some(offer_id)) {
            return Err(SwapError::asset_locked(&key, holder).into());
        }

        let call = LedgerCall::CreateTrade {
            participants: [offer.wallet_a.clone(), offer.wallet_b.clone()],
            assets: [
                offer
                    .bundle_a
                    .iter()
                    .map(|a| TradeAssetSpec::from_asset(a, &offer.wallet_b))
                    .collect(),
                offer
                    .bundle_b
                    .iter()
                    .map(|a| TradeAssetSpec::from_asset(a, &offer.wallet_a))
                    .collect(),
            ],
        };
        let tx = self.call_ledger(call).await?;
        METRICS.trades_initiated.fetch_add(1, Ordering::Relaxed);
        info!(offer_id, tx_hash = %tx, "Trade creation submitted");
        Ok(tx)
    }

    /// Deposit one asset of the caller's bundle into the bound trade.
    /// Ensures operator approval first, submitting an approval call and
    /// awaiting its confirmation when absent.
    pub async fn deposit_asset(
        &self,
        trade_id: u64,
        actor: &Actor,
        asset: &Asset,
    ) -> Result<TxHash, crate::Error> {
        let offer = self.bound_offer(trade_id, actor)?;
        if !matches!(
            offer.status,
            OfferStatus::TradeCreated | OfferStatus::Depositing
        ) {
            return Err(SwapError::InvalidState(format!(
                "Trade {trade_id} is not open for deposits (offer is {})",
                offer.status
            ))
            .into());
        }

        let own_bundle = if offer.user_a == actor.username {
            &offer.bundle_a
        } else {
            &offer.bundle_b
        };
        if !own_bundle.iter().any(|a| a.key() == asset.key()) {
            return Err(SwapError::Validation(format!(
                "Asset {} is not part of your bundle",
                asset.key()
            ))
            .into());
        }

        if !self
            .ledger
            .is_approved_for_all(&actor.wallet, &asset.collection_contract)
            .await
            .map_err(crate::Error::from)?
        {
            let approval = LedgerCall::SetApprovalForAll {
                owner: actor.wallet.clone(),
                token: asset.collection_contract.clone(),
            };
            let tx = self.call_ledger(approval).await?;
            METRICS.approvals_submitted.fetch_add(1, Ordering::Relaxed);
            info!(trade_id, tx_hash = %tx, token = %asset.collection_contract, "Approval confirmed");
        }

        let call = LedgerCall::DepositAsset {
            trade_id,
            depositor: actor.wallet.clone(),
            token: asset.collection_contract.clone(),
            token_id: asset.token_id.clone(),
            amount: asset.amount,
            asset_type: asset.token_type,
        };
        let tx = self.call_ledger(call).await?;
        METRICS.deposits_submitted.fetch_add(1, Ordering::Relaxed);
        info!(trade_id, asset = %asset.key(), tx_hash = %tx, "Deposit submitted");
        Ok(tx)
    }

    /// Submit cancellation. Whether the trade can still be cancelled is
    /// the ledger's call; its revert reason comes back verbatim.
    pub async fn cancel_trade(&self, trade_id: u64, actor: &Actor) -> Result<TxHash, crate::Error> {
        self.bound_offer(trade_id, actor)?;
        let call = LedgerCall::CancelTrade {
            trade_id,
            caller: actor.wallet.clone(),
        };
        let tx = self.call_ledger(call).await?;
        info!(trade_id, tx_hash = %tx, "Trade cancellation submitted");
        Ok(tx)
    }

    /// Recovery on load: overwrite the mirror from ledger state and
    /// re-derive the offer's status from it. Covers events missed while
    /// the watcher was not running.
    pub async fn resync(&self, trade_id: u64) -> Result<EscrowTrade, crate::Error> {
        let offer = self
            .store
            .offer_for_trade(trade_id)
            .ok_or_else(|| SwapError::trade_not_found(trade_id))?;

        let mirror = self
            .ledger
            .get_trade_assets(trade_id)
            .await
            .map_err(crate::Error::from)?;
        self.store.put_mirror(mirror.clone());

        if !mirror.is_active {
            if mirror.fully_deposited() {
                self.advance_if(
                    offer.id,
                    &[OfferStatus::TradeCreated, OfferStatus::Depositing],
                    OfferStatus::Completed,
                );
            } else {
                self.advance_if(
                    offer.id,
                    &[OfferStatus::TradeCreated, OfferStatus::Depositing],
                    OfferStatus::Cancelled,
                );
            }
        } else if mirror.deposited_count() > 0 {
            self.advance_if(offer.id, &[OfferStatus::TradeCreated], OfferStatus::Depositing);
        }
        info!(
            trade_id,
            offer_id = offer.id,
            deposited = mirror.deposited_count(),
            total = mirror.total_count(),
            active = mirror.is_active,
            "Trade resynced from ledger"
        );
        Ok(mirror)
    }

    /// CAS advance that treats a non-matching current status as a no-op.
    fn advance_if(&self, offer_id: u64, allowed: &[OfferStatus], to: OfferStatus) {
        let result = self.store.transition(offer_id, |offer, _| {
            if allowed.contains(&offer.status) {
                offer.status = to;
                Ok(())
            } else {
                Err(SwapError::InvalidState("no-op".into()))
            }
        });
        if result.is_err() {
            warn!(offer_id, ?to, "Resync transition skipped (status already past it)");
        }
    }

    fn party_offer(&self, offer_id: u64, actor: &Actor) -> Result<Offer, SwapError> {
        let offer = self
            .store
            .get(offer_id)
            .ok_or_else(|| SwapError::offer_not_found(offer_id))?;
        if !offer.is_party(&actor.username) {
            return Err(SwapError::not_a_party(&actor.username, offer_id));
        }
        Ok(offer)
    }

    fn bound_offer(&self, trade_id: u64, actor: &Actor) -> Result<Offer, SwapError> {
        let offer = self
            .store
            .offer_for_trade(trade_id)
            .ok_or_else(|| SwapError::trade_not_found(trade_id))?;
        if !offer.is_party(&actor.username) {
            return Err(SwapError::Unauthorized(format!(
                "{} is not a participant in trade {trade_id}",
                actor.username
            )));
        }
        Ok(offer)
    }

    /// Simulate, then submit. The dry run keeps revert reasons free;
    /// failures are counted but never retried here.
    async fn call_ledger(&self, call: LedgerCall) -> Result<TxHash, crate::Error> {
        let start = Instant::now();
        match simulate_then_submit(self.ledger.as_ref(), call).await {
            Ok(tx) => {
                METRICS.record_submit_duration(start);
                Ok(tx)
            }
            Err(e) => {
                match &e {
                    LedgerError::Reverted(reason) => {
                        METRICS.ledger_rejections.fetch_add(1, Ordering::Relaxed);
                        warn!(reason = %reason, "Ledger call reverted");
                    }
                    LedgerError::Transport(msg) => {
                        METRICS.rpc_errors.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %msg, "Ledger transport failure");
                    }
                }
                Err(e.into())
            }
        }
    }
}
