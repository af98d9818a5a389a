//! Reconciliation watcher: folds confirmed ledger events into offer state.
//!
//! This is the only writer that advances an offer past `accepted`. Every
//! transition is a compare-and-swap guarded by the current status, and
//! deposit tracking is set-insertion on the mirror — so at-least-once
//! event delivery, duplicates included, converges to the same state.
//! Anything the watcher cannot attribute unambiguously is logged and
//! dropped: state is never advanced on a guess.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use swapmeet_types::{
    ChainEvent, EscrowTrade, NotificationKind, Offer, OfferStatus, SwapError, TradeAsset,
    TradeAssetSpec,
};

use crate::metrics::METRICS;
use crate::notify::Notifier;
use crate::store::{Correlation, OfferStore};

pub struct ReconciliationWatcher {
    store: Arc<OfferStore>,
    notifier: Arc<Notifier>,
}

impl ReconciliationWatcher {
    pub fn new(store: Arc<OfferStore>, notifier: Arc<Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Consume the event stream until cancelled or the stream closes.
    pub async fn run(&self, mut events: broadcast::Receiver<ChainEvent>, cancel: CancellationToken) {
        info!("Reconciliation watcher started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => self.apply(&event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Dropped events are recoverable through resync;
                        // never guess at what they contained.
                        warn!(missed, "Event stream lagged; affected trades need a resync");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        info!("Reconciliation watcher stopped");
    }

    /// Fold one confirmed event. Synchronous and replay-safe.
    pub fn apply(&self, event: &ChainEvent) {
        match event {
            ChainEvent::TradeCreated {
                chain_id,
                trade_id,
                participants,
            } => self.on_trade_created(*chain_id, *trade_id, participants),
            ChainEvent::AssetDeposited {
                trade_id,
                participant,
                asset_index,
            } => self.on_asset_deposited(*trade_id, participant, *asset_index),
            ChainEvent::TradeCompleted { trade_id } => self.on_trade_completed(*trade_id),
            ChainEvent::TradeCancelled { trade_id } => self.on_trade_cancelled(*trade_id),
        }
    }

    fn on_trade_created(&self, chain_id: u64, trade_id: u64, participants: &[String; 2]) {
        if self.store.offer_for_trade(trade_id).is_some() {
            debug!(trade_id, "TradeCreated replay ignored");
            METRICS.events_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let offer = match self.store.correlate_trade_created(chain_id, participants) {
            Correlation::Matched(offer) => offer,
            Correlation::NoMatch => {
                // Plausibly someone else's trade between the same wallets.
                debug!(trade_id, chain_id, "TradeCreated matches no accepted offer");
                METRICS.events_dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Correlation::Ambiguous => {
                // Fail closed: advancing the wrong offer would corrupt the
                // escrow/negotiation mapping. Manual resync resolves it.
                error!(
                    trade_id,
                    chain_id, "Ambiguous TradeCreated correlation; offer state left unchanged"
                );
                METRICS.correlation_failures.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let offer_id = offer.id;
        let bound = self.store.transition(offer_id, |o, _| {
            if o.status != OfferStatus::Accepted || o.trade_id.is_some() {
                return Err(SwapError::InvalidState("already bound".into()));
            }
            o.status = OfferStatus::TradeCreated;
            o.trade_id = Some(trade_id);
            Ok(())
        });
        match bound {
            Ok(offer) => {
                self.store.bind_trade(trade_id, offer_id);
                self.store
                    .put_mirror(build_mirror(&offer, trade_id, participants));
                METRICS.events_applied.fetch_add(1, Ordering::Relaxed);
                info!(trade_id, offer_id, "Offer bound to on-chain trade");
                self.notify_both(&offer, NotificationKind::TradeCreated);
            }
            Err(_) => {
                METRICS.events_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn on_asset_deposited(&self, trade_id: u64, participant: &str, asset_index: usize) {
        let Some(offer) = self.store.offer_for_trade(trade_id) else {
            warn!(trade_id, "AssetDeposited for unknown trade dropped");
            METRICS.events_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let mut fresh = false;
        let updated = self.store.update_mirror(trade_id, |mirror| {
            let Some(pi) = mirror.participant_index(participant) else {
                return;
            };
            if let Some(asset) = mirror.assets[pi].get_mut(asset_index) {
                if !asset.is_deposited {
                    asset.is_deposited = true;
                    fresh = true;
                }
            }
        });
        if updated.is_none() {
            warn!(trade_id, "AssetDeposited without a mirror dropped");
            METRICS.events_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if !fresh {
            debug!(trade_id, asset_index, "AssetDeposited replay ignored");
            METRICS.events_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        // First confirmed deposit moves the offer into `depositing`.
        self.advance(offer.id, &[OfferStatus::TradeCreated], OfferStatus::Depositing);
        METRICS.events_applied.fetch_add(1, Ordering::Relaxed);
        info!(trade_id, offer_id = offer.id, participant, asset_index, "Deposit confirmed");

        if let Some(depositor) = username_for_wallet(&offer, participant) {
            if let Some(other) = offer.counterparty_of(depositor) {
                self.notifier.notify(
                    other,
                    NotificationKind::AssetDeposited,
                    offer.id,
                    depositor,
                );
            }
        }
    }

    fn on_trade_completed(&self, trade_id: u64) {
        let Some(offer) = self.store.offer_for_trade(trade_id) else {
            warn!(trade_id, "TradeCompleted for unknown trade dropped");
            METRICS.events_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        // Completion implies every deposit landed, whatever we saw locally.
        self.store.update_mirror(trade_id, |mirror| {
            for side in mirror.assets.iter_mut() {
                for asset in side.iter_mut() {
                    asset.is_deposited = true;
                }
            }
            mirror.is_active = false;
        });

        if self.advance(
            offer.id,
            &[OfferStatus::TradeCreated, OfferStatus::Depositing],
            OfferStatus::Completed,
        ) {
            METRICS.events_applied.fetch_add(1, Ordering::Relaxed);
            info!(trade_id, offer_id = offer.id, "Trade settled");
            self.notify_both(&offer, NotificationKind::TradeCompleted);
        } else {
            debug!(trade_id, "TradeCompleted replay ignored");
            METRICS.events_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_trade_cancelled(&self, trade_id: u64) {
        let Some(offer) = self.store.offer_for_trade(trade_id) else {
            warn!(trade_id, "TradeCancelled for unknown trade dropped");
            METRICS.events_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        self.store.update_mirror(trade_id, |mirror| {
            mirror.is_active = false;
            // Deposited assets went back to their depositors.
            for side in mirror.assets.iter_mut() {
                for asset in side.iter_mut() {
                    asset.is_deposited = false;
                }
            }
        });

        if self.advance(
            offer.id,
            &[OfferStatus::TradeCreated, OfferStatus::Depositing],
            OfferStatus::Cancelled,
        ) {
            METRICS.events_applied.fetch_add(1, Ordering::Relaxed);
            info!(trade_id, offer_id = offer.id, "Trade cancelled on-chain");
            self.notify_both(&offer, NotificationKind::TradeCancelled);
        } else {
            debug!(trade_id, "TradeCancelled replay ignored");
            METRICS.events_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Guarded advance; false means the offer was not in an allowed status
    /// (a replay, or a later status already reached).
    fn advance(&self, offer_id: u64, allowed: &[OfferStatus], to: OfferStatus) -> bool {
        self.store
            .transition(offer_id, |offer, _| {
                if allowed.contains(&offer.status) {
                    offer.status = to;
                    Ok(())
                } else {
                    Err(SwapError::InvalidState("transition not applicable".into()))
                }
            })
            .is_ok()
    }

    /// Ledger-driven transitions have no single acting party; both sides
    /// hear about it, each attributed to the other.
    fn notify_both(&self, offer: &Offer, kind: NotificationKind) {
        self.notifier
            .notify(&offer.user_a, kind, offer.id, &offer.user_b);
        self.notifier
            .notify(&offer.user_b, kind, offer.id, &offer.user_a);
    }
}

fn username_for_wallet<'a>(offer: &'a Offer, wallet: &str) -> Option<&'a str> {
    if offer.wallet_a.eq_ignore_ascii_case(wallet) {
        Some(&offer.user_a)
    } else if offer.wallet_b.eq_ignore_ascii_case(wallet) {
        Some(&offer.user_b)
    } else {
        None
    }
}

/// The mirror starts from the offer's own bundles, laid out in the event's
/// participant order.
fn build_mirror(offer: &Offer, trade_id: u64, participants: &[String; 2]) -> EscrowTrade {
    let side_for = |wallet: &str| -> Vec<TradeAsset> {
        let (bundle, recipient) = if offer.wallet_a.eq_ignore_ascii_case(wallet) {
            (&offer.bundle_a, &offer.wallet_b)
        } else {
            (&offer.bundle_b, &offer.wallet_a)
        };
        bundle
            .iter()
            .map(|a| TradeAsset::pending(TradeAssetSpec::from_asset(a, recipient)))
            .collect()
    };
    EscrowTrade {
        trade_id,
        chain_id: offer.chain_id,
        participants: participants.clone(),
        assets: [side_for(&participants[0]), side_for(&participants[1])],
        is_active: true,
    }
}
