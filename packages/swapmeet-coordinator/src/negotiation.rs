//! Offer negotiation engine: every off-chain transition of an offer prior
//! to on-chain commitment.
//!
//! Counter-proposals replace both bundles wholesale, so there is no merge
//! conflict between concurrent edits; the turn-holder check plus the
//! store's CAS transition make the second concurrent writer fail cleanly.

use std::sync::Arc;

use tracing::info;

use swapmeet_types::{Actor, Asset, NotificationKind, Offer, OfferStatus, SwapError};

use crate::metrics::METRICS;
use crate::notify::Notifier;
use crate::registry::AssetRegistry;
use crate::store::{committed_conflict, now_ms, OfferStore};

pub struct NegotiationEngine {
    store: Arc<OfferStore>,
    registry: Arc<AssetRegistry>,
    notifier: Arc<Notifier>,
}

impl NegotiationEngine {
    pub fn new(store: Arc<OfferStore>, registry: Arc<AssetRegistry>, notifier: Arc<Notifier>) -> Self {
        Self {
            store,
            registry,
            notifier,
        }
    }

    /// Open a negotiation. The initiator proposes both bundles; the
    /// counterparty holds the turn from the start.
    pub fn create_offer(
        &self,
        actor: &Actor,
        counterparty: &Actor,
        bundle_initiator: Vec<Asset>,
        bundle_counterparty: Vec<Asset>,
    ) -> Result<Offer, SwapError> {
        if actor.username == counterparty.username
            || actor.wallet.eq_ignore_ascii_case(&counterparty.wallet)
        {
            return Err(SwapError::Validation(
                "Cannot open an offer with yourself".into(),
            ));
        }
        for wallet in [&actor.wallet, &counterparty.wallet] {
            if !swapmeet_types::is_valid_address(wallet) {
                return Err(SwapError::Validation(format!("Invalid wallet: {wallet}")));
            }
        }

        let chain_id = self.validate_proposal(
            &actor.wallet,
            &bundle_initiator,
            &counterparty.wallet,
            &bundle_counterparty,
        )?;

        let keys: Vec<_> = bundle_initiator
            .iter()
            .chain(bundle_counterparty.iter())
            .map(Asset::key)
            .collect();
        if let Some((key, offer_id)) = self.store.scan_committed_conflict(&keys, None) {
            return Err(SwapError::asset_locked(&key, offer_id));
        }

        let now = now_ms();
        let offer = Offer {
            id: self.store.allocate_id(),
            chain_id,
            user_a: actor.username.clone(),
            wallet_a: actor.wallet.clone(),
            user_b: counterparty.username.clone(),
            wallet_b: counterparty.wallet.clone(),
            bundle_a: bundle_initiator,
            bundle_b: bundle_counterparty,
            status: OfferStatus::Pending,
            turn_holder: counterparty.username.clone(),
            trade_id: None,
            created_at: now,
            updated_at: now,
            accepted_at: None,
        };
        self.store.put(offer.clone());
        METRICS
            .offers_created
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        info!(
            offer_id = offer.id,
            initiator = %actor.username,
            counterparty = %counterparty.username,
            "Offer created"
        );
        self.notifier.notify(
            &counterparty.username,
            NotificationKind::OfferReceived,
            offer.id,
            &actor.username,
        );
        Ok(offer)
    }

    /// Replace both bundles and hand the turn back. Only the current turn
    /// holder may counter.
    pub fn counter_offer(
        &self,
        offer_id: u64,
        actor: &Actor,
        new_bundle_a: Vec<Asset>,
        new_bundle_b: Vec<Asset>,
    ) -> Result<Offer, SwapError> {
        let current = self
            .store
            .get(offer_id)
            .ok_or_else(|| SwapError::offer_not_found(offer_id))?;
        if !current.is_party(&actor.username) {
            return Err(SwapError::not_a_party(&actor.username, offer_id));
        }

        let chain_id = self.validate_proposal(
            &current.wallet_a,
            &new_bundle_a,
            &current.wallet_b,
            &new_bundle_b,
        )?;
        if chain_id != current.chain_id {
            return Err(SwapError::Validation(format!(
                "Offer is on chain {}, proposal is on chain {chain_id}",
                current.chain_id
            )));
        }

        let keys: Vec<_> = new_bundle_a
            .iter()
            .chain(new_bundle_b.iter())
            .map(Asset::key)
            .collect();
        if let Some((key, holder)) = self.store.scan_committed_conflict(&keys, Some(offer_id)) {
            return Err(SwapError::asset_locked(&key, holder));
        }

        let actor_name = actor.username.clone();
        let updated = self.store.transition(offer_id, |offer, _| {
            if !offer.status.is_negotiating() {
                return Err(SwapError::InvalidState(format!(
                    "Offer {offer_id} is {} and no longer open to counter-offers",
                    offer.status
                )));
            }
            if offer.turn_holder != actor_name {
                return Err(SwapError::not_turn_holder(&actor_name));
            }
            let next_turn = offer
                .counterparty_of(&actor_name)
                .unwrap_or_default()
                .to_string();
            offer.bundle_a = new_bundle_a;
            offer.bundle_b = new_bundle_b;
            offer.status = OfferStatus::Countered;
            offer.turn_holder = next_turn;
            Ok(())
        })?;
        METRICS
            .offers_countered
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        info!(offer_id, actor = %actor.username, "Offer countered");
        self.notifier.notify(
            &updated.turn_holder,
            NotificationKind::OfferCountered,
            offer_id,
            &actor.username,
        );
        Ok(updated)
    }

    /// Accept the proposal as it stands. Marks intent only — the escrow
    /// coordinator takes it from here; acceptance never touches the ledger.
    pub fn accept_offer(&self, offer_id: u64, actor: &Actor) -> Result<Offer, SwapError> {
        let actor_name = actor.username.clone();
        let updated = self.store.transition(offer_id, |offer, others| {
            if !offer.status.is_negotiating() {
                return Err(SwapError::InvalidState(format!(
                    "Offer {offer_id} is {} and cannot be accepted",
                    offer.status
                )));
            }
            if offer.turn_holder != actor_name {
                return Err(SwapError::not_turn_holder(&actor_name));
            }
            if offer.bundle_a.is_empty() || offer.bundle_b.is_empty() {
                return Err(SwapError::Validation(
                    "Both bundles must be non-empty at acceptance".into(),
                ));
            }
            // Exclusivity is claimed here: no asset may already sit in
            // another committed offer. Checked under the same lock that
            // commits the acceptance.
            let keys: Vec<_> = offer.asset_keys().collect();
            if let Some((key, holder)) = committed_conflict(&keys, Some(offer.id), others.values())
            {
                return Err(SwapError::asset_locked(&key, holder));
            }
            offer.status = OfferStatus::Accepted;
            offer.accepted_at = Some(now_ms());
            Ok(())
        })?;
        METRICS
            .offers_accepted
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        info!(offer_id, actor = %actor.username, "Offer accepted");
        if let Some(other) = updated.counterparty_of(&actor.username) {
            self.notifier.notify(
                other,
                NotificationKind::OfferAccepted,
                offer_id,
                &actor.username,
            );
        }
        Ok(updated)
    }

    /// Withdraw before acceptance. Either party may do this; no trade
    /// exists yet, so the ledger is not involved.
    pub fn cancel_negotiation(&self, offer_id: u64, actor: &Actor) -> Result<Offer, SwapError> {
        let actor_name = actor.username.clone();
        let updated = self.store.transition(offer_id, |offer, _| {
            if !offer.is_party(&actor_name) {
                return Err(SwapError::not_a_party(&actor_name, offer_id));
            }
            if !offer.status.is_negotiating() {
                return Err(SwapError::InvalidState(format!(
                    "Offer {offer_id} is {} and can no longer be withdrawn off-chain",
                    offer.status
                )));
            }
            offer.status = OfferStatus::Cancelled;
            Ok(())
        })?;
        METRICS
            .negotiations_cancelled
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        info!(offer_id, actor = %actor.username, "Negotiation cancelled");
        if let Some(other) = updated.counterparty_of(&actor.username) {
            self.notifier.notify(
                other,
                NotificationKind::NegotiationCancelled,
                offer_id,
                &actor.username,
            );
        }
        Ok(updated)
    }

    pub fn get_offer(&self, offer_id: u64) -> Result<Offer, SwapError> {
        self.store
            .get(offer_id)
            .ok_or_else(|| SwapError::offer_not_found(offer_id))
    }

    /// Offers involving `username`, newest first.
    pub fn offers_for_user(
        &self,
        username: &str,
        from_index: Option<usize>,
        limit: Option<usize>,
    ) -> Vec<Offer> {
        let start = from_index.unwrap_or(0);
        let limit = limit.unwrap_or(50).min(100);
        self.store.offers_for_user(username, start, limit)
    }

    /// Shape, chain, overlap, and ownership checks shared by create and
    /// counter. Returns the proposal's chain id.
    fn validate_proposal(
        &self,
        wallet_a: &str,
        bundle_a: &[Asset],
        wallet_b: &str,
        bundle_b: &[Asset],
    ) -> Result<u64, SwapError> {
        if bundle_a.is_empty() {
            return Err(SwapError::empty_bundle("the initiating side"));
        }
        if bundle_b.is_empty() {
            return Err(SwapError::empty_bundle("the counterparty side"));
        }

        let chain_id = bundle_a[0].chain_id;
        if bundle_a
            .iter()
            .chain(bundle_b.iter())
            .any(|a| a.chain_id != chain_id)
        {
            return Err(SwapError::Validation(
                "All assets in a proposal must share one chain".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for asset in bundle_a.iter().chain(bundle_b.iter()) {
            if !seen.insert(asset.key()) {
                return Err(SwapError::Validation(format!(
                    "Asset {} appears more than once in the proposal",
                    asset.key()
                )));
            }
        }

        for (wallet, bundle) in [(wallet_a, bundle_a), (wallet_b, bundle_b)] {
            if let Some(asset) = self.registry.first_unowned(wallet, bundle) {
                return Err(SwapError::not_owner(&asset.key(), wallet));
            }
        }
        Ok(chain_id)
    }
}
