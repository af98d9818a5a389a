//! Offer store: the relational record of negotiations and the mirror of
//! on-chain trade state.
//!
//! All status changes go through [`OfferStore::transition`], which runs the
//! caller's guard-and-mutate closure under one write lock. That gives every
//! transition compare-and-swap semantics: of two concurrent writers, the
//! second observes the first's status and fails its guard. The closure also
//! sees every *other* offer, which is how bundle exclusivity is re-checked
//! atomically at accept time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use swapmeet_types::{AssetKey, EscrowTrade, Offer, OfferStatus};
use tracing::debug;

/// Unix milliseconds.
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Outcome of matching a `TradeCreated` event against accepted offers.
#[derive(Debug, Clone, PartialEq)]
pub enum Correlation {
    Matched(Offer),
    NoMatch,
    /// More than one candidate tied on `accepted_at`; nothing is advanced.
    Ambiguous,
}

pub struct OfferStore {
    offers: RwLock<HashMap<u64, Offer>>,
    next_id: AtomicU64,
    /// trade_id → local mirror of on-chain state.
    mirrors: RwLock<HashMap<u64, EscrowTrade>>,
    /// trade_id → offer_id, written once by the watcher at correlation time.
    bindings: RwLock<HashMap<u64, u64>>,
}

impl Default for OfferStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OfferStore {
    pub fn new() -> Self {
        Self {
            offers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            mirrors: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
        }
    }

    pub fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn put(&self, offer: Offer) {
        let mut offers = self.offers.write().unwrap_or_else(|e| e.into_inner());
        offers.insert(offer.id, offer);
    }

    pub fn get(&self, id: u64) -> Option<Offer> {
        let offers = self.offers.read().unwrap_or_else(|e| e.into_inner());
        offers.get(&id).cloned()
    }

    /// Run `guard` with the offer and a view of all other offers under one
    /// write lock. The mutation commits (and `updated_at` bumps) only when
    /// `guard` returns Ok; on Err the offer is untouched.
    pub fn transition<F>(&self, id: u64, guard: F) -> Result<Offer, swapmeet_types::SwapError>
    where
        F: FnOnce(&mut Offer, &HashMap<u64, Offer>) -> Result<(), swapmeet_types::SwapError>,
    {
        let mut offers = self.offers.write().unwrap_or_else(|e| e.into_inner());
        let mut offer = offers
            .remove(&id)
            .ok_or_else(|| swapmeet_types::SwapError::offer_not_found(id))?;
        match guard(&mut offer, &offers) {
            Ok(()) => {
                offer.updated_at = now_ms();
                let out = offer.clone();
                offers.insert(id, offer);
                Ok(out)
            }
            Err(e) => {
                offers.insert(id, offer);
                Err(e)
            }
        }
    }

    /// First committed offer (other than `exclude`) holding any of `keys`.
    pub fn scan_committed_conflict(
        &self,
        keys: &[AssetKey],
        exclude: Option<u64>,
    ) -> Option<(AssetKey, u64)> {
        let offers = self.offers.read().unwrap_or_else(|e| e.into_inner());
        committed_conflict(keys, exclude, offers.values())
    }

    /// Offers where `username` is a party, newest first.
    pub fn offers_for_user(&self, username: &str, from_index: usize, limit: usize) -> Vec<Offer> {
        let offers = self.offers.read().unwrap_or_else(|e| e.into_inner());
        let mut result: Vec<Offer> = offers
            .values()
            .filter(|o| o.is_party(username))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        result.into_iter().skip(from_index).take(limit).collect()
    }

    pub fn open_offer_count(&self) -> usize {
        let offers = self.offers.read().unwrap_or_else(|e| e.into_inner());
        offers.values().filter(|o| !o.status.is_terminal()).count()
    }

    // --- Trade bindings & mirrors ---

    pub fn bind_trade(&self, trade_id: u64, offer_id: u64) {
        let mut bindings = self.bindings.write().unwrap_or_else(|e| e.into_inner());
        bindings.insert(trade_id, offer_id);
    }

    pub fn offer_for_trade(&self, trade_id: u64) -> Option<Offer> {
        let offer_id = {
            let bindings = self.bindings.read().unwrap_or_else(|e| e.into_inner());
            bindings.get(&trade_id).copied()?
        };
        self.get(offer_id)
    }

    pub fn put_mirror(&self, mirror: EscrowTrade) {
        let mut mirrors = self.mirrors.write().unwrap_or_else(|e| e.into_inner());
        mirrors.insert(mirror.trade_id, mirror);
    }

    pub fn mirror(&self, trade_id: u64) -> Option<EscrowTrade> {
        let mirrors = self.mirrors.read().unwrap_or_else(|e| e.into_inner());
        mirrors.get(&trade_id).cloned()
    }

    /// Mutate a mirror in place; returns the updated copy.
    pub fn update_mirror<F>(&self, trade_id: u64, f: F) -> Option<EscrowTrade>
    where
        F: FnOnce(&mut EscrowTrade),
    {
        let mut mirrors = self.mirrors.write().unwrap_or_else(|e| e.into_inner());
        let mirror = mirrors.get_mut(&trade_id)?;
        f(mirror);
        Some(mirror.clone())
    }

    pub fn active_trade_count(&self) -> usize {
        let mirrors = self.mirrors.read().unwrap_or_else(|e| e.into_inner());
        mirrors.values().filter(|m| m.is_active).count()
    }

    /// Match a `TradeCreated` event to the offer it belongs to: accepted,
    /// unbound, same chain, same wallet pair. The most recently accepted
    /// candidate wins; a tie on `accepted_at` is ambiguous and matches
    /// nothing.
    pub fn correlate_trade_created(
        &self,
        chain_id: u64,
        participants: &[String; 2],
    ) -> Correlation {
        let offers = self.offers.read().unwrap_or_else(|e| e.into_inner());
        let mut candidates: Vec<&Offer> = offers
            .values()
            .filter(|o| {
                o.status == OfferStatus::Accepted
                    && o.trade_id.is_none()
                    && o.chain_id == chain_id
                    && o.involves_wallets(&participants[0], &participants[1])
            })
            .collect();

        match candidates.len() {
            0 => Correlation::NoMatch,
            1 => Correlation::Matched(candidates[0].clone()),
            _ => {
                candidates.sort_by(|a, b| b.accepted_at.cmp(&a.accepted_at));
                if candidates[0].accepted_at == candidates[1].accepted_at {
                    debug!(
                        count = candidates.len(),
                        "Multiple accepted offers tie for the same participant pair"
                    );
                    Correlation::Ambiguous
                } else {
                    Correlation::Matched(candidates[0].clone())
                }
            }
        }
    }
}

/// First committed offer among `others` (excluding `exclude`) holding any
/// of `keys`. Committed = accepted or later, not yet terminal.
pub(crate) fn committed_conflict<'a>(
    keys: &[AssetKey],
    exclude: Option<u64>,
    others: impl Iterator<Item = &'a Offer>,
) -> Option<(AssetKey, u64)> {
    for offer in others {
        if Some(offer.id) == exclude || !offer.status.is_committed() {
            continue;
        }
        for key in keys {
            if offer.contains_asset(key) {
                return Some((key.clone(), offer.id));
            }
        }
    }
    None
}
