//! Asset registry: the canonical record of known assets, their current
//! owner, and verification status.
//!
//! Ownership arrives as discovery snapshots (`list_owned_assets` output)
//! and the latest snapshot is authoritative: assets a wallet no longer
//! holds are dropped, not kept stale.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::Serialize;
use swapmeet_types::{Asset, AssetKey, SwapError};
use tracing::info;

use crate::store::now_ms;

#[derive(Debug, Clone, Serialize)]
pub struct AssetRecord {
    pub asset: Asset,
    pub owner_wallet: String,
    pub verified: bool,
    pub verified_at: Option<u64>,
}

pub struct AssetRegistry {
    records: RwLock<HashMap<AssetKey, AssetRecord>>,
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Fold a discovery snapshot for `(chain_id, wallet)` into the
    /// registry. Returns how many records the wallet now has on the chain.
    pub fn record_owned_assets(&self, chain_id: u64, wallet: &str, assets: Vec<Asset>) -> usize {
        let snapshot: HashSet<AssetKey> = assets.iter().map(Asset::key).collect();
        let count = snapshot.len();
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());

        // Drop claims the snapshot no longer supports.
        records.retain(|key, record| {
            key.chain_id != chain_id
                || !record.owner_wallet.eq_ignore_ascii_case(wallet)
                || snapshot.contains(key)
        });

        for asset in assets {
            let key = asset.key();
            match records.get_mut(&key) {
                // Re-taking ownership resets verification; the previous
                // owner's challenge no longer proves anything.
                Some(record) if !record.owner_wallet.eq_ignore_ascii_case(wallet) => {
                    record.owner_wallet = wallet.to_string();
                    record.verified = false;
                    record.verified_at = None;
                }
                Some(_) => {}
                None => {
                    records.insert(
                        key,
                        AssetRecord {
                            asset,
                            owner_wallet: wallet.to_string(),
                            verified: false,
                            verified_at: None,
                        },
                    );
                }
            }
        }
        info!(chain_id, wallet, assets = count, "Ownership snapshot folded");
        count
    }

    pub fn get(&self, key: &AssetKey) -> Option<AssetRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(key).cloned()
    }

    pub fn owner_of(&self, key: &AssetKey) -> Option<String> {
        self.get(key).map(|r| r.owner_wallet)
    }

    /// Informational only; verification gates no lifecycle transition.
    pub fn is_verified(&self, key: &AssetKey) -> bool {
        self.get(key).map(|r| r.verified).unwrap_or(false)
    }

    /// Record the outcome of the external ownership-verification flow.
    pub fn mark_verified(&self, key: &AssetKey, wallet: &str) -> Result<(), SwapError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records
            .get_mut(key)
            .ok_or_else(|| SwapError::NotFound(format!("Asset {key} not in registry")))?;
        if !record.owner_wallet.eq_ignore_ascii_case(wallet) {
            return Err(SwapError::not_owner(key, wallet));
        }
        record.verified = true;
        record.verified_at = Some(now_ms());
        Ok(())
    }

    /// First asset in `assets` the registry does not attribute to `wallet`.
    pub fn first_unowned<'a>(&self, wallet: &str, assets: &'a [Asset]) -> Option<&'a Asset> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        assets.iter().find(|a| {
            records
                .get(&a.key())
                .map(|r| !r.owner_wallet.eq_ignore_ascii_case(wallet))
                .unwrap_or(true)
        })
    }
}
