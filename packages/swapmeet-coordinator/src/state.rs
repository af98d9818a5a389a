//! Application state shared across handlers.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::Config;
use crate::escrow::EscrowCoordinator;
use crate::ledger::{InMemoryLedger, Ledger};
use crate::negotiation::NegotiationEngine;
use crate::notify::Notifier;
use crate::registry::AssetRegistry;
use crate::store::OfferStore;
use crate::watcher::ReconciliationWatcher;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<OfferStore>,
    pub registry: Arc<AssetRegistry>,
    pub notifier: Arc<Notifier>,
    pub ledger: Arc<dyn Ledger>,
    pub negotiation: NegotiationEngine,
    pub escrow: EscrowCoordinator,
    pub start_time: Instant,
    pub request_count: AtomicU64,
}

impl AppState {
    /// Sandbox wiring: the in-memory reference ledger backs the escrow
    /// surface.
    pub fn new(config: Config) -> Self {
        let ledger = Arc::new(InMemoryLedger::new(
            config.chain_id,
            config.event_channel_capacity,
        ));
        info!(chain_id = config.chain_id, "Using in-memory sandbox ledger");
        Self::with_ledger(config, ledger)
    }

    pub fn with_ledger(config: Config, ledger: Arc<dyn Ledger>) -> Self {
        let store = Arc::new(OfferStore::new());
        let registry = Arc::new(AssetRegistry::new());
        let notifier = Arc::new(Notifier::new(config.notification_cap));
        let negotiation =
            NegotiationEngine::new(store.clone(), registry.clone(), notifier.clone());
        let escrow = EscrowCoordinator::new(store.clone(), ledger.clone());
        Self {
            config,
            store,
            registry,
            notifier,
            ledger,
            negotiation,
            escrow,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        }
    }

    /// Watcher over this state's store; the caller owns the task.
    pub fn watcher(&self) -> ReconciliationWatcher {
        ReconciliationWatcher::new(self.store.clone(), self.notifier.clone())
    }
}
