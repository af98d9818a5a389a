//! Shared harness: the full coordinator stack wired to the in-memory
//! sandbox ledger, with deterministic event delivery (tests drain the
//! event stream explicitly instead of racing a background task).

use std::sync::{Arc, Mutex};

use swapmeet_coordinator::escrow::EscrowCoordinator;
use swapmeet_coordinator::ledger::{InMemoryLedger, Ledger};
use swapmeet_coordinator::negotiation::NegotiationEngine;
use swapmeet_coordinator::notify::Notifier;
use swapmeet_coordinator::registry::AssetRegistry;
use swapmeet_coordinator::store::OfferStore;
use swapmeet_coordinator::watcher::ReconciliationWatcher;
use swapmeet_types::{Actor, Asset, ChainEvent, Offer, TokenType};
use tokio::sync::broadcast;

pub const CHAIN: u64 = 1;
pub const ALICE_WALLET: &str = "0x1111111111111111111111111111111111111111";
pub const BOB_WALLET: &str = "0x2222222222222222222222222222222222222222";
pub const ALICE_NFT: &str = "0xaaaa000000000000000000000000000000000000";
pub const BOB_NFT: &str = "0xbbbb000000000000000000000000000000000000";

pub fn alice() -> Actor {
    Actor {
        username: "alice".into(),
        wallet: ALICE_WALLET.into(),
    }
}

pub fn bob() -> Actor {
    Actor {
        username: "bob".into(),
        wallet: BOB_WALLET.into(),
    }
}

pub fn nft(contract: &str, token_id: &str) -> Asset {
    Asset {
        chain_id: CHAIN,
        collection_contract: contract.into(),
        token_id: token_id.into(),
        token_type: TokenType::Erc721,
        amount: 1,
    }
}

pub struct Harness {
    pub store: Arc<OfferStore>,
    pub registry: Arc<AssetRegistry>,
    pub notifier: Arc<Notifier>,
    pub ledger: Arc<InMemoryLedger>,
    pub negotiation: NegotiationEngine,
    pub escrow: EscrowCoordinator,
    pub watcher: ReconciliationWatcher,
    events: Mutex<broadcast::Receiver<ChainEvent>>,
}

impl Harness {
    /// Stack with alice holding tokens 1 and 3 on her collection and bob
    /// holding tokens 2 and 4 on his, both in the registry and on chain.
    pub fn new() -> Self {
        let store = Arc::new(OfferStore::new());
        let registry = Arc::new(AssetRegistry::new());
        let notifier = Arc::new(Notifier::new(100));
        let ledger = Arc::new(InMemoryLedger::new(CHAIN, 256));

        for token_id in ["1", "3"] {
            ledger.mint(ALICE_NFT, token_id, ALICE_WALLET);
        }
        for token_id in ["2", "4"] {
            ledger.mint(BOB_NFT, token_id, BOB_WALLET);
        }
        registry.record_owned_assets(
            CHAIN,
            ALICE_WALLET,
            vec![nft(ALICE_NFT, "1"), nft(ALICE_NFT, "3")],
        );
        registry.record_owned_assets(
            CHAIN,
            BOB_WALLET,
            vec![nft(BOB_NFT, "2"), nft(BOB_NFT, "4")],
        );

        let negotiation =
            NegotiationEngine::new(store.clone(), registry.clone(), notifier.clone());
        let escrow = EscrowCoordinator::new(store.clone(), ledger.clone() as Arc<dyn Ledger>);
        let watcher = ReconciliationWatcher::new(store.clone(), notifier.clone());
        let events = Mutex::new(ledger.subscribe());

        Self {
            store,
            registry,
            notifier,
            ledger,
            negotiation,
            escrow,
            watcher,
            events,
        }
    }

    /// Feed every pending ledger event through the watcher; returns them
    /// for tests that want to replay.
    pub fn drain_events(&self) -> Vec<ChainEvent> {
        let mut drained = Vec::new();
        let mut rx = self.events.lock().unwrap();
        while let Ok(event) = rx.try_recv() {
            self.watcher.apply(&event);
            drained.push(event);
        }
        drained
    }

    /// Discard pending events without applying them (simulates a watcher
    /// that was down).
    pub fn discard_events(&self) -> Vec<ChainEvent> {
        let mut discarded = Vec::new();
        let mut rx = self.events.lock().unwrap();
        while let Ok(event) = rx.try_recv() {
            discarded.push(event);
        }
        discarded
    }

    /// Create alice → bob offer (token 1 for token 2) and have bob accept.
    pub fn accepted_offer(&self) -> Offer {
        let offer = self
            .negotiation
            .create_offer(
                &alice(),
                &bob(),
                vec![nft(ALICE_NFT, "1")],
                vec![nft(BOB_NFT, "2")],
            )
            .expect("create offer");
        self.negotiation
            .accept_offer(offer.id, &bob())
            .expect("accept offer")
    }

    /// Accepted offer pushed on-chain with the creation event applied.
    /// Returns the bound offer and its trade id.
    pub async fn bound_trade(&self) -> (Offer, u64) {
        let offer = self.accepted_offer();
        self.escrow
            .initiate_trade(offer.id, &alice())
            .await
            .expect("initiate trade");
        self.drain_events();
        let bound = self.store.get(offer.id).expect("offer exists");
        let trade_id = bound.trade_id.expect("trade bound");
        (bound, trade_id)
    }
}
