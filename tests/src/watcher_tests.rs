//! Reconciliation under at-least-once delivery: replays, duplicates,
//! unknown trades, and ambiguous correlation must never corrupt state.

use swapmeet_types::{ChainEvent, OfferStatus};

use crate::utils::{alice, bob, nft, Harness, ALICE_NFT, BOB_NFT};

// ── Duplicate delivery ──────────────────────────────────────────────

#[tokio::test]
async fn duplicate_deposit_event_keeps_count_stable() {
    let h = Harness::new();

    // Three assets total: alice gives 1 and 3, bob gives 2.
    let offer = h
        .negotiation
        .create_offer(
            &alice(),
            &bob(),
            vec![nft(ALICE_NFT, "1"), nft(ALICE_NFT, "3")],
            vec![nft(BOB_NFT, "2")],
        )
        .unwrap();
    h.negotiation.accept_offer(offer.id, &bob()).unwrap();
    h.escrow.initiate_trade(offer.id, &alice()).await.unwrap();
    h.drain_events();
    let trade_id = h.store.get(offer.id).unwrap().trade_id.unwrap();

    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await
        .unwrap();
    let first_deposit_events = h.drain_events();
    h.escrow
        .deposit_asset(trade_id, &bob(), &nft(BOB_NFT, "2"))
        .await
        .unwrap();
    h.drain_events();

    assert_eq!(h.store.mirror(trade_id).unwrap().deposited_count(), 2);

    // The subscription redelivers the first deposit event.
    for event in &first_deposit_events {
        h.watcher.apply(event);
    }

    let mirror = h.store.mirror(trade_id).unwrap();
    assert_eq!(mirror.deposited_count(), 2);
    assert_eq!(
        h.store.get(offer.id).unwrap().status,
        OfferStatus::Depositing
    );
}

#[tokio::test]
async fn every_event_type_replays_as_a_no_op() {
    let h = Harness::new();
    let (offer, trade_id) = h.bound_trade().await;
    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await
        .unwrap();
    h.escrow
        .deposit_asset(trade_id, &bob(), &nft(BOB_NFT, "2"))
        .await
        .unwrap();
    let all_events = h.drain_events();
    assert_eq!(h.store.get(offer.id).unwrap().status, OfferStatus::Completed);
    let settled_mirror = h.store.mirror(trade_id).unwrap();

    // Replay the entire history, twice, in order.
    for _ in 0..2 {
        for event in &all_events {
            h.watcher.apply(event);
        }
    }

    let replayed = h.store.get(offer.id).unwrap();
    assert_eq!(replayed.status, OfferStatus::Completed);
    assert_eq!(replayed.trade_id, Some(trade_id));
    assert_eq!(h.store.mirror(trade_id).unwrap(), settled_mirror);
}

// ── Monotonicity ────────────────────────────────────────────────────

#[tokio::test]
async fn settled_offers_never_regress() {
    let h = Harness::new();
    let (offer, trade_id) = h.bound_trade().await;
    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await
        .unwrap();
    h.escrow
        .deposit_asset(trade_id, &bob(), &nft(BOB_NFT, "2"))
        .await
        .unwrap();
    h.drain_events();

    // A stale cancellation arriving after settlement is dropped.
    h.watcher.apply(&ChainEvent::TradeCancelled { trade_id });
    assert_eq!(h.store.get(offer.id).unwrap().status, OfferStatus::Completed);
}

// ── Fail-closed paths ───────────────────────────────────────────────

#[tokio::test]
async fn events_for_foreign_trades_change_nothing() {
    let h = Harness::new();
    let offer = h.accepted_offer();

    h.watcher.apply(&ChainEvent::AssetDeposited {
        trade_id: 404,
        participant: alice().wallet,
        asset_index: 0,
    });
    h.watcher.apply(&ChainEvent::TradeCompleted { trade_id: 404 });
    h.watcher.apply(&ChainEvent::TradeCancelled { trade_id: 404 });

    assert_eq!(h.store.get(offer.id).unwrap().status, OfferStatus::Accepted);
    assert!(h.store.mirror(404).is_none());
}

#[tokio::test]
async fn trade_created_for_unrelated_wallets_is_ignored() {
    let h = Harness::new();
    let offer = h.accepted_offer();

    h.watcher.apply(&ChainEvent::TradeCreated {
        chain_id: 1,
        trade_id: 51,
        participants: [
            "0x5555555555555555555555555555555555555555".into(),
            "0x6666666666666666666666666666666666666666".into(),
        ],
    });

    let untouched = h.store.get(offer.id).unwrap();
    assert_eq!(untouched.status, OfferStatus::Accepted);
    assert_eq!(untouched.trade_id, None);
}

#[tokio::test]
async fn ambiguous_correlation_leaves_both_offers_unbound() {
    let h = Harness::new();
    let first = h.accepted_offer();

    // A second accepted offer between the same pair, forced onto the same
    // accepted_at tick so neither candidate is "most recent".
    let mut second = h
        .negotiation
        .create_offer(
            &alice(),
            &bob(),
            vec![nft(ALICE_NFT, "3")],
            vec![nft(BOB_NFT, "4")],
        )
        .unwrap();
    second.status = OfferStatus::Accepted;
    second.accepted_at = h.store.get(first.id).unwrap().accepted_at;
    h.store.put(second.clone());

    h.escrow.initiate_trade(first.id, &alice()).await.unwrap();
    h.drain_events();

    // Fail closed: neither offer was advanced or bound.
    assert_eq!(h.store.get(first.id).unwrap().status, OfferStatus::Accepted);
    assert_eq!(h.store.get(first.id).unwrap().trade_id, None);
    assert_eq!(h.store.get(second.id).unwrap().trade_id, None);
}

#[tokio::test]
async fn distinct_accept_times_pick_the_most_recent_offer() {
    let h = Harness::new();
    let older = h.accepted_offer();

    let newer = h
        .negotiation
        .create_offer(
            &alice(),
            &bob(),
            vec![nft(ALICE_NFT, "3")],
            vec![nft(BOB_NFT, "4")],
        )
        .unwrap();
    // Strictly later acceptance.
    let mut newer = h.store.get(newer.id).unwrap();
    newer.status = OfferStatus::Accepted;
    newer.accepted_at = older.accepted_at.map(|t| t + 10);
    h.store.put(newer.clone());

    h.watcher.apply(&ChainEvent::TradeCreated {
        chain_id: 1,
        trade_id: 60,
        participants: [alice().wallet, bob().wallet],
    });

    assert_eq!(h.store.get(newer.id).unwrap().trade_id, Some(60));
    assert_eq!(h.store.get(older.id).unwrap().trade_id, None);
}
