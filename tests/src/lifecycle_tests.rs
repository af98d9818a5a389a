//! End-to-end lifecycles across negotiation, escrow, and reconciliation,
//! plus recovery when the watcher missed events.

use swapmeet_types::{NotificationKind, OfferPhase, OfferStatus};

use crate::utils::{alice, bob, nft, Harness, ALICE_NFT, BOB_NFT};

#[tokio::test]
async fn happy_path_settles_and_swaps_ownership() {
    let h = Harness::new();

    // Negotiate: alice's 1 and 3 against bob's 2.
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

    // Escrow: create the trade, both sides deposit everything.
    h.escrow.initiate_trade(offer.id, &bob()).await.unwrap();
    h.drain_events();
    let trade_id = h.store.get(offer.id).unwrap().trade_id.unwrap();

    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await
        .unwrap();
    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "3"))
        .await
        .unwrap();
    h.drain_events();
    assert_eq!(
        h.store.get(offer.id).unwrap().phase(),
        OfferPhase::Depositing
    );

    h.escrow
        .deposit_asset(trade_id, &bob(), &nft(BOB_NFT, "2"))
        .await
        .unwrap();
    h.drain_events();

    // Settlement is complete exactly when every asset is deposited.
    let settled = h.store.get(offer.id).unwrap();
    assert_eq!(settled.status, OfferStatus::Completed);
    let mirror = h.store.mirror(trade_id).unwrap();
    assert!(mirror.fully_deposited());
    assert!(!mirror.is_active);

    // Every asset went to its counterparty.
    let alice_w = alice().wallet.to_lowercase();
    let bob_w = bob().wallet.to_lowercase();
    assert_eq!(h.ledger.owner_of(ALICE_NFT, "1"), Some(bob_w.clone()));
    assert_eq!(h.ledger.owner_of(ALICE_NFT, "3"), Some(bob_w));
    assert_eq!(h.ledger.owner_of(BOB_NFT, "2"), Some(alice_w));

    // Both parties heard about the settlement.
    for user in ["alice", "bob"] {
        assert!(h
            .notifier
            .for_user(user)
            .iter()
            .any(|n| n.kind == NotificationKind::TradeCompleted && n.offer_id == offer.id));
    }
}

#[tokio::test]
async fn settled_assets_become_offerable_by_their_new_owners() {
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
    assert_eq!(h.store.get(offer.id).unwrap().status, OfferStatus::Completed);

    // Discovery catches up with the settlement.
    h.registry.record_owned_assets(
        1,
        &bob().wallet,
        vec![nft(ALICE_NFT, "1"), nft(BOB_NFT, "4")],
    );
    h.registry
        .record_owned_assets(1, &alice().wallet, vec![nft(ALICE_NFT, "3"), nft(BOB_NFT, "2")]);

    // The swapped token is free for a new offer in the other direction;
    // the completed offer no longer locks anything.
    h.negotiation
        .create_offer(
            &bob(),
            &alice(),
            vec![nft(ALICE_NFT, "1")],
            vec![nft(BOB_NFT, "2")],
        )
        .unwrap();
}

// ── Recovery on load ────────────────────────────────────────────────

#[tokio::test]
async fn resync_catches_up_missed_deposits() -> anyhow::Result<()> {
    let h = Harness::new();
    let (offer, trade_id) = h.bound_trade().await;

    // The watcher goes down; a deposit lands unseen.
    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await?;
    h.discard_events();
    assert_eq!(
        h.store.get(offer.id).unwrap().status,
        OfferStatus::TradeCreated
    );
    assert_eq!(h.store.mirror(trade_id).unwrap().deposited_count(), 0);

    let mirror = h.escrow.resync(trade_id).await?;

    assert_eq!(mirror.deposited_count(), 1);
    assert_eq!(
        h.store.get(offer.id).unwrap().status,
        OfferStatus::Depositing
    );
    Ok(())
}

#[tokio::test]
async fn resync_recovers_a_missed_settlement() -> anyhow::Result<()> {
    let h = Harness::new();
    let (offer, trade_id) = h.bound_trade().await;

    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await?;
    h.escrow
        .deposit_asset(trade_id, &bob(), &nft(BOB_NFT, "2"))
        .await?;
    h.discard_events();

    let mirror = h.escrow.resync(trade_id).await?;

    assert!(!mirror.is_active);
    assert!(mirror.fully_deposited());
    assert_eq!(h.store.get(offer.id).unwrap().status, OfferStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn resync_recovers_a_missed_cancellation() -> anyhow::Result<()> {
    let h = Harness::new();
    let (offer, trade_id) = h.bound_trade().await;

    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await?;
    h.escrow.cancel_trade(trade_id, &alice()).await?;
    h.discard_events();

    let mirror = h.escrow.resync(trade_id).await?;

    assert!(!mirror.is_active);
    assert_eq!(mirror.deposited_count(), 0);
    assert_eq!(h.store.get(offer.id).unwrap().status, OfferStatus::Cancelled);
    Ok(())
}

#[tokio::test]
async fn resync_is_idempotent() -> anyhow::Result<()> {
    let h = Harness::new();
    let (offer, trade_id) = h.bound_trade().await;
    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await?;
    h.drain_events();

    let first = h.escrow.resync(trade_id).await?;
    let second = h.escrow.resync(trade_id).await?;

    assert_eq!(first, second);
    assert_eq!(
        h.store.get(offer.id).unwrap().status,
        OfferStatus::Depositing
    );
    Ok(())
}
