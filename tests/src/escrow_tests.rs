//! Escrow coordination: pushing accepted offers on-chain, driving
//! approvals and deposits, and surfacing ledger rejections verbatim.

use swapmeet_coordinator::ledger::Ledger;
use swapmeet_coordinator::Error;
use swapmeet_types::{ChainEvent, OfferStatus, SwapError};

use crate::utils::{alice, bob, nft, Harness, ALICE_NFT, BOB_NFT};

// ── Trade creation ──────────────────────────────────────────────────

#[tokio::test]
async fn initiate_binds_offer_once_event_confirms() {
    let h = Harness::new();
    let offer = h.accepted_offer();

    h.escrow.initiate_trade(offer.id, &alice()).await.unwrap();

    // Submission alone advances nothing: the transaction could still have
    // been dropped. Only the confirmed event binds the trade.
    assert_eq!(
        h.store.get(offer.id).unwrap().status,
        OfferStatus::Accepted
    );

    let drained = h.drain_events();
    assert!(matches!(drained[0], ChainEvent::TradeCreated { .. }));

    let bound = h.store.get(offer.id).unwrap();
    assert_eq!(bound.status, OfferStatus::TradeCreated);
    let trade_id = bound.trade_id.expect("trade id bound");

    // The mirror starts from the offer's bundles, nothing deposited.
    let mirror = h.store.mirror(trade_id).unwrap();
    assert_eq!(mirror.total_count(), 2);
    assert_eq!(mirror.deposited_count(), 0);
    assert!(mirror.is_active);
}

#[tokio::test]
async fn initiate_requires_an_accepted_offer() {
    let h = Harness::new();
    let offer = h
        .negotiation
        .create_offer(
            &alice(),
            &bob(),
            vec![nft(ALICE_NFT, "1")],
            vec![nft(BOB_NFT, "2")],
        )
        .unwrap();

    let err = h.escrow.initiate_trade(offer.id, &alice()).await.unwrap_err();
    assert!(matches!(err, Error::Swap(SwapError::InvalidState(_))));

    // Once the trade exists, initiating again is rejected too.
    h.negotiation.accept_offer(offer.id, &bob()).unwrap();
    h.escrow.initiate_trade(offer.id, &alice()).await.unwrap();
    h.drain_events();
    let err = h.escrow.initiate_trade(offer.id, &alice()).await.unwrap_err();
    assert!(matches!(err, Error::Swap(SwapError::InvalidState(_))));
}

#[tokio::test]
async fn initiate_revalidates_exclusivity() {
    let h = Harness::new();
    let offer = h.accepted_offer();

    // Another coordinator instance committed token 1 elsewhere in the
    // meantime; the store sees it, the engine never did.
    let mut rival = offer.clone();
    rival.id = h.store.allocate_id();
    rival.status = OfferStatus::Depositing;
    rival.trade_id = Some(999);
    h.store.put(rival.clone());

    let err = h.escrow.initiate_trade(offer.id, &alice()).await.unwrap_err();
    match err {
        Error::Swap(SwapError::AssetConflict {
            conflicting_offer, ..
        }) => assert_eq!(conflicting_offer, Some(rival.id)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn only_parties_touch_the_trade() {
    let h = Harness::new();
    let (_, trade_id) = h.bound_trade().await;

    let mallory = swapmeet_types::Actor {
        username: "mallory".into(),
        wallet: "0x3333333333333333333333333333333333333333".into(),
    };
    let err = h
        .escrow
        .deposit_asset(trade_id, &mallory, &nft(ALICE_NFT, "1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Swap(SwapError::Unauthorized(_))));
    let err = h.escrow.cancel_trade(trade_id, &mallory).await.unwrap_err();
    assert!(matches!(err, Error::Swap(SwapError::Unauthorized(_))));
}

// ── Deposits ────────────────────────────────────────────────────────

#[tokio::test]
async fn deposit_approves_first_when_needed() {
    let h = Harness::new();
    let (offer, trade_id) = h.bound_trade().await;

    assert!(!h
        .ledger
        .is_approved_for_all(&alice().wallet, ALICE_NFT)
        .await
        .unwrap());

    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await
        .unwrap();

    // The coordinator submitted the approval on the way in.
    assert!(h
        .ledger
        .is_approved_for_all(&alice().wallet, ALICE_NFT)
        .await
        .unwrap());

    h.drain_events();
    assert_eq!(
        h.store.get(offer.id).unwrap().status,
        OfferStatus::Depositing
    );
    assert_eq!(h.store.mirror(trade_id).unwrap().deposited_count(), 1);
}

#[tokio::test]
async fn deposit_rejections_surface_the_revert_reason() {
    let h = Harness::new();
    let (_, trade_id) = h.bound_trade().await;

    // Token 3 is alice's but not part of this trade.
    let err = h
        .escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "3"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Swap(SwapError::Validation(_))));

    // Depositing the same asset twice: the second submission reverts and
    // the reason comes back word for word.
    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await
        .unwrap();
    let err = h
        .escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await
        .unwrap_err();
    match err {
        Error::Swap(SwapError::LedgerRejection(reason)) => {
            assert_eq!(reason, "already deposited");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn deposits_wait_for_the_bound_trade() {
    let h = Harness::new();
    let offer = h.accepted_offer();
    h.escrow.initiate_trade(offer.id, &alice()).await.unwrap();

    // Events not yet observed: no binding, so deposits have nowhere to go.
    let err = h
        .escrow
        .deposit_asset(1, &alice(), &nft(ALICE_NFT, "1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Swap(SwapError::NotFound(_))));
}

// ── Cancellation ────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_mid_deposit_returns_assets() {
    let h = Harness::new();
    let (offer, trade_id) = h.bound_trade().await;
    h.escrow
        .deposit_asset(trade_id, &alice(), &nft(ALICE_NFT, "1"))
        .await
        .unwrap();
    h.drain_events();

    h.escrow.cancel_trade(trade_id, &bob()).await.unwrap();
    h.drain_events();

    let cancelled = h.store.get(offer.id).unwrap();
    assert_eq!(cancelled.status, OfferStatus::Cancelled);
    let mirror = h.store.mirror(trade_id).unwrap();
    assert!(!mirror.is_active);
    assert_eq!(mirror.deposited_count(), 0);
    // Alice keeps her token; nothing settled.
    assert_eq!(
        h.ledger.owner_of(ALICE_NFT, "1"),
        Some(alice().wallet.to_lowercase())
    );
}

#[tokio::test]
async fn cancel_after_settlement_reverts_with_trade_not_active() {
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
    assert_eq!(
        h.store.get(offer.id).unwrap().status,
        OfferStatus::Completed
    );

    let err = h.escrow.cancel_trade(trade_id, &alice()).await.unwrap_err();
    match err {
        Error::Swap(SwapError::LedgerRejection(reason)) => {
            assert_eq!(reason, "trade not active");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
