//! HTTP request handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use swapmeet_types::{Actor, Asset, AssetKey, EscrowTrade, Notification, Offer, SwapError};

use crate::metrics::METRICS;
use crate::response::{HealthResponse, RefreshResponse, SubmitResponse};
use crate::state::AppState;
use crate::Error;

// --- Request payloads ---

#[derive(Deserialize)]
pub struct CreateOfferRequest {
    pub actor: Actor,
    pub counterparty: Actor,
    pub bundle_initiator: Vec<Asset>,
    pub bundle_counterparty: Vec<Asset>,
}

#[derive(Deserialize)]
pub struct CounterOfferRequest {
    pub actor: Actor,
    pub bundle_a: Vec<Asset>,
    pub bundle_b: Vec<Asset>,
}

#[derive(Deserialize)]
pub struct ActorRequest {
    pub actor: Actor,
}

#[derive(Deserialize)]
pub struct DepositRequest {
    pub actor: Actor,
    pub asset: Asset,
}

#[derive(Deserialize)]
pub struct ListOffersQuery {
    pub user: String,
    pub from_index: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub chain_id: u64,
    pub wallet: String,
    pub assets: Vec<Asset>,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub wallet: String,
    pub asset: AssetKey,
}

// --- Negotiation ---

pub async fn create_offer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOfferRequest>,
) -> Result<(StatusCode, Json<Offer>), Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let offer = state.negotiation.create_offer(
        &req.actor,
        &req.counterparty,
        req.bundle_initiator,
        req.bundle_counterparty,
    )?;
    Ok((StatusCode::CREATED, Json(offer)))
}

pub async fn counter_offer(
    State(state): State<Arc<AppState>>,
    Path(offer_id): Path<u64>,
    Json(req): Json<CounterOfferRequest>,
) -> Result<Json<Offer>, Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let offer = state
        .negotiation
        .counter_offer(offer_id, &req.actor, req.bundle_a, req.bundle_b)?;
    Ok(Json(offer))
}

pub async fn accept_offer(
    State(state): State<Arc<AppState>>,
    Path(offer_id): Path<u64>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Offer>, Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let offer = state.negotiation.accept_offer(offer_id, &req.actor)?;
    Ok(Json(offer))
}

pub async fn cancel_offer(
    State(state): State<Arc<AppState>>,
    Path(offer_id): Path<u64>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Offer>, Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let offer = state.negotiation.cancel_negotiation(offer_id, &req.actor)?;
    Ok(Json(offer))
}

pub async fn get_offer(
    State(state): State<Arc<AppState>>,
    Path(offer_id): Path<u64>,
) -> Result<Json<Offer>, Error> {
    Ok(Json(state.negotiation.get_offer(offer_id)?))
}

pub async fn list_offers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOffersQuery>,
) -> Json<Vec<Offer>> {
    Json(
        state
            .negotiation
            .offers_for_user(&query.user, query.from_index, query.limit),
    )
}

// --- Escrow ---

pub async fn initiate_trade(
    State(state): State<Arc<AppState>>,
    Path(offer_id): Path<u64>,
    Json(req): Json<ActorRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let tx_hash = state.escrow.initiate_trade(offer_id, &req.actor).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse::pending(tx_hash))))
}

pub async fn deposit_asset(
    State(state): State<Arc<AppState>>,
    Path(trade_id): Path<u64>,
    Json(req): Json<DepositRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let tx_hash = state
        .escrow
        .deposit_asset(trade_id, &req.actor, &req.asset)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse::pending(tx_hash))))
}

pub async fn cancel_trade(
    State(state): State<Arc<AppState>>,
    Path(trade_id): Path<u64>,
    Json(req): Json<ActorRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let tx_hash = state.escrow.cancel_trade(trade_id, &req.actor).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse::pending(tx_hash))))
}

pub async fn resync_trade(
    State(state): State<Arc<AppState>>,
    Path(trade_id): Path<u64>,
) -> Result<Json<EscrowTrade>, Error> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    Ok(Json(state.escrow.resync(trade_id).await?))
}

/// The locally mirrored trade state, as last confirmed by events or resync.
pub async fn get_trade(
    State(state): State<Arc<AppState>>,
    Path(trade_id): Path<u64>,
) -> Result<Json<EscrowTrade>, Error> {
    state
        .store
        .mirror(trade_id)
        .map(Json)
        .ok_or_else(|| SwapError::trade_not_found(trade_id).into())
}

// --- Notifications & registry ---

pub async fn notifications(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Json<Vec<Notification>> {
    Json(state.notifier.for_user(&user))
}

pub async fn registry_refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, Error> {
    if !swapmeet_types::is_valid_address(&req.wallet) {
        return Err(SwapError::Validation(format!("Invalid wallet: {}", req.wallet)).into());
    }
    let assets = state
        .registry
        .record_owned_assets(req.chain_id, &req.wallet, req.assets);
    Ok(Json(RefreshResponse {
        success: true,
        assets,
    }))
}

pub async fn registry_verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<serde_json::Value>, Error> {
    state.registry.mark_verified(&req.asset, &req.wallet)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// --- Operational ---

/// Readiness probe. The sandbox wiring is ready as soon as state exists.
pub async fn ready() -> StatusCode {
    StatusCode::OK
}

/// Prometheus metrics in text exposition format.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = METRICS.render(
        state.store.open_offer_count(),
        state.store.active_trade_count(),
    );
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        body,
    )
}

/// Health check with store and watcher counters.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        chain_id: state.config.chain_id,
        uptime_secs: state.start_time.elapsed().as_secs(),
        requests: state.request_count.load(Ordering::Relaxed),
        open_offers: state.store.open_offer_count(),
        active_trades: state.store.active_trade_count(),
    })
}
