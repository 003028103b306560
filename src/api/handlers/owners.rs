//! Per-owner views: kiosk listings, stake positions, wallet NFTs.

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use super::{NotReady, ready, snapshot_meta};
use crate::api::dto::{
    ListingDto, LoadingResponse, OwnedNftDto, OwnedNftsResponse, OwnerListingsResponse,
    PoolRewardDto, RewardTotalsDto, StakePositionDto, StakeSnapshotResponse,
};
use crate::app_state::AppState;
use crate::domain::{ObjectId, Topic};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /owners/{owner}/listings` — Active listings in the owner's kiosks.
///
/// # Errors
///
/// Returns `400` for a bad address, `202`/`503` per the listings snapshot
/// state, and `502` when the owned-kiosk query fails.
#[utoipa::path(
    get,
    path = "/api/v1/owners/{owner}/listings",
    tag = "Owners",
    summary = "Listings owned by an address",
    description = "Resolves the kiosks the owner controls through their KioskOwnerCap objects and returns the active listings held in them.",
    params(("owner" = String, Path, description = "Owner address")),
    responses(
        (status = 200, description = "Owner listings", body = OwnerListingsResponse),
        (status = 202, description = "First listings pass still running", body = LoadingResponse),
        (status = 400, description = "Invalid address", body = ErrorResponse),
        (status = 502, description = "Chain read failed", body = ErrorResponse),
        (status = 503, description = "Latest listings pass failed", body = ErrorResponse),
    )
)]
pub async fn owner_listings(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<OwnerListingsResponse>, NotReady> {
    let owner = ObjectId::parse(&owner)?;
    let (seq, snapshot) = ready(Topic::Listings, state.store.listings().await)?;
    let kiosks = state.scheduler.engine().owned_kiosks(&owner).await?;
    let owned: BTreeSet<&ObjectId> = kiosks.iter().collect();
    let data = snapshot
        .listings
        .iter()
        .filter(|l| owned.contains(&l.kiosk_id))
        .map(ListingDto::from)
        .collect();
    Ok(Json(OwnerListingsResponse {
        owner,
        kiosks,
        data,
        snapshot: snapshot_meta(seq, snapshot.generated_at_ms, &snapshot.stats),
    }))
}

/// `GET /owners/{owner}/stakes` — Stake positions and rewards.
///
/// The first request for an owner starts tracking it and answers `202`.
/// Every request keeps the owner from being dropped as idle.
///
/// # Errors
///
/// Returns `400` for a bad address, `202` while the owner's first pass
/// runs, and `503` after a failed pass.
#[utoipa::path(
    get,
    path = "/api/v1/owners/{owner}/stakes",
    tag = "Owners",
    summary = "Stake positions and rewards",
    description = "Returns confirmed staked NFTs, a per-pool reward breakdown in configured pool order, and totals. Amounts are base-unit strings with display twins.",
    params(("owner" = String, Path, description = "Owner address")),
    responses(
        (status = 200, description = "Stake snapshot", body = StakeSnapshotResponse),
        (status = 202, description = "Owner pass still running", body = LoadingResponse),
        (status = 400, description = "Invalid address", body = ErrorResponse),
        (status = 503, description = "Latest stakes pass failed", body = ErrorResponse),
    )
)]
pub async fn owner_stakes(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<StakeSnapshotResponse>, NotReady> {
    let owner = ObjectId::parse(&owner)?;
    let topic = Topic::Stakes(owner.clone());
    if state.scheduler.track_owner(owner.clone()).await {
        return Err(NotReady::Loading(topic));
    }
    let Some(current) = state.store.stakes(&owner).await else {
        return Err(NotReady::Loading(topic));
    };
    let (seq, snapshot) = ready(topic, current)?;
    let scale = state.scheduler.engine().settings().decimal_scale;
    Ok(Json(StakeSnapshotResponse {
        owner,
        positions: snapshot.positions.iter().map(StakePositionDto::from).collect(),
        pool_breakdown: snapshot
            .pool_breakdown
            .iter()
            .map(|s| PoolRewardDto::new(s, scale))
            .collect(),
        totals: RewardTotalsDto::new(&snapshot.totals, scale),
        snapshot: snapshot_meta(seq, snapshot.generated_at_ms, &snapshot.stats),
    }))
}

/// `GET /owners/{owner}/nfts` — Collection NFTs in the owner's wallet.
///
/// # Errors
///
/// Returns `400` for a bad address, `500` when the NFT type is not
/// configured, and `502` when the chain read fails.
#[utoipa::path(
    get,
    path = "/api/v1/owners/{owner}/nfts",
    tag = "Owners",
    summary = "Stakeable NFTs in a wallet",
    description = "Reads the owner's wallet directly. Not cached; every request queries the node.",
    params(("owner" = String, Path, description = "Owner address")),
    responses(
        (status = 200, description = "Owned NFTs", body = OwnedNftsResponse),
        (status = 400, description = "Invalid address", body = ErrorResponse),
        (status = 500, description = "NFT type not configured", body = ErrorResponse),
        (status = 502, description = "Chain read failed", body = ErrorResponse),
    )
)]
pub async fn owner_nfts(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<OwnedNftsResponse>, GatewayError> {
    let owner = ObjectId::parse(&owner)?;
    let nfts = state.scheduler.engine().owned_nfts(&owner).await?;
    Ok(Json(OwnedNftsResponse {
        owner,
        data: nfts.into_iter().map(OwnedNftDto::from).collect(),
    }))
}

/// Owner routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/owners/{owner}/listings", get(owner_listings))
        .route("/owners/{owner}/stakes", get(owner_stakes))
        .route("/owners/{owner}/nfts", get(owner_nfts))
}
