//! Global kiosk listings.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use super::{NotReady, ready, snapshot_meta};
use crate::api::dto::{ListingDto, ListingListResponse, LoadingResponse, PaginationParams};
use crate::app_state::AppState;
use crate::domain::Topic;
use crate::error::ErrorResponse;

/// `GET /listings` — Active listings from the latest snapshot, newest first.
///
/// # Errors
///
/// Returns `202` while the first pass runs and `503` after a failed pass.
#[utoipa::path(
    get,
    path = "/api/v1/listings",
    tag = "Listings",
    summary = "List active listings",
    description = "Returns confirmed kiosk listings of the collection from the latest reconstruction pass. An empty page with status 200 means the pass succeeded and found nothing.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated listings", body = ListingListResponse),
        (status = 202, description = "First pass still running", body = LoadingResponse),
        (status = 503, description = "Latest pass failed", body = ErrorResponse),
    )
)]
pub async fn list_listings(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ListingListResponse>, NotReady> {
    let (seq, snapshot) = ready(Topic::Listings, state.store.listings().await)?;
    let (page, pagination) = params.paginate(&snapshot.listings);
    Ok(Json(ListingListResponse {
        data: page.iter().map(ListingDto::from).collect(),
        pagination,
        snapshot: snapshot_meta(seq, snapshot.generated_at_ms, &snapshot.stats),
    }))
}

/// Listing routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/listings", get(list_listings))
}
