//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

/// OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "merge-chain-gateway",
        description = "Read-only gateway serving kiosk listings and NFT staking state reconstructed from Sui events and objects.",
    ),
    paths(
        crate::api::handlers::system::health_handler,
        crate::api::handlers::system::chain_config_handler,
        crate::api::handlers::listings::list_listings,
        crate::api::handlers::owners::owner_listings,
        crate::api::handlers::owners::owner_stakes,
        crate::api::handlers::owners::owner_nfts,
        crate::api::handlers::refresh::refresh,
    ),
    components(
        schemas(
            crate::api::dto::HealthResponse,
            crate::api::dto::ChainConfigResponse,
            crate::api::dto::PoolConfigDto,
            crate::api::dto::PaginationMeta,
            crate::api::dto::SnapshotMeta,
            crate::api::dto::LoadingResponse,
            crate::api::dto::ListingDto,
            crate::api::dto::ListingListResponse,
            crate::api::dto::OwnerListingsResponse,
            crate::api::dto::StakePositionDto,
            crate::api::dto::PoolRewardDto,
            crate::api::dto::RewardTotalsDto,
            crate::api::dto::StakeSnapshotResponse,
            crate::api::dto::OwnedNftDto,
            crate::api::dto::OwnedNftsResponse,
            crate::api::dto::RefreshRequest,
            crate::api::dto::RefreshResponse,
            crate::domain::ObjectId,
            crate::domain::DisplayMetadata,
            crate::domain::PassStats,
            crate::error::ErrorResponse,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "System", description = "Health and configuration"),
        (name = "Listings", description = "Kiosk listings of the collection"),
        (name = "Owners", description = "Per-owner listings, stakes, and wallet NFTs"),
        (name = "Refresh", description = "Manual pass triggers"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/config/chain",
            "/api/v1/listings",
            "/api/v1/owners/{owner}/listings",
            "/api/v1/owners/{owner}/stakes",
            "/api/v1/owners/{owner}/nfts",
            "/api/v1/refresh",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
