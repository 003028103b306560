//! Listing DTOs.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::{PaginationMeta, SnapshotMeta};
use crate::domain::{ListingRecord, ObjectId};

/// One confirmed kiosk listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ListingDto {
    /// Listed item id.
    pub object_id: ObjectId,
    /// Kiosk holding the item.
    pub kiosk_id: ObjectId,
    /// Price in display units (SUI).
    pub price: f64,
    /// Price in base units (string-encoded u64).
    pub price_in_base_units: String,
    /// Display name.
    pub display_name: String,
    /// Image URL.
    pub image_ref: Option<String>,
    /// Listing time in epoch milliseconds.
    pub listed_at: u64,
    /// `txDigest:eventSeq` of the listing event.
    pub source_event_id: String,
    /// Move type of the item.
    pub item_type: Option<String>,
    /// Scalar item attributes.
    pub attributes: BTreeMap<String, String>,
}

impl From<&ListingRecord> for ListingDto {
    fn from(record: &ListingRecord) -> Self {
        Self {
            object_id: record.object_id.clone(),
            kiosk_id: record.kiosk_id.clone(),
            price: record.price,
            price_in_base_units: record.price_in_base_units.to_string(),
            display_name: record.display_name.clone(),
            image_ref: record.image_ref.clone(),
            listed_at: record.listed_at,
            source_event_id: record.source_event_id.to_string(),
            item_type: record.item_type.clone(),
            attributes: record.attributes.clone(),
        }
    }
}

/// Paginated response for `GET /listings`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListingListResponse {
    /// Listings on this page, newest first.
    pub data: Vec<ListingDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
    /// Snapshot freshness.
    pub snapshot: SnapshotMeta,
}

/// Response for `GET /owners/{owner}/listings`.
#[derive(Debug, Serialize, ToSchema)]
pub struct OwnerListingsResponse {
    /// Owner address.
    pub owner: ObjectId,
    /// Kiosks the owner controls.
    pub kiosks: Vec<ObjectId>,
    /// Active listings in those kiosks.
    pub data: Vec<ListingDto>,
    /// Snapshot freshness.
    pub snapshot: SnapshotMeta,
}
