//! Confirms reduced entities against current object state.
//!
//! Events say what happened; objects say what is true now. Every active key
//! from the reducer is checked against the chain and dropped when the
//! object state disagrees. Reads for one pass run concurrently and are all
//! joined before the result is materialized; one entity failing never
//! fails the others.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;

use super::retry::RetryPolicy;
use crate::chain::content::{self, as_object_id, as_u64, field, field_any, scalar_string};
use crate::chain::{
    DynamicFieldKey, ObjectOptions, ObjectOwner, ObjectSource, OwnedObjectFilter, SuiObject,
};
use crate::domain::rewards::{stake_weight, to_display};
use crate::domain::{
    ChainEvent, DisplayMetadata, EventPayload, ListingRecord, ObjectId, OwnedNft, PassStats,
    StakePosition,
};
use crate::error::GatewayError;

/// Content fields that describe the object rather than its attributes.
const NON_ATTRIBUTE_FIELDS: &[&str] = &["id", "name", "image_url", "description", "url"];

/// Per-entity outcome of a cross-reference.
#[derive(Debug)]
enum Checked<T> {
    Confirmed(T),
    Contradicted(&'static str),
    Failed(GatewayError),
}

/// Handle on a staking pool's on-chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolHandle {
    /// Pool id.
    pub pool_id: ObjectId,
    /// Id of the pool's `staked_nfts` table.
    pub table_id: ObjectId,
    /// Version the pool became shared at, needed to call its views.
    pub initial_shared_version: Option<u64>,
}

/// Outcome of confirming stake positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StakeCheck {
    /// Positions the stake table confirmed, sorted by pool, then NFT id.
    pub confirmed: Vec<StakePosition>,
    /// Positions whose reads failed, built from their `Staked` events.
    /// They still count toward their pool's stats.
    pub unconfirmed: Vec<StakePosition>,
}

/// Reads object state for listings and stakes.
#[derive(Debug, Clone)]
pub struct CrossReferencer {
    objects: Arc<dyn ObjectSource>,
    retry: RetryPolicy,
    decimal_scale: u64,
}

impl CrossReferencer {
    /// Creates a cross-referencer over an object source.
    #[must_use]
    pub fn new(objects: Arc<dyn ObjectSource>, retry: RetryPolicy, decimal_scale: u64) -> Self {
        Self {
            objects,
            retry,
            decimal_scale,
        }
    }

    async fn read_object(
        &self,
        id: &ObjectId,
        options: ObjectOptions,
        stats_retries: &mut usize,
    ) -> Result<Option<SuiObject>, GatewayError> {
        let attempted = self
            .retry
            .run(id.as_str(), || self.objects.get_object(id, options))
            .await;
        *stats_retries += attempted.retries as usize;
        attempted.result
    }

    async fn read_field(
        &self,
        parent: &ObjectId,
        key: &DynamicFieldKey,
        stats_retries: &mut usize,
    ) -> Result<Option<SuiObject>, GatewayError> {
        let attempted = self
            .retry
            .run(parent.as_str(), || {
                self.objects.get_dynamic_field_object(parent, key)
            })
            .await;
        *stats_retries += attempted.retries as usize;
        attempted.result
    }

    /// Confirms winning `Listed` events against kiosk state.
    ///
    /// A listing survives only if the kiosk still holds a `Listing` field
    /// for the item. The price comes from that field, not from the event.
    /// The result is sorted newest first.
    pub async fn verify_listings(
        &self,
        winners: &[&ChainEvent],
        stats: &mut PassStats,
    ) -> Vec<ListingRecord> {
        let checks = winners.iter().map(|event| async move {
            let mut retries = 0;
            let checked = self.check_listing(event, &mut retries).await;
            (event, checked, retries)
        });
        let settled = join_all(checks).await;

        let mut listings = Vec::new();
        for (event, checked, retries) in settled {
            stats.retries += retries;
            match checked {
                Checked::Confirmed(record) => listings.push(record),
                Checked::Contradicted(reason) => {
                    stats.dropped_on_contradiction += 1;
                    tracing::debug!(event_id = %event.id, reason, "listing dropped");
                }
                Checked::Failed(e) => {
                    stats.read_failures += 1;
                    tracing::warn!(event_id = %event.id, error = %e, "listing read failed");
                }
            }
        }
        listings.sort_by(|a, b| {
            b.listed_at
                .cmp(&a.listed_at)
                .then_with(|| a.object_id.cmp(&b.object_id))
        });
        listings
    }

    async fn check_listing(&self, event: &ChainEvent, retries: &mut usize) -> Checked<ListingRecord> {
        let EventPayload::Listed {
            item_id, kiosk_id, ..
        } = &event.payload
        else {
            return Checked::Contradicted("not a listing event");
        };

        let key = DynamicFieldKey::kiosk_listing(item_id);
        let listing = match self.read_field(kiosk_id, &key, retries).await {
            Ok(Some(listing)) => listing,
            Ok(None) => return Checked::Contradicted("kiosk has no listing for item"),
            Err(e) => return Checked::Failed(e),
        };
        let Some(price) = listing.field("value").and_then(as_u64) else {
            return Checked::Contradicted("listing field has no price");
        };

        let item = match self.read_object(item_id, ObjectOptions::full(), retries).await {
            Ok(Some(item)) => item,
            Ok(None) => return Checked::Contradicted("listed item does not exist"),
            Err(e) => return Checked::Failed(e),
        };

        let metadata = object_metadata(&item);
        Checked::Confirmed(ListingRecord {
            object_id: item_id.clone(),
            kiosk_id: kiosk_id.clone(),
            price: to_display(u128::from(price), self.decimal_scale),
            price_in_base_units: price,
            display_name: metadata
                .name
                .clone()
                .unwrap_or_else(|| fallback_name(item.object_type.as_deref(), item_id)),
            image_ref: metadata.image_url,
            listed_at: event.timestamp_ms,
            source_event_id: event.id.clone(),
            item_type: item.object_type,
            attributes: metadata.attributes,
        })
    }

    /// Resolves the `staked_nfts` table of each pool.
    ///
    /// A missing pool or a pool without the table resolves to
    /// [`GatewayError::NotFound`]; a failed read keeps its transport error.
    /// Positions in either kind of pool are dropped or skipped later, one
    /// by one, so the counters reflect positions rather than pools.
    pub async fn pool_handles(
        &self,
        pool_ids: &[ObjectId],
        stats: &mut PassStats,
    ) -> BTreeMap<ObjectId, Result<PoolHandle, GatewayError>> {
        let reads = pool_ids.iter().map(|pool_id| async move {
            let mut retries = 0;
            let read = self
                .read_object(pool_id, ObjectOptions::full(), &mut retries)
                .await;
            (pool_id, read, retries)
        });

        let mut handles = BTreeMap::new();
        for (pool_id, read, retries) in join_all(reads).await {
            stats.retries += retries;
            let handle = match read {
                Ok(Some(pool)) => pool_handle(&pool).ok_or_else(|| {
                    tracing::debug!(%pool_id, "pool has no stake table");
                    GatewayError::NotFound(format!("stake table of pool {pool_id}"))
                }),
                Ok(None) => {
                    tracing::debug!(%pool_id, "pool object does not exist");
                    Err(GatewayError::NotFound(format!("pool {pool_id}")))
                }
                Err(e) => {
                    tracing::warn!(%pool_id, error = %e, "pool read failed");
                    Err(e)
                }
            };
            handles.insert(pool_id.clone(), handle);
        }
        handles
    }

    /// Confirms winning `Staked` events against the pools' stake tables.
    ///
    /// A position is confirmed only if the table holds an entry for the
    /// NFT and that entry's owner is `owner`. The stake time comes from the
    /// entry. A position whose pool or entry read failed lands in
    /// [`StakeCheck::unconfirmed`] with the event's own stake time.
    pub async fn verify_stakes(
        &self,
        owner: &ObjectId,
        winners: &[&ChainEvent],
        handles: &BTreeMap<ObjectId, Result<PoolHandle, GatewayError>>,
        now_ms: u64,
        stats: &mut PassStats,
    ) -> StakeCheck {
        let checks = winners.iter().map(|event| async move {
            let mut retries = 0;
            let checked = self
                .check_stake(owner, event, handles, now_ms, &mut retries)
                .await;
            (event, checked, retries)
        });
        let settled = join_all(checks).await;

        let mut check = StakeCheck::default();
        for (event, checked, retries) in settled {
            stats.retries += retries;
            match checked {
                Checked::Confirmed(position) => check.confirmed.push(position),
                Checked::Contradicted(reason) => {
                    stats.dropped_on_contradiction += 1;
                    tracing::debug!(event_id = %event.id, %owner, reason, "stake dropped");
                }
                Checked::Failed(e) => {
                    stats.read_failures += 1;
                    tracing::warn!(event_id = %event.id, %owner, error = %e, "stake read failed");
                    if let Some(position) = event_position(owner, event, now_ms) {
                        check.unconfirmed.push(position);
                    }
                }
            }
        }
        check.confirmed.sort_by(by_pool_then_nft);
        check.unconfirmed.sort_by(by_pool_then_nft);
        check
    }

    async fn check_stake(
        &self,
        owner: &ObjectId,
        event: &ChainEvent,
        handles: &BTreeMap<ObjectId, Result<PoolHandle, GatewayError>>,
        now_ms: u64,
        retries: &mut usize,
    ) -> Checked<StakePosition> {
        let EventPayload::Staked {
            nft_id,
            pool_id,
            stake_time_ms,
            ..
        } = &event.payload
        else {
            return Checked::Contradicted("not a stake event");
        };
        let handle = match handles.get(pool_id) {
            Some(Ok(handle)) => handle,
            Some(Err(GatewayError::NotFound(_))) | None => {
                return Checked::Contradicted("pool has no stake table");
            }
            Some(Err(e)) => return Checked::Failed(e.clone()),
        };

        let key = DynamicFieldKey::object_id(nft_id);
        let entry = match self.read_field(&handle.table_id, &key, retries).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Checked::Contradicted("no stake table entry"),
            Err(e) => return Checked::Failed(e),
        };
        let Some(info) = entry.field("value") else {
            return Checked::Contradicted("stake entry has no value");
        };

        match field_any(info, &["owner", "staker"]).and_then(as_object_id) {
            Some(recorded) if &recorded == owner => {}
            Some(_) => return Checked::Contradicted("stake owner mismatch"),
            None => return Checked::Contradicted("stake entry has no owner"),
        }

        let stake_time = field_any(info, &["stake_time", "staked_at", "start_time"])
            .and_then(as_u64)
            .or(*stake_time_ms)
            .unwrap_or(event.timestamp_ms);
        let stake_duration_ms = now_ms.saturating_sub(stake_time);

        Checked::Confirmed(StakePosition {
            nft_id: nft_id.clone(),
            pool_id: pool_id.clone(),
            owner: owner.clone(),
            stake_time,
            stake_duration_ms,
            weight: stake_weight(stake_duration_ms),
            display_metadata: field(info, "nft").map(nested_metadata).unwrap_or_default(),
        })
    }

    /// Lists the kiosks an owner controls, via their `KioskOwnerCap`s.
    ///
    /// # Errors
    ///
    /// Returns the source error when the owned-object query fails.
    pub async fn owned_kiosks(
        &self,
        owner: &ObjectId,
        cap_type: &str,
    ) -> Result<Vec<ObjectId>, GatewayError> {
        let filter = OwnedObjectFilter::StructType(cap_type.to_string());
        let caps = self
            .objects
            .get_owned_objects(owner, &filter, ObjectOptions::content())
            .await?;
        Ok(caps
            .iter()
            .filter_map(|cap| cap.field("for").and_then(as_object_id))
            .collect())
    }

    /// Lists NFTs of `nft_type` held directly by an owner.
    ///
    /// # Errors
    ///
    /// Returns the source error when the owned-object query fails.
    pub async fn owned_nfts(
        &self,
        owner: &ObjectId,
        nft_type: &str,
    ) -> Result<Vec<OwnedNft>, GatewayError> {
        let filter = OwnedObjectFilter::StructType(nft_type.to_string());
        let objects = self
            .objects
            .get_owned_objects(owner, &filter, ObjectOptions::full())
            .await?;
        let mut nfts: Vec<_> = objects
            .into_iter()
            .map(|object| OwnedNft {
                display_metadata: object_metadata(&object),
                nft_id: object.object_id,
                nft_type: object.object_type,
            })
            .collect();
        nfts.sort_by(|a, b| a.nft_id.cmp(&b.nft_id));
        Ok(nfts)
    }
}

fn by_pool_then_nft(a: &StakePosition, b: &StakePosition) -> std::cmp::Ordering {
    a.pool_id
        .cmp(&b.pool_id)
        .then_with(|| a.nft_id.cmp(&b.nft_id))
}

/// Position as the `Staked` event alone describes it.
fn event_position(owner: &ObjectId, event: &ChainEvent, now_ms: u64) -> Option<StakePosition> {
    let EventPayload::Staked {
        nft_id,
        pool_id,
        stake_time_ms,
        ..
    } = &event.payload
    else {
        return None;
    };
    let stake_time = stake_time_ms.unwrap_or(event.timestamp_ms);
    let stake_duration_ms = now_ms.saturating_sub(stake_time);
    Some(StakePosition {
        nft_id: nft_id.clone(),
        pool_id: pool_id.clone(),
        owner: owner.clone(),
        stake_time,
        stake_duration_ms,
        weight: stake_weight(stake_duration_ms),
        display_metadata: DisplayMetadata::default(),
    })
}

fn pool_handle(pool: &SuiObject) -> Option<PoolHandle> {
    let table_id =
        content::path(pool.content.as_ref()?, &["staked_nfts", "id"]).and_then(as_object_id)?;
    let initial_shared_version = match pool.owner {
        Some(ObjectOwner::Shared {
            initial_shared_version,
        }) => Some(initial_shared_version),
        _ => None,
    };
    Some(PoolHandle {
        pool_id: pool.object_id.clone(),
        table_id,
        initial_shared_version,
    })
}

/// Metadata of a top-level object: `Display` first, content fields second.
fn object_metadata(object: &SuiObject) -> DisplayMetadata {
    let content = object
        .content
        .as_ref()
        .map(nested_metadata)
        .unwrap_or_default();
    let display = |key: &str| object.display.get(key).cloned();
    DisplayMetadata {
        name: display("name").or(content.name),
        image_url: display("image_url").or(content.image_url),
        description: display("description").or(content.description),
        attributes: content.attributes,
    }
}

/// Metadata of a Move struct value (nested NFT inside a stake entry, or an
/// object's own content).
fn nested_metadata(value: &Value) -> DisplayMetadata {
    let text = |names: &[&str]| field_any(value, names).and_then(scalar_string);
    let attributes: BTreeMap<String, String> = content::fields(value)
        .map(|fields| {
            fields
                .iter()
                .filter(|(k, _)| !NON_ATTRIBUTE_FIELDS.contains(&k.as_str()))
                .filter_map(|(k, v)| scalar_string(v).map(|s| (k.clone(), s)))
                .collect()
        })
        .unwrap_or_default();
    DisplayMetadata {
        name: text(&["name"]),
        image_url: text(&["image_url", "url"]),
        description: text(&["description"]),
        attributes,
    }
}

/// `Type #abcd…` when an item has no display name.
fn fallback_name(object_type: Option<&str>, id: &ObjectId) -> String {
    let short_type = object_type
        .map(|t| t.split('<').next().unwrap_or(t))
        .and_then(|t| t.rsplit("::").next())
        .unwrap_or("Item");
    format!("{short_type} #{}", id.short())
}
