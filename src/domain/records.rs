//! Reconstructed read-model records and the snapshots that carry them.
//!
//! Every record here is derived: nothing is stored on-chain in this shape.
//! Snapshots are built once per reconstruction pass and then shared as
//! `Arc`s; they are never mutated after publication.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use super::{EventId, ObjectId};

/// Display metadata resolved from an object's `Display` or nested content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct DisplayMetadata {
    /// Display name.
    pub name: Option<String>,
    /// Image URL.
    pub image_url: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Scalar attributes from the object's content (level, rarity, ...).
    pub attributes: BTreeMap<String, String>,
}

/// Staking pool as configured for this deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakingPool {
    /// Shared pool object id.
    pub pool_id: ObjectId,
    /// Human-readable pool name.
    pub name: String,
    /// Minimum time between two reward claims.
    pub claim_interval_ms: u64,
    /// Energy accrued per staked NFT per full hour.
    pub base_energy_per_hour: f64,
}

/// A kiosk listing confirmed against current kiosk state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRecord {
    /// Listed item object id.
    pub object_id: ObjectId,
    /// Kiosk holding the item.
    pub kiosk_id: ObjectId,
    /// Current price in display units.
    pub price: f64,
    /// Current price in base units, as read from the kiosk.
    pub price_in_base_units: u64,
    /// Display name, falling back to the item type's short name.
    pub display_name: String,
    /// Image URL, if the item has one.
    pub image_ref: Option<String>,
    /// Time of the winning `Listed` event.
    pub listed_at: u64,
    /// Event that put the item on sale.
    pub source_event_id: EventId,
    /// Move type of the item.
    pub item_type: Option<String>,
    /// Nested item data.
    pub attributes: BTreeMap<String, String>,
}

/// An NFT currently staked by an owner in a pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakePosition {
    /// Staked NFT.
    pub nft_id: ObjectId,
    /// Pool it is staked in.
    pub pool_id: ObjectId,
    /// Staking owner.
    pub owner: ObjectId,
    /// Stake start in epoch milliseconds.
    pub stake_time: u64,
    /// Time staked as of the pass.
    pub stake_duration_ms: u64,
    /// `max(1, floor(duration / hour))`.
    pub weight: u64,
    /// Display metadata of the NFT.
    pub display_metadata: DisplayMetadata,
}

/// Reward statistics for one owner in one pool.
///
/// Amounts are base units. `total_earned` is always the sum of
/// `pending_rewards` and `claimed_rewards`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolRewardStats {
    /// Pool id.
    pub pool_id: ObjectId,
    /// Pool name.
    pub pool_name: String,
    /// Number of the owner's NFTs in the pool.
    pub nft_count: usize,
    /// Sum of position weights.
    pub total_weight: u64,
    /// Rewards accrued but not yet claimed, from on-chain state.
    pub pending_rewards: u64,
    /// Sum of every claim the owner made from this pool.
    pub claimed_rewards: u128,
    /// `pending_rewards + claimed_rewards`.
    pub total_earned: u128,
    /// Informational energy estimate.
    pub energy_earned: f64,
    /// Whether a claim may be submitted now.
    pub can_claim_now: bool,
    /// Milliseconds until the next claim is allowed (zero when allowed).
    pub time_until_next_claim_ms: u64,
    /// Whether on-chain pool state was read successfully.
    pub authoritative: bool,
}

/// Sums across every pool in a stake snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RewardTotals {
    /// Total staked NFTs.
    pub nft_count: usize,
    /// Total pending rewards.
    pub pending_rewards: u128,
    /// Total claimed rewards.
    pub claimed_rewards: u128,
    /// Total earned rewards.
    pub total_earned: u128,
    /// Total energy estimate.
    pub energy_earned: f64,
}

/// Diagnostic counters for one reconstruction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PassStats {
    /// Raw events returned by the node.
    pub events_fetched: usize,
    /// Events dropped as duplicates of an already seen id.
    pub duplicates_dropped: usize,
    /// Events skipped for missing or invalid payload fields.
    pub malformed_skipped: usize,
    /// Keys whose winning event was an open kind.
    pub active_after_reduction: usize,
    /// Entities dropped because object state disagreed with the events.
    pub dropped_on_contradiction: usize,
    /// Entities skipped after their reads kept failing.
    pub read_failures: usize,
    /// Read retries issued during cross-referencing.
    pub retries: usize,
    /// Positions skipped because their pool is not configured.
    pub unknown_pool_skipped: usize,
}

/// Result of a listings pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingsSnapshot {
    /// Confirmed listings, newest first.
    pub listings: Vec<ListingRecord>,
    /// Pass time in epoch milliseconds.
    pub generated_at_ms: u64,
    /// Pass diagnostics.
    pub stats: PassStats,
}

/// Result of a stakes pass for one owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeSnapshot {
    /// Owner the snapshot was built for.
    pub owner: ObjectId,
    /// Confirmed positions ordered by pool, then NFT id.
    pub positions: Vec<StakePosition>,
    /// One entry per pool holding at least one position, confirmed or
    /// not.
    pub pool_breakdown: Vec<PoolRewardStats>,
    /// Sums across the breakdown.
    pub totals: RewardTotals,
    /// Pass time in epoch milliseconds.
    pub generated_at_ms: u64,
    /// Pass diagnostics.
    pub stats: PassStats,
}

/// A stakeable NFT held directly in an owner's wallet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnedNft {
    /// NFT object id.
    pub nft_id: ObjectId,
    /// Move type of the NFT.
    pub nft_type: Option<String>,
    /// Display metadata.
    pub display_metadata: DisplayMetadata,
}
