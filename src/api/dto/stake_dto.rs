//! Stake, reward, and wallet DTOs.
//!
//! Base-unit amounts are serialized as JSON strings so u128 sums survive
//! JavaScript clients; each carries a `_display` twin in whole units.

use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::SnapshotMeta;
use crate::domain::rewards::{duration_days, duration_hours, to_display};
use crate::domain::{
    DisplayMetadata, ObjectId, OwnedNft, PoolRewardStats, RewardTotals, StakePosition,
};

/// One staked NFT.
#[derive(Debug, Serialize, ToSchema)]
pub struct StakePositionDto {
    /// Staked NFT id.
    pub nft_id: ObjectId,
    /// Pool id.
    pub pool_id: ObjectId,
    /// Stake start in epoch milliseconds.
    pub stake_time: u64,
    /// Time staked in milliseconds.
    pub stake_duration_ms: u64,
    /// Whole hours staked.
    pub stake_hours: u64,
    /// Whole days staked.
    pub stake_days: u64,
    /// Position weight.
    pub weight: u64,
    /// NFT display metadata.
    pub display_metadata: DisplayMetadata,
}

impl From<&StakePosition> for StakePositionDto {
    fn from(p: &StakePosition) -> Self {
        Self {
            nft_id: p.nft_id.clone(),
            pool_id: p.pool_id.clone(),
            stake_time: p.stake_time,
            stake_duration_ms: p.stake_duration_ms,
            stake_hours: duration_hours(p.stake_duration_ms),
            stake_days: duration_days(p.stake_duration_ms),
            weight: p.weight,
            display_metadata: p.display_metadata.clone(),
        }
    }
}

/// Rewards for one pool.
#[derive(Debug, Serialize, ToSchema)]
pub struct PoolRewardDto {
    /// Pool id.
    pub pool_id: ObjectId,
    /// Pool name.
    pub pool_name: String,
    /// NFTs staked in the pool.
    pub nft_count: usize,
    /// Sum of weights.
    pub total_weight: u64,
    /// Pending rewards in base units.
    pub pending_rewards: String,
    /// Pending rewards in display units.
    pub pending_rewards_display: f64,
    /// Claimed rewards in base units.
    pub claimed_rewards: String,
    /// Claimed rewards in display units.
    pub claimed_rewards_display: f64,
    /// Pending plus claimed, base units.
    pub total_earned: String,
    /// Pending plus claimed, display units.
    pub total_earned_display: f64,
    /// Energy estimate.
    pub energy_earned: f64,
    /// Whether a claim may be submitted now.
    pub can_claim_now: bool,
    /// Milliseconds until the next claim.
    pub time_until_next_claim_ms: u64,
    /// Whether on-chain pool state backed the numbers.
    pub authoritative: bool,
}

impl PoolRewardDto {
    /// Converts domain stats using `decimal_scale` for display values.
    #[must_use]
    pub fn new(s: &PoolRewardStats, decimal_scale: u64) -> Self {
        Self {
            pool_id: s.pool_id.clone(),
            pool_name: s.pool_name.clone(),
            nft_count: s.nft_count,
            total_weight: s.total_weight,
            pending_rewards: s.pending_rewards.to_string(),
            pending_rewards_display: to_display(u128::from(s.pending_rewards), decimal_scale),
            claimed_rewards: s.claimed_rewards.to_string(),
            claimed_rewards_display: to_display(s.claimed_rewards, decimal_scale),
            total_earned: s.total_earned.to_string(),
            total_earned_display: to_display(s.total_earned, decimal_scale),
            energy_earned: s.energy_earned,
            can_claim_now: s.can_claim_now,
            time_until_next_claim_ms: s.time_until_next_claim_ms,
            authoritative: s.authoritative,
        }
    }
}

/// Totals across pools.
#[derive(Debug, Serialize, ToSchema)]
pub struct RewardTotalsDto {
    /// Staked NFTs.
    pub nft_count: usize,
    /// Pending rewards in base units.
    pub pending_rewards: String,
    /// Claimed rewards in base units.
    pub claimed_rewards: String,
    /// Total earned in base units.
    pub total_earned: String,
    /// Total earned in display units.
    pub total_earned_display: f64,
    /// Energy estimate.
    pub energy_earned: f64,
}

impl RewardTotalsDto {
    /// Converts domain totals using `decimal_scale` for display values.
    #[must_use]
    pub fn new(t: &RewardTotals, decimal_scale: u64) -> Self {
        Self {
            nft_count: t.nft_count,
            pending_rewards: t.pending_rewards.to_string(),
            claimed_rewards: t.claimed_rewards.to_string(),
            total_earned: t.total_earned.to_string(),
            total_earned_display: to_display(t.total_earned, decimal_scale),
            energy_earned: t.energy_earned,
        }
    }
}

/// Response for `GET /owners/{owner}/stakes`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StakeSnapshotResponse {
    /// Owner address.
    pub owner: ObjectId,
    /// Positions ordered by pool, then NFT id.
    pub positions: Vec<StakePositionDto>,
    /// One entry per pool with positions, in configured order.
    pub pool_breakdown: Vec<PoolRewardDto>,
    /// Totals across pools.
    pub totals: RewardTotalsDto,
    /// Snapshot freshness.
    pub snapshot: SnapshotMeta,
}

/// One NFT held in a wallet.
#[derive(Debug, Serialize, ToSchema)]
pub struct OwnedNftDto {
    /// NFT id.
    pub nft_id: ObjectId,
    /// Move type.
    pub nft_type: Option<String>,
    /// Display metadata.
    pub display_metadata: DisplayMetadata,
}

impl From<OwnedNft> for OwnedNftDto {
    fn from(nft: OwnedNft) -> Self {
        Self {
            nft_id: nft.nft_id,
            nft_type: nft.nft_type,
            display_metadata: nft.display_metadata,
        }
    }
}

/// Response for `GET /owners/{owner}/nfts`.
#[derive(Debug, Serialize, ToSchema)]
pub struct OwnedNftsResponse {
    /// Owner address.
    pub owner: ObjectId,
    /// Stakeable NFTs in the wallet.
    pub data: Vec<OwnedNftDto>,
}
