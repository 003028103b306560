//! Reward, weight, and energy arithmetic for staked NFTs.
//!
//! Everything here is deterministic integer arithmetic over base units and
//! milliseconds. Hour conversions floor. The only floating point value is
//! the informational energy estimate and the display conversion.

use super::{ObjectId, PoolRewardStats, RewardTotals, StakePosition, StakingPool};

/// Milliseconds per hour.
pub const HOUR_MS: u64 = 3_600_000;

/// Milliseconds per day.
pub const DAY_MS: u64 = 24 * HOUR_MS;

/// Base units per display unit for SUI (1 SUI = 10^9 MIST).
pub const DEFAULT_DECIMAL_SCALE: u64 = 1_000_000_000;

/// Whole hours in a duration, floored.
#[must_use]
pub const fn duration_hours(duration_ms: u64) -> u64 {
    duration_ms / HOUR_MS
}

/// Whole days in a duration, floored.
#[must_use]
pub const fn duration_days(duration_ms: u64) -> u64 {
    duration_ms / DAY_MS
}

/// Stake weight: whole hours staked, never less than one.
#[must_use]
pub fn stake_weight(duration_ms: u64) -> u64 {
    duration_hours(duration_ms).max(1)
}

/// Converts a base-unit amount to display units.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn to_display(amount: u128, decimal_scale: u64) -> f64 {
    if decimal_scale == 0 {
        return amount as f64;
    }
    amount as f64 / decimal_scale as f64
}

/// Claim-window state for one owner in one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimWindow {
    /// Whether the interval since the last claim has elapsed.
    pub can_claim_now: bool,
    /// Remaining wait, clamped to zero.
    pub time_until_next_claim_ms: u64,
}

/// Computes the claim window from the last claim time.
#[must_use]
pub const fn claim_window(
    now_ms: u64,
    last_claim_ms: u64,
    claim_interval_ms: u64,
) -> ClaimWindow {
    let elapsed = now_ms.saturating_sub(last_claim_ms);
    ClaimWindow {
        can_claim_now: elapsed >= claim_interval_ms,
        time_until_next_claim_ms: claim_interval_ms.saturating_sub(elapsed),
    }
}

/// Energy accrued by one position.
///
/// `base_rate × floor(hours) × (1 + per_item_multiplier × item_count)`,
/// where `item_count` is the number of the owner's NFTs in the same pool.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn position_energy(
    base_energy_per_hour: f64,
    duration_ms: u64,
    per_item_multiplier: f64,
    item_count: usize,
) -> f64 {
    let hours = duration_hours(duration_ms) as f64;
    base_energy_per_hour * hours * (1.0 + per_item_multiplier * item_count as f64)
}

/// On-chain reward state for one owner in one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolAuthority {
    /// Pending rewards as reported by the pool.
    pub pending_rewards: u64,
    /// Last claim time, `None` if the owner never claimed.
    pub last_claim_ms: Option<u64>,
}

/// Inputs for [`pool_stats`] beyond the positions themselves.
#[derive(Debug, Clone, Copy)]
pub struct RewardInputs {
    /// Pass time.
    pub now_ms: u64,
    /// Sum of all claims for this owner and pool.
    pub claimed_rewards: u128,
    /// Energy multiplier per NFT in the pool.
    pub per_item_multiplier: f64,
}

/// Aggregates one pool's positions into reward statistics.
///
/// When `authority` is `None` (the on-chain read failed) the pool still gets
/// an entry, with zero pending rewards and claiming disabled for a full
/// interval. When the owner never claimed, the interval counts from the
/// earliest stake in the pool.
#[must_use]
pub fn pool_stats(
    pool: &StakingPool,
    positions: &[&StakePosition],
    authority: Option<PoolAuthority>,
    inputs: RewardInputs,
) -> PoolRewardStats {
    let nft_count = positions.len();
    let total_weight: u64 = positions.iter().map(|p| p.weight).sum();
    let energy_earned: f64 = positions
        .iter()
        .map(|p| {
            position_energy(
                pool.base_energy_per_hour,
                p.stake_duration_ms,
                inputs.per_item_multiplier,
                nft_count,
            )
        })
        .sum();

    let (pending_rewards, window) = match authority {
        Some(state) => {
            let first_stake = positions
                .iter()
                .map(|p| p.stake_time)
                .min()
                .unwrap_or(inputs.now_ms);
            let last_claim = state.last_claim_ms.unwrap_or(first_stake);
            (
                state.pending_rewards,
                claim_window(inputs.now_ms, last_claim, pool.claim_interval_ms),
            )
        }
        None => (
            0,
            ClaimWindow {
                can_claim_now: false,
                time_until_next_claim_ms: pool.claim_interval_ms,
            },
        ),
    };

    PoolRewardStats {
        pool_id: pool.pool_id.clone(),
        pool_name: pool.name.clone(),
        nft_count,
        total_weight,
        pending_rewards,
        claimed_rewards: inputs.claimed_rewards,
        total_earned: u128::from(pending_rewards) + inputs.claimed_rewards,
        energy_earned,
        can_claim_now: window.can_claim_now,
        time_until_next_claim_ms: window.time_until_next_claim_ms,
        authoritative: authority.is_some(),
    }
}

/// Sums a pool breakdown into totals.
#[must_use]
pub fn totals(breakdown: &[PoolRewardStats]) -> RewardTotals {
    breakdown.iter().fold(RewardTotals::default(), |acc, s| RewardTotals {
        nft_count: acc.nft_count + s.nft_count,
        pending_rewards: acc.pending_rewards + u128::from(s.pending_rewards),
        claimed_rewards: acc.claimed_rewards + s.claimed_rewards,
        total_earned: acc.total_earned + s.total_earned,
        energy_earned: acc.energy_earned + s.energy_earned,
    })
}

/// Sums claim amounts for one owner and pool out of `(owner, pool, amount)`
/// triples.
#[must_use]
pub fn claimed_total<'a>(
    claims: impl IntoIterator<Item = (&'a ObjectId, &'a ObjectId, u64)>,
    owner: &ObjectId,
    pool_id: &ObjectId,
) -> u128 {
    claims
        .into_iter()
        .filter(|(o, p, _)| *o == owner && *p == pool_id)
        .map(|(_, _, amount)| u128::from(amount))
        .sum()
}
