//! Latest published snapshot per topic, with last-writer-wins ordering.
//!
//! [`SnapshotStore`] holds one slot per [`Topic`]: the listings topic and
//! one stakes topic per tracked owner. Every pass is stamped with a
//! sequence number when it starts; a slot only accepts a result stamped
//! later than the one it already holds, so a slow pass that finishes after
//! a newer one can never overwrite it.
//!
//! Owners tracked on demand carry the time they were last requested. The
//! scheduler prunes idle ones, and the store evicts the least recently
//! requested one when a new owner would exceed its limit. Owners passed to
//! [`SnapshotStore::new`] are pinned and never evicted.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{ListingsSnapshot, ObjectId, StakeSnapshot};
use crate::error::GatewayError;

/// Reconstruction topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Global kiosk listings.
    Listings,
    /// Stake positions and rewards of one owner.
    Stakes(ObjectId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listings => f.write_str("listings"),
            Self::Stakes(owner) => write!(f, "stakes:{owner}"),
        }
    }
}

impl FromStr for Topic {
    type Err = GatewayError;

    /// Accepts `listings`, `stakes:<owner>`, or a bare owner address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "listings" {
            return Ok(Self::Listings);
        }
        let owner = s.strip_prefix("stakes:").unwrap_or(s);
        Ok(Self::Stakes(ObjectId::parse(owner)?))
    }
}

/// What a consumer sees for a topic.
///
/// Loading, ready (possibly empty), and failed are deliberately distinct
/// so the UI never mistakes a failed pass for an empty result.
#[derive(Debug)]
pub enum SnapshotState<T> {
    /// No pass has completed yet.
    Loading,
    /// The latest pass succeeded.
    Ready {
        /// Sequence number of the pass.
        seq: u64,
        /// Published snapshot.
        snapshot: Arc<T>,
    },
    /// The latest pass failed.
    Failed {
        /// Sequence number of the failed pass.
        seq: u64,
        /// Why it failed.
        error: GatewayError,
        /// Last successful snapshot, if any.
        last_good: Option<Arc<T>>,
    },
}

impl<T> Clone for SnapshotState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Loading => Self::Loading,
            Self::Ready { seq, snapshot } => Self::Ready {
                seq: *seq,
                snapshot: Arc::clone(snapshot),
            },
            Self::Failed {
                seq,
                error,
                last_good,
            } => Self::Failed {
                seq: *seq,
                error: error.clone(),
                last_good: last_good.as_ref().map(Arc::clone),
            },
        }
    }
}

impl<T> SnapshotState<T> {
    /// Sequence number of the pass behind this state, zero while loading.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        match self {
            Self::Loading => 0,
            Self::Ready { seq, .. } | Self::Failed { seq, .. } => *seq,
        }
    }

    /// Short status label for responses and logs.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready { .. } => "ready",
            Self::Failed { .. } => "failed",
        }
    }

    /// Applies a pass result if it is newer than the current state.
    ///
    /// Returns `false` and leaves the state untouched for stale results.
    fn apply(&mut self, seq: u64, result: Result<Arc<T>, GatewayError>) -> bool {
        if seq <= self.seq() {
            return false;
        }
        *self = match result {
            Ok(snapshot) => Self::Ready { seq, snapshot },
            Err(error) => {
                let last_good = match self {
                    Self::Ready { snapshot, .. } => Some(Arc::clone(snapshot)),
                    Self::Failed { last_good, .. } => last_good.take(),
                    Self::Loading => None,
                };
                Self::Failed {
                    seq,
                    error,
                    last_good,
                }
            }
        };
        true
    }
}

/// Default limit on owners tracked on demand.
pub const DEFAULT_MAX_TRACKED_OWNERS: usize = 1_000;

/// Outcome of [`SnapshotStore::track_owner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tracking {
    /// The owner was already tracked; its request time moved forward.
    Refreshed,
    /// The owner is new. `evicted` was dropped to stay within the limit.
    Added {
        /// Owner evicted to make room, if any.
        evicted: Option<ObjectId>,
    },
}

#[derive(Debug)]
struct OwnerSlot {
    state: SnapshotState<StakeSnapshot>,
    last_requested_ms: u64,
    pinned: bool,
}

impl OwnerSlot {
    const fn new(last_requested_ms: u64, pinned: bool) -> Self {
        Self {
            state: SnapshotState::Loading,
            last_requested_ms,
            pinned,
        }
    }
}

/// Central store for published snapshots.
///
/// # Concurrency
///
/// The listings slot and the per-owner map are behind separate
/// [`tokio::sync::RwLock`]s. Readers clone the `Arc` out and release the
/// lock immediately; snapshots themselves are immutable.
#[derive(Debug)]
pub struct SnapshotStore {
    listings: RwLock<SnapshotState<ListingsSnapshot>>,
    stakes: RwLock<BTreeMap<ObjectId, OwnerSlot>>,
    max_owners: usize,
}

impl SnapshotStore {
    /// Creates an empty store with the given owners pinned.
    #[must_use]
    pub fn new(tracked_owners: impl IntoIterator<Item = ObjectId>) -> Self {
        Self {
            listings: RwLock::new(SnapshotState::Loading),
            stakes: RwLock::new(
                tracked_owners
                    .into_iter()
                    .map(|owner| (owner, OwnerSlot::new(0, true)))
                    .collect(),
            ),
            max_owners: DEFAULT_MAX_TRACKED_OWNERS,
        }
    }

    /// Sets the limit on owners tracked on demand. Pinned owners do not
    /// count against it. The limit is at least one.
    #[must_use]
    pub fn with_owner_limit(mut self, max_owners: usize) -> Self {
        self.max_owners = max_owners.max(1);
        self
    }

    /// Returns the current listings state.
    pub async fn listings(&self) -> SnapshotState<ListingsSnapshot> {
        self.listings.read().await.clone()
    }

    /// Returns the current stakes state of an owner, or `None` if the owner
    /// is not tracked.
    pub async fn stakes(&self, owner: &ObjectId) -> Option<SnapshotState<StakeSnapshot>> {
        self.stakes
            .read()
            .await
            .get(owner)
            .map(|slot| slot.state.clone())
    }

    /// Records a request for an owner, tracking it if it is new.
    ///
    /// A new owner beyond the limit evicts the unpinned owner requested
    /// least recently.
    pub async fn track_owner(&self, owner: ObjectId, now_ms: u64) -> Tracking {
        let mut map = self.stakes.write().await;
        if let Some(slot) = map.get_mut(&owner) {
            slot.last_requested_ms = slot.last_requested_ms.max(now_ms);
            return Tracking::Refreshed;
        }

        let on_demand = map.values().filter(|slot| !slot.pinned).count();
        let evicted = if on_demand >= self.max_owners {
            let oldest = map
                .iter()
                .filter(|(_, slot)| !slot.pinned)
                .min_by_key(|(_, slot)| slot.last_requested_ms)
                .map(|(id, _)| id.clone());
            if let Some(id) = &oldest {
                map.remove(id);
            }
            oldest
        } else {
            None
        };
        map.insert(owner, OwnerSlot::new(now_ms, false));
        Tracking::Added { evicted }
    }

    /// Stops tracking unpinned owners not requested within `max_idle_ms`
    /// of `now_ms`, returning them.
    pub async fn prune_idle(&self, now_ms: u64, max_idle_ms: u64) -> Vec<ObjectId> {
        let mut map = self.stakes.write().await;
        let idle: Vec<ObjectId> = map
            .iter()
            .filter(|(_, slot)| {
                !slot.pinned && now_ms.saturating_sub(slot.last_requested_ms) > max_idle_ms
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &idle {
            map.remove(id);
        }
        idle
    }

    /// Returns every tracked owner.
    pub async fn tracked_owners(&self) -> Vec<ObjectId> {
        self.stakes.read().await.keys().cloned().collect()
    }

    /// Publishes the result of a listings pass.
    ///
    /// Returns `false` if a newer pass already published.
    pub async fn apply_listings(
        &self,
        seq: u64,
        result: Result<Arc<ListingsSnapshot>, GatewayError>,
    ) -> bool {
        self.listings.write().await.apply(seq, result)
    }

    /// Publishes the result of a stakes pass.
    ///
    /// Returns `false` if the owner is no longer tracked or a newer pass
    /// already published.
    pub async fn apply_stakes(
        &self,
        owner: &ObjectId,
        seq: u64,
        result: Result<Arc<StakeSnapshot>, GatewayError>,
    ) -> bool {
        let mut map = self.stakes.write().await;
        map.get_mut(owner)
            .is_some_and(|slot| slot.state.apply(seq, result))
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
