//! Domain layer: identifiers, events, reconstructed records, and the pure
//! reduction and reward logic.
//!
//! Nothing in this module talks to the network. The service layer feeds it
//! events and object reads; the snapshot store and event bus hold and
//! announce what the service layer produced.

pub mod chain_event;
pub mod event_bus;
pub mod object_id;
pub mod records;
pub mod reducer;
pub mod rewards;
pub mod snapshot_store;

pub use chain_event::{ChainEvent, ChainEventKind, EventId, EventPayload, RawEvent};
pub use event_bus::{EventBus, SnapshotEvent};
pub use object_id::ObjectId;
pub use records::{
    DisplayMetadata, ListingRecord, ListingsSnapshot, OwnedNft, PassStats, PoolRewardStats,
    RewardTotals, StakePosition, StakeSnapshot, StakingPool,
};
pub use reducer::{ListingDomain, Reduction, ReductionDomain, StakeDomain, StakeKey, reduce};
pub use snapshot_store::{SnapshotState, SnapshotStore, Topic, Tracking};
