//! Folds an event stream into the latest status per entity key.
//!
//! [`reduce`] is pure and synchronous. For every key it keeps the event
//! with the greatest `timestamp_ms`; on equal timestamps the event met
//! first wins, so feeding the node's newest-first order keeps the choice
//! stable. A key is active iff its winning event is the domain's open kind.
//! A key that only ever saw close events is left out of the winners.
//! The winners live in a `BTreeMap`, so output order never depends on
//! hashing and two runs over the same input compare equal.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::marker::PhantomData;

use serde::Serialize;

use super::{ChainEvent, ChainEventKind, EventPayload, ObjectId};

/// A family of events that share a key space and open/close semantics.
pub trait ReductionDomain {
    /// Entity key.
    type Key: Ord + Clone + Debug;

    /// Returns the key for events of this domain, `None` for foreign events.
    fn key(event: &ChainEvent) -> Option<Self::Key>;

    /// Returns `true` for the kind that makes an entity active.
    fn is_open(kind: ChainEventKind) -> bool;
}

/// Kiosk listings keyed by item id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingDomain;

impl ReductionDomain for ListingDomain {
    type Key = ObjectId;

    fn key(event: &ChainEvent) -> Option<Self::Key> {
        match &event.payload {
            EventPayload::Listed { item_id, .. }
            | EventPayload::Delisted { item_id, .. }
            | EventPayload::Purchased { item_id, .. } => Some(item_id.clone()),
            _ => None,
        }
    }

    fn is_open(kind: ChainEventKind) -> bool {
        kind == ChainEventKind::Listed
    }
}

/// Stake key: an NFT may be staked in several pools over its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StakeKey {
    /// Staked NFT.
    pub nft_id: ObjectId,
    /// Pool id.
    pub pool_id: ObjectId,
}

/// Stake positions keyed by `(nft_id, pool_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeDomain;

impl ReductionDomain for StakeDomain {
    type Key = StakeKey;

    fn key(event: &ChainEvent) -> Option<Self::Key> {
        match &event.payload {
            EventPayload::Staked {
                nft_id, pool_id, ..
            }
            | EventPayload::Unstaked {
                nft_id, pool_id, ..
            } => Some(StakeKey {
                nft_id: nft_id.clone(),
                pool_id: pool_id.clone(),
            }),
            _ => None,
        }
    }

    fn is_open(kind: ChainEventKind) -> bool {
        kind == ChainEventKind::Staked
    }
}

/// Output of [`reduce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction<D: ReductionDomain> {
    /// Winning event per key that saw at least one open event.
    pub winners: BTreeMap<D::Key, ChainEvent>,
    /// Events that did not belong to the domain.
    pub ignored: usize,
    domain: PhantomData<D>,
}

impl<D: ReductionDomain> Reduction<D> {
    /// Returns `true` if the key's winning event is the open kind.
    #[must_use]
    pub fn is_active(&self, key: &D::Key) -> bool {
        self.winners
            .get(key)
            .is_some_and(|event| D::is_open(event.kind()))
    }

    /// Iterates over active keys and their winning events, in key order.
    pub fn active(&self) -> impl Iterator<Item = (&D::Key, &ChainEvent)> {
        self.winners
            .iter()
            .filter(|(_, event)| D::is_open(event.kind()))
    }

    /// Number of active keys.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active().count()
    }
}

/// Reduces `events` to the winning event per key of domain `D`.
#[must_use]
pub fn reduce<D: ReductionDomain>(events: &[ChainEvent]) -> Reduction<D> {
    let mut winners: BTreeMap<D::Key, ChainEvent> = BTreeMap::new();
    let mut opened: BTreeSet<D::Key> = BTreeSet::new();
    let mut ignored = 0;

    for event in events {
        let Some(key) = D::key(event) else {
            ignored += 1;
            continue;
        };
        if D::is_open(event.kind()) {
            opened.insert(key.clone());
        }
        match winners.get(&key) {
            Some(current) if current.timestamp_ms >= event.timestamp_ms => {}
            _ => {
                winners.insert(key, event.clone());
            }
        }
    }
    winners.retain(|key, _| opened.contains(key));

    Reduction {
        winners,
        ignored,
        domain: PhantomData,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EventId;

    fn id(hex: &str) -> ObjectId {
        ObjectId::parse(hex).unwrap_or_else(|_| panic!("valid id {hex}"))
    }

    fn event(seq: u64, timestamp_ms: u64, payload: EventPayload) -> ChainEvent {
        ChainEvent {
            id: EventId {
                tx_digest: format!("tx{seq}"),
                event_seq: 0,
            },
            timestamp_ms,
            payload,
        }
    }

    fn listed(seq: u64, item: &str, t: u64) -> ChainEvent {
        event(
            seq,
            t,
            EventPayload::Listed {
                item_id: id(item),
                kiosk_id: id("0xe1"),
                price: 100,
            },
        )
    }

    fn purchased(seq: u64, item: &str, t: u64) -> ChainEvent {
        event(
            seq,
            t,
            EventPayload::Purchased {
                item_id: id(item),
                kiosk_id: id("0xe1"),
                price: Some(100),
            },
        )
    }

    fn staked(seq: u64, nft: &str, pool: &str, t: u64) -> ChainEvent {
        event(
            seq,
            t,
            EventPayload::Staked {
                nft_id: id(nft),
                pool_id: id(pool),
                owner: id("0xc0"),
                stake_time_ms: None,
            },
        )
    }

    fn unstaked(seq: u64, nft: &str, pool: &str, t: u64) -> ChainEvent {
        event(
            seq,
            t,
            EventPayload::Unstaked {
                nft_id: id(nft),
                pool_id: id(pool),
                owner: id("0xc0"),
            },
        )
    }

    #[test]
    fn purchase_closes_listing() {
        // newest first, as delivered
        let events = vec![purchased(2, "0x5", 200), listed(1, "0x5", 100)];
        let reduction = reduce::<ListingDomain>(&events);
        assert_eq!(reduction.active_count(), 0);
        assert!(!reduction.is_active(&id("0x5")));
    }

    #[test]
    fn later_event_wins_regardless_of_arrival_order() {
        let events = vec![listed(1, "0x5", 100), purchased(2, "0x5", 200)];
        let reduction = reduce::<ListingDomain>(&events);
        let Some(winner) = reduction.winners.get(&id("0x5")) else {
            panic!("key should be present");
        };
        assert_eq!(winner.kind(), ChainEventKind::Purchased);
    }

    #[test]
    fn relisting_after_purchase_is_active() {
        let events = vec![
            listed(3, "0x5", 300),
            purchased(2, "0x5", 200),
            listed(1, "0x5", 100),
        ];
        let reduction = reduce::<ListingDomain>(&events);
        assert!(reduction.is_active(&id("0x5")));
    }

    #[test]
    fn ties_keep_first_encountered() {
        let events = vec![purchased(2, "0x5", 100), listed(1, "0x5", 100)];
        let first = reduce::<ListingDomain>(&events);
        let Some(winner) = first.winners.get(&id("0x5")) else {
            panic!("key should be present");
        };
        assert_eq!(winner.id.tx_digest, "tx2");

        for _ in 0..5 {
            assert_eq!(reduce::<ListingDomain>(&events), first);
        }
    }

    #[test]
    fn reduction_is_idempotent() {
        let events = vec![
            staked(4, "0x9", "0xa", 400),
            unstaked(3, "0x8", "0xa", 300),
            staked(2, "0x8", "0xa", 200),
            staked(1, "0x9", "0xb", 100),
        ];
        let a = reduce::<StakeDomain>(&events);
        let b = reduce::<StakeDomain>(&events);
        assert_eq!(a, b);
        let a_json = serde_json::to_string(&a.winners.values().collect::<Vec<_>>()).ok();
        let b_json = serde_json::to_string(&b.winners.values().collect::<Vec<_>>()).ok();
        assert_eq!(a_json, b_json);
    }

    #[test]
    fn active_iff_winner_is_open() {
        let events = vec![
            staked(4, "0x9", "0xa", 400),
            unstaked(3, "0x8", "0xa", 300),
            staked(2, "0x8", "0xa", 200),
            staked(1, "0x9", "0xb", 100),
        ];
        let reduction = reduce::<StakeDomain>(&events);
        for (key, winner) in &reduction.winners {
            assert_eq!(
                reduction.is_active(key),
                winner.kind() == ChainEventKind::Staked
            );
        }
        assert_eq!(reduction.active_count(), 2);
    }

    #[test]
    fn same_nft_in_two_pools_is_two_keys() {
        let events = vec![staked(2, "0x9", "0xa", 200), staked(1, "0x9", "0xb", 100)];
        let reduction = reduce::<StakeDomain>(&events);
        assert_eq!(reduction.winners.len(), 2);
    }

    #[test]
    fn close_only_key_is_absent_not_error() {
        let events = vec![
            unstaked(3, "0x9", "0xa", 300),
            staked(2, "0x8", "0xa", 200),
            unstaked(1, "0x9", "0xa", 100),
        ];
        let reduction = reduce::<StakeDomain>(&events);
        assert_eq!(reduction.active_count(), 1);
        let key = StakeKey {
            nft_id: id("0x9"),
            pool_id: id("0xa"),
        };
        assert!(!reduction.winners.contains_key(&key));
        assert!(!reduction.is_active(&key));
        assert_eq!(reduction.winners.len(), 1);
        assert_eq!(reduction.ignored, 0);
    }

    #[test]
    fn foreign_events_are_ignored() {
        let events = vec![staked(2, "0x9", "0xa", 200), listed(1, "0x5", 100)];
        let reduction = reduce::<ListingDomain>(&events);
        assert_eq!(reduction.ignored, 1);
        assert_eq!(reduction.winners.len(), 1);
    }
}
