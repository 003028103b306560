//! Chain events as delivered by the node, and their validated domain form.
//!
//! The node hands back every event with an untyped `parsedJson` payload.
//! [`ChainEvent::parse`] turns a [`RawEvent`] into a tagged [`EventPayload`]
//! per [`ChainEventKind`], rejecting payloads that lack a required field so
//! the ingestor can skip and count them instead of failing the pass.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ObjectId;
use crate::chain::content::{de_opt_u64, de_u64};
use crate::error::GatewayError;

/// Node-assigned event identifier: transaction digest plus sequence number.
///
/// This is the dedup key for events; pagination may hand the same event
/// back twice.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct EventId {
    /// Digest of the transaction that emitted the event.
    pub tx_digest: String,
    /// Position of the event within the transaction.
    #[serde(deserialize_with = "de_u64")]
    pub event_seq: u64,
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_digest, self.event_seq)
    }
}

/// Event exactly as returned by `suix_queryEvents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Event identifier.
    pub id: EventId,
    /// Fully qualified Move event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Transaction sender, if reported.
    #[serde(default)]
    pub sender: Option<String>,
    /// Checkpoint timestamp in milliseconds.
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub timestamp_ms: Option<u64>,
    /// Untyped event payload.
    #[serde(default)]
    pub parsed_json: serde_json::Value,
}

/// The event kinds the reconstruction engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChainEventKind {
    /// An item was placed for sale in a kiosk.
    Listed,
    /// An item was taken off sale by the kiosk owner.
    Delisted,
    /// An item was bought out of a kiosk.
    Purchased,
    /// An NFT was deposited into a staking pool.
    Staked,
    /// An NFT was withdrawn from a staking pool.
    Unstaked,
    /// Pool rewards were paid out to an owner.
    RewardsClaimed,
}

impl ChainEventKind {
    /// Returns the kind as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Listed => "listed",
            Self::Delisted => "delisted",
            Self::Purchased => "purchased",
            Self::Staked => "staked",
            Self::Unstaked => "unstaked",
            Self::RewardsClaimed => "rewards_claimed",
        }
    }
}

impl fmt::Display for ChainEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated payload, one variant per [`ChainEventKind`].
///
/// Amounts are on-chain base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// Payload of a kiosk listing.
    Listed {
        /// Listed item.
        item_id: ObjectId,
        /// Kiosk holding the item.
        kiosk_id: ObjectId,
        /// Asking price at listing time.
        price: u64,
    },
    /// Payload of a kiosk delisting.
    Delisted {
        /// Delisted item.
        item_id: ObjectId,
        /// Kiosk holding the item.
        kiosk_id: ObjectId,
    },
    /// Payload of a kiosk purchase.
    Purchased {
        /// Purchased item.
        item_id: ObjectId,
        /// Kiosk the item was bought from.
        kiosk_id: ObjectId,
        /// Price paid, when reported.
        price: Option<u64>,
    },
    /// Payload of a stake deposit.
    Staked {
        /// Staked NFT.
        nft_id: ObjectId,
        /// Pool the NFT was staked into.
        pool_id: ObjectId,
        /// Staking owner.
        owner: ObjectId,
        /// On-chain stake time, when the event carries one.
        stake_time_ms: Option<u64>,
    },
    /// Payload of a stake withdrawal.
    Unstaked {
        /// Unstaked NFT.
        nft_id: ObjectId,
        /// Pool the NFT left.
        pool_id: ObjectId,
        /// Staking owner.
        owner: ObjectId,
    },
    /// Payload of a reward claim.
    RewardsClaimed {
        /// Claiming owner.
        owner: ObjectId,
        /// Pool the rewards came from.
        pool_id: ObjectId,
        /// Amount claimed.
        amount: u64,
    },
}

impl EventPayload {
    /// Returns the kind this payload belongs to.
    #[must_use]
    pub const fn kind(&self) -> ChainEventKind {
        match self {
            Self::Listed { .. } => ChainEventKind::Listed,
            Self::Delisted { .. } => ChainEventKind::Delisted,
            Self::Purchased { .. } => ChainEventKind::Purchased,
            Self::Staked { .. } => ChainEventKind::Staked,
            Self::Unstaked { .. } => ChainEventKind::Unstaked,
            Self::RewardsClaimed { .. } => ChainEventKind::RewardsClaimed,
        }
    }
}

/// Immutable, validated chain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainEvent {
    /// Dedup key.
    pub id: EventId,
    /// Ordering key.
    pub timestamp_ms: u64,
    /// Kind-specific payload.
    pub payload: EventPayload,
}

#[derive(Deserialize)]
struct KioskItemJson {
    kiosk: ObjectId,
    #[serde(alias = "item_id")]
    id: ObjectId,
    #[serde(default, deserialize_with = "de_opt_u64")]
    price: Option<u64>,
}

#[derive(Deserialize)]
struct StakeJson {
    nft_id: ObjectId,
    pool_id: ObjectId,
    #[serde(alias = "staker")]
    owner: ObjectId,
    #[serde(default, alias = "staked_at", deserialize_with = "de_opt_u64")]
    stake_time: Option<u64>,
}

#[derive(Deserialize)]
struct ClaimJson {
    #[serde(alias = "user", alias = "claimer")]
    owner: ObjectId,
    pool_id: ObjectId,
    #[serde(alias = "reward_amount", deserialize_with = "de_u64")]
    amount: u64,
}

impl ChainEvent {
    /// Returns the event kind.
    #[must_use]
    pub const fn kind(&self) -> ChainEventKind {
        self.payload.kind()
    }

    /// Validates a raw event as the given kind.
    ///
    /// The kind comes from the query that produced the event, not from the
    /// payload, since kiosk events are generic over the item type.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Malformed`] if the timestamp or any required
    /// payload field is missing or unparsable.
    pub fn parse(kind: ChainEventKind, raw: &RawEvent) -> Result<Self, GatewayError> {
        let timestamp_ms = raw.timestamp_ms.ok_or_else(|| {
            GatewayError::Malformed(format!("event {} has no timestamp", raw.id))
        })?;
        let malformed =
            |e: serde_json::Error| GatewayError::Malformed(format!("event {}: {e}", raw.id));
        let json = &raw.parsed_json;

        let payload = match kind {
            ChainEventKind::Listed => {
                let p: KioskItemJson = serde_json::from_value(json.clone()).map_err(malformed)?;
                let price = p.price.ok_or_else(|| {
                    GatewayError::Malformed(format!("listing event {} has no price", raw.id))
                })?;
                EventPayload::Listed {
                    item_id: p.id,
                    kiosk_id: p.kiosk,
                    price,
                }
            }
            ChainEventKind::Delisted => {
                let p: KioskItemJson = serde_json::from_value(json.clone()).map_err(malformed)?;
                EventPayload::Delisted {
                    item_id: p.id,
                    kiosk_id: p.kiosk,
                }
            }
            ChainEventKind::Purchased => {
                let p: KioskItemJson = serde_json::from_value(json.clone()).map_err(malformed)?;
                EventPayload::Purchased {
                    item_id: p.id,
                    kiosk_id: p.kiosk,
                    price: p.price,
                }
            }
            ChainEventKind::Staked => {
                let p: StakeJson = serde_json::from_value(json.clone()).map_err(malformed)?;
                EventPayload::Staked {
                    nft_id: p.nft_id,
                    pool_id: p.pool_id,
                    owner: p.owner,
                    stake_time_ms: p.stake_time,
                }
            }
            ChainEventKind::Unstaked => {
                let p: StakeJson = serde_json::from_value(json.clone()).map_err(malformed)?;
                EventPayload::Unstaked {
                    nft_id: p.nft_id,
                    pool_id: p.pool_id,
                    owner: p.owner,
                }
            }
            ChainEventKind::RewardsClaimed => {
                let p: ClaimJson = serde_json::from_value(json.clone()).map_err(malformed)?;
                EventPayload::RewardsClaimed {
                    owner: p.owner,
                    pool_id: p.pool_id,
                    amount: p.amount,
                }
            }
        };

        Ok(Self {
            id: raw.id.clone(),
            timestamp_ms,
            payload,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(timestamp_ms: Option<u64>, parsed_json: serde_json::Value) -> RawEvent {
        RawEvent {
            id: EventId {
                tx_digest: "8kPq".to_string(),
                event_seq: 0,
            },
            event_type: "0x2::kiosk::ItemListed<0xabc::merge::Item>".to_string(),
            sender: None,
            timestamp_ms,
            parsed_json,
        }
    }

    #[test]
    fn listed_accepts_string_price() {
        let event = raw(
            Some(1_700_000_000_000),
            json!({"kiosk": "0xa1", "id": "0xb2", "price": "2500000000"}),
        );
        let Ok(parsed) = ChainEvent::parse(ChainEventKind::Listed, &event) else {
            panic!("listing should parse");
        };
        assert_eq!(parsed.kind(), ChainEventKind::Listed);
        let EventPayload::Listed { price, .. } = parsed.payload else {
            panic!("wrong payload");
        };
        assert_eq!(price, 2_500_000_000);
    }

    #[test]
    fn listed_without_price_is_malformed() {
        let event = raw(Some(1), json!({"kiosk": "0xa1", "id": "0xb2"}));
        let result = ChainEvent::parse(ChainEventKind::Listed, &event);
        assert!(matches!(result, Err(GatewayError::Malformed(_))));
    }

    #[test]
    fn delisted_does_not_need_price() {
        let event = raw(Some(1), json!({"kiosk": "0xa1", "id": "0xb2"}));
        assert!(ChainEvent::parse(ChainEventKind::Delisted, &event).is_ok());
    }

    #[test]
    fn missing_timestamp_is_malformed() {
        let event = raw(None, json!({"kiosk": "0xa1", "id": "0xb2"}));
        let result = ChainEvent::parse(ChainEventKind::Delisted, &event);
        assert!(matches!(result, Err(GatewayError::Malformed(_))));
    }

    #[test]
    fn staked_accepts_aliases() {
        let event = raw(
            Some(5),
            json!({"nft_id": "0x9", "pool_id": "0xp0", "staker": "0xc0ffee", "staked_at": 4}),
        );
        // "0xp0" is not hex, so this one must fail
        assert!(ChainEvent::parse(ChainEventKind::Staked, &event).is_err());

        let event = raw(
            Some(5),
            json!({"nft_id": "0x9", "pool_id": "0xf0", "staker": "0xc0ffee", "staked_at": 4}),
        );
        let Ok(parsed) = ChainEvent::parse(ChainEventKind::Staked, &event) else {
            panic!("stake should parse");
        };
        let EventPayload::Staked { stake_time_ms, .. } = parsed.payload else {
            panic!("wrong payload");
        };
        assert_eq!(stake_time_ms, Some(4));
    }

    #[test]
    fn claim_requires_amount() {
        let event = raw(Some(5), json!({"owner": "0xc0", "pool_id": "0xf0"}));
        assert!(ChainEvent::parse(ChainEventKind::RewardsClaimed, &event).is_err());

        let event = raw(
            Some(5),
            json!({"user": "0xc0", "pool_id": "0xf0", "reward_amount": "42"}),
        );
        assert!(ChainEvent::parse(ChainEventKind::RewardsClaimed, &event).is_ok());
    }

    #[test]
    fn raw_event_deserializes_node_shape() {
        let node = json!({
            "id": {"txDigest": "Gx1", "eventSeq": "3"},
            "type": "0xabc::staking::NFTStaked",
            "sender": "0xc0",
            "timestampMs": "1700000000123",
            "parsedJson": {"nft_id": "0x9"}
        });
        let Ok(parsed) = serde_json::from_value::<RawEvent>(node) else {
            panic!("node shape should deserialize");
        };
        assert_eq!(parsed.id.event_seq, 3);
        assert_eq!(parsed.timestamp_ms, Some(1_700_000_000_123));
    }
}
