//! One reconstruction pass per call.
//!
//! [`ReconstructionEngine`] runs the pipeline for a topic: ingest events,
//! reduce them to active keys, confirm each key against object state, and
//! for stakes compute per-pool rewards. A pass either returns a complete
//! snapshot or an error; it never returns a partial event set.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use super::cross_ref::CrossReferencer;
use super::ingestor::{EventIngestor, Ingested};
use super::pool_state::PoolStateReader;
use super::retry::RetryPolicy;
use crate::chain::{EventSource, ObjectSource};
use crate::config::{ChainConfig, EngineSettings, KIOSK_OWNER_CAP_TYPE};
use crate::domain::rewards::{self, RewardInputs};
use crate::domain::{
    ChainEvent, ChainEventKind, EventPayload, ListingDomain, ListingsSnapshot, ObjectId, OwnedNft,
    PassStats, StakeDomain, StakePosition, StakeSnapshot, reduce,
};
use crate::error::GatewayError;

/// Runs reconstruction passes against injected chain sources.
#[derive(Debug, Clone)]
pub struct ReconstructionEngine {
    chain: ChainConfig,
    settings: EngineSettings,
    ingestor: EventIngestor,
    xref: CrossReferencer,
    objects: Arc<dyn ObjectSource>,
    retry: RetryPolicy,
}

impl ReconstructionEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventSource>,
        objects: Arc<dyn ObjectSource>,
        chain: ChainConfig,
        settings: EngineSettings,
    ) -> Self {
        let retry = RetryPolicy {
            max_retries: settings.entity_read_retries,
            backoff: Duration::from_millis(settings.retry_backoff_ms),
        };
        Self {
            ingestor: EventIngestor::new(events, settings.page_size),
            xref: CrossReferencer::new(Arc::clone(&objects), retry, settings.decimal_scale),
            objects,
            retry,
            chain,
            settings,
        }
    }

    /// Chain identifiers the engine was built with.
    #[must_use]
    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    /// Pass tuning the engine was built with.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn stream(&self, kind: ChainEventKind) -> Result<(ChainEventKind, String), GatewayError> {
        Ok((kind, self.chain.event_type(kind)?))
    }

    /// Reconstructs the active kiosk listings.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when the NFT type is not
    /// set, or the source error when any event query fails.
    pub async fn reconstruct_listings(&self, now_ms: u64) -> Result<ListingsSnapshot, GatewayError> {
        let streams = [
            self.stream(ChainEventKind::Listed)?,
            self.stream(ChainEventKind::Delisted)?,
            self.stream(ChainEventKind::Purchased)?,
        ];
        let target = self.settings.listing_target_count;
        let bound = target.saturating_mul(self.settings.load_factor);
        let ingested = self.ingestor.fetch_many(&streams, bound).await?;

        let reduction = reduce::<ListingDomain>(&ingested.events);
        let mut stats = ingest_stats(&ingested);
        stats.active_after_reduction = reduction.active_count();

        let winners: Vec<&ChainEvent> = reduction.active().map(|(_, event)| event).collect();
        let mut listings = self.xref.verify_listings(&winners, &mut stats).await;
        listings.truncate(target);

        tracing::info!(
            topic = "listings",
            listings = listings.len(),
            events = stats.events_fetched,
            dropped = stats.dropped_on_contradiction,
            read_failures = stats.read_failures,
            "listings pass complete"
        );
        Ok(ListingsSnapshot {
            listings,
            generated_at_ms: now_ms,
            stats,
        })
    }

    /// Reconstructs an owner's stake positions and per-pool rewards.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when staking identifiers are
    /// missing, or the source error when a stake or claim event query
    /// fails.
    pub async fn reconstruct_stakes(
        &self,
        owner: &ObjectId,
        now_ms: u64,
    ) -> Result<StakeSnapshot, GatewayError> {
        let package = self.chain.require_staking_ids()?.clone();
        let stake_streams = [
            self.stream(ChainEventKind::Staked)?,
            self.stream(ChainEventKind::Unstaked)?,
        ];
        let (_, claim_type) = self.stream(ChainEventKind::RewardsClaimed)?;

        let (stakes, claims) = tokio::try_join!(
            self.ingestor
                .fetch_many(&stake_streams, self.settings.stake_event_bound),
            self.ingestor.fetch(
                ChainEventKind::RewardsClaimed,
                &claim_type,
                self.settings.claim_event_bound
            ),
        )?;

        let reduction = reduce::<StakeDomain>(&stakes.events);
        let mut stats = ingest_stats(&stakes);
        stats.events_fetched += claims.fetched;
        stats.duplicates_dropped += claims.duplicates;
        stats.malformed_skipped += claims.malformed;

        let mut candidates: Vec<&ChainEvent> = Vec::new();
        for (key, event) in reduction.active() {
            if !is_owned_by(event, owner) {
                continue;
            }
            stats.active_after_reduction += 1;
            if self.chain.pool(&key.pool_id).is_some() {
                candidates.push(event);
            } else {
                stats.unknown_pool_skipped += 1;
                tracing::debug!(pool_id = %key.pool_id, nft_id = %key.nft_id, "stake in unconfigured pool");
            }
        }

        let pool_ids: Vec<ObjectId> = self
            .chain
            .pools
            .iter()
            .filter(|pool| candidates.iter().any(|e| is_in_pool(e, &pool.pool_id)))
            .map(|pool| pool.pool_id.clone())
            .collect();
        let handles = self.xref.pool_handles(&pool_ids, &mut stats).await;
        let check = self
            .xref
            .verify_stakes(owner, &candidates, &handles, now_ms, &mut stats)
            .await;

        let reader = PoolStateReader::new(
            Arc::clone(&self.objects),
            package,
            self.chain.staking_module.as_str(),
            self.retry,
        );
        let claim_triples: Vec<(&ObjectId, &ObjectId, u64)> =
            claims.events.iter().filter_map(claim_triple).collect();

        // Unconfirmed positions keep their pool in the breakdown.
        let mut by_pool: BTreeMap<&ObjectId, Vec<&StakePosition>> = BTreeMap::new();
        for position in check.confirmed.iter().chain(&check.unconfirmed) {
            by_pool.entry(&position.pool_id).or_default().push(position);
        }

        let breakdown_futures = self.chain.pools.iter().filter_map(|pool| {
            let group = by_pool.get(&pool.pool_id)?;
            let handle = handles.get(&pool.pool_id).and_then(|h| h.as_ref().ok());
            let reader = &reader;
            let claim_triples = &claim_triples;
            Some(async move {
                let authority = match handle {
                    Some(handle) => match reader.read(handle, owner).await {
                        Ok(authority) => Some(authority),
                        Err(e) => {
                            tracing::warn!(pool_id = %pool.pool_id, %owner, error = %e, "pool state read failed");
                            None
                        }
                    },
                    None => None,
                };
                let inputs = RewardInputs {
                    now_ms,
                    claimed_rewards: rewards::claimed_total(
                        claim_triples.iter().copied(),
                        owner,
                        &pool.pool_id,
                    ),
                    per_item_multiplier: self.settings.per_item_multiplier,
                };
                rewards::pool_stats(pool, group, authority, inputs)
            })
        });
        let pool_breakdown = join_all(breakdown_futures).await;
        let totals = rewards::totals(&pool_breakdown);
        let positions = check.confirmed;

        tracing::info!(
            topic = "stakes",
            %owner,
            positions = positions.len(),
            pools = pool_breakdown.len(),
            events = stats.events_fetched,
            dropped = stats.dropped_on_contradiction,
            read_failures = stats.read_failures,
            "stakes pass complete"
        );
        Ok(StakeSnapshot {
            owner: owner.clone(),
            positions,
            pool_breakdown,
            totals,
            generated_at_ms: now_ms,
            stats,
        })
    }

    /// Kiosks the owner controls.
    ///
    /// # Errors
    ///
    /// Returns the source error when the owned-object query fails.
    pub async fn owned_kiosks(&self, owner: &ObjectId) -> Result<Vec<ObjectId>, GatewayError> {
        self.xref.owned_kiosks(owner, KIOSK_OWNER_CAP_TYPE).await
    }

    /// Collection NFTs held directly in the owner's wallet.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when the NFT type is not
    /// set, or the source error when the owned-object query fails.
    pub async fn owned_nfts(&self, owner: &ObjectId) -> Result<Vec<OwnedNft>, GatewayError> {
        let nft_type = self.chain.require_listing_ids()?;
        self.xref.owned_nfts(owner, nft_type).await
    }
}

fn ingest_stats(ingested: &Ingested) -> PassStats {
    PassStats {
        events_fetched: ingested.fetched,
        duplicates_dropped: ingested.duplicates,
        malformed_skipped: ingested.malformed,
        ..PassStats::default()
    }
}

fn is_owned_by(event: &ChainEvent, owner: &ObjectId) -> bool {
    matches!(&event.payload, EventPayload::Staked { owner: o, .. } if o == owner)
}

fn is_in_pool(event: &ChainEvent, pool_id: &ObjectId) -> bool {
    matches!(&event.payload, EventPayload::Staked { pool_id: p, .. } if p == pool_id)
}

fn claim_triple(event: &ChainEvent) -> Option<(&ObjectId, &ObjectId, u64)> {
    match &event.payload {
        EventPayload::RewardsClaimed {
            owner,
            pool_id,
            amount,
        } => Some((owner, pool_id, *amount)),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::memory::fixtures::{dynamic_field, object, pool, raw_event};
    use crate::chain::{DynamicFieldKey, MemoryChain};
    use crate::domain::StakingPool;
    use crate::domain::rewards::{DAY_MS, HOUR_MS};
    use crate::service::pool_state::{LAST_CLAIM_TIME_FN, PENDING_REWARDS_FN};
    use serde_json::json;

    const NFT_TYPE: &str = "0x9::nft::Nft";

    fn id(hex: &str) -> ObjectId {
        ObjectId::parse(hex).unwrap_or_else(|_| panic!("valid id {hex}"))
    }

    fn chain_config() -> ChainConfig {
        ChainConfig {
            market_package_id: None,
            nft_type: NFT_TYPE.to_string(),
            staking_package_id: Some(id("0x1234")),
            staking_module: "staking".to_string(),
            pools: vec![
                StakingPool {
                    pool_id: id("0xa"),
                    name: "P".to_string(),
                    claim_interval_ms: DAY_MS,
                    base_energy_per_hour: 10.0,
                },
                StakingPool {
                    pool_id: id("0xb"),
                    name: "Q".to_string(),
                    claim_interval_ms: DAY_MS,
                    base_energy_per_hour: 10.0,
                },
            ],
        }
    }

    fn event_type(kind: ChainEventKind) -> String {
        chain_config()
            .event_type(kind)
            .unwrap_or_else(|_| panic!("event type"))
    }

    fn engine(chain: &Arc<MemoryChain>, config: ChainConfig) -> ReconstructionEngine {
        let settings = EngineSettings {
            retry_backoff_ms: 0,
            ..EngineSettings::default()
        };
        ReconstructionEngine::new(
            Arc::clone(chain) as Arc<dyn EventSource>,
            Arc::clone(chain) as Arc<dyn ObjectSource>,
            config,
            settings,
        )
    }

    async fn kiosk_event(chain: &MemoryChain, kind: ChainEventKind, tx: &str, t: u64, item: &str) {
        chain
            .push_event(raw_event(
                &event_type(kind),
                tx,
                t,
                json!({ "kiosk": "0xe1", "id": item, "price": "100" }),
            ))
            .await;
    }

    async fn stake_event(chain: &MemoryChain, kind: ChainEventKind, tx: &str, t: u64, nft: &str, pool_id: &str) {
        chain
            .push_event(raw_event(
                &event_type(kind),
                tx,
                t,
                json!({ "nft_id": nft, "pool_id": pool_id, "owner": "0xc0" }),
            ))
            .await;
    }

    async fn claim_event(chain: &MemoryChain, tx: &str, t: u64, pool_id: &str, amount: u64) {
        chain
            .push_event(raw_event(
                &event_type(ChainEventKind::RewardsClaimed),
                tx,
                t,
                json!({ "owner": "0xc0", "pool_id": pool_id, "amount": amount.to_string() }),
            ))
            .await;
    }

    async fn stake_table(chain: &MemoryChain, pool_id: &str, table: &str, nfts: &[(&str, u64)]) {
        chain.put_object(pool(&id(pool_id), &id(table), 3)).await;
        for (nft, stake_time) in nfts {
            chain
                .put_dynamic_field(
                    &id(table),
                    &DynamicFieldKey::object_id(&id(nft)),
                    dynamic_field(
                        &id("0xdf"),
                        &id(table),
                        json!({ "fields": { "owner": "0xc0", "stake_time": stake_time.to_string() } }),
                    ),
                )
                .await;
        }
    }

    #[tokio::test]
    async fn purchased_item_is_not_listed() {
        let chain = Arc::new(MemoryChain::new());
        kiosk_event(&chain, ChainEventKind::Listed, "l5", 100, "0x5").await;
        kiosk_event(&chain, ChainEventKind::Purchased, "p5", 200, "0x5").await;
        let Ok(snapshot) = engine(&chain, chain_config()).reconstruct_listings(1_000).await else {
            panic!("pass");
        };
        assert!(snapshot.listings.is_empty());
        assert_eq!(snapshot.stats.active_after_reduction, 0);
        assert_eq!(chain.object_reads(), 0);
    }

    #[tokio::test]
    async fn listing_confirmed_by_kiosk() {
        let chain = Arc::new(MemoryChain::new());
        kiosk_event(&chain, ChainEventKind::Listed, "l5", 100, "0x5").await;
        chain
            .put_dynamic_field(
                &id("0xe1"),
                &DynamicFieldKey::kiosk_listing(&id("0x5")),
                dynamic_field(&id("0xd1"), &id("0xe1"), json!("300")),
            )
            .await;
        chain
            .put_object(object(&id("0x5"), NFT_TYPE, json!({}), &[("name", "Five")]))
            .await;
        let Ok(snapshot) = engine(&chain, chain_config()).reconstruct_listings(1_000).await else {
            panic!("pass");
        };
        let Some(record) = snapshot.listings.first() else {
            panic!("listing expected");
        };
        assert_eq!(record.price_in_base_units, 300);
        assert_eq!(record.display_name, "Five");
        assert_eq!(snapshot.generated_at_ms, 1_000);
    }

    #[tokio::test]
    async fn event_query_failure_fails_pass() {
        let chain = Arc::new(MemoryChain::new());
        chain
            .fail_event_type(&event_type(ChainEventKind::Delisted))
            .await;
        let result = engine(&chain, chain_config()).reconstruct_listings(1_000).await;
        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }

    #[tokio::test]
    async fn missing_config_is_configuration_error() {
        let chain = Arc::new(MemoryChain::new());
        let config = ChainConfig {
            staking_package_id: None,
            ..chain_config()
        };
        let engine = engine(&chain, config);
        let result = engine.reconstruct_stakes(&id("0xc0"), 1_000).await;
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
        assert_eq!(chain.event_queries(), 0);
    }

    #[tokio::test]
    async fn single_confirmed_stake() {
        let chain = Arc::new(MemoryChain::new());
        stake_event(&chain, ChainEventKind::Staked, "s9", 100, "0x9", "0xa").await;
        stake_table(&chain, "0xa", "0x7a", &[("0x9", 100)]).await;
        let Ok(snapshot) = engine(&chain, chain_config())
            .reconstruct_stakes(&id("0xc0"), 100 + 30 * 60 * 1_000)
            .await
        else {
            panic!("pass");
        };
        assert_eq!(snapshot.positions.len(), 1);
        assert!(snapshot.positions.iter().all(|p| p.weight >= 1));
        assert_eq!(snapshot.pool_breakdown.len(), 1);
        assert_eq!(snapshot.totals.nft_count, 1);
    }

    #[tokio::test]
    async fn rewards_combine_pending_and_claims() {
        let chain = Arc::new(MemoryChain::new());
        let now = 10 * DAY_MS;
        stake_event(&chain, ChainEventKind::Staked, "s9", HOUR_MS, "0x9", "0xa").await;
        stake_table(&chain, "0xa", "0x7a", &[("0x9", HOUR_MS)]).await;
        chain
            .set_view(PENDING_REWARDS_FN, &id("0xa"), &id("0xc0"), 5_000_000_000)
            .await;
        chain
            .set_view(LAST_CLAIM_TIME_FN, &id("0xa"), &id("0xc0"), now - HOUR_MS)
            .await;
        claim_event(&chain, "c1", 2 * DAY_MS, "0xa", 2_000_000_000).await;
        claim_event(&chain, "c2", 3 * DAY_MS, "0xa", 1_000_000_000).await;
        claim_event(&chain, "c3", 3 * DAY_MS, "0xb", 9_000_000_000).await;

        let Ok(snapshot) = engine(&chain, chain_config())
            .reconstruct_stakes(&id("0xc0"), now)
            .await
        else {
            panic!("pass");
        };
        let Some(stats) = snapshot.pool_breakdown.first() else {
            panic!("pool expected");
        };
        assert_eq!(stats.pending_rewards, 5_000_000_000);
        assert_eq!(stats.claimed_rewards, 3_000_000_000);
        assert_eq!(stats.total_earned, 8_000_000_000);
        assert!(stats.authoritative);
        assert!(!stats.can_claim_now);
        assert_eq!(stats.time_until_next_claim_ms, DAY_MS - HOUR_MS);
    }

    #[tokio::test]
    async fn failed_pool_state_keeps_pool_with_zero_pending() {
        let chain = Arc::new(MemoryChain::new());
        stake_event(&chain, ChainEventKind::Staked, "s9", 100, "0x9", "0xa").await;
        stake_event(&chain, ChainEventKind::Staked, "s8", 100, "0x8", "0xb").await;
        stake_table(&chain, "0xa", "0x7a", &[("0x9", 100)]).await;
        stake_table(&chain, "0xb", "0x7b", &[("0x8", 100)]).await;
        chain.set_view(PENDING_REWARDS_FN, &id("0xa"), &id("0xc0"), 7).await;
        chain.set_view(PENDING_REWARDS_FN, &id("0xb"), &id("0xc0"), 7).await;
        chain.fail_views(&id("0xb")).await;

        let Ok(snapshot) = engine(&chain, chain_config())
            .reconstruct_stakes(&id("0xc0"), 2 * DAY_MS)
            .await
        else {
            panic!("pass");
        };
        let names: Vec<&str> = snapshot
            .pool_breakdown
            .iter()
            .map(|p| p.pool_name.as_str())
            .collect();
        assert_eq!(names, vec!["P", "Q"]);
        let Some(q) = snapshot.pool_breakdown.get(1) else {
            panic!("pool Q expected");
        };
        assert_eq!(q.pending_rewards, 0);
        assert!(!q.can_claim_now);
        assert!(!q.authoritative);
        assert_eq!(snapshot.totals.pending_rewards, 7);
    }

    #[tokio::test]
    async fn failed_pool_read_keeps_pool_in_breakdown() {
        let chain = Arc::new(MemoryChain::new());
        stake_event(&chain, ChainEventKind::Staked, "s9", 100, "0x9", "0xa").await;
        stake_event(&chain, ChainEventKind::Staked, "s8", 100, "0x8", "0xb").await;
        claim_event(&chain, "c8", 500, "0xb", 3).await;
        stake_table(&chain, "0xa", "0x7a", &[("0x9", 100)]).await;
        stake_table(&chain, "0xb", "0x7b", &[("0x8", 100)]).await;
        chain.set_view(PENDING_REWARDS_FN, &id("0xa"), &id("0xc0"), 7).await;
        chain.set_view(PENDING_REWARDS_FN, &id("0xb"), &id("0xc0"), 7).await;
        chain.fail_object(&id("0xb"), usize::MAX).await;

        let Ok(snapshot) = engine(&chain, chain_config())
            .reconstruct_stakes(&id("0xc0"), 2 * DAY_MS)
            .await
        else {
            panic!("pass");
        };
        let names: Vec<&str> = snapshot
            .pool_breakdown
            .iter()
            .map(|p| p.pool_name.as_str())
            .collect();
        assert_eq!(names, vec!["P", "Q"]);
        let Some(q) = snapshot.pool_breakdown.get(1) else {
            panic!("pool Q expected");
        };
        assert_eq!(q.nft_count, 1);
        assert_eq!(q.pending_rewards, 0);
        assert_eq!(q.claimed_rewards, 3);
        assert_eq!(q.total_earned, 3);
        assert!(!q.can_claim_now);
        assert_eq!(q.time_until_next_claim_ms, DAY_MS);
        assert!(!q.authoritative);

        let confirmed: Vec<&ObjectId> = snapshot.positions.iter().map(|p| &p.nft_id).collect();
        assert_eq!(confirmed, vec![&id("0x9")]);
        assert_eq!(snapshot.stats.read_failures, 1);
        assert_eq!(snapshot.totals.nft_count, 2);
        assert_eq!(snapshot.totals.pending_rewards, 7);
    }

    #[tokio::test]
    async fn claim_query_failure_fails_stakes_pass() {
        let chain = Arc::new(MemoryChain::new());
        stake_event(&chain, ChainEventKind::Staked, "s9", 100, "0x9", "0xa").await;
        chain
            .fail_event_type(&event_type(ChainEventKind::RewardsClaimed))
            .await;
        let result = engine(&chain, chain_config())
            .reconstruct_stakes(&id("0xc0"), 1_000)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unstaked_and_unconfigured_are_excluded() {
        let chain = Arc::new(MemoryChain::new());
        stake_event(&chain, ChainEventKind::Staked, "s9", 100, "0x9", "0xa").await;
        stake_event(&chain, ChainEventKind::Unstaked, "u9", 200, "0x9", "0xa").await;
        stake_event(&chain, ChainEventKind::Staked, "s7", 100, "0x7", "0xf").await;
        let Ok(snapshot) = engine(&chain, chain_config())
            .reconstruct_stakes(&id("0xc0"), 1_000)
            .await
        else {
            panic!("pass");
        };
        assert!(snapshot.positions.is_empty());
        assert!(snapshot.pool_breakdown.is_empty());
        assert_eq!(snapshot.stats.unknown_pool_skipped, 1);
        assert_eq!(chain.object_reads(), 0);
    }

    #[tokio::test]
    async fn other_owners_stakes_are_ignored() {
        let chain = Arc::new(MemoryChain::new());
        stake_event(&chain, ChainEventKind::Staked, "s9", 100, "0x9", "0xa").await;
        let Ok(snapshot) = engine(&chain, chain_config())
            .reconstruct_stakes(&id("0xc1"), 1_000)
            .await
        else {
            panic!("pass");
        };
        assert!(snapshot.positions.is_empty());
        assert_eq!(snapshot.stats.active_after_reduction, 0);
    }
}
