//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Chain identifiers live in
//! [`ChainConfig`]; tuning knobs for the reconstruction passes live in
//! [`EngineSettings`].

use std::net::SocketAddr;
use std::str::FromStr;

use crate::domain::rewards::DEFAULT_DECIMAL_SCALE;
use crate::domain::snapshot_store::DEFAULT_MAX_TRACKED_OWNERS;
use crate::domain::{ChainEventKind, ObjectId, StakingPool};
use crate::error::GatewayError;

/// Move type of the capability proving kiosk ownership.
pub const KIOSK_OWNER_CAP_TYPE: &str = "0x2::kiosk::KioskOwnerCap";

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Sui full node JSON-RPC endpoint.
    pub rpc_url: String,

    /// Per-request timeout for node calls.
    pub rpc_timeout_secs: u64,

    /// Seconds between scheduled refreshes of every topic.
    pub poll_interval_secs: u64,

    /// Owners whose stakes are refreshed from startup.
    pub tracked_owners: Vec<ObjectId>,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,

    /// Chain identifiers.
    pub chain: ChainConfig,

    /// Pass tuning.
    pub engine: EngineSettings,

    /// Limits on owners tracked on demand.
    pub owner_retention: OwnerRetention,
}

/// How long and how many owners are tracked after being requested.
///
/// Owners from `TRACKED_OWNERS` are exempt from both limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerRetention {
    /// Poll intervals an owner may go unrequested before it is dropped.
    pub idle_polls: u32,
    /// Most owners tracked on demand at once.
    pub max_owners: usize,
}

impl Default for OwnerRetention {
    fn default() -> Self {
        Self {
            idle_polls: 10,
            max_owners: DEFAULT_MAX_TRACKED_OWNERS,
        }
    }
}

/// Deployment identifiers: NFT type, staking package, and pools.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    /// Marketplace package, reported on `/config/chain` for clients.
    pub market_package_id: Option<ObjectId>,
    /// Fully qualified Move type of the collection's NFT.
    pub nft_type: String,
    /// Package defining the staking module.
    pub staking_package_id: Option<ObjectId>,
    /// Staking module name.
    pub staking_module: String,
    /// Configured pools, in display order.
    pub pools: Vec<StakingPool>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            market_package_id: None,
            nft_type: String::new(),
            staking_package_id: None,
            staking_module: "staking".to_string(),
            pools: Vec::new(),
        }
    }
}

impl ChainConfig {
    /// Checks that every identifier a pass needs is present.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] naming the first missing
    /// identifier.
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.require_listing_ids()?;
        self.require_staking_ids()?;
        Ok(())
    }

    /// Identifiers needed by a listings pass.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when the NFT type is empty.
    pub fn require_listing_ids(&self) -> Result<&str, GatewayError> {
        if self.nft_type.trim().is_empty() {
            return Err(GatewayError::Configuration("NFT_TYPE is not set".to_string()));
        }
        Ok(&self.nft_type)
    }

    /// Identifiers needed by a stakes pass.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when the staking package or
    /// module is missing or no pool is configured.
    pub fn require_staking_ids(&self) -> Result<&ObjectId, GatewayError> {
        let package = self.staking_package_id.as_ref().ok_or_else(|| {
            GatewayError::Configuration("STAKING_PACKAGE_ID is not set".to_string())
        })?;
        if self.staking_module.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "STAKING_MODULE is empty".to_string(),
            ));
        }
        if self.pools.is_empty() {
            return Err(GatewayError::Configuration(
                "STAKING_POOLS is empty".to_string(),
            ));
        }
        Ok(package)
    }

    /// Returns the configured pool with this id.
    #[must_use]
    pub fn pool(&self, pool_id: &ObjectId) -> Option<&StakingPool> {
        self.pools.iter().find(|p| &p.pool_id == pool_id)
    }

    /// Move event type for a kind.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when the identifiers the kind
    /// depends on are missing.
    pub fn event_type(&self, kind: ChainEventKind) -> Result<String, GatewayError> {
        let name = match kind {
            ChainEventKind::Listed => "ItemListed",
            ChainEventKind::Delisted => "ItemDelisted",
            ChainEventKind::Purchased => "ItemPurchased",
            ChainEventKind::Staked => "NFTStaked",
            ChainEventKind::Unstaked => "NFTUnstaked",
            ChainEventKind::RewardsClaimed => "RewardsClaimed",
        };
        match kind {
            ChainEventKind::Listed | ChainEventKind::Delisted | ChainEventKind::Purchased => {
                let nft_type = self.require_listing_ids()?;
                Ok(format!("0x2::kiosk::{name}<{nft_type}>"))
            }
            ChainEventKind::Staked | ChainEventKind::Unstaked | ChainEventKind::RewardsClaimed => {
                let package = self.require_staking_ids()?;
                Ok(format!("{package}::{}::{name}", self.staking_module))
            }
        }
    }
}

/// Tuning for reconstruction passes.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Desired number of active listings per pass.
    pub listing_target_count: usize,
    /// Desired number of stake/unstake events per pass.
    pub stake_event_bound: usize,
    /// Upper bound on claim events read per pass.
    pub claim_event_bound: usize,
    /// Events requested per desired active entity.
    pub load_factor: usize,
    /// Page size for event queries.
    pub page_size: usize,
    /// Retries per entity read on transient errors.
    pub entity_read_retries: u32,
    /// Linear backoff step between retries.
    pub retry_backoff_ms: u64,
    /// Energy multiplier per NFT staked in the same pool.
    pub per_item_multiplier: f64,
    /// Base units per display unit.
    pub decimal_scale: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            listing_target_count: 50,
            stake_event_bound: 200,
            claim_event_bound: 5_000,
            load_factor: 2,
            page_size: 50,
            entity_read_retries: 2,
            retry_backoff_ms: 250,
            per_item_multiplier: 0.1,
            decimal_scale: DEFAULT_DECIMAL_SCALE,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if `LISTEN_ADDR`, an object
    /// id, or a `STAKING_POOLS` entry is set but malformed.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e| GatewayError::Configuration(format!("LISTEN_ADDR: {e}")))?;

        let rpc_url = std::env::var("SUI_RPC_URL")
            .unwrap_or_else(|_| "https://fullnode.mainnet.sui.io:443".to_string());

        let chain = ChainConfig {
            market_package_id: optional_id("MARKET_PACKAGE_ID")?,
            nft_type: std::env::var("NFT_TYPE").unwrap_or_default(),
            staking_package_id: optional_id("STAKING_PACKAGE_ID")?,
            staking_module: std::env::var("STAKING_MODULE")
                .unwrap_or_else(|_| "staking".to_string()),
            pools: parse_pools(&std::env::var("STAKING_POOLS").unwrap_or_default())?,
        };

        let defaults = EngineSettings::default();
        let engine = EngineSettings {
            listing_target_count: parse_env("LISTING_TARGET_COUNT", defaults.listing_target_count),
            stake_event_bound: parse_env("STAKE_EVENT_BOUND", defaults.stake_event_bound),
            claim_event_bound: parse_env("CLAIM_EVENT_BOUND", defaults.claim_event_bound),
            load_factor: parse_env("EVENT_LOAD_FACTOR", defaults.load_factor).max(1),
            page_size: parse_env("EVENT_PAGE_SIZE", defaults.page_size).clamp(1, 50),
            entity_read_retries: parse_env("ENTITY_READ_RETRIES", defaults.entity_read_retries),
            retry_backoff_ms: parse_env("RETRY_BACKOFF_MS", defaults.retry_backoff_ms),
            per_item_multiplier: parse_env(
                "ENERGY_PER_ITEM_MULTIPLIER",
                defaults.per_item_multiplier,
            ),
            decimal_scale: parse_env("DECIMAL_SCALE", defaults.decimal_scale),
        };

        let tracked_owners = parse_id_list(&std::env::var("TRACKED_OWNERS").unwrap_or_default())?;
        let retention = OwnerRetention::default();
        let owner_retention = OwnerRetention {
            idle_polls: parse_env("OWNER_IDLE_POLLS", retention.idle_polls).max(1),
            max_owners: parse_env("MAX_TRACKED_OWNERS", retention.max_owners).max(1),
        };

        Ok(Self {
            listen_addr,
            rpc_url,
            rpc_timeout_secs: parse_env("RPC_TIMEOUT_SECS", 10),
            poll_interval_secs: parse_env("POLL_INTERVAL_SECS", 30).max(1),
            tracked_owners,
            event_bus_capacity: parse_env("EVENT_BUS_CAPACITY", 1_024),
            log_json: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
            chain,
            engine,
            owner_retention,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Reads an optional object id; empty means unset.
fn optional_id(key: &str) -> Result<Option<ObjectId>, GatewayError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => ObjectId::parse(raw.trim())
            .map(Some)
            .map_err(|e| GatewayError::Configuration(format!("{key}: {e}"))),
        _ => Ok(None),
    }
}

/// Parses a comma-separated list of object ids.
fn parse_id_list(raw: &str) -> Result<Vec<ObjectId>, GatewayError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            ObjectId::parse(s).map_err(|e| GatewayError::Configuration(format!("{s}: {e}")))
        })
        .collect()
}

/// Parses `id:name:claim_interval_ms:base_energy_per_hour` entries,
/// comma-separated.
fn parse_pools(raw: &str) -> Result<Vec<StakingPool>, GatewayError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_pool)
        .collect()
}

fn parse_pool(entry: &str) -> Result<StakingPool, GatewayError> {
    let bad = |what: &str| GatewayError::Configuration(format!("STAKING_POOLS `{entry}`: {what}"));
    let mut parts = entry.split(':').map(str::trim);
    let (Some(id), Some(name), Some(interval), Some(energy), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(bad("expected id:name:claim_interval_ms:base_energy_per_hour"));
    };
    Ok(StakingPool {
        pool_id: ObjectId::parse(id).map_err(|_| bad("invalid pool id"))?,
        name: name.to_string(),
        claim_interval_ms: interval.parse().map_err(|_| bad("invalid interval"))?,
        base_energy_per_hour: energy.parse().map_err(|_| bad("invalid energy rate"))?,
    })
}
