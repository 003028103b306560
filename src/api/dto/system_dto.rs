//! Health, chain configuration, and refresh DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::config::ChainConfig;
use crate::domain::{ObjectId, StakingPool};
use crate::service::PassReport;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"healthy"`.
    pub status: String,
    /// Server time, RFC 3339.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
}

/// One configured staking pool.
#[derive(Debug, Serialize, ToSchema)]
pub struct PoolConfigDto {
    /// Pool id.
    pub pool_id: ObjectId,
    /// Pool name.
    pub name: String,
    /// Minimum time between claims.
    pub claim_interval_ms: u64,
    /// Energy per NFT per hour.
    pub base_energy_per_hour: f64,
}

impl From<&StakingPool> for PoolConfigDto {
    fn from(pool: &StakingPool) -> Self {
        Self {
            pool_id: pool.pool_id.clone(),
            name: pool.name.clone(),
            claim_interval_ms: pool.claim_interval_ms,
            base_energy_per_hour: pool.base_energy_per_hour,
        }
    }
}

/// Response for `GET /config/chain`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChainConfigResponse {
    /// Marketplace package id.
    pub market_package_id: Option<ObjectId>,
    /// Collection NFT type.
    pub nft_type: String,
    /// Staking package id.
    pub staking_package_id: Option<ObjectId>,
    /// Staking module name.
    pub staking_module: String,
    /// Configured pools.
    pub pools: Vec<PoolConfigDto>,
}

impl From<&ChainConfig> for ChainConfigResponse {
    fn from(chain: &ChainConfig) -> Self {
        Self {
            market_package_id: chain.market_package_id.clone(),
            nft_type: chain.nft_type.clone(),
            staking_package_id: chain.staking_package_id.clone(),
            staking_module: chain.staking_module.clone(),
            pools: chain.pools.iter().map(PoolConfigDto::from).collect(),
        }
    }
}

/// Request body for `POST /refresh`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// `listings` (default), `stakes:<owner>`, or a bare owner address.
    #[serde(default)]
    pub topic: Option<String>,
}

/// Query parameters for `POST /refresh`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RefreshParams {
    /// Wait for the pass to finish before responding.
    #[serde(default)]
    pub wait: bool,
}

/// Response for `POST /refresh`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    /// Topic label.
    pub topic: String,
    /// `scheduled`, `ready`, `failed`, or `stale`.
    pub status: String,
    /// Pass sequence number, once known.
    pub seq: Option<u64>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<PassReport> for RefreshResponse {
    fn from(report: PassReport) -> Self {
        let status = match (&report.error, report.applied) {
            (_, false) => "stale",
            (None, true) => "ready",
            (Some(_), true) => "failed",
        };
        Self {
            topic: report.topic,
            status: status.to_string(),
            seq: Some(report.seq),
            error: report.error,
        }
    }
}
