//! Authoritative per-owner pool state via read-only view calls.
//!
//! Pending rewards and the last claim time are not derivable from events;
//! they are read by dev-inspecting a transaction that calls the pool's
//! `pending_rewards(pool, owner)` and `last_claim_time(pool, owner)`.

use std::sync::Arc;

use super::cross_ref::PoolHandle;
use super::retry::RetryPolicy;
use crate::chain::{ObjectSource, ProgrammableTx};
use crate::domain::ObjectId;
use crate::domain::rewards::PoolAuthority;
use crate::error::GatewayError;

/// View function returning pending rewards in base units.
pub const PENDING_REWARDS_FN: &str = "pending_rewards";

/// View function returning the last claim time in milliseconds, zero when
/// the owner never claimed.
pub const LAST_CLAIM_TIME_FN: &str = "last_claim_time";

/// Reads [`PoolAuthority`] for an owner.
#[derive(Debug, Clone)]
pub struct PoolStateReader {
    objects: Arc<dyn ObjectSource>,
    package: ObjectId,
    module: String,
    retry: RetryPolicy,
}

impl PoolStateReader {
    /// Creates a reader for the staking module `package::module`.
    #[must_use]
    pub fn new(
        objects: Arc<dyn ObjectSource>,
        package: ObjectId,
        module: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            objects,
            package,
            module: module.into(),
            retry,
        }
    }

    /// Builds the view transaction for `(pool, owner)`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Malformed`] when the pool is not a shared
    /// object.
    pub fn view_tx(&self, handle: &PoolHandle, owner: &ObjectId) -> Result<ProgrammableTx, GatewayError> {
        let version = handle.initial_shared_version.ok_or_else(|| {
            GatewayError::Malformed(format!("pool {} is not shared", handle.pool_id))
        })?;
        let mut tx = ProgrammableTx::new();
        let pool = tx.shared_object(handle.pool_id.clone(), version, false)?;
        let who = tx.pure_address(owner)?;
        for function in [PENDING_REWARDS_FN, LAST_CLAIM_TIME_FN] {
            tx.move_call(self.package.clone(), self.module.as_str(), function, &[pool, who]);
        }
        Ok(tx)
    }

    /// Reads pending rewards and last claim time for an owner.
    ///
    /// # Errors
    ///
    /// Returns the source error after retries, or
    /// [`GatewayError::Malformed`] when the results have the wrong shape.
    pub async fn read(&self, handle: &PoolHandle, owner: &ObjectId) -> Result<PoolAuthority, GatewayError> {
        let tx = self.view_tx(handle, owner)?;
        let attempted = self
            .retry
            .run(handle.pool_id.as_str(), || self.objects.dev_inspect(owner, &tx))
            .await;
        let results = attempted.result?;

        let mut values = results.iter().map(|r| r.first_u64());
        let (Some(pending), Some(last_claim)) = (values.next(), values.next()) else {
            return Err(GatewayError::Malformed(format!(
                "expected 2 view results from pool {}, got {}",
                handle.pool_id,
                results.len()
            )));
        };
        let last_claim = last_claim?;
        Ok(PoolAuthority {
            pending_rewards: pending?,
            last_claim_ms: (last_claim > 0).then_some(last_claim),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::MemoryChain;

    fn id(hex: &str) -> ObjectId {
        ObjectId::parse(hex).unwrap_or_else(|_| panic!("valid id {hex}"))
    }

    fn handle(initial_shared_version: Option<u64>) -> PoolHandle {
        PoolHandle {
            pool_id: id("0xa"),
            table_id: id("0x7ab1e"),
            initial_shared_version,
        }
    }

    fn reader(chain: &Arc<MemoryChain>) -> PoolStateReader {
        PoolStateReader::new(
            Arc::clone(chain) as Arc<dyn ObjectSource>,
            id("0x1234"),
            "staking",
            RetryPolicy::none(),
        )
    }

    #[tokio::test]
    async fn reads_pending_and_last_claim() {
        let chain = Arc::new(MemoryChain::new());
        chain
            .set_view(PENDING_REWARDS_FN, &id("0xa"), &id("0xc0"), 5_000_000_000)
            .await;
        chain
            .set_view(LAST_CLAIM_TIME_FN, &id("0xa"), &id("0xc0"), 1_000)
            .await;
        let authority = reader(&chain).read(&handle(Some(3)), &id("0xc0")).await;
        assert_eq!(
            authority,
            Ok(PoolAuthority {
                pending_rewards: 5_000_000_000,
                last_claim_ms: Some(1_000),
            })
        );
    }

    #[tokio::test]
    async fn zero_last_claim_means_never() {
        let chain = Arc::new(MemoryChain::new());
        let Ok(authority) = reader(&chain).read(&handle(Some(3)), &id("0xc0")).await else {
            panic!("read");
        };
        assert_eq!(authority.last_claim_ms, None);
    }

    #[tokio::test]
    async fn failure_and_unshared_pool_are_errors() {
        let chain = Arc::new(MemoryChain::new());
        chain.fail_views(&id("0xa")).await;
        assert!(reader(&chain).read(&handle(Some(3)), &id("0xc0")).await.is_err());
        assert!(matches!(
            reader(&chain).view_tx(&handle(None), &id("0xc0")),
            Err(GatewayError::Malformed(_))
        ));
    }

    #[test]
    fn view_tx_calls_both_functions() {
        let chain = Arc::new(MemoryChain::new());
        let Ok(tx) = reader(&chain).view_tx(&handle(Some(3)), &id("0xc0")) else {
            panic!("tx");
        };
        let targets: Vec<String> = tx.call_targets().collect();
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().any(|t| t.ends_with("::staking::pending_rewards")));
        assert!(targets.iter().any(|t| t.ends_with("::staking::last_claim_time")));
    }
}
