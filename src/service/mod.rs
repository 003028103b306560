//! Service layer: reconstruction passes and their scheduling.
//!
//! [`ReconstructionEngine`] runs one pass over the injected chain sources;
//! [`Scheduler`] decides when passes run, coalesces duplicate triggers, and
//! publishes results through the [`super::domain::SnapshotStore`] and
//! [`super::domain::EventBus`].

pub mod cross_ref;
pub mod engine;
pub mod ingestor;
pub mod pool_state;
pub mod retry;
pub mod scheduler;

pub use cross_ref::{CrossReferencer, PoolHandle, StakeCheck};
pub use engine::ReconstructionEngine;
pub use ingestor::{EventIngestor, Ingested};
pub use pool_state::PoolStateReader;
pub use retry::RetryPolicy;
pub use scheduler::{PassHandle, PassReport, Scheduler, now_ms};
