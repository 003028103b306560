//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::{EventBus, SnapshotStore};
use crate::service::Scheduler;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Pass scheduler; also gives access to the engine for direct reads.
    pub scheduler: Arc<Scheduler>,
    /// Published snapshots.
    pub store: Arc<SnapshotStore>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wires a scheduler around `engine`, sharing one store and bus.
    #[must_use]
    pub fn new(
        engine: Arc<crate::service::ReconstructionEngine>,
        store: Arc<SnapshotStore>,
        event_bus: EventBus,
    ) -> Self {
        let scheduler = Arc::new(Scheduler::new(
            engine,
            Arc::clone(&store),
            event_bus.clone(),
        ));
        Self {
            scheduler,
            store,
            event_bus,
        }
    }
}
