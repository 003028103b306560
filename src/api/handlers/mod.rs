//! REST endpoint handlers organized by resource.

pub mod listings;
pub mod owners;
pub mod refresh;
pub mod system;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};

use crate::api::dto::{LoadingResponse, SnapshotMeta};
use crate::app_state::AppState;
use crate::domain::{PassStats, SnapshotState, Topic};
use crate::error::GatewayError;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(listings::routes())
        .merge(owners::routes())
        .merge(refresh::routes())
}

/// Response for a snapshot endpoint whose topic has nothing servable.
#[derive(Debug)]
pub enum NotReady {
    /// No pass has completed yet: `202` with a loading body.
    Loading(Topic),
    /// The request or the latest pass failed.
    Error(GatewayError),
}

impl From<GatewayError> for NotReady {
    fn from(e: GatewayError) -> Self {
        Self::Error(e)
    }
}

impl IntoResponse for NotReady {
    fn into_response(self) -> Response {
        match self {
            Self::Loading(topic) => (
                StatusCode::ACCEPTED,
                Json(LoadingResponse {
                    status: "loading".to_string(),
                    topic: topic.to_string(),
                }),
            )
                .into_response(),
            Self::Error(e) => e.into_response(),
        }
    }
}

/// Extracts a ready snapshot from `state`.
///
/// A failed pass is served as `503` even when an older snapshot exists.
///
/// # Errors
///
/// Returns [`NotReady::Loading`] before the first pass completes and
/// [`NotReady::Error`] with [`GatewayError::SnapshotUnavailable`] after a
/// failed pass.
pub fn ready<T>(topic: Topic, state: SnapshotState<T>) -> Result<(u64, Arc<T>), NotReady> {
    match state {
        SnapshotState::Ready { seq, snapshot } => Ok((seq, snapshot)),
        SnapshotState::Loading => Err(NotReady::Loading(topic)),
        SnapshotState::Failed { seq, error, .. } => {
            tracing::debug!(%topic, seq, error = %error, "serving failed snapshot state");
            Err(NotReady::Error(GatewayError::SnapshotUnavailable(format!(
                "{topic}: {error}"
            ))))
        }
    }
}

/// Builds the freshness block of a ready response.
pub(crate) fn snapshot_meta(seq: u64, generated_at_ms: u64, stats: &PassStats) -> SnapshotMeta {
    SnapshotMeta {
        status: "ready".to_string(),
        seq,
        generated_at_ms,
        stats: stats.clone(),
    }
}
