//! Manual pass trigger.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{RefreshParams, RefreshRequest, RefreshResponse};
use crate::app_state::AppState;
use crate::domain::Topic;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /refresh` — Trigger a reconstruction pass.
///
/// Joins the pass already in flight for the topic, if any.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a malformed body or an
/// unparseable topic.
#[utoipa::path(
    post,
    path = "/api/v1/refresh",
    tag = "Refresh",
    summary = "Trigger a pass",
    description = "Starts a pass for the topic (default `listings`) or joins the one in flight. With `wait=true` the response carries the pass outcome; otherwise it returns 202 immediately.",
    params(RefreshParams),
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Pass finished", body = RefreshResponse),
        (status = 202, description = "Pass scheduled", body = RefreshResponse),
        (status = 400, description = "Invalid topic", body = ErrorResponse),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Query(params): Query<RefreshParams>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let request: RefreshRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| GatewayError::InvalidRequest(format!("refresh body: {e}")))?
    };
    let topic = match request.topic {
        Some(raw) => raw.parse::<Topic>()?,
        None => Topic::Listings,
    };
    if let Topic::Stakes(owner) = &topic {
        state.scheduler.track_owner(owner.clone()).await;
    }

    if params.wait {
        let report = state.scheduler.refresh(topic).await;
        return Ok((StatusCode::OK, Json(RefreshResponse::from(report))));
    }

    drop(state.scheduler.trigger(topic.clone()).await);
    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            topic: topic.to_string(),
            status: "scheduled".to_string(),
            seq: None,
            error: None,
        }),
    ))
}

/// Refresh routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/refresh", post(refresh))
}
