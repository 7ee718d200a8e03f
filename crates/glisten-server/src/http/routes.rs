//! HTTP handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::Value;

use glisten_core::{HubError, IngressError};
use glisten_hub::HubStats;

use crate::state::GlistenState;

/// Body returned after a webhook was accepted
pub const ACK_BODY: &str = "Data received!";

/// Body returned by pull endpoints when no event is retained
pub const EMPTY_BODY: &str = "No events";

/// Error responses of the HTTP API
#[derive(Debug)]
pub enum ApiError {
    /// The webhook body was rejected
    BadRequest(IngressError),
    /// A hub read or attach could not be served
    Hub(HubError),
}

impl From<IngressError> for ApiError {
    fn from(e: IngressError) -> Self {
        ApiError::BadRequest(e)
    }
}

impl From<HubError> for ApiError {
    fn from(e: HubError) -> Self {
        ApiError::Hub(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
            ApiError::Hub(HubError::EmptyStore) => {
                (StatusCode::NOT_FOUND, EMPTY_BODY).into_response()
            }
            ApiError::Hub(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
        }
    }
}

/// Turn a webhook body into an event payload
///
/// The body must be a JSON object carrying `field` as a non-empty string,
/// a number or a boolean. Control characters are replaced by spaces so a
/// payload always renders as a single terminal line.
pub fn extract_payload(body: &[u8], field: &str) -> Result<String, IngressError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| IngressError::MalformedJson(e.to_string()))?;
    let object = value.as_object().ok_or(IngressError::NotAnObject)?;
    let raw = object
        .get(field)
        .ok_or_else(|| IngressError::MissingField(field.to_string()))?;

    let text = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return Err(IngressError::InvalidField(field.to_string())),
    };

    if text.trim().is_empty() {
        return Err(IngressError::EmptyField(field.to_string()));
    }

    Ok(text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect())
}

/// POST /post - publish a webhook event
pub async fn receive_webhook(
    State(state): State<Arc<GlistenState>>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let payload = match extract_payload(&body, &state.config.event_field) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Rejected webhook: {}", e);
            return Err(e.into());
        }
    };

    let event = state.hub.publish(payload);
    tracing::info!(
        "Webhook event #{} delivered to {} sessions",
        event.sequence,
        state.hub.session_count()
    );

    Ok(ACK_BODY)
}

/// GET / - the current event according to the configured read mode
pub async fn current_event(State(state): State<Arc<GlistenState>>) -> Result<String, ApiError> {
    Ok(state.hub.latest()?.payload)
}

/// GET /events/first - oldest retained event, not removed
pub async fn first_event(State(state): State<Arc<GlistenState>>) -> Result<String, ApiError> {
    Ok(state.hub.first()?.payload)
}

/// POST /events/latest - remove and return the newest event
pub async fn drain_latest(State(state): State<Arc<GlistenState>>) -> Result<String, ApiError> {
    Ok(state.hub.pop_latest()?.payload)
}

/// GET /status - hub counters
pub async fn status(State(state): State<Arc<GlistenState>>) -> Json<HubStats> {
    Json(state.hub.stats())
}
