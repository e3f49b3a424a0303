//! Webhook endpoint handlers.
//!
//! The webhook handler sits behind the signature gate: anything reaching it
//! has already been verified, so it only parses the envelope and
//! acknowledges.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::WebhookRequest;
use crate::web::replay::ReplayBody;
use crate::web::signature::SIGNATURE_HEADER;

/// Acknowledgment body returned to LINE.
pub const ACK_BODY: &str = "Webhook received";

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// LINE Webhook
// =============================================================================

/// Endpoint-level failures.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

impl IntoResponse for EndpointError {
    fn into_response(self) -> Response {
        match self {
            EndpointError::MalformedPayload(_) => {
                (StatusCode::BAD_REQUEST, "Invalid payload").into_response()
            }
        }
    }
}

/// LINE webhook endpoint.
///
/// Reads the gate's replay buffer from the request extensions, so the body
/// is byte-identical to what LINE sent and is bounded only by the gate's
/// limit. The signature header is logged for tracing only; it is not
/// re-checked.
pub async fn line_webhook(
    headers: HeaderMap,
    Extension(payload): Extension<ReplayBody>,
) -> Result<(StatusCode, &'static str), EndpointError> {
    let body = payload.as_slice();
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let request: WebhookRequest = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, body_length = body.len(), "webhook_payload_malformed");
        EndpointError::from(e)
    })?;

    info!(
        signature = %signature,
        destination = ?request.destination,
        event_count = request.events.len(),
        message_count = request.events.iter().filter(|e| e.is_message()).count(),
        "webhook_received"
    );

    if request.is_verification() {
        info!("webhook_verification_received");
    }

    for (index, event) in request.events.iter().enumerate() {
        info!(
            index = index,
            event_type = %event.event_type,
            source_type = event.source.as_ref().map(|s| s.source_type.as_str()),
            message_type = event.message.as_ref().map(|m| m.message_type.as_str()),
            has_reply_token = event.reply_token.is_some(),
            "webhook_event"
        );
        debug!(
            index = index,
            user_id = ?event.source.as_ref().and_then(|s| s.user_id.as_deref()),
            text = ?event.message.as_ref().and_then(|m| m.text.as_deref()),
            "webhook_event_detail"
        );
    }

    Ok((StatusCode::OK, ACK_BODY))
}
