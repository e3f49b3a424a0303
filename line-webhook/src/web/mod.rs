//! Web server module for receiving LINE webhooks.
//!
//! This module provides:
//! - The signature gate middleware guarding the webhook path
//! - Body buffering and replay for verified requests
//! - The webhook and health endpoints

pub mod gate;
pub mod handlers;
pub mod replay;
pub mod signature;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use gate::{signature_gate, GateRejection, SignatureGate};
pub use handlers::{health, line_webhook, EndpointError, HealthResponse, ACK_BODY};
pub use replay::{buffer_body, BufferError, ReplayBody, VerifiedRequest};
pub use signature::{compute_signature, verify_signature, SignatureError, SIGNATURE_HEADER};

/// Build the application router.
///
/// The gate wraps every route and decides by path whether to verify. The
/// webhook handler reads the gate's replay buffer rather than extracting the
/// body itself, so the gate's limit is the only one applied to webhooks.
pub fn router(gate: SignatureGate) -> Router {
    let webhook_path = gate.path().to_string();

    Router::new()
        .route("/health", get(health))
        .route(&webhook_path, post(line_webhook))
        .layer(middleware::from_fn_with_state(gate, signature_gate))
        .layer(TraceLayer::new_for_http())
}
