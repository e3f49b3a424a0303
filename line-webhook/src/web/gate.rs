//! Signature gate middleware.
//!
//! Every request to the webhook path must carry a valid `X-Line-Signature`.
//! The gate buffers the body once, checks the signature over those exact
//! bytes, and forwards a request whose body replays the buffer. Requests to
//! any other path are passed through untouched.
//!
//! ```text
//! path-check → header-check → buffer → hash-compare → {reject | forward}
//! ```

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ChannelSecret, Config, DEFAULT_MAX_BODY_BYTES, DEFAULT_WEBHOOK_PATH};
use crate::web::replay::{buffer_body, BufferError, ReplayBody, VerifiedRequest};
use crate::web::signature::{verify_signature, SignatureError, SIGNATURE_HEADER};

/// Why the gate refused a request.
///
/// Every variant maps to a fixed status with an empty body; nothing about the
/// failure leaks to the caller.
#[derive(Debug, Error)]
pub enum GateRejection {
    #[error("missing X-Line-Signature header")]
    MissingSignature,

    #[error("X-Line-Signature does not match payload")]
    InvalidSignature,

    #[error("signature could not be computed")]
    CryptoFailure,

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("request body could not be read")]
    BodyRead,
}

impl GateRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            GateRejection::MissingSignature => StatusCode::UNAUTHORIZED,
            // Fail closed: a digest we can't compute is a digest that doesn't match.
            GateRejection::InvalidSignature | GateRejection::CryptoFailure => StatusCode::FORBIDDEN,
            GateRejection::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GateRejection::BodyRead => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<SignatureError> for GateRejection {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Mismatch => GateRejection::InvalidSignature,
            SignatureError::Crypto(_) => GateRejection::CryptoFailure,
        }
    }
}

impl From<BufferError> for GateRejection {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::TooLarge { limit } => GateRejection::PayloadTooLarge { limit },
            BufferError::Read(_) => GateRejection::BodyRead,
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}

/// HMAC-SHA256 gate in front of the webhook path.
///
/// Holds only immutable state; clones are cheap and safe to share across
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct SignatureGate {
    secret: ChannelSecret,
    path: Arc<str>,
    max_body_bytes: usize,
    log_raw_payload: bool,
}

impl SignatureGate {
    pub fn new(secret: ChannelSecret) -> Self {
        Self {
            secret,
            path: Arc::from(DEFAULT_WEBHOOK_PATH),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_raw_payload: false,
        }
    }

    /// Build a gate from loaded configuration and the channel secret.
    pub fn from_config(config: &Config, secret: ChannelSecret) -> Self {
        Self::new(secret)
            .with_path(config.webhook_path.as_str())
            .with_max_body_bytes(config.max_body_bytes)
            .with_raw_payload_logging(config.log_raw_payload)
    }

    pub fn with_path(mut self, path: impl Into<Arc<str>>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn with_raw_payload_logging(mut self, enabled: bool) -> Self {
        self.log_raw_payload = enabled;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether requests to `path` go through verification.
    pub fn guards(&self, path: &str) -> bool {
        path == &*self.path
    }

    /// Verify a request to the guarded path.
    ///
    /// The body is not touched when the header is missing. Otherwise it is
    /// drained exactly once; on success the returned request replays it.
    pub async fn verify(&self, request: Request) -> Result<VerifiedRequest, GateRejection> {
        let claimed = match request.headers().get(SIGNATURE_HEADER) {
            Some(value) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            None => {
                warn!(path = %request.uri().path(), "webhook_signature_missing");
                return Err(GateRejection::MissingSignature);
            }
        };

        let (parts, body) = request.into_parts();

        let payload = buffer_body(body, self.max_body_bytes).await.map_err(|e| {
            warn!(error = %e, "webhook_body_read_failed");
            GateRejection::from(e)
        })?;

        if let Err(e) = verify_signature(self.secret.as_bytes(), &payload, &claimed) {
            match &e {
                SignatureError::Mismatch => warn!(
                    payload_length = payload.len(),
                    signature_length = claimed.len(),
                    "webhook_signature_invalid"
                ),
                SignatureError::Crypto(err) => {
                    error!(error = %err, "webhook_signature_crypto_failure")
                }
            }
            return Err(e.into());
        }

        let verified = VerifiedRequest::new(parts, ReplayBody::new(payload));

        info!(
            method = %verified.method(),
            path = %verified.uri().path(),
            payload_length = verified.payload().as_slice().len(),
            "webhook_signature_verified"
        );
        if self.log_raw_payload {
            debug!(
                payload = %String::from_utf8_lossy(verified.payload().as_slice()),
                "webhook_raw_payload"
            );
        }

        Ok(verified)
    }
}

/// Axum middleware running [`SignatureGate`] on every request.
///
/// ```rust,ignore
/// Router::new()
///     .route("/webhook", post(line_webhook))
///     .layer(axum::middleware::from_fn_with_state(gate, signature_gate));
/// ```
pub async fn signature_gate(
    State(gate): State<SignatureGate>,
    request: Request,
    next: Next,
) -> Response {
    if !gate.guards(request.uri().path()) {
        return next.run(request).await;
    }

    match gate.verify(request).await {
        Ok(verified) => next.run(verified.into_request()).await,
        Err(rejection) => rejection.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::signature::compute_signature;
    use axum::{
        body::{Body, Bytes},
        routing::{get, post},
        Extension, Router,
    };
    use futures::stream;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    const SECRET: &str = "testsecret";
    const EMPTY_EVENTS: &str = r#"{"events":[]}"#;

    fn gate() -> SignatureGate {
        SignatureGate::new(ChannelSecret::new(SECRET))
    }

    fn sign(body: &[u8]) -> String {
        compute_signature(SECRET.as_bytes(), body).unwrap()
    }

    /// Echo the body twice: once from the stream, once from the replay view.
    async fn echo(Extension(replay): Extension<ReplayBody>, body: Bytes) -> Vec<u8> {
        assert_eq!(replay.bytes(), body);
        let mut out = body.to_vec();
        out.extend_from_slice(replay.as_slice());
        out
    }

    async fn other() -> &'static str {
        "other"
    }

    fn app(gate: SignatureGate) -> Router {
        Router::new()
            .route("/webhook", post(echo))
            .route("/other", get(other).post(other))
            .layer(axum::middleware::from_fn_with_state(gate, signature_gate))
    }

    fn webhook_request(signature: Option<&str>, body: Body) -> Request {
        let mut builder = axum::http::Request::builder().method("POST").uri("/webhook");
        if let Some(sig) = signature {
            builder = builder.header("X-Line-Signature", sig);
        }
        builder.body(body).unwrap()
    }

    /// A body that records whether anyone polled it.
    fn tracked_body(polled: Arc<AtomicBool>) -> Body {
        Body::from_stream(stream::once(async move {
            polled.store(true, Ordering::SeqCst);
            Ok::<_, io::Error>(Bytes::from_static(EMPTY_EVENTS.as_bytes()))
        }))
    }

    async fn read_body(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn test_valid_signature_forwards_identical_bytes() {
        let body = br#"{"events":[{"type":"message"}]}"#;
        let sig = sign(body);

        let response = app(gate())
            .oneshot(webhook_request(Some(&sig), Body::from(&body[..])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let echoed = read_body(response).await;
        assert_eq!(&echoed[..body.len()], &body[..]);
        assert_eq!(&echoed[body.len()..], &body[..]);
    }

    #[tokio::test]
    async fn test_chunked_body_verifies_like_single_chunk() {
        let sig = sign(EMPTY_EVENTS.as_bytes());
        let chunks: Vec<Result<Bytes, io::Error>> = EMPTY_EVENTS
            .as_bytes()
            .chunks(3)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let response = app(gate())
            .oneshot(webhook_request(Some(&sig), Body::from_stream(stream::iter(chunks))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_signature_is_401_without_reading_body() {
        let polled = Arc::new(AtomicBool::new(false));

        let response = app(gate())
            .oneshot(webhook_request(None, tracked_body(polled.clone())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(read_body(response).await.is_empty());
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_wrong_signature_is_403_with_empty_body() {
        let response = app(gate())
            .oneshot(webhook_request(Some("AAAA"), Body::from(EMPTY_EVENTS)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(read_body(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_non_ascii_signature_is_403() {
        let value = axum::http::HeaderValue::from_bytes(&[0xff, 0xfe, b'a']).unwrap();
        let mut request = webhook_request(None, Body::from(EMPTY_EVENTS));
        request.headers_mut().insert(SIGNATURE_HEADER, value);

        let response = app(gate()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_other_paths_bypass_gate() {
        let polled = Arc::new(AtomicBool::new(false));
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/other")
            .body(tracked_body(polled.clone()))
            .unwrap();

        let response = app(gate()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&read_body(response).await[..], b"other");
        // The handler ignores its body, and the gate never looked at it.
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_path_match_is_exact() {
        let response = app(gate())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/webhook/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Not guarded, so the router answers instead of the gate.
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_custom_path() {
        let gate = gate().with_path("/line/callback");
        assert!(gate.guards("/line/callback"));
        assert!(!gate.guards("/webhook"));

        // "/webhook" is no longer guarded, so an unsigned request reaches the
        // handler, which then fails on the missing extension.
        let response = app(gate)
            .oneshot(webhook_request(None, Body::from(EMPTY_EVENTS)))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let body = vec![b' '; 128];
        let sig = sign(&body);

        let response = app(gate().with_max_body_bytes(64))
            .oneshot(webhook_request(Some(&sig), Body::from(body)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(read_body(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_body_is_400() {
        let sig = sign(EMPTY_EVENTS.as_bytes());
        let chunks: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"events\"")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];

        let response = app(gate())
            .oneshot(webhook_request(Some(&sig), Body::from_stream(stream::iter(chunks))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let gate = gate();
        let sig = sign(EMPTY_EVENTS.as_bytes());

        for _ in 0..5 {
            let ok = gate
                .verify(webhook_request(Some(&sig), Body::from(EMPTY_EVENTS)))
                .await;
            assert!(ok.is_ok());

            let bad = gate
                .verify(webhook_request(Some("AAAA"), Body::from(EMPTY_EVENTS)))
                .await;
            assert!(matches!(bad, Err(GateRejection::InvalidSignature)));
        }
    }

    #[test]
    fn test_rejection_statuses() {
        assert_eq!(GateRejection::MissingSignature.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GateRejection::InvalidSignature.status(), StatusCode::FORBIDDEN);
        assert_eq!(GateRejection::BodyRead.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GateRejection::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_crypto_failure_fails_closed() {
        let rejection = GateRejection::from(SignatureError::Crypto(hmac::digest::InvalidLength));
        assert!(matches!(rejection, GateRejection::CryptoFailure));
        assert_eq!(rejection.status(), StatusCode::FORBIDDEN);
        assert_eq!(rejection.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            port: 8080,
            channel_secret: None,
            webhook_path: "/callback".to_string(),
            max_body_bytes: 10,
            log_raw_payload: true,
        };
        let gate = SignatureGate::from_config(&config, ChannelSecret::new(SECRET));

        assert_eq!(gate.path(), "/callback");
        assert_eq!(gate.max_body_bytes, 10);
        assert!(gate.log_raw_payload);
    }
}
