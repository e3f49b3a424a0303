//! Body buffering and replay.
//!
//! A request body is a one-shot stream. The gate drains it exactly once into
//! an owned buffer, and everything downstream reads from a replay view backed
//! by that buffer instead of the transport.
//!
//! ```text
//! transport stream → buffer_body() → ReplayBody → VerifiedRequest → handler
//! ```

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{request::Parts, Method, Uri};
use http_body_util::LengthLimitError;
use thiserror::Error;

/// Failure while draining a request body.
#[derive(Debug, Error)]
pub enum BufferError {
    /// The body exceeded the configured limit; the partial buffer was dropped.
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The transport failed mid-read (e.g. client disconnect).
    #[error("failed to read request body: {0}")]
    Read(#[source] axum::Error),
}

/// Drain `body` into a single contiguous buffer, however many chunks the
/// transport delivers. At most `limit` bytes are accepted.
pub async fn buffer_body(body: Body, limit: usize) -> Result<Bytes, BufferError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if is_length_limit(&e) {
            BufferError::TooLarge { limit }
        } else {
            BufferError::Read(e)
        }
    })
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Immutable, replayable view of a buffered request body.
///
/// Every accessor yields the same bytes, any number of times. Clones share
/// the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayBody(Bytes);

impl ReplayBody {
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// The buffered bytes.
    pub fn bytes(&self) -> Bytes {
        self.0.clone()
    }

    /// A fresh request body over the buffered bytes.
    pub fn body(&self) -> Body {
        Body::from(self.0.clone())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

/// A request whose signature has been checked.
///
/// Keeps method, URI, headers and extensions with the original request; the
/// body source is the verified buffer rather than the transport.
#[derive(Debug)]
pub struct VerifiedRequest {
    parts: Parts,
    payload: ReplayBody,
}

impl VerifiedRequest {
    pub fn new(parts: Parts, payload: ReplayBody) -> Self {
        Self { parts, payload }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn payload(&self) -> &ReplayBody {
        &self.payload
    }

    /// Rebuild an axum request for the next stage.
    ///
    /// The replay view is also stored in the request extensions so handlers
    /// can re-read the verified bytes after consuming the body.
    pub fn into_request(self) -> Request {
        let Self { mut parts, payload } = self;
        let body = payload.body();
        parts.extensions.insert(payload);
        Request::from_parts(parts, body)
    }
}
