//! LINE webhook receiver.
//!
//! Verifies the `X-Line-Signature` HMAC on every request to the webhook path
//! before the body reaches any handler.
//!
//! ## Architecture
//!
//! ```text
//! LINE → signature gate (buffer → HMAC-SHA256 → compare) → webhook endpoint
//!              ↓ 401 / 403
//! ```

pub mod config;
pub mod events;
pub mod web;

// Re-export commonly used types
pub use config::{ChannelSecret, Config};
pub use events::{Event, Message, Source, WebhookRequest};
pub use web::{router, GateRejection, SignatureGate};
