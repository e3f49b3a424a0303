//! Configuration module for environment variable parsing.
//!
//! All settings are read once at startup. The channel secret is the only
//! value without a usable default; the server binary refuses to start
//! without it.

use std::env;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

/// Default path protected by the signature gate.
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhook";

/// Default upper bound on buffered webhook bodies (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// LINE channel secret used as the HMAC key.
///
/// Cloning is cheap and shares the same bytes. The value is never printed:
/// `Debug` is redacted so the secret can't end up in structured logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelSecret(Arc<[u8]>);

impl ChannelSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.iter().all(u8::is_ascii_whitespace)
    }
}

impl fmt::Debug for ChannelSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChannelSecret(<redacted>)")
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// LINE channel secret for X-Line-Signature verification
    pub channel_secret: Option<ChannelSecret>,

    /// Request path guarded by the signature gate
    pub webhook_path: String,

    /// Maximum number of body bytes buffered for verification
    pub max_body_bytes: usize,

    /// Log verified raw payloads at debug level
    pub log_raw_payload: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_or("PORT", 8080),

            channel_secret: env::var("LINE_CHANNEL_SECRET")
                .ok()
                .map(ChannelSecret::new)
                .filter(|s| !s.is_blank()),

            webhook_path: parse_path("WEBHOOK_PATH"),

            max_body_bytes: parse_or("WEBHOOK_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),

            log_raw_payload: parse_flag("LOG_RAW_PAYLOAD"),
        }
    }
}

/// Parse a numeric variable, falling back to `default` when unset or invalid.
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse the webhook path; it must be absolute.
fn parse_path(name: &str) -> String {
    match env::var(name) {
        Ok(raw) if raw.trim().starts_with('/') => raw.trim().to_string(),
        Ok(raw) => {
            warn!(env_var = name, value = %raw, "Webhook path must start with '/', using default");
            DEFAULT_WEBHOOK_PATH.to_string()
        }
        Err(_) => DEFAULT_WEBHOOK_PATH.to_string(),
    }
}

/// Parse a boolean flag. Accepts 1/0, true/false, yes/no, on/off.
fn parse_flag(name: &str) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return false,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" | "" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid flag, using default");
            false
        }
    }
}
