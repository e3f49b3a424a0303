//! LINE webhook signature computation and verification.
//!
//! LINE signs every webhook request body with HMAC-SHA256 keyed by the
//! channel secret and sends the standard base64 (padded) digest in the
//! `X-Line-Signature` header.
//! Reference: https://developers.line.biz/en/reference/messaging-api/#signature-validation

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Why a signature was not accepted.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The header value is not the signature of this payload.
    #[error("signature does not match payload")]
    Mismatch,

    /// The digest could not be computed at all (bad key material).
    #[error("failed to compute signature: {0}")]
    Crypto(#[from] hmac::digest::InvalidLength),
}

/// Compute the `X-Line-Signature` value for `payload`.
///
/// The digest is taken over the bytes exactly as given; callers must pass the
/// body as received on the wire, never a re-serialized form.
pub fn compute_signature(secret: &[u8], payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(payload);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verify a claimed signature against `payload`.
///
/// Malformed header values (wrong length, not base64) are simply mismatches.
pub fn verify_signature(secret: &[u8], payload: &[u8], claimed: &str) -> Result<(), SignatureError> {
    let expected = compute_signature(secret, payload)?;

    if constant_time_compare(expected.as_bytes(), claimed.as_bytes()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Constant-time comparison. Unequal lengths short-circuit; the length of a
/// SHA-256 base64 digest is public anyway.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}
