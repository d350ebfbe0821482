//! Identity provider webhook signature verification.
//!
//! Each delivery carries three headers: a message id, a unix timestamp in
//! seconds and a signature list. The signature is the base64 HMAC-SHA256 of
//! `{id}.{timestamp}.{body}` keyed with the shared secret, where `body` is the
//! exact byte sequence received on the wire.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the unique delivery id.
pub const SIGNATURE_ID_HEADER: &str = "signature-id";
/// Header carrying the unix timestamp (seconds) the delivery was signed at.
pub const SIGNATURE_TIMESTAMP_HEADER: &str = "signature-timestamp";
/// Header carrying the space-separated `version,signature` list.
pub const SIGNATURE_VALUE_HEADER: &str = "signature-value";

const ID_ALIASES: [&str; 2] = [SIGNATURE_ID_HEADER, "svix-id"];
const TIMESTAMP_ALIASES: [&str; 2] = [SIGNATURE_TIMESTAMP_HEADER, "svix-timestamp"];
const SIGNATURE_ALIASES: [&str; 2] = [SIGNATURE_VALUE_HEADER, "svix-signature"];

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// Reasons a delivery is refused before its body is trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("webhook secret is not configured")]
    ConfigurationMissing,

    #[error("missing signature headers")]
    MissingHeaders,

    #[error("signature timestamp is not a unix timestamp")]
    InvalidTimestamp,

    #[error("signature timestamp is outside the {tolerance_secs}s tolerance (age {age_secs}s)")]
    TimestampOutOfTolerance { age_secs: u64, tolerance_secs: u64 },

    #[error("signature does not match")]
    BadSignature,
}

/// Errors raised while loading the shared secret.
#[derive(Debug, thiserror::Error)]
pub enum InvalidSecret {
    #[error("webhook secret is empty")]
    Empty,

    #[error("webhook secret is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
}

/// Shared HMAC key. The bytes are never printed.
#[derive(Clone)]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Parse a configured secret.
    ///
    /// Values prefixed with `whsec_` are base64 encoded, anything else is
    /// used as raw bytes.
    pub fn parse(raw: &str) -> Result<Self, InvalidSecret> {
        let raw = raw.trim();
        let bytes = match raw.strip_prefix(SECRET_PREFIX) {
            Some(encoded) => STANDARD.decode(encoded)?,
            None => raw.as_bytes().to_vec(),
        };

        if bytes.is_empty() {
            return Err(InvalidSecret::Empty);
        }

        Ok(Secret(bytes))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// The raw body plus the three signature headers as received.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub body: &'a [u8],
    pub id: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
}

impl<'a> SignedRequest<'a> {
    /// Collect the signature headers. Names are case-insensitive and blank
    /// values count as missing.
    pub fn from_headers(headers: &'a HeaderMap, body: &'a [u8]) -> Self {
        Self {
            body,
            id: header_value(headers, &ID_ALIASES),
            timestamp: header_value(headers, &TIMESTAMP_ALIASES),
            signature: header_value(headers, &SIGNATURE_ALIASES),
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    })
}

/// A body that was signed by a holder of the secret within the tolerance window.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedPayload<'a>(&'a [u8]);

impl<'a> VerifiedPayload<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn assume_verified(body: &'a [u8]) -> Self {
        VerifiedPayload(body)
    }
}

/// Verify a delivery against the secret using the current system time.
pub fn verify<'a>(
    request: &SignedRequest<'a>,
    secret: Option<&Secret>,
    tolerance_secs: u64,
) -> Result<VerifiedPayload<'a>, VerificationError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    verify_at(request, secret, tolerance_secs, now)
}

/// Verify a delivery as of `now` (unix seconds).
///
/// Checks run in a fixed order: secret, headers, timestamp, signature.
pub fn verify_at<'a>(
    request: &SignedRequest<'a>,
    secret: Option<&Secret>,
    tolerance_secs: u64,
    now: i64,
) -> Result<VerifiedPayload<'a>, VerificationError> {
    let secret = secret.ok_or(VerificationError::ConfigurationMissing)?;

    let (id, timestamp, signature) = match (request.id, request.timestamp, request.signature) {
        (Some(id), Some(ts), Some(sig)) => (id, ts, sig),
        _ => {
            warn!(
                has_id = request.id.is_some(),
                has_timestamp = request.timestamp.is_some(),
                has_signature = request.signature.is_some(),
                "webhook_signature_missing_headers"
            );
            return Err(VerificationError::MissingHeaders);
        }
    };

    let signed_at: i64 = timestamp.parse().map_err(|_| {
        warn!(timestamp = %timestamp, "webhook_signature_invalid_timestamp");
        VerificationError::InvalidTimestamp
    })?;

    let age_secs = now.abs_diff(signed_at);
    if age_secs > tolerance_secs {
        warn!(
            webhook_id = %id,
            signed_at = signed_at,
            current_time = now,
            age_seconds = age_secs,
            tolerance_seconds = tolerance_secs,
            "webhook_signature_stale"
        );
        return Err(VerificationError::TimestampOutOfTolerance {
            age_secs,
            tolerance_secs,
        });
    }

    let expected = compute_signature(secret, id, timestamp, request.body);

    // No early exit: every candidate is compared.
    let mut matched = false;
    for entry in signature.split_whitespace() {
        if let Some((version, candidate)) = entry.split_once(',') {
            if version == SIGNATURE_VERSION {
                matched |= bool::from(expected.as_bytes().ct_eq(candidate.as_bytes()));
            }
        }
    }

    if !matched {
        warn!(
            webhook_id = %id,
            candidates = signature.split_whitespace().count(),
            "webhook_signature_mismatch"
        );
        return Err(VerificationError::BadSignature);
    }

    Ok(VerifiedPayload(request.body))
}

/// Base64 HMAC-SHA256 of `{id}.{timestamp}.{body}`.
pub fn compute_signature(secret: &Secret, id: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(&secret.0).expect("HMAC accepts any key length");
    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}
