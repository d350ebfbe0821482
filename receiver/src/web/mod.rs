//! Web server module for the identity provider webhook.
//!
//! This module provides:
//! - Signature verification over the raw request body
//! - The webhook handler and router
//! - The mapping from outcomes to HTTP responses

pub mod handlers;
pub mod response;
pub mod signature;

pub use handlers::{health, identity_webhook, router, AppState, HealthResponse, WEBHOOK_PATH};
pub use response::{Disposition, WebhookError, WebhookResponse};
pub use signature::{
    compute_signature, verify, verify_at, Secret, SignedRequest, VerificationError,
    VerifiedPayload,
};
