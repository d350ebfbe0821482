//! Mapping webhook outcomes to HTTP responses.
//!
//! | Outcome                          | Status |
//! |----------------------------------|--------|
//! | secret not configured            | 500    |
//! | missing signature headers        | 400    |
//! | bad signature / stale timestamp  | 400    |
//! | malformed payload                | 400    |
//! | missing email / account id       | 400    |
//! | store failure (synchronous path) | 500    |
//! | create accepted                  | 202    |
//! | update / delete applied          | 200    |
//! | unhandled event type             | 200    |
//!
//! The handler stops at the first failure, so the order of its checks is the
//! precedence between these rows.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::events::DecodeError;
use crate::routing::RoutingError;
use crate::store::StoreError;
use crate::web::signature::VerificationError;

/// Body returned for every webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// Every way a webhook request can fail.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WebhookError {
    /// HTTP status and body for this failure.
    pub fn classify(&self) -> (StatusCode, WebhookResponse) {
        let (status, tag, message) = match self {
            WebhookError::Verification(VerificationError::ConfigurationMissing) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                "webhook secret missing",
            ),
            WebhookError::Verification(VerificationError::MissingHeaders) => (
                StatusCode::BAD_REQUEST,
                "missing_headers",
                "missing signature headers",
            ),
            WebhookError::Verification(_) => {
                (StatusCode::BAD_REQUEST, "invalid_webhook", "invalid webhook")
            }
            WebhookError::Decode(_) => (
                StatusCode::BAD_REQUEST,
                "malformed_payload",
                "malformed payload",
            ),
            WebhookError::Routing(RoutingError::MissingEmail) => {
                (StatusCode::BAD_REQUEST, "invalid_event", "email required")
            }
            WebhookError::Routing(RoutingError::MissingAccountId(_)) => (
                StatusCode::BAD_REQUEST,
                "invalid_event",
                "account id required",
            ),
            WebhookError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "error",
                "internal server error",
            ),
        };

        (status, WebhookResponse { status: tag, message })
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, body) = self.classify();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "webhook_failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "webhook_rejected");
        }

        (status, Json(body)).into_response()
    }
}

/// Successful webhook outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Create handed to the deferred executor.
    Accepted,
    /// Update or delete applied.
    Applied,
    /// Event type this receiver does not act on.
    Unhandled,
}

impl Disposition {
    pub fn classify(self) -> (StatusCode, WebhookResponse) {
        match self {
            Disposition::Accepted => (
                StatusCode::ACCEPTED,
                WebhookResponse {
                    status: "processing",
                    message: "processing user creation",
                },
            ),
            Disposition::Applied => (
                StatusCode::OK,
                WebhookResponse {
                    status: "ok",
                    message: "OK",
                },
            ),
            Disposition::Unhandled => (
                StatusCode::OK,
                WebhookResponse {
                    status: "ignored",
                    message: "unhandled event type",
                },
            ),
        }
    }
}

impl IntoResponse for Disposition {
    fn into_response(self) -> Response {
        let (status, body) = self.classify();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<WebhookError>) -> (u16, &'static str) {
        let (status, body) = err.into().classify();
        (status.as_u16(), body.message)
    }

    #[test]
    fn test_classify_failures() {
        assert_eq!(
            status_of(VerificationError::ConfigurationMissing),
            (500, "webhook secret missing")
        );
        assert_eq!(
            status_of(VerificationError::MissingHeaders),
            (400, "missing signature headers")
        );
        assert_eq!(status_of(VerificationError::BadSignature), (400, "invalid webhook"));
        assert_eq!(status_of(VerificationError::InvalidTimestamp), (400, "invalid webhook"));
        assert_eq!(
            status_of(VerificationError::TimestampOutOfTolerance {
                age_secs: 900,
                tolerance_secs: 300
            }),
            (400, "invalid webhook")
        );
        assert_eq!(
            status_of(DecodeError::MalformedPayload("eof".to_string())),
            (400, "malformed payload")
        );
        assert_eq!(status_of(RoutingError::MissingEmail), (400, "email required"));
        assert_eq!(
            status_of(RoutingError::MissingAccountId("user.deleted".to_string())),
            (400, "account id required")
        );
        assert_eq!(
            status_of(StoreError::Rejected("username is required".to_string())),
            (500, "internal server error")
        );
    }

    #[test]
    fn test_classify_successes() {
        assert_eq!(Disposition::Accepted.classify().0, StatusCode::ACCEPTED);
        assert_eq!(Disposition::Applied.classify().1.message, "OK");
        let (status, body) = Disposition::Unhandled.classify();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.message, "unhandled event type");
    }

    #[test]
    fn test_response_body_shape() {
        let (_, body) = Disposition::Accepted.classify();
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"status": "processing", "message": "processing user creation"})
        );
    }
}
