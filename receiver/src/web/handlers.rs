//! Webhook endpoint handlers.
//!
//! The identity webhook runs the whole pipeline inside the request:
//! 1. Verify the signature over the raw body
//! 2. Decode the event envelope
//! 3. Route it to an account mutation
//! 4. Apply updates and deletes inline, hand creates to the deferred executor
//!
//! Creates are acknowledged with 202 before the account exists.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{error, info};

use crate::deferred::DeferredExecutor;
use crate::events::decode;
use crate::routing::{route, ExecutionMode, RoutingDecision};
use crate::store::{AccountStore, StoreError};
use crate::web::response::{Disposition, WebhookError};
use crate::web::signature::{verify, Secret, SignedRequest};
use crate::Config;

/// Path the identity provider delivers webhooks to.
pub const WEBHOOK_PATH: &str = "/api/webhooks/identity";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Parsed signing secret; `None` when absent or unparseable.
    pub secret: Option<Arc<Secret>>,
    pub store: Arc<dyn AccountStore>,
    pub deferred: DeferredExecutor,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn AccountStore>) -> Self {
        let secret = match config.webhook_secret.as_deref().map(Secret::parse) {
            Some(Ok(secret)) => Some(Arc::new(secret)),
            Some(Err(e)) => {
                error!(error = %e, "webhook_secret_invalid");
                None
            }
            None => None,
        };

        Self {
            config: Arc::new(config),
            secret,
            store,
            deferred: DeferredExecutor::new(),
        }
    }
}

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(WEBHOOK_PATH, post(identity_webhook))
        .with_state(state)
}

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
// Identity Webhook
// =============================================================================

/// Identity provider webhook endpoint.
///
/// The body is taken as raw bytes so the signature is checked against exactly
/// what the sender signed.
pub async fn identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Disposition, WebhookError> {
    let request = SignedRequest::from_headers(&headers, &body);

    info!(
        webhook_id = request.id.unwrap_or("-"),
        body_length = body.len(),
        "webhook_received"
    );

    let payload = verify(
        &request,
        state.secret.as_deref(),
        state.config.webhook_tolerance_secs,
    )?;
    let event = decode(&payload)?;
    let decision = route(event)?;

    dispatch(&state, decision).await
}

/// Run the mutation a routing decision calls for, inline or in the background
/// depending on its execution mode.
async fn dispatch(
    state: &AppState,
    decision: RoutingDecision,
) -> Result<Disposition, WebhookError> {
    let mode = match decision.mode() {
        Some(mode) => mode,
        None => return Ok(Disposition::Unhandled),
    };

    state.store.ensure_connection().await?;

    match mode {
        ExecutionMode::Deferred => {
            let store = Arc::clone(&state.store);
            let subject = decision.account_id().unwrap_or("-").to_string();
            state
                .deferred
                .schedule(decision.label(), subject, async move {
                    apply(store.as_ref(), decision).await
                });

            Ok(Disposition::Accepted)
        }
        ExecutionMode::Synchronous => {
            apply(state.store.as_ref(), decision).await?;
            Ok(Disposition::Applied)
        }
    }
}

/// Call the store operation behind a decision.
async fn apply(store: &dyn AccountStore, decision: RoutingDecision) -> Result<(), StoreError> {
    match decision {
        RoutingDecision::Create(fields) => store.create_account(&fields).await,
        RoutingDecision::Update { id, fields } => {
            store.update_account(&id, &fields).await?;
            info!(external_id = %id, "webhook_account_updated");
            Ok(())
        }
        RoutingDecision::Delete { id } => {
            store.delete_account(&id).await?;
            info!(external_id = %id, "webhook_account_deleted");
            Ok(())
        }
        RoutingDecision::Ignore { .. } => Ok(()),
    }
}
