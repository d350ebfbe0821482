//! HTTP client for the account service.
//!
//! The connection is established lazily: the first caller builds the client
//! and probes `GET {base}/health`; everyone racing with it waits for that one
//! attempt. A failed attempt is not cached, so the next call tries again.
//!
//! Endpoints:
//! - `POST   {base}/accounts`
//! - `PATCH  {base}/accounts/{id}`
//! - `DELETE {base}/accounts/{id}` (404 counts as already deleted)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tokio::sync::OnceCell;
use tracing::{info, warn};
use url::Url;

use super::{require_username, AccountStore, StoreError};
use crate::routing::{CreateFields, UpdateFields};

/// Account service client with lazy connection management.
pub struct HttpAccountStore {
    base_url: Url,
    timeout: Duration,
    client: OnceCell<Client>,
}

impl HttpAccountStore {
    /// Create a store for the service at `base_url`. Nothing is contacted yet.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Config(format!("invalid account store URL: {}", e)))?;

        if base_url.cannot_be_a_base() {
            return Err(StoreError::Config(format!(
                "account store URL cannot be a base: {}",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            timeout,
            client: OnceCell::new(),
        })
    }

    /// Build `{base}/{segments...}`, escaping each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Config(format!("cannot extend URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Return the shared client, connecting on first use.
    async fn client(&self) -> Result<&Client, StoreError> {
        self.client
            .get_or_try_init(|| async {
                info!(base_url = %self.base_url, "account_store_connecting");

                let client = Client::builder().timeout(self.timeout).build()?;

                let health = self.endpoint(&["health"])?;
                let response = client.get(health).send().await.map_err(|e| {
                    warn!(error = %e, "account_store_connect_failed");
                    StoreError::Connection(e.to_string())
                })?;

                if !response.status().is_success() {
                    warn!(status = response.status().as_u16(), "account_store_unhealthy");
                    return Err(StoreError::Connection(format!(
                        "health check returned {}",
                        response.status()
                    )));
                }

                info!(base_url = %self.base_url, "account_store_connected");
                Ok(client)
            })
            .await
    }
}

/// Turn a non-success response into a [`StoreError::Status`].
async fn status_error(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StoreError::Status { status, body }
}

#[async_trait]
impl AccountStore for HttpAccountStore {
    async fn ensure_connection(&self) -> Result<(), StoreError> {
        self.client().await.map(|_| ())
    }

    async fn create_account(&self, fields: &CreateFields) -> Result<(), StoreError> {
        let client = self.client().await?;
        let response = client
            .post(self.endpoint(&["accounts"])?)
            .json(fields)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {
                info!(external_id = %fields.external_id, "account_created");
                Ok(())
            }
            StatusCode::CONFLICT => Err(StoreError::Rejected(format!(
                "account {} already exists",
                fields.external_id
            ))),
            _ => Err(status_error(response).await),
        }
    }

    async fn update_account(&self, id: &str, fields: &UpdateFields) -> Result<(), StoreError> {
        require_username(fields)?;

        let client = self.client().await?;
        let response = client
            .patch(self.endpoint(&["accounts", id])?)
            .json(fields)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {
                info!(external_id = %id, "account_updated");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.to_string())),
            _ => Err(status_error(response).await),
        }
    }

    async fn delete_account(&self, id: &str) -> Result<(), StoreError> {
        let client = self.client().await?;
        let response = client
            .delete(self.endpoint(&["accounts", id])?)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {
                info!(external_id = %id, removed = true, "account_deleted");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                info!(external_id = %id, removed = false, "account_deleted");
                Ok(())
            }
            _ => Err(status_error(response).await),
        }
    }
}
