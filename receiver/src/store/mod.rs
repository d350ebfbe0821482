//! Account store collaborators.
//!
//! The webhook core only needs four operations from the backing store. Two
//! adapters are provided:
//! - [`HttpAccountStore`]: talks to the account service over HTTP
//! - [`MemoryAccountStore`]: process-local map, for development and tests
//!
//! Both establish their connection lazily on first use. Concurrent first
//! callers settle on a single connection.

pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::routing::{CreateFields, UpdateFields};

pub use http::HttpAccountStore;
pub use memory::{Account, MemoryAccountStore};

/// Failures reported by an account store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("account store is misconfigured: {0}")]
    Config(String),

    #[error("account store connection failed: {0}")]
    Connection(String),

    #[error("account not found: {0}")]
    NotFound(String),

    #[error("account store rejected the request: {0}")]
    Rejected(String),

    #[error("account store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("account store transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The account mutations a webhook can trigger.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Establish connectivity. Idempotent and safe to call concurrently.
    async fn ensure_connection(&self) -> Result<(), StoreError>;

    /// Provision a new account. May be slow.
    async fn create_account(&self, fields: &CreateFields) -> Result<(), StoreError>;

    /// Apply profile changes to the account with external id `id`.
    async fn update_account(&self, id: &str, fields: &UpdateFields) -> Result<(), StoreError>;

    /// Remove the account with external id `id`.
    async fn delete_account(&self, id: &str) -> Result<(), StoreError>;
}

/// Updates must carry a username; both adapters enforce it.
pub(crate) fn require_username(fields: &UpdateFields) -> Result<&str, StoreError> {
    fields
        .username
        .as_deref()
        .ok_or_else(|| StoreError::Rejected("username is required".to_string()))
}
