//! In-memory account store.
//!
//! Used when no account service is configured, and by tests. Deletes are
//! idempotent; updates of unknown accounts fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;

use super::{require_username, AccountStore, StoreError};
use crate::routing::{CreateFields, UpdateFields};

/// A stored account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub external_id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub photo: String,
    pub credit_balance: i64,
}

impl From<&CreateFields> for Account {
    fn from(fields: &CreateFields) -> Self {
        Self {
            external_id: fields.external_id.clone(),
            email: fields.email.clone(),
            username: fields.username.clone(),
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            photo: fields.photo.clone(),
            credit_balance: fields.credit_balance,
        }
    }
}

/// Process-local account store.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<String, Account>>,
    connected: OnceCell<()>,
    connections: AtomicUsize,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an account by external id.
    pub async fn account(&self, id: &str) -> Option<Account> {
        self.accounts.read().await.get(id).cloned()
    }

    /// Insert an account directly, bypassing webhooks.
    pub async fn insert(&self, account: Account) {
        self.accounts
            .write()
            .await
            .insert(account.external_id.clone(), account);
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// How many times a connection was actually established.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn ensure_connection(&self) -> Result<(), StoreError> {
        self.connected
            .get_or_init(|| async {
                self.connections.fetch_add(1, Ordering::SeqCst);
                info!(store = "memory", "account_store_connected");
            })
            .await;
        Ok(())
    }

    async fn create_account(&self, fields: &CreateFields) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&fields.external_id) {
            return Err(StoreError::Rejected(format!(
                "account {} already exists",
                fields.external_id
            )));
        }
        accounts.insert(fields.external_id.clone(), Account::from(fields));

        info!(external_id = %fields.external_id, "account_created");
        Ok(())
    }

    async fn update_account(&self, id: &str, fields: &UpdateFields) -> Result<(), StoreError> {
        let username = require_username(fields)?;

        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        account.username = username.to_string();
        if let Some(first_name) = &fields.first_name {
            account.first_name = first_name.clone();
        }
        if let Some(last_name) = &fields.last_name {
            account.last_name = last_name.clone();
        }
        if let Some(photo) = &fields.photo {
            account.photo = photo.clone();
        }

        info!(external_id = %id, "account_updated");
        Ok(())
    }

    async fn delete_account(&self, id: &str) -> Result<(), StoreError> {
        let removed = self.accounts.write().await.remove(id).is_some();
        info!(external_id = %id, removed = removed, "account_deleted");
        Ok(())
    }
}
