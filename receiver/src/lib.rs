//! AccountSync - identity provider webhook receiver.
//!
//! Keeps local accounts in step with the identity provider:
//! - `user.created` provisions an account in the background
//! - `user.updated` applies profile changes before responding
//! - `user.deleted` removes the account before responding
//!
//! ## Architecture
//!
//! ```text
//! Request → verify → decode → route → store (inline) or DeferredExecutor → Response
//! ```

pub mod config;
pub mod deferred;
pub mod events;
pub mod routing;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use deferred::DeferredExecutor;
pub use events::{decode, DecodeError, Event, EventKind};
pub use routing::{route, CreateFields, RoutingDecision, RoutingError, UpdateFields};
pub use store::{AccountStore, HttpAccountStore, MemoryAccountStore, StoreError};
pub use web::AppState;
