//! Wire and decoded types for identity provider events.
//!
//! Only `type` and `data` are structural; [`super::decode`] rejects envelopes
//! without them. Everything inside `data` is read leniently. Nothing untyped
//! leaves this module.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Event type string for account creation.
pub const USER_CREATED: &str = "user.created";
/// Event type string for account profile changes.
pub const USER_UPDATED: &str = "user.updated";
/// Event type string for account removal.
pub const USER_DELETED: &str = "user.deleted";

// =============================================================================
// Wire Types
// =============================================================================

/// Top-level webhook envelope.
///
/// `data` is kept as a raw object; [`EventData::from_object`] reads each field
/// on its own so one oddly typed field cannot sink the whole event.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

/// Fields read from the `data` object. Wrongly typed values read as absent.
#[derive(Debug, Default)]
pub(crate) struct EventData {
    pub id: Option<String>,
    pub email_addresses: Vec<EmailAddress>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub image_url: Option<String>,
}

impl EventData {
    pub fn from_object(data: &Map<String, Value>) -> Self {
        let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

        let email_addresses = data
            .get("email_addresses")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| EmailAddress {
                        email_address: entry
                            .get("email_address")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: text("id"),
            email_addresses,
            first_name: text("first_name"),
            last_name: text("last_name"),
            username: text("username"),
            image_url: text("image_url"),
        }
    }
}

/// One entry of `data.email_addresses`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub email_address: Option<String>,
}

// =============================================================================
// Decoded Types
// =============================================================================

/// The account lifecycle events this receiver acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    UserCreated,
    UserUpdated,
    UserDeleted,
    /// Any other event type. Not an error.
    Unhandled,
}

impl EventKind {
    /// Map an envelope `type` string to a kind.
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            USER_CREATED => EventKind::UserCreated,
            USER_UPDATED => EventKind::UserUpdated,
            USER_DELETED => EventKind::UserDeleted,
            _ => EventKind::Unhandled,
        }
    }
}

/// Profile fields copied verbatim from the event, without defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFields {
    pub email_addresses: Vec<EmailAddress>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub image_url: Option<String>,
}

/// A decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// The raw `type` string, kept for logging unhandled events.
    pub event_type: String,
    /// Stable account id at the identity provider.
    pub id: Option<String>,
    pub fields: EventFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_from_type() {
        assert_eq!(EventKind::from_type("user.created"), EventKind::UserCreated);
        assert_eq!(EventKind::from_type("user.updated"), EventKind::UserUpdated);
        assert_eq!(EventKind::from_type("user.deleted"), EventKind::UserDeleted);
        assert_eq!(EventKind::from_type("organization.created"), EventKind::Unhandled);
        assert_eq!(EventKind::from_type("USER.CREATED"), EventKind::Unhandled);
    }
}
