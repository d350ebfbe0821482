//! Mutation routing.
//!
//! Turns a decoded [`Event`] into the account mutation it asks for, applying
//! the provisioning defaults. All input validation happens here, before the
//! handler commits to running anything in the background.
//!
//! | Event          | Decision | Mode        |
//! |----------------|----------|-------------|
//! | `user.created` | Create   | Deferred    |
//! | `user.updated` | Update   | Synchronous |
//! | `user.deleted` | Delete   | Synchronous |
//! | anything else  | Ignore   | -           |

use serde::Serialize;
use tracing::{info, warn};

use crate::events::{Event, EventFields, EventKind};

/// Credit balance every new account starts with.
pub const INITIAL_CREDIT_BALANCE: i64 = 10;

/// Validation failures that are reported back to the sender.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("email required")]
    MissingEmail,

    #[error("account id required for {0}")]
    MissingAccountId(String),
}

/// Fields for a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFields {
    pub external_id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub photo: String,
    pub credit_balance: i64,
}

/// Profile changes for an existing account. `None` leaves a value untouched,
/// except `username` which the store requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// Whether a mutation must finish before the sender gets a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Acknowledge first, apply in the background.
    Deferred,
    /// Apply, then respond with the outcome.
    Synchronous,
}

/// What to do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    Create(CreateFields),
    Update { id: String, fields: UpdateFields },
    Delete { id: String },
    Ignore { event_type: String },
}

impl RoutingDecision {
    /// Execution mode of the mutation, `None` for ignored events.
    pub fn mode(&self) -> Option<ExecutionMode> {
        match self {
            RoutingDecision::Create(_) => Some(ExecutionMode::Deferred),
            RoutingDecision::Update { .. } | RoutingDecision::Delete { .. } => {
                Some(ExecutionMode::Synchronous)
            }
            RoutingDecision::Ignore { .. } => None,
        }
    }

    /// External id of the account the decision touches.
    pub fn account_id(&self) -> Option<&str> {
        match self {
            RoutingDecision::Create(fields) => Some(&fields.external_id),
            RoutingDecision::Update { id, .. } | RoutingDecision::Delete { id } => Some(id),
            RoutingDecision::Ignore { .. } => None,
        }
    }

    /// Operation name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            RoutingDecision::Create(_) => "account_create",
            RoutingDecision::Update { .. } => "account_update",
            RoutingDecision::Delete { .. } => "account_delete",
            RoutingDecision::Ignore { .. } => "ignore",
        }
    }
}

/// Route an event to its mutation.
pub fn route(event: Event) -> Result<RoutingDecision, RoutingError> {
    let Event {
        kind,
        event_type,
        id,
        fields,
    } = event;

    let decision = match kind {
        EventKind::UserCreated => {
            RoutingDecision::Create(create_fields(require_id(id, &event_type)?, fields)?)
        }
        EventKind::UserUpdated => RoutingDecision::Update {
            id: require_id(id, &event_type)?,
            fields: UpdateFields {
                first_name: fields.first_name,
                last_name: fields.last_name,
                username: fields.username,
                photo: fields.image_url,
            },
        },
        EventKind::UserDeleted => RoutingDecision::Delete {
            id: require_id(id, &event_type)?,
        },
        EventKind::Unhandled => {
            info!(event_type = %event_type, "webhook_event_unhandled");
            RoutingDecision::Ignore { event_type }
        }
    };

    Ok(decision)
}

fn require_id(id: Option<String>, event_type: &str) -> Result<String, RoutingError> {
    id.filter(|id| !id.is_empty()).ok_or_else(|| {
        warn!(event_type = %event_type, "webhook_event_missing_id");
        RoutingError::MissingAccountId(event_type.to_string())
    })
}

fn create_fields(external_id: String, fields: EventFields) -> Result<CreateFields, RoutingError> {
    let email = fields
        .email_addresses
        .into_iter()
        .next()
        .and_then(|entry| entry.email_address)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| {
            warn!(external_id = %external_id, "webhook_create_missing_email");
            RoutingError::MissingEmail
        })?;

    let username = fields
        .username
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| local_part(&email).to_string());

    Ok(CreateFields {
        external_id,
        username,
        first_name: fields.first_name.unwrap_or_default(),
        last_name: fields.last_name.unwrap_or_default(),
        photo: fields.image_url.unwrap_or_default(),
        credit_balance: INITIAL_CREDIT_BALANCE,
        email,
    })
}

/// The part of an address before the first `@`.
fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EmailAddress;

    fn event(kind: EventKind, event_type: &str, id: Option<&str>, fields: EventFields) -> Event {
        Event {
            kind,
            event_type: event_type.to_string(),
            id: id.map(str::to_string),
            fields,
        }
    }

    fn emails(addresses: &[&str]) -> Vec<EmailAddress> {
        addresses
            .iter()
            .map(|a| EmailAddress {
                email_address: Some(a.to_string()),
            })
            .collect()
    }

    #[test]
    fn test_route_create_derives_username() {
        let fields = EventFields {
            email_addresses: emails(&["a@b.com", "other@b.com"]),
            ..Default::default()
        };
        let decision =
            route(event(EventKind::UserCreated, "user.created", Some("u1"), fields)).unwrap();

        assert_eq!(decision.mode(), Some(ExecutionMode::Deferred));
        assert_eq!(
            decision,
            RoutingDecision::Create(CreateFields {
                external_id: "u1".to_string(),
                email: "a@b.com".to_string(),
                username: "a".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                photo: String::new(),
                credit_balance: 10,
            })
        );
    }

    #[test]
    fn test_route_create_keeps_supplied_fields() {
        let fields = EventFields {
            email_addresses: emails(&["ann@example.com"]),
            first_name: Some("Ann".to_string()),
            last_name: Some("Lee".to_string()),
            username: Some("annlee".to_string()),
            image_url: Some("https://img/a.png".to_string()),
        };
        match route(event(EventKind::UserCreated, "user.created", Some("u1"), fields)).unwrap() {
            RoutingDecision::Create(f) => {
                assert_eq!(f.username, "annlee");
                assert_eq!(f.first_name, "Ann");
                assert_eq!(f.last_name, "Lee");
                assert_eq!(f.photo, "https://img/a.png");
            }
            other => panic!("Expected Create, got {:?}", other),
        }
    }

    #[test]
    fn test_route_create_empty_username_falls_back() {
        let fields = EventFields {
            email_addresses: emails(&["zed@example.com"]),
            username: Some(String::new()),
            ..Default::default()
        };
        match route(event(EventKind::UserCreated, "user.created", Some("u1"), fields)).unwrap() {
            RoutingDecision::Create(f) => assert_eq!(f.username, "zed"),
            other => panic!("Expected Create, got {:?}", other),
        }
    }

    #[test]
    fn test_route_create_missing_email() {
        let no_list = EventFields::default();
        let empty_entry = EventFields {
            email_addresses: vec![EmailAddress { email_address: None }],
            ..Default::default()
        };
        let blank = EventFields {
            email_addresses: emails(&[""]),
            ..Default::default()
        };

        for fields in [no_list, empty_entry, blank] {
            assert_eq!(
                route(event(EventKind::UserCreated, "user.created", Some("u1"), fields)),
                Err(RoutingError::MissingEmail)
            );
        }
    }

    #[test]
    fn test_route_update_passes_fields_through() {
        let fields = EventFields {
            email_addresses: emails(&["ignored@example.com"]),
            first_name: Some("Ann".to_string()),
            image_url: Some("https://img/b.png".to_string()),
            ..Default::default()
        };
        let decision =
            route(event(EventKind::UserUpdated, "user.updated", Some("u1"), fields)).unwrap();

        assert_eq!(decision.mode(), Some(ExecutionMode::Synchronous));
        assert_eq!(
            decision,
            RoutingDecision::Update {
                id: "u1".to_string(),
                fields: UpdateFields {
                    first_name: Some("Ann".to_string()),
                    last_name: None,
                    username: None,
                    photo: Some("https://img/b.png".to_string()),
                },
            }
        );
    }

    #[test]
    fn test_route_delete() {
        let decision = route(event(
            EventKind::UserDeleted,
            "user.deleted",
            Some("u1"),
            EventFields::default(),
        ))
        .unwrap();
        assert_eq!(decision, RoutingDecision::Delete { id: "u1".to_string() });
        assert_eq!(decision.mode(), Some(ExecutionMode::Synchronous));
        assert_eq!(decision.account_id(), Some("u1"));
        assert_eq!(decision.label(), "account_delete");
    }

    #[test]
    fn test_route_missing_id() {
        for (kind, event_type) in [
            (EventKind::UserCreated, "user.created"),
            (EventKind::UserUpdated, "user.updated"),
            (EventKind::UserDeleted, "user.deleted"),
        ] {
            let fields = EventFields {
                email_addresses: emails(&["a@b.com"]),
                ..Default::default()
            };
            assert_eq!(
                route(event(kind, event_type, None, fields)),
                Err(RoutingError::MissingAccountId(event_type.to_string()))
            );
        }
    }

    #[test]
    fn test_route_unhandled() {
        let decision = route(event(
            EventKind::Unhandled,
            "organization.created",
            None,
            EventFields::default(),
        ))
        .unwrap();
        assert_eq!(
            decision,
            RoutingDecision::Ignore {
                event_type: "organization.created".to_string()
            }
        );
        assert_eq!(decision.mode(), None);
    }

    #[test]
    fn test_update_fields_serialization() {
        let json = serde_json::to_value(UpdateFields {
            first_name: Some("Ann".to_string()),
            username: Some("ann".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"firstName": "Ann", "username": "ann"}));
    }
}
