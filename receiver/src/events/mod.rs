//! Event decoding.
//!
//! ```text
//! VerifiedPayload → decode() → Event
//! ```
//!
//! Decoding only checks the envelope shape. Field interpretation and
//! defaulting happen in [`crate::routing`].

pub mod types;

use tracing::{info, warn};

use crate::web::signature::VerifiedPayload;

pub use types::{
    EmailAddress, Event, EventFields, EventKind, USER_CREATED, USER_DELETED, USER_UPDATED,
};

use types::{Envelope, EventData};

/// Reasons a verified body cannot be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Decode a verified body into an [`Event`].
pub fn decode(payload: &VerifiedPayload<'_>) -> Result<Event, DecodeError> {
    let envelope: Envelope = serde_json::from_slice(payload.as_bytes()).map_err(|e| {
        warn!(
            error = %e,
            body_length = payload.as_bytes().len(),
            "webhook_payload_invalid_json"
        );
        DecodeError::MalformedPayload(e.to_string())
    })?;

    let event_type = envelope
        .event_type
        .ok_or_else(|| DecodeError::MalformedPayload("missing `type`".to_string()))?;
    let data = envelope
        .data
        .map(|object| EventData::from_object(&object))
        .ok_or_else(|| DecodeError::MalformedPayload("missing `data`".to_string()))?;

    let kind = EventKind::from_type(&event_type);

    info!(
        event_type = %event_type,
        kind = ?kind,
        has_id = data.id.is_some(),
        "webhook_event_decoded"
    );

    Ok(Event {
        kind,
        event_type,
        id: data.id,
        fields: EventFields {
            email_addresses: data.email_addresses,
            first_name: data.first_name,
            last_name: data.last_name,
            username: data.username,
            image_url: data.image_url,
        },
    })
}
