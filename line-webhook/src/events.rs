//! LINE webhook event envelope.
//!
//! Only the fields the service reads are modelled. LINE adds fields over
//! time, so unknown keys are ignored at every level and anything missing
//! falls back to its default instead of failing the whole payload.

use serde::{Deserialize, Deserializer};

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level webhook body: `{"destination": "...", "events": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebhookRequest {
    /// Bot user ID that should receive the events
    pub destination: Option<String>,
    /// Events in delivery order
    #[serde(deserialize_with = "null_as_default")]
    pub events: Vec<Event>,
}

impl WebhookRequest {
    /// LINE's console "Verify" button sends a signed body with no events.
    pub fn is_verification(&self) -> bool {
        self.events.is_empty()
    }
}

/// A single webhook event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Event {
    /// Event type tag (`message`, `follow`, `postback`, ...)
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub event_type: String,
    /// Token for replying to this event, absent for events that can't be replied to
    pub reply_token: Option<String>,
    /// Who triggered the event
    pub source: Option<Source>,
    /// Message content for `message` events
    pub message: Option<Message>,
}

impl Event {
    pub fn is_message(&self) -> bool {
        self.event_type == "message"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Source {
    pub user_id: Option<String>,
    /// `user`, `group` or `room`
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub source_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Message {
    /// `text`, `image`, `sticker`, ...
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub message_type: String,
    /// Only present on text messages
    pub text: Option<String>,
}
