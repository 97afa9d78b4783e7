//! The wire-shaped normalized inbound event body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::author::{Author, ChannelMeta, ChatType, Media, Mention};
use super::plain::{self, JsonMap};
use crate::error::{FieldError, Result, ValidationError};

/// Normalized inbound event body.
///
/// `Incoming` keeps the platform's external identifiers; the stored and
/// paginated form is [`Message`](super::message::Message), produced by
/// [`Message::from_incoming`](super::message::Message::from_incoming).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Incoming {
    /// Opaque platform room id. Required.
    pub external_room_id: String,
    pub external_user_id: Option<String>,
    pub external_message_id: Option<String>,
    pub external_reply_to_id: Option<String>,
    pub external_thread_id: Option<String>,
    pub text: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub chat_type: Option<ChatType>,
    pub chat_title: Option<String>,
    pub was_mentioned: bool,
    pub mentions: Vec<Mention>,
    pub media: Vec<Media>,
    pub author: Option<Author>,
    pub channel_meta: ChannelMeta,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Incoming {
    /// Minimal constructor for a room-scoped event.
    pub fn new(external_room_id: impl Into<String>) -> Self {
        Self {
            external_room_id: external_room_id.into(),
            ..Self::default()
        }
    }

    /// Schema-validating factory over a raw map.
    ///
    /// Applies the coercions of the normalized model:
    /// - `external_room_id` is required; scalar ids are stringified
    /// - an absent `author` is synthesized from
    ///   `(external_user_id, username, display_name)` when a user id exists
    /// - map-form `mentions`/`media` entries become typed values
    /// - `channel_meta` defaults to the empty value
    pub fn from_value(value: Value) -> Result<Self> {
        let input = value.clone();
        let mut map = plain::require_map("incoming", value)?;

        let external_room_id = match plain::take_string(&mut map, "external_room_id") {
            Some(id) => id,
            None => {
                return Err(ValidationError::new(
                    "incoming",
                    input,
                    vec![FieldError::new("external_room_id", "is required")],
                )
                .into());
            }
        };

        let external_user_id = plain::take_string(&mut map, "external_user_id");
        let username = plain::take_string(&mut map, "username");
        let display_name = plain::take_string(&mut map, "display_name");

        let author = match map.remove("author") {
            Some(Value::Object(m)) => Some(Author::from_value(Value::Object(m))?),
            _ => external_user_id.as_ref().map(|user_id| Author {
                user_id: user_id.clone(),
                user_name: username,
                full_name: display_name,
                ..Author::default()
            }),
        };

        let mentions = match map.remove("mentions") {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(Mention::from_value)
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        let media = match map.remove("media") {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(Media::from_value)
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        let channel_meta = match map.remove("channel_meta") {
            Some(Value::Object(m)) => ChannelMeta::from_value(Value::Object(m))?,
            _ => ChannelMeta::default(),
        };

        let timestamp = map
            .remove("timestamp")
            .as_ref()
            .and_then(plain::parse_timestamp);

        let chat_type = plain::take_string(&mut map, "chat_type")
            .as_deref()
            .and_then(ChatType::parse);

        Ok(Self {
            external_room_id,
            external_user_id,
            external_message_id: plain::take_string(&mut map, "external_message_id"),
            external_reply_to_id: plain::take_string(&mut map, "external_reply_to_id"),
            external_thread_id: plain::take_string(&mut map, "external_thread_id"),
            text: plain::take_string(&mut map, "text"),
            timestamp,
            chat_type,
            chat_title: plain::take_string(&mut map, "chat_title"),
            was_mentioned: plain::take_bool(&mut map, "was_mentioned"),
            mentions,
            media,
            author,
            channel_meta,
            raw: map.remove("raw").unwrap_or(Value::Null),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }

    /// Serializes to plain data. Infallible for in-memory values.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// True when this event looks like a direct message.
    pub fn is_dm(&self) -> bool {
        matches!(self.chat_type, Some(ChatType::Direct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[test]
    fn requires_external_room_id() {
        let err = Incoming::from_value(json!({"text": "hi"})).unwrap_err();
        match err {
            Error::Validation(v) => {
                assert_eq!(v.subject, "incoming");
                assert_eq!(v.errors[0].path, "external_room_id");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn synthesizes_author_from_user_fields() {
        let incoming = Incoming::from_value(json!({
            "external_room_id": 99,
            "external_user_id": 7,
            "username": "ada",
            "display_name": "Ada L.",
        }))
        .unwrap();

        assert_eq!(incoming.external_room_id, "99");
        let author = incoming.author.unwrap();
        assert_eq!(author.user_id, "7");
        assert_eq!(author.user_name.as_deref(), Some("ada"));
        assert_eq!(author.full_name.as_deref(), Some("Ada L."));
    }

    #[test]
    fn keeps_explicit_author_over_synthesis() {
        let incoming = Incoming::from_value(json!({
            "external_room_id": "r",
            "external_user_id": "u2",
            "author": {"user_id": "u1", "is_bot": true},
        }))
        .unwrap();
        assert_eq!(incoming.author.unwrap().user_id, "u1");
    }

    #[test]
    fn lifts_map_form_mentions_and_media() {
        let incoming = Incoming::from_value(json!({
            "external_room_id": "r",
            "mentions": [{"user_id": 5, "user_name": "bot"}],
            "media": [{"kind": "image", "url": "http://i"}],
        }))
        .unwrap();
        assert_eq!(incoming.mentions[0].user_id, "5");
        assert_eq!(incoming.media[0].kind, "image");
        assert_eq!(incoming.channel_meta, ChannelMeta::default());
    }

    #[test]
    fn parses_epoch_timestamp() {
        let incoming = Incoming::from_value(json!({
            "external_room_id": "r",
            "timestamp": 1_700_000_000,
        }))
        .unwrap();
        assert_eq!(incoming.timestamp.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn non_map_input_is_invalid() {
        assert!(matches!(
            crate::normalize::ensure_incoming(json!("nope"), "tg").unwrap_err(),
            Error::InvalidInput { kind: "incoming", .. }
        ));
    }
}
