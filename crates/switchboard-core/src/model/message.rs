//! Stored/paginated message form and history pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::author::{Author, Media, Mention};
use super::incoming::Incoming;
use super::plain::{self, JsonMap};
use crate::error::Result;

/// The stored/paginated normalized message, distinct from the wire-shaped
/// [`Incoming`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub channel_id: String,
    pub text: Option<String>,
    pub author: Option<Author>,
    pub is_mention: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub mentions: Vec<Mention>,
    pub media: Vec<Media>,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Message {
    /// Lifts a wire-shaped [`Incoming`] into the stored form.
    ///
    /// - `id` falls back to a fresh uuid when the platform supplied none
    /// - `thread_id` uses the explicit value when given, otherwise
    ///   `"adapter:room[:thread]"`
    /// - `channel_id` is the stringified external room id
    pub fn from_incoming(incoming: &Incoming, adapter_name: &str, thread_id: Option<&str>) -> Self {
        let derived = super::thread_id_for(adapter_name, incoming);
        Self {
            id: incoming
                .external_message_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            thread_id: thread_id.map(str::to_string).unwrap_or(derived),
            channel_id: incoming.external_room_id.clone(),
            text: incoming.text.clone(),
            author: incoming.author.clone(),
            is_mention: incoming.was_mentioned,
            created_at: incoming.timestamp,
            mentions: incoming.mentions.clone(),
            media: incoming.media.clone(),
            raw: incoming.raw.clone(),
            metadata: incoming.metadata.clone(),
        }
    }

    /// Parses a plain message map.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = plain::require_map("message", value)?;
        let created_at = map
            .remove("created_at")
            .as_ref()
            .and_then(plain::parse_timestamp);
        let author = match map.remove("author") {
            Some(Value::Object(m)) => Some(Author::from_value(Value::Object(m))?),
            _ => None,
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
        Ok(Self {
            id: plain::take_string(&mut map, "id").unwrap_or_else(|| Uuid::new_v4().to_string()),
            thread_id: plain::take_string(&mut map, "thread_id").unwrap_or_default(),
            channel_id: plain::take_string(&mut map, "channel_id").unwrap_or_default(),
            text: plain::take_string(&mut map, "text"),
            author,
            is_mention: plain::take_bool(&mut map, "is_mention"),
            created_at,
            mentions,
            media,
            raw: map.remove("raw").unwrap_or(Value::Null),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One page of thread or channel history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl MessagePage {
    /// Normalizes a raw adapter page.
    ///
    /// Elements that look like an [`Incoming`] (they carry
    /// `external_room_id`) are lifted through [`Message::from_incoming`];
    /// everything else is parsed as a plain [`Message`]. A bare array is
    /// treated as a single page with no cursor.
    pub fn from_value(value: Value, adapter_name: &str) -> Result<Self> {
        let (items, next_cursor, metadata) = match value {
            Value::Array(items) => (items, None, JsonMap::new()),
            other => {
                let mut map = plain::require_map("message_page", other)?;
                let items = match map.remove("messages") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                let cursor = plain::take_string(&mut map, "next_cursor")
                    .or_else(|| plain::take_string(&mut map, "next"));
                (items, cursor, plain::take_map(&mut map, "metadata"))
            }
        };

        let messages = items
            .into_iter()
            .map(|item| {
                let looks_incoming = item
                    .as_object()
                    .is_some_and(|m| m.contains_key("external_room_id"));
                if looks_incoming {
                    let incoming = Incoming::from_value(item)?;
                    Ok(Message::from_incoming(&incoming, adapter_name, None))
                } else {
                    Message::from_value(item)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            messages,
            next_cursor,
            metadata,
        })
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.as_deref().map_or(true, str::is_empty)
    }
}

/// Summary entry in a thread listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadSummary {
    pub id: String,
    pub external_thread_id: Option<String>,
    pub title: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl ThreadSummary {
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = plain::require_map("thread_summary", value)?;
        let created_at = map
            .remove("created_at")
            .as_ref()
            .and_then(plain::parse_timestamp);
        Ok(Self {
            id: plain::take_string(&mut map, "id").unwrap_or_default(),
            external_thread_id: plain::take_string(&mut map, "external_thread_id"),
            title: plain::take_string(&mut map, "title"),
            created_at,
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// One page of a channel's thread listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPage {
    pub threads: Vec<ThreadSummary>,
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl ThreadPage {
    pub fn from_value(value: Value) -> Result<Self> {
        let (items, next_cursor, metadata) = match value {
            Value::Array(items) => (items, None, JsonMap::new()),
            other => {
                let mut map = plain::require_map("thread_page", other)?;
                let items = match map.remove("threads") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                let cursor = plain::take_string(&mut map, "next_cursor")
                    .or_else(|| plain::take_string(&mut map, "next"));
                (items, cursor, plain::take_map(&mut map, "metadata"))
            }
        };
        Ok(Self {
            threads: items
                .into_iter()
                .map(ThreadSummary::from_value)
                .collect::<Result<Vec<_>>>()?,
            next_cursor,
            metadata,
        })
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.as_deref().map_or(true, str::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn incoming(room: &str, msg: &str) -> Incoming {
        Incoming {
            external_message_id: Some(msg.to_string()),
            was_mentioned: true,
            text: Some("hello".to_string()),
            ..Incoming::new(room)
        }
    }

    #[test]
    fn from_incoming_derives_ids() {
        let msg = Message::from_incoming(&incoming("room", "m1"), "tg", None);
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.thread_id, "tg:room");
        assert_eq!(msg.channel_id, "room");
        assert!(msg.is_mention);
    }

    #[test]
    fn from_incoming_prefers_explicit_thread_id() {
        let msg = Message::from_incoming(&incoming("room", "m1"), "tg", Some("tg:room:77"));
        assert_eq!(msg.thread_id, "tg:room:77");
    }

    #[test]
    fn from_incoming_generates_id_when_missing() {
        let mut inc = incoming("room", "m1");
        inc.external_message_id = None;
        let msg = Message::from_incoming(&inc, "tg", None);
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn page_lifts_incoming_shaped_entries() {
        let page = MessagePage::from_value(
            json!({
                "messages": [
                    {"external_room_id": "r", "external_message_id": "m10", "text": "a"},
                    {"id": "m11", "thread_id": "tg:r", "channel_id": "r", "text": "b"},
                ],
                "next": "c1",
            }),
            "tg",
        )
        .unwrap();

        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[0].id, "m10");
        assert_eq!(page.messages[0].thread_id, "tg:r");
        assert_eq!(page.messages[1].id, "m11");
        assert_eq!(page.next_cursor.as_deref(), Some("c1"));
        assert!(!page.is_last());
    }

    #[test]
    fn bare_array_is_a_single_page() {
        let page =
            MessagePage::from_value(json!([{"id": "m1", "thread_id": "t", "channel_id": "c"}]), "tg")
                .unwrap();
        assert_eq!(page.messages.len(), 1);
        assert!(page.is_last());
    }
}
