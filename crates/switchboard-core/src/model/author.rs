//! Author, mention, media, and channel metadata values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::plain::{self, JsonMap};
use crate::error::Result;

/// The sender of a normalized inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub user_id: String,
    pub user_name: Option<String>,
    pub full_name: Option<String>,
    pub is_bot: bool,
    pub is_me: bool,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Author {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Coerces a map-form author, stringifying scalar ids.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = plain::require_map("author", value)?;
        let user_id = plain::take_string(&mut map, "user_id").unwrap_or_default();
        Ok(Self {
            user_id,
            user_name: plain::take_string(&mut map, "user_name"),
            full_name: plain::take_string(&mut map, "full_name"),
            is_bot: plain::take_bool(&mut map, "is_bot"),
            is_me: plain::take_bool(&mut map, "is_me"),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// A user reference embedded in message text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Mention {
    pub user_id: String,
    pub user_name: Option<String>,
    pub offset: Option<u32>,
    pub length: Option<u32>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Mention {
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = plain::require_map("mention", value)?;
        Ok(Self {
            user_id: plain::take_string(&mut map, "user_id").unwrap_or_default(),
            user_name: plain::take_string(&mut map, "user_name"),
            offset: map.remove("offset").and_then(|v| v.as_u64()).map(|v| v as u32),
            length: map.remove("length").and_then(|v| v.as_u64()).map(|v| v as u32),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// An attachment carried by an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Media {
    /// Media kind tag (e.g. "image", "audio", "file").
    pub kind: String,
    pub url: Option<String>,
    pub file_id: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Media {
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = plain::require_map("media", value)?;
        Ok(Self {
            kind: plain::take_string(&mut map, "kind")
                .or_else(|| plain::take_string(&mut map, "type"))
                .unwrap_or_else(|| "file".to_string()),
            url: plain::take_string(&mut map, "url"),
            file_id: plain::take_string(&mut map, "file_id"),
            mime_type: plain::take_string(&mut map, "mime_type"),
            size: map.remove("size").and_then(|v| v.as_u64()),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// Channel-level metadata attached to an inbound event. Defaults empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMeta {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub member_count: Option<u64>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl ChannelMeta {
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = plain::require_map("channel_meta", value)?;
        Ok(Self {
            name: plain::take_string(&mut map, "name"),
            topic: plain::take_string(&mut map, "topic"),
            member_count: map.remove("member_count").and_then(|v| v.as_u64()),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// Conversation kind of an inbound event's room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    Direct,
    Group,
    Channel,
    Thread,
}

impl ChatType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" | "dm" | "private" => Some(Self::Direct),
            "group" => Some(Self::Group),
            "channel" => Some(Self::Channel),
            "thread" => Some(Self::Thread),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
            Self::Channel => "channel",
            Self::Thread => "thread",
        }
    }
}
