//! Outbound payload shapes and send/fetch options.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::author::ChatType;
use super::incoming::Incoming;
use super::plain::{self, JsonMap};
use crate::error::Result;

/// Anything the outbound facade can post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "content", rename_all = "snake_case")]
pub enum Postable {
    Text(String),
    Markdown(String),
    Raw(Value),
    Ast(Value),
    Card(Value),
}

impl Postable {
    /// Flattens into a [`PostPayload`].
    ///
    /// The payload `text` is always a string (possibly empty): non-string
    /// raw/ast/card content is JSON-encoded, falling back to the debug
    /// rendering. Markdown/ast/card additionally tag `metadata.format`.
    pub fn to_payload(&self) -> PostPayload {
        let mut metadata = JsonMap::new();
        let (text, format) = match self {
            Self::Text(s) => (s.clone(), None),
            Self::Markdown(s) => (s.clone(), Some("markdown")),
            Self::Raw(v) => (project_text(v), None),
            Self::Ast(v) => (project_text(v), Some("ast")),
            Self::Card(v) => (project_text(v), Some("card")),
        };
        if let Some(format) = format {
            metadata.insert("format".to_string(), Value::String(format.to_string()));
        }
        PostPayload { text, metadata }
    }

    /// Coerces a map of the form `{text | markdown | raw | ast | card}`.
    pub fn from_value(value: Value) -> Result<Self> {
        if let Value::String(s) = value {
            return Ok(Self::Text(s));
        }
        let mut map = plain::require_map("postable", value)?;
        if let Some(text) = plain::take_string(&mut map, "text") {
            Ok(Self::Text(text))
        } else if let Some(md) = plain::take_string(&mut map, "markdown") {
            Ok(Self::Markdown(md))
        } else if let Some(raw) = map.remove("raw") {
            Ok(Self::Raw(raw))
        } else if let Some(ast) = map.remove("ast") {
            Ok(Self::Ast(ast))
        } else if let Some(card) = map.remove("card") {
            Ok(Self::Card(card))
        } else {
            Ok(Self::Text(String::new()))
        }
    }
}

impl From<&str> for Postable {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Postable {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<PostPayload> for Postable {
    fn from(payload: PostPayload) -> Self {
        Self::Text(payload.text)
    }
}

impl From<Value> for Postable {
    fn from(value: Value) -> Self {
        match Self::from_value(value.clone()) {
            Ok(postable) => postable,
            Err(_) => Self::Raw(value),
        }
    }
}

fn project_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{other:?}")),
    }
}

/// The flattened outbound payload handed to adapters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostPayload {
    pub text: String,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl PostPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: JsonMap::new(),
        }
    }

    pub fn format(&self) -> Option<&str> {
        self.metadata.get("format").and_then(Value::as_str)
    }
}

/// How a reply should be anchored on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyToMode {
    /// Let the platform pick its native behavior.
    #[default]
    PlatformDefault,
    /// Reply inline to the referenced message.
    Inline,
    /// Anchor into the referenced thread.
    Thread,
}

/// Options forwarded to adapter send-path callbacks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SendOptions {
    pub thread_id: Option<String>,
    pub reply_to_id: Option<String>,
    pub reply_mode: Option<ReplyToMode>,
    pub fallback_to_dm: bool,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl SendOptions {
    /// Merges `overrides` over `self`, right-biased: explicit values in
    /// `overrides` win, everything else is preserved.
    pub fn merged(&self, overrides: &SendOptions) -> SendOptions {
        let mut metadata = self.metadata.clone();
        for (k, v) in &overrides.metadata {
            metadata.insert(k.clone(), v.clone());
        }
        SendOptions {
            thread_id: overrides.thread_id.clone().or_else(|| self.thread_id.clone()),
            reply_to_id: overrides
                .reply_to_id
                .clone()
                .or_else(|| self.reply_to_id.clone()),
            reply_mode: overrides.reply_mode.or(self.reply_mode),
            fallback_to_dm: overrides.fallback_to_dm || self.fallback_to_dm,
            metadata,
        }
    }
}

/// Options for history fetches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl FetchOptions {
    pub fn with_cursor(&self, cursor: Option<String>) -> Self {
        Self {
            cursor,
            ..self.clone()
        }
    }
}

/// Addressing kind of a messaging target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Dm,
    Thread,
    #[default]
    Room,
}

/// Where an outbound message should land, derived from inbound context.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingTarget {
    pub kind: TargetKind,
    pub external_room_id: String,
    pub thread_id: Option<String>,
    pub reply_to_id: Option<String>,
    pub reply_to_mode: ReplyToMode,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl MessagingTarget {
    /// Infers the target from inbound context: `direct → dm`,
    /// `thread → thread`, anything else `room`.
    pub fn from_incoming(incoming: &Incoming) -> Self {
        let kind = match incoming.chat_type {
            Some(ChatType::Direct) => TargetKind::Dm,
            Some(ChatType::Thread) => TargetKind::Thread,
            _ => TargetKind::Room,
        };
        Self {
            kind,
            external_room_id: incoming.external_room_id.clone(),
            thread_id: incoming.external_thread_id.clone(),
            reply_to_id: incoming.external_message_id.clone(),
            reply_to_mode: ReplyToMode::PlatformDefault,
            metadata: JsonMap::new(),
        }
    }

    /// Emits send options; `reply_to_id`/`thread_id`/`reply_mode` appear
    /// iff the corresponding field is present and the mode is not the
    /// platform default.
    pub fn to_send_opts(&self) -> SendOptions {
        let anchored = self.reply_to_mode != ReplyToMode::PlatformDefault;
        SendOptions {
            thread_id: if anchored { self.thread_id.clone() } else { None },
            reply_to_id: if anchored { self.reply_to_id.clone() } else { None },
            reply_mode: anchored.then_some(self.reply_to_mode),
            fallback_to_dm: false,
            metadata: JsonMap::new(),
        }
    }
}
