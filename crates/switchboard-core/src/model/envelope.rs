//! Typed event envelopes and the inbound event union.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::incoming::Incoming;
use super::plain::{self, JsonMap};
use crate::error::{Error, Result, ValidationError};

/// Classification of inbound events.
///
/// The router dispatches on this tag; the payload union is exhaustive, so
/// unknown type strings are rejected where raw data enters the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Message,
    Reaction,
    Action,
    ModalSubmit,
    ModalClose,
    SlashCommand,
    AssistantThreadStarted,
    AssistantContextChanged,
}

impl EventType {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "message" => Ok(Self::Message),
            "reaction" => Ok(Self::Reaction),
            "action" => Ok(Self::Action),
            "modal_submit" => Ok(Self::ModalSubmit),
            "modal_close" => Ok(Self::ModalClose),
            "slash_command" => Ok(Self::SlashCommand),
            "assistant_thread_started" => Ok(Self::AssistantThreadStarted),
            "assistant_context_changed" => Ok(Self::AssistantContextChanged),
            other => Err(Error::UnsupportedEventType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Reaction => "reaction",
            Self::Action => "action",
            Self::ModalSubmit => "modal_submit",
            Self::ModalClose => "modal_close",
            Self::SlashCommand => "slash_command",
            Self::AssistantThreadStarted => "assistant_thread_started",
            Self::AssistantContextChanged => "assistant_context_changed",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An emoji reaction being added to or removed from a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionEvent {
    pub adapter_name: Option<String>,
    pub external_room_id: Option<String>,
    pub external_user_id: Option<String>,
    pub external_message_id: Option<String>,
    pub external_thread_id: Option<String>,
    pub emoji: String,
    /// True when the reaction was added, false when removed.
    pub added: bool,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Default for ReactionEvent {
    fn default() -> Self {
        Self {
            adapter_name: None,
            external_room_id: None,
            external_user_id: None,
            external_message_id: None,
            external_thread_id: None,
            emoji: String::new(),
            added: true,
            raw: Value::Null,
            metadata: JsonMap::new(),
        }
    }
}

impl ReactionEvent {
    pub fn from_value(value: Value) -> Result<Self> {
        let input = value.clone();
        let mut map = plain::require_map("reaction_event", value)?;
        let emoji = match plain::take_string(&mut map, "emoji") {
            Some(e) => e,
            None => {
                return Err(
                    ValidationError::field("reaction_event", input, "emoji", "is required").into(),
                )
            }
        };
        Ok(Self {
            adapter_name: plain::take_string(&mut map, "adapter_name"),
            external_room_id: plain::take_string(&mut map, "external_room_id"),
            external_user_id: plain::take_string(&mut map, "external_user_id"),
            external_message_id: plain::take_string(&mut map, "external_message_id"),
            external_thread_id: plain::take_string(&mut map, "external_thread_id"),
            emoji,
            added: map.remove("added").and_then(|v| v.as_bool()).unwrap_or(true),
            raw: map.remove("raw").unwrap_or(Value::Null),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// A component interaction (button press, select, …).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionEvent {
    pub adapter_name: Option<String>,
    pub action_id: String,
    pub value: Option<Value>,
    pub external_room_id: Option<String>,
    pub external_user_id: Option<String>,
    pub external_message_id: Option<String>,
    pub external_thread_id: Option<String>,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl ActionEvent {
    pub fn from_value(value: Value) -> Result<Self> {
        let input = value.clone();
        let mut map = plain::require_map("action_event", value)?;
        let action_id = match plain::take_string(&mut map, "action_id") {
            Some(id) => id,
            None => {
                return Err(
                    ValidationError::field("action_event", input, "action_id", "is required")
                        .into(),
                )
            }
        };
        Ok(Self {
            adapter_name: plain::take_string(&mut map, "adapter_name"),
            action_id,
            value: map.remove("value"),
            external_room_id: plain::take_string(&mut map, "external_room_id"),
            external_user_id: plain::take_string(&mut map, "external_user_id"),
            external_message_id: plain::take_string(&mut map, "external_message_id"),
            external_thread_id: plain::take_string(&mut map, "external_thread_id"),
            raw: map.remove("raw").unwrap_or(Value::Null),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// A modal submission with its collected values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalSubmitEvent {
    pub adapter_name: Option<String>,
    pub callback_id: String,
    #[serde(default)]
    pub values: JsonMap,
    pub external_room_id: Option<String>,
    pub external_user_id: Option<String>,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl ModalSubmitEvent {
    pub fn from_value(value: Value) -> Result<Self> {
        let input = value.clone();
        let mut map = plain::require_map("modal_submit_event", value)?;
        let callback_id = match plain::take_string(&mut map, "callback_id") {
            Some(id) => id,
            None => {
                return Err(ValidationError::field(
                    "modal_submit_event",
                    input,
                    "callback_id",
                    "is required",
                )
                .into())
            }
        };
        Ok(Self {
            adapter_name: plain::take_string(&mut map, "adapter_name"),
            callback_id,
            values: plain::take_map(&mut map, "values"),
            external_room_id: plain::take_string(&mut map, "external_room_id"),
            external_user_id: plain::take_string(&mut map, "external_user_id"),
            raw: map.remove("raw").unwrap_or(Value::Null),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// A modal dismissed without submitting.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalCloseEvent {
    pub adapter_name: Option<String>,
    pub callback_id: String,
    pub external_room_id: Option<String>,
    pub external_user_id: Option<String>,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl ModalCloseEvent {
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = plain::require_map("modal_close_event", value)?;
        Ok(Self {
            adapter_name: plain::take_string(&mut map, "adapter_name"),
            callback_id: plain::take_string(&mut map, "callback_id").unwrap_or_default(),
            external_room_id: plain::take_string(&mut map, "external_room_id"),
            external_user_id: plain::take_string(&mut map, "external_user_id"),
            raw: map.remove("raw").unwrap_or(Value::Null),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// A slash command invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlashCommandEvent {
    pub adapter_name: Option<String>,
    pub command: String,
    pub text: Option<String>,
    pub external_room_id: Option<String>,
    pub external_user_id: Option<String>,
    pub trigger_id: Option<String>,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl SlashCommandEvent {
    pub fn from_value(value: Value) -> Result<Self> {
        let input = value.clone();
        let mut map = plain::require_map("slash_command_event", value)?;
        let command = match plain::take_string(&mut map, "command") {
            Some(c) => c,
            None => {
                return Err(ValidationError::field(
                    "slash_command_event",
                    input,
                    "command",
                    "is required",
                )
                .into())
            }
        };
        Ok(Self {
            adapter_name: plain::take_string(&mut map, "adapter_name"),
            command,
            text: plain::take_string(&mut map, "text"),
            external_room_id: plain::take_string(&mut map, "external_room_id"),
            external_user_id: plain::take_string(&mut map, "external_user_id"),
            trigger_id: plain::take_string(&mut map, "trigger_id"),
            raw: map.remove("raw").unwrap_or(Value::Null),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// An assistant surface opened a new thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantThreadStartedEvent {
    pub adapter_name: Option<String>,
    pub thread_id: String,
    pub external_room_id: Option<String>,
    pub external_user_id: Option<String>,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Default for AssistantThreadStartedEvent {
    fn default() -> Self {
        Self {
            adapter_name: None,
            thread_id: "unknown".to_string(),
            external_room_id: None,
            external_user_id: None,
            raw: Value::Null,
            metadata: JsonMap::new(),
        }
    }
}

impl AssistantThreadStartedEvent {
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = plain::require_map("assistant_thread_started_event", value)?;
        Ok(Self {
            adapter_name: plain::take_string(&mut map, "adapter_name"),
            thread_id: plain::take_string(&mut map, "thread_id")
                .unwrap_or_else(|| "unknown".to_string()),
            external_room_id: plain::take_string(&mut map, "external_room_id"),
            external_user_id: plain::take_string(&mut map, "external_user_id"),
            raw: map.remove("raw").unwrap_or(Value::Null),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// The context visible to an assistant thread changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantContextChangedEvent {
    pub adapter_name: Option<String>,
    pub thread_id: String,
    pub external_room_id: Option<String>,
    pub external_user_id: Option<String>,
    #[serde(default)]
    pub context: JsonMap,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Default for AssistantContextChangedEvent {
    fn default() -> Self {
        Self {
            adapter_name: None,
            thread_id: "unknown".to_string(),
            external_room_id: None,
            external_user_id: None,
            context: JsonMap::new(),
            raw: Value::Null,
            metadata: JsonMap::new(),
        }
    }
}

impl AssistantContextChangedEvent {
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = plain::require_map("assistant_context_changed_event", value)?;
        Ok(Self {
            adapter_name: plain::take_string(&mut map, "adapter_name"),
            thread_id: plain::take_string(&mut map, "thread_id")
                .unwrap_or_else(|| "unknown".to_string()),
            external_room_id: plain::take_string(&mut map, "external_room_id"),
            external_user_id: plain::take_string(&mut map, "external_user_id"),
            context: plain::take_map(&mut map, "context"),
            raw: map.remove("raw").unwrap_or(Value::Null),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// Tagged union over every inbound event body.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Message(Incoming),
    Reaction(ReactionEvent),
    Action(ActionEvent),
    ModalSubmit(ModalSubmitEvent),
    ModalClose(ModalCloseEvent),
    SlashCommand(SlashCommandEvent),
    AssistantThreadStarted(AssistantThreadStartedEvent),
    AssistantContextChanged(AssistantContextChangedEvent),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Message(_) => EventType::Message,
            Self::Reaction(_) => EventType::Reaction,
            Self::Action(_) => EventType::Action,
            Self::ModalSubmit(_) => EventType::ModalSubmit,
            Self::ModalClose(_) => EventType::ModalClose,
            Self::SlashCommand(_) => EventType::SlashCommand,
            Self::AssistantThreadStarted(_) => EventType::AssistantThreadStarted,
            Self::AssistantContextChanged(_) => EventType::AssistantContextChanged,
        }
    }

    /// Builds the typed payload for `event_type` from a raw map.
    pub fn from_value(event_type: EventType, value: Value) -> Result<Self> {
        Ok(match event_type {
            EventType::Message => Self::Message(Incoming::from_value(value)?),
            EventType::Reaction => Self::Reaction(ReactionEvent::from_value(value)?),
            EventType::Action => Self::Action(ActionEvent::from_value(value)?),
            EventType::ModalSubmit => Self::ModalSubmit(ModalSubmitEvent::from_value(value)?),
            EventType::ModalClose => Self::ModalClose(ModalCloseEvent::from_value(value)?),
            EventType::SlashCommand => Self::SlashCommand(SlashCommandEvent::from_value(value)?),
            EventType::AssistantThreadStarted => {
                Self::AssistantThreadStarted(AssistantThreadStartedEvent::from_value(value)?)
            }
            EventType::AssistantContextChanged => {
                Self::AssistantContextChanged(AssistantContextChangedEvent::from_value(value)?)
            }
        })
    }

    pub fn to_value(&self) -> Value {
        let result = match self {
            Self::Message(v) => serde_json::to_value(v),
            Self::Reaction(v) => serde_json::to_value(v),
            Self::Action(v) => serde_json::to_value(v),
            Self::ModalSubmit(v) => serde_json::to_value(v),
            Self::ModalClose(v) => serde_json::to_value(v),
            Self::SlashCommand(v) => serde_json::to_value(v),
            Self::AssistantThreadStarted(v) => serde_json::to_value(v),
            Self::AssistantContextChanged(v) => serde_json::to_value(v),
        };
        result.unwrap_or(Value::Null)
    }

    /// Envelope metadata slots derivable from this payload:
    /// `(thread_id, channel_id, message_id)`.
    pub fn id_hints(&self, adapter_name: &str) -> (Option<String>, Option<String>, Option<String>) {
        fn room_ids(
            adapter_name: &str,
            room: Option<&String>,
            thread: Option<&String>,
        ) -> (Option<String>, Option<String>) {
            match room {
                Some(room) => {
                    let channel = format!("{adapter_name}:{room}");
                    let thread_id = match thread {
                        Some(t) => format!("{channel}:{t}"),
                        None => channel.clone(),
                    };
                    (Some(thread_id), Some(channel))
                }
                None => (None, None),
            }
        }

        match self {
            Self::Message(incoming) => {
                let thread_id = super::thread_id_for(adapter_name, incoming);
                let channel_id = format!("{adapter_name}:{}", incoming.external_room_id);
                (
                    Some(thread_id),
                    Some(channel_id),
                    incoming.external_message_id.clone(),
                )
            }
            Self::Reaction(e) => {
                let (thread, channel) = room_ids(
                    adapter_name,
                    e.external_room_id.as_ref(),
                    e.external_thread_id.as_ref(),
                );
                (thread, channel, e.external_message_id.clone())
            }
            Self::Action(e) => {
                let (thread, channel) = room_ids(
                    adapter_name,
                    e.external_room_id.as_ref(),
                    e.external_thread_id.as_ref(),
                );
                (thread, channel, e.external_message_id.clone())
            }
            Self::ModalSubmit(e) => {
                let (thread, channel) = room_ids(adapter_name, e.external_room_id.as_ref(), None);
                (thread, channel, None)
            }
            Self::ModalClose(e) => {
                let (thread, channel) = room_ids(adapter_name, e.external_room_id.as_ref(), None);
                (thread, channel, None)
            }
            Self::SlashCommand(e) => {
                let (thread, channel) = room_ids(adapter_name, e.external_room_id.as_ref(), None);
                (thread, channel, None)
            }
            Self::AssistantThreadStarted(e) => {
                let (_, channel) = room_ids(adapter_name, e.external_room_id.as_ref(), None);
                (Some(e.thread_id.clone()), channel, None)
            }
            Self::AssistantContextChanged(e) => {
                let (_, channel) = room_ids(adapter_name, e.external_room_id.as_ref(), None);
                (Some(e.thread_id.clone()), channel, None)
            }
        }
    }
}

/// The typed carrier every inbound event travels in.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub id: String,
    pub adapter_name: String,
    pub event_type: EventType,
    pub thread_id: Option<String>,
    pub channel_id: Option<String>,
    pub message_id: Option<String>,
    pub payload: EventPayload,
    pub raw: Value,
    pub metadata: JsonMap,
}

impl EventEnvelope {
    pub fn new(adapter_name: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            adapter_name: adapter_name.into(),
            event_type: payload.event_type(),
            thread_id: None,
            channel_id: None,
            message_id: None,
            payload,
            raw: Value::Null,
            metadata: JsonMap::new(),
        }
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    pub fn with_metadata(mut self, metadata: JsonMap) -> Self {
        self.metadata = metadata;
        self
    }

    /// Serializes to plain data with the `event_envelope` tag.
    pub fn to_map(&self) -> Value {
        let mut map = JsonMap::new();
        map.insert("id".into(), Value::String(self.id.clone()));
        map.insert(
            "adapter_name".into(),
            Value::String(self.adapter_name.clone()),
        );
        map.insert(
            "event_type".into(),
            Value::String(self.event_type.as_str().to_string()),
        );
        map.insert(
            "thread_id".into(),
            self.thread_id.clone().map_or(Value::Null, Value::String),
        );
        map.insert(
            "channel_id".into(),
            self.channel_id.clone().map_or(Value::Null, Value::String),
        );
        map.insert(
            "message_id".into(),
            self.message_id.clone().map_or(Value::Null, Value::String),
        );
        map.insert("payload".into(), self.payload.to_value());
        map.insert("raw".into(), self.raw.clone());
        map.insert("metadata".into(), Value::Object(self.metadata.clone()));
        plain::tagged("event_envelope", Value::Object(map))
    }

    /// Rebuilds a typed envelope from plain data.
    pub fn from_map(value: Value) -> Result<Self> {
        let mut map = plain::require_map("event_envelope", value)?;
        map.remove(plain::TAG_KEY);
        let adapter_name = plain::take_string(&mut map, "adapter_name").unwrap_or_default();
        let event_type = match plain::take_string(&mut map, "event_type") {
            Some(t) => EventType::parse(&t)?,
            None => EventType::Message,
        };
        let payload = EventPayload::from_value(
            event_type,
            map.remove("payload").unwrap_or(Value::Object(JsonMap::new())),
        )?;
        Ok(Self {
            id: plain::take_string(&mut map, "id").unwrap_or_else(|| Uuid::new_v4().to_string()),
            adapter_name,
            event_type,
            thread_id: plain::take_string(&mut map, "thread_id"),
            channel_id: plain::take_string(&mut map, "channel_id"),
            message_id: plain::take_string(&mut map, "message_id"),
            payload,
            raw: map.remove("raw").unwrap_or(Value::Null),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}
