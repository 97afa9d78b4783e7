//! Coercion of heterogeneous payloads into typed events and envelopes.
//!
//! Each `ensure_*` function takes raw plain data, enriches it with the
//! adapter name and kind-specific defaults, and builds the typed value
//! through its schema constructor. Anything that is not a map is rejected
//! as `Err(InvalidInput)`.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{
    self, ActionEvent, AssistantContextChangedEvent, AssistantThreadStartedEvent, EventEnvelope,
    EventPayload, EventType, Incoming, ModalCloseEvent, ModalSubmitEvent, ReactionEvent,
    SlashCommandEvent,
};

/// Stamps `adapter_name` into a map payload when absent.
fn with_adapter_name(value: Value, adapter_name: &str) -> Result<Value> {
    match value {
        Value::Object(mut map) => {
            map.entry("adapter_name")
                .or_insert_with(|| Value::String(adapter_name.to_string()));
            Ok(Value::Object(map))
        }
        other => Err(Error::invalid_input("event", other)),
    }
}

macro_rules! ensure_fn {
    ($name:ident, $kind:literal, $ty:ty) => {
        /// Coerces a raw map into the typed event, enriching it with the
        /// adapter name. Non-map input is invalid.
        pub fn $name(value: Value, adapter_name: &str) -> Result<$ty> {
            match value {
                Value::Object(_) => <$ty>::from_value(with_adapter_name(value, adapter_name)?),
                other => Err(Error::invalid_input($kind, other)),
            }
        }
    };
}

/// Coerces a raw map into an [`Incoming`]. Non-map input is invalid.
pub fn ensure_incoming(value: Value, _adapter_name: &str) -> Result<Incoming> {
    match value {
        Value::Object(_) => Incoming::from_value(value),
        other => Err(Error::invalid_input("incoming", other)),
    }
}

ensure_fn!(ensure_reaction_event, "reaction_event", ReactionEvent);
ensure_fn!(ensure_action_event, "action_event", ActionEvent);
ensure_fn!(ensure_modal_submit, "modal_submit_event", ModalSubmitEvent);
ensure_fn!(ensure_modal_close, "modal_close_event", ModalCloseEvent);
ensure_fn!(ensure_slash_command, "slash_command_event", SlashCommandEvent);
ensure_fn!(
    ensure_assistant_thread_started,
    "assistant_thread_started_event",
    AssistantThreadStartedEvent
);
ensure_fn!(
    ensure_assistant_context_changed,
    "assistant_context_changed_event",
    AssistantContextChangedEvent
);

/// Deterministic thread id for an inbound event.
pub fn thread_id_from(adapter_name: &str, incoming: &Incoming) -> String {
    model::thread_id_for(adapter_name, incoming)
}

/// Infers the event type of an untyped payload from its shape.
fn infer_event_type(payload: &Value) -> EventType {
    let Some(map) = payload.as_object() else {
        return EventType::Message;
    };
    if map.contains_key("emoji") {
        EventType::Reaction
    } else if map.contains_key("action_id") {
        EventType::Action
    } else if map.contains_key("callback_id") {
        EventType::ModalSubmit
    } else if map.contains_key("command") {
        EventType::SlashCommand
    } else {
        EventType::Message
    }
}

/// Coerces a raw value into a typed [`EventEnvelope`].
///
/// A map without an explicit `event_type` has its type inferred from the
/// payload shape; an explicit but unknown type string is rejected.
pub fn ensure_event_envelope(value: Value, adapter_name: &str) -> Result<EventEnvelope> {
    let Value::Object(mut map) = value else {
        return Err(Error::invalid_input("event_envelope", value));
    };

    // Envelope-shaped maps carry a payload; bare events are their own
    // payload.
    let (payload_value, envelope_fields) = if map.contains_key("payload") {
        let payload = map.remove("payload").unwrap_or(Value::Null);
        (payload, Some(map))
    } else {
        (Value::Object(map), None)
    };

    let explicit_type = envelope_fields
        .as_ref()
        .and_then(|m| m.get("event_type"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            payload_value
                .get("event_type")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

    let event_type = match explicit_type {
        Some(t) => EventType::parse(&t)?,
        None => infer_event_type(&payload_value),
    };

    let raw = payload_value.clone();
    let payload = EventPayload::from_value(event_type, payload_value)?;
    let mut envelope = EventEnvelope::new(adapter_name, payload).with_raw(raw);

    if let Some(mut fields) = envelope_fields {
        if let Some(id) = fields.remove("id").as_ref().and_then(Value::as_str) {
            envelope.id = id.to_string();
        }
        for (slot, key) in [
            (&mut envelope.thread_id, "thread_id"),
            (&mut envelope.channel_id, "channel_id"),
            (&mut envelope.message_id, "message_id"),
        ] {
            if let Some(v) = fields.remove(key).as_ref().and_then(Value::as_str) {
                *slot = Some(v.to_string());
            }
        }
        if let Some(Value::Object(meta)) = fields.remove("metadata") {
            envelope.metadata = meta;
        }
    }

    Ok(envelope)
}

/// Fills the envelope's `thread_id` / `channel_id` / `message_id` slots
/// from the payload and installs the payload. Slots that already hold a
/// value are never overwritten.
pub fn with_envelope_payload(mut envelope: EventEnvelope, payload: EventPayload) -> EventEnvelope {
    let (thread_id, channel_id, message_id) = payload.id_hints(&envelope.adapter_name);
    if envelope.thread_id.is_none() {
        envelope.thread_id = thread_id;
    }
    if envelope.channel_id.is_none() {
        envelope.channel_id = channel_id;
    }
    if envelope.message_id.is_none() {
        envelope.message_id = message_id;
    }
    envelope.event_type = payload.event_type();
    envelope.payload = payload;
    envelope
}
