//! Snapshotting chat state and handles to plain data, and back.
//!
//! The wire format is maps with string keys; every canonical struct is
//! stamped with a `"__type__"` discriminator and a single [`revive`]
//! dispatches on it. Handler closures are intentionally not serialized —
//! the handlers block records only per-class counts, and revival
//! restores an empty table; callers re-register after revival.

use std::collections::BTreeSet;

use serde_json::{json, Value};

use switchboard_core::adapter::{AdapterLookup, CapabilityMatrix, UnboundAdapter};
use switchboard_core::error::{Error, Result};
use switchboard_core::model::{
    plain, EventEnvelope, IngressResult, JsonMap, Message, ModalResult, PostPayload,
    WebhookRequest, WebhookResponse,
};
use switchboard_core::{ChannelRef, SentMessage, Thread};

use crate::chat::{Chat, DedupeKey};

/// A value reconstructed by [`revive`].
#[derive(Debug)]
pub enum Revived {
    Chat(Chat),
    Thread(Thread),
    Channel(ChannelRef),
    Message(Message),
    SentMessage(SentMessage),
    EventEnvelope(EventEnvelope),
    IngressResult(IngressResult),
    ModalResult(ModalResult),
    CapabilityMatrix(CapabilityMatrix),
    WebhookRequest(WebhookRequest),
    WebhookResponse(WebhookResponse),
    PostPayload(PostPayload),
    /// Unknown or missing tag; the value passes through untouched.
    Plain(Value),
}

/// Serializes a chat to plain data.
///
/// Sets are emitted as sorted sequences; adapters are encoded by their
/// registered names.
pub fn chat_to_map(chat: &Chat) -> Value {
    let mut adapter_names: Vec<&String> = chat.adapters.keys().collect();
    adapter_names.sort();
    let adapters: JsonMap = adapter_names
        .into_iter()
        .map(|name| (name.clone(), Value::String(name.clone())))
        .collect();

    let subscriptions: Vec<Value> = chat
        .subscriptions
        .iter()
        .map(|s| Value::String(s.clone()))
        .collect();

    let dedupe: BTreeSet<&DedupeKey> = chat.dedupe().iter().collect();
    let dedupe: Vec<Value> = dedupe.into_iter().map(dedupe_key_to_value).collect();
    let dedupe_order: Vec<Value> = chat.dedupe_order().iter().map(dedupe_key_to_value).collect();

    let counts: JsonMap = chat
        .handlers()
        .counts()
        .into_iter()
        .map(|(class, n)| (class.to_string(), json!(n)))
        .collect();

    plain::tagged(
        "chat",
        json!({
            "id": chat.id,
            "user_name": chat.user_name,
            "adapters": adapters,
            "subscriptions": subscriptions,
            "dedupe": dedupe,
            "dedupe_order": dedupe_order,
            "handlers": {"serializable": false, "counts": counts},
            "thread_state": chat.thread_state,
            "channel_state": chat.channel_state,
            "metadata": chat.metadata,
            "initialized": chat.initialized,
        }),
    )
}

fn dedupe_key_to_value(key: &DedupeKey) -> Value {
    json!([key.0, key.1])
}

fn dedupe_key_from_value(value: &Value) -> Option<DedupeKey> {
    let pair = value.as_array()?;
    match pair.as_slice() {
        [a, b] => Some((
            plain::stringify_scalar(a)?,
            plain::stringify_scalar(b)?,
        )),
        _ => None,
    }
}

/// Rebuilds a chat from plain data.
///
/// Adapter names resolve through `adapters`; unregistered names bind to
/// an [`UnboundAdapter`] placeholder that errors on first use. The
/// dedupe set is reconstructed strictly from `dedupe_order`, so set and
/// order can never diverge after revival. Handlers revive empty.
pub fn chat_from_map(value: Value, adapters: &dyn AdapterLookup) -> Result<Chat> {
    let mut map = plain::require_map("chat", value)?;
    map.remove(plain::TAG_KEY);

    let mut chat = Chat::new();
    if let Some(id) = plain::take_string(&mut map, "id") {
        chat.id = id;
    }
    if let Some(user_name) = plain::take_string(&mut map, "user_name") {
        chat = chat.with_user_name(user_name);
    }

    if let Some(Value::Object(adapter_map)) = map.remove("adapters") {
        for (name, _) in adapter_map {
            let adapter = adapters
                .adapter(&name)
                .unwrap_or_else(|| std::sync::Arc::new(UnboundAdapter::new(name.clone())));
            chat.adapters.insert(name, adapter);
        }
    }

    if let Some(Value::Array(subscriptions)) = map.remove("subscriptions") {
        for sub in subscriptions {
            if let Some(id) = plain::stringify_scalar(&sub) {
                chat.subscriptions.insert(id);
            }
        }
    }

    // The order queue is authoritative; the serialized set is ignored.
    if let Some(Value::Array(order)) = map.remove("dedupe_order") {
        for entry in &order {
            if let Some(key) = dedupe_key_from_value(entry) {
                if chat.dedupe.insert(key.clone()) {
                    chat.dedupe_order.push_back(key);
                }
            }
        }
    }
    map.remove("dedupe");
    map.remove("handlers");

    if let Some(Value::Object(states)) = map.remove("thread_state") {
        for (id, state) in states {
            if let Value::Object(state) = state {
                chat.thread_state.insert(id, state);
            }
        }
    }
    if let Some(Value::Object(states)) = map.remove("channel_state") {
        for (id, state) in states {
            if let Value::Object(state) = state {
                chat.channel_state.insert(id, state);
            }
        }
    }

    chat.metadata = plain::take_map(&mut map, "metadata");
    chat.initialized = plain::take_bool(&mut map, "initialized");
    Ok(chat)
}

/// Reconstructs a typed value from tagged plain data.
///
/// Unknown tags (and untagged values) pass through as
/// [`Revived::Plain`].
pub fn revive(value: Value, adapters: &dyn AdapterLookup) -> Result<Revived> {
    let tag = value
        .get(plain::TAG_KEY)
        .and_then(Value::as_str)
        .map(str::to_string);

    let Some(tag) = tag else {
        return Ok(Revived::Plain(value));
    };

    match tag.as_str() {
        "chat" => Ok(Revived::Chat(chat_from_map(value, adapters)?)),
        "thread" => Ok(Revived::Thread(Thread::from_map(value, adapters)?)),
        "channel" => Ok(Revived::Channel(ChannelRef::from_map(value, adapters)?)),
        "message" => {
            let mut value = value;
            plain::take_tag(&mut value);
            Ok(Revived::Message(Message::from_value(value)?))
        }
        "sent_message" => Ok(Revived::SentMessage(SentMessage::from_map(value, adapters)?)),
        "event_envelope" => Ok(Revived::EventEnvelope(EventEnvelope::from_map(value)?)),
        "ingress_result" => Ok(Revived::IngressResult(untagged(value)?)),
        "modal_result" => Ok(Revived::ModalResult(untagged(value)?)),
        "capability_matrix" => Ok(Revived::CapabilityMatrix(CapabilityMatrix::from_map(value)?)),
        "webhook_request" => Ok(Revived::WebhookRequest(WebhookRequest::from_map(value)?)),
        "webhook_response" => Ok(Revived::WebhookResponse(WebhookResponse::from_map(value)?)),
        "post_payload" => Ok(Revived::PostPayload(untagged(value)?)),
        _ => Ok(Revived::Plain(value)),
    }
}

fn untagged<T: serde::de::DeserializeOwned>(mut value: Value) -> Result<T> {
    plain::take_tag(&mut value);
    serde_json::from_value(value).map_err(Error::from)
}

/// Tags an [`IngressResult`] for the wire.
pub fn ingress_result_to_map(result: &IngressResult) -> Value {
    plain::tagged(
        "ingress_result",
        serde_json::to_value(result).unwrap_or(Value::Null),
    )
}

/// Tags a [`ModalResult`] for the wire.
pub fn modal_result_to_map(result: &ModalResult) -> Value {
    plain::tagged(
        "modal_result",
        serde_json::to_value(result).unwrap_or(Value::Null),
    )
}

/// Tags a [`PostPayload`] for the wire.
pub fn post_payload_to_map(payload: &PostPayload) -> Value {
    plain::tagged(
        "post_payload",
        serde_json::to_value(payload).unwrap_or(Value::Null),
    )
}
