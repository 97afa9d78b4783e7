//! Follow-up handle for a previously sent message.

use serde_json::Value;

use crate::adapter::{wrappers, AdapterLookup, BoxedAdapter, UnboundAdapter};
use crate::error::Result;
use crate::model::{plain, JsonMap, Media, Postable, Response, SendOptions};

/// Handle to a sent message exposing edit / delete / react follow-ups.
///
/// `default_opts` (including the thread anchor of the originating post)
/// are merged into every follow-up call; per-call options win.
#[derive(Clone)]
pub struct SentMessage {
    /// External message id (or a generated one when the platform echoed
    /// none back).
    pub id: String,
    pub thread_id: String,
    pub adapter_name: String,
    pub adapter: BoxedAdapter,
    pub external_room_id: String,
    pub text: String,
    pub formatted: Option<String>,
    pub raw: Value,
    pub attachments: Vec<Media>,
    pub metadata: JsonMap,
    pub response: Response,
    pub default_opts: SendOptions,
}

impl std::fmt::Debug for SentMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentMessage")
            .field("id", &self.id)
            .field("thread_id", &self.thread_id)
            .field("adapter_name", &self.adapter_name)
            .field("external_room_id", &self.external_room_id)
            .field("text", &self.text)
            .finish()
    }
}

impl SentMessage {
    /// Edits the message in place.
    ///
    /// On success the returned handle carries the new external id (when
    /// the platform assigns one), the new text, and the edit response.
    pub async fn edit(&self, input: impl Into<Postable>, opts: SendOptions) -> Result<SentMessage> {
        let payload = input.into().to_payload();
        let formatted = payload.format().map(str::to_string);
        let merged = self.default_opts.merged(&opts);
        let response = wrappers::edit_message(
            self.adapter.as_ref(),
            &self.external_room_id,
            &self.id,
            &payload.text,
            &merged,
        )
        .await?;
        Ok(SentMessage {
            id: response
                .external_message_id
                .clone()
                .unwrap_or_else(|| self.id.clone()),
            text: payload.text,
            formatted,
            raw: response.raw.clone(),
            response,
            ..self.clone()
        })
    }

    pub async fn delete(&self, opts: SendOptions) -> Result<Response> {
        let merged = self.default_opts.merged(&opts);
        wrappers::delete_message(
            self.adapter.as_ref(),
            &self.external_room_id,
            &self.id,
            &merged,
        )
        .await
    }

    pub async fn add_reaction(&self, emoji: &str) -> Result<Response> {
        wrappers::add_reaction(
            self.adapter.as_ref(),
            &self.external_room_id,
            &self.id,
            emoji,
            &self.default_opts,
        )
        .await
    }

    pub async fn remove_reaction(&self, emoji: &str) -> Result<Response> {
        wrappers::remove_reaction(
            self.adapter.as_ref(),
            &self.external_room_id,
            &self.id,
            emoji,
            &self.default_opts,
        )
        .await
    }

    /// Serializes with the `sent_message` tag; the adapter is encoded by
    /// name.
    pub fn to_map(&self) -> Value {
        let mut map = JsonMap::new();
        map.insert("id".into(), Value::String(self.id.clone()));
        map.insert("thread_id".into(), Value::String(self.thread_id.clone()));
        map.insert(
            "adapter_name".into(),
            Value::String(self.adapter_name.clone()),
        );
        map.insert(
            "external_room_id".into(),
            Value::String(self.external_room_id.clone()),
        );
        map.insert("text".into(), Value::String(self.text.clone()));
        map.insert(
            "formatted".into(),
            self.formatted.clone().map_or(Value::Null, Value::String),
        );
        map.insert("raw".into(), self.raw.clone());
        map.insert(
            "attachments".into(),
            serde_json::to_value(&self.attachments).unwrap_or(Value::Null),
        );
        map.insert("metadata".into(), Value::Object(self.metadata.clone()));
        map.insert("response".into(), self.response.to_value());
        map.insert(
            "default_opts".into(),
            serde_json::to_value(&self.default_opts).unwrap_or(Value::Null),
        );
        plain::tagged("sent_message", Value::Object(map))
    }

    /// Rebuilds a handle from plain data, resolving the adapter by name.
    pub fn from_map(value: Value, adapters: &dyn AdapterLookup) -> Result<Self> {
        let mut map = plain::require_map("sent_message", value)?;
        map.remove(plain::TAG_KEY);
        let adapter_name = plain::take_string(&mut map, "adapter_name").unwrap_or_default();
        let adapter = adapters
            .adapter(&adapter_name)
            .unwrap_or_else(|| std::sync::Arc::new(UnboundAdapter::new(adapter_name.clone())));
        let attachments = match map.remove("attachments") {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(crate::model::Media::from_value)
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };
        let response = match map.remove("response") {
            Some(Value::Object(m)) => Response::from_value(Value::Object(m))?,
            _ => Response::default(),
        };
        let default_opts = match map.remove("default_opts") {
            Some(v @ Value::Object(_)) => serde_json::from_value(v)?,
            _ => SendOptions::default(),
        };
        Ok(Self {
            id: plain::take_string(&mut map, "id").unwrap_or_default(),
            thread_id: plain::take_string(&mut map, "thread_id").unwrap_or_default(),
            adapter_name,
            adapter,
            external_room_id: plain::take_string(&mut map, "external_room_id").unwrap_or_default(),
            text: plain::take_string(&mut map, "text").unwrap_or_default(),
            formatted: plain::take_string(&mut map, "formatted"),
            raw: map.remove("raw").unwrap_or(Value::Null),
            attachments,
            metadata: plain::take_map(&mut map, "metadata"),
            response,
            default_opts,
        })
    }
}
