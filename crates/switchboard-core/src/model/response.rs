//! Outbound call results: responses, ephemeral sends, modals, channel info.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::plain::{self, JsonMap};
use crate::error::Result;

/// Delivery status of an outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    Sent,
    Edited,
    Deleted,
    Failed,
}

/// Normalized result of an adapter send/edit/delete/react call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    pub external_message_id: Option<String>,
    pub external_room_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub status: ResponseStatus,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Response {
    /// Normalizes a raw adapter result.
    ///
    /// Legacy field names are coerced (`message_id` →
    /// `external_message_id`, `chat_id`/`channel_id` →
    /// `external_room_id`, `date` → `timestamp`); timestamps parse from
    /// integer epoch or RFC3339 strings; `status` defaults to `sent`.
    pub fn from_value(value: Value) -> Result<Self> {
        let raw = value.clone();
        let mut map = plain::require_map("response", value)?;

        let external_message_id = plain::take_string(&mut map, "external_message_id")
            .or_else(|| plain::take_string(&mut map, "message_id"));
        let external_room_id = plain::take_string(&mut map, "external_room_id")
            .or_else(|| plain::take_string(&mut map, "chat_id"))
            .or_else(|| plain::take_string(&mut map, "channel_id"));
        let timestamp = map
            .remove("timestamp")
            .or_else(|| map.remove("date"))
            .as_ref()
            .and_then(plain::parse_timestamp);
        let status = plain::take_string(&mut map, "status")
            .and_then(|s| match s.as_str() {
                "sent" => Some(ResponseStatus::Sent),
                "edited" => Some(ResponseStatus::Edited),
                "deleted" => Some(ResponseStatus::Deleted),
                "failed" => Some(ResponseStatus::Failed),
                _ => None,
            })
            .unwrap_or_default();

        Ok(Self {
            external_message_id,
            external_room_id,
            timestamp,
            status,
            raw,
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    // Legacy aliases. Read-only views over the canonical fields; the
    // duplicated source fields are never stored separately.

    pub fn message_id(&self) -> Option<&str> {
        self.external_message_id.as_deref()
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.external_room_id.as_deref()
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.external_room_id.as_deref()
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

/// Result of an ephemeral post, possibly delivered over an opened DM.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EphemeralMessage {
    pub response: Option<Response>,
    pub used_fallback: bool,
    #[serde(default)]
    pub metadata: JsonMap,
}

/// Result of opening a modal on the platform.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalResult {
    pub external_id: Option<String>,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl ModalResult {
    pub fn from_value(value: Value) -> Result<Self> {
        let raw = value.clone();
        let mut map = plain::require_map("modal_result", value)?;
        Ok(Self {
            external_id: plain::take_string(&mut map, "external_id")
                .or_else(|| plain::take_string(&mut map, "id")),
            raw,
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }
}

/// Channel metadata fetched from (or synthesized for) an adapter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelInfo {
    pub id: String,
    pub name: Option<String>,
    pub topic: Option<String>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl ChannelInfo {
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = plain::require_map("channel_info", value)?;
        Ok(Self {
            id: plain::take_string(&mut map, "id").unwrap_or_default(),
            name: plain::take_string(&mut map, "name"),
            topic: plain::take_string(&mut map, "topic"),
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }

    /// Synthetic info for adapters without a metadata callback.
    pub fn synthetic(room_id: impl Into<String>, adapter_name: &str) -> Self {
        let mut metadata = JsonMap::new();
        metadata.insert(
            "adapter_name".to_string(),
            Value::String(adapter_name.to_string()),
        );
        Self {
            id: room_id.into(),
            name: None,
            topic: None,
            metadata,
        }
    }
}

/// Transport-level failure classification for cross-transport diagnostics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressResult {
    pub transport: String,
    pub adapter_name: Option<String>,
    pub ok: bool,
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl IngressResult {
    pub fn accepted(transport: impl Into<String>, adapter_name: impl Into<String>) -> Self {
        Self {
            transport: transport.into(),
            adapter_name: Some(adapter_name.into()),
            ok: true,
            ..Self::default()
        }
    }

    pub fn rejected(
        transport: impl Into<String>,
        adapter_name: Option<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self {
            transport: transport.into(),
            adapter_name,
            ok: false,
            reason: Some(reason.to_string()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_legacy_field_names() {
        let response = Response::from_value(json!({
            "message_id": 42,
            "chat_id": "room-1",
            "date": 1_700_000_000,
        }))
        .unwrap();

        assert_eq!(response.external_message_id.as_deref(), Some("42"));
        assert_eq!(response.external_room_id.as_deref(), Some("room-1"));
        assert_eq!(response.timestamp.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(response.status, ResponseStatus::Sent);
    }

    #[test]
    fn legacy_aliases_read_canonical_fields() {
        let response = Response::from_value(json!({
            "external_message_id": "m9",
            "external_room_id": "r9",
        }))
        .unwrap();
        assert_eq!(response.message_id(), Some("m9"));
        assert_eq!(response.chat_id(), Some("r9"));
        assert_eq!(response.channel_id(), Some("r9"));
    }

    #[test]
    fn canonical_names_win_over_legacy() {
        let response = Response::from_value(json!({
            "external_message_id": "canonical",
            "message_id": "legacy",
        }))
        .unwrap();
        assert_eq!(response.external_message_id.as_deref(), Some("canonical"));
    }

    #[test]
    fn rfc3339_timestamps_parse() {
        let response =
            Response::from_value(json!({"timestamp": "2024-11-14T22:13:20+00:00"})).unwrap();
        assert_eq!(response.timestamp.unwrap().timestamp(), 1_731_622_400);
    }

    #[test]
    fn synthetic_channel_info_carries_adapter_name() {
        let info = ChannelInfo::synthetic("room-5", "tg");
        assert_eq!(info.id, "room-5");
        assert_eq!(info.metadata["adapter_name"], "tg");
    }
}
