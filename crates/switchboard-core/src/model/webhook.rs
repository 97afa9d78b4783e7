//! HTTP-shaped webhook envelopes.
//!
//! The core never holds a live connection; it receives a
//! [`WebhookRequest`] value and produces a [`WebhookResponse`] value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::plain::{self, JsonMap};
use crate::error::{Error, Result};

/// A raw webhook delivery, normalized for the inbound pipeline.
///
/// Header keys are lowercased at construction; lookups via
/// [`header`](Self::header) are case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookRequest {
    pub adapter_name: Option<String>,
    pub method: String,
    pub path: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub query: JsonMap,
    #[serde(default)]
    pub raw: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Default for WebhookRequest {
    fn default() -> Self {
        Self {
            adapter_name: None,
            method: "POST".to_string(),
            path: None,
            headers: BTreeMap::new(),
            payload: Value::Null,
            query: JsonMap::new(),
            raw: Value::Null,
            metadata: JsonMap::new(),
        }
    }
}

impl WebhookRequest {
    /// Wraps a bare payload in a default POST request.
    pub fn from_payload(payload: Value) -> Self {
        Self {
            raw: payload.clone(),
            payload,
            ..Self::default()
        }
    }

    /// Normalizes a request-shaped map: headers lowercased, the original
    /// value preserved under `raw`.
    pub fn from_value(value: Value) -> Result<Self> {
        let raw = value.clone();
        let mut map = match value {
            Value::Object(map) => map,
            // A bare payload (non-request shape) becomes the body.
            other => return Ok(Self::from_payload(other)),
        };

        // Request shape is recognized by any of its envelope keys;
        // otherwise the whole map is the payload.
        let looks_like_request = ["payload", "headers", "method", "path", "query"]
            .iter()
            .any(|k| map.contains_key(*k));
        if !looks_like_request {
            return Ok(Self::from_payload(Value::Object(map)));
        }

        let mut headers = BTreeMap::new();
        if let Some(Value::Object(raw_headers)) = map.remove("headers") {
            for (k, v) in raw_headers {
                if let Some(v) = plain::stringify_scalar(&v) {
                    headers.insert(k.to_ascii_lowercase(), v);
                }
            }
        }

        Ok(Self {
            adapter_name: plain::take_string(&mut map, "adapter_name"),
            method: plain::take_string(&mut map, "method").unwrap_or_else(|| "POST".to_string()),
            path: plain::take_string(&mut map, "path"),
            headers,
            payload: map.remove("payload").unwrap_or(Value::Null),
            query: plain::take_map(&mut map, "query"),
            raw,
            metadata: plain::take_map(&mut map, "metadata"),
        })
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn with_adapter_name(mut self, name: impl Into<String>) -> Self {
        self.adapter_name = Some(name.into());
        self
    }

    pub fn to_map(&self) -> Value {
        plain::tagged(
            "webhook_request",
            serde_json::to_value(self).unwrap_or(Value::Null),
        )
    }

    pub fn from_map(mut value: Value) -> Result<Self> {
        plain::take_tag(&mut value);
        serde_json::from_value(value).map_err(Error::from)
    }
}

/// The typed response the pipeline hands back to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Default for WebhookResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: Value::Null,
            metadata: JsonMap::new(),
        }
    }
}

impl WebhookResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            ..Self::default()
        }
    }

    /// `200 {"ok": true}` — event accepted.
    pub fn accepted() -> Self {
        Self::new(200, json!({"ok": true}))
    }

    /// `401` with the verification failure named in the body.
    pub fn unauthorized(reason: &str) -> Self {
        Self::new(401, json!({"error": reason}))
    }

    /// `404 {"error": "unknown_adapter", ...}`.
    pub fn unknown_adapter(adapter_name: &str) -> Self {
        Self::new(
            404,
            json!({"error": "unknown_adapter", "adapter_name": adapter_name}),
        )
    }

    /// `400 {"error": "invalid_webhook_request", ...}`.
    pub fn invalid_request(reason: impl std::fmt::Display) -> Self {
        Self::new(
            400,
            json!({"error": "invalid_webhook_request", "reason": reason.to_string()}),
        )
    }

    /// `500 {"error": "webhook_exception", ...}` — uncaught failure.
    pub fn exception(reason: impl std::fmt::Display) -> Self {
        Self::new(
            500,
            json!({"error": "webhook_exception", "reason": reason.to_string()}),
        )
    }

    /// `500 {"error": "webhook_response_format_error"}` — the adapter's
    /// own formatter failed.
    pub fn format_error() -> Self {
        Self::new(500, json!({"error": "webhook_response_format_error"}))
    }

    pub fn to_map(&self) -> Value {
        plain::tagged(
            "webhook_response",
            serde_json::to_value(self).unwrap_or(Value::Null),
        )
    }

    pub fn from_map(mut value: Value) -> Result<Self> {
        plain::take_tag(&mut value);
        serde_json::from_value(value).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_lowercased_and_lookup_is_case_insensitive() {
        let request = WebhookRequest::from_value(json!({
            "method": "POST",
            "headers": {"X-Signature": "abc", "Content-Type": "application/json"},
            "payload": {"a": 1},
        }))
        .unwrap();

        assert!(request.headers.contains_key("x-signature"));
        assert_eq!(request.header("X-SIGNATURE"), Some("abc"));
        assert_eq!(request.header("content-type"), Some("application/json"));
    }

    #[test]
    fn bare_payload_maps_become_the_body() {
        let request =
            WebhookRequest::from_value(json!({"update_id": 1, "message": {"text": "hi"}})).unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.payload["update_id"], 1);
    }

    #[test]
    fn canonical_bodies() {
        assert_eq!(WebhookResponse::accepted().status, 200);
        assert_eq!(WebhookResponse::accepted().body, json!({"ok": true}));

        let resp = WebhookResponse::unknown_adapter("missing");
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body["adapter_name"], "missing");

        assert_eq!(
            WebhookResponse::unauthorized("invalid_webhook_secret").status,
            401
        );
        assert_eq!(WebhookResponse::invalid_request("bad json").status, 400);
        assert_eq!(WebhookResponse::exception("panic").status, 500);
        assert_eq!(
            WebhookResponse::format_error().body["error"],
            "webhook_response_format_error"
        );
    }

    #[test]
    fn request_round_trips_through_plain_data() {
        let request = WebhookRequest::from_value(json!({
            "adapter_name": "tg",
            "path": "/hooks/tg",
            "headers": {"X-Token": "t"},
            "payload": {"k": "v"},
        }))
        .unwrap();
        let revived = WebhookRequest::from_map(request.to_map()).unwrap();
        assert_eq!(revived, request);
    }
}
