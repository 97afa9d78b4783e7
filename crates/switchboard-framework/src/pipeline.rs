//! The inbound webhook pipeline: verify → parse → route → format.
//!
//! [`handle_request`] is total: it returns a typed [`WebhookResponse`]
//! for every input. Panics raised anywhere inside the pipeline —
//! including adapter callbacks and user handlers — are caught and mapped
//! to a 500 response, leaving the chat state as it was before the
//! request.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, warn};

use switchboard_core::adapter::{wrappers, Adapter, ParsedEvent, WebhookOutcome};
use switchboard_core::error::Error;
use switchboard_core::model::{EventEnvelope, IngressResult, WebhookRequest, WebhookResponse};
use serde_json::Value;

use crate::chat::Chat;
use crate::router;
use crate::serial;

/// Input accepted by the pipeline: a typed request or a raw map.
#[derive(Debug, Clone)]
pub enum WebhookInput {
    Request(WebhookRequest),
    Raw(Value),
}

impl From<WebhookRequest> for WebhookInput {
    fn from(request: WebhookRequest) -> Self {
        Self::Request(request)
    }
}

impl From<Value> for WebhookInput {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

/// Runs one webhook delivery through the pipeline.
///
/// Never returns an error and never panics to the caller. The envelope
/// is `None` when nothing was routed (unknown adapter, verification
/// failure, parser noop, or panic).
pub async fn handle_request(
    chat: Chat,
    adapter_name: &str,
    input: impl Into<WebhookInput>,
) -> (Chat, Option<EventEnvelope>, WebhookResponse) {
    let input = input.into();
    let snapshot = chat.clone();

    let outcome = AssertUnwindSafe(run(chat, adapter_name, input))
        .catch_unwind()
        .await;

    match outcome {
        Ok(result) => result,
        Err(panic) => {
            let reason = panic_reason(panic.as_ref());
            error!(adapter = adapter_name, reason = %reason, "webhook pipeline panicked");
            (snapshot, None, WebhookResponse::exception(reason))
        }
    }
}

async fn run(
    chat: Chat,
    adapter_name: &str,
    input: WebhookInput,
) -> (Chat, Option<EventEnvelope>, WebhookResponse) {
    let Ok(adapter) = chat.adapter(adapter_name) else {
        warn!(adapter = adapter_name, "webhook for unknown adapter");
        return (chat, None, WebhookResponse::unknown_adapter(adapter_name));
    };

    let request = match input {
        WebhookInput::Request(request) => request,
        WebhookInput::Raw(value) => match WebhookRequest::from_value(value) {
            Ok(request) => request,
            Err(err) => {
                return (chat, None, WebhookResponse::invalid_request(err));
            }
        },
    }
    .with_adapter_name(adapter_name);

    if let Err(reason) = wrappers::verify_webhook(adapter.as_ref(), &request).await {
        warn!(adapter = adapter_name, reason = %reason, "webhook verification failed");
        let response = format_rejection(adapter.as_ref(), &reason, &request).await;
        return (chat, None, response);
    }

    match wrappers::parse_event(adapter.as_ref(), adapter_name, &request).await {
        Ok(ParsedEvent::Noop) => {
            debug!(adapter = adapter_name, "parser noop");
            let response = format_acceptance(adapter.as_ref(), true, &request).await;
            (chat, None, response)
        }
        Ok(ParsedEvent::Envelope(envelope)) => {
            let pre_route = chat.clone();
            match router::route_event(chat, adapter_name, envelope).await {
                Ok((chat, envelope)) => {
                    let response = format_acceptance(adapter.as_ref(), false, &request).await;
                    (chat, Some(envelope), response)
                }
                Err(err) => {
                    warn!(adapter = adapter_name, error = %err, "event routing failed");
                    let response = format_rejection(adapter.as_ref(), &err, &request).await;
                    (pre_route, None, response)
                }
            }
        }
        Err(reason) => {
            warn!(adapter = adapter_name, reason = %reason, "event parsing failed");
            let response = format_rejection(adapter.as_ref(), &reason, &request).await;
            (chat, None, response)
        }
    }
}

/// Formats a success; a failing adapter formatter becomes a 500.
async fn format_acceptance(
    adapter: &dyn Adapter,
    noop: bool,
    request: &WebhookRequest,
) -> WebhookResponse {
    match wrappers::format_webhook_response(adapter, WebhookOutcome::Accepted { noop }, request)
        .await
    {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "adapter response formatter failed");
            WebhookResponse::format_error()
        }
    }
}

/// Formats a rejection; a failing adapter formatter falls back to the
/// canonical status mapping. The response metadata carries an ingress
/// classification for cross-transport diagnostics.
async fn format_rejection(
    adapter: &dyn Adapter,
    reason: &Error,
    request: &WebhookRequest,
) -> WebhookResponse {
    let outcome = WebhookOutcome::Rejected(reason);
    let mut response = match wrappers::format_webhook_response(adapter, outcome, request).await {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "adapter response formatter failed, using canonical mapping");
            wrappers::default_webhook_response(&WebhookOutcome::Rejected(reason))
        }
    };
    let ingress = IngressResult::rejected("webhook", request.adapter_name.clone(), reason);
    response
        .metadata
        .insert("ingress".to_string(), serial::ingress_result_to_map(&ingress));
    response
}

fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use switchboard_core::adapter::{EventParser, ResponseFormatter, WebhookVerifier};
    use switchboard_core::error::Result as CoreResult;
    use switchboard_core::model::{Incoming, SendOptions};
    use switchboard_core::{Adapter, BoxedAdapter};

    use super::*;

    /// Parser-less adapter; the fallback parse path transforms the
    /// payload directly.
    struct PlainAdapter;

    #[async_trait]
    impl Adapter for PlainAdapter {
        fn channel_type(&self) -> &str {
            "plain"
        }

        async fn transform_incoming(&self, raw: Value) -> CoreResult<Incoming> {
            Incoming::from_value(raw)
        }

        async fn send_message(
            &self,
            _room: &str,
            _text: &str,
            _opts: &SendOptions,
        ) -> CoreResult<Value> {
            Ok(json!({}))
        }
    }

    /// Secret-checking adapter with a noop parser and custom formatter.
    struct GuardedAdapter;

    #[async_trait]
    impl Adapter for GuardedAdapter {
        fn channel_type(&self) -> &str {
            "guarded"
        }

        async fn transform_incoming(&self, raw: Value) -> CoreResult<Incoming> {
            Incoming::from_value(raw)
        }

        async fn send_message(
            &self,
            _room: &str,
            _text: &str,
            _opts: &SendOptions,
        ) -> CoreResult<Value> {
            Ok(json!({}))
        }

        fn webhook_verifier(&self) -> Option<&dyn WebhookVerifier> {
            Some(self)
        }

        fn event_parser(&self) -> Option<&dyn EventParser> {
            Some(self)
        }

        fn response_formatter(&self) -> Option<&dyn ResponseFormatter> {
            Some(self)
        }
    }

    #[async_trait]
    impl WebhookVerifier for GuardedAdapter {
        async fn verify_webhook(&self, request: &WebhookRequest) -> CoreResult<()> {
            match request.header("x-webhook-secret") {
                Some("s3cret") => Ok(()),
                _ => Err(Error::InvalidWebhookSecret),
            }
        }
    }

    #[async_trait]
    impl EventParser for GuardedAdapter {
        async fn parse_event(&self, request: &WebhookRequest) -> CoreResult<ParsedEvent> {
            if request.payload.get("heartbeat").is_some() {
                return Ok(ParsedEvent::Noop);
            }
            Err(Error::adapter("unparseable delivery"))
        }
    }

    #[async_trait]
    impl ResponseFormatter for GuardedAdapter {
        async fn format_webhook_response(
            &self,
            outcome: WebhookOutcome<'_>,
            _request: &WebhookRequest,
        ) -> CoreResult<WebhookResponse> {
            Ok(match outcome {
                WebhookOutcome::Accepted { noop: true } => {
                    WebhookResponse::new(204, json!({"ok": true, "noop": true}))
                }
                WebhookOutcome::Accepted { noop: false } => WebhookResponse::accepted(),
                WebhookOutcome::Rejected(err) => {
                    wrappers::default_webhook_response(&WebhookOutcome::Rejected(err))
                }
            })
        }
    }

    /// Adapter whose transform panics, to exercise the catch-all.
    struct PanickingAdapter;

    #[async_trait]
    impl Adapter for PanickingAdapter {
        fn channel_type(&self) -> &str {
            "panicky"
        }

        async fn transform_incoming(&self, _raw: Value) -> CoreResult<Incoming> {
            panic!("adapter exploded");
        }

        async fn send_message(
            &self,
            _room: &str,
            _text: &str,
            _opts: &SendOptions,
        ) -> CoreResult<Value> {
            Ok(json!({}))
        }
    }

    #[tokio::test]
    async fn unknown_adapter_is_404() {
        let chat = Chat::new().with_adapter("plain", Arc::new(PlainAdapter) as BoxedAdapter);
        let (_chat, envelope, response) =
            handle_request(chat, "missing", json!({"any": "payload"})).await;
        assert!(envelope.is_none());
        assert_eq!(response.status, 404);
        assert_eq!(response.body["error"], "unknown_adapter");
        assert_eq!(response.body["adapter_name"], "missing");
    }

    #[tokio::test]
    async fn fallback_parse_routes_and_accepts() {
        let chat = Chat::new().with_adapter("plain", Arc::new(PlainAdapter) as BoxedAdapter);
        let (chat, envelope, response) = handle_request(
            chat,
            "plain",
            json!({"external_room_id": "r", "external_message_id": "m1", "text": "hi"}),
        )
        .await;

        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"ok": true}));
        let envelope = envelope.expect("routed envelope");
        assert_eq!(envelope.thread_id.as_deref(), Some("plain:r"));
        assert!(chat.dedupe().contains(&("plain".into(), "m1".into())));
    }

    #[tokio::test]
    async fn verification_failure_is_401() {
        let chat = Chat::new().with_adapter("guarded", Arc::new(GuardedAdapter) as BoxedAdapter);
        let (_chat, envelope, response) = handle_request(
            chat,
            "guarded",
            json!({"headers": {"X-Webhook-Secret": "wrong"}, "payload": {"a": 1}}),
        )
        .await;
        assert!(envelope.is_none());
        assert_eq!(response.status, 401);
        assert_eq!(response.body["error"], "invalid_webhook_secret");

        // Rejections carry an ingress classification in the metadata.
        let ingress = &response.metadata["ingress"];
        assert_eq!(ingress["__type__"], "ingress_result");
        assert_eq!(ingress["transport"], "webhook");
        assert_eq!(ingress["ok"], false);
    }

    #[tokio::test]
    async fn noop_parse_uses_adapter_formatter() {
        let chat = Chat::new().with_adapter("guarded", Arc::new(GuardedAdapter) as BoxedAdapter);
        let (_chat, envelope, response) = handle_request(
            chat,
            "guarded",
            json!({"headers": {"x-webhook-secret": "s3cret"}, "payload": {"heartbeat": 1}}),
        )
        .await;
        assert!(envelope.is_none());
        assert_eq!(response.status, 204);
        assert_eq!(response.body, json!({"ok": true, "noop": true}));
    }

    #[tokio::test]
    async fn parse_failure_is_400() {
        let chat = Chat::new().with_adapter("guarded", Arc::new(GuardedAdapter) as BoxedAdapter);
        let (_chat, _envelope, response) = handle_request(
            chat,
            "guarded",
            json!({"headers": {"x-webhook-secret": "s3cret"}, "payload": {"junk": true}}),
        )
        .await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "invalid_webhook_request");
    }

    #[tokio::test]
    async fn panics_become_500_and_preserve_state() {
        let chat = Chat::new()
            .with_adapter("panicky", Arc::new(PanickingAdapter) as BoxedAdapter)
            .subscribe("panicky:somewhere");

        let (chat, envelope, response) =
            handle_request(chat, "panicky", json!({"external_room_id": "r"})).await;

        assert!(envelope.is_none());
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"], "webhook_exception");
        assert!(response.body["reason"]
            .as_str()
            .unwrap()
            .contains("adapter exploded"));
        // State is the pre-request snapshot.
        assert!(chat.subscriptions.contains("panicky:somewhere"));
    }
}
