//! Checked adapter invocation.
//!
//! Each wrapper consults the effective capability matrix, then either
//! invokes the adapter callback and normalizes its raw result into the
//! canonical type, applies the documented fallback, or returns
//! `Err(Unsupported)`. This is the only layer that touches raw adapter
//! output.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::capability::{Capability, CapabilityMatrix, Support};
use super::{Adapter, BoxedAdapter, ListenerSpec, ParsedEvent, WebhookOutcome};
use crate::error::{Error, Result};
use crate::handles::Thread;
use crate::model::{
    ChannelInfo, EphemeralMessage, EventEnvelope, EventPayload, FetchOptions, Incoming, JsonMap,
    Message, MessagePage, ModalResult, PostPayload, Response, SendOptions, ThreadPage,
    WebhookRequest, WebhookResponse,
};

fn support(adapter: &dyn Adapter, capability: Capability) -> Support {
    CapabilityMatrix::support(adapter, capability)
}

/// Normalizes a raw send-path result, filling in the room when the
/// platform result omits it.
fn response_from_raw(raw: Value, room: &str) -> Result<Response> {
    let mut response = match &raw {
        Value::Object(_) => Response::from_value(raw)?,
        _ => Response {
            raw,
            ..Response::default()
        },
    };
    if response.external_room_id.is_none() {
        response.external_room_id = Some(room.to_string());
    }
    Ok(response)
}

// =============================================================================
// Lifecycle
// =============================================================================

pub async fn initialize(adapter: &dyn Adapter, opts: &JsonMap) -> Result<()> {
    match support(adapter, Capability::Initialize) {
        Support::Unsupported => Err(Error::Unsupported),
        Support::Fallback => Ok(()),
        Support::Native => {
            let lifecycle = adapter.lifecycle().ok_or(Error::Unsupported)?;
            lifecycle.initialize(opts).await
        }
    }
}

pub async fn shutdown(adapter: &dyn Adapter, opts: &JsonMap) -> Result<()> {
    match support(adapter, Capability::Shutdown) {
        Support::Unsupported => Err(Error::Unsupported),
        Support::Fallback => Ok(()),
        Support::Native => {
            let lifecycle = adapter.lifecycle().ok_or(Error::Unsupported)?;
            lifecycle.shutdown(opts).await
        }
    }
}

// =============================================================================
// Send paths
// =============================================================================

/// Required operation; always invoked directly.
pub async fn send_message(
    adapter: &dyn Adapter,
    room: &str,
    text: &str,
    opts: &SendOptions,
) -> Result<Response> {
    let raw = adapter.send_message(room, text, opts).await?;
    response_from_raw(raw, room)
}

pub async fn edit_message(
    adapter: &dyn Adapter,
    room: &str,
    message_id: &str,
    text: &str,
    opts: &SendOptions,
) -> Result<Response> {
    if support(adapter, Capability::EditMessage) == Support::Unsupported {
        return Err(Error::Unsupported);
    }
    let edits = adapter.edits().ok_or(Error::Unsupported)?;
    let raw = edits.edit_message(room, message_id, text, opts).await?;
    response_from_raw(raw, room)
}

pub async fn delete_message(
    adapter: &dyn Adapter,
    room: &str,
    message_id: &str,
    opts: &SendOptions,
) -> Result<Response> {
    if support(adapter, Capability::DeleteMessage) == Support::Unsupported {
        return Err(Error::Unsupported);
    }
    let edits = adapter.edits().ok_or(Error::Unsupported)?;
    let raw = edits.delete_message(room, message_id, opts).await?;
    response_from_raw(raw, room)
}

pub async fn start_typing(adapter: &dyn Adapter, room: &str) -> Result<()> {
    if support(adapter, Capability::StartTyping) == Support::Unsupported {
        return Err(Error::Unsupported);
    }
    let typing = adapter.typing().ok_or(Error::Unsupported)?;
    typing.start_typing(room).await
}

pub async fn add_reaction(
    adapter: &dyn Adapter,
    room: &str,
    message_id: &str,
    emoji: &str,
    opts: &SendOptions,
) -> Result<Response> {
    if support(adapter, Capability::AddReaction) == Support::Unsupported {
        return Err(Error::Unsupported);
    }
    let reactions = adapter.reactions().ok_or(Error::Unsupported)?;
    let raw = reactions.add_reaction(room, message_id, emoji, opts).await?;
    response_from_raw(raw, room)
}

pub async fn remove_reaction(
    adapter: &dyn Adapter,
    room: &str,
    message_id: &str,
    emoji: &str,
    opts: &SendOptions,
) -> Result<Response> {
    if support(adapter, Capability::RemoveReaction) == Support::Unsupported {
        return Err(Error::Unsupported);
    }
    let reactions = adapter.reactions().ok_or(Error::Unsupported)?;
    let raw = reactions
        .remove_reaction(room, message_id, emoji, opts)
        .await?;
    response_from_raw(raw, room)
}

/// Channel-addressed post; falls back to the plain send path.
pub async fn post_channel_message(
    adapter: &dyn Adapter,
    room: &str,
    text: &str,
    opts: &SendOptions,
) -> Result<Response> {
    match support(adapter, Capability::PostChannelMessage) {
        Support::Unsupported => Err(Error::Unsupported),
        Support::Native => match adapter.channel_post() {
            Some(channel_post) => {
                let raw = channel_post.post_channel_message(room, text, opts).await?;
                response_from_raw(raw, room)
            }
            None => Err(Error::Unsupported),
        },
        Support::Fallback => send_message(adapter, room, text, opts).await,
    }
}

/// Streamed delivery; the fallback concatenates the chunks and sends one
/// message.
pub async fn stream_message(
    adapter: &dyn Adapter,
    room: &str,
    chunks: BoxStream<'static, String>,
    opts: &SendOptions,
) -> Result<Response> {
    match support(adapter, Capability::Stream) {
        Support::Unsupported => Err(Error::Unsupported),
        Support::Native => match adapter.streaming() {
            Some(streaming) => {
                let raw = streaming.stream(room, chunks, opts).await?;
                response_from_raw(raw, room)
            }
            None => Err(Error::Unsupported),
        },
        Support::Fallback => {
            let text: String = chunks.collect::<Vec<_>>().await.concat();
            send_message(adapter, room, &text, opts).await
        }
    }
}

/// Ephemeral post; with `fallback_to_dm` and an `open_dm` capability the
/// fallback delivers over a freshly opened DM.
pub async fn post_ephemeral(
    adapter: &dyn Adapter,
    room: &str,
    user: &str,
    payload: &PostPayload,
    opts: &SendOptions,
) -> Result<EphemeralMessage> {
    match support(adapter, Capability::PostEphemeral) {
        Support::Unsupported => Err(Error::Unsupported),
        Support::Native => match adapter.ephemeral() {
            Some(ephemeral) => {
                let raw = ephemeral.post_ephemeral(room, user, payload, opts).await?;
                Ok(EphemeralMessage {
                    response: Some(response_from_raw(raw, room)?),
                    used_fallback: false,
                    metadata: JsonMap::new(),
                })
            }
            None => Err(Error::Unsupported),
        },
        Support::Fallback => {
            if !opts.fallback_to_dm {
                return Err(Error::Unsupported);
            }
            let dm_room = open_dm(adapter, user).await?;
            debug!(room, dm_room = %dm_room, "ephemeral falling back to direct message");
            let response = send_message(adapter, &dm_room, &payload.text, opts).await?;
            let mut metadata = JsonMap::new();
            metadata.insert(
                "source_room_id".to_string(),
                Value::String(room.to_string()),
            );
            Ok(EphemeralMessage {
                response: Some(response),
                used_fallback: true,
                metadata,
            })
        }
    }
}

/// Opens a DM room, normalizing the descriptor to its room id.
pub async fn open_dm(adapter: &dyn Adapter, user: &str) -> Result<String> {
    if support(adapter, Capability::OpenDm) == Support::Unsupported {
        return Err(Error::Unsupported);
    }
    let direct = adapter.direct().ok_or(Error::Unsupported)?;
    let raw = direct.open_dm(user).await?;
    let room = match &raw {
        Value::Object(map) => ["external_room_id", "room_id", "id"]
            .iter()
            .find_map(|k| map.get(*k))
            .and_then(crate::model::plain::stringify_scalar),
        other => crate::model::plain::stringify_scalar(other),
    };
    room.ok_or_else(|| Error::invalid_input("dm_room", raw))
}

pub async fn open_modal(
    adapter: &dyn Adapter,
    room: &str,
    modal: Value,
    opts: &SendOptions,
) -> Result<ModalResult> {
    if support(adapter, Capability::OpenModal) == Support::Unsupported {
        return Err(Error::Unsupported);
    }
    let modals = adapter.modals().ok_or(Error::Unsupported)?;
    let raw = modals.open_modal(room, modal, opts).await?;
    match &raw {
        Value::Object(_) => ModalResult::from_value(raw),
        _ => Ok(ModalResult {
            raw,
            ..ModalResult::default()
        }),
    }
}

// =============================================================================
// Lookups and history
// =============================================================================

/// Channel metadata; the fallback synthesizes a minimal record.
pub async fn fetch_metadata(
    adapter: &dyn Adapter,
    adapter_name: &str,
    room: &str,
) -> Result<ChannelInfo> {
    match support(adapter, Capability::FetchMetadata) {
        Support::Unsupported => Err(Error::Unsupported),
        Support::Native => match adapter.lookup() {
            Some(lookup) => {
                let raw = lookup.fetch_metadata(room).await?;
                let mut info = ChannelInfo::from_value(raw)?;
                if info.id.is_empty() {
                    info.id = room.to_string();
                }
                Ok(info)
            }
            None => Err(Error::Unsupported),
        },
        Support::Fallback => Ok(ChannelInfo::synthetic(room, adapter_name)),
    }
}

/// Thread lookup; the fallback synthesizes a handle from the arguments.
pub async fn fetch_thread(
    adapter: &BoxedAdapter,
    adapter_name: &str,
    room: &str,
    thread: Option<&str>,
) -> Result<Thread> {
    let synthetic = Thread::new(adapter_name, adapter.clone(), room, thread.map(str::to_string));
    match support(adapter.as_ref(), Capability::FetchThread) {
        Support::Unsupported => Err(Error::Unsupported),
        Support::Fallback => Ok(synthetic),
        Support::Native => match adapter.lookup() {
            Some(lookup) => {
                let raw = lookup.fetch_thread(room, thread).await?;
                Ok(synthetic.absorb(raw))
            }
            None => Err(Error::Unsupported),
        },
    }
}

/// Single-message lookup; the fallback synthesizes a stub message.
pub async fn fetch_message(
    adapter: &dyn Adapter,
    adapter_name: &str,
    room: &str,
    message_id: &str,
) -> Result<Message> {
    match support(adapter, Capability::FetchMessage) {
        Support::Unsupported => Err(Error::Unsupported),
        Support::Fallback => Ok(Message {
            id: message_id.to_string(),
            thread_id: crate::model::channel_id_for(adapter_name, room),
            channel_id: room.to_string(),
            ..Message::default()
        }),
        Support::Native => match adapter.lookup() {
            Some(lookup) => {
                let raw = lookup.fetch_message(room, message_id).await?;
                let looks_incoming = raw
                    .as_object()
                    .is_some_and(|m| m.contains_key("external_room_id"));
                if looks_incoming {
                    let incoming = Incoming::from_value(raw)?;
                    Ok(Message::from_incoming(&incoming, adapter_name, None))
                } else {
                    Message::from_value(raw)
                }
            }
            None => Err(Error::Unsupported),
        },
    }
}

pub async fn fetch_messages(
    adapter: &dyn Adapter,
    adapter_name: &str,
    room: &str,
    thread: Option<&str>,
    opts: &FetchOptions,
) -> Result<MessagePage> {
    if support(adapter, Capability::FetchMessages) == Support::Unsupported {
        return Err(Error::Unsupported);
    }
    let history = adapter.history().ok_or(Error::Unsupported)?;
    let raw = history.fetch_messages(room, thread, opts).await?;
    MessagePage::from_value(raw, adapter_name)
}

pub async fn fetch_channel_messages(
    adapter: &dyn Adapter,
    adapter_name: &str,
    room: &str,
    opts: &FetchOptions,
) -> Result<MessagePage> {
    if support(adapter, Capability::FetchChannelMessages) == Support::Unsupported {
        return Err(Error::Unsupported);
    }
    let channel_history = adapter.channel_history().ok_or(Error::Unsupported)?;
    let raw = channel_history.fetch_channel_messages(room, opts).await?;
    MessagePage::from_value(raw, adapter_name)
}

pub async fn list_threads(
    adapter: &dyn Adapter,
    room: &str,
    opts: &FetchOptions,
) -> Result<ThreadPage> {
    if support(adapter, Capability::ListThreads) == Support::Unsupported {
        return Err(Error::Unsupported);
    }
    let channel_history = adapter.channel_history().ok_or(Error::Unsupported)?;
    let raw = channel_history.list_threads(room, opts).await?;
    ThreadPage::from_value(raw)
}

// =============================================================================
// Webhook path
// =============================================================================

/// Verification; adapters without a verifier accept everything.
pub async fn verify_webhook(adapter: &dyn Adapter, request: &WebhookRequest) -> Result<()> {
    match support(adapter, Capability::VerifyWebhook) {
        Support::Unsupported => Err(Error::Unsupported),
        Support::Fallback => Ok(()),
        Support::Native => match adapter.webhook_verifier() {
            Some(verifier) => verifier.verify_webhook(request).await,
            None => Err(Error::Unsupported),
        },
    }
}

/// Event parsing; the fallback transforms the payload as an `Incoming`
/// and wraps it in a `message` envelope tagged with the request path and
/// method.
pub async fn parse_event(
    adapter: &dyn Adapter,
    adapter_name: &str,
    request: &WebhookRequest,
) -> Result<ParsedEvent> {
    match support(adapter, Capability::ParseEvent) {
        Support::Unsupported => Err(Error::Unsupported),
        Support::Native => match adapter.event_parser() {
            Some(parser) => parser.parse_event(request).await,
            None => Err(Error::Unsupported),
        },
        Support::Fallback => {
            let incoming = adapter.transform_incoming(request.payload.clone()).await?;
            let mut metadata = JsonMap::new();
            metadata.insert(
                "path".to_string(),
                request.path.clone().map_or(Value::Null, Value::String),
            );
            metadata.insert("method".to_string(), Value::String(request.method.clone()));
            let envelope = EventEnvelope::new(adapter_name, EventPayload::Message(incoming))
                .with_raw(request.payload.clone())
                .with_metadata(metadata);
            Ok(ParsedEvent::Envelope(envelope))
        }
    }
}

/// The canonical outcome → response mapping used when the adapter has no
/// formatter (or its formatter fails on a verification rejection).
pub fn default_webhook_response(outcome: &WebhookOutcome<'_>) -> WebhookResponse {
    match outcome {
        WebhookOutcome::Accepted { .. } => WebhookResponse::accepted(),
        WebhookOutcome::Rejected(Error::InvalidWebhookSecret) => {
            WebhookResponse::unauthorized("invalid_webhook_secret")
        }
        WebhookOutcome::Rejected(Error::InvalidSignature) => {
            WebhookResponse::unauthorized("invalid_signature")
        }
        WebhookOutcome::Rejected(err) => WebhookResponse::invalid_request(err),
    }
}

pub async fn format_webhook_response(
    adapter: &dyn Adapter,
    outcome: WebhookOutcome<'_>,
    request: &WebhookRequest,
) -> Result<WebhookResponse> {
    match support(adapter, Capability::FormatWebhookResponse) {
        Support::Native => match adapter.response_formatter() {
            Some(formatter) => formatter.format_webhook_response(outcome, request).await,
            None => Err(Error::Unsupported),
        },
        _ => Ok(default_webhook_response(&outcome)),
    }
}

/// Full webhook override. `Err(Unsupported)` means "run the core
/// pipeline" — the pipeline is this operation's documented fallback.
pub async fn handle_webhook(
    adapter: &dyn Adapter,
    request: &WebhookRequest,
) -> Result<WebhookResponse> {
    match adapter.webhook_handler() {
        Some(handler) if support(adapter, Capability::HandleWebhook) != Support::Unsupported => {
            handler.handle_webhook(request).await
        }
        _ => Err(Error::Unsupported),
    }
}

/// Listener child specs; adapters without ingestion workers report none.
pub fn listener_child_specs(adapter: &dyn Adapter) -> Vec<ListenerSpec> {
    adapter
        .listener()
        .map(|l| l.listener_child_specs())
        .unwrap_or_default()
}

/// Builds a [`SentMessage`](crate::handles::SentMessage) id for responses
/// that did not echo one back.
pub(crate) fn message_id_or_new(response: &Response) -> String {
    response
        .external_message_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::adapter::capability::{validate_capabilities, CapabilityViolation};

    /// Adapter with nothing but the required operations.
    struct BareAdapter;

    #[async_trait]
    impl Adapter for BareAdapter {
        fn channel_type(&self) -> &str {
            "bare"
        }

        async fn transform_incoming(&self, raw: Value) -> Result<Incoming> {
            Incoming::from_value(raw)
        }

        async fn send_message(&self, room: &str, text: &str, _opts: &SendOptions) -> Result<Value> {
            Ok(json!({"message_id": "sent-1", "chat_id": room, "echo": text}))
        }
    }

    /// Adapter with DM support, used for the ephemeral fallback.
    struct DmAdapter;

    #[async_trait]
    impl Adapter for DmAdapter {
        fn channel_type(&self) -> &str {
            "dm"
        }

        async fn transform_incoming(&self, raw: Value) -> Result<Incoming> {
            Incoming::from_value(raw)
        }

        async fn send_message(&self, room: &str, text: &str, _opts: &SendOptions) -> Result<Value> {
            Ok(json!({"message_id": "dm-1", "chat_id": room, "echo": text}))
        }

        fn direct(&self) -> Option<&dyn super::super::DirectMessages> {
            Some(self)
        }
    }

    #[async_trait]
    impl super::super::DirectMessages for DmAdapter {
        async fn open_dm(&self, user: &str) -> Result<Value> {
            Ok(json!({"external_room_id": format!("dm-{user}")}))
        }
    }

    /// Adapter that lies about its edit capability.
    struct LyingAdapter;

    #[async_trait]
    impl Adapter for LyingAdapter {
        fn channel_type(&self) -> &str {
            "liar"
        }

        async fn transform_incoming(&self, raw: Value) -> Result<Incoming> {
            Incoming::from_value(raw)
        }

        async fn send_message(&self, _room: &str, _text: &str, _opts: &SendOptions) -> Result<Value> {
            Ok(json!({}))
        }

        fn declared_capabilities(&self) -> Option<CapabilityMatrix> {
            Some(CapabilityMatrix::new().declare(Capability::EditMessage, Support::Native))
        }
    }

    #[tokio::test]
    async fn send_message_normalizes_legacy_fields() {
        let response = send_message(&BareAdapter, "room-1", "hi", &SendOptions::default())
            .await
            .unwrap();
        assert_eq!(response.external_message_id.as_deref(), Some("sent-1"));
        assert_eq!(response.external_room_id.as_deref(), Some("room-1"));
    }

    #[tokio::test]
    async fn unsupported_operations_error() {
        let opts = SendOptions::default();
        assert!(matches!(
            edit_message(&BareAdapter, "r", "m", "t", &opts).await,
            Err(Error::Unsupported)
        ));
        assert!(matches!(
            add_reaction(&BareAdapter, "r", "m", "👍", &opts).await,
            Err(Error::Unsupported)
        ));
        assert!(matches!(
            start_typing(&BareAdapter, "r").await,
            Err(Error::Unsupported)
        ));
        assert!(matches!(
            fetch_messages(&BareAdapter, "bare", "r", None, &FetchOptions::default()).await,
            Err(Error::Unsupported)
        ));
    }

    #[tokio::test]
    async fn channel_post_falls_back_to_send() {
        let response = post_channel_message(&BareAdapter, "room-9", "text", &SendOptions::default())
            .await
            .unwrap();
        assert_eq!(response.external_message_id.as_deref(), Some("sent-1"));
    }

    #[tokio::test]
    async fn stream_fallback_concatenates_chunks() {
        let chunks = futures::stream::iter(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let response = stream_message(
            &BareAdapter,
            "room-1",
            Box::pin(chunks),
            &SendOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(response.raw["echo"], "abc");
    }

    #[tokio::test]
    async fn ephemeral_dm_fallback_marks_source_room() {
        let opts = SendOptions {
            fallback_to_dm: true,
            ..SendOptions::default()
        };
        let ephemeral = post_ephemeral(&DmAdapter, "room-1", "u1", &PostPayload::text("psst"), &opts)
            .await
            .unwrap();
        assert!(ephemeral.used_fallback);
        assert_eq!(ephemeral.metadata["source_room_id"], "room-1");
        let response = ephemeral.response.unwrap();
        assert_eq!(response.external_room_id.as_deref(), Some("dm-u1"));
    }

    #[tokio::test]
    async fn ephemeral_without_dm_support_is_unsupported() {
        let opts = SendOptions {
            fallback_to_dm: true,
            ..SendOptions::default()
        };
        assert!(matches!(
            post_ephemeral(&BareAdapter, "r", "u", &PostPayload::text("x"), &opts).await,
            Err(Error::Unsupported)
        ));
        // Without the opt-in flag even a DM-capable adapter refuses.
        assert!(matches!(
            post_ephemeral(&DmAdapter, "r", "u", &PostPayload::text("x"), &SendOptions::default())
                .await,
            Err(Error::Unsupported)
        ));
    }

    #[tokio::test]
    async fn metadata_fallback_is_synthetic() {
        let info = fetch_metadata(&BareAdapter, "bare", "room-7").await.unwrap();
        assert_eq!(info.id, "room-7");
        assert_eq!(info.metadata["adapter_name"], "bare");
    }

    #[tokio::test]
    async fn thread_fallback_is_synthetic() {
        let adapter: BoxedAdapter = Arc::new(BareAdapter);
        let thread = fetch_thread(&adapter, "bare", "room", Some("7")).await.unwrap();
        assert_eq!(thread.id, "bare:room:7");
        assert_eq!(thread.channel_id, "bare:room");
    }

    #[tokio::test]
    async fn message_fallback_is_a_stub() {
        let message = fetch_message(&BareAdapter, "bare", "room", "m3").await.unwrap();
        assert_eq!(message.id, "m3");
        assert_eq!(message.thread_id, "bare:room");
    }

    #[tokio::test]
    async fn verification_is_open_without_a_verifier() {
        let request = WebhookRequest::from_payload(json!({"x": 1}));
        assert!(verify_webhook(&BareAdapter, &request).await.is_ok());
    }

    #[tokio::test]
    async fn parse_fallback_wraps_transform_incoming() {
        let request = WebhookRequest::from_value(json!({
            "path": "/hooks/bare",
            "method": "POST",
            "payload": {"external_room_id": "room-2", "text": "hello"},
        }))
        .unwrap();

        let parsed = parse_event(&BareAdapter, "bare", &request).await.unwrap();
        let envelope = match parsed {
            ParsedEvent::Envelope(envelope) => envelope,
            ParsedEvent::Noop => panic!("expected envelope"),
        };
        assert_eq!(envelope.event_type, crate::model::EventType::Message);
        assert_eq!(envelope.metadata["path"], "/hooks/bare");
        assert_eq!(envelope.metadata["method"], "POST");
        match envelope.payload {
            EventPayload::Message(incoming) => assert_eq!(incoming.external_room_id, "room-2"),
            other => panic!("expected message payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn default_formatter_maps_outcomes() {
        let request = WebhookRequest::default();
        let ok = format_webhook_response(
            &BareAdapter,
            WebhookOutcome::Accepted { noop: false },
            &request,
        )
        .await
        .unwrap();
        assert_eq!(ok.status, 200);

        let secret_err = Error::InvalidWebhookSecret;
        let unauthorized =
            format_webhook_response(&BareAdapter, WebhookOutcome::Rejected(&secret_err), &request)
                .await
                .unwrap();
        assert_eq!(unauthorized.status, 401);
        assert_eq!(unauthorized.body["error"], "invalid_webhook_secret");

        let parse_err = Error::adapter("unparseable");
        let bad = format_webhook_response(&BareAdapter, WebhookOutcome::Rejected(&parse_err), &request)
            .await
            .unwrap();
        assert_eq!(bad.status, 400);
        assert_eq!(bad.body["error"], "invalid_webhook_request");
    }

    #[test]
    fn capability_matrix_synthesis() {
        let matrix = CapabilityMatrix::effective(&BareAdapter);
        assert_eq!(matrix.get(Capability::EditMessage), Some(Support::Unsupported));
        assert_eq!(matrix.get(Capability::VerifyWebhook), Some(Support::Fallback));
        assert_eq!(
            matrix.get(Capability::PostChannelMessage),
            Some(Support::Fallback)
        );

        let matrix = CapabilityMatrix::effective(&DmAdapter);
        assert_eq!(matrix.get(Capability::OpenDm), Some(Support::Native));
    }

    #[test]
    fn declared_matrix_merges_over_defaults() {
        let matrix = CapabilityMatrix::effective(&LyingAdapter);
        assert_eq!(matrix.get(Capability::EditMessage), Some(Support::Native));
    }

    #[test]
    fn validator_flags_missing_callbacks() {
        assert!(validate_capabilities(&BareAdapter).is_ok());
        assert!(validate_capabilities(&DmAdapter).is_ok());

        let offenders = validate_capabilities(&LyingAdapter).unwrap_err();
        assert_eq!(
            offenders,
            vec![(Capability::EditMessage, CapabilityViolation::MissingCallback)]
        );
    }

    #[tokio::test]
    async fn declared_unsupported_disables_a_fallback() {
        struct ClosedAdapter;

        #[async_trait]
        impl Adapter for ClosedAdapter {
            fn channel_type(&self) -> &str {
                "closed"
            }

            async fn transform_incoming(&self, raw: Value) -> Result<Incoming> {
                Incoming::from_value(raw)
            }

            async fn send_message(
                &self,
                _room: &str,
                _text: &str,
                _opts: &SendOptions,
            ) -> Result<Value> {
                Ok(json!({}))
            }

            fn declared_capabilities(&self) -> Option<CapabilityMatrix> {
                Some(
                    CapabilityMatrix::new()
                        .declare(Capability::PostChannelMessage, Support::Unsupported),
                )
            }
        }

        assert!(matches!(
            post_channel_message(&ClosedAdapter, "r", "t", &SendOptions::default()).await,
            Err(Error::Unsupported)
        ));
    }
}
