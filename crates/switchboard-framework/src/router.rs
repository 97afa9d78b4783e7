//! Envelope router: dispatches a typed envelope to the right handler
//! entry point and back-fills the envelope's metadata slots.

use switchboard_core::error::Result;
use switchboard_core::model::{EventEnvelope, EventPayload, EventType};
use switchboard_core::normalize;

use crate::chat::Chat;
use crate::dispatch;
use crate::handler::EventClass;

/// Routes an envelope.
///
/// Message payloads run the full dedup + routing-policy path; every
/// other event type runs its handler class. The returned envelope has
/// its `thread_id` / `channel_id` / `message_id` slots filled from the
/// payload (never overwriting explicit values).
pub async fn route_event(
    chat: Chat,
    adapter_name: &str,
    envelope: EventEnvelope,
) -> Result<(Chat, EventEnvelope)> {
    match &envelope.payload {
        EventPayload::Message(incoming) => {
            let incoming = incoming.clone();
            let thread_id = envelope
                .thread_id
                .clone()
                .unwrap_or_else(|| normalize::thread_id_from(adapter_name, &incoming));
            let (chat, routed) =
                dispatch::process_message(chat, adapter_name, incoming, Some(&thread_id)).await?;
            let envelope = normalize::with_envelope_payload(envelope, EventPayload::Message(routed));
            Ok((chat, envelope))
        }
        payload => {
            // The class follows the payload, which is authoritative even
            // when a hand-built envelope carries a stale event_type.
            let class = event_class(payload.event_type());
            let chat = dispatch::process_event(chat, class, &envelope).await;
            let payload = envelope.payload.clone();
            let envelope = normalize::with_envelope_payload(envelope, payload);
            Ok((chat, envelope))
        }
    }
}

/// Handler class for a non-message event type.
fn event_class(event_type: EventType) -> EventClass {
    match event_type {
        EventType::Message | EventType::Reaction => EventClass::Reaction,
        EventType::Action => EventClass::Action,
        EventType::ModalSubmit => EventClass::ModalSubmit,
        EventType::ModalClose => EventClass::ModalClose,
        EventType::SlashCommand => EventClass::SlashCommand,
        EventType::AssistantThreadStarted => EventClass::AssistantThreadStarted,
        EventType::AssistantContextChanged => EventClass::AssistantContextChanged,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use switchboard_core::error::Result as CoreResult;
    use switchboard_core::model::{Incoming, ReactionEvent, SendOptions};
    use switchboard_core::{Adapter, BoxedAdapter};

    use super::*;
    use crate::handler::EventHandler;

    struct NullAdapter;

    #[async_trait]
    impl Adapter for NullAdapter {
        fn channel_type(&self) -> &str {
            "null"
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

    #[tokio::test]
    async fn message_envelopes_get_slots_filled() {
        let chat = Chat::new().with_adapter("null", Arc::new(NullAdapter) as BoxedAdapter);
        let incoming = Incoming {
            external_message_id: Some("m1".into()),
            ..Incoming::new("room")
        };
        let envelope = EventEnvelope::new("null", EventPayload::Message(incoming));

        let (_chat, routed) = route_event(chat, "null", envelope).await.unwrap();
        assert_eq!(routed.thread_id.as_deref(), Some("null:room"));
        assert_eq!(routed.channel_id.as_deref(), Some("null:room"));
        assert_eq!(routed.message_id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn reaction_envelopes_run_reaction_handlers() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let chat = Chat::new()
            .with_adapter("null", Arc::new(NullAdapter) as BoxedAdapter)
            .on_reaction(EventHandler::simple(move |_envelope| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }));

        let envelope = EventEnvelope::new(
            "null",
            EventPayload::Reaction(ReactionEvent {
                external_room_id: Some("room".into()),
                emoji: "👍".into(),
                ..ReactionEvent::default()
            }),
        );

        let (_chat, routed) = route_event(chat, "null", envelope).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(routed.channel_id.as_deref(), Some("null:room"));
    }
}
