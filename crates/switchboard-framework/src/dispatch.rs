//! Handler dispatch: dedup, routing policy, sequential execution.
//!
//! Routing is mutually exclusive per incoming message, in priority
//! order: subscribed thread, then mention, then regex message handlers.
//! Handlers run sequentially on the calling task; state returned by an
//! earlier handler is visible to the next one.

use tracing::{debug, span, Level};

use switchboard_core::error::Result;
use switchboard_core::model::{EventEnvelope, Incoming};
use switchboard_core::Thread;

use crate::chat::Chat;
use crate::handler::{EventClass, ThreadHandler};

/// Routes one incoming message through dedup and the handler policy.
///
/// Returns the updated chat and the incoming unchanged. A replayed
/// `(adapter, external_message_id)` pair is a no-op; messages without an
/// external id are never deduplicated.
pub async fn process_message(
    mut chat: Chat,
    adapter_name: &str,
    incoming: Incoming,
    thread_id: Option<&str>,
) -> Result<(Chat, Incoming)> {
    let dispatch_span = span!(Level::DEBUG, "dispatch", adapter = adapter_name);
    let _enter = dispatch_span.enter();

    if let Some(message_id) = &incoming.external_message_id {
        let key = (adapter_name.to_string(), message_id.clone());
        if chat.dedupe.contains(&key) {
            debug!(message_id = %message_id, "duplicate delivery, skipping dispatch");
            return Ok((chat, incoming));
        }
        chat.remember(key);
    }

    let adapter = chat.adapter(adapter_name)?;
    let mut thread = Thread::from_incoming(adapter_name, adapter, &incoming);
    if let Some(explicit) = thread_id {
        thread.id = explicit.to_string();
    }

    let handlers: Vec<ThreadHandler> = if chat.subscriptions.contains(&thread.id) {
        debug!(thread_id = %thread.id, "routing to subscribed handlers");
        chat.handlers.subscribed.clone()
    } else if chat.is_mentioned(&incoming) {
        debug!(thread_id = %thread.id, "routing to mention handlers");
        chat.handlers.mention.clone()
    } else {
        let text = incoming.text.as_deref().unwrap_or("");
        chat.handlers
            .message
            .iter()
            .filter(|entry| entry.pattern.is_match(text))
            .map(|entry| entry.handler.clone())
            .collect()
    };

    for handler in &handlers {
        chat = handler.invoke(chat, &thread, &incoming).await;
    }

    Ok((chat, incoming))
}

/// Runs every handler of `class` against the envelope, in registration
/// order.
pub async fn process_event(mut chat: Chat, class: EventClass, envelope: &EventEnvelope) -> Chat {
    let handlers = chat.handlers.event_class(class).to_vec();
    debug!(
        class = class.as_str(),
        handler_count = handlers.len(),
        "dispatching event"
    );
    for handler in &handlers {
        chat = handler.invoke(chat, envelope).await;
    }
    chat
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use switchboard_core::error::Result as CoreResult;
    use switchboard_core::model::SendOptions;
    use switchboard_core::{Adapter, BoxedAdapter};

    use super::*;
    use crate::handler::ThreadHandler;

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

    fn chat_with_adapter() -> Chat {
        Chat::new().with_adapter("null", Arc::new(NullAdapter) as BoxedAdapter)
    }

    fn counting_handler(counter: Arc<AtomicUsize>) -> ThreadHandler {
        ThreadHandler::simple(move |_thread, _incoming| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    fn incoming(id: &str, text: &str) -> Incoming {
        Incoming {
            external_message_id: Some(id.to_string()),
            text: Some(text.to_string()),
            ..Incoming::new("room")
        }
    }

    #[tokio::test]
    async fn replay_is_idempotent() {
        let fired = Arc::new(AtomicUsize::new(0));
        let chat = chat_with_adapter()
            .with_user_name("jido")
            .on_mention(counting_handler(Arc::clone(&fired)));

        let event = incoming("m1", "@jido hi");
        let (chat, _) = process_message(chat, "null", event.clone(), None).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(chat.dedupe().contains(&("null".into(), "m1".into())));

        let (chat, _) = process_message(chat, "null", event, None).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(chat.dedupe_order().len(), 1);
    }

    #[tokio::test]
    async fn missing_message_id_skips_dedup() {
        let fired = Arc::new(AtomicUsize::new(0));
        let chat = chat_with_adapter()
            .with_user_name("jido")
            .on_mention(counting_handler(Arc::clone(&fired)));

        let mut event = incoming("x", "@jido hi");
        event.external_message_id = None;

        let (chat, _) = process_message(chat, "null", event.clone(), None).await.unwrap();
        let (chat, _) = process_message(chat, "null", event, None).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert!(chat.dedupe().is_empty());
    }

    #[tokio::test]
    async fn routing_priority_is_exclusive() {
        let subscribed = Arc::new(AtomicUsize::new(0));
        let mentioned = Arc::new(AtomicUsize::new(0));
        let matched = Arc::new(AtomicUsize::new(0));

        let chat = chat_with_adapter()
            .with_user_name("jido")
            .on_subscribed(counting_handler(Arc::clone(&subscribed)))
            .on_mention(counting_handler(Arc::clone(&mentioned)))
            .on_message(".*", counting_handler(Arc::clone(&matched)))
            .unwrap();

        // Subscribed thread: only subscribed handlers run.
        let chat = chat.subscribe("null:room");
        let (chat, _) = process_message(chat, "null", incoming("m1", "@jido hi"), None)
            .await
            .unwrap();
        assert_eq!(subscribed.load(Ordering::SeqCst), 1);
        assert_eq!(mentioned.load(Ordering::SeqCst), 0);
        assert_eq!(matched.load(Ordering::SeqCst), 0);

        // Unsubscribed + mention: only mention handlers run.
        let chat = chat.unsubscribe("null:room");
        let (chat, _) = process_message(chat, "null", incoming("m2", "@jido hi"), None)
            .await
            .unwrap();
        assert_eq!(subscribed.load(Ordering::SeqCst), 1);
        assert_eq!(mentioned.load(Ordering::SeqCst), 1);
        assert_eq!(matched.load(Ordering::SeqCst), 0);

        // Plain message: only the regex handlers run.
        let (_chat, _) = process_message(chat, "null", incoming("m3", "hello"), None)
            .await
            .unwrap();
        assert_eq!(mentioned.load(Ordering::SeqCst), 1);
        assert_eq!(matched.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_matching_regex_handlers_run_in_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let push = |label: &'static str, order: Arc<std::sync::Mutex<Vec<&'static str>>>| {
            ThreadHandler::simple(move |_t, _i| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(label);
                }
            })
        };

        let chat = chat_with_adapter()
            .on_message("(?i)^ping", push("first", Arc::clone(&order)))
            .unwrap()
            .on_message("ping", push("second", Arc::clone(&order)))
            .unwrap()
            .on_message("^nope", push("never", Arc::clone(&order)))
            .unwrap();

        process_message(chat, "null", incoming("m1", "ping pong"), None)
            .await
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn stateful_handlers_thread_chat_state() {
        let chat = chat_with_adapter()
            .on_message(
                ".*",
                ThreadHandler::stateful(|chat: Chat, thread, _incoming| async move {
                    Ok(crate::state::set_thread_state(
                        chat,
                        &thread.id,
                        crate::state::StateUpdate::Put("seen".into(), json!(1)),
                    ))
                }),
            )
            .unwrap()
            .on_message(
                ".*",
                ThreadHandler::stateful(|chat: Chat, thread, _incoming| async move {
                    // Reads the first handler's write within the same dispatch.
                    let seen = crate::state::thread_state(&chat, &thread.id)
                        .and_then(|s| s.get("seen"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    Ok(crate::state::set_thread_state(
                        chat,
                        &thread.id,
                        crate::state::StateUpdate::Put("seen".into(), json!(seen + 1)),
                    ))
                }),
            )
            .unwrap();

        let (chat, _) = process_message(chat, "null", incoming("m1", "x"), None)
            .await
            .unwrap();
        let seen = crate::state::thread_state(&chat, "null:room")
            .and_then(|s| s.get("seen"))
            .and_then(Value::as_i64);
        assert_eq!(seen, Some(2));
    }

    #[tokio::test]
    async fn failing_stateful_handler_preserves_chat_and_dispatch_continues() {
        let fired = Arc::new(AtomicUsize::new(0));
        let chat = chat_with_adapter()
            .on_message(
                ".*",
                ThreadHandler::stateful(|_chat, _t, _i| async move {
                    Err(switchboard_core::Error::adapter("boom"))
                }),
            )
            .unwrap()
            .on_message(".*", counting_handler(Arc::clone(&fired)))
            .unwrap();

        let (chat, _) = process_message(chat, "null", incoming("m1", "x"), None)
            .await
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // The failed handler's chat is untouched; dedupe still recorded.
        assert_eq!(chat.dedupe_order().len(), 1);
    }
}
