//! The root chat state value.
//!
//! `Chat` is value-typed: every dispatch returns the next state, and
//! sharing across tasks is the caller's concern. The core takes no locks.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use switchboard_core::adapter::wrappers;
use switchboard_core::error::{Error, Result};
use switchboard_core::model::JsonMap;
use switchboard_core::BoxedAdapter;

use crate::handler::{EventClass, EventHandler, HandlerTable, MessageHandler, ThreadHandler};

/// Default bound on the dedupe set.
pub const DEFAULT_DEDUPE_LIMIT: usize = 1000;

/// Dedup key: `(adapter_name, external_message_id)`.
pub type DedupeKey = (String, String);

/// Root state of one chat session.
#[derive(Clone)]
pub struct Chat {
    pub id: String,
    pub user_name: Option<String>,
    pub(crate) mention_pattern: Option<Regex>,
    pub adapters: HashMap<String, BoxedAdapter>,
    pub subscriptions: BTreeSet<String>,
    pub(crate) dedupe: HashSet<DedupeKey>,
    pub(crate) dedupe_order: VecDeque<DedupeKey>,
    pub(crate) handlers: HandlerTable,
    pub thread_state: HashMap<String, JsonMap>,
    pub channel_state: HashMap<String, JsonMap>,
    pub metadata: JsonMap,
    pub initialized: bool,
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("id", &self.id)
            .field("user_name", &self.user_name)
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("subscriptions", &self.subscriptions)
            .field("dedupe_len", &self.dedupe.len())
            .field("handlers", &self.handlers)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}

impl Chat {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_name: None,
            mention_pattern: None,
            adapters: HashMap::new(),
            subscriptions: BTreeSet::new(),
            dedupe: HashSet::new(),
            dedupe_order: VecDeque::new(),
            handlers: HandlerTable::default(),
            thread_state: HashMap::new(),
            channel_state: HashMap::new(),
            metadata: JsonMap::new(),
            initialized: false,
        }
    }

    /// Sets the bot's own handle and compiles the mention pattern.
    ///
    /// The name is escaped before compilation, so names containing regex
    /// metacharacters match literally.
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        let user_name = user_name.into();
        self.mention_pattern = compile_mention_pattern(&user_name);
        self.user_name = Some(user_name);
        self
    }

    pub fn with_metadata(mut self, metadata: JsonMap) -> Self {
        self.metadata = metadata;
        self
    }

    /// Registers a platform adapter under `name`.
    pub fn with_adapter(mut self, name: impl Into<String>, adapter: BoxedAdapter) -> Self {
        self.adapters.insert(name.into(), adapter);
        self
    }

    /// Resolves an adapter or reports it unknown.
    pub fn adapter(&self, name: &str) -> Result<BoxedAdapter> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_adapter(name))
    }

    // ── Subscriptions ───────────────────────────────────────────────────

    /// Routes the thread's messages to subscribed handlers from now on.
    pub fn subscribe(mut self, thread_id: impl Into<String>) -> Self {
        self.subscriptions.insert(thread_id.into());
        self
    }

    pub fn unsubscribe(mut self, thread_id: &str) -> Self {
        self.subscriptions.remove(thread_id);
        self
    }

    // ── Handler registration (appends; dispatch order = registration order)

    pub fn on_mention(mut self, handler: ThreadHandler) -> Self {
        self.handlers.mention.push(handler);
        self
    }

    pub fn on_subscribed(mut self, handler: ThreadHandler) -> Self {
        self.handlers.subscribed.push(handler);
        self
    }

    /// Registers a message handler gated by `pattern`, compiled here —
    /// never re-compiled at dispatch.
    pub fn on_message(self, pattern: &str, handler: ThreadHandler) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::adapter(format!("invalid message pattern: {e}")))?;
        Ok(self.on_message_regex(pattern, handler))
    }

    pub fn on_message_regex(mut self, pattern: Regex, handler: ThreadHandler) -> Self {
        self.handlers.message.push(MessageHandler { pattern, handler });
        self
    }

    pub fn on_event(mut self, class: EventClass, handler: EventHandler) -> Self {
        self.handlers.event_class_mut(class).push(handler);
        self
    }

    pub fn on_reaction(self, handler: EventHandler) -> Self {
        self.on_event(EventClass::Reaction, handler)
    }

    pub fn on_action(self, handler: EventHandler) -> Self {
        self.on_event(EventClass::Action, handler)
    }

    pub fn on_modal_submit(self, handler: EventHandler) -> Self {
        self.on_event(EventClass::ModalSubmit, handler)
    }

    pub fn on_modal_close(self, handler: EventHandler) -> Self {
        self.on_event(EventClass::ModalClose, handler)
    }

    pub fn on_slash_command(self, handler: EventHandler) -> Self {
        self.on_event(EventClass::SlashCommand, handler)
    }

    pub fn on_assistant_thread_started(self, handler: EventHandler) -> Self {
        self.on_event(EventClass::AssistantThreadStarted, handler)
    }

    pub fn on_assistant_context_changed(self, handler: EventHandler) -> Self {
        self.on_event(EventClass::AssistantContextChanged, handler)
    }

    /// Read access to the handler table (counts, introspection).
    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    // ── Mention detection ───────────────────────────────────────────────

    /// A message mentions the bot when the platform flagged it or the
    /// text contains `@<user_name>` on a word boundary.
    pub fn is_mentioned(&self, incoming: &switchboard_core::Incoming) -> bool {
        if incoming.was_mentioned {
            return true;
        }
        match (&self.mention_pattern, incoming.text.as_deref()) {
            (Some(pattern), Some(text)) => pattern.is_match(text),
            _ => false,
        }
    }

    // ── Dedup ───────────────────────────────────────────────────────────

    /// The configured dedupe bound (`metadata.dedupe_limit`, default 1000).
    pub fn dedupe_limit(&self) -> usize {
        self.metadata
            .get("dedupe_limit")
            .and_then(Value::as_u64)
            .filter(|&n| n > 0)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_DEDUPE_LIMIT)
    }

    pub fn dedupe(&self) -> &HashSet<DedupeKey> {
        &self.dedupe
    }

    pub fn dedupe_order(&self) -> &VecDeque<DedupeKey> {
        &self.dedupe_order
    }

    /// Records a delivery, evicting the oldest keys past the bound.
    /// The set always mirrors the order queue's contents.
    pub(crate) fn remember(&mut self, key: DedupeKey) {
        if self.dedupe.insert(key.clone()) {
            self.dedupe_order.push_back(key);
            let limit = self.dedupe_limit();
            while self.dedupe_order.len() > limit {
                if let Some(evicted) = self.dedupe_order.pop_front() {
                    self.dedupe.remove(&evicted);
                }
            }
        }
    }

    // ── Adapter lifecycle ───────────────────────────────────────────────

    /// Runs every adapter's initialize hook and marks the chat
    /// initialized. Hook failures are logged, not fatal.
    pub async fn initialize(mut self) -> Self {
        let opts = self.adapter_opts();
        for (name, adapter) in &self.adapters {
            if let Err(err) = wrappers::initialize(adapter.as_ref(), &opts).await {
                if !matches!(err, Error::Unsupported) {
                    warn!(adapter = %name, error = %err, "adapter initialize failed");
                }
            }
        }
        info!(chat_id = %self.id, "chat initialized");
        self.initialized = true;
        self
    }

    /// Runs every adapter's shutdown hook and clears the initialized
    /// flag. The flag is advisory; nothing gates on it.
    pub async fn shutdown(mut self) -> Self {
        let opts = self.adapter_opts();
        for (name, adapter) in &self.adapters {
            if let Err(err) = wrappers::shutdown(adapter.as_ref(), &opts).await {
                if !matches!(err, Error::Unsupported) {
                    warn!(adapter = %name, error = %err, "adapter shutdown failed");
                }
            }
        }
        info!(chat_id = %self.id, "chat shut down");
        self.initialized = false;
        self
    }

    /// `metadata.adapter_opts`, forwarded to init/shutdown hooks.
    fn adapter_opts(&self) -> JsonMap {
        match self.metadata.get("adapter_opts") {
            Some(Value::Object(opts)) => opts.clone(),
            _ => JsonMap::new(),
        }
    }
}

/// Compiles the case-insensitive `(^|\s)@name\b` mention pattern with the
/// name escaped.
pub(crate) fn compile_mention_pattern(user_name: &str) -> Option<Regex> {
    let escaped = regex::escape(user_name);
    match Regex::new(&format!(r"(?i)(^|\s)@{escaped}\b")) {
        Ok(pattern) => Some(pattern),
        Err(err) => {
            warn!(user_name, error = %err, "failed to compile mention pattern");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_core::Incoming;

    fn incoming_with_text(text: &str) -> Incoming {
        Incoming {
            text: Some(text.to_string()),
            ..Incoming::new("room")
        }
    }

    #[test]
    fn mention_detection_uses_word_boundaries() {
        let chat = Chat::new().with_user_name("jido");
        assert!(chat.is_mentioned(&incoming_with_text("@jido hi")));
        assert!(chat.is_mentioned(&incoming_with_text("hey @jido, hi")));
        assert!(chat.is_mentioned(&incoming_with_text("hey @JIDO")));
        assert!(!chat.is_mentioned(&incoming_with_text("@jidox hi")));
        assert!(!chat.is_mentioned(&incoming_with_text("mail@jido.example")));
        assert!(!chat.is_mentioned(&incoming_with_text("no mention")));
    }

    #[test]
    fn platform_flag_wins_over_text() {
        let chat = Chat::new().with_user_name("jido");
        let mut incoming = incoming_with_text("nothing here");
        incoming.was_mentioned = true;
        assert!(chat.is_mentioned(&incoming));
    }

    #[test]
    fn metacharacters_in_user_name_match_literally() {
        let chat = Chat::new().with_user_name("c.o");
        assert!(chat.is_mentioned(&incoming_with_text("@c.o ping")));
        // An unescaped dot would also match this one.
        assert!(!chat.is_mentioned(&incoming_with_text("@cxo ping")));
    }

    #[test]
    fn dedupe_limit_reads_metadata() {
        let chat = Chat::new();
        assert_eq!(chat.dedupe_limit(), DEFAULT_DEDUPE_LIMIT);

        let mut metadata = JsonMap::new();
        metadata.insert("dedupe_limit".into(), json!(2));
        let chat = Chat::new().with_metadata(metadata);
        assert_eq!(chat.dedupe_limit(), 2);

        let mut metadata = JsonMap::new();
        metadata.insert("dedupe_limit".into(), json!(0));
        let chat = Chat::new().with_metadata(metadata);
        assert_eq!(chat.dedupe_limit(), DEFAULT_DEDUPE_LIMIT);
    }

    #[test]
    fn dedupe_eviction_is_fifo_and_set_mirrors_order() {
        let mut metadata = JsonMap::new();
        metadata.insert("dedupe_limit".into(), json!(2));
        let mut chat = Chat::new().with_metadata(metadata);

        for id in ["m1", "m2", "m3"] {
            chat.remember(("tg".into(), id.into()));
        }

        let order: Vec<_> = chat.dedupe_order().iter().cloned().collect();
        assert_eq!(
            order,
            vec![("tg".into(), "m2".into()), ("tg".into(), "m3".into())]
        );
        assert_eq!(chat.dedupe().len(), 2);
        assert!(!chat.dedupe().contains(&("tg".into(), "m1".into())));
        for key in chat.dedupe_order() {
            assert!(chat.dedupe().contains(key));
        }
    }

    #[test]
    fn unknown_adapter_resolution_errors() {
        let chat = Chat::new();
        assert!(matches!(
            chat.adapter("missing"),
            Err(Error::UnknownAdapter { name }) if name == "missing"
        ));
    }

    #[tokio::test]
    async fn lifecycle_drives_adapter_hooks_and_flag() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        use async_trait::async_trait;
        use switchboard_core::adapter::Lifecycle;
        use switchboard_core::error::Result as CoreResult;
        use switchboard_core::model::SendOptions;
        use switchboard_core::{Adapter, BoxedAdapter, Incoming};

        #[derive(Default)]
        struct HookedAdapter {
            inits: AtomicUsize,
            shutdowns: AtomicUsize,
        }

        #[async_trait]
        impl Adapter for HookedAdapter {
            fn channel_type(&self) -> &str {
                "hooked"
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

            fn lifecycle(&self) -> Option<&dyn Lifecycle> {
                Some(self)
            }
        }

        #[async_trait]
        impl Lifecycle for HookedAdapter {
            async fn initialize(&self, opts: &JsonMap) -> CoreResult<()> {
                assert_eq!(opts.get("mode").and_then(Value::as_str), Some("test"));
                self.inits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }

            async fn shutdown(&self, _opts: &JsonMap) -> CoreResult<()> {
                self.shutdowns.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let adapter = Arc::new(HookedAdapter::default());
        let mut metadata = JsonMap::new();
        metadata.insert("adapter_opts".into(), json!({"mode": "test"}));

        let chat = Chat::new()
            .with_metadata(metadata)
            .with_adapter("hooked", adapter.clone() as BoxedAdapter);
        assert!(!chat.initialized);

        let chat = chat.initialize().await;
        assert!(chat.initialized);
        assert_eq!(adapter.inits.load(Ordering::SeqCst), 1);

        let chat = chat.shutdown().await;
        assert!(!chat.initialized);
        assert_eq!(adapter.shutdowns.load(Ordering::SeqCst), 1);
    }
}
