//! The thread handle: the primary outbound facade.

use std::collections::{HashSet, VecDeque};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde_json::Value;

use super::sent::SentMessage;
use super::MentionTarget;
use crate::adapter::capability::{Capability, CapabilityMatrix, Support};
use crate::adapter::{wrappers, AdapterLookup, BoxedAdapter, UnboundAdapter};
use crate::error::{Error, Result};
use crate::model::{
    plain, EphemeralMessage, FetchOptions, Incoming, JsonMap, Message, MessagePage, ModalResult,
    Postable, Response, SendOptions,
};

/// Outbound handle addressing a room and optional sub-thread.
///
/// Invariants: `channel_id` is always `"adapter:room"`; `id` appends the
/// sub-thread when one is present.
#[derive(Clone)]
pub struct Thread {
    pub id: String,
    pub adapter_name: String,
    pub adapter: BoxedAdapter,
    pub external_room_id: String,
    pub external_thread_id: Option<String>,
    pub channel_id: String,
    pub is_dm: bool,
    pub metadata: JsonMap,
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("adapter_name", &self.adapter_name)
            .field("external_room_id", &self.external_room_id)
            .field("external_thread_id", &self.external_thread_id)
            .field("is_dm", &self.is_dm)
            .finish()
    }
}

impl Thread {
    pub fn new(
        adapter_name: impl Into<String>,
        adapter: BoxedAdapter,
        external_room_id: impl Into<String>,
        external_thread_id: Option<String>,
    ) -> Self {
        let adapter_name = adapter_name.into();
        let external_room_id = external_room_id.into();
        let channel_id = format!("{adapter_name}:{external_room_id}");
        let id = match &external_thread_id {
            Some(thread) => format!("{channel_id}:{thread}"),
            None => channel_id.clone(),
        };
        Self {
            id,
            adapter_name,
            adapter,
            external_room_id,
            external_thread_id,
            channel_id,
            is_dm: false,
            metadata: JsonMap::new(),
        }
    }

    /// Builds the handle for an inbound event.
    pub fn from_incoming(
        adapter_name: impl Into<String>,
        adapter: BoxedAdapter,
        incoming: &Incoming,
    ) -> Self {
        let mut thread = Self::new(
            adapter_name,
            adapter,
            incoming.external_room_id.clone(),
            incoming.external_thread_id.clone(),
        );
        thread.is_dm = incoming.is_dm();
        thread
    }

    // ── Posting ─────────────────────────────────────────────────────────

    /// Posts text or any [`Postable`] to this thread.
    pub async fn post(&self, input: impl Into<Postable>, opts: SendOptions) -> Result<SentMessage> {
        let payload = input.into().to_payload();
        let formatted = payload.format().map(str::to_string);
        let opts = self.anchored_opts(opts);
        let response = wrappers::send_message(
            self.adapter.as_ref(),
            &self.external_room_id,
            &payload.text,
            &opts,
        )
        .await?;
        Ok(self.sent_message(payload.text, formatted, response, opts))
    }

    /// Posts a chunked stream; adapters without native streaming receive
    /// the concatenated text as one message.
    pub async fn post_stream(
        &self,
        chunks: impl Stream<Item = String> + Send + 'static,
        opts: SendOptions,
    ) -> Result<SentMessage> {
        let opts = self.anchored_opts(opts);
        let response = wrappers::stream_message(
            self.adapter.as_ref(),
            &self.external_room_id,
            chunks.boxed(),
            &opts,
        )
        .await?;
        let text = response
            .raw
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(self.sent_message(text, None, response, opts))
    }

    /// Posts an ephemeral message visible only to `user`.
    pub async fn post_ephemeral(
        &self,
        user: &str,
        input: impl Into<Postable>,
        opts: SendOptions,
    ) -> Result<EphemeralMessage> {
        let payload = input.into().to_payload();
        let opts = self.anchored_opts(opts);
        wrappers::post_ephemeral(
            self.adapter.as_ref(),
            &self.external_room_id,
            user,
            &payload,
            &opts,
        )
        .await
    }

    /// Injects this thread's sub-thread into the options; a caller's
    /// explicit `thread_id` always wins.
    fn anchored_opts(&self, mut opts: SendOptions) -> SendOptions {
        if opts.thread_id.is_none() {
            opts.thread_id = self.external_thread_id.clone();
        }
        opts
    }

    fn sent_message(
        &self,
        text: String,
        formatted: Option<String>,
        response: Response,
        default_opts: SendOptions,
    ) -> SentMessage {
        SentMessage {
            id: wrappers::message_id_or_new(&response),
            thread_id: self.id.clone(),
            adapter_name: self.adapter_name.clone(),
            adapter: self.adapter.clone(),
            external_room_id: self.external_room_id.clone(),
            text,
            formatted,
            raw: response.raw.clone(),
            attachments: Vec::new(),
            metadata: JsonMap::new(),
            response,
            default_opts,
        }
    }

    // ── History ─────────────────────────────────────────────────────────

    /// Fetches one page of this thread's history.
    pub async fn messages(&self, opts: &FetchOptions) -> Result<MessagePage> {
        wrappers::fetch_messages(
            self.adapter.as_ref(),
            &self.adapter_name,
            &self.external_room_id,
            self.external_thread_id.as_deref(),
            opts,
        )
        .await
    }

    /// Follows `next_cursor` until exhausted, concatenating pages in
    /// order. Cursors already seen end the walk, so adapter cycles
    /// cannot loop forever.
    pub async fn all_messages(&self, opts: &FetchOptions) -> Result<Vec<Message>> {
        let mut collected = Vec::new();
        let mut cursor = opts.cursor.clone();
        let mut seen: HashSet<String> = cursor.iter().cloned().collect();
        loop {
            let page = self.messages(&opts.with_cursor(cursor.clone())).await?;
            collected.extend(page.messages);
            match page.next_cursor {
                Some(next) if !next.is_empty() && seen.insert(next.clone()) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }
        Ok(collected)
    }

    /// Lazy history stream, yielding one message at a time.
    ///
    /// Pages are fetched on demand: nothing is requested until the first
    /// element is consumed. A fetch error terminates the stream without
    /// propagating; messages already buffered remain emitted.
    pub fn messages_stream(&self, opts: FetchOptions) -> BoxStream<'static, Message> {
        struct PageWalk {
            adapter: BoxedAdapter,
            adapter_name: String,
            room: String,
            thread: Option<String>,
            opts: FetchOptions,
            cursor: Option<String>,
            buffer: VecDeque<Message>,
            seen: HashSet<String>,
            done: bool,
        }

        let walk = PageWalk {
            adapter: self.adapter.clone(),
            adapter_name: self.adapter_name.clone(),
            room: self.external_room_id.clone(),
            thread: self.external_thread_id.clone(),
            cursor: opts.cursor.clone(),
            seen: opts.cursor.iter().cloned().collect(),
            opts,
            buffer: VecDeque::new(),
            done: false,
        };

        futures::stream::unfold(walk, |mut walk| async move {
            loop {
                if let Some(message) = walk.buffer.pop_front() {
                    return Some((message, walk));
                }
                if walk.done {
                    return None;
                }
                let fetched = wrappers::fetch_messages(
                    walk.adapter.as_ref(),
                    &walk.adapter_name,
                    &walk.room,
                    walk.thread.as_deref(),
                    &walk.opts.with_cursor(walk.cursor.clone()),
                )
                .await;
                match fetched {
                    Ok(page) => {
                        walk.buffer.extend(page.messages);
                        match page.next_cursor {
                            Some(next) if !next.is_empty() && walk.seen.insert(next.clone()) => {
                                walk.cursor = Some(next);
                            }
                            _ => walk.done = true,
                        }
                    }
                    Err(_) => walk.done = true,
                }
            }
        })
        .boxed()
    }

    // ── Platform operations ─────────────────────────────────────────────

    /// Renders a user mention in the adapter's syntax.
    pub fn mention_user(&self, target: impl Into<MentionTarget>) -> String {
        let Some(user_id) = target.into().user_id() else {
            return "@unknown".to_string();
        };
        match self.adapter.channel_type() {
            "discord" => format!("<@{user_id}>"),
            "telegram" => format!("@{user_id}"),
            _ => format!("@{user_id}"),
        }
    }

    /// Re-fetches this thread from the adapter.
    ///
    /// A typed thread in the result replaces this handle; a plain map
    /// merges metadata and may update the sub-thread id.
    pub async fn refresh(self) -> Result<Thread> {
        match CapabilityMatrix::support(self.adapter.as_ref(), Capability::FetchThread) {
            Support::Unsupported => Err(Error::Unsupported),
            Support::Fallback => Ok(self),
            Support::Native => {
                let lookup = self.adapter.lookup().ok_or(Error::Unsupported)?;
                let raw = lookup
                    .fetch_thread(&self.external_room_id, self.external_thread_id.as_deref())
                    .await?;
                Ok(self.absorb(raw))
            }
        }
    }

    /// Folds a raw thread lookup result into this handle.
    pub fn absorb(mut self, raw: Value) -> Thread {
        let Value::Object(mut map) = raw else {
            return self;
        };
        map.remove(plain::TAG_KEY);

        if let Some(thread_id) = plain::take_string(&mut map, "external_thread_id") {
            self.external_thread_id = Some(thread_id);
        }
        if let Some(room) = plain::take_string(&mut map, "external_room_id") {
            self.external_room_id = room;
        }
        if let Some(is_dm) = map.remove("is_dm").and_then(|v| v.as_bool()) {
            self.is_dm = is_dm;
        }

        // Recompute the deterministic ids from the absorbed parts.
        self.channel_id = format!("{}:{}", self.adapter_name, self.external_room_id);
        self.id = match &self.external_thread_id {
            Some(thread) => format!("{}:{thread}", self.channel_id),
            None => self.channel_id.clone(),
        };

        match map.remove("metadata") {
            Some(Value::Object(meta)) => self.metadata.extend(meta),
            _ => {
                // Scalar leftovers are treated as metadata.
                for (k, v) in map {
                    if !matches!(k.as_str(), "id" | "adapter_name" | "channel_id") {
                        self.metadata.insert(k, v);
                    }
                }
            }
        }
        self
    }

    pub async fn open_modal(&self, modal: Value, opts: &SendOptions) -> Result<ModalResult> {
        wrappers::open_modal(self.adapter.as_ref(), &self.external_room_id, modal, opts).await
    }

    pub async fn start_typing(&self) -> Result<()> {
        wrappers::start_typing(self.adapter.as_ref(), &self.external_room_id).await
    }

    pub async fn add_reaction(&self, message_id: &str, emoji: &str) -> Result<Response> {
        wrappers::add_reaction(
            self.adapter.as_ref(),
            &self.external_room_id,
            message_id,
            emoji,
            &SendOptions::default(),
        )
        .await
    }

    pub async fn remove_reaction(&self, message_id: &str, emoji: &str) -> Result<Response> {
        wrappers::remove_reaction(
            self.adapter.as_ref(),
            &self.external_room_id,
            message_id,
            emoji,
            &SendOptions::default(),
        )
        .await
    }

    // ── Serialization ───────────────────────────────────────────────────

    /// Serializes with the `thread` tag; the adapter is encoded by name.
    pub fn to_map(&self) -> Value {
        let mut map = JsonMap::new();
        map.insert("id".into(), Value::String(self.id.clone()));
        map.insert(
            "adapter_name".into(),
            Value::String(self.adapter_name.clone()),
        );
        map.insert(
            "external_room_id".into(),
            Value::String(self.external_room_id.clone()),
        );
        map.insert(
            "external_thread_id".into(),
            self.external_thread_id
                .clone()
                .map_or(Value::Null, Value::String),
        );
        map.insert("channel_id".into(), Value::String(self.channel_id.clone()));
        map.insert("is_dm".into(), Value::Bool(self.is_dm));
        map.insert("metadata".into(), Value::Object(self.metadata.clone()));
        plain::tagged("thread", Value::Object(map))
    }

    /// Rebuilds a handle from plain data, resolving the adapter by name.
    ///
    /// Unregistered names bind to an [`UnboundAdapter`] placeholder.
    pub fn from_map(value: Value, adapters: &dyn AdapterLookup) -> Result<Self> {
        let mut map = plain::require_map("thread", value)?;
        map.remove(plain::TAG_KEY);
        let adapter_name = plain::take_string(&mut map, "adapter_name").unwrap_or_default();
        let adapter = adapters
            .adapter(&adapter_name)
            .unwrap_or_else(|| std::sync::Arc::new(UnboundAdapter::new(adapter_name.clone())));
        let mut thread = Thread::new(
            adapter_name,
            adapter,
            plain::take_string(&mut map, "external_room_id").unwrap_or_default(),
            plain::take_string(&mut map, "external_thread_id"),
        );
        thread.is_dm = plain::take_bool(&mut map, "is_dm");
        thread.metadata = plain::take_map(&mut map, "metadata");
        Ok(thread)
    }
}
