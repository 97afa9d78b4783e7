//! The channel handle: channel-scoped outbound operations.

use std::collections::{HashSet, VecDeque};

use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;

use super::sent::SentMessage;
use crate::adapter::{wrappers, AdapterLookup, BoxedAdapter, UnboundAdapter};
use crate::error::Result;
use crate::model::{
    plain, ChannelInfo, FetchOptions, JsonMap, Message, MessagePage, Postable, SendOptions,
    ThreadPage, ThreadSummary,
};

/// Outbound handle addressing a room as a whole.
///
/// Mirrors [`Thread`](super::Thread) for channel-scoped operations:
/// channel posting (with the send-message fallback), channel history, and
/// thread listings.
#[derive(Clone)]
pub struct ChannelRef {
    pub id: String,
    pub adapter_name: String,
    pub adapter: BoxedAdapter,
    pub external_id: String,
    pub metadata: JsonMap,
}

impl std::fmt::Debug for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRef")
            .field("id", &self.id)
            .field("adapter_name", &self.adapter_name)
            .field("external_id", &self.external_id)
            .finish()
    }
}

impl ChannelRef {
    pub fn new(
        adapter_name: impl Into<String>,
        adapter: BoxedAdapter,
        external_id: impl Into<String>,
    ) -> Self {
        let adapter_name = adapter_name.into();
        let external_id = external_id.into();
        Self {
            id: format!("{adapter_name}:{external_id}"),
            adapter_name,
            adapter,
            external_id,
            metadata: JsonMap::new(),
        }
    }

    /// Posts to the channel surface; adapters without a channel-post
    /// callback deliver through the plain send path.
    pub async fn post(&self, input: impl Into<Postable>, opts: SendOptions) -> Result<SentMessage> {
        let payload = input.into().to_payload();
        let formatted = payload.format().map(str::to_string);
        let response = wrappers::post_channel_message(
            self.adapter.as_ref(),
            &self.external_id,
            &payload.text,
            &opts,
        )
        .await?;
        Ok(SentMessage {
            id: wrappers::message_id_or_new(&response),
            thread_id: self.id.clone(),
            adapter_name: self.adapter_name.clone(),
            adapter: self.adapter.clone(),
            external_room_id: self.external_id.clone(),
            text: payload.text,
            formatted,
            raw: response.raw.clone(),
            attachments: Vec::new(),
            metadata: JsonMap::new(),
            response,
            default_opts: opts,
        })
    }

    pub async fn fetch_metadata(&self) -> Result<ChannelInfo> {
        wrappers::fetch_metadata(self.adapter.as_ref(), &self.adapter_name, &self.external_id).await
    }

    // ── History ─────────────────────────────────────────────────────────

    pub async fn messages(&self, opts: &FetchOptions) -> Result<MessagePage> {
        wrappers::fetch_channel_messages(
            self.adapter.as_ref(),
            &self.adapter_name,
            &self.external_id,
            opts,
        )
        .await
    }

    /// Follows `next_cursor` until exhausted, deduplicating cursors seen.
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

    pub async fn list_threads(&self, opts: &FetchOptions) -> Result<ThreadPage> {
        wrappers::list_threads(self.adapter.as_ref(), &self.external_id, opts).await
    }

    /// Lazy thread listing, one summary at a time; errors end the stream
    /// silently.
    pub fn threads_stream(&self, opts: FetchOptions) -> BoxStream<'static, ThreadSummary> {
        struct PageWalk {
            adapter: BoxedAdapter,
            room: String,
            opts: FetchOptions,
            cursor: Option<String>,
            buffer: VecDeque<ThreadSummary>,
            seen: HashSet<String>,
            done: bool,
        }

        let walk = PageWalk {
            adapter: self.adapter.clone(),
            room: self.external_id.clone(),
            cursor: opts.cursor.clone(),
            seen: opts.cursor.iter().cloned().collect(),
            opts,
            buffer: VecDeque::new(),
            done: false,
        };

        futures::stream::unfold(walk, |mut walk| async move {
            loop {
                if let Some(summary) = walk.buffer.pop_front() {
                    return Some((summary, walk));
                }
                if walk.done {
                    return None;
                }
                let fetched = wrappers::list_threads(
                    walk.adapter.as_ref(),
                    &walk.room,
                    &walk.opts.with_cursor(walk.cursor.clone()),
                )
                .await;
                match fetched {
                    Ok(page) => {
                        walk.buffer.extend(page.threads);
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

    // ── Serialization ───────────────────────────────────────────────────

    /// Serializes with the `channel` tag; the adapter is encoded by name.
    pub fn to_map(&self) -> Value {
        let mut map = JsonMap::new();
        map.insert("id".into(), Value::String(self.id.clone()));
        map.insert(
            "adapter_name".into(),
            Value::String(self.adapter_name.clone()),
        );
        map.insert("external_id".into(), Value::String(self.external_id.clone()));
        map.insert("metadata".into(), Value::Object(self.metadata.clone()));
        plain::tagged("channel", Value::Object(map))
    }

    /// Rebuilds a handle from plain data, resolving the adapter by name.
    pub fn from_map(value: Value, adapters: &dyn AdapterLookup) -> Result<Self> {
        let mut map = plain::require_map("channel", value)?;
        map.remove(plain::TAG_KEY);
        let adapter_name = plain::take_string(&mut map, "adapter_name").unwrap_or_default();
        let adapter = adapters
            .adapter(&adapter_name)
            .unwrap_or_else(|| std::sync::Arc::new(UnboundAdapter::new(adapter_name.clone())));
        let mut channel = ChannelRef::new(
            adapter_name,
            adapter,
            plain::take_string(&mut map, "external_id").unwrap_or_default(),
        );
        channel.metadata = plain::take_map(&mut map, "metadata");
        Ok(channel)
    }
}
