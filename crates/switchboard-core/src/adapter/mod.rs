//! The adapter contract.
//!
//! A platform integration implements [`Adapter`]: three required
//! operations plus one accessor per optional capability group. Capability
//! presence is embedded in the type — the core never probes by
//! reflection; an accessor returning `Some` is the declaration that the
//! group's callbacks exist.
//!
//! Data-bearing callbacks return raw [`Value`]s in the platform's own
//! shape; the [`wrappers`] layer is the single point that normalizes them
//! into the typed model and applies the documented fallbacks.

pub mod capability;
pub mod wrappers;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{
    EventEnvelope, Incoming, JsonMap, PostPayload, SendOptions, WebhookRequest, WebhookResponse,
};

pub use capability::{
    validate_capabilities, Capability, CapabilityMatrix, CapabilityViolation, Support,
};

/// A shared adapter trait object.
pub type BoxedAdapter = Arc<dyn Adapter>;

/// Result of an adapter's event parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// A routable typed envelope.
    Envelope(EventEnvelope),
    /// The delivery carries nothing to route (heartbeats, acks, …).
    Noop,
}

/// Outcome handed to an adapter's webhook response formatter.
#[derive(Debug)]
pub enum WebhookOutcome<'a> {
    /// The request was verified and parsed; `noop` marks a parser no-op.
    Accepted { noop: bool },
    /// Verification or parsing rejected the request.
    Rejected(&'a Error),
}

/// Opaque listener child-spec request for supervisor wiring.
///
/// The core does not supervise long-poll or gateway ingestion; adapters
/// describe the workers they need and the embedding application spawns
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerSpec {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub config: Value,
}

/// The core adapter trait every platform integration implements.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Platform tag (e.g. "telegram", "discord").
    fn channel_type(&self) -> &str;

    /// Normalizes a raw platform event into an [`Incoming`].
    async fn transform_incoming(&self, raw: Value) -> Result<Incoming>;

    /// Sends a message to a room. Returns the platform's raw result.
    async fn send_message(&self, room: &str, text: &str, opts: &SendOptions) -> Result<Value>;

    /// Explicit capability declaration, merged over the synthesized
    /// defaults. `None` means "derive everything from the accessors".
    fn declared_capabilities(&self) -> Option<CapabilityMatrix> {
        None
    }

    // ── Optional capability groups ──────────────────────────────────────

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }

    fn edits(&self) -> Option<&dyn MessageEdits> {
        None
    }

    fn typing(&self) -> Option<&dyn Typing> {
        None
    }

    fn reactions(&self) -> Option<&dyn Reactions> {
        None
    }

    fn history(&self) -> Option<&dyn History> {
        None
    }

    fn channel_history(&self) -> Option<&dyn ChannelHistory> {
        None
    }

    fn lookup(&self) -> Option<&dyn Lookup> {
        None
    }

    fn ephemeral(&self) -> Option<&dyn EphemeralPost> {
        None
    }

    fn direct(&self) -> Option<&dyn DirectMessages> {
        None
    }

    fn channel_post(&self) -> Option<&dyn ChannelPost> {
        None
    }

    fn streaming(&self) -> Option<&dyn Streaming> {
        None
    }

    fn modals(&self) -> Option<&dyn Modals> {
        None
    }

    fn webhook_verifier(&self) -> Option<&dyn WebhookVerifier> {
        None
    }

    fn event_parser(&self) -> Option<&dyn EventParser> {
        None
    }

    fn response_formatter(&self) -> Option<&dyn ResponseFormatter> {
        None
    }

    fn webhook_handler(&self) -> Option<&dyn WebhookHandler> {
        None
    }

    fn listener(&self) -> Option<&dyn ListenerSpecs> {
        None
    }
}

/// Adapter startup/teardown hooks.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    async fn initialize(&self, opts: &JsonMap) -> Result<()>;
    async fn shutdown(&self, opts: &JsonMap) -> Result<()>;
}

/// Edit and delete previously sent messages.
#[async_trait]
pub trait MessageEdits: Send + Sync {
    async fn edit_message(
        &self,
        room: &str,
        message_id: &str,
        text: &str,
        opts: &SendOptions,
    ) -> Result<Value>;

    async fn delete_message(&self, room: &str, message_id: &str, opts: &SendOptions)
        -> Result<Value>;
}

/// Typing indicator.
#[async_trait]
pub trait Typing: Send + Sync {
    async fn start_typing(&self, room: &str) -> Result<()>;
}

/// Emoji reactions on messages.
#[async_trait]
pub trait Reactions: Send + Sync {
    async fn add_reaction(
        &self,
        room: &str,
        message_id: &str,
        emoji: &str,
        opts: &SendOptions,
    ) -> Result<Value>;

    async fn remove_reaction(
        &self,
        room: &str,
        message_id: &str,
        emoji: &str,
        opts: &SendOptions,
    ) -> Result<Value>;
}

/// Thread-scoped history paging.
#[async_trait]
pub trait History: Send + Sync {
    async fn fetch_messages(
        &self,
        room: &str,
        thread: Option<&str>,
        opts: &crate::model::FetchOptions,
    ) -> Result<Value>;
}

/// Channel-scoped history paging and thread listing.
#[async_trait]
pub trait ChannelHistory: Send + Sync {
    async fn fetch_channel_messages(
        &self,
        room: &str,
        opts: &crate::model::FetchOptions,
    ) -> Result<Value>;

    async fn list_threads(&self, room: &str, opts: &crate::model::FetchOptions) -> Result<Value>;
}

/// Point lookups for rooms, threads, and single messages.
#[async_trait]
pub trait Lookup: Send + Sync {
    async fn fetch_metadata(&self, room: &str) -> Result<Value>;
    async fn fetch_thread(&self, room: &str, thread: Option<&str>) -> Result<Value>;
    async fn fetch_message(&self, room: &str, message_id: &str) -> Result<Value>;
}

/// Ephemeral (viewer-only) posting.
#[async_trait]
pub trait EphemeralPost: Send + Sync {
    async fn post_ephemeral(
        &self,
        room: &str,
        user: &str,
        payload: &PostPayload,
        opts: &SendOptions,
    ) -> Result<Value>;
}

/// Open direct-message rooms with users.
#[async_trait]
pub trait DirectMessages: Send + Sync {
    /// Returns the raw DM room descriptor (scalar id or map with an id).
    async fn open_dm(&self, user: &str) -> Result<Value>;
}

/// Posting addressed at the channel rather than a thread.
#[async_trait]
pub trait ChannelPost: Send + Sync {
    async fn post_channel_message(
        &self,
        room: &str,
        text: &str,
        opts: &SendOptions,
    ) -> Result<Value>;
}

/// Streamed (chunked) message delivery.
#[async_trait]
pub trait Streaming: Send + Sync {
    async fn stream(
        &self,
        room: &str,
        chunks: BoxStream<'static, String>,
        opts: &SendOptions,
    ) -> Result<Value>;
}

/// Platform modal dialogs.
#[async_trait]
pub trait Modals: Send + Sync {
    async fn open_modal(&self, room: &str, modal: Value, opts: &SendOptions) -> Result<Value>;
}

/// Webhook authenticity verification.
#[async_trait]
pub trait WebhookVerifier: Send + Sync {
    /// `Ok(())` accepts the delivery; verification failures return
    /// [`Error::InvalidWebhookSecret`] or [`Error::InvalidSignature`].
    async fn verify_webhook(&self, request: &WebhookRequest) -> Result<()>;
}

/// Raw delivery → typed envelope parsing.
#[async_trait]
pub trait EventParser: Send + Sync {
    async fn parse_event(&self, request: &WebhookRequest) -> Result<ParsedEvent>;
}

/// Adapter-specific webhook response formatting.
#[async_trait]
pub trait ResponseFormatter: Send + Sync {
    async fn format_webhook_response(
        &self,
        outcome: WebhookOutcome<'_>,
        request: &WebhookRequest,
    ) -> Result<WebhookResponse>;
}

/// Full webhook handling override; the core pipeline is the fallback.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle_webhook(&self, request: &WebhookRequest) -> Result<WebhookResponse>;
}

/// Listener child-spec declaration for long-poll/gateway ingestion.
pub trait ListenerSpecs: Send + Sync {
    fn listener_child_specs(&self) -> Vec<ListenerSpec>;
}

// =============================================================================
// Adapter lookup + revival placeholder
// =============================================================================

/// Name-keyed adapter resolution, implemented by the runtime registry.
pub trait AdapterLookup {
    fn adapter(&self, name: &str) -> Option<BoxedAdapter>;
}

impl AdapterLookup for std::collections::HashMap<String, BoxedAdapter> {
    fn adapter(&self, name: &str) -> Option<BoxedAdapter> {
        self.get(name).cloned()
    }
}

/// Placeholder for a revived adapter name with no registered
/// implementation.
///
/// Revival never fails on unknown names; the placeholder errors on first
/// use instead.
#[derive(Debug, Clone)]
pub struct UnboundAdapter {
    name: String,
}

impl UnboundAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn unbound(&self) -> Error {
        Error::UnboundAdapter {
            name: self.name.clone(),
        }
    }
}

#[async_trait]
impl Adapter for UnboundAdapter {
    fn channel_type(&self) -> &str {
        "unbound"
    }

    async fn transform_incoming(&self, _raw: Value) -> Result<Incoming> {
        Err(self.unbound())
    }

    async fn send_message(&self, _room: &str, _text: &str, _opts: &SendOptions) -> Result<Value> {
        Err(self.unbound())
    }
}
