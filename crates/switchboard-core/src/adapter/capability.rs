//! Per-adapter capability declaration, defaulting, and validation.
//!
//! Every optional operation of the adapter contract maps to one
//! [`Capability`]. Support is discovered from the adapter type itself
//! (the group accessors of [`Adapter`](super::Adapter) return
//! `Option<&dyn …>`), then overlaid with whatever the adapter declares
//! explicitly — declared entries always win.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Adapter;
use crate::model::plain;

/// Optional operations of the adapter contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Initialize,
    Shutdown,
    EditMessage,
    DeleteMessage,
    StartTyping,
    FetchMetadata,
    FetchThread,
    FetchMessage,
    AddReaction,
    RemoveReaction,
    PostEphemeral,
    PostChannelMessage,
    Stream,
    OpenModal,
    FetchMessages,
    FetchChannelMessages,
    ListThreads,
    OpenDm,
    HandleWebhook,
    VerifyWebhook,
    ParseEvent,
    FormatWebhookResponse,
    ListenerChildSpecs,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 23] = [
        Self::Initialize,
        Self::Shutdown,
        Self::EditMessage,
        Self::DeleteMessage,
        Self::StartTyping,
        Self::FetchMetadata,
        Self::FetchThread,
        Self::FetchMessage,
        Self::AddReaction,
        Self::RemoveReaction,
        Self::PostEphemeral,
        Self::PostChannelMessage,
        Self::Stream,
        Self::OpenModal,
        Self::FetchMessages,
        Self::FetchChannelMessages,
        Self::ListThreads,
        Self::OpenDm,
        Self::HandleWebhook,
        Self::VerifyWebhook,
        Self::ParseEvent,
        Self::FormatWebhookResponse,
        Self::ListenerChildSpecs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Shutdown => "shutdown",
            Self::EditMessage => "edit_message",
            Self::DeleteMessage => "delete_message",
            Self::StartTyping => "start_typing",
            Self::FetchMetadata => "fetch_metadata",
            Self::FetchThread => "fetch_thread",
            Self::FetchMessage => "fetch_message",
            Self::AddReaction => "add_reaction",
            Self::RemoveReaction => "remove_reaction",
            Self::PostEphemeral => "post_ephemeral",
            Self::PostChannelMessage => "post_channel_message",
            Self::Stream => "stream",
            Self::OpenModal => "open_modal",
            Self::FetchMessages => "fetch_messages",
            Self::FetchChannelMessages => "fetch_channel_messages",
            Self::ListThreads => "list_threads",
            Self::OpenDm => "open_dm",
            Self::HandleWebhook => "handle_webhook",
            Self::VerifyWebhook => "verify_webhook",
            Self::ParseEvent => "parse_event",
            Self::FormatWebhookResponse => "format_webhook_response",
            Self::ListenerChildSpecs => "listener_child_specs",
        }
    }

    /// Support level assumed when the adapter neither implements nor
    /// declares the operation.
    ///
    /// Operations with a documented core fallback default to `Fallback`;
    /// the rest default to `Unsupported`.
    pub fn default_support(&self) -> Support {
        match self {
            Self::Initialize
            | Self::Shutdown
            | Self::PostEphemeral
            | Self::PostChannelMessage
            | Self::Stream
            | Self::HandleWebhook
            | Self::VerifyWebhook
            | Self::ParseEvent
            | Self::FormatWebhookResponse
            | Self::FetchMetadata
            | Self::FetchThread
            | Self::FetchMessage => Support::Fallback,
            _ => Support::Unsupported,
        }
    }

    /// Whether the adapter exports the backing callback for this
    /// operation, read off the group accessors.
    pub fn implemented_by(&self, adapter: &dyn Adapter) -> bool {
        match self {
            Self::Initialize | Self::Shutdown => adapter.lifecycle().is_some(),
            Self::EditMessage | Self::DeleteMessage => adapter.edits().is_some(),
            Self::StartTyping => adapter.typing().is_some(),
            Self::FetchMetadata | Self::FetchThread | Self::FetchMessage => {
                adapter.lookup().is_some()
            }
            Self::AddReaction | Self::RemoveReaction => adapter.reactions().is_some(),
            Self::PostEphemeral => adapter.ephemeral().is_some(),
            Self::PostChannelMessage => adapter.channel_post().is_some(),
            Self::Stream => adapter.streaming().is_some(),
            Self::OpenModal => adapter.modals().is_some(),
            Self::FetchMessages => adapter.history().is_some(),
            Self::FetchChannelMessages | Self::ListThreads => adapter.channel_history().is_some(),
            Self::OpenDm => adapter.direct().is_some(),
            Self::HandleWebhook => adapter.webhook_handler().is_some(),
            Self::VerifyWebhook => adapter.webhook_verifier().is_some(),
            Self::ParseEvent => adapter.event_parser().is_some(),
            Self::FormatWebhookResponse => adapter.response_formatter().is_some(),
            Self::ListenerChildSpecs => adapter.listener().is_some(),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Support status of one operation on one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Support {
    /// The adapter implements the operation itself.
    Native,
    /// The core emulates the operation via a documented fallback.
    Fallback,
    /// The operation is unavailable; wrappers return `Err(Unsupported)`.
    Unsupported,
}

/// Per-adapter mapping from operation to support status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilityMatrix(pub BTreeMap<Capability, Support>);

impl CapabilityMatrix {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn declare(mut self, capability: Capability, support: Support) -> Self {
        self.0.insert(capability, support);
        self
    }

    pub fn get(&self, capability: Capability) -> Option<Support> {
        self.0.get(&capability).copied()
    }

    /// Synthesizes the effective matrix for an adapter: `Native` for every
    /// operation whose group accessor is present, the per-operation default
    /// otherwise, with the adapter's declared matrix merged on top.
    pub fn effective(adapter: &dyn Adapter) -> Self {
        let mut matrix = BTreeMap::new();
        for capability in Capability::ALL {
            let support = if capability.implemented_by(adapter) {
                Support::Native
            } else {
                capability.default_support()
            };
            matrix.insert(capability, support);
        }
        if let Some(declared) = adapter.declared_capabilities() {
            for (capability, support) in declared.0 {
                matrix.insert(capability, support);
            }
        }
        Self(matrix)
    }

    /// Support for one operation, resolved through the same defaulting.
    pub fn support(adapter: &dyn Adapter, capability: Capability) -> Support {
        if let Some(declared) = adapter.declared_capabilities() {
            if let Some(support) = declared.get(capability) {
                return support;
            }
        }
        if capability.implemented_by(adapter) {
            Support::Native
        } else {
            capability.default_support()
        }
    }

    /// Serializes with the `capability_matrix` tag.
    pub fn to_map(&self) -> Value {
        plain::tagged(
            "capability_matrix",
            serde_json::to_value(&self.0).unwrap_or(Value::Null),
        )
    }

    pub fn from_map(mut value: Value) -> crate::error::Result<Self> {
        plain::take_tag(&mut value);
        Ok(Self(serde_json::from_value(value)?))
    }
}

/// Why a declared capability failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityViolation {
    /// Declared `Native` without exporting the backing callback.
    MissingCallback,
}

/// Checks that every capability declared `Native` is actually exported.
///
/// Returns the offending pairs; an empty `Ok(())` means the declaration
/// is sound.
pub fn validate_capabilities(
    adapter: &dyn Adapter,
) -> Result<(), Vec<(Capability, CapabilityViolation)>> {
    let Some(declared) = adapter.declared_capabilities() else {
        return Ok(());
    };

    let offenders: Vec<_> = declared
        .0
        .into_iter()
        .filter(|(capability, support)| {
            *support == Support::Native && !capability.implemented_by(adapter)
        })
        .map(|(capability, _)| (capability, CapabilityViolation::MissingCallback))
        .collect();

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(offenders)
    }
}
