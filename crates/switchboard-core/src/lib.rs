//! # switchboard-core
//!
//! The foundational types and interfaces of the switchboard chat SDK.
//!
//! This crate is transport-agnostic: it never holds a connection. It
//! defines the normalized value model, the adapter contract with its
//! capability layer, the event normalizer, and the outbound handles.
//! Routing state and the webhook pipeline live in
//! `switchboard-framework`.
//!
//! ## Core Components
//!
//! ### Model
//! - **Incoming / Message**: wire-shaped vs. stored normalized events
//! - **EventEnvelope**: tagged union carrier for every inbound event
//! - **WebhookRequest / WebhookResponse**: HTTP-shaped pipeline envelopes
//!
//! ### Adapters
//! - **Adapter**: platform contract — three required operations plus
//!   optional capability groups exposed as accessor methods
//! - **CapabilityMatrix**: per-operation `Native | Fallback | Unsupported`
//!   declaration with reflection-free synthesis and validation
//! - **wrappers**: checked invocation that normalizes raw adapter output
//!   and applies the documented fallbacks
//!
//! ### Handles
//! - **Thread / ChannelRef**: outbound addressing facades with cursor
//!   paginated history and lazy streams
//! - **SentMessage**: edit / delete / react follow-ups

pub mod adapter;
pub mod error;
pub mod handles;
pub mod model;
pub mod normalize;

pub use adapter::{
    validate_capabilities, Adapter, AdapterLookup, BoxedAdapter, Capability, CapabilityMatrix,
    CapabilityViolation, ListenerSpec, ParsedEvent, Support, UnboundAdapter, WebhookOutcome,
};
pub use error::{Error, FieldError, Result, ValidationError};
pub use handles::{ChannelRef, MentionTarget, SentMessage, Thread};
pub use model::{
    Author, ChannelInfo, ChannelMeta, ChatType, EphemeralMessage, EventEnvelope, EventPayload,
    EventType, FetchOptions, Incoming, IngressResult, JsonMap, Media, Mention, Message,
    MessagePage, MessagingTarget, ModalResult, PostPayload, Postable, ReplyToMode, Response,
    ResponseStatus, SendOptions, TargetKind, ThreadPage, ThreadSummary, WebhookRequest,
    WebhookResponse,
};
