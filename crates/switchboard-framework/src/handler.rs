//! Handler shapes and the per-class handler table.
//!
//! Handlers come in two shapes per class (the two arities of the
//! registration API):
//!
//! - *simple* — `fn(Thread, Incoming)` / `fn(EventEnvelope)`: observes the
//!   event, cannot change chat state
//! - *stateful* — additionally receives the current [`Chat`] and returns
//!   the next one; an `Err` keeps the current state and dispatch moves on
//!   to the next handler

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use switchboard_core::error::Result;
use switchboard_core::model::{EventEnvelope, Incoming};
use switchboard_core::Thread;

use crate::chat::Chat;

/// Boxed handler future.
pub type HandlerFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type SimpleThreadFn = dyn Fn(Thread, Incoming) -> HandlerFuture<()> + Send + Sync;
type StatefulThreadFn = dyn Fn(Chat, Thread, Incoming) -> HandlerFuture<Result<Chat>> + Send + Sync;
type SimpleEventFn = dyn Fn(EventEnvelope) -> HandlerFuture<()> + Send + Sync;
type StatefulEventFn = dyn Fn(Chat, EventEnvelope) -> HandlerFuture<Result<Chat>> + Send + Sync;

/// A handler for message-shaped dispatch (mention / subscribed / regex).
#[derive(Clone)]
pub enum ThreadHandler {
    Simple(Arc<SimpleThreadFn>),
    Stateful(Arc<StatefulThreadFn>),
}

impl ThreadHandler {
    /// Wraps a `fn(Thread, Incoming)` observer.
    pub fn simple<F, Fut>(f: F) -> Self
    where
        F: Fn(Thread, Incoming) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::Simple(Arc::new(move |thread, incoming| Box::pin(f(thread, incoming))))
    }

    /// Wraps a `fn(Chat, Thread, Incoming) -> Result<Chat>` state updater.
    pub fn stateful<F, Fut>(f: F) -> Self
    where
        F: Fn(Chat, Thread, Incoming) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Chat>> + Send + 'static,
    {
        Self::Stateful(Arc::new(move |chat, thread, incoming| {
            Box::pin(f(chat, thread, incoming))
        }))
    }

    /// Runs the handler, threading chat state through stateful shapes.
    pub(crate) async fn invoke(&self, chat: Chat, thread: &Thread, incoming: &Incoming) -> Chat {
        match self {
            Self::Simple(f) => {
                f(thread.clone(), incoming.clone()).await;
                chat
            }
            Self::Stateful(f) => {
                let current = chat.clone();
                match f(chat, thread.clone(), incoming.clone()).await {
                    Ok(next) => next,
                    Err(err) => {
                        warn!(error = %err, "stateful handler failed, keeping current chat");
                        current
                    }
                }
            }
        }
    }
}

/// A handler for non-message event classes.
#[derive(Clone)]
pub enum EventHandler {
    Simple(Arc<SimpleEventFn>),
    Stateful(Arc<StatefulEventFn>),
}

impl EventHandler {
    /// Wraps a `fn(EventEnvelope)` observer.
    pub fn simple<F, Fut>(f: F) -> Self
    where
        F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::Simple(Arc::new(move |envelope| Box::pin(f(envelope))))
    }

    /// Wraps a `fn(Chat, EventEnvelope) -> Result<Chat>` state updater.
    pub fn stateful<F, Fut>(f: F) -> Self
    where
        F: Fn(Chat, EventEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Chat>> + Send + 'static,
    {
        Self::Stateful(Arc::new(move |chat, envelope| Box::pin(f(chat, envelope))))
    }

    pub(crate) async fn invoke(&self, chat: Chat, envelope: &EventEnvelope) -> Chat {
        match self {
            Self::Simple(f) => {
                f(envelope.clone()).await;
                chat
            }
            Self::Stateful(f) => {
                let current = chat.clone();
                match f(chat, envelope.clone()).await {
                    Ok(next) => next,
                    Err(err) => {
                        warn!(error = %err, "stateful event handler failed, keeping current chat");
                        current
                    }
                }
            }
        }
    }
}

/// A regex-gated message handler. The pattern is compiled once at
/// registration; dispatch only runs `is_match`.
#[derive(Clone)]
pub struct MessageHandler {
    pub pattern: Regex,
    pub handler: ThreadHandler,
}

/// Handler classes for non-message events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    Reaction,
    Action,
    ModalSubmit,
    ModalClose,
    SlashCommand,
    AssistantThreadStarted,
    AssistantContextChanged,
}

impl EventClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reaction => "reaction",
            Self::Action => "action",
            Self::ModalSubmit => "modal_submit",
            Self::ModalClose => "modal_close",
            Self::SlashCommand => "slash_command",
            Self::AssistantThreadStarted => "assistant_thread_started",
            Self::AssistantContextChanged => "assistant_context_changed",
        }
    }
}

/// Ordered handler lists, one per class. Registration appends; dispatch
/// order is registration order.
#[derive(Clone, Default)]
pub struct HandlerTable {
    pub mention: Vec<ThreadHandler>,
    pub subscribed: Vec<ThreadHandler>,
    pub message: Vec<MessageHandler>,
    pub reaction: Vec<EventHandler>,
    pub action: Vec<EventHandler>,
    pub modal_submit: Vec<EventHandler>,
    pub modal_close: Vec<EventHandler>,
    pub slash_command: Vec<EventHandler>,
    pub assistant_thread_started: Vec<EventHandler>,
    pub assistant_context_changed: Vec<EventHandler>,
}

impl HandlerTable {
    pub fn event_class(&self, class: EventClass) -> &[EventHandler] {
        match class {
            EventClass::Reaction => &self.reaction,
            EventClass::Action => &self.action,
            EventClass::ModalSubmit => &self.modal_submit,
            EventClass::ModalClose => &self.modal_close,
            EventClass::SlashCommand => &self.slash_command,
            EventClass::AssistantThreadStarted => &self.assistant_thread_started,
            EventClass::AssistantContextChanged => &self.assistant_context_changed,
        }
    }

    pub(crate) fn event_class_mut(&mut self, class: EventClass) -> &mut Vec<EventHandler> {
        match class {
            EventClass::Reaction => &mut self.reaction,
            EventClass::Action => &mut self.action,
            EventClass::ModalSubmit => &mut self.modal_submit,
            EventClass::ModalClose => &mut self.modal_close,
            EventClass::SlashCommand => &mut self.slash_command,
            EventClass::AssistantThreadStarted => &mut self.assistant_thread_started,
            EventClass::AssistantContextChanged => &mut self.assistant_context_changed,
        }
    }

    /// Per-class handler counts, the serialized trace of the table.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        counts.insert("mention", self.mention.len());
        counts.insert("subscribed", self.subscribed.len());
        counts.insert("message", self.message.len());
        counts.insert("reaction", self.reaction.len());
        counts.insert("action", self.action.len());
        counts.insert("modal_submit", self.modal_submit.len());
        counts.insert("modal_close", self.modal_close.len());
        counts.insert("slash_command", self.slash_command.len());
        counts.insert(
            "assistant_thread_started",
            self.assistant_thread_started.len(),
        );
        counts.insert(
            "assistant_context_changed",
            self.assistant_context_changed.len(),
        );
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.counts().values().all(|&n| n == 0)
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.counts()).finish()
    }
}
