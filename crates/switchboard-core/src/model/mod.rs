//! The normalized value model.
//!
//! Every heterogeneous platform payload is coerced into these types before
//! it reaches routing or user handlers. Constructors validate their input
//! and return structured [`ValidationError`](crate::error::ValidationError)s
//! on invariant violations.

pub mod author;
pub mod envelope;
pub mod incoming;
pub mod message;
pub mod plain;
pub mod post;
pub mod response;
pub mod webhook;

pub use author::{Author, ChannelMeta, ChatType, Media, Mention};
pub use envelope::{
    ActionEvent, AssistantContextChangedEvent, AssistantThreadStartedEvent, EventEnvelope,
    EventPayload, EventType, ModalCloseEvent, ModalSubmitEvent, ReactionEvent, SlashCommandEvent,
};
pub use incoming::Incoming;
pub use message::{Message, MessagePage, ThreadPage, ThreadSummary};
pub use plain::{JsonMap, TAG_KEY};
pub use post::{
    FetchOptions, MessagingTarget, PostPayload, Postable, ReplyToMode, SendOptions, TargetKind,
};
pub use response::{
    ChannelInfo, EphemeralMessage, IngressResult, ModalResult, Response, ResponseStatus,
};
pub use webhook::{WebhookRequest, WebhookResponse};

/// Deterministic thread id for an inbound event:
/// `"adapter:room"` without a sub-thread, `"adapter:room:thread"` with one.
pub fn thread_id_for(adapter_name: &str, incoming: &Incoming) -> String {
    match &incoming.external_thread_id {
        Some(thread) => format!(
            "{adapter_name}:{room}:{thread}",
            room = incoming.external_room_id
        ),
        None => format!("{adapter_name}:{room}", room = incoming.external_room_id),
    }
}

/// Deterministic channel id: always `"adapter:room"`.
pub fn channel_id_for(adapter_name: &str, external_room_id: &str) -> String {
    format!("{adapter_name}:{external_room_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_id_formation() {
        let mut incoming = Incoming::new("room");
        assert_eq!(thread_id_for("tg", &incoming), "tg:room");
        incoming.external_thread_id = Some("42".into());
        assert_eq!(thread_id_for("tg", &incoming), "tg:room:42");
        assert_eq!(channel_id_for("tg", "room"), "tg:room");
    }
}
