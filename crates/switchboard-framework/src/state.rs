//! Per-thread and per-channel state helpers.
//!
//! Handles carry no state of their own; everything lives in the chat's
//! `thread_state` / `channel_state` maps, keyed by handle id.

use serde_json::Value;

use switchboard_core::model::JsonMap;

use crate::chat::Chat;

/// How `set_state` applies a value.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    /// Replace the whole state map.
    Replace(JsonMap),
    /// Merge entries over the existing map.
    Merge(JsonMap),
    /// Put a single key.
    Put(String, Value),
}

fn apply(existing: &mut JsonMap, update: StateUpdate) {
    match update {
        StateUpdate::Replace(map) => *existing = map,
        StateUpdate::Merge(map) => existing.extend(map),
        StateUpdate::Put(key, value) => {
            existing.insert(key, value);
        }
    }
}

/// Updates a thread's state map, returning the next chat.
pub fn set_thread_state(mut chat: Chat, thread_id: &str, update: StateUpdate) -> Chat {
    apply(
        chat.thread_state.entry(thread_id.to_string()).or_default(),
        update,
    );
    chat
}

/// Updates a channel's state map, returning the next chat.
pub fn set_channel_state(mut chat: Chat, channel_id: &str, update: StateUpdate) -> Chat {
    apply(
        chat.channel_state.entry(channel_id.to_string()).or_default(),
        update,
    );
    chat
}

pub fn thread_state<'a>(chat: &'a Chat, thread_id: &str) -> Option<&'a JsonMap> {
    chat.thread_state.get(thread_id)
}

pub fn channel_state<'a>(chat: &'a Chat, channel_id: &str) -> Option<&'a JsonMap> {
    chat.channel_state.get(channel_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> JsonMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn put_merge_replace_modes() {
        let chat = Chat::new();
        let chat = set_thread_state(
            chat,
            "tg:room",
            StateUpdate::Put("count".into(), json!(1)),
        );
        assert_eq!(thread_state(&chat, "tg:room").unwrap()["count"], 1);

        let chat = set_thread_state(
            chat,
            "tg:room",
            StateUpdate::Merge(map(&[("topic", json!("x")), ("count", json!(2))])),
        );
        let state = thread_state(&chat, "tg:room").unwrap();
        assert_eq!(state["count"], 2);
        assert_eq!(state["topic"], "x");

        let chat = set_thread_state(
            chat,
            "tg:room",
            StateUpdate::Replace(map(&[("fresh", json!(true))])),
        );
        let state = thread_state(&chat, "tg:room").unwrap();
        assert!(state.get("count").is_none());
        assert_eq!(state["fresh"], true);
    }

    #[test]
    fn thread_and_channel_state_are_independent() {
        let chat = Chat::new();
        let chat = set_thread_state(chat, "tg:r:1", StateUpdate::Put("a".into(), json!(1)));
        let chat = set_channel_state(chat, "tg:r", StateUpdate::Put("b".into(), json!(2)));
        assert!(thread_state(&chat, "tg:r").is_none());
        assert!(channel_state(&chat, "tg:r:1").is_none());
        assert_eq!(channel_state(&chat, "tg:r").unwrap()["b"], 2);
    }
}
