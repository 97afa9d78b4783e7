//! Outbound facade handles.
//!
//! [`Thread`] targets a room (plus optional sub-thread), [`ChannelRef`]
//! targets a room as a whole, and [`SentMessage`] carries the follow-up
//! lifecycle of a delivered message.

pub mod channel;
pub mod sent;
pub mod thread;

use serde_json::Value;

use crate::model::Author;

pub use channel::ChannelRef;
pub use sent::SentMessage;
pub use thread::Thread;

/// Anything `mention_user` accepts: an author, a scalar id, or a map
/// carrying `user_id`. Unresolvable targets render as `"@unknown"`.
#[derive(Debug, Clone)]
pub enum MentionTarget {
    Id(String),
    Author(Author),
    Map(Value),
}

impl MentionTarget {
    pub fn user_id(&self) -> Option<String> {
        match self {
            Self::Id(id) if !id.is_empty() => Some(id.clone()),
            Self::Id(_) => None,
            Self::Author(author) if !author.user_id.is_empty() => Some(author.user_id.clone()),
            Self::Author(_) => None,
            Self::Map(value) => value
                .get("user_id")
                .and_then(crate::model::plain::stringify_scalar),
        }
    }
}

impl From<&Author> for MentionTarget {
    fn from(author: &Author) -> Self {
        Self::Author(author.clone())
    }
}

impl From<&str> for MentionTarget {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for MentionTarget {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<i64> for MentionTarget {
    fn from(id: i64) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<&Value> for MentionTarget {
    fn from(value: &Value) -> Self {
        Self::Map(value.clone())
    }
}
