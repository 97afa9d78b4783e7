//! # switchboard-framework
//!
//! Routing and state for the switchboard chat SDK: the [`Chat`] root
//! value, handler registration and dispatch, the envelope router, the
//! webhook pipeline, and snapshot serialization.
//!
//! ## Dispatch model
//!
//! Processing is single-task per chat value: routing, dispatch, and
//! state updates run sequentially, and every entry point returns the
//! next `Chat`. Within one incoming message the routing policy is
//! mutually exclusive — subscribed thread, else mention, else regex
//! message handlers — and handlers of a class always fire in
//! registration order.
//!
//! ```rust,ignore
//! use switchboard_framework::prelude::*;
//!
//! let chat = Chat::new()
//!     .with_user_name("jido")
//!     .with_adapter("telegram", telegram_adapter)
//!     .on_mention(ThreadHandler::simple(|thread, incoming| async move {
//!         let _ = thread.post("hello!", Default::default()).await;
//!     }));
//!
//! let (chat, envelope, response) =
//!     pipeline::handle_request(chat, "telegram", raw_payload).await;
//! ```

pub mod chat;
pub mod dispatch;
pub mod handler;
pub mod pipeline;
pub mod router;
pub mod serial;
pub mod state;

pub use chat::{Chat, DedupeKey, DEFAULT_DEDUPE_LIMIT};
pub use handler::{EventClass, EventHandler, HandlerTable, MessageHandler, ThreadHandler};
pub use pipeline::{handle_request, WebhookInput};
pub use router::route_event;
pub use serial::{chat_from_map, chat_to_map, revive, Revived};
pub use state::{channel_state, set_channel_state, set_thread_state, thread_state, StateUpdate};
