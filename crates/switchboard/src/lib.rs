//! # switchboard
//!
//! The core of a multi-platform chat SDK: a transport-agnostic event
//! router and outbound facade. Heterogeneous platform events (a
//! Telegram-style bot API, a Discord-style gateway, …) are normalized
//! into a single typed event stream, dispatched to registered handlers,
//! and answered through a uniform outbound API that delegates to
//! per-platform adapters behind a capability matrix.
//!
//! ## Architecture
//!
//! ```text
//! raw payload → pipeline (verify → parse) → envelope → router
//!                    │                                   │
//!                    └── WebhookResponse ◀── format ◀────┤
//!                                                        ▼
//!                                           dispatch (dedup → handlers)
//!
//! user code → Thread / ChannelRef → wrappers → Adapter → platform
//! ```
//!
//! - **switchboard-core**: normalized model, adapter contract +
//!   capability layer, outbound handles
//! - **switchboard-framework**: chat state, handler dispatch, router,
//!   webhook pipeline, snapshot serialization
//! - **switchboard-runtime**: adapter registry, configuration, logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchboard::prelude::*;
//!
//! let chat = Chat::new()
//!     .with_user_name("jido")
//!     .with_adapter("telegram", telegram_adapter)
//!     .on_mention(ThreadHandler::simple(|thread, incoming| async move {
//!         let _ = thread.post("hi there!", Default::default()).await;
//!     }));
//!
//! let (chat, _envelope, response) =
//!     switchboard::framework::handle_request(chat, "telegram", payload).await;
//! assert_eq!(response.status, 200);
//! ```

pub use switchboard_core as core;
pub use switchboard_framework as framework;
pub use switchboard_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use switchboard::prelude::*;
/// ```
pub mod prelude {
    // Root state and registration.
    pub use switchboard_framework::{Chat, EventClass, EventHandler, StateUpdate, ThreadHandler};

    // Pipeline and router entry points.
    pub use switchboard_framework::{handle_request, route_event};

    // Outbound handles.
    pub use switchboard_core::{ChannelRef, SentMessage, Thread};

    // Model types handlers touch most.
    pub use switchboard_core::{
        EventEnvelope, EventPayload, EventType, FetchOptions, Incoming, Message, Postable,
        Response, SendOptions, WebhookRequest, WebhookResponse,
    };

    // Adapter contract, for implementing integrations.
    pub use switchboard_core::{
        Adapter, BoxedAdapter, Capability, CapabilityMatrix, ParsedEvent, Support,
    };

    // Runtime wiring.
    pub use switchboard_runtime::AdapterRegistry;
}
