//! Building a chat session from configuration and a registry.

use serde_json::json;

use switchboard_framework::Chat;

use crate::config::SwitchboardConfig;
use crate::registry::AdapterRegistry;

/// Assembles a [`Chat`] from configuration, wiring in every registered
/// adapter.
///
/// Handlers are not configuration — register them on the returned value.
pub fn chat_from_config(config: &SwitchboardConfig, registry: &AdapterRegistry) -> Chat {
    let mut chat = Chat::new();

    if let Some(user_name) = &config.chat.user_name {
        chat = chat.with_user_name(user_name.clone());
    }
    if let Some(limit) = config.chat.dedupe_limit {
        chat.metadata.insert("dedupe_limit".to_string(), json!(limit));
    }
    for thread_id in &config.chat.subscriptions {
        chat = chat.subscribe(thread_id.clone());
    }
    for name in registry.names() {
        if let Some(adapter) = registry.get(name) {
            chat = chat.with_adapter(name, adapter);
        }
    }

    chat
}
