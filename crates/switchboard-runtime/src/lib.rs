//! # switchboard-runtime
//!
//! Wiring for switchboard deployments: the name-keyed adapter registry
//! (which also backs snapshot revival), YAML configuration with
//! environment expansion, and the `tracing` logging bootstrap.
//!
//! ```rust,ignore
//! use switchboard_runtime::{config, logging, AdapterRegistry};
//!
//! let config = config::load_config()?;
//! logging::init_from_config(&config.logging);
//!
//! let mut registry = AdapterRegistry::new();
//! registry.register("telegram", telegram_adapter)?;
//!
//! let chat = switchboard_framework::Chat::new()
//!     .with_user_name(config.chat.user_name.unwrap_or_default())
//!     .with_adapter("telegram", registry.get("telegram").unwrap());
//! ```

pub mod config;
pub mod logging;
pub mod registry;
pub mod session;

pub use config::{ConfigError, ConfigLoader, ConfigResult, SwitchboardConfig};
pub use registry::AdapterRegistry;
pub use session::chat_from_config;
