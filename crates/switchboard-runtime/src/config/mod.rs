//! Configuration loading and schema.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, ConfigLoader};
pub use schema::{ChatConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SwitchboardConfig};
