//! # Gateway Config
//!
//! Configuration management for the chat model gateway.
//!
//! Configuration is layered:
//! 1. Built-in defaults
//! 2. An optional YAML / TOML / JSON file named by `GATEWAY_CONFIG`
//! 3. Environment overrides (`GATEWAY_*`, `<PROVIDER>_API_KEY`, `<PROVIDER>_BASE_URL`)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod loader;

pub use config::{GatewayConfig, LoggingSettings, ProviderSettings, ServerSettings};
pub use loader::{load_config, load_config_from_path, ConfigError};
