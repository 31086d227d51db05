//! Configuration module for Quiz Rush.
//!
//! Supports JSON configuration files, environment variable overrides, and
//! compiled-in defaults.
//!
//! # Module Structure
//!
//! - [`types`]: Root `Config` struct
//! - [`server`]: Room lifecycle timing (grace periods, reaper, timer tick)
//! - [`protocol`]: Wire-level validation rules (nickname bounds)
//! - [`security`]: CORS, frame size limits, host token secret
//! - [`logging`]: Logging configuration
//! - [`loader`]: Configuration loading and merging
//! - [`validation`]: Startup sanity checks on the loaded configuration
//! - [`defaults`]: Default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod protocol;
pub mod security;
pub mod server;
pub mod types;
pub mod validation;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use protocol::ProtocolConfig;

pub use security::SecurityConfig;

pub use server::ServerConfig;

pub use types::Config;

pub use validation::validate_config;
