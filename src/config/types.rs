//! Root configuration types.

use super::defaults::default_port;
use super::logging::LoggingConfig;
use super::protocol::ProtocolConfig;
use super::security::SecurityConfig;
use super::server::ServerConfig;
use serde::{Deserialize, Serialize};

/// Root configuration struct for Quiz Rush.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Optional path to a JSON file of quizzes loaded at startup.
    #[serde(default)]
    pub quizzes_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            server: ServerConfig::default(),
            protocol: ProtocolConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
            quizzes_path: None,
        }
    }
}
