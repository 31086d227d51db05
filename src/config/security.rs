//! Security and transport settings.

use super::defaults::{
    default_cors_origins, default_host_token_secret, default_max_message_size,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Comma-separated allowed CORS origins, or "*" for permissive
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    /// Maximum inbound WebSocket frame size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Shared secret for verifying host access tokens. The default is for
    /// development only.
    #[serde(default = "default_host_token_secret")]
    pub host_token_secret: String,
}

impl SecurityConfig {
    /// True when the development signing secret is still in place.
    pub fn uses_dev_secret(&self) -> bool {
        self.host_token_secret == default_host_token_secret()
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            max_message_size: default_max_message_size(),
            host_token_secret: default_host_token_secret(),
        }
    }
}
