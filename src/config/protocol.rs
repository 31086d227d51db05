//! Protocol settings: nickname rules.

use super::defaults::{default_max_nickname_length, default_min_nickname_length};
use serde::{Deserialize, Serialize};

/// Wire-level validation rules.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProtocolConfig {
    /// Minimum nickname length after trimming
    #[serde(default = "default_min_nickname_length")]
    pub min_nickname_length: usize,
    /// Maximum nickname length after trimming
    #[serde(default = "default_max_nickname_length")]
    pub max_nickname_length: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            min_nickname_length: default_min_nickname_length(),
            max_nickname_length: default_max_nickname_length(),
        }
    }
}
