//! Server behavior configuration: grace periods, sweep cadence, lock TTLs.

use super::defaults::{
    default_host_grace_period_ms, default_host_grace_warning_ms, default_join_lock_ttl_ms,
    default_pin_max_attempts, default_player_grace_period_ms, default_reaper_interval_ms,
    default_timer_tick_ms,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Room lifecycle and timing configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Window for player reconnection after a mid-game disconnect (ms)
    #[serde(default = "default_player_grace_period_ms")]
    pub player_grace_period_ms: u64,
    /// Window for host reconnection; exceeded => room closes (ms)
    #[serde(default = "default_host_grace_period_ms")]
    pub host_grace_period_ms: u64,
    /// Remaining host grace below which the warning broadcast fires (ms)
    #[serde(default = "default_host_grace_warning_ms")]
    pub host_grace_warning_ms: u64,
    /// Per-(PIN, nickname) in-flight join reservation TTL (ms)
    #[serde(default = "default_join_lock_ttl_ms")]
    pub join_lock_ttl_ms: u64,
    /// PIN allocation retry cap
    #[serde(default = "default_pin_max_attempts")]
    pub pin_max_attempts: u32,
    /// Grace-period sweep cadence (ms)
    #[serde(default = "default_reaper_interval_ms")]
    pub reaper_interval_ms: u64,
    /// Countdown tick broadcast cadence (ms)
    #[serde(default = "default_timer_tick_ms")]
    pub timer_tick_ms: u64,
}

impl ServerConfig {
    pub fn player_grace(&self) -> Duration {
        Duration::from_millis(self.player_grace_period_ms)
    }

    pub fn host_grace(&self) -> Duration {
        Duration::from_millis(self.host_grace_period_ms)
    }

    pub fn host_grace_warning(&self) -> Duration {
        Duration::from_millis(self.host_grace_warning_ms)
    }

    pub fn join_lock_ttl(&self) -> Duration {
        Duration::from_millis(self.join_lock_ttl_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }

    pub fn timer_tick(&self) -> Duration {
        Duration::from_millis(self.timer_tick_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            player_grace_period_ms: default_player_grace_period_ms(),
            host_grace_period_ms: default_host_grace_period_ms(),
            host_grace_warning_ms: default_host_grace_warning_ms(),
            join_lock_ttl_ms: default_join_lock_ttl_ms(),
            pin_max_attempts: default_pin_max_attempts(),
            reaper_interval_ms: default_reaper_interval_ms(),
            timer_tick_ms: default_timer_tick_ms(),
        }
    }
}
