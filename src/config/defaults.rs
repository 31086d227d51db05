//! Default value functions for configuration fields, referenced by serde's
//! `#[serde(default = ...)]` attributes.

use super::logging::LogFormat;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    3560
}

// =============================================================================
// Server Defaults
// =============================================================================

/// Window for player reconnection after a mid-game disconnect.
pub const fn default_player_grace_period_ms() -> u64 {
    120_000 // 2 minutes
}

/// Window for host reconnection; exceeding it closes the room.
pub const fn default_host_grace_period_ms() -> u64 {
    300_000 // 5 minutes
}

/// How close to the host-grace deadline the warning broadcast fires.
pub const fn default_host_grace_warning_ms() -> u64 {
    60_000
}

/// TTL of the per-(PIN, nickname) in-flight join reservation.
pub const fn default_join_lock_ttl_ms() -> u64 {
    10_000
}

/// PIN allocation retry cap. At 50 draws the failure probability stays
/// below 1e-3 even with hundreds of thousands of live rooms.
pub const fn default_pin_max_attempts() -> u32 {
    50
}

/// Grace-period sweep cadence.
pub const fn default_reaper_interval_ms() -> u64 {
    10_000
}

/// Broadcast cadence for countdown ticks.
pub const fn default_timer_tick_ms() -> u64 {
    1_000
}

// =============================================================================
// Protocol Defaults
// =============================================================================

pub const fn default_min_nickname_length() -> usize {
    2
}

pub const fn default_max_nickname_length() -> usize {
    15
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

// =============================================================================
// Security Defaults
// =============================================================================

pub fn default_cors_origins() -> String {
    "http://localhost:3000,http://localhost:5173".to_string()
}

pub const fn default_max_message_size() -> usize {
    16_384 // 16KB; quiz verbs are small
}

/// Development-only signing secret. Deployments must override it; startup
/// logs a loud warning when this value is live.
pub fn default_host_token_secret() -> String {
    "dev-secret-change-me".to_string()
}
