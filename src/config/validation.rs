//! Configuration validation functions.

use super::Config;
use std::path::Path;

/// Validate the loaded configuration before the server starts.
///
/// Catches configurations that would deserialize fine but leave the server
/// unusable: a zero port, inverted nickname bounds, zero timing windows.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    if config.port == 0 {
        anyhow::bail!("port must be non-zero");
    }

    let server = &config.server;
    if server.player_grace_period_ms == 0 {
        anyhow::bail!("server.player_grace_period_ms must be positive");
    }
    if server.host_grace_period_ms == 0 {
        anyhow::bail!("server.host_grace_period_ms must be positive");
    }
    if server.join_lock_ttl_ms == 0 {
        anyhow::bail!("server.join_lock_ttl_ms must be positive");
    }
    if server.pin_max_attempts == 0 {
        anyhow::bail!("server.pin_max_attempts must be at least 1");
    }
    if server.reaper_interval_ms == 0 {
        anyhow::bail!(
            "server.reaper_interval_ms must be positive (the grace-period reaper cannot \
             run on a zero interval)"
        );
    }
    if server.timer_tick_ms == 0 {
        anyhow::bail!("server.timer_tick_ms must be positive");
    }
    if server.host_grace_warning_ms > server.host_grace_period_ms {
        // Not fatal: the warning just fires on the first sweep after the
        // host disconnects.
        eprintln!(
            "WARNING: server.host_grace_warning_ms ({}) exceeds server.host_grace_period_ms \
             ({}); the disconnect warning will fire immediately",
            server.host_grace_warning_ms, server.host_grace_period_ms
        );
    }

    let protocol = &config.protocol;
    if protocol.min_nickname_length == 0 {
        anyhow::bail!("protocol.min_nickname_length must be at least 1");
    }
    if protocol.min_nickname_length > protocol.max_nickname_length {
        anyhow::bail!(
            "protocol.min_nickname_length ({}) must not exceed protocol.max_nickname_length ({})",
            protocol.min_nickname_length,
            protocol.max_nickname_length
        );
    }

    let security = &config.security;
    if security.host_token_secret.trim().is_empty() {
        anyhow::bail!("security.host_token_secret must not be empty");
    }
    if security.max_message_size < 1024 {
        anyhow::bail!(
            "security.max_message_size must be at least 1024 bytes (got {})",
            security.max_message_size
        );
    }

    if let Some(path) = &config.quizzes_path {
        if !Path::new(path).exists() {
            anyhow::bail!("quizzes_path file not found at {path}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = Config::default();
        config.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn inverted_nickname_bounds_are_rejected() {
        let mut config = Config::default();
        config.protocol.min_nickname_length = 20;
        config.protocol.max_nickname_length = 15;
        let error = validate_config(&config).unwrap_err();
        assert!(error.to_string().contains("min_nickname_length"));

        let mut config = Config::default();
        config.protocol.min_nickname_length = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_timing_windows_are_rejected() {
        for mutate in [
            (|c: &mut Config| c.server.player_grace_period_ms = 0) as fn(&mut Config),
            |c| c.server.host_grace_period_ms = 0,
            |c| c.server.join_lock_ttl_ms = 0,
            |c| c.server.reaper_interval_ms = 0,
            |c| c.server.timer_tick_ms = 0,
        ] {
            let mut config = Config::default();
            mutate(&mut config);
            assert!(validate_config(&config).is_err());
        }
    }

    #[test]
    fn zero_pin_attempts_are_rejected() {
        let mut config = Config::default();
        config.server.pin_max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        let mut config = Config::default();
        config.security.host_token_secret = "   ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn tiny_message_limit_is_rejected() {
        let mut config = Config::default();
        config.security.max_message_size = 512;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn missing_quiz_file_is_rejected() {
        let mut config = Config::default();
        config.quizzes_path = Some("/nonexistent/quizzes.json".to_string());
        assert!(validate_config(&config).is_err());
    }
}
