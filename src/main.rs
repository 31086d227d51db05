#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use quiz_rush_server::config;
use quiz_rush_server::logging;
use quiz_rush_server::quiz::InMemoryQuizRepository;
use quiz_rush_server::security::HmacTokenVerifier;
use quiz_rush_server::server::QuizServer;
use quiz_rush_server::websocket;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

/// Quiz Rush -- in-memory WebSocket server for real-time multiplayer quizzes
#[derive(Parser, Debug)]
#[command(name = "quiz-rush-server")]
#[command(about = "A lightweight, in-memory WebSocket server for real-time multiplayer quiz games")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = Arc::new(config::load());

    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // config::load() already runs validate_config() but only logs failures
    // to stderr. Capture the result here to:
    // 1. Provide a proper exit code for --validate-config mode
    // 2. Refuse to start on an unusable config
    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Player grace: {} ms", cfg.server.player_grace_period_ms);
                println!("  Host grace: {} ms", cfg.server.host_grace_period_ms);
                println!("  Reaper interval: {} ms", cfg.server.reaper_interval_ms);
                println!("  Timer tick: {} ms", cfg.server.timer_tick_ms);
                println!(
                    "  Host token secret: {}",
                    if cfg.security.uses_dev_secret() {
                        "DEVELOPMENT DEFAULT (override in production)"
                    } else {
                        "configured"
                    }
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    // In normal operation, propagate validation errors
    validation_result?;

    logging::init_with_config(&cfg.logging);

    if cfg.security.uses_dev_secret() {
        tracing::warn!(
            "Host token secret is the development default; set security.host_token_secret before \
             exposing this server"
        );
    }

    let quizzes = Arc::new(InMemoryQuizRepository::new());
    if let Some(path) = &cfg.quizzes_path {
        match quizzes.load_from_file(Path::new(path)) {
            Ok(count) => tracing::info!(count, path = %path, "Quizzes loaded"),
            Err(error) => tracing::error!(%error, path = %path, "Failed to load quizzes"),
        }
    } else {
        tracing::info!("No quizzes_path configured; rooms can only be created for quizzes inserted at runtime");
    }

    let host_auth = Arc::new(HmacTokenVerifier::new(&cfg.security.host_token_secret));
    let server = QuizServer::new(&cfg, quizzes, host_auth);
    let background_tasks = server.spawn_background_tasks();

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let router = websocket::create_router(&cfg.security.cors_origins).with_state(Arc::clone(&server));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cfg.security.cors_origins,
        "Quiz Rush server started - WebSocket: /ws, health: /healthz"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    })
    .await?;

    // Guarantee no timer callback fires after the transport is gone.
    server.timers().stop_all();
    for task in background_tasks {
        task.abort();
    }

    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["quiz-rush-server"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_flags() {
        let cli = Cli::try_parse_from(["quiz-rush-server", "--validate-config"]).unwrap();
        assert!(cli.validate_config);
        let cli = Cli::try_parse_from(["quiz-rush-server", "-c"]).unwrap();
        assert!(cli.validate_config);
    }

    #[test]
    fn test_cli_print_config() {
        let cli = Cli::try_parse_from(["quiz-rush-server", "--print-config"]).unwrap();
        assert!(cli.print_config);
    }

    #[test]
    fn test_cli_validate_and_print_conflict() {
        let result =
            Cli::try_parse_from(["quiz-rush-server", "--validate-config", "--print-config"]);
        assert!(result.is_err());
    }
}
