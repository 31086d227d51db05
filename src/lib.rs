#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines
)]

//! # Quiz Rush Server
//!
//! A lightweight, in-memory WebSocket server for real-time multiplayer quiz
//! games. A host creates a room tied to a quiz, players join by a 6-digit PIN,
//! answer timed questions, and receive scored feedback plus live leaderboards.
//!
//! All authoritative state lives in this process; clients are thin presenters
//! of server-pushed events.

/// Outbound fan-out: socket registry and per-PIN broadcast groups
pub mod broadcast;

/// Server configuration and environment variables
pub mod config;

/// Per-(PIN, nickname) in-flight join reservations
pub mod join_lock;

/// Structured logging configuration
pub mod logging;

/// WebSocket message protocol definitions
pub mod protocol;

/// Quiz repository interface and in-memory implementation
pub mod quiz;

/// Room entity: state machine, participants, scoring
pub mod room;

/// Token generation and host access-token verification
pub mod security;

/// Main server orchestration (use-cases and dispatch)
pub mod server;

/// In-memory room repository with cross-room indexes
pub mod store;

/// Per-room authoritative countdown timers
pub mod timer;

/// WebSocket connection handling
pub mod websocket;
