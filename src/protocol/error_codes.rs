use serde::{Deserialize, Serialize};
use std::fmt;

use crate::room::RoomPhase;

/// Client-visible error kinds carried by the `error{error, message}` event.
///
/// Internals (storage failures, poisoned state) are never surfaced; they map
/// to [`ErrorKind::InternalError`] with a generic message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    Forbidden,
    Conflict,
    IllegalTransition,
    GraceExpired,
    CapacityExceeded,
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ValidationError => "ValidationError",
            Self::NotFound => "NotFound",
            Self::Forbidden => "Forbidden",
            Self::Conflict => "Conflict",
            Self::IllegalTransition => "IllegalTransition",
            Self::GraceExpired => "GraceExpired",
            Self::CapacityExceeded => "CapacityExceeded",
            Self::InternalError => "InternalError",
        };
        f.write_str(name)
    }
}

/// Domain error for every use-case in the room core.
///
/// Each variant knows its client-visible [`ErrorKind`]; the dispatcher emits a
/// targeted `error` event from it and never broadcasts failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GameError {
    #[error("invalid PIN: {0}")]
    InvalidPin(String),
    #[error("invalid nickname: {0}")]
    InvalidNickname(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("room not found")]
    RoomNotFound,
    #[error("player not found in room")]
    PlayerNotFound,
    #[error("nickname is not banned in this room")]
    NicknameNotBanned,
    #[error("spectator not found in room")]
    SpectatorNotFound,
    #[error("quiz not found")]
    QuizNotFound,
    #[error("reconnection token not recognized")]
    TokenNotFound,
    #[error("no active timer for room")]
    TimerNotFound,

    #[error("authentication required")]
    NotAuthenticated,
    #[error("only the host may perform this action")]
    NotHost,
    #[error("socket is not a participant of this room")]
    NotInRoom,

    #[error("nickname is already taken in this room")]
    NicknameTaken,
    #[error("nickname is banned from this room")]
    NicknameBanned,
    #[error("another join with this nickname is already in progress")]
    JoinInProgress,
    #[error("socket is already bound to a room")]
    AlreadyInRoom,
    #[error("answer already submitted for this question")]
    AlreadyAnswered,
    #[error("host already has a live room")]
    HostRoomExists,

    #[error("action '{action}' is not legal in state {state}")]
    InvalidState {
        action: &'static str,
        state: RoomPhase,
    },

    #[error("reconnection grace period has expired")]
    GraceExpired,

    #[error("no free PIN available, server at capacity")]
    PinSpaceExhausted,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// The wire-level kind reported to clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPin(_) | Self::InvalidNickname(_) | Self::InvalidPayload(_) => {
                ErrorKind::ValidationError
            }
            Self::RoomNotFound
            | Self::PlayerNotFound
            | Self::NicknameNotBanned
            | Self::SpectatorNotFound
            | Self::QuizNotFound
            | Self::TokenNotFound
            | Self::TimerNotFound => ErrorKind::NotFound,
            Self::NotAuthenticated | Self::NotHost | Self::NotInRoom => ErrorKind::Forbidden,
            Self::NicknameTaken
            | Self::NicknameBanned
            | Self::JoinInProgress
            | Self::AlreadyInRoom
            | Self::AlreadyAnswered
            | Self::HostRoomExists => ErrorKind::Conflict,
            Self::InvalidState { .. } => ErrorKind::IllegalTransition,
            Self::GraceExpired => ErrorKind::GraceExpired,
            Self::PinSpaceExhausted => ErrorKind::CapacityExceeded,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Message safe to put on the wire. Internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal server error occurred".to_string(),
            other => other.to_string(),
        }
    }
}
