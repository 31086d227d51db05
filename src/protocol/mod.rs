// Protocol module: message types, validation, and wire-level value objects

pub mod error_codes;
pub mod messages;
pub mod nickname;
pub mod pin;
pub mod types;

pub use error_codes::{ErrorKind, GameError};

pub use messages::{
    AnswerReceivedPayload, AnsweringStartedPayload, ClientMessage, KickReason, LeaveReason,
    PlayerReconnectedPayload, QuestionIntroPayload, RoomCreatedPayload, RoomJoinedPayload,
    RoomSnapshotPayload, ServerMessage, ShowResultsPayload, SpectatorJoinedPayload,
    SpectatorReconnectedPayload,
};

pub use nickname::Nickname;

pub use pin::{Pin, PIN_LENGTH};

pub use types::{
    LeaderboardEntry, ParticipantRole, PlayerId, PlayerPublicInfo, RoomId, SocketId, SpectatorId,
    SpectatorPublicInfo, TimerSyncPayload, UserId,
};
