use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a room (internal; clients address rooms by PIN).
pub type RoomId = Uuid;
/// Identifier of a player within the server.
pub type PlayerId = Uuid;
/// Identifier of a spectator within the server.
pub type SpectatorId = Uuid;
/// Identifier of a live socket connection.
pub type SocketId = Uuid;
/// Identifier of an authenticated host user (issued by the external auth service).
pub type UserId = Uuid;

/// Role a socket plays inside a room. A socket holds at most one role in at
/// most one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Host,
    Player,
    Spectator,
}

/// Player roster entry as shown to clients. Never carries tokens or socket
/// ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerPublicInfo {
    pub id: PlayerId,
    pub nickname: String,
    pub score: u32,
    pub streak: u32,
    pub connected: bool,
}

/// Spectator roster entry as shown to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectatorPublicInfo {
    pub id: SpectatorId,
    pub nickname: String,
    pub connected: bool,
}

/// One row of a leaderboard or podium.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub player_id: PlayerId,
    pub nickname: String,
    pub score: u32,
    pub streak: u32,
}

/// Absolute-time timer snapshot. `server_time` and `end_time` are Unix
/// milliseconds; clients correct for clock skew by offsetting `end_time` with
/// `local_now - server_time`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimerSyncPayload {
    pub server_time: i64,
    pub end_time: i64,
    pub remaining_ms: i64,
    /// Whole seconds remaining, rounded up for display.
    pub remaining: u32,
}
