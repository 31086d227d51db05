use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error_codes::ErrorKind;
use super::pin::Pin;
use super::types::{
    LeaderboardEntry, PlayerId, PlayerPublicInfo, SpectatorId, SpectatorPublicInfo,
    TimerSyncPayload, UserId,
};
use crate::room::RoomPhase;

/// Message types sent from client to server.
///
/// Every frame is a JSON object `{type, data}`. Payload shapes are fixed;
/// unknown fields are rejected at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case", deny_unknown_fields)]
pub enum ClientMessage {
    /// Bind an authenticated host identity to this socket. Token issuance is
    /// external; the server only verifies it.
    Authenticate { access_token: String },
    /// Create a room for a quiz (host only)
    CreateRoom { quiz_id: Uuid },
    /// Look up the caller's live room, if any (host only)
    GetMyRoom {},
    /// Close the caller's live room without knowing its PIN (host only)
    ForceCloseRoom {},
    /// Join a room as a player
    JoinRoom { pin: String, nickname: String },
    /// Join a room as a read-only spectator
    JoinAsSpectator { pin: String, nickname: String },
    /// Leave a room voluntarily
    LeaveRoom { pin: String },
    /// Leave spectator mode
    LeaveSpectator { pin: String },
    /// Close a room (host only)
    CloseRoom { pin: String },
    /// Resume a host session after a disconnect
    ReconnectHost { pin: String, host_token: String },
    /// Resume a player session after a disconnect
    ReconnectPlayer { pin: String, player_token: String },
    /// Resume a spectator session after a disconnect
    ReconnectSpectator { pin: String, spectator_token: String },
    /// Leave the lobby and show the first question (host only)
    StartGame { pin: String },
    /// Open the answering window for the current question (host only)
    StartAnswering { pin: String },
    /// Close the answering window early (host only)
    EndAnswering { pin: String },
    /// Advance from results to the leaderboard (host only)
    ShowLeaderboard { pin: String },
    /// Advance to the next question or the podium (host only)
    NextQuestion { pin: String },
    /// Submit an answer for the current question (players only)
    SubmitAnswer { pin: String, answer_index: usize },
    /// Remove a player from the room (host only)
    KickPlayer { pin: String, player_id: PlayerId },
    /// Remove a player and ban their nickname (host only)
    BanPlayer { pin: String, player_id: PlayerId },
    /// Lift a nickname ban (host only)
    UnbanNickname { pin: String, nickname: String },
    /// Fetch the current player roster
    GetPlayers { pin: String },
    /// Fetch the current spectator roster
    GetSpectators { pin: String },
    /// Fetch the banned nickname list
    GetBannedNicknames { pin: String },
    /// Pause the game between rounds (host only)
    PauseGame { pin: String },
    /// Resume a paused game (host only)
    ResumeGame { pin: String },
    /// Request an authoritative timer snapshot
    RequestTimerSync { pin: String },
    /// Fetch results for the current interstitial state
    GetResults { pin: String },
}

/// Why a player left the room, carried on `player_left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    Left,
    Disconnected,
    GraceExpired,
}

/// Why a player was removed by the host, carried on `you_were_kicked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KickReason {
    Kicked,
    Banned,
}

/// Payload for the `room_created` message (and `get_my_room` replies).
/// Boxed in `ServerMessage` to keep the enum small.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomCreatedPayload {
    pub pin: Pin,
    pub host_token: String,
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub total_questions: usize,
    pub state: RoomPhase,
}

/// Payload for the `room_joined` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomJoinedPayload {
    pub pin: Pin,
    pub player_id: PlayerId,
    pub player_token: String,
    pub nickname: String,
    pub quiz_title: String,
    pub total_questions: usize,
    pub state: RoomPhase,
    pub players: Vec<PlayerPublicInfo>,
}

/// Payload for the `room_joined_spectator` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectatorJoinedPayload {
    pub pin: Pin,
    pub spectator_id: SpectatorId,
    pub spectator_token: String,
    pub nickname: String,
    pub quiz_title: String,
    pub state: RoomPhase,
    pub players: Vec<PlayerPublicInfo>,
    pub spectators: Vec<SpectatorPublicInfo>,
}

/// Question presentation, broadcast on `question_intro`. Never carries the
/// correct answer index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionIntroPayload {
    pub question_index: usize,
    pub total_questions: usize,
    pub text: String,
    pub options: Vec<String>,
    pub points: u32,
    pub time_limit_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Broadcast when the answering window opens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnsweringStartedPayload {
    pub question_index: usize,
    pub time_limit: u32,
    pub option_count: usize,
}

/// Unicast scoring feedback for a submitted answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnswerReceivedPayload {
    pub is_correct: bool,
    pub score: u32,
    pub streak_bonus: u32,
    pub total_score: u32,
    pub streak: u32,
}

/// Round outcome shown to the host and spectators. `distribution[i]` counts
/// submissions for option `i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowResultsPayload {
    pub question_index: usize,
    pub correct_answer_index: usize,
    pub distribution: Vec<u32>,
    pub correct_count: usize,
    pub total_players: usize,
}

/// Full room state delivered to a reconnecting participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshotPayload {
    pub pin: Pin,
    pub state: RoomPhase,
    pub current_question_index: usize,
    pub total_questions: usize,
    pub quiz_title: String,
    pub players: Vec<PlayerPublicInfo>,
    pub spectators: Vec<SpectatorPublicInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerSyncPayload>,
}

/// Payload for the `player_reconnected` message. The token is the rotated
/// replacement; the presented one is no longer resolvable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerReconnectedPayload {
    pub snapshot: RoomSnapshotPayload,
    pub player_id: PlayerId,
    pub player_token: String,
    pub score: u32,
    pub streak: u32,
}

/// Payload for the `spectator_reconnected` message (token rotated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectatorReconnectedPayload {
    pub snapshot: RoomSnapshotPayload,
    pub spectator_id: SpectatorId,
    pub spectator_token: String,
}

/// Message types sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Host identity bound to this socket
    Authenticated { user_id: UserId },
    /// Room created; also the reply to `get_my_room`
    RoomCreated(Box<RoomCreatedPayload>),
    /// Caller joined as a player
    RoomJoined(Box<RoomJoinedPayload>),
    /// Caller joined as a spectator
    RoomJoinedSpectator(Box<SpectatorJoinedPayload>),
    /// Another player joined the room
    PlayerJoined { player: PlayerPublicInfo },
    /// A player left, disconnected, or was reaped
    PlayerLeft {
        player_id: PlayerId,
        nickname: String,
        reason: LeaveReason,
    },
    /// A player was removed by the host
    PlayerKicked { player_id: PlayerId, nickname: String },
    /// A player was removed and their nickname banned
    PlayerBanned { player_id: PlayerId, nickname: String },
    /// Unicast to the removed player
    YouWereKicked { reason: KickReason },
    /// A disconnected player reconnected (room-wide notice)
    PlayerReturned { player: PlayerPublicInfo },
    /// Another spectator joined
    SpectatorJoined { spectator: SpectatorPublicInfo },
    /// A spectator left or was reaped
    SpectatorLeft {
        spectator_id: SpectatorId,
        nickname: String,
    },
    /// A disconnected spectator reconnected (room-wide notice)
    SpectatorReturned { spectator: SpectatorPublicInfo },
    /// Reply to `get_players`
    Players { players: Vec<PlayerPublicInfo> },
    /// Reply to `get_spectators`
    Spectators { spectators: Vec<SpectatorPublicInfo> },
    /// Reply to `get_banned_nicknames`
    BannedNicknames { nicknames: Vec<String> },
    /// A nickname ban was lifted
    NicknameUnbanned { nickname: String },
    /// The game left the lobby
    GameStarted { total_questions: usize },
    /// A question is being presented
    QuestionIntro(Box<QuestionIntroPayload>),
    /// The answering window opened
    AnsweringStarted(AnsweringStartedPayload),
    /// Unicast scoring feedback to the submitting player
    AnswerReceived(AnswerReceivedPayload),
    /// Live answer progress
    AnswerCountUpdated {
        answered_count: usize,
        total_players: usize,
    },
    /// Every connected player has answered
    AllPlayersAnswered,
    /// Round outcome for host and spectators
    ShowResults(ShowResultsPayload),
    /// Round outcome for players (correct index only)
    RoundEnded {
        question_index: usize,
        correct_answer_index: usize,
    },
    /// Interstitial leaderboard
    Leaderboard { entries: Vec<LeaderboardEntry> },
    /// Terminal state reached; top three players
    GameOver { podium: Vec<LeaderboardEntry> },
    /// Full final standings
    FinalResults { leaderboard: Vec<LeaderboardEntry> },
    /// Countdown started
    TimerStarted {
        duration: u32,
        duration_ms: i64,
        server_time: i64,
        end_time: i64,
    },
    /// Best-effort 1 Hz countdown tick
    TimerTick(TimerSyncPayload),
    /// Countdown reached zero
    TimeExpired { server_time: i64 },
    /// Reply to `request_timer_sync`
    TimerSync(TimerSyncPayload),
    /// Game paused between rounds
    GamePaused { paused_at: i64 },
    /// Game resumed
    GameResumed {
        state: RoomPhase,
        pause_duration_ms: i64,
    },
    /// Room is gone; no further events will follow
    RoomClosed { reason: String },
    /// Host lost its socket; room continues within the grace window
    HostDisconnected { grace_period_ms: i64 },
    /// Host grace window is nearly exhausted
    HostDisconnectedWarning { remaining_ms: i64 },
    /// Host reconnected (room-wide notice)
    HostReturned,
    /// Host reconnected (unicast state snapshot)
    HostReconnected(Box<RoomSnapshotPayload>),
    /// Player reconnected (unicast, with rotated token)
    PlayerReconnected(Box<PlayerReconnectedPayload>),
    /// Spectator reconnected (unicast, with rotated token)
    SpectatorReconnected(Box<SpectatorReconnectedPayload>),
    /// Targeted failure report; never broadcast
    Error { error: ErrorKind, message: String },
}
