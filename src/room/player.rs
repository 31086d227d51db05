use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::protocol::{
    Nickname, PlayerId, PlayerPublicInfo, SocketId, SpectatorId, SpectatorPublicInfo,
};

/// A player row owned by its room. Carries no back-pointer; use-cases reach
/// the room first and the player through it.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub normalized_nickname: String,
    /// None while disconnected.
    pub socket_id: Option<SocketId>,
    pub player_token: String,
    pub score: u32,
    pub streak: u32,
    /// Submission time of the most recent correct answer; leaderboard
    /// tie-break (most recent wins).
    pub last_correct_at: Option<DateTime<Utc>>,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn new(nickname: &Nickname, socket_id: SocketId, player_token: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            nickname: nickname.raw().to_string(),
            normalized_nickname: nickname.normalized().to_string(),
            socket_id: Some(socket_id),
            player_token,
            score: 0,
            streak: 0,
            last_correct_at: None,
            disconnected_at: None,
            joined_at: Utc::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.socket_id.is_some()
    }

    pub fn public_info(&self) -> PlayerPublicInfo {
        PlayerPublicInfo {
            id: self.id,
            nickname: self.nickname.clone(),
            score: self.score,
            streak: self.streak,
            connected: self.is_connected(),
        }
    }
}

/// A read-only observer of a room.
#[derive(Debug, Clone)]
pub struct Spectator {
    pub id: SpectatorId,
    pub nickname: String,
    pub socket_id: Option<SocketId>,
    pub spectator_token: String,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

impl Spectator {
    pub fn new(nickname: &Nickname, socket_id: SocketId, spectator_token: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            nickname: nickname.raw().to_string(),
            socket_id: Some(socket_id),
            spectator_token,
            disconnected_at: None,
            joined_at: Utc::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.socket_id.is_some()
    }

    pub fn public_info(&self) -> SpectatorPublicInfo {
        SpectatorPublicInfo {
            id: self.id,
            nickname: self.nickname.clone(),
            connected: self.is_connected(),
        }
    }
}
