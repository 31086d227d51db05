use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::phase::RoomPhase;
use super::player::{Player, Spectator};
use super::scoring;
use crate::protocol::{
    AnswerReceivedPayload, GameError, LeaderboardEntry, Pin, PlayerId, PlayerPublicInfo, RoomId,
    SocketId, SpectatorId, SpectatorPublicInfo, UserId,
};
use crate::quiz::{Question, Quiz};

/// An answer recorded during the current round.
#[derive(Debug, Clone, Copy)]
pub struct RecordedAnswer {
    pub answer_index: usize,
    pub submitted_at: DateTime<Utc>,
}

/// Outcome of advancing past the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    NextQuestion(usize),
    Podium,
}

/// Aggregate view of a finished round, computed when answering ends.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub question_index: usize,
    pub correct_answer_index: usize,
    pub distribution: Vec<u32>,
    pub correct_count: usize,
    pub total_players: usize,
}

/// The authoritative room aggregate.
///
/// Every field is private; mutation goes through the operations below, each of
/// which preserves the room invariants (PIN/nickname uniqueness, state-machine
/// confinement, answer-set discipline). The owning store serializes access
/// with one lock per room.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    pin: Pin,
    host_id: UserId,
    host_token: String,
    host_socket_id: Option<SocketId>,
    host_disconnected_at: Option<DateTime<Utc>>,
    host_warning_sent: bool,
    quiz: Arc<Quiz>,
    state: RoomPhase,
    pre_paused_state: Option<RoomPhase>,
    current_question_index: usize,
    players: HashMap<PlayerId, Player>,
    spectators: HashMap<SpectatorId, Spectator>,
    banned_nicknames: BTreeSet<String>,
    question_started_at: Option<DateTime<Utc>>,
    answers_this_round: HashMap<PlayerId, RecordedAnswer>,
    correct_answer_index: Option<usize>,
    paused_at: Option<DateTime<Utc>>,
    accumulated_pause_ms: i64,
    created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(
        pin: Pin,
        host_id: UserId,
        host_token: String,
        host_socket_id: SocketId,
        quiz: Arc<Quiz>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pin,
            host_id,
            host_token,
            host_socket_id: Some(host_socket_id),
            host_disconnected_at: None,
            host_warning_sent: false,
            quiz,
            state: RoomPhase::WaitingPlayers,
            pre_paused_state: None,
            current_question_index: 0,
            players: HashMap::new(),
            spectators: HashMap::new(),
            banned_nicknames: BTreeSet::new(),
            question_started_at: None,
            answers_this_round: HashMap::new(),
            correct_answer_index: None,
            paused_at: None,
            accumulated_pause_ms: 0,
            created_at: Utc::now(),
        }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn pin(&self) -> &Pin {
        &self.pin
    }

    pub fn host_id(&self) -> UserId {
        self.host_id
    }

    pub fn host_token(&self) -> &str {
        &self.host_token
    }

    pub fn host_socket_id(&self) -> Option<SocketId> {
        self.host_socket_id
    }

    pub fn host_disconnected_at(&self) -> Option<DateTime<Utc>> {
        self.host_disconnected_at
    }

    pub fn host_warning_sent(&self) -> bool {
        self.host_warning_sent
    }

    pub fn state(&self) -> RoomPhase {
        self.state
    }

    pub fn quiz(&self) -> &Arc<Quiz> {
        &self.quiz
    }

    pub fn quiz_title(&self) -> &str {
        &self.quiz.title
    }

    pub fn total_questions(&self) -> usize {
        self.quiz.total_questions()
    }

    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.question(self.current_question_index)
    }

    pub fn correct_answer_index(&self) -> Option<usize> {
        self.correct_answer_index
    }

    pub fn question_started_at(&self) -> Option<DateTime<Utc>> {
        self.question_started_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn spectators(&self) -> impl Iterator<Item = &Spectator> {
        self.spectators.values()
    }

    pub fn spectator(&self, spectator_id: &SpectatorId) -> Option<&Spectator> {
        self.spectators.get(spectator_id)
    }

    pub fn total_players(&self) -> usize {
        self.players.len()
    }

    pub fn banned_nicknames(&self) -> Vec<String> {
        self.banned_nicknames.iter().cloned().collect()
    }

    pub fn is_banned(&self, normalized_nickname: &str) -> bool {
        self.banned_nicknames.contains(normalized_nickname)
    }

    pub fn roster(&self) -> Vec<PlayerPublicInfo> {
        let mut roster: Vec<_> = self.players.values().map(Player::public_info).collect();
        roster.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        roster
    }

    pub fn spectator_roster(&self) -> Vec<SpectatorPublicInfo> {
        let mut roster: Vec<_> = self.spectators.values().map(Spectator::public_info).collect();
        roster.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        roster
    }

    pub fn player_sockets(&self) -> Vec<SocketId> {
        self.players.values().filter_map(|p| p.socket_id).collect()
    }

    pub fn spectator_sockets(&self) -> Vec<SocketId> {
        self.spectators.values().filter_map(|s| s.socket_id).collect()
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Admit a player. Legal only in the lobby; nickname must be neither
    /// taken (case-insensitively) nor banned.
    pub fn add_player(&mut self, player: Player) -> Result<&Player, GameError> {
        if self.state != RoomPhase::WaitingPlayers {
            return Err(GameError::InvalidState {
                action: "join_room",
                state: self.state,
            });
        }
        if self.banned_nicknames.contains(&player.normalized_nickname) {
            return Err(GameError::NicknameBanned);
        }
        if self
            .players
            .values()
            .any(|existing| existing.normalized_nickname == player.normalized_nickname)
        {
            return Err(GameError::NicknameTaken);
        }

        let id = player.id;
        self.players.insert(id, player);
        Ok(&self.players[&id])
    }

    /// Idempotent removal by player id.
    pub fn remove_player(&mut self, player_id: &PlayerId) -> Option<Player> {
        self.answers_this_round.remove(player_id);
        self.players.remove(player_id)
    }

    /// Idempotent removal by socket id.
    pub fn remove_player_by_socket(&mut self, socket_id: SocketId) -> Option<Player> {
        let id = self
            .players
            .values()
            .find(|p| p.socket_id == Some(socket_id))
            .map(|p| p.id)?;
        self.remove_player(&id)
    }

    pub fn player_by_socket(&self, socket_id: SocketId) -> Option<&Player> {
        self.players.values().find(|p| p.socket_id == Some(socket_id))
    }

    /// Mark a player disconnected, keeping the row for the grace window.
    pub fn set_player_disconnected(
        &mut self,
        socket_id: SocketId,
        now: DateTime<Utc>,
    ) -> Option<&Player> {
        let id = self
            .players
            .values()
            .find(|p| p.socket_id == Some(socket_id))
            .map(|p| p.id)?;
        if let Some(player) = self.players.get_mut(&id) {
            player.socket_id = None;
            player.disconnected_at = Some(now);
        }
        self.players.get(&id)
    }

    /// Resume a disconnected player session. The presented token must resolve
    /// and the grace window must still be open; on success the socket is
    /// rebound and the token rotated to `new_token`.
    pub fn reconnect_player(
        &mut self,
        presented_token: &str,
        new_socket_id: SocketId,
        grace: Duration,
        new_token: String,
        now: DateTime<Utc>,
    ) -> Result<&Player, GameError> {
        let id = self
            .players
            .values()
            .find(|p| p.player_token == presented_token)
            .map(|p| p.id)
            .ok_or(GameError::TokenNotFound)?;

        if let Some(disconnected_at) = self.players[&id].disconnected_at {
            let elapsed = now.signed_duration_since(disconnected_at);
            if elapsed.num_milliseconds() > grace.as_millis() as i64 {
                return Err(GameError::GraceExpired);
            }
        }

        if let Some(player) = self.players.get_mut(&id) {
            player.socket_id = Some(new_socket_id);
            player.disconnected_at = None;
            player.player_token = new_token;
        }
        Ok(&self.players[&id])
    }

    // ------------------------------------------------------------------
    // Host lifecycle
    // ------------------------------------------------------------------

    pub fn set_host_disconnected(&mut self, now: DateTime<Utc>) {
        self.host_socket_id = None;
        self.host_disconnected_at = Some(now);
        self.host_warning_sent = false;
    }

    pub fn mark_host_warning_sent(&mut self) {
        self.host_warning_sent = true;
    }

    /// Resume the host session. The host token is not rotated: host identity
    /// is also bound to the authenticated user.
    pub fn reconnect_host(
        &mut self,
        presented_token: &str,
        new_socket_id: SocketId,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        if presented_token != self.host_token {
            return Err(GameError::TokenNotFound);
        }
        if let Some(disconnected_at) = self.host_disconnected_at {
            let elapsed = now.signed_duration_since(disconnected_at);
            if elapsed.num_milliseconds() > grace.as_millis() as i64 {
                return Err(GameError::GraceExpired);
            }
        }
        self.host_socket_id = Some(new_socket_id);
        self.host_disconnected_at = None;
        self.host_warning_sent = false;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Spectators
    // ------------------------------------------------------------------

    /// Spectators may join in any non-terminal state.
    pub fn add_spectator(&mut self, spectator: Spectator) -> Result<&Spectator, GameError> {
        if self.state.is_terminal() {
            return Err(GameError::InvalidState {
                action: "join_as_spectator",
                state: self.state,
            });
        }
        let id = spectator.id;
        self.spectators.insert(id, spectator);
        Ok(&self.spectators[&id])
    }

    pub fn remove_spectator(&mut self, spectator_id: &SpectatorId) -> Option<Spectator> {
        self.spectators.remove(spectator_id)
    }

    pub fn remove_spectator_by_socket(&mut self, socket_id: SocketId) -> Option<Spectator> {
        let id = self
            .spectators
            .values()
            .find(|s| s.socket_id == Some(socket_id))
            .map(|s| s.id)?;
        self.spectators.remove(&id)
    }

    pub fn set_spectator_disconnected(
        &mut self,
        socket_id: SocketId,
        now: DateTime<Utc>,
    ) -> Option<&Spectator> {
        let id = self
            .spectators
            .values()
            .find(|s| s.socket_id == Some(socket_id))
            .map(|s| s.id)?;
        if let Some(spectator) = self.spectators.get_mut(&id) {
            spectator.socket_id = None;
            spectator.disconnected_at = Some(now);
        }
        self.spectators.get(&id)
    }

    pub fn reconnect_spectator(
        &mut self,
        presented_token: &str,
        new_socket_id: SocketId,
        grace: Duration,
        new_token: String,
        now: DateTime<Utc>,
    ) -> Result<&Spectator, GameError> {
        let id = self
            .spectators
            .values()
            .find(|s| s.spectator_token == presented_token)
            .map(|s| s.id)
            .ok_or(GameError::TokenNotFound)?;

        if let Some(disconnected_at) = self.spectators[&id].disconnected_at {
            let elapsed = now.signed_duration_since(disconnected_at);
            if elapsed.num_milliseconds() > grace.as_millis() as i64 {
                return Err(GameError::GraceExpired);
            }
        }

        if let Some(spectator) = self.spectators.get_mut(&id) {
            spectator.socket_id = Some(new_socket_id);
            spectator.disconnected_at = None;
            spectator.spectator_token = new_token;
        }
        Ok(&self.spectators[&id])
    }

    // ------------------------------------------------------------------
    // Bans
    // ------------------------------------------------------------------

    /// Ban a normalized nickname. The matching player, if present, must be
    /// removed by the caller so invariant 3 holds on lock release.
    pub fn ban_nickname(&mut self, normalized_nickname: String) {
        self.banned_nicknames.insert(normalized_nickname);
    }

    pub fn unban_nickname(&mut self, normalized_nickname: &str) -> bool {
        self.banned_nicknames.remove(normalized_nickname)
    }

    // ------------------------------------------------------------------
    // Answers & scoring
    // ------------------------------------------------------------------

    /// Pause-adjusted elapsed time since the answering window opened, in ms.
    pub fn elapsed_in_round(&self, now: DateTime<Utc>) -> i64 {
        let Some(started_at) = self.question_started_at else {
            return 0;
        };
        now.signed_duration_since(started_at).num_milliseconds() - self.accumulated_pause_ms
    }

    pub fn answered_count(&self) -> usize {
        self.answers_this_round.len()
    }

    pub fn recorded_answer(&self, player_id: &PlayerId) -> Option<&RecordedAnswer> {
        self.answers_this_round.get(player_id)
    }

    /// True once every currently connected player has an answer on record.
    pub fn all_connected_answered(&self) -> bool {
        let connected: Vec<_> = self
            .players
            .values()
            .filter(|p| p.is_connected())
            .map(|p| p.id)
            .collect();
        !connected.is_empty()
            && connected
                .iter()
                .all(|id| self.answers_this_round.contains_key(id))
    }

    /// Record and score a submission in one step, so score and streak are
    /// applied exactly once per player per question.
    pub fn submit_answer(
        &mut self,
        player_id: PlayerId,
        answer_index: usize,
        now: DateTime<Utc>,
    ) -> Result<AnswerReceivedPayload, GameError> {
        if self.state != RoomPhase::AnsweringPhase {
            return Err(GameError::InvalidState {
                action: "submit_answer",
                state: self.state,
            });
        }
        let question = self
            .current_question()
            .ok_or_else(|| GameError::Internal("question index out of range".to_string()))?;
        let option_count = question.options.len();
        let correct_index = question.correct_answer_index;
        let points = question.points;
        let limit_ms = question.time_limit_ms();

        if answer_index >= option_count {
            return Err(GameError::InvalidPayload(format!(
                "answer index {answer_index} out of range for {option_count} options"
            )));
        }
        if !self.players.contains_key(&player_id) {
            return Err(GameError::PlayerNotFound);
        }
        if self.answers_this_round.contains_key(&player_id) {
            return Err(GameError::AlreadyAnswered);
        }

        let elapsed = self.elapsed_in_round(now);
        self.answers_this_round.insert(
            player_id,
            RecordedAnswer {
                answer_index,
                submitted_at: now,
            },
        );

        let is_correct = answer_index == correct_index;
        let base = if is_correct {
            scoring::base_score(points, elapsed, limit_ms)
        } else {
            0
        };

        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(GameError::PlayerNotFound)?;
        let bonus = if is_correct {
            player.streak += 1;
            player.last_correct_at = Some(now);
            scoring::streak_bonus(player.streak)
        } else {
            player.streak = 0;
            0
        };
        player.score += base + bonus;

        Ok(AnswerReceivedPayload {
            is_correct,
            score: base,
            streak_bonus: bonus,
            total_score: player.score,
            streak: player.streak,
        })
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    /// `WaitingPlayers -> QuestionIntro`
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.state != RoomPhase::WaitingPlayers {
            return Err(GameError::InvalidState {
                action: "start_game",
                state: self.state,
            });
        }
        self.state = RoomPhase::QuestionIntro;
        Ok(())
    }

    /// `QuestionIntro -> AnsweringPhase`; opens the round.
    pub fn begin_answering(&mut self, now: DateTime<Utc>) -> Result<&Question, GameError> {
        if self.state != RoomPhase::QuestionIntro {
            return Err(GameError::InvalidState {
                action: "start_answering",
                state: self.state,
            });
        }
        self.state = RoomPhase::AnsweringPhase;
        self.question_started_at = Some(now);
        self.answers_this_round.clear();
        self.correct_answer_index = None;
        self.accumulated_pause_ms = 0;
        self.current_question()
            .ok_or_else(|| GameError::Internal("question index out of range".to_string()))
    }

    /// `AnsweringPhase -> ShowResults`; caches the correct index, resets the
    /// streak of every player who did not answer, and summarizes the round.
    pub fn end_answering(&mut self) -> Result<RoundSummary, GameError> {
        if self.state != RoomPhase::AnsweringPhase {
            return Err(GameError::InvalidState {
                action: "end_answering",
                state: self.state,
            });
        }
        let question = self
            .current_question()
            .ok_or_else(|| GameError::Internal("question index out of range".to_string()))?;
        let correct_index = question.correct_answer_index;
        let option_count = question.options.len();

        self.state = RoomPhase::ShowResults;
        self.correct_answer_index = Some(correct_index);

        let mut distribution = vec![0u32; option_count];
        let mut correct_count = 0;
        for answer in self.answers_this_round.values() {
            if let Some(slot) = distribution.get_mut(answer.answer_index) {
                *slot += 1;
            }
            if answer.answer_index == correct_index {
                correct_count += 1;
            }
        }

        let answered: Vec<_> = self.answers_this_round.keys().copied().collect();
        for player in self.players.values_mut() {
            if !answered.contains(&player.id) {
                player.streak = 0;
            }
        }

        Ok(RoundSummary {
            question_index: self.current_question_index,
            correct_answer_index: correct_index,
            distribution,
            correct_count,
            total_players: self.players.len(),
        })
    }

    /// Recompute the last round's summary from the cached correct index.
    /// Available from `ShowResults` until the next round opens.
    pub fn round_results(&self) -> Option<RoundSummary> {
        let correct_index = self.correct_answer_index?;
        let option_count = self.current_question()?.options.len();
        let mut distribution = vec![0u32; option_count];
        let mut correct_count = 0;
        for answer in self.answers_this_round.values() {
            if let Some(slot) = distribution.get_mut(answer.answer_index) {
                *slot += 1;
            }
            if answer.answer_index == correct_index {
                correct_count += 1;
            }
        }
        Some(RoundSummary {
            question_index: self.current_question_index,
            correct_answer_index: correct_index,
            distribution,
            correct_count,
            total_players: self.players.len(),
        })
    }

    /// `ShowResults -> Leaderboard`
    pub fn show_leaderboard(&mut self) -> Result<(), GameError> {
        if self.state != RoomPhase::ShowResults {
            return Err(GameError::InvalidState {
                action: "show_leaderboard",
                state: self.state,
            });
        }
        self.state = RoomPhase::Leaderboard;
        Ok(())
    }

    /// `Leaderboard -> QuestionIntro | Podium`
    pub fn next_question_or_finish(&mut self) -> Result<Advance, GameError> {
        if self.state != RoomPhase::Leaderboard {
            return Err(GameError::InvalidState {
                action: "next_question",
                state: self.state,
            });
        }
        if self.current_question_index + 1 < self.total_questions() {
            self.current_question_index += 1;
            self.state = RoomPhase::QuestionIntro;
            Ok(Advance::NextQuestion(self.current_question_index))
        } else {
            self.state = RoomPhase::Podium;
            Ok(Advance::Podium)
        }
    }

    /// `ShowResults | Leaderboard -> Paused`
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), GameError> {
        if !self.state.can_pause() {
            return Err(GameError::InvalidState {
                action: "pause_game",
                state: self.state,
            });
        }
        self.pre_paused_state = Some(self.state);
        self.state = RoomPhase::Paused;
        self.paused_at = Some(now);
        Ok(())
    }

    /// `Paused -> pre-paused state`; returns the restored phase and the pause
    /// duration added to the round's pause budget.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(RoomPhase, i64), GameError> {
        if self.state != RoomPhase::Paused {
            return Err(GameError::InvalidState {
                action: "resume_game",
                state: self.state,
            });
        }
        let paused_at = self
            .paused_at
            .take()
            .ok_or_else(|| GameError::Internal("paused without pause timestamp".to_string()))?;
        let restored = self
            .pre_paused_state
            .take()
            .ok_or_else(|| GameError::Internal("paused without saved state".to_string()))?;
        let pause_ms = now.signed_duration_since(paused_at).num_milliseconds().max(0);
        self.accumulated_pause_ms += pause_ms;
        self.state = restored;
        Ok((restored, pause_ms))
    }

    // ------------------------------------------------------------------
    // Standings
    // ------------------------------------------------------------------

    /// All players sorted by score descending; ties go to the more recent
    /// last correct submission (players who never answered correctly sort
    /// last), then to the lower player id, so the ordering is deterministic.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut players: Vec<_> = self.players.values().collect();
        players.sort_by(|a, b| {
            b.score.cmp(&a.score).then_with(|| {
                match (a.last_correct_at, b.last_correct_at) {
                    (Some(x), Some(y)) => y.cmp(&x),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                }
                .then_with(|| a.id.cmp(&b.id))
            })
        });
        players
            .into_iter()
            .enumerate()
            .map(|(index, player)| LeaderboardEntry {
                rank: index as u32 + 1,
                player_id: player.id,
                nickname: player.nickname.clone(),
                score: player.score,
                streak: player.streak,
            })
            .collect()
    }

    /// Top three of the leaderboard.
    pub fn podium(&self) -> Vec<LeaderboardEntry> {
        let mut standings = self.leaderboard();
        standings.truncate(3);
        standings
    }
}
