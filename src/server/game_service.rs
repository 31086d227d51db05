//! Game progression use-cases: host verbs driving the state machine, player
//! answer submission, pause/resume, and results queries.

use chrono::Utc;
use std::sync::Arc;

use super::QuizServer;
use crate::protocol::{
    AnsweringStartedPayload, GameError, Pin, QuestionIntroPayload, ServerMessage,
    ShowResultsPayload, SocketId,
};
use crate::room::{Advance, Room, RoomPhase, RoundSummary};

impl QuizServer {
    /// Leave the lobby and present the first question.
    pub async fn start_game(&self, socket_id: SocketId, raw_pin: &str) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;
        self.require_host(&room, socket_id)?;

        room.start()?;
        tracing::info!(%pin, players = room.total_players(), "Game started");

        self.broadcaster().broadcast(
            &pin,
            Arc::new(ServerMessage::GameStarted {
                total_questions: room.total_questions(),
            }),
        );
        self.broadcast_question_intro(&pin, &room)?;
        Ok(())
    }

    /// Open the answering window and start the countdown.
    pub async fn start_answering(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;
        self.require_host(&room, socket_id)?;

        let (time_limit, option_count) = {
            let question = room.begin_answering(Utc::now())?;
            (question.time_limit_seconds, question.options.len())
        };
        let question_index = room.current_question_index();

        tracing::info!(%pin, question_index, time_limit, "Answering window opened");
        self.broadcaster().broadcast(
            &pin,
            Arc::new(ServerMessage::AnsweringStarted(AnsweringStartedPayload {
                question_index,
                time_limit,
                option_count,
            })),
        );
        // timer_started and the first tick go out after answering_started,
        // still inside this critical section.
        self.timers().start(&pin, time_limit);
        Ok(())
    }

    /// Record and score a player's answer.
    pub async fn submit_answer(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
        answer_index: usize,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;

        let player_id = room
            .player_by_socket(socket_id)
            .map(|player| player.id)
            .ok_or(GameError::NotInRoom)?;

        let feedback = room.submit_answer(player_id, answer_index, Utc::now())?;
        tracing::debug!(
            %pin,
            %player_id,
            is_correct = feedback.is_correct,
            score = feedback.score,
            streak = feedback.streak,
            "Answer recorded"
        );

        self.send(socket_id, ServerMessage::AnswerReceived(feedback));
        self.broadcaster().broadcast(
            &pin,
            Arc::new(ServerMessage::AnswerCountUpdated {
                answered_count: room.answered_count(),
                total_players: room.total_players(),
            }),
        );
        if room.all_connected_answered() {
            self.broadcaster()
                .broadcast(&pin, Arc::new(ServerMessage::AllPlayersAnswered));
        }
        Ok(())
    }

    /// Close the answering window at the host's request.
    pub async fn end_answering(&self, socket_id: SocketId, raw_pin: &str) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;
        self.require_host(&room, socket_id)?;
        self.finish_round(&pin, &mut room)
    }

    /// Close the answering window because the countdown expired. A late fire
    /// against a room that already advanced or closed is ignored.
    pub async fn end_answering_from_timer(&self, pin: &Pin) -> Result<(), GameError> {
        let Some(room) = self.store().find(pin) else {
            return Ok(());
        };
        let mut room = room.lock().await;
        if room.state() != RoomPhase::AnsweringPhase {
            tracing::trace!(%pin, state = %room.state(), "Stale timer expiry ignored");
            return Ok(());
        }
        tracing::info!(%pin, "Timer expiry auto-ends round");
        self.finish_round(pin, &mut room)
    }

    /// `AnsweringPhase -> ShowResults` plus the role-targeted result
    /// broadcasts: the full distribution goes to the host and spectators,
    /// players only learn the correct index.
    fn finish_round(&self, pin: &Pin, room: &mut Room) -> Result<(), GameError> {
        let summary = room.end_answering()?;
        self.timers().stop(pin);
        self.emit_round_results(room, &summary);
        Ok(())
    }

    fn emit_round_results(&self, room: &Room, summary: &RoundSummary) {
        let mut host_and_spectators: Vec<SocketId> =
            room.host_socket_id().into_iter().collect();
        host_and_spectators.extend(room.spectator_sockets());

        self.broadcaster().send_to_all(
            &host_and_spectators,
            Arc::new(ServerMessage::ShowResults(ShowResultsPayload {
                question_index: summary.question_index,
                correct_answer_index: summary.correct_answer_index,
                distribution: summary.distribution.clone(),
                correct_count: summary.correct_count,
                total_players: summary.total_players,
            })),
        );
        self.broadcaster().send_to_all(
            &room.player_sockets(),
            Arc::new(ServerMessage::RoundEnded {
                question_index: summary.question_index,
                correct_answer_index: summary.correct_answer_index,
            }),
        );
    }

    /// `ShowResults -> Leaderboard`, broadcasting the standings.
    pub async fn show_leaderboard(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;
        self.require_host(&room, socket_id)?;

        room.show_leaderboard()?;
        self.broadcaster().broadcast(
            &pin,
            Arc::new(ServerMessage::Leaderboard {
                entries: room.leaderboard(),
            }),
        );
        Ok(())
    }

    /// Advance to the next question, or to the podium after the last one.
    pub async fn next_question(&self, socket_id: SocketId, raw_pin: &str) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;
        self.require_host(&room, socket_id)?;

        match room.next_question_or_finish()? {
            Advance::NextQuestion(question_index) => {
                tracing::info!(%pin, question_index, "Advancing to next question");
                self.broadcast_question_intro(&pin, &room)?;
            }
            Advance::Podium => {
                tracing::info!(%pin, "Game over, podium reached");
                self.broadcaster().broadcast(
                    &pin,
                    Arc::new(ServerMessage::GameOver {
                        podium: room.podium(),
                    }),
                );
                self.broadcaster().broadcast(
                    &pin,
                    Arc::new(ServerMessage::FinalResults {
                        leaderboard: room.leaderboard(),
                    }),
                );
            }
        }
        Ok(())
    }

    /// Pause between rounds.
    pub async fn pause_game(&self, socket_id: SocketId, raw_pin: &str) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;
        self.require_host(&room, socket_id)?;

        let now = Utc::now();
        room.pause(now)?;
        tracing::info!(%pin, "Game paused");
        self.broadcaster().broadcast(
            &pin,
            Arc::new(ServerMessage::GamePaused {
                paused_at: now.timestamp_millis(),
            }),
        );
        Ok(())
    }

    /// Resume from a pause, restoring the saved phase.
    pub async fn resume_game(&self, socket_id: SocketId, raw_pin: &str) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;
        self.require_host(&room, socket_id)?;

        let (state, pause_duration_ms) = room.resume(Utc::now())?;
        tracing::info!(%pin, %state, pause_duration_ms, "Game resumed");
        self.broadcaster().broadcast(
            &pin,
            Arc::new(ServerMessage::GameResumed {
                state,
                pause_duration_ms,
            }),
        );
        Ok(())
    }

    /// Reply with an authoritative timer snapshot.
    pub async fn request_timer_sync(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let room = room.lock().await;
        self.require_participant(&room, socket_id)?;

        let sync = self.timers().sync(&pin).ok_or(GameError::TimerNotFound)?;
        self.send(socket_id, ServerMessage::TimerSync(sync));
        Ok(())
    }

    /// Reply with the results matching the room's current interstitial
    /// state: the round summary between rounds, the final standings at the
    /// podium.
    pub async fn get_results(&self, socket_id: SocketId, raw_pin: &str) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let room = room.lock().await;
        self.require_participant(&room, socket_id)?;

        match room.state() {
            RoomPhase::ShowResults | RoomPhase::Leaderboard | RoomPhase::Paused => {
                let summary = room.round_results().ok_or_else(|| {
                    GameError::Internal("round results missing in interstitial state".to_string())
                })?;
                self.send(
                    socket_id,
                    ServerMessage::ShowResults(ShowResultsPayload {
                        question_index: summary.question_index,
                        correct_answer_index: summary.correct_answer_index,
                        distribution: summary.distribution,
                        correct_count: summary.correct_count,
                        total_players: summary.total_players,
                    }),
                );
                Ok(())
            }
            RoomPhase::Podium => {
                self.send(
                    socket_id,
                    ServerMessage::FinalResults {
                        leaderboard: room.leaderboard(),
                    },
                );
                Ok(())
            }
            state => Err(GameError::InvalidState {
                action: "get_results",
                state,
            }),
        }
    }

    /// Broadcast the current question without its answer key.
    fn broadcast_question_intro(&self, pin: &Pin, room: &Room) -> Result<(), GameError> {
        let question = room
            .current_question()
            .ok_or_else(|| GameError::Internal("question index out of range".to_string()))?;
        self.broadcaster().broadcast(
            pin,
            Arc::new(ServerMessage::QuestionIntro(Box::new(QuestionIntroPayload {
                question_index: room.current_question_index(),
                total_questions: room.total_questions(),
                text: question.text.clone(),
                options: question.options.clone(),
                points: question.points,
                time_limit_seconds: question.time_limit_seconds,
                image_url: question.image_url.clone(),
            }))),
        );
        Ok(())
    }
}
