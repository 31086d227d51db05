//! Main server orchestration: use-cases, dispatch, and session binding.
//!
//! One [`QuizServer`] owns the room store, timer service, broadcaster, join
//! locks and per-socket sessions. Every inbound socket event is routed here,
//! resolves its target room, takes that room's lock, and emits outbound
//! events before the lock is released, so events within one PIN group are
//! totally ordered.

pub mod game_service;
pub mod maintenance;
pub mod reconnection_service;
pub mod room_service;

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broadcast::Broadcaster;
use crate::config::{Config, ProtocolConfig};
use crate::join_lock::JoinLockMap;
use crate::protocol::{
    ClientMessage, GameError, Pin, RoomSnapshotPayload, ServerMessage, SocketId, UserId,
};
use crate::quiz::QuizRepository;
use crate::room::Room;
use crate::security::HostTokenVerifier;
use crate::store::RoomStore;
use crate::timer::RoomTimerService;

/// Per-socket session state. The user id appears after a successful
/// `authenticate` frame and gates the host-only verbs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Session {
    pub user_id: Option<UserId>,
}

/// Timing knobs resolved once at startup.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub player_grace: Duration,
    pub host_grace: Duration,
    pub host_grace_warning: Duration,
    pub pin_max_attempts: u32,
    pub reaper_interval: Duration,
    pub max_message_size: usize,
}

impl RuntimeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            player_grace: config.server.player_grace(),
            host_grace: config.server.host_grace(),
            host_grace_warning: config.server.host_grace_warning(),
            pin_max_attempts: config.server.pin_max_attempts,
            reaper_interval: config.server.reaper_interval(),
            max_message_size: config.security.max_message_size,
        }
    }
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The authoritative quiz game server.
pub struct QuizServer {
    options: RuntimeOptions,
    protocol_config: ProtocolConfig,
    store: RoomStore,
    quizzes: Arc<dyn QuizRepository>,
    broadcaster: Arc<Broadcaster>,
    timers: Arc<RoomTimerService>,
    join_locks: JoinLockMap,
    host_auth: Arc<dyn HostTokenVerifier>,
    sessions: DashMap<SocketId, Session>,
    expiry_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<Pin>>>,
}

impl QuizServer {
    pub fn new(
        config: &Config,
        quizzes: Arc<dyn QuizRepository>,
        host_auth: Arc<dyn HostTokenVerifier>,
    ) -> Arc<Self> {
        let broadcaster = Arc::new(Broadcaster::new());
        let (timers, expiry_rx) =
            RoomTimerService::new(Arc::clone(&broadcaster), config.server.timer_tick());

        Arc::new(Self {
            options: RuntimeOptions::from_config(config),
            protocol_config: config.protocol.clone(),
            store: RoomStore::new(),
            quizzes,
            broadcaster,
            timers,
            join_locks: JoinLockMap::new(config.server.join_lock_ttl()),
            host_auth,
            sessions: DashMap::new(),
            expiry_rx: std::sync::Mutex::new(Some(expiry_rx)),
        })
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn protocol_config(&self) -> &ProtocolConfig {
        &self.protocol_config
    }

    pub fn store(&self) -> &RoomStore {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn timers(&self) -> &Arc<RoomTimerService> {
        &self.timers
    }

    pub(crate) fn join_locks(&self) -> &JoinLockMap {
        &self.join_locks
    }

    /// Spawn the timer-expiry driver and the grace-period reaper. Handles
    /// are returned so callers can abort them on shutdown.
    pub fn spawn_background_tasks(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        vec![
            Arc::clone(self).spawn_expiry_driver(),
            tokio::spawn(Arc::clone(self).reaper_task()),
        ]
    }

    /// Drives timer expiry hand-offs into the game use-cases. Runs until the
    /// timer service drops its sender.
    fn spawn_expiry_driver(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let receiver = {
                #[allow(clippy::expect_used)]
                let mut slot = self.expiry_rx.lock().expect("expiry receiver lock");
                slot.take()
            };
            let Some(mut receiver) = receiver else {
                tracing::warn!("Timer expiry driver already running");
                return;
            };
            while let Some(pin) = receiver.recv().await {
                if let Err(error) = self.end_answering_from_timer(&pin).await {
                    // A late fire against a closed or advanced room is
                    // routine; anything else is logged and suppressed.
                    tracing::warn!(%pin, %error, "Timer expiry handling failed");
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Bind a freshly accepted socket.
    pub fn register_socket(
        &self,
        socket_id: SocketId,
        sender: mpsc::Sender<Arc<ServerMessage>>,
    ) {
        self.broadcaster.register_socket(socket_id, sender);
        self.sessions.insert(socket_id, Session::default());
    }

    /// Tear down a socket: run the disconnect policy for whatever role it
    /// held, then drop the session and queue.
    pub async fn handle_socket_closed(&self, socket_id: SocketId) {
        self.handle_disconnect(socket_id).await;
        self.sessions.remove(&socket_id);
        self.broadcaster.unregister_socket(socket_id);
    }

    pub fn session_user(&self, socket_id: SocketId) -> Option<UserId> {
        self.sessions
            .get(&socket_id)
            .and_then(|session| session.user_id)
    }

    pub(crate) fn authenticated_user(&self, socket_id: SocketId) -> Result<UserId, GameError> {
        self.session_user(socket_id)
            .ok_or(GameError::NotAuthenticated)
    }

    // ------------------------------------------------------------------
    // Emission helpers
    // ------------------------------------------------------------------

    pub(crate) fn send(&self, socket_id: SocketId, message: ServerMessage) {
        self.broadcaster.send_to(socket_id, Arc::new(message));
    }

    /// Reject a frame that never reached a use-case (malformed JSON,
    /// oversized payload).
    pub fn send_protocol_error(&self, socket_id: SocketId, message: &str) {
        self.send(
            socket_id,
            ServerMessage::Error {
                error: crate::protocol::ErrorKind::ValidationError,
                message: message.to_string(),
            },
        );
    }

    fn send_error(&self, socket_id: SocketId, error: &GameError) {
        self.send(
            socket_id,
            ServerMessage::Error {
                error: error.kind(),
                message: error.client_message(),
            },
        );
    }

    /// Host verbs require the caller to be the room's current host socket.
    pub(crate) fn require_host(&self, room: &Room, socket_id: SocketId) -> Result<(), GameError> {
        if room.host_socket_id() == Some(socket_id) {
            Ok(())
        } else {
            Err(GameError::NotHost)
        }
    }

    /// Roster queries are open to any participant of the room.
    pub(crate) fn require_participant(
        &self,
        room: &Room,
        socket_id: SocketId,
    ) -> Result<(), GameError> {
        let is_participant = room.host_socket_id() == Some(socket_id)
            || room.player_by_socket(socket_id).is_some()
            || room
                .spectators()
                .any(|spectator| spectator.socket_id == Some(socket_id));
        if is_participant {
            Ok(())
        } else {
            Err(GameError::NotInRoom)
        }
    }

    pub(crate) fn find_room(
        &self,
        pin: &Pin,
    ) -> Result<Arc<tokio::sync::Mutex<Room>>, GameError> {
        self.store.find(pin).ok_or(GameError::RoomNotFound)
    }

    /// Full room state for reconnection payloads, with a timer snapshot when
    /// a countdown is running.
    pub(crate) fn snapshot(&self, room: &Room) -> RoomSnapshotPayload {
        RoomSnapshotPayload {
            pin: room.pin().clone(),
            state: room.state(),
            current_question_index: room.current_question_index(),
            total_questions: room.total_questions(),
            quiz_title: room.quiz_title().to_string(),
            players: room.roster(),
            spectators: room.spectator_roster(),
            timer: self.timers.sync(room.pin()),
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Route one inbound frame to its use-case. Failures become a targeted
    /// `error` event; nothing is ever broadcast on failure.
    pub async fn handle_client_message(&self, socket_id: SocketId, message: ClientMessage) {
        let result = self.dispatch(socket_id, message).await;
        if let Err(error) = result {
            tracing::debug!(%socket_id, %error, "Use-case rejected");
            self.send_error(socket_id, &error);
        }
    }

    async fn dispatch(
        &self,
        socket_id: SocketId,
        message: ClientMessage,
    ) -> Result<(), GameError> {
        match message {
            ClientMessage::Authenticate { access_token } => {
                self.authenticate(socket_id, &access_token)
            }
            ClientMessage::CreateRoom { quiz_id } => self.create_room(socket_id, quiz_id).await,
            ClientMessage::GetMyRoom {} => self.get_my_room(socket_id).await,
            ClientMessage::ForceCloseRoom {} => self.force_close_room(socket_id).await,
            ClientMessage::JoinRoom { pin, nickname } => {
                self.join_room(socket_id, &pin, &nickname).await
            }
            ClientMessage::JoinAsSpectator { pin, nickname } => {
                self.join_as_spectator(socket_id, &pin, &nickname).await
            }
            ClientMessage::LeaveRoom { pin } => self.leave_room(socket_id, &pin).await,
            ClientMessage::LeaveSpectator { pin } => self.leave_spectator(socket_id, &pin).await,
            ClientMessage::CloseRoom { pin } => self.close_room(socket_id, &pin).await,
            ClientMessage::ReconnectHost { pin, host_token } => {
                self.reconnect_host(socket_id, &pin, &host_token).await
            }
            ClientMessage::ReconnectPlayer { pin, player_token } => {
                self.reconnect_player(socket_id, &pin, &player_token).await
            }
            ClientMessage::ReconnectSpectator {
                pin,
                spectator_token,
            } => {
                self.reconnect_spectator(socket_id, &pin, &spectator_token)
                    .await
            }
            ClientMessage::StartGame { pin } => self.start_game(socket_id, &pin).await,
            ClientMessage::StartAnswering { pin } => self.start_answering(socket_id, &pin).await,
            ClientMessage::EndAnswering { pin } => self.end_answering(socket_id, &pin).await,
            ClientMessage::ShowLeaderboard { pin } => {
                self.show_leaderboard(socket_id, &pin).await
            }
            ClientMessage::NextQuestion { pin } => self.next_question(socket_id, &pin).await,
            ClientMessage::SubmitAnswer { pin, answer_index } => {
                self.submit_answer(socket_id, &pin, answer_index).await
            }
            ClientMessage::KickPlayer { pin, player_id } => {
                self.kick_player(socket_id, &pin, player_id).await
            }
            ClientMessage::BanPlayer { pin, player_id } => {
                self.ban_player(socket_id, &pin, player_id).await
            }
            ClientMessage::UnbanNickname { pin, nickname } => {
                self.unban_nickname(socket_id, &pin, &nickname).await
            }
            ClientMessage::GetPlayers { pin } => self.get_players(socket_id, &pin).await,
            ClientMessage::GetSpectators { pin } => self.get_spectators(socket_id, &pin).await,
            ClientMessage::GetBannedNicknames { pin } => {
                self.get_banned_nicknames(socket_id, &pin).await
            }
            ClientMessage::PauseGame { pin } => self.pause_game(socket_id, &pin).await,
            ClientMessage::ResumeGame { pin } => self.resume_game(socket_id, &pin).await,
            ClientMessage::RequestTimerSync { pin } => {
                self.request_timer_sync(socket_id, &pin).await
            }
            ClientMessage::GetResults { pin } => self.get_results(socket_id, &pin).await,
        }
    }

    /// Verify an opaque host access token and bind the user to the session.
    fn authenticate(&self, socket_id: SocketId, access_token: &str) -> Result<(), GameError> {
        let claims = self.host_auth.verify(access_token)?;
        let Some(mut session) = self.sessions.get_mut(&socket_id) else {
            return Err(GameError::Internal("session missing for socket".to_string()));
        };
        session.user_id = Some(claims.user_id);
        drop(session);

        tracing::info!(%socket_id, user_id = %claims.user_id, "Host session authenticated");
        self.send(
            socket_id,
            ServerMessage::Authenticated {
                user_id: claims.user_id,
            },
        );
        Ok(())
    }
}
