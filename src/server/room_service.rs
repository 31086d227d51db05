//! Room lifecycle use-cases: create, join, leave, close, kick/ban, roster
//! queries.

use std::sync::Arc;
use uuid::Uuid;

use super::QuizServer;
use crate::protocol::{
    GameError, KickReason, LeaveReason, Nickname, Pin, PlayerId, RoomCreatedPayload,
    RoomJoinedPayload, ServerMessage, SocketId, SpectatorJoinedPayload,
};
use crate::room::{Player, Room, Spectator};
use crate::security::tokens;

impl QuizServer {
    /// Create a room for an authenticated host. One live room per host.
    pub async fn create_room(&self, socket_id: SocketId, quiz_id: Uuid) -> Result<(), GameError> {
        let user_id = self.authenticated_user(socket_id)?;
        if self.store().find_by_socket(socket_id).is_some() {
            return Err(GameError::AlreadyInRoom);
        }
        if self.store().find_by_host_user(user_id).is_some() {
            return Err(GameError::HostRoomExists);
        }

        let quiz = self.quizzes.find_by_id(&quiz_id).await?;
        let host_token = tokens::generate();
        let token_for_room = host_token.clone();
        let (pin, room) = self.store().create_room(self.options().pin_max_attempts, |pin| {
            Room::new(pin, user_id, token_for_room, socket_id, Arc::clone(&quiz))
        })?;

        let room = room.lock().await;
        self.store().save(&room);
        self.broadcaster().join_group(&pin, socket_id);

        tracing::info!(
            %pin,
            room_id = %room.id(),
            host_id = %user_id,
            quiz_id = %quiz_id,
            total_questions = room.total_questions(),
            "Room created"
        );

        self.send(
            socket_id,
            ServerMessage::RoomCreated(Box::new(RoomCreatedPayload {
                pin,
                host_token,
                quiz_id,
                quiz_title: room.quiz_title().to_string(),
                total_questions: room.total_questions(),
                state: room.state(),
            })),
        );
        Ok(())
    }

    /// Reply with the caller's live room, if any. Lets a host UI recover
    /// after a page reload before deciding to `reconnect_host`.
    pub async fn get_my_room(&self, socket_id: SocketId) -> Result<(), GameError> {
        let user_id = self.authenticated_user(socket_id)?;
        let pin = self
            .store()
            .find_by_host_user(user_id)
            .ok_or(GameError::RoomNotFound)?;
        let room = self.find_room(&pin)?;
        let room = room.lock().await;

        self.send(
            socket_id,
            ServerMessage::RoomCreated(Box::new(RoomCreatedPayload {
                pin,
                host_token: room.host_token().to_string(),
                quiz_id: room.quiz().id,
                quiz_title: room.quiz_title().to_string(),
                total_questions: room.total_questions(),
                state: room.state(),
            })),
        );
        Ok(())
    }

    /// Close the caller's live room without knowing its PIN.
    pub async fn force_close_room(&self, socket_id: SocketId) -> Result<(), GameError> {
        let user_id = self.authenticated_user(socket_id)?;
        let Some(pin) = self.store().find_by_host_user(user_id) else {
            return Ok(()); // nothing to close
        };
        let Some(room) = self.store().find(&pin) else {
            return Ok(());
        };
        let room = room.lock().await;
        self.close_room_locked(&room, "Closed by host");
        Ok(())
    }

    /// Join a room as a player. The join lock on `(pin, normalized nickname)`
    /// closes the TOCTOU window between the uniqueness check and the index
    /// write; it is released on every exit path when the guard drops.
    pub async fn join_room(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
        raw_nickname: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let nickname = Nickname::parse(raw_nickname, self.protocol_config())?;
        if self.store().find_by_socket(socket_id).is_some() {
            return Err(GameError::AlreadyInRoom);
        }

        let _join_lock = self.join_locks().acquire(&pin, nickname.normalized())?;

        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;

        let player = Player::new(&nickname, socket_id, tokens::generate());
        let player_token = player.player_token.clone();
        let admitted = room.add_player(player)?;
        let player_id = admitted.id;
        let public = admitted.public_info();

        self.store().save(&room);
        self.broadcaster().join_group(&pin, socket_id);

        tracing::info!(%pin, %player_id, nickname = %public.nickname, "Player joined room");

        self.send(
            socket_id,
            ServerMessage::RoomJoined(Box::new(RoomJoinedPayload {
                pin: pin.clone(),
                player_id,
                player_token,
                nickname: public.nickname.clone(),
                quiz_title: room.quiz_title().to_string(),
                total_questions: room.total_questions(),
                state: room.state(),
                players: room.roster(),
            })),
        );
        self.broadcaster().broadcast_except(
            &pin,
            Arc::new(ServerMessage::PlayerJoined { player: public }),
            Some(socket_id),
        );
        Ok(())
    }

    /// Join as a read-only spectator. No uniqueness requirement and no join
    /// lock; spectators never collide on anything indexed.
    pub async fn join_as_spectator(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
        raw_nickname: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let nickname = Nickname::parse(raw_nickname, self.protocol_config())?;
        if self.store().find_by_socket(socket_id).is_some() {
            return Err(GameError::AlreadyInRoom);
        }

        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;

        let spectator = Spectator::new(&nickname, socket_id, tokens::generate());
        let spectator_token = spectator.spectator_token.clone();
        let admitted = room.add_spectator(spectator)?;
        let spectator_id = admitted.id;
        let public = admitted.public_info();

        self.store().save(&room);
        self.broadcaster().join_group(&pin, socket_id);

        tracing::info!(%pin, %spectator_id, nickname = %public.nickname, "Spectator joined room");

        self.send(
            socket_id,
            ServerMessage::RoomJoinedSpectator(Box::new(SpectatorJoinedPayload {
                pin: pin.clone(),
                spectator_id,
                spectator_token,
                nickname: public.nickname.clone(),
                quiz_title: room.quiz_title().to_string(),
                state: room.state(),
                players: room.roster(),
                spectators: room.spectator_roster(),
            })),
        );
        self.broadcaster().broadcast_except(
            &pin,
            Arc::new(ServerMessage::SpectatorJoined { spectator: public }),
            Some(socket_id),
        );
        Ok(())
    }

    /// Voluntary leave by a player.
    pub async fn leave_room(&self, socket_id: SocketId, raw_pin: &str) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;

        let player = room
            .remove_player_by_socket(socket_id)
            .ok_or(GameError::NotInRoom)?;
        self.store().release_socket(socket_id);
        self.store().release_player_token(&player.player_token);
        self.broadcaster().leave_group(&pin, socket_id);

        tracing::info!(%pin, player_id = %player.id, "Player left room");
        self.broadcaster().broadcast(
            &pin,
            Arc::new(ServerMessage::PlayerLeft {
                player_id: player.id,
                nickname: player.nickname,
                reason: LeaveReason::Left,
            }),
        );
        Ok(())
    }

    /// Voluntary leave by a spectator.
    pub async fn leave_spectator(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;

        let spectator = room
            .remove_spectator_by_socket(socket_id)
            .ok_or(GameError::NotInRoom)?;
        self.store().release_socket(socket_id);
        self.store()
            .release_spectator_token(&spectator.spectator_token);
        self.broadcaster().leave_group(&pin, socket_id);

        self.broadcaster().broadcast(
            &pin,
            Arc::new(ServerMessage::SpectatorLeft {
                spectator_id: spectator.id,
                nickname: spectator.nickname,
            }),
        );
        Ok(())
    }

    /// Close a room. Issued twice for the same PIN, the second call is a
    /// no-op rather than an error.
    pub async fn close_room(&self, socket_id: SocketId, raw_pin: &str) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let Some(room) = self.store().find(&pin) else {
            return Ok(());
        };
        let room = room.lock().await;
        self.require_host(&room, socket_id)?;
        self.close_room_locked(&room, "Closed by host");
        Ok(())
    }

    /// Tear down a room while holding its lock: stop the timer, tell
    /// everyone, drop the broadcast group and every index entry.
    pub(crate) fn close_room_locked(&self, room: &Room, reason: &str) {
        let pin = room.pin();
        self.timers.stop(pin);
        self.broadcaster().broadcast(
            pin,
            Arc::new(ServerMessage::RoomClosed {
                reason: reason.to_string(),
            }),
        );
        self.broadcaster().remove_group(pin);
        self.store().delete(room);
        tracing::info!(%pin, room_id = %room.id(), %reason, "Room closed");
    }

    /// Remove a player at the host's request.
    pub async fn kick_player(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
        player_id: PlayerId,
    ) -> Result<(), GameError> {
        self.remove_player_as_host(socket_id, raw_pin, player_id, KickReason::Kicked)
            .await
    }

    /// Remove a player and ban their normalized nickname.
    pub async fn ban_player(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
        player_id: PlayerId,
    ) -> Result<(), GameError> {
        self.remove_player_as_host(socket_id, raw_pin, player_id, KickReason::Banned)
            .await
    }

    async fn remove_player_as_host(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
        player_id: PlayerId,
        reason: KickReason,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;
        self.require_host(&room, socket_id)?;

        let player = room
            .remove_player(&player_id)
            .ok_or(GameError::PlayerNotFound)?;
        if reason == KickReason::Banned {
            room.ban_nickname(player.normalized_nickname.clone());
        }

        self.store().release_player_token(&player.player_token);
        if let Some(target_socket) = player.socket_id {
            self.store().release_socket(target_socket);
            self.send(target_socket, ServerMessage::YouWereKicked { reason });
            self.broadcaster().leave_group(&pin, target_socket);
        }

        let notice = match reason {
            KickReason::Kicked => ServerMessage::PlayerKicked {
                player_id,
                nickname: player.nickname.clone(),
            },
            KickReason::Banned => ServerMessage::PlayerBanned {
                player_id,
                nickname: player.nickname.clone(),
            },
        };
        tracing::info!(%pin, %player_id, nickname = %player.nickname, ?reason, "Player removed by host");
        self.broadcaster().broadcast(&pin, Arc::new(notice));
        Ok(())
    }

    /// Lift a nickname ban.
    pub async fn unban_nickname(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
        raw_nickname: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let normalized = Nickname::normalize(raw_nickname);
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;
        self.require_host(&room, socket_id)?;

        if !room.unban_nickname(&normalized) {
            return Err(GameError::NicknameNotBanned);
        }
        self.broadcaster().broadcast(
            &pin,
            Arc::new(ServerMessage::NicknameUnbanned {
                nickname: normalized,
            }),
        );
        Ok(())
    }

    /// Reply with the player roster.
    pub async fn get_players(&self, socket_id: SocketId, raw_pin: &str) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let room = room.lock().await;
        self.require_participant(&room, socket_id)?;
        self.send(
            socket_id,
            ServerMessage::Players {
                players: room.roster(),
            },
        );
        Ok(())
    }

    /// Reply with the spectator roster.
    pub async fn get_spectators(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let room = room.lock().await;
        self.require_participant(&room, socket_id)?;
        self.send(
            socket_id,
            ServerMessage::Spectators {
                spectators: room.spectator_roster(),
            },
        );
        Ok(())
    }

    /// Reply with the banned nickname list.
    pub async fn get_banned_nicknames(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let room = self.find_room(&pin)?;
        let room = room.lock().await;
        self.require_participant(&room, socket_id)?;
        self.send(
            socket_id,
            ServerMessage::BannedNicknames {
                nicknames: room.banned_nicknames(),
            },
        );
        Ok(())
    }
}
