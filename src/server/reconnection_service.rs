//! Disconnect policy and grace-period reconnection for host, players and
//! spectators.

use chrono::Utc;
use std::sync::Arc;

use super::QuizServer;
use crate::protocol::{
    GameError, LeaveReason, ParticipantRole, Pin, PlayerReconnectedPayload, ServerMessage,
    SocketId, SpectatorReconnectedPayload,
};
use crate::room::RoomPhase;
use crate::security::tokens;

impl QuizServer {
    /// Disconnect policy, resolved through the socket index:
    /// - host: mark disconnected; the reaper closes the room after the host
    ///   grace period unless the host reconnects first
    /// - player in the lobby: hard-remove, there is nothing to preserve yet
    /// - player mid-game: mark disconnected, keep the row for the grace
    ///   window
    /// - spectator: mark disconnected, same grace treatment as players
    pub(crate) async fn handle_disconnect(&self, socket_id: SocketId) {
        let Some(binding) = self.store().find_by_socket(socket_id) else {
            return;
        };
        let pin = binding.pin.clone();
        let Some(room) = self.store().find(&pin) else {
            self.store().release_socket(socket_id);
            return;
        };
        let mut room = room.lock().await;
        let now = Utc::now();

        match binding.role {
            ParticipantRole::Host => {
                room.set_host_disconnected(now);
                self.store().release_socket(socket_id);
                self.broadcaster().leave_group(&pin, socket_id);
                let grace_period_ms = self.options().host_grace.as_millis() as i64;
                tracing::info!(%pin, host_id = %room.host_id(), "Host disconnected, grace window open");
                self.broadcaster().broadcast(
                    &pin,
                    Arc::new(ServerMessage::HostDisconnected { grace_period_ms }),
                );
            }
            ParticipantRole::Player => {
                if room.state() == RoomPhase::WaitingPlayers {
                    if let Some(player) = room.remove_player_by_socket(socket_id) {
                        self.store().release_socket(socket_id);
                        self.store().release_player_token(&player.player_token);
                        self.broadcaster().leave_group(&pin, socket_id);
                        tracing::info!(%pin, player_id = %player.id, "Lobby player dropped on disconnect");
                        self.broadcaster().broadcast(
                            &pin,
                            Arc::new(ServerMessage::PlayerLeft {
                                player_id: player.id,
                                nickname: player.nickname,
                                reason: LeaveReason::Disconnected,
                            }),
                        );
                    }
                } else {
                    let notice = room.set_player_disconnected(socket_id, now).map(|player| {
                        (player.id, player.nickname.clone())
                    });
                    if let Some((player_id, nickname)) = notice {
                        self.store().release_socket(socket_id);
                        self.broadcaster().leave_group(&pin, socket_id);
                        tracing::info!(%pin, %player_id, "Player disconnected mid-game, grace window open");
                        self.broadcaster().broadcast(
                            &pin,
                            Arc::new(ServerMessage::PlayerLeft {
                                player_id,
                                nickname,
                                reason: LeaveReason::Disconnected,
                            }),
                        );
                    }
                }
            }
            ParticipantRole::Spectator => {
                let notice = room
                    .set_spectator_disconnected(socket_id, now)
                    .map(|spectator| (spectator.id, spectator.nickname.clone()));
                if let Some((spectator_id, nickname)) = notice {
                    self.store().release_socket(socket_id);
                    self.broadcaster().leave_group(&pin, socket_id);
                    self.broadcaster().broadcast(
                        &pin,
                        Arc::new(ServerMessage::SpectatorLeft {
                            spectator_id,
                            nickname,
                        }),
                    );
                }
            }
        }
    }

    /// Resume a host session: requires the authenticated host identity plus
    /// the host token. The host token is not rotated.
    pub async fn reconnect_host(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
        host_token: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let user_id = self.authenticated_user(socket_id)?;
        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;

        if room.host_id() != user_id {
            return Err(GameError::NotHost);
        }
        let old_socket = room.host_socket_id();
        room.reconnect_host(host_token, socket_id, self.options().host_grace, Utc::now())?;

        // A takeover from a still-bound socket leaves a stale index entry.
        if let Some(old_socket) = old_socket.filter(|old| *old != socket_id) {
            self.store().release_socket(old_socket);
            self.broadcaster().leave_group(&pin, old_socket);
        }
        self.store().save(&room);
        self.broadcaster().join_group(&pin, socket_id);

        tracing::info!(%pin, host_id = %user_id, "Host reconnected");
        self.send(
            socket_id,
            ServerMessage::HostReconnected(Box::new(self.snapshot(&room))),
        );
        self.broadcaster()
            .broadcast_except(&pin, Arc::new(ServerMessage::HostReturned), Some(socket_id));
        Ok(())
    }

    /// Resume a player session inside the grace window. The presented token
    /// is invalidated and a rotated replacement returned.
    pub async fn reconnect_player(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
        player_token: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let (indexed_pin, _) = self
            .store()
            .find_by_player_token(player_token)
            .ok_or(GameError::TokenNotFound)?;
        if indexed_pin != pin {
            return Err(GameError::TokenNotFound);
        }

        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;

        let old_socket = room
            .players()
            .find(|player| player.player_token == player_token)
            .and_then(|player| player.socket_id);

        let new_token = tokens::generate();
        let player = room.reconnect_player(
            player_token,
            socket_id,
            self.options().player_grace,
            new_token.clone(),
            Utc::now(),
        )?;
        let player_id = player.id;
        let public = player.public_info();
        let (score, streak) = (player.score, player.streak);

        if let Some(old_socket) = old_socket.filter(|old| *old != socket_id) {
            self.store().release_socket(old_socket);
            self.broadcaster().leave_group(&pin, old_socket);
        }
        self.store().save(&room);
        self.store().release_player_token(player_token);
        self.broadcaster().join_group(&pin, socket_id);

        tracing::info!(%pin, %player_id, "Player reconnected, token rotated");
        self.send(
            socket_id,
            ServerMessage::PlayerReconnected(Box::new(PlayerReconnectedPayload {
                snapshot: self.snapshot(&room),
                player_id,
                player_token: new_token,
                score,
                streak,
            })),
        );
        self.broadcaster().broadcast_except(
            &pin,
            Arc::new(ServerMessage::PlayerReturned { player: public }),
            Some(socket_id),
        );
        Ok(())
    }

    /// Resume a spectator session inside the grace window; token rotated.
    pub async fn reconnect_spectator(
        &self,
        socket_id: SocketId,
        raw_pin: &str,
        spectator_token: &str,
    ) -> Result<(), GameError> {
        let pin = Pin::parse(raw_pin)?;
        let (indexed_pin, _) = self
            .store()
            .find_by_spectator_token(spectator_token)
            .ok_or(GameError::TokenNotFound)?;
        if indexed_pin != pin {
            return Err(GameError::TokenNotFound);
        }

        let room = self.find_room(&pin)?;
        let mut room = room.lock().await;

        let old_socket = room
            .spectators()
            .find(|spectator| spectator.spectator_token == spectator_token)
            .and_then(|spectator| spectator.socket_id);

        let new_token = tokens::generate();
        let spectator = room.reconnect_spectator(
            spectator_token,
            socket_id,
            self.options().player_grace,
            new_token.clone(),
            Utc::now(),
        )?;
        let spectator_id = spectator.id;
        let public = spectator.public_info();

        if let Some(old_socket) = old_socket.filter(|old| *old != socket_id) {
            self.store().release_socket(old_socket);
            self.broadcaster().leave_group(&pin, old_socket);
        }
        self.store().save(&room);
        self.store().release_spectator_token(spectator_token);
        self.broadcaster().join_group(&pin, socket_id);

        self.send(
            socket_id,
            ServerMessage::SpectatorReconnected(Box::new(SpectatorReconnectedPayload {
                snapshot: self.snapshot(&room),
                spectator_id,
                spectator_token: new_token,
            })),
        );
        self.broadcaster().broadcast_except(
            &pin,
            Arc::new(ServerMessage::SpectatorReturned { spectator: public }),
            Some(socket_id),
        );
        Ok(())
    }
}
