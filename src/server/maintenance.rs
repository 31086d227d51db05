//! Grace-period reaper: closes abandoned rooms, removes players whose
//! reconnect window lapsed, and sweeps expired join reservations.

use chrono::Utc;
use std::sync::Arc;

use super::QuizServer;
use crate::protocol::{LeaveReason, PlayerId, ServerMessage, SpectatorId};

impl QuizServer {
    /// Periodic sweep. Never returns; failures inside a single sweep are
    /// logged and must not take the process down.
    pub async fn reaper_task(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.options().reaper_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.sweep_once().await;
        }
    }

    /// One full sweep across join locks and all live rooms. Exposed for
    /// tests that drive the reaper deterministically.
    pub async fn sweep_once(&self) {
        let swept_locks = self.join_locks().sweep();
        if swept_locks > 0 {
            tracing::debug!(count = swept_locks, "Swept expired join locks");
        }

        for pin in self.store().all_pins() {
            let Some(room) = self.store().find(&pin) else {
                continue;
            };
            let mut room = room.lock().await;
            let now = Utc::now();

            // Host grace: past the window the room closes; near the window
            // a single warning goes out.
            if let Some(disconnected_at) = room.host_disconnected_at() {
                let elapsed_ms = now.signed_duration_since(disconnected_at).num_milliseconds();
                let grace_ms = self.options().host_grace.as_millis() as i64;
                let warning_ms = self.options().host_grace_warning.as_millis() as i64;

                if elapsed_ms > grace_ms {
                    tracing::info!(%pin, elapsed_ms, "Host grace period exceeded, closing room");
                    self.close_room_locked(&room, "Host reconnection timeout");
                    continue;
                }
                let remaining_ms = grace_ms - elapsed_ms;
                if remaining_ms <= warning_ms && !room.host_warning_sent() {
                    room.mark_host_warning_sent();
                    self.broadcaster().broadcast(
                        &pin,
                        Arc::new(ServerMessage::HostDisconnectedWarning { remaining_ms }),
                    );
                }
            }

            // Player grace: hard-remove anyone disconnected past the window.
            let player_grace_ms = self.options().player_grace.as_millis() as i64;
            let expired_players: Vec<PlayerId> = room
                .players()
                .filter(|player| {
                    player.disconnected_at.is_some_and(|at| {
                        now.signed_duration_since(at).num_milliseconds() > player_grace_ms
                    })
                })
                .map(|player| player.id)
                .collect();
            for player_id in expired_players {
                if let Some(player) = room.remove_player(&player_id) {
                    self.store().release_player_token(&player.player_token);
                    tracing::info!(%pin, %player_id, "Player grace period exceeded, removing");
                    self.broadcaster().broadcast(
                        &pin,
                        Arc::new(ServerMessage::PlayerLeft {
                            player_id,
                            nickname: player.nickname,
                            reason: LeaveReason::GraceExpired,
                        }),
                    );
                }
            }

            // Spectators get the same window as players.
            let expired_spectators: Vec<SpectatorId> = room
                .spectators()
                .filter(|spectator| {
                    spectator.disconnected_at.is_some_and(|at| {
                        now.signed_duration_since(at).num_milliseconds() > player_grace_ms
                    })
                })
                .map(|spectator| spectator.id)
                .collect();
            for spectator_id in expired_spectators {
                if let Some(spectator) = room.remove_spectator(&spectator_id) {
                    self.store()
                        .release_spectator_token(&spectator.spectator_token);
                    self.broadcaster().broadcast(
                        &pin,
                        Arc::new(ServerMessage::SpectatorLeft {
                            spectator_id,
                            nickname: spectator.nickname,
                        }),
                    );
                }
            }
        }
    }
}
