//! In-memory room repository with O(1) cross-room indexes.
//!
//! Rooms live behind one async mutex each; every use-case that touches a
//! room holds that lock for its whole critical section. The index maps
//! (PIN, socket, tokens, host user) are dashmaps whose short sharded locks
//! are never held across `.await`. Index writes happen inside the owning
//! room's critical section, so lookups observe a consistent room.
//!
//! A distributed backing store can replace this type behind the same
//! surface; nothing outside this module touches the maps directly.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::protocol::{GameError, ParticipantRole, Pin, PlayerId, SocketId, SpectatorId, UserId};
use crate::room::Room;

/// What a socket is doing, resolved via the socket index.
#[derive(Debug, Clone)]
pub struct SocketBinding {
    pub pin: Pin,
    pub role: ParticipantRole,
    pub participant_id: Uuid,
}

pub struct RoomStore {
    rooms: DashMap<Pin, Arc<Mutex<Room>>>,
    sockets: DashMap<SocketId, SocketBinding>,
    host_tokens: DashMap<String, Pin>,
    player_tokens: DashMap<String, (Pin, PlayerId)>,
    spectator_tokens: DashMap<String, (Pin, SpectatorId)>,
    host_users: DashMap<UserId, Pin>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            sockets: DashMap::new(),
            host_tokens: DashMap::new(),
            player_tokens: DashMap::new(),
            spectator_tokens: DashMap::new(),
            host_users: DashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Creation & lookup
    // ------------------------------------------------------------------

    /// Draw PINs until a free one is found, build the room for it, and claim
    /// the slot. The entry API makes the uniqueness check and the insert one
    /// atomic step, so two concurrent creates can never share a PIN.
    pub fn create_room<F>(
        &self,
        max_attempts: u32,
        build: F,
    ) -> Result<(Pin, Arc<Mutex<Room>>), GameError>
    where
        F: FnOnce(Pin) -> Room,
    {
        let mut build = Some(build);
        for _ in 0..max_attempts {
            let pin = Pin::generate();
            match self.rooms.entry(pin.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let factory = build
                        .take()
                        .ok_or_else(|| GameError::Internal("room factory consumed".to_string()))?;
                    let room = Arc::new(Mutex::new(factory(pin.clone())));
                    slot.insert(Arc::clone(&room));
                    return Ok((pin, room));
                }
            }
        }
        Err(GameError::PinSpaceExhausted)
    }

    pub fn find(&self, pin: &Pin) -> Option<Arc<Mutex<Room>>> {
        self.rooms.get(pin).map(|entry| Arc::clone(entry.value()))
    }

    pub fn exists(&self, pin: &Pin) -> bool {
        self.rooms.contains_key(pin)
    }

    pub fn find_by_socket(&self, socket_id: SocketId) -> Option<SocketBinding> {
        self.sockets.get(&socket_id).map(|entry| entry.value().clone())
    }

    pub fn find_by_host_token(&self, token: &str) -> Option<Pin> {
        self.host_tokens.get(token).map(|entry| entry.value().clone())
    }

    pub fn find_by_player_token(&self, token: &str) -> Option<(Pin, PlayerId)> {
        self.player_tokens
            .get(token)
            .map(|entry| entry.value().clone())
    }

    pub fn find_by_spectator_token(&self, token: &str) -> Option<(Pin, SpectatorId)> {
        self.spectator_tokens
            .get(token)
            .map(|entry| entry.value().clone())
    }

    pub fn find_by_host_user(&self, user_id: UserId) -> Option<Pin> {
        self.host_users.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn all_pins(&self) -> Vec<Pin> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    // ------------------------------------------------------------------
    // Index maintenance
    // ------------------------------------------------------------------

    /// Upsert every index entry derived from the room's current mutable
    /// fields. Call while holding the room lock. Keys abandoned by a
    /// mutation (rotated tokens, removed participants, unbound sockets) are
    /// dropped by the matching `release_*` call on that path.
    pub fn save(&self, room: &Room) {
        let pin = room.pin().clone();

        self.host_tokens
            .insert(room.host_token().to_string(), pin.clone());
        self.host_users.insert(room.host_id(), pin.clone());
        if let Some(socket_id) = room.host_socket_id() {
            self.sockets.insert(
                socket_id,
                SocketBinding {
                    pin: pin.clone(),
                    role: ParticipantRole::Host,
                    participant_id: room.host_id(),
                },
            );
        }

        for player in room.players() {
            self.player_tokens
                .insert(player.player_token.clone(), (pin.clone(), player.id));
            if let Some(socket_id) = player.socket_id {
                self.sockets.insert(
                    socket_id,
                    SocketBinding {
                        pin: pin.clone(),
                        role: ParticipantRole::Player,
                        participant_id: player.id,
                    },
                );
            }
        }

        for spectator in room.spectators() {
            self.spectator_tokens
                .insert(spectator.spectator_token.clone(), (pin.clone(), spectator.id));
            if let Some(socket_id) = spectator.socket_id {
                self.sockets.insert(
                    socket_id,
                    SocketBinding {
                        pin: pin.clone(),
                        role: ParticipantRole::Spectator,
                        participant_id: spectator.id,
                    },
                );
            }
        }
    }

    /// Drop a socket binding (disconnect, leave, kick).
    pub fn release_socket(&self, socket_id: SocketId) {
        self.sockets.remove(&socket_id);
    }

    /// Drop a player token that rotated or whose player left.
    pub fn release_player_token(&self, token: &str) {
        self.player_tokens.remove(token);
    }

    /// Drop a spectator token that rotated or whose spectator left.
    pub fn release_spectator_token(&self, token: &str) {
        self.spectator_tokens.remove(token);
    }

    /// Remove a room and every index entry that points at it. Call while
    /// holding the room lock so no use-case observes a half-deleted room.
    pub fn delete(&self, room: &Room) {
        let pin = room.pin();
        self.rooms.remove(pin);
        self.host_tokens.remove(room.host_token());
        self.host_users
            .remove_if(&room.host_id(), |_, indexed| indexed == pin);
        if let Some(socket_id) = room.host_socket_id() {
            self.sockets.remove(&socket_id);
        }
        for player in room.players() {
            self.player_tokens.remove(&player.player_token);
            if let Some(socket_id) = player.socket_id {
                self.sockets.remove(&socket_id);
            }
        }
        for spectator in room.spectators() {
            self.spectator_tokens.remove(&spectator.spectator_token);
            if let Some(socket_id) = spectator.socket_id {
                self.sockets.remove(&socket_id);
            }
        }
    }
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::protocol::Nickname;
    use crate::quiz::test_support::sample_quiz;
    use crate::room::Player;
    use crate::security::tokens;

    fn new_room(pin: Pin) -> Room {
        Room::new(
            pin,
            Uuid::new_v4(),
            tokens::generate(),
            Uuid::new_v4(),
            Arc::new(sample_quiz(1, 1000, 10)),
        )
    }

    #[tokio::test]
    async fn create_room_allocates_unique_pins() {
        let store = RoomStore::new();
        let mut pins = std::collections::HashSet::new();
        for _ in 0..50 {
            let (pin, _) = store.create_room(50, new_room).unwrap();
            assert!(pins.insert(pin));
        }
        assert_eq!(store.room_count(), 50);
    }

    #[tokio::test]
    async fn allocation_exhaustion_is_capacity_exceeded() {
        let store = RoomStore::new();
        let result = store.create_room(0, new_room);
        assert!(matches!(result, Err(GameError::PinSpaceExhausted)));
    }

    #[tokio::test]
    async fn save_populates_every_index() {
        let store = RoomStore::new();
        let (pin, room) = store.create_room(50, new_room).unwrap();

        let mut room = room.lock().await;
        let nick = Nickname::parse("Alice", &ProtocolConfig::default()).unwrap();
        let player_socket = Uuid::new_v4();
        let player = Player::new(&nick, player_socket, tokens::generate());
        let player_token = player.player_token.clone();
        let player_id = room.add_player(player).unwrap().id;
        store.save(&room);

        assert!(store.exists(&pin));
        assert_eq!(store.find_by_host_token(room.host_token()), Some(pin.clone()));
        assert_eq!(store.find_by_host_user(room.host_id()), Some(pin.clone()));
        assert_eq!(
            store.find_by_player_token(&player_token),
            Some((pin.clone(), player_id))
        );

        let binding = store.find_by_socket(player_socket).unwrap();
        assert_eq!(binding.pin, pin);
        assert!(matches!(binding.role, ParticipantRole::Player));
        assert_eq!(binding.participant_id, player_id);

        let host_binding = store
            .find_by_socket(room.host_socket_id().unwrap())
            .unwrap();
        assert!(matches!(host_binding.role, ParticipantRole::Host));
    }

    #[tokio::test]
    async fn rotated_tokens_replace_index_entries() {
        let store = RoomStore::new();
        let (pin, room) = store.create_room(50, new_room).unwrap();

        let mut room = room.lock().await;
        let nick = Nickname::parse("Alice", &ProtocolConfig::default()).unwrap();
        let socket = Uuid::new_v4();
        let player = Player::new(&nick, socket, tokens::generate());
        let old_token = player.player_token.clone();
        let player_id = room.add_player(player).unwrap().id;
        store.save(&room);

        room.set_player_disconnected(socket, chrono::Utc::now());
        store.release_socket(socket);

        let new_token = tokens::generate();
        room.reconnect_player(
            &old_token,
            Uuid::new_v4(),
            std::time::Duration::from_secs(120),
            new_token.clone(),
            chrono::Utc::now(),
        )
        .unwrap();
        store.save(&room);
        store.release_player_token(&old_token);

        assert_eq!(store.find_by_player_token(&old_token), None);
        assert_eq!(
            store.find_by_player_token(&new_token),
            Some((pin, player_id))
        );
    }

    #[tokio::test]
    async fn delete_drops_all_indexes() {
        let store = RoomStore::new();
        let (pin, room) = store.create_room(50, new_room).unwrap();

        let mut guard = room.lock().await;
        let nick = Nickname::parse("Alice", &ProtocolConfig::default()).unwrap();
        let socket = Uuid::new_v4();
        let player = Player::new(&nick, socket, tokens::generate());
        let token = player.player_token.clone();
        guard.add_player(player).unwrap();
        store.save(&guard);

        store.delete(&guard);
        assert!(!store.exists(&pin));
        assert_eq!(store.find_by_host_token(guard.host_token()), None);
        assert_eq!(store.find_by_host_user(guard.host_id()), None);
        assert_eq!(store.find_by_player_token(&token), None);
        assert!(store.find_by_socket(socket).is_none());
        assert!(store.all_pins().is_empty());
    }
}
