//! Outbound fan-out: socket registry and per-PIN broadcast groups.
//!
//! Messages are wrapped in `Arc` once and the pointer is cloned per
//! recipient, so broadcasting to a room costs O(recipients) pointer clones
//! rather than O(recipients * message size). Sends are non-blocking: a
//! socket whose queue is full has its frame dropped (and logged) instead of
//! stalling the room's critical section.

use dashmap::DashMap;
use smallvec::SmallVec;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::{Pin, ServerMessage, SocketId};

/// Queue depth per socket. Bursts beyond this indicate a client that has
/// stopped reading; dropping is preferable to holding the room lock hostage.
pub const SOCKET_QUEUE_CAPACITY: usize = 64;

/// Stack capacity for typical room rosters.
const TYPICAL_ROOM_SOCKETS: usize = 16;

type SocketList = SmallVec<[SocketId; TYPICAL_ROOM_SOCKETS]>;

/// Socket registry plus per-PIN broadcast groups.
pub struct Broadcaster {
    sockets: DashMap<SocketId, mpsc::Sender<Arc<ServerMessage>>>,
    groups: DashMap<Pin, SocketList>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            sockets: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    /// Register a socket's outbound queue.
    pub fn register_socket(&self, socket_id: SocketId, sender: mpsc::Sender<Arc<ServerMessage>>) {
        self.sockets.insert(socket_id, sender);
    }

    /// Remove a socket from the registry. Group membership is dropped by
    /// `leave_group` on the disconnect path; a dangling group entry is
    /// harmless because sends to unknown sockets are no-ops.
    pub fn unregister_socket(&self, socket_id: SocketId) {
        self.sockets.remove(&socket_id);
    }

    /// Add a socket to a PIN group (idempotent).
    pub fn join_group(&self, pin: &Pin, socket_id: SocketId) {
        let mut members = self.groups.entry(pin.clone()).or_default();
        if !members.contains(&socket_id) {
            members.push(socket_id);
        }
    }

    /// Remove a socket from a PIN group; drops the group when it empties.
    pub fn leave_group(&self, pin: &Pin, socket_id: SocketId) {
        if let Some(mut members) = self.groups.get_mut(pin) {
            members.retain(|member| *member != socket_id);
        }
        self.groups.remove_if(pin, |_, members| members.is_empty());
    }

    /// Drop a whole group (room closed).
    pub fn remove_group(&self, pin: &Pin) {
        self.groups.remove(pin);
    }

    pub fn group_size(&self, pin: &Pin) -> usize {
        self.groups.get(pin).map_or(0, |members| members.len())
    }

    /// Send to one socket. Unknown sockets and full queues drop the frame.
    pub fn send_to(&self, socket_id: SocketId, message: Arc<ServerMessage>) {
        let Some(sender) = self.sockets.get(&socket_id) else {
            return;
        };
        match sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%socket_id, "Outbound queue full, dropping frame");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(%socket_id, "Outbound queue closed, dropping frame");
            }
        }
    }

    /// Broadcast to every socket in a PIN group.
    pub fn broadcast(&self, pin: &Pin, message: Arc<ServerMessage>) {
        self.broadcast_except(pin, message, None);
    }

    /// Broadcast to a PIN group, optionally skipping one socket.
    pub fn broadcast_except(
        &self,
        pin: &Pin,
        message: Arc<ServerMessage>,
        except: Option<SocketId>,
    ) {
        let recipients: SocketList = match self.groups.get(pin) {
            Some(members) => members
                .iter()
                .copied()
                .filter(|member| Some(*member) != except)
                .collect(),
            None => return,
        };
        for socket_id in recipients {
            self.send_to(socket_id, Arc::clone(&message));
        }
    }

    /// Send the same message to an explicit socket list (role-targeted
    /// emissions like `show_results` vs `round_ended`).
    pub fn send_to_all(&self, sockets: &[SocketId], message: Arc<ServerMessage>) {
        for socket_id in sockets {
            self.send_to(*socket_id, Arc::clone(&message));
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pin() -> Pin {
        Pin::parse("123456").unwrap()
    }

    fn message() -> Arc<ServerMessage> {
        Arc::new(ServerMessage::HostReturned)
    }

    fn register(broadcaster: &Broadcaster) -> (SocketId, mpsc::Receiver<Arc<ServerMessage>>) {
        let socket_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SOCKET_QUEUE_CAPACITY);
        broadcaster.register_socket(socket_id, tx);
        (socket_id, rx)
    }

    #[tokio::test]
    async fn broadcast_reaches_all_group_members() {
        let broadcaster = Broadcaster::new();
        let (a, mut rx_a) = register(&broadcaster);
        let (b, mut rx_b) = register(&broadcaster);
        let (_outsider, mut rx_c) = register(&broadcaster);

        broadcaster.join_group(&pin(), a);
        broadcaster.join_group(&pin(), b);

        broadcaster.broadcast(&pin(), message());
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_except_skips_one() {
        let broadcaster = Broadcaster::new();
        let (a, mut rx_a) = register(&broadcaster);
        let (b, mut rx_b) = register(&broadcaster);
        broadcaster.join_group(&pin(), a);
        broadcaster.join_group(&pin(), b);

        broadcaster.broadcast_except(&pin(), message(), Some(a));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn leave_group_stops_delivery() {
        let broadcaster = Broadcaster::new();
        let (a, mut rx_a) = register(&broadcaster);
        broadcaster.join_group(&pin(), a);
        broadcaster.leave_group(&pin(), a);

        broadcaster.broadcast(&pin(), message());
        assert!(rx_a.try_recv().is_err());
        assert_eq!(broadcaster.group_size(&pin()), 0);
    }

    #[tokio::test]
    async fn join_group_is_idempotent() {
        let broadcaster = Broadcaster::new();
        let (a, mut rx_a) = register(&broadcaster);
        broadcaster.join_group(&pin(), a);
        broadcaster.join_group(&pin(), a);

        broadcaster.broadcast(&pin(), message());
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let broadcaster = Broadcaster::new();
        let socket_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(1);
        broadcaster.register_socket(socket_id, tx);

        broadcaster.send_to(socket_id, message());
        // Queue full: this one is dropped, not awaited.
        broadcaster.send_to(socket_id, message());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_unknown_socket_is_a_noop() {
        let broadcaster = Broadcaster::new();
        broadcaster.send_to(Uuid::new_v4(), message());
    }
}
