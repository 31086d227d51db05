//! Per-room authoritative countdown timers.
//!
//! Each room has at most one active timer. The timer task broadcasts a
//! best-effort 1 Hz `timer_tick` to the PIN group and, at the absolute
//! deadline, a `time_expired` broadcast plus an expiry hand-off over a
//! channel. The receiving driver acquires the room lock before advancing the
//! state machine, the same as any other use-case.
//!
//! Broadcast payloads carry absolute `server_time` and `end_time` (Unix ms)
//! so clients can correct for clock skew instead of trusting tick cadence.
//!
//! `stop` flags the entry before aborting the task, so a tick that already
//! fired cannot broadcast after the round ended.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::broadcast::Broadcaster;
use crate::protocol::{Pin, ServerMessage, TimerSyncPayload};

struct TimerEntry {
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
    end_time_ms: i64,
}

pub struct RoomTimerService {
    timers: Arc<DashMap<Pin, TimerEntry>>,
    broadcaster: Arc<Broadcaster>,
    tick_interval: Duration,
    expiry_tx: mpsc::UnboundedSender<Pin>,
}

impl RoomTimerService {
    /// Build the service and the expiry channel consumed by the game driver.
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        tick_interval: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Pin>) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let service = Arc::new(Self {
            timers: Arc::new(DashMap::new()),
            broadcaster,
            tick_interval,
            expiry_tx,
        });
        (service, expiry_rx)
    }

    fn sync_payload(end_time_ms: i64) -> TimerSyncPayload {
        let server_time = Utc::now().timestamp_millis();
        let remaining_ms = (end_time_ms - server_time).max(0);
        TimerSyncPayload {
            server_time,
            end_time: end_time_ms,
            remaining_ms,
            // Whole seconds, rounded up for display.
            remaining: ((remaining_ms as u64).div_ceil(1000)) as u32,
        }
    }

    /// Start (or restart) the room's timer and broadcast `timer_started`
    /// followed by an immediate first tick.
    pub fn start(&self, pin: &Pin, duration_secs: u32) {
        self.stop(pin);

        let duration_ms = i64::from(duration_secs) * 1000;
        let server_time = Utc::now().timestamp_millis();
        let end_time_ms = server_time + duration_ms;
        let stopped = Arc::new(AtomicBool::new(false));

        self.broadcaster.broadcast(
            pin,
            Arc::new(ServerMessage::TimerStarted {
                duration: duration_secs,
                duration_ms,
                server_time,
                end_time: end_time_ms,
            }),
        );
        self.broadcaster
            .broadcast(pin, Arc::new(ServerMessage::TimerTick(Self::sync_payload(end_time_ms))));

        let task = tokio::spawn(run_timer(
            Arc::clone(&self.timers),
            Arc::clone(&self.broadcaster),
            pin.clone(),
            Arc::clone(&stopped),
            end_time_ms,
            Duration::from_millis(duration_ms as u64),
            self.tick_interval,
            self.expiry_tx.clone(),
        ));

        self.timers.insert(
            pin.clone(),
            TimerEntry {
                stopped,
                task,
                end_time_ms,
            },
        );
    }

    /// Idempotent stop. Flags first, then aborts, so an in-flight tick or
    /// expiry observes the flag and stays silent.
    pub fn stop(&self, pin: &Pin) {
        if let Some((_, entry)) = self.timers.remove(pin) {
            entry.stopped.store(true, Ordering::Release);
            entry.task.abort();
        }
    }

    /// Current snapshot for a reconnecting client, if a timer is running.
    pub fn sync(&self, pin: &Pin) -> Option<TimerSyncPayload> {
        let entry = self.timers.get(pin)?;
        if entry.stopped.load(Ordering::Acquire) {
            return None;
        }
        Some(Self::sync_payload(entry.end_time_ms))
    }

    pub fn is_active(&self, pin: &Pin) -> bool {
        self.timers
            .get(pin)
            .is_some_and(|entry| !entry.stopped.load(Ordering::Acquire))
    }

    /// Stop every timer. Called on shutdown so no callback outlives the
    /// server.
    pub fn stop_all(&self) {
        let pins: Vec<Pin> = self.timers.iter().map(|entry| entry.key().clone()).collect();
        for pin in pins {
            self.stop(&pin);
        }
    }
}

async fn run_timer(
    timers: Arc<DashMap<Pin, TimerEntry>>,
    broadcaster: Arc<Broadcaster>,
    pin: Pin,
    stopped: Arc<AtomicBool>,
    end_time_ms: i64,
    duration: Duration,
    tick_interval: Duration,
    expiry_tx: mpsc::UnboundedSender<Pin>,
) {
    let deadline = Instant::now() + duration;
    let mut interval = tokio::time::interval_at(Instant::now() + tick_interval, tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let expiry = tokio::time::sleep_until(deadline);
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if stopped.load(Ordering::Acquire) {
                    return;
                }
                broadcaster.broadcast(
                    &pin,
                    Arc::new(ServerMessage::TimerTick(RoomTimerService::sync_payload(end_time_ms))),
                );
            }
            () = &mut expiry => {
                // swap guards against a concurrent stop() between the flag
                // check and the broadcast.
                if !stopped.swap(true, Ordering::AcqRel) {
                    broadcaster.broadcast(
                        &pin,
                        Arc::new(ServerMessage::TimeExpired {
                            server_time: Utc::now().timestamp_millis(),
                        }),
                    );
                    if expiry_tx.send(pin.clone()).is_err() {
                        tracing::warn!(%pin, "Timer expiry receiver gone, room will not advance");
                    }
                }
                // Remove only our own registry entry; a restarted timer owns
                // a fresh one.
                timers.remove_if(&pin, |_, entry| Arc::ptr_eq(&entry.stopped, &stopped));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::SOCKET_QUEUE_CAPACITY;
    use uuid::Uuid;

    fn pin() -> Pin {
        Pin::parse("123456").unwrap()
    }

    fn wire_group(broadcaster: &Broadcaster, pin: &Pin) -> mpsc::Receiver<Arc<ServerMessage>> {
        let socket_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SOCKET_QUEUE_CAPACITY);
        broadcaster.register_socket(socket_id, tx);
        broadcaster.join_group(pin, socket_id);
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<ServerMessage>>) -> Vec<Arc<ServerMessage>> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_is_handed_off_once() {
        let broadcaster = Arc::new(Broadcaster::new());
        let (service, mut expiry_rx) =
            RoomTimerService::new(Arc::clone(&broadcaster), Duration::from_millis(1000));
        let pin = pin();

        service.start(&pin, 2);
        assert!(service.is_active(&pin));

        let expired = expiry_rx.recv().await.unwrap();
        assert_eq!(expired, pin);
        assert!(!service.is_active(&pin));
        assert!(service.sync(&pin).is_none());

        // No second hand-off.
        let second = tokio::time::timeout(Duration::from_secs(10), expiry_rx.recv()).await;
        assert!(second.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn start_broadcasts_and_ticks() {
        let broadcaster = Arc::new(Broadcaster::new());
        let (service, mut expiry_rx) =
            RoomTimerService::new(Arc::clone(&broadcaster), Duration::from_millis(1000));
        let pin = pin();
        let mut rx = wire_group(&broadcaster, &pin);

        service.start(&pin, 3);
        expiry_rx.recv().await.unwrap();

        let messages = drain(&mut rx);
        assert!(matches!(
            messages.first().map(AsRef::as_ref),
            Some(ServerMessage::TimerStarted { duration: 3, .. })
        ));
        assert!(matches!(
            messages.get(1).map(AsRef::as_ref),
            Some(ServerMessage::TimerTick(_))
        ));
        assert!(matches!(
            messages.last().map(AsRef::as_ref),
            Some(ServerMessage::TimeExpired { .. })
        ));
        let tick_count = messages
            .iter()
            .filter(|m| matches!(m.as_ref(), ServerMessage::TimerTick(_)))
            .count();
        // Immediate tick plus roughly one per second.
        assert!(tick_count >= 3, "got {tick_count} ticks");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_the_timer() {
        let broadcaster = Arc::new(Broadcaster::new());
        let (service, mut expiry_rx) =
            RoomTimerService::new(Arc::clone(&broadcaster), Duration::from_millis(1000));
        let pin = pin();

        service.start(&pin, 2);
        service.stop(&pin);
        assert!(!service.is_active(&pin));
        assert!(service.sync(&pin).is_none());

        // Stop is idempotent.
        service.stop(&pin);

        let fired = tokio::time::timeout(Duration::from_secs(10), expiry_rx.recv()).await;
        assert!(fired.is_err(), "stopped timer must not hand off expiry");
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_the_previous_timer() {
        let broadcaster = Arc::new(Broadcaster::new());
        let (service, mut expiry_rx) =
            RoomTimerService::new(Arc::clone(&broadcaster), Duration::from_millis(1000));
        let pin = pin();

        service.start(&pin, 60);
        service.start(&pin, 1);

        // Only the second timer fires, and promptly.
        let expired =
            tokio::time::timeout(Duration::from_secs(5), expiry_rx.recv()).await.unwrap();
        assert_eq!(expired, Some(pin.clone()));
        let second = tokio::time::timeout(Duration::from_secs(120), expiry_rx.recv()).await;
        assert!(second.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn sync_reports_remaining_time() {
        let broadcaster = Arc::new(Broadcaster::new());
        let (service, _expiry_rx) =
            RoomTimerService::new(Arc::clone(&broadcaster), Duration::from_millis(1000));
        let pin = pin();

        service.start(&pin, 30);
        let sync = service.sync(&pin).unwrap();
        assert!(sync.remaining_ms > 0);
        assert!(sync.remaining_ms <= 30_000);
        assert!(sync.remaining <= 30);
        assert_eq!(sync.end_time - sync.server_time, sync.remaining_ms);

        service.stop_all();
        assert!(service.sync(&pin).is_none());
    }
}
