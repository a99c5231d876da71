use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::domain::errors::SendBufferFull;
use crate::use_cases::room::RoomHandle;

/// Capacity of the per-player outbound frame buffer. A player whose buffer
/// saturates is treated as a disconnected slow client and removed.
pub const SEND_BUFFER_CAPACITY: usize = 1024;

/// Chat rate limit: sustained tokens per second and burst size. Applied to
/// chat messages only; drawing frames and control packets pass untouched.
pub const CHAT_TOKENS_PER_SECOND: f64 = 2.0;
pub const CHAT_BURST: f64 = 5.0;

fn next_conn_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Handle to one connected session, held by the owning room.
///
/// One player equals one session. The room is the single source of truth for
/// teardown: `cancel_and_release` flips the cancel signal, both pumps exit on
/// their next iteration and the network session closes with them. Identity is
/// the process-unique connection id, so two sessions for the same username
/// are distinct players.
#[derive(Debug, Clone)]
pub struct Player {
    conn_id: u64,
    user_id: Uuid,
    username: Arc<str>,
    send_tx: mpsc::Sender<Vec<u8>>,
    ping_tx: mpsc::Sender<()>,
    cancel_tx: watch::Sender<bool>,
    room: Arc<OnceLock<RoomHandle>>,
}

/// Receiver halves consumed by the session write pump.
pub struct PlayerReceivers {
    pub send_rx: mpsc::Receiver<Vec<u8>>,
    pub ping_rx: mpsc::Receiver<()>,
    pub cancel_rx: watch::Receiver<bool>,
}

impl Player {
    /// Wires up a new player and the receiver halves for its session pumps.
    pub fn connect(user_id: Uuid, username: &str) -> (Player, PlayerReceivers) {
        let (send_tx, send_rx) = mpsc::channel(SEND_BUFFER_CAPACITY);
        let (ping_tx, ping_rx) = mpsc::channel(1);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let player = Player {
            conn_id: next_conn_id(),
            user_id,
            username: Arc::from(username),
            send_tx,
            ping_tx,
            cancel_tx,
            room: Arc::new(OnceLock::new()),
        };
        (
            player,
            PlayerReceivers {
                send_rx,
                ping_rx,
                cancel_rx,
            },
        )
    }

    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn username_arc(&self) -> Arc<str> {
        self.username.clone()
    }

    /// Queues outbound bytes without blocking. A full or closed buffer is a
    /// `SendBufferFull`; the caller reacts by removing the player.
    pub fn enqueue(&self, bytes: Vec<u8>) -> Result<(), SendBufferFull> {
        self.send_tx.try_send(bytes).map_err(|_| SendBufferFull)
    }

    /// Requests a protocol-level ping, keeping at most one outstanding. A
    /// full slot drops the request silently; a closed slot means the player
    /// was released and reports an error.
    pub fn request_ping(&self) -> Result<(), SendBufferFull> {
        match self.ping_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => Ok(()),
            Err(TrySendError::Closed(())) => Err(SendBufferFull),
        }
    }

    /// Idempotent teardown signal. Safe to call any number of times.
    pub fn cancel_and_release(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Fresh subscription to the cancel signal for a pump.
    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    /// Records the owning room. Called exactly once, by the room actor when
    /// the player is admitted (or at construction for a room host).
    pub fn set_room(&self, handle: RoomHandle) {
        let _ = self.room.set(handle);
    }

    pub fn room(&self) -> Option<&RoomHandle> {
        self.room.get()
    }
}

/// Token bucket used for inbound chat rate limiting. Owned by a single read
/// pump, so no locking is involved.
#[derive(Debug)]
pub struct TokenBucket {
    tokens: f64,
    rate: f64,
    burst: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            tokens: burst,
            rate,
            burst,
            last_refill: Instant::now(),
        }
    }

    /// Takes one token if available.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
