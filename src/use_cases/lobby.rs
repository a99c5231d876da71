use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::domain::errors::JoinError;
use crate::domain::ports::TickerSource;
use crate::use_cases::idgen::RoomIdGenerator;
use crate::use_cases::room::{JoinRequest, Room, RoomDescription, RoomHandle};

const ADD_CAPACITY: usize = 16;
const JOIN_ROUTING_CAPACITY: usize = 64;
const QUERY_CAPACITY: usize = 16;
const ROOM_FEEDBACK_CAPACITY: usize = 64;

/// Cadence settings for the lobby's periodic fan-outs.
#[derive(Debug, Clone)]
pub struct LobbySettings {
    /// Period of the game tick fanned to every room.
    pub game_tick_period: Duration,
    /// Period of the keepalive ping fanned to every room.
    pub ping_period: Duration,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            game_tick_period: Duration::from_secs(1),
            ping_period: Duration::from_secs(30),
        }
    }
}

/// Join request routed through the lobby to a target room.
#[derive(Debug)]
pub struct LobbyJoinRequest {
    pub room_id: String,
    pub request: JoinRequest,
}

/// Submission surface for front handlers. All operations funnel into the
/// single lobby actor.
#[derive(Debug, Clone)]
pub struct LobbyHandle {
    add_tx: mpsc::Sender<Room>,
    join_tx: mpsc::Sender<LobbyJoinRequest>,
    games_tx: mpsc::Sender<oneshot::Sender<Vec<RoomDescription>>>,
}

impl LobbyHandle {
    /// Hands a freshly built room to the lobby, which assigns an id and
    /// starts its actor. Returns false if the lobby is gone.
    pub async fn add_and_run_room(&self, room: Room) -> bool {
        self.add_tx.send(room).await.is_ok()
    }

    /// Routes a join request to the room with the given id. The reply
    /// arrives on the request's own channel.
    pub async fn request_join(&self, room_id: String, request: JoinRequest) {
        if let Err(e) = self.join_tx.send(LobbyJoinRequest { room_id, request }).await {
            let _ = e.0.request.reply_tx.send(Err(JoinError::RoomNotFound));
        }
    }

    /// Snapshot of the public room descriptions.
    pub async fn public_games(&self) -> Vec<RoomDescription> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.games_tx.send(reply_tx).await.is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }
}

/// Handle rooms use to talk back to their parent lobby.
#[derive(Debug, Clone)]
pub struct LobbyBackHandle {
    remove_tx: mpsc::Sender<String>,
    desc_tx: mpsc::Sender<RoomDescription>,
}

impl LobbyBackHandle {
    /// Asks the lobby to drop this room from its directory.
    pub fn request_remove(&self, room_id: String) {
        if self.remove_tx.try_send(room_id).is_err() {
            warn!("lobby removal channel saturated; room removal delayed");
        }
    }

    /// Publishes an updated room description.
    pub fn update_description(&self, description: RoomDescription) {
        let _ = self.desc_tx.try_send(description);
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> (
        Self,
        mpsc::Receiver<String>,
        mpsc::Receiver<RoomDescription>,
    ) {
        let (remove_tx, remove_rx) = mpsc::channel(ROOM_FEEDBACK_CAPACITY);
        let (desc_tx, desc_rx) = mpsc::channel(ROOM_FEEDBACK_CAPACITY);
        (Self { remove_tx, desc_tx }, remove_rx, desc_rx)
    }
}

/// Completion signal for graceful shutdown: resolves once the lobby actor
/// and every room actor it spawned have returned.
pub struct LobbyShutdown {
    done_rx: mpsc::Receiver<()>,
}

impl LobbyShutdown {
    pub async fn wait(mut self) {
        // Guard senders are held by the lobby and by each room task; recv
        // yields None only after the last one is dropped.
        while self.done_rx.recv().await.is_some() {}
    }
}

struct LobbyChannels {
    add_rx: mpsc::Receiver<Room>,
    join_rx: mpsc::Receiver<LobbyJoinRequest>,
    games_rx: mpsc::Receiver<oneshot::Sender<Vec<RoomDescription>>>,
    remove_rx: mpsc::Receiver<String>,
    desc_rx: mpsc::Receiver<RoomDescription>,
    tick_rx: mpsc::Receiver<SystemTime>,
    ping_rx: mpsc::Receiver<SystemTime>,
}

/// The lobby actor: owns the room directory, the public descriptions and the
/// id generator, and fans time signals to every room.
pub struct Lobby {
    rooms: HashMap<String, RoomHandle>,
    public_descriptions: HashMap<String, RoomDescription>,
    id_generator: RoomIdGenerator,
    back_handle: LobbyBackHandle,
    room_guard: mpsc::Sender<()>,
}

impl Lobby {
    /// Spawns the lobby actor and waits for its started handshake, so
    /// callers can submit requests as soon as this returns.
    pub async fn start(ticker: &dyn TickerSource, settings: LobbySettings) -> (LobbyHandle, LobbyShutdown) {
        let (add_tx, add_rx) = mpsc::channel(ADD_CAPACITY);
        let (join_tx, join_rx) = mpsc::channel(JOIN_ROUTING_CAPACITY);
        let (games_tx, games_rx) = mpsc::channel(QUERY_CAPACITY);
        let (remove_tx, remove_rx) = mpsc::channel(ROOM_FEEDBACK_CAPACITY);
        let (desc_tx, desc_rx) = mpsc::channel(ROOM_FEEDBACK_CAPACITY);
        let (guard_tx, guard_rx) = mpsc::channel(1);

        let channels = LobbyChannels {
            add_rx,
            join_rx,
            games_rx,
            remove_rx,
            desc_rx,
            tick_rx: ticker.ticks(settings.game_tick_period),
            ping_rx: ticker.ticks(settings.ping_period),
        };
        let lobby = Lobby {
            rooms: HashMap::new(),
            public_descriptions: HashMap::new(),
            id_generator: RoomIdGenerator::new(),
            back_handle: LobbyBackHandle { remove_tx, desc_tx },
            room_guard: guard_tx,
        };

        let (started_tx, started_rx) = oneshot::channel();
        tokio::spawn(lobby.run(channels, started_tx));
        let _ = started_rx.await;

        (
            LobbyHandle {
                add_tx,
                join_tx,
                games_tx,
            },
            LobbyShutdown { done_rx: guard_rx },
        )
    }

    async fn run(mut self, mut ch: LobbyChannels, started_tx: oneshot::Sender<()>) {
        let _ = started_tx.send(());
        info!("lobby actor started");

        // Once the front handle closes, the lobby stops accepting work but
        // keeps ticking so in-flight games can run to completion.
        let mut accepting = true;
        loop {
            tokio::select! {
                room = ch.add_rx.recv(), if accepting => match room {
                    Some(room) => self.add_and_run(room),
                    None => accepting = false,
                },
                Some(join) = ch.join_rx.recv() => self.route_join(join),
                Some(reply_tx) = ch.games_rx.recv() => {
                    let _ = reply_tx.send(self.public_descriptions.values().cloned().collect());
                },
                Some(room_id) = ch.remove_rx.recv() => self.remove_room(&room_id),
                Some(description) = ch.desc_rx.recv() => self.update_description(description),
                Some(now) = ch.tick_rx.recv() => {
                    for room in self.rooms.values() {
                        room.tick(now);
                    }
                },
                Some(_) = ch.ping_rx.recv() => {
                    for room in self.rooms.values() {
                        room.ping_players();
                    }
                },
                else => break,
            }

            if !accepting && self.rooms.is_empty() {
                break;
            }
        }
        info!("lobby actor stopped");
    }

    fn add_and_run(&mut self, mut room: Room) {
        let id = self.id_generator.generate();
        room.set_id(id.clone());
        room.set_parent_lobby(self.back_handle.clone());

        let handle = room.handle();
        let description = room.description();
        self.rooms.insert(id.clone(), handle);
        if !description.private {
            self.public_descriptions.insert(id.clone(), description);
        }

        let guard = self.room_guard.clone();
        tokio::spawn(async move {
            room.game_loop().await;
            drop(guard);
        });
        info!(room_id = %id, "room registered");
    }

    fn route_join(&mut self, join: LobbyJoinRequest) {
        match self.rooms.get(&join.room_id) {
            Some(room) => room.request_join(join.request),
            None => {
                debug!(room_id = %join.room_id, "join to unknown room");
                let _ = join.request.reply_tx.send(Err(JoinError::RoomNotFound));
            }
        }
    }

    fn remove_room(&mut self, room_id: &str) {
        if let Some(room) = self.rooms.remove(room_id) {
            self.public_descriptions.remove(room_id);
            room.close_and_release();
            self.id_generator.dispose(room_id);
            info!(room_id, "room removed");
        }
    }

    fn update_description(&mut self, description: RoomDescription) {
        if description.private {
            return;
        }
        // A room may publish an update concurrently with its own removal;
        // never resurrect a description for a room already gone.
        if self.rooms.contains_key(&description.id) {
            self.public_descriptions
                .insert(description.id.clone(), description);
        }
    }
}
