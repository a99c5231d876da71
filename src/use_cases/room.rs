use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::domain::errors::JoinError;
use crate::domain::ports::RandomWordSource;
use crate::interface_adapters::protocol::{
    epoch_ms, now_ms, ClientPacket, LeaderboardEntry, PlayerSnapshot, RoomSnapshot, ScoreDelta,
    ServerPacket,
};
use crate::use_cases::lobby::LobbyBackHandle;
use crate::use_cases::player::Player;

/// How long the turn summary stays on screen before the next turn.
const TURN_SUMMARY_DURATION: Duration = Duration::from_secs(5);

/// Sentinel deadline while the room is pending; ticks compare against this
/// and never fire.
const PENDING_TICK_HORIZON: Duration = Duration::from_secs(60 * 60 * 24 * 365);

const INBOX_CAPACITY: usize = 1024;
const REMOVAL_CAPACITY: usize = 64;

/// Phase of the room state machine. GAME_END is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RoomPhase {
    Pending,
    ChoosingWord,
    Drawing,
    TurnSummary,
    GameEnd,
}

/// Validated room configuration supplied at creation.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub max_players: usize,
    pub rounds_count: u32,
    pub words_count: usize,
    pub choosing_word_duration: Duration,
    pub drawing_duration: Duration,
    pub private: bool,
}

/// Read-model published to the lobby for the public games listing.
#[derive(Debug, Clone)]
pub struct RoomDescription {
    pub id: String,
    pub private: bool,
    pub players_count: usize,
    pub max_players: usize,
    pub started: bool,
}

/// Inbound message from a session to its room actor.
#[derive(Debug)]
pub struct ClientPacketEnvelope {
    pub packet: ClientPacket,
    pub sender: Arc<str>,
}

/// Join request routed to a room by the lobby. The reply channel carries the
/// admission result; the requesting handler blocks on it before upgrading.
#[derive(Debug)]
pub struct JoinRequest {
    pub player: Player,
    pub reply_tx: oneshot::Sender<Result<(), JoinError>>,
}

/// Per-room view of one player.
struct PlayerGameState {
    player: Player,
    username: Arc<str>,
    score: i64,
    score_increment: i64,
    has_guessed: bool,
}

impl PlayerGameState {
    fn new(player: Player) -> Self {
        let username = player.username_arc();
        Self {
            player,
            username,
            score: 0,
            score_increment: 0,
            has_guessed: false,
        }
    }
}

// Pending outbound I/O accumulated while handling one event and drained at
// the end of the iteration, so handler logic sees a stable set of players.
struct DataSendTask {
    recipient: Player,
    bytes: Vec<u8>,
}

struct PingSendTask {
    recipient: Player,
}

struct RoomChannels {
    inbox_rx: mpsc::Receiver<ClientPacketEnvelope>,
    tick_rx: mpsc::Receiver<SystemTime>,
    ping_rx: mpsc::Receiver<()>,
    removal_rx: mpsc::Receiver<Player>,
    join_rx: mpsc::Receiver<JoinRequest>,
}

// Lobby-controlled inputs. Kept in a shared slot so close_and_release can
// drop every clone's senders at once; an mpsc channel only closes when the
// last sender is gone.
#[derive(Debug)]
struct ControlChannels {
    tick_tx: mpsc::Sender<SystemTime>,
    ping_tx: mpsc::Sender<()>,
    join_tx: mpsc::Sender<JoinRequest>,
}

/// Cloneable submission surface for a room actor. Every operation is
/// non-blocking or respects the caller's cancel signal.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    inbox_tx: mpsc::Sender<ClientPacketEnvelope>,
    removal_tx: mpsc::Sender<Player>,
    control: Arc<Mutex<Option<ControlChannels>>>,
}

impl RoomHandle {
    /// Forwards an inbound envelope. Returns false when the caller was
    /// cancelled or the room is gone.
    pub async fn send(
        &self,
        envelope: ClientPacketEnvelope,
        cancel: &mut watch::Receiver<bool>,
    ) -> bool {
        tokio::select! {
            res = self.inbox_tx.send(envelope) => res.is_ok(),
            _ = cancel.wait_for(|c| *c) => false,
        }
    }

    /// Requests removal of a player after failed session I/O.
    pub async fn remove_me(&self, player: Player, cancel: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            res = self.removal_tx.send(player) => res.is_ok(),
            _ = cancel.wait_for(|c| *c) => false,
        }
    }

    /// Drop-if-full time signal.
    pub fn tick(&self, now: SystemTime) {
        let control = self.control.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(control) = control.as_ref() {
            let _ = control.tick_tx.try_send(now);
        }
    }

    /// Drop-if-full keepalive signal; at most one outstanding.
    pub fn ping_players(&self) {
        let control = self.control.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(control) = control.as_ref() {
            let _ = control.ping_tx.try_send(());
        }
    }

    /// Enqueues a join request. A buffer already at capacity means the room
    /// is full; a closed or released buffer means the room is gone.
    pub fn request_join(&self, request: JoinRequest) {
        let control = self.control.lock().unwrap_or_else(|e| e.into_inner());
        let Some(control) = control.as_ref() else {
            let _ = request.reply_tx.send(Err(JoinError::RoomNotFound));
            return;
        };
        match control.join_tx.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(request)) => {
                let _ = request.reply_tx.send(Err(JoinError::RoomFull));
            }
            Err(TrySendError::Closed(request)) => {
                let _ = request.reply_tx.send(Err(JoinError::RoomNotFound));
            }
        }
    }

    /// Closes the tick, ping and join channels across every handle clone,
    /// which ends the actor on its next select if it is still running. Must
    /// only be called by the lobby, after the room left its directory.
    pub fn close_and_release(&self) {
        self.control
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}

/// One game room. All mutable state is owned by the actor task running
/// `game_loop`; the outside world only ever talks through a `RoomHandle`.
pub struct Room {
    id: String,
    host_username: Arc<str>,
    config: RoomConfig,

    phase: RoomPhase,
    round: u32,
    player_states: Vec<PlayerGameState>,
    drawer_index: isize,
    current_drawer: String,
    guessers_count: usize,
    next_tick: SystemTime,
    current_word: String,
    word_choices: Vec<String>,
    drawing_history: Vec<Vec<u8>>,

    data_tasks: Vec<DataSendTask>,
    ping_tasks: Vec<PingSendTask>,

    handle: RoomHandle,
    channels: Option<RoomChannels>,
    parent_lobby: Option<LobbyBackHandle>,
    words: Arc<dyn RandomWordSource>,
}

impl Room {
    /// Builds a room with the given host as its first member. The host's
    /// room reference is wired immediately; the id and parent lobby are set
    /// by the lobby before the actor starts.
    pub fn new(host: Player, config: RoomConfig, words: Arc<dyn RandomWordSource>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let (ping_tx, ping_rx) = mpsc::channel(1);
        let (removal_tx, removal_rx) = mpsc::channel(REMOVAL_CAPACITY);
        let (join_tx, join_rx) = mpsc::channel(config.max_players.max(1));
        let handle = RoomHandle {
            inbox_tx,
            removal_tx,
            control: Arc::new(Mutex::new(Some(ControlChannels {
                tick_tx,
                ping_tx,
                join_tx,
            }))),
        };

        let host_username = host.username_arc();
        host.set_room(handle.clone());

        Self {
            id: String::new(),
            host_username,
            phase: RoomPhase::Pending,
            round: 0,
            player_states: vec![PlayerGameState::new(host)],
            drawer_index: 0,
            current_drawer: String::new(),
            guessers_count: 0,
            next_tick: SystemTime::now() + PENDING_TICK_HORIZON,
            current_word: String::new(),
            word_choices: Vec::new(),
            drawing_history: Vec::new(),
            data_tasks: Vec::new(),
            ping_tasks: Vec::new(),
            handle,
            channels: Some(RoomChannels {
                inbox_rx,
                tick_rx,
                ping_rx,
                removal_rx,
                join_rx,
            }),
            parent_lobby: None,
            words,
            config,
        }
    }

    pub fn handle(&self) -> RoomHandle {
        self.handle.clone()
    }

    /// Assigned once by the lobby before the actor starts.
    pub fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// Wired once by the lobby before the actor starts.
    pub fn set_parent_lobby(&mut self, lobby: LobbyBackHandle) {
        self.parent_lobby = Some(lobby);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> RoomDescription {
        RoomDescription {
            id: self.id.clone(),
            private: self.config.private,
            players_count: self.player_states.len(),
            max_players: self.config.max_players,
            started: self.phase != RoomPhase::Pending,
        }
    }

    /// The actor body. One event per iteration, then the task buffers drain;
    /// the loop ends when the game is over or every input channel closed.
    pub async fn game_loop(mut self) {
        let Some(mut ch) = self.channels.take() else {
            return;
        };
        info!(room_id = %self.id, host = %self.host_username, "room actor started");

        // Tell the creating client which room it now hosts.
        if let Some(host) = self.player_states.first().map(|s| s.player.clone()) {
            let snapshot = self.snapshot();
            self.broadcast_to(
                &ServerPacket::InitialRoomSnapshot {
                    ts_ms: now_ms(),
                    snapshot,
                },
                &host,
            );
            self.drain_task_buffers();
        }

        loop {
            tokio::select! {
                signal = ch.ping_rx.recv() => match signal {
                    Some(()) => self.handle_ping_players(),
                    None => break,
                },
                envelope = ch.inbox_rx.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(envelope),
                    None => break,
                },
                now = ch.tick_rx.recv() => match now {
                    Some(now) => self.handle_tick(now),
                    None => break,
                },
                player = ch.removal_rx.recv() => match player {
                    Some(player) => self.handle_remove_player(&player),
                    None => break,
                },
                request = ch.join_rx.recv() => match request {
                    Some(request) => self.handle_join_request(request),
                    None => break,
                },
            }

            self.drain_task_buffers();

            if self.phase == RoomPhase::GameEnd {
                break;
            }
        }
        info!(room_id = %self.id, "room actor stopped");
    }

    // ---- event handlers ----------------------------------------------------

    fn handle_ping_players(&mut self) {
        for state in &self.player_states {
            self.ping_tasks.push(PingSendTask {
                recipient: state.player.clone(),
            });
        }
    }

    fn handle_envelope(&mut self, envelope: ClientPacketEnvelope) {
        let sender = envelope.sender;
        match envelope.packet {
            ClientPacket::DrawingData { data } => self.handle_drawing_data(&sender, data),
            ClientPacket::WordChoice { index } => self.handle_word_choice(&sender, index),
            ClientPacket::PlayerMessage { text } => self.handle_player_message(&sender, text),
            ClientPacket::StartGame => self.handle_start_game(&sender),
        }
    }

    fn handle_drawing_data(&mut self, sender: &str, data: Vec<u8>) {
        if self.phase != RoomPhase::Drawing || sender != self.current_drawer {
            debug!(room_id = %self.id, sender, "drawing frame from non-drawer dropped");
            return;
        }
        // Everyone gets the frame back, the drawer included, so clients treat
        // the server copy as authoritative.
        self.broadcast_to_all(&ServerPacket::DrawingData { data: data.clone() });
        self.drawing_history.push(data);
    }

    fn handle_start_game(&mut self, sender: &str) {
        if self.phase != RoomPhase::Pending || *self.host_username != *sender {
            debug!(room_id = %self.id, sender, "start request ignored");
            return;
        }
        self.broadcast_to_all(&ServerPacket::GameStarted { ts_ms: now_ms() });
        self.round = 1;
        self.to_choosing_word(SystemTime::now());
        self.emit_description();
    }

    fn handle_word_choice(&mut self, sender: &str, index: i64) {
        if self.phase != RoomPhase::ChoosingWord || sender != self.current_drawer {
            return;
        }
        if index < 0 || index as usize >= self.word_choices.len() {
            debug!(room_id = %self.id, index, "word choice out of range ignored");
            return;
        }
        self.current_word = self.word_choices[index as usize].clone();
        self.to_drawing(SystemTime::now());
    }

    fn handle_player_message(&mut self, sender: &str, text: String) {
        // Locate the sender first; envelopes from unknown senders are dropped.
        let Some(index) = self
            .player_states
            .iter()
            .position(|s| *s.username == *sender)
        else {
            debug!(room_id = %self.id, sender, "message from unknown sender dropped");
            return;
        };
        let is_drawer = index as isize == self.drawer_index && self.phase != RoomPhase::Pending;

        let is_correct_guess = self.phase == RoomPhase::Drawing
            && text == self.current_word
            && !self.player_states[index].has_guessed
            && !is_drawer;

        if is_correct_guess {
            // Points decline with guess order; the first guesser earns most.
            let player_count = self.player_states.len();
            let earned = ((player_count - 1 - self.guessers_count) as i64) * 100;
            let state = &mut self.player_states[index];
            state.has_guessed = true;
            state.score_increment = earned;
            self.guessers_count += 1;

            let username = self.player_states[index].username.to_string();
            self.broadcast_to_all(&ServerPacket::PlayerGuessedTheWord {
                ts_ms: now_ms(),
                username,
            });

            if self.guessers_count == self.player_states.len() - 1 {
                self.to_turn_summary(SystemTime::now());
            }
            return;
        }

        let packet = ServerPacket::PlayerMessage {
            ts_ms: now_ms(),
            from: sender.to_string(),
            text,
        };
        if self.player_states[index].has_guessed {
            // Players who know the word only talk to the drawer and to the
            // other players who already guessed.
            let Some(bytes) = marshal(&packet) else {
                return;
            };
            for (i, state) in self.player_states.iter().enumerate() {
                if i == index {
                    continue;
                }
                if i as isize == self.drawer_index || state.has_guessed {
                    self.data_tasks.push(DataSendTask {
                        recipient: state.player.clone(),
                        bytes: bytes.clone(),
                    });
                }
            }
        } else {
            let sender_conn = self.player_states[index].player.conn_id();
            self.broadcast_to_all_except(&packet, sender_conn);
        }
    }

    fn handle_tick(&mut self, now: SystemTime) {
        if now < self.next_tick {
            return;
        }
        match self.phase {
            RoomPhase::ChoosingWord => self.to_drawing(now),
            RoomPhase::Drawing => self.to_turn_summary(now),
            RoomPhase::TurnSummary => self.to_choosing_word(now),
            RoomPhase::Pending | RoomPhase::GameEnd => {}
        }
    }

    fn handle_join_request(&mut self, request: JoinRequest) {
        // A same-username join displaces the stale session before the
        // capacity check, so a reconnect never bounces off a full room.
        let stale = self
            .player_states
            .iter()
            .find(|s| *s.username == *request.player.username_arc())
            .map(|s| s.player.clone());
        if let Some(stale) = stale {
            self.handle_remove_player(&stale);
        }

        if self.phase == RoomPhase::GameEnd {
            let _ = request.reply_tx.send(Err(JoinError::RoomNotFound));
            return;
        }
        if self.player_states.len() == self.config.max_players {
            let _ = request.reply_tx.send(Err(JoinError::RoomFull));
            return;
        }

        // Snapshot reflects the players present before the newcomer.
        let snapshot = self.snapshot();

        let username = request.player.username().to_string();
        self.broadcast_to_all(&ServerPacket::PlayerJoined {
            ts_ms: now_ms(),
            username: username.clone(),
        });

        request.player.set_room(self.handle.clone());
        let player = request.player.clone();
        self.player_states.push(PlayerGameState::new(request.player));

        self.broadcast_to(
            &ServerPacket::InitialRoomSnapshot {
                ts_ms: now_ms(),
                snapshot,
            },
            &player,
        );
        self.emit_description();
        info!(room_id = %self.id, username = %username, "player joined");
        let _ = request.reply_tx.send(Ok(()));
    }

    fn handle_remove_player(&mut self, player: &Player) {
        let Some(index) = self
            .player_states
            .iter()
            .position(|s| s.player.conn_id() == player.conn_id())
        else {
            return;
        };
        let removed = self.player_states.remove(index);
        let index = index as isize;

        if index < self.drawer_index {
            // The drawer moved down one slot.
            self.drawer_index -= 1;
        } else if index == self.drawer_index {
            self.drawer_index -= 1;
            if self.phase != RoomPhase::Pending && self.phase != RoomPhase::GameEnd {
                self.to_choosing_word(SystemTime::now());
            }
        }

        if self.phase != RoomPhase::Pending
            && self.phase != RoomPhase::GameEnd
            && self.player_states.len() <= 1
        {
            self.to_game_end();
        }
        if self.player_states.is_empty() && self.phase == RoomPhase::Pending {
            self.to_game_end();
        }

        removed.player.cancel_and_release();
        info!(room_id = %self.id, username = %removed.username, "player removed");

        if self.phase != RoomPhase::GameEnd {
            self.broadcast_to_all(&ServerPacket::PlayerLeft {
                ts_ms: now_ms(),
                username: removed.username.to_string(),
            });
            self.emit_description();
        }
    }

    // ---- state machine -----------------------------------------------------

    fn to_choosing_word(&mut self, now: SystemTime) {
        if self.player_states.is_empty() {
            return self.to_game_end();
        }
        if self.current_drawer.is_empty() {
            // First turn of the round: drawing order is reverse arrival.
            self.drawer_index = self.player_states.len() as isize - 1;
        } else if self.drawer_index <= 0 {
            return self.to_next_round(now);
        } else {
            self.drawer_index -= 1;
        }

        self.phase = RoomPhase::ChoosingWord;
        self.current_word.clear();
        for state in &mut self.player_states {
            state.has_guessed = false;
            state.score += state.score_increment;
            state.score_increment = 0;
        }
        self.guessers_count = 0;

        let drawer_state = &self.player_states[self.drawer_index as usize];
        self.current_drawer = drawer_state.username.to_string();
        let drawer = drawer_state.player.clone();

        self.word_choices = self.words.generate(self.config.words_count);

        self.broadcast_to(
            &ServerPacket::PleaseChooseAWord {
                ts_ms: now_ms(),
                words: self.word_choices.clone(),
            },
            &drawer,
        );
        self.broadcast_to_all_except(
            &ServerPacket::PlayerIsChoosingWord {
                ts_ms: now_ms(),
                username: self.current_drawer.clone(),
            },
            drawer.conn_id(),
        );
        self.next_tick = now + self.config.choosing_word_duration;
    }

    fn to_drawing(&mut self, now: SystemTime) {
        if self.current_word.is_empty() {
            // Choice timed out; auto-pick deterministically.
            self.current_word = self.word_choices.first().cloned().unwrap_or_default();
        }
        self.phase = RoomPhase::Drawing;

        let drawer = self.player_states[self.drawer_index as usize].player.clone();
        self.broadcast_to_all_except(
            &ServerPacket::PlayerIsDrawing {
                ts_ms: now_ms(),
                username: self.current_drawer.clone(),
            },
            drawer.conn_id(),
        );
        self.broadcast_to(
            &ServerPacket::YourTurnToDraw {
                ts_ms: now_ms(),
                word: self.current_word.clone(),
            },
            &drawer,
        );
        self.next_tick = now + self.config.drawing_duration;
    }

    fn to_turn_summary(&mut self, now: SystemTime) {
        self.phase = RoomPhase::TurnSummary;
        self.drawing_history.clear();

        let deltas = self
            .player_states
            .iter()
            .map(|s| ScoreDelta {
                username: s.username.to_string(),
                score_delta: s.score_increment,
            })
            .collect();
        self.broadcast_to_all(&ServerPacket::TurnSummary {
            ts_ms: now_ms(),
            word_reveal: self.current_word.clone(),
            deltas,
        });
        self.next_tick = now + TURN_SUMMARY_DURATION;
    }

    fn to_next_round(&mut self, now: SystemTime) {
        self.round += 1;
        if self.round > self.config.rounds_count {
            return self.to_game_end();
        }
        self.current_drawer.clear();
        self.broadcast_to_all(&ServerPacket::RoundUpdate {
            ts_ms: now_ms(),
            round: self.round,
        });
        self.to_choosing_word(now);
    }

    fn to_game_end(&mut self) {
        self.phase = RoomPhase::GameEnd;

        // Final-turn increments have not been committed yet, so the
        // leaderboard folds them in.
        let entries = self
            .player_states
            .iter()
            .map(|s| LeaderboardEntry {
                username: s.username.to_string(),
                score: s.score + s.score_increment,
            })
            .collect();
        self.broadcast_to_all(&ServerPacket::Leaderboard {
            ts_ms: now_ms(),
            entries,
        });
        // Flush before cancelling so the leaderboard reaches every buffer
        // ahead of the teardown signal.
        self.drain_task_buffers();

        for state in &self.player_states {
            state.player.cancel_and_release();
        }
        if let Some(lobby) = &self.parent_lobby {
            lobby.request_remove(self.id.clone());
        }
        self.player_states.clear();
        self.word_choices.clear();
        self.drawing_history.clear();
        info!(room_id = %self.id, "game ended");
    }

    // ---- broadcast primitives and task drain -------------------------------

    fn broadcast_to_all(&mut self, packet: &ServerPacket) {
        let Some(bytes) = marshal(packet) else {
            return;
        };
        for state in &self.player_states {
            self.data_tasks.push(DataSendTask {
                recipient: state.player.clone(),
                bytes: bytes.clone(),
            });
        }
    }

    fn broadcast_to(&mut self, packet: &ServerPacket, recipient: &Player) {
        let Some(bytes) = marshal(packet) else {
            return;
        };
        self.data_tasks.push(DataSendTask {
            recipient: recipient.clone(),
            bytes,
        });
    }

    fn broadcast_to_all_except(&mut self, packet: &ServerPacket, excluded_conn_id: u64) {
        let Some(bytes) = marshal(packet) else {
            return;
        };
        for state in &self.player_states {
            if state.player.conn_id() == excluded_conn_id {
                continue;
            }
            self.data_tasks.push(DataSendTask {
                recipient: state.player.clone(),
                bytes: bytes.clone(),
            });
        }
    }

    /// Drains pings first, then data, removing any player whose channel is
    /// gone or saturated. Removal may enqueue follow-up broadcasts, so the
    /// drain loops until both buffers stay empty.
    fn drain_task_buffers(&mut self) {
        loop {
            if self.ping_tasks.is_empty() && self.data_tasks.is_empty() {
                break;
            }
            let pings = std::mem::take(&mut self.ping_tasks);
            for task in pings {
                if task.recipient.request_ping().is_err() {
                    self.handle_remove_player(&task.recipient);
                }
            }
            let sends = std::mem::take(&mut self.data_tasks);
            for task in sends {
                if task.recipient.enqueue(task.bytes).is_err() {
                    warn!(
                        room_id = %self.id,
                        username = task.recipient.username(),
                        "send buffer full; evicting slow player"
                    );
                    self.handle_remove_player(&task.recipient);
                }
            }
        }
    }

    fn emit_description(&self) {
        if self.config.private {
            return;
        }
        if let Some(lobby) = &self.parent_lobby {
            lobby.update_description(self.description());
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            phase: self.phase,
            next_tick_ms: epoch_ms(self.next_tick),
            players: self
                .player_states
                .iter()
                .map(|s| PlayerSnapshot {
                    username: s.username.to_string(),
                    score: s.score,
                    has_guessed: s.has_guessed,
                })
                .collect(),
            drawing_history: self.drawing_history.clone(),
            current_drawer: self.current_drawer.clone(),
            current_round: self.round,
            choosing_word_secs: self.config.choosing_word_duration.as_secs(),
            drawing_secs: self.config.drawing_duration.as_secs(),
        }
    }
}

/// Bare handle wired to fresh channels, for driving pumps without a live
/// room actor.
#[cfg(test)]
pub(crate) fn test_room_handle() -> (
    RoomHandle,
    mpsc::Receiver<ClientPacketEnvelope>,
    mpsc::Receiver<Player>,
) {
    let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
    let (tick_tx, _tick_rx) = mpsc::channel(1);
    let (ping_tx, _ping_rx) = mpsc::channel(1);
    let (removal_tx, removal_rx) = mpsc::channel(REMOVAL_CAPACITY);
    let (join_tx, _join_rx) = mpsc::channel(4);
    (
        RoomHandle {
            inbox_tx,
            removal_tx,
            control: Arc::new(Mutex::new(Some(ControlChannels {
                tick_tx,
                ping_tx,
                join_tx,
            }))),
        },
        inbox_rx,
        removal_rx,
    )
}

fn marshal(packet: &ServerPacket) -> Option<Vec<u8>> {
    match bincode::serialize(packet) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            // A marshal failure on a server-built packet is a programming
            // bug, not a protocol condition; drop it and keep the room alive.
            tracing::error!(error = %e, "failed to marshal server packet");
            None
        }
    }
}
