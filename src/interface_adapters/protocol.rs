// Binary wire protocol for game sessions. Packets are serde enums encoded
// with bincode; the variant tag is the schema discriminator, so variant
// order is part of the wire contract.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::use_cases::room::RoomPhase;

/// Packets a client sends over the binary channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientPacket {
    /// Opaque stroke payload relayed verbatim to the other players.
    DrawingData { data: Vec<u8> },
    /// Index into the offered word choices.
    WordChoice { index: i64 },
    /// Chat text; may match the secret word.
    PlayerMessage { text: String },
    /// Host request to begin the game.
    StartGame,
}

/// Packets the server sends to clients. Every variant carries a
/// server-assigned epoch-millisecond timestamp except DrawingData, which is
/// latency-sensitive and shipped bare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerPacket {
    GameStarted {
        ts_ms: u64,
    },
    RoundUpdate {
        ts_ms: u64,
        round: u32,
    },
    InitialRoomSnapshot {
        ts_ms: u64,
        snapshot: RoomSnapshot,
    },
    Leaderboard {
        ts_ms: u64,
        entries: Vec<LeaderboardEntry>,
    },
    PlayerJoined {
        ts_ms: u64,
        username: String,
    },
    PlayerLeft {
        ts_ms: u64,
        username: String,
    },
    PlayerIsChoosingWord {
        ts_ms: u64,
        username: String,
    },
    PlayerIsDrawing {
        ts_ms: u64,
        username: String,
    },
    PlayerGuessedTheWord {
        ts_ms: u64,
        username: String,
    },
    PlayerMessage {
        ts_ms: u64,
        from: String,
        text: String,
    },
    DrawingData {
        data: Vec<u8>,
    },
    PleaseChooseAWord {
        ts_ms: u64,
        words: Vec<String>,
    },
    YourTurnToDraw {
        ts_ms: u64,
        word: String,
    },
    TurnSummary {
        ts_ms: u64,
        word_reveal: String,
        deltas: Vec<ScoreDelta>,
    },
}

/// Full room state handed to a player on admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub phase: RoomPhase,
    pub next_tick_ms: u64,
    pub players: Vec<PlayerSnapshot>,
    pub drawing_history: Vec<Vec<u8>>,
    pub current_drawer: String,
    pub current_round: u32,
    pub choosing_word_secs: u64,
    pub drawing_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub username: String,
    pub score: i64,
    pub has_guessed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDelta {
    pub username: String,
    pub score_delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub score: i64,
}

pub fn epoch_ms(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

pub fn now_ms() -> u64 {
    epoch_ms(SystemTime::now())
}
