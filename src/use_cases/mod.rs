// Use cases layer: application workflows for the game and auth surfaces.

pub mod idgen;
pub mod lobby;
pub mod login;
pub mod player;
pub mod room;
pub mod signup;
pub mod tickers;

#[cfg(test)]
pub mod test_support;

pub use idgen::RoomIdGenerator;
pub use lobby::{Lobby, LobbyHandle, LobbyJoinRequest, LobbyShutdown};
pub use player::{Player, PlayerReceivers, TokenBucket};
pub use room::{
    ClientPacketEnvelope, JoinRequest, Room, RoomConfig, RoomDescription, RoomHandle, RoomPhase,
};
pub use tickers::IntervalTicker;
