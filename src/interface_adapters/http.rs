// Shared HTTP response types.

use serde::Serialize;
use uuid::Uuid;

use crate::use_cases::room::RoomDescription;

/// Public listing entry for one room.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicGameResponse {
    pub id: String,
    pub private: bool,
    pub players_count: usize,
    pub max_players: usize,
    pub started: bool,
}

impl From<&RoomDescription> for PublicGameResponse {
    fn from(description: &RoomDescription) -> Self {
        Self {
            id: description.id.clone(),
            private: description.private,
            players_count: description.players_count,
            max_players: description.max_players,
            started: description.started,
        }
    }
}

/// Identity payload returned by the auth endpoints.
#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: Uuid,
}
