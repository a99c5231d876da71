use std::time::Duration;

use axum::extract::ws::WebSocket;
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::entities::User;
use crate::domain::errors::{CancellationError, JoinError, UserStoreError};
use crate::interface_adapters::http::PublicGameResponse;
use crate::interface_adapters::middleware::{cancellation_status, AuthenticatedUser};
use crate::interface_adapters::net::run_session;
use crate::interface_adapters::state::AppState;
use crate::use_cases::player::Player;
use crate::use_cases::room::{JoinRequest, Room, RoomConfig};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameQuery {
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub max_players: usize,
    #[serde(default)]
    pub rounds_count: u32,
    #[serde(default)]
    pub words_count: usize,
    /// Seconds.
    #[serde(default)]
    pub choosing_word_duration: u64,
    /// Seconds.
    #[serde(default)]
    pub drawing_duration: u64,
}

fn validate_create_query(query: &CreateGameQuery) -> Result<RoomConfig, &'static str> {
    if query.max_players < 2 {
        return Err("maxPlayers must be at least 2");
    }
    if query.max_players > 20 {
        return Err("maxPlayers cannot exceed 20");
    }
    if query.rounds_count < 1 {
        return Err("roundsCount must be at least 1");
    }
    if query.rounds_count > 10 {
        return Err("roundsCount cannot exceed 10");
    }
    if query.words_count < 1 {
        return Err("wordsCount must be at least 1");
    }
    if query.words_count > 5 {
        return Err("wordsCount cannot exceed 5");
    }
    if query.choosing_word_duration < 5 {
        return Err("choosingWordDuration must be at least 5 seconds");
    }
    if query.choosing_word_duration > 120 {
        return Err("choosingWordDuration cannot exceed 120 seconds");
    }
    if query.drawing_duration < 30 {
        return Err("drawingDuration must be at least 30 seconds");
    }
    if query.drawing_duration > 300 {
        return Err("drawingDuration cannot exceed 300 seconds");
    }
    Ok(RoomConfig {
        max_players: query.max_players,
        rounds_count: query.rounds_count,
        words_count: query.words_count,
        choosing_word_duration: Duration::from_secs(query.choosing_word_duration),
        drawing_duration: Duration::from_secs(query.drawing_duration),
        private: query.private,
    })
}

// Upper bound on the user lookup at session setup.
const RESOLVE_USER_TIMEOUT: Duration = Duration::from_secs(2);

async fn resolve_user(state: &AppState, user_id: Uuid) -> Result<User, Response> {
    let lookup = tokio::time::timeout(RESOLVE_USER_TIMEOUT, state.users.get_user_by_id(user_id));
    match lookup.await {
        Ok(Ok(user)) => Ok(user),
        Ok(Err(UserStoreError::UserNotFound)) => {
            Err((StatusCode::UNAUTHORIZED, "user-not-found").into_response())
        }
        Ok(Err(e)) => {
            error!(error = ?e, "failed to resolve user");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "unknown-error").into_response())
        }
        Err(_) => {
            let reason = CancellationError::DeadlineExceeded;
            Err((cancellation_status(reason), reason.to_string()).into_response())
        }
    }
}

/// Creates a room and upgrades the caller into its host session. Parameters
/// are validated and the user resolved before the upgrade, so a bad request
/// gets a plain HTTP error instead of a doomed socket.
pub async fn create_game(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Query(query): Query<CreateGameQuery>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let config = match validate_create_query(&query) {
        Ok(config) => config,
        Err(reason) => return (StatusCode::BAD_REQUEST, reason).into_response(),
    };
    let user = match resolve_user(&state, user_id).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Some(ws) = ws else {
        return (StatusCode::UPGRADE_REQUIRED, "websocket-upgrade-required").into_response();
    };

    ws.on_upgrade(move |socket| host_session(socket, state, user, config))
}

async fn host_session(socket: WebSocket, state: AppState, user: User, config: RoomConfig) {
    let (player, receivers) = Player::connect(user.id, &user.username);
    let room = Room::new(player.clone(), config, state.words.clone());
    if !state.lobby.add_and_run_room(room).await {
        // Shutdown in progress; dropping the socket closes the session.
        warn!(username = %user.username, "lobby unavailable; rejecting new room");
        return;
    }
    info!(username = %user.username, "host session established");
    run_session(socket, player, receivers).await;
}

/// Joins an existing room: admission is settled before the upgrade, so a
/// full or missing room turns into a plain HTTP error.
pub async fn join_game(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(room_id): Path<String>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let user = match resolve_user(&state, user_id).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let (player, receivers) = Player::connect(user.id, &user.username);
    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .lobby
        .request_join(
            room_id.clone(),
            JoinRequest {
                player: player.clone(),
                reply_tx,
            },
        )
        .await;

    match reply_rx.await {
        Ok(Ok(())) => match ws {
            Some(ws) => {
                info!(username = %user.username, room_id = %room_id, "join session established");
                ws.on_upgrade(move |socket| run_session(socket, player, receivers))
            }
            None => {
                // Admitted but not upgradable; undo the admission so the
                // room is not left holding a sessionless member.
                if let Some(room) = player.room() {
                    let mut cancel = player.cancel_signal();
                    room.remove_me(player.clone(), &mut cancel).await;
                }
                (StatusCode::UPGRADE_REQUIRED, "websocket-upgrade-required").into_response()
            }
        },
        Ok(Err(e)) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        // The room ended between routing and admission.
        Err(_) => (StatusCode::BAD_REQUEST, JoinError::RoomNotFound.to_string()).into_response(),
    }
}

/// Lists the public rooms.
pub async fn list_games(State(state): State<AppState>) -> Json<Vec<PublicGameResponse>> {
    let games = state.lobby.public_games().await;
    Json(games.iter().map(PublicGameResponse::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_query() -> CreateGameQuery {
        CreateGameQuery {
            private: false,
            max_players: 4,
            rounds_count: 2,
            words_count: 3,
            choosing_word_duration: 10,
            drawing_duration: 80,
        }
    }

    #[test]
    fn when_the_query_is_valid_then_a_room_config_is_built() {
        let config = validate_create_query(&valid_query()).expect("should validate");

        assert_eq!(config.max_players, 4);
        assert_eq!(config.rounds_count, 2);
        assert_eq!(config.words_count, 3);
        assert_eq!(config.choosing_word_duration, Duration::from_secs(10));
        assert_eq!(config.drawing_duration, Duration::from_secs(80));
        assert!(!config.private);
    }

    #[test]
    fn when_a_parameter_is_out_of_range_then_the_reason_names_it() {
        let cases: [(fn(&mut CreateGameQuery), &str); 10] = [
            (|q| q.max_players = 1, "maxPlayers must be at least 2"),
            (|q| q.max_players = 21, "maxPlayers cannot exceed 20"),
            (|q| q.rounds_count = 0, "roundsCount must be at least 1"),
            (|q| q.rounds_count = 11, "roundsCount cannot exceed 10"),
            (|q| q.words_count = 0, "wordsCount must be at least 1"),
            (|q| q.words_count = 6, "wordsCount cannot exceed 5"),
            (
                |q| q.choosing_word_duration = 4,
                "choosingWordDuration must be at least 5 seconds",
            ),
            (
                |q| q.choosing_word_duration = 121,
                "choosingWordDuration cannot exceed 120 seconds",
            ),
            (
                |q| q.drawing_duration = 29,
                "drawingDuration must be at least 30 seconds",
            ),
            (
                |q| q.drawing_duration = 301,
                "drawingDuration cannot exceed 300 seconds",
            ),
        ];

        for (mutate, expected) in cases {
            let mut query = valid_query();
            mutate(&mut query);
            assert_eq!(validate_create_query(&query).err(), Some(expected));
        }
    }

    #[test]
    fn when_boundary_values_are_used_then_they_are_accepted() {
        let mut query = valid_query();
        query.max_players = 20;
        query.rounds_count = 10;
        query.words_count = 5;
        query.choosing_word_duration = 120;
        query.drawing_duration = 300;

        assert!(validate_create_query(&query).is_ok());
    }
}
