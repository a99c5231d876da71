use std::sync::Arc;
use std::time::Duration;

use crate::domain::ports::{PasswordHasher, RandomWordSource, TokenManager, UserStore};
use crate::use_cases::lobby::LobbyHandle;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub lobby: LobbyHandle,
    pub users: Arc<dyn UserStore>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn TokenManager>,
    pub words: Arc<dyn RandomWordSource>,
    /// Artificial delay applied before answering suspected token forgeries.
    pub troll_time: Duration,
}
