// Hand-written fakes shared by use-case tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::entities::User;
use crate::domain::errors::{PasswordHashError, TokenError, UserStoreError};
use crate::domain::ports::{
    PasswordHasher, RandomWordSource, TickerSource, TokenManager, UserStore,
};

/// Deterministic word source for game tests.
pub struct FixedWords;

const WORDS: [&str; 5] = ["kunai", "rasengan", "scroll", "hokage", "sand"];

impl RandomWordSource for FixedWords {
    fn generate(&self, count: usize) -> Vec<String> {
        WORDS
            .iter()
            .take(count)
            .map(|w| w.to_string())
            .collect()
    }
}

/// Ticker whose signals are pushed by the test instead of by elapsed time.
/// The lobby subscribes twice: first for the game tick, then for the ping.
#[derive(Default)]
pub struct ManualTicker {
    senders: Mutex<Vec<mpsc::Sender<SystemTime>>>,
}

impl ManualTicker {
    fn sender(&self, index: usize) -> mpsc::Sender<SystemTime> {
        let senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders
            .get(index)
            .expect("ticker subscription missing")
            .clone()
    }

    pub async fn game_tick(&self, now: SystemTime) {
        let _ = self.sender(0).send(now).await;
    }

    pub async fn ping_tick(&self, now: SystemTime) {
        let _ = self.sender(1).send(now).await;
    }
}

impl TickerSource for ManualTicker {
    fn ticks(&self, _period: Duration) -> mpsc::Receiver<SystemTime> {
        let (tx, rx) = mpsc::channel(1);
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }
}

/// Which store operations should fail with an unexpected error.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailureFlags {
    pub create: bool,
    pub get: bool,
}

/// In-memory user store keyed by username.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<Mutex<HashMap<String, User>>>,
    failures: FailureFlags,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failures(mut self, failures: FailureFlags) -> Self {
        self.failures = failures;
        self
    }

    pub fn seed(&self, username: &str, password_hash: &str) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        let id = user.id;
        self.users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(username.to_string(), user);
        id
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, UserStoreError> {
        if self.failures.create {
            return Err(UserStoreError::Unexpected("store down".to_string()));
        }
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if users.contains_key(username) {
            return Err(UserStoreError::DuplicateUsername);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        users.insert(username.to_string(), user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<User, UserStoreError> {
        if self.failures.get {
            return Err(UserStoreError::Unexpected("store down".to_string()));
        }
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users
            .values()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(UserStoreError::UserNotFound)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, UserStoreError> {
        if self.failures.get {
            return Err(UserStoreError::Unexpected("store down".to_string()));
        }
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users
            .get(username)
            .cloned()
            .ok_or(UserStoreError::UserNotFound)
    }
}

/// Reversible stand-in for the Argon2id hasher.
pub struct PlainTextHasher;

impl PasswordHasher for PlainTextHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        Ok(format!("hashed::{password}"))
    }

    fn verify(&self, hash: &str, password: &str) -> Result<bool, PasswordHashError> {
        Ok(hash == format!("hashed::{password}"))
    }
}

/// Token manager whose tokens are just the user id with a prefix.
pub struct FakeTokenManager;

impl TokenManager for FakeTokenManager {
    fn generate(&self, user_id: Uuid) -> Result<String, TokenError> {
        Ok(format!("token::{user_id}"))
    }

    fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let id = token.strip_prefix("token::").ok_or(TokenError::Corrupted)?;
        Uuid::parse_str(id).map_err(|_| TokenError::Corrupted)
    }
}
