use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::entities::User;
use crate::domain::errors::{PasswordHashError, TokenError, UserStoreError};

// Port for the persistent user record store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, username: &str, password_hash: &str)
        -> Result<User, UserStoreError>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<User, UserStoreError>;
    async fn get_user_by_username(&self, username: &str) -> Result<User, UserStoreError>;
}

// Port for password hashing (Argon2id in production).
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, PasswordHashError>;
    /// Returns Ok(false) for a well-formed hash that does not match.
    fn verify(&self, hash: &str, password: &str) -> Result<bool, PasswordHashError>;
}

// Port for minting and verifying HMAC-signed session tokens.
pub trait TokenManager: Send + Sync {
    fn generate(&self, user_id: Uuid) -> Result<String, TokenError>;
    fn verify(&self, token: &str) -> Result<Uuid, TokenError>;
}

// Port for the random-word source consumed by room actors. Synchronous by
// contract: the room actor must not suspend outside its channel select.
pub trait RandomWordSource: Send + Sync {
    fn generate(&self, count: usize) -> Vec<String>;
}

// Port for periodic time signals. Receivers have capacity 1 and producers
// drop on a full buffer, so a slow consumer falls behind instead of queueing.
pub trait TickerSource: Send + Sync {
    fn ticks(&self, period: Duration) -> mpsc::Receiver<SystemTime>;
}
