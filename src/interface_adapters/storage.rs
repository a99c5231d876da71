// Postgres-backed adapters for the user store and the word source.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::domain::entities::User;
use crate::domain::errors::UserStoreError;
use crate::domain::ports::{RandomWordSource, UserStore};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
        }
    }
}

/// User records in the `users` table.
#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, UserStoreError> {
        sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) \
             RETURNING id, username, password_hash",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map(User::from)
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return UserStoreError::DuplicateUsername;
                }
            }
            UserStoreError::Unexpected(e.to_string())
        })
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<User, UserStoreError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserStoreError::Unexpected(e.to_string()))?
        .map(User::from)
        .ok_or(UserStoreError::UserNotFound)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, UserStoreError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserStoreError::Unexpected(e.to_string()))?
        .map(User::from)
        .ok_or(UserStoreError::UserNotFound)
    }
}

// Fallback vocabulary if the words table is empty.
const BUILTIN_WORDS: [&str; 8] = [
    "apple", "castle", "dragon", "guitar", "pirate", "rocket", "whale", "wizard",
];

/// In-memory word bank loaded from the `words` table at startup. Room actors
/// sample it synchronously, so no database round trip happens mid-game.
pub struct WordBank {
    words: Vec<String>,
}

impl WordBank {
    pub async fn load(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let words: Vec<String> = sqlx::query_scalar("SELECT word FROM words")
            .fetch_all(pool)
            .await?;
        if words.is_empty() {
            warn!("words table is empty; falling back to the builtin list");
            return Ok(Self::builtin());
        }
        Ok(Self { words })
    }

    pub fn builtin() -> Self {
        Self {
            words: BUILTIN_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl RandomWordSource for WordBank {
    fn generate(&self, count: usize) -> Vec<String> {
        let mut rng = rand::thread_rng();
        self.words
            .choose_multiple(&mut rng, count)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn when_words_are_sampled_then_they_are_distinct_and_from_the_bank() {
        let bank = WordBank::builtin();

        let words = bank.generate(3);

        assert_eq!(words.len(), 3);
        let unique: HashSet<&String> = words.iter().collect();
        assert_eq!(unique.len(), 3);
        for word in &words {
            assert!(BUILTIN_WORDS.contains(&word.as_str()));
        }
    }

    #[test]
    fn when_more_words_are_requested_than_exist_then_the_whole_bank_is_returned() {
        let bank = WordBank::builtin();

        let words = bank.generate(BUILTIN_WORDS.len() + 10);

        assert_eq!(words.len(), BUILTIN_WORDS.len());
    }
}
