use uuid::Uuid;

use crate::domain::errors::{LoginError, UserStoreError};
use crate::domain::ports::{PasswordHasher, TokenManager, UserStore};

pub struct LoginResponse {
    pub user_id: Uuid,
    pub token: String,
}

/// Credential exchange: an unknown username and a wrong password are
/// indistinguishable to the caller.
pub struct LoginUseCase<'a> {
    pub users: &'a dyn UserStore,
    pub hasher: &'a dyn PasswordHasher,
    pub tokens: &'a dyn TokenManager,
}

impl LoginUseCase<'_> {
    pub async fn execute(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginResponse, LoginError> {
        let username = username.to_lowercase();
        let user = self
            .users
            .get_user_by_username(&username)
            .await
            .map_err(|e| match e {
                UserStoreError::UserNotFound => LoginError::InvalidCredentials,
                other => LoginError::Store(other),
            })?;

        let matches = self
            .hasher
            .verify(&user.password_hash, password)
            .map_err(LoginError::Hash)?;
        if !matches {
            return Err(LoginError::InvalidCredentials);
        }

        let token = self.tokens.generate(user.id).map_err(LoginError::Token)?;
        Ok(LoginResponse {
            user_id: user.id,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{
        FailureFlags, FakeTokenManager, InMemoryUserStore, PlainTextHasher,
    };

    fn use_case(store: &InMemoryUserStore) -> LoginUseCase<'_> {
        LoginUseCase {
            users: store,
            hasher: &PlainTextHasher,
            tokens: &FakeTokenManager,
        }
    }

    #[tokio::test]
    async fn when_credentials_match_then_a_token_is_minted_for_the_user() {
        let store = InMemoryUserStore::new();
        let id = store.seed("naruto", "hashed::ramen4life");

        let result = use_case(&store)
            .execute("Naruto", "ramen4life")
            .await
            .expect("login should succeed");

        assert_eq!(result.user_id, id);
        assert_eq!(result.token, format!("token::{id}"));
    }

    #[tokio::test]
    async fn when_the_username_is_unknown_then_invalid_credentials_is_returned() {
        let store = InMemoryUserStore::new();

        let result = use_case(&store).execute("nobody", "ramen4life").await;

        assert_eq!(result.err(), Some(LoginError::InvalidCredentials));
    }

    #[tokio::test]
    async fn when_the_password_is_wrong_then_invalid_credentials_is_returned() {
        let store = InMemoryUserStore::new();
        store.seed("naruto", "hashed::ramen4life");

        let result = use_case(&store).execute("naruto", "dango4life").await;

        assert_eq!(result.err(), Some(LoginError::InvalidCredentials));
    }

    #[tokio::test]
    async fn when_the_store_fails_then_the_error_is_wrapped() {
        let store = InMemoryUserStore::new().with_failures(FailureFlags {
            get: true,
            ..Default::default()
        });

        let result = use_case(&store).execute("naruto", "ramen4life").await;

        assert!(matches!(result, Err(LoginError::Store(_))));
    }
}
