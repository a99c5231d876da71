use uuid::Uuid;

use crate::domain::errors::{SignupError, UserStoreError};
use crate::domain::ports::{PasswordHasher, TokenManager, UserStore};

const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 100;
const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 20;

pub struct SignupResponse {
    pub user_id: Uuid,
    pub token: String,
}

/// Account creation: validates credentials, hashes the password and mints a
/// session token for the new user.
pub struct SignupUseCase<'a> {
    pub users: &'a dyn UserStore,
    pub hasher: &'a dyn PasswordHasher,
    pub tokens: &'a dyn TokenManager,
}

impl SignupUseCase<'_> {
    pub async fn execute(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SignupResponse, SignupError> {
        let username = username.to_lowercase();
        if !valid_username(&username) {
            return Err(SignupError::InvalidUsernameFormat);
        }
        let password_len = password.chars().count();
        if password_len < PASSWORD_MIN_LEN {
            return Err(SignupError::WeakPassword);
        }
        if password_len > PASSWORD_MAX_LEN {
            return Err(SignupError::PasswordTooLong);
        }

        let password_hash = self.hasher.hash(password).map_err(SignupError::Hash)?;
        let user = self
            .users
            .create_user(&username, &password_hash)
            .await
            .map_err(|e| match e {
                UserStoreError::DuplicateUsername => SignupError::UsernameTaken,
                other => SignupError::Store(other),
            })?;
        let token = self.tokens.generate(user.id).map_err(SignupError::Token)?;

        Ok(SignupResponse {
            user_id: user.id,
            token,
        })
    }
}

/// Lowercase letters, digits and underscores, 3 to 20 characters.
fn valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len)
        && username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
