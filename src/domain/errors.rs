use std::fmt;

// Domain-level errors. Every user-visible variant renders as a short
// machine-readable code; HTTP status mapping happens at the adapter layer.

/// Errors surfaced by the user store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserStoreError {
    DuplicateUsername,
    UserNotFound,
    Unexpected(String),
}

impl fmt::Display for UserStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStoreError::DuplicateUsername => write!(f, "username-already-exists"),
            UserStoreError::UserNotFound => write!(f, "user-not-found"),
            UserStoreError::Unexpected(_) => write!(f, "database-error"),
        }
    }
}

/// Errors surfaced by the password hasher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordHashError {
    Hashing(String),
    Comparison(String),
}

/// Errors surfaced by the token manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    InvalidSigningAlgorithm,
    InvalidSignature,
    Corrupted,
    Expired,
    Generation(String),
}

impl TokenError {
    /// True for failures that suggest a forged or tampered token rather than
    /// an ordinary expiry.
    pub fn is_suspicious(&self) -> bool {
        matches!(
            self,
            TokenError::InvalidSigningAlgorithm
                | TokenError::InvalidSignature
                | TokenError::Corrupted
        )
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::InvalidSigningAlgorithm => write!(f, "invalid-signing-algorithm"),
            TokenError::InvalidSignature => write!(f, "invalid-token-signature"),
            TokenError::Corrupted => write!(f, "corrupted-token"),
            TokenError::Expired => write!(f, "expired-token"),
            TokenError::Generation(_) => write!(f, "token-error"),
        }
    }
}

/// Signup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupError {
    InvalidUsernameFormat,
    WeakPassword,
    PasswordTooLong,
    UsernameTaken,
    Store(UserStoreError),
    Hash(PasswordHashError),
    Token(TokenError),
}

impl fmt::Display for SignupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignupError::InvalidUsernameFormat => write!(f, "invalid-username-format"),
            SignupError::WeakPassword => write!(f, "weak-password"),
            SignupError::PasswordTooLong => write!(f, "password-too-long"),
            SignupError::UsernameTaken => write!(f, "username-already-exists"),
            SignupError::Store(_) | SignupError::Hash(_) | SignupError::Token(_) => {
                write!(f, "unknown-error")
            }
        }
    }
}

/// Login failures. Unknown usernames and wrong passwords collapse into one
/// variant so the endpoint is not a username oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    InvalidCredentials,
    Store(UserStoreError),
    Hash(PasswordHashError),
    Token(TokenError),
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginError::InvalidCredentials => write!(f, "invalid-credentials"),
            LoginError::Store(_) | LoginError::Hash(_) | LoginError::Token(_) => {
                write!(f, "unknown-error")
            }
        }
    }
}

/// Membership failures replied on the join request channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    RoomFull,
    RoomNotFound,
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::RoomFull => write!(f, "room-full"),
            JoinError::RoomNotFound => write!(f, "room-not-found"),
        }
    }
}

/// Internal transport error: a player's bounded send buffer rejected a frame.
/// Never surfaced to clients; the room reacts by removing the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendBufferFull;

/// Framework cancellation conditions observed at the HTTP layer: a request
/// that outlived its deadline, or a client that went away mid-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationError {
    DeadlineExceeded,
    Canceled,
}

impl fmt::Display for CancellationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancellationError::DeadlineExceeded => write!(f, "deadline-exceeded"),
            CancellationError::Canceled => write!(f, "client-canceled"),
        }
    }
}
