// Concrete crypto adapters for the auth ports: Argon2id password hashing
// and HMAC-signed JWT session tokens.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    Error as HashParseError, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{PasswordHashError, TokenError};
use crate::domain::ports::{PasswordHasher, TokenManager};

/// Argon2id hasher with the library's recommended parameters and a random
/// salt per hash.
pub struct Argon2idHasher;

impl PasswordHasher for Argon2idHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordHashError::Hashing(e.to_string()))
    }

    fn verify(&self, hash: &str, password: &str) -> Result<bool, PasswordHashError> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| PasswordHashError::Comparison(e.to_string()))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(HashParseError::Password) => Ok(false),
            Err(e) => Err(PasswordHashError::Comparison(e.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
}

/// HS256 token manager. The subject claim carries the user id; any other
/// signing algorithm is rejected outright.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_age: Duration,
}

impl JwtManager {
    pub fn new(secret: &[u8], token_age: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            token_age,
        }
    }
}

impl TokenManager for JwtManager {
    fn generate(&self, user_id: Uuid) -> Result<String, TokenError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.token_age.as_secs(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::InvalidSigningAlgorithm
                }
                _ => TokenError::Corrupted,
            }
        })?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| TokenError::Corrupted)
    }
}
