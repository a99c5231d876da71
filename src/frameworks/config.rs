use std::time::Duration;
use std::{env, fmt};

// Runtime/server constants (not gameplay tuning).

/// Listening port, fixed by the deployment contract.
pub const HTTP_PORT: u16 = 5000;

/// Cadence of the game tick fanned to every room.
pub const GAME_TICK_PERIOD: Duration = Duration::from_secs(1);
/// Cadence of the liveness ping fanned to every room.
pub const PING_PERIOD: Duration = Duration::from_secs(30);

/// Name of the session-token cookie.
pub const SESSION_COOKIE_NAME: &str = "token";
/// Session token (and cookie) lifetime.
pub const SESSION_TOKEN_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 7);

const DEFAULT_TROLL_TIME_MS: u64 = 4000;

/// Environment-driven configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub allowed_origins: Vec<String>,
    pub postgres_url: String,
    pub jwt_key: String,
    pub troll_time: Duration,
}

#[derive(Debug)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let allowed_origins = required("ALLOWED_ORIGINS")?
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect::<Vec<_>>();
        if allowed_origins.is_empty() {
            return Err(ConfigError("ALLOWED_ORIGINS is empty".to_string()));
        }

        let troll_time = env::var("TROLL_TIME_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TROLL_TIME_MS);

        Ok(Self {
            allowed_origins,
            postgres_url: required("POSTGRES_URL")?,
            jwt_key: required("JWT_KEY")?,
            troll_time: Duration::from_millis(troll_time),
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError(format!("missing {name}")))
}
