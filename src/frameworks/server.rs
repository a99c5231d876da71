// Runtime bootstrap: tracing, router assembly and the serve loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::frameworks::config::{
    Config, GAME_TICK_PERIOD, HTTP_PORT, PING_PERIOD, SESSION_TOKEN_AGE,
};
use crate::frameworks::db;
use crate::interface_adapters::crypto::{Argon2idHasher, JwtManager};
use crate::interface_adapters::handlers::{auth, game};
use crate::interface_adapters::middleware::{
    check_origin, require_auth, track_cancellation, AllowedOrigins,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::storage::{PostgresUserStore, WordBank};
use crate::use_cases::lobby::{Lobby, LobbySettings, LobbyShutdown};
use crate::use_cases::tickers::IntervalTicker;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "invalid origin in allowlist; skipping");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::UPGRADE,
            header::CONNECTION,
            header::SEC_WEBSOCKET_KEY,
            header::SEC_WEBSOCKET_VERSION,
            header::SEC_WEBSOCKET_EXTENSIONS,
            header::SEC_WEBSOCKET_PROTOCOL,
        ])
}

/// Assembles the public router. The health probe bypasses the origin gate;
/// everything else sits behind it, and the gate answers 403 before any CORS
/// processing happens.
pub fn app(state: AppState, allowed_origins: Vec<String>) -> Router {
    let cors = cors_layer(&allowed_origins);
    let origins = AllowedOrigins(Arc::new(allowed_origins));

    let auth_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route(
            "/auth/logout",
            post(auth::logout).layer(from_fn_with_state(state.clone(), require_auth)),
        )
        .route(
            "/auth/refresh",
            get(auth::refresh).layer(from_fn_with_state(state.clone(), require_auth)),
        );

    let game_routes = Router::new()
        .route("/game/create", get(game::create_game))
        .route("/game/join/:roomid", get(game::join_game))
        .route("/game/games", get(game::list_games))
        .layer(from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(auth_routes)
        .merge(game_routes)
        .layer(cors)
        .layer(from_fn_with_state(origins, check_origin))
        .with_state(state);

    Router::new()
        .route("/health", get(|| async { "healthy" }))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(track_cancellation))
}

/// Serves until a shutdown signal arrives, then waits for every in-flight
/// game to finish.
pub async fn run(
    listener: tokio::net::TcpListener,
    state: AppState,
    allowed_origins: Vec<String>,
    shutdown: LobbyShutdown,
) -> io::Result<()> {
    let address = listener.local_addr()?;
    let router = app(state, allowed_origins);

    info!(%address, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| {
            error!(error = %e, "server error");
        })?;

    // The lobby handle died with the router; rooms play out before we exit.
    info!("waiting for active games to finish");
    shutdown.wait().await;
    Ok(())
}

pub async fn run_with_config() -> io::Result<()> {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env().map_err(io::Error::other)?;

    let pool = db::connect_pool(&config.postgres_url)
        .await
        .map_err(io::Error::other)?;
    db::run_migrations(&pool).await.map_err(io::Error::other)?;
    let words = WordBank::load(&pool).await.map_err(io::Error::other)?;
    info!(words = words.len(), "word bank loaded");

    let (lobby, shutdown) = Lobby::start(
        &IntervalTicker,
        LobbySettings {
            game_tick_period: GAME_TICK_PERIOD,
            ping_period: PING_PERIOD,
        },
    )
    .await;

    let state = AppState {
        lobby,
        users: Arc::new(PostgresUserStore::new(pool)),
        hasher: Arc::new(Argon2idHasher),
        tokens: Arc::new(JwtManager::new(
            config.jwt_key.as_bytes(),
            SESSION_TOKEN_AGE,
        )),
        words: Arc::new(words),
        troll_time: config.troll_time,
    };

    let address = SocketAddr::from(([0, 0, 0, 0], HTTP_PORT));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            error!(%address, error = %e, "failed to bind");
        })?;

    run(listener, state, config.allowed_origins, shutdown).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install terminate handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
