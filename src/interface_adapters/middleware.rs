use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::errors::{CancellationError, TokenError};
use crate::frameworks::config::SESSION_COOKIE_NAME;
use crate::interface_adapters::state::AppState;

// nginx's non-standard code for a client that closed the request early.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Status mapping for the framework-cancellation conditions.
pub fn cancellation_status(error: CancellationError) -> StatusCode {
    match error {
        CancellationError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        CancellationError::Canceled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Identity of the verified caller, inserted into request extensions by the
/// auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

/// Verifies the session cookie and attaches the caller's user id. Forged
/// tokens get a delayed opaque error so the endpoint cannot be used as a
/// verification oracle; the token itself is never logged.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(cookie) = jar.get(SESSION_COOKIE_NAME) else {
        return (StatusCode::UNAUTHORIZED, "unauthenticated").into_response();
    };
    match state.tokens.verify(cookie.value()) {
        Ok(user_id) => {
            request.extensions_mut().insert(AuthenticatedUser(user_id));
            next.run(request).await
        }
        Err(TokenError::Expired) => (StatusCode::UNAUTHORIZED, "expired-token").into_response(),
        Err(e) if e.is_suspicious() => {
            warn!(reason = %e, "suspicious session token rejected");
            tokio::time::sleep(state.troll_time).await;
            (StatusCode::INTERNAL_SERVER_ERROR, "unknown-error").into_response()
        }
        Err(e) => {
            error!(reason = %e, "token verification failed unexpectedly");
            (StatusCode::INTERNAL_SERVER_ERROR, "unknown-error").into_response()
        }
    }
}

/// Records requests whose connection dropped before a response was written.
/// hyper cancels the in-flight handler future when the peer disappears, so
/// the guard's Drop is the only place the cancellation is observable; the
/// 499 status lands in the log because no peer is left to read a body.
pub async fn track_cancellation(request: Request, next: Next) -> Response {
    let mut guard = CancellationGuard {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        completed: false,
    };
    let response = next.run(request).await;
    guard.completed = true;
    response
}

struct CancellationGuard {
    method: Method,
    path: String,
    completed: bool,
}

impl Drop for CancellationGuard {
    fn drop(&mut self) {
        if !self.completed {
            info!(
                method = %self.method,
                path = %self.path,
                status = cancellation_status(CancellationError::Canceled).as_u16(),
                reason = %CancellationError::Canceled,
                "client canceled request"
            );
        }
    }
}

/// Allowlisted origins for the origin gate.
#[derive(Clone)]
pub struct AllowedOrigins(pub Arc<Vec<String>>);

/// Rejects any request whose Origin header is not allowlisted, before CORS
/// processing happens. Cookies ride on SameSite=None, so this gate is the
/// cross-site request defense.
pub async fn check_origin(
    State(AllowedOrigins(origins)): State<AllowedOrigins>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if origins.iter().any(|allowed| allowed == origin) {
        next.run(request).await
    } else {
        (StatusCode::FORBIDDEN, "forbidden origin").into_response()
    }
}
