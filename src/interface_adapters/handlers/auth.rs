use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::error;

use crate::domain::errors::{LoginError, SignupError};
use crate::frameworks::config::{SESSION_COOKIE_NAME, SESSION_TOKEN_AGE};
use crate::interface_adapters::http::IdResponse;
use crate::interface_adapters::middleware::AuthenticatedUser;
use crate::interface_adapters::state::AppState;
use crate::use_cases::login::LoginUseCase;
use crate::use_cases::signup::SignupUseCase;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

fn session_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, token);
    cookie.set_path("/");
    cookie.set_secure(true);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::None);
    cookie.set_max_age(cookie::time::Duration::seconds(
        SESSION_TOKEN_AGE.as_secs() as i64
    ));
    cookie
}

fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
    cookie.set_path("/");
    cookie
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<CredentialsRequest>,
) -> Response {
    let use_case = SignupUseCase {
        users: state.users.as_ref(),
        hasher: state.hasher.as_ref(),
        tokens: state.tokens.as_ref(),
    };
    match use_case.execute(&body.username, &body.password).await {
        Ok(result) => (
            jar.add(session_cookie(result.token)),
            (
                StatusCode::CREATED,
                Json(IdResponse { id: result.user_id }),
            ),
        )
            .into_response(),
        Err(e) => {
            let status = match &e {
                SignupError::InvalidUsernameFormat
                | SignupError::WeakPassword
                | SignupError::PasswordTooLong => StatusCode::BAD_REQUEST,
                SignupError::UsernameTaken => StatusCode::CONFLICT,
                SignupError::Store(_) | SignupError::Hash(_) | SignupError::Token(_) => {
                    error!(error = ?e, "signup failed unexpectedly");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (status, e.to_string()).into_response()
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<CredentialsRequest>,
) -> Response {
    let use_case = LoginUseCase {
        users: state.users.as_ref(),
        hasher: state.hasher.as_ref(),
        tokens: state.tokens.as_ref(),
    };
    match use_case.execute(&body.username, &body.password).await {
        Ok(result) => (
            jar.add(session_cookie(result.token)),
            (
                StatusCode::CREATED,
                Json(IdResponse { id: result.user_id }),
            ),
        )
            .into_response(),
        Err(e) => {
            let status = match &e {
                LoginError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                LoginError::Store(_) | LoginError::Hash(_) | LoginError::Token(_) => {
                    error!(error = ?e, "login failed unexpectedly");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (status, e.to_string()).into_response()
        }
    }
}

pub async fn logout(jar: CookieJar) -> Response {
    (jar.remove(removal_cookie()), StatusCode::OK).into_response()
}

/// Rotates the caller's session token.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> Response {
    match state.tokens.generate(user_id) {
        Ok(token) => (
            jar.add(session_cookie(token)),
            Json(IdResponse { id: user_id }),
        )
            .into_response(),
        Err(e) => {
            error!(reason = %e, "token rotation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "unknown-error").into_response()
        }
    }
}
