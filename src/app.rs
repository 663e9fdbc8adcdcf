//! Demo server wiring the auth layer into a small router.
//!
//! - POST `/login` - Check credentials, issue fresh access + refresh tokens
//! - POST `/refresh` - Exchange a refresh token for a new access token
//! - POST `/logout` - Revoke the presented access token and clear cookies
//! - GET `/protected` - Any valid access token
//! - POST `/fresh` - Fresh access token only
//! - GET `/me` - User behind the access token

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tower::ServiceBuilder;

use crate::auth::{
    AccessToken, AuthError, CurrentSubject, FreshAccessToken, JwtAuth, RefreshToken,
    implicit_refresh,
};
use crate::config::{AuthConfig, TokenLocation};
use crate::extract::buffer_body;
use crate::impl_has_jwt_auth;
use crate::payload::TokenOptions;

/// Account known to the demo server.
#[derive(Debug, Clone, Serialize)]
pub struct DemoUser {
    pub username: String,
    #[serde(skip)]
    password: String,
}

impl DemoUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn password_matches(&self, candidate: &str) -> bool {
        self.password.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

/// In-memory user table keyed by username.
#[derive(Debug, Clone, Default)]
pub struct UserTable(HashMap<String, DemoUser>);

impl UserTable {
    pub fn insert(&mut self, user: DemoUser) {
        self.0.insert(user.username.clone(), user);
    }

    pub fn get(&self, username: &str) -> Option<&DemoUser> {
        self.0.get(username)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<DemoUser> for UserTable {
    fn from_iter<I: IntoIterator<Item = DemoUser>>(iter: I) -> Self {
        let mut table = Self::default();
        for user in iter {
            table.insert(user);
        }
        table
    }
}

/// Revoked tokens, lost on restart.
#[derive(Debug, Default)]
pub struct RevokedTokens(Mutex<HashSet<String>>);

impl RevokedTokens {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // A poisoned set is still the set of revoked tokens.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn revoke(&self, token: &str) {
        self.lock().insert(token.to_string());
    }

    pub fn contains(&self, token: &str) -> bool {
        self.lock().contains(token)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<JwtAuth<DemoUser>>,
    pub users: Arc<UserTable>,
    pub revoked: Arc<RevokedTokens>,
}

impl_has_jwt_auth!(AppState, DemoUser);

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Unknown user")]
    UnknownUser,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    error_type: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Auth(e) = self {
            return e.into_response();
        }
        let (status, error_type) = match &self {
            AppError::UnknownUser => (StatusCode::NOT_FOUND, "UnknownUserError"),
            _ => (StatusCode::UNAUTHORIZED, "InvalidCredentialsError"),
        };
        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
                error_type,
            }),
        )
            .into_response()
    }
}

/// Build the demo router. The blocklist and subject getter are backed by
/// `users` and an in-memory revocation set.
pub fn create_app(config: AuthConfig, users: UserTable) -> Router {
    let users = Arc::new(users);
    let revoked = Arc::new(RevokedTokens::default());

    let mut auth = JwtAuth::new(config);
    let lookup = Arc::clone(&users);
    auth.set_subject_getter(move |uid| lookup.get(uid).cloned());
    let blocklist = Arc::clone(&revoked);
    auth.set_token_blocklist(move |token| blocklist.contains(token));

    let state = AppState {
        auth: Arc::new(auth),
        users,
        revoked,
    };

    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/protected", get(protected))
        .route("/fresh", post(fresh))
        .route("/me", get(me))
        .layer(
            // Bodies are buffered before the refresh middleware looks for
            // form CSRF values.
            ServiceBuilder::new()
                .layer(middleware::from_fn(buffer_body))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    implicit_refresh::<AppState>,
                )),
        )
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let user = state
        .users
        .get(&request.username)
        .filter(|user| user.password_matches(&request.password))
        .ok_or(AppError::InvalidCredentials)?;

    let auth = &state.auth;
    let access_token = auth.create_access_token(&user.username, &TokenOptions::default().fresh(true))?;
    let refresh_token = auth.create_refresh_token(&user.username, &TokenOptions::default())?;

    let mut response = Json(TokenResponse {
        access_token: access_token.clone(),
        refresh_token: Some(refresh_token.clone()),
    })
    .into_response();
    if auth.config().has_location(TokenLocation::Cookies) {
        auth.set_access_cookies(&access_token, response.headers_mut(), None)?;
        auth.set_refresh_cookies(&refresh_token, response.headers_mut(), None)?;
    }

    tracing::info!(username = %user.username, "User logged in");
    Ok(response)
}

async fn refresh(
    State(state): State<AppState>,
    RefreshToken(token): RefreshToken,
) -> Result<Response, AppError> {
    let uid = token.subject().ok_or(AppError::UnknownUser)?;
    let auth = &state.auth;
    let access_token = auth.create_access_token(uid, &TokenOptions::default())?;

    let mut response = Json(TokenResponse {
        access_token: access_token.clone(),
        refresh_token: None,
    })
    .into_response();
    if auth.config().has_location(TokenLocation::Cookies) {
        auth.set_access_cookies(&access_token, response.headers_mut(), None)?;
    }
    Ok(response)
}

async fn logout(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
) -> Result<Response, AppError> {
    state.revoked.revoke(&token.request.token);

    let mut response = StatusCode::NO_CONTENT.into_response();
    if state.auth.config().has_location(TokenLocation::Cookies) {
        state.auth.unset_cookies(response.headers_mut())?;
    }
    Ok(response)
}

#[derive(Serialize)]
struct ProtectedResponse {
    sub: Option<String>,
    fresh: bool,
    location: TokenLocation,
}

async fn protected(AccessToken(token): AccessToken) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        sub: token.payload.sub,
        fresh: token.payload.fresh,
        location: token.request.location,
    })
}

async fn fresh(FreshAccessToken(token): FreshAccessToken) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        sub: token.payload.sub,
        fresh: token.payload.fresh,
        location: token.request.location,
    })
}

async fn me(CurrentSubject(user): CurrentSubject<DemoUser>) -> Result<Json<DemoUser>, AppError> {
    user.map(Json).ok_or(AppError::UnknownUser)
}
