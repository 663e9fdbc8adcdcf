#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use serde_json::Value;
use tokenwarden::app::{DemoUser, UserTable, create_app};
use tokenwarden::{AuthConfig, JwtAuth, TokenLocation};
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-key-0123456789";
pub const USERNAME: &str = "ocarinow";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn test_config(locations: Vec<TokenLocation>) -> AuthConfig {
    AuthConfig {
        token_location: locations,
        cookie_secure: false,
        ..AuthConfig::with_secret(SECRET)
    }
}

pub fn test_users() -> UserTable {
    [DemoUser::new(USERNAME, PASSWORD), DemoUser::new("guest", "guest")]
        .into_iter()
        .collect()
}

/// Demo router plus a [`JwtAuth`] sharing its configuration, for minting
/// tokens outside of `/login`.
pub fn test_app(config: AuthConfig) -> (Router, JwtAuth<DemoUser>) {
    let auth = JwtAuth::new(config.clone());
    (create_app(config, test_users()), auth)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value of the cookie `name` among Set-Cookie headers.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|cookie| {
        let pair = cookie.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}

pub fn login_request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/login")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({"username": USERNAME, "password": PASSWORD}).to_string(),
        ))
        .unwrap()
}
