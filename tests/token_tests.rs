//! Router level tests for header, query and JSON transported tokens.
//!
//! Tests cover:
//! - Login and header round trip
//! - Location fallback order
//! - Access / refresh type confusion
//! - Freshness
//! - Revocation through logout
//! - Error response bodies

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use tokenwarden::{TokenLocation, TokenOptions, TokenType};

fn bearer(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn login_tokens(app: &axum::Router) -> (String, String) {
    let response = send(app, login_request()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}

// =============================================================================
// Login and header transport
// =============================================================================

#[tokio::test]
async fn test_login_issues_fresh_access_token() {
    let (app, auth) = test_app(test_config(vec![TokenLocation::Headers]));
    let (access, refresh) = login_tokens(&app).await;

    let payload = auth.decode_token(&access, true).unwrap();
    assert_eq!(payload.sub.as_deref(), Some(USERNAME));
    assert_eq!(payload.token_type, TokenType::Access);
    assert!(payload.fresh);

    let refresh_payload = auth.decode_token(&refresh, true).unwrap();
    assert_eq!(refresh_payload.token_type, TokenType::Refresh);
    assert!(!refresh_payload.fresh);
}

#[tokio::test]
async fn test_login_rejects_bad_password() {
    let (app, _) = test_app(test_config(vec![TokenLocation::Headers]));
    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"username": "ocarinow", "password": "nope"}"#))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error_type"], "InvalidCredentialsError");
}

#[tokio::test]
async fn test_header_round_trip() {
    let (app, auth) = test_app(test_config(vec![TokenLocation::Headers]));
    let token = auth
        .create_access_token(USERNAME, &TokenOptions::default().fresh(true))
        .unwrap();

    let response = send(&app, bearer("GET", "/protected", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sub"], USERNAME);
    assert_eq!(body["fresh"], true);
    assert_eq!(body["location"], "headers");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (app, _) = test_app(test_config(vec![TokenLocation::Headers]));
    let request = Request::builder()
        .uri("/protected")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_type"], "MissingTokenError");
    assert_eq!(body["message"], "Missing JWT in request");
}

#[tokio::test]
async fn test_garbage_token_is_unprocessable() {
    let (app, _) = test_app(test_config(vec![TokenLocation::Headers]));
    let response = send(&app, bearer("GET", "/protected", "not-a-jwt")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error_type"], "JWTDecodeError");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let (app, _) = test_app(test_config(vec![TokenLocation::Headers]));
    let other = tokenwarden::JwtAuth::<()>::new(tokenwarden::AuthConfig::with_secret(
        "some-other-secret-that-is-long-enough",
    ));
    let token = other
        .create_access_token(USERNAME, &TokenOptions::default())
        .unwrap();

    let response = send(&app, bearer("GET", "/protected", &token)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// Location order
// =============================================================================

#[tokio::test]
async fn test_location_order_decides_between_two_tokens() {
    let locations = vec![TokenLocation::Query, TokenLocation::Headers];
    let (app, auth) = test_app(test_config(locations));
    let from_query = auth
        .create_access_token("guest", &TokenOptions::default())
        .unwrap();
    let from_header = auth
        .create_access_token(USERNAME, &TokenOptions::default())
        .unwrap();

    let request = bearer("GET", &format!("/protected?token={from_query}"), &from_header);
    let body = body_json(send(&app, request).await).await;
    assert_eq!(body["sub"], "guest");
    assert_eq!(body["location"], "query");

    let locations = vec![TokenLocation::Headers, TokenLocation::Query];
    let (app, _) = test_app(test_config(locations));
    let request = bearer("GET", &format!("/protected?token={from_query}"), &from_header);
    let body = body_json(send(&app, request).await).await;
    assert_eq!(body["sub"], USERNAME);
    assert_eq!(body["location"], "headers");
}

#[tokio::test]
async fn test_refresh_token_in_json_body() {
    let (app, auth) = test_app(test_config(vec![TokenLocation::Headers, TokenLocation::Json]));
    let refresh = auth
        .create_refresh_token(USERNAME, &TokenOptions::default())
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/refresh")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "refresh_token": refresh }).to_string(),
        ))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let access = body["access_token"].as_str().unwrap();
    let payload = auth.decode_token(access, true).unwrap();
    assert_eq!(payload.token_type, TokenType::Access);
    assert_eq!(payload.sub.as_deref(), Some(USERNAME));
    assert!(!payload.fresh);
}

#[tokio::test]
async fn test_refresh_token_in_header_is_not_looked_up() {
    let (app, auth) = test_app(test_config(vec![TokenLocation::Headers, TokenLocation::Json]));
    let refresh = auth
        .create_refresh_token(USERNAME, &TokenOptions::default())
        .unwrap();

    let response = send(&app, bearer("POST", "/refresh", &refresh)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error_type"], "MissingTokenError");
}

// =============================================================================
// Token type and freshness
// =============================================================================

#[tokio::test]
async fn test_refresh_token_rejected_where_access_required() {
    let (app, auth) = test_app(test_config(vec![TokenLocation::Headers]));
    let refresh = auth
        .create_refresh_token(USERNAME, &TokenOptions::default())
        .unwrap();

    let response = send(&app, bearer("GET", "/protected", &refresh)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error_type"],
        "AccessTokenRequiredError"
    );
}

#[tokio::test]
async fn test_access_token_rejected_where_refresh_required() {
    let (app, auth) = test_app(test_config(vec![TokenLocation::Json]));
    let access = auth
        .create_access_token(USERNAME, &TokenOptions::default().fresh(true))
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/refresh")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "refresh_token": access }).to_string(),
        ))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error_type"],
        "RefreshTokenRequiredError"
    );
}

#[tokio::test]
async fn test_fresh_endpoint() {
    let (app, auth) = test_app(test_config(vec![TokenLocation::Headers]));
    let (fresh, _) = login_tokens(&app).await;
    let stale = auth
        .create_access_token(USERNAME, &TokenOptions::default())
        .unwrap();

    let response = send(&app, bearer("POST", "/fresh", &fresh)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, bearer("POST", "/fresh", &stale)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error_type"],
        "FreshTokenRequiredError"
    );
}

// =============================================================================
// Subject and revocation
// =============================================================================

#[tokio::test]
async fn test_me_resolves_subject() {
    let (app, auth) = test_app(test_config(vec![TokenLocation::Headers]));
    let known = auth
        .create_access_token(USERNAME, &TokenOptions::default())
        .unwrap();
    let unknown = auth
        .create_access_token("nobody", &TokenOptions::default())
        .unwrap();

    let response = send(&app, bearer("GET", "/me", &known)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["username"], USERNAME);
    assert!(body.get("password").is_none());

    let response = send(&app, bearer("GET", "/me", &unknown)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let (app, _) = test_app(test_config(vec![TokenLocation::Headers]));
    let (access, _) = login_tokens(&app).await;

    let response = send(&app, bearer("GET", "/protected", &access)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, bearer("POST", "/logout", &access)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, bearer("GET", "/protected", &access)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_type"], "RevokedTokenError");
}

#[tokio::test]
async fn test_logout_leaves_other_tokens_valid() {
    let (app, _) = test_app(test_config(vec![TokenLocation::Headers]));
    let (first, _) = login_tokens(&app).await;
    let (second, _) = login_tokens(&app).await;

    send(&app, bearer("POST", "/logout", &first)).await;

    let response = send(&app, bearer("GET", "/protected", &second)).await;
    assert_eq!(response.status(), StatusCode::OK);
}
