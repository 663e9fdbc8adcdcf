//! Locating tokens in inbound requests.
//!
//! Each [`TokenLocation`] has one reader. Readers are tried in order and
//! the first hit wins; when every location misses, the per-location
//! reasons are reported together.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, Request},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::Value;

use crate::auth::{AuthError, AuthResult};
use crate::config::{AuthConfig, TokenLocation, contains_method};
use crate::payload::TokenType;
use crate::token::RequestToken;

/// Largest request body kept around for body based token lookups.
pub const MAX_BUFFERED_BODY: usize = 1024 * 1024;

/// Copy of a JSON or form request body, stored in request extensions by
/// [`buffer_body`].
#[derive(Debug, Clone)]
pub struct BufferedBody(pub Bytes);

/// Text fields of a url-encoded or multipart form body, in body order.
/// File parts are skipped.
#[derive(Debug, Clone, Default)]
pub struct FormFields(pub Vec<(String, String)>);

impl FormFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = value.split(';').next()?.trim();
    Some(essence.to_ascii_lowercase())
}

fn is_json(headers: &HeaderMap) -> bool {
    media_type(headers).as_deref() == Some("application/json")
}

fn is_urlencoded(headers: &HeaderMap) -> bool {
    media_type(headers).as_deref() == Some("application/x-www-form-urlencoded")
}

fn is_multipart(headers: &HeaderMap) -> bool {
    media_type(headers).as_deref() == Some("multipart/form-data")
}

async fn multipart_fields(headers: &HeaderMap, bytes: Bytes) -> FormFields {
    let mut request = Request::new(Body::from(bytes));
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        request
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type.clone());
    }
    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(e) => {
            tracing::debug!(error = %e, "Unreadable multipart body");
            return FormFields::default();
        }
    };

    let mut fields = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed multipart body");
                break;
            }
        };
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.text().await {
            Ok(value) => fields.push((name, value)),
            Err(e) => {
                tracing::debug!(error = %e, field = %name, "Unreadable multipart field");
                break;
            }
        }
    }
    FormFields(fields)
}

/// Middleware that buffers JSON and form bodies so tokens and CSRF values
/// can be read from them without consuming the body handlers receive.
///
/// Url-encoded and multipart bodies also get their text fields parsed into
/// [`FormFields`].
pub async fn buffer_body(request: Request, next: Next) -> Response {
    let headers = request.headers();
    if !is_json(headers) && !is_urlencoded(headers) && !is_multipart(headers) {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BUFFERED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to buffer request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };
    if is_urlencoded(&parts.headers) {
        let fields = url::form_urlencoded::parse(&bytes).into_owned().collect();
        parts.extensions.insert(FormFields(fields));
    } else if is_multipart(&parts.headers) {
        let fields = multipart_fields(&parts.headers, bytes.clone()).await;
        parts.extensions.insert(fields);
    }
    parts.extensions.insert(BufferedBody(bytes.clone()));
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Locations searched when the caller does not name any.
///
/// Refresh tokens are only looked up in cookies and JSON bodies, in
/// configured order.
pub fn default_locations(config: &AuthConfig, token_type: TokenType) -> Vec<TokenLocation> {
    match token_type {
        TokenType::Access => config.token_location.clone(),
        TokenType::Refresh => config
            .token_location
            .iter()
            .copied()
            .filter(|location| matches!(location, TokenLocation::Cookies | TokenLocation::Json))
            .collect(),
    }
}

/// Find a token of `token_type` in the request.
pub fn token_from_request(
    parts: &Parts,
    config: &AuthConfig,
    token_type: TokenType,
    locations: Option<&[TokenLocation]>,
) -> AuthResult<RequestToken> {
    let locations = match locations {
        Some(locations) => locations.to_vec(),
        None => default_locations(config, token_type),
    };

    let mut failures = Vec::with_capacity(locations.len());
    for location in &locations {
        let found = match location {
            TokenLocation::Headers => from_headers(parts, config, token_type),
            TokenLocation::Cookies => from_cookies(parts, config, token_type),
            TokenLocation::Json => from_json(parts, config, token_type),
            TokenLocation::Query => from_query(parts, config, token_type),
        };
        match found {
            Ok(token) => return Ok(token),
            Err(e) => {
                tracing::debug!(location = %location, reason = %e, "No token at location");
                failures.push(e);
            }
        }
    }

    match failures.len() {
        0 => Err(AuthError::missing_token(format!(
            "No token found in request from '{}'",
            locations
                .iter()
                .map(TokenLocation::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ))),
        // A lone failure keeps its own kind, e.g. a missing CSRF value.
        1 => Err(failures.remove(0)),
        _ => Err(AuthError::MissingToken(
            failures.iter().map(ToString::to_string).collect(),
        )),
    }
}

fn from_headers(parts: &Parts, config: &AuthConfig, token_type: TokenType) -> AuthResult<RequestToken> {
    let value = parts
        .headers
        .get(config.header_name.as_str())
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AuthError::missing_token(format!(
                "Missing '{}' in '{}' header.",
                config.header_type, config.header_name
            ))
        })?;

    let token = if config.header_type.is_empty() {
        value.to_string()
    } else {
        value.replacen(&format!("{} ", config.header_type), "", 1)
    };

    Ok(RequestToken {
        token,
        csrf: None,
        token_type,
        location: TokenLocation::Headers,
    })
}

fn from_cookies(parts: &Parts, config: &AuthConfig, token_type: TokenType) -> AuthResult<RequestToken> {
    let (cookie_name, csrf_header, csrf_field) = match token_type {
        TokenType::Access => (
            &config.access_cookie_name,
            &config.access_csrf_header_name,
            &config.access_csrf_field_name,
        ),
        TokenType::Refresh => (
            &config.refresh_cookie_name,
            &config.refresh_csrf_header_name,
            &config.refresh_csrf_field_name,
        ),
    };

    let jar = CookieJar::from_headers(&parts.headers);
    let token = jar
        .get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AuthError::missing_token(format!("Missing cookie '{cookie_name}'.")))?;

    let mut csrf = None;
    if config.cookie_csrf_protect && contains_method(&config.csrf_methods, parts.method.as_str()) {
        csrf = parts
            .headers
            .get(csrf_header.as_str())
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        if csrf.is_none() && config.csrf_check_form {
            csrf = form_field(parts, csrf_field);
        }
        if csrf.is_none() {
            return Err(AuthError::MissingCsrfToken("Missing CSRF token".to_string()));
        }
    }

    Ok(RequestToken {
        token,
        csrf,
        token_type,
        location: TokenLocation::Cookies,
    })
}

fn form_field(parts: &Parts, field: &str) -> Option<String> {
    parts
        .extensions
        .get::<FormFields>()?
        .get(field)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn from_query(parts: &Parts, config: &AuthConfig, token_type: TokenType) -> AuthResult<RequestToken> {
    let missing = || {
        AuthError::missing_token(format!(
            "Missing '{}' in query parameters",
            config.query_string_name
        ))
    };
    let query = parts.uri.query().ok_or_else(missing)?;
    let token = url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == config.query_string_name.as_str())
        .map(|(_, value)| value.into_owned())
        .ok_or_else(missing)?;

    Ok(RequestToken {
        token,
        csrf: None,
        token_type,
        location: TokenLocation::Query,
    })
}

fn from_json(parts: &Parts, config: &AuthConfig, token_type: TokenType) -> AuthResult<RequestToken> {
    if !is_json(&parts.headers) {
        return Err(AuthError::missing_token(
            "Invalid content-type. Must be application/json",
        ));
    }
    let key = match token_type {
        TokenType::Access => &config.json_key,
        TokenType::Refresh => &config.refresh_json_key,
    };

    let BufferedBody(body) = parts
        .extensions
        .get::<BufferedBody>()
        .ok_or_else(|| AuthError::missing_token("Request body was not buffered"))?;
    let data: Value = serde_json::from_slice(body)
        .map_err(|_| AuthError::missing_token("Token is not parsable"))?;

    match data.get(key.as_str()) {
        Some(Value::String(token)) => Ok(RequestToken {
            token: token.clone(),
            csrf: None,
            token_type,
            location: TokenLocation::Json,
        }),
        _ => Err(AuthError::missing_token("Missing token in json data")),
    }
}
