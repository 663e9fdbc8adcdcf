//! Cookie transport for issued tokens.

use axum::http::{HeaderMap, HeaderValue, header};
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::errors::{AuthError, AuthResult};
use crate::config::{AuthConfig, SameSitePolicy};
use crate::payload::TokenType;
use crate::token::decode_token;

struct CookieNames<'a> {
    token: &'a str,
    token_path: &'a str,
    csrf: &'a str,
    csrf_path: &'a str,
}

fn names(config: &AuthConfig, token_type: TokenType) -> CookieNames<'_> {
    match token_type {
        TokenType::Access => CookieNames {
            token: &config.access_cookie_name,
            token_path: &config.access_cookie_path,
            csrf: &config.access_csrf_cookie_name,
            csrf_path: &config.access_csrf_cookie_path,
        },
        TokenType::Refresh => CookieNames {
            token: &config.refresh_cookie_name,
            token_path: &config.refresh_cookie_path,
            csrf: &config.refresh_csrf_cookie_name,
            csrf_path: &config.refresh_csrf_cookie_path,
        },
    }
}

fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    }
}

fn build<'c>(
    config: &AuthConfig,
    name: &str,
    value: String,
    path: &str,
    http_only: bool,
    max_age: Option<i64>,
) -> Cookie<'c> {
    let mut cookie = Cookie::new(name.to_string(), value);
    cookie.set_path(path.to_string());
    cookie.set_http_only(http_only);
    cookie.set_secure(config.cookie_secure);
    cookie.set_same_site(same_site(config.cookie_samesite));
    if let Some(domain) = &config.cookie_domain {
        cookie.set_domain(domain.clone());
    }
    if let Some(max_age) = max_age.or(config.cookie_max_age) {
        cookie.set_max_age(time::Duration::seconds(max_age));
    }
    cookie
}

fn append(headers: &mut HeaderMap, cookie: &Cookie<'_>) -> AuthResult<()> {
    let value = HeaderValue::from_str(&cookie.to_string()).map_err(|e| {
        AuthError::InvalidArgument(format!("cookie '{}' is not a valid header: {e}", cookie.name()))
    })?;
    headers.append(header::SET_COOKIE, value);
    Ok(())
}

fn writes_csrf_cookie(config: &AuthConfig) -> bool {
    config.cookie_csrf_protect && config.csrf_in_cookies
}

/// Append the token cookie, plus the readable CSRF cookie when enabled.
///
/// `max_age` overrides the configured `cookie_max_age`.
pub fn set_token_cookies(
    config: &AuthConfig,
    token_type: TokenType,
    token: &str,
    headers: &mut HeaderMap,
    max_age: Option<i64>,
) -> AuthResult<()> {
    let names = names(config, token_type);
    let cookie = build(config, names.token, token.to_string(), names.token_path, true, max_age);
    append(headers, &cookie)?;

    if writes_csrf_cookie(config) {
        // Only reading the claim of a token issued by this process.
        if let Some(csrf) = decode_token(config, token, false)?.csrf {
            let cookie = build(config, names.csrf, csrf, names.csrf_path, false, max_age);
            append(headers, &cookie)?;
        }
    }
    Ok(())
}

/// Append removal cookies for the token and its CSRF companion.
pub fn unset_token_cookies(
    config: &AuthConfig,
    token_type: TokenType,
    headers: &mut HeaderMap,
) -> AuthResult<()> {
    let names = names(config, token_type);
    let mut cookie = build(config, names.token, String::new(), names.token_path, true, None);
    cookie.make_removal();
    append(headers, &cookie)?;

    if writes_csrf_cookie(config) {
        let mut cookie = build(config, names.csrf, String::new(), names.csrf_path, false, None);
        cookie.make_removal();
        append(headers, &cookie)?;
    }
    Ok(())
}
