//! Implicit refresh of cookie access tokens.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use super::errors::{AuthError, AuthResult};
use super::state::{HasJwtAuth, JwtAuth};
use crate::config::TokenLocation;
use crate::payload::{TokenOptions, TokenType};
use crate::token::RequestToken;

/// Middleware reissuing cookie access tokens that are about to expire.
///
/// Runs the handler first. Afterwards, if the request carried a valid,
/// unrevoked access token in its cookie whose remaining lifetime is below
/// `implicit_refresh_deltatime`, a new non-fresh access token for the same
/// subject and claims is set on the response. Failures never alter the
/// response.
///
/// ```ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(middleware::from_fn_with_state(state.clone(), implicit_refresh::<AppState>));
/// ```
pub async fn implicit_refresh<S>(State(state): State<S>, request: Request, next: Next) -> Response
where
    S: HasJwtAuth + Clone + Send + Sync + 'static,
{
    let auth = state.jwt_auth();
    let (parts, body) = request.into_parts();

    let eligible = auth.config().has_location(TokenLocation::Cookies)
        && auth.implicit_refresh_enabled_for(&parts.method, parts.uri.path());
    let candidate = if eligible {
        auth.get_token_from_request(
            &parts,
            TokenType::Access,
            Some(&[TokenLocation::Cookies]),
            true,
        )
        .ok()
        .flatten()
    } else {
        None
    };
    let method = parts.method.clone();

    let mut response = next.run(Request::from_parts(parts, body)).await;

    if let Some(candidate) = candidate {
        match refreshed_token(auth, &method, &candidate) {
            Ok(Some(token)) => {
                if let Err(e) = auth.set_access_cookies(&token, response.headers_mut(), None) {
                    tracing::debug!(error = %e, "Failed to set refreshed access cookie");
                } else {
                    tracing::debug!("Access token implicitly refreshed");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "Implicit refresh skipped"),
        }
    }

    response
}

/// New access token for `candidate`, or `None` when it is not close
/// enough to expiry.
fn refreshed_token<U>(
    auth: &JwtAuth<U>,
    method: &Method,
    candidate: &RequestToken,
) -> AuthResult<Option<String>> {
    let config = auth.config();
    let payload = candidate.verify(config, true, false, config.csrf_required_for(method.as_str()))?;

    if auth.is_token_in_blocklist(&candidate.token) {
        return Err(AuthError::RevokedToken);
    }

    let Some(remaining) = payload.time_until_expiry() else {
        return Ok(None);
    };
    if remaining >= config.implicit_refresh_deltatime {
        return Ok(None);
    }

    let Some(uid) = payload.sub.as_deref() else {
        return Ok(None);
    };
    let mut options = TokenOptions::default().fresh(false).data(payload.extra.clone());
    options.scopes = payload.scopes.clone();
    options.audience = payload.aud.clone();
    auth.create_access_token(uid, &options).map(Some)
}
