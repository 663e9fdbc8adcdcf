//! Axum extractors guarding handlers.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::AuthError;
use super::state::HasJwtAuth;
use super::types::{AuthenticatedToken, TokenRequirement};

// =============================================================================
// Token guards
// =============================================================================

/// Requires a valid access token.
pub struct AccessToken(pub AuthenticatedToken);

impl<S> FromRequestParts<S> for AccessToken
where
    S: HasJwtAuth + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        state
            .jwt_auth()
            .auth_required(parts, &TokenRequirement::access())
            .map(AccessToken)
    }
}

/// Requires a valid access token issued at login time.
pub struct FreshAccessToken(pub AuthenticatedToken);

impl<S> FromRequestParts<S> for FreshAccessToken
where
    S: HasJwtAuth + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        state
            .jwt_auth()
            .auth_required(parts, &TokenRequirement::fresh())
            .map(FreshAccessToken)
    }
}

/// Requires a valid refresh token.
pub struct RefreshToken(pub AuthenticatedToken);

impl<S> FromRequestParts<S> for RefreshToken
where
    S: HasJwtAuth + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        state
            .jwt_auth()
            .auth_required(parts, &TokenRequirement::refresh())
            .map(RefreshToken)
    }
}

/// Access token if the request carries one. A token that is present but
/// fails verification still rejects the request.
pub struct OptionalAccessToken(pub Option<AuthenticatedToken>);

impl<S> FromRequestParts<S> for OptionalAccessToken
where
    S: HasJwtAuth + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        state
            .jwt_auth()
            .auth_optional(parts, &TokenRequirement::access())
            .map(OptionalAccessToken)
    }
}

// =============================================================================
// Subject
// =============================================================================

/// Application user behind the access token, `None` when the subject
/// getter does not know the token's subject.
pub struct CurrentSubject<U>(pub Option<U>);

impl<S, U> FromRequestParts<S> for CurrentSubject<U>
where
    S: HasJwtAuth<Subject = U> + Send + Sync,
    U: Send,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        state
            .jwt_auth()
            .get_current_subject(parts)
            .map(CurrentSubject)
    }
}
