//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::payload::TokenType;

pub type AuthResult<T> = Result<T, AuthError>;

/// Which half of the CSRF double submit was missing or wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfFailure {
    MissingInRequest,
    MissingClaim,
    Mismatch,
}

impl std::fmt::Display for CsrfFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CsrfFailure::MissingInRequest => write!(f, "Missing CSRF in request"),
            CsrfFailure::MissingClaim => write!(f, "Missing 'csrf' claim"),
            CsrfFailure::Mismatch => write!(f, "CSRF double submit does not match"),
        }
    }
}

/// Every failure the token lifecycle can report.
///
/// `MissingCsrfToken` is a specialization of `MissingToken`, and
/// `AccessTokenRequired` / `RefreshTokenRequired` specialize `TokenType`;
/// use [`AuthError::is_missing_token`] and [`AuthError::is_token_type_error`]
/// to match a whole family.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("bad configuration: {0}")]
    BadConfiguration(String),
    #[error("bad input: {0}")]
    BadInput(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Decode(String),
    #[error("{}", .0.join("; "))]
    MissingToken(Vec<String>),
    #[error("{0}")]
    MissingCsrfToken(String),
    #[error("'{expected}' token required, '{received}' token received")]
    TokenType {
        expected: String,
        received: String,
    },
    #[error("'access' token required, '{received}' token received")]
    AccessTokenRequired { received: TokenType },
    #[error("'refresh' token required, '{received}' token received")]
    RefreshTokenRequired { received: TokenType },
    #[error("Token has been revoked")]
    RevokedToken,
    #[error("Fresh token required")]
    FreshTokenRequired,
    #[error("{0}")]
    Csrf(CsrfFailure),
    #[error("no subject getter is set, call JwtAuth::set_subject_getter first")]
    SubjectGetterUnset,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl AuthError {
    pub fn missing_token(reason: impl Into<String>) -> Self {
        Self::MissingToken(vec![reason.into()])
    }

    pub fn bad_configuration(reason: impl Into<String>) -> Self {
        Self::BadConfiguration(reason.into())
    }

    /// True for `MissingToken` and its CSRF specialization.
    pub fn is_missing_token(&self) -> bool {
        matches!(self, Self::MissingToken(_) | Self::MissingCsrfToken(_))
    }

    /// True for `TokenType` and both of its specializations.
    pub fn is_token_type_error(&self) -> bool {
        matches!(
            self,
            Self::TokenType { .. } | Self::AccessTokenRequired { .. } | Self::RefreshTokenRequired { .. }
        )
    }

    /// Machine readable error tag sent alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadConfiguration(_) => "BadConfigurationError",
            Self::BadInput(_) => "BadInputError",
            Self::InvalidArgument(_) => "InvalidArgumentError",
            Self::Decode(_) => "JWTDecodeError",
            Self::MissingToken(_) => "MissingTokenError",
            Self::MissingCsrfToken(_) => "MissingCSRFTokenError",
            Self::TokenType { .. } => "TokenTypeError",
            Self::AccessTokenRequired { .. } => "AccessTokenRequiredError",
            Self::RefreshTokenRequired { .. } => "RefreshTokenRequiredError",
            Self::RevokedToken => "RevokedTokenError",
            Self::FreshTokenRequired => "FreshTokenRequiredError",
            Self::Csrf(_) => "CSRFError",
            Self::SubjectGetterUnset => "SubjectGetterUnsetError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadConfiguration(_)
            | Self::BadInput(_)
            | Self::InvalidArgument(_)
            | Self::SubjectGetterUnset => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Decode(reason) => reason.clone(),
            Self::MissingToken(_) => "Missing JWT in request".to_string(),
            Self::MissingCsrfToken(_) => "Missing CSRF double submit token in request".to_string(),
            Self::TokenType { .. } => "Bad token type".to_string(),
            Self::AccessTokenRequired { .. } => "Access token required".to_string(),
            Self::RefreshTokenRequired { .. } => "Refresh token required".to_string(),
            Self::RevokedToken => "Invalid token".to_string(),
            Self::FreshTokenRequired => "Fresh token required".to_string(),
            Self::Csrf(failure) => failure.to_string(),
            // Configuration details stay in the logs.
            Self::BadConfiguration(_)
            | Self::BadInput(_)
            | Self::InvalidArgument(_)
            | Self::SubjectGetterUnset => "Internal authentication error".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
    error_type: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Authentication layer misconfigured");
        }

        (
            status,
            Json(ErrorResponse {
                message: self.public_message(),
                error_type: self.kind(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_csrf_is_missing_token() {
        let err = AuthError::MissingCsrfToken("Missing CSRF token".into());
        assert!(err.is_missing_token());
        assert!(!err.is_token_type_error());
    }

    #[test]
    fn test_required_kinds_are_token_type_errors() {
        let access = AuthError::AccessTokenRequired {
            received: TokenType::Refresh,
        };
        let refresh = AuthError::RefreshTokenRequired {
            received: TokenType::Access,
        };
        assert!(access.is_token_type_error());
        assert!(refresh.is_token_type_error());
        assert_eq!(
            access.to_string(),
            "'access' token required, 'refresh' token received"
        );
    }

    #[test]
    fn test_missing_token_joins_reasons() {
        let err = AuthError::MissingToken(vec!["no header".into(), "no cookie".into()]);
        assert_eq!(err.to_string(), "no header; no cookie");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::Decode("bad".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AuthError::RevokedToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::Csrf(CsrfFailure::Mismatch).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::bad_configuration("no key").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_carries_kind() {
        let response = AuthError::FreshTokenRequired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
