//! Located request tokens and their verification.

use subtle::ConstantTimeEq;

use crate::auth::{AuthError, AuthResult, CsrfFailure};
use crate::config::{AuthConfig, TokenLocation};
use crate::payload::{TokenPayload, TokenType};

/// A credential found in a request, not yet trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    /// Raw compact JWT.
    pub token: String,
    /// Double submit value found next to a cookie token.
    pub csrf: Option<String>,
    /// Kind of token that was searched for.
    pub token_type: TokenType,
    pub location: TokenLocation,
}

/// Decode `token` with the configured keys, algorithms and claim checks.
pub fn decode_token(config: &AuthConfig, token: &str, verify: bool) -> AuthResult<TokenPayload> {
    let algorithms = config.decode_signature_algorithms()?;
    let key = if verify { config.verifying_key()? } else { "" };
    TokenPayload::decode(
        token,
        key,
        &algorithms,
        config.decode_audience.as_deref(),
        config.decode_issuer.as_deref(),
        config.decode_leeway,
        verify,
    )
}

impl RequestToken {
    /// Check the token against policy.
    ///
    /// Steps run in a fixed order and stop at the first failure: decode,
    /// type, freshness, then the CSRF double submit. CSRF only applies to
    /// tokens read from cookies.
    pub fn verify(
        &self,
        config: &AuthConfig,
        verify_type: bool,
        verify_fresh: bool,
        verify_csrf: bool,
    ) -> AuthResult<TokenPayload> {
        let payload = decode_token(config, &self.token, true)?;

        if verify_type && payload.token_type != self.token_type {
            return Err(match self.token_type {
                TokenType::Access => AuthError::AccessTokenRequired {
                    received: payload.token_type,
                },
                TokenType::Refresh => AuthError::RefreshTokenRequired {
                    received: payload.token_type,
                },
            });
        }

        if verify_fresh && !payload.fresh {
            return Err(AuthError::FreshTokenRequired);
        }

        if verify_csrf && self.location == TokenLocation::Cookies {
            check_double_submit(self.csrf.as_deref(), payload.csrf.as_deref())?;
        }

        tracing::debug!(
            location = %self.location,
            token_type = %payload.token_type,
            sub = payload.sub.as_deref().unwrap_or_default(),
            "Token verified"
        );
        Ok(payload)
    }
}

fn check_double_submit(submitted: Option<&str>, claim: Option<&str>) -> AuthResult<()> {
    let submitted = submitted.ok_or(AuthError::Csrf(CsrfFailure::MissingInRequest))?;
    let claim = claim.ok_or(AuthError::Csrf(CsrfFailure::MissingClaim))?;
    if bool::from(submitted.as_bytes().ct_eq(claim.as_bytes())) {
        Ok(())
    } else {
        Err(AuthError::Csrf(CsrfFailure::Mismatch))
    }
}
