//! Guard configuration and verified token types.

use crate::payload::{TokenPayload, TokenType};
use crate::token::RequestToken;

/// What a guard demands from the presented token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRequirement {
    pub token_type: TokenType,
    pub verify_type: bool,
    pub verify_fresh: bool,
    /// `None` requires CSRF when protection is on and the method is listed
    /// in `csrf_methods`.
    pub verify_csrf: Option<bool>,
}

impl TokenRequirement {
    pub const fn access() -> Self {
        Self {
            token_type: TokenType::Access,
            verify_type: true,
            verify_fresh: false,
            verify_csrf: None,
        }
    }

    pub const fn fresh() -> Self {
        Self {
            verify_fresh: true,
            ..Self::access()
        }
    }

    pub const fn refresh() -> Self {
        Self {
            token_type: TokenType::Refresh,
            ..Self::access()
        }
    }

    pub const fn csrf(self, verify_csrf: bool) -> Self {
        Self {
            verify_csrf: Some(verify_csrf),
            ..self
        }
    }
}

impl Default for TokenRequirement {
    fn default() -> Self {
        Self::access()
    }
}

/// A token that passed verification and the revocation gate.
#[derive(Debug, Clone)]
pub struct AuthenticatedToken {
    pub payload: TokenPayload,
    /// The credential as it was found in the request.
    pub request: RequestToken,
}

impl AuthenticatedToken {
    pub fn subject(&self) -> Option<&str> {
        self.payload.sub.as_deref()
    }
}
