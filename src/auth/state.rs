//! The auth component and the state seam used by extractors.

use std::sync::Arc;

use axum::http::{HeaderMap, Method, request::Parts};

use super::cookie::{set_token_cookies, unset_token_cookies};
use super::errors::{AuthError, AuthResult};
use super::types::{AuthenticatedToken, TokenRequirement};
use crate::config::{AuthConfig, TokenLocation, contains_method};
use crate::extract::token_from_request;
use crate::payload::{TokenOptions, TokenPayload, TokenType};
use crate::token::{RequestToken, decode_token};

/// Resolves a verified subject identifier into an application user.
pub type SubjectGetter<U> = Arc<dyn Fn(&str) -> Option<U> + Send + Sync>;

/// Answers whether a raw token has been revoked.
pub type TokenBlocklist = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Issues, locates, verifies and revokes tokens for one configuration.
///
/// Callbacks are installed once at startup; both default to absent. Without
/// a blocklist no token is ever revoked, without a subject getter
/// [`JwtAuth::get_current_subject`] fails with
/// [`AuthError::SubjectGetterUnset`].
pub struct JwtAuth<U> {
    config: AuthConfig,
    subject_getter: Option<SubjectGetter<U>>,
    token_blocklist: Option<TokenBlocklist>,
}

impl<U> std::fmt::Debug for JwtAuth<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuth")
            .field("algorithm", &self.config.algorithm)
            .field("subject_getter", &self.subject_getter.is_some())
            .field("token_blocklist", &self.token_blocklist.is_some())
            .finish()
    }
}

impl<U> JwtAuth<U> {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            subject_getter: None,
            token_blocklist: None,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Replace the configuration. Callbacks are kept.
    pub fn load_config(&mut self, config: AuthConfig) {
        self.config = config;
    }

    pub fn set_subject_getter<F>(&mut self, getter: F)
    where
        F: Fn(&str) -> Option<U> + Send + Sync + 'static,
    {
        self.subject_getter = Some(Arc::new(getter));
    }

    pub fn set_token_blocklist<F>(&mut self, blocklist: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.token_blocklist = Some(Arc::new(blocklist));
    }

    pub fn is_subject_getter_set(&self) -> bool {
        self.subject_getter.is_some()
    }

    pub fn is_token_blocklist_set(&self) -> bool {
        self.token_blocklist.is_some()
    }

    pub fn is_token_in_blocklist(&self, token: &str) -> bool {
        self.token_blocklist
            .as_ref()
            .is_some_and(|blocklist| blocklist(token))
    }

    // =========================================================================
    // Issuing
    // =========================================================================

    fn create_token(
        &self,
        uid: &str,
        token_type: TokenType,
        options: &TokenOptions,
    ) -> AuthResult<String> {
        let algorithm = self.config.signature_algorithm()?;
        let key = self.config.signing_key()?;
        let payload = TokenPayload::create(&self.config, uid, token_type, options)?;
        payload.encode(key, algorithm, options.header.clone())
    }

    pub fn create_access_token(&self, uid: &str, options: &TokenOptions) -> AuthResult<String> {
        self.create_token(uid, TokenType::Access, options)
    }

    /// `options.fresh` is ignored.
    pub fn create_refresh_token(&self, uid: &str, options: &TokenOptions) -> AuthResult<String> {
        self.create_token(uid, TokenType::Refresh, options)
    }

    // =========================================================================
    // Verification
    // =========================================================================

    pub fn decode_token(&self, token: &str, verify: bool) -> AuthResult<TokenPayload> {
        decode_token(&self.config, token, verify)
    }

    pub fn verify_token(
        &self,
        token: &RequestToken,
        verify_type: bool,
        verify_fresh: bool,
        verify_csrf: bool,
    ) -> AuthResult<TokenPayload> {
        token.verify(&self.config, verify_type, verify_fresh, verify_csrf)
    }

    /// Locate a token of `token_type`.
    ///
    /// With `optional` set, finding no token at all yields `Ok(None)`; any
    /// other failure is still returned.
    pub fn get_token_from_request(
        &self,
        parts: &Parts,
        token_type: TokenType,
        locations: Option<&[TokenLocation]>,
        optional: bool,
    ) -> AuthResult<Option<RequestToken>> {
        match token_from_request(parts, &self.config, token_type, locations) {
            Ok(token) => Ok(Some(token)),
            Err(e) if optional && e.is_missing_token() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_access_token_from_request(&self, parts: &Parts) -> AuthResult<RequestToken> {
        token_from_request(parts, &self.config, TokenType::Access, None)
    }

    pub fn get_refresh_token_from_request(&self, parts: &Parts) -> AuthResult<RequestToken> {
        token_from_request(parts, &self.config, TokenType::Refresh, None)
    }

    fn csrf_policy(&self, parts: &Parts, requirement: &TokenRequirement) -> bool {
        requirement
            .verify_csrf
            .unwrap_or_else(|| self.config.csrf_required_for(parts.method.as_str()))
    }

    fn authenticate(
        &self,
        parts: &Parts,
        request: RequestToken,
        requirement: &TokenRequirement,
    ) -> AuthResult<AuthenticatedToken> {
        let payload = request.verify(
            &self.config,
            requirement.verify_type,
            requirement.verify_fresh,
            self.csrf_policy(parts, requirement),
        )?;

        // Only tokens that fully verified reach the blocklist.
        if self.is_token_in_blocklist(&request.token) {
            tracing::debug!(jti = %payload.jti, "Rejected revoked token");
            return Err(AuthError::RevokedToken);
        }

        Ok(AuthenticatedToken { payload, request })
    }

    /// Locate, verify and revocation check a token in one step.
    pub fn auth_required(
        &self,
        parts: &Parts,
        requirement: &TokenRequirement,
    ) -> AuthResult<AuthenticatedToken> {
        let request = token_from_request(parts, &self.config, requirement.token_type, None)?;
        self.authenticate(parts, request, requirement)
    }

    /// Like [`JwtAuth::auth_required`] but a request carrying no token at all
    /// yields `Ok(None)`.
    pub fn auth_optional(
        &self,
        parts: &Parts,
        requirement: &TokenRequirement,
    ) -> AuthResult<Option<AuthenticatedToken>> {
        self.get_token_from_request(parts, requirement.token_type, None, true)?
            .map(|request| self.authenticate(parts, request, requirement))
            .transpose()
    }

    /// Resolve the subject of the request's access token.
    pub fn get_current_subject(&self, parts: &Parts) -> AuthResult<Option<U>> {
        let getter = self
            .subject_getter
            .as_ref()
            .ok_or(AuthError::SubjectGetterUnset)?;
        let token = self.auth_required(parts, &TokenRequirement::access())?;
        Ok(token.subject().and_then(|uid| getter(uid)))
    }

    // =========================================================================
    // Cookies
    // =========================================================================

    pub fn set_access_cookies(
        &self,
        token: &str,
        headers: &mut HeaderMap,
        max_age: Option<i64>,
    ) -> AuthResult<()> {
        set_token_cookies(&self.config, TokenType::Access, token, headers, max_age)
    }

    pub fn set_refresh_cookies(
        &self,
        token: &str,
        headers: &mut HeaderMap,
        max_age: Option<i64>,
    ) -> AuthResult<()> {
        set_token_cookies(&self.config, TokenType::Refresh, token, headers, max_age)
    }

    pub fn unset_access_cookies(&self, headers: &mut HeaderMap) -> AuthResult<()> {
        unset_token_cookies(&self.config, TokenType::Access, headers)
    }

    pub fn unset_refresh_cookies(&self, headers: &mut HeaderMap) -> AuthResult<()> {
        unset_token_cookies(&self.config, TokenType::Refresh, headers)
    }

    pub fn unset_cookies(&self, headers: &mut HeaderMap) -> AuthResult<()> {
        self.unset_access_cookies(headers)?;
        self.unset_refresh_cookies(headers)
    }

    /// Route and method filters of the implicit refresh middleware.
    ///
    /// Route exclusion beats route inclusion, which beats method exclusion,
    /// which beats method inclusion. Anything unlisted is refreshed.
    pub fn implicit_refresh_enabled_for(&self, method: &Method, path: &str) -> bool {
        let config = &self.config;
        if config.implicit_refresh_route_exclude.iter().any(|route| route == path) {
            return false;
        }
        if config.implicit_refresh_route_include.iter().any(|route| route == path) {
            return true;
        }
        // Method inclusion agrees with the default.
        !contains_method(&config.implicit_refresh_method_exclude, method.as_str())
    }
}

/// Application state exposing a [`JwtAuth`] to the extractors and the
/// implicit refresh middleware.
pub trait HasJwtAuth {
    type Subject;

    fn jwt_auth(&self) -> &JwtAuth<Self::Subject>;
}

impl<U> HasJwtAuth for Arc<JwtAuth<U>> {
    type Subject = U;

    fn jwt_auth(&self) -> &JwtAuth<U> {
        self
    }
}

/// Implement [`HasJwtAuth`] for a state struct with an
/// `auth: Arc<JwtAuth<Subject>>` field.
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct AppState {
///     pub auth: Arc<JwtAuth<User>>,
/// }
///
/// impl_has_jwt_auth!(AppState, User);
/// ```
#[macro_export]
macro_rules! impl_has_jwt_auth {
    ($state_type:ty, $subject:ty) => {
        impl $crate::auth::HasJwtAuth for $state_type {
            type Subject = $subject;

            fn jwt_auth(&self) -> &$crate::auth::JwtAuth<$subject> {
                &self.auth
            }
        }
    };
}
