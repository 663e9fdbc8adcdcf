//! JWT access and refresh tokens for axum.
//!
//! Tokens are issued by [`JwtAuth`], located in a request (headers,
//! cookies, JSON body or query string, in configured order), verified
//! against policy, and checked against an optional revocation callback.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod extract;
pub mod jwt;
pub mod payload;
pub mod token;

pub use auth::{
    AccessToken, AuthError, AuthResult, AuthenticatedToken, CurrentSubject, FreshAccessToken,
    HasJwtAuth, JwtAuth, OptionalAccessToken, RefreshToken, TokenRequirement, implicit_refresh,
};
pub use config::{AuthConfig, SameSitePolicy, TokenLocation};
pub use extract::{BufferedBody, FormFields, buffer_body};
pub use jwt::SignatureAlgorithm;
pub use payload::{Audience, TimeExpression, TokenOptions, TokenPayload, TokenType};
pub use token::RequestToken;
