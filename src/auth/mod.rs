//! JWT authentication for axum applications.
//!
//! [`JwtAuth`] issues access and refresh tokens and checks them on the way
//! in. Handlers are guarded with the extractors in this module, cookie
//! access tokens close to expiry are renewed by [`implicit_refresh`].

mod cookie;
mod errors;
mod extractors;
mod refresh;
mod state;
mod types;

pub use cookie::{set_token_cookies, unset_token_cookies};
pub use errors::{AuthError, AuthResult, CsrfFailure};
pub use extractors::{AccessToken, CurrentSubject, FreshAccessToken, OptionalAccessToken, RefreshToken};
pub use refresh::implicit_refresh;
pub use state::{HasJwtAuth, JwtAuth, SubjectGetter, TokenBlocklist};
pub use types::{AuthenticatedToken, TokenRequirement};
