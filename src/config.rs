//! Authentication configuration.
//!
//! A flat set of named options with the defaults listed on each field.
//! Nothing is validated at construction: key material for the selected
//! algorithm is checked the first time a token is signed or verified.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, AuthResult};
use crate::jwt::SignatureAlgorithm;

/// Channel of an inbound request a token can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenLocation {
    Headers,
    Cookies,
    Json,
    Query,
}

impl TokenLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenLocation::Headers => "headers",
            TokenLocation::Cookies => "cookies",
            TokenLocation::Json => "json",
            TokenLocation::Query => "query",
        }
    }
}

impl std::fmt::Display for TokenLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenLocation {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "headers" => Ok(TokenLocation::Headers),
            "cookies" => Ok(TokenLocation::Cookies),
            "json" => Ok(TokenLocation::Json),
            "query" => Ok(TokenLocation::Query),
            other => Err(AuthError::InvalidArgument(format!(
                "unknown token location '{other}', expected headers | cookies | json | query"
            ))),
        }
    }
}

/// Cookie `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Signing algorithm name, e.g. "HS256" or "RS256".
    pub algorithm: String,
    /// Algorithms accepted when decoding. Falls back to `[algorithm]`.
    pub decode_algorithms: Option<Vec<String>>,
    /// Shared secret for HMAC algorithms.
    pub secret_key: Option<String>,
    /// PEM public key for asymmetric algorithms.
    pub public_key: Option<String>,
    /// PEM private key for asymmetric algorithms.
    pub private_key: Option<String>,

    /// Default access token lifetime. `None` issues tokens without `exp`.
    #[serde(with = "opt_secs")]
    pub access_token_expires: Option<Duration>,
    /// Default refresh token lifetime. `None` issues tokens without `exp`.
    #[serde(with = "opt_secs")]
    pub refresh_token_expires: Option<Duration>,

    pub decode_audience: Option<Vec<String>>,
    pub decode_issuer: Option<String>,
    /// Clock skew tolerated on `exp` / `nbf`, in seconds.
    pub decode_leeway: u64,
    pub encode_audience: Option<Vec<String>>,
    pub encode_issuer: Option<String>,
    /// Emit `nbf = iat` on issued tokens.
    pub encode_nbf: bool,
    /// Reject (instead of strip) extra claims colliding with reserved names.
    pub strict_claims: bool,

    /// Ordered list of channels searched for a token.
    pub token_location: Vec<TokenLocation>,

    pub header_name: String,
    /// Prefix stripped from the header value. Empty means no prefix.
    pub header_type: String,

    pub access_cookie_name: String,
    pub access_cookie_path: String,
    pub refresh_cookie_name: String,
    pub refresh_cookie_path: String,
    pub cookie_domain: Option<String>,
    /// `Max-Age` in seconds. `None` produces session cookies.
    pub cookie_max_age: Option<i64>,
    pub cookie_samesite: SameSitePolicy,
    pub cookie_secure: bool,

    pub cookie_csrf_protect: bool,
    /// Also write a readable cookie holding the CSRF claim.
    pub csrf_in_cookies: bool,
    /// Look for the CSRF value in url-encoded form data when the header is absent.
    pub csrf_check_form: bool,
    /// Methods for which a CSRF value is required on cookie tokens.
    pub csrf_methods: Vec<String>,
    pub access_csrf_cookie_name: String,
    pub access_csrf_cookie_path: String,
    pub access_csrf_header_name: String,
    pub access_csrf_field_name: String,
    pub refresh_csrf_cookie_name: String,
    pub refresh_csrf_cookie_path: String,
    pub refresh_csrf_header_name: String,
    pub refresh_csrf_field_name: String,

    pub query_string_name: String,

    pub json_key: String,
    pub refresh_json_key: String,

    pub implicit_refresh_route_exclude: Vec<String>,
    pub implicit_refresh_route_include: Vec<String>,
    pub implicit_refresh_method_exclude: Vec<String>,
    pub implicit_refresh_method_include: Vec<String>,
    /// Cookie access tokens expiring sooner than this are silently reissued.
    #[serde(with = "secs")]
    pub implicit_refresh_deltatime: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: "HS256".to_string(),
            decode_algorithms: None,
            secret_key: None,
            public_key: None,
            private_key: None,
            access_token_expires: Some(Duration::from_secs(15 * 60)),
            refresh_token_expires: Some(Duration::from_secs(20 * 24 * 60 * 60)),
            decode_audience: None,
            decode_issuer: None,
            decode_leeway: 0,
            encode_audience: None,
            encode_issuer: None,
            encode_nbf: false,
            strict_claims: false,
            token_location: vec![TokenLocation::Headers],
            header_name: "Authorization".to_string(),
            header_type: "Bearer".to_string(),
            access_cookie_name: "access_token_cookie".to_string(),
            access_cookie_path: "/".to_string(),
            refresh_cookie_name: "refresh_token_cookie".to_string(),
            refresh_cookie_path: "/".to_string(),
            cookie_domain: None,
            cookie_max_age: None,
            cookie_samesite: SameSitePolicy::Lax,
            cookie_secure: true,
            cookie_csrf_protect: true,
            csrf_in_cookies: true,
            csrf_check_form: false,
            csrf_methods: ["POST", "PUT", "PATCH", "DELETE"]
                .into_iter()
                .map(String::from)
                .collect(),
            access_csrf_cookie_name: "csrf_access_token".to_string(),
            access_csrf_cookie_path: "/".to_string(),
            access_csrf_header_name: "X-CSRF-TOKEN".to_string(),
            access_csrf_field_name: "csrf_token".to_string(),
            refresh_csrf_cookie_name: "csrf_refresh_token".to_string(),
            refresh_csrf_cookie_path: "/".to_string(),
            refresh_csrf_header_name: "X-CSRF-TOKEN".to_string(),
            refresh_csrf_field_name: "csrf_token".to_string(),
            query_string_name: "token".to_string(),
            json_key: "access_token".to_string(),
            refresh_json_key: "refresh_token".to_string(),
            implicit_refresh_route_exclude: Vec::new(),
            implicit_refresh_route_include: Vec::new(),
            implicit_refresh_method_exclude: Vec::new(),
            implicit_refresh_method_include: Vec::new(),
            implicit_refresh_deltatime: Duration::from_secs(10 * 60),
        }
    }
}

impl AuthConfig {
    /// Shortcut for an HMAC configuration with the given secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret_key: Some(secret.into()),
            ..Self::default()
        }
    }

    pub fn has_location(&self, location: TokenLocation) -> bool {
        self.token_location.contains(&location)
    }

    /// Whether a CSRF value has to accompany cookie tokens for this method.
    pub fn csrf_required_for(&self, method: &str) -> bool {
        self.cookie_csrf_protect && contains_method(&self.csrf_methods, method)
    }

    /// Whether issued tokens get a `csrf` claim.
    pub fn binds_csrf(&self) -> bool {
        self.has_location(TokenLocation::Cookies) && self.cookie_csrf_protect
    }

    pub fn signature_algorithm(&self) -> AuthResult<SignatureAlgorithm> {
        self.algorithm.parse()
    }

    pub fn decode_signature_algorithms(&self) -> AuthResult<Vec<SignatureAlgorithm>> {
        match &self.decode_algorithms {
            Some(names) if !names.is_empty() => names.iter().map(|name| name.parse()).collect(),
            _ => Ok(vec![self.signature_algorithm()?]),
        }
    }

    pub fn is_algorithm_symmetric(&self) -> AuthResult<bool> {
        Ok(self.signature_algorithm()?.is_symmetric())
    }

    /// Key material used to sign tokens.
    pub fn signing_key(&self) -> AuthResult<&str> {
        self.key_for(self.private_key.as_deref())
    }

    /// Key material used to verify tokens.
    pub fn verifying_key(&self) -> AuthResult<&str> {
        self.key_for(self.public_key.as_deref())
    }

    fn key_for<'a>(&'a self, asymmetric: Option<&'a str>) -> AuthResult<&'a str> {
        let key = if self.is_algorithm_symmetric()? {
            self.secret_key.as_deref()
        } else {
            asymmetric
        };
        key.filter(|key| !key.is_empty()).ok_or_else(|| {
            AuthError::bad_configuration(format!(
                "no key material for algorithm '{}', set secret_key | public_key | private_key accordingly",
                self.algorithm
            ))
        })
    }
}

pub(crate) fn contains_method(methods: &[String], method: &str) -> bool {
    methods.iter().any(|m| m.eq_ignore_ascii_case(method))
}

mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod opt_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|secs| secs.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.algorithm, "HS256");
        assert_eq!(config.token_location, vec![TokenLocation::Headers]);
        assert_eq!(config.access_token_expires, Some(Duration::from_secs(900)));
        assert!(config.cookie_csrf_protect);
        assert!(!config.binds_csrf());
    }

    #[test]
    fn test_csrf_methods_case_insensitive() {
        let config = AuthConfig::default();
        assert!(config.csrf_required_for("post"));
        assert!(config.csrf_required_for("DELETE"));
        assert!(!config.csrf_required_for("GET"));
    }

    #[test]
    fn test_symmetric_key_selection() {
        let config = AuthConfig::with_secret("shhh");
        assert_eq!(config.signing_key().unwrap(), "shhh");
        assert_eq!(config.verifying_key().unwrap(), "shhh");
    }

    #[test]
    fn test_asymmetric_key_selection() {
        let config = AuthConfig {
            algorithm: "RS256".into(),
            secret_key: Some("unused".into()),
            private_key: Some("private-pem".into()),
            public_key: Some("public-pem".into()),
            ..AuthConfig::default()
        };
        assert_eq!(config.signing_key().unwrap(), "private-pem");
        assert_eq!(config.verifying_key().unwrap(), "public-pem");
    }

    #[test]
    fn test_missing_key_is_lazy_bad_configuration() {
        // Building the config never fails.
        let config = AuthConfig {
            algorithm: "RS256".into(),
            ..AuthConfig::default()
        };
        assert!(matches!(
            config.signing_key(),
            Err(AuthError::BadConfiguration(_))
        ));
    }

    #[test]
    fn test_unknown_algorithm_is_bad_configuration() {
        let config = AuthConfig {
            algorithm: "HS1024".into(),
            secret_key: Some("secret".into()),
            ..AuthConfig::default()
        };
        assert!(matches!(
            config.verifying_key(),
            Err(AuthError::BadConfiguration(_))
        ));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: AuthConfig = serde_json::from_str(
            r#"{
                "secret_key": "s3cret",
                "token_location": ["cookies", "headers"],
                "access_token_expires": 60,
                "refresh_token_expires": null,
                "implicit_refresh_deltatime": 30,
                "cookie_samesite": "Strict"
            }"#,
        )
        .unwrap();
        assert_eq!(
            config.token_location,
            vec![TokenLocation::Cookies, TokenLocation::Headers]
        );
        assert_eq!(config.access_token_expires, Some(Duration::from_secs(60)));
        assert_eq!(config.refresh_token_expires, None);
        assert_eq!(config.implicit_refresh_deltatime, Duration::from_secs(30));
        assert_eq!(config.cookie_samesite, SameSitePolicy::Strict);
        assert_eq!(config.header_name, "Authorization");
    }

    #[test]
    fn test_location_from_str() {
        assert_eq!("Cookies".parse::<TokenLocation>().unwrap(), TokenLocation::Cookies);
        assert!(matches!(
            "body".parse::<TokenLocation>(),
            Err(AuthError::InvalidArgument(_))
        ));
    }
}
