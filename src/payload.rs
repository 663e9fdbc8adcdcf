//! Token payload model.

use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::Header;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::auth::{AuthError, AuthResult};
use crate::config::AuthConfig;
use crate::jwt::{self, ClaimsMap, SignatureAlgorithm};

/// Claim names owned by the payload model. Extra data using these names is
/// stripped, or rejected when `strict_claims` is set.
pub const RESERVED_CLAIMS: [&str; 11] = [
    "jti", "iss", "sub", "aud", "exp", "nbf", "iat", "type", "csrf", "scopes", "fresh",
];

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenType::Access),
            "refresh" => Ok(TokenType::Refresh),
            other => Err(AuthError::InvalidArgument(format!(
                "token type must be 'access' | 'refresh', got '{other}'"
            ))),
        }
    }
}

/// `aud` claim, a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(value) => value == audience,
            Audience::Many(values) => values.iter().any(|value| value == audience),
        }
    }
}

impl From<&str> for Audience {
    fn from(value: &str) -> Self {
        Audience::Single(value.to_string())
    }
}

impl From<Vec<String>> for Audience {
    fn from(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            Audience::Single(values.remove(0))
        } else {
            Audience::Many(values)
        }
    }
}

/// Any way of expressing a point in time for a time claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeExpression {
    /// Absolute instant.
    At(SystemTime),
    /// Offset from the moment the claim is built.
    In(Duration),
    /// Raw UNIX timestamp in seconds.
    Timestamp(i64),
}

impl TimeExpression {
    pub fn to_timestamp(&self) -> i64 {
        match self {
            TimeExpression::At(instant) => system_time_to_timestamp(*instant),
            TimeExpression::In(offset) => now_timestamp().saturating_add(secs_as_i64(*offset)),
            TimeExpression::Timestamp(ts) => *ts,
        }
    }
}

impl From<SystemTime> for TimeExpression {
    fn from(value: SystemTime) -> Self {
        TimeExpression::At(value)
    }
}

impl From<Duration> for TimeExpression {
    fn from(value: Duration) -> Self {
        TimeExpression::In(value)
    }
}

impl From<i64> for TimeExpression {
    fn from(value: i64) -> Self {
        TimeExpression::Timestamp(value)
    }
}

/// Whole seconds of `duration`, saturating at `i64::MAX`.
fn secs_as_i64(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

fn system_time_to_timestamp(instant: SystemTime) -> i64 {
    match instant.duration_since(UNIX_EPOCH) {
        Ok(since) => secs_as_i64(since),
        Err(before) => -secs_as_i64(before.duration()),
    }
}

pub fn now_timestamp() -> i64 {
    system_time_to_timestamp(SystemTime::now())
}

fn new_jti() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Random value bound into cookie tokens for the CSRF double submit.
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Per-token options for issuing a token.
#[derive(Debug, Clone, Default)]
pub struct TokenOptions {
    /// Only honored for access tokens.
    pub fresh: bool,
    /// Overrides the configured lifetime.
    pub expiry: Option<TimeExpression>,
    /// Extra application claims.
    pub data: Option<ClaimsMap>,
    /// Overrides the configured `encode_audience`.
    pub audience: Option<Audience>,
    pub scopes: Option<Vec<String>>,
    /// JOSE header fields such as `kid`.
    pub header: Option<Header>,
}

impl TokenOptions {
    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    pub fn expiry(mut self, expiry: impl Into<TimeExpression>) -> Self {
        self.expiry = Some(expiry.into());
        self
    }

    pub fn data(mut self, data: ClaimsMap) -> Self {
        self.data = Some(data);
        self
    }

    pub fn audience(mut self, audience: impl Into<Audience>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    pub fn header(mut self, header: Header) -> Self {
        self.header = Some(header);
        self
    }
}

/// The decoded claim set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(default = "new_jti")]
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_numeric_date"
    )]
    pub exp: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_numeric_date"
    )]
    pub nbf: Option<i64>,
    #[serde(default = "now_timestamp", deserialize_with = "numeric_date")]
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub fresh: bool,
    /// Application claims outside the reserved set.
    #[serde(flatten)]
    pub extra: ClaimsMap,
}

// Tokens minted elsewhere may carry fractional timestamps.
fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    f64::deserialize(deserializer).map(|ts| ts as i64)
}

fn optional_numeric_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    Option::<f64>::deserialize(deserializer).map(|ts| ts.map(|ts| ts as i64))
}

fn filter_reserved(data: Option<&ClaimsMap>, strict: bool) -> AuthResult<ClaimsMap> {
    let Some(data) = data else {
        return Ok(ClaimsMap::new());
    };

    let mut extra = ClaimsMap::new();
    for (name, value) in data {
        if RESERVED_CLAIMS.contains(&name.as_str()) {
            if strict {
                return Err(AuthError::BadInput(format!(
                    "'{name}' is a reserved claim and cannot be set through extra data"
                )));
            }
            tracing::warn!(claim = %name, "Dropping reserved claim from extra token data");
            continue;
        }
        extra.insert(name.clone(), value.clone());
    }
    Ok(extra)
}

impl TokenPayload {
    /// Build the claim set of a new token.
    ///
    /// `exp` falls back to the configured lifetime for the token type and a
    /// `csrf` claim is bound only when cookies are an allowed location and
    /// CSRF protection is on. Refresh tokens are never fresh.
    pub fn create(
        config: &AuthConfig,
        uid: &str,
        token_type: TokenType,
        options: &TokenOptions,
    ) -> AuthResult<Self> {
        let extra = filter_reserved(options.data.as_ref(), config.strict_claims)?;

        let default_lifetime = match token_type {
            TokenType::Access => config.access_token_expires,
            TokenType::Refresh => config.refresh_token_expires,
        };
        let exp = options
            .expiry
            .or(default_lifetime.map(TimeExpression::In))
            .map(|expiry| expiry.to_timestamp());

        let iat = now_timestamp();
        let aud = options
            .audience
            .clone()
            .or_else(|| config.encode_audience.clone().map(Audience::from));

        Ok(Self {
            jti: new_jti(),
            iss: config.encode_issuer.clone(),
            sub: Some(uid.to_string()),
            aud,
            exp,
            nbf: config.encode_nbf.then_some(iat),
            iat,
            token_type,
            csrf: config.binds_csrf().then(generate_csrf_token),
            scopes: options.scopes.clone(),
            fresh: token_type == TokenType::Access && options.fresh,
            extra,
        })
    }

    /// True when every required scope is granted. An empty requirement
    /// always passes; a payload without scopes fails any other.
    pub fn has_scopes(&self, required: &[&str]) -> bool {
        if required.is_empty() {
            return true;
        }
        match &self.scopes {
            Some(scopes) => required
                .iter()
                .all(|scope| scopes.iter().any(|granted| granted == scope)),
            None => false,
        }
    }

    /// Time left before `exp`, zero once expired, `None` without `exp`.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.exp
            .map(|exp| Duration::from_secs(exp.saturating_sub(now_timestamp()).max(0) as u64))
    }

    pub fn encode(
        &self,
        key: &str,
        algorithm: SignatureAlgorithm,
        header: Option<Header>,
    ) -> AuthResult<String> {
        jwt::encode(self, key, algorithm, header)
    }

    pub fn decode(
        token: &str,
        key: &str,
        algorithms: &[SignatureAlgorithm],
        audience: Option<&[String]>,
        issuer: Option<&str>,
        leeway: u64,
        verify: bool,
    ) -> AuthResult<Self> {
        let claims = jwt::decode(token, key, algorithms, audience, issuer, leeway, verify)?;
        Self::from_claims(claims)
    }

    /// Validate a raw claim map against the payload schema.
    pub fn from_claims(claims: ClaimsMap) -> AuthResult<Self> {
        serde_json::from_value(Value::Object(claims))
            .map_err(|e| AuthError::Decode(format!("invalid token payload: {e}")))
    }
}
