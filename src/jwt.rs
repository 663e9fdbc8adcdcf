//! JWT encoding and decoding.
//!
//! Thin layer over `jsonwebtoken` that works on raw claim maps and
//! normalizes every decoding failure into [`AuthError::Decode`].

use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::{AuthError, AuthResult};

/// Claim set as it travels on the wire.
pub type ClaimsMap = Map<String, Value>;

/// Signature algorithms accepted by the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
    ES256,
    ES384,
    EdDSA,
}

const ALGORITHM_NAMES: &str =
    "HS256, HS384, HS512, RS256, RS384, RS512, PS256, PS384, PS512, ES256, ES384, EdDSA";

enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl SignatureAlgorithm {
    /// HMAC algorithms share one secret between signer and verifier.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, Self::HS256 | Self::HS384 | Self::HS512)
    }

    fn family(&self) -> KeyFamily {
        match self {
            Self::HS256 | Self::HS384 | Self::HS512 => KeyFamily::Hmac,
            Self::RS256 | Self::RS384 | Self::RS512 | Self::PS256 | Self::PS384 | Self::PS512 => {
                KeyFamily::Rsa
            }
            Self::ES256 | Self::ES384 => KeyFamily::Ec,
            Self::EdDSA => KeyFamily::Ed,
        }
    }
}

impl From<SignatureAlgorithm> for Algorithm {
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::HS256 => Algorithm::HS256,
            SignatureAlgorithm::HS384 => Algorithm::HS384,
            SignatureAlgorithm::HS512 => Algorithm::HS512,
            SignatureAlgorithm::RS256 => Algorithm::RS256,
            SignatureAlgorithm::RS384 => Algorithm::RS384,
            SignatureAlgorithm::RS512 => Algorithm::RS512,
            SignatureAlgorithm::PS256 => Algorithm::PS256,
            SignatureAlgorithm::PS384 => Algorithm::PS384,
            SignatureAlgorithm::PS512 => Algorithm::PS512,
            SignatureAlgorithm::ES256 => Algorithm::ES256,
            SignatureAlgorithm::ES384 => Algorithm::ES384,
            SignatureAlgorithm::EdDSA => Algorithm::EdDSA,
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let algorithm = match s {
            "HS256" => Self::HS256,
            "HS384" => Self::HS384,
            "HS512" => Self::HS512,
            "RS256" => Self::RS256,
            "RS384" => Self::RS384,
            "RS512" => Self::RS512,
            "PS256" => Self::PS256,
            "PS384" => Self::PS384,
            "PS512" => Self::PS512,
            "ES256" => Self::ES256,
            "ES384" => Self::ES384,
            "EdDSA" => Self::EdDSA,
            other => {
                return Err(AuthError::bad_configuration(format!(
                    "bad algorithm '{other}', allowed values are {ALGORITHM_NAMES}"
                )));
            }
        };
        Ok(algorithm)
    }
}

fn encoding_key(algorithm: SignatureAlgorithm, key: &str) -> AuthResult<EncodingKey> {
    let pem = key.as_bytes();
    let parsed = match algorithm.family() {
        KeyFamily::Hmac => return Ok(EncodingKey::from_secret(pem)),
        KeyFamily::Rsa => EncodingKey::from_rsa_pem(pem),
        KeyFamily::Ec => EncodingKey::from_ec_pem(pem),
        KeyFamily::Ed => EncodingKey::from_ed_pem(pem),
    };
    parsed.map_err(|e| AuthError::bad_configuration(format!("invalid private key: {e}")))
}

fn decoding_key(algorithm: SignatureAlgorithm, key: &str) -> AuthResult<DecodingKey> {
    let pem = key.as_bytes();
    let parsed = match algorithm.family() {
        KeyFamily::Hmac => return Ok(DecodingKey::from_secret(pem)),
        KeyFamily::Rsa => DecodingKey::from_rsa_pem(pem),
        KeyFamily::Ec => DecodingKey::from_ec_pem(pem),
        KeyFamily::Ed => DecodingKey::from_ed_pem(pem),
    };
    parsed.map_err(|e| AuthError::bad_configuration(format!("invalid public key: {e}")))
}

/// Sign a claim set into a compact JWT.
///
/// A caller supplied `header` keeps its extra fields (`kid`, `cty`, ...);
/// its `alg` is always replaced by `algorithm`.
pub fn encode<C: Serialize>(
    claims: &C,
    key: &str,
    algorithm: SignatureAlgorithm,
    header: Option<Header>,
) -> AuthResult<String> {
    let mut header = header.unwrap_or_default();
    header.alg = algorithm.into();
    let key = encoding_key(algorithm, key)?;
    jsonwebtoken::encode(&header, claims, &key)
        .map_err(|e| AuthError::bad_configuration(format!("failed to encode token: {e}")))
}

/// Decode a compact JWT into its claim map.
///
/// With `verify` set, the signature, `exp` / `nbf` (within `leeway`
/// seconds), and the audience and issuer (only when given) are checked.
/// Without it the token is only parsed, which is meant for reading claims
/// of a token that was just issued by this process.
pub fn decode(
    token: &str,
    key: &str,
    algorithms: &[SignatureAlgorithm],
    audience: Option<&[String]>,
    issuer: Option<&str>,
    leeway: u64,
    verify: bool,
) -> AuthResult<ClaimsMap> {
    if !verify {
        return decode_unverified(token);
    }

    let first = *algorithms
        .first()
        .ok_or_else(|| AuthError::bad_configuration("no decode algorithm configured"))?;
    let key = decoding_key(first, key)?;

    let mut validation = Validation::new(first.into());
    validation.algorithms = algorithms.iter().map(|&alg| alg.into()).collect();
    validation.leeway = leeway;
    validation.validate_nbf = true;
    validation.set_required_spec_claims::<&str>(&[]);
    match audience {
        Some(audience) if !audience.is_empty() => validation.set_audience(audience),
        _ => validation.validate_aud = false,
    }
    if let Some(issuer) = issuer {
        validation.set_issuer(&[issuer]);
    }

    let data = jsonwebtoken::decode::<ClaimsMap>(token, &key, &validation)?;
    Ok(data.claims)
}

fn decode_unverified(token: &str) -> AuthResult<ClaimsMap> {
    let data = jsonwebtoken::dangerous::insecure_decode::<ClaimsMap>(token)?;
    Ok(data.claims)
}
