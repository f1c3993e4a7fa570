//! Bearer token verification.
//!
//! The auth gate only needs a yes/no answer (plus whatever the verifier
//! chooses to expose as claims). Two verifiers ship with the gateway:
//! - `Hs256Verifier`: JWTs signed with HMAC-SHA256, checked by `jsonwebtoken`
//! - `StaticTokenVerifier`: a fixed set of opaque API tokens

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::AuthConfig;

/// Reasons a token is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("malformed token")]
    Malformed,

    #[error("unsupported algorithm {0}")]
    UnsupportedAlgorithm(String),

    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("missing or invalid claim {0}")]
    InvalidClaim(String),

    #[error("unknown token")]
    Unknown,

    #[error("invalid signing key")]
    InvalidKey,
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => VerifyError::Expired,
            ErrorKind::InvalidSignature => VerifyError::BadSignature,
            ErrorKind::InvalidAlgorithm => VerifyError::UnsupportedAlgorithm("mismatch".into()),
            ErrorKind::MissingRequiredClaim(claim) => VerifyError::InvalidClaim(claim.clone()),
            ErrorKind::InvalidKeyFormat => VerifyError::InvalidKey,
            _ => VerifyError::Malformed,
        }
    }
}

/// What a verifier learned about a valid token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims {
    pub subject: Option<String>,
    pub expires_at: Option<u64>,
    pub raw: Value,
}

/// Verification capability consumed by the auth gate.
pub trait TokenVerifier: Send + Sync + std::fmt::Debug {
    fn validate(&self, token: &str) -> Result<Claims, VerifyError>;
}

/// Verifies HS256-signed JWTs. Every token must carry a numeric `exp`
/// that has not passed; no leeway is granted.
pub struct Hs256Verifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for Hs256Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hs256Verifier").finish_non_exhaustive()
    }
}

impl Hs256Verifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token carrying `claims`, signed with the shared secret.
    pub fn issue(&self, claims: &Value) -> Result<String, VerifyError> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }
}

impl TokenVerifier for Hs256Verifier {
    fn validate(&self, token: &str) -> Result<Claims, VerifyError> {
        // Refuse other algorithms before touching the signature.
        let header = jsonwebtoken::decode_header(token).map_err(|_| VerifyError::Malformed)?;
        if header.alg != Algorithm::HS256 {
            return Err(VerifyError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        let data = jsonwebtoken::decode::<Value>(token, &self.decoding, &self.validation)?;
        let raw = data.claims;

        Ok(Claims {
            subject: raw.get("sub").and_then(Value::as_str).map(str::to_string),
            expires_at: raw.get("exp").and_then(Value::as_f64).map(|exp| exp as u64),
            raw,
        })
    }
}

/// Accepts any of a fixed set of opaque tokens.
pub struct StaticTokenVerifier {
    tokens: Vec<Vec<u8>>,
}

impl std::fmt::Debug for StaticTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenVerifier")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl StaticTokenVerifier {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| t.as_ref().as_bytes().to_vec())
                .collect(),
        }
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn validate(&self, token: &str) -> Result<Claims, VerifyError> {
        let presented = token.as_bytes();
        // Compare against every entry so timing does not reveal which matched.
        let matched = self
            .tokens
            .iter()
            .fold(0u8, |acc, t| acc | t.as_slice().ct_eq(presented).unwrap_u8());

        if matched == 1 {
            Ok(Claims::default())
        } else {
            Err(VerifyError::Unknown)
        }
    }
}

/// Tries each verifier in order, accepting the first success.
#[derive(Debug)]
pub struct FirstMatchVerifier {
    verifiers: Vec<Arc<dyn TokenVerifier>>,
}

impl TokenVerifier for FirstMatchVerifier {
    fn validate(&self, token: &str) -> Result<Claims, VerifyError> {
        let mut last = VerifyError::Unknown;
        for verifier in &self.verifiers {
            match verifier.validate(token) {
                Ok(claims) => return Ok(claims),
                Err(e) => last = e,
            }
        }
        Err(last)
    }
}

/// Build the verifier described by `config`, `None` when nothing is configured.
pub fn verifier_from_config(config: &AuthConfig) -> Option<Arc<dyn TokenVerifier>> {
    let mut verifiers: Vec<Arc<dyn TokenVerifier>> = Vec::new();

    if let Some(secret) = config.hs256_secret.as_deref().filter(|s| !s.is_empty()) {
        verifiers.push(Arc::new(Hs256Verifier::new(secret)));
    }
    if !config.static_tokens.is_empty() {
        verifiers.push(Arc::new(StaticTokenVerifier::new(&config.static_tokens)));
    }

    match verifiers.len() {
        0 => None,
        1 => verifiers.pop(),
        _ => Some(Arc::new(FirstMatchVerifier { verifiers })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unix_now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    #[test]
    fn test_hs256_round_trip() {
        let verifier = Hs256Verifier::new("s3cret");
        let exp = unix_now() + 60;
        let token = verifier.issue(&json!({"sub": "alice", "exp": exp})).unwrap();

        let claims = verifier.validate(&token).unwrap();
        assert_eq!(claims.subject.as_deref(), Some("alice"));
        assert_eq!(claims.expires_at, Some(exp));
    }

    #[test]
    fn test_hs256_rejects_other_secret() {
        let token = Hs256Verifier::new("a")
            .issue(&json!({"sub": "alice", "exp": unix_now() + 60}))
            .unwrap();
        assert_eq!(
            Hs256Verifier::new("b").validate(&token),
            Err(VerifyError::BadSignature)
        );
    }

    #[test]
    fn test_hs256_rejects_expired() {
        let verifier = Hs256Verifier::new("s3cret");
        let token = verifier.issue(&json!({"sub": "alice", "exp": unix_now() - 1})).unwrap();
        assert_eq!(verifier.validate(&token), Err(VerifyError::Expired));
    }

    #[test]
    fn test_hs256_rejects_fractional_expired_exp() {
        let verifier = Hs256Verifier::new("s3cret");
        let token = verifier.issue(&json!({"sub": "alice", "exp": 1000.5})).unwrap();
        assert!(verifier.validate(&token).is_err());
    }

    #[test]
    fn test_hs256_rejects_non_numeric_exp() {
        let verifier = Hs256Verifier::new("s3cret");
        let token = verifier.issue(&json!({"sub": "alice", "exp": "1000"})).unwrap();
        assert!(verifier.validate(&token).is_err());

        let future = (unix_now() + 600).to_string();
        let token = verifier.issue(&json!({"sub": "alice", "exp": future})).unwrap();
        assert!(verifier.validate(&token).is_err());
    }

    #[test]
    fn test_hs256_requires_exp() {
        let verifier = Hs256Verifier::new("s3cret");
        let token = verifier.issue(&json!({"sub": "alice"})).unwrap();
        assert_eq!(
            verifier.validate(&token),
            Err(VerifyError::InvalidClaim("exp".into()))
        );
    }

    #[test]
    fn test_hs256_rejects_spliced_payload() {
        let exp = unix_now() + 60;
        let genuine = Hs256Verifier::new("s3cret")
            .issue(&json!({"sub": "alice", "exp": exp}))
            .unwrap();
        let forged = Hs256Verifier::new("other")
            .issue(&json!({"sub": "mallory", "exp": exp}))
            .unwrap();

        let genuine: Vec<&str> = genuine.split('.').collect();
        let forged: Vec<&str> = forged.split('.').collect();
        let spliced = format!("{}.{}.{}", genuine[0], forged[1], genuine[2]);
        assert_eq!(
            Hs256Verifier::new("s3cret").validate(&spliced),
            Err(VerifyError::BadSignature)
        );
    }

    #[test]
    fn test_hs256_rejects_other_algorithms_and_garbage() {
        let verifier = Hs256Verifier::new("s3cret");
        let hs512 = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &json!({"sub": "x", "exp": unix_now() + 60}),
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();
        assert_eq!(
            verifier.validate(&hs512),
            Err(VerifyError::UnsupportedAlgorithm("HS512".into()))
        );
        assert_eq!(verifier.validate("garbage"), Err(VerifyError::Malformed));
        assert!(verifier.validate("a.b.c.d").is_err());
    }

    #[test]
    fn test_static_tokens() {
        let verifier = StaticTokenVerifier::new(["alpha", "beta"]);
        assert!(verifier.validate("beta").is_ok());
        assert_eq!(verifier.validate("gamma"), Err(VerifyError::Unknown));
        assert_eq!(verifier.validate(""), Err(VerifyError::Unknown));
    }

    #[test]
    fn test_from_config() {
        let mut config = AuthConfig::default();
        assert!(verifier_from_config(&config).is_none());

        config.static_tokens = vec!["opaque".into()];
        config.hs256_secret = Some("s3cret".into());
        let verifier = verifier_from_config(&config).unwrap();

        let jwt = Hs256Verifier::new("s3cret")
            .issue(&json!({"sub": "bob", "exp": unix_now() + 60}))
            .unwrap();
        assert!(verifier.validate(&jwt).is_ok());
        assert!(verifier.validate("opaque").is_ok());
        assert!(verifier.validate("nope").is_err());
    }
}
