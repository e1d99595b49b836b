//! Bearer token verification and minting.
//!
//! # Responsibilities
//! - Verify HMAC-signed JWTs presented as bearer tokens
//! - Map claims to a [`Principal`] (subject + authorities claim)
//! - Mint tokens with the same settings for operators and tests
//!
//! # Design Decisions
//! - Signature checks are delegated to `jsonwebtoken`
//! - Secrets are base64 and must be at least as long as the hash output
//! - The authorities claim may be a space-separated string or a string array

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::schema::JwtConfig;
use crate::security::principal::Principal;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("security.jwt.base64_secret is not set")]
    MissingSecret,

    #[error("security.jwt.base64_secret is not valid base64: {0}")]
    SecretEncoding(#[from] base64::DecodeError),

    #[error("secret has {bits} bits but {algorithm} requires at least {required}")]
    SecretTooShort {
        algorithm: &'static str,
        bits: usize,
        required: usize,
    },

    #[error("unsupported signing algorithm `{0}` (expected HS256, HS384 or HS512)")]
    UnsupportedAlgorithm(String),

    #[error("{0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token has no `sub` claim")]
    MissingSubject,

    #[error("claim `{0}` must be a string or an array of strings")]
    AuthoritiesClaim(String),
}

impl TokenError {
    /// Short description suitable for a `WWW-Authenticate` challenge.
    pub fn challenge_description(&self) -> String {
        match self {
            TokenError::Invalid(err) => match err.kind() {
                ErrorKind::ExpiredSignature => "Jwt expired".to_string(),
                ErrorKind::ImmatureSignature => "Jwt not yet valid".to_string(),
                ErrorKind::InvalidSignature => "Invalid signature".to_string(),
                ErrorKind::InvalidIssuer => "Invalid issuer".to_string(),
                ErrorKind::InvalidAlgorithm => "Unexpected signing algorithm".to_string(),
                ErrorKind::MissingRequiredClaim(claim) => format!("Missing claim `{}`", claim),
                _ => "Malformed token".to_string(),
            },
            other => other.to_string(),
        }
    }
}

struct SigningMaterial {
    algorithm: Algorithm,
    secret: Vec<u8>,
}

impl SigningMaterial {
    fn from_config(config: &JwtConfig) -> Result<Self, TokenError> {
        let (algorithm, name, required_bits) = match config.algorithm.to_ascii_uppercase().as_str() {
            "HS256" => (Algorithm::HS256, "HS256", 256),
            "HS384" => (Algorithm::HS384, "HS384", 384),
            "HS512" => (Algorithm::HS512, "HS512", 512),
            _ => return Err(TokenError::UnsupportedAlgorithm(config.algorithm.clone())),
        };

        let encoded = config
            .base64_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(TokenError::MissingSecret)?;
        let secret = STANDARD.decode(encoded.trim())?;

        let bits = secret.len() * 8;
        if bits < required_bits {
            return Err(TokenError::SecretTooShort {
                algorithm: name,
                bits,
                required: required_bits,
            });
        }

        Ok(Self { algorithm, secret })
    }
}

/// Validates bearer tokens.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
    authorities_claim: String,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .field("authorities_claim", &self.authorities_claim)
            .finish()
    }
}

impl TokenVerifier {
    pub fn from_config(config: &JwtConfig) -> Result<Self, TokenError> {
        let material = SigningMaterial::from_config(config)?;

        let mut validation = Validation::new(material.algorithm);
        validation.leeway = config.leeway_secs;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self {
            key: DecodingKey::from_secret(&material.secret),
            validation,
            authorities_claim: config.authorities_claim.clone(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<Principal, TokenError> {
        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &self.key, &self.validation)?;
        let claims = data.claims;

        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::MissingSubject)?;

        let authorities = match claims.get(&self.authorities_claim) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(joined)) => joined.split_whitespace().map(str::to_owned).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| TokenError::AuthoritiesClaim(self.authorities_claim.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(TokenError::AuthoritiesClaim(self.authorities_claim.clone())),
        };

        Ok(Principal::new(subject, authorities))
    }
}

/// Mints bearer tokens with the configured secret.
pub struct TokenIssuer {
    key: EncodingKey,
    header: Header,
    authorities_claim: String,
    issuer: Option<String>,
    validity: Duration,
}

impl TokenIssuer {
    pub fn from_config(config: &JwtConfig) -> Result<Self, TokenError> {
        let material = SigningMaterial::from_config(config)?;
        Ok(Self {
            key: EncodingKey::from_secret(&material.secret),
            header: Header::new(material.algorithm),
            authorities_claim: config.authorities_claim.clone(),
            issuer: config.issuer.clone(),
            validity: Duration::from_secs(config.token_validity_secs),
        })
    }

    pub fn issue<S: AsRef<str>>(&self, subject: &str, authorities: &[S]) -> Result<String, TokenError> {
        self.issue_with_validity(subject, authorities, self.validity)
    }

    pub fn issue_with_validity<S: AsRef<str>>(
        &self,
        subject: &str,
        authorities: &[S],
        validity: Duration,
    ) -> Result<String, TokenError> {
        let now = jsonwebtoken::get_current_timestamp();
        let joined = authorities
            .iter()
            .map(|a| a.as_ref())
            .collect::<Vec<_>>()
            .join(" ");

        let mut claims = Map::new();
        claims.insert("sub".into(), Value::from(subject));
        claims.insert(self.authorities_claim.clone(), Value::from(joined));
        claims.insert("iat".into(), Value::from(now));
        claims.insert("exp".into(), Value::from(now + validity.as_secs()));
        claims.insert("jti".into(), Value::from(uuid::Uuid::new_v4().to_string()));
        if let Some(issuer) = &self.issuer {
            claims.insert("iss".into(), Value::from(issuer.as_str()));
        }

        Ok(jsonwebtoken::encode(&self.header, &claims, &self.key)?)
    }
}
