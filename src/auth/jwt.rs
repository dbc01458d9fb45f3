//! Bearer token verification.
//!
//! Tokens are HS256 JWTs minted by the external identity provider. The `sub`
//! claim links a token to an account; `name`/`nickname` seed the username when
//! that account is created on first access.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// External subject identifier
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl Claims {
    /// Username for an account created from this token.
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .or(self.name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.sub)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret must be at least {MIN_SECRET_LEN} characters")]
    WeakSecret,
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct TokenVerifier {
    secret: Vec<u8>,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }
        let mut validation = Validation::default();
        validation.validate_aud = false;
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
            validation,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, TokenError> {
        let mut verifier = Self::new(&config.jwt_secret)?;
        if let Some(ref issuer) = config.issuer {
            verifier.validation.set_issuer(&[issuer]);
        }
        if let Some(ref audience) = config.audience {
            verifier.validation.set_audience(&[audience]);
            verifier.validation.validate_aud = true;
        }
        Ok(verifier)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &self.validation,
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(err.to_string()),
        })
    }

    /// Sign claims with the shared secret. Used by local tooling and tests.
    pub fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

/// Token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
