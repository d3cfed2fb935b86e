//! JWT issuing and decoding.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;

use vexen_core::{DomainError, TokenId, User};

use crate::claims::{validate_claims, TokenClaims, TokenType, TokenValidationError};

/// HMAC algorithms accepted for signing.
pub const SUPPORTED_ALGORITHMS: &[&str] = &["HS256", "HS384", "HS512"];

/// Parse an HMAC algorithm name (`HS256`, `HS384`, `HS512`; case-insensitive).
pub fn parse_algorithm(name: &str) -> Result<Algorithm, DomainError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(DomainError::validation(format!(
            "unsupported signing algorithm '{other}' (expected one of {SUPPORTED_ALGORITHMS:?})"
        ))),
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// An access/refresh token pair returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Signs and verifies Vexen tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl core::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(
        secret: &SecretString,
        algorithm: Algorithm,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            algorithm,
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn ttl(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        }
    }

    /// Sign a single token for `user`.
    pub fn issue(
        &self,
        user: &User,
        version: u32,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<(String, TokenClaims), TokenError> {
        let claims = TokenClaims {
            sub: user.id,
            email: user.email.clone(),
            token_type,
            iat: now.timestamp(),
            exp: (now + self.ttl(token_type)).timestamp(),
            jti: TokenId::new(),
            ver: version,
        };
        let token = jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;
        Ok((token, claims))
    }

    pub fn issue_pair(&self, user: &User, version: u32, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        let (access_token, _) = self.issue(user, version, TokenType::Access, now)?;
        let (refresh_token, _) = self.issue(user, version, TokenType::Refresh, now)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verify the signature, then validate the claims against `now`.
    pub fn decode(&self, token: &str, expected: TokenType, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked by `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(TokenError::Invalid)?;
        validate_claims(&data.claims, expected, now)?;
        Ok(data.claims)
    }
}
