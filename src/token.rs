//! Token codec: issues and verifies the signed, time-bounded identity assertions
//! carried in the session cookie. Pure over (claims, secret); knows nothing about storage.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Role;

/// Lifetime of every issued token. There is no refresh; expiry means a new login.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Claims
///
/// Payload signed into every token (HS256 over the shared secret).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: Uuid,
    pub role: Role,
    pub is_verified: bool,
    pub is_blocked: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Identity
///
/// The verified subject of a request, as decoded from a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub account_id: Uuid,
    pub role: Role,
    pub is_verified: bool,
    pub is_blocked: bool,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            account_id: claims.sub,
            role: claims.role,
            is_verified: claims.is_verified,
            is_blocked: claims.is_blocked,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    MalformedToken,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token could not be issued: {0}")]
    Issue(String),
}

/// TokenCodec
///
/// Holds the signing material derived from the shared secret. Constructed once at startup
/// from `AppConfig` and injected through the application state, so tests can build their own.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(TOKEN_TTL_DAYS),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a token for `identity` valid for seven days from now.
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    /// Same as `issue`, with an explicit issue time. Used to mint already-expired tokens in tests.
    pub fn issue_at(
        &self,
        identity: &Identity,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = issued_at + self.ttl;
        let claims = Claims {
            sub: identity.account_id,
            role: identity.role,
            is_verified: identity.is_verified,
            is_blocked: identity.is_blocked,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Issue(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Checks structure, signature and expiry, in that order of precedence.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // Expiry is exact; a token is dead the second its `exp` passes.
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims.into()),
            Err(e) => Err(match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                _ => TokenError::MalformedToken,
            }),
        }
    }
}
