//! Signed session tokens (compact JWS, HS256, single server-held secret).

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use payd_core::ErrorKind;

use crate::{Identity, SessionClaims, SessionIdentity, validate_expiry};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is not signed with the expected algorithm")]
    InvalidAlgorithm,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token has expired")]
    Expired,

    #[error("identity lacks session field `{0}`")]
    IncompleteIdentity(&'static str),

    #[error("session ttl is out of range")]
    InvalidTtl,

    #[error("session secret must not be empty")]
    EmptySecret,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::InvalidSignature
            | TokenError::InvalidAlgorithm
            | TokenError::Malformed(_)
            | TokenError::Expired => ErrorKind::Unauthenticated,
            TokenError::IncompleteIdentity(_)
            | TokenError::InvalidTtl
            | TokenError::EmptySecret
            | TokenError::Signing(_) => ErrorKind::Internal,
        }
    }
}

/// Issues and verifies session tokens.
///
/// Only [`SessionTokenCodec::ALGORITHM`] is accepted on verification, which
/// rules out algorithm substitution (`none`, asymmetric keys used as HMAC
/// secrets, ...). Expiry is checked here with no leeway.
#[derive(Clone)]
pub struct SessionTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionTokenCodec {
    pub const ALGORITHM: Algorithm = Algorithm::HS256;

    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let mut validation = Validation::new(Self::ALGORITHM);
        // Expiry is enforced by `validate_expiry` so the boundary is exact and
        // testable against an injected clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }

    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(identity, ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        identity: &Identity,
        ttl: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = SessionClaims::for_identity(identity, issued_at, ttl)?;
        jsonwebtoken::encode(&Header::new(Self::ALGORITHM), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<SessionIdentity, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionIdentity, TokenError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(map_jwt_error)?;
        validate_expiry(&data.claims, now)?;
        data.claims.into_identity()
    }
}

impl core::fmt::Debug for SessionTokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionTokenCodec")
            .field("algorithm", &Self::ALGORITHM)
            .finish_non_exhaustive()
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        JwtErrorKind::InvalidSignature => TokenError::InvalidSignature,
        JwtErrorKind::InvalidAlgorithm => TokenError::InvalidAlgorithm,
        JwtErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed(err.to_string()),
    }
}
