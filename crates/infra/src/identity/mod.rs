//! Identity orchestration: registration, activation, login and sessions,
//! coordinated across the identity provider and the local employee store.

mod orchestrator;

use async_trait::async_trait;
use thiserror::Error;

use payd_auth::{Identity, Role, SessionIdentity, TokenError};
use payd_core::{EmployeeId, ErrorKind, IdentityId, RoleId};

use crate::store::StoreError;

pub use orchestrator::{DEFAULT_SESSION_TTL, IdentityOrchestrator, PLACEHOLDER_CREDENTIAL};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity already exists")]
    AlreadyExists,

    #[error("invalid email")]
    InvalidEmail,

    #[error("password does not meet the policy")]
    InvalidPassword,

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("identity not found")]
    NotFound,

    #[error("account is not yet activated")]
    NotYetActivatingAccount,

    #[error("role {0} is not in the role catalog")]
    UnknownRole(RoleId),

    #[error("invalid credentials")]
    InvalidCredential,

    #[error("session token rejected: {0}")]
    Token(#[from] TokenError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::AlreadyExists => ErrorKind::Conflict,
            IdentityError::InvalidEmail
            | IdentityError::InvalidPassword
            | IdentityError::Validation(_) => ErrorKind::Validation,
            IdentityError::NotFound => ErrorKind::NotFound,
            IdentityError::NotYetActivatingAccount | IdentityError::UnknownRole(_) => {
                ErrorKind::PreconditionFailed
            }
            IdentityError::InvalidCredential => ErrorKind::Unauthenticated,
            IdentityError::Token(e) => e.kind(),
            IdentityError::Store(e) => e.kind(),
            IdentityError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Registration input as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub email: String,
    /// Required for employees, must be absent for admins.
    pub primary_role: Option<RoleId>,
    pub is_admin: bool,
}

impl RegisterRequest {
    pub fn admin(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            primary_role: None,
            is_admin: true,
        }
    }

    pub fn employee(email: impl Into<String>, primary_role: RoleId) -> Self {
        Self {
            email: email.into(),
            primary_role: Some(primary_role),
            is_admin: false,
        }
    }
}

/// Object-safe surface the HTTP layer depends on.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn register(&self, request: RegisterRequest) -> Result<IdentityId, IdentityError>;

    async fn activate(
        &self,
        id: IdentityId,
        name: &str,
        password: &str,
    ) -> Result<EmployeeId, IdentityError>;

    async fn login(&self, username: &str, password: &str) -> Result<Identity, IdentityError>;

    /// Mint a session token for an activated identity.
    fn issue_session(&self, identity: &Identity) -> Result<String, IdentityError>;

    fn verify_session(&self, token: &str) -> Result<SessionIdentity, IdentityError>;

    /// Current role catalog snapshot.
    fn roles(&self) -> Vec<Role>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(IdentityError::AlreadyExists.kind(), ErrorKind::Conflict);
        assert_eq!(IdentityError::InvalidEmail.kind(), ErrorKind::Validation);
        assert_eq!(IdentityError::InvalidPassword.kind(), ErrorKind::Validation);
        assert_eq!(IdentityError::NotFound.kind(), ErrorKind::NotFound);
        assert_eq!(
            IdentityError::NotYetActivatingAccount.kind(),
            ErrorKind::PreconditionFailed
        );
        assert_eq!(
            IdentityError::UnknownRole(RoleId::new(4)).kind(),
            ErrorKind::PreconditionFailed
        );
        assert_eq!(IdentityError::InvalidCredential.kind(), ErrorKind::Unauthenticated);
        assert_eq!(
            IdentityError::Token(TokenError::Expired).kind(),
            ErrorKind::Unauthenticated
        );
        assert_eq!(
            IdentityError::Store(StoreError::TransactionClosed).kind(),
            ErrorKind::Internal
        );
        assert_eq!(IdentityError::Internal("x".into()).kind(), ErrorKind::Internal);
    }
}
