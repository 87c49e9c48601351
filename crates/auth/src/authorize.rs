use thiserror::Error;

use payd_core::ErrorKind;

use crate::SessionIdentity;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("role '{0}' is not allowed")]
    InsufficientRole(String),
}

impl AuthzError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Authorization
    }
}

/// Check a verified session against a route's allowed roles.
///
/// - No IO
/// - Exact, case-sensitive comparison against the signed `role` claim
pub fn authorize_role(identity: &SessionIdentity, allowed: &[&str]) -> Result<(), AuthzError> {
    if allowed.iter().any(|role| *role == identity.role()) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole(identity.role().to_string()))
    }
}
