use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use payd_core::{EmployeeId, IdentityId, RoleId};

use crate::{Identity, TokenError};

/// Claim set carried by a session token.
///
/// Field names are the wire names. `exp` is integer unix seconds, fixed at
/// issuance and never extended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: provider identity id.
    pub sub: String,
    pub email: String,
    pub employee_id: String,
    pub employee_name: String,
    /// Privilege role (`admin` / `employee`).
    pub role: String,
    pub primary_role: i32,
    pub exp: i64,
}

impl SessionClaims {
    /// Claims for an activated identity joined with its employee row.
    pub fn for_identity(
        identity: &Identity,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, TokenError> {
        let employee_id = identity
            .employee_id
            .ok_or(TokenError::IncompleteIdentity("employee_id"))?;
        let employee_name = identity
            .employee_name
            .clone()
            .ok_or(TokenError::IncompleteIdentity("employee_name"))?;

        let ttl_secs = i64::try_from(ttl.as_secs()).map_err(|_| TokenError::InvalidTtl)?;
        let exp = issued_at
            .timestamp()
            .checked_add(ttl_secs)
            .ok_or(TokenError::InvalidTtl)?;

        Ok(Self {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            employee_id: employee_id.to_string(),
            employee_name,
            role: identity.role.as_str().to_string(),
            primary_role: identity.primary_role.get(),
            exp,
        })
    }

    /// Reconstruct the read-only identity projection.
    pub fn into_identity(self) -> Result<SessionIdentity, TokenError> {
        let id = self
            .sub
            .parse::<IdentityId>()
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let employee_id = self
            .employee_id
            .parse::<EmployeeId>()
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let expires_at = Utc
            .timestamp_opt(self.exp, 0)
            .single()
            .ok_or_else(|| TokenError::Malformed(format!("exp out of range: {}", self.exp)))?;

        Ok(SessionIdentity {
            id,
            email: self.email,
            employee_id,
            employee_name: self.employee_name,
            role: self.role,
            primary_role: RoleId::new(self.primary_role),
            expires_at,
        })
    }
}

/// Identity projection recovered from a verified session token.
///
/// `role` stays the raw claim string so authorization compares exactly what
/// was signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionIdentity {
    pub id: IdentityId,
    pub email: String,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub role: String,
    pub primary_role: RoleId,
    pub expires_at: DateTime<Utc>,
}

impl SessionIdentity {
    pub fn role(&self) -> &str {
        &self.role
    }
}

/// Deterministically validate the expiry of a claim set.
///
/// A token is expired at its `exp` instant, not one second after it.
pub fn validate_expiry(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if now.timestamp() >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IdentityState, PrivilegeRole};

    fn activated_identity() -> Identity {
        Identity {
            id: IdentityId::new(),
            email: "alice@example.com".into(),
            role: PrivilegeRole::Employee,
            primary_role: RoleId::new(2),
            state: IdentityState::Active,
            employee_id: Some(EmployeeId::new(7)),
            employee_name: Some("Alice".into()),
        }
    }

    #[test]
    fn exp_is_issuance_plus_ttl_in_whole_seconds() {
        let issued_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let claims =
            SessionClaims::for_identity(&activated_identity(), issued_at, Duration::from_secs(900)).unwrap();
        assert_eq!(claims.exp, 1_700_000_900);
        assert_eq!(claims.role, "employee");
        assert_eq!(claims.employee_id, "7");
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let issued_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let claims =
            SessionClaims::for_identity(&activated_identity(), issued_at, Duration::from_secs(60)).unwrap();

        assert!(validate_expiry(&claims, issued_at).is_ok());
        assert!(validate_expiry(&claims, issued_at + chrono::Duration::seconds(59)).is_ok());
        assert_eq!(
            validate_expiry(&claims, issued_at + chrono::Duration::seconds(60)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn identity_without_employee_cannot_be_claimed() {
        let mut identity = activated_identity();
        identity.employee_id = None;
        let err = SessionClaims::for_identity(&identity, Utc::now(), Duration::from_secs(60)).unwrap_err();
        assert_eq!(err, TokenError::IncompleteIdentity("employee_id"));
    }

    #[test]
    fn projection_round_trips_identity_fields() {
        let identity = activated_identity();
        let claims = SessionClaims::for_identity(&identity, Utc::now(), Duration::from_secs(60)).unwrap();
        let projection = claims.into_identity().unwrap();

        assert_eq!(projection.id, identity.id);
        assert_eq!(projection.employee_id, EmployeeId::new(7));
        assert_eq!(projection.employee_name, "Alice");
        assert_eq!(projection.role(), "employee");
        assert_eq!(projection.primary_role, RoleId::new(2));
    }
}
